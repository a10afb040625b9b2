//! Contract tests: the lifecycle paths really check their invariants.

mod common;

#[cfg(test)]
mod contract_tests {
    use super::common::Rig;
    use camview::chooser::DeviceChooser;
    use camview::input::{InputEvent, Key};
    use camview::invariant_ppt::{clear_invariant_log, contract_test, invariant_checked, names};
    use camview::testing::FakeDevice;
    use camview::viewer::WebcamViewer;

    #[tokio::test]
    async fn contract_chooser_selection() {
        clear_invariant_log();
        let rig = Rig::new(vec![
            FakeDevice::new("cam1", "Front"),
            FakeDevice::new("cam2", "Back"),
        ]);
        let mut chooser = DeviceChooser::mount(rig.shell.clone()).await;
        chooser.settle().await;
        chooser.select("cam2").unwrap();

        contract_test(
            "chooser selection",
            &[
                names::PREVIEW_KEYS_ENUMERATED,
                names::SELECTION_STOPS_ALL,
                names::DETACH_BEFORE_STOP,
                names::STOPPED_STREAM_EMPTY,
            ],
        );
    }

    #[tokio::test]
    async fn contract_viewer_escape() {
        clear_invariant_log();
        let rig = Rig::new(vec![FakeDevice::new("cam1", "Front")]);
        let mut viewer = WebcamViewer::mount("cam1", rig.shell.clone()).unwrap();
        viewer.ready().await.unwrap();

        rig.shell.input.dispatch(InputEvent::KeyDown(Key::Escape));
        viewer.pump();

        contract_test(
            "viewer escape",
            &[
                names::PRIMARY_RELEASED_BEFORE_REASSIGN,
                names::ESCAPE_LEAVES_FULLSCREEN,
                names::LISTENERS_RELEASED,
                names::DETACH_BEFORE_STOP,
                names::STOPPED_STREAM_EMPTY,
            ],
        );
    }

    #[tokio::test]
    async fn contract_viewer_device_change() {
        let rig = Rig::new(vec![
            FakeDevice::new("cam1", "Front"),
            FakeDevice::new("cam2", "Back"),
        ]);
        let mut viewer = WebcamViewer::mount("cam1", rig.shell.clone()).unwrap();
        viewer.ready().await.unwrap();

        clear_invariant_log();
        viewer.change_device("cam2").unwrap();
        assert!(invariant_checked(names::PRIMARY_RELEASED_BEFORE_REASSIGN));
        assert!(!invariant_checked(names::LISTENERS_RELEASED));

        viewer.ready().await.unwrap();
        contract_test(
            "viewer device change",
            &[names::PRIMARY_RELEASED_BEFORE_REASSIGN, names::DETACH_BEFORE_STOP],
        );
    }

    #[test]
    #[should_panic(expected = "CONTRACT FAILURE")]
    fn contract_detects_unchecked_invariants() {
        clear_invariant_log();
        contract_test("nothing ran", &[names::SELECTION_STOPS_ALL]);
    }
}
