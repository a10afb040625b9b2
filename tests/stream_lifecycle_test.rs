//! Stream lifecycle: every opened stream is stopped exactly once.

#[cfg(test)]
mod stream_lifecycle_tests {
    use camview::errors::CaptureError;
    use camview::provider::{MediaTrack, SurfaceFactory, SurfaceRole};
    use camview::stream::{PendingOpens, Presentation, StreamManager};
    use camview::testing::{FakeDevice, FakeProvider, FakeSurfaceFactory};
    use camview::types::{TrackConstraints, TrackState};
    use std::sync::Arc;

    fn manager(devices: Vec<FakeDevice>) -> (Arc<FakeProvider>, StreamManager) {
        let provider = Arc::new(FakeProvider::new(devices));
        (provider.clone(), StreamManager::new(provider))
    }

    #[tokio::test]
    async fn test_repeated_stop_releases_once() {
        let (provider, streams) = manager(vec![FakeDevice::new("cam1", "Front")]);
        let mut handle = streams
            .open("cam1", TrackConstraints::ideal(1280, 720, 30))
            .await
            .unwrap();
        let track = handle.video_track().unwrap();

        for _ in 0..5 {
            streams.stop(&mut handle);
        }

        assert!(handle.is_stopped());
        assert!(!handle.is_live());
        assert!(handle.tracks().is_empty());
        assert_eq!(track.ready_state(), TrackState::Ended);
        assert_eq!(provider.double_stops(), 0);
    }

    #[tokio::test]
    async fn test_open_requests_exact_device_and_ideal_format() {
        let (provider, streams) = manager(vec![FakeDevice::uhd_webcam("cam1", "Front")]);
        let _handle = streams
            .open("cam1", TrackConstraints::ideal(1920, 1080, 30))
            .await
            .unwrap();

        let request = &provider.requests()[0];
        assert!(request.device_id.is_exact());
        assert_eq!(request.device_id.device_id(), "cam1");
        assert_eq!(request.width.unwrap().ideal, 1920);
        assert_eq!(request.width.unwrap().max, None);
    }

    #[tokio::test]
    async fn test_failures_are_returned_not_panicked() {
        let (provider, streams) = manager(vec![FakeDevice::new("cam1", "Front").failing_with(
            CaptureError::PermissionDenied("user refused".to_string()),
        )]);

        let result = streams.open("cam1", TrackConstraints::default()).await;
        assert_eq!(
            result.unwrap_err(),
            CaptureError::PermissionDenied("user refused".to_string())
        );
        assert_eq!(provider.live_tracks(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_opens_complete_independently() {
        let (provider, streams) = manager(vec![
            FakeDevice::new("cam1", "Front").with_open_delay_ms(30),
            FakeDevice::new("cam2", "Back").failing_with(CaptureError::DeviceBusy {
                device_id: "cam2".to_string(),
                reason: "in use".to_string(),
            }),
            FakeDevice::new("cam3", "Desk"),
        ]);

        let opens = ["cam1", "cam2", "cam3"]
            .into_iter()
            .map(|id| streams.open(id, TrackConstraints::default()));
        let results = futures::future::join_all(opens).await;

        assert!(results[0].is_ok());
        assert!(results[1].is_err());
        assert!(results[2].is_ok());
        assert_eq!(provider.live_tracks(), 2);

        drop(results);
        assert_eq!(provider.live_tracks(), 0);
    }

    #[tokio::test]
    async fn test_delayed_opens_after_teardown_are_stopped() {
        let (provider, streams) = manager(vec![
            FakeDevice::new("cam1", "Front").with_open_delay_ms(20),
            FakeDevice::new("cam2", "Back").with_open_delay_ms(50),
            FakeDevice::new("cam3", "Desk").with_open_delay_ms(80),
        ]);
        let mut pending = PendingOpens::new();
        for id in ["cam1", "cam2", "cam3"] {
            pending
                .spawn(id.to_string(), &streams, id.to_string(), TrackConstraints::default())
                .unwrap();
        }
        assert_eq!(pending.len(), 3);

        let reaper = pending.reap().unwrap();
        assert!(pending.reap().is_none());
        assert_eq!(reaper.await.unwrap(), 3);

        assert_eq!(provider.opened_streams(), 3);
        assert_eq!(provider.live_tracks(), 0);
        assert_eq!(provider.double_stops(), 0);
    }

    #[tokio::test]
    async fn test_pending_results_keep_their_keys() {
        let (_provider, streams) = manager(vec![
            FakeDevice::new("cam1", "Front").with_open_delay_ms(30),
            FakeDevice::new("cam2", "Back"),
        ]);
        let mut pending = PendingOpens::new();
        pending
            .spawn(1u8, &streams, "cam1".to_string(), TrackConstraints::default())
            .unwrap();
        pending
            .spawn(2u8, &streams, "cam2".to_string(), TrackConstraints::default())
            .unwrap();

        let mut seen = Vec::new();
        while let Some((key, outcome)) = pending.next().await {
            let handle = outcome.unwrap();
            seen.push((key, handle.device_id().to_string()));
        }
        seen.sort();
        assert_eq!(
            seen,
            vec![(1, "cam1".to_string()), (2, "cam2".to_string())]
        );
    }

    #[tokio::test]
    async fn test_presentation_release_detaches_then_stops() {
        let (provider, streams) = manager(vec![FakeDevice::new("cam1", "Front")]);
        let surfaces = FakeSurfaceFactory::new();
        let handle = streams.open("cam1", TrackConstraints::default()).await.unwrap();
        let stream_id = handle.id().to_string();

        let presentation =
            Presentation::attach(handle, surfaces.create_surface(SurfaceRole::Primary));
        let log = surfaces.log_for(&SurfaceRole::Primary).unwrap();
        assert_eq!(log.current(), Some(stream_id));

        drop(presentation);
        assert_eq!(log.current(), None);
        assert_eq!(log.detached(), 1);
        assert_eq!(provider.live_tracks(), 0);
    }

    #[test]
    fn test_spawn_without_runtime_is_an_error() {
        let provider = Arc::new(FakeProvider::new(vec![FakeDevice::new("cam1", "Front")]));
        let streams = StreamManager::new(provider);
        let mut pending: PendingOpens<String> = PendingOpens::new();

        let result = pending.spawn(
            "cam1".to_string(),
            &streams,
            "cam1".to_string(),
            TrackConstraints::default(),
        );
        assert!(matches!(result, Err(CaptureError::Backend(_))));
        assert!(pending.is_empty());
    }

    #[test]
    fn test_open_can_be_driven_by_block_on() {
        let provider = Arc::new(FakeProvider::new(vec![FakeDevice::new("cam1", "Front")]));
        let streams = StreamManager::new(provider.clone());

        let handle = tokio_test::block_on(streams.open("cam1", TrackConstraints::default()));
        assert!(handle.unwrap().is_live());
        assert_eq!(provider.live_tracks(), 0);
    }
}
