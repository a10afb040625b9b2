#[cfg(test)]
mod errors_tests {
    use camview::errors::{ApplyError, CameraError, CaptureError, EnumerationError};
    use std::error::Error;

    #[test]
    fn test_capture_error_display() {
        let cases = vec![
            (
                CaptureError::PermissionDenied("user refused".to_string()),
                "Camera permission denied: user refused",
            ),
            (
                CaptureError::DeviceNotFound("cam9".to_string()),
                "Camera not found: cam9",
            ),
            (
                CaptureError::DeviceBusy {
                    device_id: "cam1".to_string(),
                    reason: "in use".to_string(),
                },
                "Camera busy [cam1]: in use",
            ),
            (
                CaptureError::ConstraintsUnsatisfiable("no 4K".to_string()),
                "Constraints cannot be satisfied: no 4K",
            ),
            (
                CaptureError::Backend("driver crashed".to_string()),
                "Capture backend error: driver crashed",
            ),
        ];

        for (error, expected) in cases {
            assert_eq!(error.to_string(), expected);
        }
    }

    #[test]
    fn test_apply_and_enumeration_display() {
        assert_eq!(
            ApplyError::Unsupported("no renegotiation".to_string()).to_string(),
            "Constraint application not supported: no renegotiation"
        );
        assert_eq!(
            ApplyError::Rejected("mode".to_string()).to_string(),
            "Constraints rejected: mode"
        );
        assert_eq!(ApplyError::TrackEnded.to_string(), "Track has already ended");
        assert_eq!(
            EnumerationError::Unavailable("no backend".to_string()).to_string(),
            "Device enumeration unavailable: no backend"
        );
    }

    #[test]
    fn test_camera_error_wraps_transparently() {
        let capture = CaptureError::DeviceNotFound("cam9".to_string());
        let error: CameraError = capture.clone().into();
        assert_eq!(error, CameraError::Capture(capture.clone()));
        assert_eq!(error.to_string(), capture.to_string());

        let error: CameraError = ApplyError::TrackEnded.into();
        assert_eq!(error.to_string(), "Track has already ended");

        let error: CameraError = EnumerationError::PermissionDenied("blocked".to_string()).into();
        assert!(matches!(error, CameraError::Enumeration(_)));
    }

    #[test]
    fn test_camera_error_display() {
        assert_eq!(
            CameraError::Fullscreen("refused".to_string()).to_string(),
            "Fullscreen error: refused"
        );
        assert_eq!(
            CameraError::Config("bad fps".to_string()).to_string(),
            "Configuration error: bad fps"
        );
        assert_eq!(
            CameraError::DeviceNotFound("cam9".to_string()).to_string(),
            "Unknown device: cam9"
        );
        assert_eq!(
            CameraError::InvalidState("exited".to_string()).to_string(),
            "Invalid state: exited"
        );
    }

    #[test]
    fn test_transient_errors() {
        assert!(CaptureError::DeviceBusy {
            device_id: "cam1".to_string(),
            reason: "in use".to_string(),
        }
        .is_transient());
        assert!(CaptureError::Backend("timeout".to_string()).is_transient());
        assert!(!CaptureError::PermissionDenied("no".to_string()).is_transient());
        assert!(!CaptureError::DeviceNotFound("cam9".to_string()).is_transient());
    }

    #[test]
    fn test_errors_are_std_errors() {
        let error: Box<dyn Error> = Box::new(CameraError::InvalidState("x".to_string()));
        assert!(error.source().is_none());
        let _: Box<dyn Error + Send + Sync> = Box::new(CaptureError::Backend("x".to_string()));
    }
}
