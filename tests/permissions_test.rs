#[cfg(test)]
mod permissions_tests {
    use camview::errors::CaptureError;
    use camview::permissions::{check_permission, check_permission_detailed, PermissionStatus};

    #[test]
    fn test_check_permission_is_consistent() {
        let first = check_permission();
        for _ in 0..5 {
            assert_eq!(check_permission(), first, "Permission status should be consistent");
        }
    }

    #[test]
    fn test_detailed_matches_simple_status() {
        let info = check_permission_detailed();
        assert_eq!(info.status, check_permission());
        assert!(!info.message.is_empty());
    }

    #[test]
    fn test_capture_gate_follows_status() {
        let info = check_permission_detailed();
        match info.status {
            PermissionStatus::Denied | PermissionStatus::Restricted => {
                assert!(matches!(
                    info.check_capture(),
                    Err(CaptureError::PermissionDenied(_))
                ));
            }
            PermissionStatus::Granted | PermissionStatus::NotDetermined => {
                assert!(info.check_capture().is_ok());
            }
        }
    }

    #[test]
    fn test_check_permission_concurrent() {
        let handles: Vec<_> = (0..10)
            .map(|_| std::thread::spawn(check_permission))
            .collect();

        for handle in handles {
            assert!(handle.join().is_ok());
        }
    }

    #[test]
    fn test_status_serializes_by_name() {
        let json = serde_json::to_string(&PermissionStatus::NotDetermined).unwrap();
        assert_eq!(json, "\"NotDetermined\"");
        assert_eq!(PermissionStatus::NotDetermined.to_string(), "not_determined");
    }
}
