//! Tests for error types.

use super::*;

#[test]
fn test_error_transience() {
    assert!(QueueStorageError::ConnectionFailed {
        message: "network error".to_string(),
    }
    .is_transient());

    assert!(QueueStorageError::Timeout {
        duration: Duration::from_secs(30),
    }
    .is_transient());

    assert!(!QueueStorageError::QueueNotFound {
        queue_name: "test".to_string(),
    }
    .is_transient());

    assert!(!QueueStorageError::AuthenticationFailed {
        message: "bad key".to_string(),
    }
    .is_transient());
}

#[test]
fn test_service_error_transience_follows_status() {
    let service_error = |status: u16| QueueStorageError::Service {
        status,
        code: "Code".to_string(),
        message: "message".to_string(),
    };

    assert!(service_error(500).is_transient());
    assert!(service_error(503).is_transient());
    assert!(service_error(429).is_transient());
    assert!(service_error(408).is_transient());
    assert!(!service_error(400).is_transient());
    assert!(!service_error(409).is_transient());
}

#[test]
fn test_error_codes() {
    let not_found = QueueStorageError::QueueNotFound {
        queue_name: "test".to_string(),
    };
    assert_eq!(not_found.error_code(), Some("QueueNotFound"));

    let service = QueueStorageError::Service {
        status: 400,
        code: "InvalidXmlDocument".to_string(),
        message: "bad".to_string(),
    };
    assert_eq!(service.error_code(), Some("InvalidXmlDocument"));

    let validation = QueueStorageError::Validation(ValidationError::Required {
        field: "queue_name".to_string(),
    });
    assert_eq!(validation.error_code(), None);
    assert_eq!(validation.source_label(), "validation");
}

#[test]
fn test_display_includes_context() {
    let error = QueueStorageError::Service {
        status: 403,
        code: "AuthorizationFailure".to_string(),
        message: "This request is not authorized".to_string(),
    };

    let text = error.to_string();
    assert!(text.contains("403"));
    assert!(text.contains("AuthorizationFailure"));
}
