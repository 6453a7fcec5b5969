//! Tests for connection string parsing.

use super::*;

const TEST_KEY: &str = "dGVzdC1hY2NvdW50LWtleQ==";

mod connection_string_tests {
    use super::*;

    /// Verify a standard account connection string derives both endpoints
    #[test]
    fn test_parse_standard_connection_string() {
        let cs = format!(
            "DefaultEndpointsProtocol=https;AccountName=myaccount;AccountKey={};EndpointSuffix=core.windows.net",
            TEST_KEY
        );

        let account = StorageAccount::from_connection_string(&cs).unwrap();

        assert_eq!(account.name(), "myaccount");
        assert_eq!(
            account.queue_endpoint().as_str(),
            "https://myaccount.queue.core.windows.net/"
        );
        assert_eq!(
            account.secondary_queue_endpoint().unwrap().as_str(),
            "https://myaccount-secondary.queue.core.windows.net/"
        );
        match account.credentials() {
            StorageCredentials::SharedKey { account, key } => {
                assert_eq!(account, "myaccount");
                assert_eq!(key.as_slice(), b"test-account-key");
            }
            other => panic!("Expected SharedKey credentials, got {:?}", other),
        }
    }

    /// Verify setting names are case-insensitive and trailing separators are allowed
    #[test]
    fn test_keys_are_case_insensitive() {
        let cs = format!(
            "accountname=myaccount;ACCOUNTKEY={};endpointsuffix=core.chinacloudapi.cn;",
            TEST_KEY
        );

        let account = StorageAccount::from_connection_string(&cs).unwrap();
        assert_eq!(
            account.queue_endpoint().host_str(),
            Some("myaccount.queue.core.chinacloudapi.cn")
        );
    }

    /// Verify http protocol is honoured for derived endpoints
    #[test]
    fn test_http_protocol() {
        let cs = format!(
            "DefaultEndpointsProtocol=http;AccountName=myaccount;AccountKey={}",
            TEST_KEY
        );

        let account = StorageAccount::from_connection_string(&cs).unwrap();
        assert_eq!(account.queue_endpoint().scheme(), "http");
    }

    /// Verify explicit endpoints override derived ones
    #[test]
    fn test_explicit_queue_endpoint() {
        let cs = format!(
            "AccountName=myaccount;AccountKey={};QueueEndpoint=http://localhost:9999/myaccount",
            TEST_KEY
        );

        let account = StorageAccount::from_connection_string(&cs).unwrap();
        assert_eq!(
            account.queue_endpoint().as_str(),
            "http://localhost:9999/myaccount"
        );
        assert!(
            account.secondary_queue_endpoint().is_none(),
            "No secondary endpoint can be derived from an explicit primary"
        );
    }

    /// Verify shared access signatures are accepted without an account key
    #[test]
    fn test_shared_access_signature() {
        let cs = "QueueEndpoint=https://myaccount.queue.core.windows.net;SharedAccessSignature=?sv=2019-12-12&sig=abc%3D";

        let account = StorageAccount::from_connection_string(cs).unwrap();

        assert_eq!(account.name(), "myaccount");
        assert_eq!(
            account.credentials(),
            &StorageCredentials::SharedAccessSignature("sv=2019-12-12&sig=abc%3D".to_string())
        );
    }

    /// Verify development storage shortcut
    #[test]
    fn test_development_storage() {
        let account = StorageAccount::from_connection_string("UseDevelopmentStorage=true").unwrap();

        assert_eq!(account.name(), DEVELOPMENT_ACCOUNT_NAME);
        assert_eq!(
            account.queue_endpoint().as_str(),
            "http://127.0.0.1:10001/devstoreaccount1"
        );
        assert_eq!(
            account.secondary_queue_endpoint().unwrap().as_str(),
            "http://127.0.0.1:10001/devstoreaccount1-secondary"
        );
    }

    /// Verify development storage proxy host replaces the loopback address
    #[test]
    fn test_development_storage_proxy() {
        let account = StorageAccount::from_connection_string(
            "UseDevelopmentStorage=true;DevelopmentStorageProxyUri=http://azurite",
        )
        .unwrap();

        assert_eq!(
            account.queue_endpoint().as_str(),
            "http://azurite:10001/devstoreaccount1"
        );
    }

    /// Verify account key constructor derives public cloud endpoints
    #[test]
    fn test_new_with_key() {
        let account = StorageAccount::new("myaccount", TEST_KEY).unwrap();
        assert_eq!(
            account.queue_endpoint().host_str(),
            Some("myaccount.queue.core.windows.net")
        );
    }
}

mod connection_string_error_tests {
    use super::*;

    fn assert_invalid(cs: &str) {
        let result = StorageAccount::from_connection_string(cs);
        assert!(
            matches!(result, Err(QueueStorageError::InvalidConnectionString { .. })),
            "Expected InvalidConnectionString for '{}', got {:?}",
            cs,
            result
        );
    }

    #[test]
    fn test_empty_string() {
        assert_invalid("");
        assert_invalid("   ");
    }

    #[test]
    fn test_malformed_segment() {
        assert_invalid("AccountName=myaccount;garbage");
    }

    #[test]
    fn test_duplicate_setting() {
        assert_invalid(&format!(
            "AccountName=a;AccountName=b;AccountKey={}",
            TEST_KEY
        ));
    }

    #[test]
    fn test_unknown_protocol() {
        assert_invalid(&format!(
            "DefaultEndpointsProtocol=ftp;AccountName=a;AccountKey={}",
            TEST_KEY
        ));
    }

    #[test]
    fn test_missing_credentials() {
        assert_invalid("AccountName=myaccount");
    }

    #[test]
    fn test_missing_account_name() {
        assert_invalid(&format!("AccountKey={}", TEST_KEY));
    }

    #[test]
    fn test_invalid_base64_key() {
        assert_invalid("AccountName=myaccount;AccountKey=not base64!");
    }

    #[test]
    fn test_key_and_signature_together() {
        assert_invalid(&format!(
            "AccountName=a;AccountKey={};SharedAccessSignature=sv=1",
            TEST_KEY
        ));
    }

    #[test]
    fn test_development_storage_with_other_settings() {
        assert_invalid("UseDevelopmentStorage=true;AccountName=other");
        assert_invalid("UseDevelopmentStorage=false");
    }

    #[test]
    fn test_invalid_explicit_endpoint() {
        assert_invalid(&format!(
            "AccountName=a;AccountKey={};QueueEndpoint=not-a-url",
            TEST_KEY
        ));
    }
}

/// Verify credentials are never printed
#[test]
fn test_debug_redacts_credentials() {
    let account = StorageAccount::development();
    let debug = format!("{:?}", account);

    assert!(debug.contains("<redacted>"));
    assert!(!debug.contains(DEVELOPMENT_ACCOUNT_KEY));
}
