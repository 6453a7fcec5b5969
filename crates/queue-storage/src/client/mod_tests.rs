//! Tests for the account-level client.

use super::*;
use crate::properties::{CorsMethod, CorsRule, GeoReplicationStatus};
use wiremock::matchers::{body_string_contains, method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TEST_KEY: &str = "dGVzdC1hY2NvdW50LWtleQ==";

fn create_test_client(server: &MockServer) -> QueueServiceClient {
    let endpoint = Url::parse(&server.uri()).unwrap();
    let account = StorageAccount::new("testaccount", TEST_KEY)
        .unwrap()
        .with_queue_endpoint(endpoint)
        .with_secondary_queue_endpoint(None);
    let options = ClientOptions::default().with_retry_policy(RetryPolicy::none());
    QueueServiceClient::with_options(account, options).unwrap()
}

fn list_response(names: &[&str], next_marker: &str) -> ResponseTemplate {
    let queues: String = names
        .iter()
        .map(|n| format!("<Queue><Name>{}</Name></Queue>", n))
        .collect();
    let body = format!(
        "<?xml version=\"1.0\" encoding=\"utf-8\"?><EnumerationResults ServiceEndpoint=\"http://localhost/\"><Prefix>demo</Prefix><Queues>{}</Queues><NextMarker>{}</NextMarker></EnumerationResults>",
        queues, next_marker
    );
    ResponseTemplate::new(200).set_body_string(body)
}

mod options_tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let options = ClientOptions::default();

        assert_eq!(options.timeout, Duration::from_secs(30));
        assert_eq!(options.api_version, API_VERSION);
        assert_eq!(options.message_encoding, MessageEncoding::Base64);
        assert!(options.user_agent.starts_with("queue-storage/"));
    }

    #[test]
    fn test_builder_methods() {
        let options = ClientOptions::default()
            .with_timeout(Duration::from_secs(5))
            .with_user_agent("demo/1.0")
            .with_message_encoding(MessageEncoding::Plain)
            .with_retry_policy(RetryPolicy::none());

        assert_eq!(options.timeout, Duration::from_secs(5));
        assert_eq!(options.user_agent, "demo/1.0");
        assert_eq!(options.message_encoding, MessageEncoding::Plain);
        assert_eq!(options.retry_policy.max_retries, 0);
    }

    #[test]
    fn test_queue_client_url() {
        let account = StorageAccount::new("myaccount", TEST_KEY).unwrap();
        let client = QueueServiceClient::new(account).unwrap();

        let queue = client.queue_client(QueueName::new("orders").unwrap());

        assert_eq!(
            queue.url().as_str(),
            "https://myaccount.queue.core.windows.net/orders"
        );
        assert_eq!(client.account_name(), "myaccount");
    }
}

mod list_queues_tests {
    use super::*;

    #[tokio::test]
    async fn test_list_segment_query() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .and(query_param("comp", "list"))
            .and(query_param("prefix", "demo"))
            .and(query_param("maxresults", "2"))
            .and(query_param("include", "metadata"))
            .and(query_param_is_missing("marker"))
            .respond_with(list_response(&["demo-a", "demo-b"], "marker-1"))
            .expect(1)
            .mount(&server)
            .await;

        let client = create_test_client(&server);
        let segment = client
            .list_queues_segment(Some("demo"), None, Some(2), true)
            .await
            .unwrap();

        assert_eq!(segment.queues.len(), 2);
        assert_eq!(segment.next_marker.as_deref(), Some("marker-1"));
    }

    /// Verify continuation markers are followed until the last page
    #[tokio::test]
    async fn test_list_follows_markers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("comp", "list"))
            .and(query_param_is_missing("marker"))
            .respond_with(list_response(&["demo-00", "demo-01"], "page-2"))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(query_param("comp", "list"))
            .and(query_param("marker", "page-2"))
            .respond_with(list_response(&["demo-02"], ""))
            .expect(1)
            .mount(&server)
            .await;

        let client = create_test_client(&server);
        let queues = client.list_queues(Some("demo"), false).await.unwrap();

        let names: Vec<_> = queues.iter().map(|q| q.name.as_str()).collect();
        assert_eq!(names, vec!["demo-00", "demo-01", "demo-02"]);
    }
}

mod service_properties_tests {
    use super::*;

    #[tokio::test]
    async fn test_get_properties() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("restype", "service"))
            .and(query_param("comp", "properties"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                "<StorageServiceProperties><Cors><CorsRule><AllowedOrigins>*</AllowedOrigins><AllowedMethods>GET</AllowedMethods><MaxAgeInSeconds>3600</MaxAgeInSeconds><ExposedHeaders>*</ExposedHeaders><AllowedHeaders>*</AllowedHeaders></CorsRule></Cors></StorageServiceProperties>",
            ))
            .expect(1)
            .mount(&server)
            .await;

        let client = create_test_client(&server);
        let properties = client.get_properties().await.unwrap();

        let cors = properties.cors.unwrap();
        assert_eq!(cors.len(), 1);
        assert_eq!(cors[0].allowed_methods, vec![CorsMethod::Get]);
    }

    #[tokio::test]
    async fn test_set_properties_sends_xml() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(query_param("restype", "service"))
            .and(query_param("comp", "properties"))
            .and(body_string_contains("<AllowedOrigins>*</AllowedOrigins>"))
            .respond_with(ResponseTemplate::new(202))
            .expect(1)
            .mount(&server)
            .await;

        let client = create_test_client(&server);
        let properties = ServiceProperties {
            cors: Some(vec![CorsRule {
                allowed_origins: vec!["*".to_string()],
                allowed_methods: vec![CorsMethod::Get],
                allowed_headers: vec!["*".to_string()],
                exposed_headers: vec!["*".to_string()],
                max_age_in_seconds: 3600,
            }]),
            ..Default::default()
        };

        client.set_properties(&properties).await.unwrap();
    }

    /// Verify invalid settings fail before any request is sent
    #[tokio::test]
    async fn test_set_properties_validates_first() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(202))
            .expect(0)
            .mount(&server)
            .await;

        let client = create_test_client(&server);
        let rule = CorsRule {
            allowed_origins: vec!["*".to_string()],
            allowed_methods: vec![CorsMethod::Get],
            allowed_headers: Vec::new(),
            exposed_headers: Vec::new(),
            max_age_in_seconds: 0,
        };
        let too_many = ServiceProperties {
            cors: Some(vec![rule; 6]),
            ..Default::default()
        };

        let result = client.set_properties(&too_many).await;

        assert!(matches!(result, Err(QueueStorageError::Validation(_))));
    }
}

mod statistics_tests {
    use super::*;

    #[tokio::test]
    async fn test_statistics_use_secondary_endpoint() {
        let primary = MockServer::start().await;
        let secondary = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("restype", "service"))
            .and(query_param("comp", "stats"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                "<StorageServiceStats><GeoReplication><Status>live</Status><LastSyncTime>Wed, 20 Jan 2021 22:28:43 GMT</LastSyncTime></GeoReplication></StorageServiceStats>",
            ))
            .expect(1)
            .mount(&secondary)
            .await;

        let account = StorageAccount::new("testaccount", TEST_KEY)
            .unwrap()
            .with_queue_endpoint(Url::parse(&primary.uri()).unwrap())
            .with_secondary_queue_endpoint(Some(Url::parse(&secondary.uri()).unwrap()));
        let client = QueueServiceClient::new(account).unwrap();

        let stats = client.get_statistics().await.unwrap();

        assert_eq!(stats.status, GeoReplicationStatus::Live);
        assert!(stats.last_sync_time.is_some());
        assert!(primary.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_statistics_without_secondary() {
        let server = MockServer::start().await;
        let client = create_test_client(&server);

        let result = client.get_statistics().await;

        assert!(matches!(result, Err(QueueStorageError::Configuration(_))));
    }
}
