//! Tests for service properties and statistics.

use super::*;

const PROPERTIES_XML: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<StorageServiceProperties>
    <Logging>
        <Version>1.0</Version>
        <Delete>true</Delete>
        <Read>false</Read>
        <Write>true</Write>
        <RetentionPolicy>
            <Enabled>true</Enabled>
            <Days>7</Days>
        </RetentionPolicy>
    </Logging>
    <HourMetrics>
        <Version>1.0</Version>
        <Enabled>true</Enabled>
        <IncludeAPIs>false</IncludeAPIs>
        <RetentionPolicy>
            <Enabled>false</Enabled>
        </RetentionPolicy>
    </HourMetrics>
    <MinuteMetrics>
        <Version>1.0</Version>
        <Enabled>false</Enabled>
        <RetentionPolicy>
            <Enabled>false</Enabled>
        </RetentionPolicy>
    </MinuteMetrics>
    <Cors>
        <CorsRule>
            <AllowedOrigins>http://www.fabrikam.com,http://www.contoso.com</AllowedOrigins>
            <AllowedMethods>GET,PUT</AllowedMethods>
            <MaxAgeInSeconds>500</MaxAgeInSeconds>
            <ExposedHeaders>x-ms-meta-data*,x-ms-meta-customheader</ExposedHeaders>
            <AllowedHeaders>x-ms-meta-target*,x-ms-meta-customheader</AllowedHeaders>
        </CorsRule>
    </Cors>
</StorageServiceProperties>"#;

fn create_demo_rule() -> CorsRule {
    CorsRule {
        allowed_origins: vec!["*".to_string()],
        allowed_methods: vec![CorsMethod::Get],
        allowed_headers: vec!["*".to_string()],
        exposed_headers: vec!["*".to_string()],
        max_age_in_seconds: 3600,
    }
}

mod parsing_tests {
    use super::*;

    #[test]
    fn test_parse_full_properties() {
        let properties = ServiceProperties::from_xml(PROPERTIES_XML).unwrap();

        let logging = properties.logging.unwrap();
        assert!(logging.delete);
        assert!(!logging.read);
        assert!(logging.write);
        assert_eq!(logging.retention_policy, RetentionPolicy::days(7));

        let hour = properties.hour_metrics.unwrap();
        assert_eq!(hour.level, MetricsLevel::Service);
        assert!(!hour.retention_policy.enabled);

        let minute = properties.minute_metrics.unwrap();
        assert_eq!(minute.level, MetricsLevel::None);

        let cors = properties.cors.unwrap();
        assert_eq!(cors.len(), 1);
        assert_eq!(cors[0].allowed_origins.len(), 2);
        assert_eq!(
            cors[0].allowed_methods,
            vec![CorsMethod::Get, CorsMethod::Put]
        );
        assert_eq!(cors[0].max_age_in_seconds, 500);
    }

    /// Verify sections absent from the response stay `None`
    #[test]
    fn test_parse_partial_properties() {
        let xml = "<StorageServiceProperties><Cors /></StorageServiceProperties>";

        let properties = ServiceProperties::from_xml(xml).unwrap();

        assert!(properties.logging.is_none());
        assert!(properties.hour_metrics.is_none());
        assert_eq!(properties.cors, Some(Vec::new()));
    }

    #[test]
    fn test_unknown_cors_method_is_rejected() {
        let xml = "<StorageServiceProperties><Cors><CorsRule><AllowedOrigins>*</AllowedOrigins><AllowedMethods>FETCH</AllowedMethods></CorsRule></Cors></StorageServiceProperties>";
        assert!(ServiceProperties::from_xml(xml).is_err());
    }
}

mod serialization_tests {
    use super::*;

    /// Verify the demo's logging and metrics settings are written as the service expects
    #[test]
    fn test_logging_and_metrics_xml() {
        let properties = ServiceProperties {
            logging: Some(Logging {
                read: true,
                write: true,
                retention_policy: RetentionPolicy::days(5),
                ..Default::default()
            }),
            hour_metrics: Some(Metrics {
                level: MetricsLevel::Service,
                retention_policy: RetentionPolicy::days(6),
                ..Default::default()
            }),
            minute_metrics: Some(Metrics::default()),
            cors: None,
        };

        let xml = properties.to_xml();

        assert!(xml.contains(
            "<Logging><Version>1.0</Version><Delete>false</Delete><Read>true</Read><Write>true</Write><RetentionPolicy><Enabled>true</Enabled><Days>5</Days></RetentionPolicy></Logging>"
        ));
        assert!(xml.contains(
            "<HourMetrics><Version>1.0</Version><Enabled>true</Enabled><IncludeAPIs>false</IncludeAPIs><RetentionPolicy><Enabled>true</Enabled><Days>6</Days></RetentionPolicy></HourMetrics>"
        ));
        assert!(xml.contains(
            "<MinuteMetrics><Version>1.0</Version><Enabled>false</Enabled><RetentionPolicy><Enabled>false</Enabled></RetentionPolicy></MinuteMetrics>"
        ));
        assert!(!xml.contains("<Cors>"), "unset CORS must be omitted");
    }

    #[test]
    fn test_cors_xml() {
        let properties = ServiceProperties {
            cors: Some(vec![create_demo_rule()]),
            ..Default::default()
        };

        let xml = properties.to_xml();

        assert!(xml.contains(
            "<Cors><CorsRule><AllowedOrigins>*</AllowedOrigins><AllowedMethods>GET</AllowedMethods><MaxAgeInSeconds>3600</MaxAgeInSeconds><ExposedHeaders>*</ExposedHeaders><AllowedHeaders>*</AllowedHeaders></CorsRule></Cors>"
        ));
        assert!(!xml.contains("<Logging>"));
    }

    /// Verify what the service returns can be written back unchanged
    #[test]
    fn test_read_back_preserves_values() {
        let original = ServiceProperties::from_xml(PROPERTIES_XML).unwrap();
        let reparsed = ServiceProperties::from_xml(&original.to_xml()).unwrap();

        assert_eq!(original, reparsed);
    }
}

mod validation_tests {
    use super::*;

    #[test]
    fn test_too_many_cors_rules() {
        let properties = ServiceProperties {
            cors: Some(vec![create_demo_rule(); MAX_CORS_RULES + 1]),
            ..Default::default()
        };
        assert!(properties.validate().is_err());
    }

    #[test]
    fn test_retention_days_range() {
        let with_days = |days| ServiceProperties {
            logging: Some(Logging {
                retention_policy: RetentionPolicy::days(days),
                ..Default::default()
            }),
            ..Default::default()
        };

        assert!(with_days(1).validate().is_ok());
        assert!(with_days(365).validate().is_ok());
        assert!(with_days(0).validate().is_err());
        assert!(with_days(366).validate().is_err());
    }

    #[test]
    fn test_enabled_retention_requires_days() {
        let properties = ServiceProperties {
            hour_metrics: Some(Metrics {
                level: MetricsLevel::Service,
                retention_policy: RetentionPolicy {
                    enabled: true,
                    days: None,
                },
                ..Default::default()
            }),
            ..Default::default()
        };
        assert!(matches!(
            properties.validate(),
            Err(ValidationError::Required { .. })
        ));
    }

    #[test]
    fn test_cors_rule_requires_methods() {
        let mut rule = create_demo_rule();
        rule.allowed_methods.clear();
        let properties = ServiceProperties {
            cors: Some(vec![rule]),
            ..Default::default()
        };
        assert!(properties.validate().is_err());
    }
}

mod stats_tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_stats() {
        let xml = r#"<?xml version="1.0" encoding="utf-8"?>
            <StorageServiceStats>
                <GeoReplication>
                    <Status>live</Status>
                    <LastSyncTime>Wed, 20 Jan 2021 22:28:43 GMT</LastSyncTime>
                </GeoReplication>
            </StorageServiceStats>"#;

        let stats = ServiceStats::from_xml(xml).unwrap();

        assert_eq!(stats.status, GeoReplicationStatus::Live);
        assert_eq!(
            stats.last_sync_time,
            Some(Utc.with_ymd_and_hms(2021, 1, 20, 22, 28, 43).unwrap())
        );
    }

    #[test]
    fn test_parse_stats_without_sync_time() {
        let xml = "<StorageServiceStats><GeoReplication><Status>bootstrap</Status><LastSyncTime /></GeoReplication></StorageServiceStats>";

        let stats = ServiceStats::from_xml(xml).unwrap();

        assert_eq!(stats.status, GeoReplicationStatus::Bootstrap);
        assert!(stats.last_sync_time.is_none());
    }

    #[test]
    fn test_unknown_status_is_rejected() {
        let xml = "<StorageServiceStats><GeoReplication><Status>sideways</Status></GeoReplication></StorageServiceStats>";
        assert!(ServiceStats::from_xml(xml).is_err());
    }
}
