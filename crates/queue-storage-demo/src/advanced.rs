//! Advanced sample.
//!
//! Service-level settings and queue-level metadata and access policies.
//! Every sample that changes service properties restores the original
//! settings before returning, whether or not the change succeeded.

use crate::{step_failed, write_exception, Console, DemoError, QUEUE_NAME_PREFIX};
use chrono::{DateTime, Utc};
use queue_storage::{
    AccessPolicy, CorsMethod, CorsRule, Logging, Metadata, Metrics, MetricsLevel, QueueClient,
    QueueName, QueuePermissions, QueueServiceClient, QueueStorageError, RetentionPolicy,
    ServiceProperties, SignedIdentifier,
};
use std::error::Error as _;
use std::io::Write;
use tracing::{debug, info};

/// Queues created by the list sample
pub const LIST_SAMPLE_QUEUES: usize = 3;

/// Identifier of the stored access policy the ACL sample creates
pub const POLICY_ID: &str = "key1";

const ACCOUNT_HINT: &str = "Please make sure your storage account is specified correctly in the appsettings.json file - then restart the sample.";

/// Run every advanced sample in turn, stopping at the first failure
pub async fn run<W: Write>(
    service: &QueueServiceClient,
    out: &mut Console<W>,
) -> Result<(), DemoError> {
    writeln!(out, "Queue storage advanced sample")?;
    writeln!(out)?;
    writeln!(out, "Getting reference to the storage account.")?;
    writeln!(out, "Instantiating queue client.")?;
    writeln!(out)?;

    let result = run_samples(service, out).await;

    if let Err(e) = &result {
        write_failure(e, out)?;
    }

    result
}

/// Print a failure and the causes its message does not already show
fn write_failure<W: Write>(error: &DemoError, out: &mut W) -> Result<(), DemoError> {
    let headline = match error {
        DemoError::StepFailed { step, .. } => format!("Demo step '{}' failed", step),
        other => other.to_string(),
    };
    writeln!(out, "    Exception thrown. Message = {}", headline)?;

    let mut shown = headline;
    let mut source = error.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !shown.contains(&text) {
            writeln!(out, "    Caused by: {}", text)?;
        }
        shown = text;
        source = cause.source();
    }
    Ok(())
}

async fn run_samples<W: Write>(
    service: &QueueServiceClient,
    out: &mut Console<W>,
) -> Result<(), DemoError> {
    list_queues_sample(service, out).await?;
    service_properties_sample(service, out).await?;
    cors_rules_sample(service, out).await?;
    service_stats_sample(service, out).await?;
    queue_metadata_sample(service, out).await?;
    queue_acl_sample(service, out).await?;
    Ok(())
}

fn unique_queue_name() -> Result<QueueName, DemoError> {
    Ok(QueueName::unique(QUEUE_NAME_PREFIX).map_err(QueueStorageError::from)?)
}

/// Create a queue, printing the account hint when the service rejects it
async fn create_queue<W: Write>(
    service: &QueueServiceClient,
    name: QueueName,
    metadata: &Metadata,
    out: &mut Console<W>,
) -> Result<QueueClient, DemoError> {
    writeln!(out, "Creating queue with name {}", name)?;

    let queue = service.queue_client(name);
    match queue.create_if_not_exists(metadata).await {
        Ok(_) => {
            writeln!(out, "    Queue created successfully.")?;
            Ok(queue)
        }
        Err(e) => {
            write_exception(out, &e)?;
            writeln!(out, "{}", ACCOUNT_HINT)?;
            Err(step_failed("create queue")(e))
        }
    }
}

async fn delete_queue<W: Write>(
    queue: &QueueClient,
    out: &mut Console<W>,
) -> Result<(), DemoError> {
    writeln!(out, "Deleting queue with name {}", queue.name())?;
    queue
        .delete_if_exists()
        .await
        .map_err(step_failed("delete queue"))?;
    Ok(())
}

// ============================================================================
// Queue listing
// ============================================================================

async fn list_queues_sample<W: Write>(
    service: &QueueServiceClient,
    out: &mut Console<W>,
) -> Result<(), DemoError> {
    let base = unique_queue_name()?;
    let mut queues = Vec::with_capacity(LIST_SAMPLE_QUEUES);

    let created = async {
        for i in 0..LIST_SAMPLE_QUEUES {
            let name = base
                .with_suffix(&format!("-{:02}", i))
                .map_err(QueueStorageError::from)?;
            queues.push(create_queue(service, name, &Metadata::new(), out).await?);
        }

        writeln!(out)?;
        writeln!(out, "List of queues in the storage account:")?;
        let items = service
            .list_queues(Some(base.as_str()), false)
            .await
            .map_err(step_failed("list queues"))?;
        for item in &items {
            writeln!(out, "Cloud Queue name = {}", item.name)?;
        }
        out.model(&items)?;
        writeln!(out)?;
        Ok::<(), DemoError>(())
    }
    .await;

    for queue in &queues {
        delete_queue(queue, out).await?;
    }

    created
}

// ============================================================================
// Service properties
// ============================================================================

/// Logging and metrics settings applied by the properties sample
pub fn sample_service_properties() -> ServiceProperties {
    let metrics = Metrics {
        level: MetricsLevel::Service,
        retention_policy: RetentionPolicy::days(6),
        ..Metrics::default()
    };

    ServiceProperties {
        logging: Some(Logging {
            read: true,
            write: true,
            delete: false,
            retention_policy: RetentionPolicy::days(5),
            ..Logging::default()
        }),
        hour_metrics: Some(metrics.clone()),
        minute_metrics: Some(metrics),
        cors: None,
    }
}

/// CORS rule added by the CORS sample
pub fn sample_cors_rule() -> CorsRule {
    CorsRule {
        allowed_origins: vec!["*".to_string()],
        allowed_methods: vec![CorsMethod::Get],
        allowed_headers: vec!["*".to_string()],
        exposed_headers: vec!["*".to_string()],
        max_age_in_seconds: 3600,
    }
}

async fn service_properties_sample<W: Write>(
    service: &QueueServiceClient,
    out: &mut Console<W>,
) -> Result<(), DemoError> {
    writeln!(out, "Get service properties")?;
    let original = service
        .get_properties()
        .await
        .map_err(step_failed("get service properties"))?;
    out.model(&original)?;

    writeln!(out, "Set service properties")?;
    let result = service
        .set_properties(&sample_service_properties())
        .await
        .map_err(step_failed("set service properties"));

    let restored = restore_properties(service, &original, out).await;
    result.and(restored)
}

async fn cors_rules_sample<W: Write>(
    service: &QueueServiceClient,
    out: &mut Console<W>,
) -> Result<(), DemoError> {
    writeln!(out, "Get service properties")?;
    let original = service
        .get_properties()
        .await
        .map_err(step_failed("get service properties"))?;

    writeln!(out, "Add CORS rule")?;
    let mut modified = original.clone();
    modified
        .cors
        .get_or_insert_with(Vec::new)
        .push(sample_cors_rule());
    let result = service
        .set_properties(&modified)
        .await
        .map_err(step_failed("add CORS rule"));

    let restored = restore_properties(service, &original, out).await;
    result.and(restored)
}

async fn restore_properties<W: Write>(
    service: &QueueServiceClient,
    original: &ServiceProperties,
    out: &mut Console<W>,
) -> Result<(), DemoError> {
    writeln!(out, "Revert back to original service properties")?;
    // An absent CORS section would leave added rules in place
    let original = ServiceProperties {
        cors: Some(original.cors.clone().unwrap_or_default()),
        ..original.clone()
    };
    service
        .set_properties(&original)
        .await
        .map_err(step_failed("restore service properties"))?;
    writeln!(out)?;
    Ok(())
}

// ============================================================================
// Service statistics
// ============================================================================

/// Print replication statistics; accounts without read access to a
/// secondary location report an error that is only logged
async fn service_stats_sample<W: Write>(
    service: &QueueServiceClient,
    out: &mut Console<W>,
) -> Result<(), DemoError> {
    writeln!(out, "Service stats:")?;

    match service.get_statistics().await {
        Ok(stats) => {
            writeln!(
                out,
                "    Last sync time: {}",
                display_time(stats.last_sync_time)
            )?;
            writeln!(out, "    Status: {}", stats.status)?;
            out.model(&stats)?;
        }
        Err(e) => {
            debug!(error = %e, "Service stats unavailable for this account");
        }
    }

    writeln!(out)?;
    Ok(())
}

// ============================================================================
// Queue metadata
// ============================================================================

async fn queue_metadata_sample<W: Write>(
    service: &QueueServiceClient,
    out: &mut Console<W>,
) -> Result<(), DemoError> {
    writeln!(out, "Set queue metadata")?;
    let metadata: Metadata = [("key1", "value1"), ("key2", "value2")]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

    let queue = create_queue(service, unique_queue_name()?, &metadata, out).await?;

    let result = async {
        let properties = queue
            .get_properties()
            .await
            .map_err(step_failed("get queue metadata"))?;

        writeln!(out, "Get queue metadata:")?;
        for (key, value) in &properties.metadata {
            writeln!(out, "    {}: {}", key, value)?;
        }
        out.model(&properties)?;
        Ok::<(), DemoError>(())
    }
    .await;

    delete_queue(&queue, out).await?;
    writeln!(out)?;
    result
}

// ============================================================================
// Stored access policies
// ============================================================================

async fn queue_acl_sample<W: Write>(
    service: &QueueServiceClient,
    out: &mut Console<W>,
) -> Result<(), DemoError> {
    let queue = create_queue(service, unique_queue_name()?, &Metadata::new(), out).await?;

    let result = async {
        writeln!(out, "Set queue permissions")?;
        let start = Utc::now();
        let policy = AccessPolicy {
            start: Some(start),
            expiry: Some(start + chrono::Duration::minutes(10)),
            permissions: Some(QueuePermissions::update()),
        };
        queue
            .set_access_policy(&[SignedIdentifier::new(POLICY_ID, policy)])
            .await
            .map_err(step_failed("set queue permissions"))?;

        let identifiers = queue
            .get_access_policy()
            .await
            .map_err(step_failed("get queue permissions"))?;
        info!(count = identifiers.len(), "Read stored access policies");

        writeln!(out, "Get queue permissions:")?;
        for identifier in &identifiers {
            let policy = &identifier.access_policy;
            let permissions = policy
                .permissions
                .map(|p| p.labels().join(", "))
                .unwrap_or_else(|| "None".to_string());

            writeln!(out, "  {}:", identifier.id)?;
            writeln!(out, "    permissions: {}:", permissions)?;
            writeln!(out, "    start time: {}:", display_time(policy.start))?;
            writeln!(out, "    expiry time: {}:", display_time(policy.expiry))?;
        }
        out.model(&identifiers)?;
        Ok::<(), DemoError>(())
    }
    .await;

    delete_queue(&queue, out).await?;
    writeln!(out)?;
    result
}

fn display_time(time: Option<DateTime<Utc>>) -> String {
    time.map(|t| t.to_string())
        .unwrap_or_else(|| "(none)".to_string())
}

#[cfg(test)]
#[path = "advanced_tests.rs"]
mod tests;
