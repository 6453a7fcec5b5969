//! Getting started sample.
//!
//! Creates a uniquely named queue, walks through the basic message
//! operations and deletes the queue again.

use crate::{step_failed, Console, DemoError, QUEUE_NAME_PREFIX};
use chrono::Utc;
use queue_storage::{Metadata, QueueClient, QueueName, QueueServiceClient, QueueStorageError};
use std::io::Write;
use std::time::Duration;
use tracing::{info, warn};

/// Messages enqueued by the batch step
pub const BATCH_SIZE: u32 = 20;

/// Visibility granted to the batch consumer
pub const BATCH_VISIBILITY_TIMEOUT: Duration = Duration::from_secs(5 * 60);

const EMULATOR_HINT: &str = "If you are running with the default configuration please make sure you have started the storage emulator, then restart the sample.";

// Ticks (100 ns intervals) between 0001-01-01 and the Unix epoch
const UNIX_EPOCH_TICKS: i64 = 621_355_968_000_000_000;

/// Run the getting started sample
pub async fn run<W: Write>(
    service: &QueueServiceClient,
    out: &mut Console<W>,
) -> Result<(), DemoError> {
    writeln!(out, "Queue storage getting started sample")?;
    writeln!(out)?;

    let queue_name = QueueName::unique(QUEUE_NAME_PREFIX).map_err(QueueStorageError::from)?;
    info!(queue_name = %queue_name, "Starting getting started sample");

    let queue = create_queue(service, queue_name, out).await?;
    basic_queue_operations(&queue, out).await?;
    update_enqueued_message(&queue, out).await?;
    process_batch_of_messages(&queue, out).await?;
    delete_queue(&queue, out).await?;

    Ok(())
}

async fn create_queue<W: Write>(
    service: &QueueServiceClient,
    queue_name: QueueName,
    out: &mut Console<W>,
) -> Result<QueueClient, DemoError> {
    writeln!(out, "1. Create a queue for the demo")?;

    let queue = service.queue_client(queue_name);
    if let Err(e) = queue.create_if_not_exists(&Metadata::new()).await {
        crate::write_exception(out, &e)?;
        writeln!(out, "{}", EMULATOR_HINT)?;
        return Err(step_failed("create queue")(e));
    }

    Ok(queue)
}

async fn basic_queue_operations<W: Write>(
    queue: &QueueClient,
    out: &mut Console<W>,
) -> Result<(), DemoError> {
    writeln!(out, "2. Insert a single message into a queue")?;
    let sent = queue
        .send_message("Hello World!", None, None)
        .await
        .map_err(step_failed("insert message"))?;
    out.model(&sent)?;

    writeln!(out, "3. Peek at the next message")?;
    let peeked = queue
        .peek_message()
        .await
        .map_err(step_failed("peek message"))?;
    if let Some(message) = peeked {
        writeln!(out, "The peeked message is: {}", message.message_text)?;
        out.model(&message)?;
    }

    writeln!(out, "4. De-queue the next message")?;
    let received = queue
        .receive_message()
        .await
        .map_err(step_failed("receive message"))?;
    if let Some(message) = received {
        writeln!(
            out,
            "Processing & deleting message with content: {}",
            message.message_text
        )?;
        out.model(&message)?;
        queue
            .delete_message(&message.message_id, &message.pop_receipt)
            .await
            .map_err(step_failed("delete message"))?;
    }

    Ok(())
}

async fn update_enqueued_message<W: Write>(
    queue: &QueueClient,
    out: &mut Console<W>,
) -> Result<(), DemoError> {
    writeln!(out, "5. Insert another test message")?;
    queue
        .send_message("Hello World Again!", None, None)
        .await
        .map_err(step_failed("insert message"))?;

    writeln!(out, "6. Change the contents of a queued message")?;
    let received = queue
        .receive_message()
        .await
        .map_err(step_failed("receive message"))?;

    match received {
        Some(message) => {
            let text = format!("Updated contents {}.", current_ticks());
            let updated = queue
                .update_message(
                    &message.message_id,
                    &message.pop_receipt,
                    Duration::ZERO,
                    Some(&text),
                )
                .await
                .map_err(step_failed("update message"))?;
            out.model(&updated)?;
        }
        None => warn!(queue_name = %queue.name(), "No message available to update"),
    }

    Ok(())
}

async fn process_batch_of_messages<W: Write>(
    queue: &QueueClient,
    out: &mut Console<W>,
) -> Result<(), DemoError> {
    writeln!(out, "7. Enqueue {} messages.", BATCH_SIZE)?;
    for i in 0..BATCH_SIZE {
        queue
            .send_message(&format!("{} - Hello World", i), None, None)
            .await
            .map_err(step_failed("enqueue batch"))?;
    }

    writeln!(out, "8. Get the queue length")?;
    let properties = queue
        .get_properties()
        .await
        .map_err(step_failed("get queue properties"))?;
    writeln!(
        out,
        "Number of messages in queue: {}",
        properties.approximate_message_count
    )?;
    out.model(&properties)?;

    writeln!(
        out,
        "9. Dequeue {} messages, allowing 5 minutes for the clients to process.",
        BATCH_SIZE + 1
    )?;
    let messages = queue
        .receive_messages(BATCH_SIZE + 1, Some(BATCH_VISIBILITY_TIMEOUT))
        .await
        .map_err(step_failed("receive batch"))?;
    for message in messages {
        writeln!(
            out,
            "Processing & deleting message with content: {}",
            message.message_text
        )?;
        out.model(&message)?;
        queue
            .delete_message(&message.message_id, &message.pop_receipt)
            .await
            .map_err(step_failed("delete message"))?;
    }

    Ok(())
}

async fn delete_queue<W: Write>(
    queue: &QueueClient,
    out: &mut Console<W>,
) -> Result<(), DemoError> {
    writeln!(out, "10. Delete the queue")?;
    queue
        .delete_if_exists()
        .await
        .map_err(step_failed("delete queue"))?;
    Ok(())
}

fn current_ticks() -> i64 {
    let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default();
    nanos / 100 + UNIX_EPOCH_TICKS
}

#[cfg(test)]
#[path = "getting_started_tests.rs"]
mod tests;
