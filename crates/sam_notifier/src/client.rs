use anyhow::{Context, Result};
use sam_tracker::{DbusQueueClient, QueueClient, QueueSnapshot, SessionConfig, TaskRecord};

/// Fetch the queue once and print it to stdout.
pub async fn print_queue(config: &SessionConfig, json: bool) -> Result<()> {
    let service = config.service_proxy().await.context("Failed to connect to the queue service")?;
    let snapshot = DbusQueueClient::new(service, config.fetch_timeout).fetch_current().await?;
    let records = decode_all(&snapshot);

    if json {
        println!("{}", serde_json::to_string_pretty(&records)?);
    } else if records.is_empty() {
        println!("The queue is empty.");
    } else {
        for (index, record) in records.iter().enumerate() {
            println!("{}", format_record(index + 1, record));
        }
    }
    Ok(())
}

/// Decode all entries, skipping (and logging) the ones that can't be decoded.
fn decode_all(snapshot: &QueueSnapshot) -> Vec<TaskRecord> {
    snapshot
        .records()
        .filter_map(|record| match record {
            Ok(record) => Some(record),
            Err(err) => {
                log::warn!("{}", err);
                None
            }
        })
        .collect()
}

fn format_record(position: usize, record: &TaskRecord) -> String {
    let description = match record.status_line() {
        line if line.is_empty() => format!("{} {}", record.task_kind, record.app_name),
        line => line,
    };
    let mut out = format!("{}. {} [{}:{}]", position, description, record.manager_id, record.package_id);
    if record.background {
        out.push_str(" (background)");
    }
    if let Some(error) = &record.error {
        out.push_str(&format!(" error: {}", error));
    }
    out
}
