//! `quill log` and `quill history` command implementations.
//!
//! Both read a JSON Lines audit log written by the file storage backend.

use anyhow::{Context, Result};
use std::path::Path;

use quill_audit::{AuditAction, AuditEntry, AuditFilter, AuditStorage, FileStorage};

/// Build a filter from command-line arguments.
pub fn build_filter(
    auditable_type: Option<String>,
    auditable_id: Option<String>,
    action: Option<&str>,
    user_id: Option<String>,
    limit: Option<usize>,
    newest_first: bool,
) -> Result<AuditFilter> {
    let action = action
        .map(|a| a.to_lowercase().parse::<AuditAction>())
        .transpose()
        .map_err(anyhow::Error::msg)?;

    Ok(AuditFilter {
        auditable_type,
        auditable_id,
        action,
        user_id,
        limit,
        newest_first,
        ..Default::default()
    })
}

fn open(file: &Path) -> Result<FileStorage> {
    if !file.exists() {
        anyhow::bail!("Audit log not found: {}", file.display());
    }
    FileStorage::open(file).with_context(|| format!("Failed to read {}", file.display()))
}

/// Render matching entries, one line each.
pub async fn log_lines(file: &Path, filter: AuditFilter, json: bool) -> Result<Vec<String>> {
    let storage = open(file)?;
    let entries = storage.query(filter).await?;

    entries
        .iter()
        .map(|entry| {
            if json {
                Ok(serde_json::to_string(entry)?)
            } else {
                Ok(entry.to_log_line())
            }
        })
        .collect()
}

/// Render the change history of one record, oldest first.
pub async fn history_lines(file: &Path, auditable_type: &str, auditable_id: &str) -> Result<Vec<String>> {
    let storage = open(file)?;
    let entries = storage
        .query(AuditFilter::for_record(auditable_type, auditable_id))
        .await?;

    let mut lines = Vec::new();
    for entry in &entries {
        lines.push(history_header(entry));
        let changes = entry
            .change_set()
            .with_context(|| format!("Entry {} has unreadable changes", entry.id))?;
        for (attribute, change) in changes.iter() {
            lines.push(format!("    {}: {} -> {}", attribute, change.old, change.new));
        }
    }
    Ok(lines)
}

fn history_header(entry: &AuditEntry) -> String {
    format!(
        "{} {} by {}",
        entry.created_at.format("%Y-%m-%d %H:%M:%S"),
        entry.action,
        entry.user_id.as_deref().unwrap_or("unknown"),
    )
}

/// `quill log`
pub async fn run_log(file: &Path, filter: AuditFilter, json: bool) -> Result<()> {
    let lines = log_lines(file, filter, json).await?;
    if lines.is_empty() {
        tracing::info!(path = %file.display(), "No matching audit entries");
    }
    for line in lines {
        println!("{}", line);
    }
    Ok(())
}

/// `quill history`
pub async fn run_history(file: &Path, auditable_type: &str, auditable_id: &str) -> Result<()> {
    let lines = history_lines(file, auditable_type, auditable_id).await?;
    if lines.is_empty() {
        println!("No history for {}#{}", auditable_type, auditable_id);
    }
    for line in lines {
        println!("{}", line);
    }
    Ok(())
}
