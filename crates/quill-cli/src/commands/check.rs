//! `quill check` command implementation.
//!
//! Loads a configuration file and reports settings that are invalid or
//! likely unintended.

use anyhow::{Context, Result};
use std::collections::BTreeSet;
use std::path::Path;

use quill_audit::model::{
    DEFAULT_INHERITANCE_COLUMN, DEFAULT_LOCKING_COLUMN, DEFAULT_PRIMARY_KEY, TIMESTAMP_COLUMNS,
};
use quill_core::config::auditable::DEFAULT_USER_CLASS;
use quill_core::{QuillConfig, StorageBackend};

/// Key columns excluded unless a model definition renames them.
const DEFAULT_KEY_COLUMNS: [&str; 3] = [
    DEFAULT_PRIMARY_KEY,
    DEFAULT_INHERITANCE_COLUMN,
    DEFAULT_LOCKING_COLUMN,
];

/// Severity level for check results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Informational message.
    Info,
    /// Warning - may indicate a potential issue.
    Warning,
    /// Error - configuration is invalid.
    Error,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Info => write!(f, "INFO"),
            Severity::Warning => write!(f, "WARN"),
            Severity::Error => write!(f, "ERROR"),
        }
    }
}

/// A single check finding.
#[derive(Debug, Clone)]
pub struct CheckFinding {
    pub severity: Severity,
    /// Category of the check that produced this finding.
    pub category: String,
    pub message: String,
    /// Location within the file (e.g., "models.posts.exclude_columns").
    pub location: Option<String>,
}

impl CheckFinding {
    fn new(severity: Severity, category: &str, message: impl Into<String>) -> Self {
        Self {
            severity,
            category: category.to_string(),
            message: message.into(),
            location: None,
        }
    }

    fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }
}

/// Results from running all checks.
#[derive(Debug, Default)]
pub struct CheckResults {
    pub findings: Vec<CheckFinding>,
}

impl CheckResults {
    fn push(&mut self, finding: CheckFinding) {
        self.findings.push(finding);
    }

    /// Returns true if there are any errors.
    pub fn has_errors(&self) -> bool {
        self.count(Severity::Error) > 0
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.findings
            .iter()
            .filter(|f| f.severity == severity)
            .count()
    }

    /// Print human-readable summary, most severe first.
    pub fn print_summary(&self) {
        let mut findings: Vec<_> = self.findings.iter().collect();
        findings.sort_by(|a, b| {
            b.severity
                .cmp(&a.severity)
                .then_with(|| a.category.cmp(&b.category))
        });

        for finding in findings {
            let location = finding
                .location
                .as_deref()
                .map(|l| format!(" [{}]", l))
                .unwrap_or_default();
            println!(
                "  {:<5} [{}]{}: {}",
                finding.severity, finding.category, location, finding.message
            );
        }

        println!("{}", "=".repeat(60));
        let errors = self.count(Severity::Error);
        let warnings = self.count(Severity::Warning);
        if errors == 0 && warnings == 0 {
            println!("All checks passed.");
        } else {
            println!("Summary: {} error(s), {} warning(s)", errors, warnings);
        }
    }
}

/// Run all checks against a loaded configuration.
pub fn check_config(config: &QuillConfig) -> CheckResults {
    let mut results = CheckResults::default();
    check_storage(config, &mut results);
    check_models(config, &mut results);
    results
}

fn check_storage(config: &QuillConfig, results: &mut CheckResults) {
    let audit = &config.audit;
    if !audit.enabled {
        results.push(
            CheckFinding::new(Severity::Warning, "storage", "Audit logging is disabled")
                .with_location("audit.enabled"),
        );
    }

    match audit.storage.backend {
        StorageBackend::File if audit.storage.file_path.is_none() => results.push(
            CheckFinding::new(
                Severity::Warning,
                "storage",
                "No file_path set; entries go to ./audit.log",
            )
            .with_location("audit.storage.file_path"),
        ),
        StorageBackend::Memory => results.push(
            CheckFinding::new(
                Severity::Warning,
                "storage",
                "Memory backend keeps entries only for the life of the process",
            )
            .with_location("audit.storage.backend"),
        ),
        StorageBackend::Null if audit.enabled => results.push(
            CheckFinding::new(
                Severity::Warning,
                "storage",
                "Null backend discards every entry",
            )
            .with_location("audit.storage.backend"),
        ),
        StorageBackend::Database => results.push(
            CheckFinding::new(
                Severity::Info,
                "storage",
                format!("Entries are stored in table '{}'", audit.storage.table),
            )
            .with_location("audit.storage.table"),
        ),
        _ => {}
    }
}

/// Why an explicitly excluded column would be excluded anyway, if it would.
fn default_exclusion_note(column: &str) -> Option<&'static str> {
    if TIMESTAMP_COLUMNS.contains(&column) {
        Some("is always excluded")
    } else if DEFAULT_KEY_COLUMNS.contains(&column) {
        Some("is excluded by default unless the model renames its key columns")
    } else {
        None
    }
}

fn check_models(config: &QuillConfig, results: &mut CheckResults) {
    if config.models.is_empty() {
        results.push(CheckFinding::new(
            Severity::Info,
            "models",
            "No models configured; every model uses the default options",
        ));
    }

    for (name, options) in &config.models {
        let location = format!("models.{}", name);

        let mut seen = BTreeSet::new();
        for column in options.exclude_columns.as_slice() {
            if !seen.insert(column.as_str()) {
                results.push(
                    CheckFinding::new(
                        Severity::Warning,
                        "models",
                        format!("Column '{}' is excluded more than once", column),
                    )
                    .with_location(format!("{}.exclude_columns", location)),
                );
            } else if let Some(note) = default_exclusion_note(column) {
                results.push(
                    CheckFinding::new(
                        Severity::Info,
                        "models",
                        format!("Column '{}' {}", column, note),
                    )
                    .with_location(format!("{}.exclude_columns", location)),
                );
            }
        }

        match options.user_class_name.name() {
            None => results.push(
                CheckFinding::new(
                    Severity::Info,
                    "actors",
                    "User resolution disabled; entries carry no user_id",
                )
                .with_location(format!("{}.user_class_name", location)),
            ),
            Some(class) if class != DEFAULT_USER_CLASS => results.push(
                CheckFinding::new(
                    Severity::Info,
                    "actors",
                    format!(
                        "Actor source '{}.{}' must be registered by the application",
                        class, options.user_method
                    ),
                )
                .with_location(format!("{}.user_class_name", location)),
            ),
            Some(_) => {}
        }
    }
}

/// `quill check <config>`
pub fn run(config_path: &Path) -> Result<()> {
    let config = QuillConfig::from_file(config_path)
        .with_context(|| format!("Failed to load {}", config_path.display()))?;

    tracing::info!(
        path = %config_path.display(),
        models = config.models.len(),
        "Checking configuration"
    );

    let results = check_config(&config);
    results.print_summary();

    if results.has_errors() {
        anyhow::bail!("configuration check failed");
    }
    Ok(())
}
