//! `wolfden validate`.

use std::path::Path;

use serde::Serialize;

use crate::cli::args::{OutputFormat, ValidateArgs};
use crate::config::{LoaderOptions, RulesLoader};
use crate::error::{ConfigError, Severity, ValidationIssue, WolfdenError};

#[derive(Debug, Serialize)]
struct FileReport {
    file: String,
    valid: bool,
    errors: Vec<Finding>,
    warnings: Vec<Finding>,
}

#[derive(Debug, Serialize)]
struct Finding {
    #[serde(skip_serializing_if = "Option::is_none")]
    path: Option<String>,
    message: String,
}

/// Validates every file, prints a report for each, then fails with the
/// first problem found.
///
/// # Errors
///
/// The first file's [`ConfigError`]; under `--strict` a file with warnings
/// fails too.
pub fn run(args: &ValidateArgs) -> Result<(), WolfdenError> {
    let loader = RulesLoader::new(LoaderOptions {
        merge_builtin: !args.standalone,
        ..LoaderOptions::default()
    });

    let mut reports = Vec::with_capacity(args.files.len());
    let mut first_failure = None;

    for path in &args.files {
        tracing::info!(file = %path.display(), "validating rules");
        let (report, failure) = check(&loader, path, args.strict);
        if first_failure.is_none() {
            first_failure = failure;
        }
        reports.push(report);
    }

    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&reports)?),
        OutputFormat::Human => {
            for report in &reports {
                print_human(report);
            }
        }
    }

    first_failure.map_or(Ok(()), |e| Err(e.into()))
}

fn check(loader: &RulesLoader, path: &Path, strict: bool) -> (FileReport, Option<ConfigError>) {
    let file = path.display().to_string();
    match loader.load(path) {
        Ok(loaded) => {
            let warnings: Vec<Finding> = loaded
                .warnings
                .iter()
                .map(|w| Finding {
                    path: w.location.clone(),
                    message: w.message.clone(),
                })
                .collect();
            let failure = (strict && !warnings.is_empty()).then(|| ConfigError::ValidationError {
                path: file.clone(),
                errors: loaded
                    .warnings
                    .into_iter()
                    .map(|w| ValidationIssue {
                        path: w.location.unwrap_or_default(),
                        message: w.message,
                        severity: Severity::Warning,
                    })
                    .collect(),
            });
            let report = FileReport {
                file,
                valid: failure.is_none(),
                errors: Vec::new(),
                warnings,
            };
            (report, failure)
        }
        Err(e) => {
            let errors = match &e {
                ConfigError::ValidationError { errors, .. } => errors
                    .iter()
                    .map(|issue| Finding {
                        path: Some(issue.path.clone()),
                        message: issue.message.clone(),
                    })
                    .collect(),
                other => vec![Finding {
                    path: None,
                    message: other.to_string(),
                }],
            };
            let report = FileReport {
                file,
                valid: false,
                errors,
                warnings: Vec::new(),
            };
            (report, Some(e))
        }
    }
}

fn print_human(report: &FileReport) {
    let status = if report.valid { "ok" } else { "FAILED" };
    println!("{}: {status}", report.file);
    for (label, findings) in [("error", &report.errors), ("warning", &report.warnings)] {
        for finding in findings {
            match &finding.path {
                Some(path) => println!("  {label}: {} at {path}", finding.message),
                None => println!("  {label}: {}", finding.message),
            }
        }
    }
}
