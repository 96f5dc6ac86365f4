use std::fs;
use std::path::PathBuf;

use saleschat_core::config::{AppConfig, LlmProvider, LoadOptions};
use saleschat_core::transcripts::TranscriptStore;
use saleschat_db::connect_with_settings;
use serde::Serialize;

use crate::commands::CommandResult;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

pub fn run(json_output: bool) -> CommandResult {
    let report = build_report();
    let exit_code = if report.overall_status == CheckStatus::Pass { 0 } else { 6 };

    let output = if json_output {
        serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        })
    } else {
        render_human(&report)
    };

    CommandResult { exit_code, output }
}

fn build_report() -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.push(check_database_connectivity(&config));
            checks.push(check_transcript_store(&config));
            checks.push(check_provider_configuration(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            for name in ["database_connectivity", "transcript_store", "provider_configuration"] {
                checks.push(DoctorCheck {
                    name,
                    status: CheckStatus::Skipped,
                    details: "skipped because configuration did not load".to_string(),
                });
            }
        }
    }

    let all_pass = checks.iter().all(|check| check.status == CheckStatus::Pass);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_database_connectivity(config: &AppConfig) -> DoctorCheck {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return DoctorCheck {
                name: "database_connectivity",
                status: CheckStatus::Fail,
                details: format!("failed to initialize async runtime: {error}"),
            };
        }
    };

    let result = runtime.block_on(async {
        let pool = connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
        )
        .await
        .map_err(|error| format!("failed to connect to database: {error}"))?;

        pool.close().await;
        Ok::<(), String>(())
    });

    match result {
        Ok(()) => DoctorCheck {
            name: "database_connectivity",
            status: CheckStatus::Pass,
            details: format!("connected using `{}`", config.database.url),
        },
        Err(error) => {
            DoctorCheck { name: "database_connectivity", status: CheckStatus::Fail, details: error }
        }
    }
}

/// Strict-reads the transcript file and probes its directory with a throwaway
/// sibling file, so a corrupt store or read-only volume surfaces before the
/// server silently drops conversation writes.
fn check_transcript_store(config: &AppConfig) -> DoctorCheck {
    let store = TranscriptStore::new(config.transcripts.path.clone());

    let conversations = match store.read_map() {
        Ok(map) => map,
        Err(error) => {
            return DoctorCheck {
                name: "transcript_store",
                status: CheckStatus::Fail,
                details: error.to_string(),
            };
        }
    };

    let directory = match store.path().parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let probe = directory.join(".saleschat-doctor-probe");
    let writable = fs::create_dir_all(&directory)
        .and_then(|_| fs::write(&probe, b"probe"))
        .and_then(|_| fs::remove_file(&probe));

    match writable {
        Ok(()) => DoctorCheck {
            name: "transcript_store",
            status: CheckStatus::Pass,
            details: format!(
                "`{}` holds {} conversation(s) and its directory is writable",
                store.path().display(),
                conversations.len()
            ),
        },
        Err(error) => DoctorCheck {
            name: "transcript_store",
            status: CheckStatus::Fail,
            details: format!(
                "transcript directory `{}` is not writable: {error}",
                directory.display()
            ),
        },
    }
}

fn check_provider_configuration(config: &AppConfig) -> DoctorCheck {
    let details = match config.llm.provider {
        LlmProvider::Gemini => {
            format!("gemini ready with model `{}` and api key present", config.llm.gemini_model)
        }
        LlmProvider::Ollama => format!(
            "ollama ready at `{}` with model `{}`",
            config.llm.ollama_base_url, config.llm.ollama_model
        ),
    };

    DoctorCheck { name: "provider_configuration", status: CheckStatus::Pass, details }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
