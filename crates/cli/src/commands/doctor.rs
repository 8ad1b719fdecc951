use greenroom_core::config::{AppConfig, LoadOptions};
use secrecy::ExposeSecret;
use serde::Serialize;

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

pub fn run(json_output: bool) -> String {
    let report = build_report();

    if json_output {
        return serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        });
    }

    render_human(&report)
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
            checks.push(check_telegram_token(&config));
            checks.push(check_store_settings(&config));
            checks.push(check_llm_key(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            for name in ["telegram_token_readiness", "store_readiness", "llm_key_readiness"] {
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

fn check_telegram_token(config: &AppConfig) -> DoctorCheck {
    let token = config.telegram.bot_token.expose_secret();
    let shaped = !token.is_empty() && token.contains(':');
    DoctorCheck {
        name: "telegram_token_readiness",
        status: if shaped { CheckStatus::Pass } else { CheckStatus::Fail },
        details: if shaped {
            "bot token is present and shaped like <id>:<secret>".to_string()
        } else {
            "expected a bot token shaped like <id>:<secret>".to_string()
        },
    }
}

fn check_store_settings(config: &AppConfig) -> DoctorCheck {
    let store = &config.store;
    let mut missing = Vec::new();
    if store.token.expose_secret().is_empty() {
        missing.push("token");
    }
    for (name, value) in [
        ("studios_db", &store.studios_db),
        ("bios_db", &store.bios_db),
        ("labelcopy_db", &store.labelcopy_db),
        ("contacts_db", &store.contacts_db),
    ] {
        if value.is_empty() {
            missing.push(name);
        }
    }

    if missing.is_empty() {
        DoctorCheck {
            name: "store_readiness",
            status: CheckStatus::Pass,
            details: "store token and all database ids are configured".to_string(),
        }
    } else {
        DoctorCheck {
            name: "store_readiness",
            status: CheckStatus::Fail,
            details: format!("missing store settings: {}", missing.join(", ")),
        }
    }
}

fn check_llm_key(config: &AppConfig) -> DoctorCheck {
    match &config.llm.api_key {
        Some(key) if !key.expose_secret().is_empty() => DoctorCheck {
            name: "llm_key_readiness",
            status: CheckStatus::Pass,
            details: format!("api key present, model `{}`", config.llm.model),
        },
        _ => DoctorCheck {
            name: "llm_key_readiness",
            status: CheckStatus::Fail,
            details: "llm api key is not configured".to_string(),
        },
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = vec![report.summary.clone()];
    for check in &report.checks {
        let status = match check.status {
            CheckStatus::Pass => "pass",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skipped",
        };
        lines.push(format!("  {} [{}] {}", check.name, status, check.details));
    }
    lines.join("\n")
}

fn escape_json(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_checks_make_the_overall_status_fail() {
        let report = DoctorReport {
            overall_status: CheckStatus::Fail,
            summary: "doctor: one or more readiness checks failed".to_string(),
            checks: vec![DoctorCheck {
                name: "telegram_token_readiness",
                status: CheckStatus::Fail,
                details: "expected a bot token shaped like <id>:<secret>".to_string(),
            }],
        };

        let rendered = render_human(&report);
        assert!(rendered.contains("telegram_token_readiness [fail]"));
    }
}
