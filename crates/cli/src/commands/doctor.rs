use querydesk_core::config::{AppConfig, EngineAccess, LoadOptions};
use querydesk_core::TemplateStore;
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
    let report = build_report(AppConfig::load(LoadOptions::default()).map_err(|error| error.to_string()));

    if json_output {
        return serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                super::escape_json_text(&error.to_string())
            )
        });
    }

    render_human(&report)
}

fn build_report(config: Result<AppConfig, String>) -> DoctorReport {
    let mut checks = Vec::new();

    match config {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.push(check_engine_access(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error,
            });
            checks.push(DoctorCheck {
                name: "query_engine_access",
                status: CheckStatus::Skipped,
                details: "skipped because configuration did not load".to_string(),
            });
        }
    }
    checks.push(check_tool_catalogue(&TemplateStore::builtin()));

    let all_pass = checks.iter().all(|check| check.status == CheckStatus::Pass);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_engine_access(config: &AppConfig) -> DoctorCheck {
    let endpoint = config.query.endpoint_url();
    match config.engine_access() {
        EngineAccess::Signed => DoctorCheck {
            name: "query_engine_access",
            status: CheckStatus::Pass,
            details: format!("requests to `{endpoint}` will be signed"),
        },
        EngineAccess::UnsignedOverride => DoctorCheck {
            name: "query_engine_access",
            status: CheckStatus::Pass,
            details: format!("unsigned requests to overridden endpoint `{endpoint}`"),
        },
        EngineAccess::Unconfigured => DoctorCheck {
            name: "query_engine_access",
            status: CheckStatus::Fail,
            details: "set aws.access_key_id and aws.secret_access_key (or AWS_ACCESS_KEY_ID / \
                      AWS_SECRET_ACCESS_KEY)"
                .to_string(),
        },
    }
}

/// Every placeholder needs a validation rule, or bound values reach the engine unchecked.
fn check_tool_catalogue(store: &TemplateStore) -> DoctorCheck {
    let unruled: Vec<String> = store
        .catalog()
        .flat_map(|template| {
            template
                .placeholders()
                .into_iter()
                .filter(|name| template.rule(name).is_none())
                .map(|name| format!("{}.{name}", template.tool_id))
                .collect::<Vec<_>>()
        })
        .collect();

    if unruled.is_empty() {
        DoctorCheck {
            name: "tool_catalogue",
            status: CheckStatus::Pass,
            details: format!("{} tools with validated parameters", store.len()),
        }
    } else {
        DoctorCheck {
            name: "tool_catalogue",
            status: CheckStatus::Fail,
            details: format!("placeholders without rules: {}", unruled.join(", ")),
        }
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = vec![report.summary.clone()];

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

#[cfg(test)]
mod tests {
    use querydesk_core::config::AppConfig;
    use querydesk_core::{ParameterKind, QueryTemplate, TemplateStore};

    use super::{build_report, check_tool_catalogue, render_human, CheckStatus};

    #[test]
    fn missing_credentials_without_override_fail_the_report() {
        let report = build_report(Ok(AppConfig::default()));

        assert_eq!(report.overall_status, CheckStatus::Fail);
        assert_eq!(report.checks[1].name, "query_engine_access");
        assert_eq!(report.checks[1].status, CheckStatus::Fail);
    }

    #[test]
    fn endpoint_override_passes_every_check() {
        let mut config = AppConfig::default();
        config.query.endpoint = Some("http://127.0.0.1:4566".to_string());

        let report = build_report(Ok(config));

        assert_eq!(report.overall_status, CheckStatus::Pass);
        assert!(render_human(&report).starts_with("doctor: all readiness checks passed"));
    }

    #[test]
    fn config_failure_skips_engine_check() {
        let report = build_report(Err("query.database is required".to_string()));

        assert_eq!(report.checks[0].status, CheckStatus::Fail);
        assert_eq!(report.checks[1].status, CheckStatus::Skipped);
    }

    #[test]
    fn placeholders_without_rules_are_reported() {
        let store = TemplateStore::new(vec![QueryTemplate::new("t", "", "SELECT {x}")
            .with_parameter(querydesk_core::ParameterRule::required(
                "y",
                "",
                ParameterKind::Identifier,
            ))]);

        let check = check_tool_catalogue(&store);

        assert_eq!(check.status, CheckStatus::Fail);
        assert_eq!(check.details, "placeholders without rules: t.x");
    }
}
