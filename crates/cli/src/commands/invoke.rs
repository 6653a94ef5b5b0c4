use anyhow::{bail, Result};
use querydesk_core::config::{AppConfig, LoadOptions};
use querydesk_core::{Parameters, ToolDispatcher};
use querydesk_server::build_dispatcher;

use super::{escape_json_text, CommandResult};

const EXIT_TOOL_ERROR: u8 = 1;
const EXIT_USAGE: u8 = 2;
const EXIT_CONFIG: u8 = 3;

/// Dispatches one tool against the configured engine and prints the envelope.
pub fn run(tool_id: &str, raw_parameters: &[String]) -> CommandResult {
    let parameters = match parse_parameters(raw_parameters) {
        Ok(parameters) => parameters,
        Err(error) => {
            return CommandResult::failure("invoke", "invalid_argument", error.to_string(), EXIT_USAGE)
        }
    };

    let dispatcher = match AppConfig::load(LoadOptions::default())
        .map_err(anyhow::Error::from)
        .and_then(|config| build_dispatcher(&config).map_err(anyhow::Error::from))
    {
        Ok(dispatcher) => dispatcher,
        Err(error) => {
            return CommandResult::failure(
                "invoke",
                "config_validation",
                error.to_string(),
                EXIT_CONFIG,
            )
        }
    };

    execute(&dispatcher, tool_id, &parameters)
}

pub fn execute(dispatcher: &ToolDispatcher, tool_id: &str, parameters: &Parameters) -> CommandResult {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                "invoke",
                "runtime",
                format!("failed to initialize async runtime: {error}"),
                EXIT_TOOL_ERROR,
            )
        }
    };

    let envelope = runtime.block_on(dispatcher.dispatch(tool_id, parameters));
    let exit_code = if envelope.is_success() { 0 } else { EXIT_TOOL_ERROR };
    let output = serde_json::to_string_pretty(&envelope.to_json()).unwrap_or_else(|error| {
        format!(
            "{{\"status\":\"error\",\"error\":\"{}\"}}",
            escape_json_text(&error.to_string())
        )
    });

    CommandResult { exit_code, output }
}

/// Parses repeated `key=value` arguments. Later keys win.
pub fn parse_parameters(raw: &[String]) -> Result<Parameters> {
    let mut parameters = Parameters::new();
    for pair in raw {
        let Some((key, value)) = pair.split_once('=') else {
            bail!("parameter `{pair}` must be written as key=value");
        };
        let key = key.trim();
        if key.is_empty() {
            bail!("parameter `{pair}` has an empty key");
        }
        parameters.insert(key.to_string(), value.to_string());
    }
    Ok(parameters)
}

#[cfg(test)]
mod tests {
    use super::parse_parameters;

    #[test]
    fn key_value_pairs_are_parsed() {
        let parsed = parse_parameters(&["months=6".to_string(), "limit= 5".to_string()])
            .expect("valid parameters");

        assert_eq!(parsed.get("months").map(String::as_str), Some("6"));
        assert_eq!(parsed.get("limit").map(String::as_str), Some(" 5"));
    }

    #[test]
    fn malformed_pairs_are_rejected() {
        assert!(parse_parameters(&["months".to_string()]).is_err());
        assert!(parse_parameters(&["=6".to_string()]).is_err());
    }
}
