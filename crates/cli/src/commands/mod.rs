pub mod config;
pub mod doctor;
pub mod invoke;
pub mod tools;

use serde::Serialize;

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome {
    command: String,
    status: String,
    error_class: Option<String>,
    message: String,
}

impl CommandResult {
    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message: message.into(),
        };
        Self { exit_code, output: serialize_payload(payload) }
    }
}

fn serialize_payload(payload: CommandOutcome) -> String {
    serde_json::to_string(&payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            escape_json_text(&error.to_string())
        )
    })
}

/// Escapes text for hand-written JSON fallbacks used when serde itself failed.
pub(crate) fn escape_json_text(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', "\\n")
}

#[cfg(test)]
mod tests {
    use serde_json::Value;

    use super::escape_json_text;

    #[test]
    fn escaped_text_stays_inside_a_json_string() {
        let text = "bad \"quote\" and \\ slash\nnext line";
        let document = format!("{{\"error\":\"{}\"}}", escape_json_text(text));

        let parsed: Value = serde_json::from_str(&document).expect("valid json");
        assert_eq!(parsed["error"], text);
    }
}
