use querydesk_core::TemplateStore;
use serde_json::json;

use super::CommandResult;

/// Prints the tool catalogue in the shape gateway target registration consumes.
pub fn run() -> CommandResult {
    let store = TemplateStore::builtin();
    let payload = json!({ "tools": store.tool_schemas() });

    match serde_json::to_string_pretty(&payload) {
        Ok(output) => CommandResult { exit_code: 0, output },
        Err(error) => CommandResult::failure("tools", "serialization", error.to_string(), 1),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::Value;

    use super::run;

    #[test]
    fn catalogue_lists_required_parameters() {
        let result = run();
        assert_eq!(result.exit_code, 0);

        let payload: Value = serde_json::from_str(&result.output).expect("json catalogue");
        let performance = payload["tools"]
            .as_array()
            .expect("tools array")
            .iter()
            .find(|tool| tool["name"] == "get_product_performance")
            .expect("product performance tool");

        assert_eq!(performance["inputSchema"]["required"], serde_json::json!(["months"]));
        assert!(performance["inputSchema"]["properties"]["limit"]["description"]
            .as_str()
            .unwrap_or_default()
            .contains("(default: 20)"));
    }
}
