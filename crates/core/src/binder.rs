use std::collections::HashMap;

use serde_json::Value;

use crate::errors::BindError;
use crate::templates::{ParameterKind, QueryTemplate};

pub type Parameters = HashMap<String, String>;

const MAX_IDENTIFIER_LEN: usize = 64;

/// A template with every placeholder substituted, ready to submit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BoundQuery {
    pub tool_id: String,
    pub text: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Placeholder<'a> {
    start: usize,
    end: usize,
    name: &'a str,
}

/// Binds `parameters` into `template`.
///
/// Missing parameters are checked before any value is validated, so the error
/// for a call with several problems always names the first missing placeholder
/// in template order. Parameters the template does not reference are ignored.
pub fn bind(template: &QueryTemplate, parameters: &Parameters) -> Result<BoundQuery, BindError> {
    let placeholders = scan(&template.body);

    let mut values = Vec::with_capacity(placeholders.len());
    for placeholder in &placeholders {
        let supplied = parameters.get(placeholder.name).map(|value| value.trim());
        let default =
            template.rule(placeholder.name).and_then(|rule| rule.default.as_deref());
        match supplied.or(default) {
            Some(value) => values.push(value),
            None => return Err(BindError::MissingParameter(placeholder.name.to_string())),
        }
    }

    for (placeholder, value) in placeholders.iter().zip(&values) {
        if let Some(rule) = template.rule(placeholder.name) {
            validate(placeholder.name, rule.kind, value)?;
        }
    }

    let mut text = String::with_capacity(template.body.len());
    let mut cursor = 0;
    for (placeholder, value) in placeholders.iter().zip(&values) {
        text.push_str(&template.body[cursor..placeholder.start]);
        text.push_str(value);
        cursor = placeholder.end;
    }
    text.push_str(&template.body[cursor..]);

    Ok(BoundQuery { tool_id: template.tool_id.clone(), text })
}

/// Flattens a JSON argument object into string parameters.
///
/// Strings pass through unchanged, numbers and booleans use their JSON text,
/// nulls are dropped so defaults still apply. Anything that is not an object
/// yields no parameters.
pub fn parameters_from_json(arguments: &Value) -> Parameters {
    let Some(object) = arguments.as_object() else {
        return Parameters::new();
    };

    object
        .iter()
        .filter_map(|(name, value)| {
            let text = match value {
                Value::Null => return None,
                Value::String(text) => text.clone(),
                other => other.to_string(),
            };
            Some((name.clone(), text))
        })
        .collect()
}

/// Placeholder names in template order, repeats included.
pub(crate) fn placeholder_names(body: &str) -> Vec<&str> {
    scan(body).into_iter().map(|placeholder| placeholder.name).collect()
}

/// A placeholder is `{` + identifier + `}`; any other brace is literal text.
fn scan(body: &str) -> Vec<Placeholder<'_>> {
    let bytes = body.as_bytes();
    let mut found = Vec::new();
    let mut index = 0;

    while index < bytes.len() {
        if bytes[index] != b'{' {
            index += 1;
            continue;
        }

        let name_start = index + 1;
        let mut name_end = name_start;
        while name_end < bytes.len() && is_name_byte(bytes[name_end], name_end == name_start) {
            name_end += 1;
        }

        if name_end > name_start && bytes.get(name_end) == Some(&b'}') {
            found.push(Placeholder {
                start: index,
                end: name_end + 1,
                name: &body[name_start..name_end],
            });
            index = name_end + 1;
        } else {
            index += 1;
        }
    }

    found
}

fn is_name_byte(byte: u8, first: bool) -> bool {
    byte == b'_' || byte.is_ascii_alphabetic() || (!first && byte.is_ascii_digit())
}

fn validate(name: &str, kind: ParameterKind, value: &str) -> Result<(), BindError> {
    let invalid =
        |reason: String| BindError::InvalidParameter { name: name.to_string(), reason };

    match kind {
        ParameterKind::PositiveInteger { max } => {
            if value.is_empty() || !value.bytes().all(|byte| byte.is_ascii_digit()) {
                return Err(invalid(format!("expected a whole number, got `{value}`")));
            }
            match value.parse::<u64>() {
                Ok(parsed) if (1..=u64::from(max)).contains(&parsed) => Ok(()),
                _ => Err(invalid(format!("expected a number between 1 and {max}"))),
            }
        }
        ParameterKind::Identifier => {
            let well_formed = !value.is_empty()
                && value.len() <= MAX_IDENTIFIER_LEN
                && value
                    .bytes()
                    .all(|byte| byte.is_ascii_alphanumeric() || byte == b'_' || byte == b'-');
            if well_formed {
                Ok(())
            } else {
                Err(invalid(format!(
                    "expected 1-{MAX_IDENTIFIER_LEN} letters, digits, `_` or `-`"
                )))
            }
        }
    }
}
