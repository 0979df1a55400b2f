//! Deterministic parsing of the menu classifier's reply.
//!
//! The classifier is asked to answer `[{"C": "<label>"}]` (or `[{"C": null}]`).
//! Anything that does not have that shape means "no match"; nothing in here
//! returns an error.

use std::sync::LazyLock;

use jsonschema::Validator;
use serde_json::Value;

const CLASSIFICATION_SCHEMA: &str = r#"{
  "type": "array",
  "minItems": 1,
  "maxItems": 1,
  "items": {
    "type": "object",
    "required": ["C"],
    "properties": {
      "C": { "type": ["string", "integer", "null"] }
    }
  }
}"#;

static VALIDATOR: LazyLock<Validator> = LazyLock::new(|| {
    let schema: Value = serde_json::from_str(CLASSIFICATION_SCHEMA).unwrap();
    jsonschema::validator_for(&schema).unwrap()
});

/// Resolve a classifier reply to a menu index.
pub fn classify_reply(raw: &str, choices: &[String]) -> Option<usize> {
    let label = parse_classification(raw)?;
    match_choice(&label, choices)
}

/// Extract the `C` label from a classifier reply.
///
/// Accepts strict JSON and the single-quoted / `None` dialect models tend to
/// echo back from the prompt. Returns `None` for `null` and for malformed
/// output.
pub fn parse_classification(raw: &str) -> Option<String> {
    let candidate = bracketed(raw)?;
    let value = serde_json::from_str::<Value>(candidate)
        .or_else(|_| serde_json::from_str::<Value>(&relax_quotes(candidate)))
        .ok()?;
    if !VALIDATOR.is_valid(&value) {
        return None;
    }
    match value.get(0)?.get("C")? {
        Value::String(label) => {
            let label = label.trim();
            (!label.is_empty()).then(|| label.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Match a label against numbered menu entries (`"1. Feedback"`).
///
/// Tries, in order: the full entry, the leading number, the title.
pub fn match_choice(label: &str, choices: &[String]) -> Option<usize> {
    let label = label.trim();
    if let Some(idx) = choices.iter().position(|c| c.eq_ignore_ascii_case(label)) {
        return Some(idx);
    }
    let digits: String = label.chars().take_while(char::is_ascii_digit).collect();
    if let Ok(number) = digits.parse::<usize>() {
        return (1..=choices.len()).contains(&number).then(|| number - 1);
    }
    choices
        .iter()
        .position(|c| menu_title(c).eq_ignore_ascii_case(label))
}

fn menu_title(entry: &str) -> &str {
    match entry.split_once(". ") {
        Some((number, title)) if number.chars().all(|c| c.is_ascii_digit()) => title.trim(),
        _ => entry.trim(),
    }
}

fn bracketed(raw: &str) -> Option<&str> {
    let start = raw.find('[')?;
    let end = raw.rfind(']')?;
    (start < end).then(|| &raw[start..=end])
}

fn relax_quotes(raw: &str) -> String {
    raw.replace('\'', "\"").replace("None", "null")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn menu() -> Vec<String> {
        vec!["1. Feedback".to_string(), "2. Evaluate".to_string()]
    }

    #[test]
    fn strict_json_label_matches_entry() {
        assert_eq!(classify_reply(r#"[{"C": "2. Evaluate"}]"#, &menu()), Some(1));
    }

    #[test]
    fn python_dialect_is_accepted() {
        assert_eq!(classify_reply("[{'C': '1. Feedback'}]", &menu()), Some(0));
        assert_eq!(classify_reply("[{'C': None}]", &menu()), None);
    }

    #[test]
    fn surrounding_prose_is_ignored() {
        let raw = "Output:\n```\n[{\"C\": \"Evaluate\"}]\n```";
        assert_eq!(classify_reply(raw, &menu()), Some(1));
    }

    #[test]
    fn numeric_labels_are_range_checked() {
        assert_eq!(classify_reply(r#"[{"C": 1}]"#, &menu()), Some(0));
        assert_eq!(classify_reply(r#"[{"C": "3"}]"#, &menu()), None);
        assert_eq!(classify_reply(r#"[{"C": 0}]"#, &menu()), None);
    }

    #[test]
    fn malformed_output_is_no_match() {
        for raw in [
            "",
            "I think you want feedback",
            "[{\"C\": \"1. Feedback\"}",
            "[]",
            "[{\"label\": \"1. Feedback\"}]",
            "[{\"C\": \"1. Feedback\"}, {\"C\": \"2. Evaluate\"}]",
            "{\"C\": \"1. Feedback\"}",
            "[{\"C\": [1]}]",
        ] {
            assert_eq!(classify_reply(raw, &menu()), None, "raw={raw:?}");
        }
    }

    #[test]
    fn unknown_label_is_no_match() {
        assert_eq!(classify_reply(r#"[{"C": "Deploy"}]"#, &menu()), None);
    }
}
