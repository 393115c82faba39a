use serde::{Deserialize, Serialize};

// Inputs longer than this (without a trailing '?') read as observations
const OBSERVATION_MIN_CHARS: usize = 50;

/// Coarse intent of a piece of user text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputType {
    Question,
    Request,
    Observation,
    Unknown,
}

impl InputType {
    pub fn as_str(&self) -> &'static str {
        match self {
            InputType::Question => "question",
            InputType::Request => "request",
            InputType::Observation => "observation",
            InputType::Unknown => "unknown",
        }
    }

    pub fn system_prompt(&self) -> &'static str {
        match self {
            InputType::Question => {
                "You are a helpful risk assessment LLM. Answer questions clearly and concisely."
            }
            InputType::Request => {
                "You are a proactive risk assessment LLM. Take action-oriented steps to address the request."
            }
            InputType::Observation => {
                "You are a risk assessment LLM. Analyze the information and summarize any potential risks."
            }
            InputType::Unknown => "You are a helpful risk assessment LLM. Respond appropriately.",
        }
    }
}

/// Classifies `text` by simple surface rules, first match wins:
/// empty text is `Unknown`, a trailing `?` is a `Question`, more than 50
/// characters is an `Observation`, anything else is a `Request`.
///
/// Length is counted in Unicode scalar values (`chars()`), not bytes, so
/// "é" counts as one character towards the 50-character boundary.
pub fn detect_input_type(text: &str) -> InputType {
    match text.chars().last() {
        None => InputType::Unknown,
        Some('?') => InputType::Question,
        Some(_) if text.chars().count() > OBSERVATION_MIN_CHARS => InputType::Observation,
        Some(_) => InputType::Request,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_categories() {
        assert_eq!(detect_input_type(""), InputType::Unknown);
        assert_eq!(detect_input_type("Is this safe?"), InputType::Question);
        assert_eq!(detect_input_type("Check the crane"), InputType::Request);
    }

    #[test]
    fn test_fifty_character_boundary() {
        let fifty = "a".repeat(50);
        let fifty_one = "a".repeat(51);
        assert_eq!(detect_input_type(&fifty), InputType::Request);
        assert_eq!(detect_input_type(&fifty_one), InputType::Observation);
    }

    #[test]
    fn test_long_question_is_still_a_question() {
        let text = format!("{}?", "b".repeat(80));
        assert_eq!(detect_input_type(&text), InputType::Question);
    }

    #[test]
    fn test_length_counts_characters_not_bytes() {
        // 50 two-byte characters: 100 bytes but still a request
        let text = "é".repeat(50);
        assert_eq!(text.len(), 100);
        assert_eq!(detect_input_type(&text), InputType::Request);
    }

    #[test]
    fn test_every_category_has_a_prompt() {
        for kind in [
            InputType::Question,
            InputType::Request,
            InputType::Observation,
            InputType::Unknown,
        ] {
            assert!(kind.system_prompt().starts_with("You are a"));
        }
    }
}
