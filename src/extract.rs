use anyhow::{Context, Result};
use regex::Regex;
use serde_json::Value;

#[derive(Debug)]
pub struct Extractor {
    number_re: Regex,
}

impl Extractor {
    pub fn new() -> Result<Self> {
        Ok(Self {
            number_re: Regex::new(r"\d+(?:\.\d+)?")
                .context("failed to compile number extraction pattern")?,
        })
    }

    pub fn first_number(&self, text: &str) -> Option<f64> {
        self.number_re
            .find(text)
            .and_then(|m| m.as_str().parse::<f64>().ok())
    }
}

pub fn regex_capture(re: &Regex, text: &str) -> Option<f64> {
    re.captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().trim().parse::<f64>().ok())
}

pub fn description_capture(re: &Regex, text: &str) -> Option<String> {
    re.captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
}

pub fn scene_graph_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }

        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + ch.len_utf8()]);
                }
            }
            _ => {}
        }
    }

    None
}

pub fn parse_scene_graph(text: &str) -> Option<Value> {
    let span = scene_graph_span(text)?;
    serde_json::from_str(span).ok()
}

/// The policy for turning a scene graph into a quality score is not yet
/// specified; `UnspecifiedScorer` is a placeholder that yields a fixed 0.0
/// for every parsed graph.
pub trait SceneGraphScorer {
    fn score(&self, graph: &Value) -> Option<f64>;
}

#[derive(Debug, Default)]
pub struct UnspecifiedScorer;

impl SceneGraphScorer for UnspecifiedScorer {
    fn score(&self, _graph: &Value) -> Option<f64> {
        Some(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_number_returns_leading_number_in_reading_order() {
        let extractor = Extractor::new().unwrap();
        assert_eq!(extractor.first_number("The score is 4 out of 5."), Some(4.0));
        assert_eq!(extractor.first_number("87.5 then 12"), Some(87.5));
        assert_eq!(extractor.first_number("I'd rate it 3.5/5"), Some(3.5));
    }

    #[test]
    fn first_number_fails_without_digits() {
        let extractor = Extractor::new().unwrap();
        assert_eq!(extractor.first_number("The image looks excellent."), None);
        assert_eq!(extractor.first_number(""), None);
    }

    #[test]
    fn first_number_is_deterministic() {
        let extractor = Extractor::new().unwrap();
        let text = "Score: 42 with some trailing 7";
        assert_eq!(extractor.first_number(text), extractor.first_number(text));
    }

    #[test]
    fn regex_capture_extracts_declared_group() {
        let re = Regex::new(r"Score:\s*(\d+)").unwrap();
        assert_eq!(regex_capture(&re, "Score: 87"), Some(87.0));
        assert_eq!(regex_capture(&re, "Description: fine. Score: 63"), Some(63.0));
    }

    #[test]
    fn regex_capture_fails_on_miss_instead_of_falling_back() {
        let re = Regex::new(r"Score:\s*(\d+)").unwrap();
        assert_eq!(regex_capture(&re, "I would give this a 4."), None);
    }

    #[test]
    fn description_capture_returns_text_segment() {
        let re = Regex::new(r"Description:\s*(.+?)\.\s*Score:").unwrap();
        let text = "Description: slightly noisy but sharp. Score: 71";
        assert_eq!(
            description_capture(&re, text),
            Some("slightly noisy but sharp".to_string())
        );
    }

    #[test]
    fn scene_graph_span_finds_first_balanced_object() {
        let text = "Scene Graph: {\"objects\": [{\"name\": \"dog\"}]} trailing";
        assert_eq!(
            scene_graph_span(text),
            Some("{\"objects\": [{\"name\": \"dog\"}]}")
        );
    }

    #[test]
    fn scene_graph_span_ignores_braces_inside_strings() {
        let text = "{\"note\": \"a } inside\", \"n\": 1} rest";
        assert_eq!(scene_graph_span(text), Some("{\"note\": \"a } inside\", \"n\": 1}"));
    }

    #[test]
    fn scene_graph_span_rejects_unbalanced_text() {
        assert_eq!(scene_graph_span("no json here"), None);
        assert_eq!(scene_graph_span("{\"open\": true"), None);
    }

    #[test]
    fn parse_scene_graph_returns_none_without_json() {
        assert!(parse_scene_graph("The quality is fair.").is_none());
        assert!(parse_scene_graph("{not valid json}").is_none());
    }

    #[test]
    fn unspecified_scorer_yields_the_fixed_placeholder_value() {
        let graph = parse_scene_graph("{\"objects\": []}").unwrap();
        assert_eq!(UnspecifiedScorer.score(&graph), Some(0.0));
    }
}
