//! Lenient parsing of structured model output.
//!
//! Models wrap JSON in prose or code fences often enough that a strict
//! parse is useless. Every parser here returns a value together with an
//! [`AssessmentSource`] saying whether it came from the model or from
//! defaults; none of them fail.

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::OnceLock;

/// Confidence used when the self-assessment cannot be read.
pub const DEFAULT_CONFIDENCE: f32 = 0.7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssessmentSource {
    Parsed,
    Defaulted,
}

/// Model self-rating of an answer. Scores lie in [0, 1].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelfAssessment {
    pub completeness: f32,
    pub accuracy: f32,
    pub clarity: f32,
    pub overall: f32,
    pub needs_improvement: bool,
}

impl Default for SelfAssessment {
    fn default() -> Self {
        Self {
            completeness: DEFAULT_CONFIDENCE,
            accuracy: DEFAULT_CONFIDENCE,
            clarity: DEFAULT_CONFIDENCE,
            overall: DEFAULT_CONFIDENCE,
            needs_improvement: false,
        }
    }
}

/// Planning output of the analysis stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionAnalysis {
    /// 1 (trivial) to 5 (hard)
    pub complexity: u8,

    #[serde(rename = "type")]
    pub question_type: String,

    pub sources: Vec<String>,
}

impl Default for QuestionAnalysis {
    fn default() -> Self {
        Self {
            complexity: 3,
            question_type: "general".to_string(),
            sources: vec!["documents".to_string(), "web".to_string()],
        }
    }
}

fn fenced_json() -> Option<&'static Regex> {
    static FENCE: OnceLock<Option<Regex>> = OnceLock::new();
    FENCE
        .get_or_init(|| Regex::new(r"(?s)```(?:json|JSON)?\s*(\{.*?\})\s*```").ok())
        .as_ref()
}

/// Find a JSON object in model output: the whole text, a fenced block, or
/// the outermost `{...}` span.
pub fn extract_json_object(raw: &str) -> Option<Map<String, Value>> {
    let trimmed = raw.trim();

    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(trimmed) {
        return Some(map);
    }

    if let Some(captures) = fenced_json().and_then(|re| re.captures(trimmed)) {
        if let Some(body) = captures.get(1) {
            if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(body.as_str()) {
                return Some(map);
            }
        }
    }

    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end <= start {
        return None;
    }
    match serde_json::from_str::<Value>(&trimmed[start..=end]) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

fn score(map: &Map<String, Value>, key: &str) -> f32 {
    let value = map
        .get(key)
        .and_then(Value::as_f64)
        .map(|v| v as f32)
        .unwrap_or(DEFAULT_CONFIDENCE);
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Parse a self-assessment. Missing scores read as the default confidence;
/// a missing flag reads as `false`.
pub fn parse_self_assessment(raw: &str) -> (SelfAssessment, AssessmentSource) {
    let Some(map) = extract_json_object(raw) else {
        tracing::debug!("Self-assessment was not JSON, using defaults");
        return (SelfAssessment::default(), AssessmentSource::Defaulted);
    };

    let assessment = SelfAssessment {
        completeness: score(&map, "completeness"),
        accuracy: score(&map, "accuracy"),
        clarity: score(&map, "clarity"),
        overall: score(&map, "overall"),
        needs_improvement: map
            .get("needs_improvement")
            .and_then(Value::as_bool)
            .unwrap_or(false),
    };

    (assessment, AssessmentSource::Parsed)
}

/// Parse a question analysis, filling gaps from the default analysis.
pub fn parse_analysis(raw: &str) -> (QuestionAnalysis, AssessmentSource) {
    let Some(map) = extract_json_object(raw) else {
        tracing::debug!("Question analysis was not JSON, using defaults");
        return (QuestionAnalysis::default(), AssessmentSource::Defaulted);
    };

    let defaults = QuestionAnalysis::default();

    let complexity = map
        .get("complexity")
        .and_then(Value::as_f64)
        .map(|c| c.round().clamp(1.0, 5.0) as u8)
        .unwrap_or(defaults.complexity);

    let question_type = map
        .get("type")
        .and_then(Value::as_str)
        .filter(|t| !t.trim().is_empty())
        .map(str::to_string)
        .unwrap_or(defaults.question_type);

    let sources = map
        .get("sources")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect::<Vec<_>>()
        })
        .filter(|s| !s.is_empty())
        .unwrap_or(defaults.sources);

    (
        QuestionAnalysis {
            complexity,
            question_type,
            sources,
        },
        AssessmentSource::Parsed,
    )
}
