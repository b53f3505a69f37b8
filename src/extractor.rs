use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::EstimateError;

/// Runner's sex as the model is asked to report it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sex {
    Male,
    Female,
}

impl fmt::Display for Sex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sex::Male => write!(f, "male"),
            Sex::Female => write!(f, "female"),
        }
    }
}

/// The validated record recovered from a model reply.
///
/// Either all three fields passed validation or the whole reply was
/// rejected; nothing downstream ever sees a partial profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunnerProfile {
    pub age: i64,
    pub sex: Sex,
    pub five_km_time: String,
}

/// Turns raw model output into a validated [`RunnerProfile`].
pub struct Extractor;

impl Extractor {
    pub fn new() -> Self {
        Self
    }

    /// Recover and validate a profile from free-text model output.
    ///
    /// Two-stage recovery: strip code fences and try the whole text as a
    /// JSON object, then fall back to the outermost brace-delimited span.
    /// Validation checks all three fields before reporting so the user sees
    /// every offending field at once.
    pub fn extract(&self, raw: &str) -> Result<RunnerProfile, EstimateError> {
        let cleaned = strip_code_fences(raw);
        let value = match recover_json(&cleaned) {
            Some(value) => value,
            None => {
                return Err(EstimateError::Extraction {
                    raw: raw.to_string(),
                })
            }
        };
        validate(&value)
    }
}

impl Default for Extractor {
    fn default() -> Self {
        Self::new()
    }
}

/// Remove markdown code-fence markers (```` ``` ```` and ```` ```json ````,
/// any case) anywhere in the text and trim the result.
fn strip_code_fences(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(pos) = rest.find("```") {
        out.push_str(&rest[..pos]);
        rest = &rest[pos + 3..];
        if rest
            .get(..4)
            .is_some_and(|tag| tag.eq_ignore_ascii_case("json"))
        {
            rest = &rest[4..];
        }
    }
    out.push_str(rest);
    out.trim().to_string()
}

/// Strict parse first, then the span from the first `{` to the last `}`.
/// Anything beyond that is not attempted.
fn recover_json(cleaned: &str) -> Option<Value> {
    if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(cleaned) {
        return Some(value);
    }
    let start = cleaned.find('{')?;
    let end = cleaned.rfind('}')?;
    if start >= end {
        return None;
    }
    match serde_json::from_str::<Value>(&cleaned[start..=end]) {
        Ok(value @ Value::Object(_)) => Some(value),
        _ => None,
    }
}

/// Check all three fields, collecting every failure rather than
/// short-circuiting on the first.
///
/// `age` must be a JSON integer: a float or a numeric string is rejected,
/// not coerced. `sex` must match one of the two accepted values exactly.
fn validate(value: &Value) -> Result<RunnerProfile, EstimateError> {
    let mut invalid: Vec<&'static str> = Vec::new();

    let age = value.get("age").and_then(Value::as_i64);
    if age.is_none() {
        invalid.push("age");
    }

    let sex = match value.get("sex").and_then(Value::as_str) {
        Some("male") => Some(Sex::Male),
        Some("female") => Some(Sex::Female),
        _ => None,
    };
    if sex.is_none() {
        invalid.push("sex");
    }

    let five_km_time = value
        .get("five_km_time")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty());
    if five_km_time.is_none() {
        invalid.push("five_km_time");
    }

    if !invalid.is_empty() {
        return Err(EstimateError::Validation { fields: invalid });
    }

    Ok(RunnerProfile {
        age: age.unwrap(),
        sex: sex.unwrap(),
        five_km_time: five_km_time.unwrap().to_string(),
    })
}
