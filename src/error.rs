use thiserror::Error;

/// Everything that can go wrong for a single submission.
///
/// Each variant is terminal: the pipeline reports exactly one of these per
/// failed submission and never shows partial results.
#[derive(Debug, Error)]
pub enum EstimateError {
    /// The user submitted blank or whitespace-only text.
    #[error("no input provided")]
    EmptyInput,

    /// The text-generation call itself failed (transport error, timeout,
    /// non-2xx status). There is no model output to show the user.
    #[error("text generation request failed")]
    Generation(#[source] anyhow::Error),

    /// The model replied, but no JSON object could be recovered from the
    /// reply. `raw` is surfaced to the user so they can see what came back.
    #[error("could not parse the model response as JSON")]
    Extraction { raw: String },

    /// JSON parsed, but one or more fields were missing or of the wrong
    /// shape. All offending field names are collected before reporting.
    #[error("missing or invalid fields: {}", fields.join(", "))]
    Validation { fields: Vec<&'static str> },

    /// `five_km_time` was present but not in mm:ss, m:ss, or hh:mm:ss form.
    #[error("unrecognized time format: {value:?}")]
    TimeFormat { value: String },

    /// The point predictor failed or returned an unusable value. Reported
    /// generically; internal detail stays in the log.
    #[error("prediction failed")]
    Prediction(#[source] anyhow::Error),
}

impl EstimateError {
    /// Short tag used in trace payloads and log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            EstimateError::EmptyInput => "empty_input",
            EstimateError::Generation(_) => "generation",
            EstimateError::Extraction { .. } => "extraction",
            EstimateError::Validation { .. } => "validation",
            EstimateError::TimeFormat { .. } => "time_format",
            EstimateError::Prediction(_) => "prediction",
        }
    }
}
