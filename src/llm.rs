use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

use crate::trace::{Event, TraceSink};

/// Trait representing a text-generation provider.
///
/// The pipeline treats it as a black box: the reply may be well-formed
/// JSON, JSON wrapped in prose or code fences, or unusable text.
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Name of the provider.
    fn name(&self) -> &str;

    /// Model name of the provider.
    fn model_name(&self) -> &str {
        "unknown"
    }

    /// Send a prompt to the provider and return the free-text completion.
    async fn complete(&self, prompt: &str) -> Result<String>;
}

/// Offline provider used when no remote LLM is configured.
///
/// Scans the user text after the `Text:` marker with keyword heuristics and
/// fakes the JSON reply a real model would produce. Good enough for demos
/// and end-to-end tests; not a substitute for the real extraction quality.
pub struct LocalProvider;

impl LocalProvider {
    fn scan(text: &str) -> (Option<u32>, Option<&'static str>, Option<String>) {
        let lowered = text.to_lowercase();
        // "female" contains "male", so check it first.
        let sex = if lowered.contains("female") || lowered.contains("woman") {
            Some("female")
        } else if lowered.contains("male") || lowered.contains("man") {
            Some("male")
        } else {
            None
        };

        let mut age = None;
        let mut time = None;
        for token in text.split_whitespace() {
            let token = token.trim_matches(|c: char| !c.is_ascii_alphanumeric() && c != ':');
            if token.contains(':') {
                if time.is_none() {
                    time = Some(token.to_string());
                }
            } else if age.is_none() {
                if let Ok(n) = token.parse::<u32>() {
                    if (10..=100).contains(&n) {
                        age = Some(n);
                    }
                }
            }
        }
        (age, sex, time)
    }
}

#[async_trait]
impl LLMProvider for LocalProvider {
    fn name(&self) -> &str {
        "local"
    }

    fn model_name(&self) -> &str {
        "keyword-heuristic"
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        // Only look at the user text, not the instruction and its example.
        let text = prompt.rsplit("Text:").next().unwrap_or(prompt);
        let (age, sex, time) = Self::scan(text);

        let mut object = serde_json::Map::new();
        if let Some(age) = age {
            object.insert("age".to_string(), age.into());
        }
        if let Some(sex) = sex {
            object.insert("sex".to_string(), sex.into());
        }
        if let Some(time) = time {
            object.insert("five_km_time".to_string(), time.into());
        }
        Ok(serde_json::Value::Object(object).to_string())
    }
}

/// Wraps a provider and mirrors every call into the trace sink.
pub struct LLMManager {
    provider: Box<dyn LLMProvider>,
    sink: Arc<TraceSink>,
}

impl LLMManager {
    pub fn new(provider: Box<dyn LLMProvider>, sink: Arc<TraceSink>) -> Self {
        Self { provider, sink }
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Send a prompt, emitting started/completed/failed events around the
    /// call. `input` is the user's raw text, kept separate from the full
    /// prompt for the trace payload.
    pub async fn complete(&self, trace_id: Uuid, input: &str, prompt: &str) -> Result<String> {
        self.sink
            .emit(Event::GenerationStarted {
                trace_id,
                provider: self.provider.name().to_string(),
                model: self.provider.model_name().to_string(),
            })
            .await;

        let result = self.provider.complete(prompt).await;

        match &result {
            Ok(output) => {
                self.sink
                    .emit(Event::GenerationCompleted {
                        trace_id,
                        provider: self.provider.name().to_string(),
                        model: self.provider.model_name().to_string(),
                        input: input.to_string(),
                        output: output.clone(),
                        metadata: serde_json::json!({ "prompt_template": prompt }),
                    })
                    .await;
            }
            Err(e) => {
                self.sink
                    .emit(Event::GenerationFailed {
                        trace_id,
                        provider: self.provider.name().to_string(),
                        error: e.to_string(),
                    })
                    .await;
            }
        }

        result
    }
}
