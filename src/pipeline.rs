use std::sync::Arc;

use log::info;
use uuid::Uuid;

use crate::error::EstimateError;
use crate::extractor::{Extractor, RunnerProfile};
use crate::hms::Hms;
use crate::llm::LLMManager;
use crate::predictor::{FeatureRecord, PointPredictor};
use crate::trace::{Event, TraceSink};

/// Result of one successful submission.
#[derive(Debug, Clone)]
pub struct Estimate {
    pub profile: RunnerProfile,
    pub features: FeatureRecord,
    pub seconds: f64,
    pub time: Hms,
}

/// Runs the full extract-validate-predict pipeline for one submission.
///
/// Everything is request-scoped: each call to [`Pipeline::estimate`] builds
/// its records fresh and nothing persists between submissions.
pub struct Pipeline {
    extractor: Extractor,
    llm: LLMManager,
    predictor: Box<dyn PointPredictor>,
    sink: Arc<TraceSink>,
    prompt_template: String,
}

impl Pipeline {
    pub fn new(llm: LLMManager, predictor: Box<dyn PointPredictor>, sink: Arc<TraceSink>) -> Self {
        Self {
            extractor: Extractor::new(),
            llm,
            predictor,
            sink,
            prompt_template: Self::default_extraction_prompt(),
        }
    }

    /// Run the pipeline on one free-text submission.
    ///
    /// Every failure is terminal for this submission and maps to exactly
    /// one [`EstimateError`] variant; no partial result escapes.
    pub async fn estimate(&self, input: &str) -> Result<Estimate, EstimateError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(EstimateError::EmptyInput);
        }

        let trace_id = self.sink.new_trace_id();
        self.sink
            .emit(Event::SubmissionReceived {
                trace_id,
                input: input.to_string(),
            })
            .await;

        let prompt = self.build_extraction_prompt(input);
        let output = match self.llm.complete(trace_id, input, &prompt).await {
            Ok(output) => output,
            Err(e) => return self.fail(trace_id, EstimateError::Generation(e)).await,
        };

        let profile = match self.extractor.extract(&output) {
            Ok(profile) => profile,
            Err(e) => return self.fail(trace_id, e).await,
        };
        self.sink
            .emit(Event::ProfileExtracted {
                trace_id,
                profile: serde_json::to_value(&profile).unwrap_or_default(),
            })
            .await;

        let features = match FeatureRecord::from_profile(&profile) {
            Some(features) => features,
            None => {
                let err = EstimateError::TimeFormat {
                    value: profile.five_km_time.clone(),
                };
                return self.fail(trace_id, err).await;
            }
        };

        let seconds = match self.predictor.predict(&features) {
            Ok(seconds) => seconds,
            Err(e) => return self.fail(trace_id, EstimateError::Prediction(e)).await,
        };
        self.sink
            .emit(Event::PredictionCompleted { trace_id, seconds })
            .await;

        info!(
            "estimated {} for {} year old {} at {:.0}s/km pace",
            Hms::from_seconds(seconds),
            profile.age,
            profile.sex,
            features.pace_seconds_per_km
        );

        Ok(Estimate {
            profile,
            features,
            seconds,
            time: Hms::from_seconds(seconds),
        })
    }

    async fn fail(&self, trace_id: Uuid, err: EstimateError) -> Result<Estimate, EstimateError> {
        self.sink
            .emit(Event::SubmissionFailed {
                trace_id,
                kind: err.kind().to_string(),
            })
            .await;
        Err(err)
    }

    fn build_extraction_prompt(&self, input: &str) -> String {
        format!("{}\n\nText:\n{}", self.prompt_template, input)
    }

    fn default_extraction_prompt() -> String {
        r#"Extract the runner's details from the text below: age (integer), sex ("male" or "female"), and five_km_time (format mm:ss, m:ss, or hh:mm:ss). Respond with a single JSON object and nothing else.

Example: {"age": 29, "sex": "male", "five_km_time": "25:30"}"#
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::Sex;
    use crate::llm::{LLMProvider, LocalProvider};
    use crate::predictor::LinearModel;
    use anyhow::anyhow;
    use async_trait::async_trait;

    /// Provider that always replies with the same canned text.
    struct CannedProvider(String);

    #[async_trait]
    impl LLMProvider for CannedProvider {
        fn name(&self) -> &str {
            "canned"
        }

        async fn complete(&self, _prompt: &str) -> anyhow::Result<String> {
            Ok(self.0.clone())
        }
    }

    /// Provider whose calls always fail.
    struct BrokenProvider;

    #[async_trait]
    impl LLMProvider for BrokenProvider {
        fn name(&self) -> &str {
            "broken"
        }

        async fn complete(&self, _prompt: &str) -> anyhow::Result<String> {
            Err(anyhow!("connection refused"))
        }
    }

    fn pipeline_with(provider: Box<dyn LLMProvider>) -> (Pipeline, Arc<TraceSink>) {
        let sink = Arc::new(TraceSink::new(64));
        let llm = LLMManager::new(provider, sink.clone());
        let pipeline = Pipeline::new(llm, Box::new(LinearModel::default()), sink.clone());
        (pipeline, sink)
    }

    #[tokio::test]
    async fn empty_input_is_rejected_before_any_call() {
        let (pipeline, sink) = pipeline_with(Box::new(BrokenProvider));
        assert!(matches!(
            pipeline.estimate("   \n").await,
            Err(EstimateError::EmptyInput)
        ));
        // Nothing was traced: the pipeline never started.
        assert_eq!(sink.get_metrics().await.submissions, 0);
    }

    #[tokio::test]
    async fn end_to_end_over_the_local_provider() {
        let (pipeline, sink) = pipeline_with(Box::new(LocalProvider));
        let estimate = pipeline
            .estimate("I am a 29 year old male and run 5km in 25:30")
            .await
            .unwrap();

        assert_eq!(estimate.profile.age, 29);
        assert_eq!(estimate.profile.sex, Sex::Male);
        assert_eq!(
            estimate.features,
            FeatureRecord {
                age: 29,
                sex_encoded: 1,
                pace_seconds_per_km: 306.0
            }
        );
        assert!(estimate.seconds > 0.0);
        assert_eq!(estimate.time, Hms::from_seconds(estimate.seconds));

        let metrics = sink.get_metrics().await;
        assert_eq!(metrics.submissions, 1);
        assert_eq!(metrics.predictions_completed, 1);
        assert_eq!(metrics.submissions_failed, 0);
    }

    #[tokio::test]
    async fn generation_failures_are_typed_and_traced() {
        let (pipeline, sink) = pipeline_with(Box::new(BrokenProvider));
        assert!(matches!(
            pipeline.estimate("I am 29").await,
            Err(EstimateError::Generation(_))
        ));
        let metrics = sink.get_metrics().await;
        assert_eq!(metrics.generations_failed, 1);
        assert_eq!(metrics.submissions_failed, 1);
    }

    #[tokio::test]
    async fn unparseable_reply_surfaces_the_raw_output() {
        let reply = "I'm sorry, I can't help with that.";
        let (pipeline, _) = pipeline_with(Box::new(CannedProvider(reply.to_string())));
        match pipeline.estimate("I am 29").await {
            Err(EstimateError::Extraction { raw }) => assert_eq!(raw, reply),
            other => panic!("expected extraction failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn invalid_fields_are_listed() {
        let reply = r#"{"age": "29", "sex": "unknown", "five_km_time": "25:30"}"#;
        let (pipeline, _) = pipeline_with(Box::new(CannedProvider(reply.to_string())));
        match pipeline.estimate("whatever").await {
            Err(EstimateError::Validation { fields }) => assert_eq!(fields, vec!["age", "sex"]),
            other => panic!("expected validation failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn bad_time_format_is_distinct_from_validation() {
        let reply = r#"{"age": 29, "sex": "male", "five_km_time": "25:30:10:5"}"#;
        let (pipeline, _) = pipeline_with(Box::new(CannedProvider(reply.to_string())));
        match pipeline.estimate("whatever").await {
            Err(EstimateError::TimeFormat { value }) => assert_eq!(value, "25:30:10:5"),
            other => panic!("expected time-format failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn predictor_failures_are_reported_generically() {
        let reply = r#"{"age": 29, "sex": "male", "five_km_time": "25:30"}"#;
        let sink = Arc::new(TraceSink::new(64));
        let llm = LLMManager::new(Box::new(CannedProvider(reply.to_string())), sink.clone());
        let rigged = LinearModel {
            intercept: f64::NAN,
            age: 0.0,
            sex_encoded: 0.0,
            pace_seconds_per_km: 0.0,
        };
        let pipeline = Pipeline::new(llm, Box::new(rigged), sink);
        assert!(matches!(
            pipeline.estimate("whatever").await,
            Err(EstimateError::Prediction(_))
        ));
    }
}
