use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, RwLock};
use uuid::Uuid;

/// Diagnostic events emitted while a submission moves through the pipeline.
///
/// Purely observational: nothing in the pipeline branches on whether an
/// event was delivered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    SubmissionReceived {
        trace_id: Uuid,
        input: String,
    },
    GenerationStarted {
        trace_id: Uuid,
        provider: String,
        model: String,
    },
    GenerationCompleted {
        trace_id: Uuid,
        provider: String,
        model: String,
        input: String,
        output: String,
        metadata: serde_json::Value,
    },
    GenerationFailed {
        trace_id: Uuid,
        provider: String,
        error: String,
    },
    ProfileExtracted {
        trace_id: Uuid,
        profile: serde_json::Value,
    },
    PredictionCompleted {
        trace_id: Uuid,
        seconds: f64,
    },
    SubmissionFailed {
        trace_id: Uuid,
        kind: String,
    },
}

/// Timestamped envelope put on the wire for subscribers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceRecord {
    pub at: DateTime<Utc>,
    pub event: Event,
}

/// Counters accumulated from events.
#[derive(Debug, Default, Clone)]
pub struct Metrics {
    pub submissions: usize,
    pub generations_completed: usize,
    pub generations_failed: usize,
    pub predictions_completed: usize,
    pub submissions_failed: usize,
}

/// Fire-and-forget observability sink.
///
/// Emission never fails from the caller's point of view: a full channel or
/// zero subscribers is invisible to the pipeline.
pub struct TraceSink {
    sender: broadcast::Sender<TraceRecord>,
    metrics: Arc<RwLock<Metrics>>,
}

impl TraceSink {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            metrics: Arc::new(RwLock::new(Metrics::default())),
        }
    }

    /// Fresh correlation id for one submission.
    pub fn new_trace_id(&self) -> Uuid {
        Uuid::new_v4()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TraceRecord> {
        self.sender.subscribe()
    }

    /// Emit an event to all subscribers. Delivery failure is swallowed.
    pub async fn emit(&self, event: Event) {
        self.update_metrics(&event).await;
        let record = TraceRecord {
            at: Utc::now(),
            event,
        };
        // No receivers is fine; diagnostics must never abort the pipeline.
        let _ = self.sender.send(record);
    }

    pub async fn get_metrics(&self) -> Metrics {
        self.metrics.read().await.clone()
    }

    async fn update_metrics(&self, event: &Event) {
        let mut metrics = self.metrics.write().await;
        match event {
            Event::SubmissionReceived { .. } => metrics.submissions += 1,
            Event::GenerationCompleted { .. } => metrics.generations_completed += 1,
            Event::GenerationFailed { .. } => metrics.generations_failed += 1,
            Event::PredictionCompleted { .. } => metrics.predictions_completed += 1,
            Event::SubmissionFailed { .. } => metrics.submissions_failed += 1,
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn events_reach_subscribers_with_timestamps() {
        let sink = TraceSink::new(16);
        let mut receiver = sink.subscribe();
        let trace_id = sink.new_trace_id();

        sink.emit(Event::SubmissionReceived {
            trace_id,
            input: "I am 29".to_string(),
        })
        .await;

        let record = receiver.recv().await.unwrap();
        match record.event {
            Event::SubmissionReceived { trace_id: id, .. } => assert_eq!(id, trace_id),
            other => panic!("wrong event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn emission_without_subscribers_is_silent() {
        let sink = TraceSink::new(16);
        sink.emit(Event::PredictionCompleted {
            trace_id: sink.new_trace_id(),
            seconds: 6900.0,
        })
        .await;
        // No panic, metrics still recorded.
        assert_eq!(sink.get_metrics().await.predictions_completed, 1);
    }

    #[tokio::test]
    async fn metrics_accumulate_across_events() {
        let sink = TraceSink::new(16);
        let trace_id = sink.new_trace_id();

        sink.emit(Event::SubmissionReceived {
            trace_id,
            input: String::new(),
        })
        .await;
        sink.emit(Event::GenerationFailed {
            trace_id,
            provider: "openai".to_string(),
            error: "timeout".to_string(),
        })
        .await;
        sink.emit(Event::SubmissionFailed {
            trace_id,
            kind: "generation".to_string(),
        })
        .await;

        let metrics = sink.get_metrics().await;
        assert_eq!(metrics.submissions, 1);
        assert_eq!(metrics.generations_failed, 1);
        assert_eq!(metrics.submissions_failed, 1);
        assert_eq!(metrics.predictions_completed, 0);
    }
}
