/// Concurrent intent-signal aggregation
///
/// Every provider is queried for the same company domain at once. The fan-in
/// waits for all of them; a failed provider only loses its own signals.
use crate::config::PipelineSettings;
use crate::errors::AppError;
use crate::isolation::{guarded, SourceFailure};
use crate::models::{BuyingStage, IntentResult, IntentSignal, Lead};
use async_trait::async_trait;
use chrono::Duration as ChronoDuration;
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Signals observed within this window of the newest signal drive the buying stage.
const RECENCY_WINDOW_DAYS: i64 = 14;
const DECISION_STRENGTH: f64 = 80.0;
const CONSIDERATION_STRENGTH: f64 = 50.0;

#[async_trait]
pub trait IntentProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn fetch(&self, domain: &str) -> Result<Vec<IntentSignal>, AppError>;
}

#[derive(Debug, Clone, Default)]
pub struct IntentOutcome {
    pub result: IntentResult,
    pub failures: Vec<SourceFailure>,
}

pub struct IntentAggregator {
    providers: Vec<Arc<dyn IntentProvider>>,
    timeout: Duration,
    topic_limit: usize,
}

impl IntentAggregator {
    pub fn new(providers: Vec<Arc<dyn IntentProvider>>, settings: &PipelineSettings) -> Self {
        Self {
            providers,
            timeout: settings.provider_timeout(),
            topic_limit: settings.priority_topic_limit,
        }
    }

    pub async fn analyze(&self, lead: &Lead) -> IntentOutcome {
        let Some(domain) = lead.company_domain() else {
            tracing::info!("No company domain on lead, skipping intent providers");
            return IntentOutcome::default();
        };

        let calls = self
            .providers
            .iter()
            .map(|provider| guarded(provider.name(), self.timeout, provider.fetch(domain)));
        let responses = join_all(calls).await;

        let mut signals = Vec::new();
        let mut failures = Vec::new();
        for response in responses {
            match response {
                Ok(batch) => signals.extend(batch),
                Err(failure) => {
                    tracing::warn!("Intent provider {} failed: {}", failure.source, failure.cause);
                    failures.push(failure);
                }
            }
        }

        tracing::info!(
            "Collected {} intent signal(s) for {} ({} provider failure(s))",
            signals.len(),
            domain,
            failures.len()
        );

        IntentOutcome {
            result: summarize(signals, self.topic_limit),
            failures,
        }
    }
}

/// Builds the intent result from a concatenated signal set.
pub fn summarize(mut signals: Vec<IntentSignal>, topic_limit: usize) -> IntentResult {
    for signal in &mut signals {
        signal.topic = normalize_topic(&signal.topic);
    }

    IntentResult {
        intent_score: intent_score(&signals),
        buying_stage: buying_stage(&signals),
        priority_topics: priority_topics(&signals, topic_limit),
        signals,
    }
}

fn normalize_topic(topic: &str) -> String {
    topic.trim().to_lowercase()
}

fn clamp_strength(strength: f64) -> f64 {
    if strength.is_nan() {
        0.0
    } else {
        strength.clamp(0.0, 100.0)
    }
}

/// Probabilistic union of signal strengths: `100 × (1 − Π(1 − s/100))`.
///
/// Bounded by 100, and every additional signal (duplicates included) can only raise it.
pub fn intent_score(signals: &[IntentSignal]) -> u8 {
    let remaining: f64 = signals
        .iter()
        .map(|s| 1.0 - clamp_strength(s.strength) / 100.0)
        .product();
    (100.0 * (1.0 - remaining)).round().clamp(0.0, 100.0) as u8
}

fn topic_strengths<'a>(signals: impl Iterator<Item = &'a IntentSignal>) -> Vec<(String, f64)> {
    let mut totals: HashMap<&str, f64> = HashMap::new();
    for signal in signals {
        if signal.topic.is_empty() {
            continue;
        }
        *totals.entry(signal.topic.as_str()).or_default() += clamp_strength(signal.strength);
    }

    let mut ranked: Vec<(String, f64)> = totals
        .into_iter()
        .map(|(topic, total)| (topic.to_string(), total))
        .collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked
}

/// Top `limit` distinct topics by summed strength, ties by name.
pub fn priority_topics(signals: &[IntentSignal], limit: usize) -> Vec<String> {
    topic_strengths(signals.iter())
        .into_iter()
        .take(limit)
        .map(|(topic, _)| topic)
        .collect()
}

/// Classifies the buying stage from the strongest recent topic.
pub fn buying_stage(signals: &[IntentSignal]) -> BuyingStage {
    let Some(newest) = signals.iter().map(|s| s.observed_at).max() else {
        return BuyingStage::Unknown;
    };
    let cutoff = newest - ChronoDuration::days(RECENCY_WINDOW_DAYS);

    let peak = topic_strengths(signals.iter().filter(|s| s.observed_at >= cutoff))
        .first()
        .map(|(_, total)| *total)
        .unwrap_or(0.0);

    if peak >= DECISION_STRENGTH {
        BuyingStage::Decision
    } else if peak >= CONSIDERATION_STRENGTH {
        BuyingStage::Consideration
    } else {
        BuyingStage::Awareness
    }
}
