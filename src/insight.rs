/// Multi-backend qualification synthesis
///
/// Two or more independent backends analyze the same context concurrently. Their
/// answers are reconciled deterministically:
///
/// - `qualification_score` is the mean of the surviving scores (each clamped to
///   0-100), rounded half away from zero.
/// - `recommended_approach` comes from the highest-scoring backend with a
///   non-empty approach; ties go to the backend registered first.
/// - list fields are concatenated in registration order and de-duplicated
///   case-insensitively, keeping the first spelling.
///
/// One surviving backend is enough. If none survive the stage fails.
use crate::config::PipelineSettings;
use crate::errors::AppError;
use crate::intelligence::CompetitiveIntelligence;
use crate::isolation::{guarded, SourceFailure};
use crate::models::{AnalysisContext, BackendAnalysis, Insight, IntentResult, Lead};
use async_trait::async_trait;
use futures::future::join_all;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

#[async_trait]
pub trait QualificationBackend: Send + Sync {
    fn name(&self) -> &str;

    async fn analyze(&self, context: &AnalysisContext) -> Result<BackendAnalysis, AppError>;
}

#[derive(Debug, Clone)]
pub struct InsightOutcome {
    pub insight: Insight,
    /// Backend and context-lookup failures that were tolerated.
    pub failures: Vec<SourceFailure>,
}

pub struct InsightSynthesizer {
    backends: Vec<Arc<dyn QualificationBackend>>,
    intel: Arc<dyn CompetitiveIntelligence>,
    backend_timeout: Duration,
    lookup_timeout: Duration,
}

impl InsightSynthesizer {
    pub fn new(
        backends: Vec<Arc<dyn QualificationBackend>>,
        intel: Arc<dyn CompetitiveIntelligence>,
        settings: &PipelineSettings,
    ) -> Result<Self, AppError> {
        if backends.len() < 2 {
            return Err(AppError::Config(format!(
                "insight synthesis needs at least two qualification backends, got {}",
                backends.len()
            )));
        }
        Ok(Self {
            backends,
            intel,
            backend_timeout: settings.backend_timeout(),
            lookup_timeout: settings.provider_timeout(),
        })
    }

    pub async fn build_context(
        &self,
        lead: &Lead,
        intent: &IntentResult,
        failures: &mut Vec<SourceFailure>,
    ) -> AnalysisContext {
        let (competitive, market) = tokio::join!(
            guarded(
                "competitive_context",
                self.lookup_timeout,
                self.intel.competitive_context(lead)
            ),
            guarded(
                "market_context",
                self.lookup_timeout,
                self.intel.market_context(lead)
            ),
        );

        let mut unwrap_lookup = |lookup: Result<Value, SourceFailure>| match lookup {
            Ok(value) => value,
            Err(failure) => {
                tracing::warn!("Context lookup {} failed: {}", failure.source, failure.cause);
                failures.push(failure);
                Value::Null
            }
        };

        AnalysisContext {
            lead_profile: lead.clone(),
            intent_data: intent.clone(),
            competitive_landscape: unwrap_lookup(competitive),
            market_intelligence: unwrap_lookup(market),
        }
    }

    pub async fn synthesize(
        &self,
        lead: &Lead,
        intent: &IntentResult,
    ) -> Result<InsightOutcome, AppError> {
        let mut failures = Vec::new();
        let context = self.build_context(lead, intent, &mut failures).await;

        let calls = self.backends.iter().map(|backend| {
            guarded(
                backend.name(),
                self.backend_timeout,
                backend.analyze(&context),
            )
        });
        let responses = join_all(calls).await;

        let mut analyses = Vec::new();
        for (backend, response) in self.backends.iter().zip(responses) {
            match response {
                Ok(analysis) => analyses.push((backend.name().to_string(), analysis)),
                Err(failure) => {
                    tracing::warn!(
                        "Qualification backend {} failed: {}",
                        failure.source,
                        failure.cause
                    );
                    failures.push(failure);
                }
            }
        }

        let Some(insight) = reconcile(&analyses) else {
            let causes: Vec<String> = failures
                .iter()
                .filter(|f| self.backends.iter().any(|b| b.name() == f.source))
                .map(|f| f.to_string())
                .collect();
            tracing::error!("All qualification backends failed: {}", causes.join("; "));
            return Err(AppError::Synthesis(format!(
                "all {} qualification backends failed: {}",
                self.backends.len(),
                causes.join("; ")
            )));
        };

        tracing::info!(
            "Synthesized qualification score {} from {:?}",
            insight.qualification_score,
            insight.contributing_backends
        );

        Ok(InsightOutcome { insight, failures })
    }
}

fn clamp_score(score: f64) -> f64 {
    if score.is_nan() {
        0.0
    } else {
        score.clamp(0.0, 100.0)
    }
}

fn merge_lists<'a>(lists: impl Iterator<Item = &'a Vec<String>>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut merged = Vec::new();
    for item in lists.flatten() {
        let trimmed = item.trim();
        if trimmed.is_empty() {
            continue;
        }
        if seen.insert(trimmed.to_lowercase()) {
            merged.push(trimmed.to_string());
        }
    }
    merged
}

/// Reconciles backend analyses given in registration order. `None` when empty.
pub fn reconcile(analyses: &[(String, BackendAnalysis)]) -> Option<Insight> {
    if analyses.is_empty() {
        return None;
    }

    let mean = analyses
        .iter()
        .map(|(_, a)| clamp_score(a.qualification_score))
        .sum::<f64>()
        / analyses.len() as f64;

    let mut best: Option<&BackendAnalysis> = None;
    for (_, analysis) in analyses {
        if analysis.approach.trim().is_empty() {
            continue;
        }
        let better = match best {
            None => true,
            Some(current) => {
                clamp_score(analysis.qualification_score) > clamp_score(current.qualification_score)
            }
        };
        if better {
            best = Some(analysis);
        }
    }

    Some(Insight {
        qualification_score: mean.round().clamp(0.0, 100.0) as u8,
        key_insights: merge_lists(analyses.iter().map(|(_, a)| &a.insights)),
        recommended_approach: best
            .map(|a| a.approach.trim().to_string())
            .unwrap_or_default(),
        talking_points: merge_lists(analyses.iter().map(|(_, a)| &a.talking_points)),
        objection_handling: merge_lists(analyses.iter().map(|(_, a)| &a.objections)),
        next_best_actions: merge_lists(analyses.iter().map(|(_, a)| &a.next_actions)),
        contributing_backends: analyses.iter().map(|(name, _)| name.clone()).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analysis(score: f64, approach: &str, insights: &[&str]) -> BackendAnalysis {
        BackendAnalysis {
            qualification_score: score,
            insights: insights.iter().map(|s| s.to_string()).collect(),
            approach: approach.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_reconcile_empty_is_none() {
        assert!(reconcile(&[]).is_none());
    }

    #[test]
    fn test_mean_rounds_half_away_from_zero() {
        let insight = reconcile(&[
            ("openai".into(), analysis(80.0, "a", &[])),
            ("claude".into(), analysis(71.0, "b", &[])),
        ])
        .unwrap();
        assert_eq!(insight.qualification_score, 76);
    }

    #[test]
    fn test_scores_are_clamped_before_averaging() {
        let insight = reconcile(&[
            ("openai".into(), analysis(140.0, "a", &[])),
            ("claude".into(), analysis(-10.0, "b", &[])),
        ])
        .unwrap();
        assert_eq!(insight.qualification_score, 50);
    }

    #[test]
    fn test_approach_from_highest_score_first_on_tie() {
        let insight = reconcile(&[
            ("openai".into(), analysis(70.0, "Lead with ROI", &[])),
            ("claude".into(), analysis(90.0, "Executive briefing", &[])),
            ("gemini".into(), analysis(90.0, "Free trial", &[])),
        ])
        .unwrap();
        assert_eq!(insight.recommended_approach, "Executive briefing");
    }

    #[test]
    fn test_lists_concatenate_and_dedupe() {
        let insight = reconcile(&[
            ("openai".into(), analysis(60.0, "a", &["Hiring SDRs", "New CFO"])),
            ("claude".into(), analysis(60.0, "b", &["new cfo ", "Series B"])),
        ])
        .unwrap();
        assert_eq!(
            insight.key_insights,
            vec!["Hiring SDRs".to_string(), "New CFO".to_string(), "Series B".to_string()]
        );
        assert_eq!(insight.contributing_backends, vec!["openai", "claude"]);
    }
}
