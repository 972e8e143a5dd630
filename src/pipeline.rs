/// End-to-end lead pipeline
///
/// Stages always run in this order for a lead:
/// 1. Waterfall enrichment
/// 2. Intent aggregation
/// 3. Insight synthesis
/// 4. Automation routing
/// 5. Channel execution
/// 6. Knowledge persistence
/// 7. Competitive-intelligence update (spawned, not awaited)
///
/// A fatal stage error stops the run before any later stage starts. Once the
/// structured insert has committed, a persist-stage expiry only degrades the
/// secondary stores.
use crate::automation::{personalization_tokens, route, ExecutionFanout};
use crate::enrichment::EnrichmentOrchestrator;
use crate::errors::AppError;
use crate::insight::InsightSynthesizer;
use crate::intent::IntentAggregator;
use crate::knowledge::KnowledgeWriter;
use crate::models::{CompositeRecord, FieldMap, Lead, PipelineSummary};
use chrono::Utc;
use std::future::Future;
use std::time::Duration;

pub struct Pipeline {
    enrichment: EnrichmentOrchestrator,
    intent: IntentAggregator,
    insight: InsightSynthesizer,
    fanout: ExecutionFanout,
    writer: KnowledgeWriter,
    stage_timeout: Option<Duration>,
}

impl Pipeline {
    pub fn new(
        enrichment: EnrichmentOrchestrator,
        intent: IntentAggregator,
        insight: InsightSynthesizer,
        fanout: ExecutionFanout,
        writer: KnowledgeWriter,
        stage_timeout: Option<Duration>,
    ) -> Self {
        Self {
            enrichment,
            intent,
            insight,
            fanout,
            writer,
            stage_timeout,
        }
    }

    /// Runs one stage under the optional stage deadline.
    ///
    /// Expiry drops the stage future, which cancels any fan-out calls still in flight.
    async fn stage<T, F>(&self, name: &'static str, work: F) -> Result<T, AppError>
    where
        F: Future<Output = T>,
    {
        match self.stage_timeout {
            Some(deadline) => tokio::time::timeout(deadline, work).await.map_err(|_| {
                tracing::error!("Stage {} exceeded {:?}, aborting run", name, deadline);
                AppError::StageTimeout { stage: name }
            }),
            None => Ok(work.await),
        }
    }

    pub async fn process_lead(&self, lead_input: FieldMap) -> Result<PipelineSummary, AppError> {
        if lead_input.is_empty() {
            return Err(AppError::BadRequest("Lead input has no fields".to_string()));
        }

        tracing::info!("Step 1: Enriching lead ({} input field(s))", lead_input.len());
        let enriched = self
            .stage(
                "enrich",
                self.enrichment.enrich(Lead::from_fields(lead_input)),
            )
            .await?;
        let lead = enriched.lead;
        let enrichment_score = lead.completeness_score().unwrap_or(0);
        tracing::info!(
            "Enrichment finished: score {}, {} source(s) attempted, {} failed",
            enrichment_score,
            enriched.attempted.len(),
            enriched.failures.len()
        );

        tracing::info!("Step 2: Aggregating intent signals");
        let intent = self.stage("intent", self.intent.analyze(&lead)).await?.result;

        tracing::info!("Step 3: Synthesizing insights");
        let insight = self
            .stage("insight", self.insight.synthesize(&lead, &intent))
            .await??
            .insight;

        tracing::info!("Step 4: Routing automation");
        let mut plan = route(insight.qualification_score, intent.intent_score);
        plan.personalization_tokens = personalization_tokens(&lead, &intent, &insight);
        tracing::info!(
            "Strategy {} with channels {:?}",
            plan.strategy,
            plan.channels
        );

        tracing::info!("Step 5: Executing {} channel(s)", plan.channels.len());
        let execution_result = self.stage("execute", self.fanout.execute(&plan)).await?;

        tracing::info!("Step 6: Persisting composite record");
        let record = CompositeRecord {
            lead,
            intent,
            insight,
            plan,
            execution_result,
            created_at: Utc::now(),
        };
        // The deadline is fatal only until the structured insert commits.
        let persisted = self.writer.persist(&record, self.stage_timeout).await?;

        self.writer.spawn_intelligence_update(record.lead.clone());

        Ok(PipelineSummary {
            record_id: persisted.record_id,
            enrichment_score,
            intent_score: record.intent.intent_score,
            qualification_score: record.insight.qualification_score,
            strategy: record.plan.strategy,
            automation_status: record.execution_result.status.clone(),
            next_actions: record.insight.next_best_actions.clone(),
            degraded_persistence: persisted
                .degraded
                .iter()
                .map(|store| store.as_str().to_string())
                .collect(),
        })
    }
}
