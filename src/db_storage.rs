use crate::circuit_breaker::{create_store_circuit_breaker, StoreCircuitBreaker};
use crate::errors::{AppError, ResultExt};
use crate::intelligence::IntelStore;
use crate::knowledge::StructuredStore;
use crate::models::{
    AutomationPlan, CompetitiveIntelRecord, CompositeRecord, ExecutionResult, Insight,
    IntentResult, Lead,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use failsafe::futures::CircuitBreaker;
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use std::future::Future;
use uuid::Uuid;

/// Postgres-backed structured store for composite records
pub struct PgRecordStore {
    pool: PgPool,
    breaker: StoreCircuitBreaker,
}

#[derive(Debug, FromRow)]
struct EnrichedLeadRow {
    lead_data: Json<Lead>,
    intent_data: Json<IntentResult>,
    ai_insights: Json<Insight>,
    automation_plan: Json<AutomationPlan>,
    automation_results: Json<ExecutionResult>,
    created_at: DateTime<Utc>,
}

impl From<EnrichedLeadRow> for CompositeRecord {
    fn from(row: EnrichedLeadRow) -> Self {
        CompositeRecord {
            lead: row.lead_data.0,
            intent: row.intent_data.0,
            insight: row.ai_insights.0,
            plan: row.automation_plan.0,
            execution_result: row.automation_results.0,
            created_at: row.created_at,
        }
    }
}

impl PgRecordStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            breaker: create_store_circuit_breaker(),
        }
    }

    /// Runs a query through the circuit breaker.
    async fn guarded_query<T, F>(&self, query: F) -> Result<T, AppError>
    where
        F: Future<Output = Result<T, sqlx::Error>>,
    {
        self.breaker.call(query).await.map_err(|e| match e {
            failsafe::Error::Inner(e) => AppError::DatabaseError(e),
            failsafe::Error::Rejected => {
                tracing::warn!("Structured store circuit open, rejecting call");
                AppError::Persistence("structured store circuit breaker is open".to_string())
            }
        })
    }
}

#[async_trait]
impl StructuredStore for PgRecordStore {
    async fn insert(&self, record: &CompositeRecord) -> Result<Uuid, AppError> {
        let query = sqlx::query_as::<_, (Uuid,)>(
            r#"
            INSERT INTO enriched_leads
                (lead_data, intent_data, ai_insights, automation_plan, automation_results, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            "#,
        )
        .bind(Json(&record.lead))
        .bind(Json(&record.intent))
        .bind(Json(&record.insight))
        .bind(Json(&record.plan))
        .bind(Json(&record.execution_result))
        .bind(record.created_at)
        .fetch_one(&self.pool);

        let (id,) = self.guarded_query(query).await?;
        Ok(id)
    }

    async fn fetch(&self, id: Uuid) -> Result<Option<CompositeRecord>, AppError> {
        let query = sqlx::query_as::<_, EnrichedLeadRow>(
            r#"
            SELECT lead_data, intent_data, ai_insights, automation_plan, automation_results, created_at
            FROM enriched_leads
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool);

        let row = self.guarded_query(query).await?;
        Ok(row.map(CompositeRecord::from))
    }
}

#[async_trait]
impl IntelStore for PgRecordStore {
    async fn append(&self, record: &CompetitiveIntelRecord) -> Result<(), AppError> {
        let query = sqlx::query(
            r#"
            INSERT INTO competitive_intelligence
                (competitor, customer, intelligence_type, data, observed_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(&record.competitor)
        .bind(&record.customer)
        .bind(&record.intelligence_type)
        .bind(&record.data)
        .bind(record.timestamp)
        .execute(&self.pool);

        self.guarded_query(query)
            .await
            .with_context(|| format!("Failed to record intel for {}", record.customer))?;
        Ok(())
    }
}
