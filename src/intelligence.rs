/// Competitive and market intelligence
///
/// Supplies the contextual lookups the insight stage feeds to its backends, and
/// runs the best-effort competitive-intelligence update after a record is
/// persisted. Nothing here is ever fatal to a pipeline run.
use crate::errors::AppError;
use crate::models::{CompetitiveIntelRecord, CompetitorAnalysis, Lead};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;

#[async_trait]
pub trait CompetitiveIntelligence: Send + Sync {
    async fn competitive_context(&self, lead: &Lead) -> Result<Value, AppError>;

    async fn market_context(&self, lead: &Lead) -> Result<Value, AppError>;

    /// Detects whether the lead's company is a tracked competitor's customer.
    async fn analyze_competitor_customer(&self, lead: &Lead)
        -> Result<CompetitorAnalysis, AppError>;

    async fn update_market_intelligence(&self, lead: &Lead) -> Result<(), AppError>;
}

/// Append-only sink for competitive-intelligence records.
#[async_trait]
pub trait IntelStore: Send + Sync {
    async fn append(&self, record: &CompetitiveIntelRecord) -> Result<(), AppError>;
}

/// Used when no intelligence service is configured.
pub struct NoIntelligence;

#[async_trait]
impl CompetitiveIntelligence for NoIntelligence {
    async fn competitive_context(&self, _lead: &Lead) -> Result<Value, AppError> {
        Ok(Value::Null)
    }

    async fn market_context(&self, _lead: &Lead) -> Result<Value, AppError> {
        Ok(Value::Null)
    }

    async fn analyze_competitor_customer(
        &self,
        _lead: &Lead,
    ) -> Result<CompetitorAnalysis, AppError> {
        Ok(CompetitorAnalysis::default())
    }

    async fn update_market_intelligence(&self, _lead: &Lead) -> Result<(), AppError> {
        Ok(())
    }
}

/// What the update did.
#[derive(Debug, Clone, PartialEq)]
pub enum IntelUpdate {
    /// The lead has no company name.
    Skipped,
    /// The company is not a tracked competitor's customer.
    NoMatch,
    /// A competitive-intelligence record was appended.
    Recorded(CompetitiveIntelRecord),
}

pub async fn update_competitive_intelligence(
    intel: &dyn CompetitiveIntelligence,
    store: &dyn IntelStore,
    lead: &Lead,
) -> Result<IntelUpdate, AppError> {
    let Some(company_name) = lead.company_name() else {
        return Ok(IntelUpdate::Skipped);
    };

    let analysis = intel.analyze_competitor_customer(lead).await?;

    let outcome = if analysis.is_competitor_customer {
        let record = CompetitiveIntelRecord {
            competitor: analysis
                .competitor_name
                .clone()
                .unwrap_or_else(|| "unknown".to_string()),
            customer: company_name.to_string(),
            intelligence_type: "customer_win_loss".to_string(),
            data: serde_json::to_value(&analysis)?,
            timestamp: Utc::now(),
        };
        store.append(&record).await?;
        tracing::info!(
            "Recorded competitive intelligence: {} is a customer of {}",
            record.customer,
            record.competitor
        );
        IntelUpdate::Recorded(record)
    } else {
        IntelUpdate::NoMatch
    };

    intel.update_market_intelligence(lead).await?;

    Ok(outcome)
}
