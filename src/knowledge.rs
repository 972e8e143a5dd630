/// Three-store persistence of composite records
///
/// The write is staged, not transactional:
/// 1. structured store insert (authoritative; failure aborts with no identifier)
/// 2. semantic index upsert keyed by the same identifier
/// 3. fast-cache entry with a fixed expiry
///
/// A failure in step 2 or 3 leaves the record retrievable from the structured
/// store and is reported as degraded persistence. Nothing is retried.
use crate::cache_validator::ValidatedCacheEntry;
use crate::config::PipelineSettings;
use crate::errors::{AppError, ResultExt};
use crate::intelligence::{update_competitive_intelligence, CompetitiveIntelligence, IntelStore};
use crate::isolation::guarded;
use crate::models::{CompositeRecord, IndexSummary, Lead};
use async_trait::async_trait;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use uuid::Uuid;

#[async_trait]
pub trait StructuredStore: Send + Sync {
    /// Inserts the record and returns its generated identifier.
    async fn insert(&self, record: &CompositeRecord) -> Result<Uuid, AppError>;

    async fn fetch(&self, id: Uuid) -> Result<Option<CompositeRecord>, AppError>;
}

#[async_trait]
pub trait SemanticIndex: Send + Sync {
    async fn upsert(
        &self,
        id: Uuid,
        embedding: &[f32],
        summary: &IndexSummary,
    ) -> Result<(), AppError>;
}

#[async_trait]
pub trait Cache: Send + Sync {
    async fn set_with_expiry(&self, key: &str, value: String, ttl_seconds: u64)
        -> Result<(), AppError>;

    async fn get(&self, key: &str) -> Result<Option<String>, AppError>;
}

/// Turns text into a vector for the semantic index.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, AppError>;
}

/// Deterministic feature-hashing embedder.
///
/// Each lower-cased alphanumeric token is hashed with SHA-256; the hash picks a
/// dimension and a sign. The vector is L2-normalized.
pub struct HashingEmbedder {
    dimensions: usize,
}

impl HashingEmbedder {
    pub const DEFAULT_DIMENSIONS: usize = 64;

    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let digest = Sha256::digest(token.to_lowercase().as_bytes());
            let mut bucket = [0u8; 8];
            bucket.copy_from_slice(&digest[..8]);
            let idx = (u64::from_be_bytes(bucket) % self.dimensions as u64) as usize;
            let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
            vector[idx] += sign;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(Self::DEFAULT_DIMENSIONS)
    }
}

#[async_trait]
impl Embedder for HashingEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, AppError> {
        Ok(self.embed_text(text))
    }
}

/// A secondary store that did not receive the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DegradedStore {
    SemanticIndex,
    Cache,
}

impl DegradedStore {
    pub fn as_str(&self) -> &'static str {
        match self {
            DegradedStore::SemanticIndex => "semantic_index",
            DegradedStore::Cache => "cache",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PersistOutcome {
    pub record_id: Uuid,
    pub degraded: Vec<DegradedStore>,
}

impl PersistOutcome {
    pub fn is_degraded(&self) -> bool {
        !self.degraded.is_empty()
    }
}

pub fn cache_key(id: Uuid) -> String {
    format!("lead:{}", id)
}

/// Flattened `key: value` text of the lead, in key order.
pub fn profile_text(lead: &Lead) -> String {
    let mut entries: Vec<String> = lead
        .fields()
        .iter()
        .map(|(key, value)| match value.as_str() {
            Some(s) => format!("{}: {}", key, s),
            None => format!("{}: {}", key, value),
        })
        .collect();
    entries.sort();
    entries.join("; ")
}

pub fn insight_text(record: &CompositeRecord) -> String {
    let insight = &record.insight;
    let mut parts = vec![insight.recommended_approach.clone()];
    parts.extend(insight.key_insights.iter().cloned());
    parts.extend(insight.talking_points.iter().cloned());
    parts
        .into_iter()
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(". ")
}

pub struct KnowledgeWriter {
    structured: Arc<dyn StructuredStore>,
    index: Arc<dyn SemanticIndex>,
    cache: Arc<dyn Cache>,
    embedder: Arc<dyn Embedder>,
    intel: Arc<dyn CompetitiveIntelligence>,
    intel_store: Arc<dyn IntelStore>,
    cache_ttl_seconds: u64,
    timeout: Duration,
}

impl KnowledgeWriter {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        structured: Arc<dyn StructuredStore>,
        index: Arc<dyn SemanticIndex>,
        cache: Arc<dyn Cache>,
        embedder: Arc<dyn Embedder>,
        intel: Arc<dyn CompetitiveIntelligence>,
        intel_store: Arc<dyn IntelStore>,
        settings: &PipelineSettings,
    ) -> Self {
        Self {
            structured,
            index,
            cache,
            embedder,
            intel,
            intel_store,
            cache_ttl_seconds: settings.cache_ttl_seconds,
            timeout: settings.store_timeout(),
        }
    }

    /// Runs the staged write. `deadline` bounds the whole step.
    ///
    /// Expiry before the structured insert returns is a fatal `StageTimeout`. After
    /// the insert, the secondary writes only get what is left of the deadline, and
    /// running out marks them degraded.
    pub async fn persist(
        &self,
        record: &CompositeRecord,
        deadline: Option<Duration>,
    ) -> Result<PersistOutcome, AppError> {
        let until = deadline.map(|limit| Instant::now() + limit);

        let insert = guarded("structured_store", self.timeout, self.structured.insert(record));
        let inserted = match until {
            Some(until) => tokio::time::timeout_at(until, insert).await.map_err(|_| {
                tracing::error!("Structured store write exceeded the persist deadline");
                AppError::StageTimeout { stage: "persist" }
            })?,
            None => insert.await,
        };
        let record_id = inserted.map_err(|failure| {
            tracing::error!("Structured store write failed: {}", failure.cause);
            AppError::Persistence(failure.to_string())
        })?;
        tracing::info!("Stored composite record {}", record_id);

        let mut degraded = Vec::new();

        if let Err(e) = self.index_record(record_id, record, until).await {
            tracing::warn!("Semantic index write failed for {}: {}", record_id, e);
            degraded.push(DegradedStore::SemanticIndex);
        }

        if let Err(e) = self.cache_record(record_id, record, until).await {
            tracing::warn!("Cache write failed for {}: {}", record_id, e);
            degraded.push(DegradedStore::Cache);
        }

        if !degraded.is_empty() {
            tracing::warn!(
                "Record {} persisted with degraded secondary stores: {:?}",
                record_id,
                degraded
            );
        }

        Ok(PersistOutcome {
            record_id,
            degraded,
        })
    }

    /// Per-call timeout, cut down to what remains before `until`.
    fn budget(&self, until: Option<Instant>) -> Duration {
        match until {
            Some(until) => until
                .saturating_duration_since(Instant::now())
                .min(self.timeout),
            None => self.timeout,
        }
    }

    async fn index_record(
        &self,
        id: Uuid,
        record: &CompositeRecord,
        until: Option<Instant>,
    ) -> Result<(), AppError> {
        let profile = profile_text(&record.lead);
        let insights = insight_text(record);
        let embedding = guarded(
            "embedder",
            self.budget(until),
            self.embedder.embed(&format!("{}\n{}", profile, insights)),
        )
        .await?;

        let summary = IndexSummary {
            lead_profile: profile,
            insights,
            qualification_score: record.insight.qualification_score,
        };

        guarded(
            "semantic_index",
            self.budget(until),
            self.index.upsert(id, &embedding, &summary),
        )
        .await?;
        Ok(())
    }

    async fn cache_record(
        &self,
        id: Uuid,
        record: &CompositeRecord,
        until: Option<Instant>,
    ) -> Result<(), AppError> {
        let payload = serde_json::to_string(record)?;
        let envelope = ValidatedCacheEntry::new(payload).serialize()?;
        let key = cache_key(id);

        guarded(
            "cache",
            self.budget(until),
            self.cache
                .set_with_expiry(&key, envelope, self.cache_ttl_seconds),
        )
        .await?;
        Ok(())
    }

    /// Starts the competitive-intelligence update without waiting for it.
    ///
    /// Failures are logged and never reach the caller.
    pub fn spawn_intelligence_update(&self, lead: Lead) -> JoinHandle<()> {
        let intel = Arc::clone(&self.intel);
        let store = Arc::clone(&self.intel_store);
        let timeout = self.timeout;

        tokio::spawn(async move {
            let update = guarded(
                "competitive_intelligence",
                timeout,
                update_competitive_intelligence(intel.as_ref(), store.as_ref(), &lead),
            )
            .await;

            match update {
                Ok(outcome) => tracing::debug!("Competitive intelligence update: {:?}", outcome),
                Err(failure) => {
                    tracing::warn!("Competitive intelligence update failed: {}", failure.cause)
                }
            }
        })
    }
}

/// Reads persisted records, cache first.
pub struct KnowledgeReader {
    structured: Arc<dyn StructuredStore>,
    cache: Arc<dyn Cache>,
}

impl KnowledgeReader {
    pub fn new(structured: Arc<dyn StructuredStore>, cache: Arc<dyn Cache>) -> Self {
        Self { structured, cache }
    }

    pub async fn fetch(&self, id: Uuid) -> Result<CompositeRecord, AppError> {
        match self.cache.get(&cache_key(id)).await {
            Ok(Some(serialized)) => {
                let cached = ValidatedCacheEntry::deserialize_and_validate(&serialized)
                    .and_then(|data| serde_json::from_str::<CompositeRecord>(&data).ok());
                if let Some(record) = cached {
                    tracing::debug!("Cache hit for record {}", id);
                    return Ok(record);
                }
                tracing::warn!("Discarding invalid cache entry for record {}", id);
            }
            Ok(None) => {}
            Err(e) => tracing::warn!("Cache read failed for {}: {}", id, e),
        }

        self.structured
            .fetch(id)
            .await
            .with_context(|| format!("Failed to load record {}", id))?
            .ok_or_else(|| AppError::NotFound(format!("Record {} not found", id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_hashing_embedder_is_deterministic_and_normalized() {
        let embedder = HashingEmbedder::default();
        let a = embedder.embed_text("VP of Sales at Example Corp");
        let b = embedder.embed_text("vp OF sales at example corp");

        assert_eq!(a.len(), HashingEmbedder::DEFAULT_DIMENSIONS);
        assert_eq!(a, b);
        let norm: f32 = a.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_empty_text_embeds_to_zero_vector() {
        let v = HashingEmbedder::new(8).embed_text("  ,, ");
        assert_eq!(v, vec![0.0; 8]);
    }

    #[test]
    fn test_profile_text_is_key_ordered() {
        let lead = Lead::from_fields(
            json!({"title": "CTO", "company_name": "Acme", "employee_count": 40})
                .as_object()
                .cloned()
                .unwrap(),
        );
        assert_eq!(
            profile_text(&lead),
            "company_name: Acme; employee_count: 40; title: CTO"
        );
    }

    #[test]
    fn test_cache_key_format() {
        let id = Uuid::nil();
        assert_eq!(cache_key(id), "lead:00000000-0000-0000-0000-000000000000");
    }
}
