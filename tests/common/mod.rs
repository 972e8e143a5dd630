//! In-memory collaborators shared by the pipeline tests
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use leadflow_pipeline::automation::{ChannelExecutor, ExecutionFanout};
use leadflow_pipeline::config::PipelineSettings;
use leadflow_pipeline::enrichment::{EnrichmentOrchestrator, EnrichmentSource};
use leadflow_pipeline::errors::AppError;
use leadflow_pipeline::insight::{InsightSynthesizer, QualificationBackend};
use leadflow_pipeline::intelligence::{CompetitiveIntelligence, IntelStore};
use leadflow_pipeline::intent::{IntentAggregator, IntentProvider};
use leadflow_pipeline::knowledge::{
    Cache, HashingEmbedder, KnowledgeReader, KnowledgeWriter, SemanticIndex, StructuredStore,
};
use leadflow_pipeline::models::{
    AnalysisContext, AutomationPlan, BackendAnalysis, Channel, CompetitiveIntelRecord,
    CompetitorAnalysis, CompositeRecord, FieldMap, IndexSummary, IntentSignal, Lead,
};
use leadflow_pipeline::pipeline::Pipeline;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

pub fn fields(value: Value) -> FieldMap {
    value.as_object().cloned().expect("test fields must be an object")
}

/// Scores 40: valid email, company and first name, plus the domain derived from the email.
pub fn sample_input() -> FieldMap {
    fields(json!({
        "email": "jane.doe@acme.io",
        "company_name": "Acme",
        "first_name": "Jane"
    }))
}

pub fn signal(topic: &str, strength: f64) -> IntentSignal {
    IntentSignal {
        source: String::new(),
        topic: topic.to_string(),
        strength,
        observed_at: Utc.with_ymd_and_hms(2026, 9, 1, 9, 0, 0).unwrap(),
    }
}

pub fn analysis(score: f64, approach: &str) -> BackendAnalysis {
    BackendAnalysis {
        qualification_score: score,
        insights: vec!["Recently raised a Series B".to_string()],
        approach: approach.to_string(),
        talking_points: vec!["Pipeline visibility".to_string()],
        objections: vec!["Budget timing".to_string()],
        next_actions: vec!["Book discovery call".to_string()],
    }
}

// ============ Enrichment ============

pub struct StaticSource {
    pub name: String,
    pub priority: u32,
    pub fields: FieldMap,
    pub fail: bool,
    pub delay: Option<Duration>,
    pub calls: AtomicUsize,
}

impl StaticSource {
    pub fn new(name: &str, priority: u32, fields: FieldMap) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            priority,
            fields,
            fail: false,
            delay: None,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn failing(name: &str, priority: u32) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            priority,
            fields: FieldMap::new(),
            fail: true,
            delay: None,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn slow(name: &str, priority: u32, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            priority,
            fields: FieldMap::new(),
            fail: false,
            delay: Some(delay),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EnrichmentSource for StaticSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn priority(&self) -> u32 {
        self.priority
    }

    async fn fetch(&self, _lead: &Lead) -> Result<FieldMap, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(AppError::ExternalApiError(format!("{} returned 503", self.name)));
        }
        Ok(self.fields.clone())
    }
}

// ============ Intent ============

pub struct StaticProvider {
    pub name: String,
    pub signals: Vec<IntentSignal>,
    pub fail: bool,
    pub calls: AtomicUsize,
}

impl StaticProvider {
    pub fn new(name: &str, signals: Vec<IntentSignal>) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            signals,
            fail: false,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn failing(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            signals: Vec::new(),
            fail: true,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IntentProvider for StaticProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self, _domain: &str) -> Result<Vec<IntentSignal>, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(AppError::ExternalApiError(format!("{} unavailable", self.name)));
        }
        Ok(self
            .signals
            .iter()
            .cloned()
            .map(|mut s| {
                s.source = self.name.clone();
                s
            })
            .collect())
    }
}

// ============ Qualification ============

pub struct StaticBackend {
    pub name: String,
    pub analysis: Option<BackendAnalysis>,
    pub calls: AtomicUsize,
}

impl StaticBackend {
    pub fn new(name: &str, analysis: BackendAnalysis) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            analysis: Some(analysis),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn failing(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            analysis: None,
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl QualificationBackend for StaticBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn analyze(&self, _context: &AnalysisContext) -> Result<BackendAnalysis, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.analysis
            .clone()
            .ok_or_else(|| AppError::ExternalApiError(format!("{} overloaded", self.name)))
    }
}

// ============ Channels ============

pub struct RecordingExecutor {
    pub fail: bool,
    pub calls: AtomicUsize,
}

impl RecordingExecutor {
    pub fn ok() -> Arc<Self> {
        Arc::new(Self {
            fail: false,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            fail: true,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChannelExecutor for RecordingExecutor {
    async fn execute(&self, channel: Channel, _plan: &AutomationPlan) -> Result<Value, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(AppError::ExternalApiError(format!("{} rejected", channel)));
        }
        Ok(json!({ "channel": channel.as_str(), "queued": true }))
    }
}

// ============ Stores ============

#[derive(Default)]
pub struct MemoryStore {
    pub fail: bool,
    pub fail_append: bool,
    pub insert_delay: Option<Duration>,
    pub records: Mutex<HashMap<Uuid, CompositeRecord>>,
    pub intel: Mutex<Vec<CompetitiveIntelRecord>>,
    pub fetches: AtomicUsize,
}

impl MemoryStore {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    /// Inserts succeed but intel appends are rejected.
    pub fn rejecting_intel() -> Self {
        Self {
            fail_append: true,
            ..Default::default()
        }
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            insert_delay: Some(delay),
            ..Default::default()
        }
    }

    pub fn intel_len(&self) -> usize {
        self.intel.lock().unwrap().len()
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StructuredStore for MemoryStore {
    async fn insert(&self, record: &CompositeRecord) -> Result<Uuid, AppError> {
        if self.fail {
            return Err(AppError::InternalError("connection refused".to_string()));
        }
        if let Some(delay) = self.insert_delay {
            tokio::time::sleep(delay).await;
        }
        let id = Uuid::new_v4();
        self.records.lock().unwrap().insert(id, record.clone());
        Ok(id)
    }

    async fn fetch(&self, id: Uuid) -> Result<Option<CompositeRecord>, AppError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(AppError::InternalError("connection refused".to_string()));
        }
        Ok(self.records.lock().unwrap().get(&id).cloned())
    }
}

#[async_trait]
impl IntelStore for MemoryStore {
    async fn append(&self, record: &CompetitiveIntelRecord) -> Result<(), AppError> {
        if self.fail_append {
            return Err(AppError::InternalError("intel table locked".to_string()));
        }
        self.intel.lock().unwrap().push(record.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryIndex {
    pub fail: bool,
    pub delay: Option<Duration>,
    pub entries: Mutex<HashMap<Uuid, (Vec<f32>, IndexSummary)>>,
}

impl MemoryIndex {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Default::default()
        }
    }
}

#[async_trait]
impl SemanticIndex for MemoryIndex {
    async fn upsert(
        &self,
        id: Uuid,
        embedding: &[f32],
        summary: &IndexSummary,
    ) -> Result<(), AppError> {
        if self.fail {
            return Err(AppError::ExternalApiError("index unreachable".to_string()));
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.entries
            .lock()
            .unwrap()
            .insert(id, (embedding.to_vec(), summary.clone()));
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryCache {
    pub fail: bool,
    pub entries: Mutex<HashMap<String, (String, u64)>>,
}

impl MemoryCache {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn put_raw(&self, key: &str, value: &str) {
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), (value.to_string(), 60));
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn set_with_expiry(
        &self,
        key: &str,
        value: String,
        ttl_seconds: u64,
    ) -> Result<(), AppError> {
        if self.fail {
            return Err(AppError::ExternalApiError("cache unreachable".to_string()));
        }
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), (value, ttl_seconds));
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, AppError> {
        Ok(self
            .entries
            .lock()
            .unwrap()
            .get(key)
            .map(|(value, _)| value.clone()))
    }
}

// ============ Intelligence ============

#[derive(Default)]
pub struct FakeIntel {
    pub competitor: Option<String>,
    pub fail_context: bool,
    pub fail_analysis: bool,
    pub market_updates: AtomicUsize,
}

#[async_trait]
impl CompetitiveIntelligence for FakeIntel {
    async fn competitive_context(&self, _lead: &Lead) -> Result<Value, AppError> {
        if self.fail_context {
            return Err(AppError::ExternalApiError("intel down".to_string()));
        }
        Ok(json!({ "competitors": ["Globex"] }))
    }

    async fn market_context(&self, _lead: &Lead) -> Result<Value, AppError> {
        if self.fail_context {
            return Err(AppError::ExternalApiError("intel down".to_string()));
        }
        Ok(json!({ "segment": "mid-market" }))
    }

    async fn analyze_competitor_customer(
        &self,
        _lead: &Lead,
    ) -> Result<CompetitorAnalysis, AppError> {
        if self.fail_analysis {
            return Err(AppError::ExternalApiError("intel analysis timed out".to_string()));
        }
        Ok(CompetitorAnalysis {
            is_competitor_customer: self.competitor.is_some(),
            competitor_name: self.competitor.clone(),
            details: Value::Null,
        })
    }

    async fn update_market_intelligence(&self, _lead: &Lead) -> Result<(), AppError> {
        self.market_updates.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ============ Wiring ============

/// Collaborators for one test pipeline. Defaults succeed everywhere.
pub struct Harness {
    pub settings: PipelineSettings,
    pub sources: Vec<Arc<dyn EnrichmentSource>>,
    pub providers: Vec<Arc<dyn IntentProvider>>,
    pub backends: Vec<Arc<dyn QualificationBackend>>,
    pub executors: HashMap<Channel, Arc<dyn ChannelExecutor>>,
    pub store: Arc<MemoryStore>,
    pub index: Arc<MemoryIndex>,
    pub cache: Arc<MemoryCache>,
    pub intel: Arc<FakeIntel>,
}

impl Default for Harness {
    fn default() -> Self {
        Self {
            settings: PipelineSettings::default(),
            sources: Vec::new(),
            providers: vec![StaticProvider::new("bombora", vec![signal("crm", 60.0)])],
            backends: vec![
                StaticBackend::new("alpha", analysis(70.0, "Lead with ROI")),
                StaticBackend::new("beta", analysis(80.0, "Lead with security")),
            ],
            executors: HashMap::new(),
            store: Arc::new(MemoryStore::default()),
            index: Arc::new(MemoryIndex::default()),
            cache: Arc::new(MemoryCache::default()),
            intel: Arc::new(FakeIntel::default()),
        }
    }
}

impl Harness {
    pub fn writer(&self) -> KnowledgeWriter {
        KnowledgeWriter::new(
            self.store.clone(),
            self.index.clone(),
            self.cache.clone(),
            Arc::new(HashingEmbedder::default()),
            self.intel.clone(),
            self.store.clone(),
            &self.settings,
        )
    }

    pub fn reader(&self) -> KnowledgeReader {
        KnowledgeReader::new(self.store.clone(), self.cache.clone())
    }

    pub fn pipeline(&self) -> Pipeline {
        Pipeline::new(
            EnrichmentOrchestrator::new(self.sources.clone(), &self.settings),
            IntentAggregator::new(self.providers.clone(), &self.settings),
            InsightSynthesizer::new(self.backends.clone(), self.intel.clone(), &self.settings)
                .expect("harness registers two backends"),
            ExecutionFanout::new(self.executors.clone(), &self.settings),
            self.writer(),
            self.settings.stage_timeout(),
        )
    }
}
