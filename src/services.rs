//! JSON-over-HTTP clients for the pipeline's external collaborators.
//!
//! Each client posts a small JSON body to a configured base URL and maps
//! transport, status and parse failures to `AppError::ExternalApiError`.

use crate::automation::ChannelExecutor;
use crate::config::Endpoint;
use crate::enrichment::EnrichmentSource;
use crate::errors::AppError;
use crate::insight::QualificationBackend;
use crate::intelligence::CompetitiveIntelligence;
use crate::intent::IntentProvider;
use crate::knowledge::SemanticIndex;
use crate::models::{
    AnalysisContext, AutomationPlan, BackendAnalysis, Channel, CompetitorAnalysis, FieldMap,
    IndexSummary, IntentSignal, Lead,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use uuid::Uuid;

/// Shared HTTP plumbing for one collaborator.
#[derive(Clone)]
pub struct JsonApiClient {
    name: String,
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl JsonApiClient {
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        token: Option<String>,
    ) -> Result<Self, AppError> {
        let name = name.into();
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| {
                AppError::ExternalApiError(format!("Failed to create {} client: {}", name, e))
            })?;

        Ok(Self {
            name,
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
        })
    }

    pub fn from_endpoint(endpoint: &Endpoint, token: Option<String>) -> Result<Self, AppError> {
        Self::new(endpoint.name.clone(), endpoint.url.clone(), token)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Sends the request and checks the status, leaving the body unread.
    pub async fn send<B>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> Result<reqwest::Response, AppError>
    where
        B: Serialize + ?Sized + Sync,
    {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!("{} {} -> {}", method, self.name, url);

        let mut request = self.client.request(method, &url).json(body);
        if let Some(ref token) = self.token {
            request = request.header("Authorization", format!("Bearer {}", token));
        }

        let response = request.send().await.map_err(|e| {
            AppError::ExternalApiError(format!("{} request failed: {}", self.name, e))
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::ExternalApiError(format!(
                "{} returned {}: {}",
                self.name, status, error_text
            )));
        }

        Ok(response)
    }

    pub async fn send_json<B, R>(&self, method: Method, path: &str, body: &B) -> Result<R, AppError>
    where
        B: Serialize + ?Sized + Sync,
        R: DeserializeOwned,
    {
        self.send(method, path, body).await?.json().await.map_err(|e| {
            AppError::ExternalApiError(format!("Failed to parse {} response: {}", self.name, e))
        })
    }

    pub async fn post_json<B, R>(&self, path: &str, body: &B) -> Result<R, AppError>
    where
        B: Serialize + ?Sized + Sync,
        R: DeserializeOwned,
    {
        self.send_json(Method::POST, path, body).await
    }
}

// ============ Enrichment ============

#[derive(Deserialize)]
struct EnrichResponse {
    #[serde(default)]
    fields: FieldMap,
}

/// `POST {base}/enrich` with `{"lead": {...}}`, answered by `{"fields": {...}}`.
pub struct HttpEnrichmentSource {
    api: JsonApiClient,
    priority: u32,
}

impl HttpEnrichmentSource {
    pub fn new(api: JsonApiClient, priority: u32) -> Self {
        Self { api, priority }
    }
}

#[async_trait]
impl EnrichmentSource for HttpEnrichmentSource {
    fn name(&self) -> &str {
        self.api.name()
    }

    fn priority(&self) -> u32 {
        self.priority
    }

    async fn fetch(&self, lead: &Lead) -> Result<FieldMap, AppError> {
        let response: EnrichResponse = self
            .api
            .post_json("/enrich", &json!({ "lead": lead }))
            .await?;
        Ok(response.fields)
    }
}

// ============ Intent ============

#[derive(Deserialize)]
struct ProviderSignal {
    topic: String,
    strength: f64,
    observed_at: DateTime<Utc>,
}

#[derive(Deserialize)]
struct IntentResponse {
    #[serde(default)]
    signals: Vec<ProviderSignal>,
}

/// `POST {base}/intent` with `{"domain": "..."}`, answered by `{"signals": [...]}`.
pub struct HttpIntentProvider {
    api: JsonApiClient,
}

impl HttpIntentProvider {
    pub fn new(api: JsonApiClient) -> Self {
        Self { api }
    }
}

#[async_trait]
impl IntentProvider for HttpIntentProvider {
    fn name(&self) -> &str {
        self.api.name()
    }

    async fn fetch(&self, domain: &str) -> Result<Vec<IntentSignal>, AppError> {
        let response: IntentResponse = self
            .api
            .post_json("/intent", &json!({ "domain": domain }))
            .await?;

        Ok(response
            .signals
            .into_iter()
            .map(|s| IntentSignal {
                source: self.api.name().to_string(),
                topic: s.topic,
                strength: s.strength,
                observed_at: s.observed_at,
            })
            .collect())
    }
}

// ============ Qualification ============

/// `POST {base}/analyze` with the analysis context, answered by a backend analysis.
pub struct HttpQualificationBackend {
    api: JsonApiClient,
}

impl HttpQualificationBackend {
    pub fn new(api: JsonApiClient) -> Self {
        Self { api }
    }
}

#[async_trait]
impl QualificationBackend for HttpQualificationBackend {
    fn name(&self) -> &str {
        self.api.name()
    }

    async fn analyze(&self, context: &AnalysisContext) -> Result<BackendAnalysis, AppError> {
        self.api.post_json("/analyze", context).await
    }
}

// ============ Channels ============

/// `POST {base}/execute` with `{"channel", "plan"}`; the response body is the channel payload.
pub struct HttpChannelExecutor {
    api: JsonApiClient,
}

impl HttpChannelExecutor {
    pub fn new(api: JsonApiClient) -> Self {
        Self { api }
    }
}

#[async_trait]
impl ChannelExecutor for HttpChannelExecutor {
    async fn execute(&self, channel: Channel, plan: &AutomationPlan) -> Result<Value, AppError> {
        self.api
            .post_json("/execute", &json!({ "channel": channel, "plan": plan }))
            .await
    }
}

// ============ Semantic index ============

/// `PUT {base}/objects/{id}` with the vector and its denormalized summary.
pub struct HttpSemanticIndex {
    api: JsonApiClient,
    class_name: String,
}

impl HttpSemanticIndex {
    pub fn new(api: JsonApiClient) -> Self {
        Self {
            api,
            class_name: "EnrichedLead".to_string(),
        }
    }
}

#[async_trait]
impl SemanticIndex for HttpSemanticIndex {
    async fn upsert(
        &self,
        id: Uuid,
        embedding: &[f32],
        summary: &IndexSummary,
    ) -> Result<(), AppError> {
        let body = json!({
            "class": self.class_name,
            "id": id,
            "vector": embedding,
            "properties": summary,
        });
        self.api
            .send(Method::PUT, &format!("/objects/{}", id), &body)
            .await?;
        Ok(())
    }
}

// ============ Intelligence ============

/// Competitive and market intelligence service.
pub struct HttpIntelligence {
    api: JsonApiClient,
}

impl HttpIntelligence {
    pub fn new(api: JsonApiClient) -> Self {
        Self { api }
    }
}

#[async_trait]
impl CompetitiveIntelligence for HttpIntelligence {
    async fn competitive_context(&self, lead: &Lead) -> Result<Value, AppError> {
        self.api
            .post_json("/competitive-context", &json!({ "lead": lead }))
            .await
    }

    async fn market_context(&self, lead: &Lead) -> Result<Value, AppError> {
        self.api
            .post_json("/market-context", &json!({ "lead": lead }))
            .await
    }

    async fn analyze_competitor_customer(
        &self,
        lead: &Lead,
    ) -> Result<CompetitorAnalysis, AppError> {
        self.api
            .post_json("/competitor-customer", &json!({ "lead": lead }))
            .await
    }

    async fn update_market_intelligence(&self, lead: &Lead) -> Result<(), AppError> {
        self.api
            .send(Method::POST, "/market-intelligence", &json!({ "lead": lead }))
            .await?;
        Ok(())
    }
}
