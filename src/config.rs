use serde::Deserialize;
use std::time::Duration;

/// Tunables consumed by the pipeline core.
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineSettings {
    /// Enrichment stops once the completeness score exceeds this value.
    pub completeness_threshold: u8,
    /// Expiry of the fast-cache entry written for each record.
    pub cache_ttl_seconds: u64,
    /// How many distinct topics are reported as priority topics.
    pub priority_topic_limit: usize,
    pub source_timeout_ms: u64,
    pub provider_timeout_ms: u64,
    pub backend_timeout_ms: u64,
    pub channel_timeout_ms: u64,
    pub store_timeout_ms: u64,
    /// Optional deadline applied to each top-level stage.
    pub stage_timeout_ms: Option<u64>,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            completeness_threshold: 85,
            cache_ttl_seconds: 3600,
            priority_topic_limit: 5,
            source_timeout_ms: 5_000,
            provider_timeout_ms: 5_000,
            backend_timeout_ms: 30_000,
            channel_timeout_ms: 15_000,
            store_timeout_ms: 5_000,
            stage_timeout_ms: None,
        }
    }
}

impl PipelineSettings {
    pub fn source_timeout(&self) -> Duration {
        Duration::from_millis(self.source_timeout_ms)
    }

    pub fn provider_timeout(&self) -> Duration {
        Duration::from_millis(self.provider_timeout_ms)
    }

    pub fn backend_timeout(&self) -> Duration {
        Duration::from_millis(self.backend_timeout_ms)
    }

    pub fn channel_timeout(&self) -> Duration {
        Duration::from_millis(self.channel_timeout_ms)
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    pub fn stage_timeout(&self) -> Option<Duration> {
        self.stage_timeout_ms.map(Duration::from_millis)
    }
}

/// A named HTTP collaborator, parsed from a `name=url` pair.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Endpoint {
    pub name: String,
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub collaborator_token: Option<String>,
    /// Enrichment sources in priority order.
    pub enrichment_sources: Vec<Endpoint>,
    pub intent_providers: Vec<Endpoint>,
    pub qualification_backends: Vec<Endpoint>,
    pub channel_executors: Vec<Endpoint>,
    pub semantic_index_url: String,
    pub intel_url: Option<String>,
    pub pipeline: PipelineSettings,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let defaults = PipelineSettings::default();

        let config = Self {
            database_url: std::env::var("DB_URL")
                .or_else(|_| std::env::var("DATABASE_URL"))
                .map_err(|_| {
                    anyhow::anyhow!("DB_URL or DATABASE_URL environment variable required")
                })
                .and_then(|url| {
                    if url.trim().is_empty() {
                        anyhow::bail!("DB_URL cannot be empty");
                    }
                    if !url.starts_with("postgresql://") && !url.starts_with("postgres://") {
                        anyhow::bail!("DB_URL must start with postgresql:// or postgres://");
                    }
                    Ok(url)
                })?,
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number between 1-65535"))?,
            collaborator_token: std::env::var("COLLABORATOR_TOKEN")
                .ok()
                .filter(|s| !s.trim().is_empty()),
            enrichment_sources: parse_endpoints(
                "ENRICHMENT_SOURCES",
                &std::env::var("ENRICHMENT_SOURCES").unwrap_or_default(),
            )?,
            intent_providers: parse_endpoints(
                "INTENT_PROVIDERS",
                &std::env::var("INTENT_PROVIDERS").unwrap_or_default(),
            )?,
            qualification_backends: parse_endpoints(
                "QUALIFICATION_BACKENDS",
                &std::env::var("QUALIFICATION_BACKENDS").unwrap_or_default(),
            )
            .and_then(|backends| {
                if backends.len() < 2 {
                    anyhow::bail!("QUALIFICATION_BACKENDS must list at least two backends");
                }
                Ok(backends)
            })?,
            channel_executors: parse_endpoints(
                "CHANNEL_EXECUTORS",
                &std::env::var("CHANNEL_EXECUTORS").unwrap_or_default(),
            )?,
            semantic_index_url: std::env::var("SEMANTIC_INDEX_URL")
                .map_err(|_| anyhow::anyhow!("SEMANTIC_INDEX_URL environment variable required"))
                .and_then(|url| validate_http_url("SEMANTIC_INDEX_URL", &url))?,
            intel_url: match std::env::var("INTEL_URL") {
                Ok(url) if !url.trim().is_empty() => Some(validate_http_url("INTEL_URL", &url)?),
                _ => None,
            },
            pipeline: PipelineSettings {
                completeness_threshold: env_number("COMPLETENESS_THRESHOLD")?
                    .unwrap_or(defaults.completeness_threshold),
                cache_ttl_seconds: env_number("CACHE_TTL_SECONDS")?
                    .unwrap_or(defaults.cache_ttl_seconds),
                priority_topic_limit: env_number("PRIORITY_TOPIC_LIMIT")?
                    .unwrap_or(defaults.priority_topic_limit),
                source_timeout_ms: env_number("SOURCE_TIMEOUT_MS")?
                    .unwrap_or(defaults.source_timeout_ms),
                provider_timeout_ms: env_number("PROVIDER_TIMEOUT_MS")?
                    .unwrap_or(defaults.provider_timeout_ms),
                backend_timeout_ms: env_number("BACKEND_TIMEOUT_MS")?
                    .unwrap_or(defaults.backend_timeout_ms),
                channel_timeout_ms: env_number("CHANNEL_TIMEOUT_MS")?
                    .unwrap_or(defaults.channel_timeout_ms),
                store_timeout_ms: env_number("STORE_TIMEOUT_MS")?
                    .unwrap_or(defaults.store_timeout_ms),
                stage_timeout_ms: env_number("STAGE_TIMEOUT_MS")?,
            },
        };

        // Log successful configuration load (without sensitive values)
        tracing::info!("Configuration loaded successfully");
        tracing::debug!(
            "Database URL: {}...",
            &config.database_url[..20.min(config.database_url.len())]
        );
        tracing::debug!(
            "Collaborators: {} enrichment source(s), {} intent provider(s), {} backend(s), {} channel executor(s)",
            config.enrichment_sources.len(),
            config.intent_providers.len(),
            config.qualification_backends.len(),
            config.channel_executors.len()
        );
        tracing::debug!("Server Port: {}", config.port);

        Ok(config)
    }
}

/// Parses a comma-separated list of `name=url` pairs, preserving order.
pub fn parse_endpoints(var: &str, raw: &str) -> anyhow::Result<Vec<Endpoint>> {
    let mut endpoints = Vec::new();
    for pair in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (name, url) = pair
            .split_once('=')
            .ok_or_else(|| anyhow::anyhow!("{} entry '{}' must be name=url", var, pair))?;
        let name = name.trim();
        if name.is_empty() {
            anyhow::bail!("{} entry '{}' has an empty name", var, pair);
        }
        if endpoints.iter().any(|e: &Endpoint| e.name == name) {
            anyhow::bail!("{} lists '{}' more than once", var, name);
        }
        endpoints.push(Endpoint {
            name: name.to_string(),
            url: validate_http_url(var, url.trim())?,
        });
    }
    Ok(endpoints)
}

fn validate_http_url(var: &str, raw: &str) -> anyhow::Result<String> {
    if raw.trim().is_empty() {
        anyhow::bail!("{} cannot be empty", var);
    }
    let parsed = url::Url::parse(raw)
        .map_err(|e| anyhow::anyhow!("{} has an invalid URL '{}': {}", var, raw, e))?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        anyhow::bail!("{} must start with http:// or https://", var);
    }
    Ok(raw.trim_end_matches('/').to_string())
}

fn env_number<T: std::str::FromStr>(var: &str) -> anyhow::Result<Option<T>> {
    match std::env::var(var) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| anyhow::anyhow!("{} must be a valid number", var)),
        _ => Ok(None),
    }
}
