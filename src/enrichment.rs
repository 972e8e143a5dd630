/// Waterfall enrichment across prioritized data sources
///
/// Sources run one at a time in priority order against the same accumulator,
/// because later sources may read fields an earlier one discovered (for example a
/// company domain found before a firmographic lookup). The loop stops as soon as
/// the completeness score passes the threshold. A failing source is recorded and
/// skipped.
use crate::completeness::completeness_score;
use crate::config::PipelineSettings;
use crate::errors::AppError;
use crate::isolation::{guarded, SourceFailure};
use crate::models::{FieldMap, Lead};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;

/// A pluggable enrichment source.
///
/// `fetch` must be idempotent and leave nothing behind when it fails.
#[async_trait]
pub trait EnrichmentSource: Send + Sync {
    fn name(&self) -> &str;

    /// Lower ranks run first.
    fn priority(&self) -> u32;

    /// Returns fields to merge into the lead.
    async fn fetch(&self, lead: &Lead) -> Result<FieldMap, AppError>;
}

/// Result of one enrichment run.
#[derive(Debug, Clone)]
pub struct EnrichmentOutcome {
    pub lead: Lead,
    /// Sources invoked, in invocation order.
    pub attempted: Vec<String>,
    pub failures: Vec<SourceFailure>,
    /// True when the threshold was passed before the list was exhausted.
    pub stopped_early: bool,
}

pub struct EnrichmentOrchestrator {
    sources: Vec<Arc<dyn EnrichmentSource>>,
    threshold: u8,
    timeout: Duration,
}

impl EnrichmentOrchestrator {
    /// Sources are ordered by priority rank; equal ranks keep registration order.
    pub fn new(mut sources: Vec<Arc<dyn EnrichmentSource>>, settings: &PipelineSettings) -> Self {
        sources.sort_by_key(|s| s.priority());
        Self {
            sources,
            threshold: settings.completeness_threshold,
            timeout: settings.source_timeout(),
        }
    }

    pub fn source_names(&self) -> Vec<&str> {
        self.sources.iter().map(|s| s.name()).collect()
    }

    pub async fn enrich(&self, mut lead: Lead) -> EnrichmentOutcome {
        normalize_lead(&mut lead);

        let mut attempted = Vec::new();
        let mut failures = Vec::new();
        let mut stopped_early = false;

        for (idx, source) in self.sources.iter().enumerate() {
            attempted.push(source.name().to_string());

            match guarded(source.name(), self.timeout, source.fetch(&lead)).await {
                Ok(fields) => {
                    let merged = lead.merge(fields);
                    normalize_lead(&mut lead);
                    let score = completeness_score(&lead);
                    tracing::debug!(
                        "Source {} merged {} field(s), completeness now {}",
                        source.name(),
                        merged,
                        score
                    );

                    if score > self.threshold {
                        stopped_early = idx + 1 < self.sources.len();
                        tracing::info!(
                            "Completeness {} > {} after {}, skipping {} remaining source(s)",
                            score,
                            self.threshold,
                            source.name(),
                            self.sources.len() - idx - 1
                        );
                        break;
                    }
                }
                Err(failure) => {
                    tracing::warn!("Enrichment failed for {}: {}", failure.source, failure.cause);
                    failures.push(failure);
                }
            }
        }

        let score = completeness_score(&lead);
        lead.set("completeness_score", score);
        lead.set("enrichment_timestamp", Utc::now().to_rfc3339());

        if !self.sources.is_empty() && failures.len() == attempted.len() {
            tracing::warn!(
                "All {} enrichment source(s) failed; continuing with input fields only",
                attempted.len()
            );
        }

        EnrichmentOutcome {
            lead,
            attempted,
            failures,
            stopped_early,
        }
    }
}

const FREE_MAIL_DOMAINS: &[&str] = &[
    "gmail.com",
    "googlemail.com",
    "yahoo.com",
    "hotmail.com",
    "outlook.com",
    "live.com",
    "icloud.com",
    "aol.com",
    "proton.me",
    "protonmail.com",
];

/// Extracts a bare, lower-cased host from a website value.
pub fn extract_domain(website: &str) -> Option<String> {
    let raw = website.trim();
    if raw.is_empty() {
        return None;
    }
    let with_scheme = if raw.contains("://") {
        raw.to_string()
    } else {
        format!("https://{}", raw)
    };
    let parsed = url::Url::parse(&with_scheme).ok()?;
    let host = parsed.host_str()?.to_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host).to_string();
    if host.contains('.') {
        Some(host)
    } else {
        None
    }
}

/// Fills `company_domain` from the website or a corporate email when it is missing.
pub fn normalize_lead(lead: &mut Lead) {
    if let Some(domain) = lead.company_domain().map(str::to_string) {
        if let Some(normalized) = extract_domain(&domain) {
            if normalized != domain {
                lead.set("company_domain", normalized);
            }
        }
        return;
    }

    let from_website = lead.get_str("company_website").and_then(extract_domain);
    let from_email = lead
        .get_str("email")
        .and_then(|email| email.rsplit_once('@'))
        .map(|(_, domain)| domain.trim().to_lowercase())
        .filter(|domain| domain.contains('.') && !FREE_MAIL_DOMAINS.contains(&domain.as_str()));

    if let Some(domain) = from_website.or(from_email) {
        tracing::debug!("Derived company_domain: {}", domain);
        lead.set("company_domain", domain);
    }
}
