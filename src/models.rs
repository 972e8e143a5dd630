use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Field name -> value mapping exchanged with enrichment sources and callers.
pub type FieldMap = Map<String, Value>;

// ============ Lead ============

/// A lead record as an open field mapping.
///
/// Mutated only by the enrichment stage; every later stage reads it through a shared reference.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Lead {
    fields: FieldMap,
}

/// Whether a field value carries information.
///
/// `null`, blank strings, empty collections and `false` count as absent.
pub fn is_filled(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(_) => true,
        Value::String(s) => !s.trim().is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

impl Lead {
    pub fn from_fields(fields: FieldMap) -> Self {
        Self { fields }
    }

    pub fn fields(&self) -> &FieldMap {
        &self.fields
    }

    pub fn into_fields(self) -> FieldMap {
        self.fields
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Trimmed string value of a field, `None` when missing or blank.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.fields
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// True when the field is present and non-empty.
    pub fn has(&self, key: &str) -> bool {
        self.fields.get(key).map(is_filled).unwrap_or(false)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(key.into(), value.into());
    }

    /// Merges fields returned by a source; the later writer wins.
    ///
    /// Empty values never replace anything, so a merge cannot drop a field. A filled
    /// value can still replace a better one, such as a valid email overwritten by an
    /// invalid one, which lowers the completeness score.
    pub fn merge(&mut self, fields: FieldMap) -> usize {
        let mut merged = 0;
        for (key, value) in fields {
            if is_filled(&value) {
                self.fields.insert(key, value);
                merged += 1;
            }
        }
        merged
    }

    pub fn company_domain(&self) -> Option<&str> {
        self.get_str("company_domain")
    }

    pub fn company_name(&self) -> Option<&str> {
        self.get_str("company_name")
    }

    pub fn completeness_score(&self) -> Option<u8> {
        self.fields
            .get("completeness_score")
            .and_then(Value::as_u64)
            .map(|s| s.min(100) as u8)
    }

    pub fn enrichment_timestamp(&self) -> Option<&str> {
        self.get_str("enrichment_timestamp")
    }
}

// ============ Intent ============

/// One indicator that an organization is researching a topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentSignal {
    pub source: String,
    pub topic: String,
    /// Signal strength on a 0-100 scale.
    pub strength: f64,
    pub observed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuyingStage {
    #[default]
    Unknown,
    Awareness,
    Consideration,
    Decision,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IntentResult {
    pub intent_score: u8,
    pub signals: Vec<IntentSignal>,
    pub buying_stage: BuyingStage,
    pub priority_topics: Vec<String>,
}

// ============ Insight ============

/// Shared input handed to every qualification backend.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisContext {
    pub lead_profile: Lead,
    pub intent_data: IntentResult,
    pub competitive_landscape: Value,
    pub market_intelligence: Value,
}

/// What a single qualification backend returns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendAnalysis {
    pub qualification_score: f64,
    pub insights: Vec<String>,
    pub approach: String,
    pub talking_points: Vec<String>,
    pub objections: Vec<String>,
    pub next_actions: Vec<String>,
}

/// Reconciled qualification output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insight {
    pub qualification_score: u8,
    pub key_insights: Vec<String>,
    pub recommended_approach: String,
    pub talking_points: Vec<String>,
    pub objection_handling: Vec<String>,
    pub next_best_actions: Vec<String>,
    /// Backends whose analyses were folded into this insight.
    pub contributing_backends: Vec<String>,
}

// ============ Automation ============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    PremiumOutreach,
    StandardOutreach,
    NurtureSequence,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::PremiumOutreach => "premium_outreach",
            Strategy::StandardOutreach => "standard_outreach",
            Strategy::NurtureSequence => "nurture_sequence",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An outreach mechanism executed independently of the others.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    VoiceCall,
    PersonalizedEmail,
    LinkedinConnection,
    EmailSequence,
    LinkedinMessage,
    EmailNurture,
    ContentSharing,
}

impl Channel {
    pub const ALL: [Channel; 7] = [
        Channel::VoiceCall,
        Channel::PersonalizedEmail,
        Channel::LinkedinConnection,
        Channel::EmailSequence,
        Channel::LinkedinMessage,
        Channel::EmailNurture,
        Channel::ContentSharing,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::VoiceCall => "voice_call",
            Channel::PersonalizedEmail => "personalized_email",
            Channel::LinkedinConnection => "linkedin_connection",
            Channel::EmailSequence => "email_sequence",
            Channel::LinkedinMessage => "linkedin_message",
            Channel::EmailNurture => "email_nurture",
            Channel::ContentSharing => "content_sharing",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Channel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Channel::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == s.trim())
            .ok_or_else(|| format!("unknown channel tag '{}'", s))
    }
}

/// When the first touch goes out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutreachTiming {
    pub initial_delay_hours: u32,
    /// Preferred local send window, `HH:MM-HH:MM`.
    pub send_window: String,
    pub preferred_days: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowUp {
    pub day_offset: u32,
    pub channel: Channel,
    pub action: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutomationPlan {
    pub strategy: Strategy,
    pub channels: Vec<Channel>,
    pub timing: OutreachTiming,
    pub personalization_tokens: BTreeMap<String, String>,
    pub follow_up_schedule: Vec<FollowUp>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelStatus {
    Ok,
    Error,
    NotImplemented,
}

/// Outcome of one planned channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelExecution {
    pub channel: Channel,
    pub status: ChannelStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Aggregated fan-out outcome; one entry per planned channel, in plan order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub status: String,
    pub channels_executed: usize,
    pub results: Vec<ChannelExecution>,
    pub timestamp: DateTime<Utc>,
}

impl ExecutionResult {
    pub fn get(&self, channel: Channel) -> Option<&ChannelExecution> {
        self.results.iter().find(|r| r.channel == channel)
    }
}

// ============ Persistence ============

/// Unit of persistence handed to the knowledge writer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositeRecord {
    pub lead: Lead,
    pub intent: IntentResult,
    pub insight: Insight,
    pub plan: AutomationPlan,
    pub execution_result: ExecutionResult,
    pub created_at: DateTime<Utc>,
}

/// Denormalized summary stored next to the embedding for join-free retrieval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexSummary {
    pub lead_profile: String,
    pub insights: String,
    pub qualification_score: u8,
}

/// A competitor relationship detected for a lead's company.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompetitorAnalysis {
    pub is_competitor_customer: bool,
    pub competitor_name: Option<String>,
    pub details: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompetitiveIntelRecord {
    pub competitor: String,
    pub customer: String,
    pub intelligence_type: String,
    pub data: Value,
    pub timestamp: DateTime<Utc>,
}

// ============ API Models ============

/// Result summary returned to the caller of `process_lead`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineSummary {
    pub record_id: Uuid,
    pub enrichment_score: u8,
    pub intent_score: u8,
    pub qualification_score: u8,
    pub strategy: Strategy,
    pub automation_status: String,
    pub next_actions: Vec<String>,
    /// Secondary stores that did not receive the record.
    pub degraded_persistence: Vec<String>,
}
