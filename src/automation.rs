/// Automation routing and multi-channel execution
///
/// Routing is a pure function of the qualification and intent scores, evaluated
/// top-down with the first matching rule winning:
///
/// | qualification | intent      | strategy          |
/// |---------------|-------------|-------------------|
/// | > 80 and      | > 70        | premium_outreach  |
/// | > 60 or       | > 50        | standard_outreach |
/// | otherwise     |             | nurture_sequence  |
///
/// Execution runs each planned channel's executor concurrently. A failure only
/// marks its own channel; a channel with no executor is reported as not
/// implemented. The overall status is "completed" once every channel has an entry.
use crate::config::PipelineSettings;
use crate::errors::AppError;
use crate::isolation::guarded;
use crate::models::{
    AutomationPlan, Channel, ChannelExecution, ChannelStatus, ExecutionResult, FollowUp, Insight,
    IntentResult, Lead, OutreachTiming, Strategy,
};
use async_trait::async_trait;
use chrono::Utc;
use futures::future::join_all;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

pub const EXECUTION_COMPLETED: &str = "completed";

/// Executes one outreach channel for a plan.
#[async_trait]
pub trait ChannelExecutor: Send + Sync {
    async fn execute(&self, channel: Channel, plan: &AutomationPlan) -> Result<Value, AppError>;
}

/// Picks the strategy for a score pair.
pub fn choose_strategy(qualification_score: u8, intent_score: u8) -> Strategy {
    if qualification_score > 80 && intent_score > 70 {
        Strategy::PremiumOutreach
    } else if qualification_score > 60 || intent_score > 50 {
        Strategy::StandardOutreach
    } else {
        Strategy::NurtureSequence
    }
}

pub fn channels_for(strategy: Strategy) -> Vec<Channel> {
    match strategy {
        Strategy::PremiumOutreach => vec![
            Channel::VoiceCall,
            Channel::PersonalizedEmail,
            Channel::LinkedinConnection,
        ],
        Strategy::StandardOutreach => vec![Channel::EmailSequence, Channel::LinkedinMessage],
        Strategy::NurtureSequence => vec![Channel::EmailNurture, Channel::ContentSharing],
    }
}

fn timing_for(strategy: Strategy) -> OutreachTiming {
    let (delay, window) = match strategy {
        Strategy::PremiumOutreach => (0, "09:00-11:00"),
        Strategy::StandardOutreach => (24, "10:00-12:00"),
        Strategy::NurtureSequence => (72, "14:00-16:00"),
    };
    OutreachTiming {
        initial_delay_hours: delay,
        send_window: window.to_string(),
        preferred_days: ["tuesday", "wednesday", "thursday"]
            .iter()
            .map(|d| d.to_string())
            .collect(),
    }
}

fn follow_up_schedule(strategy: Strategy) -> Vec<FollowUp> {
    let steps: &[(u32, Channel, &str)] = match strategy {
        Strategy::PremiumOutreach => &[
            (1, Channel::PersonalizedEmail, "send call recap"),
            (3, Channel::VoiceCall, "follow-up call"),
            (7, Channel::PersonalizedEmail, "share case study"),
        ],
        Strategy::StandardOutreach => &[
            (3, Channel::EmailSequence, "second sequence step"),
            (7, Channel::LinkedinMessage, "check in on LinkedIn"),
            (14, Channel::EmailSequence, "break-up email"),
        ],
        Strategy::NurtureSequence => &[
            (7, Channel::ContentSharing, "share relevant content"),
            (14, Channel::ContentSharing, "share industry report"),
            (30, Channel::EmailNurture, "re-engagement email"),
        ],
    };
    steps
        .iter()
        .map(|(day, channel, action)| FollowUp {
            day_offset: *day,
            channel: *channel,
            action: action.to_string(),
        })
        .collect()
}

/// Builds the plan for a score pair. Identical inputs always yield an identical plan.
pub fn route(qualification_score: u8, intent_score: u8) -> AutomationPlan {
    let strategy = choose_strategy(qualification_score, intent_score);
    AutomationPlan {
        strategy,
        channels: channels_for(strategy),
        timing: timing_for(strategy),
        personalization_tokens: BTreeMap::new(),
        follow_up_schedule: follow_up_schedule(strategy),
    }
}

/// Personalization tokens for outreach copy. Never changes the routing decision.
pub fn personalization_tokens(
    lead: &Lead,
    intent: &IntentResult,
    insight: &Insight,
) -> BTreeMap<String, String> {
    let mut tokens = BTreeMap::new();
    for field in ["first_name", "last_name", "company_name", "title"] {
        if let Some(value) = lead.get_str(field) {
            tokens.insert(field.to_string(), value.to_string());
        }
    }
    if let Some(topic) = intent.priority_topics.first() {
        tokens.insert("top_intent_topic".to_string(), topic.clone());
    }
    if let Some(point) = insight.talking_points.first() {
        tokens.insert("opening_talking_point".to_string(), point.clone());
    }
    tokens
}

/// Runs every planned channel through its registered executor.
pub struct ExecutionFanout {
    executors: HashMap<Channel, Arc<dyn ChannelExecutor>>,
    timeout: Duration,
}

impl ExecutionFanout {
    pub fn new(
        executors: HashMap<Channel, Arc<dyn ChannelExecutor>>,
        settings: &PipelineSettings,
    ) -> Self {
        Self {
            executors,
            timeout: settings.channel_timeout(),
        }
    }

    pub async fn execute(&self, plan: &AutomationPlan) -> ExecutionResult {
        let runs = plan.channels.iter().map(|channel| self.run_channel(*channel, plan));
        let results = join_all(runs).await;

        let failed = results
            .iter()
            .filter(|r| r.status == ChannelStatus::Error)
            .count();
        tracing::info!(
            "Executed {} channel(s) for {} ({} failed)",
            results.len(),
            plan.strategy,
            failed
        );

        ExecutionResult {
            status: EXECUTION_COMPLETED.to_string(),
            channels_executed: results.len(),
            results,
            timestamp: Utc::now(),
        }
    }

    async fn run_channel(&self, channel: Channel, plan: &AutomationPlan) -> ChannelExecution {
        let Some(executor) = self.executors.get(&channel) else {
            tracing::debug!("No executor registered for channel {}", channel);
            return ChannelExecution {
                channel,
                status: ChannelStatus::NotImplemented,
                payload: None,
                error: None,
            };
        };

        match guarded(channel.as_str(), self.timeout, executor.execute(channel, plan)).await {
            Ok(payload) => ChannelExecution {
                channel,
                status: ChannelStatus::Ok,
                payload: Some(payload),
                error: None,
            },
            Err(failure) => {
                tracing::warn!("Channel {} failed: {}", channel, failure.cause);
                ChannelExecution {
                    channel,
                    status: ChannelStatus::Error,
                    payload: None,
                    error: Some(failure.cause),
                }
            }
        }
    }
}
