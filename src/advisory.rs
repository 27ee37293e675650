//! Narrative commentary on a projection, produced by a remote
//! chat-completions model. Every failure here degrades to a text message;
//! nothing in this module can change a `SimulationResult`.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::core::{FinancialSettings, SimulationResult};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
const SAMPLE_EVERY_YEARS: usize = 5;

#[derive(Debug, Error)]
pub enum AdvisoryError {
    #[error("no advisor API key configured")]
    MissingApiKey,
    #[error("advisor request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("advisor returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("advisor returned an empty response")]
    EmptyResponse,
}

#[derive(Debug, Clone)]
pub struct AdvisorConfig {
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
}

impl Default for AdvisorConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_key: None,
            timeout: Duration::from_secs(30),
        }
    }
}

/// A single sampled year as sent to the advisor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrajectoryPoint {
    pub age: i32,
    pub balance: f64,
    pub shortfall: f64,
}

/// Keeps every 5th year, the retirement year, and every year the portfolio
/// is at or below zero.
pub fn downsample(settings: &FinancialSettings, result: &SimulationResult) -> Vec<TrajectoryPoint> {
    result
        .data
        .iter()
        .enumerate()
        .filter(|(index, year)| {
            index % SAMPLE_EVERY_YEARS == 0
                || year.age == settings.retirement_age
                || year.balance <= 0.0
        })
        .map(|(_, year)| TrajectoryPoint {
            age: year.age,
            balance: year.balance.round(),
            shortfall: year.shortfall.round(),
        })
        .collect()
}

pub fn build_prompt(
    settings: &FinancialSettings,
    result: &SimulationResult,
    question: Option<&str>,
) -> String {
    let points = downsample(settings, result);
    let trajectory = serde_json::to_string(&points).unwrap_or_else(|_| "[]".to_string());
    let verdict = match result.depletion_age {
        Some(age) => format!("Savings run out at age {age}."),
        None => format!(
            "Savings last through age {} with a final balance of {:.0}.",
            settings.planning_horizon, result.final_balance
        ),
    };

    let mut prompt = format!(
        "Review this retirement projection.\n\
         Current age: {}. Retirement age: {}. Plan through age: {}.\n\
         Monthly spending target (today's dollars): {:.0}. Inflation: {}%.\n\
         {verdict}\n\
         Trajectory (age, year-end balance, shortfall): {trajectory}\n",
        settings.current_age,
        settings.retirement_age,
        settings.planning_horizon,
        settings.monthly_spending,
        settings.inflation_rate,
    );
    match question {
        Some(q) if !q.trim().is_empty() => {
            prompt.push_str("Question: ");
            prompt.push_str(q.trim());
            prompt.push('\n');
        }
        _ => prompt.push_str(
            "Give three short, concrete observations about the plan's risks and levers.\n",
        ),
    }
    prompt
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f64,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

const SYSTEM_PROMPT: &str = "You are a careful retirement-planning assistant. \
Comment on the projection you are given; do not recompute it.";

#[derive(Debug, Clone)]
pub struct AdvisoryClient {
    client: Client,
    config: AdvisorConfig,
}

impl AdvisoryClient {
    pub fn new(config: AdvisorConfig) -> Self {
        Self {
            client: Client::builder()
                .timeout(config.timeout)
                .build()
                .unwrap_or_else(|_| Client::new()),
            config,
        }
    }

    /// Always returns displayable text, falling back to an error message.
    pub async fn narrate(
        &self,
        settings: &FinancialSettings,
        result: &SimulationResult,
        question: Option<&str>,
    ) -> String {
        match self.try_narrate(settings, result, question).await {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "advisory call failed");
                format!("Unable to generate advice: {e}")
            }
        }
    }

    pub async fn try_narrate(
        &self,
        settings: &FinancialSettings,
        result: &SimulationResult,
        question: Option<&str>,
    ) -> Result<String, AdvisoryError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or(AdvisoryError::MissingApiKey)?;

        let prompt = build_prompt(settings, result, question);
        let body = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt,
                },
            ],
            temperature: 0.4,
        };

        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));
        debug!(%url, model = %self.config.model, "requesting advice");
        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AdvisoryError::Status {
                status: status.as_u16(),
                body: truncate(&body, 200),
            });
        }

        let parsed = response.json::<ChatResponse>().await?;
        parsed
            .choices
            .into_iter()
            .filter_map(|c| c.message.content)
            .map(|c| c.trim().to_string())
            .find(|c| !c.is_empty())
            .ok_or(AdvisoryError::EmptyResponse)
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
