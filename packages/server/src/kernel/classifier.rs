// Classifier implementation using OpenAI via rig
//
// This is the infrastructure implementation of BaseClassifierService.
// The decision logic (numeric short-circuit, confidence routing, fallback)
// lives in domains::classification, not here.

use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use rig::completion::Prompt;
use rig::providers::openai;
use serde::Deserialize;

use crate::common::EngagementError;

use super::{BaseClassifierService, ClassifierJudgment};

/// Fixed instruction context describing the 1-5 functional-impact scale and
/// the domain disambiguation rules.
const CLASSIFIER_PREAMBLE: &str = "\
You classify a patient's daily text message onto a 1-5 headache \
functional-impact scale:

1 = no headache, fully functional day
2 = headache present but minimal impact on activities
3 = headache with moderate impact; pushed through work or activities
4 = headache forced cancelling or significantly modifying activities
5 = headache was completely disabling; unable to function

Rules:
- Any mention of headache symptoms rules out level 1.
- Acute (abortive) medication use implies at least level 3.
- If the message embeds an explicit number 1-5 describing the day, extract \
it directly.

Respond with ONLY a JSON object: \
{\"level\": <1-5>, \"confidence\": <0.0-1.0>, \"rationale\": \"<one sentence>\"}";

#[derive(Debug, Deserialize)]
struct RawJudgment {
    level: i32,
    confidence: f64,
    rationale: String,
}

/// OpenAI-backed classifier with a hard per-call timeout.
pub struct OpenAIClassifier {
    client: openai::Client,
    timeout: Duration,
}

impl OpenAIClassifier {
    pub fn new(api_key: &str, timeout: Duration) -> Self {
        Self {
            client: openai::Client::new(api_key),
            timeout,
        }
    }

    /// Pull the JSON object out of a model response that may be wrapped in
    /// code fences or surrounding prose.
    fn extract_json(response: &str) -> Result<&str> {
        let start = response
            .find('{')
            .ok_or_else(|| anyhow!("no JSON object in classifier response"))?;
        let end = response
            .rfind('}')
            .ok_or_else(|| anyhow!("unterminated JSON object in classifier response"))?;
        Ok(&response[start..=end])
    }
}

#[async_trait]
impl BaseClassifierService for OpenAIClassifier {
    async fn classify(&self, text: &str) -> Result<ClassifierJudgment> {
        let agent = self
            .client
            .agent(openai::GPT_4O)
            .preamble(CLASSIFIER_PREAMBLE)
            .max_tokens(256)
            .build();

        let prompt = format!("Patient message: {}", text);

        // Timeouts and call failures are transient: the pipeline recovers
        // with the regex fallback rather than surfacing them.
        let response = tokio::time::timeout(self.timeout, agent.prompt(&prompt))
            .await
            .map_err(|_| {
                EngagementError::Transient(format!(
                    "classifier call exceeded {:?} timeout",
                    self.timeout
                ))
            })?
            .map_err(|e| {
                tracing::warn!(error = %e, "classifier call failed");
                EngagementError::Transient(format!("classifier call failed: {}", e))
            })?;

        let raw: RawJudgment = serde_json::from_str(Self::extract_json(&response)?)
            .context("Failed to parse classifier JSON response")?;

        if !(1..=5).contains(&raw.level) {
            bail!("classifier returned out-of-range level {}", raw.level);
        }
        if !(0.0..=1.0).contains(&raw.confidence) {
            bail!(
                "classifier returned out-of-range confidence {}",
                raw.confidence
            );
        }

        tracing::debug!(
            level = raw.level,
            confidence = raw.confidence,
            "classifier judgment received"
        );

        Ok(ClassifierJudgment {
            level: raw.level,
            confidence: raw.confidence,
            rationale: raw.rationale,
        })
    }
}
