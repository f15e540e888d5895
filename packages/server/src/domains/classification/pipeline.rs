//! The response classification pipeline.
//!
//! Maps arbitrary inbound text to a 1-5 functional-impact level with an
//! explicit confidence signal and a caller-facing action, so callers never
//! need to know the thresholds. Decision order, short-circuiting at the
//! first match: numeric passthrough, external classifier, regex fallback.

use tracing::warn;

use crate::domains::sprints::ResponseMethod;
use crate::kernel::BaseClassifierService;

use super::fallback;

/// Confidence at or above which a result is recorded immediately.
pub const ACCEPT_THRESHOLD: f64 = 0.80;

/// Confidence at or above which (but below accept) the patient is asked to
/// confirm the specific level before recording.
pub const CLARIFY_THRESHOLD: f64 = 0.60;

/// What the caller should do with a classification result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassificationAction {
    /// Record immediately
    Accept,
    /// Ask the patient to confirm the level before recording
    Clarify,
    /// Discard and show the full scale again
    Reprompt,
}

#[derive(Debug, Clone)]
pub struct ClassificationOutcome {
    pub level: i32,
    pub confidence: f64,
    pub method: ResponseMethod,
    pub action: ClassificationAction,
    pub rationale: Option<String>,
}

/// Map a confidence score to an action. Lower bounds are inclusive:
/// 0.80 accepts, 0.79 and 0.60 clarify, 0.59 reprompts.
pub fn route(confidence: f64) -> ClassificationAction {
    if confidence >= ACCEPT_THRESHOLD {
        ClassificationAction::Accept
    } else if confidence >= CLARIFY_THRESHOLD {
        ClassificationAction::Clarify
    } else {
        ClassificationAction::Reprompt
    }
}

/// Round to two decimal places for stable comparisons and storage.
fn round_confidence(confidence: f64) -> f64 {
    (confidence * 100.0).round() / 100.0
}

fn outcome(level: i32, confidence: f64, method: ResponseMethod, rationale: Option<String>) -> ClassificationOutcome {
    let confidence = round_confidence(confidence);
    ClassificationOutcome {
        level,
        confidence,
        method,
        action: route(confidence),
        rationale,
    }
}

/// Classify inbound text. Returns None when the text is unparseable by all
/// three stages; the caller must re-prompt with the full explicit scale.
pub async fn classify(
    text: &str,
    classifier: &dyn BaseClassifierService,
) -> Option<ClassificationOutcome> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }

    // 1. Numeric passthrough: no external call for a bare "1".."5".
    if let Some(level) = parse_bare_level(trimmed) {
        return Some(outcome(level, 1.0, ResponseMethod::Numeric, None));
    }

    // 2. External classification.
    match classifier.classify(trimmed).await {
        Ok(judgment) if (1..=5).contains(&judgment.level) => {
            return Some(outcome(
                judgment.level,
                judgment.confidence.clamp(0.0, 1.0),
                ResponseMethod::AiParsed,
                Some(judgment.rationale),
            ));
        }
        Ok(judgment) => {
            warn!(level = judgment.level, "classifier returned out-of-range level");
        }
        Err(e) => {
            warn!(error = %e, "classifier unavailable, falling back to regex");
        }
    }

    // 3. Regex fallback.
    fallback::match_level(trimmed)
        .map(|(level, confidence)| outcome(level, confidence, ResponseMethod::RegexFallback, None))
}

/// Exactly one of "1".."5", nothing else.
fn parse_bare_level(trimmed: &str) -> Option<i32> {
    if trimmed.len() == 1 {
        match trimmed {
            "1" => Some(1),
            "2" => Some(2),
            "3" => Some(3),
            "4" => Some(4),
            "5" => Some(5),
            _ => None,
        }
    } else {
        None
    }
}
