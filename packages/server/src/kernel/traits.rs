// Trait definitions for dependency injection
//
// These are INFRASTRUCTURE traits only - no business logic.
// Business logic (what to send, when to classify) lives in domain functions
// that use these traits.
//
// Naming convention: Base* for trait names (e.g., BaseSmsService)

use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

// =============================================================================
// SMS Gateway Trait
// =============================================================================

/// Outbound SMS delivery. The core treats delivery as fire-and-log; it does
/// not depend on the gateway's retry or delivery-status semantics.
#[async_trait]
pub trait BaseSmsService: Send + Sync {
    /// Send a message, returning the provider's delivery SID.
    async fn send(&self, to: &str, body: &str) -> Result<String>;
}

// =============================================================================
// Text Classifier Trait
// =============================================================================

/// A structured judgment from the external text classifier.
///
/// `level` is on the 1-5 functional-impact scale; `confidence` is in [0, 1].
#[derive(Debug, Clone)]
pub struct ClassifierJudgment {
    pub level: i32,
    pub confidence: f64,
    pub rationale: String,
}

/// External free-text classification. Implementations must enforce a hard
/// call timeout and signal failure distinctly from a low-confidence success;
/// the classification pipeline falls back to regex matching on `Err`.
#[async_trait]
pub trait BaseClassifierService: Send + Sync {
    async fn classify(&self, text: &str) -> Result<ClassifierJudgment>;
}

// =============================================================================
// Report Generation Trait
// =============================================================================

/// Report generation collaborator. Out of core scope beyond the call itself.
#[async_trait]
pub trait BaseReportService: Send + Sync {
    async fn generate(&self, patient_id: Uuid) -> Result<()>;
}
