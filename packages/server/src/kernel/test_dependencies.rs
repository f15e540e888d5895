// TestDependencies - mock implementations for testing
//
// Provides mock services that can be injected into ServerKernel for tests.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use crate::common::EngagementError;

use super::{BaseClassifierService, BaseReportService, BaseSmsService, ClassifierJudgment};

// =============================================================================
// Mock SMS Service
// =============================================================================

pub struct MockSmsService {
    sent: Arc<Mutex<Vec<(String, String)>>>,
    fail: bool,
}

impl MockSmsService {
    pub fn new() -> Self {
        Self {
            sent: Arc::new(Mutex::new(Vec::new())),
            fail: false,
        }
    }

    /// Make every send fail (delivery outage simulation)
    pub fn failing() -> Self {
        Self {
            sent: Arc::new(Mutex::new(Vec::new())),
            fail: true,
        }
    }

    /// Get all (to, body) pairs that were sent
    pub fn sent_messages(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }

    /// Check whether any message was sent to the given number
    pub fn was_sent_to(&self, to: &str) -> bool {
        self.sent.lock().unwrap().iter().any(|(t, _)| t == to)
    }

    /// Number of messages sent
    pub fn send_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

impl Default for MockSmsService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BaseSmsService for MockSmsService {
    async fn send(&self, to: &str, body: &str) -> Result<String> {
        if self.fail {
            return Err(anyhow!("mock SMS gateway unavailable"));
        }
        self.sent
            .lock()
            .unwrap()
            .push((to.to_string(), body.to_string()));
        Ok(format!("SM{}", Uuid::new_v4().simple()))
    }
}

// =============================================================================
// Mock Classifier Service
// =============================================================================

pub struct MockClassifierService {
    responses: Arc<Mutex<Vec<ClassifierJudgment>>>,
    calls: Arc<Mutex<Vec<String>>>,
    unavailable: bool,
}

impl MockClassifierService {
    pub fn new() -> Self {
        Self {
            responses: Arc::new(Mutex::new(Vec::new())),
            calls: Arc::new(Mutex::new(Vec::new())),
            unavailable: false,
        }
    }

    /// A classifier that always fails (timeout/outage simulation)
    pub fn unavailable() -> Self {
        Self {
            responses: Arc::new(Mutex::new(Vec::new())),
            calls: Arc::new(Mutex::new(Vec::new())),
            unavailable: true,
        }
    }

    /// Queue a judgment to be returned by the next classify call
    pub fn with_judgment(self, level: i32, confidence: f64) -> Self {
        self.responses.lock().unwrap().push(ClassifierJudgment {
            level,
            confidence,
            rationale: "mock judgment".to_string(),
        });
        self
    }

    /// Get all texts that were classified
    pub fn classify_calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl Default for MockClassifierService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BaseClassifierService for MockClassifierService {
    async fn classify(&self, text: &str) -> Result<ClassifierJudgment> {
        self.calls.lock().unwrap().push(text.to_string());

        if self.unavailable {
            return Err(
                EngagementError::Transient("mock classifier unavailable".to_string()).into(),
            );
        }

        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            return Err(anyhow!("mock classifier has no queued judgment"));
        }
        Ok(responses.remove(0))
    }
}

// =============================================================================
// Mock Report Service
// =============================================================================

pub struct MockReportService {
    generated: Arc<Mutex<Vec<Uuid>>>,
}

impl MockReportService {
    pub fn new() -> Self {
        Self {
            generated: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn generated_for(&self) -> Vec<Uuid> {
        self.generated.lock().unwrap().clone()
    }
}

impl Default for MockReportService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BaseReportService for MockReportService {
    async fn generate(&self, patient_id: Uuid) -> Result<()> {
        self.generated.lock().unwrap().push(patient_id);
        Ok(())
    }
}
