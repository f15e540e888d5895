// Report generation stub
//
// Report/PDF generation is an external collaborator; the core only owns the
// delegation call from the REPORT_GENERATION job handler.

use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

use super::BaseReportService;

/// Logs the delegation and returns. The real collaborator is wired in by the
/// surrounding platform.
pub struct LoggingReportService;

#[async_trait]
impl BaseReportService for LoggingReportService {
    async fn generate(&self, patient_id: Uuid) -> Result<()> {
        tracing::info!(patient_id = %patient_id, "delegating report generation");
        Ok(())
    }
}
