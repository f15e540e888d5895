// ServerKernel - core infrastructure with all dependencies
//
// The ServerKernel holds all server dependencies (database, SMS gateway,
// classifier) and provides access via traits for testability.

use sqlx::PgPool;
use std::sync::Arc;

use super::{BaseClassifierService, BaseReportService, BaseSmsService};

/// ServerKernel holds all server dependencies
pub struct ServerKernel {
    pub db_pool: PgPool,
    pub sms: Arc<dyn BaseSmsService>,
    pub classifier: Arc<dyn BaseClassifierService>,
    pub reports: Arc<dyn BaseReportService>,
}

impl ServerKernel {
    /// Creates a new ServerKernel with the given dependencies
    pub fn new(
        db_pool: PgPool,
        sms: Arc<dyn BaseSmsService>,
        classifier: Arc<dyn BaseClassifierService>,
        reports: Arc<dyn BaseReportService>,
    ) -> Self {
        Self {
            db_pool,
            sms,
            classifier,
            reports,
        }
    }
}
