//! Kernel module - server infrastructure and dependencies.

pub mod classifier;
pub mod jobs;
pub mod report;
pub mod server_kernel;
pub mod sms;
pub mod test_dependencies;
pub mod traits;

pub use classifier::OpenAIClassifier;
pub use report::LoggingReportService;
pub use server_kernel::ServerKernel;
pub use sms::TwilioSmsService;
pub use traits::{
    BaseClassifierService, BaseReportService, BaseSmsService, ClassifierJudgment,
};
