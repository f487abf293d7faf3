pub mod advisory_service;
pub mod confirmation_workflow;
pub mod notification_service;
pub mod otp_service;
pub mod risk_scorer;
pub mod transaction_ledger;
pub mod user_directory;

pub use advisory_service::{AdvisoryService, Advisory, RecommendedAction};
pub use confirmation_workflow::*;
pub use notification_service::*;
pub use otp_service::*;
pub use risk_scorer::*;
pub use transaction_ledger::*;
pub use user_directory::{DirectoryError, UserDirectory};
