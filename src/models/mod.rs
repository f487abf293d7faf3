pub mod metrics;
pub mod otp;
pub mod transaction;
pub mod user;

pub use metrics::*;
pub use otp::*;
pub use transaction::*;
pub use user::*;
