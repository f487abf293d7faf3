pub mod masking;
pub mod math;
pub mod time;

pub use masking::*;
pub use math::*;
pub use time::*;
