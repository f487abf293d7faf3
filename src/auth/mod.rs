pub mod jwt;
pub mod middleware;
pub mod claims;

#[cfg(test)]
mod tests;

pub use jwt::*;
pub use middleware::*;
pub use claims::*;
