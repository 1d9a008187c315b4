pub mod error;
pub mod logger;
pub mod monitor;
pub mod normalize;
pub mod retry;
pub mod validation;
