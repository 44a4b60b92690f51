//! Centralized error handling for the row pipeline
//!
//! Errors are layered the same way the pipeline is:
//!
//! - **Field errors**: a single column failed its business-rule check
//! - **Rule errors**: a Field Rule failed (shape, missing column, field error, panic)
//! - **Validation errors**: the row-level outcome reported to the driver
//! - **Cache errors**: the external key/value store rejected an operation
//! - **Config errors**: the configuration file could not be loaded or is invalid
//!
//! # Usage
//!
//! ```rust
//! use row_pipeline::errors::{FieldError, RuleError};
//!
//! fn check_rate(rate: f64) -> Result<(), RuleError> {
//!     if !(5.0..=35.0).contains(&rate) {
//!         return Err(FieldError::InterestRateOutOfRange.into());
//!     }
//!     Ok(())
//! }
//! ```

pub mod types;

pub use types::*;

/// Convenience type alias for Results using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Result of a single Field Rule invocation
pub type RuleResult = Result<Option<crate::validator::PooledRecord>, RuleError>;

/// Convenience type alias for store operations
pub type CacheResult<T> = Result<T, CacheError>;

/// Convenience type alias for configuration loading
pub type ConfigResult<T> = Result<T, ConfigError>;
