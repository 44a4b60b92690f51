//! Error type definitions for the row pipeline
//!
//! Field and rule errors are `Clone` because a row failure is both returned
//! to the caller of `validate` and handed to the error pipeline.

use thiserror::Error;

/// Top-level application error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// External store errors
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    /// Validator pool errors
    #[error("Pool error: {0}")]
    Pool(#[from] PoolError),

    /// Input read errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Business-rule failures for a single column or column group
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FieldError {
    // Loan amount
    #[error("loan amount is not a number")]
    LoanAmountNotNumber,
    #[error("loan amount is not a positive number")]
    LoanAmountNotPositive,
    #[error("funding amount is not a number")]
    FundingAmountNotNumber,
    #[error("funding amount is not a positive number")]
    FundingAmountNotPositive,
    #[error("funding inv amt is not a number")]
    FundingInvAmtNotNumber,
    #[error("funding inv amt is not a positive number")]
    FundingInvAmtNotPositive,
    #[error("funding inv amt is not equal to funding amount")]
    FundingInvAmtNotEqual,

    // Interest rate
    #[error("interest rate is not a number")]
    InterestRateNotNumber,
    #[error("interest rate is not between 5% and 35%")]
    InterestRateOutOfRange,

    // Term
    #[error("term is not a number")]
    TermNotNumber,
    #[error("term is not between 12 and 72 months")]
    TermOutOfRange,

    // Grade and subgrade
    #[error("grade must be a single letter from A to G")]
    GradeInvalid,
    #[error("subgrade must be the grade letter followed by a number from 1 to 5")]
    SubgradeInvalid,

    // Employment
    #[error("employment title is empty")]
    EmpTitleEmpty,
    #[error("employment length is empty")]
    EmpLengthEmpty,
    #[error("employment length is not stable (5-10+ years)")]
    EmpLengthNotStable,

    // DTI and home ownership
    #[error("DTI is not a number")]
    DtiNotNumber,
    #[error("DTI is not less than 20")]
    DtiTooHigh,
    #[error("home ownership is not MORTGAGE or OWN")]
    HomeOwnershipInvalid,

    // Income
    #[error("annual income is not a number")]
    AnnualIncNotNumber,
    #[error("annual income is not greater than 40,000")]
    AnnualIncTooLow40K,
    #[error("annual income is not greater than 30,000")]
    AnnualIncTooLow30K,

    // Credit history
    #[error("earliest credit line is empty")]
    EarliestCrLineEmpty,
    #[error("earliest credit line is not in valid format (YYYY-MM)")]
    EarliestCrLineFormat,
    #[error("earliest credit line is not more than 10 years ago")]
    EarliestCrLineTooRecent,

    // FICO
    #[error("FICO range low is not a number")]
    FicoRangeLowNotNumber,
    #[error("FICO range high is not a number")]
    FicoRangeHighNotNumber,
    #[error("FICO range low is less than 660")]
    FicoRangeLowTooLow,
    #[error("FICO range high is greater than 850")]
    FicoRangeHighTooHigh,

    // Accounts
    #[error("total accounts is not a number")]
    TotalAccNotNumber,
    #[error("open accounts is not a number")]
    OpenAccNotNumber,
    #[error("total accounts is less than 5")]
    TotalAccTooFew,
    #[error("open accounts is less than 2")]
    OpenAccTooFew,

    // Public records
    #[error("public records is not a number")]
    PubRecNotNumber,
    #[error("public record bankruptcies is not a number")]
    PubRecBankruptciesNotNumber,
    #[error("tax liens is not a number")]
    TaxLiensNotNumber,
    #[error("public records is not zero")]
    PubRecNotZero,
    #[error("public record bankruptcies is not zero")]
    PubRecBankruptciesNotZero,
    #[error("tax liens is not zero")]
    TaxLiensNotZero,

    // Verification
    #[error("verification status is not Source Verified or Verified")]
    VerificationStatusInvalid,
}

/// Failure of one Field Rule against one row
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuleError {
    /// Shape error: the row does not have the configured number of columns
    #[error("expected {expected} columns, got {actual}")]
    ColumnCount { expected: usize, actual: usize },

    /// A rule read past the end of a short row
    #[error("column {index} is missing (row has {len} columns)")]
    MissingColumn { index: usize, len: usize },

    /// A column failed its business-rule check
    #[error(transparent)]
    Field(#[from] FieldError),

    /// The rule panicked; only its row fails
    #[error("rule '{rule}' panicked: {message}")]
    Panicked { rule: String, message: String },

    /// A cross-row lookup against the store failed
    #[error("store lookup failed: {0}")]
    Lookup(#[from] CacheError),

    /// Free-form failure for rules outside the bundled set
    #[error("{message}")]
    Custom { message: String },
}

impl RuleError {
    /// Create a free-form rule error
    pub fn custom<S: Into<String>>(message: S) -> Self {
        Self::Custom {
            message: message.into(),
        }
    }

    /// Shape and missing-column errors, as opposed to field-level failures
    pub fn is_shape_error(&self) -> bool {
        matches!(self, Self::ColumnCount { .. } | Self::MissingColumn { .. })
    }
}

/// Row-level outcome reported by the row validator
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The first Field Rule failure for the row
    #[error(transparent)]
    Rule(#[from] RuleError),

    /// The row validator was closed and performed no work
    #[error("row validator is closed")]
    Closed,

    /// The write-back queue no longer accepts records
    #[error("write-back queue is closed")]
    WriteBackClosed,

    /// The error queue no longer accepts failures
    #[error("error queue is closed")]
    ErrorQueueClosed,

    /// A rule task was torn down by the runtime before reporting
    #[error("rule task failed: {message}")]
    TaskFailed { message: String },
}

/// Validator pool errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    /// The pool has been closed and no longer hands out validators
    #[error("validator pool is closed")]
    Closed,
}

/// External key/value store errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// The client has been closed
    #[error("cache client is closed")]
    Closed,

    /// The key holds a value of a different kind than the operation expects
    #[error("wrong type for key '{key}': expected {expected}")]
    WrongType { key: String, expected: &'static str },

    /// The store rejected or failed the operation
    #[error("{operation} failed for key '{key}': {message}")]
    Operation {
        operation: &'static str,
        key: String,
        message: String,
    },
}

impl CacheError {
    /// Create an operation failure
    pub fn operation<K: Into<String>, M: Into<String>>(
        operation: &'static str,
        key: K,
        message: M,
    ) -> Self {
        Self::Operation {
            operation,
            key: key.into(),
            message: message.into(),
        }
    }
}

/// Configuration loading and validation errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse TOML config: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("failed to serialize default config: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("failed to parse JSON config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid configuration: {field} - {message}")]
    Invalid { field: String, message: String },
}

impl ConfigError {
    /// Create an invalid value error
    pub fn invalid<F: Into<String>, M: Into<String>>(field: F, message: M) -> Self {
        Self::Invalid {
            field: field.into(),
            message: message.into(),
        }
    }
}
