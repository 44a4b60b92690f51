//! Bundled field rules for the loan file, and the name registry used by
//! the `[rules]` configuration section

use std::collections::HashSet;
use std::sync::Arc;

use crate::errors::ConfigError;
use crate::validator::FieldRule;

pub mod applicant;
pub mod extra;
pub mod loan;
pub mod shape;

pub use crate::validator::RuleSet;
pub use applicant::{
    EmploymentInfo, EstablishedCreditHistory, HealthyFico, LowDtiAndHomeOwnership,
    NoPublicRecords, StableEmployment, SufficientAccounts, VerifiedIncome,
};
pub use extra::ExtraData;
pub use loan::{GradeSubgrade, InterestRate, LoanAmount, Term};
pub use shape::ColumnCount;

/// Names accepted in `rules.enabled`, in their customary order
pub const BUNDLED_RULES: &[&str] = &[
    "column_count",
    "loan_amount",
    "interest_rate",
    "term",
    "employment_info",
    "low_dti_and_home_ownership",
    "established_credit_history",
    "healthy_fico",
    "sufficient_accounts",
    "stable_employment",
    "no_public_records",
    "verified_income",
    "grade_subgrade",
    "extra_data",
];

/// Look up a bundled rule by its configuration name
pub fn bundled(name: &str) -> Option<Arc<dyn FieldRule>> {
    let rule: Arc<dyn FieldRule> = match name {
        "column_count" => Arc::new(ColumnCount),
        "loan_amount" => Arc::new(LoanAmount),
        "interest_rate" => Arc::new(InterestRate),
        "term" => Arc::new(Term),
        "grade_subgrade" => Arc::new(GradeSubgrade),
        "employment_info" => Arc::new(EmploymentInfo),
        "low_dti_and_home_ownership" => Arc::new(LowDtiAndHomeOwnership),
        "established_credit_history" => Arc::new(EstablishedCreditHistory::default()),
        "healthy_fico" => Arc::new(HealthyFico),
        "sufficient_accounts" => Arc::new(SufficientAccounts),
        "stable_employment" => Arc::new(StableEmployment),
        "no_public_records" => Arc::new(NoPublicRecords),
        "verified_income" => Arc::new(VerifiedIncome),
        "extra_data" => Arc::new(ExtraData),
        _ => return None,
    };
    Some(rule)
}

impl RuleSet {
    /// Build the active rule list from configuration names, keeping their
    /// order. Unknown and repeated names are rejected.
    pub fn from_names<I>(names: I) -> Result<RuleSet, ConfigError>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let mut seen = HashSet::new();
        let mut rules = RuleSet::new();

        for name in names {
            let name = name.as_ref();
            let rule = bundled(name).ok_or_else(|| {
                ConfigError::invalid(
                    "rules.enabled",
                    format!("unknown rule '{}' (known: {})", name, BUNDLED_RULES.join(", ")),
                )
            })?;
            if !seen.insert(name.to_string()) {
                return Err(ConfigError::invalid(
                    "rules.enabled",
                    format!("rule '{}' is listed more than once", name),
                ));
            }
            rules.push_shared(rule);
        }

        Ok(rules)
    }
}
