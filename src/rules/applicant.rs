//! Checks on the borrower: employment, income, credit history and records

use chrono::{Months, NaiveDate, Utc};
use regex::Regex;
use std::sync::OnceLock;

use crate::errors::{FieldError, RuleResult};
use crate::utils::formatted_string_to_int;
use crate::validator::{FieldRule, Row, ValidationContext};

const STABLE_EMP_LENGTHS: &[&str] = &[
    "5 years", "6 years", "7 years", "8 years", "9 years", "10+ years",
];

const VERIFIED_STATUSES: &[&str] = &["Source Verified", "Verified"];

fn year_month_regex() -> Option<&'static Regex> {
    static YEAR_MONTH: OnceLock<Option<Regex>> = OnceLock::new();
    YEAR_MONTH
        .get_or_init(|| Regex::new(r"^(\d{4})-(\d{2})$").ok())
        .as_ref()
}

fn parse_year_month(value: &str) -> Option<NaiveDate> {
    let caps = year_month_regex()?.captures(value)?;
    let year = caps.get(1)?.as_str().parse().ok()?;
    let month = caps.get(2)?.as_str().parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, 1)
}

/// Employment title and length are both present
#[derive(Debug, Clone, Copy, Default)]
pub struct EmploymentInfo;

impl FieldRule for EmploymentInfo {
    fn name(&self) -> &str {
        "employment_info"
    }

    fn check(&self, ctx: &ValidationContext, row: &Row) -> RuleResult {
        let columns = ctx.columns();
        let title = row.column(columns.emp_title)?;
        let length = row.column(columns.emp_length)?;

        if title.is_empty() {
            return Err(FieldError::EmpTitleEmpty.into());
        }
        if length.is_empty() {
            return Err(FieldError::EmpLengthEmpty.into());
        }

        let mut fields = ctx.new_record();
        fields.set("empTitle", title);
        fields.set("empLength", length);
        Ok(Some(fields))
    }
}

/// DTI below 20, home owned or mortgaged, annual income above 40,000.
/// Home ownership is stored upper-cased.
#[derive(Debug, Clone, Copy, Default)]
pub struct LowDtiAndHomeOwnership;

impl FieldRule for LowDtiAndHomeOwnership {
    fn name(&self) -> &str {
        "low_dti_and_home_ownership"
    }

    fn check(&self, ctx: &ValidationContext, row: &Row) -> RuleResult {
        let columns = ctx.columns();
        let dti_raw = row.column(columns.dti)?;
        let home = row.column(columns.home_ownership)?.to_ascii_uppercase();
        let income_raw = row.column(columns.annual_inc)?;

        let dti: f64 = dti_raw.parse().map_err(|_| FieldError::DtiNotNumber)?;
        if dti.is_nan() || dti >= 20.0 {
            return Err(FieldError::DtiTooHigh.into());
        }
        if home != "MORTGAGE" && home != "OWN" {
            return Err(FieldError::HomeOwnershipInvalid.into());
        }
        let income: f64 = income_raw
            .parse()
            .map_err(|_| FieldError::AnnualIncNotNumber)?;
        if income.is_nan() || income <= 40_000.0 {
            return Err(FieldError::AnnualIncTooLow40K.into());
        }

        let mut fields = ctx.new_record();
        fields.set("dti", dti_raw);
        fields.set("homeOwnership", home);
        fields.set("annualInc", income_raw);
        Ok(Some(fields))
    }
}

/// Earliest credit line (`YYYY-MM`) more than ten years before the reference
/// date. The reference date is today unless fixed with [`Self::as_of`].
#[derive(Debug, Clone, Copy, Default)]
pub struct EstablishedCreditHistory {
    as_of: Option<NaiveDate>,
}

impl EstablishedCreditHistory {
    pub fn as_of(date: NaiveDate) -> Self {
        Self { as_of: Some(date) }
    }
}

impl FieldRule for EstablishedCreditHistory {
    fn name(&self) -> &str {
        "established_credit_history"
    }

    fn check(&self, ctx: &ValidationContext, row: &Row) -> RuleResult {
        let earliest = row.column(ctx.columns().earliest_cr_line)?;
        if earliest.is_empty() {
            return Err(FieldError::EarliestCrLineEmpty.into());
        }
        let opened = parse_year_month(earliest).ok_or(FieldError::EarliestCrLineFormat)?;

        let reference = self.as_of.unwrap_or_else(|| Utc::now().date_naive());
        let cutoff = reference
            .checked_sub_months(Months::new(120))
            .unwrap_or(NaiveDate::MIN);
        if opened > cutoff {
            return Err(FieldError::EarliestCrLineTooRecent.into());
        }

        let mut fields = ctx.new_record();
        fields.set("earliestCrLine", earliest);
        Ok(Some(fields))
    }
}

/// FICO range low at least 660 and high at most 850
#[derive(Debug, Clone, Copy, Default)]
pub struct HealthyFico;

impl FieldRule for HealthyFico {
    fn name(&self) -> &str {
        "healthy_fico"
    }

    fn check(&self, ctx: &ValidationContext, row: &Row) -> RuleResult {
        let columns = ctx.columns();
        let low_raw = row.column(columns.fico_range_low)?;
        let high_raw = row.column(columns.fico_range_high)?;

        let low = formatted_string_to_int(low_raw).map_err(|_| FieldError::FicoRangeLowNotNumber)?;
        let high =
            formatted_string_to_int(high_raw).map_err(|_| FieldError::FicoRangeHighNotNumber)?;
        if low < 660 {
            return Err(FieldError::FicoRangeLowTooLow.into());
        }
        if high > 850 {
            return Err(FieldError::FicoRangeHighTooHigh.into());
        }

        let mut fields = ctx.new_record();
        fields.set("ficoRangeLow", low_raw);
        fields.set("ficoRangeHigh", high_raw);
        Ok(Some(fields))
    }
}

/// At least five accounts in total and two open
#[derive(Debug, Clone, Copy, Default)]
pub struct SufficientAccounts;

impl FieldRule for SufficientAccounts {
    fn name(&self) -> &str {
        "sufficient_accounts"
    }

    fn check(&self, ctx: &ValidationContext, row: &Row) -> RuleResult {
        let columns = ctx.columns();
        let total_raw = row.column(columns.total_acc)?;
        let open_raw = row.column(columns.open_acc)?;

        let total = formatted_string_to_int(total_raw).map_err(|_| FieldError::TotalAccNotNumber)?;
        let open = formatted_string_to_int(open_raw).map_err(|_| FieldError::OpenAccNotNumber)?;
        if total < 5 {
            return Err(FieldError::TotalAccTooFew.into());
        }
        if open < 2 {
            return Err(FieldError::OpenAccTooFew.into());
        }

        let mut fields = ctx.new_record();
        fields.set("totalAcc", total_raw);
        fields.set("openAcc", open_raw);
        Ok(Some(fields))
    }
}

/// Five or more years with the current employer
#[derive(Debug, Clone, Copy, Default)]
pub struct StableEmployment;

impl FieldRule for StableEmployment {
    fn name(&self) -> &str {
        "stable_employment"
    }

    fn check(&self, ctx: &ValidationContext, row: &Row) -> RuleResult {
        let length = row.column(ctx.columns().emp_length)?;
        if !STABLE_EMP_LENGTHS.contains(&length) {
            return Err(FieldError::EmpLengthNotStable.into());
        }

        let mut fields = ctx.new_record();
        fields.set("empLength", length);
        Ok(Some(fields))
    }
}

/// No public records, bankruptcies or tax liens
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPublicRecords;

impl FieldRule for NoPublicRecords {
    fn name(&self) -> &str {
        "no_public_records"
    }

    fn check(&self, ctx: &ValidationContext, row: &Row) -> RuleResult {
        let columns = ctx.columns();
        let pub_rec_raw = row.column(columns.pub_rec)?;
        let bankruptcies_raw = row.column(columns.pub_rec_bankruptcies)?;
        let tax_liens_raw = row.column(columns.tax_liens)?;

        let pub_rec = formatted_string_to_int(pub_rec_raw).map_err(|_| FieldError::PubRecNotNumber)?;
        let bankruptcies = formatted_string_to_int(bankruptcies_raw)
            .map_err(|_| FieldError::PubRecBankruptciesNotNumber)?;
        let tax_liens =
            formatted_string_to_int(tax_liens_raw).map_err(|_| FieldError::TaxLiensNotNumber)?;

        if pub_rec != 0 {
            return Err(FieldError::PubRecNotZero.into());
        }
        if bankruptcies != 0 {
            return Err(FieldError::PubRecBankruptciesNotZero.into());
        }
        if tax_liens != 0 {
            return Err(FieldError::TaxLiensNotZero.into());
        }

        let mut fields = ctx.new_record();
        fields.set("pubRec", pub_rec_raw);
        fields.set("pubRecBankruptcies", bankruptcies_raw);
        fields.set("taxLiens", tax_liens_raw);
        Ok(Some(fields))
    }
}

/// Income verified by the lender and above 30,000
#[derive(Debug, Clone, Copy, Default)]
pub struct VerifiedIncome;

impl FieldRule for VerifiedIncome {
    fn name(&self) -> &str {
        "verified_income"
    }

    fn check(&self, ctx: &ValidationContext, row: &Row) -> RuleResult {
        let columns = ctx.columns();
        let status = row.column(columns.verification_status)?;
        let income_raw = row.column(columns.annual_inc)?;

        if !VERIFIED_STATUSES.contains(&status) {
            return Err(FieldError::VerificationStatusInvalid.into());
        }
        let income: f64 = income_raw
            .parse()
            .map_err(|_| FieldError::AnnualIncNotNumber)?;
        if income.is_nan() || income <= 30_000.0 {
            return Err(FieldError::AnnualIncTooLow30K.into());
        }

        let mut fields = ctx.new_record();
        fields.set("verificationStatus", status);
        fields.set("annualInc", income_raw);
        Ok(Some(fields))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::RuleError;
    use crate::rules::tests::{context, loan_row};

    fn field(err: RuleError) -> FieldError {
        match err {
            RuleError::Field(field) => field,
            other => panic!("expected a field error, got {other:?}"),
        }
    }

    fn check<R: FieldRule>(rule: R, overrides: &[(usize, &str)]) -> RuleResult {
        let ctx = context(",", 151);
        let line = loan_row(overrides);
        rule.check(&ctx, &Row::split(&line, ","))
    }

    #[test]
    fn test_employment_info() {
        let fields = check(EmploymentInfo, &[]).unwrap().unwrap();
        assert_eq!(fields["empTitle"], "Engineer");
        assert_eq!(fields["empLength"], "10+ years");

        let err = check(EmploymentInfo, &[(10, "")]).unwrap_err();
        assert_eq!(field(err), FieldError::EmpTitleEmpty);
        let err = check(EmploymentInfo, &[(11, "  ")]).unwrap_err();
        assert_eq!(field(err), FieldError::EmpLengthEmpty);
    }

    #[test]
    fn test_low_dti_and_home_ownership() {
        let fields = check(LowDtiAndHomeOwnership, &[(12, "own")]).unwrap().unwrap();
        assert_eq!(fields["homeOwnership"], "OWN");
        assert_eq!(fields["dti"], "15.5");
        assert_eq!(fields["annualInc"], "85000");

        let cases = [
            (36, "abc", FieldError::DtiNotNumber),
            (36, "20", FieldError::DtiTooHigh),
            (12, "RENT", FieldError::HomeOwnershipInvalid),
            (13, "n/a", FieldError::AnnualIncNotNumber),
            (13, "40000", FieldError::AnnualIncTooLow40K),
        ];
        for (column, value, expected) in cases {
            let err = check(LowDtiAndHomeOwnership, &[(column, value)]).unwrap_err();
            assert_eq!(field(err), expected, "column {column} = {value:?}");
        }
    }

    #[test]
    fn test_established_credit_history() {
        let as_of = NaiveDate::from_ymd_opt(2020, 6, 15).unwrap();
        let rule = EstablishedCreditHistory::as_of(as_of);

        let fields = check(rule, &[(38, "2010-06")]).unwrap().unwrap();
        assert_eq!(fields["earliestCrLine"], "2010-06");

        let cases = [
            ("", FieldError::EarliestCrLineEmpty),
            ("Jun-2001", FieldError::EarliestCrLineFormat),
            ("2001-13", FieldError::EarliestCrLineFormat),
            ("2010-07", FieldError::EarliestCrLineTooRecent),
            ("2019-01", FieldError::EarliestCrLineTooRecent),
        ];
        for (value, expected) in cases {
            let err = check(rule, &[(38, value)]).unwrap_err();
            assert_eq!(field(err), expected, "{value:?}");
        }
    }

    #[test]
    fn test_credit_history_defaults_to_today() {
        assert!(check(EstablishedCreditHistory::default(), &[(38, "1990-01")]).is_ok());
        let err = check(EstablishedCreditHistory::default(), &[(38, "9999-01")]).unwrap_err();
        assert_eq!(field(err), FieldError::EarliestCrLineTooRecent);
    }

    #[test]
    fn test_healthy_fico() {
        let fields = check(HealthyFico, &[(39, "660.0")]).unwrap().unwrap();
        assert_eq!(fields["ficoRangeLow"], "660.0");
        assert_eq!(fields["ficoRangeHigh"], "704");

        let cases = [
            (39, "x", FieldError::FicoRangeLowNotNumber),
            (40, "", FieldError::FicoRangeHighNotNumber),
            (39, "659", FieldError::FicoRangeLowTooLow),
            (40, "851", FieldError::FicoRangeHighTooHigh),
        ];
        for (column, value, expected) in cases {
            let err = check(HealthyFico, &[(column, value)]).unwrap_err();
            assert_eq!(field(err), expected, "column {column} = {value:?}");
        }
    }

    #[test]
    fn test_sufficient_accounts() {
        let fields = check(SufficientAccounts, &[]).unwrap().unwrap();
        assert_eq!(fields["totalAcc"], "25");
        assert_eq!(fields["openAcc"], "8");

        let cases = [
            (48, "many", FieldError::TotalAccNotNumber),
            (44, "", FieldError::OpenAccNotNumber),
            (48, "4", FieldError::TotalAccTooFew),
            (44, "1", FieldError::OpenAccTooFew),
        ];
        for (column, value, expected) in cases {
            let err = check(SufficientAccounts, &[(column, value)]).unwrap_err();
            assert_eq!(field(err), expected, "column {column} = {value:?}");
        }
    }

    #[test]
    fn test_stable_employment() {
        for &length in STABLE_EMP_LENGTHS {
            assert!(check(StableEmployment, &[(11, length)]).is_ok(), "{length}");
        }
        for length in ["4 years", "< 1 year", "", "10 years"] {
            let err = check(StableEmployment, &[(11, length)]).unwrap_err();
            assert_eq!(err.to_string(), "employment length is not stable (5-10+ years)");
        }
    }

    #[test]
    fn test_no_public_records() {
        let fields = check(NoPublicRecords, &[(45, "0.0")]).unwrap().unwrap();
        assert_eq!(fields["pubRec"], "0.0");
        assert_eq!(fields.len(), 3);

        let cases = [
            (45, "none", FieldError::PubRecNotNumber),
            (121, "", FieldError::PubRecBankruptciesNotNumber),
            (122, "?", FieldError::TaxLiensNotNumber),
            (45, "1", FieldError::PubRecNotZero),
            (121, "2.0", FieldError::PubRecBankruptciesNotZero),
            (122, "1", FieldError::TaxLiensNotZero),
        ];
        for (column, value, expected) in cases {
            let err = check(NoPublicRecords, &[(column, value)]).unwrap_err();
            assert_eq!(field(err), expected, "column {column} = {value:?}");
        }
    }

    #[test]
    fn test_verified_income() {
        let fields = check(VerifiedIncome, &[]).unwrap().unwrap();
        assert_eq!(fields["verificationStatus"], "Source Verified");

        let cases = [
            (14, "Not Verified", FieldError::VerificationStatusInvalid),
            (14, "verified", FieldError::VerificationStatusInvalid),
            (13, "lots", FieldError::AnnualIncNotNumber),
            (13, "30000", FieldError::AnnualIncTooLow30K),
        ];
        for (column, value, expected) in cases {
            let err = check(VerifiedIncome, &[(column, value)]).unwrap_err();
            assert_eq!(field(err), expected, "column {column} = {value:?}");
        }
    }
}
