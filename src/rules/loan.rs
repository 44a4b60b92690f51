//! Checks on the loan terms: amounts, rate, term and grade

use regex::Regex;
use std::sync::OnceLock;

use crate::errors::{FieldError, RuleResult};
use crate::utils::{formatted_string_to_int, trim_if_needed};
use crate::validator::{FieldRule, Row, ValidationContext};

fn subgrade_regex() -> Option<&'static Regex> {
    static SUBGRADE: OnceLock<Option<Regex>> = OnceLock::new();
    SUBGRADE
        .get_or_init(|| Regex::new(r"^([A-G])[1-5]$").ok())
        .as_ref()
}

/// Loan, funding and investor funding amounts are positive integers and
/// the two funding amounts agree
#[derive(Debug, Clone, Copy, Default)]
pub struct LoanAmount;

impl FieldRule for LoanAmount {
    fn name(&self) -> &str {
        "loan_amount"
    }

    fn check(&self, ctx: &ValidationContext, row: &Row) -> RuleResult {
        let columns = ctx.columns();
        let loan = row.column(columns.loan_amount)?;
        let funding = row.column(columns.funding_amount)?;
        let funding_inv = row.column(columns.funding_inv_amt)?;

        positive(
            loan,
            FieldError::LoanAmountNotNumber,
            FieldError::LoanAmountNotPositive,
        )?;
        let funding_value = positive(
            funding,
            FieldError::FundingAmountNotNumber,
            FieldError::FundingAmountNotPositive,
        )?;
        let funding_inv_value = positive(
            funding_inv,
            FieldError::FundingInvAmtNotNumber,
            FieldError::FundingInvAmtNotPositive,
        )?;
        if funding_inv_value != funding_value {
            return Err(FieldError::FundingInvAmtNotEqual.into());
        }

        let mut fields = ctx.new_record();
        fields.set("loanAmount", loan);
        fields.set("fundingAmount", funding);
        fields.set("fundingInvAmt", funding_inv);
        Ok(Some(fields))
    }
}

fn positive(value: &str, not_number: FieldError, not_positive: FieldError) -> Result<i64, FieldError> {
    let parsed = formatted_string_to_int(value).map_err(|_| not_number)?;
    if parsed <= 0 {
        return Err(not_positive);
    }
    Ok(parsed)
}

/// Interest rate between 5 and 35 percent inclusive
#[derive(Debug, Clone, Copy, Default)]
pub struct InterestRate;

impl FieldRule for InterestRate {
    fn name(&self) -> &str {
        "interest_rate"
    }

    fn check(&self, ctx: &ValidationContext, row: &Row) -> RuleResult {
        let raw = row.column(ctx.columns().interest_rate)?;
        let rate: f64 = raw.parse().map_err(|_| FieldError::InterestRateNotNumber)?;
        if !(5.0..=35.0).contains(&rate) {
            return Err(FieldError::InterestRateOutOfRange.into());
        }

        let mut fields = ctx.new_record();
        fields.set("interestRate", raw);
        Ok(Some(fields))
    }
}

/// Term in months between 12 and 72, with or without a ` months` suffix.
/// Stored as the bare number.
#[derive(Debug, Clone, Copy, Default)]
pub struct Term;

impl FieldRule for Term {
    fn name(&self) -> &str {
        "term"
    }

    fn check(&self, ctx: &ValidationContext, row: &Row) -> RuleResult {
        let raw = row.column(ctx.columns().term)?;
        let months: i64 = strip_months(raw)
            .parse()
            .map_err(|_| FieldError::TermNotNumber)?;
        if !(12..=72).contains(&months) {
            return Err(FieldError::TermOutOfRange.into());
        }

        let mut fields = ctx.new_record();
        fields.set("term", months.to_string());
        Ok(Some(fields))
    }
}

fn strip_months(raw: &str) -> &str {
    const SUFFIX: &str = "months";
    let len = raw.len();
    if len > SUFFIX.len()
        && raw.is_char_boundary(len - SUFFIX.len())
        && raw[len - SUFFIX.len()..].eq_ignore_ascii_case(SUFFIX)
    {
        return trim_if_needed(&raw[..len - SUFFIX.len()]);
    }
    raw
}

/// Grade A to G, and a subgrade made of that grade and a digit 1 to 5
#[derive(Debug, Clone, Copy, Default)]
pub struct GradeSubgrade;

impl FieldRule for GradeSubgrade {
    fn name(&self) -> &str {
        "grade_subgrade"
    }

    fn check(&self, ctx: &ValidationContext, row: &Row) -> RuleResult {
        let columns = ctx.columns();
        let grade = row.column(columns.grade)?;
        let subgrade = row.column(columns.subgrade)?;

        if !matches!(grade.as_bytes(), [b'A'..=b'G']) {
            return Err(FieldError::GradeInvalid.into());
        }
        let matches_grade = subgrade_regex()
            .and_then(|re| re.captures(subgrade))
            .and_then(|caps| caps.get(1))
            .is_some_and(|letter| letter.as_str() == grade);
        if !matches_grade {
            return Err(FieldError::SubgradeInvalid.into());
        }

        let mut fields = ctx.new_record();
        fields.set("grade", grade);
        fields.set("subgrade", subgrade);
        Ok(Some(fields))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ColumnLayout, ParserConfig};
    use crate::errors::RuleError;
    use crate::rules::tests::{context, context_with};

    fn scenario() -> ValidationContext {
        context_with(ParserConfig::new(",", 5, false).with_columns(ColumnLayout {
            loan_amount: 1,
            funding_amount: 2,
            funding_inv_amt: 3,
            interest_rate: 4,
            ..ColumnLayout::default()
        }))
    }

    fn field(err: RuleError) -> FieldError {
        match err {
            RuleError::Field(field) => field,
            other => panic!("expected a field error, got {other:?}"),
        }
    }

    #[test]
    fn test_loan_amount_valid() {
        let ctx = scenario();
        let fields = LoanAmount
            .check(&ctx, &Row::split("L1,1000,500,500,7.0", ","))
            .unwrap()
            .unwrap();

        assert_eq!(fields.len(), 3);
        assert_eq!(fields["loanAmount"], "1000");
        assert_eq!(fields["fundingAmount"], "500");
        assert_eq!(fields["fundingInvAmt"], "500");
    }

    #[test]
    fn test_loan_amount_failures() {
        let ctx = scenario();
        let cases = [
            ("L1,abc,500,500,7", FieldError::LoanAmountNotNumber),
            ("L1,0,500,500,7", FieldError::LoanAmountNotPositive),
            ("L1,1000,x,500,7", FieldError::FundingAmountNotNumber),
            ("L1,1000,-5,500,7", FieldError::FundingAmountNotPositive),
            ("L1,1000,500,,7", FieldError::FundingInvAmtNotNumber),
            ("L1,1000,500,0,7", FieldError::FundingInvAmtNotPositive),
            ("L1,1000,500,499,7", FieldError::FundingInvAmtNotEqual),
        ];
        for (line, expected) in cases {
            let err = LoanAmount.check(&ctx, &Row::split(line, ",")).unwrap_err();
            assert_eq!(field(err), expected, "line: {line}");
        }
    }

    #[test]
    fn test_loan_amount_accepts_float_formatted_integers() {
        let ctx = scenario();
        assert!(LoanAmount
            .check(&ctx, &Row::split("L1,1000.0,500.0,500,7", ","))
            .is_ok());
    }

    #[test]
    fn test_interest_rate_bounds() {
        let ctx = scenario();
        for rate in ["5", "7.0", "35", "35.0", " 12.5 "] {
            let line = format!("L1,1,1,1,{rate}");
            let fields = InterestRate
                .check(&ctx, &Row::split(&line, ","))
                .unwrap()
                .unwrap();
            assert_eq!(fields["interestRate"], rate.trim());
        }

        let err = InterestRate
            .check(&ctx, &Row::split("L2,1000,500,500,40.0", ","))
            .unwrap_err();
        assert_eq!(err.to_string(), "interest rate is not between 5% and 35%");

        for rate in ["4.99", "35.01", "NaN"] {
            let line = format!("L1,1,1,1,{rate}");
            let err = InterestRate.check(&ctx, &Row::split(&line, ",")).unwrap_err();
            assert_eq!(field(err), FieldError::InterestRateOutOfRange, "rate {rate}");
        }

        let err = InterestRate
            .check(&ctx, &Row::split("L1,1,1,1,high", ","))
            .unwrap_err();
        assert_eq!(field(err), FieldError::InterestRateNotNumber);
    }

    #[test]
    fn test_term() {
        let ctx = context(",", 6);
        let cases = [
            ("36 months", Ok("36")),
            (" 60 Months", Ok("60")),
            ("12", Ok("12")),
            ("72months", Ok("72")),
            ("months", Err(FieldError::TermNotNumber)),
            ("six months", Err(FieldError::TermNotNumber)),
            ("", Err(FieldError::TermNotNumber)),
            ("11 months", Err(FieldError::TermOutOfRange)),
            ("84 months", Err(FieldError::TermOutOfRange)),
        ];
        for (term, expected) in cases {
            let line = format!("id,a,b,c,d,{term}");
            let result = Term.check(&ctx, &Row::split(&line, ","));
            match expected {
                Ok(months) => assert_eq!(result.unwrap().unwrap()["term"], months, "{term:?}"),
                Err(err) => assert_eq!(field(result.unwrap_err()), err, "{term:?}"),
            }
        }
    }

    #[test]
    fn test_grade_subgrade() {
        let ctx = context(",", 10);
        let line = |grade: &str, subgrade: &str| format!("id,,,,,,,,{grade},{subgrade}");

        let fields = GradeSubgrade
            .check(&ctx, &Row::split(&line("B", "B3"), ","))
            .unwrap()
            .unwrap();
        assert_eq!(fields["grade"], "B");
        assert_eq!(fields["subgrade"], "B3");

        let cases = [
            ("H", "H1", FieldError::GradeInvalid),
            ("", "A1", FieldError::GradeInvalid),
            ("AB", "A1", FieldError::GradeInvalid),
            ("a", "a1", FieldError::GradeInvalid),
            ("A", "B1", FieldError::SubgradeInvalid),
            ("A", "A6", FieldError::SubgradeInvalid),
            ("G", "G", FieldError::SubgradeInvalid),
        ];
        for (grade, subgrade, expected) in cases {
            let err = GradeSubgrade
                .check(&ctx, &Row::split(&line(grade, subgrade), ","))
                .unwrap_err();
            assert_eq!(field(err), expected, "{grade}/{subgrade}");
        }
    }

    #[test]
    fn test_short_row_is_missing_column() {
        let ctx = context(",", 10);
        let err = GradeSubgrade
            .check(&ctx, &Row::split("id,a", ","))
            .unwrap_err();
        assert_eq!(err, RuleError::MissingColumn { index: 8, len: 2 });
    }
}
