use crate::errors::RuleResult;
use crate::validator::{FieldRule, Row, ValidationContext};

const JOINT_APPLICATION: &str = "Joint App";

/// Copies optional descriptive columns into the record. Never fails; a row
/// too short to hold them contributes nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExtraData;

impl FieldRule for ExtraData {
    fn name(&self) -> &str {
        "extra_data"
    }

    fn check(&self, ctx: &ValidationContext, row: &Row) -> RuleResult {
        let columns = ctx.columns();
        let highest = [
            columns.avg_cur_bal,
            columns.application_type,
            columns.annual_inc_joint,
            columns.tot_coll_amt,
            columns.acc_now_delinq,
        ]
        .into_iter()
        .max()
        .unwrap_or_default();
        if row.len() <= highest {
            return Ok(None);
        }

        let present = |index: usize| row.get(index).filter(|value| !value.is_empty());
        let mut fields = ctx.new_record();

        if let Some(value) = present(columns.avg_cur_bal) {
            fields.set("avg_cur_bal", value);
        }
        if let Some(application_type) = present(columns.application_type) {
            fields.set("application_type", application_type);
            if application_type == JOINT_APPLICATION {
                if let Some(value) = present(columns.annual_inc_joint) {
                    fields.set("annual_inc_joint", value);
                }
            }
        }
        if let Some(value) = present(columns.tot_coll_amt) {
            fields.set("tot_coll_amt", value);
        }
        if let Some(value) = present(columns.acc_now_delinq) {
            fields.set("acc_now_delinq", value);
        }

        if fields.is_empty() {
            return Ok(None);
        }
        Ok(Some(fields))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::tests::{context, loan_row};

    #[test]
    fn test_copies_present_columns() {
        let ctx = context(",", 151);
        let line = loan_row(&[(69, "Joint App"), (70, "120000")]);
        let fields = ExtraData.check(&ctx, &Row::split(&line, ",")).unwrap().unwrap();

        assert_eq!(fields["application_type"], "Joint App");
        assert_eq!(fields["annual_inc_joint"], "120000");
        assert_eq!(fields["avg_cur_bal"], "15000");
        assert_eq!(fields["tot_coll_amt"], "0");
        assert_eq!(fields["acc_now_delinq"], "0");
    }

    #[test]
    fn test_joint_income_only_for_joint_applications() {
        let ctx = context(",", 151);
        let line = loan_row(&[(70, "120000"), (74, "")]);
        let fields = ExtraData.check(&ctx, &Row::split(&line, ",")).unwrap().unwrap();

        assert_eq!(fields["application_type"], "Individual");
        assert!(!fields.contains_key("annual_inc_joint"));
        assert!(!fields.contains_key("tot_coll_amt"));
    }

    #[test]
    fn test_short_row_contributes_nothing() {
        let ctx = context(",", 151);
        assert!(ExtraData
            .check(&ctx, &Row::split("L1,1,2,3", ","))
            .unwrap()
            .is_none());
        assert!(ExtraData.check(&ctx, &Row::split("", ",")).unwrap().is_none());
    }
}
