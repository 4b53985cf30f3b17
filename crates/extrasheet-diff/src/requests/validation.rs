use extrasheet_model::{DataValidationRule, Range};

use super::RequestError;

/// How many condition values a data validation condition type takes.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Arity {
    Exactly(usize),
    AtLeast(usize),
    UpTo(usize),
}

impl Arity {
    fn accepts(self, n: usize) -> bool {
        match self {
            Arity::Exactly(k) => n == k,
            Arity::AtLeast(k) => n >= k,
            Arity::UpTo(k) => n <= k,
        }
    }

    fn describe(self) -> String {
        match self {
            Arity::Exactly(k) => k.to_string(),
            Arity::AtLeast(k) => format!("at least {k}"),
            Arity::UpTo(k) => format!("at most {k}"),
        }
    }
}

/// Condition types the remote accepts in data validation rules.
///
/// `TEXT_STARTS_WITH`, `TEXT_ENDS_WITH`, `BLANK` and `NOT_BLANK` exist for
/// conditional formats only and fall through to `None`.
fn arity(condition: &str) -> Option<Arity> {
    let arity = match condition {
        "NUMBER_GREATER" | "NUMBER_GREATER_THAN_EQ" | "NUMBER_LESS" | "NUMBER_LESS_THAN_EQ"
        | "NUMBER_EQ" | "NUMBER_NOT_EQ" => Arity::Exactly(1),
        "NUMBER_BETWEEN" | "NUMBER_NOT_BETWEEN" => Arity::Exactly(2),
        "TEXT_CONTAINS" | "TEXT_NOT_CONTAINS" | "TEXT_EQ" => Arity::Exactly(1),
        "TEXT_IS_EMAIL" | "TEXT_IS_URL" => Arity::Exactly(0),
        "DATE_EQ" | "DATE_BEFORE" | "DATE_AFTER" | "DATE_ON_OR_BEFORE" | "DATE_ON_OR_AFTER" => {
            Arity::Exactly(1)
        }
        "DATE_BETWEEN" | "DATE_NOT_BETWEEN" => Arity::Exactly(2),
        "DATE_IS_VALID" => Arity::Exactly(0),
        "ONE_OF_RANGE" | "CUSTOM_FORMULA" => Arity::Exactly(1),
        "ONE_OF_LIST" => Arity::AtLeast(1),
        "BOOLEAN" => Arity::UpTo(2),
        _ => return None,
    };
    Some(arity)
}

pub(crate) fn check_validation_rule(
    sheet: &str,
    range: Range,
    rule: &DataValidationRule,
) -> Result<(), RequestError> {
    let condition = &rule.condition;
    let Some(arity) = arity(&condition.kind) else {
        return Err(RequestError::UnsupportedValidation {
            sheet: sheet.to_string(),
            range,
            condition: condition.kind.clone(),
        });
    };
    if !arity.accepts(condition.values.len()) {
        return Err(RequestError::ValidationArity {
            sheet: sheet.to_string(),
            range,
            condition: condition.kind.clone(),
            expected: arity.describe(),
            actual: condition.values.len(),
        });
    }
    Ok(())
}
