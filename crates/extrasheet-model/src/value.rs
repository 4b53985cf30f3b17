use core::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};

/// Spreadsheet error codes that can appear as cached cell values.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ErrorCode {
    #[serde(rename = "#NULL!")]
    Null,
    #[serde(rename = "#DIV/0!")]
    Div0,
    #[serde(rename = "#VALUE!")]
    Value,
    #[serde(rename = "#REF!")]
    Ref,
    #[serde(rename = "#NAME?")]
    Name,
    #[serde(rename = "#NUM!")]
    Num,
    #[serde(rename = "#N/A")]
    NA,
    #[serde(rename = "#ERROR!")]
    Error,
    #[serde(rename = "#LOADING!")]
    Loading,
}

impl ErrorCode {
    pub const ALL: [ErrorCode; 9] = [
        ErrorCode::Null,
        ErrorCode::Div0,
        ErrorCode::Value,
        ErrorCode::Ref,
        ErrorCode::Name,
        ErrorCode::Num,
        ErrorCode::NA,
        ErrorCode::Error,
        ErrorCode::Loading,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::Null => "#NULL!",
            ErrorCode::Div0 => "#DIV/0!",
            ErrorCode::Value => "#VALUE!",
            ErrorCode::Ref => "#REF!",
            ErrorCode::Name => "#NAME?",
            ErrorCode::Num => "#NUM!",
            ErrorCode::NA => "#N/A",
            ErrorCode::Error => "#ERROR!",
            ErrorCode::Loading => "#LOADING!",
        }
    }
}

impl FromStr for ErrorCode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ErrorCode::ALL
            .into_iter()
            .find(|code| code.as_str() == s)
            .ok_or(())
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed value of a single cell.
///
/// For a formula cell this is the cached result; the formula is authoritative.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum CellValue {
    /// Empty / unset cell value.
    #[default]
    Empty,
    /// IEEE-754 double precision number.
    Number(f64),
    /// Plain string.
    String(String),
    /// Boolean.
    Boolean(bool),
    /// Error value.
    Error(ErrorCode),
}

impl CellValue {
    /// Returns true if the value is [`CellValue::Empty`].
    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }

    /// Decode one unescaped `data.tsv` field.
    ///
    /// A leading `'` forces the remainder to be read as a string.
    pub fn from_tsv_field(field: &str) -> Self {
        if field.is_empty() {
            return CellValue::Empty;
        }
        if let Some(rest) = field.strip_prefix('\'') {
            return CellValue::String(rest.to_string());
        }
        if let Some(value) = Self::typed_literal(field) {
            return value;
        }
        CellValue::String(field.to_string())
    }

    /// Encode as one (unescaped) `data.tsv` field.
    pub fn to_tsv_field(&self) -> String {
        match self {
            CellValue::Empty => String::new(),
            CellValue::Number(n) => format_number(*n),
            CellValue::Boolean(true) => "TRUE".to_string(),
            CellValue::Boolean(false) => "FALSE".to_string(),
            CellValue::Error(code) => code.as_str().to_string(),
            CellValue::String(s) => {
                if s.starts_with('\'') || Self::typed_literal(s).is_some() {
                    format!("'{s}")
                } else {
                    s.clone()
                }
            }
        }
    }

    /// The `ExtendedValue` shape the remote expects, or `None` for empty cells
    /// and values that cannot be entered by a user (errors).
    pub fn to_wire(&self) -> Option<JsonValue> {
        match self {
            CellValue::Empty | CellValue::Error(_) => None,
            CellValue::Number(n) => Some(json!({ "numberValue": n })),
            CellValue::String(s) => Some(json!({ "stringValue": s })),
            CellValue::Boolean(b) => Some(json!({ "boolValue": b })),
        }
    }

    fn typed_literal(field: &str) -> Option<CellValue> {
        match field {
            "TRUE" => return Some(CellValue::Boolean(true)),
            "FALSE" => return Some(CellValue::Boolean(false)),
            _ => {}
        }
        if let Ok(code) = field.parse::<ErrorCode>() {
            return Some(CellValue::Error(code));
        }
        if looks_numeric(field) {
            if let Ok(n) = field.parse::<f64>() {
                if n.is_finite() {
                    return Some(CellValue::Number(n));
                }
            }
        }
        None
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Empty => Ok(()),
            CellValue::Number(n) => f.write_str(&format_number(*n)),
            CellValue::String(s) => f.write_str(s),
            CellValue::Boolean(b) => f.write_str(if *b { "TRUE" } else { "FALSE" }),
            CellValue::Error(code) => f.write_str(code.as_str()),
        }
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Number(value)
    }
}

impl From<bool> for CellValue {
    fn from(value: bool) -> Self {
        CellValue::Boolean(value)
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::String(value.to_string())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        CellValue::String(value)
    }
}

/// Plain decimal numbers only: Rust's float parser also accepts `inf`, `NaN`
/// and `1e5`-style exponents without a mantissa digit check, none of which a
/// spreadsheet user would mean as a number in a TSV cell.
fn looks_numeric(s: &str) -> bool {
    let body = s.strip_prefix('-').unwrap_or(s);
    let (mantissa, exponent) = match body.find(['e', 'E']) {
        Some(i) => (&body[..i], Some(&body[i + 1..])),
        None => (body, None),
    };
    let mut digits = 0usize;
    let mut dots = 0usize;
    for b in mantissa.bytes() {
        match b {
            b'0'..=b'9' => digits += 1,
            b'.' => dots += 1,
            _ => return false,
        }
    }
    if digits == 0 || dots > 1 {
        return false;
    }
    match exponent {
        None => true,
        Some(exp) => {
            let exp = exp.strip_prefix(['+', '-']).unwrap_or(exp);
            !exp.is_empty() && exp.bytes().all(|b| b.is_ascii_digit())
        }
    }
}

fn format_number(n: f64) -> String {
    if n == 0.0 {
        // Normalize -0.
        return "0".to_string();
    }
    n.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tsv_fields_are_typed() {
        assert_eq!(CellValue::from_tsv_field(""), CellValue::Empty);
        assert_eq!(CellValue::from_tsv_field("10"), CellValue::Number(10.0));
        assert_eq!(CellValue::from_tsv_field("-2.5e3"), CellValue::Number(-2500.0));
        assert_eq!(CellValue::from_tsv_field("TRUE"), CellValue::Boolean(true));
        assert_eq!(
            CellValue::from_tsv_field("#DIV/0!"),
            CellValue::Error(ErrorCode::Div0)
        );
        assert_eq!(
            CellValue::from_tsv_field("hello"),
            CellValue::String("hello".into())
        );
        assert_eq!(
            CellValue::from_tsv_field("inf"),
            CellValue::String("inf".into())
        );
        assert_eq!(
            CellValue::from_tsv_field("1.2.3"),
            CellValue::String("1.2.3".into())
        );
    }

    #[test]
    fn strings_that_look_typed_get_an_apostrophe() {
        for s in ["10", "TRUE", "#N/A", "'quoted", "007"] {
            let v = CellValue::String(s.to_string());
            let field = v.to_tsv_field();
            assert!(field.starts_with('\''), "{s} -> {field}");
            assert_eq!(CellValue::from_tsv_field(&field), v);
        }
        let plain = CellValue::String("plain".into());
        assert_eq!(plain.to_tsv_field(), "plain");
    }

    #[test]
    fn numbers_format_shortest() {
        assert_eq!(CellValue::Number(20.0).to_tsv_field(), "20");
        assert_eq!(CellValue::Number(0.1).to_tsv_field(), "0.1");
        assert_eq!(CellValue::Number(-0.0).to_tsv_field(), "0");
    }

    #[test]
    fn errors_are_not_writable() {
        assert_eq!(CellValue::Error(ErrorCode::Ref).to_wire(), None);
        assert_eq!(
            CellValue::Number(20.0).to_wire(),
            Some(json!({"numberValue": 20.0}))
        );
    }
}
