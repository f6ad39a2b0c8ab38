//! Values produced by formula evaluation.

use bigdecimal::{BigDecimal, RoundingMode, Zero};
use std::fmt;
use std::str::FromStr;

/// Largest decimal exponent a number may have, as for IEEE doubles.
/// Larger results are `#VALUE!`; smaller magnitudes read as zero.
pub const MAX_EXPONENT: i64 = 308;

/// Significant digits kept for numbers; longer ones are rounded.
pub const MAX_PRECISION: u64 = 100;

/// Spreadsheet-level error carried as a cell value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CellError {
    /// Operand of the wrong type, e.g. text in arithmetic.
    Value,
    Div0,
    /// Reference to an unknown sheet or a range spanning two sheets.
    Ref,
    /// Unknown function name.
    Name,
    Cycle,
    /// The formula text could not be parsed.
    Parse,
}

impl CellError {
    pub fn code(&self) -> &'static str {
        match self {
            CellError::Value => "#VALUE!",
            CellError::Div0 => "#DIV/0!",
            CellError::Ref => "#REF!",
            CellError::Name => "#NAME?",
            CellError::Cycle => "#CYCLE!",
            CellError::Parse => "#ERROR",
        }
    }
}

impl fmt::Display for CellError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// The result of evaluating a formula or reading a cell.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    Number(BigDecimal),
    Text(String),
    #[default]
    Empty,
    Error(CellError),
}

impl Value {
    /// Classifies literal (non-formula) cell input.
    pub fn from_input(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Value::Empty;
        }
        // numbers out of range, such as 1e999, stay text
        match BigDecimal::from_str(trimmed).map(Value::bounded) {
            Ok(number @ Value::Number(_)) => number,
            _ => Value::Text(raw.to_string()),
        }
    }

    /// Wraps a computed number, keeping it within [`MAX_PRECISION`]
    /// significant digits and [`MAX_EXPONENT`].
    pub fn bounded(n: BigDecimal) -> Self {
        let Some((digits, exponent)) = magnitude(&n) else {
            return Value::Number(n);
        };
        if exponent > MAX_EXPONENT {
            return CellError::Value.into();
        }
        if exponent < -MAX_EXPONENT {
            return Value::Number(BigDecimal::zero());
        }
        if digits > MAX_PRECISION {
            return Value::Number(n.with_prec(MAX_PRECISION));
        }
        Value::Number(n)
    }

    pub fn number(n: impl Into<BigDecimal>) -> Self {
        Value::Number(n.into())
    }

    pub fn text(s: impl Into<String>) -> Self {
        Value::Text(s.into())
    }

    /// Numeric view used by arithmetic. Empty reads as zero.
    pub fn as_number(&self) -> Result<BigDecimal, CellError> {
        match self {
            Value::Number(n) => Ok(n.clone()),
            Value::Empty => Ok(BigDecimal::zero()),
            Value::Text(_) => Err(CellError::Value),
            Value::Error(e) => Err(*e),
        }
    }

    /// Text view used by string functions. Numbers are rendered exactly.
    pub fn as_text(&self) -> Result<String, CellError> {
        match self {
            Value::Number(n) => Ok(format_decimal(n, None)),
            Value::Text(s) => Ok(s.clone()),
            Value::Empty => Ok(String::new()),
            Value::Error(e) => Err(*e),
        }
    }

    /// Renders the value for a grid cell, rounding numbers to `places`.
    pub fn display(&self, places: i64) -> String {
        match self {
            Value::Number(n) => format_decimal(n, Some(places)),
            Value::Text(s) => s.clone(),
            Value::Empty => String::new(),
            Value::Error(e) => e.code().to_string(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => f.write_str(&format_decimal(n, None)),
            Value::Text(s) => f.write_str(s),
            Value::Empty => Ok(()),
            Value::Error(e) => write!(f, "{}", e),
        }
    }
}

impl From<CellError> for Value {
    fn from(error: CellError) -> Self {
        Value::Error(error)
    }
}

/// Significant digits (possibly one too many) and the decimal exponent of
/// the leading digit, or `None` for zero.
fn magnitude(n: &BigDecimal) -> Option<(u64, i64)> {
    if n.is_zero() {
        return None;
    }
    let (int, scale) = n.as_bigint_and_exponent();
    let digits = (int.bits() as f64 * std::f64::consts::LOG10_2) as u64 + 1;
    let exponent = (digits as i64 - 1).saturating_sub(scale);
    Some((digits, exponent))
}

/// Plain (non-scientific) rendering with trailing zeros removed.
fn format_decimal(n: &BigDecimal, places: Option<i64>) -> String {
    let (_, scale) = n.as_bigint_and_exponent();
    let limit = MAX_EXPONENT + MAX_PRECISION as i64;
    let target = match places {
        Some(places) => places.clamp(0, limit),
        None => scale.clamp(0, limit),
    };
    let rendered = n.with_scale_round(target, RoundingMode::HalfEven).to_string();

    if !rendered.contains('.') {
        return rendered;
    }
    let trimmed = rendered.trim_end_matches('0').trim_end_matches('.');
    if trimmed == "-0" {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn dec(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    #[test]
    fn test_from_input() {
        assert_eq!(Value::from_input(""), Value::Empty);
        assert_eq!(Value::from_input("   "), Value::Empty);
        assert_eq!(Value::from_input("42"), Value::Number(dec("42")));
        assert_eq!(Value::from_input(" 3.25 "), Value::Number(dec("3.25")));
        assert_eq!(Value::from_input("hello"), Value::text("hello"));
    }

    #[test]
    fn test_from_input_out_of_range_is_text() {
        assert_eq!(Value::from_input("1e300"), Value::Number(dec("1e300")));
        assert_eq!(Value::from_input("1e2000000"), Value::text("1e2000000"));
        assert_eq!(Value::from_input("-5E+999"), Value::text("-5E+999"));
        assert_eq!(Value::from_input("1e-2000000"), Value::Number(BigDecimal::zero()));
    }

    #[test]
    fn test_bounded() {
        assert_eq!(Value::bounded(dec("12.5")), Value::Number(dec("12.5")));
        assert_eq!(Value::bounded(BigDecimal::zero()), Value::Number(BigDecimal::zero()));
        assert_eq!(Value::bounded(dec("1e309")), CellError::Value.into());
        assert_eq!(Value::bounded(dec("-1e309")), CellError::Value.into());

        let long = format!("0.{}", "3".repeat(500));
        let Value::Number(rounded) = Value::bounded(dec(&long)) else {
            panic!("expected a number");
        };
        let (_, scale) = rounded.as_bigint_and_exponent();
        assert!(scale <= MAX_PRECISION as i64 + 1);
        assert_eq!(Value::Number(rounded).display(5), "0.33333");
    }

    #[test]
    fn test_display_with_huge_places() {
        assert_eq!(Value::Number(dec("0.5")).display(i64::MAX), "0.5");
        assert_eq!(Value::Number(dec("2")).display(i64::MIN), "2");
    }

    #[test]
    fn test_as_number() {
        assert_eq!(Value::Empty.as_number(), Ok(BigDecimal::zero()));
        assert_eq!(Value::text("x").as_number(), Err(CellError::Value));
        assert_eq!(Value::Error(CellError::Div0).as_number(), Err(CellError::Div0));
    }

    #[test]
    fn test_display_trims_and_rounds() {
        assert_eq!(Value::Number(dec("1.50")).display(10), "1.5");
        assert_eq!(Value::Number(dec("100")).display(10), "100");
        assert_eq!(Value::Number(dec("-2.000")).display(10), "-2");
        assert_eq!(Value::Number(dec("0.123456")).display(3), "0.123");
        assert_eq!(Value::Number(dec("1e3")).display(2), "1000");
        assert_eq!(Value::text("abc").display(2), "abc");
        assert_eq!(Value::Empty.display(2), "");
        assert_eq!(Value::Error(CellError::Name).display(2), "#NAME?");
    }

    #[test]
    fn test_decimal_arithmetic_is_exact() {
        let sum = dec("0.1") + dec("0.2");
        assert_eq!(Value::Number(sum).to_string(), "0.3");
    }
}
