use std::collections::HashMap;

use bigdecimal::{BigDecimal, RoundingMode, ToPrimitive, Zero};

use super::value::{CellError, Value, MAX_EXPONENT, MAX_PRECISION};

/// Function signature for built-in and user-defined functions.
///
/// Arguments arrive already evaluated, with ranges flattened row-major.
pub type FunctionImpl = fn(&[Value]) -> Value;

/// Registry for spreadsheet functions, keyed by upper-case name.
#[derive(Debug, Clone)]
pub struct FunctionRegistry {
    functions: HashMap<String, FunctionImpl>,
}

impl FunctionRegistry {
    /// Creates a new function registry with built-in functions.
    pub fn new() -> Self {
        let mut registry = Self {
            functions: HashMap::new(),
        };
        registry.register_builtin_functions();
        registry
    }

    pub fn register_function(&mut self, name: &str, func: FunctionImpl) {
        self.functions.insert(name.to_uppercase(), func);
    }

    pub fn get_function(&self, name: &str) -> Option<&FunctionImpl> {
        self.functions.get(&name.to_uppercase())
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.functions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    fn register_builtin_functions(&mut self) {
        self.register_function("SUM", |args| match numbers(args) {
            Ok(values) => Value::bounded(values.into_iter().sum()),
            Err(e) => e.into(),
        });

        self.register_function("AVERAGE", |args| match numbers(args) {
            Ok(values) if values.is_empty() => CellError::Div0.into(),
            Ok(values) => {
                let count = BigDecimal::from(values.len() as u64);
                Value::bounded(values.into_iter().sum::<BigDecimal>() / count)
            }
            Err(e) => e.into(),
        });

        self.register_function("MIN", |args| match numbers(args) {
            Ok(values) => values
                .into_iter()
                .reduce(|a, b| if b < a { b } else { a })
                .map(Value::Number)
                .unwrap_or(CellError::Value.into()),
            Err(e) => e.into(),
        });

        self.register_function("MAX", |args| match numbers(args) {
            Ok(values) => values
                .into_iter()
                .reduce(|a, b| if b > a { b } else { a })
                .map(Value::Number)
                .unwrap_or(CellError::Value.into()),
            Err(e) => e.into(),
        });

        self.register_function("ABS", |args| match args {
            [x] => match x.as_number() {
                Ok(n) => Value::Number(n.abs()),
                Err(e) => e.into(),
            },
            _ => CellError::Value.into(),
        });

        self.register_function("ROUND", |args| {
            let (x, places) = match args {
                [x] => (x.as_number(), Ok(BigDecimal::zero())),
                [x, places] => (x.as_number(), places.as_number()),
                _ => return CellError::Value.into(),
            };
            match (x, places) {
                (Ok(x), Ok(places)) => match places.with_scale(0).to_i64() {
                    // ties go to the even digit: ROUND(2.5) is 2
                    Some(places) => {
                        let places = places.clamp(-MAX_EXPONENT, MAX_EXPONENT + MAX_PRECISION as i64);
                        Value::bounded(x.with_scale_round(places, RoundingMode::HalfEven))
                    }
                    None => CellError::Value.into(),
                },
                (Err(e), _) | (_, Err(e)) => e.into(),
            }
        });

        self.register_function("CONCAT", |args| {
            let mut out = String::new();
            for arg in args {
                match arg.as_text() {
                    Ok(text) => out.push_str(&text),
                    Err(e) => return e.into(),
                }
            }
            Value::Text(out)
        });

        self.register_function("LEN", |args| match args {
            [x] => match x.as_text() {
                Ok(text) => Value::Number(BigDecimal::from(text.chars().count() as u64)),
                Err(e) => e.into(),
            },
            _ => CellError::Value.into(),
        });

        self.register_function("UPPER", |args| match args {
            [x] => x.as_text().map(|t| Value::Text(t.to_uppercase())).unwrap_or_else(Value::from),
            _ => CellError::Value.into(),
        });

        self.register_function("LOWER", |args| match args {
            [x] => x.as_text().map(|t| Value::Text(t.to_lowercase())).unwrap_or_else(Value::from),
            _ => CellError::Value.into(),
        });
    }
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Numeric arguments of an aggregate. Empty cells are skipped; text and
/// errors stop the aggregate.
fn numbers(args: &[Value]) -> Result<Vec<BigDecimal>, CellError> {
    args.iter()
        .filter(|v| !matches!(v, Value::Empty))
        .map(Value::as_number)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use pretty_assertions::assert_eq;

    fn call(name: &str, args: &[Value]) -> Value {
        let registry = FunctionRegistry::new();
        let func = registry.get_function(name).unwrap();
        func(args)
    }

    fn dec(s: &str) -> Value {
        Value::Number(BigDecimal::from_str(s).unwrap())
    }

    #[test]
    fn test_registry_lookup() {
        let mut registry = FunctionRegistry::new();

        assert!(registry.get_function("SUM").is_some());
        assert!(registry.get_function("sum").is_some());
        assert!(registry.get_function("Concat").is_some());
        assert!(registry.get_function("UNKNOWN").is_none());

        registry.register_function("double", |args| match args {
            [x] => x.as_number().map(|n| Value::Number(n * BigDecimal::from(2))).unwrap_or_else(Value::from),
            _ => CellError::Value.into(),
        });
        let double = registry.get_function("DOUBLE").unwrap();
        assert_eq!(double(&[dec("2.5")]), dec("5"));
    }

    #[test]
    fn test_aggregates() {
        let args = [dec("10"), Value::Empty, dec("2.5"), dec("-1")];
        assert_eq!(call("SUM", &args), dec("11.5"));
        assert_eq!(call("MIN", &args), dec("-1"));
        assert_eq!(call("MAX", &args), dec("10"));
        assert_eq!(call("AVERAGE", &[dec("1"), dec("2")]), dec("1.5"));
    }

    #[test]
    fn test_aggregate_edge_cases() {
        assert_eq!(call("SUM", &[]), dec("0"));
        assert_eq!(call("AVERAGE", &[Value::Empty]), CellError::Div0.into());
        assert_eq!(call("MAX", &[]), CellError::Value.into());
        assert_eq!(call("SUM", &[dec("1"), Value::text("x")]), CellError::Value.into());
        assert_eq!(
            call("SUM", &[dec("1"), CellError::Ref.into()]),
            CellError::Ref.into()
        );
    }

    #[test]
    fn test_abs_and_round() {
        assert_eq!(call("ABS", &[dec("-3.5")]), dec("3.5"));
        assert_eq!(call("ABS", &[]), CellError::Value.into());
        assert_eq!(call("ROUND", &[dec("2.71828"), dec("2")]), dec("2.72"));
        assert_eq!(call("ROUND", &[dec("2.4")]), dec("2"));
        assert_eq!(call("ROUND", &[Value::text("a"), dec("1")]), CellError::Value.into());
    }

    #[test]
    fn test_round_ties_to_even() {
        assert_eq!(call("ROUND", &[dec("2.5")]), dec("2"));
        assert_eq!(call("ROUND", &[dec("3.5")]), dec("4"));
        assert_eq!(call("ROUND", &[dec("-2.5")]), dec("-2"));
        assert_eq!(call("ROUND", &[dec("0.125"), dec("2")]), dec("0.12"));
        assert_eq!(call("ROUND", &[dec("0.135"), dec("2")]), dec("0.14"));
        assert_eq!(call("ROUND", &[dec("1250"), dec("-2")]), dec("1200"));
    }

    #[test]
    fn test_round_with_extreme_places() {
        assert_eq!(call("ROUND", &[dec("123.456"), dec("-1000000000000")]), dec("0"));
        assert_eq!(call("ROUND", &[dec("123.456"), dec("1000000000000")]), dec("123.456"));
        assert_eq!(call("ROUND", &[dec("1"), dec("1e300")]), CellError::Value.into());
    }

    #[test]
    fn test_sum_out_of_range() {
        assert_eq!(call("SUM", &[dec("9e308"), dec("9e308")]), CellError::Value.into());
    }

    #[test]
    fn test_text_functions() {
        assert_eq!(
            call("CONCAT", &[Value::text("n="), dec("1.50"), Value::Empty]),
            Value::text("n=1.5")
        );
        assert_eq!(call("LEN", &[Value::text("héllo")]), dec("5"));
        assert_eq!(call("UPPER", &[Value::text("abc")]), Value::text("ABC"));
        assert_eq!(call("LOWER", &[Value::text("AbC")]), Value::text("abc"));
        assert_eq!(call("LOWER", &[CellError::Div0.into()]), CellError::Div0.into());
    }
}
