//! Built-in functions

pub mod date;
pub mod logical;
pub mod lookup;
pub mod math;
pub mod text;

use std::sync::OnceLock;

use ahash::AHashMap;

use crate::error::{FormulaError, FormulaResult};
use crate::evaluator::FormulaValue;

/// Function implementation signature
///
/// Receives arguments already evaluated, with ranges as
/// [`FormulaValue::Array`]. Formula-level failures are returned as
/// `Ok(FormulaValue::Error(..))`.
pub type FunctionImpl = fn(&[FormulaValue]) -> FormulaResult<FormulaValue>;

/// How argument errors are handled before the implementation runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorPolicy {
    /// The first error in any argument, ranges included, is the result
    Propagate,
    /// The first error in a scalar argument is the result; ranges are passed through
    Scalars,
    /// Errors reach the implementation as ordinary values
    Trap,
}

impl ErrorPolicy {
    /// First error this policy short-circuits on, in argument order
    pub fn first_error(&self, args: &[FormulaValue]) -> Option<FormulaValue> {
        let err = match self {
            ErrorPolicy::Trap => None,
            ErrorPolicy::Scalars => args.iter().find_map(|a| match a {
                FormulaValue::Error(e) => Some(*e),
                _ => None,
            }),
            ErrorPolicy::Propagate => args.iter().find_map(FormulaValue::first_error),
        };
        err.map(FormulaValue::Error)
    }
}

/// Function definition
pub struct FunctionDef {
    /// Function name (uppercase)
    pub name: &'static str,
    /// Minimum arguments
    pub min_args: usize,
    /// Maximum arguments (None = unlimited)
    pub max_args: Option<usize>,
    /// Argument error handling
    pub error_policy: ErrorPolicy,
    /// Implementation
    pub implementation: FunctionImpl,
}

impl FunctionDef {
    /// Check an argument count against this function's arity
    pub fn check_arity(&self, actual: usize) -> FormulaResult<()> {
        let within_max = self.max_args.map_or(true, |max| actual <= max);
        if actual >= self.min_args && within_max {
            return Ok(());
        }

        let expected = match self.max_args {
            Some(max) if max == self.min_args => max.to_string(),
            Some(max) => format!("{} to {}", self.min_args, max),
            None => format!("at least {}", self.min_args),
        };
        Err(FormulaError::ArgumentCount {
            function: self.name.to_string(),
            expected,
            actual,
        })
    }

    /// Apply the error policy, then call the implementation
    pub fn call(&self, args: &[FormulaValue]) -> FormulaResult<FormulaValue> {
        if let Some(err) = self.error_policy.first_error(args) {
            return Ok(err);
        }
        (self.implementation)(args)
    }
}

impl std::fmt::Debug for FunctionDef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionDef")
            .field("name", &self.name)
            .field("min_args", &self.min_args)
            .field("max_args", &self.max_args)
            .field("error_policy", &self.error_policy)
            .finish()
    }
}

/// Function registry
#[derive(Debug)]
pub struct FunctionRegistry {
    functions: AHashMap<&'static str, FunctionDef>,
}

static REGISTRY: OnceLock<FunctionRegistry> = OnceLock::new();

impl FunctionRegistry {
    /// Create a new registry with all built-in functions
    pub fn new() -> Self {
        let mut registry = Self {
            functions: AHashMap::new(),
        };

        registry.register_math_functions();
        registry.register_logical_functions();
        registry.register_lookup_functions();
        registry.register_text_functions();
        registry.register_date_functions();

        registry
    }

    /// Shared registry of built-in functions
    pub fn global() -> &'static FunctionRegistry {
        REGISTRY.get_or_init(FunctionRegistry::new)
    }

    /// Look up a function by name, case-insensitively
    pub fn get(&self, name: &str) -> Option<&FunctionDef> {
        self.functions
            .get(name)
            .or_else(|| self.functions.get(name.to_ascii_uppercase().as_str()))
    }

    /// Register a function
    pub fn register(&mut self, def: FunctionDef) {
        self.functions.insert(def.name, def);
    }

    /// Names of every registered function, sorted
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.functions.keys().copied().collect();
        names.sort_unstable();
        names
    }

    fn register_math_functions(&mut self) {
        // SUM
        self.register(FunctionDef {
            name: "SUM",
            min_args: 1,
            max_args: None,
            error_policy: ErrorPolicy::Propagate,
            implementation: math::fn_sum,
        });

        // AVERAGE
        self.register(FunctionDef {
            name: "AVERAGE",
            min_args: 1,
            max_args: None,
            error_policy: ErrorPolicy::Propagate,
            implementation: math::fn_average,
        });

        // MIN
        self.register(FunctionDef {
            name: "MIN",
            min_args: 1,
            max_args: None,
            error_policy: ErrorPolicy::Propagate,
            implementation: math::fn_min,
        });

        // MAX
        self.register(FunctionDef {
            name: "MAX",
            min_args: 1,
            max_args: None,
            error_policy: ErrorPolicy::Propagate,
            implementation: math::fn_max,
        });

        // COUNT skips errors instead of returning them
        self.register(FunctionDef {
            name: "COUNT",
            min_args: 1,
            max_args: None,
            error_policy: ErrorPolicy::Trap,
            implementation: math::fn_count,
        });

        // ROUND
        self.register(FunctionDef {
            name: "ROUND",
            min_args: 2,
            max_args: Some(2),
            error_policy: ErrorPolicy::Scalars,
            implementation: math::fn_round,
        });

        // ABS
        self.register(FunctionDef {
            name: "ABS",
            min_args: 1,
            max_args: Some(1),
            error_policy: ErrorPolicy::Scalars,
            implementation: math::fn_abs,
        });
    }

    fn register_logical_functions(&mut self) {
        // IF handles its condition error itself; branches are returned as is
        self.register(FunctionDef {
            name: "IF",
            min_args: 2,
            max_args: Some(3),
            error_policy: ErrorPolicy::Trap,
            implementation: logical::fn_if,
        });

        // AND
        self.register(FunctionDef {
            name: "AND",
            min_args: 1,
            max_args: None,
            error_policy: ErrorPolicy::Propagate,
            implementation: logical::fn_and,
        });

        // OR
        self.register(FunctionDef {
            name: "OR",
            min_args: 1,
            max_args: None,
            error_policy: ErrorPolicy::Propagate,
            implementation: logical::fn_or,
        });

        // NOT
        self.register(FunctionDef {
            name: "NOT",
            min_args: 1,
            max_args: Some(1),
            error_policy: ErrorPolicy::Scalars,
            implementation: logical::fn_not,
        });

        // IFERROR
        self.register(FunctionDef {
            name: "IFERROR",
            min_args: 2,
            max_args: Some(2),
            error_policy: ErrorPolicy::Trap,
            implementation: logical::fn_iferror,
        });
    }

    fn register_lookup_functions(&mut self) {
        // VLOOKUP
        self.register(FunctionDef {
            name: "VLOOKUP",
            min_args: 3,
            max_args: Some(4),
            error_policy: ErrorPolicy::Scalars,
            implementation: lookup::fn_vlookup,
        });

        // HLOOKUP
        self.register(FunctionDef {
            name: "HLOOKUP",
            min_args: 3,
            max_args: Some(4),
            error_policy: ErrorPolicy::Scalars,
            implementation: lookup::fn_hlookup,
        });

        // INDEX
        self.register(FunctionDef {
            name: "INDEX",
            min_args: 2,
            max_args: Some(3),
            error_policy: ErrorPolicy::Scalars,
            implementation: lookup::fn_index,
        });

        // MATCH
        self.register(FunctionDef {
            name: "MATCH",
            min_args: 2,
            max_args: Some(3),
            error_policy: ErrorPolicy::Scalars,
            implementation: lookup::fn_match,
        });
    }

    fn register_text_functions(&mut self) {
        // CONCAT
        self.register(FunctionDef {
            name: "CONCAT",
            min_args: 1,
            max_args: None,
            error_policy: ErrorPolicy::Propagate,
            implementation: text::fn_concat,
        });

        // LEFT
        self.register(FunctionDef {
            name: "LEFT",
            min_args: 1,
            max_args: Some(2),
            error_policy: ErrorPolicy::Scalars,
            implementation: text::fn_left,
        });

        // RIGHT
        self.register(FunctionDef {
            name: "RIGHT",
            min_args: 1,
            max_args: Some(2),
            error_policy: ErrorPolicy::Scalars,
            implementation: text::fn_right,
        });

        // LEN
        self.register(FunctionDef {
            name: "LEN",
            min_args: 1,
            max_args: Some(1),
            error_policy: ErrorPolicy::Scalars,
            implementation: text::fn_len,
        });

        // UPPER
        self.register(FunctionDef {
            name: "UPPER",
            min_args: 1,
            max_args: Some(1),
            error_policy: ErrorPolicy::Scalars,
            implementation: text::fn_upper,
        });

        // LOWER
        self.register(FunctionDef {
            name: "LOWER",
            min_args: 1,
            max_args: Some(1),
            error_policy: ErrorPolicy::Scalars,
            implementation: text::fn_lower,
        });
    }

    fn register_date_functions(&mut self) {
        // DATE
        self.register(FunctionDef {
            name: "DATE",
            min_args: 3,
            max_args: Some(3),
            error_policy: ErrorPolicy::Scalars,
            implementation: date::fn_date,
        });

        // YEAR
        self.register(FunctionDef {
            name: "YEAR",
            min_args: 1,
            max_args: Some(1),
            error_policy: ErrorPolicy::Scalars,
            implementation: date::fn_year,
        });

        // MONTH
        self.register(FunctionDef {
            name: "MONTH",
            min_args: 1,
            max_args: Some(1),
            error_policy: ErrorPolicy::Scalars,
            implementation: date::fn_month,
        });

        // DAY
        self.register(FunctionDef {
            name: "DAY",
            min_args: 1,
            max_args: Some(1),
            error_policy: ErrorPolicy::Scalars,
            implementation: date::fn_day,
        });

        // DAYS(end, start)
        self.register(FunctionDef {
            name: "DAYS",
            min_args: 2,
            max_args: Some(2),
            error_policy: ErrorPolicy::Scalars,
            implementation: date::fn_days,
        });

        // EDATE(start, months)
        self.register(FunctionDef {
            name: "EDATE",
            min_args: 2,
            max_args: Some(2),
            error_policy: ErrorPolicy::Scalars,
            implementation: date::fn_edate,
        });
    }
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use pricematrix_core::CellError;

    #[test]
    fn test_lookup_is_case_insensitive() {
        let registry = FunctionRegistry::global();
        assert_eq!(registry.get("sum").map(|d| d.name), Some("SUM"));
        assert_eq!(registry.get("VLookup").map(|d| d.name), Some("VLOOKUP"));
        assert!(registry.get("NOSUCH").is_none());
    }

    #[test]
    fn test_check_arity_messages() {
        let registry = FunctionRegistry::global();
        let round = registry.get("ROUND").unwrap();
        assert!(round.check_arity(2).is_ok());
        assert_eq!(
            round.check_arity(1),
            Err(FormulaError::ArgumentCount {
                function: "ROUND".into(),
                expected: "2".into(),
                actual: 1,
            })
        );

        let vlookup = registry.get("VLOOKUP").unwrap();
        match vlookup.check_arity(5) {
            Err(FormulaError::ArgumentCount { expected, .. }) => assert_eq!(expected, "3 to 4"),
            other => panic!("unexpected {:?}", other),
        }

        let sum = registry.get("SUM").unwrap();
        match sum.check_arity(0) {
            Err(FormulaError::ArgumentCount { expected, .. }) => {
                assert_eq!(expected, "at least 1")
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_error_policies() {
        let args = vec![
            FormulaValue::Number(1.0),
            FormulaValue::Array(vec![vec![FormulaValue::Error(CellError::NotAvailable)]]),
            FormulaValue::Error(CellError::DivideByZero),
        ];

        assert_eq!(
            ErrorPolicy::Propagate.first_error(&args),
            Some(FormulaValue::Error(CellError::NotAvailable))
        );
        assert_eq!(
            ErrorPolicy::Scalars.first_error(&args),
            Some(FormulaValue::Error(CellError::DivideByZero))
        );
        assert_eq!(ErrorPolicy::Trap.first_error(&args), None);
    }

    #[test]
    fn test_registry_names_sorted() {
        let names = FunctionRegistry::global().names();
        assert!(names.windows(2).all(|w| w[0] < w[1]));
        assert!(names.contains(&"IFERROR"));
        assert_eq!(names.len(), 28);
    }
}
