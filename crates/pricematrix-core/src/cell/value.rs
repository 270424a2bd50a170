//! Cell value types

use std::fmt;

/// The computed value of a cell
///
/// Formula failures are values too: an error code sits in the cell like
/// any other result so downstream formulas can inspect it.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CellValue {
    /// Empty cell (no value)
    #[default]
    Empty,

    /// Numeric value (dates are serial day numbers)
    Number(f64),

    /// Text value
    Text(String),

    /// Boolean value (TRUE/FALSE)
    Boolean(bool),

    /// Error value (#DIV/0!, #REF!, etc.)
    Error(CellError),
}

impl CellValue {
    /// Create a new text value
    pub fn text<S: Into<String>>(s: S) -> Self {
        CellValue::Text(s.into())
    }

    /// Interpret non-formula input text
    ///
    /// A numeric parse of the trimmed text is tried first, then the
    /// case-insensitive booleans `TRUE`/`FALSE`; anything else is kept as
    /// text verbatim.
    ///
    /// ```
    /// use pricematrix_core::CellValue;
    ///
    /// assert_eq!(CellValue::parse_literal(" 12.5 "), CellValue::Number(12.5));
    /// assert_eq!(CellValue::parse_literal("true"), CellValue::Boolean(true));
    /// assert_eq!(CellValue::parse_literal("SKU-1"), CellValue::text("SKU-1"));
    /// ```
    pub fn parse_literal(raw: &str) -> Self {
        if raw.is_empty() {
            return CellValue::Empty;
        }

        if let Some(n) = parse_number(raw) {
            return CellValue::Number(n);
        }

        let trimmed = raw.trim();
        if trimmed.eq_ignore_ascii_case("TRUE") {
            CellValue::Boolean(true)
        } else if trimmed.eq_ignore_ascii_case("FALSE") {
            CellValue::Boolean(false)
        } else {
            CellValue::Text(raw.to_string())
        }
    }

    /// Check if the cell is empty
    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }

    /// Check if the cell contains an error
    pub fn is_error(&self) -> bool {
        matches!(self, CellValue::Error(_))
    }

    /// The error code, if this value is an error
    pub fn error(&self) -> Option<CellError> {
        match self {
            CellValue::Error(e) => Some(*e),
            _ => None,
        }
    }

    /// Try to get the value as a number
    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) => Some(*n),
            CellValue::Boolean(true) => Some(1.0),
            CellValue::Boolean(false) => Some(0.0),
            _ => None,
        }
    }

    /// Try to get the value as a boolean
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            CellValue::Boolean(b) => Some(*b),
            CellValue::Number(n) => Some(*n != 0.0),
            _ => None,
        }
    }

    /// Try to get the value as text
    pub fn as_text(&self) -> Option<&str> {
        match self {
            CellValue::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// The kind of value held
    pub fn value_type(&self) -> ValueType {
        match self {
            CellValue::Empty => ValueType::Empty,
            CellValue::Number(_) => ValueType::Number,
            CellValue::Text(_) => ValueType::Text,
            CellValue::Boolean(_) => ValueType::Boolean,
            CellValue::Error(_) => ValueType::Error,
        }
    }

    /// Get the type name for error messages
    pub fn type_name(&self) -> &'static str {
        self.value_type().as_str()
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Empty => Ok(()),
            CellValue::Number(n) => f.write_str(&format_number(*n)),
            CellValue::Text(s) => f.write_str(s),
            CellValue::Boolean(b) => f.write_str(if *b { "TRUE" } else { "FALSE" }),
            CellValue::Error(e) => write!(f, "{}", e),
        }
    }
}

impl From<bool> for CellValue {
    fn from(b: bool) -> Self {
        CellValue::Boolean(b)
    }
}

impl From<i32> for CellValue {
    fn from(n: i32) -> Self {
        CellValue::Number(n as f64)
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        CellValue::Number(n)
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::text(s)
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        CellValue::Text(s)
    }
}

impl From<CellError> for CellValue {
    fn from(e: CellError) -> Self {
        CellValue::Error(e)
    }
}

/// Parse text as a finite number, ignoring surrounding whitespace
///
/// Rejects the `inf`/`nan` spellings that `f64::from_str` accepts.
pub fn parse_number(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    let starts_ok = trimmed
        .chars()
        .next()
        .map_or(false, |c| c.is_ascii_digit() || matches!(c, '.' | '+' | '-'));
    if !starts_ok {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Canonical text for a number: shortest round-trip form, `-0` shown as `0`
pub fn format_number(n: f64) -> String {
    if n == 0.0 {
        "0".to_string()
    } else {
        n.to_string()
    }
}

/// Kind of value a cell holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum ValueType {
    Empty,
    Number,
    Text,
    Boolean,
    Error,
}

impl ValueType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueType::Empty => "empty",
            ValueType::Number => "number",
            ValueType::Text => "text",
            ValueType::Boolean => "boolean",
            ValueType::Error => "error",
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error codes a cell can hold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CellError {
    /// #ERROR! - Formula text could not be parsed
    Parse,
    /// #DIV/0! - Division by zero
    DivideByZero,
    /// #CIRC! - Formula takes part in a reference cycle
    CircularReference,
    /// #REF! - Reference to a deleted row or column
    BrokenReference,
    /// #VALUE! - Operand of the wrong type
    TypeMismatch,
    /// #NAME? - Function name not in the library
    UnknownFunction,
    /// #NUM! - Numeric result out of domain or range
    Num,
    /// #N/A - Lookup found no match
    NotAvailable,
}

impl CellError {
    /// Get the display string for this error
    pub fn as_str(&self) -> &'static str {
        match self {
            CellError::Parse => "#ERROR!",
            CellError::DivideByZero => "#DIV/0!",
            CellError::CircularReference => "#CIRC!",
            CellError::BrokenReference => "#REF!",
            CellError::TypeMismatch => "#VALUE!",
            CellError::UnknownFunction => "#NAME?",
            CellError::Num => "#NUM!",
            CellError::NotAvailable => "#N/A",
        }
    }

    /// Parse an error code such as `#DIV/0!` (case-insensitive)
    pub fn from_code(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "#ERROR!" => Some(CellError::Parse),
            "#DIV/0!" => Some(CellError::DivideByZero),
            "#CIRC!" => Some(CellError::CircularReference),
            "#REF!" => Some(CellError::BrokenReference),
            "#VALUE!" => Some(CellError::TypeMismatch),
            "#NAME?" => Some(CellError::UnknownFunction),
            "#NUM!" => Some(CellError::Num),
            "#N/A" => Some(CellError::NotAvailable),
            _ => None,
        }
    }
}

impl fmt::Display for CellError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
