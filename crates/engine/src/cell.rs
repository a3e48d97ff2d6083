use std::fmt;

use serde::{Deserialize, Serialize};

use super::formula::parser::{self, Expr};

/// Horizontal text alignment
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub enum Alignment {
    #[default]
    Left,
    Center,
    Right,
}

/// Cell formatting options. Orthogonal to computation.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CellStyle {
    pub bold: bool,
    pub italic: bool,
    pub alignment: Alignment,
}

/// Per-cell computation error. Stored in `Cell::value`, never thrown.
///
/// A formula that reads a cell holding one of these propagates the same
/// kind (first error encountered, depth-first left-to-right).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CellError {
    /// Formula text did not parse.
    Syntax,
    /// Cell participates in a dependency cycle.
    CircularReference,
    /// Division by zero.
    DivideByZero,
    /// Operand type incompatible with an operator or function.
    TypeMismatch,
    /// Formula references an address removed by a structural edit.
    DeletedReference,
}

impl CellError {
    pub fn code(&self) -> &'static str {
        match self {
            CellError::Syntax => "#SYNTAX!",
            CellError::CircularReference => "#CYCLE!",
            CellError::DivideByZero => "#DIV/0!",
            CellError::TypeMismatch => "#VALUE!",
            CellError::DeletedReference => "#REF!",
        }
    }
}

impl fmt::Display for CellError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// A computed scalar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Empty,
    Number(f64),
    Text(String),
    Boolean(bool),
    Error(CellError),
}

impl Default for Value {
    fn default() -> Self {
        Value::Empty
    }
}

impl Value {
    /// Numeric coercion: numeric-looking text participates as a number,
    /// other text is a type mismatch. Empty coerces to 0.
    pub fn to_number(&self) -> Result<f64, CellError> {
        match self {
            Value::Number(n) => Ok(*n),
            Value::Boolean(b) => Ok(if *b { 1.0 } else { 0.0 }),
            Value::Empty => Ok(0.0),
            Value::Text(s) if s.trim().is_empty() => Ok(0.0),
            Value::Text(s) => s.trim().parse().map_err(|_| CellError::TypeMismatch),
            Value::Error(e) => Err(*e),
        }
    }

    pub fn to_display(&self) -> String {
        match self {
            Value::Empty => String::new(),
            Value::Number(n) => format_number(*n),
            Value::Text(s) => s.clone(),
            Value::Boolean(b) => {
                if *b {
                    "TRUE".to_string()
                } else {
                    "FALSE".to_string()
                }
            }
            Value::Error(e) => e.code().to_string(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Value::Error(_))
    }

    pub fn as_error(&self) -> Option<CellError> {
        match self {
            Value::Error(e) => Some(*e),
            _ => None,
        }
    }
}

/// Render a number the way the grid displays it: integers without a
/// fractional part, everything else in shortest form.
pub(crate) fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// Raw cell content: a literal scalar or formula source text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CellContent {
    Empty,
    Number(f64),
    Text(String),
    Boolean(bool),
    #[serde(skip)]
    Formula { source: String, ast: Option<Expr> },
}

impl Default for CellContent {
    fn default() -> Self {
        CellContent::Empty
    }
}

impl CellContent {
    /// Classify raw input. Text beginning with `=` parses as a formula;
    /// a parse failure keeps the source with `ast: None`.
    ///
    /// Numbers and booleans are only recognized when their canonical
    /// rendering reproduces the input, so raw content round-trips exactly
    /// through export; anything else stays text (and still participates
    /// numerically through coercion).
    pub fn from_input(input: &str) -> Self {
        let trimmed = input.trim();

        if trimmed.is_empty() {
            return CellContent::Empty;
        }

        if trimmed.starts_with('=') {
            let ast = parser::parse(trimmed).ok();
            return CellContent::Formula {
                source: trimmed.to_string(),
                ast,
            };
        }

        Self::literal_from_input(trimmed)
    }

    /// Classify raw input as a literal only. `=`-prefixed text stays text;
    /// used by the import boundary, which applies all-literal writes.
    pub fn literal_from_input(input: &str) -> Self {
        let trimmed = input.trim();

        if trimmed.is_empty() {
            return CellContent::Empty;
        }
        if trimmed == "TRUE" {
            return CellContent::Boolean(true);
        }
        if trimmed == "FALSE" {
            return CellContent::Boolean(false);
        }
        if let Ok(num) = trimmed.parse::<f64>() {
            if format_number(num) == trimmed {
                return CellContent::Number(num);
            }
        }

        CellContent::Text(trimmed.to_string())
    }

    /// The raw stored form: literal text or formula source.
    pub fn raw_display(&self) -> String {
        match self {
            CellContent::Empty => String::new(),
            CellContent::Number(n) => format_number(*n),
            CellContent::Text(s) => s.clone(),
            CellContent::Boolean(b) => {
                if *b {
                    "TRUE".to_string()
                } else {
                    "FALSE".to_string()
                }
            }
            CellContent::Formula { source, .. } => source.clone(),
        }
    }

    pub fn is_formula(&self) -> bool {
        matches!(self, CellContent::Formula { .. })
    }

    pub fn formula_ast(&self) -> Option<&Expr> {
        match self {
            CellContent::Formula { ast: Some(ast), .. } => Some(ast),
            _ => None,
        }
    }

    /// The value a literal evaluates to. Formulas yield their initial
    /// value (syntax error or pending-empty) until recomputed.
    pub fn initial_value(&self) -> Value {
        match self {
            CellContent::Empty => Value::Empty,
            CellContent::Number(n) => Value::Number(*n),
            CellContent::Text(s) => Value::Text(s.clone()),
            CellContent::Boolean(b) => Value::Boolean(*b),
            CellContent::Formula { ast: None, .. } => Value::Error(CellError::Syntax),
            CellContent::Formula { ast: Some(_), .. } => Value::Empty,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Cell {
    pub content: CellContent,
    /// Last computed value. Consistent with `content` and all transitive
    /// dependencies after every completed transaction.
    pub value: Value,
    pub style: CellStyle,
}

impl Cell {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace content from raw input and seed the cached value.
    pub fn set_input(&mut self, input: &str) {
        self.content = CellContent::from_input(input);
        self.value = self.content.initial_value();
    }

    /// Replace content with a literal (import path).
    pub fn set_literal(&mut self, input: &str) {
        self.content = CellContent::literal_from_input(input);
        self.value = self.content.initial_value();
    }
}
