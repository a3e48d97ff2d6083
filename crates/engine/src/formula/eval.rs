// Formula evaluator - walks an expression tree against finalized cell values.
//
// Errors are values: the first error encountered in depth-first
// left-to-right order wins and propagates with its kind intact.

use crate::cell::{CellError, Value};

use super::parser::{Expr, Op};

/// Read access to already-finalized cell values during evaluation.
///
/// The recompute loop evaluates cells in topological order, so every
/// value read through this trait is final for the current transaction.
pub trait ValueLookup {
    fn value_at(&self, row: usize, col: usize) -> Value;
}

pub fn evaluate<L: ValueLookup>(expr: &Expr, lookup: &L) -> Value {
    match expr {
        Expr::Number(n) => Value::Number(*n),
        Expr::Text(s) => Value::Text(s.clone()),
        Expr::Boolean(b) => Value::Boolean(*b),
        Expr::DeletedRef => Value::Error(CellError::DeletedReference),
        Expr::CellRef { row, col, .. } => lookup.value_at(*row, *col),
        Expr::Range { .. } => {
            // Ranges only make sense as aggregate arguments
            Value::Error(CellError::TypeMismatch)
        }
        Expr::Function { name, args } => evaluate_function(name, args, lookup),
        Expr::BinaryOp { op, left, right } => {
            let left_val = evaluate(left, lookup);
            if let Value::Error(e) = &left_val {
                return Value::Error(*e);
            }
            let right_val = evaluate(right, lookup);
            if let Value::Error(e) = &right_val {
                return Value::Error(*e);
            }

            match op {
                Op::Add | Op::Sub | Op::Mul | Op::Div | Op::Pow => {
                    let a = match left_val.to_number() {
                        Ok(n) => n,
                        Err(e) => return Value::Error(e),
                    };
                    let b = match right_val.to_number() {
                        Ok(n) => n,
                        Err(e) => return Value::Error(e),
                    };
                    match op {
                        Op::Add => Value::Number(a + b),
                        Op::Sub => Value::Number(a - b),
                        Op::Mul => Value::Number(a * b),
                        Op::Div => {
                            if b == 0.0 {
                                Value::Error(CellError::DivideByZero)
                            } else {
                                Value::Number(a / b)
                            }
                        }
                        Op::Pow => Value::Number(a.powf(b)),
                        _ => unreachable!(),
                    }
                }

                Op::Lt | Op::Gt | Op::Eq | Op::LtEq | Op::GtEq | Op::NotEq => {
                    match compare(*op, &left_val, &right_val) {
                        Ok(b) => Value::Boolean(b),
                        Err(e) => Value::Error(e),
                    }
                }

                Op::Concat => {
                    Value::Text(format!("{}{}", left_val.to_display(), right_val.to_display()))
                }
            }
        }
    }
}

/// Comparison semantics: numbers compare numerically (empty and booleans
/// coerce), text compares case-insensitively, booleans support only
/// equality. Mixed operands try numeric first, then fall back to text.
fn compare(op: Op, left: &Value, right: &Value) -> Result<bool, CellError> {
    let ordered = |a: f64, b: f64| match op {
        Op::Lt => a < b,
        Op::Gt => a > b,
        Op::Eq => a == b,
        Op::LtEq => a <= b,
        Op::GtEq => a >= b,
        Op::NotEq => a != b,
        _ => unreachable!(),
    };
    let texted = |a: &str, b: &str| {
        let a = a.to_lowercase();
        let b = b.to_lowercase();
        match op {
            Op::Lt => a < b,
            Op::Gt => a > b,
            Op::Eq => a == b,
            Op::LtEq => a <= b,
            Op::GtEq => a >= b,
            Op::NotEq => a != b,
            _ => unreachable!(),
        }
    };

    match (left, right) {
        (Value::Number(a), Value::Number(b)) => Ok(ordered(*a, *b)),
        (Value::Text(a), Value::Text(b)) => Ok(texted(a, b)),
        (Value::Boolean(a), Value::Boolean(b)) => match op {
            Op::Eq => Ok(a == b),
            Op::NotEq => Ok(a != b),
            _ => Err(CellError::TypeMismatch),
        },
        _ => {
            if let (Ok(a), Ok(b)) = (left.to_number(), right.to_number()) {
                Ok(ordered(a, b))
            } else {
                Ok(texted(&left.to_display(), &right.to_display()))
            }
        }
    }
}

fn evaluate_function<L: ValueLookup>(name: &str, args: &[Expr], lookup: &L) -> Value {
    match name {
        "SUM" => match collect_numbers(args, lookup) {
            Ok(vals) => Value::Number(vals.iter().sum()),
            Err(e) => Value::Error(e),
        },
        "AVERAGE" | "AVG" => match collect_numbers(args, lookup) {
            Ok(vals) => {
                if vals.is_empty() {
                    Value::Error(CellError::DivideByZero)
                } else {
                    Value::Number(vals.iter().sum::<f64>() / vals.len() as f64)
                }
            }
            Err(e) => Value::Error(e),
        },
        "MIN" => match collect_numbers(args, lookup) {
            Ok(vals) => {
                if vals.is_empty() {
                    Value::Number(0.0)
                } else {
                    Value::Number(vals.iter().cloned().fold(f64::INFINITY, f64::min))
                }
            }
            Err(e) => Value::Error(e),
        },
        "MAX" => match collect_numbers(args, lookup) {
            Ok(vals) => {
                if vals.is_empty() {
                    Value::Number(0.0)
                } else {
                    Value::Number(vals.iter().cloned().fold(f64::NEG_INFINITY, f64::max))
                }
            }
            Err(e) => Value::Error(e),
        },
        "COUNT" => match collect_numbers(args, lookup) {
            Ok(vals) => Value::Number(vals.len() as f64),
            Err(e) => Value::Error(e),
        },
        "ABS" => {
            if args.len() != 1 {
                return Value::Error(CellError::Syntax);
            }
            match evaluate(&args[0], lookup).to_number() {
                Ok(n) => Value::Number(n.abs()),
                Err(e) => Value::Error(e),
            }
        }
        "ROUND" => {
            if args.is_empty() || args.len() > 2 {
                return Value::Error(CellError::Syntax);
            }
            let value = match evaluate(&args[0], lookup).to_number() {
                Ok(n) => n,
                Err(e) => return Value::Error(e),
            };
            let decimals = if args.len() == 2 {
                match evaluate(&args[1], lookup).to_number() {
                    Ok(n) => n as i32,
                    Err(e) => return Value::Error(e),
                }
            } else {
                0
            };
            let factor = 10f64.powi(decimals);
            Value::Number((value * factor).round() / factor)
        }
        // Unknown function names survive parsing; they fail as values
        _ => Value::Error(CellError::Syntax),
    }
}

/// Gather numeric inputs for an aggregate, depth-first left-to-right.
///
/// Range cells: errors propagate; numbers and numeric-looking text count;
/// empty, booleans, and other text are skipped. Scalar arguments coerce
/// strictly (non-numeric text is a type mismatch), except empty cells
/// which are skipped.
fn collect_numbers<L: ValueLookup>(args: &[Expr], lookup: &L) -> Result<Vec<f64>, CellError> {
    let mut vals = Vec::new();

    for arg in args {
        match arg {
            Expr::Range {
                start_row,
                start_col,
                end_row,
                end_col,
                ..
            } => {
                for row in *start_row..=*end_row {
                    for col in *start_col..=*end_col {
                        match lookup.value_at(row, col) {
                            Value::Error(e) => return Err(e),
                            Value::Number(n) => vals.push(n),
                            Value::Text(s) => {
                                if let Ok(n) = s.trim().parse::<f64>() {
                                    vals.push(n);
                                }
                            }
                            Value::Boolean(_) | Value::Empty => {}
                        }
                    }
                }
            }
            _ => match evaluate(arg, lookup) {
                Value::Empty => {}
                v => vals.push(v.to_number()?),
            },
        }
    }

    Ok(vals)
}
