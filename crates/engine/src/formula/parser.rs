// Formula parser - converts formula strings into AST
// Supports: numbers, cell refs (A1), ranges (A1:A5), functions (SUM), basic math (+, -, *, /)
// Also supports: comparison operators (<, >, =, <=, >=, <>), string literals, concatenation (&)

/// Expression AST. References are same-sheet; the sheet a formula belongs
/// to is supplied when references are extracted or evaluated.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Text(String),
    Boolean(bool),
    /// Cell reference.
    /// - col_abs/row_abs: true if that component is absolute ($A vs A, $1 vs 1)
    CellRef {
        col: usize,
        row: usize,
        col_abs: bool,
        row_abs: bool,
    },
    /// Rectangular range reference. Normalized so start <= end on both axes.
    Range {
        start_col: usize,
        start_row: usize,
        end_col: usize,
        end_row: usize,
        start_col_abs: bool,
        start_row_abs: bool,
        end_col_abs: bool,
        end_row_abs: bool,
    },
    Function {
        name: String,
        args: Vec<Expr>,
    },
    BinaryOp {
        op: Op,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// Reference destroyed by a structural delete. Prints as `#REF!` and
    /// evaluates to a deleted-reference error.
    DeletedRef,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Op {
    // Arithmetic
    Add,
    Sub,
    Mul,
    Div,
    // Comparison
    Lt,    // <
    Gt,    // >
    Eq,    // =
    LtEq,  // <=
    GtEq,  // >=
    NotEq, // <>
    // String
    Concat, // &
    // Exponentiation
    Pow, // ^
}

impl Op {
    /// Binding strength for printing; higher binds tighter.
    fn precedence(&self) -> u8 {
        match self {
            Op::Lt | Op::Gt | Op::Eq | Op::LtEq | Op::GtEq | Op::NotEq => 1,
            Op::Concat => 2,
            Op::Add | Op::Sub => 3,
            Op::Mul | Op::Div => 4,
            Op::Pow => 5,
        }
    }

    fn symbol(&self) -> &'static str {
        match self {
            Op::Add => "+",
            Op::Sub => "-",
            Op::Mul => "*",
            Op::Div => "/",
            Op::Lt => "<",
            Op::Gt => ">",
            Op::Eq => "=",
            Op::LtEq => "<=",
            Op::GtEq => ">=",
            Op::NotEq => "<>",
            Op::Concat => "&",
            Op::Pow => "^",
        }
    }
}

/// Parse a formula string (leading `=` required) into an AST.
pub fn parse(formula: &str) -> Result<Expr, String> {
    let formula = formula.trim();
    if !formula.starts_with('=') {
        return Err("Formula must start with =".to_string());
    }

    let input = &formula[1..]; // Skip the '='
    let tokens = tokenize(input)?;
    if tokens.is_empty() {
        return Err("Empty formula".to_string());
    }
    let (expr, pos) = parse_comparison(&tokens, 0)?;
    if pos != tokens.len() {
        return Err(format!("Unexpected trailing input at token {}", pos));
    }
    Ok(expr)
}

#[derive(Debug, Clone)]
enum Token {
    Number(f64),
    StringLit(String),
    /// Cell reference with absolute/relative flags
    CellRef {
        col: usize,
        row: usize,
        col_abs: bool,
        row_abs: bool,
    },
    Ident(String),
    RefError,
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
    Colon,
    Comma,
    // Comparison operators
    Lt,   // <
    Gt,   // >
    Eq,   // =
    LtEq, // <=
    GtEq, // >=
    NotEq, // <>
    // String concatenation
    Ampersand, // &
    // Exponentiation and percent
    Caret,   // ^
    Percent, // %
}

fn tokenize(input: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            ' ' | '\t' => {
                chars.next();
            }
            '+' => {
                tokens.push(Token::Plus);
                chars.next();
            }
            '-' => {
                tokens.push(Token::Minus);
                chars.next();
            }
            '*' => {
                tokens.push(Token::Star);
                chars.next();
            }
            '/' => {
                tokens.push(Token::Slash);
                chars.next();
            }
            '(' => {
                tokens.push(Token::LParen);
                chars.next();
            }
            ')' => {
                tokens.push(Token::RParen);
                chars.next();
            }
            ':' => {
                tokens.push(Token::Colon);
                chars.next();
            }
            ',' => {
                tokens.push(Token::Comma);
                chars.next();
            }
            '&' => {
                tokens.push(Token::Ampersand);
                chars.next();
            }
            '^' => {
                tokens.push(Token::Caret);
                chars.next();
            }
            '%' => {
                tokens.push(Token::Percent);
                chars.next();
            }
            '<' => {
                chars.next();
                match chars.peek() {
                    Some('=') => {
                        tokens.push(Token::LtEq);
                        chars.next();
                    }
                    Some('>') => {
                        tokens.push(Token::NotEq);
                        chars.next();
                    }
                    _ => tokens.push(Token::Lt),
                }
            }
            '>' => {
                chars.next();
                if let Some(&'=') = chars.peek() {
                    tokens.push(Token::GtEq);
                    chars.next();
                } else {
                    tokens.push(Token::Gt);
                }
            }
            '=' => {
                tokens.push(Token::Eq);
                chars.next();
            }
            '"' => {
                // String literal; doubled quotes escape a quote
                chars.next();
                let mut s = String::new();
                loop {
                    match chars.next() {
                        Some('"') => {
                            if chars.peek() == Some(&'"') {
                                chars.next();
                                s.push('"');
                            } else {
                                break;
                            }
                        }
                        Some(ch) => s.push(ch),
                        None => return Err("Unterminated string literal".to_string()),
                    }
                }
                tokens.push(Token::StringLit(s));
            }
            '#' => {
                // Error literal. Only #REF! can appear in stored formulas
                // (produced by structural-delete rewriting).
                chars.next();
                let mut word = String::new();
                while let Some(&ch) = chars.peek() {
                    if ch.is_ascii_alphanumeric() || ch == '!' || ch == '/' {
                        word.push(ch);
                        chars.next();
                        if ch == '!' {
                            break;
                        }
                    } else {
                        break;
                    }
                }
                if word == "REF!" {
                    tokens.push(Token::RefError);
                } else {
                    return Err(format!("Unknown error literal: #{}", word));
                }
            }
            'A'..='Z' | 'a'..='z' => {
                // Could be a cell reference (A1), function name (SUM), or TRUE/FALSE
                let mut ident = String::new();
                while let Some(&ch) = chars.peek() {
                    if ch.is_ascii_alphanumeric() || ch == '_' || ch == '$' {
                        ident.push(ch);
                        chars.next();
                    } else {
                        break;
                    }
                }

                let upper = ident.to_uppercase();
                if upper == "TRUE" || upper == "FALSE" {
                    tokens.push(Token::Ident(upper));
                } else if let Some(token) = try_parse_cell_ref(&ident) {
                    tokens.push(token);
                } else {
                    tokens.push(Token::Ident(upper));
                }
            }
            '$' => {
                // Absolute reference marker - collect with following letters/numbers
                let mut ident = String::new();
                while let Some(&ch) = chars.peek() {
                    if ch.is_ascii_alphanumeric() || ch == '$' {
                        ident.push(ch);
                        chars.next();
                    } else {
                        break;
                    }
                }
                match try_parse_cell_ref(&ident) {
                    Some(token) => tokens.push(token),
                    None => return Err(format!("Invalid cell reference: {}", ident)),
                }
            }
            '0'..='9' | '.' => {
                let mut num_str = String::new();
                while let Some(&d) = chars.peek() {
                    if d.is_ascii_digit() || d == '.' {
                        num_str.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let num: f64 = num_str
                    .parse()
                    .map_err(|_| format!("Invalid number: {}", num_str))?;
                tokens.push(Token::Number(num));
            }
            _ => return Err(format!("Unexpected character: {}", c)),
        }
    }

    Ok(tokens)
}

fn try_parse_cell_ref(s: &str) -> Option<Token> {
    let s = s.to_uppercase();
    let mut chars = s.chars().peekable();

    let col_abs = if chars.peek() == Some(&'$') {
        chars.next();
        true
    } else {
        false
    };

    // Column letters (multi-letter like AA, AB supported)
    let mut col_str = String::new();
    while let Some(&c) = chars.peek() {
        if c.is_ascii_uppercase() {
            col_str.push(c);
            chars.next();
        } else {
            break;
        }
    }

    if col_str.is_empty() {
        return None;
    }

    let row_abs = if chars.peek() == Some(&'$') {
        chars.next();
        true
    } else {
        false
    };

    let row_str: String = chars.collect();
    if row_str.is_empty() || !row_str.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    let row: usize = row_str.parse().ok()?;
    if row == 0 {
        return None;
    }

    // Column letters to index (A=0, B=1, ..., Z=25, AA=26, ...)
    let col = col_str
        .chars()
        .fold(0usize, |acc, c| acc * 26 + (c as usize - 'A' as usize + 1))
        - 1;

    Some(Token::CellRef {
        col,
        row: row - 1,
        col_abs,
        row_abs,
    })
}

// Lowest precedence: comparison operators
fn parse_comparison(tokens: &[Token], pos: usize) -> Result<(Expr, usize), String> {
    let (mut left, mut pos) = parse_concat(tokens, pos)?;

    while pos < tokens.len() {
        let op = match &tokens[pos] {
            Token::Lt => Op::Lt,
            Token::Gt => Op::Gt,
            Token::Eq => Op::Eq,
            Token::LtEq => Op::LtEq,
            Token::GtEq => Op::GtEq,
            Token::NotEq => Op::NotEq,
            _ => break,
        };
        let (right, new_pos) = parse_concat(tokens, pos + 1)?;
        left = Expr::BinaryOp {
            op,
            left: Box::new(left),
            right: Box::new(right),
        };
        pos = new_pos;
    }

    Ok((left, pos))
}

// String concatenation (&)
fn parse_concat(tokens: &[Token], pos: usize) -> Result<(Expr, usize), String> {
    let (mut left, mut pos) = parse_add_sub(tokens, pos)?;

    while pos < tokens.len() {
        if let Token::Ampersand = &tokens[pos] {
            let (right, new_pos) = parse_add_sub(tokens, pos + 1)?;
            left = Expr::BinaryOp {
                op: Op::Concat,
                left: Box::new(left),
                right: Box::new(right),
            };
            pos = new_pos;
        } else {
            break;
        }
    }

    Ok((left, pos))
}

fn parse_add_sub(tokens: &[Token], pos: usize) -> Result<(Expr, usize), String> {
    let (mut left, mut pos) = parse_mul_div(tokens, pos)?;

    while pos < tokens.len() {
        let op = match &tokens[pos] {
            Token::Plus => Op::Add,
            Token::Minus => Op::Sub,
            _ => break,
        };
        let (right, new_pos) = parse_mul_div(tokens, pos + 1)?;
        left = Expr::BinaryOp {
            op,
            left: Box::new(left),
            right: Box::new(right),
        };
        pos = new_pos;
    }

    Ok((left, pos))
}

fn parse_mul_div(tokens: &[Token], pos: usize) -> Result<(Expr, usize), String> {
    let (mut left, mut pos) = parse_power(tokens, pos)?;

    while pos < tokens.len() {
        let op = match &tokens[pos] {
            Token::Star => Op::Mul,
            Token::Slash => Op::Div,
            _ => break,
        };
        let (right, new_pos) = parse_power(tokens, pos + 1)?;
        left = Expr::BinaryOp {
            op,
            left: Box::new(left),
            right: Box::new(right),
        };
        pos = new_pos;
    }

    Ok((left, pos))
}

// Exponentiation (^) - right-associative, higher precedence than * /
fn parse_power(tokens: &[Token], pos: usize) -> Result<(Expr, usize), String> {
    let (base, pos) = parse_percent(tokens, pos)?;

    if pos < tokens.len() {
        if let Token::Caret = &tokens[pos] {
            // Right-associative: recurse into parse_power for the exponent
            let (exponent, new_pos) = parse_power(tokens, pos + 1)?;
            return Ok((
                Expr::BinaryOp {
                    op: Op::Pow,
                    left: Box::new(base),
                    right: Box::new(exponent),
                },
                new_pos,
            ));
        }
    }

    Ok((base, pos))
}

// Percent postfix (%) - highest precedence operator, desugars to * 0.01
fn parse_percent(tokens: &[Token], pos: usize) -> Result<(Expr, usize), String> {
    let (mut expr, mut pos) = parse_primary(tokens, pos)?;

    while pos < tokens.len() {
        if let Token::Percent = &tokens[pos] {
            expr = Expr::BinaryOp {
                op: Op::Mul,
                left: Box::new(expr),
                right: Box::new(Expr::Number(0.01)),
            };
            pos += 1;
        } else {
            break;
        }
    }

    Ok((expr, pos))
}

fn parse_primary(tokens: &[Token], pos: usize) -> Result<(Expr, usize), String> {
    if pos >= tokens.len() {
        return Err("Unexpected end of expression".to_string());
    }

    match &tokens[pos] {
        Token::Number(n) => Ok((Expr::Number(*n), pos + 1)),
        Token::StringLit(s) => Ok((Expr::Text(s.clone()), pos + 1)),
        Token::RefError => Ok((Expr::DeletedRef, pos + 1)),
        Token::CellRef {
            col,
            row,
            col_abs,
            row_abs,
        } => {
            // Check if this is a range (A1:B5)
            if pos + 2 < tokens.len() {
                if let Token::Colon = &tokens[pos + 1] {
                    if let Token::CellRef {
                        col: end_col,
                        row: end_row,
                        col_abs: end_col_abs,
                        row_abs: end_row_abs,
                    } = &tokens[pos + 2]
                    {
                        return Ok((
                            normalized_range(
                                (*col, *row, *col_abs, *row_abs),
                                (*end_col, *end_row, *end_col_abs, *end_row_abs),
                            ),
                            pos + 3,
                        ));
                    }
                }
            }
            Ok((
                Expr::CellRef {
                    col: *col,
                    row: *row,
                    col_abs: *col_abs,
                    row_abs: *row_abs,
                },
                pos + 1,
            ))
        }
        Token::Ident(name) => {
            if name == "TRUE" {
                return Ok((Expr::Boolean(true), pos + 1));
            }
            if name == "FALSE" {
                return Ok((Expr::Boolean(false), pos + 1));
            }
            // Function call
            if pos + 1 < tokens.len() {
                if let Token::LParen = &tokens[pos + 1] {
                    let (args, new_pos) = parse_function_args(tokens, pos + 2)?;
                    return Ok((
                        Expr::Function {
                            name: name.clone(),
                            args,
                        },
                        new_pos,
                    ));
                }
            }
            Err(format!("Unknown identifier: {}", name))
        }
        Token::LParen => {
            let (expr, pos) = parse_comparison(tokens, pos + 1)?;
            if pos >= tokens.len() {
                return Err("Missing closing parenthesis".to_string());
            }
            match &tokens[pos] {
                Token::RParen => Ok((expr, pos + 1)),
                _ => Err("Expected closing parenthesis".to_string()),
            }
        }
        Token::Plus => {
            // Unary plus (no-op, just parse the next expression)
            parse_primary(tokens, pos + 1)
        }
        Token::Minus => {
            // Unary minus
            let (expr, pos) = parse_primary(tokens, pos + 1)?;
            Ok((
                Expr::BinaryOp {
                    op: Op::Sub,
                    left: Box::new(Expr::Number(0.0)),
                    right: Box::new(expr),
                },
                pos,
            ))
        }
        _ => Err(format!("Unexpected token at position {}", pos)),
    }
}

fn parse_function_args(tokens: &[Token], pos: usize) -> Result<(Vec<Expr>, usize), String> {
    let mut args = Vec::new();
    let mut pos = pos;

    // Handle empty function call SUM()
    if pos < tokens.len() {
        if let Token::RParen = &tokens[pos] {
            return Ok((args, pos + 1));
        }
    }

    loop {
        let (arg, new_pos) = parse_comparison(tokens, pos)?;
        args.push(arg);
        pos = new_pos;

        if pos >= tokens.len() {
            return Err("Missing closing parenthesis in function call".to_string());
        }

        match &tokens[pos] {
            Token::RParen => return Ok((args, pos + 1)),
            Token::Comma => pos += 1,
            _ => return Err("Expected comma or closing parenthesis".to_string()),
        }
    }
}

/// Build a range with start <= end on both axes, carrying each endpoint's
/// absolute flag along when axes swap.
fn normalized_range(
    start: (usize, usize, bool, bool),
    end: (usize, usize, bool, bool),
) -> Expr {
    let (s_col, s_row, s_col_abs, s_row_abs) = start;
    let (e_col, e_row, e_col_abs, e_row_abs) = end;

    let (start_col, end_col, start_col_abs, end_col_abs) = if s_col <= e_col {
        (s_col, e_col, s_col_abs, e_col_abs)
    } else {
        (e_col, s_col, e_col_abs, s_col_abs)
    };
    let (start_row, end_row, start_row_abs, end_row_abs) = if s_row <= e_row {
        (s_row, e_row, s_row_abs, e_row_abs)
    } else {
        (e_row, s_row, e_row_abs, s_row_abs)
    };

    Expr::Range {
        start_col,
        start_row,
        end_col,
        end_row,
        start_col_abs,
        start_row_abs,
        end_col_abs,
        end_row_abs,
    }
}

// =============================================================================
// Formula Printing - Convert Expr back to string
// =============================================================================

/// Format an expression as a formula string (with leading '=').
///
/// Printing is precedence-aware: structural rewriting re-renders formula
/// source from the AST, so the output must re-parse to the same tree.
pub fn format_expr(expr: &Expr) -> String {
    format!("={}", fmt_prec(expr, 0))
}

fn fmt_prec(expr: &Expr, min_prec: u8) -> String {
    match expr {
        Expr::Number(n) => {
            if n.fract() == 0.0 && n.abs() < 1e15 {
                format!("{}", *n as i64)
            } else {
                format!("{}", n)
            }
        }
        Expr::Text(s) => format!("\"{}\"", s.replace('"', "\"\"")),
        Expr::Boolean(b) => {
            if *b {
                "TRUE".to_string()
            } else {
                "FALSE".to_string()
            }
        }
        Expr::DeletedRef => "#REF!".to_string(),
        Expr::CellRef {
            col,
            row,
            col_abs,
            row_abs,
        } => format_cell_addr(*col, *row, *col_abs, *row_abs),
        Expr::Range {
            start_col,
            start_row,
            end_col,
            end_row,
            start_col_abs,
            start_row_abs,
            end_col_abs,
            end_row_abs,
        } => format!(
            "{}:{}",
            format_cell_addr(*start_col, *start_row, *start_col_abs, *start_row_abs),
            format_cell_addr(*end_col, *end_row, *end_col_abs, *end_row_abs)
        ),
        Expr::Function { name, args } => {
            let args_str: Vec<String> = args.iter().map(|arg| fmt_prec(arg, 0)).collect();
            format!("{}({})", name, args_str.join(","))
        }
        Expr::BinaryOp { op, left, right } => {
            // Unary minus is stored as 0 - x
            if *op == Op::Sub && matches!(**left, Expr::Number(n) if n == 0.0) {
                let inner = format!("-{}", fmt_prec(right, u8::MAX));
                return if op.precedence() < min_prec {
                    format!("({})", inner)
                } else {
                    inner
                };
            }

            let prec = op.precedence();
            let (left_min, right_min) = if *op == Op::Pow {
                // Right-associative
                (prec + 1, prec)
            } else {
                (prec, prec + 1)
            };
            let rendered = format!(
                "{}{}{}",
                fmt_prec(left, left_min),
                op.symbol(),
                fmt_prec(right, right_min)
            );
            if prec < min_prec {
                format!("({})", rendered)
            } else {
                rendered
            }
        }
    }
}

/// Format a cell address in A1 notation
fn format_cell_addr(col: usize, row: usize, col_abs: bool, row_abs: bool) -> String {
    let letters = crate::cell_id::col_to_letters(col);
    let col_str = if col_abs {
        format!("${}", letters)
    } else {
        letters
    };
    let row_str = if row_abs {
        format!("${}", row + 1)
    } else {
        format!("{}", row + 1)
    };
    format!("{}{}", col_str, row_str)
}
