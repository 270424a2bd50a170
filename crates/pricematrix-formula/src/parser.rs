//! Formula parser
//!
//! A recursive descent parser for price matrix formulas with proper operator
//! precedence. The function library is closed, so unknown names and wrong
//! argument counts are rejected here rather than at evaluation time.

use crate::ast::{BinaryOperator, FormulaExpr, UnaryOperator};
use crate::error::{FormulaError, FormulaResult};
use crate::functions::FunctionRegistry;
use pricematrix_core::{CellAddress, CellError, CellRange};

/// Parse a formula string into an AST
///
/// # Example
/// ```rust
/// use pricematrix_formula::parse_formula;
///
/// let ast = parse_formula("=1+2").unwrap();
/// let ast = parse_formula("=SUM(A1:A10)").unwrap();
/// let ast = parse_formula("=IF(A1>0,\"Yes\",\"No\")").unwrap();
/// assert!(parse_formula("=FOO(1)").is_err());
/// ```
pub fn parse_formula(formula: &str) -> FormulaResult<FormulaExpr> {
    let formula = formula
        .trim()
        .strip_prefix('=')
        .ok_or_else(|| FormulaError::Parse("Formula must start with '='".into()))?;

    if formula.trim().is_empty() {
        return Err(FormulaError::Parse("Empty formula".into()));
    }

    let mut parser = FormulaParser::new(formula)?;
    let expr = parser.parse_expression()?;

    match parser.current_token() {
        Token::Eof => Ok(expr),
        Token::RightParen => Err(FormulaError::Parse(
            "Unbalanced parentheses: unexpected ')'".into(),
        )),
        token => Err(FormulaError::Parse(format!(
            "Unexpected {:?} after expression",
            token
        ))),
    }
}

/// Token types
#[derive(Debug, Clone, PartialEq)]
enum Token {
    // Literals
    Number(f64),
    String(String),
    Boolean(bool),
    Error(CellError),

    // Identifiers and references
    Identifier(String),
    CellRef(String),

    // Operators
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    Ampersand,
    Equal,
    NotEqual,
    LessThan,
    LessEqual,
    GreaterThan,
    GreaterEqual,
    Colon,
    Comma,

    // Delimiters
    LeftParen,
    RightParen,

    // End of input
    Eof,
}

/// Formula parser
struct FormulaParser<'a> {
    input: &'a str,
    pos: usize,
    current_token: Token,
}

impl<'a> FormulaParser<'a> {
    fn new(input: &'a str) -> FormulaResult<Self> {
        let mut parser = Self {
            input,
            pos: 0,
            current_token: Token::Eof,
        };
        parser.advance_token()?;
        Ok(parser)
    }

    // === Token scanning ===

    fn advance_token(&mut self) -> FormulaResult<()> {
        self.current_token = self.scan_token()?;
        Ok(())
    }

    fn scan_token(&mut self) -> FormulaResult<Token> {
        self.skip_whitespace();

        let c = match self.peek_char() {
            Some(c) => c,
            None => return Ok(Token::Eof),
        };

        let single = match c {
            '+' => Some(Token::Plus),
            '-' => Some(Token::Minus),
            '*' => Some(Token::Star),
            '/' => Some(Token::Slash),
            '^' => Some(Token::Caret),
            '&' => Some(Token::Ampersand),
            ':' => Some(Token::Colon),
            ',' => Some(Token::Comma),
            '(' => Some(Token::LeftParen),
            ')' => Some(Token::RightParen),
            '=' => Some(Token::Equal),
            _ => None,
        };
        if let Some(token) = single {
            self.advance();
            return Ok(token);
        }

        // Two-character operators
        if c == '<' {
            self.advance();
            return Ok(match self.peek_char() {
                Some('=') => {
                    self.advance();
                    Token::LessEqual
                }
                Some('>') => {
                    self.advance();
                    Token::NotEqual
                }
                _ => Token::LessThan,
            });
        }

        if c == '>' {
            self.advance();
            if self.peek_char() == Some('=') {
                self.advance();
                return Ok(Token::GreaterEqual);
            }
            return Ok(Token::GreaterThan);
        }

        if c == '"' {
            return self.scan_string();
        }

        if c.is_ascii_digit()
            || (c == '.' && self.peek_char_at(1).map_or(false, |c| c.is_ascii_digit()))
        {
            return self.scan_number();
        }

        if c == '#' {
            return self.scan_error_literal();
        }

        if c.is_ascii_alphabetic() || c == '_' || c == '$' {
            return Ok(self.scan_identifier_or_ref());
        }

        Err(FormulaError::Parse(format!(
            "Unexpected character '{}' at position {}",
            c, self.pos
        )))
    }

    fn scan_string(&mut self) -> FormulaResult<Token> {
        let start = self.pos;
        self.advance(); // opening quote

        let mut s = String::new();
        loop {
            match self.peek_char() {
                Some('"') if self.peek_char_at(1) == Some('"') => {
                    s.push('"');
                    self.advance();
                    self.advance();
                }
                Some('"') => {
                    self.advance();
                    return Ok(Token::String(s));
                }
                Some(c) => {
                    s.push(c);
                    self.advance();
                }
                None => {
                    return Err(FormulaError::Parse(format!(
                        "Unterminated string starting at position {}",
                        start
                    )))
                }
            }
        }
    }

    fn scan_number(&mut self) -> FormulaResult<Token> {
        let start = self.pos;

        while self.peek_char().map_or(false, |c| c.is_ascii_digit()) {
            self.advance();
        }

        if self.peek_char() == Some('.') {
            self.advance();
            while self.peek_char().map_or(false, |c| c.is_ascii_digit()) {
                self.advance();
            }
        }

        // Exponent part, only when digits follow
        if self.peek_char().map_or(false, |c| c == 'e' || c == 'E') {
            let sign = self
                .peek_char_at(1)
                .map_or(false, |c| c == '+' || c == '-');
            let digit_at = if sign { 2 } else { 1 };
            if self
                .peek_char_at(digit_at)
                .map_or(false, |c| c.is_ascii_digit())
            {
                for _ in 0..digit_at {
                    self.advance();
                }
                while self.peek_char().map_or(false, |c| c.is_ascii_digit()) {
                    self.advance();
                }
            }
        }

        let num_str = &self.input[start..self.pos];
        num_str
            .parse::<f64>()
            .ok()
            .filter(|n| n.is_finite())
            .map(Token::Number)
            .ok_or_else(|| FormulaError::Parse(format!("Invalid number '{}'", num_str)))
    }

    fn scan_error_literal(&mut self) -> FormulaResult<Token> {
        let start = self.pos;
        self.advance();
        while self.peek_char().map_or(false, |c| {
            c.is_ascii_alphanumeric() || c == '!' || c == '/' || c == '?'
        }) {
            self.advance();
        }
        let text = &self.input[start..self.pos];
        CellError::from_code(text)
            .map(Token::Error)
            .ok_or_else(|| FormulaError::Parse(format!("Unknown error literal '{}'", text)))
    }

    fn scan_identifier_or_ref(&mut self) -> Token {
        let start = self.pos;

        while self.peek_char().map_or(false, |c| {
            c.is_ascii_alphanumeric() || c == '_' || c == '$' || c == '.'
        }) {
            self.advance();
        }

        let text = &self.input[start..self.pos];
        let is_call = self.peek_non_whitespace() == Some('(');

        if !is_call {
            if text.eq_ignore_ascii_case("TRUE") {
                return Token::Boolean(true);
            }
            if text.eq_ignore_ascii_case("FALSE") {
                return Token::Boolean(false);
            }
            if Self::is_cell_reference(text) {
                return Token::CellRef(text.to_string());
            }
        }

        Token::Identifier(text.to_string())
    }

    /// `[$]LETTERS[$]DIGITS`
    fn is_cell_reference(text: &str) -> bool {
        let bytes = text.as_bytes();
        let mut i = 0;

        if bytes.get(i) == Some(&b'$') {
            i += 1;
        }

        let letter_start = i;
        while i < bytes.len() && bytes[i].is_ascii_alphabetic() {
            i += 1;
        }
        if i == letter_start {
            return false;
        }

        if bytes.get(i) == Some(&b'$') {
            i += 1;
        }

        let digit_start = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }

        i > digit_start && i == bytes.len()
    }

    // === Helper methods ===

    fn peek_char(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn peek_char_at(&self, offset: usize) -> Option<char> {
        self.input[self.pos..].chars().nth(offset)
    }

    fn peek_non_whitespace(&self) -> Option<char> {
        self.input[self.pos..].chars().find(|c| !c.is_whitespace())
    }

    fn advance(&mut self) {
        if let Some(c) = self.peek_char() {
            self.pos += c.len_utf8();
        }
    }

    fn skip_whitespace(&mut self) {
        while self.peek_char().map_or(false, |c| c.is_whitespace()) {
            self.advance();
        }
    }

    fn current_token(&self) -> &Token {
        &self.current_token
    }

    fn consume(&mut self) -> FormulaResult<Token> {
        let next = self.scan_token()?;
        Ok(std::mem::replace(&mut self.current_token, next))
    }

    fn expect(&mut self, expected: &Token) -> FormulaResult<()> {
        if self.current_token() == expected {
            self.consume()?;
            Ok(())
        } else if *expected == Token::RightParen {
            Err(FormulaError::Parse(format!(
                "Unbalanced parentheses: expected ')', got {:?}",
                self.current_token()
            )))
        } else {
            Err(FormulaError::Parse(format!(
                "Expected {:?}, got {:?}",
                expected,
                self.current_token()
            )))
        }
    }

    // === Expression parsing with precedence ===
    // Precedence (lowest to highest), every binary level left associative:
    // 1. Comparison: =, <>, <, <=, >, >=
    // 2. Concatenation: &
    // 3. Addition/Subtraction: +, -
    // 4. Multiplication/Division: *, /
    // 5. Exponentiation: ^
    // 6. Unary: -, +
    // 7. Range: :
    // 8. Primary: literals, references, function calls, parentheses

    fn parse_expression(&mut self) -> FormulaResult<FormulaExpr> {
        self.parse_comparison()
    }

    fn binary(op: BinaryOperator, left: FormulaExpr, right: FormulaExpr) -> FormulaExpr {
        FormulaExpr::BinaryOp {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    fn parse_comparison(&mut self) -> FormulaResult<FormulaExpr> {
        let mut left = self.parse_concatenation()?;

        loop {
            let op = match self.current_token() {
                Token::Equal => BinaryOperator::Equal,
                Token::NotEqual => BinaryOperator::NotEqual,
                Token::LessThan => BinaryOperator::LessThan,
                Token::LessEqual => BinaryOperator::LessEqual,
                Token::GreaterThan => BinaryOperator::GreaterThan,
                Token::GreaterEqual => BinaryOperator::GreaterEqual,
                _ => break,
            };

            self.consume()?;
            let right = self.parse_concatenation()?;
            left = Self::binary(op, left, right);
        }

        Ok(left)
    }

    fn parse_concatenation(&mut self) -> FormulaResult<FormulaExpr> {
        let mut left = self.parse_additive()?;

        while matches!(self.current_token(), Token::Ampersand) {
            self.consume()?;
            let right = self.parse_additive()?;
            left = Self::binary(BinaryOperator::Concat, left, right);
        }

        Ok(left)
    }

    fn parse_additive(&mut self) -> FormulaResult<FormulaExpr> {
        let mut left = self.parse_multiplicative()?;

        loop {
            let op = match self.current_token() {
                Token::Plus => BinaryOperator::Add,
                Token::Minus => BinaryOperator::Subtract,
                _ => break,
            };

            self.consume()?;
            let right = self.parse_multiplicative()?;
            left = Self::binary(op, left, right);
        }

        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> FormulaResult<FormulaExpr> {
        let mut left = self.parse_exponent()?;

        loop {
            let op = match self.current_token() {
                Token::Star => BinaryOperator::Multiply,
                Token::Slash => BinaryOperator::Divide,
                _ => break,
            };

            self.consume()?;
            let right = self.parse_exponent()?;
            left = Self::binary(op, left, right);
        }

        Ok(left)
    }

    fn parse_exponent(&mut self) -> FormulaResult<FormulaExpr> {
        let mut left = self.parse_unary()?;

        while matches!(self.current_token(), Token::Caret) {
            self.consume()?;
            let right = self.parse_unary()?;
            left = Self::binary(BinaryOperator::Power, left, right);
        }

        Ok(left)
    }

    fn parse_unary(&mut self) -> FormulaResult<FormulaExpr> {
        match self.current_token() {
            Token::Minus => {
                self.consume()?;
                // A minus in operand position directly before a number is a
                // negative literal, not a subtraction
                match self.parse_unary()? {
                    FormulaExpr::Number(n) => Ok(FormulaExpr::Number(-n)),
                    operand => Ok(FormulaExpr::UnaryOp {
                        op: UnaryOperator::Negate,
                        operand: Box::new(operand),
                    }),
                }
            }
            Token::Plus => {
                self.consume()?;
                self.parse_unary()
            }
            _ => self.parse_range(),
        }
    }

    fn parse_range(&mut self) -> FormulaResult<FormulaExpr> {
        let left = self.parse_primary()?;

        if !matches!(self.current_token(), Token::Colon) {
            return Ok(left);
        }
        self.consume()?;

        let start = match left {
            FormulaExpr::CellRef(addr) => addr,
            other => {
                return Err(FormulaError::Parse(format!(
                    "Range must start with a cell reference, got {}",
                    other
                )))
            }
        };

        match self.consume()? {
            Token::CellRef(ref_str) => {
                let end = Self::parse_cell_reference(&ref_str)?;
                Ok(FormulaExpr::RangeRef(CellRange::new(start, end)))
            }
            token => Err(FormulaError::Parse(format!(
                "Range must end with a cell reference, got {:?}",
                token
            ))),
        }
    }

    fn parse_primary(&mut self) -> FormulaResult<FormulaExpr> {
        match self.consume()? {
            Token::Number(n) => Ok(FormulaExpr::Number(n)),
            Token::String(s) => Ok(FormulaExpr::String(s)),
            Token::Boolean(b) => Ok(FormulaExpr::Boolean(b)),
            Token::Error(e) => Ok(FormulaExpr::Error(e)),

            Token::LeftParen => {
                let expr = self.parse_expression()?;
                self.expect(&Token::RightParen)?;
                Ok(expr)
            }

            Token::CellRef(ref_str) => Ok(FormulaExpr::CellRef(Self::parse_cell_reference(
                &ref_str,
            )?)),

            Token::Identifier(name) => {
                if matches!(self.current_token(), Token::LeftParen) {
                    self.parse_function_call(name)
                } else {
                    Err(FormulaError::Parse(format!("Unknown name '{}'", name)))
                }
            }

            Token::Eof => Err(FormulaError::Parse("Unexpected end of formula".into())),
            Token::RightParen => Err(FormulaError::Parse(
                "Unbalanced parentheses: unexpected ')'".into(),
            )),
            token => Err(FormulaError::Parse(format!("Unexpected token: {:?}", token))),
        }
    }

    fn parse_function_call(&mut self, name: String) -> FormulaResult<FormulaExpr> {
        let name = name.to_ascii_uppercase();
        let def = FunctionRegistry::global()
            .get(&name)
            .ok_or_else(|| FormulaError::UnknownFunction(name.clone()))?;

        self.expect(&Token::LeftParen)?;

        let mut args = Vec::new();
        if !matches!(self.current_token(), Token::RightParen) {
            args.push(self.parse_expression()?);

            while matches!(self.current_token(), Token::Comma) {
                self.consume()?;
                args.push(self.parse_expression()?);
            }
        }

        self.expect(&Token::RightParen)?;
        def.check_arity(args.len())?;

        Ok(FormulaExpr::Function { name, args })
    }

    fn parse_cell_reference(ref_str: &str) -> FormulaResult<CellAddress> {
        CellAddress::parse(ref_str).map_err(|e| {
            FormulaError::InvalidReference(format!("'{}': {}", ref_str, e))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn num(n: f64) -> Box<FormulaExpr> {
        Box::new(FormulaExpr::Number(n))
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_formula("=42").unwrap(), FormulaExpr::Number(42.0));
        assert_eq!(parse_formula("=3.14").unwrap(), FormulaExpr::Number(3.14));
        assert_eq!(parse_formula("=1e10").unwrap(), FormulaExpr::Number(1e10));
        assert_eq!(parse_formula("=.5").unwrap(), FormulaExpr::Number(0.5));
    }

    #[test]
    fn test_parse_string() {
        assert_eq!(
            parse_formula("=\"Hello \"\"World\"\"\"").unwrap(),
            FormulaExpr::String("Hello \"World\"".into())
        );
        assert!(parse_formula("=\"open").is_err());
    }

    #[test]
    fn test_parse_boolean_and_error_literals() {
        assert_eq!(parse_formula("=TRUE").unwrap(), FormulaExpr::Boolean(true));
        assert_eq!(parse_formula("=false").unwrap(), FormulaExpr::Boolean(false));
        assert_eq!(
            parse_formula("=#REF!").unwrap(),
            FormulaExpr::Error(CellError::BrokenReference)
        );
        assert!(parse_formula("=#BOGUS!").is_err());
    }

    #[test]
    fn test_parse_precedence() {
        // 1+(2*3)
        assert_eq!(
            parse_formula("=1+2*3").unwrap(),
            FormulaExpr::BinaryOp {
                op: BinaryOperator::Add,
                left: num(1.0),
                right: Box::new(FormulaExpr::BinaryOp {
                    op: BinaryOperator::Multiply,
                    left: num(2.0),
                    right: num(3.0),
                }),
            }
        );
    }

    #[test]
    fn test_operators_are_left_associative() {
        // (10-4)-3
        assert_eq!(
            parse_formula("=10-4-3").unwrap(),
            FormulaExpr::BinaryOp {
                op: BinaryOperator::Subtract,
                left: Box::new(FormulaExpr::BinaryOp {
                    op: BinaryOperator::Subtract,
                    left: num(10.0),
                    right: num(4.0),
                }),
                right: num(3.0),
            }
        );

        // (2^3)^2
        assert_eq!(
            parse_formula("=2^3^2").unwrap(),
            FormulaExpr::BinaryOp {
                op: BinaryOperator::Power,
                left: Box::new(FormulaExpr::BinaryOp {
                    op: BinaryOperator::Power,
                    left: num(2.0),
                    right: num(3.0),
                }),
                right: num(2.0),
            }
        );
    }

    #[test]
    fn test_negative_literal_vs_subtraction() {
        assert_eq!(parse_formula("=-5").unwrap(), FormulaExpr::Number(-5.0));
        assert_eq!(
            parse_formula("=3-5").unwrap(),
            FormulaExpr::BinaryOp {
                op: BinaryOperator::Subtract,
                left: num(3.0),
                right: num(5.0),
            }
        );
        assert_eq!(
            parse_formula("=3--5").unwrap(),
            FormulaExpr::BinaryOp {
                op: BinaryOperator::Subtract,
                left: num(3.0),
                right: num(-5.0),
            }
        );
        assert_eq!(
            parse_formula("=2*-1").unwrap(),
            FormulaExpr::BinaryOp {
                op: BinaryOperator::Multiply,
                left: num(2.0),
                right: num(-1.0),
            }
        );
        assert_eq!(
            parse_formula("=-A1").unwrap(),
            FormulaExpr::UnaryOp {
                op: UnaryOperator::Negate,
                operand: Box::new(FormulaExpr::CellRef(CellAddress::new(0, 0))),
            }
        );
    }

    #[test]
    fn test_parse_comparison_and_concat() {
        assert!(matches!(
            parse_formula("=A1>=5").unwrap(),
            FormulaExpr::BinaryOp {
                op: BinaryOperator::GreaterEqual,
                ..
            }
        ));
        assert!(matches!(
            parse_formula("=A1<>5").unwrap(),
            FormulaExpr::BinaryOp {
                op: BinaryOperator::NotEqual,
                ..
            }
        ));
        // & binds looser than +
        assert!(matches!(
            parse_formula("=\"n=\"&1+2").unwrap(),
            FormulaExpr::BinaryOp {
                op: BinaryOperator::Concat,
                ..
            }
        ));
    }

    #[test]
    fn test_parse_cell_reference_keeps_absolute_markers() {
        assert_eq!(
            parse_formula("=$B$2").unwrap(),
            FormulaExpr::CellRef(CellAddress::with_absolute(1, 1, true, true))
        );
        assert_eq!(
            parse_formula("=b$2").unwrap(),
            FormulaExpr::CellRef(CellAddress::with_absolute(1, 1, true, false))
        );
    }

    #[test]
    fn test_parse_range_is_normalized() {
        assert_eq!(
            parse_formula("=B3:A1").unwrap(),
            FormulaExpr::RangeRef(CellRange::from_indices(0, 0, 2, 1))
        );
        assert!(parse_formula("=A1:5").is_err());
    }

    #[test]
    fn test_parse_function() {
        assert_eq!(
            parse_formula("=sum(A1:A3, 4)").unwrap(),
            FormulaExpr::Function {
                name: "SUM".into(),
                args: vec![
                    FormulaExpr::RangeRef(CellRange::from_indices(0, 0, 2, 0)),
                    FormulaExpr::Number(4.0),
                ],
            }
        );

        let nested = parse_formula("=ROUND(AVERAGE(A1:A3)*1.2, 2)").unwrap();
        assert!(matches!(nested, FormulaExpr::Function { ref name, .. } if name == "ROUND"));
    }

    #[test]
    fn test_unknown_function_rejected() {
        assert_eq!(
            parse_formula("=FROBNICATE(1)").unwrap_err(),
            FormulaError::UnknownFunction("FROBNICATE".into())
        );
    }

    #[test]
    fn test_argument_count_checked() {
        assert!(matches!(
            parse_formula("=ROUND(1)").unwrap_err(),
            FormulaError::ArgumentCount { .. }
        ));
        assert!(matches!(
            parse_formula("=IF(1,2,3,4)").unwrap_err(),
            FormulaError::ArgumentCount { .. }
        ));
    }

    #[test]
    fn test_unbalanced_parentheses() {
        for formula in ["=(1+2", "=1+2)", "=SUM(1,2", "=((A1)"] {
            let err = parse_formula(formula).unwrap_err();
            assert!(
                matches!(err, FormulaError::Parse(ref msg) if msg.contains("parentheses")),
                "{} -> {:?}",
                formula,
                err
            );
        }
    }

    #[test]
    fn test_malformed_formulas() {
        assert!(parse_formula("1+2").is_err());
        assert!(parse_formula("=").is_err());
        assert!(parse_formula("=1+").is_err());
        assert!(parse_formula("=1 2").is_err());
        assert!(parse_formula("=@A1").is_err());
        assert!(parse_formula("=Total").is_err());
        assert!(parse_formula("=SUM(1,,2)").is_err());
    }

    #[test]
    fn test_render_roundtrip_examples() {
        for formula in [
            "=1+2*3",
            "=(1+2)*3",
            "=10-(4-3)",
            "=2^-1",
            "=-A1^2",
            "=-(A1+B1)",
            "=3--5",
            "=\"say \"\"hi\"\"\"&A1",
            "=IF(AND($A$1>0,B$2<>\"x\"),SUM(A1:C3),#N/A)",
            "=A1=(B1=FALSE)",
        ] {
            let ast = parse_formula(formula).unwrap();
            assert_eq!(ast.to_formula_string(), formula);
            assert_eq!(parse_formula(&ast.to_formula_string()).unwrap(), ast);
        }
    }

    fn arb_expr() -> impl Strategy<Value = FormulaExpr> {
        let leaf = prop_oneof![
            (-1000i32..1000).prop_map(|n| FormulaExpr::Number(n as f64 / 4.0)),
            "[a-z ]{0,5}".prop_map(FormulaExpr::String),
            any::<bool>().prop_map(FormulaExpr::Boolean),
            (0u32..50, 0u16..20, any::<bool>(), any::<bool>()).prop_map(|(r, c, ra, ca)| {
                FormulaExpr::CellRef(CellAddress::with_absolute(r, c, ra, ca))
            }),
            (0u32..50, 0u16..20, 0u32..50, 0u16..20).prop_map(|(r1, c1, r2, c2)| {
                FormulaExpr::RangeRef(CellRange::from_indices(r1, c1, r2, c2))
            }),
        ];
        leaf.prop_recursive(4, 32, 3, |inner| {
            let ops = prop_oneof![
                Just(BinaryOperator::Add),
                Just(BinaryOperator::Subtract),
                Just(BinaryOperator::Multiply),
                Just(BinaryOperator::Divide),
                Just(BinaryOperator::Power),
                Just(BinaryOperator::Concat),
                Just(BinaryOperator::Equal),
                Just(BinaryOperator::LessEqual),
            ];
            prop_oneof![
                (ops, inner.clone(), inner.clone()).prop_map(|(op, l, r)| {
                    FormulaExpr::BinaryOp {
                        op,
                        left: Box::new(l),
                        right: Box::new(r),
                    }
                }),
                inner
                    .clone()
                    .prop_filter("negated literals fold", |e| !matches!(
                        e,
                        FormulaExpr::Number(_)
                    ))
                    .prop_map(|e| FormulaExpr::UnaryOp {
                        op: UnaryOperator::Negate,
                        operand: Box::new(e),
                    }),
                prop::collection::vec(inner, 1..4).prop_map(|args| FormulaExpr::Function {
                    name: "SUM".into(),
                    args,
                }),
            ]
        })
    }

    proptest! {
        #[test]
        fn rendering_then_parsing_is_identity(expr in arb_expr()) {
            let text = expr.to_formula_string();
            let reparsed = parse_formula(&text).unwrap();
            prop_assert_eq!(reparsed, expr);
        }
    }
}
