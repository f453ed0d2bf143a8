//! Parser for formula and condition source text
//!
//! Implements a recursive descent parser with one function per precedence
//! level, from the right-associative ternary down to primaries. Every token
//! carries the character offset it started at so errors can point into the
//! source.

use crate::condition::trivial_condition;
use crate::error::ParseError;
use crate::formula::ast::{BinaryOperator, Expression};
use formulary_types::Value;
use std::fmt;

/// Deepest nesting of parentheses, call arguments, ternary branches and unary
/// operators the parser will recurse into
pub const MAX_NESTING_DEPTH: usize = 64;

/// Tallest expression tree the parser will build; bounds evaluator recursion.
/// Long flat chains such as `a + b + c + ...` grow one level per operator.
pub const MAX_TREE_DEPTH: usize = 2048;

/// Token types recognized by the lexer
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Literals
    Number(f64),
    String(String),
    True,
    False,

    Identifier(String),

    // Operators
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Equal,
    NotEqual,
    LessThan,
    LessThanEqual,
    GreaterThan,
    GreaterThanEqual,
    And,
    Or,
    Not,
    Question,
    Colon,

    // Delimiters
    LeftParen,
    RightParen,
    Comma,

    Eof,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Number(n) => write!(f, "number {}", n),
            Token::String(s) => write!(f, "string \"{}\"", s),
            Token::True => write!(f, "'true'"),
            Token::False => write!(f, "'false'"),
            Token::Identifier(name) => write!(f, "identifier '{}'", name),
            Token::Plus => write!(f, "'+'"),
            Token::Minus => write!(f, "'-'"),
            Token::Star => write!(f, "'*'"),
            Token::Slash => write!(f, "'/'"),
            Token::Percent => write!(f, "'%'"),
            Token::Equal => write!(f, "'=='"),
            Token::NotEqual => write!(f, "'!='"),
            Token::LessThan => write!(f, "'<'"),
            Token::LessThanEqual => write!(f, "'<='"),
            Token::GreaterThan => write!(f, "'>'"),
            Token::GreaterThanEqual => write!(f, "'>='"),
            Token::And => write!(f, "'&&'"),
            Token::Or => write!(f, "'||'"),
            Token::Not => write!(f, "'!'"),
            Token::Question => write!(f, "'?'"),
            Token::Colon => write!(f, "':'"),
            Token::LeftParen => write!(f, "'('"),
            Token::RightParen => write!(f, "')'"),
            Token::Comma => write!(f, "','"),
            Token::Eof => write!(f, "end of input"),
        }
    }
}

/// Lexer for tokenizing formula source text
pub struct Lexer<'a> {
    source: &'a str,
    input: Vec<char>,
    position: usize,
    current_char: Option<char>,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        let input: Vec<char> = source.chars().collect();
        let current_char = input.first().copied();

        Self { source, input, position: 0, current_char }
    }

    fn advance(&mut self) {
        self.position += 1;
        self.current_char = self.input.get(self.position).copied();
    }

    fn peek(&self) -> Option<char> {
        self.input.get(self.position + 1).copied()
    }

    fn error(&self, message: impl Into<String>, position: usize) -> ParseError {
        ParseError::new(message, self.source, position)
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.current_char {
            if ch.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn read_number(&mut self) -> Result<Token, ParseError> {
        let start = self.position;
        let mut number = String::new();
        let mut seen_dot = false;

        while let Some(ch) = self.current_char {
            if ch.is_ascii_digit() {
                number.push(ch);
                self.advance();
            } else if ch == '.' && !seen_dot {
                seen_dot = true;
                number.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        match number.parse::<f64>() {
            Ok(value) if value.is_finite() => Ok(Token::Number(value)),
            Ok(_) => Err(self.error(format!("number '{}' is out of range", number), start)),
            Err(e) => Err(self.error(format!("invalid number '{}': {}", number, e), start)),
        }
    }

    fn read_string(&mut self, quote: char) -> Result<Token, ParseError> {
        let start = self.position;
        let mut string = String::new();
        self.advance(); // Skip opening quote

        while let Some(ch) = self.current_char {
            if ch == quote {
                self.advance(); // Skip closing quote
                return Ok(Token::String(string));
            } else if ch == '\\' {
                self.advance();
                match self.current_char {
                    Some('n') => string.push('\n'),
                    Some('t') => string.push('\t'),
                    Some('r') => string.push('\r'),
                    Some('\\') => string.push('\\'),
                    Some('"') => string.push('"'),
                    Some('\'') => string.push('\''),
                    Some(other) => {
                        string.push('\\');
                        string.push(other);
                    }
                    None => break,
                }
                self.advance();
            } else {
                string.push(ch);
                self.advance();
            }
        }

        Err(self.error("unterminated string literal", start))
    }

    fn read_identifier(&mut self) -> Token {
        let mut identifier = String::new();

        while let Some(ch) = self.current_char {
            if ch.is_ascii_alphanumeric() || ch == '_' {
                identifier.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        if identifier.eq_ignore_ascii_case("true") {
            Token::True
        } else if identifier.eq_ignore_ascii_case("false") {
            Token::False
        } else {
            Token::Identifier(identifier)
        }
    }

    /// Consume a one-character token
    fn single(&mut self, token: Token) -> Token {
        self.advance();
        token
    }

    /// Consume a token that is `short` alone or `long` when followed by `next`
    fn one_or_two(&mut self, next: char, long: Token, short: Token) -> Token {
        if self.peek() == Some(next) {
            self.advance();
            self.advance();
            long
        } else {
            self.advance();
            short
        }
    }

    /// Consume a two-character token whose first character is invalid alone
    fn doubled(&mut self, ch: char, token: Token) -> Result<Token, ParseError> {
        if self.peek() == Some(ch) {
            self.advance();
            self.advance();
            Ok(token)
        } else {
            Err(self.error(
                format!("unexpected character '{}'. Did you mean '{}{}'?", ch, ch, ch),
                self.position,
            ))
        }
    }

    /// Next token and the character offset it starts at
    pub fn next_token(&mut self) -> Result<(Token, usize), ParseError> {
        self.skip_whitespace();
        let start = self.position;

        let token = match self.current_char {
            None => Token::Eof,
            Some(ch) => match ch {
                '0'..='9' => self.read_number()?,
                '.' if self.peek().is_some_and(|next| next.is_ascii_digit()) => {
                    self.read_number()?
                }
                '"' | '\'' => self.read_string(ch)?,
                'a'..='z' | 'A'..='Z' | '_' => self.read_identifier(),
                '+' => self.single(Token::Plus),
                '-' => self.single(Token::Minus),
                '*' => self.single(Token::Star),
                '/' => self.single(Token::Slash),
                '%' => self.single(Token::Percent),
                '?' => self.single(Token::Question),
                ':' => self.single(Token::Colon),
                '(' => self.single(Token::LeftParen),
                ')' => self.single(Token::RightParen),
                ',' => self.single(Token::Comma),
                '<' => self.one_or_two('=', Token::LessThanEqual, Token::LessThan),
                '>' => self.one_or_two('=', Token::GreaterThanEqual, Token::GreaterThan),
                '!' => self.one_or_two('=', Token::NotEqual, Token::Not),
                '=' => self.doubled('=', Token::Equal)?,
                '&' => self.doubled('&', Token::And)?,
                '|' => self.doubled('|', Token::Or)?,
                _ => return Err(self.error(format!("unexpected character '{}'", ch), start)),
            },
        };

        Ok((token, start))
    }
}

/// Parsed subtree plus its height, used to bound tree depth
struct Node {
    expr: Expression,
    depth: usize,
}

impl Node {
    fn leaf(expr: Expression) -> Self {
        Self { expr, depth: 1 }
    }
}

/// Parser for formula expressions
pub struct Parser<'a> {
    lexer: Lexer<'a>,
    current_token: Token,
    current_position: usize,
    recursion: usize,
}

impl<'a> Parser<'a> {
    pub fn new(mut lexer: Lexer<'a>) -> Result<Self, ParseError> {
        let (current_token, current_position) = lexer.next_token()?;
        Ok(Self { lexer, current_token, current_position, recursion: 0 })
    }

    fn advance(&mut self) -> Result<(), ParseError> {
        let (token, position) = self.lexer.next_token()?;
        self.current_token = token;
        self.current_position = position;
        Ok(())
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError::new(message, self.lexer.source, self.current_position)
    }

    fn expect(&mut self, expected: Token) -> Result<(), ParseError> {
        if self.current_token == expected {
            self.advance()
        } else {
            Err(self.error(format!("expected {}, found {}", expected, self.current_token)))
        }
    }

    fn enter(&mut self) -> Result<(), ParseError> {
        self.recursion += 1;
        if self.recursion > MAX_NESTING_DEPTH {
            return Err(self.error(format!(
                "expression nested deeper than {} levels",
                MAX_NESTING_DEPTH
            )));
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.recursion -= 1;
    }

    fn node(&self, expr: Expression, children: &[usize]) -> Result<Node, ParseError> {
        let depth = children.iter().copied().max().unwrap_or(0) + 1;
        if depth > MAX_TREE_DEPTH {
            return Err(self.error(format!("expression tree deeper than {} levels", MAX_TREE_DEPTH)));
        }
        Ok(Node { expr, depth })
    }

    fn binary(&self, left: Node, op: BinaryOperator, right: Node) -> Result<Node, ParseError> {
        let depths = [left.depth, right.depth];
        self.node(Expression::binary(left.expr, op, right.expr), &depths)
    }

    /// Parse a complete expression; the caller checks for trailing input
    pub fn parse_expression(&mut self) -> Result<Expression, ParseError> {
        Ok(self.parse_nested()?.expr)
    }

    fn parse_nested(&mut self) -> Result<Node, ParseError> {
        self.enter()?;
        let node = self.parse_ternary_expression();
        self.leave();
        node
    }

    fn parse_ternary_expression(&mut self) -> Result<Node, ParseError> {
        let condition = self.parse_or_expression()?;

        if self.current_token != Token::Question {
            return Ok(condition);
        }

        // Right-associative: both branches may themselves be ternaries
        self.advance()?;
        let then_expr = self.parse_nested()?;
        self.expect(Token::Colon)?;
        let else_expr = self.parse_nested()?;

        let depths = [condition.depth, then_expr.depth, else_expr.depth];
        self.node(Expression::ternary(condition.expr, then_expr.expr, else_expr.expr), &depths)
    }

    fn parse_or_expression(&mut self) -> Result<Node, ParseError> {
        let mut left = self.parse_and_expression()?;

        while self.current_token == Token::Or {
            self.advance()?;
            let right = self.parse_and_expression()?;
            left = self.binary(left, BinaryOperator::Or, right)?;
        }

        Ok(left)
    }

    fn parse_and_expression(&mut self) -> Result<Node, ParseError> {
        let mut left = self.parse_equality_expression()?;

        while self.current_token == Token::And {
            self.advance()?;
            let right = self.parse_equality_expression()?;
            left = self.binary(left, BinaryOperator::And, right)?;
        }

        Ok(left)
    }

    fn parse_equality_expression(&mut self) -> Result<Node, ParseError> {
        let mut left = self.parse_relational_expression()?;

        loop {
            let op = match self.current_token {
                Token::Equal => BinaryOperator::Equal,
                Token::NotEqual => BinaryOperator::NotEqual,
                _ => break,
            };
            self.advance()?;
            let right = self.parse_relational_expression()?;
            left = self.binary(left, op, right)?;
        }

        Ok(left)
    }

    fn parse_relational_expression(&mut self) -> Result<Node, ParseError> {
        let mut left = self.parse_additive_expression()?;

        loop {
            let op = match self.current_token {
                Token::LessThan => BinaryOperator::LessThan,
                Token::LessThanEqual => BinaryOperator::LessThanOrEqual,
                Token::GreaterThan => BinaryOperator::GreaterThan,
                Token::GreaterThanEqual => BinaryOperator::GreaterThanOrEqual,
                _ => break,
            };
            self.advance()?;
            let right = self.parse_additive_expression()?;
            left = self.binary(left, op, right)?;
        }

        Ok(left)
    }

    fn parse_additive_expression(&mut self) -> Result<Node, ParseError> {
        let mut left = self.parse_multiplicative_expression()?;

        loop {
            let op = match self.current_token {
                Token::Plus => BinaryOperator::Add,
                Token::Minus => BinaryOperator::Subtract,
                _ => break,
            };
            self.advance()?;
            let right = self.parse_multiplicative_expression()?;
            left = self.binary(left, op, right)?;
        }

        Ok(left)
    }

    fn parse_multiplicative_expression(&mut self) -> Result<Node, ParseError> {
        let mut left = self.parse_unary_expression()?;

        loop {
            let op = match self.current_token {
                Token::Star => BinaryOperator::Multiply,
                Token::Slash => BinaryOperator::Divide,
                Token::Percent => BinaryOperator::Modulo,
                _ => break,
            };
            self.advance()?;
            let right = self.parse_unary_expression()?;
            left = self.binary(left, op, right)?;
        }

        Ok(left)
    }

    fn parse_unary_expression(&mut self) -> Result<Node, ParseError> {
        let op = match self.current_token {
            Token::Minus | Token::Plus | Token::Not => self.current_token.clone(),
            _ => return self.parse_primary_expression(),
        };

        self.advance()?;
        self.enter()?;
        let operand = self.parse_unary_expression();
        self.leave();
        let operand = operand?;

        // The tree only has five node kinds: sign changes become arithmetic on
        // a zero literal (folded for plain numbers) and `!` becomes not().
        match (op, operand.expr) {
            (Token::Minus, Expression::Literal(Value::Number(n))) => {
                Ok(Node::leaf(Expression::number(-n)))
            }
            (Token::Plus, Expression::Literal(Value::Number(n))) => {
                Ok(Node::leaf(Expression::number(n)))
            }
            (Token::Minus, expr) => self.binary(
                Node::leaf(Expression::number(0.0)),
                BinaryOperator::Subtract,
                Node { expr, depth: operand.depth },
            ),
            (Token::Plus, expr) => self.binary(
                Node::leaf(Expression::number(0.0)),
                BinaryOperator::Add,
                Node { expr, depth: operand.depth },
            ),
            (_, expr) => self.node(Expression::call("not", vec![expr]), &[operand.depth]),
        }
    }

    fn parse_primary_expression(&mut self) -> Result<Node, ParseError> {
        match &self.current_token {
            Token::Number(value) => {
                let val = *value;
                self.advance()?;
                Ok(Node::leaf(Expression::number(val)))
            }
            Token::String(value) => {
                let val = value.clone();
                self.advance()?;
                Ok(Node::leaf(Expression::string(val)))
            }
            Token::True => {
                self.advance()?;
                Ok(Node::leaf(Expression::bool(true)))
            }
            Token::False => {
                self.advance()?;
                Ok(Node::leaf(Expression::bool(false)))
            }
            Token::Identifier(name) => {
                let name = name.clone();
                self.advance()?;
                if self.current_token == Token::LeftParen {
                    self.parse_call_arguments(&name)
                } else {
                    Ok(Node::leaf(Expression::Variable(name)))
                }
            }
            Token::LeftParen => {
                self.advance()?;
                let node = self.parse_nested()?;
                self.expect(Token::RightParen)?;
                Ok(node)
            }
            Token::Eof => Err(self.error("unexpected end of input")),
            other => Err(self.error(format!("unexpected {}", other))),
        }
    }

    fn parse_call_arguments(&mut self, name: &str) -> Result<Node, ParseError> {
        self.advance()?; // consume '('
        let mut args = Vec::new();
        let mut depths = Vec::new();

        if self.current_token != Token::RightParen {
            loop {
                let arg = self.parse_nested()?;
                depths.push(arg.depth);
                args.push(arg.expr);

                if self.current_token == Token::Comma {
                    self.advance()?;
                } else {
                    break;
                }
            }
        }

        self.expect(Token::RightParen)?;
        self.node(Expression::call(name, args), &depths)
    }
}

/// Parse a formula into an expression tree.
///
/// Empty or whitespace-only input is an error, as is any input left over
/// after a complete expression.
pub fn parse_formula(input: &str) -> Result<Expression, ParseError> {
    if input.trim().is_empty() {
        return Err(ParseError::new("empty formula", input, 0));
    }
    parse_complete(input)
}

/// Parse a condition into an expression tree.
///
/// The trivial conditions `""`, `true`, `always`, `false` and `never`
/// (trimmed, case-insensitive) become boolean literals without running the
/// parser. Everything else uses the formula grammar.
pub fn parse_condition(input: &str) -> Result<Expression, ParseError> {
    if let Some(value) = trivial_condition(input) {
        return Ok(Expression::bool(value));
    }
    parse_complete(input)
}

fn parse_complete(input: &str) -> Result<Expression, ParseError> {
    let lexer = Lexer::new(input);
    let mut parser = Parser::new(lexer)?;
    let expr = parser.parse_expression()?;

    // Ensure we've consumed all tokens
    if parser.current_token != Token::Eof {
        return Err(parser.error(format!(
            "unexpected {} after end of expression",
            parser.current_token
        )));
    }

    Ok(expr)
}
