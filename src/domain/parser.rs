//! Formula parser.
//!
//! A hand-written lexer and recursive descent parser that turn formula text
//! (without its leading `=`) into a [`Tree`]. The parser never evaluates
//! anything; evaluation and reference collection are tree walks over its
//! output.
//!
//! # Grammar
//!
//! ```bnf
//! Expression     ::= Addition
//! Addition       ::= Multiplication ( ( "+" | "-" ) Multiplication )*
//! Multiplication ::= Unary ( ( "*" | "/" ) Unary )*
//! Unary          ::= "-" Unary | "+" Unary | Primary
//! Primary        ::= Number | String | "(" Expression ")"
//!                  | Reference ( ":" Reference )?
//!                  | Name "(" ( Expression ( "," Expression )* )? ")"
//! Reference      ::= ( Sheet "!" )? Coord
//! Sheet          ::= Identifier | "'" text "'"
//! Coord          ::= [A-Z]{1,3} [0-9]+
//! Number         ::= [0-9]* "." [0-9]+ | [0-9]+
//! String         ::= '"' [^"]* '"'
//! ```
//!
//! Binary operators are left-associative, so `1 - 2 - 3` groups as
//! `(1 - 2) - 3`. Unary minus binds tighter than any binary operator.

use super::errors::{DomainError, DomainResult};
use super::models::CellAddress;
use super::tree::{Node, Rule, Terminal, TerminalKind, Tree};

/// Nesting limit for parentheses, unary operators and call arguments.
pub const MAX_NESTING: usize = 128;

/// A lexical token.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Literals
    Number(String),
    /// String literal, quotes included.
    Str(String),
    Identifier(String),
    /// Quoted sheet name with the quotes removed.
    QuotedSheet(String),

    // Operators
    Plus,
    Minus,
    Multiply,
    Divide,

    // Delimiters
    LeftParen,
    RightParen,
    Comma,
    Colon,
    Bang,

    Eof,
}

/// Lexical analyzer for formula text.
pub struct Lexer {
    input: Vec<char>,
    position: usize,
    current_char: Option<char>,
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        let chars: Vec<char> = input.chars().collect();
        let current_char = chars.first().copied();

        Self {
            input: chars,
            position: 0,
            current_char,
        }
    }

    pub fn position(&self) -> usize {
        self.position
    }

    fn advance(&mut self) {
        self.position += 1;
        self.current_char = self.input.get(self.position).copied();
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

    fn read_digits(&mut self, out: &mut String) {
        while let Some(ch) = self.current_char {
            if ch.is_ascii_digit() {
                out.push(ch);
                self.advance();
            } else {
                break;
            }
        }
    }

    fn read_number(&mut self) -> DomainResult<String> {
        let start = self.position;
        let mut number = String::new();

        self.read_digits(&mut number);

        if self.current_char == Some('.') {
            number.push('.');
            self.advance();
            let before = number.len();
            self.read_digits(&mut number);
            if number.len() == before {
                return Err(DomainError::parse(start, format!("Invalid number: {}", number)));
            }
        }

        Ok(number)
    }

    fn read_identifier(&mut self) -> String {
        let mut identifier = String::new();

        while let Some(ch) = self.current_char {
            if ch.is_ascii_alphanumeric() || ch == '_' {
                identifier.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        identifier
    }

    fn read_string(&mut self) -> DomainResult<String> {
        let start = self.position;
        let mut literal = String::from('"');
        self.advance();

        loop {
            match self.current_char {
                None => return Err(DomainError::parse(start, "Unterminated string literal")),
                Some('"') => {
                    literal.push('"');
                    self.advance();
                    return Ok(literal);
                }
                Some(ch) => {
                    literal.push(ch);
                    self.advance();
                }
            }
        }
    }

    /// Reads `'...'`, where a doubled quote stands for one quote.
    fn read_quoted_sheet(&mut self) -> DomainResult<String> {
        let start = self.position;
        let mut name = String::new();
        self.advance();

        loop {
            match self.current_char {
                None => return Err(DomainError::parse(start, "Unterminated sheet name")),
                Some('\'') => {
                    self.advance();
                    if self.current_char == Some('\'') {
                        name.push('\'');
                        self.advance();
                    } else {
                        break;
                    }
                }
                Some(ch) => {
                    name.push(ch);
                    self.advance();
                }
            }
        }

        if name.is_empty() {
            return Err(DomainError::parse(start, "Empty sheet name"));
        }
        Ok(name)
    }

    pub fn next_token(&mut self) -> DomainResult<Token> {
        self.skip_whitespace();

        let Some(ch) = self.current_char else {
            return Ok(Token::Eof);
        };

        match ch {
            '0'..='9' | '.' => Ok(Token::Number(self.read_number()?)),
            'A'..='Z' | 'a'..='z' | '_' => Ok(Token::Identifier(self.read_identifier())),
            '"' => Ok(Token::Str(self.read_string()?)),
            '\'' => Ok(Token::QuotedSheet(self.read_quoted_sheet()?)),
            _ => {
                let token = match ch {
                    '+' => Token::Plus,
                    '-' => Token::Minus,
                    '*' => Token::Multiply,
                    '/' => Token::Divide,
                    '(' => Token::LeftParen,
                    ')' => Token::RightParen,
                    ',' => Token::Comma,
                    ':' => Token::Colon,
                    '!' => Token::Bang,
                    _ => {
                        return Err(DomainError::parse(
                            self.position,
                            format!("Unexpected character: '{}'", ch),
                        ));
                    }
                };
                self.advance();
                Ok(token)
            }
        }
    }
}

/// Recursive descent parser producing a [`Tree`].
pub struct Parser {
    lexer: Lexer,
    current_token: Token,
    token_start: usize,
    depth: usize,
}

impl Parser {
    pub fn new(input: &str) -> DomainResult<Self> {
        let mut lexer = Lexer::new(input);
        lexer.skip_whitespace();
        let token_start = lexer.position();
        let current_token = lexer.next_token()?;

        Ok(Self {
            lexer,
            current_token,
            token_start,
            depth: 0,
        })
    }

    fn advance(&mut self) -> DomainResult<()> {
        self.lexer.skip_whitespace();
        self.token_start = self.lexer.position();
        self.current_token = self.lexer.next_token()?;
        Ok(())
    }

    fn error(&self, message: impl Into<String>) -> DomainError {
        DomainError::parse(self.token_start, message)
    }

    fn expect(&mut self, expected: Token) -> DomainResult<()> {
        if self.current_token == expected {
            self.advance()
        } else {
            Err(self.error(format!("Expected {:?}, found {:?}", expected, self.current_token)))
        }
    }

    fn enter(&mut self) -> DomainResult<()> {
        self.depth += 1;
        if self.depth > MAX_NESTING {
            return Err(self.error("Expression nested too deeply"));
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    /// Parses the whole input as one expression.
    pub fn parse(&mut self) -> DomainResult<Tree> {
        let tree = self.parse_addition()?;

        if self.current_token != Token::Eof {
            return Err(self.error(format!("Unexpected token at end: {:?}", self.current_token)));
        }

        Ok(tree)
    }

    fn parse_addition(&mut self) -> DomainResult<Tree> {
        let mut left = self.parse_multiplication()?;

        while matches!(self.current_token, Token::Plus | Token::Minus) {
            let op = if self.current_token == Token::Plus { "+" } else { "-" };
            self.advance()?;
            let right = self.parse_multiplication()?;
            left = Tree::new(
                Rule::AddExpr,
                vec![
                    left.into(),
                    Terminal::new(TerminalKind::AddOp, op).into(),
                    right.into(),
                ],
            );
        }

        Ok(left)
    }

    fn parse_multiplication(&mut self) -> DomainResult<Tree> {
        let mut left = self.parse_unary()?;

        while matches!(self.current_token, Token::Multiply | Token::Divide) {
            let op = if self.current_token == Token::Multiply { "*" } else { "/" };
            self.advance()?;
            let right = self.parse_unary()?;
            left = Tree::new(
                Rule::MulExpr,
                vec![
                    left.into(),
                    Terminal::new(TerminalKind::MulOp, op).into(),
                    right.into(),
                ],
            );
        }

        Ok(left)
    }

    fn parse_unary(&mut self) -> DomainResult<Tree> {
        match self.current_token {
            Token::Minus => {
                self.advance()?;
                self.enter()?;
                let operand = self.parse_unary()?;
                self.leave();
                Ok(Tree::new(Rule::Neg, vec![operand.into()]))
            }
            Token::Plus => {
                self.advance()?;
                self.enter()?;
                let operand = self.parse_unary();
                self.leave();
                operand
            }
            _ => self.parse_primary(),
        }
    }

    fn parse_primary(&mut self) -> DomainResult<Tree> {
        match self.current_token.clone() {
            Token::Number(text) => {
                self.advance()?;
                Ok(Tree::new(
                    Rule::Number,
                    vec![Terminal::new(TerminalKind::Number, text).into()],
                ))
            }

            Token::Str(text) => {
                self.advance()?;
                Ok(Tree::new(
                    Rule::String,
                    vec![Terminal::new(TerminalKind::String, text).into()],
                ))
            }

            Token::LeftParen => {
                self.advance()?;
                self.enter()?;
                let inner = self.parse_addition()?;
                self.leave();
                self.expect(Token::RightParen)?;
                Ok(Tree::new(Rule::Parens, vec![inner.into()]))
            }

            Token::QuotedSheet(sheet) => {
                self.advance()?;
                let cell = self.parse_sheet_qualified(sheet)?;
                self.parse_range_tail(cell)
            }

            Token::Identifier(name) => {
                self.advance()?;
                match self.current_token {
                    Token::LeftParen => self.parse_call(name),
                    Token::Bang => {
                        let cell = self.parse_sheet_qualified(name)?;
                        self.parse_range_tail(cell)
                    }
                    _ => {
                        let cell = self.cell_tree(None, &name)?;
                        self.parse_range_tail(cell)
                    }
                }
            }

            _ => Err(self.error(format!("Unexpected token: {:?}", self.current_token))),
        }
    }

    /// Parses `"!" Coord` after a sheet name has been consumed.
    fn parse_sheet_qualified(&mut self, sheet: String) -> DomainResult<Tree> {
        self.expect(Token::Bang)?;
        match self.current_token.clone() {
            Token::Identifier(coord) => {
                let cell = self.cell_tree(Some(sheet), &coord)?;
                self.advance()?;
                Ok(cell)
            }
            _ => Err(self.error(format!("Expected cell reference after '{}!'", sheet))),
        }
    }

    fn parse_range_tail(&mut self, start: Tree) -> DomainResult<Tree> {
        if self.current_token != Token::Colon {
            return Ok(start);
        }
        self.advance()?;

        let end = match self.current_token.clone() {
            Token::QuotedSheet(sheet) => {
                self.advance()?;
                self.parse_sheet_qualified(sheet)?
            }
            Token::Identifier(name) => {
                self.advance()?;
                if self.current_token == Token::Bang {
                    self.parse_sheet_qualified(name)?
                } else {
                    self.cell_tree(None, &name)?
                }
            }
            _ => return Err(self.error("Expected cell reference after ':'")),
        };

        Ok(Tree::new(Rule::Range, vec![start.into(), end.into()]))
    }

    fn parse_call(&mut self, name: String) -> DomainResult<Tree> {
        self.expect(Token::LeftParen)?;
        self.enter()?;

        let mut children: Vec<Node> =
            vec![Terminal::new(TerminalKind::Name, name.to_ascii_uppercase()).into()];

        if self.current_token != Token::RightParen {
            children.push(self.parse_addition()?.into());
            while self.current_token == Token::Comma {
                self.advance()?;
                children.push(self.parse_addition()?.into());
            }
        }

        self.leave();
        self.expect(Token::RightParen)?;
        Ok(Tree::new(Rule::Call, children))
    }

    fn cell_tree(&self, sheet: Option<String>, coord: &str) -> DomainResult<Tree> {
        if CellAddress::parse(coord).is_none() {
            return Err(self.error(format!("Unknown identifier: {}", coord)));
        }

        let mut children: Vec<Node> = Vec::with_capacity(2);
        if let Some(sheet) = sheet {
            children.push(Terminal::new(TerminalKind::Sheet, sheet).into());
        }
        children.push(Terminal::new(TerminalKind::Coord, coord.to_ascii_uppercase()).into());
        Ok(Tree::new(Rule::Cell, children))
    }
}

/// Parses formula text (without the leading `=`) into a tree.
pub fn parse_expression(input: &str) -> DomainResult<Tree> {
    Parser::new(input)?.parse()
}
