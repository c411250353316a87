use std::str::Chars;

use peekmore::{PeekMore, PeekMoreIterator};

use crate::error::ScanError;
use crate::token::{Literal, Location, Token, Type};

/// Turns a source string into a token stream. Errors (an unterminated
/// string, an unterminated number, an unrecognized character) do not stop
/// scanning; they are collected and returned alongside whatever tokens were
/// recovered, matching the parser's resynchronize-and-keep-going behavior.
pub struct Scanner<'a> {
    source: PeekMoreIterator<Chars<'a>>,
    tokens: Vec<Token>,
    errors: Vec<ScanError>,
    start: usize,
    current: usize,
    line: usize,
    column_offset: usize,
}

impl<'a> Scanner<'a> {
    pub fn new(source: &'a str) -> Scanner<'a> {
        Scanner {
            source: source.chars().peekmore(),
            tokens: Vec::new(),
            errors: Vec::new(),
            start: 0,
            current: 0,
            line: 1,
            column_offset: 0,
        }
    }

    /// Scans the full source, returning the token stream (always terminated
    /// by a synthetic `EOF`) and any errors encountered along the way.
    pub fn scan_tokens(mut self) -> (Vec<Token>, Vec<ScanError>) {
        while !self.is_at_end() {
            self.start = self.current;
            self.scan_token();
        }

        self.tokens.push(Token::new(
            Type::EOF,
            String::new(),
            None,
            Location::new(self.line, self.current - self.column_offset),
        ));

        (self.tokens, self.errors)
    }

    fn advance(&mut self) -> char {
        match self.source.next() {
            Some(c) => {
                self.current += 1;
                c
            }
            None => panic!("tried to advance past end of the file"),
        }
    }

    fn peek(&mut self) -> char {
        self.source.peek().copied().unwrap_or('\0')
    }

    fn peek_next(&mut self) -> char {
        self.source.peek_next().copied().unwrap_or('\0')
    }

    fn match_next(&mut self, expected: char) -> bool {
        if self.peek() == expected {
            self.advance();
            true
        } else {
            false
        }
    }

    fn current_location(&self) -> Location {
        Location::new(self.line, self.start - self.column_offset)
    }

    fn add_token(&mut self, r#type: Type, lexeme: String, literal: Option<Literal>) {
        let location = self.current_location();
        self.tokens.push(Token::new(r#type, lexeme, literal, location));
    }

    fn add_single_char_token(&mut self, r#type: Type) {
        let c = self.advance();
        self.add_token(r#type, c.to_string(), None);
    }

    fn add_double_char_token(&mut self, r#type: Type) {
        let first = self.advance();
        let second = self.advance();
        self.add_token(r#type, format!("{first}{second}"), None);
    }

    fn is_at_end(&mut self) -> bool {
        self.source.peek().is_none()
    }

    /// `"…"`. No escape processing. An unterminated string reports an error
    /// and emits no token.
    fn string(&mut self) {
        let start_location = self.current_location();
        self.advance(); // opening quote

        let mut value = Vec::new();
        while !self.is_at_end() && self.peek() != '"' {
            let c = self.advance();
            if c == '\n' {
                self.line += 1;
                self.column_offset = self.current;
            }
            value.push(c);
        }

        if self.is_at_end() {
            self.errors.push(ScanError::at(start_location, "must end with double quotes"));
            return;
        }

        self.advance(); // closing quote

        let value: String = value.into_iter().collect();
        self.add_token(Type::String, value.clone(), Some(Literal::String(value)));
    }

    /// `DIGIT+ ( '.' DIGIT+ )?` parsed as a 64-bit float.
    fn number(&mut self) {
        let mut value = Vec::new();

        while self.peek().is_ascii_digit() {
            value.push(self.advance());
        }

        if self.peek() == '.' {
            if self.peek_next().is_ascii_digit() {
                value.push(self.advance()); // the dot
                while self.peek().is_ascii_digit() {
                    value.push(self.advance());
                }
            } else {
                self.errors.push(ScanError::at(self.current_location(), "unterminated number"));
                return;
            }
        }

        let value: String = value.into_iter().collect();
        let value_num: f64 = value.parse().expect("digit run must parse as f64");

        self.add_token(Type::Number, value, Some(Literal::Number(value_num)));
    }

    /// `[A-Za-z_][A-Za-z0-9_]*`, resolved against the keyword set.
    fn identifier(&mut self) {
        let mut value = Vec::new();

        while self.peek().is_alphanumeric() || self.peek() == '_' {
            value.push(self.advance());
        }

        let value = String::from_iter(value);
        let token_type = match value.as_str() {
            "and" => Type::And,
            "break" => Type::Break,
            "class" => Type::Class,
            "else" => Type::Else,
            "false" => Type::False,
            "for" => Type::For,
            "fun" => Type::Fun,
            "if" => Type::If,
            "nil" => Type::Nil,
            "or" => Type::Or,
            "print" => Type::Print,
            "return" => Type::Return,
            "super" => Type::Super,
            "this" => Type::This,
            "true" => Type::True,
            "var" => Type::Var,
            "while" => Type::While,
            _ => Type::Identifier,
        };

        self.add_token(token_type, value, None);
    }

    fn scan_token(&mut self) {
        let c = self.peek();
        match c {
            '(' => self.add_single_char_token(Type::LeftParen),
            ')' => self.add_single_char_token(Type::RightParen),
            '{' => self.add_single_char_token(Type::LeftBrace),
            '}' => self.add_single_char_token(Type::RightBrace),
            ',' => self.add_single_char_token(Type::Comma),
            '.' => self.add_single_char_token(Type::Dot),
            ';' => self.add_single_char_token(Type::Semicolon),
            '?' => self.add_single_char_token(Type::Question),
            ':' => self.add_single_char_token(Type::Colon),

            '-' => {
                self.advance();
                if self.match_next('=') {
                    self.add_token(Type::MinusEqual, String::from("-="), None);
                } else {
                    self.add_token(Type::Minus, String::from("-"), None);
                }
            }
            '+' => {
                self.advance();
                if self.match_next('=') {
                    self.add_token(Type::PlusEqual, String::from("+="), None);
                } else {
                    self.add_token(Type::Plus, String::from("+"), None);
                }
            }
            '*' => {
                self.advance();
                if self.match_next('=') {
                    self.add_token(Type::StarEqual, String::from("*="), None);
                } else {
                    self.add_token(Type::Star, String::from("*"), None);
                }
            }
            '!' => {
                if self.advance() == '!' && self.match_next('=') {
                    self.add_token(Type::BangEqual, String::from("!="), None);
                } else {
                    self.add_token(Type::Bang, String::from("!"), None);
                }
            }
            '=' => {
                self.advance();
                if self.match_next('=') {
                    self.add_token(Type::EqualEqual, String::from("=="), None);
                } else {
                    self.add_token(Type::Equal, String::from("="), None);
                }
            }
            '<' => {
                self.advance();
                if self.match_next('=') {
                    self.add_token(Type::LessEqual, String::from("<="), None);
                } else {
                    self.add_token(Type::Less, String::from("<"), None);
                }
            }
            '>' => {
                self.advance();
                if self.match_next('=') {
                    self.add_token(Type::GreaterEqual, String::from(">="), None);
                } else {
                    self.add_token(Type::Greater, String::from(">"), None);
                }
            }
            '/' => {
                self.advance();
                if self.match_next('/') {
                    while self.peek() != '\n' && !self.is_at_end() {
                        self.advance();
                    }
                } else if self.match_next('=') {
                    self.add_token(Type::SlashEqual, String::from("/="), None);
                } else {
                    self.add_token(Type::Slash, String::from("/"), None);
                }
            }

            ' ' | '\r' | '\t' => {
                self.advance();
            }

            '\n' => {
                self.advance();
                self.line += 1;
                self.column_offset = self.current;
            }

            '"' => self.string(),

            c if c.is_ascii_digit() => self.number(),

            c if c.is_alphabetic() || c == '_' => self.identifier(),

            _ => {
                self.advance();
                self.errors.push(ScanError::at(
                    self.current_location(),
                    format!("unexpected character '{c}'"),
                ));
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn scan(source: &str) -> (Vec<Token>, Vec<ScanError>) {
        Scanner::new(source).scan_tokens()
    }

    #[test]
    fn scans_single_and_double_char_tokens() {
        let (tokens, errors) = scan("!= == <= >= +=");
        assert!(errors.is_empty());
        let types: Vec<Type> = tokens.iter().map(|t| t.r#type).collect();
        assert_eq!(
            types,
            vec![
                Type::BangEqual,
                Type::EqualEqual,
                Type::LessEqual,
                Type::GreaterEqual,
                Type::PlusEqual,
                Type::EOF,
            ]
        );
    }

    #[test]
    fn scans_number_as_f64() {
        let (tokens, errors) = scan("3.1415");
        assert!(errors.is_empty());
        assert_eq!(tokens[0].literal, Some(Literal::Number(3.1415)));
    }

    #[test]
    fn unterminated_string_reports_error_and_no_token() {
        let (tokens, errors) = scan("\"abc");
        assert_eq!(tokens.len(), 1); // just EOF
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("must end with double quotes"));
    }

    #[test]
    fn identifies_keywords() {
        let (tokens, _) = scan("var break nil and or");
        let types: Vec<Type> = tokens.iter().map(|t| t.r#type).collect();
        assert_eq!(
            types,
            vec![Type::Var, Type::Break, Type::Nil, Type::And, Type::Or, Type::EOF]
        );
    }

    #[test]
    fn unknown_character_does_not_stop_scanning() {
        let (tokens, errors) = scan("1 @ 2");
        assert_eq!(errors.len(), 1);
        let types: Vec<Type> = tokens.iter().map(|t| t.r#type).collect();
        assert_eq!(types, vec![Type::Number, Type::Number, Type::EOF]);
    }
}
