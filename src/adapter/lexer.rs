//! Lexer for the ANTLR4 grammar dialect
//!
//! Produces the token stream and the comment table. Offsets are character
//! indices. Unknown characters and unterminated literals become `ERROR`
//! tokens so the parser can retain them as error nodes.

use crate::syntax::{Comment, Span, Token};

pub const TOKEN_REF: &str = "TOKEN_REF";
pub const RULE_REF: &str = "RULE_REF";
pub const KEYWORD: &str = "KEYWORD";
pub const STRING_LITERAL: &str = "STRING_LITERAL";
pub const CHAR_SET: &str = "LEXER_CHAR_SET";
pub const ACTION: &str = "ACTION";
pub const INT: &str = "INT";
pub const COLON: &str = "COLON";
pub const SEMI: &str = "SEMI";
pub const OR: &str = "OR";
pub const LPAREN: &str = "LPAREN";
pub const RPAREN: &str = "RPAREN";
pub const LBRACE: &str = "LBRACE";
pub const RBRACE: &str = "RBRACE";
pub const COMMA: &str = "COMMA";
pub const ASSIGN: &str = "ASSIGN";
pub const PLUS_ASSIGN: &str = "PLUS_ASSIGN";
pub const RARROW: &str = "RARROW";
pub const AT: &str = "AT";
pub const PUNCT: &str = "PUNCT";
pub const ERROR: &str = "ERROR";

/// Words the ANTLR4 dialect reserves
pub const KEYWORDS: &[&str] = &[
    "catch", "channels", "finally", "fragment", "grammar", "import", "lexer", "locals", "mode",
    "options", "parser", "returns", "throws", "tokens",
];

/// Keywords whose `{` opens a name list instead of an embedded action
const BLOCK_KEYWORDS: &[&str] = &["options", "tokens", "channels"];

pub struct Lexer {
    chars: Vec<char>,
    pos: usize,
    tokens: Vec<Token>,
    comments: Vec<Comment>,
}

impl Lexer {
    pub fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
            tokens: Vec::new(),
            comments: Vec::new(),
        }
    }

    /// Lex the whole input
    pub fn tokenize(mut self) -> (Vec<Token>, Vec<Comment>) {
        while let Some(c) = self.peek(0) {
            let start = self.pos;
            match c {
                c if c.is_whitespace() => self.pos += 1,
                '/' if self.peek(1) == Some('/') => self.line_comment(start),
                '/' if self.peek(1) == Some('*') => self.block_comment(start),
                '\'' => self.string(start),
                '[' => self.char_set(start),
                '{' if self.opens_block() => self.single(start, LBRACE),
                '{' => self.action(start),
                c if c.is_ascii_alphabetic() => self.identifier(start),
                c if c.is_ascii_digit() => {
                    self.eat_while(|c| c.is_ascii_digit());
                    self.push(INT, start);
                }
                ':' => self.single(start, COLON),
                ';' => self.single(start, SEMI),
                '|' => self.single(start, OR),
                '(' => self.single(start, LPAREN),
                ')' => self.single(start, RPAREN),
                '}' => self.single(start, RBRACE),
                ',' => self.single(start, COMMA),
                '@' => self.single(start, AT),
                '=' => self.single(start, ASSIGN),
                '+' if self.peek(1) == Some('=') => {
                    self.pos += 2;
                    self.push(PLUS_ASSIGN, start);
                }
                '-' if self.peek(1) == Some('>') => {
                    self.pos += 2;
                    self.push(RARROW, start);
                }
                '.' if self.peek(1) == Some('.') => {
                    self.pos += 2;
                    self.push(PUNCT, start);
                }
                '?' | '*' | '+' | '~' | '.' | '#' | '<' | '>' => self.single(start, PUNCT),
                _ => self.single(start, ERROR),
            }
        }
        (self.tokens, self.comments)
    }

    fn peek(&self, ahead: usize) -> Option<char> {
        self.chars.get(self.pos + ahead).copied()
    }

    fn eat_while(&mut self, pred: impl Fn(char) -> bool) {
        while self.peek(0).is_some_and(&pred) {
            self.pos += 1;
        }
    }

    fn text(&self, start: usize) -> String {
        self.chars[start..self.pos].iter().collect()
    }

    fn push(&mut self, kind: &'static str, start: usize) {
        let text = self.text(start);
        self.tokens.push(Token { kind, text, span: Span::new(start, self.pos) });
    }

    fn single(&mut self, start: usize, kind: &'static str) {
        self.pos += 1;
        self.push(kind, start);
    }

    fn opens_block(&self) -> bool {
        self.tokens
            .last()
            .is_some_and(|t| t.kind == KEYWORD && BLOCK_KEYWORDS.contains(&t.text.as_str()))
    }

    fn line_comment(&mut self, start: usize) {
        self.eat_while(|c| c != '\n');
        let text = self.text(start);
        self.comments.push(Comment { text, span: Span::new(start, self.pos) });
    }

    fn block_comment(&mut self, start: usize) {
        self.pos += 2;
        while let Some(c) = self.peek(0) {
            if c == '*' && self.peek(1) == Some('/') {
                self.pos += 2;
                break;
            }
            self.pos += 1;
        }
        let text = self.text(start);
        self.comments.push(Comment { text, span: Span::new(start, self.pos) });
    }

    fn string(&mut self, start: usize) {
        self.pos += 1;
        loop {
            match self.peek(0) {
                Some('\\') => self.pos += 2,
                Some('\'') => {
                    self.pos += 1;
                    self.push(STRING_LITERAL, start);
                    return;
                }
                Some('\n') | None => break,
                Some(_) => self.pos += 1,
            }
        }
        self.pos = self.pos.min(self.chars.len());
        self.push(ERROR, start);
    }

    fn char_set(&mut self, start: usize) {
        self.pos += 1;
        loop {
            match self.peek(0) {
                Some('\\') => self.pos += 2,
                Some(']') => {
                    self.pos += 1;
                    self.push(CHAR_SET, start);
                    return;
                }
                Some('\n') | None => break,
                Some(_) => self.pos += 1,
            }
        }
        self.pos = self.pos.min(self.chars.len());
        self.push(ERROR, start);
    }

    fn action(&mut self, start: usize) {
        let mut depth = 0usize;
        while let Some(c) = self.peek(0) {
            match c {
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        self.pos += 1;
                        break;
                    }
                }
                '\\' => self.pos += 1,
                _ => {}
            }
            self.pos += 1;
        }
        self.pos = self.pos.min(self.chars.len());
        self.push(ACTION, start);
    }

    fn identifier(&mut self, start: usize) {
        self.eat_while(|c| c.is_ascii_alphanumeric() || c == '_');
        let text = self.text(start);
        let kind = if KEYWORDS.contains(&text.as_str()) {
            KEYWORD
        } else if text.starts_with(|c: char| c.is_ascii_uppercase()) {
            TOKEN_REF
        } else {
            RULE_REF
        };
        self.tokens.push(Token { kind, text, span: Span::new(start, self.pos) });
    }
}

/// True if `c` can appear inside an ANTLR4 identifier
pub fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}
