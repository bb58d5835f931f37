//! This lexer tokenizes a single line of CASL2.
//!
//! At each position the rules below are tried in order and the first one
//! whose pattern matches at that exact position wins. Mnemonics are tried
//! before labels, so `LD` is always an instruction token; the parser decides
//! later whether it is being used as a label.
use regex::Regex;

use super::ast::OPCODES;
use super::diagnostics::{Diagnostic, DiagnosticKind};

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum TokenKind {
    Mnemonic,
    Register,
    Label,
    Space,
    Comma,
    Decimal,
    Hex,
    Str,
    DecimalLiteral,
    HexLiteral,
    StringLiteral,
    Comment,
    EndOfLine,
}

impl TokenKind {
    /// Tokens that may stand where the grammar expects an address.
    pub fn is_address(self) -> bool {
        use TokenKind::*;
        matches!(self,
            Label | Mnemonic | Decimal | Hex |
            DecimalLiteral | HexLiteral | StringLiteral)
    }

    /// Tokens that may appear in a DC constant list.
    pub fn is_constant(self) -> bool {
        use TokenKind::*;
        matches!(self, Label | Mnemonic | Decimal | Hex | Str)
    }

    /// Literal references, which are pooled into generated DC records.
    pub fn is_literal(self) -> bool {
        use TokenKind::*;
        matches!(self, DecimalLiteral | HexLiteral | StringLiteral)
    }
}

/// `start` and `end` are byte offsets into the source line.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Token {
    pub text:  String,
    pub kind:  TokenKind,
    pub line:  usize,
    pub start: usize,
    pub end:   usize,
}

impl Token {
    pub fn new(text: &str, kind: TokenKind, line: usize, start: usize) -> Self {
        Token{text: text.to_owned(), kind, line, start, end: start + text.len()}
    }
}

lazy_static! {
    static ref MNEMONIC: Regex = Regex::new(&format!(r"^(?:{})\b",
        OPCODES.iter().map(|op| op.mnemonic).collect::<Vec<_>>().join("|"))).unwrap();
    static ref REGISTER: Regex = Regex::new(r"^GR[0-7]\b").unwrap();
    static ref REGISTER_GR8: Regex = Regex::new(r"^GR[0-8]\b").unwrap();
    static ref LABEL: Regex = Regex::new(r"^[A-Z][0-9A-Z]*").unwrap();
    static ref SPACE: Regex = Regex::new(r"^\s+").unwrap();
    static ref COMMA: Regex = Regex::new(r"^,\s*").unwrap();
    static ref DECIMAL_LITERAL: Regex = Regex::new(r"^=-?[0-9]+").unwrap();
    static ref HEX_LITERAL: Regex = Regex::new(r"^=#[0-9A-F]+").unwrap();
    // A quote only closes a string when a separator, a comment or the end
    // of the line follows it. Quote balance is checked by the parser.
    static ref STRING_LITERAL: Regex = Regex::new(r"^='(?:[^']|'+[^',;\s])*'+").unwrap();
    static ref DECIMAL: Regex = Regex::new(r"^-?[0-9]+").unwrap();
    static ref HEX: Regex = Regex::new(r"^#[0-9A-F]+").unwrap();
    static ref STRING: Regex = Regex::new(r"^'(?:[^']|'+[^',;\s])*'+").unwrap();
    static ref COMMENT: Regex = Regex::new(r"^;.*").unwrap();
}

pub struct Lexer {
    use_gr8: bool,
}

impl Lexer {
    pub fn new(use_gr8: bool) -> Self {
        Lexer{use_gr8}
    }

    /// The token rules in priority order.
    fn rules(&self) -> [(TokenKind, &'static Regex); 12] {
        let register: &'static Regex = if self.use_gr8 { &*REGISTER_GR8 } else { &*REGISTER };
        [
            (TokenKind::Mnemonic,       &*MNEMONIC),
            (TokenKind::Register,       register),
            (TokenKind::Label,          &*LABEL),
            (TokenKind::Space,          &*SPACE),
            (TokenKind::Comma,          &*COMMA),
            (TokenKind::DecimalLiteral, &*DECIMAL_LITERAL),
            (TokenKind::HexLiteral,     &*HEX_LITERAL),
            (TokenKind::StringLiteral,  &*STRING_LITERAL),
            (TokenKind::Decimal,        &*DECIMAL),
            (TokenKind::Hex,            &*HEX),
            (TokenKind::Str,            &*STRING),
            (TokenKind::Comment,        &*COMMENT),
        ]
    }

    /// Tokenizes one line. On success the token list always ends with an
    /// `EndOfLine` token. If no rule matches somewhere, the token list is
    /// empty and a single diagnostic covers the rest of the line.
    pub fn tokenize(&self, line: &str, line_number: usize) -> (Vec<Token>, Vec<Diagnostic>) {
        let rules = self.rules();
        let mut out: Vec<Token> = Vec::with_capacity(16);
        let mut pos = 0;

        'mainloop: while pos < line.len() {
            let rest = &line[pos..];
            for (kind, rule) in rules.iter() {
                if let Some(m) = rule.find(rest) {
                    out.push(Token::new(m.as_str(), *kind, line_number, pos));
                    pos += m.end();
                    continue 'mainloop;
                }
            }

            trace!("line {}: no token rule matches at {}", line_number, pos);
            return (Vec::new(), vec![
                Diagnostic::new(line_number, pos, line.len(), DiagnosticKind::InvalidLine)
            ]);
        }

        out.push(Token::new("", TokenKind::EndOfLine, line_number, line.len()));
        (out, Vec::new())
    }
}
