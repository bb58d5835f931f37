//! The Parser module takes the token list of one line from the lexer and
//! turns it into zero or more instruction records.
//!
//! A line is `[label] mnemonic [operands]`. Operand parsing is driven by the
//! mnemonic's `Shape` from the opcode table. The first problem found on a
//! line aborts that line only; the caller moves on to the next one.
use std::collections::VecDeque;
use std::convert::TryFrom;

use super::ast::*;
use super::charset;
use super::diagnostics::{Category, Diagnostic, DiagnosticKind};
use super::lexer::{Token, TokenKind};

type ParseResult<T> = Result<T, Diagnostic>;

/// What the parser is about to consume. Decides which token kinds are
/// acceptable and how to report their absence.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
enum Want {
    Space,
    Comma,
    Mnemonic,
    R1,
    R2,
    R,
    Index,
    Address,
    InputBuffer,
    InputLength,
    OutputBuffer,
    OutputLength,
    WordCount,
    Constant,
    EntryLabel,
}

impl Want {
    fn accepts(self, kind: TokenKind) -> bool {
        use Want::*;
        match self {
            Space => kind == TokenKind::Space,
            Comma => kind == TokenKind::Comma,
            Mnemonic => kind == TokenKind::Mnemonic,
            R1 | R2 | R | Index => kind == TokenKind::Register,
            Address | InputBuffer | InputLength |
            OutputBuffer | OutputLength => kind.is_address(),
            WordCount => kind == TokenKind::Decimal,
            Constant => kind.is_constant(),
            EntryLabel => kind == TokenKind::Label || kind == TokenKind::Mnemonic,
        }
    }

    fn category(self) -> Category {
        use Want::*;
        match self {
            Space => Category::Space,
            Comma => Category::Comma,
            Mnemonic => Category::Mnemonic,
            R1 | R2 | R | Index => Category::Register,
            Address | InputBuffer | InputLength |
            OutputBuffer | OutputLength => Category::Address,
            WordCount => Category::WordCount,
            Constant => Category::Constant,
            EntryLabel => Category::Label,
        }
    }

    /// The diagnostic for a line that ends where this was required.
    fn missing(self) -> DiagnosticKind {
        use Want::*;
        match self {
            Mnemonic => DiagnosticKind::MissingInstruction,
            R1 => DiagnosticKind::MissingR1,
            R2 | Index => DiagnosticKind::MissingR2,
            R => DiagnosticKind::MissingR,
            Address => DiagnosticKind::MissingAddress,
            InputBuffer => DiagnosticKind::MissingInputBuffer,
            InputLength => DiagnosticKind::MissingInputLength,
            OutputBuffer => DiagnosticKind::MissingOutputBuffer,
            OutputLength => DiagnosticKind::MissingOutputLength,
            WordCount => DiagnosticKind::MissingWordCount,
            Constant => DiagnosticKind::MissingConstants,
            Space | Comma | EntryLabel => DiagnosticKind::Expected(self.category()),
        }
    }
}

/// Parses the tokens of one line. `tokens` is the lexer's output, ending in
/// an `EndOfLine` token.
pub fn parse(tokens: Vec<Token>, line: usize) -> (Vec<Instruction>, Vec<Diagnostic>) {
    let mut parser = Parser::new(tokens, line);
    let records = match parser.line() {
        Ok(records) => records,
        Err(d) => {
            parser.diagnostics.push(d);
            Vec::new()
        },
    };
    (records, parser.diagnostics)
}

pub struct Parser {
    tokens: VecDeque<Token>,
    source: Vec<Token>,
    line:   usize,
    /// Byte offset of the end of the line.
    eol:    usize,
    diagnostics: Vec<Diagnostic>,
}

impl Parser {
    pub fn new(tokens: Vec<Token>, line: usize) -> Self {
        let eol = tokens.last().map_or(0, |t| t.end);
        Parser{tokens: VecDeque::from(tokens.clone()), source: tokens, line, eol, diagnostics: Vec::new()}
    }

    /// Parses `[label] mnemonic [operands]`. Blank and comment-only lines
    /// yield no records.
    fn line(&mut self) -> ParseResult<Vec<Instruction>> {
        if self.at_end() {
            return Ok(Vec::new());
        }

        let first = self.peek(0);
        let label = match first.kind {
            TokenKind::Space => {
                self.consume();
                None
            },
            // A mnemonic is only a label when another mnemonic follows it.
            TokenKind::Mnemonic if !(self.peek(1).kind == TokenKind::Space
                                   && self.peek(2).kind == TokenKind::Mnemonic) => None,
            TokenKind::Label | TokenKind::Mnemonic => {
                self.consume();
                self.expect(Want::Space)?;
                Some(first)
            },
            _ => return Err(self.error(first.start, DiagnosticKind::Expected(Category::LabelOrMnemonic))),
        };

        if let Some(tok) = &label {
            if is_register_name(&tok.text) {
                return Err(Diagnostic::new(self.line, tok.start, tok.end, DiagnosticKind::ReservedLabel(tok.text.clone())));
            }
        }

        self.instruction(label.map(|tok| tok.text))
    }

    /// Parses the mnemonic and its operands.
    fn instruction(&mut self, label: Option<String>) -> ParseResult<Vec<Instruction>> {
        let tok = self.expect(Want::Mnemonic)?;
        let info = match lookup(&tok.text) {
            Some(info) => info,
            None => unreachable!("lexer returned unknown mnemonic {}", tok.text),
        };

        let body = match info.shape {
            Shape::None => {
                self.finish();
                match info.code {
                    Some(code) => Body::Op{code, r1: None, r2: None, adr: None},
                    None => Body::End,
                }
            },

            Shape::R => {
                self.operands_begin(Want::R)?;
                let r = self.register(Want::R)?;
                self.finish();
                Body::Op{code: opcode(info), r1: Some(r), r2: None, adr: None}
            },

            Shape::AdrX => {
                self.operands_begin(Want::Address)?;
                let adr = self.address(Want::Address)?;
                let x = self.index()?;
                self.finish();
                Body::Op{code: opcode(info), r1: None, r2: x, adr: Some(adr)}
            },

            Shape::RAdrX => {
                self.operands_begin(Want::R1)?;
                let r1 = self.register(Want::R1)?;
                self.separator(Want::Address)?;
                let adr = self.address(Want::Address)?;
                let x = self.index()?;
                self.finish();
                Body::Op{code: opcode(info), r1: Some(r1), r2: x, adr: Some(adr)}
            },

            Shape::RROrRAdrX => {
                self.operands_begin(Want::R1)?;
                let r1 = self.register(Want::R1)?;
                self.separator(Want::Address)?;
                if self.peek(0).kind.is_address() {
                    let adr = self.address(Want::Address)?;
                    let x = self.index()?;
                    self.finish();
                    Body::Op{code: opcode(info), r1: Some(r1), r2: x, adr: Some(adr)}
                } else {
                    let r2 = self.register(Want::R2)?;
                    self.finish();
                    Body::Op{code: opcode(info) + REGISTER_FORM_OFFSET, r1: Some(r1), r2: Some(r2), adr: None}
                }
            },

            Shape::AdrAdr => {
                let (buf, len) = if info.mnemonic == "IN" {
                    (Want::InputBuffer, Want::InputLength)
                } else {
                    (Want::OutputBuffer, Want::OutputLength)
                };
                self.operands_begin(buf)?;
                let buffer = self.address(buf)?;
                self.separator(len)?;
                let length = self.address(len)?;
                self.finish();
                Body::Io{code: opcode(info), buffer, length}
            },

            Shape::OptionalAdr => {
                if self.at_end() {
                    Body::Start(None)
                } else {
                    self.expect(Want::Space)?;
                    let tok = self.expect(Want::EntryLabel)?;
                    let target = self.symbol(&tok)?;
                    self.finish();
                    Body::Start(Some(target))
                }
            },

            Shape::WordCount => return self.reserve(info, label),
            Shape::Constants => return self.constants(info, label),
        };

        Ok(vec![Instruction::new(info.mnemonic, body, label, self.line).with_tokens(self.source.clone())])
    }

    /// `DS n`: a label-only record for zero words, otherwise one filler
    /// word per reserved word with the label on the first.
    fn reserve(&mut self, info: &'static OpcodeInfo, label: Option<String>) -> ParseResult<Vec<Instruction>> {
        self.operands_begin(Want::WordCount)?;
        let tok = self.expect(Want::WordCount)?;
        let count = self.number(&tok)?;
        if count < 0 {
            return Err(Diagnostic::new(self.line, tok.start, tok.end, DiagnosticKind::InvalidWordCount));
        }
        self.finish();

        if count == 0 {
            return Ok(vec![Instruction::new(info.mnemonic, Body::LabelOnly, label, self.line)
                .with_tokens(self.source.clone())]);
        }

        let filler = || Body::Op{code: NOP_CODE, r1: None, r2: None, adr: None};
        let mut out = Vec::with_capacity(count as usize);
        out.push(Instruction::new(info.mnemonic, filler(), label, self.line).with_tokens(self.source.clone()));
        for _ in 1..count {
            out.push(Instruction::new(info.mnemonic, filler(), None, self.line).continued());
        }
        Ok(out)
    }

    /// `DC c[,c]...`: one data word per constant, strings expanded to one
    /// word per character. The label goes on the first word only.
    fn constants(&mut self, info: &'static OpcodeInfo, label: Option<String>) -> ParseResult<Vec<Instruction>> {
        self.operands_begin(Want::Constant)?;

        let mut words: Vec<Operand> = Vec::new();
        loop {
            let tok = self.expect(Want::Constant)?;
            match tok.kind {
                TokenKind::Decimal | TokenKind::Hex => words.push(Operand::Resolved(self.number(&tok)?)),
                TokenKind::Str => {
                    for code in self.string(&tok, &tok.text)? {
                        words.push(Operand::Resolved(code));
                    }
                },
                _ => words.push(self.symbol(&tok)?),
            }

            if self.peek(0).kind == TokenKind::Comma {
                self.consume();
            } else {
                break;
            }
        }
        self.finish();

        let line = self.line;
        let mut label = label;
        Ok(words.into_iter().enumerate().map(|(i, word)| {
            let inst = Instruction::new(info.mnemonic, Body::Data(word), label.take(), line);
            if i == 0 {
                inst.with_tokens(self.source.clone())
            } else {
                inst.continued()
            }
        }).collect())
    }

    /// Parses an address-shaped operand.
    fn address(&mut self, want: Want) -> ParseResult<Operand> {
        let tok = self.expect(want)?;
        match tok.kind {
            TokenKind::Decimal | TokenKind::Hex => Ok(Operand::Resolved(self.number(&tok)?)),
            kind if kind.is_literal() => {
                let literal = self.literal(&tok)?;
                Ok(Operand::Literal{literal, start: tok.start, end: tok.end})
            },
            _ => self.symbol(&tok),
        }
    }

    fn symbol(&self, tok: &Token) -> ParseResult<Operand> {
        if is_register_name(&tok.text) {
            return Err(Diagnostic::new(self.line, tok.start, tok.end, DiagnosticKind::ReservedLabel(tok.text.clone())));
        }
        Ok(Operand::Symbol{name: tok.text.clone(), start: tok.start, end: tok.end})
    }

    /// `=10`, `=#000A` or `='TEXT'`.
    fn literal(&self, tok: &Token) -> ParseResult<Literal> {
        let body = &tok.text[1..];
        let words = match tok.kind {
            TokenKind::StringLiteral => self.string(tok, body)?,
            _ => vec![self.parse_number(tok, body)?],
        };
        Ok(Literal{text: tok.text.clone(), words})
    }

    fn number(&self, tok: &Token) -> ParseResult<i64> {
        self.parse_number(tok, &tok.text)
    }

    /// Decimal, or hexadecimal when prefixed with `#`. The value must fit
    /// in a word.
    fn parse_number(&self, tok: &Token, text: &str) -> ParseResult<i64> {
        let parsed = if let Some(hex) = text.strip_prefix('#') {
            i64::from_str_radix(hex, 16)
        } else {
            text.parse::<i64>()
        };
        match parsed {
            Ok(value) if in_range(value) => Ok(value),
            _ => Err(Diagnostic::new(self.line, tok.start, tok.end, DiagnosticKind::OutOfRange(text.to_owned()))),
        }
    }

    /// Character codes of a quoted string constant.
    fn string(&self, tok: &Token, quoted: &str) -> ParseResult<Vec<i64>> {
        let err = |kind| Diagnostic::new(self.line, tok.start, tok.end, kind);

        let body = &quoted[1..quoted.len() - 1];
        let text = charset::unescape_quotes(body).ok_or_else(|| err(DiagnosticKind::CannotEscapeQuotes))?;
        if text.is_empty() {
            return Err(err(DiagnosticKind::Expected(Category::Constant)));
        }
        text.chars()
            .map(|c| charset::to_code(c).map(i64::from).ok_or_else(|| err(DiagnosticKind::OutOfCharset)))
            .collect()
    }

    fn register(&mut self, want: Want) -> ParseResult<Register> {
        let tok = self.expect(want)?;
        Register::try_from(tok.text.as_str())
            .map_err(|_| self.error(tok.start, DiagnosticKind::Expected(Category::Register)))
    }

    /// The optional `,x` index register. GR0 cannot index.
    fn index(&mut self) -> ParseResult<Option<Register>> {
        if self.at_end() {
            return Ok(None);
        }
        self.expect(Want::Comma)?;
        let start = self.peek(0).start;
        let x = self.register(Want::Index)?;
        if x == Register::GR0 {
            return Err(Diagnostic::new(self.line, start, start + 3, DiagnosticKind::IndexRegisterGR0));
        }
        Ok(Some(x))
    }

    /// The whitespace between a mnemonic and its first operand.
    fn operands_begin(&mut self, first: Want) -> ParseResult<()> {
        if self.at_end() {
            let at = self.peek(0).start;
            return Err(self.error(at, first.missing()));
        }
        self.expect(Want::Space).map(|_| ())
    }

    /// The comma before a required operand.
    fn separator(&mut self, next: Want) -> ParseResult<()> {
        if self.at_end() {
            let at = self.peek(0).start;
            return Err(self.error(at, next.missing()));
        }
        self.expect(Want::Comma).map(|_| ())
    }

    /// Reports anything left on the line after a complete instruction.
    fn finish(&mut self) {
        if !self.at_end() {
            let at = self.peek(0).start;
            let d = self.error(at, DiagnosticKind::UnnecessaryOperand);
            self.diagnostics.push(d);
        }
    }

    fn expect(&mut self, want: Want) -> ParseResult<Token> {
        let tok = self.consume();
        if want.accepts(tok.kind) {
            return Ok(tok);
        }

        let kind = match tok.kind {
            TokenKind::EndOfLine | TokenKind::Comment => want.missing(),
            _ => DiagnosticKind::Expected(want.category()),
        };
        Err(self.error(tok.start, kind))
    }

    /// True if nothing but whitespace and a comment remains.
    fn at_end(&self) -> bool {
        let ends = |kind: TokenKind| kind == TokenKind::EndOfLine || kind == TokenKind::Comment;
        ends(self.peek(0).kind) || (self.peek(0).kind == TokenKind::Space && ends(self.peek(1).kind))
    }

    fn error(&self, start: usize, kind: DiagnosticKind) -> Diagnostic {
        Diagnostic::new(self.line, start, self.eol.max(start), kind)
    }

    /// Looks ahead `n` tokens without consuming. Past the end of the line
    /// this is an `EndOfLine` token.
    fn peek(&self, n: usize) -> Token {
        match self.tokens.get(n) {
            Some(tok) => tok.clone(),
            None => self.end_of_line(),
        }
    }

    /// Pops a token off the line.
    #[inline]
    fn consume(&mut self) -> Token {
        match self.tokens.pop_front() {
            Some(tok) => tok,
            None => self.end_of_line(),
        }
    }

    fn end_of_line(&self) -> Token {
        Token::new("", TokenKind::EndOfLine, self.line, self.eol)
    }
}

fn opcode(info: &OpcodeInfo) -> u8 {
    match info.code {
        Some(code) => code,
        None => unreachable!("{} is a pseudo-instruction with no opcode", info.mnemonic),
    }
}
