//! This AST describes a parsed CASL2 program, one record per emitted unit.
//!
//! A source line becomes zero or more `Instruction` records. Most lines map
//! to exactly one; `DC` produces one record per data word and `DS` one
//! filler record per reserved word.
//!
//! Supported instructions:
//!
//! ```text
//! NOP                  ; no-op
//! LD    r1,r2 | r,adr[,x]
//! ST    r,adr[,x]
//! LAD   r,adr[,x]
//! ADDA  r1,r2 | r,adr[,x]   (also SUBA ADDL SUBL AND OR XOR CPA CPL)
//! SLA   r,adr[,x]           (also SRA SLL SRL)
//! JUMP  adr[,x]             (also JPL JMI JNZ JZE JOV PUSH CALL SVC)
//! POP   r
//! RET                       (also RPUSH RPOP)
//! IN    buf,len             (also OUT)
//! START [adr]
//! END
//! DS    words
//! DC    constant[,constant]...
//! ```
//!
//! Machine words are laid out as `opcode:8 | r1:4 | r2:4`, followed by one
//! address word for the address-bearing forms.
use std::convert::TryFrom;
use std::fmt;

use super::diagnostics::{Diagnostic, DiagnosticKind};
use super::error::EncodeError;
use super::lexer::Token;

/// The operand pattern a mnemonic accepts.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Shape {
    /// No operands.
    None,
    /// `r`
    R,
    /// `adr[,x]`
    AdrX,
    /// `r,adr[,x]`
    RAdrX,
    /// `r1,r2` or `r,adr[,x]`. The register form's opcode is the address
    /// form's plus `REGISTER_FORM_OFFSET`.
    RROrRAdrX,
    /// `adr,adr` (buffered I/O)
    AdrAdr,
    /// A single decimal word count.
    WordCount,
    /// `constant[,constant]...`
    Constants,
    /// `[adr]`
    OptionalAdr,
}

pub struct OpcodeInfo {
    pub mnemonic: &'static str,
    /// None for pseudo-instructions that never reach the binary themselves.
    pub code:     Option<u8>,
    pub shape:    Shape,
}

pub const REGISTER_FORM_OFFSET: u8 = 4;

/// Filler word for `DS` reservations.
pub const NOP_CODE: u8 = 0x00;

const fn op(mnemonic: &'static str, code: u8, shape: Shape) -> OpcodeInfo {
    OpcodeInfo{mnemonic, code: Some(code), shape}
}

const fn pseudo(mnemonic: &'static str, shape: Shape) -> OpcodeInfo {
    OpcodeInfo{mnemonic, code: None, shape}
}

pub static OPCODES: [OpcodeInfo; 36] = [
    op("NOP",   0x00, Shape::None),
    op("LD",    0x10, Shape::RROrRAdrX),
    op("ST",    0x11, Shape::RAdrX),
    op("LAD",   0x12, Shape::RAdrX),
    op("ADDA",  0x20, Shape::RROrRAdrX),
    op("SUBA",  0x21, Shape::RROrRAdrX),
    op("ADDL",  0x22, Shape::RROrRAdrX),
    op("SUBL",  0x23, Shape::RROrRAdrX),
    op("AND",   0x30, Shape::RROrRAdrX),
    op("OR",    0x31, Shape::RROrRAdrX),
    op("XOR",   0x32, Shape::RROrRAdrX),
    op("CPA",   0x40, Shape::RROrRAdrX),
    op("CPL",   0x41, Shape::RROrRAdrX),
    op("SLA",   0x50, Shape::RAdrX),
    op("SRA",   0x51, Shape::RAdrX),
    op("SLL",   0x52, Shape::RAdrX),
    op("SRL",   0x53, Shape::RAdrX),
    op("JMI",   0x61, Shape::AdrX),
    op("JNZ",   0x62, Shape::AdrX),
    op("JZE",   0x63, Shape::AdrX),
    op("JUMP",  0x64, Shape::AdrX),
    op("JPL",   0x65, Shape::AdrX),
    op("JOV",   0x66, Shape::AdrX),
    op("PUSH",  0x70, Shape::AdrX),
    op("POP",   0x71, Shape::R),
    op("CALL",  0x80, Shape::AdrX),
    op("RET",   0x81, Shape::None),
    op("SVC",   0xF0, Shape::AdrX),
    op("IN",    0x90, Shape::AdrAdr),
    op("OUT",   0x91, Shape::AdrAdr),
    op("RPUSH", 0xA0, Shape::None),
    op("RPOP",  0xA1, Shape::None),
    pseudo("START", Shape::OptionalAdr),
    pseudo("END",   Shape::None),
    pseudo("DS",    Shape::WordCount),
    pseudo("DC",    Shape::Constants),
];

pub fn lookup(mnemonic: &str) -> Option<&'static OpcodeInfo> {
    OPCODES.iter().find(|op| op.mnemonic == mnemonic)
}

/// Byte length of an instruction with the given opcode.
pub fn byte_length(code: u8) -> usize {
    match code {
        0x00 | 0x14 |
        0x24..=0x27 |
        0x34..=0x36 |
        0x44 | 0x45 |
        0x71 | 0x81 |
        0xA0 | 0xA1         => 2,

        0x10..=0x12 |
        0x20..=0x23 |
        0x30..=0x32 |
        0x40 | 0x41 |
        0x50..=0x53 |
        0x61..=0x66 |
        0x70 | 0x80 | 0xF0  => 4,

        0x90 | 0x91         => 6,

        _ => unreachable!("opcode {:#04X} has no byte length - the opcode table and byte_length are out of sync", code),
    }
}

/// Smallest and largest value an address or data word may hold. Negative
/// values are stored as 16-bit two's complement.
pub const MIN_VALUE: i64 = -32768;
pub const MAX_VALUE: i64 = 0xFFFF;

pub fn in_range(value: i64) -> bool {
    (MIN_VALUE..=MAX_VALUE).contains(&value)
}

/// Encodes a value as a machine word. Callers check `in_range` first.
pub fn encode_value(value: i64) -> u16 {
    if value < 0 {
        (0x10000 + value) as u16
    } else {
        value as u16
    }
}

/// Labels must not shadow register names, whether or not GR8 is enabled.
pub fn is_register_name(name: &str) -> bool {
    let b = name.as_bytes();
    b.len() == 3 && &b[..2] == b"GR" && (b'0'..=b'8').contains(&b[2])
}

pub const MAX_LABEL_LENGTH: usize = 8;

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Register {
    GR0,
    GR1,
    GR2,
    GR3,
    GR4,
    GR5,
    GR6,
    GR7,
    /// The stack pointer, only addressable with the GR8 option.
    GR8,
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "GR{}", self.to_u16())
    }
}

impl TryFrom<&str> for Register {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        use Register::*;
        match value {
            "GR0" => Ok(GR0),
            "GR1" => Ok(GR1),
            "GR2" => Ok(GR2),
            "GR3" => Ok(GR3),
            "GR4" => Ok(GR4),
            "GR5" => Ok(GR5),
            "GR6" => Ok(GR6),
            "GR7" => Ok(GR7),
            "GR8" => Ok(GR8),
            _     => Err(format!("`{}` is not a register", value)),
        }
    }
}

impl Register {
    /// Convert the register to its 4-bit field value.
    pub fn to_u16(&self) -> u16 {
        *self as u16
    }
}

/// A literal operand (`=10`, `=#FF`, `='AB'`) before pooling. `words` holds
/// the data words the generated DC will contain.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Literal {
    pub text:  String,
    pub words: Vec<i64>,
}

/// An address or data operand. Symbols and literals carry the byte span of
/// the source token they came from.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Operand {
    Resolved(i64),
    Symbol{name: String, start: usize, end: usize},
    Literal{literal: Literal, start: usize, end: usize},
}

impl Operand {
    pub fn is_resolved(&self) -> bool {
        matches!(self, Operand::Resolved(_))
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Operand::Resolved(v)         => write!(f, "#{:04X}", encode_value(*v)),
            Operand::Symbol{name, ..}    => write!(f, "{}", name),
            Operand::Literal{literal, ..}=> write!(f, "{}", literal.text),
        }
    }
}

/// What a record does once laid out in memory.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Body {
    Op{code: u8, r1: Option<Register>, r2: Option<Register>, adr: Option<Operand>},
    /// Buffered I/O: the opcode word followed by the buffer and length addresses.
    Io{code: u8, buffer: Operand, length: Operand},
    /// One DC word.
    Data(Operand),
    /// Program or subroutine start, optionally naming its real entry label.
    Start(Option<Operand>),
    End,
    /// `DS 0`: a label with no storage.
    LabelOnly,
}

impl Body {
    fn byte_length(&self) -> usize {
        match self {
            Body::Op{code, ..} | Body::Io{code, ..} => byte_length(*code),
            Body::Data(_) => 2,
            Body::Start(_) | Body::End | Body::LabelOnly => 0,
        }
    }

    /// Address operands that end up in the binary. The START target is not
    /// one of them; it is handled through bind redirection.
    pub fn operands(&self) -> Vec<&Operand> {
        match self {
            Body::Op{adr: Some(adr), ..} => vec![adr],
            Body::Io{buffer, length, ..} => vec![buffer, length],
            Body::Data(value) => vec![value],
            _ => Vec::new(),
        }
    }

    /// Rebuilds the body with every address operand passed through `f`.
    pub fn map_operands<F: FnMut(Operand) -> Operand>(self, mut f: F) -> Body {
        match self {
            Body::Op{code, r1, r2, adr} => Body::Op{code, r1, r2, adr: adr.map(&mut f)},
            Body::Io{code, buffer, length} => {
                let buffer = f(buffer);
                let length = f(length);
                Body::Io{code, buffer, length}
            },
            Body::Data(value) => Body::Data(f(value)),
            other => other,
        }
    }
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Instruction {
    pub label:       Option<String>,
    pub mnemonic:    &'static str,
    pub body:        Body,
    /// Fixed at construction from the opcode.
    byte_length:     usize,
    pub line:        usize,
    /// Set for the second and later records expanded from one source line,
    /// and for pooled literal data.
    pub continuation: bool,
    pub scope:       usize,
    /// Byte offset from the start of the program, assigned by the resolver.
    pub offset:      usize,
    /// The source tokens of the line, kept on the first record only.
    pub tokens:      Vec<Token>,
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let label = self.label.as_deref().unwrap_or("");
        write!(f, "{:<8} {:<5}", label, self.mnemonic)?;
        match &self.body {
            Body::Op{r1, r2, adr, ..} => {
                let mut parts: Vec<String> = Vec::with_capacity(3);
                if let Some(r) = r1 { parts.push(r.to_string()); }
                if let Some(a) = adr { parts.push(a.to_string()); }
                if let Some(r) = r2 { parts.push(r.to_string()); }
                write!(f, " {}", parts.join(","))
            },
            Body::Io{buffer, length, ..} => write!(f, " {},{}", buffer, length),
            Body::Data(value) => write!(f, " {}", value),
            Body::Start(Some(target)) => write!(f, " {}", target),
            Body::Start(None) | Body::End | Body::LabelOnly => Ok(()),
        }
    }
}

impl Instruction {
    pub fn new(mnemonic: &'static str, body: Body, label: Option<String>, line: usize) -> Self {
        let byte_length = body.byte_length();
        Instruction{
            label,
            mnemonic,
            body,
            byte_length,
            line,
            continuation: false,
            scope: 1,
            offset: 0,
            tokens: Vec::new(),
        }
    }

    /// Marks the record as the second or later record of its source line.
    pub fn continued(mut self) -> Self {
        self.continuation = true;
        self
    }

    pub fn with_tokens(mut self, tokens: Vec<Token>) -> Self {
        self.tokens = tokens;
        self
    }

    pub fn byte_length(&self) -> usize {
        self.byte_length
    }

    /// Word address of the record.
    pub fn address(&self) -> usize {
        self.offset / 2
    }

    /// A record is confirmed once every operand it emits is numeric.
    pub fn is_confirmed(&self) -> bool {
        self.body.operands().iter().all(|op| op.is_resolved())
    }

    /// Byte span of the label token, if the label came from source.
    pub fn label_span(&self) -> (usize, usize) {
        match self.tokens.first() {
            Some(tok) if self.label.as_deref() == Some(tok.text.as_str()) => (tok.start, tok.end),
            _ => (0, 0),
        }
    }

    /// Returns a copy of this record with its operands rewritten by `f`.
    pub fn map_operands<F: FnMut(Operand) -> Operand>(self, f: F) -> Self {
        let Instruction{label, mnemonic, body, byte_length, line, continuation, scope, offset, tokens} = self;
        Instruction{label, mnemonic, body: body.map_operands(f), byte_length, line, continuation, scope, offset, tokens}
    }

    /// Semantic checks on a resolved record. Pure, so running it twice
    /// yields the same diagnostics. Operand values are range checked when
    /// they are parsed or resolved, while their span is still known.
    pub fn check(&self) -> Vec<Diagnostic> {
        match &self.label {
            Some(label) if label.chars().count() > MAX_LABEL_LENGTH => {
                let (start, end) = self.label_span();
                vec![Diagnostic::new(self.line, start, end, DiagnosticKind::TooLongLabel(label.clone()))]
            },
            _ => Vec::new(),
        }
    }

    /// Assembles the record to machine words. Non-emitting records yield an
    /// empty list. Fails if any operand is still symbolic.
    pub fn to_words(&self) -> Result<Vec<u16>, EncodeError> {
        match &self.body {
            Body::Op{code, r1, r2, adr} => {
                let head = ((*code as u16) << 8)
                    | (r1.map_or(0, |r| r.to_u16()) << 4)
                    | r2.map_or(0, |r| r.to_u16());
                match adr {
                    Some(adr) => Ok(vec![head, self.word(adr)?]),
                    None => Ok(vec![head]),
                }
            },
            Body::Io{code, buffer, length} => {
                Ok(vec![(*code as u16) << 8, self.word(buffer)?, self.word(length)?])
            },
            Body::Data(value) => Ok(vec![self.word(value)?]),
            Body::Start(_) | Body::End | Body::LabelOnly => Ok(Vec::new()),
        }
    }

    fn word(&self, op: &Operand) -> Result<u16, EncodeError> {
        match op {
            Operand::Resolved(v) if in_range(*v) => Ok(encode_value(*v)),
            Operand::Resolved(v) => Err(EncodeError::Overflow{line: self.line, value: *v}),
            Operand::Symbol{name, ..} => Err(EncodeError::Unresolved{line: self.line, name: name.clone()}),
            Operand::Literal{literal, ..} => Err(EncodeError::Unresolved{line: self.line, name: literal.text.clone()}),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sym(name: &str) -> Operand {
        Operand::Symbol{name: name.to_owned(), start: 0, end: name.len()}
    }

    fn info(mnemonic: &str) -> &'static OpcodeInfo {
        lookup(mnemonic).unwrap()
    }

    #[test]
    fn test_every_opcode_has_a_length() {
        for op in OPCODES.iter() {
            if let Some(code) = op.code {
                let len = byte_length(code);
                assert!(len == 2 || len == 4 || len == 6, "{}", op.mnemonic);
                if op.shape == Shape::RROrRAdrX {
                    assert_eq!(byte_length(code + REGISTER_FORM_OFFSET), 2, "{}", op.mnemonic);
                }
            }
        }
    }

    #[test]
    fn test_lookup() {
        assert_eq!(info("LD").code, Some(0x10));
        assert_eq!(info("ADDA").shape, Shape::RROrRAdrX);
        assert_eq!(info("START").code, None);
        assert_eq!(info("OUT").shape, Shape::AdrAdr);
        assert!(lookup("ld").is_none());
        assert!(lookup("MOVE").is_none());
    }

    #[test]
    fn test_register() {
        assert_eq!(Register::try_from("GR0"), Ok(Register::GR0));
        assert_eq!(Register::try_from("GR8"), Ok(Register::GR8));
        assert!(Register::try_from("GR9").is_err());
        assert_eq!(Register::GR7.to_u16(), 7);
        assert_eq!(Register::GR8.to_string(), "GR8");
    }

    #[test]
    fn test_is_register_name() {
        assert!(is_register_name("GR0"));
        assert!(is_register_name("GR8"));
        assert!(!is_register_name("GR9"));
        assert!(!is_register_name("GR10"));
        assert!(!is_register_name("GRA"));
    }

    #[test]
    fn test_words_match_byte_length() {
        let cases = vec![
            Instruction::new("NOP", Body::Op{code: 0x00, r1: None, r2: None, adr: None}, None, 0),
            Instruction::new("LD", Body::Op{code: 0x14, r1: Some(Register::GR1), r2: Some(Register::GR2), adr: None}, None, 0),
            Instruction::new("LAD", Body::Op{code: 0x12, r1: Some(Register::GR1), r2: None, adr: Some(Operand::Resolved(3))}, None, 0),
            Instruction::new("IN", Body::Io{code: 0x90, buffer: Operand::Resolved(1), length: Operand::Resolved(2)}, None, 0),
            Instruction::new("DC", Body::Data(Operand::Resolved(0x41)), None, 0),
            Instruction::new("END", Body::End, None, 0),
        ];
        for inst in cases.iter() {
            assert_eq!(inst.to_words().unwrap().len(), inst.byte_length() / 2, "{}", inst);
        }
    }

    #[test]
    fn test_encoding() {
        let adda = Instruction::new("ADDA",
            Body::Op{code: 0x24, r1: Some(Register::GR1), r2: Some(Register::GR2), adr: None}, None, 0);
        assert_eq!(adda.to_words(), Ok(vec![0x2412]));

        let ld = Instruction::new("LD",
            Body::Op{code: 0x10, r1: Some(Register::GR3), r2: Some(Register::GR4), adr: Some(Operand::Resolved(0x20))}, None, 0);
        assert_eq!(ld.to_words(), Ok(vec![0x1034, 0x0020]));

        let out = Instruction::new("OUT",
            Body::Io{code: 0x91, buffer: Operand::Resolved(0x10), length: Operand::Resolved(0x11)}, None, 0);
        assert_eq!(out.to_words(), Ok(vec![0x9100, 0x0010, 0x0011]));

        let start = Instruction::new("START", Body::Start(None), Some("MAIN".to_owned()), 0);
        assert_eq!(start.to_words(), Ok(vec![]));
    }

    #[test]
    fn test_negative_address() {
        assert_eq!(encode_value(-1), 0xFFFF);
        assert_eq!(encode_value(-32768), 0x8000);
        assert_eq!(encode_value(65535), 0xFFFF);

        let lad = Instruction::new("LAD",
            Body::Op{code: 0x12, r1: Some(Register::GR0), r2: None, adr: Some(Operand::Resolved(-1))}, None, 0);
        assert_eq!(lad.to_words(), Ok(vec![0x1200, 0xFFFF]));
    }

    #[test]
    fn test_unconfirmed_record_fails_to_encode() {
        let jump = Instruction::new("JUMP",
            Body::Op{code: 0x64, r1: None, r2: None, adr: Some(sym("LOOP"))}, None, 7);
        assert!(!jump.is_confirmed());
        assert_eq!(jump.to_words(), Err(EncodeError::Unresolved{line: 7, name: "LOOP".to_owned()}));

        let resolved = jump.map_operands(|_| Operand::Resolved(4));
        assert!(resolved.is_confirmed());
        assert_eq!(resolved.to_words(), Ok(vec![0x6400, 0x0004]));
    }

    #[test]
    fn test_byte_length_is_fixed_at_construction() {
        let data = Instruction::new("DC", Body::Data(sym("X")), None, 0);
        assert_eq!(data.byte_length(), 2);
        let data = data.map_operands(|_| Operand::Resolved(1));
        assert_eq!(data.byte_length(), 2);

        let olbl = Instruction::new("DS", Body::LabelOnly, Some("BUF".to_owned()), 0);
        assert_eq!(olbl.byte_length(), 0);
    }

    #[test]
    fn test_check() {
        let long = Instruction::new("NOP", Body::Op{code: 0, r1: None, r2: None, adr: None},
            Some("ABCDEFGHIJKLMNOP".to_owned()), 2);
        let diagnostics = long.check();
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].code(), 4);
        // Checks are pure.
        assert_eq!(long.check(), diagnostics);

        let ok = Instruction::new("NOP", Body::Op{code: 0, r1: None, r2: None, adr: None},
            Some("ABCDEFGH".to_owned()), 2);
        assert!(ok.check().is_empty());

        // Values are range checked where their source span is known.
        let big = Instruction::new("DC", Body::Data(Operand::Resolved(0x10000)), None, 0);
        assert!(big.check().is_empty());
        assert_eq!(big.to_words(), Err(EncodeError::Overflow{line: 0, value: 0x10000}));
    }
}
