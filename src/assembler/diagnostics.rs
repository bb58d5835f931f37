//! Diagnostics are the only way the assembler reports problems in the
//! source. Every phase appends to an ordered list of them instead of
//! stopping, so that one run surfaces as many independent problems as
//! possible.
//!
//! Each diagnostic carries a stable numeric code. The codes are part of the
//! public interface (editors key quick-fixes off them) and must not be
//! renumbered.
use std::fmt;

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Severity {
    Error,
    Message,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Severity::Error   => write!(f, "error"),
            Severity::Message => write!(f, "message"),
        }
    }
}

/// The syntactic category a parser was looking for when it gave up.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Category {
    Space,
    Comma,
    Register,
    Address,
    Label,
    Mnemonic,
    LabelOrMnemonic,
    Constant,
    WordCount,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            Category::Space           => "whitespace",
            Category::Comma           => "','",
            Category::Register        => "register",
            Category::Address         => "address",
            Category::Label           => "label",
            Category::Mnemonic        => "instruction",
            Category::LabelOrMnemonic => "label or instruction",
            Category::Constant        => "constant",
            Category::WordCount       => "decimal word count",
        };
        write!(f, "{}", s)
    }
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub enum DiagnosticKind {
    DuplicateLabel(String),
    IndexRegisterGR0,
    TooLongLabel(String),
    InvalidLine,
    ReservedLabel(String),
    Expected(Category),
    InvalidWordCount,
    CannotEscapeQuotes,
    OutOfCharset,
    UndeclaredLabel(String),
    MissingInstruction,
    MissingAddress,
    OutOfRange(String),
    UnnecessaryOperand,
    MissingR1,
    MissingR2,
    MissingR,
    MissingInputBuffer,
    MissingInputLength,
    MissingOutputBuffer,
    MissingOutputLength,
    MissingWordCount,
    MissingConstants,
}

impl DiagnosticKind {
    pub fn code(&self) -> u16 {
        use DiagnosticKind::*;
        match self {
            DuplicateLabel(_)   => 1,
            IndexRegisterGR0    => 2,
            TooLongLabel(_)     => 4,
            InvalidLine         => 5,
            ReservedLabel(_)    => 6,
            Expected(_)         => 8,
            InvalidWordCount    => 13,
            CannotEscapeQuotes  => 14,
            OutOfCharset        => 15,
            UndeclaredLabel(_)  => 16,
            MissingInstruction  => 17,
            MissingAddress      => 18,
            OutOfRange(_)       => 19,
            UnnecessaryOperand  => 20,
            MissingR1           => 21,
            MissingR2           => 22,
            MissingR            => 23,
            MissingInputBuffer  => 24,
            MissingInputLength  => 25,
            MissingOutputBuffer => 26,
            MissingOutputLength => 27,
            MissingWordCount    => 28,
            MissingConstants    => 29,
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            DiagnosticKind::UnnecessaryOperand => Severity::Message,
            _ => Severity::Error,
        }
    }
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use DiagnosticKind::*;
        match self {
            DuplicateLabel(l)   => write!(f, "duplicate label '{}'", l),
            IndexRegisterGR0    => write!(f, "GR0 cannot be used as an index register"),
            TooLongLabel(l)     => write!(f, "label '{}' is longer than 8 characters", l),
            InvalidLine         => write!(f, "invalid instruction line"),
            ReservedLabel(l)    => write!(f, "'{}' cannot be used as a label name", l),
            Expected(c)         => write!(f, "{} expected", c),
            InvalidWordCount    => write!(f, "word count must be a non-negative decimal"),
            CannotEscapeQuotes  => write!(f, "unbalanced single quotes in string constant"),
            OutOfCharset        => write!(f, "string constant contains a character outside JIS X 0201"),
            UndeclaredLabel(l)  => write!(f, "label '{}' is not declared", l),
            MissingInstruction  => write!(f, "missing instruction"),
            MissingAddress      => write!(f, "missing address 'adr'"),
            OutOfRange(v)       => write!(f, "value {} is out of the 16-bit range", v),
            UnnecessaryOperand  => write!(f, "unnecessary operand"),
            MissingR1           => write!(f, "missing register 'r1'"),
            MissingR2           => write!(f, "missing register 'r2'"),
            MissingR            => write!(f, "missing register 'r'"),
            MissingInputBuffer  => write!(f, "missing address 'input buffer'"),
            MissingInputLength  => write!(f, "missing address 'input length'"),
            MissingOutputBuffer => write!(f, "missing address 'output buffer'"),
            MissingOutputLength => write!(f, "missing address 'output length'"),
            MissingWordCount    => write!(f, "missing decimal 'word count'"),
            MissingConstants    => write!(f, "missing 'constant[, constant]'"),
        }
    }
}

/// A problem tied to a span of a single source line. `start` and `end` are
/// byte offsets into that line; `end` is clamped to the line length when a
/// diagnostic runs to the end of the line.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Diagnostic {
    pub line:  usize,
    pub start: usize,
    pub end:   usize,
    pub kind:  DiagnosticKind,
}

impl Diagnostic {
    pub fn new(line: usize, start: usize, end: usize, kind: DiagnosticKind) -> Self {
        Diagnostic{line, start, end, kind}
    }

    pub fn message(&self) -> String {
        self.kind.to_string()
    }

    pub fn severity(&self) -> Severity {
        self.kind.severity()
    }

    pub fn code(&self) -> u16 {
        self.kind.code()
    }

    pub fn is_error(&self) -> bool {
        self.severity() == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}-{}: {}[{}]: {}",
            self.line, self.start, self.end, self.severity(), self.code(), self.kind)
    }
}

/// Returns true if any diagnostic in the list blocks binary emission.
pub fn has_errors(diagnostics: &[Diagnostic]) -> bool {
    diagnostics.iter().any(Diagnostic::is_error)
}
