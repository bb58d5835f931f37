//! The Assembler module is in charge of taking the lines of a CASL2 source
//! file and producing a COMET2 program image.
//!
//! Assembly runs in phases over the whole program:
//!
//! 1. every line is tokenized by the `lexer` and parsed by the `parser`
//!    into instruction records;
//! 2. the `resolver` pools literals, assigns addresses, registers labels
//!    and resolves symbolic operands;
//! 3. the `emitter` encodes the image, but only if no phase reported an
//!    error.
//!
//! Problems in the source never abort a run. They are collected as
//! `Diagnostic`s, so a single run reports as many of them as possible.

pub mod ast;
pub mod charset;
pub mod diagnostics;
pub mod emitter;
pub mod error;
pub mod labels;
pub mod lexer;
pub mod parser;
pub mod resolver;

use self::ast::Instruction;
use self::diagnostics::{has_errors, Diagnostic};
use self::emitter::DebugInfo;
use self::error::EncodeError;
use self::labels::LabelMap;
use self::lexer::Lexer;
use self::resolver::LabelGenerator;

/// Assembly options. Both default to off.
#[derive(Copy, Clone, Default, PartialEq, Eq, Debug)]
pub struct Options {
    /// Accept GR8 (the stack pointer) as a register operand.
    pub use_gr8:     bool,
    /// Give every START..END block its own label namespace.
    pub label_scope: bool,
}

/// Everything the analysis phases produce. `generated` holds the pooled
/// literal data, which is laid out after `instructions`.
#[derive(Debug)]
pub struct Analysis {
    pub diagnostics:  Vec<Diagnostic>,
    pub instructions: Vec<Instruction>,
    pub generated:    Vec<Instruction>,
    pub labels:       LabelMap,
}

#[derive(Debug)]
pub struct Compilation {
    pub diagnostics:  Vec<Diagnostic>,
    /// Every record in address order, pooled literal data last.
    pub instructions: Vec<Instruction>,
    pub labels:       LabelMap,
    /// The program image, header included. None if any error was reported.
    pub words:        Option<Vec<u16>>,
}

impl Compilation {
    pub fn success(&self) -> bool {
        self.words.is_some()
    }

    pub fn debug_info(&self) -> DebugInfo {
        DebugInfo::new(&self.instructions, &self.labels)
    }
}

pub struct Assembler {
    options: Options,
}

impl Assembler {
    pub fn new(options: Options) -> Self {
        Assembler{options}
    }

    /// Runs every phase short of emission.
    pub fn analyze<S: AsRef<str>>(&self, lines: &[S]) -> Analysis {
        let lexer = Lexer::new(self.options.use_gr8);
        let mut diagnostics = Vec::new();
        let mut instructions = Vec::new();

        for (number, line) in lines.iter().enumerate() {
            let line = line.as_ref();
            if line.trim().is_empty() {
                continue;
            }

            let (tokens, mut errors) = lexer.tokenize(line, number);
            if !errors.is_empty() {
                diagnostics.append(&mut errors);
                continue;
            }

            let (mut records, mut errors) = parser::parse(tokens, number);
            instructions.append(&mut records);
            diagnostics.append(&mut errors);
        }
        debug!("parsed {} line(s) into {} record(s)", lines.len(), instructions.len());

        let (mut instructions, mut generated) = resolver::pool_literals(instructions, &mut LabelGenerator::new());
        resolver::assign_offsets(&mut instructions, &mut generated, self.options.label_scope);

        let (mut labels, mut errors) = resolver::register_labels(&instructions, &generated);
        diagnostics.append(&mut errors);

        let (instructions, mut errors) = resolver::resolve(instructions, &mut labels);
        diagnostics.append(&mut errors);

        diagnostics.extend(resolver::check(&instructions));
        diagnostics.extend(resolver::check(&generated));

        Analysis{diagnostics, instructions, generated, labels}
    }

    /// Assembles a whole program. Source problems are reported through
    /// `Compilation::diagnostics`; an `Err` means the assembler itself is
    /// inconsistent.
    pub fn compile<S: AsRef<str>>(&self, lines: &[S]) -> Result<Compilation, EncodeError> {
        let Analysis{diagnostics, mut instructions, generated, labels} = self.analyze(lines);

        let words = if has_errors(&diagnostics) {
            info!("not emitting a binary: {} diagnostic(s) reported", diagnostics.len());
            None
        } else {
            Some(emitter::emit(&instructions, &generated, &labels)?)
        };

        instructions.extend(generated);
        Ok(Compilation{diagnostics, instructions, labels, words})
    }
}
