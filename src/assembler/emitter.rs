//! Binary emission. The output image is an 8-word header followed by the
//! words of every ordinary record and then the pooled literal data.
//!
//! Header layout:
//!
//! ```text
//! word 0     entry address
//! word 1..7  reserved, zero
//! ```
use std::collections::BTreeMap;
use std::convert::TryFrom;

use super::ast::{Body, Instruction, Operand};
use super::error::EncodeError;
use super::labels::LabelMap;

pub const HEADER_WORDS: usize = 8;

/// Assembles the program image. Every record must be confirmed.
pub fn emit(instructions: &[Instruction], generated: &[Instruction], labels: &LabelMap) -> Result<Vec<u16>, EncodeError> {
    let mut words = Vec::with_capacity(HEADER_WORDS + instructions.len() + generated.len());
    words.push(entry_point(instructions, labels)?);
    words.resize(HEADER_WORDS, 0);

    for inst in instructions.iter().chain(generated.iter()) {
        words.extend(inst.to_words()?);
    }

    debug!("emitted {} word(s)", words.len());
    Ok(words)
}

/// The address execution starts at: the first record's label as seen from
/// the first scope, or 0 if the first record has no label.
pub fn entry_point(instructions: &[Instruction], labels: &LabelMap) -> Result<u16, EncodeError> {
    let label = match instructions.first().and_then(|inst| inst.label.as_deref()) {
        Some(label) => label,
        None => return Ok(0),
    };

    labels.get(label, 1)
        .and_then(|address| u16::try_from(address).ok())
        .ok_or_else(|| EncodeError::NoEntryPoint(label.to_owned()))
}

/// Serializes words big-endian, two bytes per word.
pub fn to_bytes(words: &[u16]) -> Vec<u8> {
    words.iter().flat_map(|w| w.to_be_bytes().to_vec()).collect()
}

/// Address to source line tables for debuggers.
#[derive(Clone, Default, PartialEq, Eq, Debug)]
pub struct DebugInfo {
    /// Word address of each emitting source line's first record.
    pub address_lines: BTreeMap<usize, usize>,
    /// Entry address of each `START` to its line.
    pub subroutines:   BTreeMap<usize, usize>,
}

impl DebugInfo {
    pub fn new(instructions: &[Instruction], labels: &LabelMap) -> Self {
        let mut info = DebugInfo::default();

        for inst in instructions {
            if !inst.continuation && inst.byte_length() > 0 {
                info.address_lines.insert(inst.address(), inst.line);
            }

            if let Body::Start(target) = &inst.body {
                let entry = match target {
                    Some(Operand::Symbol{name, ..}) => labels.get(name, inst.scope),
                    _ => Some(inst.address()),
                };
                if let Some(address) = entry {
                    info.subroutines.insert(address, inst.line);
                }
            }
        }

        info
    }
}
