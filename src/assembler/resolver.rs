//! Turns parsed records into fully resolved ones. The phases run in order:
//!
//! 1. `pool_literals` replaces `=` operands with generated labels and
//!    produces the DC records that hold their values;
//! 2. `assign_offsets` lays records out and numbers their scopes;
//! 3. `register_labels` builds the label table;
//! 4. `resolve` rewrites every symbolic operand to an address;
//! 5. `check` runs the semantic checks on the result.
//!
//! Every phase reports problems as diagnostics and keeps going, so a
//! single run reports every undeclared label and every duplicate.
use super::ast::{in_range, Body, Instruction, Literal, Operand};
use super::diagnostics::{Diagnostic, DiagnosticKind};
use super::labels::{Key, LabelMap, Location};

/// Names for pooled literals. Generated names are lowercase, which source
/// labels can never be, so they cannot collide. A generator lives for a
/// single run.
#[derive(Debug, Default)]
pub struct LabelGenerator {
    next: usize,
}

impl LabelGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn generate(&mut self) -> String {
        self.next += 1;
        format!("lit{}", self.next)
    }
}

/// Replaces every literal operand with a fresh label. Returns the rewritten
/// records and the generated DC records, in the order the literals appear.
pub fn pool_literals(instructions: Vec<Instruction>, names: &mut LabelGenerator) -> (Vec<Instruction>, Vec<Instruction>) {
    let mut generated: Vec<Instruction> = Vec::new();

    let pooled = instructions.into_iter().map(|inst| {
        let line = inst.line;
        inst.map_operands(|op| match op {
            Operand::Literal{literal, start, end} => {
                let name = names.generate();
                generated.extend(data_block(&name, &literal, line));
                Operand::Symbol{name, start, end}
            },
            other => other,
        })
    }).collect();

    debug!("pooled {} literal word(s)", generated.len());
    (pooled, generated)
}

fn data_block(name: &str, literal: &Literal, line: usize) -> Vec<Instruction> {
    literal.words.iter().enumerate().map(|(i, word)| {
        let label = if i == 0 { Some(name.to_owned()) } else { None };
        Instruction::new("DC", Body::Data(Operand::Resolved(*word)), label, line).continued()
    }).collect()
}

/// Assigns byte offsets and scopes. Generated records are placed after the
/// last ordinary record. With `label_scope` set, every `END` closes the
/// current scope.
pub fn assign_offsets(instructions: &mut [Instruction], generated: &mut [Instruction], label_scope: bool) {
    let mut scope = 1;
    let mut offset = 0;

    for inst in instructions.iter_mut() {
        inst.scope = scope;
        inst.offset = offset;
        offset += inst.byte_length();

        if label_scope && inst.body == Body::End {
            scope += 1;
        }
    }

    for inst in generated.iter_mut() {
        inst.offset = offset;
        offset += inst.byte_length();
    }

    debug!("program is {} word(s) across {} scope(s)", offset / 2, scope);
}

/// Builds the label table. Duplicates are reported and skipped.
pub fn register_labels(instructions: &[Instruction], generated: &[Instruction]) -> (LabelMap, Vec<Diagnostic>) {
    let mut labels = LabelMap::new();
    let mut diagnostics = Vec::new();

    for inst in instructions {
        let name = match &inst.label {
            Some(name) => name,
            None => continue,
        };
        let (start, end) = inst.label_span();
        let at = Location{line: inst.line, start, end};

        let duplicate = match inst.body {
            // START labels are global, so they clash with any other global.
            Body::Start(_) => labels.is_global(name) || labels.is_defined_in(name, inst.scope),
            _ => labels.is_defined_in(name, inst.scope),
        };
        if duplicate {
            diagnostics.push(Diagnostic::new(inst.line, start, end, DiagnosticKind::DuplicateLabel(name.clone())));
            continue;
        }

        match &inst.body {
            Body::Start(Some(Operand::Symbol{name: target, ..})) => labels.bind(name, target, inst.scope, Some(at)),
            Body::Start(_) => labels.add_global(name, inst.address(), inst.scope, Some(at)),
            _ => labels.add(name, inst.address(), inst.scope, Some(at)),
        }
    }

    for inst in generated {
        if let Some(name) = &inst.label {
            labels.add_global(name, inst.address(), inst.scope, None);
        }
    }

    // A START operand must name a label of its own subroutine.
    for inst in instructions {
        if let Body::Start(Some(Operand::Symbol{name, start, end})) = &inst.body {
            let at = Location{line: inst.line, start: *start, end: *end};
            match labels.entry_mut(&Key::scoped(name, inst.scope)) {
                Some(entry) => entry.references.push(at),
                None => diagnostics.push(Diagnostic::new(inst.line, *start, *end, DiagnosticKind::UndeclaredLabel(name.clone()))),
            }
        }
    }

    debug!("registered {} label(s)", labels.len());
    (labels, diagnostics)
}

/// Resolves every symbolic operand. Each reference to an undeclared label
/// is reported once; the operand is left symbolic.
pub fn resolve(instructions: Vec<Instruction>, labels: &mut LabelMap) -> (Vec<Instruction>, Vec<Diagnostic>) {
    for inst in instructions.iter() {
        for op in inst.body.operands() {
            if let Operand::Symbol{name, start, end} = op {
                labels.add_reference(name, inst.scope, Location{line: inst.line, start: *start, end: *end});
            }
        }
    }

    let labels: &LabelMap = labels;
    let mut diagnostics = Vec::new();
    let resolved = instructions.into_iter().map(|inst| {
        let (line, scope) = (inst.line, inst.scope);
        inst.map_operands(|op| match op {
            Operand::Symbol{name, start, end} => match labels.get(&name, scope) {
                Some(address) => {
                    let address = address as i64;
                    if !in_range(address) {
                        diagnostics.push(Diagnostic::new(line, start, end, DiagnosticKind::OutOfRange(address.to_string())));
                    }
                    Operand::Resolved(address)
                },
                None => {
                    diagnostics.push(Diagnostic::new(line, start, end, DiagnosticKind::UndeclaredLabel(name.clone())));
                    Operand::Symbol{name, start, end}
                },
            },
            other => other,
        })
    }).collect();

    (resolved, diagnostics)
}

/// Semantic checks over resolved records.
pub fn check(instructions: &[Instruction]) -> Vec<Diagnostic> {
    instructions.iter().flat_map(|inst| inst.check()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::lexer::Lexer;
    use super::super::parser::parse;

    fn parse_all(src: &[&str]) -> Vec<Instruction> {
        let lexer = Lexer::new(false);
        src.iter().enumerate().flat_map(|(i, line)| {
            let (tokens, diagnostics) = lexer.tokenize(line, i);
            assert!(diagnostics.is_empty());
            let (records, diagnostics) = parse(tokens, i);
            assert!(diagnostics.is_empty(), "{:?}", diagnostics);
            records
        }).collect()
    }

    #[test]
    fn test_label_generator() {
        let mut names = LabelGenerator::new();
        assert_eq!(names.generate(), "lit1");
        assert_eq!(names.generate(), "lit2");
        // A new run starts over.
        assert_eq!(LabelGenerator::new().generate(), "lit1");
    }

    #[test]
    fn test_pool_literals() {
        let src = parse_all(&[
            "MAIN START",
            "  LD GR1, =5",
            "  LD GR2, ='AB'",
            "  RET",
            "  END",
        ]);
        let (pooled, generated) = pool_literals(src, &mut LabelGenerator::new());

        assert_eq!(pooled[1].body.operands(), vec![&Operand::Symbol{name: "lit1".to_owned(), start: 10, end: 12}]);
        assert_eq!(pooled[2].body.operands(), vec![&Operand::Symbol{name: "lit2".to_owned(), start: 10, end: 15}]);

        assert_eq!(generated.len(), 3);
        assert_eq!(generated[0].label.as_deref(), Some("lit1"));
        assert_eq!(generated[0].body, Body::Data(Operand::Resolved(5)));
        assert_eq!(generated[1].label.as_deref(), Some("lit2"));
        assert_eq!(generated[1].body, Body::Data(Operand::Resolved(0x41)));
        assert_eq!(generated[2].label, None);
        assert_eq!(generated[2].body, Body::Data(Operand::Resolved(0x42)));
    }

    #[test]
    fn test_generated_records_follow_the_program() {
        let src = parse_all(&[
            "MAIN START",
            "  LD GR1, =5",
            "  RET",
            "  END",
        ]);
        let (mut pooled, mut generated) = pool_literals(src, &mut LabelGenerator::new());
        assign_offsets(&mut pooled, &mut generated, false);

        // LD is 2 words, RET 1.
        assert_eq!(generated[0].address(), 3);

        let (mut labels, diagnostics) = register_labels(&pooled, &generated);
        assert!(diagnostics.is_empty());
        let (resolved, diagnostics) = resolve(pooled, &mut labels);
        assert!(diagnostics.is_empty());
        assert_eq!(resolved[1].to_words(), Ok(vec![0x1010, 0x0003]));
    }

    #[test]
    fn test_scopes_advance_on_end() {
        let mut src = parse_all(&[
            "A START",
            "  RET",
            "  END",
            "B START",
            "  RET",
            "  END",
        ]);
        assign_offsets(&mut src, &mut [], true);
        let scopes: Vec<usize> = src.iter().map(|i| i.scope).collect();
        assert_eq!(scopes, vec![1, 1, 1, 2, 2, 2]);

        assign_offsets(&mut src, &mut [], false);
        assert!(src.iter().all(|i| i.scope == 1));
    }

    #[test]
    fn test_duplicate_labels() {
        let src = vec![
            "A START",
            "L1 NOP",
            "L1 NOP",
            "  RET",
            "  END",
            "B START",
            "L1 NOP",
            "  RET",
            "  END",
        ];

        let mut scoped = parse_all(&src);
        assign_offsets(&mut scoped, &mut [], true);
        let (_, diagnostics) = register_labels(&scoped, &[]);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].line, 2);
        assert_eq!(diagnostics[0].kind, DiagnosticKind::DuplicateLabel("L1".to_owned()));

        let mut flat = parse_all(&src);
        assign_offsets(&mut flat, &mut [], false);
        let (_, diagnostics) = register_labels(&flat, &[]);
        assert_eq!(diagnostics.len(), 2);
    }

    #[test]
    fn test_start_labels_are_global() {
        let mut src = parse_all(&[
            "MAIN START",
            "  CALL SUB",
            "  RET",
            "  END",
            "SUB START",
            "  RET",
            "  END",
        ]);
        assign_offsets(&mut src, &mut [], true);
        let (mut labels, diagnostics) = register_labels(&src, &[]);
        assert!(diagnostics.is_empty());
        let (resolved, diagnostics) = resolve(src, &mut labels);
        assert!(diagnostics.is_empty());
        assert_eq!(resolved[1].to_words(), Ok(vec![0x8000, 0x0003]));

        let entry = labels.entry(&Key::global("SUB")).unwrap();
        assert_eq!(entry.references.len(), 1);
    }

    #[test]
    fn test_start_with_entry_binds() {
        let mut src = parse_all(&[
            "MAIN START BEGIN",
            "DATA DC 1",
            "BEGIN LD GR1, DATA",
            "  RET",
            "  END",
        ]);
        assign_offsets(&mut src, &mut [], true);
        let (labels, diagnostics) = register_labels(&src, &[]);
        assert!(diagnostics.is_empty());
        assert_eq!(labels.get("MAIN", 1), Some(1));
        assert_eq!(labels.get("MAIN", 2), Some(1));
    }

    #[test]
    fn test_start_entry_must_exist() {
        let mut src = parse_all(&[
            "MAIN START BEGIN",
            "  RET",
            "  END",
        ]);
        assign_offsets(&mut src, &mut [], false);
        let (_, diagnostics) = register_labels(&src, &[]);
        assert_eq!(diagnostics, vec![Diagnostic::new(0, 11, 16, DiagnosticKind::UndeclaredLabel("BEGIN".to_owned()))]);
    }

    #[test]
    fn test_undeclared_label_per_occurrence() {
        let mut src = parse_all(&[
            "  LAD GR1, NOPE",
            "  LAD GR2, NOPE",
            "  LAD GR3, 5",
        ]);
        assign_offsets(&mut src, &mut [], false);
        let (mut labels, _) = register_labels(&src, &[]);
        let (resolved, diagnostics) = resolve(src, &mut labels);

        assert_eq!(diagnostics.len(), 2);
        assert_eq!(diagnostics[0], Diagnostic::new(0, 11, 15, DiagnosticKind::UndeclaredLabel("NOPE".to_owned())));
        assert_eq!(diagnostics[1].line, 1);
        assert!(!resolved[0].is_confirmed());
        assert!(resolved[2].is_confirmed());
    }

    #[test]
    fn test_address_out_of_range() {
        let src = parse_all(&["  LAD GR1, FAR"]);
        let mut labels = LabelMap::new();
        labels.add("FAR", 70000, 1, None);
        let (_, diagnostics) = resolve(src, &mut labels);
        assert_eq!(diagnostics, vec![Diagnostic::new(0, 11, 14, DiagnosticKind::OutOfRange("70000".to_owned()))]);
    }

    #[test]
    fn test_start_entry_is_referenced() {
        let mut src = parse_all(&[
            "MAIN START BEGIN",
            "BEGIN RET",
            "  END",
        ]);
        assign_offsets(&mut src, &mut [], false);
        let (labels, diagnostics) = register_labels(&src, &[]);
        assert!(diagnostics.is_empty());
        let entry = labels.entry(&Key::scoped("BEGIN", 1)).unwrap();
        assert_eq!(entry.references, vec![Location{line: 0, start: 11, end: 16}]);
    }

    #[test]
    fn test_zero_word_reservation_shares_address() {
        let mut src = parse_all(&[
            "MAIN START",
            "  RET",
            "EMPTY DS 0",
            "NEXT DC 7",
            "  END",
        ]);
        assign_offsets(&mut src, &mut [], false);
        let (labels, _) = register_labels(&src, &[]);
        assert_eq!(labels.get("EMPTY", 1), Some(1));
        assert_eq!(labels.get("EMPTY", 1), labels.get("NEXT", 1));
    }

    #[test]
    fn test_check_is_idempotent() {
        let mut src = parse_all(&[
            "ABCDEFGHIJKLMNOP NOP",
            "ABCDEFGH NOP",
            "LONGLABEL DC 1",
        ]);
        assign_offsets(&mut src, &mut [], false);
        let first = check(&src);
        let second = check(&src);
        assert_eq!(first, second);
        let spans: Vec<(u16, usize, usize, usize)> = first.iter().map(|d| (d.code(), d.line, d.start, d.end)).collect();
        assert_eq!(spans, vec![(4, 0, 0, 16), (4, 2, 0, 9)]);
    }
}
