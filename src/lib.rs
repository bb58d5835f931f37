//! An assembler for CASL2, the assembly language of the COMET2 16-bit
//! teaching machine.
//!
//! ```no_run
//! use casl2::assembler::{Assembler, Options};
//!
//! let source = "MAIN START\n  RET\n  END";
//! let lines: Vec<&str> = source.lines().collect();
//! let compilation = Assembler::new(Options::default()).compile(&lines).unwrap();
//! assert!(compilation.success());
//! ```
#[macro_use] extern crate log;
#[macro_use] extern crate lazy_static;
extern crate regex;
extern crate thiserror;

pub mod assembler;
