//! Assembler for the Spin Semiconductor FV-1 audio DSP.
//!
//! The pipeline: lex, then drive a single pass over the statement stream
//! that resolves labels as it goes and defers branch targets to an
//! end-of-source fix-up pass, then encode and serialize.

pub mod cursor;
pub mod driver;
pub mod encode;
pub mod error;
pub mod eval;
pub mod lexer;
pub mod output;
pub mod symtab;
pub mod token;
pub mod value;

pub use error::{Error, ErrorKind, Result, Warning};

/// Number of 32-bit instruction slots in one FV-1 program.
pub const PROGRAM_SIZE: usize = 128;

/// Assembler behavior flags, set from the CLI.
#[derive(Clone, Copy, Debug)]
pub struct Options {
    /// Clamp out-of-range operands (with a warning) instead of erroring.
    pub clamp: bool,
    /// Retag the bare integer literals `1`/`2`/`-1`/`-2` as real.
    pub spinreals: bool,
    /// Fill unused program slots with explicit `skp 0,0` instead of the
    /// collapsed `skp 0,N` + padding form.
    pub explicit_nop_fill: bool,
}

impl Default for Options {
    fn default() -> Options {
        Options {
            clamp: false,
            spinreals: false,
            explicit_nop_fill: false,
        }
    }
}

/// One assembled program: 128 raw instruction words plus any non-fatal
/// warnings collected along the way.
#[derive(Clone, Debug)]
pub struct Assembly {
    pub program: Vec<u32>,
    pub warnings: Vec<Warning>,
}

/// Assembles `input` under `options`, returning the full 128-word program
/// and any warnings, or the first fatal error encountered.
pub fn assemble(input: &str, options: &Options) -> Result<Assembly> {
    let tokens = lexer::lex(input)?;
    driver::assemble_tokens(&tokens, options)
}
