//! Execution sandbox for model-generated code.
//!
//! The security model is layered:
//!
//! 1. Static validation (tree-sitter): denylisted imports, bare-name
//!    calls and attribute accesses reject the source before anything runs
//! 2. Scratch isolation: each run gets its own uniquely named file,
//!    removed on every exit path
//! 3. Process isolation: a fresh interpreter with only `PATH` and `HOME`
//!    in its environment, in its own process group
//! 4. Hard limits: wall-clock timeout with group kill, bounded output
//!
//! The validator is a first line of defense only; it can be evaded by
//! aliasing or dynamically built names. The other layers hold regardless.
//!
//! [`ShellRunner`] shares layer 4 but skips the rest: it exists for
//! commands the agent is trusted to run as itself.

pub mod denylist;
pub mod executor;
pub mod output;
pub mod process;
pub mod scratch;
pub mod shell;
pub mod validator;

pub use denylist::Denylist;
pub use executor::Executor;
pub use process::{ExecutionLimits, ExecutionOutcome};
pub use shell::ShellRunner;
pub use validator::{Validator, Verdict, Violation, ViolationKind};
