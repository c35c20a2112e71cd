//! Validated, process-isolated code execution for LLM agents.
//!
//! The [`sandbox`] module holds the security boundary: a static
//! validator that inspects Python source before anything runs, and an
//! executor that runs approved source in a scrubbed child process under
//! a timeout and an output cap. The [`skills`] module exposes it (plus a
//! few plain file tools) as named tools a model can call.

pub mod config;
pub mod sandbox;
pub mod skills;
