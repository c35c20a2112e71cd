//! Process-wide denylists consulted by the validator.
//!
//! Built once at start-up (from defaults or config) and shared behind an
//! `Arc`; nothing mutates a `Denylist` after construction.
use std::collections::BTreeSet;

use anyhow::{bail, Result};

/// Modules whose import is rejected. Only the first dotted component of
/// an import path is compared against this set.
pub const DEFAULT_BLOCKED_MODULES: &[&str] = &[
    "os",
    "subprocess",
    "sys",
    "shutil",
    "socket",
    "requests",
    "urllib",
    "pathlib",
    "io",
    "builtins",
    "importlib",
    "ctypes",
    "multiprocessing",
    "threading",
    "asyncio",
    "signal",
    "pickle",
    "marshal",
    "shelve",
];

/// Builtins that are rejected when called by bare name.
pub const DEFAULT_BLOCKED_CALLABLES: &[&str] = &[
    "exec",
    "eval",
    "compile",
    "open",
    "input",
    "__import__",
    "getattr",
    "setattr",
    "delattr",
    "globals",
    "locals",
    "vars",
    "breakpoint",
    "memoryview",
];

/// Attribute names rejected on any object.
pub const DEFAULT_BLOCKED_ATTRIBUTES: &[&str] = &[
    "__code__",
    "__globals__",
    "__builtins__",
    "__subclasses__",
    "__bases__",
    "__mro__",
    "__class__",
    "__dict__",
    "__module__",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Denylist {
    modules: BTreeSet<String>,
    callables: BTreeSet<String>,
    attributes: BTreeSet<String>,
}

impl Default for Denylist {
    fn default() -> Self {
        Self {
            modules: to_set(DEFAULT_BLOCKED_MODULES),
            callables: to_set(DEFAULT_BLOCKED_CALLABLES),
            attributes: to_set(DEFAULT_BLOCKED_ATTRIBUTES),
        }
    }
}

impl Denylist {
    /// Builds a denylist from explicit sets.
    ///
    /// Fails if a name appears in more than one set: each name must map
    /// to exactly one violation kind.
    pub fn new<M, C, A>(modules: M, callables: C, attributes: A) -> Result<Self>
    where
        M: IntoIterator<Item = String>,
        C: IntoIterator<Item = String>,
        A: IntoIterator<Item = String>,
    {
        let denylist = Self {
            modules: modules.into_iter().collect(),
            callables: callables.into_iter().collect(),
            attributes: attributes.into_iter().collect(),
        };

        for (a_name, a, b_name, b) in [
            ("modules", &denylist.modules, "callables", &denylist.callables),
            ("modules", &denylist.modules, "attributes", &denylist.attributes),
            ("callables", &denylist.callables, "attributes", &denylist.attributes),
        ] {
            if let Some(shared) = a.intersection(b).next() {
                bail!("denylist entry '{shared}' appears in both {a_name} and {b_name}");
            }
        }

        Ok(denylist)
    }

    pub fn blocks_module(&self, name: &str) -> bool {
        self.modules.contains(name)
    }

    pub fn blocks_callable(&self, name: &str) -> bool {
        self.callables.contains(name)
    }

    pub fn blocks_attribute(&self, name: &str) -> bool {
        self.attributes.contains(name)
    }

    pub fn modules(&self) -> impl Iterator<Item = &str> {
        self.modules.iter().map(String::as_str)
    }

    pub fn callables(&self) -> impl Iterator<Item = &str> {
        self.callables.iter().map(String::as_str)
    }

    pub fn attributes(&self) -> impl Iterator<Item = &str> {
        self.attributes.iter().map(String::as_str)
    }
}

fn to_set(names: &[&str]) -> BTreeSet<String> {
    names.iter().map(|s| s.to_string()).collect()
}
