//! Static safety validator for model-generated Python.
//!
//! Parses the candidate source with the tree-sitter Python grammar and
//! walks every node, collecting a violation for each denylisted import,
//! bare-name call, or attribute access. Nothing is executed.
//!
//! Known gaps, kept deliberately visible: aliasing (`import math as m`
//! is fine, but `x = print; x(...)` is not tracked), calls through
//! attributes or computed callees, and names built from strings at
//! runtime. Process isolation in the executor is the real backstop.
//!
//! Identifiers are NFKC-normalized before lookup, as the interpreter
//! does, so `ｅval` and `𝐨s` are caught as `eval` and `os`. The grammar
//! also accepts some Python 2 forms (`print "x"`, `exec "x"`, `<>`);
//! those are rejected as syntax errors.

use std::fmt;
use std::sync::Arc;

use tracing::debug;
use tree_sitter::{Node, Parser};
use unicode_normalization::UnicodeNormalization;

use super::denylist::Denylist;

/// Longest snippet quoted in a syntax-error violation.
const MAX_SNIPPET_CHARS: usize = 40;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViolationKind {
    BlockedImport,
    BlockedCall,
    BlockedAttribute,
    SyntaxError,
}

impl ViolationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ViolationKind::BlockedImport => "blocked-import",
            ViolationKind::BlockedCall => "blocked-call",
            ViolationKind::BlockedAttribute => "blocked-attribute",
            ViolationKind::SyntaxError => "syntax-error",
        }
    }
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One reason a source was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub kind: ViolationKind,
    /// The offending name (module, callable, attribute) or, for syntax
    /// errors, a short snippet of the unparsable text.
    pub name: String,
    pub description: String,
    /// 1-based source line.
    pub line: usize,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (line {})", self.description, self.line)
    }
}

/// Result of [`Validator::check`].
///
/// Only constructed through [`Verdict::from_violations`], so `Rejected`
/// never carries an empty list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Approved,
    Rejected(Vec<Violation>),
}

impl Verdict {
    pub fn from_violations(violations: Vec<Violation>) -> Self {
        if violations.is_empty() {
            Verdict::Approved
        } else {
            Verdict::Rejected(violations)
        }
    }

    pub fn is_approved(&self) -> bool {
        matches!(self, Verdict::Approved)
    }

    pub fn violations(&self) -> &[Violation] {
        match self {
            Verdict::Approved => &[],
            Verdict::Rejected(v) => v,
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Approved => f.write_str("Code validation passed"),
            Verdict::Rejected(violations) => {
                f.write_str("Code validation failed:")?;
                for v in violations {
                    write!(f, "\n{v}")?;
                }
                Ok(())
            }
        }
    }
}

/// Denylist-based validator. Cheap to clone; the denylist is shared.
#[derive(Debug, Clone)]
pub struct Validator {
    denylist: Arc<Denylist>,
}

impl Default for Validator {
    fn default() -> Self {
        Self::new(Arc::new(Denylist::default()))
    }
}

impl Validator {
    pub fn new(denylist: Arc<Denylist>) -> Self {
        Self { denylist }
    }

    pub fn denylist(&self) -> &Denylist {
        &self.denylist
    }

    /// Inspects `source` and returns a verdict. Never panics, never
    /// executes anything; unparsable input is reported as a single
    /// `syntax-error` violation.
    pub fn check(&self, source: &str) -> Verdict {
        let mut parser = Parser::new();
        if let Err(e) = parser.set_language(&tree_sitter_python::LANGUAGE.into()) {
            return Verdict::from_violations(vec![Violation {
                kind: ViolationKind::SyntaxError,
                name: String::new(),
                description: format!("Syntax error: Python grammar unavailable ({e})"),
                line: 1,
            }]);
        }

        let Some(tree) = parser.parse(source, None) else {
            return Verdict::from_violations(vec![Violation {
                kind: ViolationKind::SyntaxError,
                name: String::new(),
                description: "Syntax error: source could not be parsed".to_string(),
                line: 1,
            }]);
        };

        let root = tree.root_node();
        if root.has_error() {
            let violation = syntax_violation(root, source);
            debug!("Rejected source: {violation}");
            return Verdict::from_violations(vec![violation]);
        }

        if let Some(violation) = legacy_syntax_violation(root, source) {
            debug!("Rejected source: {violation}");
            return Verdict::from_violations(vec![violation]);
        }

        let mut violations = Vec::new();
        let mut cursor = root.walk();
        'walk: loop {
            self.inspect(cursor.node(), source, &mut violations);

            if cursor.goto_first_child() {
                continue;
            }
            while !cursor.goto_next_sibling() {
                if !cursor.goto_parent() {
                    break 'walk;
                }
            }
        }

        if !violations.is_empty() {
            debug!("Rejected source: {} policy violation(s)", violations.len());
        }
        Verdict::from_violations(violations)
    }

    fn inspect(&self, node: Node<'_>, source: &str, out: &mut Vec<Violation>) {
        match node.kind() {
            "import_statement" => {
                let mut cursor = node.walk();
                for name in node.children_by_field_name("name", &mut cursor) {
                    // `import a.b as c` nests the dotted path under `name`
                    let path = if name.kind() == "aliased_import" {
                        name.child_by_field_name("name").unwrap_or(name)
                    } else {
                        name
                    };
                    let full = identifier(path, source);
                    if self.denylist.blocks_module(top_level_module(&full)) {
                        out.push(Violation {
                            kind: ViolationKind::BlockedImport,
                            name: top_level_module(&full).to_string(),
                            description: format!("Blocked import: '{full}'"),
                            line: line_of(node),
                        });
                    }
                }
            }
            "import_from_statement" => {
                let Some(module) = node.child_by_field_name("module_name") else {
                    return;
                };
                // `from .pkg import x` checks `pkg`; `from . import x` has no module
                let dotted = if module.kind() == "relative_import" {
                    let mut cursor = module.walk();
                    let found = module
                        .named_children(&mut cursor)
                        .find(|c| c.kind() == "dotted_name");
                    found
                } else {
                    Some(module)
                };
                let Some(dotted) = dotted else {
                    return;
                };
                let full = identifier(dotted, source);
                if self.denylist.blocks_module(top_level_module(&full)) {
                    out.push(Violation {
                        kind: ViolationKind::BlockedImport,
                        name: top_level_module(&full).to_string(),
                        description: format!("Blocked import: 'from {full}'"),
                        line: line_of(node),
                    });
                }
            }
            "call" => {
                let Some(callee) = node.child_by_field_name("function") else {
                    return;
                };
                if callee.kind() != "identifier" {
                    return;
                }
                let name = identifier(callee, source);
                if self.denylist.blocks_callable(&name) {
                    out.push(Violation {
                        kind: ViolationKind::BlockedCall,
                        description: format!("Blocked function: '{name}()'"),
                        name,
                        line: line_of(node),
                    });
                }
            }
            "attribute" => {
                let Some(attr) = node.child_by_field_name("attribute") else {
                    return;
                };
                let name = identifier(attr, source);
                if self.denylist.blocks_attribute(&name) {
                    out.push(Violation {
                        kind: ViolationKind::BlockedAttribute,
                        description: format!("Blocked attribute: '.{name}'"),
                        name,
                        line: line_of(node),
                    });
                }
            }
            _ => {}
        }
    }
}

/// First dotted component of an import path, whitespace-insensitive.
fn top_level_module(path: &str) -> &str {
    path.split('.').next().unwrap_or(path).trim()
}

fn text(node: Node<'_>, source: &str) -> String {
    source
        .get(node.byte_range())
        .unwrap_or_default()
        .to_string()
}

/// Node text as the interpreter sees the name: NFKC-normalized.
fn identifier(node: Node<'_>, source: &str) -> String {
    text(node, source).nfkc().collect()
}

fn line_of(node: Node<'_>) -> usize {
    node.start_position().row + 1
}

/// Finds the first Python 2 construct that the grammar parses but the
/// interpreter rejects.
fn legacy_syntax_violation(root: Node<'_>, source: &str) -> Option<Violation> {
    let mut cursor = root.walk();
    loop {
        let node = cursor.node();
        let detail = match node.kind() {
            "print_statement" => Some(("print", "Missing parentheses in call to 'print'")),
            "exec_statement" => Some(("exec", "Missing parentheses in call to 'exec'")),
            "<>" if !node.is_named() => Some(("<>", "invalid syntax near '<>'")),
            _ => None,
        };
        if let Some((name, detail)) = detail {
            debug!("Legacy syntax at line {}: {}", line_of(node), text(node, source));
            return Some(Violation {
                kind: ViolationKind::SyntaxError,
                name: name.to_string(),
                description: format!("Syntax error: {detail}"),
                line: line_of(node),
            });
        }

        if cursor.goto_first_child() {
            continue;
        }
        while !cursor.goto_next_sibling() {
            if !cursor.goto_parent() {
                return None;
            }
        }
    }
}

/// Builds the violation for the first error or missing node in the tree.
fn syntax_violation(root: Node<'_>, source: &str) -> Violation {
    let mut cursor = root.walk();
    let mut culprit = root;
    loop {
        let node = cursor.node();
        if node.is_error() || node.is_missing() {
            culprit = node;
            break;
        }
        // Only descend where an error is known to live
        if node.has_error() && cursor.goto_first_child() {
            continue;
        }
        let mut advanced = false;
        while !advanced {
            if cursor.goto_next_sibling() {
                advanced = true;
            } else if !cursor.goto_parent() {
                break;
            }
        }
        if !advanced {
            break;
        }
    }

    let (name, detail) = if culprit.is_missing() {
        let expected = culprit.kind().to_string();
        let detail = format!("expected '{expected}'");
        (expected, detail)
    } else {
        let snippet: String = text(culprit, source)
            .lines()
            .next()
            .unwrap_or_default()
            .chars()
            .take(MAX_SNIPPET_CHARS)
            .collect();
        let detail = if snippet.trim().is_empty() {
            "invalid syntax".to_string()
        } else {
            format!("invalid syntax near '{}'", snippet.trim())
        };
        (snippet.trim().to_string(), detail)
    };

    Violation {
        kind: ViolationKind::SyntaxError,
        name,
        description: format!("Syntax error: {detail}"),
        line: line_of(culprit),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(source: &str) -> Verdict {
        Validator::default().check(source)
    }

    fn kinds(verdict: &Verdict) -> Vec<ViolationKind> {
        verdict.violations().iter().map(|v| v.kind).collect()
    }

    // ── Approved sources ────────────────────────────────

    #[test]
    fn test_hello_world_approved() {
        assert_eq!(check("print(\"Hello, World!\")"), Verdict::Approved);
    }

    #[test]
    fn test_safe_import_approved() {
        let src = "import math\nresult = sum(range(10))\nprint(math.sqrt(result))\n";
        assert!(check(src).is_approved());
    }

    #[test]
    fn test_empty_source_approved() {
        assert!(check("").is_approved());
        assert!(check("\n\n# only a comment\n").is_approved());
    }

    #[test]
    fn test_blocked_names_inside_strings_ignored() {
        let src = "s = \"import os; eval('1')\"\nprint(s.upper())\n";
        assert!(check(src).is_approved());
    }

    #[test]
    fn test_method_call_not_inspected() {
        // Only bare-name callees are checked
        assert!(check("obj = {}\nobj.eval()\n").is_approved());
    }

    #[test]
    fn test_safe_from_import_approved() {
        assert!(check("from collections import Counter\nprint(Counter('aab'))\n").is_approved());
    }

    #[test]
    fn test_future_import_approved() {
        assert!(check("from __future__ import annotations\nprint(1)\n").is_approved());
    }

    #[test]
    fn test_bare_relative_import_not_checked() {
        assert!(check("from . import helpers\n").is_approved());
    }

    // ── Imports ─────────────────────────────────────────

    #[test]
    fn test_blocked_import() {
        let verdict = check("import os; print(os.getcwd())");
        let violations = verdict.violations();
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].kind, ViolationKind::BlockedImport);
        assert_eq!(violations[0].name, "os");
        assert_eq!(violations[0].line, 1);
        assert!(violations[0].description.contains("'os'"));
    }

    #[test]
    fn test_blocked_submodule_import() {
        let verdict = check("import os.path\n");
        assert_eq!(kinds(&verdict), vec![ViolationKind::BlockedImport]);
        assert_eq!(verdict.violations()[0].name, "os");
        assert!(verdict.violations()[0].description.contains("os.path"));
    }

    #[test]
    fn test_blocked_aliased_import() {
        let verdict = check("import subprocess as sp\n");
        assert_eq!(kinds(&verdict), vec![ViolationKind::BlockedImport]);
        assert_eq!(verdict.violations()[0].name, "subprocess");
    }

    #[test]
    fn test_blocked_import_in_list() {
        let verdict = check("import math, socket, json, sys\n");
        let names: Vec<&str> = verdict.violations().iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, vec!["socket", "sys"]);
    }

    #[test]
    fn test_blocked_from_import() {
        let verdict = check("from os.path import join\n");
        assert_eq!(kinds(&verdict), vec![ViolationKind::BlockedImport]);
        assert!(verdict.violations()[0].description.contains("from os.path"));
    }

    #[test]
    fn test_blocked_relative_from_import() {
        let verdict = check("from .os import path\n");
        assert_eq!(kinds(&verdict), vec![ViolationKind::BlockedImport]);
        assert_eq!(verdict.violations()[0].name, "os");
    }

    #[test]
    fn test_imported_name_not_checked() {
        // Only the module path of a from-import is compared
        assert!(check("from math import pi as os\n").is_approved());
    }

    #[test]
    fn test_import_inside_function() {
        let src = "def f():\n    import shutil\n    return 1\n";
        let verdict = check(src);
        assert_eq!(kinds(&verdict), vec![ViolationKind::BlockedImport]);
        assert_eq!(verdict.violations()[0].line, 2);
    }

    // ── Calls ───────────────────────────────────────────

    #[test]
    fn test_blocked_call() {
        let verdict = check("result = eval('1+1'); print(result)");
        let violations = verdict.violations();
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].kind, ViolationKind::BlockedCall);
        assert_eq!(violations[0].name, "eval");
        assert!(violations[0].description.contains("eval()"));
    }

    #[test]
    fn test_blocked_dunder_import_call() {
        let verdict = check("m = __import__('os')\n");
        assert_eq!(kinds(&verdict), vec![ViolationKind::BlockedCall]);
        assert_eq!(verdict.violations()[0].name, "__import__");
    }

    #[test]
    fn test_blocked_exec_call() {
        let verdict = check("exec(\"print(1)\")\n");
        assert_eq!(kinds(&verdict), vec![ViolationKind::BlockedCall]);
        assert_eq!(verdict.violations()[0].name, "exec");
    }

    #[test]
    fn test_blocked_call_fullwidth_spelling() {
        // U+FF45 FULLWIDTH LATIN SMALL LETTER E normalizes to 'e'
        let verdict = check("r = \u{ff45}val('6*7')\nprint(r)\n");
        assert_eq!(kinds(&verdict), vec![ViolationKind::BlockedCall]);
        assert_eq!(verdict.violations()[0].name, "eval");
        assert!(verdict.violations()[0].description.contains("'eval()'"));
    }

    #[test]
    fn test_blocked_import_math_alphanumeric_spelling() {
        // U+1D428 MATHEMATICAL BOLD SMALL O normalizes to 'o'
        let verdict = check("import \u{1d428}s\nprint(\u{1d428}s.getcwd())\n");
        assert_eq!(kinds(&verdict), vec![ViolationKind::BlockedImport]);
        assert_eq!(verdict.violations()[0].name, "os");
    }

    #[test]
    fn test_blocked_from_import_fullwidth_spelling() {
        let verdict = check("from \u{ff53}ubprocess import run\n");
        assert_eq!(kinds(&verdict), vec![ViolationKind::BlockedImport]);
        assert_eq!(verdict.violations()[0].name, "subprocess");
    }

    #[test]
    fn test_blocked_attribute_fullwidth_spelling() {
        // U+FF43 FULLWIDTH LATIN SMALL LETTER C normalizes to 'c'
        let verdict = check("x = ().__\u{ff43}lass__\n");
        assert_eq!(kinds(&verdict), vec![ViolationKind::BlockedAttribute]);
        assert_eq!(verdict.violations()[0].name, "__class__");
    }

    #[test]
    fn test_blocked_name_without_call_allowed() {
        // Referencing is not calling
        assert!(check("f = open\n").is_approved());
    }

    #[test]
    fn test_blocked_call_nested_in_arguments() {
        let verdict = check("print(len(open('x').read()))\n");
        assert_eq!(kinds(&verdict), vec![ViolationKind::BlockedCall]);
        assert_eq!(verdict.violations()[0].name, "open");
    }

    // ── Attributes ──────────────────────────────────────

    #[test]
    fn test_blocked_attribute_on_any_object() {
        let verdict = check("x = ().__class__\n");
        assert_eq!(kinds(&verdict), vec![ViolationKind::BlockedAttribute]);
        assert_eq!(verdict.violations()[0].name, "__class__");
        assert!(verdict.violations()[0].description.contains(".__class__"));
    }

    #[test]
    fn test_blocked_attribute_reports_expression_start_line() {
        let verdict = check("x = (\n  1\n).__class__\n");
        assert_eq!(kinds(&verdict), vec![ViolationKind::BlockedAttribute]);
        assert_eq!(verdict.violations()[0].line, 1);
    }

    #[test]
    fn test_attribute_chain_reports_each() {
        let verdict = check("x = ''.__class__.__mro__\n");
        let names: Vec<&str> = verdict.violations().iter().map(|v| v.name.as_str()).collect();
        // Outer attribute node precedes the inner one in a pre-order walk
        assert_eq!(names, vec!["__mro__", "__class__"]);
    }

    // ── Collection and ordering ─────────────────────────

    #[test]
    fn test_collects_all_violations_in_source_order() {
        let src = "import os\nx = 1\ny = eval('2')\nz = x.__dict__\nfrom sys import argv\n";
        let verdict = check(src);
        assert_eq!(
            kinds(&verdict),
            vec![
                ViolationKind::BlockedImport,
                ViolationKind::BlockedCall,
                ViolationKind::BlockedAttribute,
                ViolationKind::BlockedImport,
            ]
        );
        let lines: Vec<usize> = verdict.violations().iter().map(|v| v.line).collect();
        assert_eq!(lines, vec![1, 3, 4, 5]);
    }

    #[test]
    fn test_deterministic() {
        let src = "import os\nimport sys\nexec('x')\nprint(().__class__)\n";
        let first = check(src);
        for _ in 0..10 {
            assert_eq!(check(src), first);
        }
    }

    #[test]
    fn test_custom_denylist() {
        let denylist = Denylist::new(
            vec!["math".to_string()],
            vec!["print".to_string()],
            Vec::<String>::new(),
        )
        .unwrap();
        let validator = Validator::new(Arc::new(denylist));
        let verdict = validator.check("import os\nimport math\nprint(1)\n");
        assert_eq!(
            kinds(&verdict),
            vec![ViolationKind::BlockedImport, ViolationKind::BlockedCall]
        );
        assert_eq!(verdict.violations()[0].name, "math");
    }

    // ── Syntax errors ───────────────────────────────────

    #[test]
    fn test_syntax_error_single_violation() {
        let verdict = check("def f(:");
        assert_eq!(kinds(&verdict), vec![ViolationKind::SyntaxError]);
        assert!(verdict.violations()[0].description.starts_with("Syntax error"));
    }

    #[test]
    fn test_syntax_error_suppresses_policy_checks() {
        let verdict = check("import os\neval('1')\ndef f(:\n");
        assert_eq!(kinds(&verdict), vec![ViolationKind::SyntaxError]);
    }

    #[test]
    fn test_syntax_error_line_number() {
        let verdict = check("x = 1\ny = 2\nz = (3 +\n");
        assert_eq!(kinds(&verdict), vec![ViolationKind::SyntaxError]);
        assert!(verdict.violations()[0].line >= 3);
    }

    #[test]
    fn test_python2_print_statement_is_syntax_error() {
        let verdict = check("print \"hi\"\n");
        assert_eq!(kinds(&verdict), vec![ViolationKind::SyntaxError]);
        assert!(verdict.violations()[0]
            .description
            .contains("Missing parentheses in call to 'print'"));
    }

    #[test]
    fn test_python2_exec_statement_is_syntax_error() {
        let verdict = check("x = 1\nexec \"import os\"\n");
        assert_eq!(kinds(&verdict), vec![ViolationKind::SyntaxError]);
        assert_eq!(verdict.violations()[0].line, 2);
    }

    #[test]
    fn test_python2_not_equal_operator_is_syntax_error() {
        let verdict = check("import os\nx = 1 <> 2\n");
        assert_eq!(kinds(&verdict), vec![ViolationKind::SyntaxError]);
        assert_eq!(verdict.violations()[0].name, "<>");
        assert_eq!(verdict.violations()[0].line, 2);
    }

    #[test]
    fn test_python3_print_and_exec_calls_not_legacy() {
        assert!(check("print(\"hi\")\n").is_approved());
        assert_eq!(
            kinds(&check("exec(\"x = 1\")\n")),
            vec![ViolationKind::BlockedCall]
        );
        assert!(check("x = 1 != 2\n").is_approved());
    }

    // ── Verdict helpers ─────────────────────────────────

    #[test]
    fn test_verdict_from_empty_is_approved() {
        assert_eq!(Verdict::from_violations(vec![]), Verdict::Approved);
        assert!(Verdict::Approved.violations().is_empty());
    }

    #[test]
    fn test_verdict_display_lists_violations() {
        let verdict = check("import os\nexec('x')\n");
        let rendered = verdict.to_string();
        assert!(rendered.starts_with("Code validation failed:"));
        assert!(rendered.contains("Blocked import: 'os' (line 1)"));
        assert!(rendered.contains("Blocked function: 'exec()' (line 2)"));
    }

    #[test]
    fn test_violation_kind_labels() {
        assert_eq!(ViolationKind::BlockedImport.to_string(), "blocked-import");
        assert_eq!(ViolationKind::BlockedCall.to_string(), "blocked-call");
        assert_eq!(ViolationKind::BlockedAttribute.to_string(), "blocked-attribute");
        assert_eq!(ViolationKind::SyntaxError.to_string(), "syntax-error");
    }
}
