//! Splitting source text into prompt-sized code units.
//!
//! [`CodeSegmenter`] cuts a source file at top-level declarations (functions,
//! classes, impls, ...). Doc comments, attributes and decorators directly above
//! a declaration travel with it. Anything before the first declaration (imports,
//! license headers) is not sent. Nested members stay with their enclosing unit.
//!
//! [`DiffSegmenter`] cuts a unified diff into one unit per file.

use regex::Regex;
use std::sync::LazyLock;

use crate::config::TaskKind;

static DECLARATION_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"^(?:export\s+(?:default\s+)?)?",
        r"(?:(?:pub(?:\([^)]*\))?|public|private|protected|internal|static|abstract|final|",
        r#"async|unsafe|extern(?:\s+"[^"]*")?|const|override|open|data|sealed|inline)\s+)*"#,
        r"(?:fn|fun|function\*?|class|def|impl|struct|enum|trait|interface|func|mod|module|",
        r"object|union|macro_rules!)(?:\s|<|\(|$)",
    ))
    .unwrap()
});

static ARROW_FUNCTION_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"^(?:export\s+)?(?:const|let|var)\s+[A-Za-z_$][\w$]*\s*(?::[^=]+)?=\s*(?:async\s+)?",
        r"(?:function\b|\([^)]*\)\s*(?::[^=]+)?=>|[A-Za-z_$][\w$]*\s*=>)",
    ))
    .unwrap()
});

// `int main(int argc, char **argv) {`, but not prototypes ending in `;`
static C_FUNCTION_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][\w:<>,\s\*&]*?[\s\*&]+[A-Za-z_~][\w:~]*\s*\([^;]*$").unwrap()
});

static CONTROL_FLOW_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:if|else|for|while|switch|return|do|case|goto|typedef)\b").unwrap()
});

// Lines that belong to the declaration below them
static ATTACHED_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:#!?\[|@\w|//|/\*|\*|#(?:\s|$))").unwrap());

/// Splits source text into units that are prompted one by one.
pub trait Segmenter: Send + Sync {
    fn split(&self, source: &str) -> Vec<String>;
}

/// Segmenter suited to the input of `task`.
pub fn for_task(task: TaskKind) -> Box<dyn Segmenter> {
    if task.works_on_diff() {
        Box::new(DiffSegmenter)
    } else {
        Box::new(CodeSegmenter)
    }
}

/// Function/class-level splitting for whole source files.
#[derive(Debug, Clone, Copy, Default)]
pub struct CodeSegmenter;

impl CodeSegmenter {
    fn is_declaration_start(line: &str) -> bool {
        if line.starts_with(char::is_whitespace) || line.is_empty() {
            return false;
        }
        DECLARATION_REGEX.is_match(line)
            || ARROW_FUNCTION_REGEX.is_match(line)
            || (C_FUNCTION_REGEX.is_match(line) && !CONTROL_FLOW_REGEX.is_match(line))
    }

    fn is_attached(line: &str) -> bool {
        ATTACHED_REGEX.is_match(line.trim_start())
    }
}

impl Segmenter for CodeSegmenter {
    fn split(&self, source: &str) -> Vec<String> {
        let lines: Vec<&str> = source.lines().collect();

        let mut starts = Vec::new();
        let mut floor = 0;
        for (i, line) in lines.iter().enumerate() {
            if !Self::is_declaration_start(line) {
                continue;
            }
            let mut begin = i;
            while begin > floor && Self::is_attached(lines[begin - 1]) {
                begin -= 1;
            }
            starts.push(begin);
            floor = i + 1;
        }

        let mut units = Vec::with_capacity(starts.len());
        for (k, &begin) in starts.iter().enumerate() {
            let end = starts.get(k + 1).copied().unwrap_or(lines.len());
            let unit = lines[begin..end].join("\n");
            let unit = unit.trim_end();
            if !unit.trim().is_empty() {
                units.push(unit.to_string());
            }
        }
        units
    }
}

/// Per-file splitting for unified diffs.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiffSegmenter;

impl Segmenter for DiffSegmenter {
    fn split(&self, source: &str) -> Vec<String> {
        let mut units = Vec::new();
        let mut current: Vec<&str> = Vec::new();

        let mut flush = |current: &mut Vec<&str>| {
            let unit = current.join("\n");
            let unit = unit.trim_end();
            if !unit.trim().is_empty() {
                units.push(unit.to_string());
            }
            current.clear();
        };

        for line in source.lines() {
            if line.starts_with("diff --git ") && !current.is_empty() {
                flush(&mut current);
            }
            current.push(line);
        }
        flush(&mut current);
        units
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rust_functions_and_impls() {
        let source = r#"use std::fmt;

/// Adds two numbers.
#[inline]
pub fn add(a: i32, b: i32) -> i32 {
    a + b
}

struct Point {
    x: i32,
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.x)
    }
}
"#;
        let units = CodeSegmenter.split(source);
        assert_eq!(units.len(), 3);
        assert!(units[0].starts_with("/// Adds two numbers.\n#[inline]\npub fn add"));
        assert!(units[0].ends_with('}'));
        assert!(units[1].starts_with("struct Point"));
        assert!(units[2].starts_with("impl fmt::Display"));
        assert!(units[2].contains("fn fmt(&self"));
        assert!(!units.iter().any(|u| u.contains("use std::fmt")));
    }

    #[test]
    fn test_python_decorators_and_classes() {
        let source = "import os\n\n@cache\ndef load(path):\n    return open(path).read()\n\n\nclass Store:\n    def get(self, key):\n        return key\n";
        let units = CodeSegmenter.split(source);
        assert_eq!(units.len(), 2);
        assert_eq!(units[0], "@cache\ndef load(path):\n    return open(path).read()");
        assert!(units[1].starts_with("class Store:"));
        assert!(units[1].contains("    def get(self, key):"));
    }

    #[test]
    fn test_javascript_functions_and_arrows() {
        let source = "import x from 'x';\nconst LIMIT = 10;\n\nexport async function fetchAll(url) {\n  return fetch(url);\n}\n\nexport const double = (n) => n * 2;\n\nexport default class Api {}\n";
        let units = CodeSegmenter.split(source);
        assert_eq!(units.len(), 3);
        assert!(units[0].starts_with("export async function fetchAll"));
        assert_eq!(units[1], "export const double = (n) => n * 2;");
        assert_eq!(units[2], "export default class Api {}");
    }

    #[test]
    fn test_c_functions_skip_prototypes() {
        let source = "#include <stdio.h>\n\nint helper(int x);\n\nstatic int helper(int x) {\n    return x;\n}\n\nint main(void) {\n    if (helper(1)) {\n        return 0;\n    }\n    return 1;\n}\n";
        let units = CodeSegmenter.split(source);
        assert_eq!(units.len(), 2);
        assert!(units[0].starts_with("static int helper(int x) {"));
        assert!(units[1].starts_with("int main(void) {"));
    }

    #[test]
    fn test_source_without_declarations_yields_nothing() {
        assert!(CodeSegmenter.split("").is_empty());
        assert!(CodeSegmenter.split("\n\n   \n").is_empty());
        assert!(CodeSegmenter.split("use std::io;\nconst MAX: u32 = 3;\n").is_empty());
    }

    #[test]
    fn test_units_are_verbatim_slices_of_the_source() {
        let source = "fn a() {\n    1\n}\n\nfn b() {}\n";
        for unit in CodeSegmenter.split(source) {
            assert!(source.contains(&unit));
        }
    }

    #[test]
    fn test_diff_split_per_file() {
        let diff = "diff --git a/a.rs b/a.rs\n--- a/a.rs\n+++ b/a.rs\n@@ -1 +1 @@\n-x\n+y\ndiff --git a/b.rs b/b.rs\n--- a/b.rs\n+++ b/b.rs\n@@ -1 +1 @@\n-1\n+2\n";
        let units = DiffSegmenter.split(diff);
        assert_eq!(units.len(), 2);
        assert!(units[0].starts_with("diff --git a/a.rs"));
        assert!(units[1].starts_with("diff --git a/b.rs"));
        assert!(units[1].ends_with("+2"));
    }

    #[test]
    fn test_diff_without_header_is_one_unit() {
        let units = DiffSegmenter.split("@@ -1 +1 @@\n-a\n+b\n");
        assert_eq!(units, vec!["@@ -1 +1 @@\n-a\n+b".to_string()]);
        assert!(DiffSegmenter.split("").is_empty());
    }

    #[test]
    fn test_for_task_picks_segmenter() {
        let diff = "diff --git a/x b/x\n+fn z() {}\n";
        assert_eq!(for_task(TaskKind::CommitSummary).split(diff).len(), 1);
        assert!(for_task(TaskKind::Review).split(diff).is_empty());
    }
}
