//! Java source heuristics shared by the lookup tiers and the generators.
//!
//! Path conventions follow the Maven layout: production code under
//! `src/main/java`, tests mirrored under `src/test/java`.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

/// JUnit 4/5: an `@Test` line followed by a method header.
static ANNOTATED_TEST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(@Test[^\n]*\n\s*)(?:public|protected|private)?\s*(?:static\s+)?\w[\w<>,\s]*\s+(\w+)\s*\([^)]*\)\s*(?:throws\s+[\w,\s]+)?\s*\{",
    )
    .expect("annotated test pattern is valid")
});

/// JUnit 3: `test*` methods of a `TestCase` subclass.
static JUNIT3_TEST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:public|protected)\s+void\s+(test\w+)\s*\([^)]*\)\s*(?:throws\s+[\w,\s]+)?\s*\{")
        .expect("junit3 test pattern is valid")
});

static PACKAGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"package\s+([\w.]+)\s*;").expect("package pattern is valid"));

static TYPE_DECLARATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:public\s+)?(?:abstract\s+)?(?:final\s+)?(?:class|interface|enum|record)\s+(\w+)")
        .expect("type declaration pattern is valid")
});

const TEST_SUFFIXES: [&str; 4] = ["TestCase", "Tests", "Test", "IT"];

/// Whether `path` names a Java source file.
pub fn is_java_file(path: &str) -> bool {
    Path::new(path)
        .extension()
        .is_some_and(|ext| ext == "java")
}

fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// File stem: `Foo` for `a/b/Foo.java`.
pub fn stem(path: &str) -> &str {
    let name = file_name(path);
    name.strip_suffix(".java").unwrap_or(name)
}

/// Whether `path` looks like a Java test source.
pub fn is_test_file(path: &str) -> bool {
    if path.contains("/src/test/") || path.starts_with("src/test/") {
        return true;
    }
    let name = file_name(path);
    if !is_java_file(name) {
        return false;
    }
    name.ends_with("Test.java")
        || name.ends_with("Tests.java")
        || name.ends_with("IT.java")
        || name.starts_with("Test")
}

fn mirror_into_test_tree(path: &str) -> Option<String> {
    let anchored = if path.starts_with("src/") {
        format!("/{path}")
    } else {
        path.to_string()
    };
    let mirrored = if anchored.contains("/src/main/java/") {
        anchored.replacen("/src/main/java/", "/src/test/java/", 1)
    } else if anchored.contains("/src/main/") {
        anchored.replacen("/src/main/", "/src/test/", 1)
    } else {
        return None;
    };
    Some(if path.starts_with("src/") {
        mirrored[1..].to_string()
    } else {
        mirrored
    })
}

/// Candidate test paths for a production file, in lookup order.
///
/// `src/main/java/org/x/Foo.java` maps to `FooTest`, `FooTests`, `FooIT`,
/// `FooTestCase` and `TestFoo` under `src/test/java/org/x/`. A file that
/// already is a test is its own sole candidate.
pub fn test_candidates(path: &str) -> Vec<String> {
    if !is_java_file(path) {
        return Vec::new();
    }
    if is_test_file(path) {
        return vec![path.to_string()];
    }
    let Some(mirrored) = mirror_into_test_tree(path) else {
        return Vec::new();
    };
    let base = &mirrored[..mirrored.len() - ".java".len()];
    let mut candidates: Vec<String> = ["Test", "Tests", "IT", "TestCase"]
        .iter()
        .map(|suffix| format!("{base}{suffix}.java"))
        .collect();
    if let Some((dir, name)) = base.rsplit_once('/') {
        candidates.push(format!("{dir}/Test{name}.java"));
    }
    candidates
}

/// The mirrored test package directory of a production file (no trailing slash).
pub fn test_directory(path: &str) -> Option<String> {
    if !is_java_file(path) || is_test_file(path) {
        return None;
    }
    let mirrored = mirror_into_test_tree(path)?;
    mirrored.rsplit_once('/').map(|(dir, _)| dir.to_string())
}

/// `dir` with its last `levels` components removed, never above the test root.
pub fn widen_directory(dir: &str, levels: usize) -> String {
    let floor = ["/src/test/java", "/src/test"]
        .iter()
        .find_map(|root| dir.find(root).map(|i| i + root.len()))
        .or_else(|| {
            ["src/test/java", "src/test"]
                .iter()
                .find(|root| dir.starts_with(**root))
                .map(|root| root.len())
        })
        .unwrap_or(0);
    let mut current = dir;
    for _ in 0..levels {
        match current.rsplit_once('/') {
            Some((parent, _)) if parent.len() >= floor => current = parent,
            _ => break,
        }
    }
    current.to_string()
}

/// Production-type stem of a test file name (`FooTest` -> `Foo`).
pub fn strip_test_affixes(name: &str) -> &str {
    let mut stripped = name;
    for suffix in TEST_SUFFIXES {
        if let Some(rest) = stripped.strip_suffix(suffix)
            && !rest.is_empty()
        {
            stripped = rest;
            break;
        }
    }
    if stripped == name
        && let Some(rest) = name.strip_prefix("Test")
        && !rest.is_empty()
    {
        stripped = rest;
    }
    stripped
}

/// Length of the shorter name when one contains the other (case-insensitive), else 0.
pub fn name_overlap(a: &str, b: &str) -> usize {
    let a = a.to_ascii_lowercase();
    let b = b.to_ascii_lowercase();
    if a.is_empty() || b.is_empty() {
        0
    } else if a.contains(&b) {
        b.len()
    } else if b.contains(&a) {
        a.len()
    } else {
        0
    }
}

/// Text between the brace at `open` and its match; `None` when unbalanced.
fn method_body(content: &str, open: usize) -> Option<&str> {
    let mut depth = 0usize;
    for (offset, ch) in content[open..].char_indices() {
        match ch {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&content[open + 1..open + offset]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Names of the test methods declared in `content`, in source order.
///
/// Methods with an empty or unbalanced body are ignored.
pub fn extract_test_methods(content: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    let mut push = |name: &str, brace: usize| {
        let has_body = method_body(content, brace).is_some_and(|body| !body.is_empty());
        if has_body && !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
    };

    for caps in ANNOTATED_TEST.captures_iter(content) {
        if let (Some(whole), Some(name)) = (caps.get(0), caps.get(2)) {
            push(name.as_str(), whole.end() - 1);
        }
    }
    if content.contains("extends TestCase") {
        for caps in JUNIT3_TEST.captures_iter(content) {
            if let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) {
                push(name.as_str(), whole.end() - 1);
            }
        }
    }
    names
}

/// Declared package, if any.
pub fn extract_package(content: &str) -> Option<String> {
    PACKAGE
        .captures(content)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Name of the first declared type, falling back to the file stem.
pub fn extract_class_name(content: &str, path: &str) -> String {
    TYPE_DECLARATION
        .captures(content)
        .and_then(|caps| caps.get(1))
        .map_or_else(|| stem(path).to_string(), |m| m.as_str().to_string())
}

/// `package.ClassName` of a source file.
pub fn fully_qualified_name(content: &str, path: &str) -> String {
    let class = extract_class_name(content, path);
    match extract_package(content) {
        Some(package) => format!("{package}.{class}"),
        None => class,
    }
}

/// Whole-word matcher for one type name, compiled once per unit.
#[derive(Debug, Clone)]
pub struct TypeReference {
    pattern: Option<Regex>,
}

impl TypeReference {
    /// Matcher for `type_name`; an empty name matches nothing.
    pub fn new(type_name: &str) -> Self {
        let pattern = (!type_name.is_empty())
            .then(|| Regex::new(&format!(r"\b{}\b", regex::escape(type_name))).ok())
            .flatten();
        Self { pattern }
    }

    /// Whether `content` mentions the type as a whole word.
    pub fn is_referenced_by(&self, content: &str) -> bool {
        self.pattern.as_ref().is_some_and(|re| re.is_match(content))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const JUNIT4: &str = r#"package org.example;

import org.junit.Test;

public class FooTest {
    @Test
    public void parsesInput() {
        Foo foo = new Foo();
        assertEquals(1, foo.parse("1"));
    }

    @Test(expected = IllegalStateException.class)
    public void rejectsGarbage() throws Exception {
        new Foo().parse("x");
    }

    @Test
    public void empty() {}

    private void helper() { }
}
"#;

    const JUNIT3: &str = r#"package org.example;

public class LegacyTest extends TestCase {
    public void testSomething() {
        assertTrue(true);
    }

    public void notATest() {
        fail();
    }
}
"#;

    #[test]
    fn candidates_follow_maven_layout() {
        let candidates = test_candidates("core/src/main/java/org/x/Foo.java");
        assert_eq!(
            candidates,
            vec![
                "core/src/test/java/org/x/FooTest.java",
                "core/src/test/java/org/x/FooTests.java",
                "core/src/test/java/org/x/FooIT.java",
                "core/src/test/java/org/x/FooTestCase.java",
                "core/src/test/java/org/x/TestFoo.java",
            ]
        );
    }

    #[test]
    fn candidates_handle_root_module_and_non_java_roots() {
        assert_eq!(
            test_candidates("src/main/java/Foo.java")[0],
            "src/test/java/FooTest.java"
        );
        assert_eq!(
            test_candidates("m/src/main/groovy/Foo.java")[0],
            "m/src/test/groovy/FooTest.java"
        );
        assert!(test_candidates("lib/Foo.java").is_empty());
        assert!(test_candidates("core/src/main/resources/x.xml").is_empty());
    }

    #[test]
    fn test_file_is_its_own_candidate() {
        let path = "core/src/test/java/org/x/FooTest.java";
        assert_eq!(test_candidates(path), vec![path.to_string()]);
    }

    #[test]
    fn recognizes_test_files() {
        assert!(is_test_file("a/src/test/java/Helper.java"));
        assert!(is_test_file("a/FooTests.java"));
        assert!(is_test_file("a/TestFoo.java"));
        assert!(is_test_file("a/FooIT.java"));
        assert!(!is_test_file("a/src/main/java/Foo.java"));
        assert!(!is_test_file("a/src/main/java/Testable.txt"));
    }

    #[test]
    fn extracts_junit4_methods_with_bodies() {
        assert_eq!(extract_test_methods(JUNIT4), vec!["parsesInput", "rejectsGarbage"]);
    }

    #[test]
    fn extracts_junit3_methods_only_in_test_case_subclasses() {
        assert_eq!(extract_test_methods(JUNIT3), vec!["testSomething"]);
        let plain = JUNIT3.replace("extends TestCase", "");
        assert!(extract_test_methods(&plain).is_empty());
    }

    #[test]
    fn package_and_class_names() {
        assert_eq!(extract_package(JUNIT4).as_deref(), Some("org.example"));
        assert_eq!(extract_class_name(JUNIT4, "x/FooTest.java"), "FooTest");
        assert_eq!(fully_qualified_name(JUNIT4, "x/FooTest.java"), "org.example.FooTest");
        assert_eq!(fully_qualified_name("// nothing", "x/Bar.java"), "Bar");
    }

    #[test]
    fn type_references_are_whole_words() {
        let foo = TypeReference::new("Foo");
        assert!(foo.is_referenced_by(JUNIT4));
        assert!(!foo.is_referenced_by("FooBar baz;"));
        assert!(!foo.is_referenced_by("MyFoo x;"));
        assert!(foo.is_referenced_by("List<Foo> all;"));
        assert!(!TypeReference::new("").is_referenced_by("anything"));
    }

    #[test]
    fn type_reference_escapes_its_name() {
        let inner = TypeReference::new("Outer$Inner");
        assert!(inner.is_referenced_by("new Outer$Inner()"));
        assert!(!inner.is_referenced_by("new OuterXInner()"));
    }

    #[test]
    fn test_directory_and_widening() {
        let dir = test_directory("m/src/main/java/org/a/b/Foo.java").unwrap();
        assert_eq!(dir, "m/src/test/java/org/a/b");
        assert_eq!(widen_directory(&dir, 0), dir);
        assert_eq!(widen_directory(&dir, 1), "m/src/test/java/org/a");
        assert_eq!(widen_directory(&dir, 10), "m/src/test/java");
        assert_eq!(test_directory("m/src/test/java/org/FooTest.java"), None);
    }

    #[test]
    fn affixes_and_overlap() {
        assert_eq!(strip_test_affixes("FooTest"), "Foo");
        assert_eq!(strip_test_affixes("FooTestCase"), "Foo");
        assert_eq!(strip_test_affixes("TestFoo"), "Foo");
        assert_eq!(strip_test_affixes("Test"), "Test");
        assert_eq!(name_overlap("StringUtils", "stringutilsextra"), 11);
        assert_eq!(name_overlap("Parser", "Lexer"), 0);
    }
}
