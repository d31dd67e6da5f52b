//! Unit-of-work model.
//!
//! A [`CommitRecord`] is one line of the input corpus. Each of its
//! [`FileChange`]s becomes exactly one [`WorkUnit`], identified by the
//! `(project, commit_sha, file_name)` triple in [`UnitId`]. Units are never
//! mutated after loading; tier outcomes are recorded elsewhere, keyed by the
//! identity.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// One refactoring commit from the input corpus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRecord {
    /// Project identifier (e.g. the repository name).
    pub project: String,
    /// Commit hash the refactoring was mined from.
    pub commit_sha: String,
    /// Changed files, in corpus order.
    #[serde(default)]
    pub files: Vec<FileChange>,
}

impl CommitRecord {
    /// Derive the work units of this commit, one per file change.
    pub fn units(&self) -> Vec<WorkUnit> {
        self.files
            .iter()
            .map(|change| WorkUnit {
                id: UnitId::new(&self.project, &self.commit_sha, &change.file_name),
                change: change.clone(),
            })
            .collect()
    }
}

/// A single file touched by a refactoring commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileChange {
    /// Repository-relative path of the file.
    pub file_name: String,
    /// Source before the refactoring.
    #[serde(rename = "before_refactoring", default)]
    pub before_source: String,
    /// Source after the refactoring.
    #[serde(rename = "after_refactoring", default)]
    pub after_source: String,
}

/// Stable identity of a work unit across runs.
///
/// Ordering is lexicographic over `(project, commit_sha, file_name)`, which is
/// the order used for every persisted report.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UnitId {
    /// Project identifier.
    pub project: String,
    /// Commit hash.
    pub commit_sha: String,
    /// Repository-relative file path.
    pub file_name: String,
}

impl UnitId {
    /// Build an identity from its three components.
    pub fn new(
        project: impl Into<String>,
        commit_sha: impl Into<String>,
        file_name: impl Into<String>,
    ) -> Self {
        Self {
            project: project.into(),
            commit_sha: commit_sha.into(),
            file_name: file_name.into(),
        }
    }

    /// Hex SHA-256 over the identity triple.
    ///
    /// Components are NUL-separated so that `("a/b", "c")` and `("a", "b/c")`
    /// never collide.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.project.as_bytes());
        hasher.update([0]);
        hasher.update(self.commit_sha.as_bytes());
        hasher.update([0]);
        hasher.update(self.file_name.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// First 16 hex characters of [`digest`](Self::digest), used in directory names.
    pub fn short_digest(&self) -> String {
        self.digest()[..16].to_string()
    }

    /// First 8 characters of the commit hash, for log lines.
    pub fn short_sha(&self) -> &str {
        match self.commit_sha.char_indices().nth(8) {
            Some((end, _)) => &self.commit_sha[..end],
            None => &self.commit_sha,
        }
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}:{}", self.project, self.short_sha(), self.file_name)
    }
}

/// An input line that was not turned into a commit record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedLine {
    /// 1-based line number in the corpus file.
    pub line: usize,
    /// Why it was skipped.
    pub reason: String,
}

/// The atomic piece of work routed through the cascade.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkUnit {
    /// Aggregation key.
    pub id: UnitId,
    /// The before/after source pair.
    pub change: FileChange,
}

impl WorkUnit {
    /// Returns the reason this unit cannot enter generation tiers, if any.
    ///
    /// Both sources must be non-empty (whitespace counts as empty).
    pub fn malformed_reason(&self) -> Option<String> {
        let before_empty = self.change.before_source.trim().is_empty();
        let after_empty = self.change.after_source.trim().is_empty();
        match (before_empty, after_empty) {
            (false, false) => None,
            (true, true) => Some("before and after sources are empty".to_string()),
            (true, false) => Some("before source is empty".to_string()),
            (false, true) => Some("after source is empty".to_string()),
        }
    }

    /// Whether the unit is excluded from generation tiers.
    pub fn is_malformed(&self) -> bool {
        self.malformed_reason().is_some()
    }

    /// File stem of the changed file (`Foo` for `a/b/Foo.java`).
    pub fn type_name(&self) -> &str {
        let base = self
            .id
            .file_name
            .rsplit('/')
            .next()
            .unwrap_or(&self.id.file_name);
        base.strip_suffix(".java").unwrap_or(base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn change(before: &str, after: &str) -> FileChange {
        FileChange {
            file_name: "core/src/main/java/org/example/Foo.java".to_string(),
            before_source: before.to_string(),
            after_source: after.to_string(),
        }
    }

    #[test]
    fn commit_record_parses_corpus_field_names() {
        let line = r#"{"project":"commons-lang","commit_sha":"abc123","files":[
            {"file_name":"src/main/java/A.java","before_refactoring":"class A {}","after_refactoring":"class A { }"}
        ]}"#;
        let record: CommitRecord = serde_json::from_str(line).unwrap();
        assert_eq!(record.files.len(), 1);
        assert_eq!(record.files[0].before_source, "class A {}");
        assert_eq!(record.files[0].after_source, "class A { }");
    }

    #[test]
    fn missing_sources_deserialize_as_empty() {
        let line = r#"{"project":"p","commit_sha":"s","files":[{"file_name":"X.java"}]}"#;
        let record: CommitRecord = serde_json::from_str(line).unwrap();
        assert!(record.units()[0].is_malformed());
    }

    #[test]
    fn units_are_derived_one_per_file() {
        let record = CommitRecord {
            project: "p".into(),
            commit_sha: "0123456789abcdef".into(),
            files: vec![change("a", "b"), change("c", "d")],
        };
        let units = record.units();
        assert_eq!(units.len(), 2);
        assert_eq!(units[0].id.project, "p");
        assert_eq!(units[0].id.short_sha(), "01234567");
    }

    #[test]
    fn short_sha_cuts_on_character_boundaries() {
        let id = UnitId::new("p", "aéééééééé", "A.java");
        assert_eq!(id.short_sha(), "aééééééé");
        assert_eq!(id.to_string(), "p@aééééééé:A.java");
        assert_eq!(UnitId::new("p", "aéé", "A.java").short_sha(), "aéé");
        assert_eq!(UnitId::new("p", "", "A.java").short_sha(), "");
    }

    #[test]
    fn malformed_reason_names_the_empty_side() {
        let unit = |b: &str, a: &str| WorkUnit {
            id: UnitId::new("p", "s", "F.java"),
            change: change(b, a),
        };
        assert_eq!(unit("x", "y").malformed_reason(), None);
        assert_eq!(
            unit("", "y").malformed_reason().as_deref(),
            Some("before source is empty")
        );
        assert_eq!(
            unit("x", "  \n").malformed_reason().as_deref(),
            Some("after source is empty")
        );
        assert_eq!(
            unit("", "").malformed_reason().as_deref(),
            Some("before and after sources are empty")
        );
    }

    #[test]
    fn digest_is_stable_and_separator_aware() {
        let a = UnitId::new("a/b", "c", "d");
        let b = UnitId::new("a", "b/c", "d");
        assert_eq!(a.digest(), UnitId::new("a/b", "c", "d").digest());
        assert_ne!(a.digest(), b.digest());
        assert_eq!(a.short_digest().len(), 16);
    }

    #[test]
    fn ordering_is_project_then_sha_then_file() {
        let mut ids = vec![
            UnitId::new("b", "1", "A.java"),
            UnitId::new("a", "2", "A.java"),
            UnitId::new("a", "1", "B.java"),
            UnitId::new("a", "1", "A.java"),
        ];
        ids.sort();
        assert_eq!(ids[0], UnitId::new("a", "1", "A.java"));
        assert_eq!(ids[1], UnitId::new("a", "1", "B.java"));
        assert_eq!(ids[2], UnitId::new("a", "2", "A.java"));
        assert_eq!(ids[3], UnitId::new("b", "1", "A.java"));
    }

    #[test]
    fn type_name_strips_directory_and_extension() {
        let unit = WorkUnit {
            id: UnitId::new("p", "s", "m/src/main/java/org/x/Parser.java"),
            change: change("a", "b"),
        };
        assert_eq!(unit.type_name(), "Parser");
    }
}
