//! Tier 1: existing tests found by naming convention.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::traits::{TierContext, TierHandler};
use crate::domain::models::{TestEvidence, Tier, TierOutcome};
use crate::domain::ports::RepositoryProvider;
use crate::services::java_source::{
    extract_test_methods, is_java_file, is_test_file, test_candidates, TypeReference,
};

/// Looks up the conventional test files of the changed file at the unit's commit.
///
/// A candidate matches when it exists, declares at least one test method and
/// mentions the production type. Pure lookup; nothing is written.
pub struct ExistingTestExtractor {
    repos: Arc<dyn RepositoryProvider>,
}

impl ExistingTestExtractor {
    /// An extractor reading candidate tests through `repos`.
    pub fn new(repos: Arc<dyn RepositoryProvider>) -> Self {
        Self { repos }
    }
}

#[async_trait]
impl TierHandler for ExistingTestExtractor {
    fn tier(&self) -> Tier {
        Tier::Extracted
    }

    async fn attempt(&self, ctx: &TierContext<'_>) -> TierOutcome {
        let id = &ctx.unit.id;
        if !is_java_file(&id.file_name) {
            return TierOutcome::no_candidate(self.tier(), "not a Java source file");
        }
        let candidates = test_candidates(&id.file_name);
        if candidates.is_empty() {
            return TierOutcome::no_candidate(
                self.tier(),
                format!("no conventional test location for {}", id.file_name),
            );
        }

        let repo = match self.repos.open(&id.project).await {
            Ok(repo) => repo,
            Err(e) => return TierOutcome::no_candidate(self.tier(), e.to_string()),
        };

        let is_self_candidate = is_test_file(&id.file_name);
        let type_reference = TypeReference::new(ctx.unit.type_name());
        let mut evidence = Vec::new();
        let mut lookup_errors = Vec::new();

        for candidate in &candidates {
            if ctx.cancel.is_cancelled() {
                break;
            }
            let content = match repo.show(&id.commit_sha, candidate).await {
                Ok(Some(content)) => content,
                Ok(None) => continue,
                Err(e) => {
                    lookup_errors.push(e.to_string());
                    continue;
                }
            };
            let methods = extract_test_methods(&content);
            if methods.is_empty() {
                debug!(unit = %id, candidate, "candidate has no test methods");
                continue;
            }
            if !is_self_candidate && !type_reference.is_referenced_by(&content) {
                debug!(unit = %id, candidate, "candidate does not reference the production type");
                continue;
            }
            evidence.push(TestEvidence {
                commit_sha: id.commit_sha.clone(),
                path: candidate.clone(),
                test_methods: methods,
            });
        }

        if let Some(first) = evidence.first() {
            let artifact = format!("{}:{}", id.commit_sha, first.path);
            return TierOutcome::success(self.tier(), artifact).with_evidence(evidence);
        }

        let mut diagnostic = format!(
            "no test with test methods among {} candidate(s) at {}",
            candidates.len(),
            id.short_sha()
        );
        if !lookup_errors.is_empty() {
            diagnostic.push_str("; lookup errors: ");
            diagnostic.push_str(&lookup_errors.join("; "));
        }
        TierOutcome::no_candidate(self.tier(), diagnostic)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{FileChange, TierStatus, UnitId, WorkUnit};
    use crate::domain::ports::{InMemoryProvider, InMemoryRepository};
    use crate::infrastructure::process::Cancellation;
    use std::path::Path;

    const FOO_TEST: &str = "package org.x;\npublic class FooTest {\n    @Test\n    public void works() {\n        new Foo().run();\n    }\n}\n";

    fn unit(file: &str) -> WorkUnit {
        WorkUnit {
            id: UnitId::new("proj", "sha1", file),
            change: FileChange {
                file_name: file.to_string(),
                before_source: "class Foo {}".to_string(),
                after_source: "class Foo { }".to_string(),
            },
        }
    }

    async fn run(repo: InMemoryRepository, unit: &WorkUnit) -> TierOutcome {
        let provider = InMemoryProvider::new().with_repository("proj", repo);
        let extractor = ExistingTestExtractor::new(Arc::new(provider));
        let cancel = Cancellation::never();
        let ctx = TierContext {
            unit,
            attempt: 1,
            history: &[],
            workspace: Path::new("/unused"),
            cancel: &cancel,
        };
        extractor.attempt(&ctx).await
    }

    #[tokio::test]
    async fn finds_conventional_test() {
        let repo = InMemoryRepository::new()
            .with_file("sha1", "m/src/test/java/org/x/FooTest.java", FOO_TEST)
            .with_file("sha1", "m/src/test/java/org/x/FooIT.java", FOO_TEST);
        let outcome = run(repo, &unit("m/src/main/java/org/x/Foo.java")).await;
        assert_eq!(outcome.status, TierStatus::Success);
        assert_eq!(
            outcome.artifact_reference.as_deref(),
            Some("sha1:m/src/test/java/org/x/FooTest.java")
        );
        assert_eq!(outcome.evidence.len(), 2);
        assert_eq!(outcome.test_method_count(), 2);
    }

    #[tokio::test]
    async fn ignores_test_at_other_commit() {
        let repo = InMemoryRepository::new().with_file(
            "other",
            "m/src/test/java/org/x/FooTest.java",
            FOO_TEST,
        );
        let outcome = run(repo, &unit("m/src/main/java/org/x/Foo.java")).await;
        assert_eq!(outcome.status, TierStatus::NoCandidate);
        assert!(outcome.diagnostic.unwrap().contains("5 candidate(s)"));
    }

    #[tokio::test]
    async fn requires_reference_to_production_type() {
        let unrelated = FOO_TEST.replace("new Foo()", "new Bar()");
        let repo = InMemoryRepository::new().with_file(
            "sha1",
            "m/src/test/java/org/x/FooTest.java",
            unrelated,
        );
        let outcome = run(repo, &unit("m/src/main/java/org/x/Foo.java")).await;
        assert_eq!(outcome.status, TierStatus::NoCandidate);
    }

    #[tokio::test]
    async fn test_file_unit_is_its_own_candidate() {
        let path = "m/src/test/java/org/x/FooTest.java";
        let repo = InMemoryRepository::new().with_file("sha1", path, FOO_TEST);
        let outcome = run(repo, &unit(path)).await;
        assert!(outcome.is_success());
    }

    #[tokio::test]
    async fn non_java_and_unavailable_repository_are_no_candidate() {
        let outcome = run(InMemoryRepository::new(), &unit("README.md")).await;
        assert_eq!(outcome.status, TierStatus::NoCandidate);

        let extractor = ExistingTestExtractor::new(Arc::new(InMemoryProvider::new()));
        let unit = unit("m/src/main/java/org/x/Foo.java");
        let cancel = Cancellation::never();
        let ctx = TierContext {
            unit: &unit,
            attempt: 1,
            history: &[],
            workspace: Path::new("/unused"),
            cancel: &cancel,
        };
        let outcome = extractor.attempt(&ctx).await;
        assert_eq!(outcome.status, TierStatus::NoCandidate);
        assert!(outcome.diagnostic.unwrap().starts_with("repository unavailable"));
    }
}
