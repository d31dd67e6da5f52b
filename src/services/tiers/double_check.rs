//! Tier 2: relaxed matching over nearby history.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::traits::{TierContext, TierHandler};
use crate::domain::models::{DoubleCheckConfig, TestEvidence, Tier, TierOutcome};
use crate::domain::ports::{RepositoryProvider, SourceRepository};
use crate::services::java_source::{
    extract_test_methods, is_java_file, is_test_file, name_overlap, stem, strip_test_affixes,
    test_directory, widen_directory, TypeReference,
};

/// Searches the mirrored test package of the changed file at the unit's
/// commit and at its nearest ancestors and descendants.
///
/// A test file qualifies when it declares test methods and passes the
/// configured name and type-reference filters. The first commit with any
/// qualifying file wins.
pub struct DoubleCheckHeuristic {
    repos: Arc<dyn RepositoryProvider>,
    settings: DoubleCheckConfig,
}

impl DoubleCheckHeuristic {
    /// A heuristic searching `repos` with the given filters.
    pub fn new(repos: Arc<dyn RepositoryProvider>, settings: DoubleCheckConfig) -> Self {
        Self { repos, settings }
    }

    /// The unit's commit, then ancestors and descendants alternating, nearest first.
    async fn commit_window(&self, repo: &dyn SourceRepository, commit: &str) -> Vec<String> {
        let window = self.settings.history_window;
        let ancestors = repo.ancestors(commit, window).await.unwrap_or_else(|e| {
            warn!(commit, error = %e, "Cannot list ancestors");
            Vec::new()
        });
        let descendants = repo.descendants(commit, window).await.unwrap_or_else(|e| {
            warn!(commit, error = %e, "Cannot list descendants");
            Vec::new()
        });

        let mut commits = vec![commit.to_string()];
        let mut older = ancestors.into_iter();
        let mut newer = descendants.into_iter();
        loop {
            let (a, d) = (older.next(), newer.next());
            if a.is_none() && d.is_none() {
                break;
            }
            commits.extend(a);
            commits.extend(d);
        }
        commits
    }

    fn passes_name_filter(&self, test_path: &str, production: &str) -> bool {
        let min = self.settings.min_name_overlap;
        min == 0 || name_overlap(strip_test_affixes(stem(test_path)), production) >= min
    }

    async fn matches_at(
        &self,
        repo: &dyn SourceRepository,
        commit: &str,
        prefix: &str,
        production: &str,
        type_reference: &TypeReference,
        errors: &mut Vec<String>,
    ) -> Vec<TestEvidence> {
        let files = match repo.list_files(commit, prefix).await {
            Ok(files) => files,
            Err(e) => {
                errors.push(e.to_string());
                return Vec::new();
            }
        };

        let mut evidence = Vec::new();
        for path in files {
            if !is_java_file(&path) || !is_test_file(&path) {
                continue;
            }
            if !self.passes_name_filter(&path, production) {
                continue;
            }
            let content = match repo.show(commit, &path).await {
                Ok(Some(content)) => content,
                Ok(None) => continue,
                Err(e) => {
                    errors.push(e.to_string());
                    continue;
                }
            };
            if self.settings.require_type_reference && !type_reference.is_referenced_by(&content) {
                continue;
            }
            let methods = extract_test_methods(&content);
            if methods.is_empty() {
                continue;
            }
            evidence.push(TestEvidence {
                commit_sha: commit.to_string(),
                path,
                test_methods: methods,
            });
        }
        evidence
    }
}

#[async_trait]
impl TierHandler for DoubleCheckHeuristic {
    fn tier(&self) -> Tier {
        Tier::DoubleChecked
    }

    async fn attempt(&self, ctx: &TierContext<'_>) -> TierOutcome {
        let id = &ctx.unit.id;
        let Some(directory) = test_directory(&id.file_name) else {
            return TierOutcome::no_candidate(
                self.tier(),
                format!("no mirrored test directory for {}", id.file_name),
            );
        };
        let prefix = widen_directory(&directory, self.settings.directory_depth);

        let repo = match self.repos.open(&id.project).await {
            Ok(repo) => repo,
            Err(e) => return TierOutcome::no_candidate(self.tier(), e.to_string()),
        };

        let production = ctx.unit.type_name();
        let type_reference = TypeReference::new(production);
        let commits = self.commit_window(repo.as_ref(), &id.commit_sha).await;
        let mut errors = Vec::new();

        for commit in &commits {
            if ctx.cancel.is_cancelled() {
                break;
            }
            let evidence = self
                .matches_at(
                    repo.as_ref(),
                    commit,
                    &prefix,
                    production,
                    &type_reference,
                    &mut errors,
                )
                .await;
            if let Some(first) = evidence.first() {
                debug!(unit = %id, commit, matches = evidence.len(), "double-check matched");
                let artifact = format!("{commit}:{}", first.path);
                return TierOutcome::success(self.tier(), artifact).with_evidence(evidence);
            }
        }

        let mut diagnostic = format!(
            "no related tests under {prefix} in {} commit(s)",
            commits.len()
        );
        if !errors.is_empty() {
            diagnostic.push_str("; lookup errors: ");
            diagnostic.push_str(&errors.join("; "));
        }
        TierOutcome::no_candidate(self.tier(), diagnostic)
    }
}
