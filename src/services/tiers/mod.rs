//! Test-acquisition strategies, cheapest first.
//!
//! - Tier 1 `ExistingTestExtractor`: convention-based test lookup at the unit's commit
//! - Tier 2 `DoubleCheckHeuristic`: relaxed matching over nearby history
//! - Tier 3a/3b `GenerativeTier`: black-box test generation

pub mod double_check;
pub mod extractor;
pub mod generative;
pub mod traits;

use std::sync::Arc;

use crate::domain::models::Config;
use crate::domain::ports::RepositoryProvider;
use crate::infrastructure::process::ProcessRunner;

pub use double_check::DoubleCheckHeuristic;
pub use extractor::ExistingTestExtractor;
pub use generative::{
    EvoSuiteGenerator, GenerationRequest, GenerativeTier, JavaBuild, RandoopGenerator,
    TestGenerator,
};
pub use traits::{TierContext, TierHandler};

/// The four cascade handlers wired from configuration.
pub fn standard_handlers(
    config: &Config,
    repos: Arc<dyn RepositoryProvider>,
    runner: &ProcessRunner,
) -> Vec<Arc<dyn TierHandler>> {
    vec![
        Arc::new(ExistingTestExtractor::new(Arc::clone(&repos))),
        Arc::new(DoubleCheckHeuristic::new(repos, config.double_check.clone())),
        Arc::new(GenerativeTier::from_config(
            EvoSuiteGenerator,
            config,
            runner.clone(),
        )),
        Arc::new(GenerativeTier::from_config(
            RandoopGenerator,
            config,
            runner.clone(),
        )),
    ]
}
