use chrono::Utc;

use crate::models::PipelineBatch;
use crate::stage::{RunContext, Stage, StageFailure, StageKind};
use crate::store::{MergePolicy, merge};
use crate::traits::ArticleStore;

/// Load, merge and save the surviving batch.
///
/// A store error aborts the run: the batch comes back inside the
/// [`StageFailure`] so the caller can hand it to the operator.
#[derive(Clone)]
pub struct PersistStage<S> {
    store: S,
    policy: MergePolicy,
}

impl<S: ArticleStore> PersistStage<S> {
    pub fn new(store: S, policy: MergePolicy) -> Self {
        Self { store, policy }
    }
}

impl<S: ArticleStore> Stage for PersistStage<S> {
    fn name(&self) -> &'static str {
        "persist"
    }

    fn kind(&self) -> StageKind {
        StageKind::Terminal
    }

    async fn run(
        &self,
        batch: PipelineBatch,
        ctx: &mut RunContext,
    ) -> Result<PipelineBatch, StageFailure> {
        let existing = match self.store.load() {
            Ok(file) => file,
            Err(error) => return Err(StageFailure { error, batch }),
        };
        let previous = existing.articles.len();
        let merged = merge(existing, &batch, self.policy, ctx.run_id, Utc::now());

        if let Err(error) = self.store.save(&merged) {
            return Err(StageFailure { error, batch });
        }

        ctx.persisted = batch.len();
        tracing::info!(
            location = %self.store.location(),
            policy = %self.policy,
            saved = batch.len(),
            previous,
            total = merged.articles.len(),
            "Articles persisted"
        );
        Ok(batch)
    }
}
