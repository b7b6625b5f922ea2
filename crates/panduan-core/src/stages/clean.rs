use crate::html::render_blocks;
use crate::models::PipelineBatch;
use crate::stage::{Diagnostic, RunContext, Stage, StageFailure, StageKind};

/// Drops articles too short to be worth translating.
///
/// Length is measured on the rendered markup of the original content.
#[derive(Debug, Clone)]
pub struct CleanStage {
    min_content_len: usize,
}

impl CleanStage {
    pub fn new(min_content_len: usize) -> Self {
        Self { min_content_len }
    }
}

impl Stage for CleanStage {
    fn name(&self) -> &'static str {
        "clean"
    }

    fn kind(&self) -> StageKind {
        StageKind::Filter
    }

    async fn run(
        &self,
        batch: PipelineBatch,
        ctx: &mut RunContext,
    ) -> Result<PipelineBatch, StageFailure> {
        let mut kept = PipelineBatch::new();
        for article in batch {
            let len = render_blocks(&article.content).len();
            if len < self.min_content_len {
                ctx.record(Diagnostic::ArticleDropped {
                    stage: self.name(),
                    url: article.url,
                    reason: format!("content length {len} below {}", self.min_content_len),
                });
                continue;
            }
            // Input urls are unique, so this never rejects.
            let _ = kept.try_push(article);
        }
        Ok(kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{sample_article, text_article};

    #[tokio::test]
    async fn drops_short_articles_and_keeps_order() {
        let batch: PipelineBatch = vec![
            sample_article("https://a.test/1", true),
            text_article("https://a.test/2", "tiny"),
            sample_article("https://a.test/3", false),
        ]
        .into_iter()
        .collect();
        let mut ctx = RunContext::new();

        let out = CleanStage::new(100).run(batch, &mut ctx).await.unwrap();

        assert_eq!(out.urls(), vec!["https://a.test/1", "https://a.test/3"]);
        assert_eq!(ctx.diagnostics.len(), 1);
        assert!(matches!(
            &ctx.diagnostics.entries()[0],
            Diagnostic::ArticleDropped { stage: "clean", url, .. } if url == "https://a.test/2"
        ));
    }

    #[tokio::test]
    async fn empty_batch_stays_empty() {
        let mut ctx = RunContext::new();
        let out = CleanStage::new(200)
            .run(PipelineBatch::new(), &mut ctx)
            .await
            .unwrap();
        assert!(out.is_empty());
        assert!(ctx.diagnostics.is_empty());
    }
}
