use crate::models::{Article, PipelineBatch, Produced};
use crate::stage::{Diagnostic, RunContext, Stage, StageFailure, StageKind};

/// Strict gate before persistence: the final markup must exist and show an image.
#[derive(Debug, Clone, Default)]
pub struct FinalValidationStage;

impl FinalValidationStage {
    pub fn new() -> Self {
        Self
    }

    fn rejection(article: &Article) -> Option<String> {
        match &article.final_html {
            None => Some("final html missing".into()),
            Some(Produced::Failed(failure)) => Some(format!("final html failed: {failure}")),
            Some(Produced::Value(html)) if !html.contains("<img") => {
                Some("final html has no image".into())
            }
            Some(Produced::Value(_)) => None,
        }
    }
}

impl Stage for FinalValidationStage {
    fn name(&self) -> &'static str {
        "validate-final"
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
            match Self::rejection(&article) {
                Some(reason) => ctx.record(Diagnostic::ArticleDropped {
                    stage: self.name(),
                    url: article.url,
                    reason,
                }),
                None => {
                    let _ = kept.try_push(article);
                }
            }
        }
        Ok(kept)
    }
}
