use crate::html::render_article;
use crate::models::{FailureKind, FieldFailure, PipelineBatch, Produced};
use crate::stage::{Diagnostic, RunContext, Stage, StageFailure, StageKind};

/// Builds the final post markup from the translated fields.
///
/// An article whose content translation is missing or failed gets a
/// `MissingInput` sentinel instead of markup. A failed title falls back to
/// the original title.
#[derive(Debug, Clone, Default)]
pub struct RenderStage;

impl RenderStage {
    pub fn new() -> Self {
        Self
    }
}

impl Stage for RenderStage {
    fn name(&self) -> &'static str {
        "render"
    }

    fn kind(&self) -> StageKind {
        StageKind::Transform
    }

    async fn run(
        &self,
        batch: PipelineBatch,
        ctx: &mut RunContext,
    ) -> Result<PipelineBatch, StageFailure> {
        let mut out = PipelineBatch::new();
        for mut article in batch {
            let rendered = match &article.translated_content {
                Some(Produced::Value(blocks)) => Produced::Value(render_article(
                    article.display_title(),
                    &article.url,
                    blocks,
                )),
                Some(Produced::Failed(upstream)) => Produced::Failed(FieldFailure::new(
                    FailureKind::MissingInput,
                    format!("translated content failed: {upstream}"),
                )),
                None => Produced::Failed(FieldFailure::new(
                    FailureKind::MissingInput,
                    "no translated content",
                )),
            };
            if let Produced::Failed(failure) = &rendered {
                ctx.record(Diagnostic::FieldFailed {
                    stage: self.name(),
                    url: article.url.clone(),
                    field: "final_html",
                    failure: failure.clone(),
                });
            }
            article.final_html = Some(rendered);
            let _ = out.try_push(article);
        }
        Ok(out)
    }
}
