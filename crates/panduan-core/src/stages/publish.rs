use crate::models::{Article, PipelineBatch, Produced};
use crate::stage::{Diagnostic, RunContext, Stage, StageFailure, StageKind};
use crate::traits::{PostDraft, Publisher};

/// Sends every article to the publishing target as a draft.
///
/// Each article is attempted independently; outcomes are recorded as
/// diagnostics and the batch is returned unchanged.
#[derive(Clone)]
pub struct PublishStage<P> {
    publisher: P,
}

impl<P: Publisher> PublishStage<P> {
    pub fn new(publisher: P) -> Self {
        Self { publisher }
    }

    fn draft(article: &Article) -> Option<PostDraft> {
        let Some(Produced::Value(html)) = &article.final_html else {
            return None;
        };
        Some(PostDraft {
            title: article.display_title().to_string(),
            html: html.clone(),
            source_url: article.url.clone(),
            media: article.first_image().map(str::to_string),
        })
    }
}

impl<P: Publisher> Stage for PublishStage<P> {
    fn name(&self) -> &'static str {
        "publish"
    }

    fn kind(&self) -> StageKind {
        StageKind::Terminal
    }

    async fn run(
        &self,
        batch: PipelineBatch,
        ctx: &mut RunContext,
    ) -> Result<PipelineBatch, StageFailure> {
        for article in &batch {
            let Some(draft) = Self::draft(article) else {
                ctx.record(Diagnostic::PublishFailed {
                    url: article.url.clone(),
                    error: "no final html".into(),
                });
                continue;
            };
            match self.publisher.publish(&draft).await {
                Ok(post_id) => ctx.record(Diagnostic::Published {
                    url: article.url.clone(),
                    post_id,
                }),
                Err(e) => ctx.record(Diagnostic::PublishFailed {
                    url: article.url.clone(),
                    error: e.to_string(),
                }),
            }
        }
        Ok(batch)
    }
}
