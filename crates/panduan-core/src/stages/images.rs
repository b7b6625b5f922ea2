use crate::models::{Article, ContentBlock, PipelineBatch};
use crate::retry::ExternalCaller;
use crate::stage::{Diagnostic, RunContext, Stage, StageFailure, StageKind, Uncertain};
use crate::stages::parse_verdict;
use crate::traits::TextService;

const CONTEXT_CHARS: usize = 300;

/// Keeps only articles that still carry at least one image.
///
/// With a relevance checker configured, each image is first put to the
/// decision service; images answered NO are removed from the article. An
/// image the service can't decide on stays unless `on_uncertain` says drop.
#[derive(Clone)]
pub struct ImageValidationStage<T> {
    relevance: Option<ExternalCaller<T>>,
    on_uncertain: Uncertain,
}

impl<T: TextService> ImageValidationStage<T> {
    /// Presence check only, no external calls.
    pub fn new() -> Self {
        Self {
            relevance: None,
            on_uncertain: Uncertain::Keep,
        }
    }

    pub fn with_relevance_check(mut self, caller: ExternalCaller<T>) -> Self {
        self.relevance = Some(caller);
        self
    }

    pub fn on_uncertain(mut self, policy: Uncertain) -> Self {
        self.on_uncertain = policy;
        self
    }

    fn prompt(title: &str, context: &str, src: &str, alt: &str) -> String {
        format!(
            "You check images in tutorial articles.\n\
             Answer with a single word, YES or NO: does this image belong to the tutorial \
             (a screenshot, diagram or illustration of a step) rather than an ad, logo or \
             unrelated banner?\n\n\
             Tutorial title: {title}\n\
             Text before the image: {context}\n\
             Image file: {src}\n\
             Image alt text: {alt}"
        )
    }

    /// Drops images the service judges irrelevant, preserving block order.
    async fn filter_images(&self, caller: &ExternalCaller<T>, article: &mut Article) {
        let mut kept = Vec::with_capacity(article.content.len());
        let mut context = String::new();

        for block in std::mem::take(&mut article.content) {
            let ContentBlock::Image { src, alt } = &block else {
                context = block.plain_text().chars().take(CONTEXT_CHARS).collect();
                kept.push(block);
                continue;
            };

            let prompt = Self::prompt(&article.title, &context, src, alt);
            let verdict = match caller.call(&prompt).await {
                Ok(reply) => parse_verdict(&reply),
                Err(e) => {
                    tracing::debug!(url = %article.url, %src, error = %e, "Image relevance unknown");
                    None
                }
            };
            let keep = match verdict {
                Some(relevant) => relevant,
                None => self.on_uncertain == Uncertain::Keep,
            };
            if keep {
                kept.push(block);
            } else {
                tracing::info!(url = %article.url, %src, "Removed irrelevant image");
            }
        }
        article.set_content(kept);
    }
}

impl<T: TextService> Default for ImageValidationStage<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: TextService> Stage for ImageValidationStage<T> {
    fn name(&self) -> &'static str {
        "validate-images"
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
        for mut article in batch {
            if let Some(caller) = &self.relevance {
                if article.has_image() {
                    self.filter_images(caller, &mut article).await;
                }
            }

            if !article.has_image() {
                ctx.record(Diagnostic::ArticleDropped {
                    stage: self.name(),
                    url: article.url,
                    reason: "no image".into(),
                });
                continue;
            }
            let _ = kept.try_push(article);
        }
        Ok(kept)
    }
}
