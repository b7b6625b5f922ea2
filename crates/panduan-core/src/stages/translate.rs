use crate::models::{Article, ContentBlock, PipelineBatch, Produced};
use crate::retry::{CallError, ExternalCaller};
use crate::stage::{Diagnostic, RunContext, Stage, StageFailure, StageKind};
use crate::traits::TextService;

/// Translates the title and every text payload of an article.
///
/// Block order and count are preserved. Images and code blocks are carried
/// over untouched. A failed call never drops the article: the affected
/// field is set to [`Produced::Failed`] and the article moves on.
#[derive(Clone)]
pub struct TranslateStage<T> {
    caller: ExternalCaller<T>,
    language: String,
    tone: String,
}

impl<T: TextService> TranslateStage<T> {
    pub fn new(caller: ExternalCaller<T>, language: impl Into<String>, tone: impl Into<String>) -> Self {
        Self {
            caller,
            language: language.into(),
            tone: tone.into(),
        }
    }

    fn prompt(&self, text: &str) -> String {
        format!(
            "Translate the following text into {}. Return only the translation, \
             without quotes, notes or explanations. Keep product names, commands \
             and menu labels as they are.\n{}\n\n{}",
            self.language, self.tone, text
        )
    }

    /// One text payload. An empty reply passes the original through.
    async fn translate_text(&self, text: &str, url: &str) -> Result<String, CallError> {
        if text.trim().is_empty() {
            return Ok(text.to_string());
        }
        let reply = self.caller.call(&self.prompt(text)).await?;
        let reply = reply.trim();
        if reply.is_empty() {
            tracing::warn!(%url, "Empty translation, keeping original text");
            return Ok(text.to_string());
        }
        Ok(reply.to_string())
    }

    async fn translate_block(&self, block: &ContentBlock, url: &str) -> Result<ContentBlock, CallError> {
        Ok(match block {
            ContentBlock::Heading { level, text } => ContentBlock::Heading {
                level: *level,
                text: self.translate_text(text, url).await?,
            },
            ContentBlock::Paragraph { text } => ContentBlock::Paragraph {
                text: self.translate_text(text, url).await?,
            },
            ContentBlock::Quote { text } => ContentBlock::Quote {
                text: self.translate_text(text, url).await?,
            },
            ContentBlock::List { ordered, items } => {
                let mut translated = Vec::with_capacity(items.len());
                for item in items {
                    translated.push(self.translate_text(item, url).await?);
                }
                ContentBlock::List {
                    ordered: *ordered,
                    items: translated,
                }
            }
            ContentBlock::Code { .. } | ContentBlock::Image { .. } => block.clone(),
        })
    }

    /// Stops at the first failed call; a partial translation is never kept.
    async fn translate_content(&self, article: &Article) -> Result<Vec<ContentBlock>, CallError> {
        let mut blocks = Vec::with_capacity(article.content.len());
        for block in &article.content {
            blocks.push(self.translate_block(block, &article.url).await?);
        }
        Ok(blocks)
    }
}

impl<T: TextService> Stage for TranslateStage<T> {
    fn name(&self) -> &'static str {
        "translate"
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
            tracing::info!(url = %article.url, blocks = article.content.len(), "Translating article");

            let title = match self.translate_text(&article.title, &article.url).await {
                Ok(title) => Produced::Value(title),
                Err(e) => {
                    let failure = e.to_field_failure();
                    ctx.record(Diagnostic::FieldFailed {
                        stage: self.name(),
                        url: article.url.clone(),
                        field: "translated_title",
                        failure: failure.clone(),
                    });
                    Produced::Failed(failure)
                }
            };
            article.translated_title = Some(title);

            let content = match self.translate_content(&article).await {
                Ok(blocks) => Produced::Value(blocks),
                Err(e) => {
                    let failure = e.to_field_failure();
                    ctx.record(Diagnostic::FieldFailed {
                        stage: self.name(),
                        url: article.url.clone(),
                        field: "translated_content",
                        failure: failure.clone(),
                    });
                    Produced::Failed(failure)
                }
            };
            article.translated_content = Some(content);

            let _ = out.try_push(article);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::models::{ExtractedDocument, FailureKind};
    use crate::testutil::{MockTextService, fast_retry, prompt_payload, sample_article};

    fn upper(prompt: &str) -> Result<String, AppError> {
        Ok(prompt_payload(prompt).to_uppercase())
    }

    fn stage(service: MockTextService, attempts: u32) -> TranslateStage<MockTextService> {
        TranslateStage::new(
            ExternalCaller::new("translator", service, fast_retry(attempts)),
            "Malay",
            "Friendly tone.",
        )
    }

    fn mixed_article() -> Article {
        Article::new(
            "https://a.test/mixed",
            ExtractedDocument {
                title: "Setup guide".into(),
                blocks: vec![
                    ContentBlock::Heading {
                        level: 2,
                        text: "Install".into(),
                    },
                    ContentBlock::Code {
                        text: "cargo install x".into(),
                    },
                    ContentBlock::Image {
                        src: "https://a.test/1.png".into(),
                        alt: "step".into(),
                    },
                    ContentBlock::List {
                        ordered: true,
                        items: vec!["open".into(), "click".into()],
                    },
                ],
            },
        )
    }

    #[tokio::test]
    async fn preserves_block_order_and_skips_code_and_images() {
        let service = MockTextService::replying(upper);
        let mut ctx = RunContext::new();
        let batch: PipelineBatch = vec![mixed_article()].into_iter().collect();

        let out = stage(service.clone(), 3).run(batch, &mut ctx).await.unwrap();

        let article = &out.as_slice()[0];
        assert_eq!(
            article.translated_title,
            Some(Produced::Value("SETUP GUIDE".into()))
        );
        let blocks = article.translated_content.as_ref().unwrap().value().unwrap();
        assert_eq!(blocks.len(), 4);
        assert_eq!(
            blocks[0],
            ContentBlock::Heading {
                level: 2,
                text: "INSTALL".into()
            }
        );
        assert_eq!(blocks[1], article.content[1]);
        assert_eq!(blocks[2], article.content[2]);
        assert_eq!(
            blocks[3],
            ContentBlock::List {
                ordered: true,
                items: vec!["OPEN".into(), "CLICK".into()]
            }
        );
        // title + heading + 2 list items
        assert_eq!(service.call_count(), 4);
        assert!(ctx.diagnostics.is_empty());
    }

    #[tokio::test]
    async fn exhausted_retries_emit_article_with_sentinel() {
        let service = MockTextService::failing(|| AppError::LlmError {
            message: "overloaded".into(),
            status_code: 503,
            retryable: true,
        });
        let mut ctx = RunContext::new();
        let batch: PipelineBatch = vec![sample_article("https://a.test/1", true)].into_iter().collect();

        let out = stage(service.clone(), 3).run(batch, &mut ctx).await.unwrap();

        assert_eq!(out.len(), 1);
        let article = &out.as_slice()[0];
        let failure = article
            .translated_content
            .as_ref()
            .and_then(Produced::failure)
            .unwrap();
        assert_eq!(failure.kind, FailureKind::Unavailable);
        assert!(article.translated_title.as_ref().unwrap().is_failed());
        // 3 attempts for the title, 3 for the first content payload.
        assert_eq!(service.call_count(), 6);
        assert_eq!(ctx.diagnostics.len(), 2);
    }

    #[tokio::test]
    async fn empty_reply_keeps_original_text() {
        let service = MockTextService::replying(|_| Ok("   ".into()));
        let mut ctx = RunContext::new();
        let batch: PipelineBatch = vec![mixed_article()].into_iter().collect();

        let out = stage(service, 1).run(batch, &mut ctx).await.unwrap();

        let article = &out.as_slice()[0];
        assert_eq!(article.display_title(), "Setup guide");
        assert_eq!(
            article.translated_content.as_ref().unwrap().value(),
            Some(&article.content)
        );
    }

    #[tokio::test]
    async fn title_failure_does_not_block_content() {
        let service = MockTextService::with_responses(vec![Err(AppError::LlmError {
            message: "bad request".into(),
            status_code: 400,
            retryable: false,
        })]);
        let mut ctx = RunContext::new();
        let batch: PipelineBatch = vec![mixed_article()].into_iter().collect();

        let out = stage(service, 3).run(batch, &mut ctx).await.unwrap();

        let article = &out.as_slice()[0];
        assert_eq!(
            article.translated_title.as_ref().and_then(Produced::failure).map(|f| f.kind),
            Some(FailureKind::Rejected)
        );
        assert!(article.translated_content.as_ref().unwrap().value().is_some());
    }

    #[tokio::test]
    async fn prompt_names_language_and_ends_with_text() {
        let service = MockTextService::replying(upper);
        let mut ctx = RunContext::new();
        let batch: PipelineBatch = vec![mixed_article()].into_iter().collect();

        stage(service.clone(), 1).run(batch, &mut ctx).await.unwrap();

        let prompt = &service.prompts()[0];
        assert!(prompt.contains("into Malay"));
        assert!(prompt.ends_with("\n\nSetup guide"));
    }
}
