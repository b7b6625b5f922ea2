use crate::models::{Article, PipelineBatch};
use crate::retry::ExternalCaller;
use crate::stage::{Diagnostic, RunContext, Stage, StageFailure, StageKind, Uncertain};
use crate::stages::{excerpt, parse_verdict};
use crate::traits::TextService;

/// Keeps only articles the decision service marks as structured tutorials.
///
/// When the service is unreachable or answers neither YES nor NO, the
/// article is kept unless [`TutorialGateStage::on_uncertain`] says otherwise.
#[derive(Clone)]
pub struct TutorialGateStage<T> {
    caller: ExternalCaller<T>,
    excerpt_chars: usize,
    on_uncertain: Uncertain,
}

impl<T: TextService> TutorialGateStage<T> {
    pub fn new(caller: ExternalCaller<T>, excerpt_chars: usize) -> Self {
        Self {
            caller,
            excerpt_chars,
            on_uncertain: Uncertain::Keep,
        }
    }

    /// Override the outcome for articles the service can't decide on.
    pub fn on_uncertain(mut self, policy: Uncertain) -> Self {
        self.on_uncertain = policy;
        self
    }

    fn prompt(&self, article: &Article) -> String {
        format!(
            "You review web articles before they are translated and republished.\n\
             Answer with a single word, YES or NO: is the following article a structured, \
             step-by-step tutorial or guide?\n\n\
             Title: {}\n\n{}",
            article.title,
            excerpt(&article.content, self.excerpt_chars)
        )
    }
}

impl<T: TextService> Stage for TutorialGateStage<T> {
    fn name(&self) -> &'static str {
        "tutorial-gate"
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
            let reason = match self.caller.call(&self.prompt(&article)).await {
                Ok(reply) => match parse_verdict(&reply) {
                    Some(true) => {
                        let _ = kept.try_push(article);
                        continue;
                    }
                    Some(false) => {
                        ctx.record(Diagnostic::ArticleDropped {
                            stage: self.name(),
                            url: article.url,
                            reason: "not a structured tutorial".into(),
                        });
                        continue;
                    }
                    None => format!("unclear decision: {:?}", reply.trim()),
                },
                Err(e) => e.to_string(),
            };

            match self.on_uncertain {
                Uncertain::Keep => {
                    ctx.record(Diagnostic::KeptOnUncertainty {
                        stage: self.name(),
                        url: article.url.clone(),
                        reason,
                    });
                    let _ = kept.try_push(article);
                }
                Uncertain::Drop => ctx.record(Diagnostic::ArticleDropped {
                    stage: self.name(),
                    url: article.url,
                    reason,
                }),
            }
        }
        Ok(kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::retry::RetryPolicy;
    use crate::testutil::{MockTextService, fast_retry, sample_article};

    fn batch() -> PipelineBatch {
        vec![
            sample_article("https://a.test/1", true),
            sample_article("https://a.test/2", true),
            sample_article("https://a.test/3", true),
        ]
        .into_iter()
        .collect()
    }

    #[tokio::test]
    async fn keeps_yes_drops_no() {
        let service = MockTextService::with_responses(vec![
            Ok("YES".into()),
            Ok("NO".into()),
            Ok("yes".into()),
        ]);
        let stage = TutorialGateStage::new(ExternalCaller::new("decision", service, fast_retry(3)), 500);
        let mut ctx = RunContext::new();

        let out = stage.run(batch(), &mut ctx).await.unwrap();

        assert_eq!(out.urls(), vec!["https://a.test/1", "https://a.test/3"]);
    }

    #[tokio::test]
    async fn unreachable_service_keeps_article() {
        let service = MockTextService::failing(|| AppError::Timeout(30));
        let stage = TutorialGateStage::new(
            ExternalCaller::new("decision", service.clone(), fast_retry(2)),
            500,
        );
        let mut ctx = RunContext::new();

        let out = stage.run(batch(), &mut ctx).await.unwrap();

        assert_eq!(out.len(), 3);
        assert_eq!(service.call_count(), 6);
        assert!(ctx
            .diagnostics
            .entries()
            .iter()
            .all(|d| matches!(d, Diagnostic::KeptOnUncertainty { .. })));
    }

    #[tokio::test]
    async fn strict_gate_drops_on_failure() {
        let service = MockTextService::failing(|| AppError::Timeout(30));
        let stage = TutorialGateStage::new(ExternalCaller::new("decision", service, fast_retry(1)), 500)
            .on_uncertain(Uncertain::Drop);
        let mut ctx = RunContext::new();

        let out = stage.run(batch(), &mut ctx).await.unwrap();

        assert!(out.is_empty());
        assert_eq!(ctx.diagnostics.len(), 3);
    }

    #[tokio::test]
    async fn unclear_reply_keeps_article() {
        let service = MockTextService::with_responses(vec![Ok(String::new())]);
        let stage = TutorialGateStage::new(
            ExternalCaller::new("decision", service, RetryPolicy::default().with_max_attempts(1)),
            500,
        );
        let mut ctx = RunContext::new();
        let single: PipelineBatch = vec![sample_article("https://a.test/1", true)].into_iter().collect();

        let out = stage.run(single, &mut ctx).await.unwrap();
        assert_eq!(out.len(), 1);
    }

    #[tokio::test]
    async fn prompt_carries_title_and_excerpt() {
        let service = MockTextService::with_responses(vec![Ok("YES".into())]);
        let stage = TutorialGateStage::new(ExternalCaller::new("decision", service.clone(), fast_retry(1)), 500);
        let mut ctx = RunContext::new();
        let single: PipelineBatch = vec![sample_article("https://a.test/1", true)].into_iter().collect();

        stage.run(single, &mut ctx).await.unwrap();

        let prompt = &service.prompts()[0];
        assert!(prompt.contains("YES or NO"));
        assert!(prompt.contains("Title: Article https://a.test/1"));
    }
}
