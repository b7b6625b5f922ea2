//! The orchestrator: extraction, then every stage in a fixed order.
//!
//! Each stage receives exactly the output of its predecessor. An empty
//! batch still flows through the remaining stages so every run reports the
//! same set of stages. Only a [`StageFailure`] (a store that can't be
//! written) ends a run early; everything else is a per-article diagnostic.

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::config::PipelineConfig;
use crate::error::AppError;
use crate::models::{Article, PipelineBatch};
use crate::retry::{CallStats, ExternalCaller};
use crate::stage::{Diagnostic, Diagnostics, RunContext, Stage, StageFailure, StageKind};
use crate::stages::{
    CleanStage, FinalValidationStage, ImageValidationStage, PersistStage, PublishStage,
    RenderStage, TranslateStage, TutorialGateStage,
};
use crate::throttle::{Throttle, ThrottleConfig};
use crate::traits::{ArticleStore, DocumentExtractor, Fetcher, NullPublisher, Publisher, TextService};

/// Input and output counts for one stage of one run.
#[derive(Debug, Clone, Serialize)]
pub struct StageStats {
    pub name: &'static str,
    pub kind: StageKind,
    pub input: usize,
    pub output: usize,
    #[serde(serialize_with = "serialize_millis")]
    pub elapsed: Duration,
}

fn serialize_millis<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}

/// Everything a finished (or aborted) run produced besides the batch.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub stages: Vec<StageStats>,
    pub diagnostics: Diagnostics,
    pub persisted: usize,
    pub published: usize,
    pub calls: CallStats,
}

impl RunReport {
    pub fn stage(&self, name: &str) -> Option<&StageStats> {
        self.stages.iter().find(|s| s.name == name)
    }

    /// Human-readable run summary, one line per stage.
    pub fn summary(&self) -> String {
        let mut out = format!("Run {}\n", self.run_id);
        for s in &self.stages {
            out.push_str(&format!(
                "  {:<16} {:<9} {:>4} -> {:<4} ({} ms)\n",
                s.name,
                s.kind,
                s.input,
                s.output,
                s.elapsed.as_millis()
            ));
        }
        let dropped = self
            .diagnostics
            .entries()
            .iter()
            .filter(|d| matches!(d, Diagnostic::ArticleDropped { .. } | Diagnostic::DocumentSkipped { .. }))
            .count();
        out.push_str(&format!(
            "  persisted: {}, published: {}, dropped/skipped: {}\n",
            self.persisted, self.published, dropped
        ));
        out.push_str(&format!(
            "  service calls: {} ({} attempts, {} exhausted, {} rejected)",
            self.calls.calls, self.calls.attempts, self.calls.exhausted, self.calls.rejected
        ));
        out
    }
}

/// The run was aborted after a stage failed. The unsaved batch is kept.
#[derive(Debug, Error)]
#[error("run {} aborted: {}", .report.run_id, .source)]
pub struct RunAborted {
    pub source: AppError,
    pub unsaved: PipelineBatch,
    pub report: RunReport,
}

/// Lifecycle events emitted while a run progresses.
#[derive(Debug)]
pub enum PipelineEvent<'a> {
    RunStarted { run_id: Uuid, documents: usize },
    StageFinished(&'a StageStats),
    RunFinished(&'a RunReport),
    RunAborted { stage: &'static str, error: &'a AppError },
}

/// Observer for pipeline progress.
pub trait PipelineReporter: Send + Sync {
    fn report(&self, _event: PipelineEvent<'_>) {}
}

/// Reports lifecycle events through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReporter;

impl PipelineReporter for TracingReporter {
    fn report(&self, event: PipelineEvent<'_>) {
        match event {
            PipelineEvent::RunStarted { run_id, documents } => {
                tracing::info!(%run_id, documents, "Pipeline run started");
            }
            PipelineEvent::StageFinished(stats) => {
                tracing::info!(
                    stage = stats.name,
                    kind = %stats.kind,
                    input = stats.input,
                    output = stats.output,
                    elapsed_ms = %stats.elapsed.as_millis(),
                    "Stage finished"
                );
            }
            PipelineEvent::RunFinished(report) => {
                tracing::info!(
                    run_id = %report.run_id,
                    persisted = report.persisted,
                    published = report.published,
                    diagnostics = report.diagnostics.len(),
                    "Pipeline run finished"
                );
            }
            PipelineEvent::RunAborted { stage, error } => {
                tracing::error!(%stage, %error, "Pipeline run aborted");
            }
        }
    }
}

/// Fetch, extract and push a batch of source documents through all stages.
pub struct Pipeline<F, X, T, S, P = NullPublisher> {
    fetcher: F,
    extractor: X,
    caller: ExternalCaller<T>,
    clean: CleanStage,
    tutorial: Option<TutorialGateStage<T>>,
    images: ImageValidationStage<T>,
    translate: TranslateStage<T>,
    render: RenderStage,
    validate: FinalValidationStage,
    persist: PersistStage<S>,
    publish: Option<PublishStage<P>>,
}

impl<F, X, T, S> Pipeline<F, X, T, S, NullPublisher>
where
    F: Fetcher,
    X: DocumentExtractor,
    T: TextService,
    S: ArticleStore,
{
    /// Build the stage list from `config`. Invalid configuration is fatal.
    ///
    /// Every external text call goes through one [`ExternalCaller`] built
    /// here from `config.retry` and paced by `config.call_interval`.
    pub fn new(
        fetcher: F,
        extractor: X,
        service: T,
        store: S,
        config: &PipelineConfig,
    ) -> Result<Self, AppError> {
        config.validate()?;

        let caller = ExternalCaller::new("text-service", service, config.retry)
            .with_throttle(Throttle::new(ThrottleConfig::new(config.call_interval)));

        let tutorial = config.require_tutorial.then(|| {
            TutorialGateStage::new(caller.clone(), config.decision_excerpt_chars)
        });
        let mut images = ImageValidationStage::new();
        if config.check_image_relevance {
            images = images.with_relevance_check(caller.clone());
        }

        Ok(Self {
            fetcher,
            extractor,
            clean: CleanStage::new(config.min_content_len),
            tutorial,
            images,
            translate: TranslateStage::new(
                caller.clone(),
                config.target_language.clone(),
                config.tone.clone(),
            ),
            render: RenderStage::new(),
            validate: FinalValidationStage::new(),
            persist: PersistStage::new(store, config.merge_policy),
            publish: None,
            caller,
        })
    }
}

impl<F, X, T, S, P> Pipeline<F, X, T, S, P>
where
    F: Fetcher,
    X: DocumentExtractor,
    T: TextService,
    S: ArticleStore,
    P: Publisher,
{
    /// Enable the publish stage after persistence.
    pub fn with_publisher<Q: Publisher>(self, publisher: Q) -> Pipeline<F, X, T, S, Q> {
        Pipeline {
            fetcher: self.fetcher,
            extractor: self.extractor,
            caller: self.caller,
            clean: self.clean,
            tutorial: self.tutorial,
            images: self.images,
            translate: self.translate,
            render: self.render,
            validate: self.validate,
            persist: self.persist,
            publish: Some(PublishStage::new(publisher)),
        }
    }

    /// Names of the stages this pipeline runs, in order.
    pub fn stage_names(&self) -> Vec<&'static str> {
        let mut names = vec!["extract", self.clean.name()];
        if let Some(gate) = &self.tutorial {
            names.push(gate.name());
        }
        names.extend([
            self.images.name(),
            self.translate.name(),
            self.render.name(),
            self.validate.name(),
            self.persist.name(),
        ]);
        if let Some(publish) = &self.publish {
            names.push(publish.name());
        }
        names
    }

    /// Run every stage over the documents at `urls`.
    ///
    /// Per-article problems never fail the run. `Err` means the batch could
    /// not be persisted; it carries the batch so nothing is lost.
    pub async fn run<R: PipelineReporter>(
        &self,
        urls: &[String],
        reporter: &R,
    ) -> Result<RunReport, RunAborted> {
        let started_at = Utc::now();
        let mut ctx = RunContext::new();
        let mut stats = Vec::new();
        reporter.report(PipelineEvent::RunStarted {
            run_id: ctx.run_id,
            documents: urls.len(),
        });

        let started = Instant::now();
        let batch = self.collect(urls, &mut ctx).await;
        push_stats(
            &mut stats,
            reporter,
            StageStats {
                name: "extract",
                kind: StageKind::Source,
                input: urls.len(),
                output: batch.len(),
                elapsed: started.elapsed(),
            },
        );

        match self.run_stages(batch, &mut ctx, &mut stats, reporter).await {
            Ok(_) => {
                let report = self.report(ctx, started_at, stats);
                reporter.report(PipelineEvent::RunFinished(&report));
                Ok(report)
            }
            Err((stage, failure)) => {
                reporter.report(PipelineEvent::RunAborted {
                    stage,
                    error: &failure.error,
                });
                Err(RunAborted {
                    source: failure.error,
                    unsaved: failure.batch,
                    report: self.report(ctx, started_at, stats),
                })
            }
        }
    }

    /// Source step: one article per fetchable, extractable, unique url.
    async fn collect(&self, urls: &[String], ctx: &mut RunContext) -> PipelineBatch {
        let mut batch = PipelineBatch::new();
        for url in urls {
            if batch.contains(url) {
                ctx.record(Diagnostic::DocumentSkipped {
                    url: url.clone(),
                    reason: "duplicate url".into(),
                });
                continue;
            }
            let html = match self.fetcher.fetch(url).await {
                Ok(html) => html,
                Err(e) => {
                    ctx.record(Diagnostic::DocumentSkipped {
                        url: url.clone(),
                        reason: format!("fetch failed: {e}"),
                    });
                    continue;
                }
            };
            match self.extractor.extract(&html, url) {
                Ok(document) => {
                    tracing::debug!(%url, blocks = document.blocks.len(), "Document extracted");
                    let _ = batch.try_push(Article::new(url.clone(), document));
                }
                Err(e) => ctx.record(Diagnostic::DocumentSkipped {
                    url: url.clone(),
                    reason: e.to_string(),
                }),
            }
        }
        batch
    }

    async fn run_stages<R: PipelineReporter>(
        &self,
        mut batch: PipelineBatch,
        ctx: &mut RunContext,
        stats: &mut Vec<StageStats>,
        reporter: &R,
    ) -> Result<PipelineBatch, (&'static str, StageFailure)> {
        batch = step(&self.clean, batch, ctx, stats, reporter).await?;
        if let Some(gate) = &self.tutorial {
            batch = step(gate, batch, ctx, stats, reporter).await?;
        }
        batch = step(&self.images, batch, ctx, stats, reporter).await?;
        batch = step(&self.translate, batch, ctx, stats, reporter).await?;
        batch = step(&self.render, batch, ctx, stats, reporter).await?;
        batch = step(&self.validate, batch, ctx, stats, reporter).await?;
        batch = step(&self.persist, batch, ctx, stats, reporter).await?;
        if let Some(publish) = &self.publish {
            batch = step(publish, batch, ctx, stats, reporter).await?;
        }
        Ok(batch)
    }

    fn report(&self, ctx: RunContext, started_at: DateTime<Utc>, stages: Vec<StageStats>) -> RunReport {
        RunReport {
            run_id: ctx.run_id,
            started_at,
            finished_at: Utc::now(),
            stages,
            published: ctx.diagnostics.published_count(),
            diagnostics: ctx.diagnostics,
            persisted: ctx.persisted,
            calls: self.caller.stats(),
        }
    }
}

async fn step<G: Stage, R: PipelineReporter>(
    stage: &G,
    batch: PipelineBatch,
    ctx: &mut RunContext,
    stats: &mut Vec<StageStats>,
    reporter: &R,
) -> Result<PipelineBatch, (&'static str, StageFailure)> {
    let input = batch.len();
    let started = Instant::now();
    let result = stage.run(batch, ctx).await;
    let output = match &result {
        Ok(batch) => batch.len(),
        Err(_) => 0,
    };
    debug_assert!(
        stage.kind() != StageKind::Filter || output <= input,
        "filter stage {} grew the batch",
        stage.name()
    );
    push_stats(
        stats,
        reporter,
        StageStats {
            name: stage.name(),
            kind: stage.kind(),
            input,
            output,
            elapsed: started.elapsed(),
        },
    );
    result.map_err(|failure| (stage.name(), failure))
}

fn push_stats<R: PipelineReporter>(stats: &mut Vec<StageStats>, reporter: &R, entry: StageStats) {
    reporter.report(PipelineEvent::StageFinished(&entry));
    stats.push(entry);
}
