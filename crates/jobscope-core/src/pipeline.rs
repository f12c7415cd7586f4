//! Discovery → two crawl stages per entity → export.

use std::time::Duration;

use futures::StreamExt;
use scraper::Selector;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::discovery;
use crate::error::AppError;
use crate::export::Exporter;
use crate::extract::PageExtractor;
use crate::pages;
use crate::stage::{CrawlStage, StageKind, StageOutcome, UrlTemplate};
use crate::store::AggregateStore;
use crate::throttle::{PoliteFetcher, Politeness};
use crate::traits::{Fetcher, RowSink};

/// What to do when a row cannot be persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PersistPolicy {
    /// Stop the run and return the error.
    #[default]
    FailFast,
    /// Log the failure and keep exporting later entities.
    BestEffort,
}

/// Everything the orchestrator needs to know about the target site.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub directory_url: String,
    /// Region literal prefixed to every entity name in detail-page URLs.
    pub region: String,
    pub salary_url: String,
    pub trends_url: String,
    pub politeness: Politeness,
    pub fetch_timeout: Duration,
    /// Crawl at most this many discovered entities.
    pub limit: Option<usize>,
    pub persist_policy: PersistPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            directory_url: pages::DIRECTORY_URL.to_string(),
            region: pages::DEFAULT_REGION.to_string(),
            salary_url: pages::SALARY_URL_TEMPLATE.to_string(),
            trends_url: pages::TRENDS_URL_TEMPLATE.to_string(),
            politeness: Politeness::default(),
            fetch_timeout: Duration::from_secs(20),
            limit: None,
            persist_policy: PersistPolicy::default(),
        }
    }
}

impl PipelineConfig {
    /// Check limits and URL templates. Touches neither the network nor the
    /// output.
    pub fn validate(&self) -> Result<(), AppError> {
        self.politeness.validate()?;
        if self.fetch_timeout.is_zero() {
            return Err(AppError::ConfigError("fetch timeout must be non-zero".into()));
        }
        UrlTemplate::new(&self.salary_url, &self.region)?;
        UrlTemplate::new(&self.trends_url, &self.region)?;
        Ok(())
    }
}

/// Counters for a finished run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PipelineSummary {
    pub discovered: usize,
    pub exported: usize,
    /// Entities with no row because neither stage produced data.
    pub skipped: usize,
    pub stage_failures: usize,
    pub persist_failures: usize,
    pub cancelled: bool,
}

/// Events emitted by the pipeline for monitoring/logging.
#[derive(Debug)]
pub enum PipelineEvent<'a> {
    Discovered {
        count: usize,
    },
    DiscoveryEmpty {
        url: &'a str,
    },
    StageFinished {
        entity: &'a str,
        stage: StageKind,
        outcome: &'a StageOutcome,
    },
    RowExported {
        entity: &'a str,
        complete: bool,
    },
    RowSkipped {
        entity: &'a str,
    },
    PersistFailed {
        entity: &'a str,
        error: &'a AppError,
    },
    /// `remaining` is `None` when cancellation arrived before discovery
    /// finished, so the number of entities is unknown.
    Cancelled {
        remaining: Option<usize>,
    },
    Finished {
        summary: &'a PipelineSummary,
    },
}

/// Trait for receiving pipeline events (decoupled logging).
pub trait PipelineReporter: Send + Sync {
    fn report(&self, event: PipelineEvent<'_>) {
        let _ = event;
    }
}

/// Reporter that uses the `tracing` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl PipelineReporter for TracingReporter {
    fn report(&self, event: PipelineEvent<'_>) {
        match event {
            PipelineEvent::Discovered { count } => {
                tracing::info!(%count, "Crawling entities");
            }
            PipelineEvent::DiscoveryEmpty { url } => {
                tracing::warn!(%url, "Directory listed no entities");
            }
            PipelineEvent::StageFinished {
                entity,
                stage,
                outcome,
            } => match outcome {
                StageOutcome::Merged {
                    present, absent, ..
                } => {
                    tracing::debug!(%entity, %stage, %present, %absent, "Stage merged");
                }
                StageOutcome::Failed(error) => {
                    tracing::warn!(%entity, %stage, %error, "Stage skipped");
                }
            },
            PipelineEvent::RowExported { entity, complete } => {
                tracing::info!(%entity, %complete, "Exported");
            }
            PipelineEvent::RowSkipped { entity } => {
                tracing::warn!(%entity, "No data from either stage, row skipped");
            }
            PipelineEvent::PersistFailed { entity, error } => {
                tracing::error!(%entity, %error, "Failed to persist row");
            }
            PipelineEvent::Cancelled {
                remaining: Some(remaining),
            } => {
                tracing::warn!(%remaining, "Cancelled before all entities were crawled");
            }
            PipelineEvent::Cancelled { remaining: None } => {
                tracing::warn!("Cancelled during discovery");
            }
            PipelineEvent::Finished { summary } => {
                tracing::info!(
                    discovered = summary.discovered,
                    exported = summary.exported,
                    skipped = summary.skipped,
                    stage_failures = summary.stage_failures,
                    persist_failures = summary.persist_failures,
                    "Crawl finished"
                );
            }
        }
    }
}

/// Drives discovery, both crawl stages for every entity, and export.
///
/// Entities move through `Discovered → stages pending → Ready`. An
/// entity's record is read only after both of its stage invocations have
/// returned, and rows are written in discovery order.
pub struct Pipeline<F: Fetcher, S: RowSink> {
    fetcher: F,
    directory: Selector,
    salary: CrawlStage<PoliteFetcher<F>>,
    trends: CrawlStage<PoliteFetcher<F>>,
    store: AggregateStore,
    exporter: Exporter<S>,
    config: PipelineConfig,
}

impl<F: Fetcher, S: RowSink> Pipeline<F, S> {
    /// Build a pipeline for the jobui.com page families.
    pub fn new(fetcher: F, sink: S, config: PipelineConfig) -> Result<Self, AppError> {
        Self::with_pages(
            fetcher,
            sink,
            config,
            pages::directory_names()?,
            pages::salary_page()?,
            pages::trends_page()?,
        )
    }

    /// Build a pipeline with custom selectors.
    pub fn with_pages(
        fetcher: F,
        sink: S,
        config: PipelineConfig,
        directory: Selector,
        salary_page: PageExtractor,
        trends_page: PageExtractor,
    ) -> Result<Self, AppError> {
        config.validate()?;

        let stage = |kind, template: &str, page| -> Result<_, AppError> {
            Ok(CrawlStage::new(
                kind,
                UrlTemplate::new(template, &config.region)?,
                page,
                PoliteFetcher::new(fetcher.clone(), config.politeness)
                    .with_timeout(config.fetch_timeout),
            ))
        };
        let salary = stage(StageKind::Salary, &config.salary_url, salary_page)?;
        let trends = stage(StageKind::Trends, &config.trends_url, trends_page)?;

        Ok(Self {
            fetcher,
            directory,
            salary,
            trends,
            store: AggregateStore::new(),
            exporter: Exporter::new(sink),
            config,
        })
    }

    pub fn store(&self) -> &AggregateStore {
        &self.store
    }

    /// Run the whole crawl until done or `cancel` fires.
    ///
    /// Fails on a directory fetch error, on a header write error, and on a
    /// row write error under [`PersistPolicy::FailFast`]. Everything that
    /// goes wrong for a single entity is reported and isolated to it.
    pub async fn run<R: PipelineReporter>(
        &mut self,
        cancel: &CancellationToken,
        reporter: &R,
    ) -> Result<PipelineSummary, AppError> {
        let mut summary = PipelineSummary::default();
        self.exporter.write_header()?;

        let discover = discovery::discover(
            &self.fetcher,
            &self.config.directory_url,
            &self.directory,
        );
        let mut names = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                summary.cancelled = true;
                reporter.report(PipelineEvent::Cancelled { remaining: None });
                reporter.report(PipelineEvent::Finished { summary: &summary });
                return Ok(summary);
            }
            result = discover => match result {
                Ok(names) => names,
                Err(AppError::EmptyResult(_)) => {
                    reporter.report(PipelineEvent::DiscoveryEmpty {
                        url: &self.config.directory_url,
                    });
                    Vec::new()
                }
                Err(e) => return Err(e),
            },
        };
        if let Some(limit) = self.config.limit {
            names.truncate(limit);
        }
        summary.discovered = names.len();
        reporter.report(PipelineEvent::Discovered { count: names.len() });

        let salary = &self.salary;
        let trends = &self.trends;
        let store = &self.store;
        let exporter = &mut self.exporter;
        let policy = self.config.persist_policy;

        // Both stages of an entity are joined before its record is read.
        let ready = futures::stream::iter(names)
            .map(|name| async move {
                let (a, b) = tokio::join!(salary.run(&name, store), trends.run(&name, store));
                (name, a, b)
            })
            .buffered(self.config.politeness.parallelism);
        let mut ready = std::pin::pin!(ready);

        let mut processed = 0;
        loop {
            let next = tokio::select! {
                biased;
                () = cancel.cancelled() => None,
                next = ready.next() => Some(next),
            };
            let Some(next) = next else {
                summary.cancelled = true;
                reporter.report(PipelineEvent::Cancelled {
                    remaining: Some(summary.discovered - processed),
                });
                break;
            };
            let Some((name, salary_outcome, trends_outcome)) = next else {
                break;
            };
            processed += 1;

            for (stage, outcome) in [
                (salary.kind(), &salary_outcome),
                (trends.kind(), &trends_outcome),
            ] {
                if !outcome.is_merged() {
                    summary.stage_failures += 1;
                }
                reporter.report(PipelineEvent::StageFinished {
                    entity: &name,
                    stage,
                    outcome,
                });
            }

            let Some(record) = store.get(&name) else {
                summary.skipped += 1;
                reporter.report(PipelineEvent::RowSkipped { entity: &name });
                continue;
            };

            match exporter.export(&record) {
                Ok(_) => {
                    summary.exported += 1;
                    reporter.report(PipelineEvent::RowExported {
                        entity: &name,
                        complete: record.is_complete(),
                    });
                }
                Err(error) => {
                    summary.persist_failures += 1;
                    reporter.report(PipelineEvent::PersistFailed {
                        entity: &name,
                        error: &error,
                    });
                    if policy == PersistPolicy::FailFast {
                        return Err(error);
                    }
                }
            }
        }

        reporter.report(PipelineEvent::Finished { summary: &summary });
        Ok(summary)
    }
}
