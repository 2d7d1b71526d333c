//! Run orchestrator.
//!
//! Drives one account through discovery, bounded-concurrency processing of
//! its calls, reduction of the document's records, synthesis, and the
//! in-place rewrite of the brief section. Individual call failures are
//! recorded and tolerated; discovery and finalize failures end the run.

mod report;
mod state;

pub use report::{ItemOutcome, ItemReport, RunReport};
pub use state::{Stage, StageTracker};

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, warn};

use callbrief_config::Config;
use callbrief_gateway_api::document::{BRIEF_SECTION, count_sections, render_record};
use callbrief_gateway_api::{
    GatewayError, SearchGateway, StorageLocation, StoreGateway, SynthesisGateway,
    SynthesisResult, WorkItem,
};
use callbrief_utils::logging::{item_span, new_run_id, run_span};

use crate::brief::render_brief;
use crate::discovery::{Discovered, Discovery, DiscoveryLimits};
use crate::error::RunError;
use crate::processor::{ItemProcessor, ProcessOutcome};
use crate::reduction::{Reduced, reduce};
use crate::retry::{RetryPolicy, with_timeout};

/// Knobs for a single run, usually taken from the effective configuration.
#[derive(Debug, Clone)]
pub struct RunSettings {
    /// Upper bound on calls processed at the same time
    pub concurrency: usize,
    pub call_timeout: Duration,
    /// Calls that must end up summarized (new or existing) for the run to
    /// continue past processing
    pub min_summarized: usize,
    /// Keep the existing brief when no new call was appended
    pub skip_unchanged: bool,
    pub retry: RetryPolicy,
    pub discovery: DiscoveryLimits,
}

impl RunSettings {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            concurrency: config.concurrency(),
            call_timeout: config.call_timeout(),
            min_summarized: config.min_summarized(),
            skip_unchanged: config.skip_unchanged(),
            retry: RetryPolicy::from_config(config),
            discovery: DiscoveryLimits::from_config(config),
        }
    }
}

pub struct Orchestrator {
    search: Arc<dyn SearchGateway>,
    synthesis: Arc<dyn SynthesisGateway>,
    store: Arc<dyn StoreGateway>,
    settings: RunSettings,
}

impl Orchestrator {
    pub fn new(
        search: Arc<dyn SearchGateway>,
        synthesis: Arc<dyn SynthesisGateway>,
        store: Arc<dyn StoreGateway>,
        settings: RunSettings,
    ) -> Self {
        Self {
            search,
            synthesis,
            store,
            settings,
        }
    }

    #[must_use]
    pub fn settings(&self) -> &RunSettings {
        &self.settings
    }

    /// Refresh the brief for `account`.
    ///
    /// # Errors
    ///
    /// See [`RunError`]; the error's stage is where the run stopped.
    pub async fn run(
        &self,
        account: &str,
        cancel: CancellationToken,
    ) -> Result<RunReport, RunError> {
        self.run_at(account, Utc::now(), cancel).await
    }

    /// [`Orchestrator::run`] with an explicit clock reading, which anchors
    /// the search windows and the brief's date.
    ///
    /// # Errors
    ///
    /// See [`RunError`].
    pub async fn run_at(
        &self,
        account: &str,
        now: DateTime<Utc>,
        cancel: CancellationToken,
    ) -> Result<RunReport, RunError> {
        let run_id = new_run_id();
        let span = run_span(&run_id, account);
        async {
            let mut tracker = StageTracker::default();
            let result = self.drive(&mut tracker, &run_id, account, now, &cancel).await;
            match &result {
                Ok(report) => info!(
                    summarized = report.summarized(),
                    already_present = report.already_present(),
                    skipped = report.skipped(),
                    unresolved = report.unresolved(),
                    reduced = report.reduced,
                    "Run complete"
                ),
                Err(err) => {
                    tracker.fail();
                    error!(stage = %err.stage(), error = %err, "Run failed");
                }
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn drive(
        &self,
        tracker: &mut StageTracker,
        run_id: &str,
        account: &str,
        now: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<RunReport, RunError> {
        let discovery = Discovery::new(
            self.search.clone(),
            self.synthesis.clone(),
            self.store.clone(),
            self.settings.retry,
            self.settings.discovery.clone(),
        );
        let found = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                return Err(RunError::Cancelled { stage: Stage::Discovering });
            }
            found = discovery.discover(account, now) => found?,
        };

        tracker.advance(Stage::Processing)?;
        let items = self.process_all(&found, cancel).await;
        if cancel.is_cancelled() {
            return Err(RunError::Cancelled {
                stage: Stage::Processing,
            });
        }

        let summarized = items.iter().filter(|i| i.outcome.has_summary()).count();
        if summarized < self.settings.min_summarized {
            return Err(RunError::NothingSummarized {
                required: self.settings.min_summarized,
                summarized,
            });
        }

        let mut report = RunReport {
            run_id: run_id.to_string(),
            account: account.to_string(),
            location: found.location.clone(),
            total_matches: found.total_matches,
            items,
            reduced: 0,
            malformed: 0,
            synthesis: None,
            stages: Vec::new(),
        };

        if report.summarized() == 0 && self.settings.skip_unchanged && self.has_brief(&found.location).await {
            info!("No new calls, keeping the existing brief");
            tracker.advance(Stage::Done)?;
            report.stages = tracker.history().to_vec();
            return Ok(report);
        }

        let (reduced, synthesis) = self
            .finalize(tracker, account, &found.location, now, cancel)
            .await?;
        tracker.advance(Stage::Done)?;

        report.reduced = reduced.summaries.len();
        report.malformed = reduced.malformed;
        report.synthesis = Some(synthesis);
        report.stages = tracker.history().to_vec();
        Ok(report)
    }

    /// Process every discovered call, at most `concurrency` at a time.
    /// Always returns one report per call, in discovery order.
    async fn process_all(&self, found: &Discovered, cancel: &CancellationToken) -> Vec<ItemReport> {
        let semaphore = Arc::new(Semaphore::new(self.settings.concurrency.max(1)));
        let processor = ItemProcessor::new(
            self.search.clone(),
            self.synthesis.clone(),
            self.store.clone(),
            self.settings.call_timeout,
        );

        let mut tasks = JoinSet::new();
        for (index, item) in found.items.iter().cloned().enumerate() {
            let semaphore = semaphore.clone();
            let processor = processor.clone();
            let location = found.location.clone();
            let cancel = cancel.clone();
            let retry = self.settings.retry;
            let span = item_span(&item.id);

            tasks.spawn(
                async move {
                    let outcome = tokio::select! {
                        biased;
                        () = cancel.cancelled() => ItemOutcome::Cancelled,
                        outcome = process_one(&semaphore, &processor, retry, &item, &location) => outcome,
                    };
                    (index, report_for(&item, outcome))
                }
                .instrument(span),
            );
        }

        let mut slots: Vec<Option<ItemReport>> = vec![None; found.items.len()];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, report)) => {
                    if let Some(slot) = slots.get_mut(index) {
                        *slot = Some(report);
                    }
                }
                Err(err) => warn!(error = %err, "Call task did not complete"),
            }
        }

        slots
            .into_iter()
            .zip(&found.items)
            .map(|(slot, item)| {
                slot.unwrap_or_else(|| {
                    report_for(
                        item,
                        ItemOutcome::Unresolved {
                            error: "processing task aborted".to_string(),
                        },
                    )
                })
            })
            .collect()
    }

    async fn has_brief(&self, location: &StorageLocation) -> bool {
        match with_timeout("read", self.settings.call_timeout, self.store.read(location)).await {
            Ok(doc) => count_sections(&doc, BRIEF_SECTION) > 0,
            Err(err) => {
                debug!(error = %err, "Could not check for an existing brief");
                false
            }
        }
    }

    /// Reduce, synthesize and write, retrying the whole sequence on
    /// transient failures.
    async fn finalize(
        &self,
        tracker: &mut StageTracker,
        account: &str,
        location: &StorageLocation,
        now: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<(Reduced, SynthesisResult), RunError> {
        let retry = self.settings.retry;
        let max_attempts = retry.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.finalize_once(tracker, account, location, now, cancel).await {
                Err(RunError::Finalize { stage, source })
                    if source.is_transient() && attempt < max_attempts =>
                {
                    let delay = retry.delay_after(attempt);
                    warn!(
                        %stage,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %source,
                        "Finalize failed, retrying from reduction"
                    );
                    tokio::select! {
                        () = cancel.cancelled() => return Err(RunError::Cancelled { stage }),
                        () = tokio::time::sleep(delay) => {}
                    }
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    async fn finalize_once(
        &self,
        tracker: &mut StageTracker,
        account: &str,
        location: &StorageLocation,
        now: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<(Reduced, SynthesisResult), RunError> {
        let timeout = self.settings.call_timeout;
        let failed = |stage: Stage| move |source: GatewayError| RunError::Finalize { stage, source };

        if cancel.is_cancelled() {
            return Err(RunError::Cancelled {
                stage: tracker.current(),
            });
        }
        if tracker.current() != Stage::Reducing {
            tracker.advance(Stage::Reducing)?;
        }
        let reduced = reduce(self.store.as_ref(), location, timeout)
            .await
            .map_err(failed(Stage::Reducing))?;
        if reduced.summaries.is_empty() {
            return Err(RunError::NothingSummarized {
                required: self.settings.min_summarized.max(1),
                summarized: 0,
            });
        }

        tracker.advance(Stage::Synthesizing)?;
        let texts: Vec<String> = reduced.summaries.iter().map(render_record).collect();
        let synthesis = with_timeout(
            "synthesize",
            timeout,
            self.synthesis.synthesize(account, &texts, now.date_naive()),
        )
        .await
        .map_err(failed(Stage::Synthesizing))?;

        if cancel.is_cancelled() {
            return Err(RunError::Cancelled {
                stage: Stage::Synthesizing,
            });
        }
        tracker.advance(Stage::Writing)?;
        let body = render_brief(
            &location.account,
            &synthesis,
            reduced.summaries.len(),
            now.date_naive(),
        );
        with_timeout(
            "replace_section",
            timeout,
            self.store.replace_section(location, BRIEF_SECTION, &body),
        )
        .await
        .map_err(failed(Stage::Writing))?;

        info!(records = reduced.summaries.len(), "Brief written");
        Ok((reduced, synthesis))
    }
}

async fn process_one(
    semaphore: &Semaphore,
    processor: &ItemProcessor,
    retry: RetryPolicy,
    item: &WorkItem,
    location: &StorageLocation,
) -> ItemOutcome {
    let Ok(_permit) = semaphore.acquire().await else {
        return ItemOutcome::Cancelled;
    };
    match processor.process_with_retry(item, location, retry).await {
        Ok(ProcessOutcome::Appended) => ItemOutcome::Summarized,
        Ok(ProcessOutcome::AlreadyPresent) => ItemOutcome::AlreadyPresent,
        Ok(ProcessOutcome::NoContent) => ItemOutcome::Skipped,
        Err(err) => {
            warn!(error = %err, "Giving up on call");
            ItemOutcome::Unresolved {
                error: err.to_string(),
            }
        }
    }
}

fn report_for(item: &WorkItem, outcome: ItemOutcome) -> ItemReport {
    ItemReport {
        item_id: item.id.clone(),
        title: item.title.clone(),
        outcome,
    }
}
