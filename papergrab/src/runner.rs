//! The sequential search-and-fetch workflow.
//!
//! For every `(record, title)` pair the runner fills the portal's search box,
//! submits the query, waits for results, opens the first result's fetch
//! control and waits for the artifact link. Every step is a precondition
//! check before an action: a missing element or an exhausted wait abandons
//! the current title and moves on. Nothing a single page does can abort the
//! batch.

use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::errors::AutomationError;
use crate::records::{Record, RecordList};
use crate::selector::Selector;
use crate::wait::{AbortHandle, WaitConfig, WaitOutcome};
use crate::Page;

/// The element queries the workflow drives, as selector strings.
///
/// Defaults target the portal the tool was built against; override per
/// deployment when the page structure differs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PortalSelectors {
    /// Query input, by element id
    pub query_input: String,
    /// Submit control, by accessible label
    pub submit_control: String,
    /// One search result, by structural class
    pub result_item: String,
    /// Fetch-artifact control, scoped within the first result
    pub fetch_control: String,
    /// Artifact-access link on the follow-up page
    pub artifact_link: String,
}

impl Default for PortalSelectors {
    fn default() -> Self {
        Self {
            query_input: "#qs".into(),
            submit_control: "label:Submit quick search".into(),
            result_item: "class:ResultItem".into(),
            fetch_control: "classes:anchor download-link".into(),
            artifact_link: "class:link-button accessbar-utility-link+label*:View PDF".into(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    pub wait: WaitConfig,
    pub selectors: PortalSelectors,
}

/// How one `(record, title)` pair ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TitleOutcome {
    /// Full path: results appeared, fetch control clicked, artifact link
    /// appeared and was activated
    ArtifactFetched,
    /// Fetch control clicked but the artifact link never appeared
    ArtifactLinkTimeout,
    /// First result carried no fetch control
    FetchControlMissing,
    /// No result appeared within the wait bound
    ResultsTimeout,
    /// Submit control absent, query never submitted
    SubmitMissing,
    /// Query input absent, no side effects at all
    InputMissing,
    /// The run was aborted before this title was processed
    Aborted,
}

impl TitleOutcome {
    pub fn is_fetched(&self) -> bool {
        matches!(self, TitleOutcome::ArtifactFetched)
    }

    /// The submit happened and a result was opened, but no artifact came out
    pub fn is_partial(&self) -> bool {
        matches!(
            self,
            TitleOutcome::ArtifactLinkTimeout | TitleOutcome::FetchControlMissing
        )
    }

    pub fn is_skipped(&self) -> bool {
        !self.is_fetched() && !self.is_partial()
    }
}

/// Outcome of one title within one record.
#[derive(Debug, Clone, Serialize)]
pub struct TitleResult {
    pub code: String,
    pub title: String,
    pub outcome: TitleOutcome,
}

/// Aggregate result of a run, returned to the caller so the outcome is
/// observable without parsing logs.
#[derive(Debug, Default, Serialize)]
pub struct RunReport {
    pub results: Vec<TitleResult>,
}

impl RunReport {
    fn push(&mut self, record: &Record, title: &str, outcome: TitleOutcome) {
        self.results.push(TitleResult {
            code: record.code.clone(),
            title: title.to_string(),
            outcome,
        });
    }

    pub fn fetched(&self) -> usize {
        self.results.iter().filter(|r| r.outcome.is_fetched()).count()
    }

    pub fn partial(&self) -> usize {
        self.results.iter().filter(|r| r.outcome.is_partial()).count()
    }

    pub fn skipped(&self) -> usize {
        self.results.iter().filter(|r| r.outcome.is_skipped()).count()
    }
}

// Selectors parsed once per runner, so a bad configuration fails at
// construction instead of silently skipping every title.
struct ParsedSelectors {
    query_input: Selector,
    submit_control: Selector,
    result_item: Selector,
    fetch_control: Selector,
    artifact_link: Selector,
}

fn parse_selector(field: &str, s: &str) -> Result<Selector, AutomationError> {
    match Selector::from(s) {
        Selector::Invalid(reason) => Err(AutomationError::InvalidSelector(format!(
            "{field}: {reason}"
        ))),
        selector => Ok(selector),
    }
}

impl ParsedSelectors {
    fn from_config(cfg: &PortalSelectors) -> Result<Self, AutomationError> {
        Ok(Self {
            query_input: parse_selector("query_input", &cfg.query_input)?,
            submit_control: parse_selector("submit_control", &cfg.submit_control)?,
            result_item: parse_selector("result_item", &cfg.result_item)?,
            fetch_control: parse_selector("fetch_control", &cfg.fetch_control)?,
            artifact_link: parse_selector("artifact_link", &cfg.artifact_link)?,
        })
    }
}

/// Executes the search-and-fetch workflow, one title at a time.
pub struct Runner {
    page: Page,
    wait: WaitConfig,
    selectors: ParsedSelectors,
    active: AtomicBool,
    abort: AbortHandle,
}

impl std::fmt::Debug for Runner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runner")
            .field("wait", &self.wait)
            .field("active", &self.active)
            .finish_non_exhaustive()
    }
}

impl Runner {
    pub fn new(page: Page, config: RunnerConfig) -> Result<Self, AutomationError> {
        let selectors = ParsedSelectors::from_config(&config.selectors)?;
        Ok(Self {
            page,
            wait: config.wait,
            selectors,
            active: AtomicBool::new(false),
            abort: AbortHandle::new(),
        })
    }

    /// Handle for stopping a run in flight. The run checks it at each loop
    /// head and at every poll tick.
    pub fn abort_handle(&self) -> AbortHandle {
        self.abort.clone()
    }

    /// Process every `(record, title)` pair in list order.
    ///
    /// At most one run may be active per runner; a second invocation while
    /// one is in flight returns [`AutomationError::RunInProgress`] without
    /// touching the page. Per-title failures never propagate: the returned
    /// report is the only terminal signal.
    #[instrument(skip(self, records), fields(records = records.len()))]
    pub async fn run(&self, records: RecordList) -> Result<RunReport, AutomationError> {
        if self
            .active
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(AutomationError::RunInProgress);
        }
        let report = self.run_inner(&records).await;
        self.active.store(false, Ordering::SeqCst);
        Ok(report)
    }

    async fn run_inner(&self, records: &[Record]) -> RunReport {
        let mut report = RunReport::default();
        for record in records {
            for title in &record.titles {
                let outcome = if self.abort.is_aborted() {
                    TitleOutcome::Aborted
                } else {
                    self.process_title(record, title).await
                };
                report.push(record, title, outcome);
            }
        }
        info!(
            fetched = report.fetched(),
            partial = report.partial(),
            skipped = report.skipped(),
            "finished all searches"
        );
        report
    }

    async fn process_title(&self, record: &Record, title: &str) -> TitleOutcome {
        info!(
            code = %record.code,
            note = %record.note,
            %title,
            "searching"
        );

        // 1. Fill the search input, if available
        let input = match self
            .page
            .locator(self.selectors.query_input.clone())
            .try_now()
            .await
        {
            Ok(el) => el,
            Err(_) => {
                warn!(%title, "could not find the search box");
                return TitleOutcome::InputMissing;
            }
        };
        if let Err(e) = input.set_value(title).await {
            warn!(%title, error = %e, "could not fill the search box");
            return TitleOutcome::InputMissing;
        }

        // 2. Click the submit control
        let submit = match self
            .page
            .locator(self.selectors.submit_control.clone())
            .try_now()
            .await
        {
            Ok(el) => el,
            Err(_) => {
                warn!(%title, "could not find the submit control");
                return TitleOutcome::SubmitMissing;
            }
        };
        if let Err(e) = submit.click().await {
            warn!(%title, error = %e, "could not click the submit control");
            return TitleOutcome::SubmitMissing;
        }
        info!(%title, "query submitted");

        // 3. Wait for results to appear, then take the first one
        let first_result = match self
            .page
            .locator(self.selectors.result_item.clone())
            .with_wait(self.wait)
            .wait(&self.abort)
            .await
        {
            WaitOutcome::Found { value, attempts } => {
                info!(%title, attempts, "results appeared");
                value
            }
            WaitOutcome::TimedOut { .. } => {
                warn!(%title, "no search results for this query");
                return TitleOutcome::ResultsTimeout;
            }
            WaitOutcome::Aborted { .. } => return TitleOutcome::Aborted,
        };

        // 4. Activate the fetch control within the first result, if present
        match first_result.find(&self.selectors.fetch_control).await {
            Ok(fetch) => {
                if let Err(e) = fetch.click().await {
                    warn!(%title, error = %e, "could not click the fetch control");
                    return TitleOutcome::FetchControlMissing;
                }
                info!(%title, "fetch control clicked");
                self.await_artifact_link(title).await
            }
            Err(_) => {
                warn!(%title, "fetch control not found in the first result");
                TitleOutcome::FetchControlMissing
            }
        }
    }

    // 5. Wait for the artifact link on the follow-up page and activate it
    async fn await_artifact_link(&self, title: &str) -> TitleOutcome {
        match self
            .page
            .locator(self.selectors.artifact_link.clone())
            .with_wait(self.wait)
            .wait(&self.abort)
            .await
        {
            WaitOutcome::Found { value: link, .. } => {
                if let Err(e) = link.click().await {
                    warn!(%title, error = %e, "artifact link found but could not be activated");
                    return TitleOutcome::ArtifactLinkTimeout;
                }
                info!(%title, "artifact link activated");
                TitleOutcome::ArtifactFetched
            }
            WaitOutcome::TimedOut { .. } => {
                warn!(%title, "artifact link not found after waiting");
                TitleOutcome::ArtifactLinkTimeout
            }
            WaitOutcome::Aborted { .. } => TitleOutcome::Aborted,
        }
    }
}
