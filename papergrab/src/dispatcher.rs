//! Hands the record list to the runner as a single typed message.
//!
//! The dispatcher owns the immutable input list and delivers it at-most-once
//! per trigger over an in-process channel. Delivery happens only after the
//! page-side agent has signaled readiness; there is no fixed "the page is
//! probably loaded by now" delay anywhere.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::errors::AutomationError;
use crate::records::RecordList;
use crate::runner::Runner;
use crate::Page;

/// The message that starts a run. Serialized shape:
/// `{"action": "startAutomation", "payload": [...]}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action")]
pub enum AutomationMessage {
    #[serde(rename = "startAutomation")]
    StartAutomation { payload: RecordList },
}

/// Holds the record list and delivers it to the runner's channel on trigger.
#[derive(Debug)]
pub struct Dispatcher {
    records: RecordList,
    tx: mpsc::Sender<AutomationMessage>,
}

impl Dispatcher {
    /// `records` must be non-empty; that is the only validation performed.
    pub fn new(
        records: RecordList,
        tx: mpsc::Sender<AutomationMessage>,
    ) -> Result<Self, AutomationError> {
        if records.is_empty() {
            return Err(AutomationError::InvalidArgument(
                "record list is empty".to_string(),
            ));
        }
        Ok(Self { records, tx })
    }

    /// Deliver the record list as one `startAutomation` message.
    ///
    /// Blocks until the page agent reports ready (bounded by
    /// `ready_timeout`), then sends. No retries, no acknowledgement.
    pub async fn trigger(&self, page: &Page, ready_timeout: Duration) -> Result<(), AutomationError> {
        page.wait_ready(ready_timeout).await?;
        info!(records = self.records.len(), "page agent ready, dispatching");
        self.tx
            .send(AutomationMessage::StartAutomation {
                payload: self.records.clone(),
            })
            .await
            .map_err(|_| AutomationError::Internal("runner channel closed".to_string()))
    }
}

/// Message loop: process dispatched runs one at a time until the channel
/// closes. A bounded channel in front of this loop is the single-slot queue
/// for triggers arriving while a run is active.
pub async fn serve(runner: Arc<Runner>, mut rx: mpsc::Receiver<AutomationMessage>) {
    while let Some(msg) = rx.recv().await {
        match msg {
            AutomationMessage::StartAutomation { payload } => match runner.run(payload).await {
                Ok(report) => info!(
                    fetched = report.fetched(),
                    partial = report.partial(),
                    skipped = report.skipped(),
                    "run complete"
                ),
                Err(e) => warn!(error = %e, "run rejected"),
            },
        }
    }
}
