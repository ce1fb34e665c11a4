//! Automated search-and-fetch for a publications portal
//!
//! This crate drives a portal's search UI through a small capability
//! interface: fill the query box, submit, wait for results to render, open
//! the first result and activate its artifact link. It works sequentially,
//! for every title of every input record. Waiting is always bounded polling;
//! a missing or slow element skips the current title and the batch keeps
//! going.
//!
//! The production engine talks to a page-side agent over a local WebSocket
//! bridge ([`bridge`]); the workflow itself ([`runner`]) only ever sees the
//! [`engine::DomEngine`] trait, so it runs unchanged against an in-memory
//! fake page in tests.

use std::sync::Arc;
use std::time::Duration;

pub mod bridge;
pub mod dispatcher;
pub mod element;
pub mod engine;
pub mod errors;
pub mod locator;
pub mod records;
pub mod runner;
pub mod selector;
#[cfg(test)]
mod tests;
pub mod wait;

pub use dispatcher::{AutomationMessage, Dispatcher};
pub use element::{DomElement, ElementImpl};
pub use engine::DomEngine;
pub use errors::AutomationError;
pub use locator::Locator;
pub use records::{Record, RecordList};
pub use runner::{PortalSelectors, RunReport, Runner, RunnerConfig, TitleOutcome, TitleResult};
pub use selector::Selector;
pub use wait::{AbortHandle, WaitConfig, WaitOutcome};

/// The main entry point: a handle to the portal page behind some engine.
pub struct Page {
    engine: Arc<dyn DomEngine>,
}

impl Page {
    pub fn new(engine: Arc<dyn DomEngine>) -> Self {
        Self { engine }
    }

    /// Page served by the WebSocket bridge on the default local address.
    pub async fn over_bridge() -> Result<Self, AutomationError> {
        let bridge = bridge::PortalBridge::global().await?;
        Ok(Self::new(Arc::new(bridge::BridgeEngine::new(bridge))))
    }

    /// Build a locator for `selector`.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # async fn demo(page: papergrab::Page) {
    /// let _input = page.locator("#qs").try_now().await;
    /// # }
    /// ```
    pub fn locator(&self, selector: impl Into<Selector>) -> Locator {
        Locator::new(self.engine.clone(), selector.into())
    }

    /// Single immediate lookup, unscoped.
    pub async fn find(&self, selector: &Selector) -> Result<DomElement, AutomationError> {
        self.engine.find_element(selector, None).await
    }

    /// Resolves once the page-side agent is ready to receive commands.
    pub async fn wait_ready(&self, timeout: Duration) -> Result<(), AutomationError> {
        self.engine.wait_ready(timeout).await
    }
}

impl Clone for Page {
    fn clone(&self) -> Self {
        Self {
            engine: self.engine.clone(),
        }
    }
}
