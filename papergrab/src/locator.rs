use tracing::{debug, instrument};

use crate::element::DomElement;
use crate::engine::DomEngine;
use crate::errors::AutomationError;
use crate::selector::Selector;
use crate::wait::{await_condition, AbortHandle, WaitConfig, WaitOutcome};
use std::sync::Arc;

/// A high-level API for finding elements on the portal page
///
/// A locator binds a selector to an engine plus a polling policy. `try_now`
/// is a single probe; `wait` polls until the element appears or the attempt
/// cap runs out.
#[derive(Clone)]
pub struct Locator {
    engine: Arc<dyn DomEngine>,
    selector: Selector,
    wait: WaitConfig,
    root: Option<DomElement>,
}

impl Locator {
    pub(crate) fn new(engine: Arc<dyn DomEngine>, selector: Selector) -> Self {
        Self {
            engine,
            selector,
            wait: WaitConfig::default(),
            root: None,
        }
    }

    /// Set the polling policy for waiting operations on this locator instance.
    pub fn with_wait(mut self, wait: WaitConfig) -> Self {
        self.wait = wait;
        self
    }

    /// Scope this locator to the subtree of `element`
    pub fn within(mut self, element: DomElement) -> Self {
        self.root = Some(element);
        self
    }

    /// Probe for the element exactly once, without waiting.
    pub async fn try_now(&self) -> Result<DomElement, AutomationError> {
        self.engine
            .find_element(&self.selector, self.root.as_ref())
            .await
    }

    /// Poll for the element until it appears, the attempt cap is exhausted,
    /// or `abort` fires. Exhaustion is a [`WaitOutcome::TimedOut`], never an
    /// error: callers decide whether a missing element is fatal.
    #[instrument(level = "debug", skip(self, abort))]
    pub async fn wait(&self, abort: &AbortHandle) -> WaitOutcome<DomElement> {
        debug!(selector = %self.selector, "waiting for element");
        let engine = self.engine.clone();
        let selector = self.selector.clone();
        let root = self.root.clone();

        await_condition(&self.wait, abort, move || {
            let engine = engine.clone();
            let selector = selector.clone();
            let root = root.clone();
            async move { engine.find_element(&selector, root.as_ref()).await.ok() }
        })
        .await
    }

    pub fn selector_string(&self) -> String {
        format!("{:?}", self.selector)
    }
}

impl std::fmt::Debug for Locator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Locator")
            .field("selector", &self.selector)
            .field("wait", &self.wait)
            .field("root", &self.root.as_ref().map(|r| r.handle()))
            .finish()
    }
}
