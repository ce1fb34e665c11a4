use std::fmt::Debug;
use std::sync::Arc;

use tracing::instrument;

use crate::errors::AutomationError;
use crate::selector::Selector;

/// The capability surface a page element must provide.
///
/// Implemented by the bridge for live pages and by fakes in tests; the
/// workflow code only ever talks to this trait.
#[async_trait::async_trait]
pub trait ElementImpl: Send + Sync + Debug {
    /// Stable identifier of the element for logging and scoped lookups
    fn handle(&self) -> String;

    /// Tag or role of the element (e.g. "input", "a")
    fn tag(&self) -> String;

    /// Accessible label, if the element carries one
    fn label(&self) -> Option<String>;

    /// Overwrite the element's value
    async fn set_value(&self, value: &str) -> Result<(), AutomationError>;

    /// Synthesize a user-initiated activation (a click)
    async fn click(&self) -> Result<(), AutomationError>;

    /// Single immediate lookup scoped to this element's subtree
    async fn find(&self, selector: &Selector) -> Result<DomElement, AutomationError>;
}

/// A handle to an element on the portal page
#[derive(Clone)]
pub struct DomElement {
    inner: Arc<dyn ElementImpl>,
}

impl DomElement {
    pub fn new(inner: Arc<dyn ElementImpl>) -> Self {
        Self { inner }
    }

    pub fn handle(&self) -> String {
        self.inner.handle()
    }

    pub fn tag(&self) -> String {
        self.inner.tag()
    }

    pub fn label(&self) -> Option<String> {
        self.inner.label()
    }

    /// Overwrite the element's value (clears any previous content)
    #[instrument(level = "debug", skip(self, value))]
    pub async fn set_value(&self, value: &str) -> Result<(), AutomationError> {
        self.inner.set_value(value).await
    }

    /// Click on this element
    #[instrument(level = "debug", skip(self))]
    pub async fn click(&self) -> Result<(), AutomationError> {
        self.inner.click().await
    }

    /// Find a descendant of this element. Immediate probe, no waiting.
    pub async fn find(&self, selector: &Selector) -> Result<DomElement, AutomationError> {
        self.inner.find(selector).await
    }
}

impl Debug for DomElement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DomElement")
            .field("handle", &self.inner.handle())
            .field("tag", &self.inner.tag())
            .field("label", &self.inner.label())
            .finish()
    }
}
