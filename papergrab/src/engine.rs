use std::time::Duration;

use crate::element::DomElement;
use crate::errors::AutomationError;
use crate::selector::Selector;

/// The common trait every page engine must implement.
///
/// An engine answers single, immediate element probes; all waiting and
/// polling policy lives above it in [`crate::locator::Locator`].
#[async_trait::async_trait]
pub trait DomEngine: Send + Sync {
    /// Look up one element matching `selector`, scoped to `root` when given.
    ///
    /// This is a single probe: it returns `ElementNotFound` immediately when
    /// nothing matches instead of waiting for the element to appear.
    async fn find_element(
        &self,
        selector: &Selector,
        root: Option<&DomElement>,
    ) -> Result<DomElement, AutomationError>;

    /// Resolve once the page-side agent has signaled it is ready to receive
    /// commands, or fail with `Timeout`.
    async fn wait_ready(&self, timeout: Duration) -> Result<(), AutomationError>;
}
