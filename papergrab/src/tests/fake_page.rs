//! Scripted in-memory page for exercising the workflow without a browser.
//!
//! Elements are installed under the selector that should find them, scoped
//! to a parent handle where the workflow searches within an element. An
//! element can be scripted to "appear" only on its Nth probe, which is how
//! tests model slow asynchronous rendering. Every probe and every action is
//! recorded so tests can assert exact side-effect sequences.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;

use crate::element::{DomElement, ElementImpl};
use crate::engine::DomEngine;
use crate::errors::AutomationError;
use crate::selector::Selector;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    SetValue { handle: String, value: String },
    Click { handle: String },
}

#[derive(Debug, Clone)]
struct Scripted {
    handle: String,
    // 1 = visible from the first probe
    appears_on_probe: u32,
}

type Key = (Option<String>, Selector);

#[derive(Debug, Default)]
struct FakeState {
    dom: HashMap<Key, Scripted>,
    probes: HashMap<Key, u32>,
    actions: Vec<Action>,
}

pub struct FakePage {
    state: Arc<Mutex<FakeState>>,
    ready_tx: watch::Sender<bool>,
    ready_rx: watch::Receiver<bool>,
}

impl FakePage {
    pub fn new() -> Arc<Self> {
        Self::with_ready(true)
    }

    /// A page whose agent has not yet said hello; flip with `set_ready`.
    pub fn not_ready() -> Arc<Self> {
        Self::with_ready(false)
    }

    fn with_ready(ready: bool) -> Arc<Self> {
        let (ready_tx, ready_rx) = watch::channel(ready);
        Arc::new(Self {
            state: Arc::new(Mutex::new(FakeState::default())),
            ready_tx,
            ready_rx,
        })
    }

    pub fn set_ready(&self, ready: bool) {
        let _ = self.ready_tx.send(ready);
    }

    /// Element visible from the first probe on.
    pub fn install(&self, selector: &str, handle: &str) {
        self.install_after(selector, 1, handle);
    }

    /// Element that appears on the `appears_on_probe`-th probe of `selector`.
    pub fn install_after(&self, selector: &str, appears_on_probe: u32, handle: &str) {
        self.state.lock().unwrap().dom.insert(
            (None, Selector::from(selector)),
            Scripted {
                handle: handle.to_string(),
                appears_on_probe,
            },
        );
    }

    /// Element findable only within the subtree of `root_handle`.
    pub fn install_scoped(&self, root_handle: &str, selector: &str, handle: &str) {
        self.state.lock().unwrap().dom.insert(
            (Some(root_handle.to_string()), Selector::from(selector)),
            Scripted {
                handle: handle.to_string(),
                appears_on_probe: 1,
            },
        );
    }

    /// How many times `selector` was probed (unscoped).
    pub fn probes(&self, selector: &str) -> u32 {
        self.probes_scoped(None, selector)
    }

    pub fn probes_scoped(&self, root_handle: Option<&str>, selector: &str) -> u32 {
        let key = (root_handle.map(str::to_string), Selector::from(selector));
        *self.state.lock().unwrap().probes.get(&key).unwrap_or(&0)
    }

    pub fn actions(&self) -> Vec<Action> {
        self.state.lock().unwrap().actions.clone()
    }
}

fn lookup(
    state: &Arc<Mutex<FakeState>>,
    selector: &Selector,
    root: Option<String>,
) -> Result<DomElement, AutomationError> {
    if let Selector::Invalid(reason) = selector {
        return Err(AutomationError::InvalidSelector(reason.clone()));
    }
    let key = (root, selector.clone());
    let mut st = state.lock().unwrap();
    let count = {
        let entry = st.probes.entry(key.clone()).or_insert(0);
        *entry += 1;
        *entry
    };
    match st.dom.get(&key) {
        Some(s) if count >= s.appears_on_probe => Ok(DomElement::new(Arc::new(FakeElement {
            state: state.clone(),
            handle: s.handle.clone(),
        }))),
        _ => Err(AutomationError::ElementNotFound(selector.to_string())),
    }
}

#[async_trait::async_trait]
impl DomEngine for FakePage {
    async fn find_element(
        &self,
        selector: &Selector,
        root: Option<&DomElement>,
    ) -> Result<DomElement, AutomationError> {
        lookup(&self.state, selector, root.map(|r| r.handle()))
    }

    async fn wait_ready(&self, timeout: Duration) -> Result<(), AutomationError> {
        let mut rx = self.ready_rx.clone();
        tokio::time::timeout(timeout, rx.wait_for(|ready| *ready))
            .await
            .map_err(|_| {
                AutomationError::Timeout(format!("page agent not ready after {timeout:?}"))
            })?
            .map_err(|_| AutomationError::Internal("fake page dropped".to_string()))?;
        Ok(())
    }
}

#[derive(Debug)]
struct FakeElement {
    state: Arc<Mutex<FakeState>>,
    handle: String,
}

#[async_trait::async_trait]
impl ElementImpl for FakeElement {
    fn handle(&self) -> String {
        self.handle.clone()
    }

    fn tag(&self) -> String {
        "div".to_string()
    }

    fn label(&self) -> Option<String> {
        None
    }

    async fn set_value(&self, value: &str) -> Result<(), AutomationError> {
        self.state.lock().unwrap().actions.push(Action::SetValue {
            handle: self.handle.clone(),
            value: value.to_string(),
        });
        Ok(())
    }

    async fn click(&self) -> Result<(), AutomationError> {
        self.state.lock().unwrap().actions.push(Action::Click {
            handle: self.handle.clone(),
        });
        Ok(())
    }

    async fn find(&self, selector: &Selector) -> Result<DomElement, AutomationError> {
        lookup(&self.state, selector, Some(self.handle.clone()))
    }
}
