//! Checks that the public trait surface is enough to drive the workflow
//! with a custom engine, and that the dispatch message keeps its wire shape.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use papergrab::{
    AutomationError, AutomationMessage, DomElement, DomEngine, ElementImpl, Page, Record, Runner,
    RunnerConfig, Selector,
};

/// Minimal engine: every configured element exists from the start.
struct StaticPage {
    elements: HashMap<Selector, String>,
    clicks: Arc<Mutex<Vec<String>>>,
}

impl StaticPage {
    fn new(selectors: &[(&str, &str)]) -> Self {
        Self {
            elements: selectors
                .iter()
                .map(|(sel, handle)| (Selector::from(*sel), handle.to_string()))
                .collect(),
            clicks: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

#[derive(Debug)]
struct StaticElement {
    handle: String,
    clicks: Arc<Mutex<Vec<String>>>,
    elements: HashMap<Selector, String>,
}

#[async_trait::async_trait]
impl ElementImpl for StaticElement {
    fn handle(&self) -> String {
        self.handle.clone()
    }

    fn tag(&self) -> String {
        "div".to_string()
    }

    fn label(&self) -> Option<String> {
        None
    }

    async fn set_value(&self, _value: &str) -> Result<(), AutomationError> {
        Ok(())
    }

    async fn click(&self) -> Result<(), AutomationError> {
        self.clicks.lock().unwrap().push(self.handle.clone());
        Ok(())
    }

    async fn find(&self, selector: &Selector) -> Result<DomElement, AutomationError> {
        match self.elements.get(selector) {
            Some(handle) => Ok(DomElement::new(Arc::new(StaticElement {
                handle: handle.clone(),
                clicks: self.clicks.clone(),
                elements: self.elements.clone(),
            }))),
            None => Err(AutomationError::ElementNotFound(selector.to_string())),
        }
    }
}

#[async_trait::async_trait]
impl DomEngine for StaticPage {
    async fn find_element(
        &self,
        selector: &Selector,
        _root: Option<&DomElement>,
    ) -> Result<DomElement, AutomationError> {
        match self.elements.get(selector) {
            Some(handle) => Ok(DomElement::new(Arc::new(StaticElement {
                handle: handle.clone(),
                clicks: self.clicks.clone(),
                elements: self.elements.clone(),
            }))),
            None => Err(AutomationError::ElementNotFound(selector.to_string())),
        }
    }

    async fn wait_ready(&self, _timeout: Duration) -> Result<(), AutomationError> {
        Ok(())
    }
}

#[tokio::test(start_paused = true)]
async fn a_custom_engine_can_drive_the_whole_workflow() {
    let engine = StaticPage::new(&[
        ("#qs", "search-box"),
        ("label:Submit quick search", "submit-btn"),
        ("class:ResultItem", "result-1"),
        ("classes:anchor download-link", "view-pdf"),
        (
            "class:link-button accessbar-utility-link+label*:View PDF",
            "pdf-link",
        ),
    ]);
    let clicks = engine.clicks.clone();

    let runner = Runner::new(Page::new(Arc::new(engine)), RunnerConfig::default()).unwrap();
    let report = runner
        .run(vec![Record::new("X", ["some paper title"], "note")])
        .await
        .unwrap();

    assert_eq!(report.fetched(), 1);
    assert_eq!(
        *clicks.lock().unwrap(),
        vec![
            "submit-btn".to_string(),
            "view-pdf".to_string(),
            "pdf-link".to_string(),
        ]
    );
}

#[test]
fn dispatch_message_parses_the_original_wire_shape() {
    let json = r#"{
        "action": "startAutomation",
        "payload": [
            {"code": "dummy_C_2023", "titles": ["Bilateral Pallidotomy"], "note": "dummy Detection"}
        ]
    }"#;

    let msg: AutomationMessage = serde_json::from_str(json).unwrap();
    let AutomationMessage::StartAutomation { payload } = msg;
    assert_eq!(payload.len(), 1);
    assert_eq!(payload[0].code, "dummy_C_2023");
    assert_eq!(payload[0].titles, vec!["Bilateral Pallidotomy".to_string()]);
}
