use serde::{Deserialize, Serialize};

/// Represents ways to locate an element on the portal page
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum Selector {
    /// Select by element id
    Id(String),
    /// Select by a single structural class
    ClassName(String),
    /// Select by a class combination (all must be present)
    Classes(Vec<String>),
    /// Select by exact accessible label
    Label(String),
    /// Select by class combination plus a partial accessible-label match
    LabelContains {
        classes: Vec<String>,
        fragment: String,
    },
    /// Chain multiple selectors, each scoped to the previous match
    Chain(Vec<Selector>),
    /// Represents an invalid selector string, with a reason.
    Invalid(String),
}

impl std::fmt::Display for Selector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

fn parse_classes(s: &str) -> Vec<String> {
    let stripped = s
        .strip_prefix("classes:")
        .or_else(|| s.strip_prefix("class:"))
        .unwrap_or(s);
    stripped.split_whitespace().map(str::to_string).collect()
}

impl From<&str> for Selector {
    fn from(s: &str) -> Self {
        let s = s.trim();

        // Handle chained selectors first
        let parts: Vec<&str> = s.split(">>").map(|p| p.trim()).collect();
        if parts.len() > 1 {
            return Selector::Chain(parts.into_iter().map(Selector::from).collect());
        }

        // Class selector refined by a partial accessible label, e.g.
        // "class:link-button accessbar-utility-link+label*:View PDF"
        if let Some((class_part, label_part)) = s.split_once("+label*:") {
            let classes = parse_classes(class_part);
            if classes.is_empty() {
                return Selector::Invalid(format!(
                    "partial-label selector needs at least one class: \"{s}\""
                ));
            }
            return Selector::LabelContains {
                classes,
                fragment: label_part.trim().to_string(),
            };
        }

        match s {
            _ if s.starts_with('#') => Selector::Id(s[1..].to_string()),
            _ if s.starts_with("id:") => Selector::Id(s[3..].to_string()),
            _ if s.starts_with("label:") => Selector::Label(s[6..].to_string()),
            _ if s.starts_with("classes:") || s.starts_with("class:") => {
                let classes = parse_classes(s);
                match classes.len() {
                    0 => Selector::Invalid(format!("empty class selector: \"{s}\"")),
                    1 => Selector::ClassName(classes.into_iter().next().unwrap_or_default()),
                    _ => Selector::Classes(classes),
                }
            }
            _ => Selector::Invalid(format!(
                "Unknown selector format: \"{s}\". Use prefixes like '#id', 'id:', 'class:', 'classes:', 'label:', or a '+label*:' refinement."
            )),
        }
    }
}

impl From<String> for Selector {
    fn from(s: String) -> Self {
        Selector::from(s.as_str())
    }
}
