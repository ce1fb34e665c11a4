use serde::{Deserialize, Serialize};

/// One subject to search for: a code, one or more candidate search titles
/// tried in order, and a free-text note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub code: String,
    pub titles: Vec<String>,
    pub note: String,
}

impl Record {
    pub fn new(
        code: impl Into<String>,
        titles: impl IntoIterator<Item = impl Into<String>>,
        note: impl Into<String>,
    ) -> Self {
        Self {
            code: code.into(),
            titles: titles.into_iter().map(Into::into).collect(),
            note: note.into(),
        }
    }
}

/// Ordered list of records; processing order is list order.
pub type RecordList = Vec<Record>;
