//! In-text citations recorded against report claims.

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Citation {
    pub id: String,
    pub paper_id: String,
    pub in_text_ref: String,
    pub claims: Vec<String>,
}

impl Citation {
    pub fn new(id: impl Into<String>, paper_id: impl Into<String>, in_text_ref: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            paper_id: paper_id.into(),
            in_text_ref: in_text_ref.into(),
            claims: Vec::new(),
        }
    }
}
