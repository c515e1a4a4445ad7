use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::CoreError;

/// A context the backend can be asked to reason within.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeBase {
    /// Stable identifier sent to the backend as `kb_label`.
    pub label: String,
    /// UI only.
    pub display_name: String,
    pub description: String,
    pub external_link: Option<String>,
}

impl KnowledgeBase {
    pub fn new(label: &str, display_name: &str, description: &str) -> Self {
        Self {
            label: label.to_string(),
            display_name: display_name.to_string(),
            description: description.to_string(),
            external_link: None,
        }
    }

    pub fn with_link(mut self, link: &str) -> Self {
        self.external_link = Some(link.to_string());
        self
    }
}

/// Registry of available knowledge bases plus the active one.
#[derive(Debug, Clone)]
pub struct KnowledgeBaseCatalog {
    entries: Vec<KnowledgeBase>,
    active: usize,
}

impl KnowledgeBaseCatalog {
    /// Build a catalog from `entries`; the first entry starts active.
    ///
    /// Returns `None` for an empty list, since exactly one entry must always be active.
    pub fn new(entries: Vec<KnowledgeBase>) -> Option<Self> {
        if entries.is_empty() {
            return None;
        }
        Some(Self { entries, active: 0 })
    }

    pub fn list(&self) -> &[KnowledgeBase] {
        &self.entries
    }

    pub fn active(&self) -> &KnowledgeBase {
        &self.entries[self.active]
    }

    pub fn active_index(&self) -> usize {
        self.active
    }

    pub fn get(&self, label: &str) -> Option<&KnowledgeBase> {
        self.entries.iter().find(|kb| kb.label == label)
    }

    pub fn select(&mut self, label: &str) -> Result<(), CoreError> {
        let idx = self
            .entries
            .iter()
            .position(|kb| kb.label == label)
            .ok_or_else(|| CoreError::UnknownKnowledgeBase(label.to_string()))?;
        debug!(label, "knowledge base selected");
        self.active = idx;
        Ok(())
    }
}

impl Default for KnowledgeBaseCatalog {
    fn default() -> Self {
        Self {
            entries: vec![
                KnowledgeBase::new(
                    "lm_theory",
                    "LM Theory",
                    "Definitions, lemmas and results about language models. \
                     This is the only knowledge base currently backed by the reasoning service.",
                )
                .with_link("https://github.com/proofchat/lm-theory-kb"),
                KnowledgeBase::new(
                    "number_theory",
                    "Number Theory",
                    "Not implemented yet: requests are accepted but no number theory context is available.",
                ),
                KnowledgeBase::new(
                    "geometry",
                    "Geometry",
                    "Not implemented yet: requests are accepted but no geometry context is available.",
                ),
            ],
            active: 0,
        }
    }
}
