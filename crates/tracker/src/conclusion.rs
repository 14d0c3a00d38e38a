//! Conclusion text extraction.
//!
//! Projects store the post-incident conclusion in different places: a
//! custom rich-text field, or the resolution description. Rules are tried
//! in order and the first non-blank value wins.

use serde_json::Value;

use crate::adf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConclusionRule {
    /// A custom field id such as `customfield_10045`.
    CustomField(String),
    /// `fields.resolution.description`.
    ResolutionDescription,
}

impl ConclusionRule {
    fn extract(&self, fields: &Value) -> Option<String> {
        let raw = match self {
            ConclusionRule::CustomField(id) => fields.get(id)?,
            ConclusionRule::ResolutionDescription => fields.pointer("/resolution/description")?,
        };
        let text = adf::to_plain_text(raw);
        let trimmed = text.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConclusionChain {
    rules: Vec<ConclusionRule>,
}

impl ConclusionChain {
    /// Configured custom fields in order, then the resolution description.
    pub fn from_fields(custom_fields: &[String]) -> Self {
        let mut rules: Vec<ConclusionRule> = custom_fields
            .iter()
            .map(|f| f.trim())
            .filter(|f| !f.is_empty())
            .map(|f| ConclusionRule::CustomField(f.to_string()))
            .collect();
        rules.push(ConclusionRule::ResolutionDescription);
        Self { rules }
    }

    /// Custom field ids the search request must ask for.
    pub fn requested_fields(&self) -> impl Iterator<Item = &str> {
        self.rules.iter().filter_map(|r| match r {
            ConclusionRule::CustomField(id) => Some(id.as_str()),
            ConclusionRule::ResolutionDescription => None,
        })
    }

    /// First non-blank value, or an empty string.
    pub fn extract(&self, fields: &Value) -> String {
        self.rules
            .iter()
            .find_map(|rule| rule.extract(fields))
            .unwrap_or_default()
    }
}

impl Default for ConclusionChain {
    fn default() -> Self {
        Self::from_fields(&[])
    }
}
