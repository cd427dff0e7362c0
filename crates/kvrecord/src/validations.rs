//! Record validation.
//!
//! Validators are registered on the model type and run by `save` before
//! anything is written. Each one inspects the record and adds messages to
//! a [`ValidationErrors`] collection; a non-empty collection blocks the save.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::record::Record;

pub type Validator = Arc<dyn Fn(&Record, &mut ValidationErrors) + Send + Sync>;

/// Key under which errors that concern the whole record are filed.
pub const BASE: &str = "base";

/// Validation messages grouped by attribute.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    messages: BTreeMap<String, Vec<String>>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, attribute: impl Into<String>, message: impl Into<String>) {
        self.messages
            .entry(attribute.into())
            .or_default()
            .push(message.into());
    }

    pub fn add_base(&mut self, message: impl Into<String>) {
        self.add(BASE, message);
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn len(&self) -> usize {
        self.messages.values().map(Vec::len).sum()
    }

    /// Messages for one attribute.
    pub fn on(&self, attribute: &str) -> &[String] {
        self.messages
            .get(attribute)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Messages prefixed with their attribute name, e.g. `"count must be positive"`.
    pub fn full_messages(&self) -> Vec<String> {
        self.messages
            .iter()
            .flat_map(|(attribute, messages)| {
                messages.iter().map(move |message| {
                    if attribute == BASE {
                        message.clone()
                    } else {
                        format!("{} {}", attribute, message)
                    }
                })
            })
            .collect()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    pub(crate) fn retain_only(&mut self, attribute: &str) {
        self.messages.retain(|name, _| name == attribute);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collects_messages_per_attribute() {
        let mut errors = ValidationErrors::new();
        assert!(errors.is_empty());

        errors.add("count", "must be positive");
        errors.add("count", "must be even");
        errors.add_base("is locked");

        assert_eq!(errors.len(), 3);
        assert_eq!(errors.on("count").len(), 2);
        assert!(errors.on("name").is_empty());
        assert_eq!(
            errors.full_messages(),
            vec!["is locked", "count must be positive", "count must be even"]
        );

        errors.clear();
        assert!(errors.is_empty());
    }

    #[test]
    fn retain_only_keeps_one_attribute() {
        let mut errors = ValidationErrors::new();
        errors.add("count", "bad");
        errors.add("name", "bad");
        errors.retain_only("name");
        assert_eq!(errors.full_messages(), vec!["name bad"]);
    }
}
