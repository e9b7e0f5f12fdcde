//! Typed event model
//!
//! A test script is a tree of [`Event`]s. Each event is one value carrying
//! its [`EventKind`], the selector attributes that locate its target element,
//! the action attributes that say what to do, and its children. Events are
//! built by the [`EventFactory`] and never change afterwards.

mod factory;
mod kind;
mod node;
mod schema;

pub use factory::{coerce_bool, EventFactory};
pub use kind::{Capabilities, Category, EventKind, HtmlTarget};
pub use node::ScriptNode;
pub use schema::{AttrTable, AttrType, ContentRule, KindSchema, SchemaRegistry};

use std::fmt;

/// A typed attribute value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttrValue {
    Str(String),
    Bool(bool),
}

impl AttrValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::Str(s) => Some(s),
            AttrValue::Bool(_) => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttrValue::Bool(b) => Some(*b),
            AttrValue::Str(_) => None,
        }
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::Str(s) => f.write_str(s),
            AttrValue::Bool(b) => write!(f, "{}", b),
        }
    }
}

/// Attributes in script order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attributes(Vec<(String, AttrValue)>);

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an attribute, keeping the original position on replace
    pub fn insert(&mut self, name: impl Into<String>, value: AttrValue) {
        let name = name.into();
        match self.0.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.0.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&AttrValue> {
        self.0.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(AttrValue::as_str)
    }

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(AttrValue::as_bool)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AttrValue)> {
        self.0.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// One instruction of a test script
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub(crate) kind: EventKind,
    pub(crate) name: String,
    pub(crate) selectors: Attributes,
    pub(crate) actions: Attributes,
    pub(crate) args: Vec<String>,
    pub(crate) text: Option<String>,
    pub(crate) children: Vec<Event>,
}

impl Event {
    pub fn kind(&self) -> EventKind {
        self.kind
    }

    /// Tag name as written in the script, lowercased
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn selectors(&self) -> &Attributes {
        &self.selectors
    }

    pub fn actions(&self) -> &Attributes {
        &self.actions
    }

    /// Positional arguments collected from `arg` children
    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    pub fn children(&self) -> &[Event] {
        &self.children
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    /// Whether a missing or hidden target element is an error.
    ///
    /// Defaults to true; scripts opt out with `required="false"`.
    pub fn required(&self) -> bool {
        self.actions.get_bool("required").unwrap_or(true)
    }

    /// Total number of events in this subtree, including this one
    pub fn count(&self) -> usize {
        1 + self.children.iter().map(Event::count).sum::<usize>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attributes_replace_in_place() {
        let mut attrs = Attributes::new();
        attrs.insert("id", AttrValue::Str("a".into()));
        attrs.insert("click", AttrValue::Bool(true));
        attrs.insert("id", AttrValue::Str("b".into()));

        let names: Vec<_> = attrs.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["id", "click"]);
        assert_eq!(attrs.get_str("id"), Some("b"));
        assert_eq!(attrs.get_bool("click"), Some(true));
        assert_eq!(attrs.get_bool("id"), None);
    }
}
