//! Builds typed events from script nodes

use std::sync::Arc;

use super::schema::{AttrType, ContentRule, SchemaRegistry};
use super::{AttrValue, Attributes, Event, EventKind, ScriptNode};
use crate::common::{Error, Result};

/// Turns [`ScriptNode`]s into validated [`Event`]s
#[derive(Debug, Clone)]
pub struct EventFactory {
    registry: Arc<SchemaRegistry>,
}

impl EventFactory {
    pub fn new(registry: Arc<SchemaRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    /// Build a list of sibling nodes, stopping at the first invalid one
    pub fn build_all(&self, nodes: &[ScriptNode]) -> Result<Vec<Event>> {
        nodes.iter().map(|node| self.build(node)).collect()
    }

    /// Build one node and its subtree
    pub fn build(&self, node: &ScriptNode) -> Result<Event> {
        let kind = self
            .registry
            .kind_for_tag(&node.tag)
            .ok_or_else(|| Error::UnknownEventKind(node.tag.clone()))?;
        let schema = self
            .registry
            .schema(kind)
            .ok_or_else(|| Error::Internal(format!("No schema registered for '{}'", kind)))?;

        let mut selectors = Attributes::new();
        let mut actions = Attributes::new();

        for (raw_name, raw_value) in &node.attributes {
            let name = raw_name.to_ascii_lowercase();

            if let Some(ty) = schema.selector_type(&name) {
                let value = typed_value(kind, &name, raw_value, ty);
                selectors.insert(name, value);
            } else if let Some(ty) = schema.action_type(&name) {
                let value = typed_value(kind, &name, raw_value, ty);
                actions.insert(name, value);
            } else {
                return Err(Error::invalid_attribute(&name, &node.tag));
            }
        }

        if let Some(target) = kind.html_target() {
            selectors.insert("html_tag", AttrValue::Str(target.tag.to_string()));
            if let Some(input_type) = target.input_type {
                selectors.insert("html_type", AttrValue::Str(input_type.to_string()));
            }
        }

        let mut args = Vec::new();
        let mut children = Vec::new();

        match schema.content {
            ContentRule::Args => {
                for child in &node.children {
                    if child.tag.eq_ignore_ascii_case(EventKind::Arg.tag()) {
                        args.push(child.text.clone().unwrap_or_default());
                    } else {
                        children.push(self.build(child)?);
                    }
                }
            }
            ContentRule::RawText => {
                if let Some(text) = node.text.as_deref().filter(|t| !t.is_empty()) {
                    actions.insert("content", AttrValue::Str(text.to_string()));
                }
                children = self.build_all(&node.children)?;
            }
            ContentRule::Children => {
                children = self.build_all(&node.children)?;
            }
        }

        Ok(Event {
            kind,
            name: node.tag.to_ascii_lowercase(),
            selectors,
            actions,
            args,
            text: node.text.clone(),
            children,
        })
    }
}

fn typed_value(kind: EventKind, name: &str, raw: &str, ty: AttrType) -> AttrValue {
    match ty {
        AttrType::String => AttrValue::Str(raw.to_string()),
        AttrType::Boolean => {
            let value = coerce_bool(raw);
            if !value && !is_false_literal(raw) {
                tracing::warn!(
                    event = %kind,
                    attribute = name,
                    value = raw,
                    "Boolean attribute value not recognized, treating as false"
                );
            }
            AttrValue::Bool(value)
        }
    }
}

fn is_false_literal(raw: &str) -> bool {
    raw.eq_ignore_ascii_case("false") || raw.parse::<i32>().map(|n| n == 0).unwrap_or(false)
}

/// Convert script text to a boolean the way existing scripts expect.
///
/// `"true"`/`"false"` map directly; integers map to `n != 0`; otherwise a
/// case-insensitive `"true"` is true and anything else is false.
pub fn coerce_bool(raw: &str) -> bool {
    match raw {
        "true" => true,
        "false" => false,
        _ => match raw.parse::<i32>() {
            Ok(n) => n != 0,
            Err(_) => raw.eq_ignore_ascii_case("true"),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn factory() -> EventFactory {
        EventFactory::new(Arc::new(SchemaRegistry::builtin()))
    }

    #[test]
    fn test_coerce_bool() {
        assert!(coerce_bool("true"));
        assert!(!coerce_bool("false"));
        assert!(coerce_bool("1"));
        assert!(coerce_bool("-7"));
        assert!(!coerce_bool("0"));
        assert!(coerce_bool("TRUE"));
        assert!(!coerce_bool("yes"));
        assert!(!coerce_bool(""));
    }

    #[test]
    fn test_unknown_tag() {
        let err = factory().build(&ScriptNode::new("marquee")).unwrap_err();
        assert!(matches!(err, Error::UnknownEventKind(tag) if tag == "marquee"));
    }

    #[test]
    fn test_invalid_attribute() {
        let node = ScriptNode::new("button").attr("id", "go").attr("colour", "red");
        let err = factory().build(&node).unwrap_err();
        match err {
            Error::InvalidAttribute { attribute, kind } => {
                assert_eq!(attribute, "colour");
                assert_eq!(kind, "button");
            }
            other => panic!("Expected InvalidAttribute, got {:?}", other),
        }
    }

    #[test]
    fn test_classifies_selectors_and_actions() {
        let node = ScriptNode::new("Checkbox")
            .attr("ID", "remember")
            .attr("set", "1")
            .attr("required", "false");
        let event = factory().build(&node).unwrap();

        assert_eq!(event.kind(), EventKind::Checkbox);
        assert_eq!(event.name(), "checkbox");
        assert_eq!(event.selectors().get_str("id"), Some("remember"));
        assert_eq!(event.actions().get_bool("set"), Some(true));
        assert!(!event.required());
    }

    #[test]
    fn test_implicit_html_selectors() {
        let event = factory()
            .build(&ScriptNode::new("password").attr("name", "pw"))
            .unwrap();
        let names: Vec<_> = event.selectors().iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["name", "html_tag", "html_type"]);
        assert_eq!(event.selectors().get_str("html_tag"), Some("input"));
        assert_eq!(event.selectors().get_str("html_type"), Some("password"));

        let puts = factory().build(&ScriptNode::new("puts").attr("txt", "hi")).unwrap();
        assert!(puts.selectors().is_empty());
    }

    #[test]
    fn test_args_collected() {
        let node = ScriptNode::new("execute")
            .child(ScriptNode::new("arg").text("echo"))
            .child(ScriptNode::new("ARG").text("hello world"))
            .child(ScriptNode::new("puts").attr("txt", "after"));
        let event = factory().build(&node).unwrap();

        assert_eq!(event.args(), &["echo".to_string(), "hello world".to_string()]);
        assert_eq!(event.children().len(), 1);
        assert_eq!(event.children()[0].kind(), EventKind::Puts);
    }

    #[test]
    fn test_raw_text_captured() {
        let node = ScriptNode::new("javascript").text("return document.title;");
        let event = factory().build(&node).unwrap();
        assert_eq!(event.actions().get_str("content"), Some("return document.title;"));

        let empty = factory().build(&ScriptNode::new("whitelist").text("")).unwrap();
        assert!(!empty.actions().contains("content"));
    }

    #[test]
    fn test_child_errors_propagate() {
        let node = ScriptNode::new("div")
            .attr("id", "outer")
            .child(ScriptNode::new("span").child(ScriptNode::new("blink")));
        let err = factory().build(&node).unwrap_err();
        assert!(matches!(err, Error::UnknownEventKind(_)));
    }

    #[test]
    fn test_count() {
        let node = ScriptNode::new("frame")
            .attr("name", "main")
            .child(ScriptNode::new("button").attr("id", "a"))
            .child(ScriptNode::new("div").child(ScriptNode::new("span")));
        assert_eq!(factory().build(&node).unwrap().count(), 4);
    }
}
