//! Script node tree: the parsed, not yet validated form of a test script

use serde::de::{Deserializer, MapAccess, Visitor};
use serde::Deserialize;
use std::fmt;

/// One node of a test script as produced by a document parser
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ScriptNode {
    /// Tag name as written in the script
    pub tag: String,
    /// Attributes in document order
    #[serde(default, deserialize_with = "ordered_attributes")]
    pub attributes: Vec<(String, String)>,
    /// Text content, if any
    #[serde(default)]
    pub text: Option<String>,
    /// Child nodes in document order
    #[serde(default)]
    pub children: Vec<ScriptNode>,
}

impl ScriptNode {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Default::default()
        }
    }

    /// Builder: add an attribute
    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((name.into(), value.into()));
        self
    }

    /// Builder: set the text content
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Builder: append a child node
    pub fn child(mut self, child: ScriptNode) -> Self {
        self.children.push(child);
        self
    }
}

/// Deserialize a mapping into name/value pairs without losing document order.
///
/// Scalar values (booleans, numbers) are accepted and kept as their text.
fn ordered_attributes<'de, D>(deserializer: D) -> Result<Vec<(String, String)>, D::Error>
where
    D: Deserializer<'de>,
{
    struct OrderedVisitor;

    impl<'de> Visitor<'de> for OrderedVisitor {
        type Value = Vec<(String, String)>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a mapping of attribute names to scalar values")
        }

        fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
        where
            A: MapAccess<'de>,
        {
            let mut attributes = Vec::with_capacity(map.size_hint().unwrap_or(0));
            while let Some((name, value)) = map.next_entry::<String, AttrText>()? {
                attributes.push((name, value.0));
            }
            Ok(attributes)
        }

        fn visit_unit<E>(self) -> Result<Self::Value, E> {
            Ok(Vec::new())
        }
    }

    deserializer.deserialize_map(OrderedVisitor)
}

/// A scalar attribute value rendered as text
struct AttrText(String);

impl<'de> Deserialize<'de> for AttrText {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct TextVisitor;

        impl<'de> Visitor<'de> for TextVisitor {
            type Value = AttrText;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a string, number or boolean")
            }

            fn visit_str<E>(self, v: &str) -> Result<AttrText, E> {
                Ok(AttrText(v.to_string()))
            }

            fn visit_string<E>(self, v: String) -> Result<AttrText, E> {
                Ok(AttrText(v))
            }

            fn visit_bool<E>(self, v: bool) -> Result<AttrText, E> {
                Ok(AttrText(v.to_string()))
            }

            fn visit_i64<E>(self, v: i64) -> Result<AttrText, E> {
                Ok(AttrText(v.to_string()))
            }

            fn visit_u64<E>(self, v: u64) -> Result<AttrText, E> {
                Ok(AttrText(v.to_string()))
            }

            fn visit_f64<E>(self, v: f64) -> Result<AttrText, E> {
                Ok(AttrText(v.to_string()))
            }
        }

        deserializer.deserialize_any(TextVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attribute_order_preserved() {
        let node: ScriptNode = serde_yaml::from_str(
            r#"
tag: textfield
attributes:
  name: user
  set: "{@login}"
  clear: true
  index: 2
"#,
        )
        .unwrap();

        assert_eq!(node.tag, "textfield");
        assert_eq!(
            node.attributes,
            vec![
                ("name".to_string(), "user".to_string()),
                ("set".to_string(), "{@login}".to_string()),
                ("clear".to_string(), "true".to_string()),
                ("index".to_string(), "2".to_string()),
            ]
        );
    }

    #[test]
    fn test_children_and_text() {
        let node: ScriptNode = serde_yaml::from_str(
            r#"
tag: execute
children:
  - tag: arg
    text: ls
  - tag: arg
    text: "-l"
"#,
        )
        .unwrap();

        assert_eq!(node.children.len(), 2);
        assert_eq!(node.children[1].text.as_deref(), Some("-l"));
        assert!(node.attributes.is_empty());
    }

    #[test]
    fn test_builder() {
        let node = ScriptNode::new("div").attr("id", "x").child(ScriptNode::new("span"));
        assert_eq!(node.attributes.len(), 1);
        assert_eq!(node.children[0].tag, "span");
    }
}
