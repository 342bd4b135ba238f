//! Generic element tree consumed by the configuration resolver and mapper parsers.

use crate::error::{SqlMapError, SqlMapResult};
use crate::parsing::properties::{Properties, substitute_variables};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One element of a declarative tree.
///
/// Trees can be built programmatically or deserialized from JSON:
///
/// ```json
/// { "name": "dataSource", "attributes": { "type": "POOLED" },
///   "children": [ { "name": "property", "attributes": { "name": "url", "value": "${url}" } } ] }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub name: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Node>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl Node {
    /// Create an element with no attributes or children.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Builder: add an attribute.
    pub fn attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Builder: append a child element.
    pub fn child(mut self, child: Node) -> Self {
        self.children.push(child);
        self
    }

    /// Builder: set the text content.
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Builder: append a `<property name=".." value=".."/>` child.
    pub fn property(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.child(Node::new("property").attr("name", name).attr("value", value))
    }

    /// Parse a tree from its JSON form.
    pub fn from_json_slice(bytes: &[u8]) -> SqlMapResult<Self> {
        serde_json::from_slice(bytes).map_err(|e| SqlMapError::resource("<json>", e.to_string()))
    }

    /// Parse a tree from its JSON form.
    pub fn from_json_str(text: &str) -> SqlMapResult<Self> {
        Self::from_json_slice(text.as_bytes())
    }

    /// First direct child with the given name.
    pub fn child_named(&self, name: &str) -> Option<&Node> {
        self.children.iter().find(|c| c.name == name)
    }

    /// All direct children with the given name.
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Node> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    /// Attribute that must be present.
    pub fn required_attribute(&self, key: &str) -> SqlMapResult<&str> {
        self.attribute(key)
            .ok_or_else(|| SqlMapError::missing_attribute(&self.name, key))
    }

    /// Read `{name, value}` attribute pairs of the direct children.
    ///
    /// Children lacking either attribute are skipped.
    pub fn children_as_properties(&self) -> Properties {
        self.children
            .iter()
            .filter_map(|c| match (c.attribute("name"), c.attribute("value")) {
                (Some(name), Some(value)) => Some((name.to_string(), value.to_string())),
                _ => None,
            })
            .collect()
    }

    /// Copy of this subtree with `${name}` placeholders expanded in attributes and text.
    pub fn with_variables(&self, variables: &Properties) -> Node {
        Node {
            name: self.name.clone(),
            attributes: self
                .attributes
                .iter()
                .map(|(k, v)| (k.clone(), substitute_variables(v, variables)))
                .collect(),
            children: self
                .children
                .iter()
                .map(|c| c.with_variables(variables))
                .collect(),
            text: self
                .text
                .as_ref()
                .map(|t| substitute_variables(t, variables)),
        }
    }
}
