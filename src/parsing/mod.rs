//! Declarative tree model and text-level helpers.
//!
//! - [`Node`]: one element of the configuration or mapper tree
//! - [`substitute_variables`]: `${name}` placeholder expansion
//! - [`parse_properties`]: `key=value` property documents

pub mod node;
pub mod properties;

pub use node::Node;
pub use properties::{Properties, parse_flag, parse_properties, substitute_variables};
