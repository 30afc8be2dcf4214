//! Computed properties resolvable on any value
//!
//! Consulted only after ordinary key/field/index lookup came up empty, so a
//! map with a real `length` key still yields that key's value.

use super::Value;

pub type VirtualProperty = fn(&Value) -> Option<Value>;

const VIRTUAL_PROPERTIES: &[(&str, VirtualProperty)] = &[("length", length)];

/// Find a virtual property by name
pub fn find(name: &str) -> Option<VirtualProperty> {
    VIRTUAL_PROPERTIES
        .iter()
        .find(|(prop, _)| *prop == name)
        .map(|(_, property)| *property)
}

/// Names of every virtual property
pub fn names() -> impl Iterator<Item = &'static str> {
    VIRTUAL_PROPERTIES.iter().map(|(name, _)| *name)
}

/// Element count for sequences and maps, character count for strings
fn length(value: &Value) -> Option<Value> {
    match value {
        Value::Seq(items) => Some(Value::from(items.len())),
        Value::Map(map) => Some(Value::from(map.len())),
        Value::String(s) => Some(Value::from(s.chars().count())),
        _ => None,
    }
}
