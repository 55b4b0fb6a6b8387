//! Search domains
//!
//! A domain is the server-side filter expression: a flat sequence of
//! prefix logical operators (`&`, `|`) and `(field, operator, value)`
//! leaves. An empty domain matches every record.

use serde::{Serialize, Serializer};
use serde_json::Value;

use crate::error::ValidationError;

/// One element of a domain
#[derive(Debug, Clone, PartialEq)]
pub enum DomainTerm {
    And,
    Or,
    /// `[field, operator, value]`; the server interprets the contents
    Leaf([Value; 3]),
}

impl DomainTerm {
    pub fn leaf(
        field: impl Into<String>,
        operator: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        DomainTerm::Leaf([
            Value::String(field.into()),
            Value::String(operator.into()),
            value.into(),
        ])
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(op) if op == "&" => Some(DomainTerm::And),
            Value::String(op) if op == "|" => Some(DomainTerm::Or),
            Value::Array(items) if items.len() == 3 => Some(DomainTerm::Leaf([
                items[0].clone(),
                items[1].clone(),
                items[2].clone(),
            ])),
            _ => None,
        }
    }
}

impl Serialize for DomainTerm {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            DomainTerm::And => serializer.serialize_str("&"),
            DomainTerm::Or => serializer.serialize_str("|"),
            DomainTerm::Leaf(items) => items.serialize(serializer),
        }
    }
}

/// Validated domain, serialized as the JSON array the server expects
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Domain(Vec<DomainTerm>);

impl Domain {
    /// The empty domain ("match all")
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a `(field, operator, value)` leaf
    pub fn filter(
        mut self,
        field: impl Into<String>,
        operator: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        self.0.push(DomainTerm::leaf(field, operator, value));
        self
    }

    /// Append a prefix `&`
    pub fn and(mut self) -> Self {
        self.0.push(DomainTerm::And);
        self
    }

    /// Append a prefix `|`
    pub fn or(mut self) -> Self {
        self.0.push(DomainTerm::Or);
        self
    }

    pub fn terms(&self) -> &[DomainTerm] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Validate an untyped domain.
    ///
    /// Fails when `value` is not an array, or when any element is neither
    /// `"&"`, `"|"` nor a 3-element array.
    pub fn parse(value: &Value) -> Result<Self, ValidationError> {
        let items = value.as_array().ok_or(ValidationError::DomainNotArray)?;
        items
            .iter()
            .enumerate()
            .map(|(index, item)| {
                DomainTerm::from_value(item).ok_or(ValidationError::DomainTerm { index })
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Domain)
    }
}

impl TryFrom<Value> for Domain {
    type Error = ValidationError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Domain::parse(&value)
    }
}

impl TryFrom<&Value> for Domain {
    type Error = ValidationError;

    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        Domain::parse(value)
    }
}

impl FromIterator<DomainTerm> for Domain {
    fn from_iter<I: IntoIterator<Item = DomainTerm>>(iter: I) -> Self {
        Domain(iter.into_iter().collect())
    }
}
