use super::{ToValue, Value};

/// One named field of a [`Record`]
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    name: String,
    lookup: Option<String>,
    value: Value,
}

impl Field {
    /// Natural (declared) field name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name templates use to reach this field
    pub fn lookup_name(&self) -> &str {
        self.lookup.as_deref().unwrap_or(&self.name)
    }

    pub fn value(&self) -> &Value {
        &self.value
    }
}

/// A host struct adapted into the value model
///
/// Fields are kept in declaration order. A field declared with
/// [`Record::renamed_field`] is reachable only under its lookup name.
///
/// ```
/// use rustbars::value::Record;
///
/// let comment = Record::new("Comment")
///     .field("author", "Marcel")
///     .renamed_field("body", "content", "LOL!");
///
/// assert!(comment.get("content").is_some());
/// assert!(comment.get("body").is_none());
/// ```
#[derive(Debug, Clone, Default)]
pub struct Record {
    type_name: String,
    fields: Vec<Field>,
}

impl Record {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            fields: Vec::new(),
        }
    }

    pub fn field<V: ToValue + ?Sized>(mut self, name: impl Into<String>, value: &V) -> Self {
        self.push(name.into(), None, value.to_value());
        self
    }

    pub fn renamed_field<V: ToValue + ?Sized>(
        mut self,
        name: impl Into<String>,
        lookup_name: impl Into<String>,
        value: &V,
    ) -> Self {
        self.push(name.into(), Some(lookup_name.into()), value.to_value());
        self
    }

    fn push(&mut self, name: String, lookup: Option<String>, value: Value) {
        self.fields.push(Field {
            name,
            lookup,
            value,
        });
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Field value by lookup name
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|field| field.lookup_name() == name)
            .map(|field| &field.value)
    }

    pub fn fields(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Records are equal when their fields match pairwise by lookup name and value
impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.fields.len() == other.fields.len()
            && self
                .fields
                .iter()
                .zip(other.fields.iter())
                .all(|(a, b)| a.lookup_name() == b.lookup_name() && a.value == b.value)
    }
}
