//! Submitted form model.
//!
//! A submission is an ordered list of string fields. Order is significant:
//! the message composer renders fields in the order the client sent them.

use indexmap::IndexMap;
use serde_json::Value;
use tracing::warn;

use crate::error::Rejection;

/// Field carrying the Turnstile token.
pub const TURNSTILE_FIELD: &str = "turnstileToken";

/// Field used as the Reply-To address.
pub const EMAIL_FIELD: &str = "email";

/// Field used as the email subject.
pub const SUBJECT_FIELD: &str = "subject";

/// Ordered mapping from field name to field value.
#[derive(Debug, Clone, Default)]
pub struct SubmittedForm {
    fields: IndexMap<String, String>,
}

impl SubmittedForm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a field. A repeated name replaces the earlier value but keeps
    /// its original position.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(name.into(), value.into());
    }

    /// Insert a field unless it would be field number `max_fields + 1`.
    /// A `max_fields` of 0 means unbounded.
    pub fn try_insert(&mut self, name: String, value: String, max_fields: usize) -> Result<(), Rejection> {
        if max_fields > 0 && self.fields.len() >= max_fields && !self.fields.contains_key(&name) {
            warn!(field = %name, limit = max_fields, "form_too_many_fields_while_decoding");
            return Err(Rejection::TooManyFields {
                field: name,
                limit: max_fields,
            });
        }
        self.fields.insert(name, value);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// Copy of this form without the named fields.
    pub fn without(&self, names: &[&str]) -> Self {
        Self {
            fields: self
                .fields
                .iter()
                .filter(|(n, _)| !names.contains(&n.as_str()))
                .map(|(n, v)| (n.clone(), v.clone()))
                .collect(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Build a form from decoded name/value pairs, stopping as soon as the
    /// field count passes `max_fields` (0 = unbounded).
    pub fn from_pairs<I>(pairs: I, max_fields: usize) -> Result<Self, Rejection>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut form = Self::new();
        for (name, value) in pairs {
            form.try_insert(name, value, max_fields)?;
        }
        Ok(form)
    }

    /// Build a form from a JSON object body.
    ///
    /// Scalars are flattened to strings; `null` becomes an empty value.
    /// Nested arrays and objects are rejected. The field count is capped as
    /// in [`SubmittedForm::from_pairs`].
    pub fn from_json(body: Value, max_fields: usize) -> Result<Self, Rejection> {
        let Value::Object(map) = body else {
            return Err(Rejection::NotAnObject);
        };

        let mut form = Self::new();
        for (name, value) in map {
            let value = match value {
                Value::String(s) => s,
                Value::Null => String::new(),
                Value::Bool(b) => b.to_string(),
                Value::Number(n) => n.to_string(),
                Value::Array(_) | Value::Object(_) => {
                    return Err(Rejection::NestedField(name));
                }
            };
            form.try_insert(name, value, max_fields)?;
        }
        Ok(form)
    }
}

// IndexMap equality ignores order; two forms are equal only in the same order.
impl PartialEq for SubmittedForm {
    fn eq(&self, other: &Self) -> bool {
        self.fields.len() == other.fields.len() && self.iter().eq(other.iter())
    }
}

impl Eq for SubmittedForm {}

impl FromIterator<(String, String)> for SubmittedForm {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}
