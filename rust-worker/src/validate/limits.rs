//! Field count and size limits for submissions.

use tracing::warn;

use crate::error::{Outcome, Rejection};
use crate::form::SubmittedForm;

/// Default maximum characters in one field value.
pub const DEFAULT_MAX_FIELD_CHARS: usize = 4096;

/// Default maximum characters across all field values.
pub const DEFAULT_MAX_TOTAL_CHARS: usize = 1_048_576;

/// Default maximum number of fields.
pub const DEFAULT_MAX_FIELDS: usize = 64;

/// Size policy applied to every submission. A limit of 0 disables that check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormLimits {
    pub max_field_chars: usize,
    pub max_total_chars: usize,
    pub max_fields: usize,
}

impl Default for FormLimits {
    fn default() -> Self {
        Self {
            max_field_chars: DEFAULT_MAX_FIELD_CHARS,
            max_total_chars: DEFAULT_MAX_TOTAL_CHARS,
            max_fields: DEFAULT_MAX_FIELDS,
        }
    }
}

impl FormLimits {
    /// Check `form` against the limits, stopping at the first offending field.
    pub fn check(&self, form: &SubmittedForm) -> Outcome {
        let mut total = 0usize;
        let mut count = 0usize;

        for (name, value) in form.iter() {
            let len = value.chars().count();
            total += len;
            count += 1;

            if self.max_field_chars > 0 && len > self.max_field_chars {
                warn!(field = name, length = len, limit = self.max_field_chars, "form_field_too_long");
                return Err(Rejection::FieldTooLong {
                    field: name.to_string(),
                    limit: self.max_field_chars,
                });
            }

            if self.max_total_chars > 0 && total > self.max_total_chars {
                warn!(field = name, total = total, limit = self.max_total_chars, "form_total_too_large");
                return Err(Rejection::TotalTooLarge {
                    field: name.to_string(),
                    limit: self.max_total_chars,
                });
            }

            if self.max_fields > 0 && count > self.max_fields {
                warn!(field = name, count = count, limit = self.max_fields, "form_too_many_fields");
                return Err(Rejection::TooManyFields {
                    field: name.to_string(),
                    limit: self.max_fields,
                });
            }
        }

        Ok(())
    }
}
