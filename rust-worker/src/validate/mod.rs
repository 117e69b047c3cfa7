//! Submission validation: size policy and email syntax.

pub mod email;
pub mod limits;

pub use email::is_valid_email;
pub use limits::{FormLimits, DEFAULT_MAX_FIELDS, DEFAULT_MAX_FIELD_CHARS, DEFAULT_MAX_TOTAL_CHARS};
