//! Input hygiene for statements that cannot use bound parameters.

mod identifiers;

pub use identifiers::{sanitize_identifier, sanitized_object_name, MAX_IDENTIFIER_LENGTH};
