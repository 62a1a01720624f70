//! Index namespace derivation
//!
//! Every label gets its own full-text index. The namespace string is the
//! only contract between the writer and the reader: both derive it with
//! [`resolve`].

use serde::{Deserialize, Serialize};
use std::fmt;

const LABEL_PREFIX: &str = "label-";

/// Name of the full-text index holding records for one label
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Namespace(String);

impl Namespace {
    /// Namespace string as stored by the index store
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The label this namespace was derived from
    pub fn label(&self) -> Option<&str> {
        self.0.strip_prefix(LABEL_PREFIX)
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Namespace {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Derive the index namespace for a label
///
/// Pure and injective: the label is kept verbatim behind a fixed prefix.
pub fn resolve(label: &str) -> Namespace {
    Namespace(format!("{}{}", LABEL_PREFIX, label))
}
