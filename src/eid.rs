use std::{fmt::Display, ops::Deref};

use rusty_ulid::Ulid;

/// Sortable unique id used as the prefix for a document's chunk ids.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Eid(String);

impl Display for Eid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Deref for Eid {
    type Target = String;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Eid {
    #[inline]
    pub fn new() -> Eid {
        Eid(Ulid::generate().to_string().to_lowercase())
    }
}

impl Default for Eid {
    fn default() -> Self {
        Self::new()
    }
}
