//! Concrete streams built on [`RefreshController`](crate::refresh::RefreshController).

pub mod chat;
pub mod conversion;
pub mod forex;
pub mod search;
pub mod stocks;

#[cfg(test)]
pub(crate) mod testing;

use std::fmt;

/// A numeric result field as shown to the user.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Reading {
    /// Nothing to show yet, or the input was cleared
    Blank,
    Value(f64),
    /// The last refresh failed
    Unavailable,
}

impl Reading {
    pub fn value(&self) -> Option<f64> {
        match self {
            Reading::Value(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for Reading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reading::Blank => Ok(()),
            Reading::Value(v) => write!(f, "{v:.2}"),
            Reading::Unavailable => write!(f, "N/A"),
        }
    }
}
