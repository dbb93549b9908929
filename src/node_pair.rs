//! Ordered (source, destination) node pairs
//!
//! Identifiers are opaque strings (usually IP addresses of measurement hosts).
//! A pair describes one measured path direction; `(A, B)` and `(B, A)` are
//! distinct pairs until the symmetry fix-up relates them.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One measured path direction
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodePair {
    pub src: String,
    pub dest: String,
}

impl NodePair {
    pub fn new(src: impl Into<String>, dest: impl Into<String>) -> Self {
        Self {
            src: src.into(),
            dest: dest.into(),
        }
    }

    /// The opposite measurement direction
    pub fn reversed(&self) -> Self {
        Self {
            src: self.dest.clone(),
            dest: self.src.clone(),
        }
    }
}

impl fmt::Display for NodePair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.src, self.dest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reversed() {
        let pair = NodePair::new("10.0.0.1", "10.0.0.2");
        let rev = pair.reversed();
        assert_eq!(rev.src, "10.0.0.2");
        assert_eq!(rev.dest, "10.0.0.1");
        assert_eq!(rev.reversed(), pair);
    }

    #[test]
    fn test_direction_matters() {
        assert_ne!(NodePair::new("A", "B"), NodePair::new("B", "A"));
    }

    #[test]
    fn test_display() {
        assert_eq!(NodePair::new("A", "B").to_string(), "A -> B");
    }
}
