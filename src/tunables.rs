//! Safety tunables of the parse runtime.
//!
//! Tunables are implementation limits, not DFDL properties; they guard the
//! runtime against hostile or mis-compiled schemas.
//!
//! # Beispiel
//!
//! ```
//! use rdfdl::tunables::Tunables;
//!
//! let t = Tunables::default()
//!     .with_max_occurs_bounds(64).unwrap()
//!     .with_initial_infoset_capacity(256);
//!
//! assert_eq!(t.max_occurs_bounds(), 64);
//! assert_eq!(t.initial_infoset_capacity(), 256);
//! ```

use crate::{Error, Result};

/// Implementation limits applied during parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tunables {
    pub(crate) max_occurs_bounds: u64,
    pub(crate) initial_infoset_capacity: usize,
}

impl Default for Tunables {
    fn default() -> Self {
        Self {
            max_occurs_bounds: 1024,
            initial_infoset_capacity: 64,
        }
    }
}

impl Tunables {
    // --- Getter ---

    /// Hard cap on the occurrence index of any repeating element. Exceeding
    /// it is a fatal error, not recoverable by a point of uncertainty.
    pub fn max_occurs_bounds(&self) -> u64 {
        self.max_occurs_bounds
    }

    /// Initial arena capacity of the infoset.
    pub fn initial_infoset_capacity(&self) -> usize {
        self.initial_infoset_capacity
    }

    // --- Builder-Setter (Fluent API) ---

    /// Setzt den Occurrence-Cap. 0 ist ungültig (jedes Array hätte sofort
    /// das Limit überschritten).
    pub fn with_max_occurs_bounds(mut self, limit: u64) -> Result<Self> {
        if limit == 0 {
            return Err(Error::InvalidTunableValue { name: "max_occurs_bounds", value: 0 });
        }
        self.max_occurs_bounds = limit;
        Ok(self)
    }

    /// Setzt die initiale Arena-Kapazität des Infosets.
    pub fn with_initial_infoset_capacity(mut self, capacity: usize) -> Self {
        self.initial_infoset_capacity = capacity;
        self
    }
}
