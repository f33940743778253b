//! Central error types for the DFDL sequence runtime.
//!
//! Two channels, matching the failure taxonomy of DFDL v1.0 §2.3:
//!
//! - [`Error`] is fatal. It propagates via [`Result`] and is never recoverable
//!   through a point of uncertainty (e.g. the occurrence safety cap).
//! - [`ParseError`] is a recoverable processing error. It travels inside
//!   `PState::processor_status` and can be swallowed by a point-of-uncertainty
//!   reset when the failing position was speculative.
//!
//! Invariant violations (mis-nested marks, status/result mismatches) are
//! programmer errors and abort via `assert!`, they are not represented here.

use core::fmt;
use std::borrow::Cow;

use crate::schema::SchemaLocation;

/// Fatal errors. Surfaced immediately, bypassing all points of uncertainty.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// The occurrence index of a repeating element exceeded the
    /// `max_occurs_bounds` tunable. Schutz gegen Endlosschleifen bei
    /// unbounded Arrays mit fehlerhaft kompilierten Kind-Parsern.
    OccursBoundsExceeded {
        /// Prefixed name of the repeating element.
        name: String,
        /// Occurrence index that tripped the cap (1-based).
        occurs_index: u64,
        /// The configured cap.
        limit: u64,
    },
    /// The input bit stream ended before a read completed.
    PrematureEndOfBitStream,
    /// A cursor seek target lies beyond the end of the input.
    SeekOutOfBounds {
        /// Angefragte Bit-Position (0-basiert).
        bit_pos0b: u64,
        /// Länge des Inputs in Bits.
        len_bits: u64,
    },
    /// Occurs bounds with max < min (DFDL v1.0 §16).
    InvalidOccursBounds { min: u64, max: u64 },
    /// A tunable was set to a value outside its valid range.
    InvalidTunableValue {
        /// Name of the tunable.
        name: &'static str,
        /// The rejected value.
        value: u64,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OccursBoundsExceeded { name, occurs_index, limit } => write!(
                f,
                "occurrence index {occurs_index} of element '{name}' exceeds the \
                 maxOccursBounds tunable limit {limit}"
            ),
            Self::PrematureEndOfBitStream => write!(f, "premature end of bit stream"),
            Self::SeekOutOfBounds { bit_pos0b, len_bits } => write!(
                f,
                "seek to bit position {bit_pos0b} is beyond the end of the input ({len_bits} bits)"
            ),
            Self::InvalidOccursBounds { min, max } => {
                write!(f, "invalid occurs bounds: max {max} < min {min} (DFDL v1.0 Section 16)")
            }
            Self::InvalidTunableValue { name, value } => {
                write!(f, "invalid value {value} for tunable '{name}'")
            }
        }
    }
}

impl std::error::Error for Error {}

impl Error {
    /// Erstellt einen `OccursBoundsExceeded` Fehler mit Kontext.
    pub fn occurs_bounds_exceeded(name: impl Into<String>, occurs_index: u64, limit: u64) -> Self {
        Self::OccursBoundsExceeded {
            name: name.into(),
            occurs_index,
            limit,
        }
    }
}

/// A convenience `Result` type alias using [`Error`].
pub type Result<T> = core::result::Result<T, Error>;

// ============================================================================
// ParseError (recoverable processing error, DFDL v1.0 §2.3)
// ============================================================================

/// A recoverable processing error, recorded in the processor status.
///
/// Wird nicht über `Result` propagiert. Der Treiber legt den Fehler im
/// `PState` ab; ein Reset eines Point of Uncertainty verwirft ihn wieder.
/// Fehler an nicht-spekulativen Positionen bleiben bestehen und machen die
/// gesamte Sequenz zum Fehlschlag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    message: Cow<'static, str>,
    /// Bit position at which the failure was detected (0-based).
    bit_pos0b: u64,
    /// Schema location of the failing term, when known.
    location: Option<SchemaLocation>,
    /// Ursache (z.B. der Kind-Fehler hinter "failed to populate").
    cause: Option<Box<ParseError>>,
}

impl ParseError {
    /// Creates a parse error with a message and the failing bit position.
    pub fn new(message: impl Into<Cow<'static, str>>, bit_pos0b: u64) -> Self {
        Self {
            message: message.into(),
            bit_pos0b,
            location: None,
            cause: None,
        }
    }

    /// Attaches the schema location of the failing term.
    pub fn with_location(mut self, location: SchemaLocation) -> Self {
        self.location = Some(location);
        self
    }

    /// Attaches the underlying cause.
    pub fn with_cause(mut self, cause: ParseError) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    /// "failed to populate NAME[POS]" for a failed array occurrence.
    pub fn failed_to_populate(
        name: &str,
        occurs_index: u64,
        bit_pos0b: u64,
        cause: Option<ParseError>,
    ) -> Self {
        let mut pe = Self::new(format!("failed to populate {name}[{occurs_index}]"), bit_pos0b);
        pe.cause = cause.map(Box::new);
        pe
    }

    /// "no forward progress" guard against zero-width speculative loops.
    pub fn no_forward_progress(bit_pos0b: u64, group_pos: u64) -> Self {
        Self::new(
            format!("no forward progress at group position {group_pos}"),
            bit_pos0b,
        )
    }

    /// The failure message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Bit position at which the failure was detected (0-based).
    pub fn bit_pos0b(&self) -> u64 {
        self.bit_pos0b
    }

    /// Schema location of the failing term, when known.
    pub fn location(&self) -> Option<&SchemaLocation> {
        self.location.as_ref()
    }

    /// The underlying cause, when one was attached.
    pub fn cause(&self) -> Option<&ParseError> {
        self.cause.as_deref()
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "parse error at bit {}: {}", self.bit_pos0b, self.message)?;
        if let Some(loc) = &self.location {
            write!(f, " ({loc})")?;
        }
        if let Some(cause) = &self.cause {
            write!(f, " Cause: {cause}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ParseError {}
