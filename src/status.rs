//! Status algebra of the sequence drivers.
//!
//! Two tagged families drive all state transitions: [`ParseAttemptStatus`]
//! classifies the outcome of one parse attempt of one occurrence, and
//! [`ArrayIndexStatus`] classifies the current occurrence index of a
//! repeating element. The drivers consume only the predicates; the concrete
//! variants matter to `final_checks` implementations (e.g. a
//! trailing-empty-strict check telling an empty representation from parsed
//! content).

// ============================================================================
// ParseAttemptStatus
// ============================================================================

/// Outcome of one parse attempt of one occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseAttemptStatus {
    /// Noch kein Versuch unternommen.
    Uninitialized,
    /// The occurrence parsed and produced content.
    Success,
    /// The occurrence parsed as an empty representation (zero-length content
    /// between delimiters).
    SuccessEmptyRep,
    /// The occurrence decided it is not present. Benign; the bit position is
    /// restored to the pre-attempt value (probed syntax is un-consumed).
    AbsentRep,
    /// A required item did not parse.
    MissingItem,
    /// The separator before the occurrence did not parse. With a successful
    /// processor status this signals a graceful end of the sequence instead
    /// of a failure.
    MissingSeparator,
    /// The occurrence failed after a discriminator committed its point of
    /// uncertainty. Suppresses further unordered alternatives.
    UnorderedSeqDiscriminatedFailure,
    /// Failure without a more specific classification.
    FailureUnspecified,
}

impl ParseAttemptStatus {
    /// True for any success kind (content or empty representation).
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success | Self::SuccessEmptyRep)
    }

    /// True for [`ParseAttemptStatus::AbsentRep`].
    pub fn is_absent(&self) -> bool {
        matches!(self, Self::AbsentRep)
    }

    /// True for any failed kind (not success, not absent, not uninitialized).
    pub fn is_failed(&self) -> bool {
        matches!(
            self,
            Self::MissingItem
                | Self::MissingSeparator
                | Self::UnorderedSeqDiscriminatedFailure
                | Self::FailureUnspecified
        )
    }

    /// True for [`ParseAttemptStatus::MissingSeparator`].
    pub fn is_missing_separator(&self) -> bool {
        matches!(self, Self::MissingSeparator)
    }
}

// ============================================================================
// ArrayIndexStatus
// ============================================================================

/// Classification of the current occurrence index of a repeating element.
///
/// Berechnet der Kind-Parser pro Iteration aus (min, max, array_pos);
/// `Done` beendet die Occurrence-Schleife.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrayIndexStatus {
    /// Noch keine Iteration gestartet.
    Uninitialized,
    /// Occurrence `i` (1-based) is required: `i <= minOccurs`.
    Required(u64),
    /// Occurrence `i` (1-based) is speculative: beyond minOccurs but allowed.
    Optional(u64),
    /// Iteration is over; no further occurrence may be attempted.
    Done,
}

impl ArrayIndexStatus {
    /// True for [`ArrayIndexStatus::Done`].
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done)
    }

    /// The required/optional view of this index, `None` for
    /// `Uninitialized`/`Done`.
    pub fn required_optional(&self) -> Option<RequiredOptionalStatus> {
        match self {
            Self::Required(_) => Some(RequiredOptionalStatus::Required),
            Self::Optional(_) => Some(RequiredOptionalStatus::Optional),
            Self::Uninitialized | Self::Done => None,
        }
    }
}

/// Whether the occurrence being attempted is required or speculative.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequiredOptionalStatus {
    Required,
    Optional,
}

impl RequiredOptionalStatus {
    /// True for [`RequiredOptionalStatus::Required`].
    pub fn is_required(&self) -> bool {
        matches!(self, Self::Required)
    }

    /// True for [`RequiredOptionalStatus::Optional`].
    pub fn is_optional(&self) -> bool {
        matches!(self, Self::Optional)
    }
}

// ============================================================================
// PoUStatus
// ============================================================================

/// Static property of a child parser: whether speculative attempts of it are
/// wrapped in a point of uncertainty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoUStatus {
    /// Speculative attempts get a point of uncertainty (rollback possible).
    HasPoU,
    /// Attempts are never rolled back (z.B. Kinder, deren Spekulation eine
    /// äußere Choice-Ebene übernimmt).
    NoPoU,
}
