//! The child-parser protocol of the sequence drivers.
//!
//! A compiled sequence hands the driver a list of [`SequenceChild`] values,
//! one per child term. The polymorphic set {scalar element, repeating
//! element, non-represented term} is a tagged variant with an embedded
//! common record; the driver dispatches by explicit match. The per-term
//! parse behavior itself stays behind the [`TermParser`] trait, which the
//! schema compiler implements for each concrete representation.

use std::rc::Rc;

use crate::pstate::PState;
use crate::schema::{MaxOccurs, OccursBounds, TermRuntimeDescriptor};
use crate::status::{ArrayIndexStatus, ParseAttemptStatus, PoUStatus, RequiredOptionalStatus};

/// Compiled parse behavior of one term.
///
/// `parse_one` attempts exactly one occurrence: it consumes bits through the
/// `PState` cursor, appends infoset children on success, and must leave the
/// processor status consistent with the returned kind (on failure the status
/// carries the cause). Für non-represented Terme ist `ro_status` `None`.
pub trait TermParser {
    /// Attempts exactly one occurrence.
    fn parse_one(
        &self,
        pstate: &mut PState<'_>,
        ro_status: Option<RequiredOptionalStatus>,
    ) -> ParseAttemptStatus;

    /// Trailing validations after the last occurrence, e.g. a
    /// trailing-empty-strict check that needs to know whether the final
    /// absent followed an empty representation.
    fn final_checks(
        &self,
        _pstate: &mut PState<'_>,
        _last: ParseAttemptStatus,
        _prior: ParseAttemptStatus,
    ) {
    }

    /// Hook at array entry, after the occurrence counter was pushed.
    fn on_array_start(&self, _pstate: &mut PState<'_>) {}

    /// Hook at array exit, before the occurrence counter is popped.
    fn on_array_end(&self, _pstate: &mut PState<'_>) {}
}

/// Fields shared by every child kind.
#[derive(Clone)]
pub struct ChildCommon {
    /// Static metadata of the term (name, schema location, array flag).
    pub trd: Rc<TermRuntimeDescriptor>,
    /// Whether speculative attempts of this child get a point of uncertainty.
    pub pou_status: PoUStatus,
    /// The compiled parse behavior.
    pub parser: Rc<dyn TermParser>,
}

impl ChildCommon {
    /// Creates the common record.
    pub fn new(
        trd: Rc<TermRuntimeDescriptor>,
        pou_status: PoUStatus,
        parser: Rc<dyn TermParser>,
    ) -> Self {
        Self { trd, pou_status, parser }
    }
}

/// A scalar element child (minOccurs = maxOccurs = 1 in the compiled form).
#[derive(Clone)]
pub struct ScalarChild {
    pub common: ChildCommon,
    /// Statically known required/optional classification. Immer vorhanden
    /// für Skalare; Optionalität entsteht erst durch Kompilierung zu einem
    /// Repeating-Kind.
    ro_status: RequiredOptionalStatus,
}

impl ScalarChild {
    /// Creates a scalar child.
    pub fn new(common: ChildCommon, ro_status: RequiredOptionalStatus) -> Self {
        Self { common, ro_status }
    }

    /// The static required/optional classification.
    pub fn static_required_optional_status(&self) -> RequiredOptionalStatus {
        self.ro_status
    }
}

/// A repeating element child (array or optional element).
#[derive(Clone)]
pub struct RepeatingChild {
    pub common: ChildCommon,
    occurs: OccursBounds,
    /// True when the element participates in positional separator logic:
    /// ein absent Occurrence belegt dann trotzdem eine Separator-Position.
    positional: bool,
}

impl RepeatingChild {
    /// Creates a repeating child.
    pub fn new(common: ChildCommon, occurs: OccursBounds, positional: bool) -> Self {
        Self { common, occurs, positional }
    }

    /// The compiled occurrence bounds.
    pub fn occurs(&self) -> OccursBounds {
        self.occurs
    }

    /// Minimum occurrences. Takes the parse state so occurs-count
    /// expressions can be evaluated against it.
    pub fn min_repeats(&self, _pstate: &PState<'_>) -> u64 {
        self.occurs.min()
    }

    /// Maximum occurrences; `u64::MAX` when unbounded.
    pub fn max_repeats(&self, _pstate: &PState<'_>) -> u64 {
        match self.occurs.max() {
            MaxOccurs::Bounded(m) => m,
            MaxOccurs::Unbounded => u64::MAX,
        }
    }

    /// True when maxOccurs is a finite bound.
    pub fn is_bounded_max(&self) -> bool {
        self.occurs.is_bounded_max()
    }

    /// True when the element participates in positional separator logic.
    pub fn is_positional(&self) -> bool {
        self.positional
    }

    /// Enters the array scope: pushes the occurrence counter, then the hook.
    pub fn start_array(&self, pstate: &mut PState<'_>) {
        pstate.begin_array();
        self.common.parser.on_array_start(pstate);
    }

    /// Leaves the array scope: hook first, then pop the occurrence counter.
    pub fn end_array(&self, pstate: &mut PState<'_>) {
        self.common.parser.on_array_end(pstate);
        pstate.end_array();
    }

    /// Classification of the occurrence index the next attempt would have.
    ///
    /// `Required` bis minOccurs erreicht ist, danach `Optional` bis zur
    /// Obergrenze, danach `Done`.
    pub fn array_index_status(&self, pstate: &PState<'_>) -> ArrayIndexStatus {
        let pos = pstate.array_pos();
        let min = self.min_repeats(pstate);
        if pos <= min {
            ArrayIndexStatus::Required(pos)
        } else if pos > self.max_repeats(pstate) {
            ArrayIndexStatus::Done
        } else {
            ArrayIndexStatus::Optional(pos)
        }
    }
}

/// A child with no representation in the data stream (calculated values,
/// asserts). Its parse result is not consulted and the group index does not
/// advance for it.
#[derive(Clone)]
pub struct NonRepresentedChild {
    pub common: ChildCommon,
}

impl NonRepresentedChild {
    /// Creates a non-represented child.
    pub fn new(common: ChildCommon) -> Self {
        Self { common }
    }
}

/// One child term of a compiled sequence.
#[derive(Clone)]
pub enum SequenceChild {
    Scalar(ScalarChild),
    Repeating(RepeatingChild),
    NonRepresented(NonRepresentedChild),
}

impl SequenceChild {
    /// The common record of any child kind.
    pub fn common(&self) -> &ChildCommon {
        match self {
            Self::Scalar(c) => &c.common,
            Self::Repeating(c) => &c.common,
            Self::NonRepresented(c) => &c.common,
        }
    }

    /// Static metadata of the term.
    pub fn trd(&self) -> &Rc<TermRuntimeDescriptor> {
        &self.common().trd
    }
}
