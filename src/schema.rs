//! Compiled runtime descriptors for schema terms.
//!
//! Schema compilation happens upstream; the parser core only consumes the
//! compiled form. A [`TermRuntimeDescriptor`] (TRD) carries the static
//! metadata the drivers and diagnostics need, an [`OccursBounds`] describes
//! the occurrence constraints of a repeating element (DFDL v1.0 §16), and a
//! [`SequenceRuntimeData`] describes the enclosing sequence group
//! (DFDL v1.0 §14).

use core::fmt;
use std::rc::Rc;

use crate::{Error, Result};

// ============================================================================
// SchemaLocation
// ============================================================================

/// Location of a term in its schema document, for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaLocation {
    /// Schema document (Datei oder URI).
    document: Rc<str>,
    /// Zeilennummer, falls beim Kompilieren bekannt.
    line: Option<u32>,
}

impl SchemaLocation {
    /// Creates a schema location.
    pub fn new(document: Rc<str>, line: Option<u32>) -> Self {
        Self { document, line }
    }

    /// The schema document path or URI.
    pub fn document(&self) -> &str {
        &self.document
    }

    /// The line number, when known.
    pub fn line(&self) -> Option<u32> {
        self.line
    }
}

impl fmt::Display for SchemaLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "{}:{line}", self.document),
            None => write!(f, "{}", self.document),
        }
    }
}

// ============================================================================
// TermRuntimeDescriptor (TRD)
// ============================================================================

/// Static runtime metadata of one compiled schema term.
///
/// Wird per `Rc` zwischen Kind-Parser, Infoset-Knoten und Diagnostik geteilt,
/// analog zu den geteilten Deklarationen des Schema-Compilers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TermRuntimeDescriptor {
    /// Prefixed name, e.g. `ex:batchItem`.
    prefixed_name: Rc<str>,
    /// Where the term is declared.
    schema_location: SchemaLocation,
    /// True for element terms with maxOccurs > 1 or unbounded.
    is_array: bool,
}

impl TermRuntimeDescriptor {
    /// Descriptor for an element term.
    pub fn element(prefixed_name: Rc<str>, schema_location: SchemaLocation, is_array: bool) -> Self {
        Self { prefixed_name, schema_location, is_array }
    }

    /// Descriptor for a model-group term (sequence, choice).
    pub fn model_group(prefixed_name: Rc<str>, schema_location: SchemaLocation) -> Self {
        Self { prefixed_name, schema_location, is_array: false }
    }

    /// Prefixed name of the term.
    pub fn prefixed_name(&self) -> &Rc<str> {
        &self.prefixed_name
    }

    /// Where the term is declared.
    pub fn schema_location(&self) -> &SchemaLocation {
        &self.schema_location
    }

    /// True for element terms with maxOccurs > 1 or unbounded.
    pub fn is_array(&self) -> bool {
        self.is_array
    }
}

// ============================================================================
// OccursBounds (DFDL v1.0 §16)
// ============================================================================

/// Upper occurrence bound of a repeating element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaxOccurs {
    /// Endliche Obergrenze.
    Bounded(u64),
    /// Unbegrenzte Wiederholungen (maxOccurs="unbounded").
    Unbounded,
}

/// Occurrence constraints of a repeating element (DFDL v1.0 §16).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OccursBounds {
    min: u64,
    max: MaxOccurs,
}

impl OccursBounds {
    /// Creates occurs bounds, rejecting max < min.
    pub fn new(min: u64, max: MaxOccurs) -> Result<Self> {
        if let MaxOccurs::Bounded(m) = max {
            if m < min {
                return Err(Error::InvalidOccursBounds { min, max: m });
            }
        }
        Ok(Self { min, max })
    }

    /// `minOccurs="1" maxOccurs="1"`: a required scalar.
    pub fn exactly_one() -> Self {
        Self { min: 1, max: MaxOccurs::Bounded(1) }
    }

    /// `minOccurs="0" maxOccurs="1"`: an optional element.
    pub fn optional() -> Self {
        Self { min: 0, max: MaxOccurs::Bounded(1) }
    }

    /// `minOccurs="0" maxOccurs="unbounded"`.
    pub fn star() -> Self {
        Self { min: 0, max: MaxOccurs::Unbounded }
    }

    /// `minOccurs="1" maxOccurs="unbounded"`.
    pub fn plus() -> Self {
        Self { min: 1, max: MaxOccurs::Unbounded }
    }

    /// Minimum number of occurrences.
    pub fn min(&self) -> u64 {
        self.min
    }

    /// Maximum number of occurrences.
    pub fn max(&self) -> MaxOccurs {
        self.max
    }

    /// True when maxOccurs is a finite bound.
    pub fn is_bounded_max(&self) -> bool {
        matches!(self.max, MaxOccurs::Bounded(_))
    }

    /// True when `n` occurrences satisfy the bounds.
    pub fn contains(&self, n: u64) -> bool {
        n >= self.min
            && match self.max {
                MaxOccurs::Bounded(m) => n <= m,
                MaxOccurs::Unbounded => true,
            }
    }
}

impl fmt::Display for OccursBounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.max {
            MaxOccurs::Bounded(m) => write!(f, "[{}..{m}]", self.min),
            MaxOccurs::Unbounded => write!(f, "[{}..unbounded]", self.min),
        }
    }
}

// ============================================================================
// Sequence runtime data (DFDL v1.0 §14)
// ============================================================================

/// Ordering semantics of a sequence group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SequenceKind {
    /// Children are parsed strictly in declared order (default).
    #[default]
    Ordered,
    /// Any child may match at the current position; the infoset is brought
    /// into declared order on exit (DFDL v1.0 §14.3).
    Unordered,
}

/// Placement of the separator relative to the separated terms
/// (DFDL v1.0 §14.2, dfdl:separatorPosition).
///
/// Die Separator-Behandlung selbst liegt bei den kompilierten Kind-Parsern;
/// sie lesen `group_pos`/`array_pos`, um infix-Separatoren an Position 1 zu
/// unterdrücken. Der Treiber bleibt separator-agnostisch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SeparatorPosition {
    Prefix,
    #[default]
    Infix,
    Postfix,
}

/// One declared member of an unordered sequence group.
///
/// Eine unordered Sequenz wird upstream zu einer wiederholten Choice über
/// ihre Member kompiliert; der Treiber sieht davon nur ein Kind. Für das
/// Einsortieren und die Occurrence-Validierung beim Abschluss braucht er die
/// deklarierte Member-Liste trotzdem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnorderedMember {
    name: Rc<str>,
    occurs: OccursBounds,
}

impl UnorderedMember {
    /// Declares an unordered member with its occurrence bounds.
    pub fn new(name: Rc<str>, occurs: OccursBounds) -> Self {
        Self { name, occurs }
    }

    /// Prefixed name of the member element.
    pub fn name(&self) -> &Rc<str> {
        &self.name
    }

    /// Declared occurrence bounds (exactly-one for required scalars).
    pub fn occurs(&self) -> OccursBounds {
        self.occurs
    }
}

/// Compiled runtime data of one sequence group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceRuntimeData {
    /// Descriptor of the sequence term itself.
    trd: Rc<TermRuntimeDescriptor>,
    kind: SequenceKind,
    separator_position: SeparatorPosition,
    /// Declared members, in schema order. Nur für unordered Sequenzen belegt.
    unordered_members: Vec<UnorderedMember>,
}

impl SequenceRuntimeData {
    /// Creates sequence runtime data.
    pub fn new(
        trd: Rc<TermRuntimeDescriptor>,
        kind: SequenceKind,
        separator_position: SeparatorPosition,
    ) -> Self {
        Self { trd, kind, separator_position, unordered_members: Vec::new() }
    }

    /// Attaches the declared member list of an unordered sequence.
    pub fn with_unordered_members(mut self, members: Vec<UnorderedMember>) -> Self {
        self.unordered_members = members;
        self
    }

    /// Descriptor of the sequence term itself.
    pub fn trd(&self) -> &Rc<TermRuntimeDescriptor> {
        &self.trd
    }

    /// Ordering semantics.
    pub fn kind(&self) -> SequenceKind {
        self.kind
    }

    /// Separator placement policy.
    pub fn separator_position(&self) -> SeparatorPosition {
        self.separator_position
    }

    /// Declared members of an unordered sequence, in schema order.
    pub fn unordered_members(&self) -> &[UnorderedMember] {
        &self.unordered_members
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc() -> SchemaLocation {
        SchemaLocation::new(Rc::from("records.dfdl.xsd"), Some(42))
    }

    #[test]
    fn schema_location_display() {
        assert_eq!(loc().to_string(), "records.dfdl.xsd:42");
        let no_line = SchemaLocation::new(Rc::from("records.dfdl.xsd"), None);
        assert_eq!(no_line.to_string(), "records.dfdl.xsd");
    }

    #[test]
    fn trd_accessors() {
        let trd = TermRuntimeDescriptor::element(Rc::from("ex:a"), loc(), true);
        assert_eq!(&**trd.prefixed_name(), "ex:a");
        assert!(trd.is_array());
        let grp = TermRuntimeDescriptor::model_group(Rc::from("ex:seq"), loc());
        assert!(!grp.is_array());
    }

    // DFDL v1.0 Section 16: max < min wird beim Kompilieren abgewiesen
    #[test]
    fn occurs_bounds_rejects_max_below_min() {
        assert_eq!(
            OccursBounds::new(5, MaxOccurs::Bounded(2)).unwrap_err(),
            Error::InvalidOccursBounds { min: 5, max: 2 }
        );
        assert!(OccursBounds::new(2, MaxOccurs::Bounded(2)).is_ok());
        assert!(OccursBounds::new(5, MaxOccurs::Unbounded).is_ok());
    }

    #[test]
    fn occurs_bounds_contains() {
        let b = OccursBounds::new(1, MaxOccurs::Bounded(3)).unwrap();
        assert!(!b.contains(0));
        assert!(b.contains(1));
        assert!(b.contains(3));
        assert!(!b.contains(4));

        let star = OccursBounds::star();
        assert!(star.contains(0));
        assert!(star.contains(1_000_000));
        assert!(!star.is_bounded_max());
    }

    #[test]
    fn occurs_bounds_display() {
        assert_eq!(OccursBounds::optional().to_string(), "[0..1]");
        assert_eq!(OccursBounds::plus().to_string(), "[1..unbounded]");
    }

    #[test]
    fn sequence_runtime_data_accessors() {
        let srd = SequenceRuntimeData::new(
            Rc::new(TermRuntimeDescriptor::model_group(Rc::from("ex:seq"), loc())),
            SequenceKind::Unordered,
            SeparatorPosition::Infix,
        )
        .with_unordered_members(vec![
            UnorderedMember::new(Rc::from("ex:a"), OccursBounds::exactly_one()),
            UnorderedMember::new(Rc::from("ex:b"), OccursBounds::star()),
        ]);
        assert_eq!(srd.kind(), SequenceKind::Unordered);
        assert_eq!(srd.separator_position(), SeparatorPosition::Infix);
        assert_eq!(&**srd.trd().prefixed_name(), "ex:seq");
        assert_eq!(srd.unordered_members().len(), 2);
        assert_eq!(&**srd.unordered_members()[0].name(), "ex:a");
        assert!(srd.unordered_members()[0].occurs().contains(1));
        assert!(!srd.unordered_members()[0].occurs().contains(2));
    }
}
