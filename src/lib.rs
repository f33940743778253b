//! rdfdl – DFDL v1.0 sequence runtime in Rust
//!
//! The speculative, backtracking driver for sequence groups: it walks the
//! compiled child terms of a sequence over a bit-level input, iterates
//! array occurrences with min/max bounds, brackets speculative attempts in
//! points of uncertainty, and accumulates the parsed values in an infoset.
//! Schema compilation, unparsing and output serialization live upstream and
//! downstream of this crate.
//!
//! # Beispiel
//!
//! ```
//! use std::rc::Rc;
//! use rdfdl::{
//!     ChildCommon, ParseAttemptStatus, ParseError, PState, PoUStatus,
//!     RequiredOptionalStatus, ScalarChild, SchemaLocation, SequenceChild,
//!     SequenceKind, SequenceParser, SequenceRuntimeData, SeparatorPosition,
//!     SimpleValue, TermParser, TermRuntimeDescriptor, Tunables,
//! };
//!
//! // Ein Term-Parser, der ein Byte als Ganzzahl liest.
//! struct ByteParser {
//!     name: Rc<str>,
//! }
//!
//! impl TermParser for ByteParser {
//!     fn parse_one(
//!         &self,
//!         pstate: &mut PState<'_>,
//!         _ro: Option<RequiredOptionalStatus>,
//!     ) -> ParseAttemptStatus {
//!         match pstate.cursor_mut().read_bits(8) {
//!             Ok(v) => {
//!                 pstate.add_simple_child(self.name.clone(), SimpleValue::Integer(v as i64));
//!                 ParseAttemptStatus::Success
//!             }
//!             Err(_) => {
//!                 pstate.set_failure(ParseError::new("premature end of data", pstate.bit_pos0b()));
//!                 ParseAttemptStatus::MissingItem
//!             }
//!         }
//!     }
//! }
//!
//! let loc = SchemaLocation::new(Rc::from("demo.dfdl.xsd"), None);
//! let name: Rc<str> = Rc::from("ex:value");
//! let trd = Rc::new(TermRuntimeDescriptor::element(name.clone(), loc.clone(), false));
//! let common = ChildCommon::new(trd, PoUStatus::HasPoU, Rc::new(ByteParser { name }));
//! let seq = SequenceParser::new(
//!     Rc::new(SequenceRuntimeData::new(
//!         Rc::new(TermRuntimeDescriptor::model_group(Rc::from("ex:record"), loc)),
//!         SequenceKind::Ordered,
//!         SeparatorPosition::Infix,
//!     )),
//!     vec![SequenceChild::Scalar(ScalarChild::new(common, RequiredOptionalStatus::Required))],
//! );
//!
//! let mut pstate = PState::new(&[0x2A], Rc::from("ex:record"), Tunables::default());
//! seq.parse(&mut pstate).unwrap();
//! assert!(pstate.is_success());
//! assert_eq!(pstate.bit_pos0b(), 8);
//! let root = pstate.infoset().root();
//! let child = pstate.infoset().children(root)[0];
//! assert_eq!(
//!     pstate.infoset().node(child).simple_value(),
//!     Some(&SimpleValue::Integer(42))
//! );
//! ```

pub mod bitstream;
pub mod child;
pub mod error;
pub mod infoset;
pub mod pstate;
pub mod schema;
pub mod sequence;
pub mod status;
pub mod tunables;

pub use error::{Error, ParseError, Result};

/// HashMap mit ahash (schneller, nicht DoS-resistent; für interne
/// Datenstrukturen). Nutzt hashbrown direkt.
pub(crate) type FastHashMap<K, V> = hashbrown::HashMap<K, V, ahash::RandomState>;

/// IndexMap mit ahash (deterministische Iteration + schnelles Hashing).
pub(crate) type FastIndexMap<K, V> = indexmap::IndexMap<K, V, ahash::RandomState>;

// Public API: parse state
pub use bitstream::BitCursor;
pub use pstate::{PState, PouId, ProcessorStatus};
pub use tunables::Tunables;

// Public API: infoset
pub use infoset::{Infoset, InfosetNode, NodeContent, NodeId, SimpleValue};

// Public API: compiled schema descriptors
pub use schema::{
    MaxOccurs, OccursBounds, SchemaLocation, SeparatorPosition, SequenceKind,
    SequenceRuntimeData, TermRuntimeDescriptor, UnorderedMember,
};

// Public API: child protocol and drivers
pub use child::{
    ChildCommon, NonRepresentedChild, RepeatingChild, ScalarChild, SequenceChild, TermParser,
};
pub use sequence::SequenceParser;

// Public API: status algebra
pub use status::{ArrayIndexStatus, ParseAttemptStatus, PoUStatus, RequiredOptionalStatus};
