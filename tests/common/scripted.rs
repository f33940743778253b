// Gemeinsame Term-Parser und Baukasten-Helfer für die Treiber-Tests.
//
// Wird per `include!` eingebunden. Benötigte Imports müssen VOR dem
// `include!` vorhanden sein:
//   use std::cell::RefCell;
//   use std::collections::VecDeque;
//   use std::rc::Rc;
//   use rdfdl::{
//       ChildCommon, MaxOccurs, NonRepresentedChild, OccursBounds, ParseAttemptStatus,
//       ParseError, PState, PoUStatus, RepeatingChild, RequiredOptionalStatus, ScalarChild,
//       SchemaLocation, SequenceChild, SequenceKind, SequenceParser, SequenceRuntimeData,
//       SeparatorPosition, SimpleValue, TermParser, TermRuntimeDescriptor, Tunables,
//       UnorderedMember,
//   };

fn loc() -> SchemaLocation {
    SchemaLocation::new(Rc::from("records.dfdl.xsd"), Some(7))
}

fn elem_trd(name: &str, is_array: bool) -> Rc<TermRuntimeDescriptor> {
    Rc::new(TermRuntimeDescriptor::element(Rc::from(name), loc(), is_array))
}

fn scalar_child(
    name: &str,
    parser: Rc<dyn TermParser>,
    ro: RequiredOptionalStatus,
) -> SequenceChild {
    let common = ChildCommon::new(elem_trd(name, false), PoUStatus::HasPoU, parser);
    SequenceChild::Scalar(ScalarChild::new(common, ro))
}

fn repeating_child(
    name: &str,
    parser: Rc<dyn TermParser>,
    min: u64,
    max: MaxOccurs,
) -> SequenceChild {
    let common = ChildCommon::new(elem_trd(name, true), PoUStatus::HasPoU, parser);
    let occurs = OccursBounds::new(min, max).expect("valid test bounds");
    SequenceChild::Repeating(RepeatingChild::new(common, occurs, true))
}

fn non_represented_child(name: &str, parser: Rc<dyn TermParser>) -> SequenceChild {
    let common = ChildCommon::new(elem_trd(name, false), PoUStatus::NoPoU, parser);
    SequenceChild::NonRepresented(NonRepresentedChild::new(common))
}

fn ordered_seq(children: Vec<SequenceChild>) -> SequenceParser {
    let srd = SequenceRuntimeData::new(
        Rc::new(TermRuntimeDescriptor::model_group(Rc::from("ex:record"), loc())),
        SequenceKind::Ordered,
        SeparatorPosition::Infix,
    );
    SequenceParser::new(Rc::new(srd), children)
}

fn unordered_seq(
    members: Vec<(&str, OccursBounds)>,
    children: Vec<SequenceChild>,
) -> SequenceParser {
    let srd = SequenceRuntimeData::new(
        Rc::new(TermRuntimeDescriptor::model_group(Rc::from("ex:bag"), loc())),
        SequenceKind::Unordered,
        SeparatorPosition::Infix,
    )
    .with_unordered_members(
        members
            .into_iter()
            .map(|(name, occurs)| UnorderedMember::new(Rc::from(name), occurs))
            .collect(),
    );
    SequenceParser::new(Rc::new(srd), children)
}

fn pstate_over(data: &[u8]) -> PState<'_> {
    PState::new(data, Rc::from("ex:record"), Tunables::default())
}

/// Namen der Root-Kinder in Infoset-Reihenfolge.
fn child_names(pstate: &PState<'_>) -> Vec<String> {
    let root = pstate.infoset().root();
    pstate
        .infoset()
        .children(root)
        .iter()
        .map(|&id| pstate.infoset().node(id).name().to_string())
        .collect()
}

/// Text-Werte der Root-Kinder in Infoset-Reihenfolge.
fn child_values(pstate: &PState<'_>) -> Vec<String> {
    let root = pstate.infoset().root();
    pstate
        .infoset()
        .children(root)
        .iter()
        .map(|&id| match pstate.infoset().node(id).simple_value() {
            Some(v) => v.to_string(),
            None => "<complex>".to_string(),
        })
        .collect()
}

// ============================================================================
// FieldParser: '|'-separierte Textfelder (Infix-Separator)
// ============================================================================

/// Parses one text field of a '|'-separated record.
///
/// Ab Gruppenposition bzw. Occurrence-Index 2 wird ein Infix-Separator
/// erwartet; ein fehlender Separator ist für optionale Felder AbsentRep,
/// sonst MissingSeparator. Leerer Inhalt zwischen Separatoren ist eine
/// Empty Representation.
struct FieldParser {
    name: Rc<str>,
}

impl FieldParser {
    fn new(name: &str) -> Rc<Self> {
        Rc::new(Self { name: Rc::from(name) })
    }
}

impl TermParser for FieldParser {
    fn parse_one(
        &self,
        pstate: &mut PState<'_>,
        ro: Option<RequiredOptionalStatus>,
    ) -> ParseAttemptStatus {
        let start = pstate.bit_pos0b();
        let optional = ro == Some(RequiredOptionalStatus::Optional);
        if pstate.group_pos() > 1 || pstate.array_pos() > 1 {
            match pstate.cursor_mut().read_bits(8) {
                Ok(b) if b as u8 == b'|' => {}
                _ => {
                    pstate.cursor_mut().seek_bit_pos0b(start).expect("start is in bounds");
                    if optional {
                        return ParseAttemptStatus::AbsentRep;
                    }
                    pstate.set_failure(ParseError::new("missing infix separator", start));
                    return ParseAttemptStatus::MissingSeparator;
                }
            }
        }
        let mut text = String::new();
        while let Some(b) = pstate.cursor().peek_bits(8) {
            if b as u8 == b'|' {
                break;
            }
            let _ = pstate.cursor_mut().read_bits(8);
            text.push(b as u8 as char);
        }
        if text.is_empty() {
            if optional {
                // Probierte Syntax (Separator) zurückgeben
                pstate.cursor_mut().seek_bit_pos0b(start).expect("start is in bounds");
                return ParseAttemptStatus::AbsentRep;
            }
            if pstate.bit_pos0b() == start && pstate.cursor().remaining_bits() == 0 {
                pstate.set_failure(ParseError::new("missing required field", start));
                return ParseAttemptStatus::MissingItem;
            }
            pstate.add_simple_child(self.name.clone(), SimpleValue::Text(text));
            return ParseAttemptStatus::SuccessEmptyRep;
        }
        pstate.add_simple_child(self.name.clone(), SimpleValue::Text(text));
        ParseAttemptStatus::Success
    }
}

// ============================================================================
// UnorderedChoiceParser: kompiliertes Kind einer unordered Sequenz
// ============================================================================

/// The single compiled child of an unordered sequence: a choice over the
/// declared members, input syntax `key:value` with '|' separators. The
/// consumed `key:` prefix acts as the discriminator of the matched branch.
struct UnorderedChoiceParser {
    members: Vec<Rc<str>>,
    /// Key, dessen Body nach dem Diskriminator fehlschlägt (S7-Szenario).
    discriminated_fail_key: Option<char>,
}

impl UnorderedChoiceParser {
    fn new(members: &[&str]) -> Rc<Self> {
        Rc::new(Self {
            members: members.iter().map(|m| Rc::from(*m)).collect(),
            discriminated_fail_key: None,
        })
    }

    fn with_discriminated_failure(members: &[&str], key: char) -> Rc<Self> {
        Rc::new(Self {
            members: members.iter().map(|m| Rc::from(*m)).collect(),
            discriminated_fail_key: Some(key),
        })
    }

    fn no_match(&self, pstate: &mut PState<'_>, start: u64) -> ParseAttemptStatus {
        pstate.cursor_mut().seek_bit_pos0b(start).expect("start is in bounds");
        pstate.set_failure(ParseError::new("no unordered member matches", start));
        ParseAttemptStatus::MissingItem
    }
}

impl TermParser for UnorderedChoiceParser {
    fn parse_one(
        &self,
        pstate: &mut PState<'_>,
        _ro: Option<RequiredOptionalStatus>,
    ) -> ParseAttemptStatus {
        let start = pstate.bit_pos0b();
        if pstate.group_pos() > 1 {
            match pstate.cursor_mut().read_bits(8) {
                Ok(b) if b as u8 == b'|' => {}
                _ => return self.no_match(pstate, start),
            }
        }
        let key = match pstate.cursor_mut().read_bits(8) {
            Ok(b) => b as u8 as char,
            Err(_) => return self.no_match(pstate, start),
        };
        match pstate.cursor_mut().read_bits(8) {
            Ok(b) if b as u8 == b':' => {}
            _ => return self.no_match(pstate, start),
        }
        // `key:` ist konsumiert: die Alternative ist diskriminiert.
        if Some(key) == self.discriminated_fail_key {
            pstate.set_failure(ParseError::new("member body malformed", pstate.bit_pos0b()));
            return ParseAttemptStatus::UnorderedSeqDiscriminatedFailure;
        }
        let name = match self.members.iter().find(|m| m.starts_with(key)) {
            Some(m) => m.clone(),
            None => return self.no_match(pstate, start),
        };
        let mut text = String::new();
        while let Some(b) = pstate.cursor().peek_bits(8) {
            if b as u8 == b'|' {
                break;
            }
            let _ = pstate.cursor_mut().read_bits(8);
            text.push(b as u8 as char);
        }
        pstate.add_simple_child(name, SimpleValue::Text(text));
        ParseAttemptStatus::Success
    }
}

// ============================================================================
// ScriptedParser: vorgegebene Resultate pro Aufruf
// ============================================================================

#[derive(Clone)]
enum Step {
    /// Liest `bits` Bits und legt ein Integer-Kind ab.
    Read { bits: u8, value: i64 },
    /// Erfolg ohne Konsum (Breite 0).
    ZeroWidth { value: i64 },
    /// Empty Representation ohne Konsum.
    EmptyRep,
    /// Liest `probe_bits` Probe-Bits und meldet AbsentRep ohne selbst
    /// zurückzuspulen (der Treiber muss die Position wiederherstellen).
    Absent { probe_bits: u8 },
    /// Konsumiert Bits, setzt Failure, MissingItem.
    Fail { consume_bits: u8, message: &'static str },
    /// Konsumiert Bits, löst den nächsten Point of Uncertainty auf,
    /// schlägt dann fehl.
    DiscriminateThenFail { consume_bits: u8 },
    /// Separator fehlt, aber Status bleibt Success (reguläres Ende).
    MissingSepEnd,
    /// Seiteneffekt ohne Repräsentation (non-represented Kinder).
    Compute,
    /// Verletzt absichtlich die Status-Äquivalenz.
    Inconsistent,
}

struct ScriptedParser {
    name: Rc<str>,
    steps: RefCell<VecDeque<Step>>,
    /// Letzten Step endlos wiederholen (für unbounded-Szenarien).
    repeat_last: bool,
    observed_group_pos: RefCell<Vec<u64>>,
    final_checks_seen: RefCell<Option<(ParseAttemptStatus, ParseAttemptStatus)>>,
}

impl ScriptedParser {
    fn new(name: &str, steps: Vec<Step>) -> Rc<Self> {
        Rc::new(Self {
            name: Rc::from(name),
            steps: RefCell::new(steps.into()),
            repeat_last: false,
            observed_group_pos: RefCell::new(Vec::new()),
            final_checks_seen: RefCell::new(None),
        })
    }

    fn repeating(name: &str, step: Step) -> Rc<Self> {
        Rc::new(Self {
            name: Rc::from(name),
            steps: RefCell::new(vec![step].into()),
            repeat_last: true,
            observed_group_pos: RefCell::new(Vec::new()),
            final_checks_seen: RefCell::new(None),
        })
    }

    fn next_step(&self) -> Step {
        let mut steps = self.steps.borrow_mut();
        if self.repeat_last && steps.len() == 1 {
            steps[0].clone()
        } else {
            steps.pop_front().expect("script exhausted: more attempts than steps")
        }
    }

    fn calls(&self) -> usize {
        self.observed_group_pos.borrow().len()
    }
}

impl TermParser for ScriptedParser {
    fn parse_one(
        &self,
        pstate: &mut PState<'_>,
        _ro: Option<RequiredOptionalStatus>,
    ) -> ParseAttemptStatus {
        self.observed_group_pos.borrow_mut().push(pstate.group_pos());
        match self.next_step() {
            Step::Read { bits, value } => match pstate.cursor_mut().read_bits(bits) {
                Ok(_) => {
                    pstate.add_simple_child(self.name.clone(), SimpleValue::Integer(value));
                    ParseAttemptStatus::Success
                }
                Err(_) => {
                    pstate.set_failure(ParseError::new("premature end of data", pstate.bit_pos0b()));
                    ParseAttemptStatus::MissingItem
                }
            },
            Step::ZeroWidth { value } => {
                pstate.add_simple_child(self.name.clone(), SimpleValue::Integer(value));
                ParseAttemptStatus::Success
            }
            Step::EmptyRep => {
                pstate.add_simple_child(self.name.clone(), SimpleValue::Text(String::new()));
                ParseAttemptStatus::SuccessEmptyRep
            }
            Step::Absent { probe_bits } => {
                let _ = pstate.cursor_mut().read_bits(probe_bits);
                ParseAttemptStatus::AbsentRep
            }
            Step::Fail { consume_bits, message } => {
                let _ = pstate.cursor_mut().read_bits(consume_bits);
                pstate.set_failure(ParseError::new(message, pstate.bit_pos0b()));
                ParseAttemptStatus::MissingItem
            }
            Step::DiscriminateThenFail { consume_bits } => {
                let _ = pstate.cursor_mut().read_bits(consume_bits);
                pstate.resolve_point_of_uncertainty();
                pstate.set_failure(ParseError::new("failed past discriminator", pstate.bit_pos0b()));
                ParseAttemptStatus::FailureUnspecified
            }
            Step::MissingSepEnd => ParseAttemptStatus::MissingSeparator,
            Step::Compute => ParseAttemptStatus::Success,
            Step::Inconsistent => {
                pstate.set_failure(ParseError::new("inconsistent", pstate.bit_pos0b()));
                ParseAttemptStatus::Success
            }
        }
    }

    fn final_checks(
        &self,
        _pstate: &mut PState<'_>,
        last: ParseAttemptStatus,
        prior: ParseAttemptStatus,
    ) {
        *self.final_checks_seen.borrow_mut() = Some((last, prior));
    }
}
