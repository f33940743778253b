//! The sequence combinator drivers (DFDL v1.0 §14).
//!
//! [`SequenceParser::parse`] walks the compiled child terms of one sequence
//! group: scalars parse once, repeating children run the occurrence loop
//! with speculative termination, non-represented children run for their side
//! effects only. Speculative attempts are bracketed by point-of-uncertainty
//! marks so a failed speculation rolls the state back without losing the
//! occurrences that already committed.
//!
//! Der Treiber ist geradliniger synchroner Code ohne Suspension-Punkte; ein
//! `PState` gehört für die Dauer eines parse() exklusiv genau einem Treiber.

use std::rc::Rc;

use log::{trace, warn};

use crate::child::{ChildCommon, RepeatingChild, SequenceChild};
use crate::error::ParseError;
use crate::infoset::NodeId;
use crate::pstate::{PState, PouId};
use crate::schema::{SequenceKind, SequenceRuntimeData};
use crate::status::{ArrayIndexStatus, ParseAttemptStatus, PoUStatus, RequiredOptionalStatus};
use crate::{Error, FastHashMap, FastIndexMap, Result};

/// Compiled parser of one sequence group.
pub struct SequenceParser {
    srd: Rc<SequenceRuntimeData>,
    children: Vec<SequenceChild>,
    /// Member-Name → deklarierter Rang, für das Einsortieren beim Abschluss
    /// einer unordered Sequenz. Leer für ordered Sequenzen.
    declared_ranks: FastIndexMap<Rc<str>, usize>,
}

impl SequenceParser {
    /// Creates a sequence parser from its compiled runtime data and children.
    pub fn new(srd: Rc<SequenceRuntimeData>, children: Vec<SequenceChild>) -> Self {
        let declared_ranks = srd
            .unordered_members()
            .iter()
            .enumerate()
            .map(|(rank, member)| (member.name().clone(), rank))
            .collect();
        Self { srd, children, declared_ranks }
    }

    /// The compiled runtime data of this sequence.
    pub fn runtime_data(&self) -> &Rc<SequenceRuntimeData> {
        &self.srd
    }

    /// True for ordered sequences (DFDL v1.0 §14).
    pub fn is_ordered(&self) -> bool {
        self.srd.kind() == SequenceKind::Ordered
    }

    /// Parses one instance of this sequence group.
    ///
    /// Recoverable failures land in the processor status; `Err` is reserved
    /// for fatal errors (occurrence safety cap). On either outcome the group
    /// index stack is restored to its entry depth and every mark created
    /// here has been discarded or reset.
    pub fn parse(&self, pstate: &mut PState<'_>) -> Result<()> {
        let entry_depth = pstate.group_index_stack_depth();
        let entry_pou_depth = pstate.pou_depth();
        pstate.push_group_index();
        let out = self.parse_children(pstate);
        pstate.pop_group_index();
        debug_assert_eq!(
            pstate.group_index_stack_depth(),
            entry_depth,
            "group index stack unbalanced after sequence"
        );
        debug_assert_eq!(
            pstate.pou_depth(),
            entry_pou_depth,
            "point of uncertainty leaked by sequence"
        );
        out
    }

    // ------------------------------------------------------------------
    // Outer loop over child terms
    // ------------------------------------------------------------------

    fn parse_children(&self, pstate: &mut PState<'_>) -> Result<()> {
        let parent = pstate.current_parent();
        let infoset_start = pstate.infoset().child_count(parent);
        let limit = self.children.len();
        let mut scp_index = 0;
        let mut prior = ParseAttemptStatus::Uninitialized;
        let mut result = ParseAttemptStatus::Uninitialized;
        let mut is_done = false;
        let mut last_child: Option<&SequenceChild> = None;

        while !is_done && scp_index < limit && pstate.is_success() {
            let child = &self.children[scp_index];
            last_child = Some(child);
            match child {
                SequenceChild::Repeating(rep) => {
                    let (p, r) = self.parse_all_repeats(rep, pstate)?;
                    prior = p;
                    result = r;
                }
                SequenceChild::NonRepresented(nr) => {
                    // Ergebnis wird nicht konsultiert, group_pos rückt nicht
                    // vor; nur der Processor-Status zählt.
                    let _ = nr.common.parser.parse_one(pstate, None);
                }
                SequenceChild::Scalar(sc) => {
                    let ro = sc.static_required_optional_status();
                    let (_, next) = self.parse_one_instance(
                        &sc.common,
                        ro,
                        ArrayIndexStatus::Uninitialized,
                        pstate,
                    )?;
                    prior = result;
                    result = next;
                    match result {
                        ParseAttemptStatus::AbsentRep => {
                            // Trailing-Position: fehlender optionaler Inhalt
                            // ist hier erlaubt, die Sequenz endet erfolgreich.
                            pstate.set_success();
                            is_done = true;
                        }
                        ParseAttemptStatus::UnorderedSeqDiscriminatedFailure => {
                            is_done = true;
                        }
                        ParseAttemptStatus::MissingItem
                        | ParseAttemptStatus::MissingSeparator
                        | ParseAttemptStatus::FailureUnspecified
                            if !self.is_ordered() =>
                        {
                            // Keine Alternative passt mehr: reguläres Ende
                            // der unordered Sequenz.
                            is_done = true;
                            pstate.set_success();
                        }
                        _ => {}
                    }
                    pstate.increment_group_pos();
                }
            }
            if self.is_ordered() {
                scp_index += 1;
            } else if is_done {
                self.flatten_and_validate_child_nodes(pstate, parent, infoset_start);
            }
        }

        if let Some(child) = last_child {
            child.common().parser.final_checks(pstate, result, prior);
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Occurrence loop of one repeating child
    // ------------------------------------------------------------------

    fn parse_all_repeats(
        &self,
        rep: &RepeatingChild,
        pstate: &mut PState<'_>,
    ) -> Result<(ParseAttemptStatus, ParseAttemptStatus)> {
        rep.start_array(pstate);
        let out = self.occurrence_loop(rep, pstate);
        rep.end_array(pstate);
        out
    }

    fn occurrence_loop(
        &self,
        rep: &RepeatingChild,
        pstate: &mut PState<'_>,
    ) -> Result<(ParseAttemptStatus, ParseAttemptStatus)> {
        let mut prior = ParseAttemptStatus::Uninitialized;
        let mut result = ParseAttemptStatus::Uninitialized;
        let mut successes: u64 = 0;
        let mut stopped_by_stall = false;

        loop {
            let mut ais = rep.array_index_status(pstate);
            if pstate.is_failure() || ais.is_done() {
                break;
            }
            let ro = match ais.required_optional() {
                Some(ro) => ro,
                None => unreachable!("non-done index status has a required/optional view"),
            };
            let prior_pos = pstate.bit_pos0b();
            let (next_ais, next) = self.parse_one_instance(&rep.common, ro, ais, pstate)?;
            ais = next_ais;
            prior = result;
            result = next;
            if result.is_success() {
                successes += 1;
            }
            let curr_pos = pstate.bit_pos0b();
            if pstate.is_success()
                && !rep.is_bounded_max()
                && (result.is_absent() || result.is_success())
            {
                ais = self.check_forward_progress(rep, curr_pos, prior_pos, ais, pstate);
                if ais.is_done() && pstate.is_failure() {
                    stopped_by_stall = true;
                }
            }
            if !ais.is_done() {
                pstate.increment_array_pos();
            }
            if curr_pos > prior_pos
                || (result.is_absent() && pstate.is_success() && rep.is_positional())
                || result.is_success()
            {
                pstate.increment_group_pos();
            }
            if ais.is_done() {
                break;
            }
        }

        // Der Stall-Guard beendet die Schleife mit einem Processing Error;
        // sind die Pflicht-Occurrences bereits geparst, ist das Array damit
        // lediglich zu Ende und der Fehler wird maskiert.
        if stopped_by_stall && successes >= rep.min_repeats(pstate) {
            pstate.set_success();
        }
        Ok((prior, result))
    }

    /// Stall guard: a zero-width match past group position 1 would loop
    /// forever, so it terminates the occurrence loop instead.
    fn check_forward_progress(
        &self,
        rep: &RepeatingChild,
        curr_pos: u64,
        prior_pos: u64,
        ais: ArrayIndexStatus,
        pstate: &mut PState<'_>,
    ) -> ArrayIndexStatus {
        assert!(
            curr_pos >= prior_pos,
            "bit position moved backwards across a successful attempt: {curr_pos} < {prior_pos}"
        );
        if curr_pos == prior_pos && pstate.group_pos() > 1 {
            warn!(
                "array {}: no forward progress at bit {curr_pos}, terminating occurrence loop",
                rep.common.trd.prefixed_name()
            );
            pstate.set_failure(
                ParseError::no_forward_progress(curr_pos, pstate.group_pos())
                    .with_location(rep.common.trd.schema_location().clone()),
            );
            ArrayIndexStatus::Done
        } else {
            ais
        }
    }

    // ------------------------------------------------------------------
    // One occurrence, with or without a point of uncertainty
    // ------------------------------------------------------------------

    fn parse_one_instance(
        &self,
        common: &ChildCommon,
        ro_status: RequiredOptionalStatus,
        ais: ArrayIndexStatus,
        pstate: &mut PState<'_>,
    ) -> Result<(ArrayIndexStatus, ParseAttemptStatus)> {
        // Unordered Sequenzen überlassen die Spekulation der Choice-Ebene;
        // Pflicht-Occurrences werden nie zurückgerollt.
        let needs_pou = self.is_ordered()
            && common.pou_status == PoUStatus::HasPoU
            && !ro_status.is_required();
        if needs_pou {
            let context = common.trd.prefixed_name().clone();
            pstate.with_point_of_uncertainty("speculative occurrence", context, |pstate, pou| {
                self.parse_one_instance_with_maybe_pou(common, ro_status, ais, pstate, Some(pou))
            })
        } else {
            self.parse_one_instance_with_maybe_pou(common, ro_status, ais, pstate, None)
        }
    }

    fn parse_one_instance_with_maybe_pou(
        &self,
        common: &ChildCommon,
        ro_status: RequiredOptionalStatus,
        mut ais: ArrayIndexStatus,
        pstate: &mut PState<'_>,
        pou: Option<PouId>,
    ) -> Result<(ArrayIndexStatus, ParseAttemptStatus)> {
        self.check_occurs_limit(common, pstate)?;
        let prior_pos = pstate.bit_pos0b();
        trace!(
            "parse_one {} at bit {prior_pos} ({ro_status:?}, pou: {})",
            common.trd.prefixed_name(),
            pou.is_some()
        );
        let mut result = common.parser.parse_one(pstate, Some(ro_status));
        let curr_pos = pstate.bit_pos0b();
        let resolved = match pou {
            Some(id) => pstate.is_resolved(id),
            None => true,
        };
        assert_status_consistent(pstate, result);

        if result.is_success() {
            // Commit: Snapshot weg, Seiteneffekte bleiben.
            if let Some(id) = pou {
                pstate.discard_point_of_uncertainty(id);
            }
        } else if result.is_absent() {
            if let Some(id) = pou {
                assert!(!resolved, "absent representation after a resolved discriminator");
                pstate.reset_point_of_uncertainty(id);
            }
            // Probierte Syntax (z.B. ein Separator) wird zurückgegeben: nach
            // einem AbsentRep steht die Bit-Position immer auf dem Wert vor
            // dem Versuch, mit oder ohne Mark.
            if pstate.bit_pos0b() != prior_pos {
                pstate.rewind_to(prior_pos);
            }
        } else if result.is_missing_separator() && pstate.is_success() {
            // Kein Separator, aber kein Fehler: die Wiederholung endet hier.
            ais = ArrayIndexStatus::Done;
        } else if result.is_failed() {
            assert!(
                pstate.is_failure(),
                "failed attempt status {result:?} with successful processor status"
            );
            match pou {
                Some(id) if !resolved && ro_status.is_optional() => {
                    // Gescheiterte Spekulation: Rollback, das Array endet
                    // sauber mit den bereits committeten Occurrences.
                    pstate.reset_point_of_uncertainty(id);
                }
                Some(_) if resolved => {
                    // Ein Diskriminator hat committet: der Fehler ist
                    // endgültig und unterdrückt weitere Alternativen. Die
                    // Mark räumt der umgebende Scope ab.
                    result = ParseAttemptStatus::UnorderedSeqDiscriminatedFailure;
                }
                _ => {
                    if common.trd.is_array() {
                        let cause = pstate.take_failure();
                        pstate.set_failure(
                            ParseError::failed_to_populate(
                                common.trd.prefixed_name(),
                                pstate.array_pos(),
                                curr_pos,
                                cause,
                            )
                            .with_location(common.trd.schema_location().clone()),
                        );
                    }
                }
            }
            ais = ArrayIndexStatus::Done;
        } else {
            unreachable!("parse_one returned {result:?}");
        }
        Ok((ais, result))
    }

    /// Occurrence safety cap. Fatal, deliberately outside every point of
    /// uncertainty.
    fn check_occurs_limit(&self, common: &ChildCommon, pstate: &mut PState<'_>) -> Result<()> {
        let limit = pstate.tunables().max_occurs_bounds();
        let pos = pstate.array_pos();
        if pos > limit {
            let err = Error::occurs_bounds_exceeded(&**common.trd.prefixed_name(), pos, limit);
            pstate.set_failure(
                ParseError::new(err.to_string(), pstate.bit_pos0b())
                    .with_location(common.trd.schema_location().clone()),
            );
            return Err(err);
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Unordered termination (DFDL v1.0 §14.3)
    // ------------------------------------------------------------------

    /// Brings the children parsed since `infoset_start` into declared member
    /// order (stable within one name) and validates the per-member
    /// occurrence counts.
    fn flatten_and_validate_child_nodes(
        &self,
        pstate: &mut PState<'_>,
        parent: NodeId,
        infoset_start: usize,
    ) {
        let tail: Vec<NodeId> = pstate.infoset().children(parent)[infoset_start..].to_vec();

        let mut counts: FastHashMap<Rc<str>, u64> = FastHashMap::default();
        let mut ranked: Vec<(usize, usize, NodeId)> = Vec::with_capacity(tail.len());
        let mut unexpected: Option<Rc<str>> = None;
        for (arrival, &id) in tail.iter().enumerate() {
            let name = pstate.infoset().node(id).name().clone();
            let rank = match self.declared_ranks.get(&*name) {
                Some(&rank) => rank,
                None => {
                    // Unbekannte Namen ans Ende, in Ankunftsreihenfolge.
                    if unexpected.is_none() {
                        unexpected = Some(name.clone());
                    }
                    self.declared_ranks.len()
                }
            };
            *counts.entry(name).or_insert(0) += 1;
            ranked.push((rank, arrival, id));
        }
        ranked.sort_by_key(|&(rank, arrival, _)| (rank, arrival));
        let sorted: Vec<NodeId> = ranked.iter().map(|&(_, _, id)| id).collect();
        pstate.reorder_children_tail(parent, infoset_start, sorted);

        // Occurrence-Validierung nur, wenn die Sequenz nicht ohnehin schon
        // fehlgeschlagen ist.
        if pstate.is_failure() {
            return;
        }
        let location = self.srd.trd().schema_location().clone();
        if let Some(name) = unexpected {
            pstate.set_failure(
                ParseError::new(
                    format!("unordered sequence: unexpected element {name}"),
                    pstate.bit_pos0b(),
                )
                .with_location(location),
            );
            return;
        }
        for member in self.srd.unordered_members() {
            let n = counts.get(member.name()).copied().unwrap_or(0);
            if !member.occurs().contains(n) {
                pstate.set_failure(
                    ParseError::new(
                        format!(
                            "unordered sequence: element {} occurred {n} times, expected {}",
                            member.name(),
                            member.occurs()
                        ),
                        pstate.bit_pos0b(),
                    )
                    .with_location(location.clone()),
                );
                return;
            }
        }
    }
}

/// Ein Fehlschlag impliziert Failure-Status und failed-Variante, ein Erfolg
/// impliziert Success-Status und success/absent-Variante. `MissingSeparator`
/// ist ausgenommen: mit Success-Status signalisiert es das reguläre Ende der
/// Sequenz.
fn assert_status_consistent(pstate: &PState<'_>, result: ParseAttemptStatus) {
    if result.is_missing_separator() {
        return;
    }
    assert!(
        pstate.is_success() == (result.is_success() || result.is_absent()),
        "processor status {:?} diverges from attempt status {result:?}",
        pstate.processor_status()
    );
}
