//! Mutable parse state (`PState`) and the point-of-uncertainty manager.
//!
//! One `PState` is exclusively owned by one parse invocation: the bit cursor,
//! the processor status, the infoset under construction, the 1-based group
//! and array position counters (child parsers read them for separator
//! decisions, DFDL v1.0 §14.2), and the stack of point-of-uncertainty marks.
//!
//! Marks folgen der Checkpoint-Disziplin eines Bit-Writers mit Rollback:
//! `mark` legt einen Snapshot auf den Stack, `discard` committet (Snapshot
//! weg, Seiteneffekte bleiben), `reset` rollt zurück. Nur die oberste Mark
//! darf aufgelöst werden; Verstöße sind Programmierfehler und brechen ab.

use std::rc::Rc;

use crate::bitstream::BitCursor;
use crate::error::ParseError;
use crate::infoset::{Infoset, NodeId, SimpleValue};
use crate::tunables::Tunables;

/// Success or failure of the processor, with the failure cause.
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessorStatus {
    Success,
    Failure(ParseError),
}

/// Handle to a live point-of-uncertainty mark (stack index).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PouId(usize);

/// Snapshot einer Mark: genug Zustand, um Bit-Position, Infoset-Größe,
/// Zähler und Parent-Kette exakt wiederherzustellen.
#[derive(Debug, Clone)]
struct PouMark {
    label: &'static str,
    /// Term-Identität für Diagnostik (prefixed name).
    context: Rc<str>,
    /// True once a discriminator committed this mark.
    resolved: bool,
    bit_pos0b: u64,
    node_count: usize,
    parent_child_count: usize,
    open_parents: Vec<NodeId>,
    array_index_stack: Vec<u64>,
    group_index_stack: Vec<u64>,
}

/// Mutable cursor over the input bit stream and its companion infoset.
pub struct PState<'a> {
    cursor: BitCursor<'a>,
    status: ProcessorStatus,
    infoset: Infoset,
    /// Offene komplexe Knoten; das letzte Element ist der aktuelle Parent.
    open_parents: Vec<NodeId>,
    /// 1-based occurrence index per nested array (top = `array_pos`).
    array_index_stack: Vec<u64>,
    /// 1-based child index per nested group (top = `group_pos`).
    group_index_stack: Vec<u64>,
    tunables: Tunables,
    pou_marks: Vec<PouMark>,
}

impl<'a> PState<'a> {
    /// Creates a parse state over `data` with a complex root node `root_name`.
    pub fn new(data: &'a [u8], root_name: Rc<str>, tunables: Tunables) -> Self {
        let infoset = Infoset::with_capacity(root_name, tunables.initial_infoset_capacity);
        let root = infoset.root();
        Self {
            cursor: BitCursor::new(data),
            status: ProcessorStatus::Success,
            infoset,
            open_parents: vec![root],
            array_index_stack: vec![1],
            group_index_stack: vec![1],
            tunables,
            pou_marks: Vec::new(),
        }
    }

    // ------------------------------------------------------------------
    // Cursor
    // ------------------------------------------------------------------

    /// The input cursor.
    pub fn cursor(&self) -> &BitCursor<'a> {
        &self.cursor
    }

    /// The input cursor, mutable (child parsers consume bits through this).
    pub fn cursor_mut(&mut self) -> &mut BitCursor<'a> {
        &mut self.cursor
    }

    /// Current absolute bit position (0-based).
    pub fn bit_pos0b(&self) -> u64 {
        self.cursor.bit_pos0b()
    }

    /// Rewinds to a bit position observed earlier in this parse.
    pub(crate) fn rewind_to(&mut self, bit_pos0b: u64) {
        self.cursor
            .seek_bit_pos0b(bit_pos0b)
            .expect("rewind target was observed earlier and is in bounds");
    }

    // ------------------------------------------------------------------
    // Processor status
    // ------------------------------------------------------------------

    /// The processor status.
    pub fn processor_status(&self) -> &ProcessorStatus {
        &self.status
    }

    /// True when the processor status is `Success`.
    pub fn is_success(&self) -> bool {
        matches!(self.status, ProcessorStatus::Success)
    }

    /// True when the processor status is `Failure`.
    pub fn is_failure(&self) -> bool {
        !self.is_success()
    }

    /// The current failure cause, if any.
    pub fn failure(&self) -> Option<&ParseError> {
        match &self.status {
            ProcessorStatus::Failure(pe) => Some(pe),
            ProcessorStatus::Success => None,
        }
    }

    /// Records a recoverable processing error.
    pub fn set_failure(&mut self, cause: ParseError) {
        self.status = ProcessorStatus::Failure(cause);
    }

    /// Sets the status to `Success`, masking a recorded failure.
    pub fn set_success(&mut self) {
        self.status = ProcessorStatus::Success;
    }

    /// Removes and returns the failure cause, leaving `Success`.
    ///
    /// Für Cause-Verkettung: der Treiber nimmt den Kind-Fehler heraus und
    /// legt unmittelbar danach den umhüllenden Fehler ab.
    pub fn take_failure(&mut self) -> Option<ParseError> {
        match std::mem::replace(&mut self.status, ProcessorStatus::Success) {
            ProcessorStatus::Failure(pe) => Some(pe),
            ProcessorStatus::Success => None,
        }
    }

    // ------------------------------------------------------------------
    // Position counters (DFDL v1.0 §14.2 separator decisions)
    // ------------------------------------------------------------------

    /// 1-based occurrence index within the innermost repeating element.
    pub fn array_pos(&self) -> u64 {
        *self.array_index_stack.last().expect("array index stack is never empty")
    }

    /// 1-based child index within the innermost group.
    pub fn group_pos(&self) -> u64 {
        *self.group_index_stack.last().expect("group index stack is never empty")
    }

    /// Depth of the group index stack (balance checks).
    pub fn group_index_stack_depth(&self) -> usize {
        self.group_index_stack.len()
    }

    /// The configured tunables.
    pub fn tunables(&self) -> &Tunables {
        &self.tunables
    }

    pub(crate) fn increment_array_pos(&mut self) {
        *self.array_index_stack.last_mut().expect("array index stack is never empty") += 1;
    }

    pub(crate) fn increment_group_pos(&mut self) {
        *self.group_index_stack.last_mut().expect("group index stack is never empty") += 1;
    }

    pub(crate) fn begin_array(&mut self) {
        self.array_index_stack.push(1);
    }

    pub(crate) fn end_array(&mut self) {
        assert!(self.array_index_stack.len() > 1, "end_array ohne begin_array");
        self.array_index_stack.pop();
    }

    pub(crate) fn push_group_index(&mut self) {
        self.group_index_stack.push(1);
    }

    pub(crate) fn pop_group_index(&mut self) {
        assert!(self.group_index_stack.len() > 1, "pop_group_index ohne push");
        self.group_index_stack.pop();
    }

    // ------------------------------------------------------------------
    // Infoset
    // ------------------------------------------------------------------

    /// The infoset under construction.
    pub fn infoset(&self) -> &Infoset {
        &self.infoset
    }

    /// The complex node children are currently appended under.
    pub fn current_parent(&self) -> NodeId {
        *self.open_parents.last().expect("open parent chain is never empty")
    }

    /// Appends a simple-valued child under the current parent.
    pub fn add_simple_child(&mut self, name: Rc<str>, value: SimpleValue) -> NodeId {
        let parent = self.current_parent();
        self.infoset.append_simple(parent, name, value)
    }

    /// Appends a complex child under the current parent and makes it the
    /// current parent (nested model group entry).
    pub fn begin_complex_child(&mut self, name: Rc<str>) -> NodeId {
        let parent = self.current_parent();
        let id = self.infoset.append_complex(parent, name);
        self.open_parents.push(id);
        id
    }

    /// Closes the current complex child (nested model group exit).
    pub fn end_complex_child(&mut self) {
        assert!(self.open_parents.len() > 1, "end_complex_child ohne begin");
        self.open_parents.pop();
    }

    pub(crate) fn reorder_children_tail(&mut self, parent: NodeId, start: usize, sorted: Vec<NodeId>) {
        self.infoset.reorder_children_tail(parent, start, sorted);
    }

    // ------------------------------------------------------------------
    // Point-of-uncertainty marks
    // ------------------------------------------------------------------

    /// Number of live marks (balance checks).
    pub fn pou_depth(&self) -> usize {
        self.pou_marks.len()
    }

    /// Snapshots the mutable state and pushes a mark.
    ///
    /// Marks werden nur im Success-Zustand gesetzt; der Treiber versucht
    /// nach einem Fehlschlag keine weiteren Kinder.
    pub fn mark_point_of_uncertainty(&mut self, label: &'static str, context: Rc<str>) -> PouId {
        assert!(
            self.is_success(),
            "point of uncertainty marked in failure state ({label}, {context})"
        );
        let parent = self.current_parent();
        self.pou_marks.push(PouMark {
            label,
            context,
            resolved: false,
            bit_pos0b: self.bit_pos0b(),
            node_count: self.infoset.node_count(),
            parent_child_count: self.infoset.child_count(parent),
            open_parents: self.open_parents.clone(),
            array_index_stack: self.array_index_stack.clone(),
            group_index_stack: self.group_index_stack.clone(),
        });
        PouId(self.pou_marks.len() - 1)
    }

    fn pop_top_mark(&mut self, id: PouId, op: &str) -> PouMark {
        assert_eq!(
            id.0 + 1,
            self.pou_marks.len(),
            "{op} on a mark that is not the top of the stack"
        );
        self.pou_marks.pop().expect("stack non-empty, asserted above")
    }

    /// Commits: drops the snapshot, keeps all side effects.
    pub fn discard_point_of_uncertainty(&mut self, id: PouId) {
        let _ = self.pop_top_mark(id, "discard");
    }

    /// Rolls back: restores the snapshot and sets the status to `Success`
    /// (the point of uncertainty recovers a soft failure).
    pub fn reset_point_of_uncertainty(&mut self, id: PouId) {
        let mark = self.pop_top_mark(id, "reset");
        self.rewind_to(mark.bit_pos0b);
        self.open_parents = mark.open_parents;
        let parent = self.current_parent();
        self.infoset.truncate(parent, mark.node_count, mark.parent_child_count);
        self.array_index_stack = mark.array_index_stack;
        self.group_index_stack = mark.group_index_stack;
        self.status = ProcessorStatus::Success;
    }

    /// Resolves the nearest mark (a discriminator matched): failures past
    /// this point can no longer be backtracked. No-op when no mark is live
    /// (die Spekulation gehört dann einer äußeren Ebene).
    pub fn resolve_point_of_uncertainty(&mut self) {
        if let Some(mark) = self.pou_marks.last_mut() {
            mark.resolved = true;
        }
    }

    /// True when the mark was resolved by a discriminator.
    pub fn is_resolved(&self, id: PouId) -> bool {
        assert!(id.0 < self.pou_marks.len(), "is_resolved on a released mark");
        self.pou_marks[id.0].resolved
    }

    /// Runs `body` under a fresh mark. When the body completes without having
    /// discarded or reset the mark, it is discarded here, on every exit path
    /// of the driver. A body that leaks a nested mark aborts.
    pub fn with_point_of_uncertainty<T>(
        &mut self,
        label: &'static str,
        context: Rc<str>,
        body: impl FnOnce(&mut Self, PouId) -> T,
    ) -> T {
        let id = self.mark_point_of_uncertainty(label, context);
        let out = body(self, id);
        assert!(
            self.pou_marks.len() <= id.0 + 1,
            "body of '{label}' leaked a nested point of uncertainty"
        );
        if self.pou_marks.len() == id.0 + 1 {
            self.discard_point_of_uncertainty(id);
        }
        out
    }

    /// Label and context of a live mark (Diagnostik).
    pub fn mark_description(&self, id: PouId) -> (&'static str, &Rc<str>) {
        assert!(id.0 < self.pou_marks.len(), "mark_description on a released mark");
        let mark = &self.pou_marks[id.0];
        (mark.label, &mark.context)
    }
}
