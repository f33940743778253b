//! Infoset tree accumulated during parsing.
//!
//! The infoset is the tree of parsed values (DFDL v1.0 §4). Nodes live in an
//! arena and are addressed by [`NodeId`]; a complex node owns an ordered list
//! of child ids. Appends during a speculative attempt always create ids at
//! the arena tail, so rollback is a pair of truncations (arena + parent child
//! list). Das macht verschachtelte Marks billig und vermeidet zyklische
//! Ownership.

use core::fmt;
use std::rc::Rc;

/// Arena index of an infoset node. Copy, 4 Bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(u32);

impl NodeId {
    fn index(self) -> usize {
        self.0 as usize
    }
}

/// A typed leaf value.
///
/// Reduziert auf die Repräsentationen, die der Sequenz-Treiber und seine
/// Tests brauchen; weitere DFDL Simple Types docken hier an.
#[derive(Debug, Clone, PartialEq)]
pub enum SimpleValue {
    Text(String),
    Integer(i64),
    Boolean(bool),
    HexBinary(Vec<u8>),
}

impl fmt::Display for SimpleValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => write!(f, "{s}"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Boolean(b) => write!(f, "{b}"),
            Self::HexBinary(bytes) => {
                for b in bytes {
                    write!(f, "{b:02X}")?;
                }
                Ok(())
            }
        }
    }
}

/// Content of an infoset node: simple value or ordered children.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeContent {
    Simple(SimpleValue),
    Complex(Vec<NodeId>),
}

/// One infoset node.
#[derive(Debug, Clone, PartialEq)]
pub struct InfosetNode {
    /// Prefixed element name (geteilt mit dem TRD des erzeugenden Terms).
    name: Rc<str>,
    content: NodeContent,
}

impl InfosetNode {
    /// Prefixed element name.
    pub fn name(&self) -> &Rc<str> {
        &self.name
    }

    /// The node content.
    pub fn content(&self) -> &NodeContent {
        &self.content
    }

    /// The simple value, `None` for complex nodes.
    pub fn simple_value(&self) -> Option<&SimpleValue> {
        match &self.content {
            NodeContent::Simple(v) => Some(v),
            NodeContent::Complex(_) => None,
        }
    }
}

/// Arena-backed infoset document.
///
/// Erzeugt bei Konstruktion einen komplexen Wurzelknoten. Kindlisten wachsen
/// nur am Ende; `truncate` schneidet Arena und Kindliste synchron zurück
/// (Point-of-Uncertainty Rollback).
#[derive(Debug, Clone)]
pub struct Infoset {
    nodes: Vec<InfosetNode>,
    root: NodeId,
}

impl Infoset {
    /// Creates an infoset with a complex root node named `name`.
    pub fn new(name: Rc<str>) -> Self {
        Self::with_capacity(name, 16)
    }

    /// Creates an infoset with pre-allocated arena capacity.
    pub fn with_capacity(name: Rc<str>, capacity: usize) -> Self {
        let mut nodes = Vec::with_capacity(capacity.max(1));
        nodes.push(InfosetNode {
            name,
            content: NodeContent::Complex(Vec::new()),
        });
        Self { nodes, root: NodeId(0) }
    }

    /// The root node id.
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Number of nodes in the arena.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Borrows a node.
    ///
    /// # Panics
    ///
    /// Panics if `id` is not a live node of this infoset.
    pub fn node(&self, id: NodeId) -> &InfosetNode {
        &self.nodes[id.index()]
    }

    fn children_of(&self, parent: NodeId) -> &Vec<NodeId> {
        match &self.nodes[parent.index()].content {
            NodeContent::Complex(children) => children,
            NodeContent::Simple(_) => {
                panic!("node '{}' is simple, not a model group parent", self.nodes[parent.index()].name)
            }
        }
    }

    fn children_of_mut(&mut self, parent: NodeId) -> &mut Vec<NodeId> {
        match &mut self.nodes[parent.index()].content {
            NodeContent::Complex(children) => children,
            NodeContent::Simple(_) => panic!("simple node used as a model group parent"),
        }
    }

    /// Ordered children of a complex node.
    ///
    /// # Panics
    ///
    /// Panics if `parent` is a simple node.
    pub fn children(&self, parent: NodeId) -> &[NodeId] {
        self.children_of(parent)
    }

    /// Number of children of a complex node.
    pub fn child_count(&self, parent: NodeId) -> usize {
        self.children_of(parent).len()
    }

    /// Appends a simple-valued child under `parent`.
    pub fn append_simple(&mut self, parent: NodeId, name: Rc<str>, value: SimpleValue) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(InfosetNode {
            name,
            content: NodeContent::Simple(value),
        });
        self.children_of_mut(parent).push(id);
        id
    }

    /// Appends an empty complex child under `parent`.
    pub fn append_complex(&mut self, parent: NodeId, name: Rc<str>) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(InfosetNode {
            name,
            content: NodeContent::Complex(Vec::new()),
        });
        self.children_of_mut(parent).push(id);
        id
    }

    /// Rolls the infoset back to a snapshot taken as
    /// `(node_count, child_count(parent))`.
    ///
    /// Alle seit dem Snapshot erzeugten Knoten liegen am Arena-Ende und alle
    /// neuen Kinder von `parent` am Listen-Ende; beides wird abgeschnitten.
    ///
    /// # Panics
    ///
    /// Panics if the snapshot values exceed the current sizes (mis-nested
    /// rollback).
    pub fn truncate(&mut self, parent: NodeId, node_count: usize, child_count: usize) {
        assert!(
            node_count <= self.nodes.len(),
            "infoset rollback to node_count {node_count} but arena has {}",
            self.nodes.len()
        );
        assert!(
            child_count <= self.child_count(parent),
            "infoset rollback to child_count {child_count} but parent has {}",
            self.child_count(parent)
        );
        self.nodes.truncate(node_count);
        let children = self.children_of_mut(parent);
        children.truncate(child_count);
        debug_assert!(
            children.iter().all(|c| c.index() < node_count),
            "Kindliste referenziert abgeschnittene Knoten"
        );
    }

    /// Replaces the tail `parent.children[start..]` with a permutation of
    /// itself (unordered-sequence reordering).
    ///
    /// # Panics
    ///
    /// Panics if `sorted` is not a permutation of the current tail.
    pub fn reorder_children_tail(&mut self, parent: NodeId, start: usize, sorted: Vec<NodeId>) {
        let children = self.children_of_mut(parent);
        assert!(
            start <= children.len() && children.len() - start == sorted.len(),
            "reorder tail length mismatch: {} given, {} present",
            sorted.len(),
            children.len() - start
        );
        debug_assert!(
            {
                let mut a: Vec<u32> = children[start..].iter().map(|n| n.0).collect();
                let mut b: Vec<u32> = sorted.iter().map(|n| n.0).collect();
                a.sort_unstable();
                b.sort_unstable();
                a == b
            },
            "reorder tail is not a permutation"
        );
        children[start..].clone_from_slice(&sorted);
    }
}
