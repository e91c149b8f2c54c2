//! The resolved configuration model.
//!
//! A [`Config`] is only ever produced by [`crate::check`], so every name
//! reference in it has already been resolved to an index into one of the
//! entity tables.

use fxhash::FxHashMap;

pub use crate::surface::PrimType;

pub mod pretty;

macro_rules! entity_ids {
    ($($(#[$meta:meta])* $Id:ident => $field:ident: $Entity:ident,)*) => {
        $(
            $(#[$meta])*
            #[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
            pub struct $Id(pub usize);

            impl std::ops::Index<$Id> for Config {
                type Output = $Entity;

                fn index(&self, id: $Id) -> &$Entity {
                    &self.$field[id.0]
                }
            }
        )*
    };
}

entity_ids! {
    NodeId => nodes: Node,
    NodesetId => nodesets: Nodeset,
    EnumId => enums: Enum,
    TraversalId => traversals: Traversal,
    PassId => passes: Pass,
    /// Phases are numbered in declaration order, which is also the order
    /// used for mandatory phase ranges.
    PhaseId => phases: Phase,
}

/// The type of a child slot, or of the root of the tree.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum NodeType {
    Node(NodeId),
    Nodeset(NodesetId),
}

/// Any named entity.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Symbol {
    Node(NodeId),
    Nodeset(NodesetId),
    Enum(EnumId),
    Traversal(TraversalId),
    Pass(PassId),
    Phase(PhaseId),
}

impl Symbol {
    pub fn kind(self) -> &'static str {
        match self {
            Symbol::Node(_) => "node",
            Symbol::Nodeset(_) => "nodeset",
            Symbol::Enum(_) => "enum",
            Symbol::Traversal(_) => "traversal",
            Symbol::Pass(_) => "pass",
            Symbol::Phase(_) => "phase",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub nodes: Vec<Node>,
    pub nodesets: Vec<Nodeset>,
    pub enums: Vec<Enum>,
    pub traversals: Vec<Traversal>,
    pub passes: Vec<Pass>,
    pub phases: Vec<Phase>,
    pub root_node: NodeType,
    pub root_phase: PhaseId,
    pub phase_tree: PhaseTree,
    symbols: FxHashMap<String, Symbol>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub name: String,
    pub info: Option<String>,
    pub children: Vec<Child>,
    pub attrs: Vec<Attr>,
    pub is_root: bool,
}

impl Node {
    pub fn child(&self, name: &str) -> Option<(usize, &Child)> {
        self.children.iter().enumerate().find(|(_, c)| c.name == name)
    }

    pub fn attr(&self, name: &str) -> Option<(usize, &Attr)> {
        self.attrs.iter().enumerate().find(|(_, a)| a.name == name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Child {
    pub name: String,
    pub r#type: NodeType,
    pub construct: bool,
    pub mandatory: bool,
    /// Empty when the child is mandatory in every phase.
    pub mandatory_phases: Vec<MandatoryPhase>,
}

/// An inclusive range of phases, possibly negated.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct MandatoryPhase {
    pub negated: bool,
    pub first: PhaseId,
    pub last: PhaseId,
}

impl MandatoryPhase {
    pub fn contains(&self, phase: PhaseId) -> bool {
        self.first <= phase && phase <= self.last
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Attr {
    pub name: String,
    pub r#type: AttrType,
    pub construct: bool,
    pub default: Option<AttrValue>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum AttrType {
    Prim(PrimType),
    /// A non-owning reference to another node instance.
    Link(NodeId),
    Enum(EnumId),
}

/// Resolved attribute default values.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    Int(i64),
    UInt(u64),
    Float(f64),
    Bool(bool),
    String(String),
    /// The index of a value in the attribute's enum.
    Enum(usize),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Nodeset {
    pub name: String,
    pub info: Option<String>,
    pub nodes: Vec<NodeId>,
    pub is_root: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Enum {
    pub name: String,
    pub info: Option<String>,
    pub prefix: String,
    pub values: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Traversal {
    pub name: String,
    pub info: Option<String>,
    /// The nodes with handlers, with nodesets already expanded. `None` when
    /// every node has a handler.
    pub nodes: Option<Vec<NodeId>>,
}

impl Traversal {
    pub fn handles(&self, node: NodeId) -> bool {
        match &self.nodes {
            None => true,
            Some(nodes) => nodes.contains(&node),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Pass {
    pub name: String,
    pub info: Option<String>,
    pub func: Option<String>,
}

impl Pass {
    /// The name of the user function implementing this pass.
    pub fn entry(&self) -> String {
        match &self.func {
            Some(func) => func.clone(),
            None => format!("pass_{}_entry", self.name),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Phase {
    pub name: String,
    pub info: Option<String>,
    pub is_root: bool,
    pub cycle: bool,
    pub body: PhaseBody,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PhaseBody {
    Subphases(Vec<PhaseId>),
    Actions(Vec<Action>),
}

/// A step of a leaf phase.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Action {
    Pass(PassId),
    Traversal(TraversalId),
}

/// The phases reachable from the root phase, in execution order.
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseTree {
    pub phase: PhaseId,
    pub kind: PhaseTreeKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PhaseTreeKind {
    Composite(Vec<PhaseTree>),
    Leaf(Vec<Action>),
}

impl PhaseTree {
    /// Visit every action in execution order.
    pub fn actions(&self) -> Vec<Action> {
        let mut actions = Vec::new();
        self.collect_actions(&mut actions);
        actions
    }

    fn collect_actions(&self, actions: &mut Vec<Action>) {
        match &self.kind {
            PhaseTreeKind::Composite(subtrees) => {
                subtrees.iter().for_each(|tree| tree.collect_actions(actions))
            }
            PhaseTreeKind::Leaf(leaf_actions) => actions.extend_from_slice(leaf_actions),
        }
    }
}

impl Config {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        nodes: Vec<Node>,
        nodesets: Vec<Nodeset>,
        enums: Vec<Enum>,
        traversals: Vec<Traversal>,
        passes: Vec<Pass>,
        phases: Vec<Phase>,
        root_node: NodeType,
        root_phase: PhaseId,
        phase_tree: PhaseTree,
    ) -> Config {
        let mut symbols = FxHashMap::default();
        let names = Iterator::chain(
            nodes.iter().enumerate().map(|(i, n)| (&n.name, Symbol::Node(NodeId(i)))),
            nodesets.iter().enumerate().map(|(i, n)| (&n.name, Symbol::Nodeset(NodesetId(i)))),
        )
        .chain(enums.iter().enumerate().map(|(i, e)| (&e.name, Symbol::Enum(EnumId(i)))))
        .chain(
            (traversals.iter().enumerate())
                .map(|(i, t)| (&t.name, Symbol::Traversal(TraversalId(i)))),
        )
        .chain(passes.iter().enumerate().map(|(i, p)| (&p.name, Symbol::Pass(PassId(i)))))
        .chain(phases.iter().enumerate().map(|(i, p)| (&p.name, Symbol::Phase(PhaseId(i)))));
        for (name, symbol) in names {
            symbols.insert(name.clone(), symbol);
        }

        Config {
            nodes,
            nodesets,
            enums,
            traversals,
            passes,
            phases,
            root_node,
            root_phase,
            phase_tree,
            symbols,
        }
    }

    pub fn lookup(&self, name: &str) -> Option<Symbol> {
        self.symbols.get(name).copied()
    }

    pub fn node_by_name(&self, name: &str) -> Option<NodeId> {
        match self.lookup(name)? {
            Symbol::Node(id) => Some(id),
            _ => None,
        }
    }

    pub fn node_ids(&self) -> impl ExactSizeIterator<Item = NodeId> {
        (0..self.nodes.len()).map(NodeId)
    }

    pub fn nodeset_ids(&self) -> impl ExactSizeIterator<Item = NodesetId> {
        (0..self.nodesets.len()).map(NodesetId)
    }

    /// Every node type, nodes first, in the order of the `NodeType` enum of
    /// the generated code.
    pub fn node_types(&self) -> impl Iterator<Item = NodeType> + '_ {
        Iterator::chain(
            self.node_ids().map(NodeType::Node),
            self.nodeset_ids().map(NodeType::Nodeset),
        )
    }

    pub fn type_name(&self, r#type: NodeType) -> &str {
        match r#type {
            NodeType::Node(id) => &self[id].name,
            NodeType::Nodeset(id) => &self[id].name,
        }
    }

    /// The nodes that may occupy a slot of the given type.
    pub fn type_members<'a>(&'a self, r#type: &'a NodeType) -> &'a [NodeId] {
        match r#type {
            NodeType::Node(id) => std::slice::from_ref(id),
            NodeType::Nodeset(id) => &self[*id].nodes,
        }
    }

    pub fn accepts(&self, r#type: NodeType, node: NodeId) -> bool {
        self.type_members(&r#type).contains(&node)
    }

    /// The nodesets containing a node, in declaration order.
    pub fn nodesets_of(&self, node: NodeId) -> impl Iterator<Item = NodesetId> + '_ {
        self.nodeset_ids()
            .filter(move |id| self[*id].nodes.contains(&node))
    }

    /// The transitive closure of the "may contain" relation between nodes.
    pub fn reachability(&self) -> Reachability {
        let len = self.nodes.len();
        let mut matrix = vec![false; len * len];

        for (from, node) in self.nodes.iter().enumerate() {
            matrix[from * len + from] = true;
            for child in &node.children {
                for to in self.type_members(&child.r#type) {
                    matrix[from * len + to.0] = true;
                }
            }
        }

        // Floyd–Warshall over booleans
        for via in 0..len {
            for from in 0..len {
                if matrix[from * len + via] {
                    for to in 0..len {
                        if matrix[via * len + to] {
                            matrix[from * len + to] = true;
                        }
                    }
                }
            }
        }

        Reachability { len, matrix }
    }
}

/// Which nodes may (transitively) contain which other nodes.
#[derive(Debug, Clone)]
pub struct Reachability {
    len: usize,
    matrix: Vec<bool>,
}

impl Reachability {
    /// Reflexive: every node reaches itself.
    pub fn reaches(&self, from: NodeId, to: NodeId) -> bool {
        self.matrix[from.0 * self.len + to.0]
    }

    /// Whether a traversal needs to descend into a child slot of the given
    /// type, because a node it handles may be found below it.
    pub fn needs_descent(&self, config: &Config, traversal: &Traversal, r#type: NodeType) -> bool {
        match &traversal.nodes {
            None => true,
            Some(handled) => config.type_members(&r#type).iter().any(|member| {
                handled.iter().any(|target| self.reaches(*member, *target))
            }),
        }
    }
}
