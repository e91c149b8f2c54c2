//! Name resolution and validation.
//!
//! Checking happens in two steps. First every declaration is registered in a
//! single symbol table shared by all categories, in the order enums, nodes,
//! nodesets, traversals, phases, passes. Then each category is resolved
//! against that table. Every problem found is reported; a [`Config`] is only
//! produced when no errors were found.

use std::collections::hash_map::Entry;

use fxhash::FxHashMap;

use crate::model::{
    Action, Attr, AttrType, AttrValue, Child, Config, Enum, EnumId, MandatoryPhase, Node, NodeId,
    NodeType, Nodeset, NodesetId, Pass, PassId, Phase, PhaseBody, PhaseId, PrimType, Symbol,
    Traversal, TraversalId,
};
use crate::source::ByteRange;
use crate::surface::{self, AttrTypeName, Ident, Item, Literal, PhaseSpan};

mod phase_tree;
mod reporting;

pub use phase_tree::build_phase_tree;
pub use reporting::Message;

/// Enum prefixes that would collide with the generated discriminants.
const RESERVED_PREFIXES: [&str; 3] = ["NS", "NT", "TRAV"];

/// Check a parsed module, returning the resolved configuration if no errors
/// were found. Every message is passed to `on_message`, warnings included.
pub fn check_module(
    module: &surface::Module,
    on_message: &mut dyn FnMut(Message),
) -> Option<Config> {
    let mut context = Context::new(on_message);
    context.register(module);

    let nodesets = context.resolve_nodesets();
    let nodes = context.resolve_nodes();
    let enums = context.resolve_enums();
    let traversals = context.resolve_traversals(&nodesets);
    let passes = context.resolve_passes();
    let (phases, phases_ok) = context.resolve_phases();

    let root_node = context.root_node.map(|(root, _)| root);
    let root_phase = context.root_phase.map(|(root, _)| root);
    if root_node.is_none() {
        context.report(Message::MissingRoot { what: "node" });
    }
    if root_phase.is_none() {
        context.report(Message::MissingRoot { what: "phase" });
    }

    let phase_tree = match root_phase {
        Some(root_phase) if phases_ok => Some(build_phase_tree(&phases, root_phase)),
        _ => None,
    };

    if context.error_count > 0 {
        return None;
    }

    match (root_node, root_phase, phase_tree) {
        (Some(root_node), Some(root_phase), Some(phase_tree)) => Some(Config::new(
            nodes, nodesets, enums, traversals, passes, phases, root_node, root_phase, phase_tree,
        )),
        _ => None,
    }
}

struct Context<'module, 'handler> {
    on_message: &'handler mut dyn FnMut(Message),
    error_count: usize,

    symbols: FxHashMap<&'module str, (Symbol, ByteRange)>,
    prefixes: FxHashMap<&'module str, ByteRange>,
    root_node: Option<(NodeType, ByteRange)>,
    root_phase: Option<(PhaseId, ByteRange)>,

    enums: Vec<&'module surface::EnumDecl>,
    nodes: Vec<&'module surface::NodeDecl>,
    nodesets: Vec<&'module surface::NodesetDecl>,
    traversals: Vec<&'module surface::TraversalDecl>,
    phases: Vec<&'module surface::PhaseDecl>,
    passes: Vec<&'module surface::PassDecl>,
}

impl<'module, 'handler> Context<'module, 'handler> {
    fn new(on_message: &'handler mut dyn FnMut(Message)) -> Context<'module, 'handler> {
        Context {
            on_message,
            error_count: 0,
            symbols: FxHashMap::default(),
            prefixes: FxHashMap::default(),
            root_node: None,
            root_phase: None,
            enums: Vec::new(),
            nodes: Vec::new(),
            nodesets: Vec::new(),
            traversals: Vec::new(),
            phases: Vec::new(),
            passes: Vec::new(),
        }
    }

    fn report(&mut self, message: Message) {
        if message.is_error() {
            self.error_count += 1;
        }
        (self.on_message)(message);
    }

    /// Add a name to the symbol table, returning `false` if it was already
    /// declared.
    fn declare(&mut self, name: &'module Ident, symbol: Symbol) -> bool {
        match self.symbols.entry(name.as_str()) {
            Entry::Occupied(entry) => {
                let previous_range = entry.get().1;
                self.report(Message::Redefinition {
                    range: name.range,
                    previous_range,
                    name: name.name.clone(),
                });
                false
            }
            Entry::Vacant(entry) => {
                entry.insert((symbol, name.range));
                true
            }
        }
    }

    fn declare_root_node(&mut self, root: NodeType, range: ByteRange) {
        match self.root_node {
            Some((_, previous_range)) => self.report(Message::DuplicateRoot {
                range,
                previous_range,
                what: "node",
            }),
            None => self.root_node = Some((root, range)),
        }
    }

    fn register(&mut self, module: &'module surface::Module) {
        let items = &module.items;

        for decl in items.iter().filter_map(|item| match item {
            Item::Enum(decl) => Some(decl),
            _ => None,
        }) {
            if !self.declare(&decl.name, Symbol::Enum(EnumId(self.enums.len()))) {
                continue;
            }
            let prefix = &decl.prefix;
            if RESERVED_PREFIXES.contains(&prefix.as_str()) {
                self.report(Message::ReservedPrefix {
                    range: prefix.range,
                    prefix: prefix.name.clone(),
                });
            } else if let Some(previous_range) = self.prefixes.get(prefix.as_str()).copied() {
                self.report(Message::RedefinedPrefix {
                    range: prefix.range,
                    previous_range,
                    prefix: prefix.name.clone(),
                });
            } else {
                self.prefixes.insert(prefix.as_str(), prefix.range);
            }
            self.enums.push(decl);
        }

        for decl in items.iter().filter_map(|item| match item {
            Item::Node(decl) => Some(decl),
            _ => None,
        }) {
            let id = NodeId(self.nodes.len());
            if !self.declare(&decl.name, Symbol::Node(id)) {
                continue;
            }
            if let Some(range) = decl.root {
                self.declare_root_node(NodeType::Node(id), range);
            }
            self.nodes.push(decl);
        }

        for decl in items.iter().filter_map(|item| match item {
            Item::Nodeset(decl) => Some(decl),
            _ => None,
        }) {
            let id = NodesetId(self.nodesets.len());
            if !self.declare(&decl.name, Symbol::Nodeset(id)) {
                continue;
            }
            if let Some(range) = decl.root {
                self.declare_root_node(NodeType::Nodeset(id), range);
            }
            self.nodesets.push(decl);
        }

        for decl in items.iter().filter_map(|item| match item {
            Item::Traversal(decl) => Some(decl),
            _ => None,
        }) {
            let id = TraversalId(self.traversals.len());
            if self.declare(&decl.name, Symbol::Traversal(id)) {
                self.traversals.push(decl);
            }
        }

        for decl in items.iter().filter_map(|item| match item {
            Item::Phase(decl) => Some(decl),
            _ => None,
        }) {
            let id = PhaseId(self.phases.len());
            if !self.declare(&decl.name, Symbol::Phase(id)) {
                continue;
            }
            if let Some(range) = decl.root {
                match self.root_phase {
                    Some((_, previous_range)) => self.report(Message::DuplicateRoot {
                        range,
                        previous_range,
                        what: "phase",
                    }),
                    None => self.root_phase = Some((id, range)),
                }
            }
            self.phases.push(decl);
        }

        for decl in items.iter().filter_map(|item| match item {
            Item::Pass(decl) => Some(decl),
            _ => None,
        }) {
            let id = PassId(self.passes.len());
            if self.declare(&decl.name, Symbol::Pass(id)) {
                self.passes.push(decl);
            }
        }
    }

    /// Look up a name, reporting an error if it is unknown or if `accept`
    /// rejects the kind of entity it refers to.
    fn lookup(
        &mut self,
        ident: &Ident,
        expected: &'static str,
        accept: fn(Symbol) -> bool,
    ) -> Option<Symbol> {
        match self.symbols.get(ident.as_str()) {
            Some((symbol, _)) if accept(*symbol) => Some(*symbol),
            Some((symbol, _)) => {
                let found = symbol.kind();
                self.report(Message::MismatchedKind {
                    range: ident.range,
                    name: ident.name.clone(),
                    expected,
                    found,
                });
                None
            }
            None => {
                let candidates = self
                    .symbols
                    .iter()
                    .filter(|(_, (symbol, _))| accept(*symbol))
                    .map(|(name, _)| *name);
                let suggestion = suggest(ident.as_str(), candidates);
                self.report(Message::UnknownName {
                    range: ident.range,
                    name: ident.name.clone(),
                    expected: expected.to_owned(),
                    suggestion,
                });
                None
            }
        }
    }

    fn lookup_phase(&mut self, ident: &Ident) -> Option<PhaseId> {
        match self.lookup(ident, "phase", |symbol: Symbol| matches!(symbol, Symbol::Phase(_)))? {
            Symbol::Phase(id) => Some(id),
            _ => None,
        }
    }

    /// Report a duplicate if `ident` was already seen, returning `false`.
    fn insert_unique(
        &mut self,
        seen: &mut FxHashMap<&'module str, ByteRange>,
        ident: &'module Ident,
        what: &'static str,
    ) -> bool {
        match seen.entry(ident.as_str()) {
            Entry::Occupied(entry) => {
                let previous_range = *entry.get();
                self.report(Message::DuplicateMember {
                    range: ident.range,
                    previous_range,
                    what,
                    name: ident.name.clone(),
                });
                false
            }
            Entry::Vacant(entry) => {
                entry.insert(ident.range);
                true
            }
        }
    }

    fn resolve_nodesets(&mut self) -> Vec<Nodeset> {
        let decls = self.nodesets.clone();
        let root_node = self.root_node.map(|(root, _)| root);

        decls
            .into_iter()
            .enumerate()
            .map(|(index, decl)| {
                if decl.nodes.is_empty() {
                    self.report(Message::EmptyNodeset {
                        range: decl.name.range,
                        name: decl.name.name.clone(),
                    });
                }

                let mut seen = FxHashMap::default();
                let mut nodes = Vec::with_capacity(decl.nodes.len());
                for member in &decl.nodes {
                    if !self.insert_unique(&mut seen, member, "nodeset member") {
                        continue;
                    }
                    let accept =
                        |symbol: Symbol| matches!(symbol, Symbol::Node(_) | Symbol::Nodeset(_));
                    match self.lookup(member, "node", accept) {
                        Some(Symbol::Node(id)) if root_node == Some(NodeType::Node(id)) => {
                            self.report(Message::RootInNodeset {
                                range: member.range,
                                name: member.name.clone(),
                            })
                        }
                        Some(Symbol::Node(id)) => nodes.push(id),
                        Some(_) => self.report(Message::NestedNodeset {
                            range: member.range,
                            name: member.name.clone(),
                        }),
                        None => {}
                    }
                }

                Nodeset {
                    name: decl.name.name.clone(),
                    info: None,
                    nodes,
                    is_root: root_node == Some(NodeType::Nodeset(NodesetId(index))),
                }
            })
            .collect()
    }

    fn resolve_nodes(&mut self) -> Vec<Node> {
        let decls = self.nodes.clone();
        let root_node = self.root_node.map(|(root, _)| root);

        decls
            .into_iter()
            .enumerate()
            .map(|(index, decl)| {
                let children = self.resolve_children(decl);
                let attrs = self.resolve_attrs(decl);

                Node {
                    name: decl.name.name.clone(),
                    info: decl.info.clone(),
                    children,
                    attrs,
                    is_root: root_node == Some(NodeType::Node(NodeId(index))),
                }
            })
            .collect()
    }

    fn resolve_children(&mut self, decl: &'module surface::NodeDecl) -> Vec<Child> {
        let root_node = self.root_node.map(|(root, _)| root);
        let mut seen = FxHashMap::default();
        let mut children = Vec::with_capacity(decl.children.len());

        for child in &decl.children {
            if !self.insert_unique(&mut seen, &child.name, "child name") {
                continue;
            }

            let accept = |symbol: Symbol| matches!(symbol, Symbol::Node(_) | Symbol::Nodeset(_));
            let r#type = match self.lookup(&child.r#type, "node or nodeset", accept) {
                Some(Symbol::Node(id)) => NodeType::Node(id),
                Some(Symbol::Nodeset(id)) => NodeType::Nodeset(id),
                _ => continue,
            };
            if Some(r#type) == root_node {
                self.report(Message::RootChild {
                    range: child.r#type.range,
                    child: child.name.name.clone(),
                    r#type: child.r#type.name.clone(),
                });
                continue;
            }

            let mut mandatory_phases = Vec::new();
            for constraint in child.mandatory.iter().flatten() {
                let (first, last) = match &constraint.phases {
                    PhaseSpan::Single(phase) => (phase, phase),
                    PhaseSpan::Range(first, last) => (first, last),
                };
                let first_id = self.lookup_phase(first);
                let last_id = match std::ptr::eq(first, last) {
                    true => first_id,
                    false => self.lookup_phase(last),
                };

                match (first_id, last_id) {
                    (Some(first_id), Some(last_id)) if first_id > last_id => {
                        self.report(Message::InvertedPhaseRange {
                            range: constraint.range,
                            first: first.name.clone(),
                            last: last.name.clone(),
                        })
                    }
                    (Some(first), Some(last)) => mandatory_phases.push(MandatoryPhase {
                        negated: constraint.negated,
                        first,
                        last,
                    }),
                    _ => {}
                }
            }

            children.push(Child {
                name: child.name.name.clone(),
                r#type,
                construct: child.construct,
                mandatory: child.mandatory.is_some(),
                mandatory_phases,
            });
        }

        children
    }

    fn resolve_attrs(&mut self, decl: &'module surface::NodeDecl) -> Vec<Attr> {
        let mut seen = FxHashMap::default();
        let mut attrs = Vec::with_capacity(decl.attributes.len());

        for attr in &decl.attributes {
            if !self.insert_unique(&mut seen, &attr.name, "attribute name") {
                continue;
            }

            let r#type = match &attr.r#type {
                AttrTypeName::Prim(_, prim) => AttrType::Prim(*prim),
                AttrTypeName::LinkOrEnum(ident) => {
                    let accept =
                        |symbol: Symbol| matches!(symbol, Symbol::Node(_) | Symbol::Enum(_));
                    match self.lookup(ident, "node or enum", accept) {
                        Some(Symbol::Node(id)) => AttrType::Link(id),
                        Some(Symbol::Enum(id)) => AttrType::Enum(id),
                        _ => continue,
                    }
                }
            };

            let default = match &attr.default {
                Some(literal) => self.check_default(&attr.name, r#type, literal),
                None => None,
            };

            attrs.push(Attr {
                name: attr.name.name.clone(),
                r#type,
                construct: attr.construct,
                default,
            });
        }

        attrs
    }

    fn check_default(
        &mut self,
        name: &Ident,
        r#type: AttrType,
        literal: &Literal,
    ) -> Option<AttrValue> {
        match r#type {
            AttrType::Link(_) => {
                self.report(Message::LinkDefault {
                    range: literal.range(),
                    name: name.name.clone(),
                });
                None
            }
            AttrType::Enum(id) => {
                let decl = self.enums[id.0];
                match literal {
                    Literal::Name(value) => {
                        let position = decl.values.iter().position(|v| v.name == value.name);
                        if position.is_none() {
                            let candidates = decl.values.iter().map(Ident::as_str);
                            self.report(Message::UnknownName {
                                range: value.range,
                                name: value.name.clone(),
                                expected: format!("value of enum `{}`", decl.name.name),
                                suggestion: suggest(value.as_str(), candidates),
                            });
                        }
                        position.map(AttrValue::Enum)
                    }
                    _ => {
                        self.report(Message::MismatchedDefault {
                            range: literal.range(),
                            expected: format!("a value of enum `{}`", decl.name.name),
                        });
                        None
                    }
                }
            }
            AttrType::Prim(prim) => self.check_prim_default(prim, literal),
        }
    }

    fn check_prim_default(&mut self, prim: PrimType, literal: &Literal) -> Option<AttrValue> {
        let out_of_range = |context: &mut Self| {
            context.report(Message::DefaultOutOfRange {
                range: literal.range(),
                r#type: prim.name(),
            });
            None
        };

        match (prim, literal) {
            (_, Literal::Int(_, value)) if is_signed(prim) => {
                let (min, max) = signed_bounds(prim);
                match (min..=max).contains(value) {
                    true => Some(AttrValue::Int(*value)),
                    false => out_of_range(self),
                }
            }
            (_, Literal::UInt(_, _)) if is_signed(prim) => out_of_range(self),
            (_, Literal::Int(_, value)) if is_unsigned(prim) => match u64::try_from(*value) {
                Ok(value) if value <= unsigned_max(prim) => Some(AttrValue::UInt(value)),
                _ => out_of_range(self),
            },
            (_, Literal::UInt(_, value)) if is_unsigned(prim) => match *value <= unsigned_max(prim)
            {
                true => Some(AttrValue::UInt(*value)),
                false => out_of_range(self),
            },
            (PrimType::Float | PrimType::Double, Literal::Int(_, value)) => {
                Some(AttrValue::Float(*value as f64))
            }
            (PrimType::Float | PrimType::Double, Literal::UInt(_, value)) => {
                Some(AttrValue::Float(*value as f64))
            }
            (PrimType::Float | PrimType::Double, Literal::Float(_, value)) => {
                Some(AttrValue::Float(*value))
            }
            (PrimType::Bool, Literal::Bool(_, value)) => Some(AttrValue::Bool(*value)),
            (PrimType::String, Literal::String(_, value)) => Some(AttrValue::String(value.clone())),
            (_, literal) => {
                self.report(Message::MismatchedDefault {
                    range: literal.range(),
                    expected: format!("a `{}` value", prim.name()),
                });
                None
            }
        }
    }

    fn resolve_enums(&mut self) -> Vec<Enum> {
        let decls = self.enums.clone();

        decls
            .into_iter()
            .map(|decl| {
                if decl.values.is_empty() {
                    self.report(Message::EmptyEnum {
                        range: decl.name.range,
                        name: decl.name.name.clone(),
                    });
                }

                let mut seen = FxHashMap::default();
                let mut values = Vec::with_capacity(decl.values.len());
                for value in &decl.values {
                    if self.insert_unique(&mut seen, value, "enum value") {
                        values.push(value.name.clone());
                    }
                }

                Enum {
                    name: decl.name.name.clone(),
                    info: decl.info.clone(),
                    prefix: decl.prefix.name.clone(),
                    values,
                }
            })
            .collect()
    }

    fn resolve_traversals(&mut self, nodesets: &[Nodeset]) -> Vec<Traversal> {
        let decls = self.traversals.clone();

        decls
            .into_iter()
            .map(|decl| {
                let nodes = decl.nodes.as_ref().map(|idents| {
                    let mut seen = FxHashMap::default();
                    let mut nodes = Vec::new();
                    for ident in idents {
                        if !self.insert_unique(&mut seen, ident, "traversal node") {
                            continue;
                        }
                        let accept =
                            |symbol: Symbol| matches!(symbol, Symbol::Node(_) | Symbol::Nodeset(_));
                        let members = match self.lookup(ident, "node or nodeset", accept) {
                            Some(Symbol::Node(id)) => vec![id],
                            Some(Symbol::Nodeset(id)) => nodesets[id.0].nodes.clone(),
                            _ => continue,
                        };
                        for member in members {
                            if !nodes.contains(&member) {
                                nodes.push(member);
                            }
                        }
                    }
                    nodes
                });

                Traversal {
                    name: decl.name.name.clone(),
                    info: decl.info.clone(),
                    nodes,
                }
            })
            .collect()
    }

    fn resolve_passes(&mut self) -> Vec<Pass> {
        self.passes
            .iter()
            .map(|decl| Pass {
                name: decl.name.name.clone(),
                info: decl.info.clone(),
                func: decl.func.as_ref().map(|func| func.name.clone()),
            })
            .collect()
    }

    /// Resolve phases in declaration order, returning whether any errors
    /// were found in them.
    fn resolve_phases(&mut self) -> (Vec<Phase>, bool) {
        let decls = self.phases.clone();
        let errors_before = self.error_count;
        let mut phases = Vec::with_capacity(decls.len());

        for (index, decl) in decls.into_iter().enumerate() {
            let id = PhaseId(index);
            let mut seen = FxHashMap::default();

            let body = match &decl.body {
                surface::PhaseBody::Passes(names) => {
                    let mut actions = Vec::with_capacity(names.len());
                    for name in names {
                        if !self.insert_unique(&mut seen, name, "pass") {
                            continue;
                        }
                        let accept = |symbol: Symbol| {
                            matches!(symbol, Symbol::Traversal(_) | Symbol::Pass(_))
                        };
                        match self.lookup(name, "pass or traversal", accept) {
                            Some(Symbol::Traversal(id)) => actions.push(Action::Traversal(id)),
                            Some(Symbol::Pass(id)) => actions.push(Action::Pass(id)),
                            _ => {}
                        }
                    }
                    PhaseBody::Actions(actions)
                }
                surface::PhaseBody::Subphases(names) => {
                    let mut subphases = Vec::with_capacity(names.len());
                    for name in names {
                        if !self.insert_unique(&mut seen, name, "subphase") {
                            continue;
                        }
                        match self.lookup_phase(name) {
                            // Only phases resolved so far can be used
                            Some(subphase) if subphase < id => subphases.push(subphase),
                            Some(subphase) => self.report(Message::UsedBeforeDeclaration {
                                range: name.range,
                                declaration_range: self.phases[subphase.0].name.range,
                                name: name.name.clone(),
                            }),
                            None => {}
                        }
                    }
                    PhaseBody::Subphases(subphases)
                }
            };

            if let Some((root, root_range)) = self.root_phase {
                if id > root {
                    self.report(Message::UnreachablePhase {
                        range: decl.name.range,
                        root_range,
                        name: decl.name.name.clone(),
                    });
                }
            }

            phases.push(Phase {
                name: decl.name.name.clone(),
                info: decl.info.clone(),
                is_root: self.root_phase.map(|(root, _)| root) == Some(id),
                cycle: decl.cycle,
                body,
            });
        }

        (phases, self.error_count == errors_before)
    }
}

fn is_signed(prim: PrimType) -> bool {
    use PrimType::*;
    matches!(prim, Int | Int8 | Int16 | Int32 | Int64)
}

fn is_unsigned(prim: PrimType) -> bool {
    use PrimType::*;
    matches!(prim, UInt | UInt8 | UInt16 | UInt32 | UInt64)
}

/// `int` and `uint` are the C `int` and `unsigned int`, assumed 32 bits.
fn signed_bounds(prim: PrimType) -> (i64, i64) {
    match prim {
        PrimType::Int8 => (i8::MIN.into(), i8::MAX.into()),
        PrimType::Int16 => (i16::MIN.into(), i16::MAX.into()),
        PrimType::Int | PrimType::Int32 => (i32::MIN.into(), i32::MAX.into()),
        _ => (i64::MIN, i64::MAX),
    }
}

fn unsigned_max(prim: PrimType) -> u64 {
    match prim {
        PrimType::UInt8 => u8::MAX.into(),
        PrimType::UInt16 => u16::MAX.into(),
        PrimType::UInt | PrimType::UInt32 => u32::MAX.into(),
        _ => u64::MAX,
    }
}

/// Find the closest candidate to a misspelled name.
fn suggest<'a>(name: &str, candidates: impl Iterator<Item = &'a str>) -> Option<String> {
    candidates
        .map(|candidate| (levenshtein::levenshtein(name, candidate), candidate))
        .filter(|(distance, _)| *distance <= 3 && *distance < name.len())
        .min()
        .map(|(_, candidate)| candidate.to_owned())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::model::PhaseTreeKind;
    use crate::source::Files;

    pub(crate) fn check_source(source: &str) -> (Option<Config>, Vec<Message>) {
        let mut files = Files::new();
        let file_id = files.add("test.ccn", source.to_owned());
        let (module, parse_messages) = surface::Module::parse(file_id, source);
        assert!(parse_messages.is_empty(), "syntax errors: {parse_messages:?}");

        let mut messages = Vec::new();
        let config = check_module(&module, &mut |message| messages.push(message));
        (config, messages)
    }

    pub(crate) fn check_ok(source: &str) -> Config {
        let (config, messages) = check_source(source);
        assert!(messages.is_empty(), "unexpected messages: {messages:?}");
        config.expect("no config produced")
    }

    fn check_errors(source: &str) -> Vec<Message> {
        let (config, messages) = check_source(source);
        assert!(config.is_none(), "expected errors");
        messages
    }

    const PIPELINE: &str = "pass Noop;\nroot phase Main { passes { Noop } };\n";

    fn with_pipeline(source: &str) -> String {
        format!("{source}\n{PIPELINE}")
    }

    #[test]
    fn leaf_and_root() {
        let config = check_ok(&with_pipeline(
            "node Leaf { attributes { int attr } };\n\
             root node Root { children { child Leaf leaf } };",
        ));

        let root = config.node_by_name("Root").unwrap();
        assert_eq!(config.root_node, NodeType::Node(root));
        assert!(config[root].is_root);
        assert_eq!(
            config.phase_tree.kind,
            PhaseTreeKind::Leaf(vec![Action::Pass(PassId(0))]),
        );
    }

    #[test]
    fn redefinition_across_categories() {
        let source = with_pipeline("root node Expr;\ntraversal Expr;");
        let messages = check_errors(&source);

        match &messages[..] {
            [Message::Redefinition {
                range,
                previous_range,
                name,
            }] => {
                assert_eq!(name, "Expr");
                assert_eq!(previous_range.start(), 10);
                assert!(range.start() > previous_range.start());
            }
            messages => panic!("unexpected messages: {messages:?}"),
        }
    }

    #[test]
    fn enums_register_first() {
        let messages = check_errors(&with_pipeline(
            "root node Op;\nenum Op { prefix = OP, values { add } };",
        ));
        // The enum is declared first, so the node is the redefinition
        assert!(matches!(
            &messages[..],
            [Message::Redefinition { range, .. }, Message::MissingRoot { what: "node" }]
                if range.start() == 10,
        ));
    }

    #[test]
    fn root_node_cardinality() {
        let messages = check_errors(PIPELINE);
        assert!(matches!(messages[..], [Message::MissingRoot { what: "node" }]));

        let messages = check_errors(&with_pipeline("root node A;\nroot node B;"));
        assert!(matches!(messages[..], [Message::DuplicateRoot { what: "node", .. }]));

        let messages = check_errors(&with_pipeline(
            "root node A;\nnode B;\nroot nodeset S { B };",
        ));
        assert!(matches!(messages[..], [Message::DuplicateRoot { what: "node", .. }]));
    }

    #[test]
    fn root_phase_cardinality() {
        let messages = check_errors("root node A;\npass Noop;\nphase Main { passes { Noop } };");
        assert!(matches!(messages[..], [Message::MissingRoot { what: "phase" }]));

        let messages = check_errors(
            "root node A;\npass Noop;\n\
             root phase P { passes { Noop } };\n\
             root phase Q { passes { Noop } };",
        );
        assert!(matches!(
            messages[..],
            [
                Message::DuplicateRoot { what: "phase", .. },
                Message::UnreachablePhase { .. },
            ]
        ));
    }

    #[test]
    fn duplicate_children_reported_once() {
        let messages = check_errors(&with_pipeline(
            "root node A { children { child B x, child B x } };\nnode B;",
        ));
        assert!(matches!(
            &messages[..],
            [Message::DuplicateMember { what: "child name", name, .. }] if name == "x",
        ));
    }

    #[test]
    fn children_cannot_be_root() {
        let messages = check_errors(&with_pipeline("root node A { children { child A next } };"));
        assert!(matches!(messages[..], [Message::RootChild { .. }]));
    }

    #[test]
    fn unknown_child_type_suggestion() {
        let messages = check_errors(&with_pipeline(
            "root node Program { children { child Statment body } };\nnode Statement;",
        ));
        match &messages[..] {
            [Message::UnknownName {
                name, suggestion, ..
            }] => {
                assert_eq!(name, "Statment");
                assert_eq!(suggestion.as_deref(), Some("Statement"));
            }
            messages => panic!("unexpected messages: {messages:?}"),
        }
    }

    #[test]
    fn child_of_wrong_kind() {
        let messages = check_errors(&with_pipeline("root node A { children { child Noop x } };"));
        assert!(matches!(
            messages[..],
            [Message::MismatchedKind {
                expected: "node or nodeset",
                found: "pass",
                ..
            }]
        ));
    }

    #[test]
    fn nodesets_cannot_nest() {
        let messages = check_errors(&with_pipeline(
            "root node R;\nnode A;\nnodeset Inner { A };\nnodeset Outer { Inner, A };",
        ));
        assert!(matches!(&messages[..], [Message::NestedNodeset { name, .. }] if name == "Inner"));
    }

    #[test]
    fn nodeset_members() {
        let messages = check_errors(&with_pipeline(
            "root node R;\nnode A;\nnodeset S { A, R, A };\nnodeset Empty { };",
        ));
        assert!(matches!(
            messages[..],
            [
                Message::RootInNodeset { .. },
                Message::DuplicateMember { what: "nodeset member", .. },
                Message::EmptyNodeset { .. },
            ]
        ));
    }

    #[test]
    fn traversal_expansion() {
        let config = check_ok(&with_pipeline(
            "root node R { children { child Expr e } };\n\
             node Num;\nnode Var;\nnode Call;\n\
             nodeset Expr { Num, Var };\n\
             traversal First { nodes { Expr, Num, Call } };\n\
             traversal Second { nodes { Var, Expr } };\n\
             traversal All;",
        ));

        let names = |traversal: TraversalId| -> Vec<&str> {
            let nodes = config[traversal].nodes.as_ref().unwrap();
            nodes.iter().map(|id| config[*id].name.as_str()).collect()
        };
        assert_eq!(names(TraversalId(0)), ["Num", "Var", "Call"]);
        assert_eq!(names(TraversalId(1)), ["Var", "Num"]);
        assert!(config[TraversalId(2)].nodes.is_none());
    }

    #[test]
    fn duplicate_traversal_nodes() {
        let messages = check_errors(&with_pipeline(
            "root node R;\ntraversal T { nodes { R, R } };",
        ));
        assert!(matches!(
            messages[..],
            [Message::DuplicateMember { what: "traversal node", .. }]
        ));
    }

    #[test]
    fn subphase_order() {
        let rejected = check_errors(
            "root node R;\npass Noop;\n\
             root phase Main { subphases { Late } };\n\
             phase Late { passes { Noop } };",
        );
        assert!(matches!(
            &rejected[..],
            [Message::UsedBeforeDeclaration { name, .. }, Message::UnreachablePhase { .. }]
                if name == "Late",
        ));

        let config = check_ok(
            "root node R;\npass Noop;\n\
             phase Early { passes { Noop } };\n\
             root phase Main { subphases { Early } };",
        );
        assert_eq!(config.root_phase, PhaseId(1));
        match &config.phase_tree.kind {
            PhaseTreeKind::Composite(subtrees) => assert_eq!(subtrees[0].phase, PhaseId(0)),
            PhaseTreeKind::Leaf(_) => panic!("expected a composite phase"),
        }
    }

    #[test]
    fn phase_cannot_contain_itself() {
        let messages = check_errors("root node R;\nroot phase Main { subphases { Main } };");
        assert!(matches!(messages[..], [Message::UsedBeforeDeclaration { .. }]));
    }

    #[test]
    fn unreachable_phase_is_a_warning() {
        let (config, messages) = check_source(
            "root node R;\npass Noop;\n\
             root phase Main { passes { Noop } };\n\
             phase After { passes { Noop } };",
        );
        assert!(config.is_some());
        assert!(matches!(
            &messages[..],
            [Message::UnreachablePhase { name, .. }] if name == "After"
        ));
    }

    #[test]
    fn traversals_and_passes_in_phases() {
        let config = check_ok(
            "root node R;\ntraversal Print;\npass Noop;\n\
             root phase Main { passes { Print, Noop } };",
        );
        assert_eq!(
            config.phase_tree.actions(),
            [Action::Traversal(TraversalId(0)), Action::Pass(PassId(0))],
        );

        let messages = check_errors(
            "root node R;\npass Noop;\nroot phase Main { passes { Noop, Missing, Noop } };",
        );
        assert!(matches!(
            messages[..],
            [Message::UnknownName { .. }, Message::DuplicateMember { what: "pass", .. }]
        ));
    }

    #[test]
    fn mandatory_phases() {
        let config = check_ok(
            "root node R { children { child A a { mandatory { Check to Emit, !Scan } } } };\n\
             node A;\npass Noop;\n\
             phase Scan { passes { Noop } };\n\
             phase Check { passes { Noop } };\n\
             phase Emit { passes { Noop } };\n\
             root phase Main { subphases { Scan, Check, Emit } };",
        );
        let child = &config.nodes[0].children[0];
        assert!(child.mandatory);
        assert_eq!(
            child.mandatory_phases,
            [
                MandatoryPhase {
                    negated: false,
                    first: PhaseId(1),
                    last: PhaseId(2),
                },
                MandatoryPhase {
                    negated: true,
                    first: PhaseId(0),
                    last: PhaseId(0),
                },
            ],
        );

        let messages = check_errors(
            "root node R { children { child A a { mandatory { Emit to Scan, Misc } } } };\n\
             node A;\npass Noop;\n\
             phase Scan { passes { Noop } };\n\
             phase Emit { passes { Noop } };\n\
             root phase Main { subphases { Scan, Emit } };",
        );
        assert!(matches!(
            messages[..],
            [Message::InvertedPhaseRange { .. }, Message::UnknownName { .. }]
        ));
    }

    #[test]
    fn enum_prefixes() {
        let messages = check_errors(&with_pipeline(
            "root node R;\n\
             enum A { prefix = AA, values { x } };\n\
             enum B { prefix = AA, values { y } };\n\
             enum C { prefix = NT, values { z } };",
        ));
        assert!(matches!(
            messages[..],
            [Message::RedefinedPrefix { .. }, Message::ReservedPrefix { .. }]
        ));
    }

    #[test]
    fn enum_values() {
        let messages = check_errors(&with_pipeline(
            "root node R;\n\
             enum A { prefix = A, values { x, y, x } };\n\
             enum B { prefix = B, values { } };",
        ));
        assert!(matches!(
            messages[..],
            [Message::DuplicateMember { what: "enum value", .. }, Message::EmptyEnum { .. }]
        ));
    }

    #[test]
    fn attribute_types() {
        let config = check_ok(&with_pipeline(
            "enum Op { prefix = OP, values { add, sub } };\n\
             root node R { attributes { Op op = sub, R parent, uint8 small = 255, double d = 1 } };",
        ));
        let attrs = &config.nodes[0].attrs;
        assert_eq!(attrs[0].r#type, AttrType::Enum(EnumId(0)));
        assert_eq!(attrs[0].default, Some(AttrValue::Enum(1)));
        assert_eq!(attrs[1].r#type, AttrType::Link(NodeId(0)));
        assert_eq!(attrs[2].default, Some(AttrValue::UInt(255)));
        assert_eq!(attrs[3].default, Some(AttrValue::Float(1.0)));
    }

    #[test]
    fn invalid_defaults() {
        let messages = check_errors(&with_pipeline(
            "enum Op { prefix = OP, values { add, sub } };\n\
             root node R { attributes {\n\
                 int8 a = 128,\n\
                 uint b = -1,\n\
                 bool c = 1,\n\
                 Op d = mul,\n\
                 R e = 0,\n\
                 string f = \"ok\",\n\
                 string f = \"again\"\n\
             } };",
        ));
        assert!(matches!(
            messages[..],
            [
                Message::DefaultOutOfRange { r#type: "int8", .. },
                Message::DefaultOutOfRange { r#type: "uint", .. },
                Message::MismatchedDefault { .. },
                Message::UnknownName { .. },
                Message::LinkDefault { .. },
                Message::DuplicateMember { what: "attribute name", .. },
            ]
        ));
    }

    #[test]
    fn suggestions() {
        let names = ["Statement", "Expression", "Stmts"];
        assert_eq!(
            suggest("Statment", names.into_iter()).as_deref(),
            Some("Statement"),
        );
        assert_eq!(suggest("Foo", names.into_iter()), None);
    }
}
