//! In-memory trees typed by a resolved [`Config`].
//!
//! This implements the contracts of the generated C code (construction,
//! free, deep copy, traversal with replacement, the binary and textual
//! formats) directly in Rust, so that they can be exercised without a C
//! toolchain.

use fxhash::FxHashMap;

use crate::model::{AttrType, Config, NodeId, NodeType, PrimType};

pub mod binary;
pub mod consistency;
pub mod textual;
pub mod trav;

/// A node instance in a [`Tree`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeRef(usize);

/// Attribute values. Absent strings and links are `None` in
/// [`NodeData::attrs`].
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    UInt(u64),
    Float(f64),
    Bool(bool),
    String(String),
    Link(NodeRef),
    /// The index of a value in the attribute's enum.
    Enum(usize),
}

impl Value {
    /// The zero value of an attribute type, if it has one.
    pub fn zero(r#type: AttrType) -> Option<Value> {
        match r#type {
            AttrType::Prim(PrimType::String) | AttrType::Link(_) => None,
            AttrType::Prim(PrimType::Float | PrimType::Double) => Some(Value::Float(0.0)),
            AttrType::Prim(PrimType::Bool) => Some(Value::Bool(false)),
            AttrType::Prim(prim) if is_unsigned(prim) => Some(Value::UInt(0)),
            AttrType::Prim(_) => Some(Value::Int(0)),
            AttrType::Enum(_) => Some(Value::Enum(0)),
        }
    }

    /// Whether the value can be stored in an attribute of the given type.
    pub fn fits(&self, config: &Config, r#type: AttrType) -> bool {
        match (r#type, self) {
            (AttrType::Prim(prim), Value::Int(value)) => match prim {
                PrimType::Int | PrimType::Int32 => i32::try_from(*value).is_ok(),
                PrimType::Int8 => i8::try_from(*value).is_ok(),
                PrimType::Int16 => i16::try_from(*value).is_ok(),
                PrimType::Int64 => true,
                _ => false,
            },
            (AttrType::Prim(prim), Value::UInt(value)) => match prim {
                PrimType::UInt | PrimType::UInt32 => u32::try_from(*value).is_ok(),
                PrimType::UInt8 => u8::try_from(*value).is_ok(),
                PrimType::UInt16 => u16::try_from(*value).is_ok(),
                PrimType::UInt64 => true,
                _ => false,
            },
            (AttrType::Prim(PrimType::Float), Value::Float(value)) => {
                !value.is_finite() || value.abs() <= f64::from(f32::MAX)
            }
            (AttrType::Prim(PrimType::Double), Value::Float(_)) => true,
            (AttrType::Prim(PrimType::Bool), Value::Bool(_)) => true,
            (AttrType::Prim(PrimType::String), Value::String(_)) => true,
            // Link targets are checked against the tree
            (AttrType::Link(_), Value::Link(_)) => true,
            (AttrType::Enum(id), Value::Enum(index)) => *index < config[id].values.len(),
            (_, _) => false,
        }
    }

    /// The value as it is held by an attribute of the given type. `float`
    /// attributes are single precision.
    pub fn stored(self, r#type: AttrType) -> Value {
        match (r#type, self) {
            (AttrType::Prim(PrimType::Float), Value::Float(value)) => {
                Value::Float(f64::from(value as f32))
            }
            (_, value) => value,
        }
    }

    fn from_default(value: &crate::model::AttrValue) -> Value {
        use crate::model::AttrValue;

        match value {
            AttrValue::Int(value) => Value::Int(*value),
            AttrValue::UInt(value) => Value::UInt(*value),
            AttrValue::Float(value) => Value::Float(*value),
            AttrValue::Bool(value) => Value::Bool(*value),
            AttrValue::String(value) => Value::String(value.clone()),
            AttrValue::Enum(index) => Value::Enum(*index),
        }
    }
}

pub(crate) fn is_unsigned(prim: PrimType) -> bool {
    matches!(
        prim,
        PrimType::UInt | PrimType::UInt8 | PrimType::UInt16 | PrimType::UInt32 | PrimType::UInt64,
    )
}

#[derive(Debug, Clone, PartialEq)]
pub struct NodeData {
    pub node: NodeId,
    /// One slot per child of the node type. Nodeset-typed slots refer
    /// directly to the member node.
    pub children: Vec<Option<NodeRef>>,
    /// One slot per attribute of the node type.
    pub attrs: Vec<Option<Value>>,
    parent: Option<NodeRef>,
}

impl NodeData {
    pub fn parent(&self) -> Option<NodeRef> {
        self.parent
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CreateError {
    #[error("`{node}` expects {expected} construct {what}, found {found}")]
    ArgumentCount {
        node: String,
        what: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("child `{child}` expects a `{expected}`, found a `{found}`")]
    MismatchedChild {
        child: String,
        expected: String,
        found: String,
    },
    #[error("value {value:?} does not fit attribute `{attr}`")]
    MismatchedValue { attr: String, value: Value },
    #[error("attribute `{attr}` cannot be null")]
    NotNullable { attr: String },
    #[error("node `{node}` has no {what} named `{name}`")]
    UnknownField {
        node: String,
        what: &'static str,
        name: String,
    },
    #[error("node {node:?} is already the child of another node")]
    AlreadyOwned { node: NodeRef },
    #[error("node {node:?} has been freed")]
    Freed { node: NodeRef },
}

/// An arena of node instances.
#[derive(Debug, Clone)]
pub struct Tree<'config> {
    config: &'config Config,
    nodes: Vec<Option<NodeData>>,
}

impl<'config> Tree<'config> {
    pub fn new(config: &'config Config) -> Tree<'config> {
        Tree {
            config,
            nodes: Vec::new(),
        }
    }

    pub fn config(&self) -> &'config Config {
        self.config
    }

    pub fn get(&self, node: NodeRef) -> Option<&NodeData> {
        self.nodes.get(node.0)?.as_ref()
    }

    fn data(&self, node: NodeRef) -> &NodeData {
        match self.get(node) {
            Some(data) => data,
            None => panic!("use of freed node {node:?}"),
        }
    }

    fn data_mut(&mut self, node: NodeRef) -> &mut NodeData {
        match self.nodes.get_mut(node.0).and_then(Option::as_mut) {
            Some(data) => data,
            None => panic!("use of freed node {node:?}"),
        }
    }

    /// The number of live nodes.
    pub fn len(&self) -> usize {
        self.nodes.iter().filter(|node| node.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn node_type(&self, node: NodeRef) -> NodeId {
        self.data(node).node
    }

    pub fn type_name(&self, node: NodeRef) -> &'config str {
        &self.config[self.node_type(node)].name
    }

    pub fn child(&self, node: NodeRef, name: &str) -> Option<NodeRef> {
        let data = self.data(node);
        let (index, _) = self.config[data.node].child(name)?;
        data.children[index]
    }

    pub fn attr(&self, node: NodeRef, name: &str) -> Option<&Value> {
        let data = self.data(node);
        let (index, _) = self.config[data.node].attr(name)?;
        data.attrs[index].as_ref()
    }

    /// Allocate a node with empty children and default attributes.
    fn alloc(&mut self, node: NodeId) -> NodeRef {
        let decl = &self.config[node];
        let data = NodeData {
            node,
            children: vec![None; decl.children.len()],
            attrs: (decl.attrs.iter())
                .map(|attr| match &attr.default {
                    Some(default) => Some(Value::from_default(default).stored(attr.r#type)),
                    None => Value::zero(attr.r#type),
                })
                .collect(),
            parent: None,
        };
        self.nodes.push(Some(data));
        NodeRef(self.nodes.len() - 1)
    }

    /// Construct a node from its construct children and construct
    /// attributes, in declaration order.
    pub fn create(
        &mut self,
        node: NodeId,
        children: Vec<Option<NodeRef>>,
        attrs: Vec<Option<Value>>,
    ) -> Result<NodeRef, CreateError> {
        let config = self.config;
        let decl = &config[node];
        let child_slots = (decl.children.iter().enumerate())
            .filter(|(_, child)| child.construct)
            .map(|(index, _)| index)
            .collect::<Vec<_>>();
        let attr_slots = (decl.attrs.iter().enumerate())
            .filter(|(_, attr)| attr.construct)
            .map(|(index, _)| index)
            .collect::<Vec<_>>();

        if children.len() != child_slots.len() {
            return Err(CreateError::ArgumentCount {
                node: decl.name.clone(),
                what: "children",
                expected: child_slots.len(),
                found: children.len(),
            });
        }
        if attrs.len() != attr_slots.len() {
            return Err(CreateError::ArgumentCount {
                node: decl.name.clone(),
                what: "attributes",
                expected: attr_slots.len(),
                found: attrs.len(),
            });
        }
        for (position, (slot, child)) in Iterator::zip(child_slots.iter(), &children).enumerate() {
            if let Some(child) = child {
                self.check_child(node, *slot, *child)?;
                // A node fills at most one slot
                if children[..position].contains(&Some(*child)) {
                    return Err(CreateError::AlreadyOwned { node: *child });
                }
            }
        }
        for (slot, value) in Iterator::zip(attr_slots.iter(), &attrs) {
            if let Some(value) = value {
                self.check_attr(node, *slot, value)?;
            }
        }

        let result = self.alloc(node);
        for (slot, child) in Iterator::zip(child_slots.into_iter(), children) {
            if let Some(child) = child {
                self.data_mut(child).parent = Some(result);
            }
            self.data_mut(result).children[slot] = child;
        }
        for (slot, value) in Iterator::zip(attr_slots.into_iter(), attrs) {
            let r#type = decl.attrs[slot].r#type;
            self.data_mut(result).attrs[slot] = value.map(|value| value.stored(r#type));
        }
        Ok(result)
    }

    fn check_child(&self, node: NodeId, slot: usize, child: NodeRef) -> Result<(), CreateError> {
        let config = self.config;
        let decl = &config[node].children[slot];
        let data = self.get(child).ok_or(CreateError::Freed { node: child })?;
        if !config.accepts(decl.r#type, data.node) {
            return Err(CreateError::MismatchedChild {
                child: decl.name.clone(),
                expected: config.type_name(decl.r#type).to_owned(),
                found: config[data.node].name.clone(),
            });
        }
        if data.parent.is_some() {
            return Err(CreateError::AlreadyOwned { node: child });
        }
        Ok(())
    }

    fn check_attr(&self, node: NodeId, slot: usize, value: &Value) -> Result<(), CreateError> {
        let config = self.config;
        let decl = &config[node].attrs[slot];
        let mismatch = || CreateError::MismatchedValue {
            attr: decl.name.clone(),
            value: value.clone(),
        };
        if !value.fits(config, decl.r#type) {
            return Err(mismatch());
        }
        if let (AttrType::Link(target), Value::Link(link)) = (decl.r#type, value) {
            let data = self.get(*link).ok_or(CreateError::Freed { node: *link })?;
            if data.node != target {
                return Err(mismatch());
            }
        }
        Ok(())
    }

    /// Replace a child slot, returning the previous child detached from
    /// the tree.
    pub fn set_child(
        &mut self,
        node: NodeRef,
        name: &str,
        child: Option<NodeRef>,
    ) -> Result<Option<NodeRef>, CreateError> {
        let data = self.get(node).ok_or(CreateError::Freed { node })?;
        let decl = &self.config[data.node];
        let (slot, _) = decl.child(name).ok_or_else(|| CreateError::UnknownField {
            node: decl.name.clone(),
            what: "child",
            name: name.to_owned(),
        })?;
        if let Some(child) = child {
            self.check_child(data.node, slot, child)?;
        }
        Ok(self.replace_child(node, slot, child))
    }

    /// Replace a child slot without checking the type of the new child.
    pub(crate) fn replace_child(
        &mut self,
        node: NodeRef,
        slot: usize,
        child: Option<NodeRef>,
    ) -> Option<NodeRef> {
        if let Some(child) = child {
            if let Some(parent) = self.data(child).parent {
                // Detach from the old parent first
                let data = self.data_mut(parent);
                data.children.iter_mut().for_each(|slot| {
                    if *slot == Some(child) {
                        *slot = None;
                    }
                });
            }
            self.data_mut(child).parent = Some(node);
        }
        let previous = std::mem::replace(&mut self.data_mut(node).children[slot], child);
        if let Some(previous) = previous {
            if previous != node && self.get(previous).is_some() {
                self.data_mut(previous).parent = None;
            }
        }
        previous
    }

    pub fn set_attr(
        &mut self,
        node: NodeRef,
        name: &str,
        value: Option<Value>,
    ) -> Result<(), CreateError> {
        let data = self.get(node).ok_or(CreateError::Freed { node })?;
        let node_id = data.node;
        let decl = &self.config[node_id];
        let (slot, attr) = decl.attr(name).ok_or_else(|| CreateError::UnknownField {
            node: decl.name.clone(),
            what: "attribute",
            name: name.to_owned(),
        })?;
        match &value {
            Some(value) => self.check_attr(node_id, slot, value)?,
            None if Value::zero(attr.r#type).is_some() => {
                return Err(CreateError::NotNullable {
                    attr: attr.name.clone(),
                })
            }
            None => {}
        }
        let r#type = attr.r#type;
        self.data_mut(node).attrs[slot] = value.map(|value| value.stored(r#type));
        Ok(())
    }

    /// The subtree rooted at `root`, in pre-order.
    pub fn preorder(&self, root: NodeRef) -> Vec<NodeRef> {
        let mut order = Vec::new();
        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            order.push(node);
            let data = self.data(node);
            stack.extend(data.children.iter().rev().flatten());
        }
        order
    }

    /// Free a node and everything it owns.
    pub fn free_tree(&mut self, root: NodeRef) {
        let subtree = self.preorder(root);
        self.detach(root);
        for node in &subtree {
            self.nodes[node.0] = None;
        }
        self.clear_links(&subtree);
    }

    /// Free a single node. Its children become roots of their own trees.
    pub fn free_node(&mut self, node: NodeRef) {
        self.detach(node);
        let data = self.nodes[node.0].take();
        for child in data.iter().flat_map(|data| data.children.iter().flatten()) {
            self.data_mut(*child).parent = None;
        }
        self.clear_links(&[node]);
    }

    fn detach(&mut self, node: NodeRef) {
        if let Some(parent) = self.data(node).parent {
            let data = self.data_mut(parent);
            data.children.iter_mut().for_each(|slot| {
                if *slot == Some(node) {
                    *slot = None;
                }
            });
        }
    }

    /// Clear links pointing at freed nodes.
    fn clear_links(&mut self, freed: &[NodeRef]) {
        for data in self.nodes.iter_mut().flatten() {
            for value in &mut data.attrs {
                if let Some(Value::Link(target)) = value {
                    if freed.contains(target) {
                        *value = None;
                    }
                }
            }
        }
    }

    /// Copy a subtree. Nodes are cloned in pre-order, and links to nodes
    /// inside the subtree are redirected to their clones.
    pub fn deep_copy(&mut self, root: NodeRef) -> NodeRef {
        let mut clones = FxHashMap::default();
        let result = self.clone_node(root, &mut clones);

        let mut pending = self.pending_children(root, result);
        while let Some((node, parent, slot)) = pending.pop() {
            let clone = self.clone_node(node, &mut clones);
            self.data_mut(clone).parent = Some(parent);
            self.data_mut(parent).children[slot] = Some(clone);
            pending.extend(self.pending_children(node, clone));
        }

        let cloned = clones.values().copied().collect::<Vec<_>>();
        for clone in cloned {
            for value in &mut self.data_mut(clone).attrs {
                if let Some(Value::Link(target)) = value {
                    if let Some(target_clone) = clones.get(target) {
                        *target = *target_clone;
                    }
                }
            }
        }
        result
    }

    /// Allocate a copy of a node without its children.
    fn clone_node(&mut self, node: NodeRef, clones: &mut FxHashMap<NodeRef, NodeRef>) -> NodeRef {
        let data = self.data(node);
        let clone = NodeData {
            children: vec![None; data.children.len()],
            parent: None,
            ..data.clone()
        };
        self.nodes.push(Some(clone));
        let clone = NodeRef(self.nodes.len() - 1);
        clones.insert(node, clone);
        clone
    }

    /// The children of `node` to copy into `clone`, last child first.
    fn pending_children(&self, node: NodeRef, clone: NodeRef) -> Vec<(NodeRef, NodeRef, usize)> {
        let children = self.data(node).children.iter().enumerate();
        (children.rev())
            .filter_map(|(slot, child)| Some(((*child)?, clone, slot)))
            .collect()
    }

    /// Structural equality of two subtrees, possibly in different arenas.
    /// Links are compared by the pre-order position of their targets.
    pub fn same_structure(&self, root: NodeRef, other: &Tree<'_>, other_root: NodeRef) -> bool {
        let left = self.preorder(root);
        let right = other.preorder(other_root);
        if left.len() != right.len() {
            return false;
        }
        let positions = |order: &[NodeRef]| {
            (order.iter().enumerate())
                .map(|(index, node)| (*node, index))
                .collect::<FxHashMap<_, _>>()
        };
        let (left_positions, right_positions) = (positions(&left), positions(&right));
        let same_position =
            |a: &NodeRef, b: &NodeRef| left_positions.get(a) == right_positions.get(b);

        Iterator::zip(left.iter(), right.iter()).all(|(l, r)| {
            let (l, r) = (self.data(*l), other.data(*r));
            let children_match = Iterator::zip(l.children.iter(), r.children.iter()).all(|pair| {
                match pair {
                    (None, None) => true,
                    (Some(a), Some(b)) => same_position(a, b),
                    _ => false,
                }
            });
            let attrs_match = Iterator::zip(l.attrs.iter(), r.attrs.iter()).all(|pair| match pair {
                (Some(Value::Link(a)), Some(Value::Link(b))) => same_position(a, b),
                (a, b) => a == b,
            });
            self.config[l.node].name == other.config[r.node].name && children_match && attrs_match
        })
    }

    /// Whether a node may occupy a slot of the given type.
    pub fn accepts(&self, r#type: NodeType, node: NodeRef) -> bool {
        self.config.accepts(r#type, self.node_type(node))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::check::tests::check_ok;

    const SOURCE: &str = r#"
        enum Kind { prefix = KD, values { local, global } };
        root node Program { children { child Decls decls { construct } } };
        node Decls {
            children { child Decl decl { construct }, child Decls next { construct } }
        };
        node Decl {
            attributes { construct string name, int8 size = 4, Kind kind = global, Decl alias }
        };
        pass Noop;
        root phase Main { passes { Noop } };
    "#;

    fn decl(tree: &mut Tree<'_>, name: &str) -> NodeRef {
        let id = tree.config().node_by_name("Decl").unwrap();
        tree.create(id, vec![], vec![Some(Value::String(name.to_owned()))]).unwrap()
    }

    fn decls(tree: &mut Tree<'_>, decl: NodeRef, next: Option<NodeRef>) -> NodeRef {
        let id = tree.config().node_by_name("Decls").unwrap();
        tree.create(id, vec![Some(decl), next], vec![]).unwrap()
    }

    #[test]
    fn create_fills_defaults() {
        let config = check_ok(SOURCE);
        let mut tree = Tree::new(&config);
        let x = decl(&mut tree, "x");

        assert_eq!(tree.attr(x, "name"), Some(&Value::String("x".to_owned())));
        assert_eq!(tree.attr(x, "size"), Some(&Value::Int(4)));
        assert_eq!(tree.attr(x, "kind"), Some(&Value::Enum(1)));
        assert_eq!(tree.attr(x, "alias"), None);
    }

    #[test]
    fn create_checks_arguments() {
        let config = check_ok(SOURCE);
        let mut tree = Tree::new(&config);
        let id = config.node_by_name("Decl").unwrap();
        let decls_id = config.node_by_name("Decls").unwrap();

        assert!(matches!(
            tree.create(id, vec![], vec![]),
            Err(CreateError::ArgumentCount { expected: 1, found: 0, .. }),
        ));
        assert!(matches!(
            tree.create(id, vec![], vec![Some(Value::Int(1))]),
            Err(CreateError::MismatchedValue { .. }),
        ));

        let x = decl(&mut tree, "x");
        assert!(matches!(
            tree.create(decls_id, vec![None, Some(x)], vec![]),
            Err(CreateError::MismatchedChild { .. }),
        ));
        let list = decls(&mut tree, x, None);
        assert!(matches!(
            tree.create(decls_id, vec![Some(x), None], vec![]),
            Err(CreateError::AlreadyOwned { .. }),
        ));
        assert_eq!(tree.data(x).parent(), Some(list));
    }

    #[test]
    fn create_rejects_repeated_children() {
        let config = check_ok(
            "root node Pair { children { child Leaf left { construct }, child Leaf right { construct } } };\n\
             node Leaf;\n\
             pass Noop;\n\
             root phase Main { passes { Noop } };",
        );
        let mut tree = Tree::new(&config);
        let pair = config.node_by_name("Pair").unwrap();
        let leaf = tree.create(config.node_by_name("Leaf").unwrap(), vec![], vec![]).unwrap();

        assert!(matches!(
            tree.create(pair, vec![Some(leaf), Some(leaf)], vec![]),
            Err(CreateError::AlreadyOwned { .. }),
        ));
        assert_eq!(tree.len(), 1);
        assert_eq!(tree.data(leaf).parent(), None);
    }

    #[test]
    fn attribute_ranges() {
        let config = check_ok(SOURCE);
        let mut tree = Tree::new(&config);
        let x = decl(&mut tree, "x");

        assert!(tree.set_attr(x, "size", Some(Value::Int(127))).is_ok());
        assert!(tree.set_attr(x, "size", Some(Value::Int(128))).is_err());
        assert!(tree.set_attr(x, "kind", Some(Value::Enum(2))).is_err());
        assert!(tree.set_attr(x, "size", None).is_err());
        assert!(tree.set_attr(x, "name", None).is_ok());
        assert!(tree.set_attr(x, "missing", None).is_err());
    }

    #[test]
    fn free_tree_and_node() {
        let config = check_ok(SOURCE);
        let mut tree = Tree::new(&config);
        let x = decl(&mut tree, "x");
        let y = decl(&mut tree, "y");
        let tail = decls(&mut tree, y, None);
        let list = decls(&mut tree, x, Some(tail));
        tree.set_attr(x, "alias", Some(Value::Link(y))).unwrap();

        tree.free_tree(tail);
        assert_eq!(tree.len(), 2);
        assert_eq!(tree.child(list, "next"), None);
        // Links to freed nodes are cleared
        assert_eq!(tree.attr(x, "alias"), None);

        tree.free_node(list);
        assert_eq!(tree.len(), 1);
        assert_eq!(tree.data(x).parent(), None);
    }

    #[test]
    fn deep_copy_shares_aliased_clones() {
        let config = check_ok(SOURCE);
        let mut tree = Tree::new(&config);
        let x = decl(&mut tree, "x");
        let y = decl(&mut tree, "y");
        let tail = decls(&mut tree, y, None);
        let list = decls(&mut tree, x, Some(tail));
        // `y` is reachable as an owned child and through the link of `x`
        tree.set_attr(x, "alias", Some(Value::Link(y))).unwrap();

        let copy = tree.deep_copy(list);
        assert_eq!(tree.len(), 8);

        let x_copy = tree.child(copy, "decl").unwrap();
        let y_copy = tree.child(tree.child(copy, "next").unwrap(), "decl").unwrap();
        assert_ne!(y_copy, y);
        assert_eq!(tree.attr(x_copy, "alias"), Some(&Value::Link(y_copy)));
        assert!(tree.same_structure(list, &tree, copy));
    }

    #[test]
    fn links_outside_the_copy_are_kept() {
        let config = check_ok(SOURCE);
        let mut tree = Tree::new(&config);
        let x = decl(&mut tree, "x");
        let y = decl(&mut tree, "y");
        tree.set_attr(x, "alias", Some(Value::Link(y))).unwrap();

        let x_copy = tree.deep_copy(x);
        assert_eq!(tree.attr(x_copy, "alias"), Some(&Value::Link(y)));
    }

    #[test]
    fn preorder_visits_children_in_order() {
        let config = check_ok(SOURCE);
        let mut tree = Tree::new(&config);
        let x = decl(&mut tree, "x");
        let y = decl(&mut tree, "y");
        let tail = decls(&mut tree, y, None);
        let list = decls(&mut tree, x, Some(tail));

        assert_eq!(tree.preorder(list), [list, x, tail, y]);
    }
}
