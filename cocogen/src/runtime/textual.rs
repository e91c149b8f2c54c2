//! The textual tree format.
//!
//! ```text
//! root Program %1 {
//!     children {
//!         body = %2
//!     },
//!     attributes {
//!         name = "main"
//!     }
//! };
//!
//! Leaf %2;
//! ```
//!
//! Ids are assigned in pre-order. Reading happens in three steps: parsing
//! into a flat list of nodes, checking the ids and references of that list,
//! then rebuilding a typed tree.

use std::io::{self, Write};

use codespan_reporting::diagnostic::{Diagnostic, Label};
use fxhash::FxHashMap;
use itertools::Itertools;
use lalrpop_util::{lalrpop_mod, ErrorRecovery, ParseError};

use crate::model::{AttrType, Config, NodeType, PrimType};
use crate::runtime::{is_unsigned, NodeRef, Tree, Value};
use crate::source::{BytePos, ByteRange, FileId};
use crate::surface::reporting::format_expected;

lalrpop_mod!(grammar, "/runtime/textual/grammar.rs");
mod lexer;

/// A parsed textual file.
#[derive(Debug, Clone)]
pub struct TxtFile {
    pub nodes: Vec<TxtNode>,
    eof_range: ByteRange,
}

#[derive(Debug, Clone)]
pub struct TxtNode {
    pub range: ByteRange,
    pub root: Option<ByteRange>,
    pub r#type: String,
    pub type_range: ByteRange,
    pub id: u32,
    pub id_range: ByteRange,
    pub children: Vec<TxtChild>,
    pub attrs: Vec<TxtAttr>,
}

#[derive(Debug, Clone)]
pub struct TxtChild {
    pub range: ByteRange,
    pub name: String,
    pub target: u32,
    pub target_range: ByteRange,
}

#[derive(Debug, Clone)]
pub struct TxtAttr {
    pub range: ByteRange,
    pub name: String,
    pub value: TxtValue,
    pub value_range: ByteRange,
}

impl TxtNode {
    fn new(
        root: Option<ByteRange>,
        (type_range, r#type): (ByteRange, String),
        (id_range, id): (ByteRange, u32),
        sections: Vec<TxtSection>,
    ) -> TxtNode {
        let mut node = TxtNode {
            range: root.unwrap_or(type_range).merge(id_range),
            root,
            r#type,
            type_range,
            id,
            id_range,
            children: Vec::new(),
            attrs: Vec::new(),
        };
        for section in sections {
            match section {
                TxtSection::Children(children) => node.children.extend(children),
                TxtSection::Attributes(attrs) => node.attrs.extend(attrs),
            }
        }
        node
    }
}

/// A braced section of a node. A node may repeat sections.
pub enum TxtSection {
    Children(Vec<TxtChild>),
    Attributes(Vec<TxtAttr>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum TxtValue {
    Int(i128),
    Float(f64),
    Bool(bool),
    String(String),
    /// An enum value.
    Name(String),
    /// A link, as a node id.
    Ref(u32),
}

impl TxtValue {
    fn description(&self) -> &'static str {
        match self {
            TxtValue::Int(_) => "an integer",
            TxtValue::Float(_) => "a float",
            TxtValue::Bool(_) => "a boolean",
            TxtValue::String(_) => "a string",
            TxtValue::Name(_) => "a name",
            TxtValue::Ref(_) => "a node reference",
        }
    }
}

impl TxtFile {
    pub fn parse(file_id: FileId, source: &str) -> (TxtFile, Vec<Message>) {
        let mut messages = Vec::new();
        let tokens = lexer::tokens(file_id, source)
            .filter_map(|result| match result {
                Ok(token) => Some(token),
                Err(message) => {
                    messages.push(message);
                    None
                }
            })
            .collect::<Vec<_>>();

        let nodes = match grammar::FileParser::new().parse(file_id, &mut messages, tokens) {
            Ok(nodes) => nodes,
            Err(error) => {
                messages.push(Message::from_lalrpop(file_id, error));
                Vec::new()
            }
        };
        let len = source.len() as BytePos;
        let file = TxtFile {
            nodes,
            eof_range: ByteRange::new(file_id, len, len),
        };
        (file, messages)
    }
}

/// Messages produced while reading textual files.
#[derive(Debug, Clone)]
pub enum Message {
    UnexpectedCharacter {
        range: ByteRange,
    },
    UnexpectedToken {
        range: ByteRange,
        found: &'static str,
        expected: Vec<String>,
    },
    UnexpectedEndOfFile {
        range: ByteRange,
        expected: Vec<String>,
    },
    InvalidLiteral {
        range: ByteRange,
        message: String,
    },
    DuplicateRoot {
        range: ByteRange,
        previous_range: ByteRange,
    },
    DuplicateId {
        range: ByteRange,
        previous_range: ByteRange,
        id: u32,
    },
    UnknownId {
        range: ByteRange,
        id: u32,
    },
    MissingRoot {
        range: ByteRange,
    },
    UnusedNode {
        range: ByteRange,
        id: u32,
    },
    UnknownNodeType {
        range: ByteRange,
        name: String,
    },
    MismatchedNodeType {
        range: ByteRange,
        expected: String,
        found: String,
    },
    UnknownField {
        range: ByteRange,
        node: String,
        what: &'static str,
        name: String,
    },
    MismatchedValue {
        range: ByteRange,
        attr: String,
        expected: String,
        found: &'static str,
    },
    ValueOutOfRange {
        range: ByteRange,
        attr: String,
    },
    UnknownEnumValue {
        range: ByteRange,
        enum_name: String,
        value: String,
    },
    SharedChild {
        range: ByteRange,
        id: u32,
    },
    LinkOutsideTree {
        range: ByteRange,
        id: u32,
    },
}

impl Message {
    fn from_lalrpop(
        file_id: FileId,
        error: ParseError<BytePos, lexer::Token<'_>, Message>,
    ) -> Message {
        match error {
            ParseError::InvalidToken { location } => Message::UnexpectedCharacter {
                range: ByteRange::new(file_id, location, location),
            },
            ParseError::UnrecognizedEOF { location, expected } => Message::UnexpectedEndOfFile {
                range: ByteRange::new(file_id, location, location),
                expected,
            },
            ParseError::UnrecognizedToken {
                token: (start, token, end),
                expected,
            } => Message::UnexpectedToken {
                range: ByteRange::new(file_id, start, end),
                found: token.description(),
                expected,
            },
            ParseError::ExtraToken {
                token: (start, token, end),
            } => Message::UnexpectedToken {
                range: ByteRange::new(file_id, start, end),
                found: token.description(),
                expected: Vec::new(),
            },
            ParseError::User { error } => error,
        }
    }

    fn from_recovery(
        file_id: FileId,
        recovery: ErrorRecovery<BytePos, lexer::Token<'_>, Message>,
    ) -> Message {
        Message::from_lalrpop(file_id, recovery.error)
    }

    pub fn is_error(&self) -> bool {
        !matches!(self, Message::UnusedNode { .. })
    }

    pub fn to_diagnostic(&self) -> Diagnostic<FileId> {
        let primary_label = |range: &ByteRange| Label::primary(range.file_id(), *range);
        let secondary_label = |range: &ByteRange| Label::secondary(range.file_id(), *range);

        match self {
            Message::UnexpectedCharacter { range } => Diagnostic::error()
                .with_message("unexpected character")
                .with_labels(vec![primary_label(range)]),
            Message::UnexpectedToken {
                range,
                found,
                expected,
            } => Diagnostic::error()
                .with_message(format!("unexpected token `{found}`"))
                .with_labels(vec![primary_label(range).with_message("unexpected token")])
                .with_notes(format_expected(expected).into_iter().collect()),
            Message::UnexpectedEndOfFile { range, expected } => Diagnostic::error()
                .with_message("unexpected end of file")
                .with_labels(vec![primary_label(range).with_message("unexpected end of file")])
                .with_notes(format_expected(expected).into_iter().collect()),
            Message::InvalidLiteral { range, message } => Diagnostic::error()
                .with_message("invalid literal")
                .with_labels(vec![primary_label(range).with_message(message)]),
            Message::DuplicateRoot {
                range,
                previous_range,
            } => Diagnostic::error()
                .with_message("duplicate root declaration")
                .with_labels(vec![
                    primary_label(range).with_message("second root"),
                    secondary_label(previous_range).with_message("previously declared here"),
                ]),
            Message::DuplicateId {
                range,
                previous_range,
                id,
            } => Diagnostic::error()
                .with_message(format!("duplicate node id `%{id}`"))
                .with_labels(vec![
                    primary_label(range).with_message("duplicate id"),
                    secondary_label(previous_range).with_message("previously declared here"),
                ]),
            Message::UnknownId { range, id } => Diagnostic::error()
                .with_message(format!("reference to non-existing node `%{id}`"))
                .with_labels(vec![primary_label(range).with_message("unknown node id")]),
            Message::MissingRoot { range } => Diagnostic::error()
                .with_message("no root node declared")
                .with_labels(vec![primary_label(range)])
                .with_notes(vec!["help: mark the root node with `root`".to_owned()]),
            Message::UnusedNode { range, id } => Diagnostic::warning()
                .with_message(format!("node `%{id}` is unused in the AST"))
                .with_labels(vec![primary_label(range).with_message("unused node")]),
            Message::UnknownNodeType { range, name } => Diagnostic::error()
                .with_message(format!("unknown node type `{name}`"))
                .with_labels(vec![primary_label(range)]),
            Message::MismatchedNodeType {
                range,
                expected,
                found,
            } => Diagnostic::error()
                .with_message(format!("expected node type `{expected}`, found `{found}`"))
                .with_labels(vec![primary_label(range).with_message("mismatched node type")]),
            Message::UnknownField {
                range,
                node,
                what,
                name,
            } => Diagnostic::error()
                .with_message(format!("node `{node}` has no {what} named `{name}`"))
                .with_labels(vec![primary_label(range)]),
            Message::MismatchedValue {
                range,
                attr,
                expected,
                found,
            } => Diagnostic::error()
                .with_message(format!("attribute `{attr}` expects a value of type `{expected}`"))
                .with_labels(vec![primary_label(range).with_message(format!("found {found}"))]),
            Message::ValueOutOfRange { range, attr } => Diagnostic::error()
                .with_message(format!("value of attribute `{attr}` is out of range"))
                .with_labels(vec![primary_label(range)]),
            Message::UnknownEnumValue {
                range,
                enum_name,
                value,
            } => Diagnostic::error()
                .with_message(format!("enum `{enum_name}` has no value `{value}`"))
                .with_labels(vec![primary_label(range)]),
            Message::SharedChild { range, id } => Diagnostic::error()
                .with_message(format!("node `%{id}` is the child of more than one node"))
                .with_labels(vec![primary_label(range)]),
            Message::LinkOutsideTree { range, id } => Diagnostic::error()
                .with_message(format!("link to node `%{id}`, which is not part of the tree"))
                .with_labels(vec![primary_label(range)]),
        }
    }
}

fn invalid_literal<T>(messages: &mut Vec<Message>, range: ByteRange, message: &str) -> Option<T> {
    messages.push(Message::InvalidLiteral {
        range,
        message: message.to_owned(),
    });
    None
}

/// Write the tree rooted at `root`.
pub fn write(tree: &Tree<'_>, root: NodeRef, writer: &mut impl Write) -> io::Result<()> {
    let config = tree.config();
    let order = tree.preorder(root);
    let ids = (order.iter().enumerate())
        .map(|(index, node)| (*node, index as u32 + 1))
        .collect::<FxHashMap<_, _>>();

    for (index, node) in order.iter().enumerate() {
        let data = tree.data(*node);
        let decl = &config[data.node];
        if index > 0 {
            writeln!(writer)?;
        }
        if *node == root {
            write!(writer, "root ")?;
        }
        write!(writer, "{} %{}", decl.name, ids[node])?;

        let children = (decl.children.iter().zip(&data.children))
            .filter_map(|(decl, child)| Some((decl, (*child)?)))
            .collect::<Vec<_>>();
        let attrs = (decl.attrs.iter().zip(&data.attrs))
            .filter_map(|(decl, value)| Some((decl, value.as_ref()?)))
            .collect::<Vec<_>>();
        if children.is_empty() && attrs.is_empty() {
            writeln!(writer, ";")?;
            continue;
        }

        writeln!(writer, " {{")?;
        if !children.is_empty() {
            writeln!(writer, "    children {{")?;
            let lines = (children.iter())
                .map(|(decl, child)| format!("        {} = %{}", decl.name, ids[child]));
            writeln!(writer, "{}", lines.format(",\n"))?;
            write!(writer, "    }}")?;
            if !attrs.is_empty() {
                write!(writer, ",")?;
            }
            writeln!(writer)?;
        }
        if !attrs.is_empty() {
            writeln!(writer, "    attributes {{")?;
            let mut lines = Vec::with_capacity(attrs.len());
            for (decl, value) in attrs {
                let value = match (decl.r#type, value) {
                    (_, Value::Int(value)) => value.to_string(),
                    (_, Value::UInt(value)) => value.to_string(),
                    (_, Value::Float(value)) => format!("{value:?}"),
                    (_, Value::Bool(value)) => value.to_string(),
                    (_, Value::String(value)) => quote(value),
                    (_, Value::Link(target)) => match ids.get(target) {
                        Some(id) => format!("%{id}"),
                        None => {
                            let message = format!("link `{}` leaves the tree", decl.name);
                            return Err(io::Error::new(io::ErrorKind::InvalidData, message));
                        }
                    },
                    (AttrType::Enum(id), Value::Enum(index)) => config[id].values[*index].clone(),
                    (_, Value::Enum(_)) => {
                        panic!("enum value in non-enum attribute `{}`", decl.name)
                    }
                };
                lines.push(format!("        {} = {value}", decl.name));
            }
            writeln!(writer, "{}", lines.iter().format(",\n"))?;
            writeln!(writer, "    }}")?;
        }
        writeln!(writer, "}};")?;
    }
    Ok(())
}

fn quote(string: &str) -> String {
    let mut output = String::with_capacity(string.len() + 2);
    output.push('"');
    for c in string.chars() {
        match c {
            '"' => output.push_str("\\\""),
            '\\' => output.push_str("\\\\"),
            '\n' => output.push_str("\\n"),
            '\t' => output.push_str("\\t"),
            c => output.push(c),
        }
    }
    output.push('"');
    output
}

/// Check the ids and references of a parsed file.
pub fn check(file: &TxtFile, on_message: &mut dyn FnMut(Message)) {
    let mut root: Option<&TxtNode> = None;
    let mut ids = FxHashMap::default();
    for node in &file.nodes {
        if let Some(range) = node.root {
            match root {
                Some(previous) => on_message(Message::DuplicateRoot {
                    range,
                    previous_range: previous.root.unwrap_or(previous.range),
                }),
                None => root = Some(node),
            }
        }
        match ids.get(&node.id) {
            Some(previous) => on_message(Message::DuplicateId {
                range: node.id_range,
                previous_range: *previous,
                id: node.id,
            }),
            None => {
                ids.insert(node.id, node.id_range);
            }
        }
    }

    let mut used = FxHashMap::default();
    for node in &file.nodes {
        for child in &node.children {
            match ids.contains_key(&child.target) {
                true => *used.entry(child.target).or_insert(0) += 1,
                false => on_message(Message::UnknownId {
                    range: child.target_range,
                    id: child.target,
                }),
            }
        }
        for attr in &node.attrs {
            if let TxtValue::Ref(target) = attr.value {
                if !ids.contains_key(&target) {
                    on_message(Message::UnknownId {
                        range: attr.value_range,
                        id: target,
                    });
                }
            }
        }
    }

    if root.is_none() {
        on_message(Message::MissingRoot {
            range: file.eof_range,
        });
    }
    for node in &file.nodes {
        if node.root.is_none() && !used.contains_key(&node.id) {
            on_message(Message::UnusedNode {
                range: node.range,
                id: node.id,
            });
        }
    }
}

/// Rebuild a typed tree from a checked file. Nodes that are not reachable
/// from the root are dropped.
pub fn reconstruct<'config>(
    config: &'config Config,
    file: &TxtFile,
    expected: NodeType,
    on_message: &mut dyn FnMut(Message),
) -> Option<(Tree<'config>, NodeRef)> {
    let root = file.nodes.iter().find(|node| node.root.is_some())?;
    let mut builder = Builder {
        tree: Tree::new(config),
        nodes: file.nodes.iter().map(|node| (node.id, node)).collect(),
        built: FxHashMap::default(),
        links: Vec::new(),
        on_message,
        seen_errors: false,
    };
    let result = builder.build(root, expected, root.type_range);
    builder.resolve_links();
    match (result, builder.seen_errors) {
        (Some(result), false) => Some((builder.tree, result)),
        (_, _) => None,
    }
}

/// Parse, check and rebuild a textual file.
pub fn read<'config>(
    config: &'config Config,
    file_id: FileId,
    source: &str,
    expected: NodeType,
    on_message: &mut dyn FnMut(Message),
) -> Option<(Tree<'config>, NodeRef)> {
    let (file, messages) = TxtFile::parse(file_id, source);
    let mut seen_errors = !messages.is_empty();
    messages.into_iter().for_each(&mut *on_message);

    check(&file, &mut |message| {
        seen_errors |= message.is_error();
        on_message(message);
    });
    if seen_errors {
        return None;
    }
    reconstruct(config, &file, expected, on_message)
}

/// A node waiting to be built: its record, the type of the slot it fills,
/// where it was referenced, and the slot itself.
type Pending<'file> = (&'file TxtNode, NodeType, ByteRange, Option<(NodeRef, usize)>);

struct Builder<'config, 'file, 'msg> {
    tree: Tree<'config>,
    nodes: FxHashMap<u32, &'file TxtNode>,
    built: FxHashMap<u32, NodeRef>,
    links: Vec<(NodeRef, usize, &'file TxtAttr, u32)>,
    on_message: &'msg mut dyn FnMut(Message),
    seen_errors: bool,
}

impl<'config, 'file, 'msg> Builder<'config, 'file, 'msg> {
    fn report(&mut self, message: Message) {
        self.seen_errors = true;
        (self.on_message)(message);
    }

    /// Build the tree below `root` in pre-order, with an explicit stack so
    /// that long chains of nodes are not limited by the call stack.
    fn build(
        &mut self,
        root: &'file TxtNode,
        expected: NodeType,
        use_range: ByteRange,
    ) -> Option<NodeRef> {
        let mut pending = vec![(root, expected, use_range, None)];
        let mut result = None;
        while let Some((node, expected, use_range, parent)) = pending.pop() {
            let Some(built) = self.build_node(node, expected, use_range, &mut pending) else {
                continue;
            };
            match parent {
                Some((parent, slot)) => {
                    self.tree.replace_child(parent, slot, Some(built));
                }
                None => result = Some(built),
            }
        }
        result
    }

    fn build_node(
        &mut self,
        node: &'file TxtNode,
        expected: NodeType,
        use_range: ByteRange,
        pending: &mut Vec<Pending<'file>>,
    ) -> Option<NodeRef> {
        let config = self.tree.config();
        if self.built.contains_key(&node.id) {
            self.report(Message::SharedChild {
                range: use_range,
                id: node.id,
            });
            return None;
        }

        let Some(node_id) = config.node_by_name(&node.r#type) else {
            self.report(Message::UnknownNodeType {
                range: node.type_range,
                name: node.r#type.clone(),
            });
            return None;
        };
        if !config.accepts(expected, node_id) {
            self.report(Message::MismatchedNodeType {
                range: node.type_range,
                expected: config.type_name(expected).to_owned(),
                found: node.r#type.clone(),
            });
            return None;
        }

        let decl = &config[node_id];
        let result = self.tree.alloc(node_id);
        self.built.insert(node.id, result);

        let mut children = Vec::new();
        for child in &node.children {
            let Some((slot, child_decl)) = decl.child(&child.name) else {
                self.report(Message::UnknownField {
                    range: child.range,
                    node: decl.name.clone(),
                    what: "child",
                    name: child.name.clone(),
                });
                continue;
            };
            let Some(target) = self.nodes.get(&child.target).copied() else {
                self.report(Message::UnknownId {
                    range: child.target_range,
                    id: child.target,
                });
                continue;
            };
            children.push((target, child_decl.r#type, child.target_range, Some((result, slot))));
        }
        pending.extend(children.into_iter().rev());

        for attr in &node.attrs {
            let Some((slot, attr_decl)) = decl.attr(&attr.name) else {
                self.report(Message::UnknownField {
                    range: attr.range,
                    node: decl.name.clone(),
                    what: "attribute",
                    name: attr.name.clone(),
                });
                continue;
            };
            if let (AttrType::Link(_), TxtValue::Ref(target)) = (attr_decl.r#type, &attr.value) {
                self.links.push((result, slot, attr, *target));
                continue;
            }
            if let Some(value) = self.value(attr_decl.r#type, attr) {
                match value.fits(config, attr_decl.r#type) {
                    true => {
                        let value = value.stored(attr_decl.r#type);
                        self.tree.data_mut(result).attrs[slot] = Some(value);
                    }
                    false => self.report(Message::ValueOutOfRange {
                        range: attr.value_range,
                        attr: attr.name.clone(),
                    }),
                }
            }
        }

        Some(result)
    }

    fn value(&mut self, r#type: AttrType, attr: &TxtAttr) -> Option<Value> {
        let config = self.tree.config();
        let value = match (r#type, &attr.value) {
            (AttrType::Prim(PrimType::Float | PrimType::Double), TxtValue::Float(value)) => {
                Value::Float(*value)
            }
            (AttrType::Prim(PrimType::Float | PrimType::Double), TxtValue::Int(value)) => {
                Value::Float(*value as f64)
            }
            (AttrType::Prim(PrimType::Bool), TxtValue::Bool(value)) => Value::Bool(*value),
            (AttrType::Prim(PrimType::String), TxtValue::String(value)) => {
                Value::String(value.clone())
            }
            (AttrType::Prim(prim), TxtValue::Int(value)) if is_unsigned(prim) => {
                match u64::try_from(*value) {
                    Ok(value) => Value::UInt(value),
                    Err(_) => return self.out_of_range(attr),
                }
            }
            (AttrType::Prim(prim), TxtValue::Int(value))
                if !matches!(prim, PrimType::Bool | PrimType::String) =>
            {
                match i64::try_from(*value) {
                    Ok(value) => Value::Int(value),
                    Err(_) => return self.out_of_range(attr),
                }
            }
            (AttrType::Enum(id), TxtValue::Name(name)) => {
                let r#enum = &config[id];
                match r#enum.values.iter().position(|value| value == name) {
                    Some(index) => Value::Enum(index),
                    None => {
                        self.report(Message::UnknownEnumValue {
                            range: attr.value_range,
                            enum_name: r#enum.name.clone(),
                            value: name.clone(),
                        });
                        return None;
                    }
                }
            }
            (r#type, value) => {
                let expected = match r#type {
                    AttrType::Prim(prim) => prim.name().to_owned(),
                    AttrType::Link(id) => config[id].name.clone(),
                    AttrType::Enum(id) => config[id].name.clone(),
                };
                self.report(Message::MismatchedValue {
                    range: attr.value_range,
                    attr: attr.name.clone(),
                    expected,
                    found: value.description(),
                });
                return None;
            }
        };
        Some(value)
    }

    fn out_of_range(&mut self, attr: &TxtAttr) -> Option<Value> {
        self.report(Message::ValueOutOfRange {
            range: attr.value_range,
            attr: attr.name.clone(),
        });
        None
    }

    fn resolve_links(&mut self) {
        let config = self.tree.config();
        for (node, slot, attr, target) in std::mem::take(&mut self.links) {
            let r#type = config[self.tree.node_type(node)].attrs[slot].r#type;
            let AttrType::Link(expected) = r#type else {
                continue;
            };
            let Some(target_node) = self.built.get(&target).copied() else {
                self.report(Message::LinkOutsideTree {
                    range: attr.value_range,
                    id: target,
                });
                continue;
            };
            if self.tree.node_type(target_node) != expected {
                self.report(Message::MismatchedNodeType {
                    range: attr.value_range,
                    expected: config[expected].name.clone(),
                    found: self.tree.type_name(target_node).to_owned(),
                });
                continue;
            }
            self.tree.data_mut(node).attrs[slot] = Some(Value::Link(target_node));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::check::tests::check_ok;
    use crate::source::Files;

    const SOURCE: &str = r#"
        enum Kind { prefix = KD, values { public, private } };
        root node Program { children { child Leaf body }, attributes { string name, Kind kind, Leaf target } };
        node Leaf { attributes { int16 size, double ratio } };
        pass Noop;
        root phase Main { passes { Noop } };
    "#;

    const TEXT: &str = "root Program %1 {\n\
                        \x20   children {\n\
                        \x20       body = %2\n\
                        \x20   },\n\
                        \x20   attributes {\n\
                        \x20       name = \"main\",\n\
                        \x20       kind = private,\n\
                        \x20       target = %2\n\
                        \x20   }\n\
                        };\n\
                        \n\
                        Leaf %2 {\n\
                        \x20   attributes {\n\
                        \x20       size = -3,\n\
                        \x20       ratio = 0.5\n\
                        \x20   }\n\
                        };\n";

    fn parse(source: &str) -> (TxtFile, Vec<Message>) {
        let mut files = Files::new();
        let file_id = files.add("test.txt", source.to_owned());
        TxtFile::parse(file_id, source)
    }

    #[test]
    fn nodes_and_sections() {
        let (file, messages) = parse(
            "root Program %1 {\n\
             \x20   children { body = %2 },\n\
             \x20   attributes { name = \"main\\n\", size = -3, ratio = 1.5e3, kind = public },\n\
             \x20   attributes { target = %2, }\n\
             };\n\
             \n\
             Leaf %2;\n",
        );
        assert!(messages.is_empty(), "{messages:?}");
        assert_eq!(file.nodes.len(), 2);

        let root = &file.nodes[0];
        assert!(root.root.is_some());
        assert_eq!((root.r#type.as_str(), root.id), ("Program", 1));
        assert_eq!((root.children[0].name.as_str(), root.children[0].target), ("body", 2));
        let values: Vec<_> = root.attrs.iter().map(|attr| attr.value.clone()).collect();
        assert_eq!(
            values,
            [
                TxtValue::String("main\n".to_owned()),
                TxtValue::Int(-3),
                TxtValue::Float(1500.0),
                TxtValue::Name("public".to_owned()),
                TxtValue::Ref(2),
            ],
        );
        assert!(file.nodes[1].root.is_none());
    }

    #[test]
    fn special_floats() {
        let (file, messages) = parse("Num %1 { attributes { a = inf, b = -inf, c = NaN } };");
        assert!(messages.is_empty());
        let attrs = &file.nodes[0].attrs;
        assert_eq!(attrs[0].value, TxtValue::Float(f64::INFINITY));
        assert_eq!(attrs[1].value, TxtValue::Float(f64::NEG_INFINITY));
        assert!(matches!(attrs[2].value, TxtValue::Float(value) if value.is_nan()));
    }

    #[test]
    fn recovers_after_errors() {
        let (file, messages) = parse("Num { };\nNum %2;\nNum %3 { children { x = 4 } };\n");
        assert_eq!(file.nodes.len(), 1);
        assert_eq!(file.nodes[0].id, 2);
        assert_eq!(messages.len(), 2);
        assert!(matches!(
            &messages[0],
            Message::UnexpectedToken { found: "{", expected, .. } if expected == &["\"node id\""]
        ));
    }

    #[test]
    fn oversized_ids_are_invalid_literals() {
        let (file, messages) =
            parse("Num %99999999999;\nNum %2 { children { x = %99999999999 } };");
        assert!(matches!(
            messages[..],
            [Message::InvalidLiteral { .. }, Message::InvalidLiteral { .. }]
        ));
        assert_eq!(file.nodes.len(), 1);
        assert!(file.nodes[0].children.is_empty());
    }

    fn read_source<'config>(
        config: &'config Config,
        source: &str,
    ) -> (Option<(Tree<'config>, NodeRef)>, Vec<Message>) {
        let mut files = Files::new();
        let file_id = files.add("tree.txt", source.to_owned());
        let mut messages = Vec::new();
        let result = read(config, file_id, source, config.root_node, &mut |m| messages.push(m));
        (result, messages)
    }

    fn messages(source: &str) -> Vec<String> {
        let config = check_ok(SOURCE);
        let (_, messages) = read_source(&config, source);
        (messages.iter())
            .map(|message| message.to_diagnostic().message)
            .collect()
    }

    #[test]
    fn read_then_write() {
        let config = check_ok(SOURCE);
        let (result, messages) = read_source(&config, TEXT);
        assert!(messages.is_empty(), "{messages:?}");
        let (tree, root) = result.unwrap();

        let body = tree.child(root, "body").unwrap();
        assert_eq!(tree.attr(root, "target"), Some(&Value::Link(body)));
        assert_eq!(tree.attr(body, "size"), Some(&Value::Int(-3)));

        let mut output = Vec::new();
        write(&tree, root, &mut output).unwrap();
        assert_eq!(String::from_utf8(output).unwrap(), TEXT);
    }

    #[test]
    fn empty_nodes() {
        let config = check_ok(SOURCE);
        let id = config.node_by_name("Program").unwrap();
        let mut tree = Tree::new(&config);
        let root = tree.create(id, vec![], vec![]).unwrap();

        let mut output = Vec::new();
        write(&tree, root, &mut output).unwrap();
        assert_eq!(
            String::from_utf8(output).unwrap(),
            "root Program %1 {\n    attributes {\n        kind = public\n    }\n};\n",
        );
    }

    #[test]
    fn check_messages() {
        assert_eq!(
            messages("root Program %1;\nroot Program %1;\nLeaf %3;\n"),
            [
                "duplicate root declaration",
                "duplicate node id `%1`",
                "node `%3` is unused in the AST",
            ],
        );
        assert_eq!(
            messages("Leaf %1;\nProgram %2 { children { body = %7 } };\n"),
            [
                "reference to non-existing node `%7`",
                "no root node declared",
                "node `%1` is unused in the AST",
                "node `%2` is unused in the AST",
            ],
        );
    }

    #[test]
    fn reconstruction_messages() {
        assert_eq!(
            messages("root Leaf %1;\n"),
            ["expected node type `Program`, found `Leaf`"],
        );
        assert_eq!(
            messages("root Program %1 { attributes { kind = protected, name = 3 } };\n"),
            [
                "enum `Kind` has no value `protected`",
                "attribute `name` expects a value of type `string`",
            ],
        );
        assert_eq!(
            messages("root Program %1 { children { body = %2 } };\nLeaf %2 { attributes { size = 40000, colour = 1 } };\n"),
            [
                "value of attribute `size` is out of range",
                "node `Leaf` has no attribute named `colour`",
            ],
        );
        assert_eq!(
            messages("root Program %1 { children { body = %1 } };\n"),
            ["node `%1` is the child of more than one node"],
        );
    }

    #[test]
    fn ids_follow_preorder() {
        let config = check_ok(SOURCE);
        let source = "root Program %7 { children { body = %3 } };\nLeaf %3;\n";
        let (result, _) = read_source(&config, source);
        let (tree, root) = result.unwrap();

        let mut output = Vec::new();
        write(&tree, root, &mut output).unwrap();
        let output = String::from_utf8(output).unwrap();
        assert!(output.starts_with(
            "root Program %1 {\n    children {\n        body = %2\n    },\n"
        ));
        assert!(output.contains("\nLeaf %2 {\n"));
    }
}
