//! Assembly of declarations from the fields that the grammar parsed.
//!
//! The grammar only accepts the fields that are valid for each kind of item,
//! in any order. Duplicated fields, missing fields and misplaced modifiers are
//! reported here.

use crate::source::ByteRange;
use crate::surface::{
    AttrDecl, AttrTypeName, ChildDecl, EnumDecl, Ident, Item, Literal, MandatoryPhase, Message,
    NodeDecl, NodesetDecl, PassDecl, PhaseBody, PhaseDecl, PrimType, TraversalDecl,
};

/// A field in the braced body of an item.
pub enum Field {
    Info(ByteRange, String),
    Children(ByteRange, Vec<ChildDecl>),
    Attributes(ByteRange, Vec<AttrDecl>),
    Subphases(ByteRange, Vec<Ident>),
    Passes(ByteRange, Vec<Ident>),
    Func(ByteRange, Ident),
    Nodes(ByteRange, Vec<Ident>),
    Prefix(ByteRange, Ident),
    Values(ByteRange, Vec<Ident>),
}

/// A property in the braced body of a child.
pub enum ChildProp {
    Construct(ByteRange),
    Mandatory(ByteRange, Vec<MandatoryPhase>),
}

/// The `root` and `cycle` keywords preceding an item.
pub struct Modifiers {
    pub root: Option<ByteRange>,
    pub cycle: Option<ByteRange>,
}

impl Modifiers {
    fn check(&self, messages: &mut Vec<Message>, item: &'static str, root: bool, cycle: bool) {
        if let (Some(range), false) = (self.root, root) {
            messages.push(Message::UnexpectedModifier {
                range,
                modifier: "root",
                item,
            });
        }
        if let (Some(range), false) = (self.cycle, cycle) {
            messages.push(Message::UnexpectedModifier {
                range,
                modifier: "cycle",
                item,
            });
        }
    }
}

#[derive(Default)]
struct Fields {
    info: Option<(ByteRange, String)>,
    children: Option<(ByteRange, Vec<ChildDecl>)>,
    attributes: Option<(ByteRange, Vec<AttrDecl>)>,
    subphases: Option<(ByteRange, Vec<Ident>)>,
    passes: Option<(ByteRange, Vec<Ident>)>,
    func: Option<(ByteRange, Ident)>,
    nodes: Option<(ByteRange, Vec<Ident>)>,
    prefix: Option<(ByteRange, Ident)>,
    values: Option<(ByteRange, Vec<Ident>)>,
}

impl Fields {
    fn collect(messages: &mut Vec<Message>, fields: Vec<Field>) -> Fields {
        let mut slots = Fields::default();

        for field in fields {
            match field {
                Field::Info(range, value) => set(messages, &mut slots.info, "info", range, value),
                Field::Children(range, value) => {
                    set(messages, &mut slots.children, "children", range, value)
                }
                Field::Attributes(range, value) => {
                    set(messages, &mut slots.attributes, "attributes", range, value)
                }
                Field::Subphases(range, value) => {
                    set(messages, &mut slots.subphases, "subphases", range, value)
                }
                Field::Passes(range, value) => {
                    set(messages, &mut slots.passes, "passes", range, value)
                }
                Field::Func(range, value) => set(messages, &mut slots.func, "func", range, value),
                Field::Nodes(range, value) => {
                    set(messages, &mut slots.nodes, "nodes", range, value)
                }
                Field::Prefix(range, value) => {
                    set(messages, &mut slots.prefix, "prefix", range, value)
                }
                Field::Values(range, value) => {
                    set(messages, &mut slots.values, "values", range, value)
                }
            }
        }

        slots
    }
}

/// Record a field, reporting an error if it was already set.
fn set<T>(
    messages: &mut Vec<Message>,
    slot: &mut Option<(ByteRange, T)>,
    field: &'static str,
    range: ByteRange,
    value: T,
) {
    match slot {
        Some((previous_range, _)) => messages.push(Message::DuplicateField {
            range,
            previous_range: *previous_range,
            field,
        }),
        None => *slot = Some((range, value)),
    }
}

fn value<T>(slot: Option<(ByteRange, T)>) -> Option<T> {
    slot.map(|(_, value)| value)
}

fn required<T>(
    messages: &mut Vec<Message>,
    slot: Option<(ByteRange, T)>,
    name: &Ident,
    item: &'static str,
    field: &'static str,
) -> Option<T> {
    if slot.is_none() {
        messages.push(Message::MissingField {
            range: name.range,
            item,
            field,
        });
    }
    value(slot)
}

pub(crate) fn node(
    messages: &mut Vec<Message>,
    modifiers: Modifiers,
    name: Ident,
    fields: Vec<Field>,
) -> Option<Item> {
    modifiers.check(messages, "node", true, false);
    let fields = Fields::collect(messages, fields);

    Some(Item::Node(NodeDecl {
        root: modifiers.root,
        name,
        info: value(fields.info),
        children: value(fields.children).unwrap_or_default(),
        attributes: value(fields.attributes).unwrap_or_default(),
    }))
}

pub(crate) fn nodeset(
    messages: &mut Vec<Message>,
    modifiers: Modifiers,
    name: Ident,
    nodes: Vec<Ident>,
) -> Option<Item> {
    modifiers.check(messages, "nodeset", true, false);

    Some(Item::Nodeset(NodesetDecl {
        root: modifiers.root,
        name,
        nodes,
    }))
}

pub(crate) fn r#enum(
    messages: &mut Vec<Message>,
    modifiers: Modifiers,
    name: Ident,
    fields: Vec<Field>,
) -> Option<Item> {
    modifiers.check(messages, "enum", false, false);
    let fields = Fields::collect(messages, fields);

    let prefix = required(messages, fields.prefix, &name, "enum", "prefix");
    let values = required(messages, fields.values, &name, "enum", "values");

    Some(Item::Enum(EnumDecl {
        info: value(fields.info),
        prefix: prefix?,
        values: values?,
        name,
    }))
}

pub(crate) fn traversal(
    messages: &mut Vec<Message>,
    modifiers: Modifiers,
    name: Ident,
    fields: Vec<Field>,
) -> Option<Item> {
    modifiers.check(messages, "traversal", false, false);
    let fields = Fields::collect(messages, fields);

    Some(Item::Traversal(TraversalDecl {
        name,
        info: value(fields.info),
        nodes: value(fields.nodes),
    }))
}

pub(crate) fn pass(
    messages: &mut Vec<Message>,
    modifiers: Modifiers,
    name: Ident,
    fields: Vec<Field>,
) -> Option<Item> {
    modifiers.check(messages, "pass", false, false);
    let fields = Fields::collect(messages, fields);

    Some(Item::Pass(PassDecl {
        name,
        info: value(fields.info),
        func: value(fields.func),
    }))
}

pub(crate) fn phase(
    messages: &mut Vec<Message>,
    modifiers: Modifiers,
    name: Ident,
    fields: Vec<Field>,
) -> Option<Item> {
    modifiers.check(messages, "phase", true, true);
    let fields = Fields::collect(messages, fields);

    let body = match (value(fields.subphases), value(fields.passes)) {
        (Some(subphases), None) => PhaseBody::Subphases(subphases),
        (None, Some(passes)) => PhaseBody::Passes(passes),
        (Some(_), Some(_)) => {
            messages.push(Message::ConflictingPhaseBody {
                range: name.range,
                name: name.name,
            });
            return None;
        }
        (None, None) => {
            messages.push(Message::MissingField {
                range: name.range,
                item: "phase",
                field: "passes",
            });
            return None;
        }
    };

    Some(Item::Phase(PhaseDecl {
        root: modifiers.root,
        cycle: modifiers.cycle.is_some(),
        name,
        info: value(fields.info),
        body,
    }))
}

pub(crate) fn child(
    messages: &mut Vec<Message>,
    r#type: Ident,
    name: Ident,
    props: Vec<ChildProp>,
) -> ChildDecl {
    let (mut construct, mut mandatory) = (None, None);
    for prop in props {
        match prop {
            ChildProp::Construct(range) => set(messages, &mut construct, "construct", range, ()),
            ChildProp::Mandatory(range, phases) => {
                set(messages, &mut mandatory, "mandatory", range, phases)
            }
        }
    }

    ChildDecl {
        r#type,
        name,
        construct: construct.is_some(),
        mandatory: value(mandatory),
    }
}

pub(crate) fn attr(
    construct: bool,
    type_name: Ident,
    name: Ident,
    default: Option<Literal>,
) -> AttrDecl {
    let r#type = match PrimType::from_name(&type_name.name) {
        Some(prim) => AttrTypeName::Prim(type_name.range, prim),
        None => AttrTypeName::LinkOrEnum(type_name),
    };

    AttrDecl {
        construct,
        r#type,
        name,
        default,
    }
}

/// Integer literals that do not fit in an `i64` are kept as `u64`.
pub(crate) fn int_literal(
    messages: &mut Vec<Message>,
    range: ByteRange,
    digits: &str,
) -> Option<Literal> {
    if let Ok(value) = digits.parse::<i64>() {
        return Some(Literal::Int(range, value));
    }
    match digits.parse::<u64>() {
        Ok(value) => Some(Literal::UInt(range, value)),
        Err(error) => {
            messages.push(Message::InvalidLiteral {
                range,
                message: error.to_string(),
            });
            None
        }
    }
}

pub(crate) fn float_literal(
    messages: &mut Vec<Message>,
    range: ByteRange,
    digits: &str,
) -> Option<Literal> {
    match digits.parse::<f64>() {
        Ok(value) => Some(Literal::Float(range, value)),
        Err(error) => {
            messages.push(Message::InvalidLiteral {
                range,
                message: error.to_string(),
            });
            None
        }
    }
}
