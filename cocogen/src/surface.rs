//! Surface language: the unresolved declarations as written in a `.ccn` file.

use lalrpop_util::lalrpop_mod;

use crate::source::{ByteRange, FileId};

lalrpop_mod!(grammar, "/surface/grammar.rs");
mod items;
pub(crate) mod lexer;
pub(crate) mod reporting;

pub use reporting::Message;

/// A name, along with the place it was written.
#[derive(Debug, Clone, PartialEq)]
pub struct Ident {
    pub range: ByteRange,
    pub name: String,
}

impl Ident {
    pub fn as_str(&self) -> &str {
        &self.name
    }
}

/// A parsed, unresolved configuration file.
#[derive(Debug, Clone, Default)]
pub struct Module {
    pub items: Vec<Item>,
}

impl Module {
    /// Parse a module from the `source` string, returning the module along
    /// with any syntax errors encountered along the way.
    pub fn parse(file_id: FileId, source: &str) -> (Module, Vec<Message>) {
        let mut messages = Vec::new();
        let tokens = lexer::tokens(file_id, source)
            .filter_map(|result| match result {
                Ok(token) => Some(token),
                Err(error) => {
                    messages.push(Message::Lexer(error));
                    None
                }
            })
            .collect::<Vec<_>>();

        match grammar::ModuleParser::new().parse(file_id, &mut messages, tokens) {
            Ok(module) => (module, messages),
            Err(error) => {
                messages.push(Message::from_lalrpop(file_id, error));
                (Module::default(), messages)
            }
        }
    }
}

/// Top-level declarations.
#[derive(Debug, Clone)]
pub enum Item {
    Node(NodeDecl),
    Nodeset(NodesetDecl),
    Enum(EnumDecl),
    Traversal(TraversalDecl),
    Pass(PassDecl),
    Phase(PhaseDecl),
}

impl Item {
    pub fn name(&self) -> &Ident {
        match self {
            Item::Node(decl) => &decl.name,
            Item::Nodeset(decl) => &decl.name,
            Item::Enum(decl) => &decl.name,
            Item::Traversal(decl) => &decl.name,
            Item::Pass(decl) => &decl.name,
            Item::Phase(decl) => &decl.name,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NodeDecl {
    pub root: Option<ByteRange>,
    pub name: Ident,
    pub info: Option<String>,
    pub children: Vec<ChildDecl>,
    pub attributes: Vec<AttrDecl>,
}

#[derive(Debug, Clone)]
pub struct ChildDecl {
    pub r#type: Ident,
    pub name: Ident,
    pub construct: bool,
    /// `None` unless the child was marked `mandatory`.
    pub mandatory: Option<Vec<MandatoryPhase>>,
}

/// A phase (or range of phases) in which a child must, or must not, be set.
#[derive(Debug, Clone)]
pub struct MandatoryPhase {
    pub range: ByteRange,
    pub negated: bool,
    pub phases: PhaseSpan,
}

#[derive(Debug, Clone)]
pub enum PhaseSpan {
    Single(Ident),
    Range(Ident, Ident),
}

#[derive(Debug, Clone)]
pub struct AttrDecl {
    pub construct: bool,
    pub r#type: AttrTypeName,
    pub name: Ident,
    pub default: Option<Literal>,
}

/// Attribute types, before names are resolved.
#[derive(Debug, Clone)]
pub enum AttrTypeName {
    Prim(ByteRange, PrimType),
    /// A node (making this a link attribute) or an enum.
    LinkOrEnum(Ident),
}

impl AttrTypeName {
    pub fn range(&self) -> ByteRange {
        match self {
            AttrTypeName::Prim(range, _) => *range,
            AttrTypeName::LinkOrEnum(ident) => ident.range,
        }
    }
}

/// Builtin attribute types.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum PrimType {
    Int,
    UInt,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float,
    Double,
    Bool,
    String,
}

impl PrimType {
    pub const ALL: [PrimType; 14] = [
        PrimType::Int,
        PrimType::UInt,
        PrimType::Int8,
        PrimType::Int16,
        PrimType::Int32,
        PrimType::Int64,
        PrimType::UInt8,
        PrimType::UInt16,
        PrimType::UInt32,
        PrimType::UInt64,
        PrimType::Float,
        PrimType::Double,
        PrimType::Bool,
        PrimType::String,
    ];

    pub fn from_name(name: &str) -> Option<PrimType> {
        PrimType::ALL.into_iter().find(|prim| prim.name() == name)
    }

    pub fn name(self) -> &'static str {
        match self {
            PrimType::Int => "int",
            PrimType::UInt => "uint",
            PrimType::Int8 => "int8",
            PrimType::Int16 => "int16",
            PrimType::Int32 => "int32",
            PrimType::Int64 => "int64",
            PrimType::UInt8 => "uint8",
            PrimType::UInt16 => "uint16",
            PrimType::UInt32 => "uint32",
            PrimType::UInt64 => "uint64",
            PrimType::Float => "float",
            PrimType::Double => "double",
            PrimType::Bool => "bool",
            PrimType::String => "string",
        }
    }
}

/// Literal default values.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    String(ByteRange, String),
    Int(ByteRange, i64),
    /// Integer literals too large for `i64`.
    UInt(ByteRange, u64),
    Float(ByteRange, f64),
    Bool(ByteRange, bool),
    Name(Ident),
}

impl Literal {
    pub fn range(&self) -> ByteRange {
        match self {
            Literal::String(range, _)
            | Literal::Int(range, _)
            | Literal::UInt(range, _)
            | Literal::Float(range, _)
            | Literal::Bool(range, _) => *range,
            Literal::Name(ident) => ident.range,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NodesetDecl {
    pub root: Option<ByteRange>,
    pub name: Ident,
    pub nodes: Vec<Ident>,
}

#[derive(Debug, Clone)]
pub struct EnumDecl {
    pub name: Ident,
    pub info: Option<String>,
    pub prefix: Ident,
    pub values: Vec<Ident>,
}

#[derive(Debug, Clone)]
pub struct TraversalDecl {
    pub name: Ident,
    pub info: Option<String>,
    /// `None` when the traversal applies to every node.
    pub nodes: Option<Vec<Ident>>,
}

#[derive(Debug, Clone)]
pub struct PassDecl {
    pub name: Ident,
    pub info: Option<String>,
    pub func: Option<Ident>,
}

#[derive(Debug, Clone)]
pub struct PhaseDecl {
    pub root: Option<ByteRange>,
    pub cycle: bool,
    pub name: Ident,
    pub info: Option<String>,
    pub body: PhaseBody,
}

#[derive(Debug, Clone)]
pub enum PhaseBody {
    Subphases(Vec<Ident>),
    Passes(Vec<Ident>),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::Files;

    fn parse(source: &str) -> (Module, Vec<Message>) {
        let mut files = Files::new();
        let file_id = files.add("test.ccn", source.to_owned());
        Module::parse(file_id, source)
    }

    fn parse_ok(source: &str) -> Module {
        let (module, messages) = parse(source);
        assert!(messages.is_empty(), "unexpected messages: {messages:?}");
        module
    }

    #[test]
    fn node_with_children_and_attributes() {
        let module = parse_ok(
            r#"
            root node Program {
                info = "the root",
                children {
                    child Decls decls { construct, mandatory { Parse to Check, !Codegen } },
                    child Expr result
                },
                attributes {
                    construct string name,
                    int count = -3,
                    Op op = add,
                    Program parent
                }
            };
            "#,
        );

        let node = match &module.items[..] {
            [Item::Node(node)] => node,
            items => panic!("unexpected items: {items:?}"),
        };
        assert!(node.root.is_some());
        assert_eq!(node.info.as_deref(), Some("the root"));
        assert_eq!(node.children.len(), 2);
        assert!(node.children[0].construct);

        let phases = node.children[0].mandatory.as_ref().unwrap();
        assert_eq!(phases.len(), 2);
        assert!(matches!(phases[0].phases, PhaseSpan::Range(_, _)));
        assert!(phases[1].negated);
        assert!(node.children[1].mandatory.is_none());

        assert_eq!(node.attributes.len(), 4);
        assert!(matches!(
            node.attributes[0].r#type,
            AttrTypeName::Prim(_, PrimType::String)
        ));
        assert!(matches!(node.attributes[1].default, Some(Literal::Int(_, -3))));
        assert!(matches!(node.attributes[2].r#type, AttrTypeName::LinkOrEnum(_)));
    }

    #[test]
    fn negated_phase_range() {
        let module = parse_ok("node A { children { child B b { mandatory { !(X to Y) } } } };");
        let Item::Node(node) = &module.items[0] else { panic!() };
        let phases = node.children[0].mandatory.as_ref().unwrap();
        assert!(phases[0].negated);
        assert!(matches!(
            &phases[0].phases,
            PhaseSpan::Range(x, y) if x.name == "X" && y.name == "Y"
        ));
    }

    #[test]
    fn mandatory_without_phases() {
        let module = parse_ok("node A { children { child B b { mandatory, construct, } } };");
        let Item::Node(node) = &module.items[0] else { panic!() };
        assert!(node.children[0].construct);
        assert!(matches!(node.children[0].mandatory.as_deref(), Some([])));
    }

    #[test]
    fn other_items() {
        let module = parse_ok(
            r#"
            enum Op { prefix = OP, values { add, sub } };
            nodeset Expr { Num, Binop };
            traversal Print;
            traversal Rename { nodes { Expr, Var } };
            pass Scan { func = do_scan, info = "scanning" };
            pass Noop;
            root cycle phase Main { info = "main", subphases { Front } };
            phase Front { passes { Scan, Print } };
            "#,
        );

        assert_eq!(module.items.len(), 8);
        let Item::Enum(r#enum) = &module.items[0] else { panic!() };
        assert_eq!(r#enum.prefix.name, "OP");
        let Item::Traversal(print) = &module.items[2] else { panic!() };
        assert!(print.nodes.is_none());
        let Item::Pass(scan) = &module.items[4] else { panic!() };
        assert_eq!(scan.func.as_ref().map(Ident::as_str), Some("do_scan"));
        let Item::Phase(main) = &module.items[6] else { panic!() };
        assert!(main.root.is_some() && main.cycle);
        assert!(matches!(main.body, PhaseBody::Subphases(_)));
    }

    #[test]
    fn field_keywords_are_names_elsewhere() {
        let module = parse_ok(
            "node info { attributes { values nodes = prefix } };\n\
             pass func { func = passes };",
        );

        let Item::Node(node) = &module.items[0] else { panic!() };
        assert_eq!(node.name.name, "info");
        let attr = &node.attributes[0];
        assert!(matches!(&attr.r#type, AttrTypeName::LinkOrEnum(name) if name.name == "values"));
        assert_eq!(attr.name.name, "nodes");
        assert!(matches!(&attr.default, Some(Literal::Name(name)) if name.name == "prefix"));
        let Item::Pass(pass) = &module.items[1] else { panic!() };
        assert_eq!(pass.func.as_ref().map(Ident::as_str), Some("passes"));
    }

    #[test]
    fn recovers_after_errors() {
        let (module, messages) =
            parse("node A { children { child } };\nnode B;\nnode C { bogus };");

        assert_eq!(module.items.len(), 1);
        assert_eq!(module.items[0].name().name, "B");
        assert_eq!(messages.len(), 2);
        assert!(matches!(messages[0], Message::UnexpectedToken { found: "}", .. }));
        assert!(matches!(messages[1], Message::UnexpectedToken { found: "name", .. }));
    }

    #[test]
    fn unexpected_end_of_file() {
        let (module, messages) = parse("node A;\nnode B {");
        assert!(matches!(messages[..], [Message::UnexpectedEndOfFile { .. }]));
        assert_eq!(module.items.len(), 1);
    }

    #[test]
    fn lexer_errors_are_reported_alongside_items() {
        let (module, messages) = parse("node $ A;");
        assert_eq!(module.items.len(), 1);
        assert!(matches!(messages[..], [Message::Lexer(_)]));
    }

    #[test]
    fn expected_tokens_are_listed() {
        let (_, messages) = parse("enum E { prefix E };");
        let Message::UnexpectedToken { expected, .. } = &messages[0] else { panic!() };
        assert_eq!(expected, &["\"=\""]);
    }

    #[test]
    fn invalid_literals_drop_the_default() {
        let (module, messages) = parse("node A { attributes { int x = 99999999999999999999 } };");
        assert!(matches!(messages[..], [Message::InvalidLiteral { .. }]));
        let Item::Node(node) = &module.items[0] else { panic!() };
        assert!(node.attributes[0].default.is_none());
    }

    #[test]
    fn phase_needs_one_body() {
        let (module, messages) =
            parse("phase P { info = \"x\" };\nphase Q { passes { a }, subphases { P } };");
        assert!(module.items.is_empty());
        assert!(matches!(
            messages[..],
            [Message::MissingField { .. }, Message::ConflictingPhaseBody { .. }]
        ));
    }

    #[test]
    fn enum_needs_prefix_and_values() {
        let (module, messages) = parse("enum E { info = \"e\" };");
        assert!(module.items.is_empty());
        assert!(matches!(
            messages[..],
            [
                Message::MissingField { field: "prefix", .. },
                Message::MissingField { field: "values", .. },
            ]
        ));
    }

    #[test]
    fn duplicate_fields() {
        let (module, messages) = parse("traversal T { nodes { A }, nodes { B } };");
        assert_eq!(module.items.len(), 1);
        assert!(matches!(messages[..], [Message::DuplicateField { field: "nodes", .. }]));
    }

    #[test]
    fn misplaced_modifiers() {
        let (module, messages) = parse("root enum E { prefix = E, values { a } };\ncycle node N;");
        assert_eq!(module.items.len(), 2);
        assert!(matches!(
            messages[..],
            [
                Message::UnexpectedModifier { modifier: "root", item: "enum", .. },
                Message::UnexpectedModifier { modifier: "cycle", item: "node", .. },
            ]
        ));
    }

    #[test]
    fn prim_type_names_round_trip() {
        for prim in PrimType::ALL {
            assert_eq!(PrimType::from_name(prim.name()), Some(prim));
        }
        assert_eq!(PrimType::from_name("Expr"), None);
    }
}
