//! Pretty printing of resolved configurations, in the surface syntax.

use pretty::{Arena, DocAllocator, DocBuilder};

use crate::model::{
    Action, Attr, AttrType, AttrValue, Child, Config, Enum, Node, Nodeset, Pass, Phase, PhaseBody,
    Traversal,
};

const INDENT: isize = 4;

type Doc<'arena> = DocBuilder<'arena, Arena<'arena>>;

pub struct Context<'arena> {
    arena: &'arena Arena<'arena>,
    config: &'arena Config,
}

impl<'arena> Context<'arena> {
    pub fn new(arena: &'arena Arena<'arena>, config: &'arena Config) -> Context<'arena> {
        Context { arena, config }
    }

    pub fn config(&self) -> Doc<'arena> {
        let config = self.config;
        let items = Iterator::chain(
            config.enums.iter().map(|r#enum| self.r#enum(r#enum)),
            config.nodes.iter().map(|node| self.node(node)),
        )
        .chain(config.nodesets.iter().map(|nodeset| self.nodeset(nodeset)))
        .chain(config.traversals.iter().map(|traversal| self.traversal(traversal)))
        .chain(config.passes.iter().map(|pass| self.pass(pass)))
        .chain(config.phases.iter().map(|phase| self.phase(phase)));

        self.arena.intersperse(items, self.arena.hardline())
    }

    fn r#enum(&self, r#enum: &Enum) -> Doc<'arena> {
        let mut fields = vec![
            self.field("prefix", self.arena.text(r#enum.prefix.clone())),
            self.block(
                self.arena.text("values"),
                self.names(r#enum.values.iter().map(String::as_str)),
            ),
        ];
        fields.extend(self.info(&r#enum.info));

        self.item(self.header("enum", &r#enum.name), fields)
    }

    fn node(&self, node: &Node) -> Doc<'arena> {
        let mut fields = Vec::new();
        fields.extend(self.info(&node.info));
        if !node.children.is_empty() {
            fields.push(self.block(
                self.arena.text("children"),
                node.children.iter().map(|child| self.child(child)).collect(),
            ));
        }
        if !node.attrs.is_empty() {
            fields.push(self.block(
                self.arena.text("attributes"),
                node.attrs.iter().map(|attr| self.attr(attr)).collect(),
            ));
        }

        let header = self.root(node.is_root, self.header("node", &node.name));
        self.item(header, fields)
    }

    fn child(&self, child: &Child) -> Doc<'arena> {
        let arena = self.arena;
        let mut props = Vec::new();
        if child.construct {
            props.push(arena.text("construct"));
        }
        if child.mandatory {
            let mandatory = arena.text("mandatory");
            props.push(match child.mandatory_phases.is_empty() {
                true => mandatory,
                false => self.block(
                    mandatory,
                    child
                        .mandatory_phases
                        .iter()
                        .map(|phase| {
                            let first = &self.config[phase.first].name;
                            let last = &self.config[phase.last].name;
                            let span = match phase.first == phase.last {
                                true => arena.text(first.clone()),
                                false => arena.text(format!("{first} to {last}")),
                            };
                            match (phase.negated, phase.first == phase.last) {
                                (false, _) => span,
                                (true, true) => arena.text("!").append(span),
                                (true, false) => arena.text("!(").append(span).append(")"),
                            }
                        })
                        .collect(),
                ),
            });
        }

        let decl = arena
            .text("child ")
            .append(self.config.type_name(child.r#type).to_owned())
            .append(" ")
            .append(child.name.clone());
        match props.is_empty() {
            true => decl,
            false => self.block(decl, props),
        }
    }

    fn attr(&self, attr: &Attr) -> Doc<'arena> {
        let arena = self.arena;
        let r#type = match attr.r#type {
            AttrType::Prim(prim) => prim.name().to_owned(),
            AttrType::Link(node) => self.config[node].name.clone(),
            AttrType::Enum(r#enum) => self.config[r#enum].name.clone(),
        };

        let mut doc = arena.nil();
        if attr.construct {
            doc = doc.append("construct ");
        }
        doc = doc.append(r#type).append(" ").append(attr.name.clone());

        match &attr.default {
            None => doc,
            Some(value) => {
                let value = match (value, attr.r#type) {
                    (AttrValue::Enum(index), AttrType::Enum(r#enum)) => {
                        self.config[r#enum].values[*index].clone()
                    }
                    (value, _) => format_value(value),
                };
                doc.append(" = ").append(value)
            }
        }
    }

    fn nodeset(&self, nodeset: &Nodeset) -> Doc<'arena> {
        let header = self.root(nodeset.is_root, self.header("nodeset", &nodeset.name));
        let members = nodeset
            .nodes
            .iter()
            .map(|node| self.config[*node].name.as_str());

        self.block(header, self.names(members)).append(";")
    }

    fn traversal(&self, traversal: &Traversal) -> Doc<'arena> {
        let mut fields = Vec::new();
        fields.extend(self.info(&traversal.info));
        if let Some(nodes) = &traversal.nodes {
            let names = nodes.iter().map(|node| self.config[*node].name.as_str());
            fields.push(self.block(self.arena.text("nodes"), self.names(names)));
        }

        self.item(self.header("traversal", &traversal.name), fields)
    }

    fn pass(&self, pass: &Pass) -> Doc<'arena> {
        let mut fields = Vec::new();
        fields.extend(self.info(&pass.info));
        if let Some(func) = &pass.func {
            fields.push(self.field("func", self.arena.text(func.clone())));
        }

        self.item(self.header("pass", &pass.name), fields)
    }

    fn phase(&self, phase: &Phase) -> Doc<'arena> {
        let mut fields = Vec::new();
        fields.extend(self.info(&phase.info));
        fields.push(match &phase.body {
            PhaseBody::Subphases(subphases) => self.block(
                self.arena.text("subphases"),
                self.names(subphases.iter().map(|id| self.config[*id].name.as_str())),
            ),
            PhaseBody::Actions(actions) => self.block(
                self.arena.text("passes"),
                self.names(actions.iter().map(|action| match action {
                    Action::Pass(id) => self.config[*id].name.as_str(),
                    Action::Traversal(id) => self.config[*id].name.as_str(),
                })),
            ),
        });

        let mut header = self.header("phase", &phase.name);
        if phase.cycle {
            header = self.arena.text("cycle ").append(header);
        }
        self.item(self.root(phase.is_root, header), fields)
    }

    fn header(&self, keyword: &'static str, name: &str) -> Doc<'arena> {
        self.arena.text(keyword).append(" ").append(name.to_owned())
    }

    fn root(&self, is_root: bool, header: Doc<'arena>) -> Doc<'arena> {
        match is_root {
            true => self.arena.text("root ").append(header),
            false => header,
        }
    }

    fn info(&self, info: &Option<String>) -> Option<Doc<'arena>> {
        let info = info.as_ref()?;
        Some(self.field("info", self.arena.text(quote(info))))
    }

    fn field(&self, name: &'static str, value: Doc<'arena>) -> Doc<'arena> {
        self.arena.text(name).append(" = ").append(value)
    }

    fn names<'a>(&self, names: impl Iterator<Item = &'a str>) -> Vec<Doc<'arena>> {
        names.map(|name| self.arena.text(name.to_owned())).collect()
    }

    /// An item terminated by a semicolon, with an optional block of fields.
    fn item(&self, header: Doc<'arena>, fields: Vec<Doc<'arena>>) -> Doc<'arena> {
        match fields.is_empty() {
            true => header.append(";"),
            false => self.block(header, fields).append(";"),
        }
    }

    fn block(&self, header: Doc<'arena>, docs: Vec<Doc<'arena>>) -> Doc<'arena> {
        let arena = self.arena;
        header.append(" ").append(self.sequence(
            arena.text("{"),
            docs,
            arena.text(","),
            arena.text("}"),
        ))
    }

    fn sequence(
        &self,
        start_delim: Doc<'arena>,
        docs: Vec<Doc<'arena>>,
        separator: Doc<'arena>,
        end_delim: Doc<'arena>,
    ) -> Doc<'arena> {
        let arena = self.arena;
        if docs.is_empty() {
            return start_delim.append(end_delim);
        }

        let len = docs.len();
        DocBuilder::flat_alt(
            arena.concat([
                start_delim.clone(),
                arena
                    .concat(docs.iter().cloned().enumerate().map(|(index, doc)| {
                        let separator = match index + 1 == len {
                            true => arena.nil(),
                            false => separator.clone(),
                        };
                        arena.concat([arena.hardline(), doc, separator])
                    }))
                    .nest(INDENT),
                arena.hardline(),
                end_delim.clone(),
            ]),
            arena.concat([
                start_delim,
                arena.space(),
                arena.intersperse(docs, separator.append(arena.space())),
                arena.space(),
                end_delim,
            ]),
        )
        .group()
    }
}

/// Render a default value the way it would be written in a literal.
fn format_value(value: &AttrValue) -> String {
    match value {
        AttrValue::Int(value) => value.to_string(),
        AttrValue::UInt(value) => value.to_string(),
        AttrValue::Float(value) => format!("{value:?}"),
        AttrValue::Bool(value) => value.to_string(),
        AttrValue::String(value) => quote(value),
        // Printed by the caller, which knows the enum
        AttrValue::Enum(index) => index.to_string(),
    }
}

/// Quote a string, escaping it so that it lexes back to the same contents.
pub(crate) fn quote(string: &str) -> String {
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::check::tests::check_ok;

    fn render(source: &str, width: usize) -> String {
        let config = check_ok(source);
        let arena = Arena::new();
        let context = Context::new(&arena, &config);
        let doc = context.config().into_doc();
        format!("{}", doc.pretty(width))
    }

    #[test]
    fn flat_items() {
        let output = render(
            r#"
            enum Op { prefix = OP, values { add, sub } };
            root node Binop { children { child Num left { construct } }, attributes { Op op = sub } };
            node Num { attributes { int value = -1 } };
            pass Fold { func = fold };
            root phase Main { passes { Fold } };
            "#,
            200,
        );

        assert_eq!(
            output,
            "enum Op { prefix = OP, values { add, sub } };\n\
             root node Binop { children { child Num left { construct } }, attributes { Op op = sub } };\n\
             node Num { attributes { int value = -1 } };\n\
             pass Fold { func = fold };\n\
             root phase Main { passes { Fold } };",
        );
    }

    #[test]
    fn breaks_long_items() {
        let output = render(
            r#"
            root node Program { info = "the whole program", attributes { string name, bool main } };
            pass Noop;
            root phase Main { passes { Noop } };
            "#,
            50,
        );

        assert!(output.starts_with(
            "root node Program {\n    info = \"the whole program\",\n    attributes { string name, bool main }\n};\n"
        ));
        assert!(output.ends_with("pass Noop;\nroot phase Main { passes { Noop } };"));
    }

    #[test]
    fn quote_escapes() {
        assert_eq!(quote("a\"b\\c\n"), r#""a\"b\\c\n""#);
    }
}
