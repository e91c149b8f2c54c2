//! Constructors, deep copy and free functions.

use std::io::{self, Write};

use itertools::Itertools;

use crate::codegen::Context;
use crate::model::{AttrType, AttrValue, Node, NodeType, Nodeset, PrimType};

impl Context<'_> {
    /// `create-<N>.h`
    pub fn emit_create_header(&self, writer: &mut impl Write, r#type: NodeType) -> io::Result<()> {
        writeln!(writer, "#pragma once")?;
        writeln!(writer, "#include \"generated/ast.h\"")?;
        writeln!(writer)?;
        match r#type {
            NodeType::Node(id) => self.emit_create_node(writer, &self.config[id], true),
            NodeType::Nodeset(id) => self.emit_create_nodeset(writer, &self.config[id], true),
        }
    }

    /// `create-<N>.c`
    pub fn emit_create_source(&self, writer: &mut impl Write, r#type: NodeType) -> io::Result<()> {
        let name = self.type_name(r#type);
        writeln!(writer, "#include <string.h>")?;
        writeln!(writer, "#include \"lib/memory.h\"")?;
        writeln!(writer, "#include \"generated/create-{name}.h\"")?;
        writeln!(writer)?;
        match r#type {
            NodeType::Node(id) => self.emit_create_node(writer, &self.config[id], false),
            NodeType::Nodeset(id) => self.emit_create_nodeset(writer, &self.config[id], false),
        }
    }

    fn emit_create_node(
        &self,
        writer: &mut impl Write,
        node: &Node,
        header: bool,
    ) -> io::Result<()> {
        let params = Iterator::chain(
            (node.children.iter())
                .filter(|child| child.construct)
                .map(|child| format!("struct {} *{}", self.type_name(child.r#type), child.name)),
            (node.attrs.iter())
                .filter(|attr| attr.construct)
                .map(|attr| self.c_field(attr.r#type, &attr.name)),
        )
        .collect::<Vec<_>>();

        write!(writer, "struct {name} *create_{name}(", name = node.name)?;
        match params.is_empty() {
            true => write!(writer, "void")?,
            false => write!(writer, "{}", params.iter().format(", "))?,
        }
        if header {
            return writeln!(writer, ");");
        }

        writeln!(writer, ") {{")?;
        writeln!(
            writer,
            "    struct {name} *res = mem_alloc(sizeof(struct {name}));",
            name = node.name
        )?;
        writeln!(writer, "    memset(res, 0, sizeof(struct {}));", node.name)?;
        for child in node.children.iter().filter(|child| child.construct) {
            writeln!(writer, "    res->{name} = {name};", name = child.name)?;
        }
        for attr in &node.attrs {
            match (&attr.default, attr.construct) {
                (_, true) => writeln!(writer, "    res->{name} = {name};", name = attr.name)?,
                (Some(value), false) => writeln!(
                    writer,
                    "    res->{} = {};",
                    attr.name,
                    self.c_value(attr.r#type, value),
                )?,
                (None, false) => {}
            }
        }
        writeln!(writer, "    return res;")?;
        writeln!(writer, "}}")
    }

    fn emit_create_nodeset(
        &self,
        writer: &mut impl Write,
        nodeset: &Nodeset,
        header: bool,
    ) -> io::Result<()> {
        for (index, node) in nodeset.nodes.iter().enumerate() {
            let node = &self.config[*node].name;
            if index > 0 && !header {
                writeln!(writer)?;
            }
            write!(
                writer,
                "struct {set} *create_{set}_{node}(struct {node} *_{node})",
                set = nodeset.name,
            )?;
            if header {
                writeln!(writer, ";")?;
                continue;
            }
            writeln!(writer, " {{")?;
            writeln!(
                writer,
                "    struct {set} *res = mem_alloc(sizeof(struct {set}));",
                set = nodeset.name
            )?;
            writeln!(writer, "    res->type = NS_{}_{node};", nodeset.name)?;
            writeln!(writer, "    res->value.val_{node} = _{node};")?;
            writeln!(writer, "    return res;")?;
            writeln!(writer, "}}")?;
        }
        Ok(())
    }

    /// A default value as a C expression.
    fn c_value(&self, r#type: AttrType, value: &AttrValue) -> String {
        match (r#type, value) {
            (AttrType::Enum(id), AttrValue::Enum(index)) => {
                let r#enum = &self.config[id];
                format!("{}_{}", r#enum.prefix, r#enum.values[*index])
            }
            (_, AttrValue::Int(value)) => value.to_string(),
            (AttrType::Prim(PrimType::Int64 | PrimType::UInt64), AttrValue::UInt(value)) => {
                format!("{value}ull")
            }
            (_, AttrValue::UInt(value)) => format!("{value}u"),
            (AttrType::Prim(prim), AttrValue::Float(value)) => c_float(prim, *value),
            (_, AttrValue::Bool(value)) => value.to_string(),
            (_, AttrValue::String(value)) => format!("mem_strdup({})", c_string(value)),
            (attr_type, value) => {
                panic!("default value {value:?} does not fit attribute type {attr_type:?}")
            }
        }
    }

    /// `create-ast.h`
    pub fn emit_create_all_header(&self, writer: &mut impl Write) -> io::Result<()> {
        self.emit_all_header(writer, "create")
    }

    /// `copy-ast.h`
    pub fn emit_copy_all_header(&self, writer: &mut impl Write) -> io::Result<()> {
        self.emit_all_header(writer, "copy")
    }

    /// `free-ast.h`
    pub fn emit_free_all_header(&self, writer: &mut impl Write) -> io::Result<()> {
        self.emit_all_header(writer, "free")
    }

    fn emit_all_header(&self, writer: &mut impl Write, prefix: &str) -> io::Result<()> {
        writeln!(writer, "#pragma once")?;
        let names = self.config.node_types().map(|r#type| self.type_name(r#type));
        self.emit_includes(writer, prefix, names)
    }

    /// `copy-<N>.h`
    pub fn emit_copy_header(&self, writer: &mut impl Write, r#type: NodeType) -> io::Result<()> {
        let name = self.type_name(r#type);
        writeln!(writer, "#pragma once")?;
        writeln!(writer, "#include \"generated/ast.h\"")?;
        writeln!(writer, "#include \"lib/imap.h\"")?;
        writeln!(writer)?;
        writeln!(writer, "struct {name} *copy_{name}(struct {name} *node);")?;
        writeln!(writer, "struct {name} *_copy_{name}(struct {name} *node, imap_t *imap);")?;
        writeln!(writer, "void _relink_{name}(struct {name} *node, imap_t *imap);")
    }

    /// `copy-<N>.c`: a clone walk recording every copied node, then a
    /// relinking walk redirecting links into the copy to their clones.
    pub fn emit_copy_source(&self, writer: &mut impl Write, r#type: NodeType) -> io::Result<()> {
        let name = self.type_name(r#type);
        writeln!(writer, "#include <string.h>")?;
        writeln!(writer, "#include \"lib/memory.h\"")?;
        writeln!(writer, "#include \"generated/copy-{name}.h\"")?;
        self.emit_includes(writer, "copy", self.child_type_names(r#type))?;
        writeln!(writer)?;

        writeln!(writer, "struct {name} *copy_{name}(struct {name} *node) {{")?;
        writeln!(writer, "    if (node == NULL) return NULL;")?;
        writeln!(writer)?;
        writeln!(writer, "    imap_t *imap = imap_init(64);")?;
        writeln!(writer, "    struct {name} *res = _copy_{name}(node, imap);")?;
        writeln!(writer, "    _relink_{name}(res, imap);")?;
        writeln!(writer, "    imap_free(imap);")?;
        writeln!(writer, "    return res;")?;
        writeln!(writer, "}}")?;
        writeln!(writer)?;

        match r#type {
            NodeType::Node(id) => self.emit_copy_node(writer, &self.config[id]),
            NodeType::Nodeset(id) => self.emit_copy_nodeset(writer, &self.config[id]),
        }
    }

    fn emit_copy_node(&self, writer: &mut impl Write, node: &Node) -> io::Result<()> {
        let name = &node.name;
        writeln!(writer, "struct {name} *_copy_{name}(struct {name} *node, imap_t *imap) {{")?;
        writeln!(writer, "    if (node == NULL) return NULL;")?;
        writeln!(writer)?;
        writeln!(writer, "    struct {name} *res = mem_alloc(sizeof(struct {name}));")?;
        writeln!(writer, "    imap_insert(imap, node, res);")?;
        for child in &node.children {
            writeln!(
                writer,
                "    res->{child} = _copy_{child_type}(node->{child}, imap);",
                child = child.name,
                child_type = self.type_name(child.r#type),
            )?;
        }
        for attr in &node.attrs {
            match attr.r#type {
                AttrType::Prim(PrimType::String) => writeln!(
                    writer,
                    "    res->{attr} = node->{attr} == NULL ? NULL : mem_strdup(node->{attr});",
                    attr = attr.name,
                )?,
                // Relinked once the whole subtree has been copied
                _ => writeln!(writer, "    res->{attr} = node->{attr};", attr = attr.name)?,
            }
        }
        writeln!(writer, "    return res;")?;
        writeln!(writer, "}}")?;
        writeln!(writer)?;

        writeln!(writer, "void _relink_{name}(struct {name} *node, imap_t *imap) {{")?;
        writeln!(writer, "    if (node == NULL) return;")?;
        for attr in &node.attrs {
            if let AttrType::Link(_) = attr.r#type {
                writeln!(writer)?;
                writeln!(writer, "    if (node->{} != NULL) {{", attr.name)?;
                writeln!(
                    writer,
                    "        void *clone = imap_retrieve(imap, node->{});",
                    attr.name
                )?;
                writeln!(writer, "        if (clone != NULL) node->{} = clone;", attr.name)?;
                writeln!(writer, "    }}")?;
            }
        }
        for child in &node.children {
            writeln!(
                writer,
                "    _relink_{}(node->{}, imap);",
                self.type_name(child.r#type),
                child.name,
            )?;
        }
        writeln!(writer, "}}")
    }

    fn emit_copy_nodeset(&self, writer: &mut impl Write, nodeset: &Nodeset) -> io::Result<()> {
        let set = &nodeset.name;
        writeln!(writer, "struct {set} *_copy_{set}(struct {set} *nodeset, imap_t *imap) {{")?;
        writeln!(writer, "    if (nodeset == NULL) return NULL;")?;
        writeln!(writer)?;
        writeln!(writer, "    struct {set} *res = mem_alloc(sizeof(struct {set}));")?;
        writeln!(writer, "    imap_insert(imap, nodeset, res);")?;
        writeln!(writer, "    res->type = nodeset->type;")?;
        self.emit_nodeset_switch(writer, nodeset, "nodeset", |writer, node| {
            writeln!(
                writer,
                "        res->value.val_{node} = _copy_{node}(nodeset->value.val_{node}, imap);",
            )
        })?;
        writeln!(writer, "    return res;")?;
        writeln!(writer, "}}")?;
        writeln!(writer)?;

        writeln!(writer, "void _relink_{set}(struct {set} *nodeset, imap_t *imap) {{")?;
        writeln!(writer, "    if (nodeset == NULL) return;")?;
        writeln!(writer)?;
        self.emit_nodeset_switch(writer, nodeset, "nodeset", |writer, node| {
            writeln!(writer, "        _relink_{node}(nodeset->value.val_{node}, imap);")
        })?;
        writeln!(writer, "}}")
    }

    /// `free-<N>.h`
    pub fn emit_free_header(&self, writer: &mut impl Write, r#type: NodeType) -> io::Result<()> {
        let name = self.type_name(r#type);
        writeln!(writer, "#pragma once")?;
        writeln!(writer, "#include \"generated/ast.h\"")?;
        writeln!(writer)?;
        writeln!(writer, "void free_{name}_tree(struct {name} *node);")?;
        writeln!(writer, "void free_{name}_node(struct {name} *node);")
    }

    /// `free-<N>.c`
    pub fn emit_free_source(&self, writer: &mut impl Write, r#type: NodeType) -> io::Result<()> {
        let name = self.type_name(r#type);
        writeln!(writer, "#include \"lib/memory.h\"")?;
        writeln!(writer, "#include \"generated/free-{name}.h\"")?;
        self.emit_includes(writer, "free", self.child_type_names(r#type))?;
        writeln!(writer)?;

        match r#type {
            NodeType::Node(id) => {
                let node = &self.config[id];
                let free_strings = |writer: &mut dyn Write| {
                    for attr in &node.attrs {
                        if attr.r#type == AttrType::Prim(PrimType::String) {
                            writeln!(writer, "    mem_free(node->{});", attr.name)?;
                        }
                    }
                    Ok::<_, io::Error>(())
                };

                writeln!(writer, "void free_{name}_tree(struct {name} *node) {{")?;
                writeln!(writer, "    if (node == NULL) return;")?;
                writeln!(writer)?;
                for child in &node.children {
                    writeln!(
                        writer,
                        "    free_{}_tree(node->{});",
                        self.type_name(child.r#type),
                        child.name,
                    )?;
                }
                free_strings(writer)?;
                writeln!(writer, "    mem_free(node);")?;
                writeln!(writer, "}}")?;
                writeln!(writer)?;

                writeln!(writer, "void free_{name}_node(struct {name} *node) {{")?;
                writeln!(writer, "    if (node == NULL) return;")?;
                writeln!(writer)?;
                free_strings(writer)?;
                writeln!(writer, "    mem_free(node);")?;
                writeln!(writer, "}}")
            }
            NodeType::Nodeset(id) => {
                let nodeset = &self.config[id];
                for (index, variant) in ["tree", "node"].into_iter().enumerate() {
                    if index > 0 {
                        writeln!(writer)?;
                    }
                    writeln!(writer, "void free_{name}_{variant}(struct {name} *node) {{")?;
                    writeln!(writer, "    if (node == NULL) return;")?;
                    writeln!(writer)?;
                    self.emit_nodeset_switch(writer, nodeset, "node", |writer, member| {
                        writeln!(
                            writer,
                            "        free_{member}_{variant}(node->value.val_{member});"
                        )
                    })?;
                    writeln!(writer, "    mem_free(node);")?;
                    writeln!(writer, "}}")?;
                }
                Ok(())
            }
        }
    }

    /// The names of the types of the direct children of a node type.
    pub(super) fn child_type_names(&self, r#type: NodeType) -> Vec<&str> {
        let config = self.config;
        match r#type {
            NodeType::Node(id) => (config[id].children.iter())
                .map(|child| self.type_name(child.r#type))
                .collect(),
            NodeType::Nodeset(id) => (config[id].nodes.iter())
                .map(|node| config[*node].name.as_str())
                .collect(),
        }
    }

    /// Emit a `switch` over the active member of a nodeset, with one case
    /// body per member.
    pub(super) fn emit_nodeset_switch<W: Write>(
        &self,
        writer: &mut W,
        nodeset: &Nodeset,
        value: &str,
        mut case: impl FnMut(&mut W, &str) -> io::Result<()>,
    ) -> io::Result<()> {
        writeln!(writer, "    switch ({value}->type) {{")?;
        for node in &nodeset.nodes {
            let node = &self.config[*node].name;
            writeln!(writer, "    case NS_{}_{node}:", nodeset.name)?;
            case(writer, node)?;
            writeln!(writer, "        break;")?;
        }
        writeln!(writer, "    }}")
    }
}

/// A floating point literal of the given C type.
fn c_float(prim: PrimType, value: f64) -> String {
    let literal = match value {
        value if value.is_nan() => "NAN".to_owned(),
        value if value.is_infinite() && value > 0.0 => "INFINITY".to_owned(),
        value if value.is_infinite() => "-INFINITY".to_owned(),
        value => format!("{value:?}"),
    };
    match prim {
        PrimType::Float if value.is_finite() => format!("{literal}f"),
        _ => literal,
    }
}

/// A C string literal.
fn c_string(string: &str) -> String {
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
    use crate::codegen::tests::{render, CALC};
    use crate::model::{NodeId, NodesetId};

    #[test]
    fn constructors_take_construct_fields() {
        let output = render(CALC, |context, writer| {
            let assign = context.config().node_by_name("Assign").unwrap();
            context.emit_create_source(writer, NodeType::Node(assign))
        });

        assert!(output.contains(
            "struct Assign *create_Assign(struct Expr *value, char *target) {\n"
        ));
        assert!(output.contains("    res->value = value;\n    res->target = target;\n"));
        assert!(!output.contains("res->next"));
    }

    #[test]
    fn constructors_without_params() {
        let output = render(CALC, |context, writer| {
            context.emit_create_header(writer, NodeType::Node(NodeId(0)))
        });
        assert!(output.ends_with("struct Program *create_Program(void);\n"));
    }

    #[test]
    fn defaults_fill_other_attributes() {
        let output = render(
            r#"
            enum Mode { prefix = MD, values { fast, slow } };
            root node Opts {
                attributes {
                    Mode mode = slow, float ratio = 2, uint64 big = 18446744073709551615,
                    string label = "a\"b", construct int level = 3
                }
            };
            pass Noop;
            root phase Main { passes { Noop } };
            "#,
            |context, writer| context.emit_create_source(writer, NodeType::Node(NodeId(0))),
        );

        assert!(output.contains("    res->mode = MD_slow;\n"));
        assert!(output.contains("    res->ratio = 2.0f;\n"));
        assert!(output.contains("    res->big = 18446744073709551615ull;\n"));
        assert!(output.contains("    res->label = mem_strdup(\"a\\\"b\");\n"));
        assert!(output.contains("    res->level = level;\n"));
    }

    #[test]
    fn nodeset_wrappers() {
        let output = render(CALC, |context, writer| {
            context.emit_create_header(writer, NodeType::Nodeset(NodesetId(1)))
        });
        assert!(output.contains("struct Expr *create_Expr_Num(struct Num *_Num);\n"));
        assert!(output.contains("struct Expr *create_Expr_BinOp(struct BinOp *_BinOp);\n"));
    }

    #[test]
    fn copies_relink_links() {
        let output = render(CALC, |context, writer| {
            let assign = context.config().node_by_name("Assign").unwrap();
            context.emit_copy_source(writer, NodeType::Node(assign))
        });

        assert!(output.contains(
            "#include \"generated/copy-Expr.h\"\n#include \"generated/copy-Stmts.h\"\n"
        ));
        assert!(output.contains(
            "    res->target = node->target == NULL ? NULL : mem_strdup(node->target);\n"
        ));
        assert!(output.contains("    res->binding = node->binding;\n"));
        assert!(output.contains("        void *clone = imap_retrieve(imap, node->binding);\n"));
        assert!(output.contains(
            "    _relink_Expr(node->value, imap);\n    _relink_Stmts(node->next, imap);\n"
        ));
    }

    #[test]
    fn free_variants() {
        let output = render(CALC, |context, writer| {
            let assign = context.config().node_by_name("Assign").unwrap();
            context.emit_free_source(writer, NodeType::Node(assign))
        });

        assert!(output.contains(
            "void free_Assign_tree(struct Assign *node) {\n    if (node == NULL) return;\n\n    free_Expr_tree(node->value);\n    free_Stmts_tree(node->next);\n    mem_free(node->target);\n    mem_free(node);\n}\n"
        ));
        assert!(output.contains(
            "void free_Assign_node(struct Assign *node) {\n    if (node == NULL) return;\n\n    mem_free(node->target);\n    mem_free(node);\n}\n"
        ));
    }

    #[test]
    fn free_nodesets() {
        let output = render(CALC, |context, writer| {
            context.emit_free_source(writer, NodeType::Nodeset(NodesetId(0)))
        });
        assert!(output.contains(
            "    case NS_Stmts_Assign:\n        free_Assign_tree(node->value.val_Assign);\n        break;\n"
        ));
        assert!(output.contains(
            "    case NS_Stmts_Print:\n        free_Print_node(node->value.val_Print);\n        break;\n"
        ));
    }

    #[test]
    fn float_literals() {
        assert_eq!(c_float(PrimType::Double, 0.5), "0.5");
        assert_eq!(c_float(PrimType::Float, f64::INFINITY), "INFINITY");
        assert_eq!(c_float(PrimType::Float, -1.0), "-1.0f");
    }
}
