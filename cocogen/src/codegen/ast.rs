use std::io::{self, Write};

use itertools::Itertools;

use crate::codegen::Context;
use crate::model::{Enum, Node, NodeType, Nodeset};

impl Context<'_> {
    /// `enum.h`: node type and traversal discriminants, and the user enums.
    pub fn emit_enum_header(&self, writer: &mut impl Write) -> io::Result<()> {
        let config = self.config;
        writeln!(writer, "#pragma once")?;
        writeln!(writer)?;

        writeln!(writer, "typedef enum {{")?;
        for r#type in config.node_types() {
            writeln!(writer, "    NT_{},", self.type_name(r#type))?;
        }
        writeln!(writer, "    NodeType_count")?;
        writeln!(writer, "}} NodeType;")?;
        writeln!(writer)?;

        writeln!(writer, "typedef enum {{")?;
        for traversal in &config.traversals {
            writeln!(writer, "    TRAV_{},", traversal.name)?;
        }
        writeln!(writer, "    TraversalType_count")?;
        writeln!(writer, "}} TraversalType;")?;

        for r#enum in &config.enums {
            writeln!(writer)?;
            self.emit_user_enum(writer, r#enum)?;
        }
        Ok(())
    }

    fn emit_user_enum(&self, writer: &mut impl Write, r#enum: &Enum) -> io::Result<()> {
        if let Some(info) = &r#enum.info {
            writeln!(writer, "// {info}")?;
        }
        writeln!(writer, "typedef enum {{")?;
        for value in &r#enum.values {
            writeln!(writer, "    {}_{},", r#enum.prefix, value)?;
        }
        writeln!(writer, "}} {};", r#enum.name)
    }

    /// `ast.h`: the node structs and nodeset unions.
    pub fn emit_ast_header(&self, writer: &mut impl Write) -> io::Result<()> {
        let config = self.config;
        writeln!(writer, "#pragma once")?;
        writeln!(writer, "#include <stdbool.h>")?;
        writeln!(writer, "#include <stdint.h>")?;
        writeln!(writer, "#include \"generated/enum.h\"")?;
        writeln!(writer)?;

        writeln!(writer, "// Forward declarations")?;
        for r#type in config.node_types() {
            writeln!(writer, "struct {};", self.type_name(r#type))?;
        }

        writeln!(writer)?;
        writeln!(writer, "// Nodes")?;
        for node in &config.nodes {
            self.emit_node_struct(writer, node)?;
            writeln!(writer)?;
        }

        writeln!(writer, "// Nodesets")?;
        for (index, nodeset) in config.nodesets.iter().enumerate() {
            if index > 0 {
                writeln!(writer)?;
            }
            self.emit_nodeset_struct(writer, nodeset)?;
        }
        Ok(())
    }

    fn emit_node_struct(&self, writer: &mut impl Write, node: &Node) -> io::Result<()> {
        if let Some(info) = &node.info {
            writeln!(writer, "// {info}")?;
        }
        writeln!(writer, "typedef struct {} {{", node.name)?;
        for child in &node.children {
            writeln!(writer, "    struct {} *{};", self.type_name(child.r#type), child.name)?;
        }
        for attr in &node.attrs {
            writeln!(writer, "    {};", self.c_field(attr.r#type, &attr.name))?;
        }
        writeln!(writer, "}} {};", node.name)
    }

    fn emit_nodeset_struct(&self, writer: &mut impl Write, nodeset: &Nodeset) -> io::Result<()> {
        let config = self.config;
        writeln!(
            writer,
            "typedef enum {{ {} }} NS_{}_enum;",
            nodeset
                .nodes
                .iter()
                .map(|node| format!("NS_{}_{}", nodeset.name, config[*node].name))
                .format(", "),
            nodeset.name,
        )?;
        writeln!(writer, "typedef struct {} {{", nodeset.name)?;
        writeln!(writer, "    union {{")?;
        for node in &nodeset.nodes {
            let name = &config[*node].name;
            writeln!(writer, "        struct {name} *val_{name};")?;
        }
        writeln!(writer, "    }} value;")?;
        writeln!(writer, "    NS_{}_enum type;", nodeset.name)?;
        writeln!(writer, "}} {};", nodeset.name)
    }

    /// `ast-<N>.h`: everything generated for a single node type.
    pub fn emit_entity_header(&self, writer: &mut impl Write, r#type: NodeType) -> io::Result<()> {
        let name = self.type_name(r#type);
        writeln!(writer, "#pragma once")?;
        writeln!(writer, "#include \"generated/ast.h\"")?;
        for prefix in ["create", "copy", "free"] {
            writeln!(writer, "#include \"generated/{prefix}-{name}.h\"")?;
        }
        Ok(())
    }
}
