//! Traversal dispatch.
//!
//! Every traversal function receives a `TravContext`, holding the stack of
//! active traversals and the replacement slot. A handler replaces the node
//! it was called on by calling `replace_<Node>`, and the parent picks the
//! replacement up after the child visit returns.

use std::io::{self, Write};

use crate::codegen::Context;
use crate::model::{Child, Node, NodeId, NodeType, Nodeset, TraversalId};

impl Context<'_> {
    /// `trav-core.h`
    pub fn emit_trav_core_header(&self, writer: &mut impl Write) -> io::Result<()> {
        writeln!(writer, "#pragma once")?;
        writeln!(writer, "#include <stdbool.h>")?;
        writeln!(writer, "#include \"generated/enum.h\"")?;
        writeln!(writer)?;
        writeln!(writer, "struct TravStack {{")?;
        writeln!(writer, "    struct TravStack *prev;")?;
        writeln!(writer, "    TraversalType current;")?;
        writeln!(writer, "}};")?;
        writeln!(writer)?;
        writeln!(writer, "typedef struct TravContext {{")?;
        writeln!(writer, "    struct TravStack *stack;")?;
        writeln!(writer, "    NodeType replacement_type;")?;
        writeln!(writer, "    void *replacement;")?;
        writeln!(writer, "    // Abort on mismatched replacements instead of skipping them")?;
        writeln!(writer, "    bool strict_replacement;")?;
        writeln!(writer, "}} TravContext;")?;
        writeln!(writer)?;
        writeln!(writer, "TravContext *trav_context_new(void);")?;
        writeln!(writer, "void trav_context_free(TravContext *ctx);")?;
        writeln!(writer, "void trav_push(TravContext *ctx, TraversalType trav);")?;
        writeln!(writer, "void trav_pop(TravContext *ctx);")?;
        writeln!(writer, "TraversalType trav_current(TravContext *ctx);")?;
        writeln!(writer, "const char *trav_node_type_name(NodeType type);")?;
        writeln!(
            writer,
            "void trav_replacement_mismatch(TravContext *ctx, const char *node, const char *child, NodeType found);",
        )
    }

    /// `trav-core.c`
    pub fn emit_trav_core_source(&self, writer: &mut impl Write) -> io::Result<()> {
        let config = self.config;
        writeln!(writer, "#include <stdio.h>")?;
        writeln!(writer, "#include <stdlib.h>")?;
        writeln!(writer, "#include \"lib/memory.h\"")?;
        writeln!(writer, "#include \"generated/trav-core.h\"")?;
        writeln!(writer)?;

        writeln!(writer, "TravContext *trav_context_new(void) {{")?;
        writeln!(writer, "    TravContext *ctx = mem_alloc(sizeof(TravContext));")?;
        writeln!(writer, "    ctx->stack = NULL;")?;
        writeln!(writer, "    ctx->replacement = NULL;")?;
        writeln!(writer, "    ctx->strict_replacement = false;")?;
        writeln!(writer, "    return ctx;")?;
        writeln!(writer, "}}")?;
        writeln!(writer)?;

        writeln!(writer, "void trav_context_free(TravContext *ctx) {{")?;
        writeln!(writer, "    while (ctx->stack != NULL) {{")?;
        writeln!(writer, "        trav_pop(ctx);")?;
        writeln!(writer, "    }}")?;
        writeln!(writer, "    mem_free(ctx);")?;
        writeln!(writer, "}}")?;
        writeln!(writer)?;

        writeln!(writer, "void trav_push(TravContext *ctx, TraversalType trav) {{")?;
        writeln!(writer, "    struct TravStack *top = mem_alloc(sizeof(struct TravStack));")?;
        writeln!(writer, "    top->current = trav;")?;
        writeln!(writer, "    top->prev = ctx->stack;")?;
        writeln!(writer, "    ctx->stack = top;")?;
        writeln!(writer, "}}")?;
        writeln!(writer)?;

        writeln!(writer, "void trav_pop(TravContext *ctx) {{")?;
        writeln!(writer, "    if (ctx->stack == NULL) {{")?;
        writeln!(
            writer,
            "        fprintf(stderr, \"error: cannot pop an empty traversal stack\\n\");"
        )?;
        writeln!(writer, "        abort();")?;
        writeln!(writer, "    }}")?;
        writeln!(writer, "    struct TravStack *prev = ctx->stack->prev;")?;
        writeln!(writer, "    mem_free(ctx->stack);")?;
        writeln!(writer, "    ctx->stack = prev;")?;
        writeln!(writer, "}}")?;
        writeln!(writer)?;

        writeln!(writer, "TraversalType trav_current(TravContext *ctx) {{")?;
        writeln!(writer, "    if (ctx->stack == NULL) return TraversalType_count;")?;
        writeln!(writer, "    return ctx->stack->current;")?;
        writeln!(writer, "}}")?;
        writeln!(writer)?;

        writeln!(writer, "const char *trav_node_type_name(NodeType type) {{")?;
        writeln!(writer, "    switch (type) {{")?;
        for r#type in config.node_types() {
            let name = self.type_name(r#type);
            writeln!(writer, "    case NT_{name}:")?;
            writeln!(writer, "        return \"{name}\";")?;
        }
        writeln!(writer, "    default:")?;
        writeln!(writer, "        return \"<unknown>\";")?;
        writeln!(writer, "    }}")?;
        writeln!(writer, "}}")?;
        writeln!(writer)?;

        writeln!(
            writer,
            "void trav_replacement_mismatch(TravContext *ctx, const char *node, const char *child, NodeType found) {{",
        )?;
        writeln!(
            writer,
            "    fprintf(stderr, \"error: cannot replace child `%s` of `%s` with a node of type `%s`\\n\",",
        )?;
        writeln!(writer, "            child, node, trav_node_type_name(found));")?;
        writeln!(writer, "    if (ctx->strict_replacement) abort();")?;
        writeln!(writer, "}}")
    }

    /// `trav-ast.h`
    pub fn emit_trav_all_header(&self, writer: &mut impl Write) -> io::Result<()> {
        writeln!(writer, "#pragma once")?;
        writeln!(writer, "#include \"generated/trav-core.h\"")?;
        let names = self.config.node_types().map(|r#type| self.type_name(r#type));
        self.emit_includes(writer, "trav", names)
    }

    /// `trav-<N>.h`
    pub fn emit_trav_header(&self, writer: &mut impl Write, r#type: NodeType) -> io::Result<()> {
        let name = self.type_name(r#type);
        writeln!(writer, "#pragma once")?;
        writeln!(writer, "#include \"generated/ast.h\"")?;
        writeln!(writer, "#include \"generated/trav-core.h\"")?;
        writeln!(writer)?;
        writeln!(writer, "struct Info;")?;
        writeln!(writer)?;
        writeln!(
            writer,
            "void trav_{name}(TravContext *ctx, struct {name} *node, struct Info *info);"
        )?;
        writeln!(
            writer,
            "struct {name} *trav_start_{name}(TravContext *ctx, struct {name} *node, TraversalType trav);",
        )?;
        if let NodeType::Node(id) = r#type {
            let node = &self.config[id];
            writeln!(writer, "void replace_{name}(TravContext *ctx, struct {name} *node);")?;
            writeln!(
                writer,
                "void trav_children_{name}(TravContext *ctx, struct {name} *node, struct Info *info);"
            )?;
            for child in &node.children {
                writeln!(
                    writer,
                    "void trav_{name}_{}(TravContext *ctx, struct {name} *node, struct Info *info);",
                    child.name,
                )?;
            }
        }
        Ok(())
    }

    /// `trav-<N>.c`
    pub fn emit_trav_source(&self, writer: &mut impl Write, r#type: NodeType) -> io::Result<()> {
        let config = self.config;
        let name = self.type_name(r#type);
        writeln!(writer, "#include <stdio.h>")?;
        writeln!(writer, "#include \"generated/trav-{name}.h\"")?;
        let child_types = match r#type {
            NodeType::Node(id) => (config[id].children.iter())
                .map(|child| self.type_name(child.r#type))
                .collect(),
            NodeType::Nodeset(id) => (config[id].nodes.iter())
                .map(|node| config[*node].name.as_str())
                .collect::<Vec<_>>(),
        };
        self.emit_includes(writer, "trav", child_types)?;
        let traversals = config.traversals.iter().map(|traversal| traversal.name.as_str());
        self.emit_includes(writer, "traversal", traversals)?;
        writeln!(writer)?;

        match r#type {
            NodeType::Node(id) => self.emit_trav_node(writer, id)?,
            NodeType::Nodeset(id) => self.emit_trav_nodeset(writer, &config[id])?,
        }
        writeln!(writer)?;
        self.emit_trav_start(writer, r#type)
    }

    fn emit_trav_node(&self, writer: &mut impl Write, id: NodeId) -> io::Result<()> {
        let config = self.config;
        let node = &config[id];
        let name = &node.name;

        writeln!(writer, "void replace_{name}(TravContext *ctx, struct {name} *node) {{")?;
        writeln!(writer, "    ctx->replacement_type = NT_{name};")?;
        writeln!(writer, "    ctx->replacement = node;")?;
        writeln!(writer, "}}")?;
        writeln!(writer)?;

        for child in &node.children {
            self.emit_trav_child(writer, node, child)?;
            writeln!(writer)?;
        }

        writeln!(
            writer,
            "void trav_children_{name}(TravContext *ctx, struct {name} *node, struct Info *info) {{"
        )?;
        for child in &node.children {
            writeln!(writer, "    trav_{name}_{}(ctx, node, info);", child.name)?;
        }
        writeln!(writer, "}}")?;
        writeln!(writer)?;

        writeln!(
            writer,
            "void trav_{name}(TravContext *ctx, struct {name} *node, struct Info *info) {{"
        )?;
        writeln!(writer, "    if (node == NULL) return;")?;
        writeln!(writer)?;
        writeln!(writer, "    switch (trav_current(ctx)) {{")?;
        for (index, traversal) in config.traversals.iter().enumerate() {
            if traversal.handles(id) {
                writeln!(writer, "    case TRAV_{}:", traversal.name)?;
                writeln!(writer, "        {}_{name}(ctx, node, info);", traversal.name)?;
                writeln!(writer, "        break;")?;
                continue;
            }

            let descend = self.descended_children(node, TraversalId(index));
            if descend.len() == node.children.len() {
                // Same as the default case
                continue;
            }
            writeln!(writer, "    case TRAV_{}:", traversal.name)?;
            for child in descend {
                writeln!(writer, "        trav_{name}_{}(ctx, node, info);", child.name)?;
            }
            writeln!(writer, "        break;")?;
        }
        writeln!(writer, "    default:")?;
        writeln!(writer, "        trav_children_{name}(ctx, node, info);")?;
        writeln!(writer, "        break;")?;
        writeln!(writer, "    }}")?;
        writeln!(writer, "}}")
    }

    /// The children a traversal has to visit to find the nodes it handles.
    fn descended_children<'node>(
        &self,
        node: &'node Node,
        traversal: TraversalId,
    ) -> Vec<&'node Child> {
        let traversal = &self.config[traversal];
        (node.children.iter())
            .filter(|child| self.reachability.needs_descent(self.config, traversal, child.r#type))
            .collect()
    }

    /// Visit a child, then apply a replacement requested while visiting it.
    fn emit_trav_child(
        &self,
        writer: &mut impl Write,
        node: &Node,
        child: &Child,
    ) -> io::Result<()> {
        let config = self.config;
        let name = &node.name;
        let field = &child.name;
        let child_type = self.type_name(child.r#type);

        writeln!(
            writer,
            "void trav_{name}_{field}(TravContext *ctx, struct {name} *node, struct Info *info) {{"
        )?;
        writeln!(writer, "    ctx->replacement = NULL;")?;
        writeln!(writer, "    trav_{child_type}(ctx, node->{field}, info);")?;
        writeln!(writer, "    if (ctx->replacement == NULL) return;")?;
        writeln!(writer)?;
        writeln!(writer, "    void *replacement = ctx->replacement;")?;
        writeln!(writer, "    NodeType type = ctx->replacement_type;")?;
        writeln!(writer, "    ctx->replacement = NULL;")?;
        match child.r#type {
            NodeType::Node(_) => {
                writeln!(writer, "    if (type == NT_{child_type}) {{")?;
                writeln!(writer, "        node->{field} = replacement;")?;
                writeln!(writer, "    }} else {{")?;
                writeln!(
                    writer,
                    "        trav_replacement_mismatch(ctx, \"{name}\", \"{field}\", type);"
                )?;
                writeln!(writer, "    }}")?;
            }
            NodeType::Nodeset(id) => {
                // The slot keeps its nodeset wrapper, only the member changes
                writeln!(writer, "    switch (type) {{")?;
                for member in &config[id].nodes {
                    let member = &config[*member].name;
                    writeln!(writer, "    case NT_{member}:")?;
                    writeln!(writer, "        node->{field}->type = NS_{child_type}_{member};")?;
                    writeln!(writer, "        node->{field}->value.val_{member} = replacement;")?;
                    writeln!(writer, "        break;")?;
                }
                writeln!(writer, "    default:")?;
                writeln!(
                    writer,
                    "        trav_replacement_mismatch(ctx, \"{name}\", \"{field}\", type);"
                )?;
                writeln!(writer, "        break;")?;
                writeln!(writer, "    }}")?;
            }
        }
        writeln!(writer, "}}")
    }

    fn emit_trav_nodeset(&self, writer: &mut impl Write, nodeset: &Nodeset) -> io::Result<()> {
        let set = &nodeset.name;
        writeln!(
            writer,
            "void trav_{set}(TravContext *ctx, struct {set} *node, struct Info *info) {{"
        )?;
        writeln!(writer, "    if (node == NULL) return;")?;
        writeln!(writer)?;
        self.emit_nodeset_switch(writer, nodeset, "node", |writer, member| {
            writeln!(writer, "        trav_{member}(ctx, node->value.val_{member}, info);")
        })?;
        writeln!(writer, "}}")
    }

    /// Run a traversal over a tree, returning the tree or its replacement.
    fn emit_trav_start(&self, writer: &mut impl Write, r#type: NodeType) -> io::Result<()> {
        let config = self.config;
        let name = self.type_name(r#type);

        writeln!(
            writer,
            "struct {name} *trav_start_{name}(TravContext *ctx, struct {name} *node, TraversalType trav) {{",
        )?;
        writeln!(writer, "    struct Info *info;")?;
        writeln!(writer)?;
        writeln!(writer, "    trav_push(ctx, trav);")?;
        writeln!(writer, "    ctx->replacement = NULL;")?;
        writeln!(writer, "    switch (trav) {{")?;
        for traversal in &config.traversals {
            writeln!(writer, "    case TRAV_{}:", traversal.name)?;
            writeln!(writer, "        info = {}_createinfo();", traversal.name)?;
            writeln!(writer, "        trav_{name}(ctx, node, info);")?;
            writeln!(writer, "        {}_freeinfo(info);", traversal.name)?;
            writeln!(writer, "        break;")?;
        }
        writeln!(writer, "    default:")?;
        writeln!(writer, "        break;")?;
        writeln!(writer, "    }}")?;
        writeln!(writer, "    trav_pop(ctx);")?;
        writeln!(writer)?;

        writeln!(writer, "    if (ctx->replacement != NULL) {{")?;
        writeln!(writer, "        void *replacement = ctx->replacement;")?;
        writeln!(writer, "        NodeType type = ctx->replacement_type;")?;
        writeln!(writer, "        ctx->replacement = NULL;")?;
        match r#type {
            NodeType::Node(_) => {
                writeln!(writer, "        if (type == NT_{name}) return replacement;")?;
            }
            NodeType::Nodeset(id) => {
                for member in &config[id].nodes {
                    let member = &config[*member].name;
                    writeln!(writer, "        if (type == NT_{member}) {{")?;
                    writeln!(writer, "            node->type = NS_{name}_{member};")?;
                    writeln!(writer, "            node->value.val_{member} = replacement;")?;
                    writeln!(writer, "            return node;")?;
                    writeln!(writer, "        }}")?;
                }
            }
        }
        writeln!(writer, "        trav_replacement_mismatch(ctx, \"<root>\", \"{name}\", type);")?;
        writeln!(writer, "    }}")?;
        writeln!(writer, "    return node;")?;
        writeln!(writer, "}}")
    }
}

#[cfg(test)]
mod tests {
    use crate::codegen::tests::{render, CALC};
    use crate::model::{NodeType, NodesetId};

    fn trav_source(source: &str, name: &str) -> String {
        render(source, |context, writer| {
            let node = context.config().node_by_name(name).unwrap();
            context.emit_trav_source(writer, NodeType::Node(node))
        })
    }

    /// The body of the dispatch function of a node.
    fn dispatcher<'a>(output: &'a str, name: &str) -> &'a str {
        let start = output.find(&format!("void trav_{name}(")).unwrap();
        let len = output[start..].find("\n}\n").unwrap();
        &output[start..start + len]
    }

    #[test]
    fn handled_nodes_call_handlers() {
        let output = trav_source(CALC, "Var");
        let output = dispatcher(&output, "Var");

        assert!(output.contains(
            "    case TRAV_Rename:\n        Rename_Var(ctx, node, info);\n        break;\n"
        ));
        assert!(output.contains(
            "    case TRAV_Dump:\n        Dump_Var(ctx, node, info);\n        break;\n"
        ));
        // `Var` has no children, so the default case does nothing
        assert!(!output.contains("case TRAV_Fold:"));
    }

    #[test]
    fn descent_is_pruned() {
        let output = trav_source(CALC, "BinOp");
        let output = dispatcher(&output, "BinOp");

        // `Rename` may find a `Var` in either operand, so it uses the default
        assert!(!output.contains("case TRAV_Rename:"));
        assert!(output.contains("    case TRAV_Fold:\n        Fold_BinOp(ctx, node, info);\n"));
        assert!(output.contains("    default:\n        trav_children_BinOp(ctx, node, info);\n"));
    }

    #[test]
    fn node_replacement() {
        let output = trav_source(
            "root node Root { children { child Leaf leaf } };\n\
             node Leaf;\n\
             traversal Swap { nodes { Leaf } };\n\
             pass Noop;\n\
             root phase Main { passes { Swap } };\n",
            "Root",
        );

        assert!(output.contains(
            "void trav_Root_leaf(TravContext *ctx, struct Root *node, struct Info *info) {\n\
             \x20   ctx->replacement = NULL;\n\
             \x20   trav_Leaf(ctx, node->leaf, info);\n\
             \x20   if (ctx->replacement == NULL) return;\n"
        ));
        assert!(output.contains(
            "    if (type == NT_Leaf) {\n        node->leaf = replacement;\n    } else {\n        trav_replacement_mismatch(ctx, \"Root\", \"leaf\", type);\n    }\n"
        ));
        assert!(output.contains(
            "        info = Swap_createinfo();\n        trav_Root(ctx, node, info);\n        Swap_freeinfo(info);\n"
        ));
        assert!(output.contains("        if (type == NT_Root) return replacement;\n"));
    }

    #[test]
    fn nodeset_replacement() {
        let output = trav_source(CALC, "Print");

        assert!(output.contains(
            "    case NT_Num:\n        node->value->type = NS_Expr_Num;\n        node->value->value.val_Num = replacement;\n        break;\n"
        ));
        assert!(output.contains(
            "        trav_replacement_mismatch(ctx, \"Print\", \"value\", type);\n"
        ));
    }

    #[test]
    fn nodeset_dispatch() {
        let output = render(CALC, |context, writer| {
            context.emit_trav_source(writer, NodeType::Nodeset(NodesetId(1)))
        });

        assert!(output.contains(
            "    case NS_Expr_Var:\n        trav_Var(ctx, node->value.val_Var, info);\n        break;\n"
        ));
        assert!(output.contains("            node->type = NS_Expr_BinOp;\n"));
    }

    #[test]
    fn core_names_every_type() {
        let output = render(CALC, |context, writer| context.emit_trav_core_source(writer));
        assert!(output.contains("    case NT_Expr:\n        return \"Expr\";\n"));
    }
}
