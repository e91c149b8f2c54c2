//! Headers declaring the functions users write themselves.

use std::io::{self, Write};

use crate::codegen::Context;
use crate::model::{PassId, TraversalId};

impl Context<'_> {
    /// `traversal-<T>.h`: the info constructor and destructor, and one
    /// handler per handled node.
    pub fn emit_traversal_header(
        &self,
        writer: &mut impl Write,
        id: TraversalId,
    ) -> io::Result<()> {
        let config = self.config;
        let traversal = &config[id];
        let name = &traversal.name;

        writeln!(writer, "#pragma once")?;
        writeln!(writer, "#include \"generated/ast.h\"")?;
        writeln!(writer, "#include \"generated/trav-core.h\"")?;
        writeln!(writer)?;
        if let Some(info) = &traversal.info {
            writeln!(writer, "// {info}")?;
        }
        writeln!(writer, "struct Info;")?;
        writeln!(writer, "struct Info *{name}_createinfo(void);")?;
        writeln!(writer, "void {name}_freeinfo(struct Info *info);")?;
        writeln!(writer)?;

        for node in config.node_ids().filter(|node| traversal.handles(*node)) {
            writeln!(
                writer,
                "void {name}_{node}(TravContext *ctx, struct {node} *node, struct Info *info);",
                node = config[node].name,
            )?;
        }
        Ok(())
    }

    /// `pass-<P>.h`
    pub fn emit_pass_header(&self, writer: &mut impl Write, id: PassId) -> io::Result<()> {
        let pass = &self.config[id];
        let root = self.type_name(self.config.root_node);

        writeln!(writer, "#pragma once")?;
        writeln!(writer, "#include \"generated/ast.h\"")?;
        writeln!(writer)?;
        if let Some(info) = &pass.info {
            writeln!(writer, "// {info}")?;
        }
        writeln!(writer, "struct {root} *{}(struct {root} *syntaxtree);", pass.entry())
    }
}

#[cfg(test)]
mod tests {
    use crate::codegen::tests::{render, CALC};
    use crate::model::{PassId, TraversalId};

    #[test]
    fn handlers_for_listed_nodes() {
        let output = render(CALC, |context, writer| {
            context.emit_traversal_header(writer, TraversalId(1))
        });

        assert!(output.contains(
            "struct Info *Fold_createinfo(void);\nvoid Fold_freeinfo(struct Info *info);\n"
        ));
        assert!(output.ends_with(
            "\nvoid Fold_BinOp(TravContext *ctx, struct BinOp *node, struct Info *info);\n"
        ));
    }

    #[test]
    fn handlers_for_every_node() {
        let output = render(CALC, |context, writer| {
            context.emit_traversal_header(writer, TraversalId(2))
        });

        assert_eq!(output.matches("(TravContext *ctx").count(), 6);
        assert!(output.contains(
            "void Dump_Program(TravContext *ctx, struct Program *node, struct Info *info);\n"
        ));
    }

    #[test]
    fn pass_entries() {
        let output = render(CALC, |context, writer| context.emit_pass_header(writer, PassId(0)));
        assert!(output.ends_with("struct Program *scan_program(struct Program *syntaxtree);\n"));
    }
}
