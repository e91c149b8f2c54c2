use std::io::{self, Write};

use itertools::Itertools;

use crate::codegen::Context;

impl Context<'_> {
    /// `ast.dot`: a Graphviz diagram of the node types and their children.
    pub fn emit_dot(&self, writer: &mut impl Write) -> io::Result<()> {
        let config = self.config;
        writeln!(writer, "digraph ast {{")?;
        for node in &config.nodes {
            let label = std::iter::once(node.name.as_str())
                .chain(node.attrs.iter().map(|attr| attr.name.as_str()))
                .format("|");
            let color = match node.is_root {
                true => " color=\"darkorchid3\"",
                false => "",
            };
            writeln!(writer, "    \"{}\" [label=\"{label}\"{color} shape=\"record\"];", node.name)?;
        }
        for nodeset in &config.nodesets {
            writeln!(writer, "    \"{}\" [color=\"blue\"];", nodeset.name)?;
        }

        writeln!(writer)?;
        writeln!(writer, "    edge [color=blue]")?;
        for nodeset in &config.nodesets {
            for node in &nodeset.nodes {
                writeln!(writer, "    \"{}\" -> \"{}\";", nodeset.name, config[*node].name)?;
            }
        }

        writeln!(writer)?;
        writeln!(writer, "    edge [color=black]")?;
        for node in &config.nodes {
            for child in &node.children {
                writeln!(
                    writer,
                    "    \"{}\" -> \"{}\" [label=\"{}\"];",
                    node.name,
                    self.type_name(child.r#type),
                    child.name,
                )?;
            }
        }
        writeln!(writer, "}}")
    }
}

#[cfg(test)]
mod tests {
    use crate::codegen::tests::render;

    #[test]
    fn small_graph() {
        let output = render(
            "root node Root { children { child Expr body } };\n\
             nodeset Expr { Num };\n\
             node Num { attributes { int value, bool negative } };\n\
             pass Noop;\n\
             root phase Main { passes { Noop } };\n",
            |context, writer| context.emit_dot(writer),
        );

        assert_eq!(
            output,
            "digraph ast {\n\
             \x20   \"Root\" [label=\"Root\" color=\"darkorchid3\" shape=\"record\"];\n\
             \x20   \"Num\" [label=\"Num|value|negative\" shape=\"record\"];\n\
             \x20   \"Expr\" [color=\"blue\"];\n\
             \n\
             \x20   edge [color=blue]\n\
             \x20   \"Expr\" -> \"Num\";\n\
             \n\
             \x20   edge [color=black]\n\
             \x20   \"Root\" -> \"Expr\" [label=\"body\"];\n\
             }\n",
        );
    }
}
