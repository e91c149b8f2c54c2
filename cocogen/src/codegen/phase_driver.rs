use std::io::{self, Write};

use crate::codegen::{printf_literal, Context};
use crate::model::{Action, PhaseTree, PhaseTreeKind};

impl Context<'_> {
    /// `phase-driver.h`
    pub fn emit_phase_driver_header(&self, writer: &mut impl Write) -> io::Result<()> {
        let root = self.type_name(self.config.root_node);
        writeln!(writer, "#pragma once")?;
        writeln!(writer, "#include \"generated/ast.h\"")?;
        writeln!(writer, "#include \"generated/trav-core.h\"")?;
        writeln!(writer)?;
        writeln!(
            writer,
            "struct {root} *phasedriver_run(TravContext *ctx, struct {root} *syntaxtree);"
        )
    }

    /// `phase-driver.c`: runs the passes and traversals of the phase tree
    /// in order, threading the tree through them.
    pub fn emit_phase_driver_source(&self, writer: &mut impl Write) -> io::Result<()> {
        let config = self.config;
        let root = self.type_name(config.root_node);

        writeln!(writer, "#include <stdio.h>")?;
        writeln!(writer, "#include \"generated/phase-driver.h\"")?;
        writeln!(writer, "#include \"generated/trav-{root}.h\"")?;
        let passes = config.passes.iter().map(|pass| pass.name.as_str());
        self.emit_includes(writer, "pass", passes)?;
        writeln!(writer)?;

        writeln!(
            writer,
            "struct {root} *phasedriver_run(TravContext *ctx, struct {root} *syntaxtree) {{"
        )?;
        self.emit_phase(writer, &config.phase_tree, 1)?;
        writeln!(writer, "    return syntaxtree;")?;
        writeln!(writer, "}}")
    }

    fn emit_phase(
        &self,
        writer: &mut impl Write,
        tree: &PhaseTree,
        level: usize,
    ) -> io::Result<()> {
        let config = self.config;
        let root = self.type_name(config.root_node);
        let phase = &config[tree.phase];

        if phase.cycle {
            writeln!(writer, "    // Cycle phase `{}`, run once", phase.name)?;
        }
        match &tree.kind {
            PhaseTreeKind::Composite(subtrees) => {
                let label = phase.info.as_ref().unwrap_or(&phase.name);
                let line = format!("{} {label}\n", "**".repeat(level));
                writeln!(writer, "    printf({});", printf_literal(&line))?;
                for subtree in subtrees {
                    self.emit_phase(writer, subtree, level + 1)?;
                }
            }
            PhaseTreeKind::Leaf(actions) => {
                for action in actions {
                    let (label, call) = match action {
                        Action::Pass(id) => {
                            let pass = &config[*id];
                            let label = pass.info.as_ref().unwrap_or(&pass.name);
                            (label, format!("{}(syntaxtree)", pass.entry()))
                        }
                        Action::Traversal(id) => {
                            let traversal = &config[*id];
                            let label = traversal.info.as_ref().unwrap_or(&traversal.name);
                            let call = format!(
                                "trav_start_{root}(ctx, syntaxtree, TRAV_{})",
                                traversal.name,
                            );
                            (label, call)
                        }
                    };
                    let line = format!("{} {label}\n", "--".repeat(level + 1));
                    writeln!(writer, "    printf({});", printf_literal(&line))?;
                    writeln!(writer, "    syntaxtree = {call};")?;
                }
            }
        }
        Ok(())
    }
}
