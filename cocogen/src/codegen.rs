//! Emitters for the generated C sources.
//!
//! Each emitter writes the body of one generated file. Which files are
//! generated, and where, is decided by [`crate::filegen`].

use std::io::{self, Write};

use crate::model::{AttrType, Config, NodeType, PrimType, Reachability};

mod ast;
mod binary;
mod dot;
mod lifecycle;
mod phase_driver;
mod textual;
mod trav;
mod user;

pub struct Context<'config> {
    config: &'config Config,
    reachability: Reachability,
}

impl<'config> Context<'config> {
    pub fn new(config: &'config Config) -> Context<'config> {
        Context {
            config,
            reachability: config.reachability(),
        }
    }

    pub fn config(&self) -> &'config Config {
        self.config
    }

    fn type_name(&self, r#type: NodeType) -> &'config str {
        self.config.type_name(r#type)
    }

    fn c_attr_type(&self, r#type: AttrType) -> String {
        match r#type {
            AttrType::Prim(prim) => c_prim_type(prim).to_owned(),
            AttrType::Link(node) => format!("struct {} *", self.config[node].name),
            AttrType::Enum(r#enum) => self.config[r#enum].name.clone(),
        }
    }

    /// A field declaration, keeping pointer stars next to the field name.
    fn c_field(&self, r#type: AttrType, name: &str) -> String {
        let c_type = self.c_attr_type(r#type);
        match c_type.ends_with('*') {
            true => format!("{c_type}{name}"),
            false => format!("{c_type} {name}"),
        }
    }

    /// Emit an `#include` for every generated header in `names`, once each.
    fn emit_includes<'a>(
        &self,
        writer: &mut impl Write,
        prefix: &str,
        names: impl IntoIterator<Item = &'a str>,
    ) -> io::Result<()> {
        let mut seen = Vec::new();
        for name in names {
            if !seen.contains(&name) {
                writeln!(writer, "#include \"generated/{prefix}-{name}.h\"")?;
                seen.push(name);
            }
        }
        Ok(())
    }
}

pub fn c_prim_type(prim: PrimType) -> &'static str {
    match prim {
        PrimType::Int => "int",
        PrimType::UInt => "unsigned int",
        PrimType::Int8 => "int8_t",
        PrimType::Int16 => "int16_t",
        PrimType::Int32 => "int32_t",
        PrimType::Int64 => "int64_t",
        PrimType::UInt8 => "uint8_t",
        PrimType::UInt16 => "uint16_t",
        PrimType::UInt32 => "uint32_t",
        PrimType::UInt64 => "uint64_t",
        PrimType::Float => "float",
        PrimType::Double => "double",
        PrimType::Bool => "bool",
        PrimType::String => "char *",
    }
}

/// Quote a string as a `printf` format that prints it verbatim.
fn printf_literal(string: &str) -> String {
    let mut output = String::with_capacity(string.len() + 2);
    output.push('"');
    for c in string.chars() {
        match c {
            '"' => output.push_str("\\\""),
            '\\' => output.push_str("\\\\"),
            '\n' => output.push_str("\\n"),
            '\t' => output.push_str("\\t"),
            '%' => output.push_str("%%"),
            c => output.push(c),
        }
    }
    output.push('"');
    output
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::check::tests::check_ok;

    pub const CALC: &str = r#"
        enum BinOpKind { prefix = BO, values { add, sub, mul } };
        root node Program { children { child Stmts stmts { mandatory } } };
        nodeset Stmts { Assign, Print };
        node Assign {
            children { child Expr value { construct, mandatory }, child Stmts next },
            attributes { construct string target, Var binding }
        };
        node Print { children { child Expr value, child Stmts next } };
        nodeset Expr { Num, Var, BinOp };
        node Num { attributes { construct int value = 0 } };
        node Var { attributes { construct string name } };
        node BinOp {
            children { child Expr left { construct }, child Expr right { construct } },
            attributes { construct BinOpKind op }
        };
        traversal Rename { info = "rename variables", nodes { Var } };
        traversal Fold { nodes { BinOp } };
        traversal Dump;
        pass Scan { func = scan_program };
        phase Front { passes { Scan, Rename } };
        root phase Main { subphases { Front }, info = "compile" };
    "#;

    pub fn render(
        source: &str,
        emit: impl FnOnce(&Context<'_>, &mut Vec<u8>) -> io::Result<()>,
    ) -> String {
        let config = check_ok(source);
        let context = Context::new(&config);
        let mut output = Vec::new();
        emit(&context, &mut output).unwrap();
        String::from_utf8(output).unwrap()
    }

    #[test]
    fn field_declarations() {
        let config = check_ok(CALC);
        let context = Context::new(&config);
        let assign = &config[config.node_by_name("Assign").unwrap()];
        let binop = &config[config.node_by_name("BinOp").unwrap()];

        assert_eq!(context.c_field(assign.attrs[0].r#type, "target"), "char *target");
        assert_eq!(context.c_field(assign.attrs[1].r#type, "binding"), "struct Var *binding");
        assert_eq!(context.c_field(binop.attrs[0].r#type, "op"), "BinOpKind op");
    }

    #[test]
    fn printf_literal_escapes() {
        assert_eq!(printf_literal("50% \"done\"\n"), r#""50%% \"done\"\n""#);
    }

    #[test]
    fn includes_are_deduplicated() {
        let output = render(CALC, |context, writer| {
            context.emit_includes(writer, "free", ["Expr", "Stmts", "Expr"])
        });
        assert_eq!(
            output,
            "#include \"generated/free-Expr.h\"\n#include \"generated/free-Stmts.h\"\n",
        );
    }
}
