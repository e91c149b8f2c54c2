//! Structural digests of configuration entities.
//!
//! Generated files start with a `// Hash:` header holding the digest of the
//! entity they were generated from. Digests cover the structure of the
//! entity, not the text of the generated file, so unrelated changes to a
//! configuration leave most files untouched.

use sha2::{Digest, Sha256};

use crate::model::{
    Action, Attr, AttrType, AttrValue, Child, Config, NodeId, NodeType, NodesetId, PassId,
    PhaseBody, TraversalId,
};

/// Length of a digest in bytes.
pub const DIGEST_LEN: usize = 16;

/// A digest, truncated to [`DIGEST_LEN`] bytes.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Digest16([u8; DIGEST_LEN]);

impl Digest16 {
    pub fn to_hex(self) -> String {
        hex::encode(self.0)
    }

    /// The first four bytes of the digest, read as a big-endian integer.
    pub fn prefix_u32(self) -> u32 {
        u32::from_be_bytes([self.0[0], self.0[1], self.0[2], self.0[3]])
    }
}

pub struct Hasher<'config> {
    config: &'config Config,
    sha: Sha256,
}

impl<'config> Hasher<'config> {
    pub fn new(config: &'config Config) -> Hasher<'config> {
        let mut hasher = Hasher {
            config,
            sha: Sha256::new(),
        };
        // Changes to the generator invalidate everything
        hasher.str(env!("CARGO_PKG_NAME"));
        hasher.str(env!("CARGO_PKG_VERSION"));
        hasher
    }

    pub fn finish(self) -> Digest16 {
        let digest = self.sha.finalize();
        let mut bytes = [0; DIGEST_LEN];
        bytes.copy_from_slice(&digest[..DIGEST_LEN]);
        Digest16(bytes)
    }

    fn bytes(&mut self, bytes: &[u8]) {
        self.sha.update((bytes.len() as u64).to_le_bytes());
        self.sha.update(bytes);
    }

    pub fn str(&mut self, string: &str) -> &mut Self {
        self.bytes(string.as_bytes());
        self
    }

    fn tag(&mut self, tag: u8) -> &mut Self {
        self.sha.update([tag]);
        self
    }

    fn flag(&mut self, flag: bool) -> &mut Self {
        self.tag(flag as u8)
    }

    fn opt_str(&mut self, string: &Option<String>) -> &mut Self {
        match string {
            Some(string) => self.tag(1).str(string),
            None => self.tag(0),
        }
    }

    fn node_type(&mut self, r#type: NodeType) -> &mut Self {
        let config = self.config;
        let name = config.type_name(r#type);
        match r#type {
            NodeType::Node(_) => self.tag(0).str(name),
            NodeType::Nodeset(_) => self.tag(1).str(name),
        }
    }

    fn child(&mut self, child: &Child) -> &mut Self {
        self.str(&child.name)
            .node_type(child.r#type)
            .flag(child.construct)
            .flag(child.mandatory);
        self.sha
            .update((child.mandatory_phases.len() as u64).to_le_bytes());
        for constraint in &child.mandatory_phases {
            let config = self.config;
            self.flag(constraint.negated)
                .str(&config[constraint.first].name)
                .str(&config[constraint.last].name);
        }
        self
    }

    fn attr(&mut self, attr: &Attr) -> &mut Self {
        let config = self.config;
        self.str(&attr.name).flag(attr.construct);
        match attr.r#type {
            AttrType::Prim(prim) => {
                self.tag(0).str(prim.name());
            }
            AttrType::Link(node) => {
                self.tag(1).str(&config[node].name);
            }
            AttrType::Enum(r#enum) => {
                let r#enum = &config[r#enum];
                self.tag(2).str(&r#enum.name).str(&r#enum.prefix);
                r#enum.values.iter().for_each(|value| {
                    self.str(value);
                });
            }
        }
        match &attr.default {
            None => self.tag(0),
            Some(AttrValue::Int(value)) => self.tag(1).str(&value.to_string()),
            Some(AttrValue::UInt(value)) => self.tag(2).str(&value.to_string()),
            Some(AttrValue::Float(value)) => self.tag(3).str(&value.to_bits().to_string()),
            Some(AttrValue::Bool(value)) => self.tag(4).flag(*value),
            Some(AttrValue::String(value)) => self.tag(5).str(value),
            Some(AttrValue::Enum(value)) => self.tag(6).str(&value.to_string()),
        }
    }

    pub fn node(&mut self, id: NodeId) -> &mut Self {
        let config = self.config;
        let node = &config[id];
        self.tag(b'N').str(&node.name).flag(node.is_root);
        node.children.iter().for_each(|child| {
            self.child(child);
        });
        self.tag(b'|');
        node.attrs.iter().for_each(|attr| {
            self.attr(attr);
        });
        self
    }

    pub fn nodeset(&mut self, id: NodesetId) -> &mut Self {
        let config = self.config;
        let nodeset = &config[id];
        self.tag(b'S').str(&nodeset.name).flag(nodeset.is_root);
        nodeset.nodes.iter().for_each(|node| {
            self.str(&config[*node].name);
        });
        self
    }

    pub fn traversal(&mut self, id: TraversalId) -> &mut Self {
        let config = self.config;
        let traversal = &config[id];
        self.tag(b'T').str(&traversal.name).opt_str(&traversal.info);
        match &traversal.nodes {
            // Handles every node, so the generated header lists all of them
            None => {
                self.tag(0);
                config.nodes.iter().for_each(|node| {
                    self.str(&node.name);
                });
                self
            }
            Some(nodes) => {
                self.tag(1);
                nodes.iter().for_each(|node| {
                    self.str(&config[*node].name);
                });
                self
            }
        }
    }

    pub fn pass(&mut self, id: PassId) -> &mut Self {
        let config = self.config;
        let pass = &config[id];
        self.tag(b'P')
            .str(&pass.name)
            .opt_str(&pass.info)
            .opt_str(&pass.func)
            .node_type(config.root_node)
    }

    /// Every entity of the configuration, in declaration order.
    pub fn config(&mut self) -> &mut Self {
        let config = self.config;
        for r#enum in &config.enums {
            self.tag(b'E')
                .str(&r#enum.name)
                .str(&r#enum.prefix)
                .opt_str(&r#enum.info);
            r#enum.values.iter().for_each(|value| {
                self.str(value);
            });
        }
        config.node_ids().for_each(|id| {
            self.node(id);
        });
        config.nodeset_ids().for_each(|id| {
            self.nodeset(id);
        });
        (0..config.traversals.len()).for_each(|index| {
            self.traversal(TraversalId(index));
        });
        (0..config.passes.len()).for_each(|index| {
            self.pass(PassId(index));
        });
        for phase in &config.phases {
            self.tag(b'H')
                .str(&phase.name)
                .opt_str(&phase.info)
                .flag(phase.is_root)
                .flag(phase.cycle);
            match &phase.body {
                PhaseBody::Subphases(subphases) => {
                    self.tag(0);
                    subphases.iter().for_each(|id| {
                        self.str(&config[*id].name);
                    });
                }
                PhaseBody::Actions(actions) => {
                    self.tag(1);
                    actions.iter().for_each(|action| {
                        match action {
                            Action::Pass(id) => self.tag(0).str(&config[*id].name),
                            Action::Traversal(id) => self.tag(1).str(&config[*id].name),
                        };
                    });
                }
            }
        }
        self
    }
}

pub fn node_digest(config: &Config, id: NodeId) -> Digest16 {
    let mut hasher = Hasher::new(config);
    hasher.node(id);
    hasher.finish()
}

pub fn nodeset_digest(config: &Config, id: NodesetId) -> Digest16 {
    let mut hasher = Hasher::new(config);
    hasher.nodeset(id);
    hasher.finish()
}

pub fn traversal_digest(config: &Config, id: TraversalId) -> Digest16 {
    let mut hasher = Hasher::new(config);
    hasher.traversal(id);
    hasher.finish()
}

pub fn pass_digest(config: &Config, id: PassId) -> Digest16 {
    let mut hasher = Hasher::new(config);
    hasher.pass(id);
    hasher.finish()
}

pub fn config_digest(config: &Config) -> Digest16 {
    let mut hasher = Hasher::new(config);
    hasher.config();
    hasher.finish()
}

/// Identifies the configuration a binary AST file was written with.
pub fn ast_magic(config: &Config) -> u32 {
    config_digest(config).prefix_u32()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::check::tests::check_ok;

    const BASE: &str = "\
        root node Program { children { child Expr body } };\n\
        nodeset Expr { Num, Var };\n\
        node Num { attributes { int value } };\n\
        node Var { attributes { string name } };\n\
        traversal Print;\n\
        pass Noop;\n\
        root phase Main { passes { Noop, Print } };\n";

    #[test]
    fn digests_are_hex() {
        let config = check_ok(BASE);
        let hex = config_digest(&config).to_hex();
        assert_eq!(hex.len(), 2 * DIGEST_LEN);
        assert!(hex.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn digests_are_deterministic() {
        let first = check_ok(BASE);
        let second = check_ok(BASE);
        assert_eq!(config_digest(&first), config_digest(&second));
        assert_eq!(ast_magic(&first), ast_magic(&second));
    }

    #[test]
    fn unrelated_changes_keep_entity_digests() {
        let before = check_ok(BASE);
        let after = check_ok(&BASE.replace("string name", "string name, bool bound"));
        let num = |config: &Config| node_digest(config, config.node_by_name("Num").unwrap());
        let var = |config: &Config| node_digest(config, config.node_by_name("Var").unwrap());

        assert_eq!(num(&before), num(&after));
        assert_ne!(var(&before), var(&after));
        assert_ne!(config_digest(&before), config_digest(&after));
    }

    #[test]
    fn entity_kinds_are_distinguished() {
        let config = check_ok(BASE);
        assert_ne!(
            traversal_digest(&config, TraversalId(0)),
            pass_digest(&config, PassId(0)),
        );
        assert_ne!(
            nodeset_digest(&config, NodesetId(0)),
            node_digest(&config, NodeId(0)),
        );
    }

    #[test]
    fn enum_attributes_and_defaults_are_hashed() {
        let source = "enum Mode { prefix = MD, values { fast, slow } };\n".to_owned()
            + &BASE.replace("int value", "int value, Mode mode = fast");
        let before = check_ok(&source);
        let num = |config: &Config| node_digest(config, config.node_by_name("Num").unwrap());

        let reordered = check_ok(&source.replace("{ fast, slow }", "{ slow, fast }"));
        assert_ne!(num(&before), num(&reordered));
        let other_default = check_ok(&source.replace("mode = fast", "mode = slow"));
        assert_ne!(num(&before), num(&other_default));
    }
}
