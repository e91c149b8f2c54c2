//! The binary tree codec.
//!
//! The static part of the string pool and the enum pool are computed by
//! [`StringPool`], the same way the in-process codec does, so that files
//! written by the generated code can be read by [`crate::runtime::binary`]
//! and the other way around.

use std::io::{self, Write};

use itertools::Itertools;

use crate::codegen::Context;
use crate::hash;
use crate::model::{AttrType, Node, NodeType, Nodeset, PrimType};
use crate::runtime::binary::{StringPool, Tag, MAGIC};

impl Context<'_> {
    /// `binary-serialization-util.h`
    pub fn emit_binary_util_header(&self, writer: &mut impl Write) -> io::Result<()> {
        let pool = StringPool::new(self.config);
        writeln!(writer, "#pragma once")?;
        writeln!(writer, "#include <stdbool.h>")?;
        writeln!(writer, "#include <stdint.h>")?;
        writeln!(writer, "#include <stdio.h>")?;
        writeln!(writer, "#include \"lib/imap.h\"")?;
        writeln!(writer, "#include \"generated/enum.h\"")?;
        writeln!(writer)?;
        writeln!(writer, "#define AST_MAGIC {MAGIC:#010x}u")?;
        writeln!(writer, "#define AST_DEFINITION_MAGIC {:#010x}u", hash::ast_magic(self.config))?;
        writeln!(writer, "#define AST_STATIC_STRING_COUNT {}", pool.len())?;
        writeln!(writer, "#define AST_ENUM_COUNT {}", pool.enums().len())?;
        writeln!(writer)?;

        writeln!(writer, "typedef enum {{")?;
        for tag in Tag::ALL {
            writeln!(writer, "    AT_{} = {},", tag.name(), tag as u8)?;
        }
        writeln!(writer, "}} AttrTag;")?;
        writer.write_all(BINARY_UTIL_HEADER.as_bytes())
    }

    /// `binary-serialization-util.c`: the static pools and the support
    /// functions shared by every node reader and writer.
    pub fn emit_binary_util_source(&self, writer: &mut impl Write) -> io::Result<()> {
        let config = self.config;
        let pool = StringPool::new(config);
        writeln!(writer, "#include <stdarg.h>")?;
        writeln!(writer, "#include <stdlib.h>")?;
        writeln!(writer, "#include <string.h>")?;
        writeln!(writer, "#include \"lib/memory.h\"")?;
        writeln!(writer, "#include \"generated/binary-serialization-util.h\"")?;
        writeln!(writer)?;

        writeln!(writer, "const char *const ast_static_strings[AST_STATIC_STRING_COUNT] = {{")?;
        for (index, string) in pool.strings().iter().enumerate() {
            writeln!(writer, "    \"{string}\", // {index}")?;
        }
        writeln!(writer, "}};")?;
        writeln!(writer)?;

        for (index, entry) in pool.enums().iter().enumerate() {
            writeln!(
                writer,
                "static const uint32_t ast_enum_values_{index}[] = {{ {} }};",
                entry.values.iter().format(", "),
            )?;
        }
        match pool.enums().is_empty() {
            true => writeln!(
                writer,
                "const BinEnum ast_static_enums[1] = {{ {{ 0, 0, 0, NULL }} }};"
            )?,
            false => {
                writeln!(writer, "const BinEnum ast_static_enums[AST_ENUM_COUNT] = {{")?;
                for (index, entry) in pool.enums().iter().enumerate() {
                    writeln!(
                        writer,
                        "    {{ {}, {}, {}, ast_enum_values_{index} }},",
                        entry.name,
                        entry.prefix,
                        entry.values.len(),
                    )?;
                }
                writeln!(writer, "}};")?;
            }
        }
        writeln!(writer)?;

        writeln!(writer, "const char *const ast_node_type_names[NodeType_count] = {{")?;
        for r#type in config.node_types() {
            writeln!(writer, "    \"{}\",", self.type_name(r#type))?;
        }
        writeln!(writer, "}};")?;
        writer.write_all(BINARY_UTIL_SOURCE.as_bytes())
    }

    /// `serialization-<N>.h`: the binary and textual entry points of a node
    /// type, and the per-type functions the codecs call each other through.
    pub fn emit_serialization_header(
        &self,
        writer: &mut impl Write,
        r#type: NodeType,
    ) -> io::Result<()> {
        let name = self.type_name(r#type);
        writeln!(writer, "#pragma once")?;
        writeln!(writer, "#include <stdio.h>")?;
        writeln!(writer, "#include \"generated/ast.h\"")?;
        writeln!(writer, "#include \"generated/binary-serialization-util.h\"")?;
        writeln!(writer, "#include \"generated/textual-serialization-util.h\"")?;
        writeln!(writer)?;
        writeln!(writer, "void serialization_write_binary_{name}(FILE *fp, struct {name} *node);")?;
        writeln!(writer, "struct {name} *serialization_read_binary_{name}(FILE *fp);")?;
        writeln!(
            writer,
            "void serialization_write_textual_{name}(FILE *fp, struct {name} *node);"
        )?;
        writeln!(writer, "struct {name} *serialization_read_textual_{name}(FILE *fp);")?;
        writeln!(writer)?;
        writeln!(writer, "void _binary_index_{name}(BinWriter *w, struct {name} *node);")?;
        writeln!(writer, "void _binary_strings_{name}(BinWriter *w, struct {name} *node);")?;
        writeln!(writer, "void _binary_write_node_{name}(BinWriter *w, struct {name} *node);")?;
        writeln!(writer, "struct {name} *_binary_read_node_{name}(BinReader *r, uint32_t index);")?;
        writeln!(writer, "void _textual_index_{name}(TxtWriter *w, struct {name} *node);")?;
        writeln!(writer, "void _textual_write_node_{name}(TxtWriter *w, struct {name} *node);")?;
        writeln!(writer, "struct {name} *_textual_read_node_{name}(TxtReader *r, uint32_t id);")
    }

    /// `serialization-all.h`
    pub fn emit_serialization_all_header(&self, writer: &mut impl Write) -> io::Result<()> {
        writeln!(writer, "#pragma once")?;
        let names = self.config.node_types().map(|r#type| self.type_name(r#type));
        self.emit_includes(writer, "serialization", names)
    }

    /// `binary-serialization-<N>-write.c`: numbering, string collection and
    /// record writing, each a pre-order walk.
    pub fn emit_binary_write_source(
        &self,
        writer: &mut impl Write,
        r#type: NodeType,
    ) -> io::Result<()> {
        let name = self.type_name(r#type);
        writeln!(writer, "#include \"generated/serialization-{name}.h\"")?;
        self.emit_includes(writer, "serialization", self.child_type_names(r#type))?;
        writeln!(writer)?;

        writeln!(
            writer,
            "void serialization_write_binary_{name}(FILE *fp, struct {name} *node) {{"
        )?;
        writeln!(writer, "    BinWriter *w = bin_writer_new(fp);")?;
        writeln!(writer, "    _binary_index_{name}(w, node);")?;
        writeln!(writer, "    _binary_strings_{name}(w, node);")?;
        writeln!(writer, "    bin_write_header(w);")?;
        writeln!(writer, "    _binary_write_node_{name}(w, node);")?;
        writeln!(writer, "    bin_writer_free(w);")?;
        writeln!(writer, "}}")?;
        writeln!(writer)?;

        match r#type {
            NodeType::Node(id) => self.emit_binary_write_node(writer, &self.config[id]),
            NodeType::Nodeset(id) => self.emit_binary_write_nodeset(writer, &self.config[id]),
        }
    }

    fn emit_binary_write_node(&self, writer: &mut impl Write, node: &Node) -> io::Result<()> {
        let pool = StringPool::new(self.config);
        let name = &node.name;

        writeln!(writer, "void _binary_index_{name}(BinWriter *w, struct {name} *node) {{")?;
        writeln!(writer, "    if (node == NULL) return;")?;
        writeln!(writer)?;
        writeln!(writer, "    bin_number_node(w, node);")?;
        for child in &node.children {
            writeln!(
                writer,
                "    _binary_index_{}(w, node->{});",
                self.type_name(child.r#type),
                child.name
            )?;
        }
        writeln!(writer, "}}")?;
        writeln!(writer)?;

        writeln!(writer, "void _binary_strings_{name}(BinWriter *w, struct {name} *node) {{")?;
        writeln!(writer, "    if (node == NULL) return;")?;
        writeln!(writer)?;
        for attr in &node.attrs {
            if attr.r#type == AttrType::Prim(PrimType::String) {
                writeln!(
                    writer,
                    "    if (node->{attr} != NULL) bin_add_string(w, node->{attr});",
                    attr = attr.name
                )?;
            }
        }
        for child in &node.children {
            writeln!(
                writer,
                "    _binary_strings_{}(w, node->{});",
                self.type_name(child.r#type),
                child.name
            )?;
        }
        writeln!(writer, "}}")?;
        writeln!(writer)?;

        writeln!(writer, "void _binary_write_node_{name}(BinWriter *w, struct {name} *node) {{")?;
        writeln!(
            writer,
            "    bin_write_u32(w->fp, {}); // {name}",
            pool.node_index(self.node_id(node))
        )?;
        writeln!(writer)?;
        writeln!(writer, "    uint16_t child_count = 0;")?;
        for child in &node.children {
            writeln!(writer, "    if (node->{} != NULL) child_count++;", child.name)?;
        }
        writeln!(writer, "    bin_write_u16(w->fp, child_count);")?;
        for child in &node.children {
            let field = &child.name;
            writeln!(writer, "    if (node->{field} != NULL) {{")?;
            writeln!(
                writer,
                "        bin_write_u32(w->fp, {}); // {field}",
                pool.name_index(field)
            )?;
            writeln!(
                writer,
                "        bin_write_u32(w->fp, bin_node_index(w, node->{field}, \"{field}\"));"
            )?;
            writeln!(writer, "    }}")?;
        }
        writeln!(writer)?;

        let always = node.attrs.iter().filter(|attr| !is_nullable(attr.r#type)).count();
        writeln!(writer, "    uint16_t attr_count = {always};")?;
        for attr in node.attrs.iter().filter(|attr| is_nullable(attr.r#type)) {
            writeln!(writer, "    if (node->{} != NULL) attr_count++;", attr.name)?;
        }
        writeln!(writer, "    bin_write_u16(w->fp, attr_count);")?;
        for attr in &node.attrs {
            let field = &attr.name;
            let tag = Tag::of(attr.r#type);
            let indent = match is_nullable(attr.r#type) {
                true => {
                    writeln!(writer, "    if (node->{field} != NULL) {{")?;
                    "        "
                }
                false => "    ",
            };
            writeln!(
                writer,
                "{indent}bin_write_u32(w->fp, {}); // {field}",
                pool.name_index(field)
            )?;
            writeln!(writer, "{indent}bin_write_u8(w->fp, AT_{});", tag.name())?;
            match attr.r#type {
                AttrType::Prim(prim) => {
                    writeln!(writer, "{indent}{};", write_prim(prim, &format!("node->{field}")))?;
                }
                AttrType::Link(_) => {
                    writeln!(
                        writer,
                        "{indent}bin_write_u32(w->fp, bin_node_index(w, node->{field}, \"{field}\"));"
                    )?;
                }
                AttrType::Enum(id) => {
                    writeln!(
                        writer,
                        "{indent}bin_write_u16(w->fp, {}); // {}",
                        id.0,
                        self.config[id].name
                    )?;
                    writeln!(writer, "{indent}bin_write_u16(w->fp, (uint16_t)node->{field});")?;
                }
            }
            if is_nullable(attr.r#type) {
                writeln!(writer, "    }}")?;
            }
        }

        if !node.children.is_empty() {
            writeln!(writer)?;
        }
        for child in &node.children {
            writeln!(
                writer,
                "    if (node->{field} != NULL) _binary_write_node_{}(w, node->{field});",
                self.type_name(child.r#type),
                field = child.name,
            )?;
        }
        writeln!(writer, "}}")
    }

    fn emit_binary_write_nodeset(
        &self,
        writer: &mut impl Write,
        nodeset: &Nodeset,
    ) -> io::Result<()> {
        let set = &nodeset.name;

        // The nodeset shares the index of its member
        writeln!(writer, "void _binary_index_{set}(BinWriter *w, struct {set} *node) {{")?;
        writeln!(writer, "    if (node == NULL) return;")?;
        writeln!(writer)?;
        writeln!(writer, "    bin_map_node(w, node, w->node_count);")?;
        self.emit_nodeset_switch(writer, nodeset, "node", |writer, member| {
            writeln!(writer, "        _binary_index_{member}(w, node->value.val_{member});")
        })?;
        writeln!(writer, "}}")?;
        writeln!(writer)?;

        writeln!(writer, "void _binary_strings_{set}(BinWriter *w, struct {set} *node) {{")?;
        writeln!(writer, "    if (node == NULL) return;")?;
        writeln!(writer)?;
        self.emit_nodeset_switch(writer, nodeset, "node", |writer, member| {
            writeln!(writer, "        _binary_strings_{member}(w, node->value.val_{member});")
        })?;
        writeln!(writer, "}}")?;
        writeln!(writer)?;

        writeln!(writer, "void _binary_write_node_{set}(BinWriter *w, struct {set} *node) {{")?;
        self.emit_nodeset_switch(writer, nodeset, "node", |writer, member| {
            writeln!(writer, "        _binary_write_node_{member}(w, node->value.val_{member});")
        })?;
        writeln!(writer, "}}")
    }

    /// `binary-serialization-<N>-read.c`: record checking and node building.
    /// Links are resolved once the whole tree has been built.
    pub fn emit_binary_read_source(
        &self,
        writer: &mut impl Write,
        r#type: NodeType,
    ) -> io::Result<()> {
        let name = self.type_name(r#type);
        writeln!(writer, "#include <limits.h>")?;
        writeln!(writer, "#include <string.h>")?;
        writeln!(writer, "#include \"lib/memory.h\"")?;
        writeln!(writer, "#include \"generated/serialization-{name}.h\"")?;
        self.emit_includes(writer, "serialization", self.child_type_names(r#type))?;
        writeln!(writer)?;

        writeln!(writer, "struct {name} *serialization_read_binary_{name}(FILE *fp) {{")?;
        writeln!(writer, "    BinReader *r = bin_reader_new(fp);")?;
        writeln!(writer, "    struct {name} *res = _binary_read_node_{name}(r, 0);")?;
        writeln!(writer, "    bin_resolve_links(r);")?;
        writeln!(writer, "    bin_reader_free(r);")?;
        writeln!(writer, "    return res;")?;
        writeln!(writer, "}}")?;
        writeln!(writer)?;

        match r#type {
            NodeType::Node(id) => self.emit_binary_read_node(writer, &self.config[id]),
            NodeType::Nodeset(id) => self.emit_binary_read_nodeset(writer, &self.config[id]),
        }
    }

    fn emit_binary_read_node(&self, writer: &mut impl Write, node: &Node) -> io::Result<()> {
        let pool = StringPool::new(self.config);
        let name = &node.name;
        let type_index = pool.node_index(self.node_id(node));

        writeln!(
            writer,
            "struct {name} *_binary_read_node_{name}(BinReader *r, uint32_t index) {{"
        )?;
        writeln!(writer, "    BinNode *record = bin_record(r, index);")?;
        writeln!(
            writer,
            "    if (record->type != {type_index}) bin_type_mismatch(r, \"{name}\", record->type);"
        )?;
        writeln!(writer)?;
        writeln!(writer, "    struct {name} *res = mem_alloc(sizeof(struct {name}));")?;
        writeln!(writer, "    memset(res, 0, sizeof(struct {name}));")?;
        writeln!(writer, "    bin_claim(r, index, res, NT_{name});")?;

        if !node.children.is_empty() {
            writeln!(writer)?;
            writeln!(writer, "    for (uint16_t i = 0; i < record->child_count; i++) {{")?;
            writeln!(writer, "        BinChild *child = &record->children[i];")?;
            writeln!(writer, "        switch (child->name) {{")?;
            for child in &node.children {
                writeln!(
                    writer,
                    "        case {}: // {}",
                    pool.name_index(&child.name),
                    child.name
                )?;
                writeln!(
                    writer,
                    "            res->{} = _binary_read_node_{}(r, child->node);",
                    child.name,
                    self.type_name(child.r#type),
                )?;
                writeln!(writer, "            break;")?;
            }
            writeln!(writer, "        default:")?;
            writeln!(writer, "            bin_invalid_child(r, \"{name}\", child->name);")?;
            writeln!(writer, "        }}")?;
            writeln!(writer, "    }}")?;
        } else {
            writeln!(
                writer,
                "    if (record->child_count > 0) bin_invalid_child(r, \"{name}\", record->children[0].name);"
            )?;
        }

        if !node.attrs.is_empty() {
            writeln!(writer)?;
            writeln!(writer, "    for (uint16_t i = 0; i < record->attr_count; i++) {{")?;
            writeln!(writer, "        BinAttr *attr = &record->attrs[i];")?;
            writeln!(writer, "        switch (attr->name) {{")?;
            for attr in &node.attrs {
                let field = &attr.name;
                writeln!(writer, "        case {}: // {field}", pool.name_index(field))?;
                match attr.r#type {
                    AttrType::Prim(prim) => {
                        writeln!(writer, "            res->{field} = {};", read_prim(prim))?;
                    }
                    AttrType::Link(target) => writeln!(
                        writer,
                        "            bin_expect_link(r, attr, (void **)&res->{field}, NT_{});",
                        self.config[target].name,
                    )?,
                    AttrType::Enum(id) => writeln!(
                        writer,
                        "            res->{field} = ({})bin_expect_enum(r, attr, {});",
                        self.config[id].name,
                        id.0,
                    )?,
                }
                writeln!(writer, "            break;")?;
            }
            writeln!(writer, "        default:")?;
            writeln!(writer, "            bin_invalid_attr(r, \"{name}\", attr->name);")?;
            writeln!(writer, "        }}")?;
            writeln!(writer, "    }}")?;
        } else {
            writeln!(
                writer,
                "    if (record->attr_count > 0) bin_invalid_attr(r, \"{name}\", record->attrs[0].name);"
            )?;
        }

        writeln!(writer, "    return res;")?;
        writeln!(writer, "}}")
    }

    fn emit_binary_read_nodeset(
        &self,
        writer: &mut impl Write,
        nodeset: &Nodeset,
    ) -> io::Result<()> {
        let pool = StringPool::new(self.config);
        let set = &nodeset.name;

        writeln!(writer, "struct {set} *_binary_read_node_{set}(BinReader *r, uint32_t index) {{")?;
        writeln!(writer, "    BinNode *record = bin_record(r, index);")?;
        writeln!(writer, "    struct {set} *res = mem_alloc(sizeof(struct {set}));")?;
        writeln!(writer)?;
        writeln!(writer, "    switch (record->type) {{")?;
        for member in &nodeset.nodes {
            let member_name = &self.config[*member].name;
            writeln!(writer, "    case {}: // {member_name}", pool.node_index(*member))?;
            writeln!(writer, "        res->type = NS_{set}_{member_name};")?;
            writeln!(
                writer,
                "        res->value.val_{member_name} = _binary_read_node_{member_name}(r, index);"
            )?;
            writeln!(writer, "        break;")?;
        }
        writeln!(writer, "    default:")?;
        writeln!(writer, "        bin_invalid_member(r, \"{set}\", record->type);")?;
        writeln!(writer, "    }}")?;
        writeln!(writer, "    return res;")?;
        writeln!(writer, "}}")
    }

    fn node_id(&self, node: &Node) -> crate::model::NodeId {
        match self.config.node_by_name(&node.name) {
            Some(id) => id,
            None => panic!("node `{}` is not part of the config", node.name),
        }
    }
}

/// Strings and links are the only attributes that can be absent.
fn is_nullable(r#type: AttrType) -> bool {
    matches!(r#type, AttrType::Prim(PrimType::String) | AttrType::Link(_))
}

/// A statement writing a primitive value.
fn write_prim(prim: PrimType, value: &str) -> String {
    match prim {
        PrimType::Int | PrimType::Int64 => {
            format!("bin_write_u64(w->fp, (uint64_t)(int64_t){value})")
        }
        PrimType::Int8 => format!("bin_write_u8(w->fp, (uint8_t){value})"),
        PrimType::Int16 => format!("bin_write_u16(w->fp, (uint16_t){value})"),
        PrimType::Int32 => format!("bin_write_u32(w->fp, (uint32_t){value})"),
        PrimType::UInt | PrimType::UInt64 => format!("bin_write_u64(w->fp, (uint64_t){value})"),
        PrimType::UInt8 => format!("bin_write_u8(w->fp, {value})"),
        PrimType::UInt16 => format!("bin_write_u16(w->fp, {value})"),
        PrimType::UInt32 => format!("bin_write_u32(w->fp, {value})"),
        PrimType::Float => format!("bin_write_f32(w->fp, {value})"),
        PrimType::Double => format!("bin_write_f64(w->fp, {value})"),
        PrimType::Bool => format!("bin_write_u8(w->fp, {value} ? 1 : 0)"),
        PrimType::String => format!("bin_write_u32(w->fp, bin_string_index(w, {value}))"),
    }
}

/// An expression reading a primitive value from `attr`, checking its tag
/// and its range.
fn read_prim(prim: PrimType) -> String {
    let tag = Tag::of(AttrType::Prim(prim)).name();
    let signed = |c_type: &str, min: &str, max: &str| {
        format!("({c_type})bin_expect_int(r, attr, AT_{tag}, {min}, {max})")
    };
    let unsigned = |c_type: &str, max: &str| {
        format!("({c_type})bin_expect_uint(r, attr, AT_{tag}, {max})")
    };

    match prim {
        PrimType::Int => signed("int", "INT_MIN", "INT_MAX"),
        PrimType::Int8 => signed("int8_t", "INT8_MIN", "INT8_MAX"),
        PrimType::Int16 => signed("int16_t", "INT16_MIN", "INT16_MAX"),
        PrimType::Int32 => signed("int32_t", "INT32_MIN", "INT32_MAX"),
        PrimType::Int64 => signed("int64_t", "INT64_MIN", "INT64_MAX"),
        PrimType::UInt => unsigned("unsigned int", "UINT_MAX"),
        PrimType::UInt8 => unsigned("uint8_t", "UINT8_MAX"),
        PrimType::UInt16 => unsigned("uint16_t", "UINT16_MAX"),
        PrimType::UInt32 => unsigned("uint32_t", "UINT32_MAX"),
        PrimType::UInt64 => unsigned("uint64_t", "UINT64_MAX"),
        PrimType::Float => format!("(float)bin_expect_float(r, attr, AT_{tag})"),
        PrimType::Double => format!("bin_expect_float(r, attr, AT_{tag})"),
        PrimType::Bool => "bin_expect_bool(r, attr)".to_owned(),
        PrimType::String => "bin_expect_string(r, attr)".to_owned(),
    }
}

const BINARY_UTIL_HEADER: &str = r#"
typedef struct BinEnum {
    uint32_t name;
    uint32_t prefix;
    uint16_t value_count;
    const uint32_t *values;
} BinEnum;

extern const char *const ast_static_strings[AST_STATIC_STRING_COUNT];
extern const BinEnum ast_static_enums[];
extern const char *const ast_node_type_names[NodeType_count];

typedef struct BinAttr {
    uint32_t name;
    AttrTag tag;
    union {
        int64_t val_int;
        uint64_t val_uint;
        double val_float;
        bool val_bool;
        uint32_t val_index;
        struct {
            uint16_t index;
            uint16_t value;
        } val_enum;
    } value;
} BinAttr;

typedef struct BinChild {
    uint32_t name;
    uint32_t node;
} BinChild;

typedef struct BinNode {
    uint32_t type;
    uint16_t child_count;
    BinChild *children;
    uint16_t attr_count;
    BinAttr *attrs;
} BinNode;

typedef struct BinLink {
    void **slot;
    uint32_t node;
    NodeType type;
    uint32_t attr;
} BinLink;

typedef struct BinWriter {
    FILE *fp;
    // Node (and nodeset) pointers to their pre-order index plus one
    imap_t *indices;
    uint32_t node_count;
    char **strings;
    uint32_t string_count;
    uint32_t string_capacity;
} BinWriter;

typedef struct BinReader {
    uint16_t string_count;
    char **strings;
    uint32_t node_count;
    BinNode *nodes;
    void **instances;
    NodeType *instance_types;
    BinLink *links;
    uint32_t link_count;
    uint32_t link_capacity;
} BinReader;

BinWriter *bin_writer_new(FILE *fp);
void bin_writer_free(BinWriter *w);
void bin_map_node(BinWriter *w, void *node, uint32_t index);
void bin_number_node(BinWriter *w, void *node);
uint32_t bin_node_index(BinWriter *w, void *node, const char *field);
void bin_add_string(BinWriter *w, const char *string);
uint32_t bin_string_index(BinWriter *w, const char *string);
void bin_write_header(BinWriter *w);
void bin_write_u8(FILE *fp, uint8_t value);
void bin_write_u16(FILE *fp, uint16_t value);
void bin_write_u32(FILE *fp, uint32_t value);
void bin_write_u64(FILE *fp, uint64_t value);
void bin_write_f32(FILE *fp, float value);
void bin_write_f64(FILE *fp, double value);

BinReader *bin_reader_new(FILE *fp);
void bin_reader_free(BinReader *r);
const char *bin_string(BinReader *r, uint32_t index);
BinNode *bin_record(BinReader *r, uint32_t index);
void bin_claim(BinReader *r, uint32_t index, void *node, NodeType type);
void bin_type_mismatch(BinReader *r, const char *expected, uint32_t found);
void bin_invalid_member(BinReader *r, const char *nodeset, uint32_t found);
void bin_invalid_child(BinReader *r, const char *node, uint32_t name);
void bin_invalid_attr(BinReader *r, const char *node, uint32_t name);
int64_t bin_expect_int(BinReader *r, BinAttr *attr, AttrTag tag, int64_t min, int64_t max);
uint64_t bin_expect_uint(BinReader *r, BinAttr *attr, AttrTag tag, uint64_t max);
double bin_expect_float(BinReader *r, BinAttr *attr, AttrTag tag);
bool bin_expect_bool(BinReader *r, BinAttr *attr);
char *bin_expect_string(BinReader *r, BinAttr *attr);
void bin_expect_link(BinReader *r, BinAttr *attr, void **slot, NodeType type);
uint16_t bin_expect_enum(BinReader *r, BinAttr *attr, uint16_t index);
void bin_resolve_links(BinReader *r);
"#;

const BINARY_UTIL_SOURCE: &str = r#"
static void bin_error(const char *format, ...) {
    va_list args;
    va_start(args, format);
    fprintf(stderr, "error: binary AST file: ");
    vfprintf(stderr, format, args);
    fprintf(stderr, "\n");
    va_end(args);
    exit(EXIT_FAILURE);
}

static void *bin_grow(void *array, uint32_t *capacity, size_t size) {
    *capacity = *capacity == 0 ? 16 : *capacity * 2;
    void *res = realloc(array, *capacity * size);
    if (res == NULL) bin_error("out of memory");
    return res;
}

BinWriter *bin_writer_new(FILE *fp) {
    BinWriter *w = mem_alloc(sizeof(BinWriter));
    w->fp = fp;
    w->indices = imap_init(64);
    w->node_count = 0;
    w->strings = NULL;
    w->string_count = 0;
    w->string_capacity = 0;
    return w;
}

void bin_writer_free(BinWriter *w) {
    imap_free(w->indices);
    free(w->strings);
    mem_free(w);
}

void bin_map_node(BinWriter *w, void *node, uint32_t index) {
    imap_insert(w->indices, node, (void *)((uintptr_t)index + 1));
}

void bin_number_node(BinWriter *w, void *node) {
    bin_map_node(w, node, w->node_count);
    w->node_count++;
}

uint32_t bin_node_index(BinWriter *w, void *node, const char *field) {
    uintptr_t index = (uintptr_t)imap_retrieve(w->indices, node);
    if (index == 0) bin_error("link `%s` leaves the tree", field);
    return (uint32_t)(index - 1);
}

void bin_add_string(BinWriter *w, const char *string) {
    for (uint32_t i = 0; i < w->string_count; i++) {
        if (strcmp(w->strings[i], string) == 0) return;
    }
    if (w->string_count == w->string_capacity) {
        w->strings = bin_grow(w->strings, &w->string_capacity, sizeof(char *));
    }
    // Borrowed from the tree, which outlives the writer
    w->strings[w->string_count++] = (char *)string;
}

uint32_t bin_string_index(BinWriter *w, const char *string) {
    for (uint32_t i = 0; i < w->string_count; i++) {
        if (strcmp(w->strings[i], string) == 0) return AST_STATIC_STRING_COUNT + i;
    }
    bin_error("string \"%s\" is missing from the string pool", string);
    return 0;
}

static void bin_write_string(FILE *fp, const char *string) {
    size_t len = strlen(string);
    if (len > UINT16_MAX) bin_error("string too large to encode");
    bin_write_u16(fp, (uint16_t)len);
    fwrite(string, 1, len, fp);
}

void bin_write_header(BinWriter *w) {
    bin_write_u32(w->fp, AST_MAGIC);
    bin_write_u32(w->fp, AST_DEFINITION_MAGIC);

    uint32_t string_count = AST_STATIC_STRING_COUNT + w->string_count;
    if (string_count > UINT16_MAX) bin_error("string pool too large to encode");
    bin_write_u16(w->fp, (uint16_t)string_count);
    for (uint32_t i = 0; i < AST_STATIC_STRING_COUNT; i++) {
        bin_write_string(w->fp, ast_static_strings[i]);
    }
    for (uint32_t i = 0; i < w->string_count; i++) {
        bin_write_string(w->fp, w->strings[i]);
    }

    bin_write_u16(w->fp, AST_ENUM_COUNT);
    for (uint32_t i = 0; i < AST_ENUM_COUNT; i++) {
        const BinEnum *entry = &ast_static_enums[i];
        bin_write_u32(w->fp, entry->name);
        bin_write_u32(w->fp, entry->prefix);
        bin_write_u16(w->fp, entry->value_count);
        for (uint16_t j = 0; j < entry->value_count; j++) {
            bin_write_u32(w->fp, entry->values[j]);
        }
    }

    bin_write_u32(w->fp, w->node_count);
}

void bin_write_u8(FILE *fp, uint8_t value) {
    fputc(value, fp);
}

void bin_write_u16(FILE *fp, uint16_t value) {
    bin_write_u8(fp, (uint8_t)(value & 0xff));
    bin_write_u8(fp, (uint8_t)(value >> 8));
}

void bin_write_u32(FILE *fp, uint32_t value) {
    bin_write_u16(fp, (uint16_t)(value & 0xffff));
    bin_write_u16(fp, (uint16_t)(value >> 16));
}

void bin_write_u64(FILE *fp, uint64_t value) {
    bin_write_u32(fp, (uint32_t)(value & 0xffffffff));
    bin_write_u32(fp, (uint32_t)(value >> 32));
}

void bin_write_f32(FILE *fp, float value) {
    uint32_t bits;
    memcpy(&bits, &value, sizeof(bits));
    bin_write_u32(fp, bits);
}

void bin_write_f64(FILE *fp, double value) {
    uint64_t bits;
    memcpy(&bits, &value, sizeof(bits));
    bin_write_u64(fp, bits);
}

static uint8_t bin_read_u8(FILE *fp) {
    int c = fgetc(fp);
    if (c == EOF) bin_error("unexpected end of input");
    return (uint8_t)c;
}

static uint16_t bin_read_u16(FILE *fp) {
    uint16_t low = bin_read_u8(fp);
    return (uint16_t)(low | (bin_read_u8(fp) << 8));
}

static uint32_t bin_read_u32(FILE *fp) {
    uint32_t low = bin_read_u16(fp);
    return low | ((uint32_t)bin_read_u16(fp) << 16);
}

static uint64_t bin_read_u64(FILE *fp) {
    uint64_t low = bin_read_u32(fp);
    return low | ((uint64_t)bin_read_u32(fp) << 32);
}

static double bin_read_f32(FILE *fp) {
    uint32_t bits = bin_read_u32(fp);
    float value;
    memcpy(&value, &bits, sizeof(value));
    return value;
}

static double bin_read_f64(FILE *fp) {
    uint64_t bits = bin_read_u64(fp);
    double value;
    memcpy(&value, &bits, sizeof(value));
    return value;
}

static void *bin_alloc_array(size_t count, size_t size) {
    return count == 0 ? NULL : mem_alloc(count * size);
}

static void bin_read_record(FILE *fp, BinNode *record) {
    record->type = bin_read_u32(fp);

    record->child_count = bin_read_u16(fp);
    record->children = bin_alloc_array(record->child_count, sizeof(BinChild));
    for (uint16_t i = 0; i < record->child_count; i++) {
        record->children[i].name = bin_read_u32(fp);
        record->children[i].node = bin_read_u32(fp);
    }

    record->attr_count = bin_read_u16(fp);
    record->attrs = bin_alloc_array(record->attr_count, sizeof(BinAttr));
    for (uint16_t i = 0; i < record->attr_count; i++) {
        BinAttr *attr = &record->attrs[i];
        attr->name = bin_read_u32(fp);
        uint8_t tag = bin_read_u8(fp);
        attr->tag = (AttrTag)tag;
        switch (tag) {
        case AT_int:
        case AT_int64:
            attr->value.val_int = (int64_t)bin_read_u64(fp);
            break;
        case AT_int8:
            attr->value.val_int = (int8_t)bin_read_u8(fp);
            break;
        case AT_int16:
            attr->value.val_int = (int16_t)bin_read_u16(fp);
            break;
        case AT_int32:
            attr->value.val_int = (int32_t)bin_read_u32(fp);
            break;
        case AT_uint:
        case AT_uint64:
            attr->value.val_uint = bin_read_u64(fp);
            break;
        case AT_uint8:
            attr->value.val_uint = bin_read_u8(fp);
            break;
        case AT_uint16:
            attr->value.val_uint = bin_read_u16(fp);
            break;
        case AT_uint32:
            attr->value.val_uint = bin_read_u32(fp);
            break;
        case AT_float:
            attr->value.val_float = bin_read_f32(fp);
            break;
        case AT_double:
            attr->value.val_float = bin_read_f64(fp);
            break;
        case AT_bool:
            attr->value.val_bool = bin_read_u8(fp) != 0;
            break;
        case AT_string:
        case AT_link:
            attr->value.val_index = bin_read_u32(fp);
            break;
        case AT_enum:
            attr->value.val_enum.index = bin_read_u16(fp);
            attr->value.val_enum.value = bin_read_u16(fp);
            break;
        default:
            // The size of the value is unknown, so the rest of the file
            // cannot be read
            bin_error("invalid type tag %u for attribute #%u", tag, attr->name);
        }
    }
}

BinReader *bin_reader_new(FILE *fp) {
    uint32_t magic = bin_read_u32(fp);
    if (magic != AST_MAGIC) bin_error("bad magic 0x%08x", magic);
    uint32_t definition = bin_read_u32(fp);
    if (definition != AST_DEFINITION_MAGIC) {
        bin_error("file was written for a different AST definition (expected 0x%08x, found 0x%08x)",
                  AST_DEFINITION_MAGIC, definition);
    }

    BinReader *r = mem_alloc(sizeof(BinReader));
    r->string_count = bin_read_u16(fp);
    if (r->string_count < AST_STATIC_STRING_COUNT) bin_error("string pool does not match the AST definition");
    r->strings = mem_alloc(r->string_count * sizeof(char *));
    for (uint16_t i = 0; i < r->string_count; i++) {
        uint16_t len = bin_read_u16(fp);
        char *string = mem_alloc(len + 1);
        if (len > 0 && fread(string, 1, len, fp) != len) bin_error("unexpected end of input");
        string[len] = '\0';
        r->strings[i] = string;
        if (i < AST_STATIC_STRING_COUNT && strcmp(string, ast_static_strings[i]) != 0) {
            bin_error("string pool does not match the AST definition");
        }
    }

    uint16_t enum_count = bin_read_u16(fp);
    if (enum_count != AST_ENUM_COUNT) bin_error("enum pool does not match the AST definition");
    for (uint16_t i = 0; i < enum_count; i++) {
        const BinEnum *entry = &ast_static_enums[i];
        uint32_t name = bin_read_u32(fp);
        uint32_t prefix = bin_read_u32(fp);
        uint16_t value_count = bin_read_u16(fp);
        bool matches = name == entry->name && prefix == entry->prefix && value_count == entry->value_count;
        for (uint16_t j = 0; j < value_count; j++) {
            uint32_t value = bin_read_u32(fp);
            matches = matches && value == entry->values[j];
        }
        if (!matches) bin_error("enum pool does not match the AST definition");
    }

    r->node_count = bin_read_u32(fp);
    if (r->node_count == 0) bin_error("file contains no nodes");
    r->nodes = mem_alloc(r->node_count * sizeof(BinNode));
    r->instances = mem_alloc(r->node_count * sizeof(void *));
    r->instance_types = mem_alloc(r->node_count * sizeof(NodeType));
    for (uint32_t i = 0; i < r->node_count; i++) {
        bin_read_record(fp, &r->nodes[i]);
        r->instances[i] = NULL;
    }

    r->links = NULL;
    r->link_count = 0;
    r->link_capacity = 0;
    return r;
}

void bin_reader_free(BinReader *r) {
    for (uint16_t i = 0; i < r->string_count; i++) {
        mem_free(r->strings[i]);
    }
    for (uint32_t i = 0; i < r->node_count; i++) {
        mem_free(r->nodes[i].children);
        mem_free(r->nodes[i].attrs);
    }
    mem_free(r->strings);
    mem_free(r->nodes);
    mem_free(r->instances);
    mem_free(r->instance_types);
    free(r->links);
    mem_free(r);
}

const char *bin_string(BinReader *r, uint32_t index) {
    if (index >= r->string_count) bin_error("string index %u is out of range", index);
    return r->strings[index];
}

BinNode *bin_record(BinReader *r, uint32_t index) {
    if (index >= r->node_count) bin_error("node index %u is out of range", index);
    if (r->instances[index] != NULL) bin_error("node %u is the child of more than one node", index);
    return &r->nodes[index];
}

void bin_claim(BinReader *r, uint32_t index, void *node, NodeType type) {
    r->instances[index] = node;
    r->instance_types[index] = type;
}

void bin_type_mismatch(BinReader *r, const char *expected, uint32_t found) {
    bin_error("expected node type `%s`, found `%s`", expected, bin_string(r, found));
}

void bin_invalid_member(BinReader *r, const char *nodeset, uint32_t found) {
    bin_error("`%s` is not a member of nodeset `%s`", bin_string(r, found), nodeset);
}

void bin_invalid_child(BinReader *r, const char *node, uint32_t name) {
    bin_error("node `%s` has no child named `%s`", node, bin_string(r, name));
}

void bin_invalid_attr(BinReader *r, const char *node, uint32_t name) {
    bin_error("node `%s` has no attribute named `%s`", node, bin_string(r, name));
}

static void bin_expect_tag(BinReader *r, BinAttr *attr, AttrTag tag) {
    if (attr->tag != tag) {
        bin_error("invalid type tag %u for attribute `%s`", (unsigned)attr->tag, bin_string(r, attr->name));
    }
}

int64_t bin_expect_int(BinReader *r, BinAttr *attr, AttrTag tag, int64_t min, int64_t max) {
    bin_expect_tag(r, attr, tag);
    if (attr->value.val_int < min || attr->value.val_int > max) {
        bin_error("value of attribute `%s` is out of range", bin_string(r, attr->name));
    }
    return attr->value.val_int;
}

uint64_t bin_expect_uint(BinReader *r, BinAttr *attr, AttrTag tag, uint64_t max) {
    bin_expect_tag(r, attr, tag);
    if (attr->value.val_uint > max) {
        bin_error("value of attribute `%s` is out of range", bin_string(r, attr->name));
    }
    return attr->value.val_uint;
}

double bin_expect_float(BinReader *r, BinAttr *attr, AttrTag tag) {
    bin_expect_tag(r, attr, tag);
    return attr->value.val_float;
}

bool bin_expect_bool(BinReader *r, BinAttr *attr) {
    bin_expect_tag(r, attr, AT_bool);
    return attr->value.val_bool;
}

char *bin_expect_string(BinReader *r, BinAttr *attr) {
    bin_expect_tag(r, attr, AT_string);
    return mem_strdup(bin_string(r, attr->value.val_index));
}

void bin_expect_link(BinReader *r, BinAttr *attr, void **slot, NodeType type) {
    bin_expect_tag(r, attr, AT_link);
    if (r->link_count == r->link_capacity) {
        r->links = bin_grow(r->links, &r->link_capacity, sizeof(BinLink));
    }
    BinLink *link = &r->links[r->link_count++];
    link->slot = slot;
    link->node = attr->value.val_index;
    link->type = type;
    link->attr = attr->name;
}

uint16_t bin_expect_enum(BinReader *r, BinAttr *attr, uint16_t index) {
    bin_expect_tag(r, attr, AT_enum);
    const BinEnum *expected = &ast_static_enums[index];
    uint16_t found = attr->value.val_enum.index;
    if (found >= AST_ENUM_COUNT) bin_error("enum index %u is out of range", found);
    if (found != index) {
        bin_error("attribute `%s` expects enum `%s`, found `%s`", bin_string(r, attr->name),
                  bin_string(r, expected->name), bin_string(r, ast_static_enums[found].name));
    }
    if (attr->value.val_enum.value >= expected->value_count) {
        bin_error("enum `%s` has no value %u", bin_string(r, expected->name), attr->value.val_enum.value);
    }
    return attr->value.val_enum.value;
}

void bin_resolve_links(BinReader *r) {
    for (uint32_t i = 0; i < r->link_count; i++) {
        BinLink *link = &r->links[i];
        if (link->node >= r->node_count) bin_error("node index %u is out of range", link->node);
        void *target = r->instances[link->node];
        if (target == NULL || r->instance_types[link->node] != link->type) {
            const char *found = target == NULL ? "detached node" : ast_node_type_names[r->instance_types[link->node]];
            bin_error("link `%s` expects a `%s`, found a `%s`", bin_string(r, link->attr),
                      ast_node_type_names[link->type], found);
        }
        *link->slot = target;
    }
}
"#;

#[cfg(test)]
mod tests {
    use crate::codegen::tests::{render, CALC};
    use crate::model::{NodeType, NodesetId};
    use crate::runtime::binary::StringPool;

    #[test]
    fn static_pool_matches_the_runtime() {
        let output = render(CALC, |context, writer| context.emit_binary_util_source(writer));
        let config = crate::check::tests::check_ok(CALC);
        let pool = StringPool::new(&config);

        for (index, string) in pool.strings().iter().enumerate() {
            assert!(output.contains(&format!("    \"{string}\", // {index}\n")), "{string}");
        }
        assert!(output.contains("const BinEnum ast_static_enums[AST_ENUM_COUNT] = {\n"));
        assert!(output.contains(
            "const char *const ast_node_type_names[NodeType_count] = {\n    \"Program\",\n"
        ));
    }

    #[test]
    fn util_header_constants() {
        let output = render(CALC, |context, writer| context.emit_binary_util_header(writer));
        assert!(output.contains("#define AST_MAGIC 0x00545341u\n"));
        assert!(output.contains("#define AST_ENUM_COUNT 1\n"));
        assert!(output.contains("    AT_int = 0,\n"));
        assert!(output.contains("    AT_enum = 15,\n} AttrTag;\n"));
    }

    #[test]
    fn configs_without_enums() {
        let output = render(
            "root node Program;\npass Noop;\nroot phase Main { passes { Noop } };\n",
            |context, writer| context.emit_binary_util_source(writer),
        );
        assert!(output.contains("const BinEnum ast_static_enums[1] = { { 0, 0, 0, NULL } };\n"));
    }

    #[test]
    fn node_writer() {
        let output = render(CALC, |context, writer| {
            let assign = context.config().node_by_name("Assign").unwrap();
            context.emit_binary_write_source(writer, NodeType::Node(assign))
        });

        assert!(output.contains(
            "    if (node->target != NULL) bin_add_string(w, node->target);\n"
        ));
        assert!(output.contains("    if (node->value != NULL) child_count++;\n"));
        assert!(output.contains(
            "    uint16_t attr_count = 0;\n    if (node->target != NULL) attr_count++;\n"
        ));
        assert!(output.contains(
            "        bin_write_u32(w->fp, bin_node_index(w, node->binding, \"binding\"));\n"
        ));
        assert!(output.contains(
            "    if (node->next != NULL) _binary_write_node_Stmts(w, node->next);\n"
        ));
    }

    #[test]
    fn enum_and_int_attributes() {
        let write = render(CALC, |context, writer| {
            let binop = context.config().node_by_name("BinOp").unwrap();
            context.emit_binary_write_source(writer, NodeType::Node(binop))
        });
        assert!(write.contains(
            "    bin_write_u8(w->fp, AT_enum);\n    bin_write_u16(w->fp, 0); // BinOpKind\n"
        ));

        let read = render(CALC, |context, writer| {
            let num = context.config().node_by_name("Num").unwrap();
            context.emit_binary_read_source(writer, NodeType::Node(num))
        });
        assert!(read.contains(
            "            res->value = (int)bin_expect_int(r, attr, AT_int, INT_MIN, INT_MAX);\n"
        ));
        assert!(read.contains(
            "    if (record->child_count > 0) bin_invalid_child(r, \"Num\", record->children[0].name);\n"
        ));
    }

    #[test]
    fn nodeset_reader() {
        let output = render(CALC, |context, writer| {
            context.emit_binary_read_source(writer, NodeType::Nodeset(NodesetId(1)))
        });
        assert!(output.contains(
            "        res->type = NS_Expr_Num;\n        res->value.val_Num = _binary_read_node_Num(r, index);\n"
        ));
        assert!(output.contains("        bin_invalid_member(r, \"Expr\", record->type);\n"));
    }

    #[test]
    fn links_are_deferred() {
        let output = render(CALC, |context, writer| {
            let assign = context.config().node_by_name("Assign").unwrap();
            context.emit_binary_read_source(writer, NodeType::Node(assign))
        });
        assert!(output.contains(
            "            bin_expect_link(r, attr, (void **)&res->binding, NT_Var);\n"
        ));
        assert!(output.contains("            res->target = bin_expect_string(r, attr);\n"));
    }
}
