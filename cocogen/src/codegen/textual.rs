//! The textual tree codec.
//!
//! Parsing the file into a flat list of nodes is left to the support
//! library (`txt_parse`); the generated code checks ids and references and
//! rebuilds the typed tree.

use std::io::{self, Write};

use crate::codegen::Context;
use crate::model::{AttrType, Enum, Node, NodeType, Nodeset, PrimType};

impl Context<'_> {
    /// `textual-serialization-util.h`
    pub fn emit_textual_util_header(&self, writer: &mut impl Write) -> io::Result<()> {
        writeln!(writer, "#pragma once")?;
        writeln!(writer, "#include <stdbool.h>")?;
        writeln!(writer, "#include <stdint.h>")?;
        writeln!(writer, "#include <stdio.h>")?;
        writeln!(writer, "#include \"lib/imap.h\"")?;
        writeln!(writer, "#include \"generated/enum.h\"")?;
        writeln!(writer)?;
        for r#enum in &self.config.enums {
            let name = &r#enum.name;
            writeln!(writer, "const char *{name}_to_string({name} value);")?;
            writeln!(writer, "bool {name}_from_string(const char *string, {name} *value);")?;
        }
        writer.write_all(TEXTUAL_UTIL_HEADER.as_bytes())
    }

    /// `textual-serialization-util.c`
    pub fn emit_textual_util_source(&self, writer: &mut impl Write) -> io::Result<()> {
        writeln!(writer, "#include <math.h>")?;
        writeln!(writer, "#include <stdarg.h>")?;
        writeln!(writer, "#include <stdlib.h>")?;
        writeln!(writer, "#include <string.h>")?;
        writeln!(writer, "#include \"lib/memory.h\"")?;
        writeln!(writer, "#include \"generated/binary-serialization-util.h\"")?;
        writeln!(writer, "#include \"generated/textual-serialization-util.h\"")?;
        for r#enum in &self.config.enums {
            writeln!(writer)?;
            self.emit_enum_strings(writer, r#enum)?;
        }
        writer.write_all(TEXTUAL_UTIL_SOURCE.as_bytes())
    }

    fn emit_enum_strings(&self, writer: &mut impl Write, r#enum: &Enum) -> io::Result<()> {
        let name = &r#enum.name;
        let prefix = &r#enum.prefix;

        writeln!(writer, "const char *{name}_to_string({name} value) {{")?;
        writeln!(writer, "    switch (value) {{")?;
        for value in &r#enum.values {
            writeln!(writer, "    case {prefix}_{value}:")?;
            writeln!(writer, "        return \"{value}\";")?;
        }
        writeln!(writer, "    default:")?;
        writeln!(writer, "        return NULL;")?;
        writeln!(writer, "    }}")?;
        writeln!(writer, "}}")?;
        writeln!(writer)?;

        writeln!(writer, "bool {name}_from_string(const char *string, {name} *value) {{")?;
        for value in &r#enum.values {
            writeln!(writer, "    if (strcmp(string, \"{value}\") == 0) {{")?;
            writeln!(writer, "        *value = {prefix}_{value};")?;
            writeln!(writer, "        return true;")?;
            writeln!(writer, "    }}")?;
        }
        writeln!(writer, "    return false;")?;
        writeln!(writer, "}}")
    }

    /// `textual-serialization-<N>-write.c`
    pub fn emit_textual_write_source(
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
            "void serialization_write_textual_{name}(FILE *fp, struct {name} *node) {{"
        )?;
        writeln!(writer, "    TxtWriter *w = txt_writer_new(fp);")?;
        writeln!(writer, "    _textual_index_{name}(w, node);")?;
        writeln!(writer, "    _textual_write_node_{name}(w, node);")?;
        writeln!(writer, "    txt_writer_free(w);")?;
        writeln!(writer, "}}")?;
        writeln!(writer)?;

        match r#type {
            NodeType::Node(id) => self.emit_textual_write_node(writer, &self.config[id]),
            NodeType::Nodeset(id) => self.emit_textual_write_nodeset(writer, &self.config[id]),
        }
    }

    fn emit_textual_write_node(&self, writer: &mut impl Write, node: &Node) -> io::Result<()> {
        let name = &node.name;

        writeln!(writer, "void _textual_index_{name}(TxtWriter *w, struct {name} *node) {{")?;
        writeln!(writer, "    if (node == NULL) return;")?;
        writeln!(writer)?;
        writeln!(writer, "    txt_number_node(w, node);")?;
        for child in &node.children {
            writeln!(
                writer,
                "    _textual_index_{}(w, node->{});",
                self.type_name(child.r#type),
                child.name
            )?;
        }
        writeln!(writer, "}}")?;
        writeln!(writer)?;

        writeln!(writer, "void _textual_write_node_{name}(TxtWriter *w, struct {name} *node) {{")?;
        writeln!(writer, "    txt_begin_node(w, node, \"{name}\");")?;
        writeln!(writer, "    int child_count = 0;")?;
        for child in &node.children {
            writeln!(writer, "    if (node->{} != NULL) child_count++;", child.name)?;
        }
        let always = node.attrs.iter().filter(|attr| !is_nullable(attr.r#type)).count();
        writeln!(writer, "    int attr_count = {always};")?;
        for attr in node.attrs.iter().filter(|attr| is_nullable(attr.r#type)) {
            writeln!(writer, "    if (node->{} != NULL) attr_count++;", attr.name)?;
        }
        writeln!(writer)?;
        writeln!(writer, "    if (child_count == 0 && attr_count == 0) {{")?;
        writeln!(writer, "        fprintf(w->fp, \";\\n\");")?;
        writeln!(writer, "    }} else {{")?;
        writeln!(writer, "        fprintf(w->fp, \" {{\\n\");")?;

        if !node.children.is_empty() {
            writeln!(writer, "        if (child_count > 0) {{")?;
            writeln!(writer, "            txt_begin_section(w, \"children\");")?;
            for child in &node.children {
                let field = &child.name;
                writeln!(writer, "            if (node->{field} != NULL) {{")?;
                writeln!(writer, "                txt_field(w, \"{field}\");")?;
                writeln!(writer, "                txt_write_ref(w, node->{field}, \"{field}\");")?;
                writeln!(writer, "            }}")?;
            }
            writeln!(writer, "            txt_end_section(w, attr_count > 0);")?;
            writeln!(writer, "        }}")?;
        }

        if !node.attrs.is_empty() {
            writeln!(writer, "        if (attr_count > 0) {{")?;
            writeln!(writer, "            txt_begin_section(w, \"attributes\");")?;
            for attr in &node.attrs {
                let field = &attr.name;
                let indent = match is_nullable(attr.r#type) {
                    true => {
                        writeln!(writer, "            if (node->{field} != NULL) {{")?;
                        "                "
                    }
                    false => "            ",
                };
                writeln!(writer, "{indent}txt_field(w, \"{field}\");")?;
                let value = format!("node->{field}");
                let statement = match attr.r#type {
                    AttrType::Prim(prim) => write_prim(prim, &value),
                    AttrType::Link(_) => format!("txt_write_ref(w, {value}, \"{field}\")"),
                    AttrType::Enum(id) => {
                        format!(
                            "fprintf(w->fp, \"%s\", {}_to_string({value}))",
                            self.config[id].name
                        )
                    }
                };
                writeln!(writer, "{indent}{statement};")?;
                if is_nullable(attr.r#type) {
                    writeln!(writer, "            }}")?;
                }
            }
            writeln!(writer, "            txt_end_section(w, false);")?;
            writeln!(writer, "        }}")?;
        }

        writeln!(writer, "        fprintf(w->fp, \"}};\\n\");")?;
        writeln!(writer, "    }}")?;
        for child in &node.children {
            writeln!(
                writer,
                "    if (node->{field} != NULL) _textual_write_node_{}(w, node->{field});",
                self.type_name(child.r#type),
                field = child.name,
            )?;
        }
        writeln!(writer, "}}")
    }

    fn emit_textual_write_nodeset(
        &self,
        writer: &mut impl Write,
        nodeset: &Nodeset,
    ) -> io::Result<()> {
        let set = &nodeset.name;

        writeln!(writer, "void _textual_index_{set}(TxtWriter *w, struct {set} *node) {{")?;
        writeln!(writer, "    if (node == NULL) return;")?;
        writeln!(writer)?;
        writeln!(writer, "    txt_map_node(w, node, w->next_id);")?;
        self.emit_nodeset_switch(writer, nodeset, "node", |writer, member| {
            writeln!(writer, "        _textual_index_{member}(w, node->value.val_{member});")
        })?;
        writeln!(writer, "}}")?;
        writeln!(writer)?;

        writeln!(writer, "void _textual_write_node_{set}(TxtWriter *w, struct {set} *node) {{")?;
        self.emit_nodeset_switch(writer, nodeset, "node", |writer, member| {
            writeln!(writer, "        _textual_write_node_{member}(w, node->value.val_{member});")
        })?;
        writeln!(writer, "}}")
    }

    /// `textual-serialization-<N>-read.c`
    pub fn emit_textual_read_source(
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

        writeln!(writer, "struct {name} *serialization_read_textual_{name}(FILE *fp) {{")?;
        writeln!(writer, "    TxtReader *r = txt_reader_new(fp);")?;
        writeln!(writer, "    struct {name} *res = _textual_read_node_{name}(r, r->root);")?;
        writeln!(writer, "    txt_resolve_links(r);")?;
        writeln!(writer, "    txt_reader_free(r);")?;
        writeln!(writer, "    return res;")?;
        writeln!(writer, "}}")?;
        writeln!(writer)?;

        match r#type {
            NodeType::Node(id) => self.emit_textual_read_node(writer, &self.config[id]),
            NodeType::Nodeset(id) => self.emit_textual_read_nodeset(writer, &self.config[id]),
        }
    }

    fn emit_textual_read_node(&self, writer: &mut impl Write, node: &Node) -> io::Result<()> {
        let name = &node.name;

        writeln!(writer, "struct {name} *_textual_read_node_{name}(TxtReader *r, uint32_t id) {{")?;
        writeln!(writer, "    TxtNode *record = txt_record(r, id);")?;
        writeln!(
            writer,
            "    if (strcmp(record->type, \"{name}\") != 0) txt_type_mismatch(r, \"{name}\", record);"
        )?;
        writeln!(writer)?;
        writeln!(writer, "    struct {name} *res = mem_alloc(sizeof(struct {name}));")?;
        writeln!(writer, "    memset(res, 0, sizeof(struct {name}));")?;
        writeln!(writer, "    txt_claim(r, record, res, NT_{name});")?;
        writeln!(writer)?;

        writeln!(writer, "    for (uint32_t i = 0; i < record->child_count; i++) {{")?;
        writeln!(writer, "        TxtChild *child = &record->children[i];")?;
        for (index, child) in node.children.iter().enumerate() {
            let keyword = if index == 0 { "if" } else { "} else if" };
            writeln!(
                writer,
                "        {keyword} (strcmp(child->name, \"{}\") == 0) {{",
                child.name
            )?;
            writeln!(
                writer,
                "            res->{} = _textual_read_node_{}(r, child->target);",
                child.name,
                self.type_name(child.r#type),
            )?;
        }
        match node.children.is_empty() {
            true => writeln!(writer, "        txt_invalid_child(r, record, child);")?,
            false => {
                writeln!(writer, "        }} else {{")?;
                writeln!(writer, "            txt_invalid_child(r, record, child);")?;
                writeln!(writer, "        }}")?;
            }
        }
        writeln!(writer, "    }}")?;
        writeln!(writer)?;

        writeln!(writer, "    for (uint32_t i = 0; i < record->attr_count; i++) {{")?;
        writeln!(writer, "        TxtAttr *attr = &record->attrs[i];")?;
        for (index, attr) in node.attrs.iter().enumerate() {
            let field = &attr.name;
            let keyword = if index == 0 { "if" } else { "} else if" };
            writeln!(writer, "        {keyword} (strcmp(attr->name, \"{field}\") == 0) {{")?;
            match attr.r#type {
                AttrType::Prim(prim) => {
                    writeln!(writer, "            res->{field} = {};", read_prim(prim))?
                }
                AttrType::Link(target) => writeln!(
                    writer,
                    "            txt_expect_link(r, attr, (void **)&res->{field}, NT_{});",
                    self.config[target].name,
                )?,
                AttrType::Enum(id) => {
                    let enum_name = &self.config[id].name;
                    writeln!(
                        writer,
                        "            if (!{enum_name}_from_string(txt_expect_name(r, attr), &res->{field})) {{",
                    )?;
                    writeln!(
                        writer,
                        "                txt_unknown_enum_value(r, \"{enum_name}\", attr);"
                    )?;
                    writeln!(writer, "            }}")?;
                }
            }
        }
        match node.attrs.is_empty() {
            true => writeln!(writer, "        txt_invalid_attr(r, record, attr);")?,
            false => {
                writeln!(writer, "        }} else {{")?;
                writeln!(writer, "            txt_invalid_attr(r, record, attr);")?;
                writeln!(writer, "        }}")?;
            }
        }
        writeln!(writer, "    }}")?;
        writeln!(writer, "    return res;")?;
        writeln!(writer, "}}")
    }

    fn emit_textual_read_nodeset(
        &self,
        writer: &mut impl Write,
        nodeset: &Nodeset,
    ) -> io::Result<()> {
        let set = &nodeset.name;

        writeln!(writer, "struct {set} *_textual_read_node_{set}(TxtReader *r, uint32_t id) {{")?;
        writeln!(writer, "    TxtNode *record = txt_record(r, id);")?;
        writeln!(writer, "    struct {set} *res = mem_alloc(sizeof(struct {set}));")?;
        writeln!(writer)?;
        for (index, member) in nodeset.nodes.iter().enumerate() {
            let member = &self.config[*member].name;
            let keyword = if index == 0 { "if" } else { "} else if" };
            writeln!(writer, "    {keyword} (strcmp(record->type, \"{member}\") == 0) {{")?;
            writeln!(writer, "        res->type = NS_{set}_{member};")?;
            writeln!(
                writer,
                "        res->value.val_{member} = _textual_read_node_{member}(r, id);"
            )?;
        }
        writeln!(writer, "    }} else {{")?;
        writeln!(writer, "        txt_type_mismatch(r, \"{set}\", record);")?;
        writeln!(writer, "    }}")?;
        writeln!(writer, "    return res;")?;
        writeln!(writer, "}}")
    }
}

fn is_nullable(r#type: AttrType) -> bool {
    matches!(r#type, AttrType::Prim(PrimType::String) | AttrType::Link(_))
}

fn write_prim(prim: PrimType, value: &str) -> String {
    match prim {
        PrimType::Int | PrimType::Int8 | PrimType::Int16 | PrimType::Int32 | PrimType::Int64 => {
            format!("fprintf(w->fp, \"%lld\", (long long){value})")
        }
        PrimType::UInt
        | PrimType::UInt8
        | PrimType::UInt16
        | PrimType::UInt32
        | PrimType::UInt64 => {
            format!("fprintf(w->fp, \"%llu\", (unsigned long long){value})")
        }
        PrimType::Float | PrimType::Double => format!("txt_write_float(w, (double){value})"),
        PrimType::Bool => format!("fprintf(w->fp, \"%s\", {value} ? \"true\" : \"false\")"),
        PrimType::String => format!("txt_write_string(w, {value})"),
    }
}

fn read_prim(prim: PrimType) -> String {
    match prim {
        PrimType::Int => "(int)txt_expect_int(r, attr, INT_MIN, INT_MAX)".to_owned(),
        PrimType::Int8 => "(int8_t)txt_expect_int(r, attr, INT8_MIN, INT8_MAX)".to_owned(),
        PrimType::Int16 => "(int16_t)txt_expect_int(r, attr, INT16_MIN, INT16_MAX)".to_owned(),
        PrimType::Int32 => "(int32_t)txt_expect_int(r, attr, INT32_MIN, INT32_MAX)".to_owned(),
        PrimType::Int64 => "(int64_t)txt_expect_int(r, attr, INT64_MIN, INT64_MAX)".to_owned(),
        PrimType::UInt => "(unsigned int)txt_expect_uint(r, attr, UINT_MAX)".to_owned(),
        PrimType::UInt8 => "(uint8_t)txt_expect_uint(r, attr, UINT8_MAX)".to_owned(),
        PrimType::UInt16 => "(uint16_t)txt_expect_uint(r, attr, UINT16_MAX)".to_owned(),
        PrimType::UInt32 => "(uint32_t)txt_expect_uint(r, attr, UINT32_MAX)".to_owned(),
        PrimType::UInt64 => "(uint64_t)txt_expect_uint(r, attr, UINT64_MAX)".to_owned(),
        PrimType::Float => "(float)txt_expect_float(r, attr)".to_owned(),
        PrimType::Double => "txt_expect_float(r, attr)".to_owned(),
        PrimType::Bool => "txt_expect_bool(r, attr)".to_owned(),
        PrimType::String => "txt_expect_string(r, attr)".to_owned(),
    }
}

const TEXTUAL_UTIL_HEADER: &str = r#"
typedef enum { TV_int, TV_float, TV_bool, TV_string, TV_name, TV_ref } TxtValueKind;

typedef struct TxtValue {
    TxtValueKind kind;
    union {
        struct {
            bool negative;
            uint64_t magnitude;
        } val_int;
        double val_float;
        bool val_bool;
        // Strings and names
        char *val_string;
        uint32_t val_ref;
    } value;
} TxtValue;

typedef struct TxtChild {
    char *name;
    uint32_t target;
} TxtChild;

typedef struct TxtAttr {
    char *name;
    TxtValue value;
} TxtAttr;

typedef struct TxtNode {
    bool root;
    char *type;
    uint32_t id;
    uint32_t line;
    uint32_t child_count;
    TxtChild *children;
    uint32_t attr_count;
    TxtAttr *attrs;
} TxtNode;

typedef struct TxtFile {
    uint32_t node_count;
    TxtNode *nodes;
} TxtFile;

// Provided by the support library: NULL after reporting syntax errors
TxtFile *txt_parse(FILE *fp);
void txt_free(TxtFile *file);

typedef struct TxtWriter {
    FILE *fp;
    // Node (and nodeset) pointers to their id
    imap_t *ids;
    uint32_t next_id;
    uint32_t written;
    bool first_field;
} TxtWriter;

typedef struct TxtLink {
    void **slot;
    uint32_t id;
    NodeType type;
    const char *attr;
} TxtLink;

typedef struct TxtReader {
    TxtFile *file;
    // Node ids to their position in the file plus one
    imap_t *positions;
    void **instances;
    NodeType *instance_types;
    uint32_t root;
    TxtLink *links;
    uint32_t link_count;
    uint32_t link_capacity;
} TxtReader;

TxtWriter *txt_writer_new(FILE *fp);
void txt_writer_free(TxtWriter *w);
void txt_map_node(TxtWriter *w, void *node, uint32_t id);
void txt_number_node(TxtWriter *w, void *node);
void txt_begin_node(TxtWriter *w, void *node, const char *type);
void txt_begin_section(TxtWriter *w, const char *section);
void txt_end_section(TxtWriter *w, bool more);
void txt_field(TxtWriter *w, const char *name);
void txt_write_ref(TxtWriter *w, void *node, const char *field);
void txt_write_float(TxtWriter *w, double value);
void txt_write_string(TxtWriter *w, const char *string);

TxtReader *txt_reader_new(FILE *fp);
void txt_reader_free(TxtReader *r);
TxtNode *txt_record(TxtReader *r, uint32_t id);
void txt_claim(TxtReader *r, TxtNode *record, void *node, NodeType type);
void txt_type_mismatch(TxtReader *r, const char *expected, TxtNode *record);
void txt_invalid_child(TxtReader *r, TxtNode *record, TxtChild *child);
void txt_invalid_attr(TxtReader *r, TxtNode *record, TxtAttr *attr);
int64_t txt_expect_int(TxtReader *r, TxtAttr *attr, int64_t min, int64_t max);
uint64_t txt_expect_uint(TxtReader *r, TxtAttr *attr, uint64_t max);
double txt_expect_float(TxtReader *r, TxtAttr *attr);
bool txt_expect_bool(TxtReader *r, TxtAttr *attr);
char *txt_expect_string(TxtReader *r, TxtAttr *attr);
const char *txt_expect_name(TxtReader *r, TxtAttr *attr);
void txt_expect_link(TxtReader *r, TxtAttr *attr, void **slot, NodeType type);
void txt_unknown_enum_value(TxtReader *r, const char *enum_name, TxtAttr *attr);
void txt_resolve_links(TxtReader *r);
"#;

const TEXTUAL_UTIL_SOURCE: &str = r#"
static void txt_error(const char *format, ...) {
    va_list args;
    va_start(args, format);
    fprintf(stderr, "error: textual AST file: ");
    vfprintf(stderr, format, args);
    fprintf(stderr, "\n");
    va_end(args);
    exit(EXIT_FAILURE);
}

TxtWriter *txt_writer_new(FILE *fp) {
    TxtWriter *w = mem_alloc(sizeof(TxtWriter));
    w->fp = fp;
    w->ids = imap_init(64);
    w->next_id = 1;
    w->written = 0;
    w->first_field = true;
    return w;
}

void txt_writer_free(TxtWriter *w) {
    imap_free(w->ids);
    mem_free(w);
}

void txt_map_node(TxtWriter *w, void *node, uint32_t id) {
    imap_insert(w->ids, node, (void *)(uintptr_t)id);
}

void txt_number_node(TxtWriter *w, void *node) {
    txt_map_node(w, node, w->next_id);
    w->next_id++;
}

static uint32_t txt_node_id(TxtWriter *w, void *node, const char *field) {
    uintptr_t id = (uintptr_t)imap_retrieve(w->ids, node);
    if (id == 0) txt_error("link `%s` leaves the tree", field);
    return (uint32_t)id;
}

void txt_begin_node(TxtWriter *w, void *node, const char *type) {
    // The root is written first
    if (w->written == 0) {
        fprintf(w->fp, "root ");
    } else {
        fprintf(w->fp, "\n");
    }
    fprintf(w->fp, "%s %%%u", type, txt_node_id(w, node, type));
    w->written++;
}

void txt_begin_section(TxtWriter *w, const char *section) {
    fprintf(w->fp, "    %s {\n", section);
    w->first_field = true;
}

void txt_end_section(TxtWriter *w, bool more) {
    fprintf(w->fp, "\n    }%s\n", more ? "," : "");
}

void txt_field(TxtWriter *w, const char *name) {
    if (!w->first_field) fprintf(w->fp, ",\n");
    fprintf(w->fp, "        %s = ", name);
    w->first_field = false;
}

void txt_write_ref(TxtWriter *w, void *node, const char *field) {
    fprintf(w->fp, "%%%u", txt_node_id(w, node, field));
}

void txt_write_float(TxtWriter *w, double value) {
    if (isnan(value)) {
        fprintf(w->fp, "NaN");
        return;
    }
    if (isinf(value)) {
        fprintf(w->fp, value > 0 ? "inf" : "-inf");
        return;
    }

    // Shortest representation that reads back as the same value
    char buffer[32];
    for (int precision = 1; precision <= 17; precision++) {
        snprintf(buffer, sizeof(buffer), "%.*g", precision, value);
        if (strtod(buffer, NULL) == value) break;
    }
    if (strpbrk(buffer, ".e") == NULL) strcat(buffer, ".0");
    fprintf(w->fp, "%s", buffer);
}

void txt_write_string(TxtWriter *w, const char *string) {
    fputc('"', w->fp);
    for (const char *c = string; *c != '\0'; c++) {
        switch (*c) {
        case '"':
            fprintf(w->fp, "\\\"");
            break;
        case '\\':
            fprintf(w->fp, "\\\\");
            break;
        case '\n':
            fprintf(w->fp, "\\n");
            break;
        case '\t':
            fprintf(w->fp, "\\t");
            break;
        default:
            fputc(*c, w->fp);
        }
    }
    fputc('"', w->fp);
}

static uint32_t txt_position(TxtReader *r, uint32_t id) {
    return (uint32_t)(uintptr_t)imap_retrieve(r->positions, (void *)(uintptr_t)id);
}

// Report duplicate and missing ids and roots as errors, and nodes that are
// not part of the tree as warnings.
static void txt_check(TxtReader *r) {
    TxtFile *file = r->file;
    bool failed = false;
    bool has_root = false;

    for (uint32_t i = 0; i < file->node_count; i++) {
        TxtNode *node = &file->nodes[i];
        if (node->root) {
            if (has_root) {
                fprintf(stderr, "error: line %u: duplicate root declaration\n", node->line);
                failed = true;
            }
            has_root = true;
            r->root = node->id;
        }
        if (txt_position(r, node->id) != 0) {
            fprintf(stderr, "error: line %u: duplicate node id %%%u\n", node->line, node->id);
            failed = true;
        } else {
            imap_insert(r->positions, (void *)(uintptr_t)node->id, (void *)((uintptr_t)i + 1));
        }
    }

    uint32_t *uses = mem_alloc((file->node_count + 1) * sizeof(uint32_t));
    memset(uses, 0, (file->node_count + 1) * sizeof(uint32_t));
    for (uint32_t i = 0; i < file->node_count; i++) {
        TxtNode *node = &file->nodes[i];
        for (uint32_t j = 0; j < node->child_count; j++) {
            uint32_t position = txt_position(r, node->children[j].target);
            if (position == 0) {
                fprintf(stderr, "error: line %u: no node with id %%%u\n", node->line, node->children[j].target);
                failed = true;
            }
            uses[position]++;
        }
        for (uint32_t j = 0; j < node->attr_count; j++) {
            TxtValue *value = &node->attrs[j].value;
            if (value->kind == TV_ref && txt_position(r, value->value.val_ref) == 0) {
                fprintf(stderr, "error: line %u: no node with id %%%u\n", node->line, value->value.val_ref);
                failed = true;
            }
        }
    }

    if (!has_root) {
        fprintf(stderr, "error: missing root node\n");
        failed = true;
    }
    for (uint32_t i = 0; i < file->node_count; i++) {
        TxtNode *node = &file->nodes[i];
        if (!node->root && uses[i + 1] == 0) {
            fprintf(stderr, "warning: line %u: node %%%u is not used in the AST\n", node->line, node->id);
        }
    }
    mem_free(uses);
    if (failed) exit(EXIT_FAILURE);
}

TxtReader *txt_reader_new(FILE *fp) {
    TxtFile *file = txt_parse(fp);
    if (file == NULL) exit(EXIT_FAILURE);

    TxtReader *r = mem_alloc(sizeof(TxtReader));
    r->file = file;
    r->positions = imap_init(64);
    r->root = 0;
    txt_check(r);

    r->instances = mem_alloc((file->node_count + 1) * sizeof(void *));
    r->instance_types = mem_alloc((file->node_count + 1) * sizeof(NodeType));
    for (uint32_t i = 0; i < file->node_count; i++) {
        r->instances[i] = NULL;
    }
    r->links = NULL;
    r->link_count = 0;
    r->link_capacity = 0;
    return r;
}

void txt_reader_free(TxtReader *r) {
    txt_free(r->file);
    imap_free(r->positions);
    mem_free(r->instances);
    mem_free(r->instance_types);
    free(r->links);
    mem_free(r);
}

TxtNode *txt_record(TxtReader *r, uint32_t id) {
    uint32_t position = txt_position(r, id);
    if (position == 0) txt_error("no node with id %%%u", id);
    if (r->instances[position - 1] != NULL) txt_error("node %%%u is the child of more than one node", id);
    return &r->file->nodes[position - 1];
}

void txt_claim(TxtReader *r, TxtNode *record, void *node, NodeType type) {
    uint32_t position = (uint32_t)(record - r->file->nodes);
    r->instances[position] = node;
    r->instance_types[position] = type;
}

void txt_type_mismatch(TxtReader *r, const char *expected, TxtNode *record) {
    (void)r;
    txt_error("line %u: expected node type `%s`, found `%s`", record->line, expected, record->type);
}

void txt_invalid_child(TxtReader *r, TxtNode *record, TxtChild *child) {
    (void)r;
    txt_error("line %u: node `%s` has no child named `%s`", record->line, record->type, child->name);
}

void txt_invalid_attr(TxtReader *r, TxtNode *record, TxtAttr *attr) {
    (void)r;
    txt_error("line %u: node `%s` has no attribute named `%s`", record->line, record->type, attr->name);
}

static void txt_mismatched_value(TxtAttr *attr, const char *expected) {
    txt_error("attribute `%s` expects %s", attr->name, expected);
}

int64_t txt_expect_int(TxtReader *r, TxtAttr *attr, int64_t min, int64_t max) {
    (void)r;
    if (attr->value.kind != TV_int) txt_mismatched_value(attr, "an integer");
    uint64_t magnitude = attr->value.value.val_int.magnitude;
    if (attr->value.value.val_int.negative) {
        if (magnitude > (uint64_t)INT64_MAX + 1 || -(int64_t)(magnitude - 1) - 1 < min) {
            txt_error("value of attribute `%s` is out of range", attr->name);
        }
        return -(int64_t)(magnitude - 1) - 1;
    }
    if (magnitude > (uint64_t)max) txt_error("value of attribute `%s` is out of range", attr->name);
    return (int64_t)magnitude;
}

uint64_t txt_expect_uint(TxtReader *r, TxtAttr *attr, uint64_t max) {
    (void)r;
    if (attr->value.kind != TV_int) txt_mismatched_value(attr, "an unsigned integer");
    if (attr->value.value.val_int.negative || attr->value.value.val_int.magnitude > max) {
        txt_error("value of attribute `%s` is out of range", attr->name);
    }
    return attr->value.value.val_int.magnitude;
}

double txt_expect_float(TxtReader *r, TxtAttr *attr) {
    (void)r;
    if (attr->value.kind == TV_int) {
        double magnitude = (double)attr->value.value.val_int.magnitude;
        return attr->value.value.val_int.negative ? -magnitude : magnitude;
    }
    if (attr->value.kind != TV_float) txt_mismatched_value(attr, "a float");
    return attr->value.value.val_float;
}

bool txt_expect_bool(TxtReader *r, TxtAttr *attr) {
    (void)r;
    if (attr->value.kind != TV_bool) txt_mismatched_value(attr, "a boolean");
    return attr->value.value.val_bool;
}

char *txt_expect_string(TxtReader *r, TxtAttr *attr) {
    (void)r;
    if (attr->value.kind != TV_string) txt_mismatched_value(attr, "a string");
    return mem_strdup(attr->value.value.val_string);
}

const char *txt_expect_name(TxtReader *r, TxtAttr *attr) {
    (void)r;
    if (attr->value.kind != TV_name) txt_mismatched_value(attr, "an enum value");
    return attr->value.value.val_string;
}

void txt_expect_link(TxtReader *r, TxtAttr *attr, void **slot, NodeType type) {
    if (attr->value.kind != TV_ref) txt_mismatched_value(attr, "a node reference");
    if (r->link_count == r->link_capacity) {
        r->link_capacity = r->link_capacity == 0 ? 16 : r->link_capacity * 2;
        r->links = realloc(r->links, r->link_capacity * sizeof(TxtLink));
        if (r->links == NULL) txt_error("out of memory");
    }
    TxtLink *link = &r->links[r->link_count++];
    link->slot = slot;
    link->id = attr->value.value.val_ref;
    link->type = type;
    link->attr = attr->name;
}

void txt_unknown_enum_value(TxtReader *r, const char *enum_name, TxtAttr *attr) {
    (void)r;
    txt_error("enum `%s` has no value `%s`", enum_name, attr->value.value.val_string);
}

void txt_resolve_links(TxtReader *r) {
    for (uint32_t i = 0; i < r->link_count; i++) {
        TxtLink *link = &r->links[i];
        uint32_t position = txt_position(r, link->id) - 1;
        void *target = r->instances[position];
        if (target == NULL || r->instance_types[position] != link->type) {
            txt_error("link `%s` expects a `%s`, but node %%%u is not one in the AST", link->attr,
                      ast_node_type_names[link->type], link->id);
        }
        *link->slot = target;
    }
}
"#;

#[cfg(test)]
mod tests {
    use crate::codegen::tests::{render, CALC};
    use crate::model::{NodeType, NodesetId};

    #[test]
    fn enum_conversions() {
        let output = render(CALC, |context, writer| context.emit_textual_util_source(writer));
        assert!(output.contains(
            "const char *BinOpKind_to_string(BinOpKind value) {\n    switch (value) {\n    case BO_add:\n        return \"add\";\n"
        ));
        assert!(output.contains(
            "    if (strcmp(string, \"mul\") == 0) {\n        *value = BO_mul;\n        return true;\n    }\n    return false;\n}\n"
        ));

        let header = render(CALC, |context, writer| context.emit_textual_util_header(writer));
        assert!(header.contains(
            "bool BinOpKind_from_string(const char *string, BinOpKind *value);\n"
        ));
    }

    #[test]
    fn node_writer() {
        let output = render(CALC, |context, writer| {
            let assign = context.config().node_by_name("Assign").unwrap();
            context.emit_textual_write_source(writer, NodeType::Node(assign))
        });

        assert!(output.contains("    txt_begin_node(w, node, \"Assign\");\n"));
        assert!(output.contains("            txt_end_section(w, attr_count > 0);\n"));
        assert!(output.contains(
            "            if (node->target != NULL) {\n                txt_field(w, \"target\");\n                txt_write_string(w, node->target);\n            }\n"
        ));
        assert!(output.contains("                txt_write_ref(w, node->binding, \"binding\");\n"));
        assert!(output.contains(
            "    if (node->value != NULL) _textual_write_node_Expr(w, node->value);\n"
        ));
    }

    #[test]
    fn enum_attributes_use_value_names() {
        let write = render(CALC, |context, writer| {
            let binop = context.config().node_by_name("BinOp").unwrap();
            context.emit_textual_write_source(writer, NodeType::Node(binop))
        });
        assert!(write.contains(
            "            fprintf(w->fp, \"%s\", BinOpKind_to_string(node->op));\n"
        ));

        let read = render(CALC, |context, writer| {
            let binop = context.config().node_by_name("BinOp").unwrap();
            context.emit_textual_read_source(writer, NodeType::Node(binop))
        });
        assert!(read.contains(
            "            if (!BinOpKind_from_string(txt_expect_name(r, attr), &res->op)) {\n"
        ));
        assert!(read.contains("        } else if (strcmp(child->name, \"right\") == 0) {\n"));
    }

    #[test]
    fn leaf_reader_rejects_fields() {
        let output = render(CALC, |context, writer| {
            let num = context.config().node_by_name("Num").unwrap();
            context.emit_textual_read_source(writer, NodeType::Node(num))
        });
        assert!(output.contains(
            "        TxtChild *child = &record->children[i];\n        txt_invalid_child(r, record, child);\n"
        ));
        assert!(output.contains(
            "            res->value = (int)txt_expect_int(r, attr, INT_MIN, INT_MAX);\n"
        ));
    }

    #[test]
    fn nodeset_reader() {
        let output = render(CALC, |context, writer| {
            context.emit_textual_read_source(writer, NodeType::Nodeset(NodesetId(0)))
        });
        assert!(output.contains(
            "    if (strcmp(record->type, \"Assign\") == 0) {\n        res->type = NS_Stmts_Assign;\n"
        ));
        assert!(output.contains(
            "    } else {\n        txt_type_mismatch(r, \"Stmts\", record);\n    }\n"
        ));
    }
}
