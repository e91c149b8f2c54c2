//! The binary tree format.
//!
//! ```text
//! u32  magic      "AST\0"
//! u32  ast magic  prefix of the config digest
//! u16  string count, then { u16 len, bytes } per string
//! u16  enum count, then { u32 name, u32 prefix, u16 n, n × u32 value } per enum
//! u32  node count, then the node records in pre-order
//! ```
//!
//! The first part of the string pool is fixed by the config (see
//! [`StringPool`]), so that readers can check names by index. The values of
//! string attributes follow it.

use std::io::{self, Read, Write};

use fxhash::FxHashMap;

use crate::hash;
use crate::model::{AttrType, Config, NodeId, NodeType, NodesetId, PrimType};
use crate::runtime::{NodeRef, Tree, Value};

pub const MAGIC: u32 = 0x0054_5341;

/// Attribute type tags.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(u8)]
pub enum Tag {
    Int = 0,
    UInt = 1,
    Int8 = 2,
    Int16 = 3,
    Int32 = 4,
    Int64 = 5,
    UInt8 = 6,
    UInt16 = 7,
    UInt32 = 8,
    UInt64 = 9,
    Float = 10,
    Double = 11,
    Bool = 12,
    String = 13,
    Link = 14,
    Enum = 15,
}

impl Tag {
    pub const ALL: [Tag; 16] = [
        Tag::Int,
        Tag::UInt,
        Tag::Int8,
        Tag::Int16,
        Tag::Int32,
        Tag::Int64,
        Tag::UInt8,
        Tag::UInt16,
        Tag::UInt32,
        Tag::UInt64,
        Tag::Float,
        Tag::Double,
        Tag::Bool,
        Tag::String,
        Tag::Link,
        Tag::Enum,
    ];

    pub fn of(r#type: AttrType) -> Tag {
        match r#type {
            AttrType::Prim(prim) => match prim {
                PrimType::Int => Tag::Int,
                PrimType::UInt => Tag::UInt,
                PrimType::Int8 => Tag::Int8,
                PrimType::Int16 => Tag::Int16,
                PrimType::Int32 => Tag::Int32,
                PrimType::Int64 => Tag::Int64,
                PrimType::UInt8 => Tag::UInt8,
                PrimType::UInt16 => Tag::UInt16,
                PrimType::UInt32 => Tag::UInt32,
                PrimType::UInt64 => Tag::UInt64,
                PrimType::Float => Tag::Float,
                PrimType::Double => Tag::Double,
                PrimType::Bool => Tag::Bool,
                PrimType::String => Tag::String,
            },
            AttrType::Link(_) => Tag::Link,
            AttrType::Enum(_) => Tag::Enum,
        }
    }

    pub fn from_u8(tag: u8) -> Option<Tag> {
        Tag::ALL.get(usize::from(tag)).copied()
    }

    /// The name used for the tag in generated code.
    pub fn name(self) -> &'static str {
        match self {
            Tag::Int => "int",
            Tag::UInt => "uint",
            Tag::Int8 => "int8",
            Tag::Int16 => "int16",
            Tag::Int32 => "int32",
            Tag::Int64 => "int64",
            Tag::UInt8 => "uint8",
            Tag::UInt16 => "uint16",
            Tag::UInt32 => "uint32",
            Tag::UInt64 => "uint64",
            Tag::Float => "float",
            Tag::Double => "double",
            Tag::Bool => "bool",
            Tag::String => "string",
            Tag::Link => "link",
            Tag::Enum => "enum",
        }
    }

    /// The encoded size of a value.
    pub fn size(self) -> usize {
        match self {
            Tag::Int8 | Tag::UInt8 | Tag::Bool => 1,
            Tag::Int16 | Tag::UInt16 => 2,
            Tag::Int32 | Tag::UInt32 | Tag::Float => 4,
            Tag::Int | Tag::UInt | Tag::Int64 | Tag::UInt64 | Tag::Double => 8,
            Tag::String | Tag::Link | Tag::Enum => 4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumEntry {
    pub name: u32,
    pub prefix: u32,
    pub values: Vec<u32>,
}

/// The strings every file of a config starts with.
///
/// For each node its name then its child and attribute names, then the
/// nodeset names, then for each enum its name, its prefix and its values.
/// Entity names and prefixes are always appended; other names are only
/// appended the first time they are seen.
#[derive(Debug, Clone)]
pub struct StringPool {
    strings: Vec<String>,
    indices: FxHashMap<String, u32>,
    nodes: Vec<u32>,
    nodesets: Vec<u32>,
    enums: Vec<EnumEntry>,
}

impl StringPool {
    pub fn new(config: &Config) -> StringPool {
        let mut pool = StringPool {
            strings: Vec::new(),
            indices: FxHashMap::default(),
            nodes: Vec::new(),
            nodesets: Vec::new(),
            enums: Vec::new(),
        };

        for node in &config.nodes {
            let index = pool.push_always(&node.name);
            pool.nodes.push(index);
            for child in &node.children {
                pool.push_unique(&child.name);
            }
            for attr in &node.attrs {
                pool.push_unique(&attr.name);
            }
        }
        for nodeset in &config.nodesets {
            let index = pool.push_always(&nodeset.name);
            pool.nodesets.push(index);
        }
        for r#enum in &config.enums {
            let name = pool.push_always(&r#enum.name);
            let prefix = pool.push_always(&r#enum.prefix);
            let values = (r#enum.values.iter())
                .map(|value| pool.push_unique(value))
                .collect();
            pool.enums.push(EnumEntry {
                name,
                prefix,
                values,
            });
        }
        pool
    }

    fn push_always(&mut self, string: &str) -> u32 {
        let index = self.strings.len() as u32;
        self.strings.push(string.to_owned());
        self.indices.insert(string.to_owned(), index);
        index
    }

    fn push_unique(&mut self, string: &str) -> u32 {
        match self.indices.get(string) {
            Some(index) => *index,
            None => self.push_always(string),
        }
    }

    pub fn strings(&self) -> &[String] {
        &self.strings
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }

    pub fn node_index(&self, id: NodeId) -> u32 {
        self.nodes[id.0]
    }

    pub fn nodeset_index(&self, id: NodesetId) -> u32 {
        self.nodesets[id.0]
    }

    pub fn enums(&self) -> &[EnumEntry] {
        &self.enums
    }

    /// The index of a child or attribute name.
    pub fn name_index(&self, name: &str) -> u32 {
        match self.indices.get(name) {
            Some(index) => *index,
            None => panic!("`{name}` is missing from the string pool"),
        }
    }
}

/// Write the tree rooted at `root`.
pub fn write(tree: &Tree<'_>, root: NodeRef, writer: &mut impl Write) -> io::Result<()> {
    let config = tree.config();
    let pool = StringPool::new(config);
    let order = tree.preorder(root);
    let indices = (order.iter().enumerate())
        .map(|(index, node)| (*node, index as u32))
        .collect::<FxHashMap<_, _>>();

    // Only deduplicated within the dynamic segment.
    let mut dynamic = Vec::new();
    let mut dynamic_indices = FxHashMap::default();
    for node in &order {
        for value in tree.data(*node).attrs.iter().flatten() {
            if let Value::String(string) = value {
                dynamic_indices.entry(string.as_str()).or_insert_with(|| {
                    dynamic.push(string.as_str());
                    (pool.len() + dynamic.len() - 1) as u32
                });
            }
        }
    }

    write_u32(writer, MAGIC)?;
    write_u32(writer, hash::ast_magic(config))?;

    let strings = Iterator::chain(
        pool.strings().iter().map(String::as_str),
        dynamic.iter().copied(),
    );
    write_u16(writer, checked_len(pool.len() + dynamic.len(), "string pool")?)?;
    for string in strings {
        write_u16(writer, checked_len(string.len(), "string")?)?;
        writer.write_all(string.as_bytes())?;
    }

    write_u16(writer, checked_len(pool.enums().len(), "enum pool")?)?;
    for entry in pool.enums() {
        write_u32(writer, entry.name)?;
        write_u32(writer, entry.prefix)?;
        write_u16(writer, checked_len(entry.values.len(), "enum")?)?;
        for value in &entry.values {
            write_u32(writer, *value)?;
        }
    }

    write_u32(writer, order.len() as u32)?;
    for node in &order {
        let data = tree.data(*node);
        let decl = &config[data.node];
        write_u32(writer, pool.node_index(data.node))?;

        let children = (decl.children.iter().zip(&data.children))
            .filter_map(|(decl, child)| Some((decl, (*child)?)))
            .collect::<Vec<_>>();
        write_u16(writer, checked_len(children.len(), "children")?)?;
        for (decl, child) in children {
            write_u32(writer, pool.name_index(&decl.name))?;
            write_u32(writer, indices[&child])?;
        }

        let attrs = (decl.attrs.iter().zip(&data.attrs))
            .filter_map(|(decl, value)| Some((decl, value.as_ref()?)))
            .collect::<Vec<_>>();
        write_u16(writer, checked_len(attrs.len(), "attributes")?)?;
        for (decl, value) in attrs {
            let tag = Tag::of(decl.r#type);
            write_u32(writer, pool.name_index(&decl.name))?;
            writer.write_all(&[tag as u8])?;
            match (tag, value) {
                (Tag::Int | Tag::Int64, Value::Int(value)) => {
                    writer.write_all(&value.to_le_bytes())?
                }
                (Tag::Int8, Value::Int(value)) => writer.write_all(&(*value as i8).to_le_bytes())?,
                (Tag::Int16, Value::Int(value)) => {
                    writer.write_all(&(*value as i16).to_le_bytes())?
                }
                (Tag::Int32, Value::Int(value)) => {
                    writer.write_all(&(*value as i32).to_le_bytes())?
                }
                (Tag::UInt | Tag::UInt64, Value::UInt(value)) => {
                    writer.write_all(&value.to_le_bytes())?
                }
                (Tag::UInt8, Value::UInt(value)) => {
                    writer.write_all(&(*value as u8).to_le_bytes())?
                }
                (Tag::UInt16, Value::UInt(value)) => {
                    writer.write_all(&(*value as u16).to_le_bytes())?
                }
                (Tag::UInt32, Value::UInt(value)) => {
                    writer.write_all(&(*value as u32).to_le_bytes())?
                }
                (Tag::Float, Value::Float(value)) => {
                    writer.write_all(&(*value as f32).to_le_bytes())?
                }
                (Tag::Double, Value::Float(value)) => writer.write_all(&value.to_le_bytes())?,
                (Tag::Bool, Value::Bool(value)) => writer.write_all(&[u8::from(*value)])?,
                (Tag::String, Value::String(value)) => {
                    write_u32(writer, dynamic_indices[value.as_str()])?
                }
                (Tag::Link, Value::Link(target)) => match indices.get(target) {
                    Some(index) => write_u32(writer, *index)?,
                    None => {
                        let message = format!("link `{}` leaves the tree", decl.name);
                        return Err(invalid_data(message));
                    }
                },
                (Tag::Enum, Value::Enum(value)) => {
                    let AttrType::Enum(id) = decl.r#type else { unreachable!() };
                    write_u16(writer, id.0 as u16)?;
                    write_u16(writer, *value as u16)?;
                }
                (_, value) => panic!("attribute `{}` holds mismatched value {value:?}", decl.name),
            }
        }
    }
    Ok(())
}

fn checked_len(len: usize, what: &str) -> io::Result<u16> {
    u16::try_from(len).map_err(|_| invalid_data(format!("{what} too large to encode")))
}

fn invalid_data(message: String) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, message)
}

fn write_u16(writer: &mut impl Write, value: u16) -> io::Result<()> {
    writer.write_all(&value.to_le_bytes())
}

fn write_u32(writer: &mut impl Write, value: u32) -> io::Result<()> {
    writer.write_all(&value.to_le_bytes())
}

#[derive(Debug, thiserror::Error)]
pub enum ReadError {
    #[error("unexpected end of input")]
    Truncated,
    #[error(transparent)]
    Io(io::Error),
    #[error("bad magic {found:#010x}")]
    BadMagic { found: u32 },
    #[error(
        "file was written for a different AST definition \
         (expected {expected:#010x}, found {found:#010x})"
    )]
    DefinitionMismatch { expected: u32, found: u32 },
    #[error("string {index} is not valid UTF-8")]
    InvalidUtf8 { index: usize },
    #[error("string index {index} is out of range")]
    StringIndex { index: u32 },
    #[error("node index {index} is out of range")]
    NodeIndex { index: u32 },
    #[error("enum index {index} is out of range")]
    EnumIndex { index: u16 },
    #[error("file contains no nodes")]
    Empty,
    #[error("expected node type `{expected}`, found `{found}`")]
    TypeMismatch { expected: String, found: String },
    #[error("`{found}` is not a member of nodeset `{nodeset}`")]
    InvalidNodesetMember { nodeset: String, found: String },
    #[error("node `{node}` has no child named `{child}`")]
    InvalidChild { node: String, child: String },
    #[error("node `{node}` has no attribute named `{attr}`")]
    InvalidAttribute { node: String, attr: String },
    #[error("invalid type tag {tag} for attribute `{attr}`")]
    InvalidTag { attr: String, tag: u8 },
    #[error("value of attribute `{attr}` is out of range")]
    ValueOutOfRange { attr: String },
    #[error("attribute `{attr}` expects enum `{expected}`, found `{found}`")]
    EnumMismatch { attr: String, expected: String, found: String },
    #[error("enum `{enum_name}` has no value `{value}`")]
    UnknownEnumValue { enum_name: String, value: String },
    #[error("link `{attr}` expects a `{expected}`, found a `{found}`")]
    LinkMismatch { attr: String, expected: String, found: String },
    #[error("node {index} is the child of more than one node")]
    SharedNode { index: u32 },
}

impl From<io::Error> for ReadError {
    fn from(error: io::Error) -> ReadError {
        match error.kind() {
            io::ErrorKind::UnexpectedEof => ReadError::Truncated,
            _ => ReadError::Io(error),
        }
    }
}

enum RawValue {
    Int(i64),
    UInt(u64),
    Float(f64),
    Bool(bool),
    String(u32),
    Link(u32),
    Enum(u16, u16),
}

struct Record {
    r#type: u32,
    children: Vec<(u32, u32)>,
    attrs: Vec<(u32, u8, RawValue)>,
}

struct RawEnum {
    name: u32,
    values: Vec<u32>,
}

/// Read a tree whose root must fit `expected`.
pub fn read<'config>(
    config: &'config Config,
    reader: &mut dyn Read,
    expected: NodeType,
) -> Result<(Tree<'config>, NodeRef), ReadError> {
    let magic = read_u32le(reader)?;
    if magic != MAGIC {
        return Err(ReadError::BadMagic { found: magic });
    }
    let ast_magic = read_u32le(reader)?;
    if ast_magic != hash::ast_magic(config) {
        return Err(ReadError::DefinitionMismatch {
            expected: hash::ast_magic(config),
            found: ast_magic,
        });
    }

    let string_count = read_u16le(reader)?;
    let mut strings = Vec::with_capacity(usize::from(string_count));
    for index in 0..usize::from(string_count) {
        let len = read_u16le(reader)?;
        let mut bytes = vec![0; usize::from(len)];
        reader.read_exact(&mut bytes)?;
        let string = String::from_utf8(bytes).map_err(|_| ReadError::InvalidUtf8 { index })?;
        strings.push(string);
    }

    let enum_count = read_u16le(reader)?;
    let mut enums = Vec::with_capacity(usize::from(enum_count));
    for _ in 0..enum_count {
        let name = read_u32le(reader)?;
        let _prefix = read_u32le(reader)?;
        let value_count = read_u16le(reader)?;
        let values = (0..value_count)
            .map(|_| read_u32le(reader))
            .collect::<Result<_, _>>()?;
        enums.push(RawEnum { name, values });
    }

    let node_count = read_u32le(reader)?;
    let mut records = Vec::new();
    for _ in 0..node_count {
        records.push(read_record(reader)?);
    }
    if records.is_empty() {
        return Err(ReadError::Empty);
    }

    let mut builder = Builder {
        tree: Tree::new(config),
        strings,
        enums,
        records,
        built: Vec::new(),
        links: Vec::new(),
    };
    builder.built = vec![None; builder.records.len()];
    let root = builder.build(0, expected)?;
    builder.resolve_links()?;
    Ok((builder.tree, root))
}

fn read_record(reader: &mut dyn Read) -> Result<Record, ReadError> {
    let r#type = read_u32le(reader)?;
    let child_count = read_u16le(reader)?;
    let children = (0..child_count)
        .map(|_| Ok((read_u32le(reader)?, read_u32le(reader)?)))
        .collect::<Result<_, ReadError>>()?;
    let attr_count = read_u16le(reader)?;
    let mut attrs = Vec::with_capacity(usize::from(attr_count));
    for _ in 0..attr_count {
        let name = read_u32le(reader)?;
        let [tag] = read_array(reader)?;
        let value = match Tag::from_u8(tag) {
            Some(Tag::Int | Tag::Int64) => RawValue::Int(read_s64le(reader)?),
            Some(Tag::Int8) => RawValue::Int(i64::from(read_s8(reader)?)),
            Some(Tag::Int16) => RawValue::Int(i64::from(read_s16le(reader)?)),
            Some(Tag::Int32) => RawValue::Int(i64::from(read_s32le(reader)?)),
            Some(Tag::UInt | Tag::UInt64) => RawValue::UInt(read_u64le(reader)?),
            Some(Tag::UInt8) => RawValue::UInt(u64::from(read_u8(reader)?)),
            Some(Tag::UInt16) => RawValue::UInt(u64::from(read_u16le(reader)?)),
            Some(Tag::UInt32) => RawValue::UInt(u64::from(read_u32le(reader)?)),
            Some(Tag::Float) => RawValue::Float(f64::from(read_f32le(reader)?)),
            Some(Tag::Double) => RawValue::Float(read_f64le(reader)?),
            Some(Tag::Bool) => RawValue::Bool(read_u8(reader)? != 0),
            Some(Tag::String) => RawValue::String(read_u32le(reader)?),
            Some(Tag::Link) => RawValue::Link(read_u32le(reader)?),
            Some(Tag::Enum) => RawValue::Enum(read_u16le(reader)?, read_u16le(reader)?),
            // The size of the value is unknown, so the rest of the file
            // cannot be read
            None => {
                let attr = format!("#{name}");
                return Err(ReadError::InvalidTag { attr, tag });
            }
        };
        attrs.push((name, tag, value));
    }
    Ok(Record {
        r#type,
        children,
        attrs,
    })
}

struct Builder<'config> {
    tree: Tree<'config>,
    strings: Vec<String>,
    enums: Vec<RawEnum>,
    records: Vec<Record>,
    built: Vec<Option<NodeRef>>,
    /// Links to resolve once every node has been built.
    links: Vec<(NodeRef, usize, u32)>,
}

impl<'config> Builder<'config> {
    fn string(&self, index: u32) -> Result<&str, ReadError> {
        match self.strings.get(index as usize) {
            Some(string) => Ok(string),
            None => Err(ReadError::StringIndex { index }),
        }
    }

    /// Build the tree below record `root`. Children are built from an
    /// explicit stack, so deep chains do not exhaust the call stack.
    fn build(&mut self, root: u32, expected: NodeType) -> Result<NodeRef, ReadError> {
        let mut pending = Vec::new();
        let result = self.build_node(root, expected, &mut pending)?;
        while let Some((index, expected, parent, slot)) = pending.pop() {
            let node = self.build_node(index, expected, &mut pending)?;
            self.tree.replace_child(parent, slot, Some(node));
        }
        Ok(result)
    }

    fn build_node(
        &mut self,
        index: u32,
        expected: NodeType,
        pending: &mut Vec<(u32, NodeType, NodeRef, usize)>,
    ) -> Result<NodeRef, ReadError> {
        let config = self.tree.config();
        let record = (self.records.get(index as usize)).ok_or(ReadError::NodeIndex { index })?;
        if self.built[index as usize].is_some() {
            return Err(ReadError::SharedNode { index });
        }

        let found = self.string(record.r#type)?;
        let node = match config.node_by_name(found) {
            Some(node) if config.accepts(expected, node) => node,
            Some(_) if matches!(expected, NodeType::Nodeset(_)) => {
                return Err(ReadError::InvalidNodesetMember {
                    nodeset: config.type_name(expected).to_owned(),
                    found: found.to_owned(),
                })
            }
            _ => {
                return Err(ReadError::TypeMismatch {
                    expected: config.type_name(expected).to_owned(),
                    found: found.to_owned(),
                })
            }
        };
        let decl = &config[node];
        let result = self.tree.alloc(node);
        self.built[index as usize] = Some(result);

        let mut children = Vec::new();
        for (name, child_index) in &self.records[index as usize].children {
            let name = self.string(*name)?;
            let (slot, child) = decl.child(name).ok_or_else(|| ReadError::InvalidChild {
                node: decl.name.clone(),
                child: name.to_owned(),
            })?;
            children.push((*child_index, child.r#type, result, slot));
        }
        pending.extend(children.into_iter().rev());

        let attrs = std::mem::take(&mut self.records[index as usize].attrs);
        for (name, tag, value) in attrs {
            let name = self.string(name)?;
            let (slot, attr) = decl.attr(name).ok_or_else(|| ReadError::InvalidAttribute {
                node: decl.name.clone(),
                attr: name.to_owned(),
            })?;
            if Tag::of(attr.r#type) as u8 != tag {
                return Err(ReadError::InvalidTag {
                    attr: attr.name.clone(),
                    tag,
                });
            }
            let out_of_range = || ReadError::ValueOutOfRange {
                attr: attr.name.clone(),
            };

            let value = match value {
                RawValue::Int(value) => Value::Int(value),
                RawValue::UInt(value) => Value::UInt(value),
                RawValue::Float(value) => Value::Float(value),
                RawValue::Bool(value) => Value::Bool(value),
                RawValue::String(index) => Value::String(self.string(index)?.to_owned()),
                RawValue::Link(target) => {
                    self.links.push((result, slot, target));
                    continue;
                }
                RawValue::Enum(enum_index, position) => {
                    let AttrType::Enum(id) = attr.r#type else { unreachable!() };
                    let r#enum = &config[id];
                    let entry = (self.enums.get(usize::from(enum_index)))
                        .ok_or(ReadError::EnumIndex { index: enum_index })?;
                    let found = self.string(entry.name)?;
                    if found != r#enum.name {
                        return Err(ReadError::EnumMismatch {
                            attr: attr.name.clone(),
                            expected: r#enum.name.clone(),
                            found: found.to_owned(),
                        });
                    }
                    let value_index = *(entry.values.get(usize::from(position)))
                        .ok_or_else(out_of_range)?;
                    let value = self.string(value_index)?;
                    match r#enum.values.iter().position(|v| v == value) {
                        Some(position) => Value::Enum(position),
                        None => {
                            return Err(ReadError::UnknownEnumValue {
                                enum_name: r#enum.name.clone(),
                                value: value.to_owned(),
                            })
                        }
                    }
                }
            };
            if !value.fits(config, attr.r#type) {
                return Err(out_of_range());
            }
            self.tree.data_mut(result).attrs[slot] = Some(value.stored(attr.r#type));
        }

        Ok(result)
    }

    fn resolve_links(&mut self) -> Result<(), ReadError> {
        let config = self.tree.config();
        for (node, slot, target) in std::mem::take(&mut self.links) {
            let attr = &config[self.tree.node_type(node)].attrs[slot];
            let AttrType::Link(expected) = attr.r#type else { unreachable!() };
            let target = (self.built.get(target as usize).copied().flatten())
                .ok_or(ReadError::NodeIndex { index: target })?;
            if self.tree.node_type(target) != expected {
                return Err(ReadError::LinkMismatch {
                    attr: attr.name.clone(),
                    expected: config[expected].name.clone(),
                    found: self.tree.type_name(target).to_owned(),
                });
            }
            self.tree.data_mut(node).attrs[slot] = Some(Value::Link(target));
        }
        Ok(())
    }
}

fn read_array<const N: usize>(reader: &mut dyn Read) -> io::Result<[u8; N]> {
    let mut buf = [0; N];
    reader.read_exact(&mut buf)?;
    Ok(buf)
}

fn read_u8(reader: &mut dyn Read) -> io::Result<u8> {
    let [byte] = read_array(reader)?;
    Ok(byte)
}

fn read_s8(reader: &mut dyn Read) -> io::Result<i8> {
    let [byte] = read_array(reader)?;
    Ok(byte as i8)
}

/// Generates a function that reads a little-endian multi-byte primitive.
macro_rules! read_multibyte_prim {
    ($read_multibyte_prim:ident, $T:ident) => {
        fn $read_multibyte_prim(reader: &mut dyn Read) -> io::Result<$T> {
            let data = read_array(reader)?;
            Ok($T::from_le_bytes(data))
        }
    };
}

read_multibyte_prim!(read_u16le, u16);
read_multibyte_prim!(read_u32le, u32);
read_multibyte_prim!(read_u64le, u64);
read_multibyte_prim!(read_s16le, i16);
read_multibyte_prim!(read_s32le, i32);
read_multibyte_prim!(read_s64le, i64);
read_multibyte_prim!(read_f32le, f32);
read_multibyte_prim!(read_f64le, f64);
