//! Writing generated files to disk.
//!
//! Every generated file starts with a `// Hash:` line holding the digest of
//! what it was generated from. Files whose existing hash line matches are
//! left alone, and files carrying a hash line that were not produced by the
//! current run are removed.

use std::fs;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};

use fxhash::FxHashSet;
use tracing::{debug, info};

use crate::codegen::Context;
use crate::hash::{Digest16, Hasher};
use crate::model::{Config, NodeId, NodeType, NodesetId, PassId, TraversalId};

pub const HASH_PREFIX: &str = "// Hash: ";

#[derive(Debug, Clone)]
pub struct Options {
    pub header_dir: PathBuf,
    pub source_dir: PathBuf,
    /// Regenerate files even when their hash is unchanged.
    pub force: bool,
}

impl Default for Options {
    fn default() -> Options {
        Options {
            header_dir: PathBuf::from("include/generated/"),
            source_dir: PathBuf::from("src/generated/"),
            force: false,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FileGenError {
    #[error("failed to create output directory `{}`: {source}", path.display())]
    CreateDir { path: PathBuf, source: io::Error },
    #[error("failed to read `{}`: {source}", path.display())]
    Read { path: PathBuf, source: io::Error },
    #[error("failed to write `{}`: {source}", path.display())]
    Write { path: PathBuf, source: io::Error },
    #[error("failed to remove stale file `{}`: {source}", path.display())]
    Remove { path: PathBuf, source: io::Error },
}

/// What happened to each file during a run.
#[derive(Debug, Default)]
pub struct Summary {
    pub written: Vec<PathBuf>,
    pub skipped: Vec<PathBuf>,
    pub removed: Vec<PathBuf>,
}

#[derive(Debug, Copy, Clone)]
enum Dir {
    Header,
    Source,
}

/// The entity a file is generated from.
#[derive(Debug, Copy, Clone)]
enum Origin {
    Config,
    Node(NodeId),
    Nodeset(NodesetId),
    Traversal(TraversalId),
    Pass(PassId),
}

impl Origin {
    fn of(r#type: NodeType) -> Origin {
        match r#type {
            NodeType::Node(id) => Origin::Node(id),
            NodeType::Nodeset(id) => Origin::Nodeset(id),
        }
    }
}

struct FileGen<'config, 'options> {
    config: &'config Config,
    header_dir: &'options Path,
    source_dir: &'options Path,
    force: bool,
    produced: FxHashSet<PathBuf>,
    summary: Summary,
}

impl<'config, 'options> FileGen<'config, 'options> {
    fn new(
        config: &'config Config,
        header_dir: &'options Path,
        source_dir: &'options Path,
        force: bool,
    ) -> Result<FileGen<'config, 'options>, FileGenError> {
        for dir in [header_dir, source_dir] {
            if !dir.is_dir() {
                fs::create_dir_all(dir).map_err(|source| FileGenError::CreateDir {
                    path: dir.to_owned(),
                    source,
                })?;
                info!("created directory {}", dir.display());
            }
        }

        Ok(FileGen {
            config,
            header_dir,
            source_dir,
            force,
            produced: FxHashSet::default(),
            summary: Summary::default(),
        })
    }

    fn digest(&self, name: &str, origin: Origin) -> Digest16 {
        let mut hasher = Hasher::new(self.config);
        hasher.str(name);
        match origin {
            Origin::Config => hasher.config(),
            Origin::Node(id) => hasher.node(id),
            Origin::Nodeset(id) => hasher.nodeset(id),
            Origin::Traversal(id) => hasher.traversal(id),
            Origin::Pass(id) => hasher.pass(id),
        };
        hasher.finish()
    }

    fn file(
        &mut self,
        dir: Dir,
        name: String,
        origin: Origin,
        emit: impl FnOnce(&mut Vec<u8>) -> io::Result<()>,
    ) -> Result<(), FileGenError> {
        let path = match dir {
            Dir::Header => self.header_dir.join(&name),
            Dir::Source => self.source_dir.join(&name),
        };
        let header = format!("{HASH_PREFIX}{}", self.digest(&name, origin).to_hex());
        self.produced.insert(path.clone());

        if !self.force && first_line(&path)?.as_deref() == Some(header.as_str()) {
            debug!("SKIP {}", path.display());
            self.summary.skipped.push(path);
            return Ok(());
        }

        let mut contents = Vec::new();
        contents.extend_from_slice(header.as_bytes());
        contents.push(b'\n');
        let write = |source| FileGenError::Write {
            path: path.clone(),
            source,
        };
        emit(&mut contents).map_err(write)?;
        fs::write(&path, contents).map_err(write)?;

        info!("GEN {}", path.display());
        self.summary.written.push(path);
        Ok(())
    }

    /// Remove generated files that were not produced by this run.
    fn remove_stale(&mut self) -> Result<(), FileGenError> {
        let mut dirs = vec![self.header_dir];
        if self.source_dir != self.header_dir {
            dirs.push(self.source_dir);
        }

        for dir in dirs {
            let entries = fs::read_dir(dir).map_err(|source| FileGenError::Read {
                path: dir.to_owned(),
                source,
            })?;
            let mut stale = Vec::new();
            for entry in entries {
                let entry = entry.map_err(|source| FileGenError::Read {
                    path: dir.to_owned(),
                    source,
                })?;
                let path = dir.join(entry.file_name());
                if !path.is_file() || self.produced.contains(&path) {
                    continue;
                }
                if let Some(line) = first_line(&path)? {
                    if line.starts_with(HASH_PREFIX) {
                        stale.push(path);
                    }
                }
            }

            stale.sort();
            for path in stale {
                fs::remove_file(&path).map_err(|source| FileGenError::Remove {
                    path: path.clone(),
                    source,
                })?;
                debug!("REMOVE {}", path.display());
                self.summary.removed.push(path);
            }
        }
        Ok(())
    }
}

/// The first line of a file, or `None` if it does not exist.
fn first_line(path: &Path) -> Result<Option<String>, FileGenError> {
    let file = match fs::File::open(path) {
        Ok(file) => file,
        Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(FileGenError::Read {
                path: path.to_owned(),
                source,
            })
        }
    };

    let mut line = String::new();
    match BufReader::new(file).read_line(&mut line) {
        Ok(_) => Ok(Some(line.trim_end_matches(['\n', '\r']).to_owned())),
        // Not text, so not one of ours
        Err(error) if error.kind() == io::ErrorKind::InvalidData => Ok(Some(String::new())),
        Err(source) => Err(FileGenError::Read {
            path: path.to_owned(),
            source,
        }),
    }
}

/// Generate every header and source file for a config.
pub fn generate(config: &Config, options: &Options) -> Result<Summary, FileGenError> {
    use self::Dir::{Header, Source};
    use self::Origin::Config as Shared;

    let context = Context::new(config);
    let mut gen = FileGen::new(config, &options.header_dir, &options.source_dir, options.force)?;

    gen.file(Header, "enum.h".to_owned(), Shared, |w| context.emit_enum_header(w))?;
    gen.file(Header, "ast.h".to_owned(), Shared, |w| context.emit_ast_header(w))?;
    gen.file(Header, "create-ast.h".to_owned(), Shared, |w| context.emit_create_all_header(w))?;
    gen.file(Header, "copy-ast.h".to_owned(), Shared, |w| context.emit_copy_all_header(w))?;
    gen.file(Header, "free-ast.h".to_owned(), Shared, |w| context.emit_free_all_header(w))?;
    gen.file(Header, "trav-ast.h".to_owned(), Shared, |w| context.emit_trav_all_header(w))?;
    gen.file(Header, "trav-core.h".to_owned(), Shared, |w| context.emit_trav_core_header(w))?;
    gen.file(Source, "trav-core.c".to_owned(), Shared, |w| context.emit_trav_core_source(w))?;
    gen.file(Header, "phase-driver.h".to_owned(), Shared, |w| context.emit_phase_driver_header(w))?;
    gen.file(Source, "phase-driver.c".to_owned(), Shared, |w| context.emit_phase_driver_source(w))?;

    gen.file(Header, "binary-serialization-util.h".to_owned(), Shared, |w| {
        context.emit_binary_util_header(w)
    })?;
    gen.file(Source, "binary-serialization-util.c".to_owned(), Shared, |w| {
        context.emit_binary_util_source(w)
    })?;
    gen.file(Header, "textual-serialization-util.h".to_owned(), Shared, |w| {
        context.emit_textual_util_header(w)
    })?;
    gen.file(Source, "textual-serialization-util.c".to_owned(), Shared, |w| {
        context.emit_textual_util_source(w)
    })?;
    gen.file(Header, "serialization-all.h".to_owned(), Shared, |w| {
        context.emit_serialization_all_header(w)
    })?;

    for r#type in config.node_types() {
        let name = config.type_name(r#type);
        let origin = Origin::of(r#type);

        gen.file(Header, format!("ast-{name}.h"), origin, |w| {
            context.emit_entity_header(w, r#type)
        })?;
        gen.file(Header, format!("create-{name}.h"), origin, |w| {
            context.emit_create_header(w, r#type)
        })?;
        gen.file(Source, format!("create-{name}.c"), origin, |w| {
            context.emit_create_source(w, r#type)
        })?;
        gen.file(Header, format!("copy-{name}.h"), origin, |w| {
            context.emit_copy_header(w, r#type)
        })?;
        gen.file(Source, format!("copy-{name}.c"), origin, |w| {
            context.emit_copy_source(w, r#type)
        })?;
        gen.file(Header, format!("free-{name}.h"), origin, |w| {
            context.emit_free_header(w, r#type)
        })?;
        gen.file(Source, format!("free-{name}.c"), origin, |w| {
            context.emit_free_source(w, r#type)
        })?;
        gen.file(Header, format!("trav-{name}.h"), origin, |w| {
            context.emit_trav_header(w, r#type)
        })?;
        // Dispatch depends on every traversal
        gen.file(Source, format!("trav-{name}.c"), Shared, |w| {
            context.emit_trav_source(w, r#type)
        })?;

        gen.file(Header, format!("serialization-{name}.h"), origin, |w| {
            context.emit_serialization_header(w, r#type)
        })?;
        // String pool indices depend on every node
        gen.file(Source, format!("binary-serialization-{name}-write.c"), Shared, |w| {
            context.emit_binary_write_source(w, r#type)
        })?;
        gen.file(Source, format!("binary-serialization-{name}-read.c"), Shared, |w| {
            context.emit_binary_read_source(w, r#type)
        })?;
        gen.file(Source, format!("textual-serialization-{name}-write.c"), origin, |w| {
            context.emit_textual_write_source(w, r#type)
        })?;
        gen.file(Source, format!("textual-serialization-{name}-read.c"), origin, |w| {
            context.emit_textual_read_source(w, r#type)
        })?;
    }

    for (index, traversal) in config.traversals.iter().enumerate() {
        let id = TraversalId(index);
        gen.file(Header, format!("traversal-{}.h", traversal.name), Origin::Traversal(id), |w| {
            context.emit_traversal_header(w, id)
        })?;
    }
    for (index, pass) in config.passes.iter().enumerate() {
        let id = PassId(index);
        gen.file(Header, format!("pass-{}.h", pass.name), Origin::Pass(id), |w| {
            context.emit_pass_header(w, id)
        })?;
    }

    gen.remove_stale()?;
    Ok(gen.summary)
}

/// Write the `ast.dot` diagram of a config into `dir`.
pub fn generate_dot(config: &Config, dir: &Path, force: bool) -> Result<Summary, FileGenError> {
    let context = Context::new(config);
    let mut gen = FileGen::new(config, dir, dir, force)?;
    gen.file(Dir::Header, "ast.dot".to_owned(), Origin::Config, |w| context.emit_dot(w))?;
    Ok(gen.summary)
}
