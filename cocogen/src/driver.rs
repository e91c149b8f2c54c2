use codespan_reporting::diagnostic::{Diagnostic, Severity};
use codespan_reporting::files::SimpleFiles;
use codespan_reporting::term::termcolor::{BufferedStandardStream, ColorChoice, WriteColor};
use codespan_reporting::term::DisplayStyle;
use std::cell::RefCell;
use std::io::{Read, Write};
use std::path::Path;

use crate::filegen::{self, FileGenError, Summary};
use crate::model::Config;
use crate::source::{FileId, Files};
use crate::{check, surface};

#[derive(Debug, Copy, Clone)]
pub enum Status {
    Ok,
    Error,
}

impl Status {
    pub fn exit_code(self) -> i32 {
        match self {
            Status::Ok => 0,
            Status::Error => 1,
        }
    }
}

pub struct Driver {
    files: Files,

    seen_errors: RefCell<bool>,
    codespan_config: codespan_reporting::term::Config,
    diagnostic_writer: RefCell<Box<dyn WriteColor>>,

    emit_width: usize,
    emit_writer: RefCell<Box<dyn WriteColor>>,
}

impl Driver {
    pub fn new() -> Driver {
        Driver {
            files: Files::new(),

            seen_errors: RefCell::new(false),
            codespan_config: codespan_reporting::term::Config::default(),
            diagnostic_writer: RefCell::new(Box::new(BufferedStandardStream::stderr(
                if atty::is(atty::Stream::Stderr) {
                    ColorChoice::Auto
                } else {
                    ColorChoice::Never
                },
            ))),

            emit_width: usize::MAX,
            emit_writer: RefCell::new(Box::new(BufferedStandardStream::stdout(
                if atty::is(atty::Stream::Stdout) {
                    ColorChoice::Auto
                } else {
                    ColorChoice::Never
                },
            ))),
        }
    }

    /// Setup a global panic hook
    pub fn install_panic_hook(&self) {
        // Use the currently set codespan configuration
        let term_config = self.codespan_config.clone();
        // Fetch the default hook (which prints the panic message and an optional backtrace)
        let default_hook = std::panic::take_hook();

        std::panic::set_hook(Box::new(move |info| {
            let location = info.location();
            let message = if let Some(message) = info.payload().downcast_ref::<String>() {
                message.as_str()
            } else if let Some(message) = info.payload().downcast_ref::<&str>() {
                message
            } else {
                "unknown panic type"
            };

            let diagnostic = Diagnostic::bug()
                .with_message(format!("cocogen panicked at '{message}'"))
                .with_notes(vec![
                    match location {
                        Some(location) => format!("panicked at: {location}"),
                        None => "panicked at: unknown location".to_owned(),
                    },
                    "please file a bug report, including the input that caused it".to_owned(),
                ]);

            let mut writer = BufferedStandardStream::stderr(if atty::is(atty::Stream::Stderr) {
                ColorChoice::Auto
            } else {
                ColorChoice::Never
            });
            let dummy_files = SimpleFiles::<String, String>::new();

            default_hook(info);
            eprintln!();
            // Nothing sensible is left to do if the report itself fails
            let _ = codespan_reporting::term::emit(
                &mut writer,
                &term_config,
                &dummy_files,
                &diagnostic,
            );
        }));
    }

    /// Set the writer to use when rendering diagnostics
    pub fn set_diagnostic_writer(&mut self, stream: impl 'static + WriteColor) {
        self.diagnostic_writer = RefCell::new(Box::new(stream) as Box<dyn WriteColor>);
    }

    /// Set the layout of rendered diagnostics
    pub fn set_diagnostic_style(&mut self, style: DisplayStyle) {
        self.codespan_config.display_style = style;
    }

    /// Set the width to use when pretty printing the resolved configuration
    pub fn set_emit_width(&mut self, emit_width: usize) {
        self.emit_width = emit_width;
    }

    /// Set the writer to use when pretty printing the resolved configuration
    pub fn set_emit_writer(&mut self, stream: impl 'static + WriteColor) {
        self.emit_writer = RefCell::new(Box::new(stream) as Box<dyn WriteColor>);
    }

    /// Load a source string into the file database.
    pub fn load_source_string(&mut self, name: String, source: String) -> FileId {
        self.files.add(name, source)
    }

    /// Load a source file into the file database using a reader.
    pub fn load_source(&mut self, name: String, mut reader: impl Read) -> Option<FileId> {
        let mut source = String::new();
        match reader.read_to_string(&mut source) {
            Ok(_) => Some(self.load_source_string(name, source)),
            Err(error) => {
                self.emit_read_diagnostic(name, error);
                None
            }
        }
    }

    /// Load a source file into the file database from the given path.
    pub fn load_source_path(&mut self, path: &Path) -> Option<FileId> {
        match std::fs::File::open(path) {
            Ok(file) => self.load_source(path.display().to_string(), file),
            Err(error) => {
                self.emit_read_diagnostic(path.display(), error);
                None
            }
        }
    }

    /// Parse and validate a configuration, reporting every problem found.
    /// Returns `None` if any errors were seen.
    pub fn check(&self, file_id: FileId) -> Option<Config> {
        let source = self.files.source(file_id)?;

        let (module, messages) = surface::Module::parse(file_id, source);
        self.emit_diagnostics(messages.iter().map(|message| message.to_diagnostic()));

        // Items that parsed are still validated, so that every error is seen
        let config = check::check_module(&module, &mut |message| {
            self.emit_diagnostic(message.to_diagnostic());
        });

        match config {
            Some(config) if !*self.seen_errors.borrow() => Some(config),
            _ => None,
        }
    }

    /// Check a configuration and generate the C sources for it.
    pub fn check_and_generate(
        &self,
        file_id: FileId,
        options: &filegen::Options,
        verbose: bool,
    ) -> Status {
        let config = match self.check(file_id) {
            Some(config) => config,
            None => return self.terminate(),
        };
        if verbose {
            self.emit_config(&config);
        }

        match filegen::generate(&config, options) {
            Ok(summary) => {
                log_summary(&summary);
                Status::Ok
            }
            Err(error) => {
                self.emit_filegen_error(error);
                self.terminate()
            }
        }
    }

    /// Check a configuration and only write its graph description.
    pub fn check_and_emit_dot(&self, file_id: FileId, dir: &Path, force: bool) -> Status {
        let config = match self.check(file_id) {
            Some(config) => config,
            None => return self.terminate(),
        };

        match filegen::generate_dot(&config, dir, force) {
            Ok(summary) => {
                log_summary(&summary);
                Status::Ok
            }
            Err(error) => {
                self.emit_filegen_error(error);
                self.terminate()
            }
        }
    }

    fn emit_config(&self, config: &Config) {
        let arena = pretty::Arena::new();
        let context = crate::model::pretty::Context::new(&arena, config);
        self.emit_doc(context.config().into_doc());
    }

    fn emit_doc(&self, doc: pretty::RefDoc) {
        let mut emit_writer = self.emit_writer.borrow_mut();
        let result = writeln!(emit_writer, "{}", doc.pretty(self.emit_width))
            .and_then(|()| emit_writer.flush());
        if let Err(error) = result {
            drop(emit_writer);
            self.emit_diagnostic(
                Diagnostic::error().with_message(format!("couldn't write to stdout: {error}")),
            );
        }
    }

    fn terminate(&self) -> Status {
        self.emit_diagnostic(
            Diagnostic::error().with_message("errors were found, code generation terminated"),
        );
        Status::Error
    }

    fn emit_diagnostic(&self, diagnostic: Diagnostic<FileId>) {
        let mut writer = self.diagnostic_writer.borrow_mut();
        let config = &self.codespan_config;

        // Diagnostics go to stderr; there is nowhere left to report a failure
        let _ = codespan_reporting::term::emit(&mut *writer, config, &self.files, &diagnostic);
        let _ = writer.flush();

        if diagnostic.severity >= Severity::Error {
            *self.seen_errors.borrow_mut() = true;
        }
    }

    fn emit_diagnostics(&self, diagnostics: impl Iterator<Item = Diagnostic<FileId>>) {
        for diagnostic in diagnostics {
            self.emit_diagnostic(diagnostic);
        }
    }

    fn emit_read_diagnostic(&self, name: impl std::fmt::Display, error: std::io::Error) {
        let diagnostic =
            Diagnostic::error().with_message(format!("couldn't read `{name}`: {error}"));
        self.emit_diagnostic(diagnostic);
    }

    fn emit_filegen_error(&self, error: FileGenError) {
        self.emit_diagnostic(Diagnostic::error().with_message(error.to_string()));
    }
}

impl Default for Driver {
    fn default() -> Driver {
        Driver::new()
    }
}

fn log_summary(summary: &Summary) {
    tracing::info!(
        written = summary.written.len(),
        skipped = summary.skipped.len(),
        removed = summary.removed.len(),
        "code generation finished",
    );
}
