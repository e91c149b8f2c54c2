use clap::Parser;
use codespan_reporting::term::DisplayStyle;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Generate C abstract syntax tree plumbing from node, traversal and phase definitions
#[derive(Parser)]
#[clap(version, about)]
#[clap(after_help = AFTER_HELP)]
struct Cli {
    /// Path to the configuration to generate code for (`-` reads stdin)
    #[clap(name = "INPUT")]
    input: PathOrStdin,
    /// Directory that generated headers are written to
    #[clap(long = "header-dir", name = "HEADER_DIR", default_value = "include/generated/")]
    header_dir: PathBuf,
    /// Directory that generated sources are written to
    #[clap(long = "source-dir", name = "SOURCE_DIR", default_value = "src/generated/")]
    source_dir: PathBuf,
    /// Only write the graph description `ast.dot` into this directory
    #[clap(long = "dot", name = "DOT_DIR")]
    dot: Option<PathBuf>,
    /// Print the resolved configuration and report every generated file
    #[clap(short = 'v', long = "verbose")]
    verbose: bool,
    /// Layout used when rendering diagnostics
    #[clap(long = "diagnostic-style", value_enum, default_value_t = DiagnosticStyle::Rich)]
    diagnostic_style: DiagnosticStyle,
    /// Regenerate every file, even those whose hash is unchanged
    #[clap(long = "force")]
    force: bool,
}

const AFTER_HELP: &str = "\
Examples:

  $ cocogen ast.ccn
  $ cocogen --header-dir include/ast --source-dir src/ast ast.ccn
  $ cocogen --dot docs/ ast.ccn

The log level defaults to `warn` (`info` with `--verbose`) and can be
overridden with the `RUST_LOG` environment variable.
";

#[derive(Copy, Clone, Debug, PartialEq, Eq, clap::ValueEnum)]
enum DiagnosticStyle {
    Rich,
    Short,
}

impl From<DiagnosticStyle> for DisplayStyle {
    fn from(style: DiagnosticStyle) -> DisplayStyle {
        match style {
            DiagnosticStyle::Rich => DisplayStyle::Rich,
            DiagnosticStyle::Short => DisplayStyle::Short,
        }
    }
}

#[derive(Clone, Debug)]
enum PathOrStdin {
    StdIn,
    Path(PathBuf),
}

impl std::str::FromStr for PathOrStdin {
    type Err = std::convert::Infallible;

    fn from_str(src: &str) -> Result<PathOrStdin, std::convert::Infallible> {
        match src {
            "-" => Ok(PathOrStdin::StdIn),
            _ => Ok(PathOrStdin::Path(PathBuf::from(src))),
        }
    }
}

fn unwrap_or_exit<T>(option: Option<T>) -> T {
    option.unwrap_or_else(|| std::process::exit(cocogen::Status::Error.exit_code()))
}

fn load_file_or_exit(driver: &mut cocogen::Driver, file: PathOrStdin) -> cocogen::source::FileId {
    unwrap_or_exit(match file {
        PathOrStdin::StdIn => driver.load_source("<stdin>".to_owned(), std::io::stdin()),
        PathOrStdin::Path(path) => driver.load_source_path(&path),
    })
}

const MAX_PRETTY_WIDTH: usize = 80;

fn get_pretty_width() -> usize {
    let term_width = termsize::get().map_or(usize::MAX, |size| usize::from(size.cols));
    std::cmp::min(term_width, MAX_PRETTY_WIDTH)
}

fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "info" } else { "warn" }));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();
}

fn main() -> ! {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut driver = cocogen::Driver::new();
    driver.set_diagnostic_style(cli.diagnostic_style.into());
    driver.install_panic_hook();
    driver.set_emit_width(get_pretty_width());

    let file_id = load_file_or_exit(&mut driver, cli.input);
    let status = match cli.dot {
        Some(dir) => driver.check_and_emit_dot(file_id, &dir, cli.force),
        None => {
            let options = cocogen::filegen::Options {
                header_dir: cli.header_dir,
                source_dir: cli.source_dir,
                force: cli.force,
            };
            driver.check_and_generate(file_id, &options, cli.verbose)
        }
    };

    std::process::exit(status.exit_code());
}
