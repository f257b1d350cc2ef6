use std::path::{Path, PathBuf};

use clap::{ArgAction, Parser, Subcommand};

use chansel::config::Options;
use chansel::diagnostics::{self, CompileError};
use chansel::session::Session;

#[derive(Parser)]
#[command(name = "chansel", version, about = "Select statement lowering compiler")]
struct Cli {
    /// Emit data-race instrumentation markers for select cases
    #[arg(long, global = true)]
    race: bool,

    /// Configuration file (defaults to chansel.toml next to the source file)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Type-check a source file and report diagnostics
    Check {
        /// Source file path
        file: PathBuf,
        /// Print diagnostics as JSON on stdout
        #[arg(long)]
        json: bool,
    },
    /// Print the program with every select lowered
    Lower {
        /// Source file path
        file: PathBuf,
        /// Stop after normalization instead of lowering
        #[arg(long)]
        normalized: bool,
    },
    /// Compile a source file to a native object
    Build {
        /// Source file path
        file: PathBuf,
        /// Output object path
        #[arg(short, long, default_value = "a.o")]
        output: PathBuf,
    },
}

impl Commands {
    fn file(&self) -> &Path {
        match self {
            Commands::Check { file, .. } | Commands::Lower { file, .. } | Commands::Build { file, .. } => file,
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_max_level(level)
        .init();
}

fn load_options(cli: &Cli) -> Result<Options, CompileError> {
    let mut options = match &cli.config {
        Some(path) if !path.exists() => {
            return Err(CompileError::config("configuration file not found", path.clone()));
        }
        Some(path) => Options::load(path)?,
        None => {
            let dir = cli.command.file().parent().unwrap_or_else(|| Path::new("."));
            Options::discover(dir)?
        }
    };
    if cli.race {
        options.race = true;
    }
    Ok(options)
}

fn fail(source: Option<&str>, err: &CompileError) -> ! {
    match source {
        Some(source) => diagnostics::render_error(source, err),
        None => eprintln!("error: {err}"),
    }
    std::process::exit(1);
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let options = load_options(&cli).unwrap_or_else(|err| fail(None, &err));
    let session = Session::new(options);
    let source = chansel::read_source(cli.command.file()).unwrap_or_else(|err| fail(None, &err));

    match &cli.command {
        Commands::Check { json, .. } => match chansel::check_source(&source) {
            Ok(()) => {
                if *json {
                    println!("[]");
                }
            }
            Err(err @ CompileError::Semantic { .. }) if *json => {
                match diagnostics::diagnostics_to_json(&source, err.diagnostics()) {
                    Ok(out) => println!("{out}"),
                    Err(e) => fail(None, &e),
                }
                std::process::exit(1);
            }
            Err(err) => fail(Some(&source), &err),
        },
        Commands::Lower { normalized, .. } => {
            let program = if *normalized {
                chansel::analyze_source(&source)
            } else {
                chansel::lower_source(&source, &session)
            };
            match program {
                Ok(program) => print!("{}", chansel::pretty::pretty_print(&program)),
                Err(err) => fail(Some(&source), &err),
            }
        }
        Commands::Build { output, .. } => {
            let bytes = chansel::compile_to_object(&source, &session).unwrap_or_else(|err| fail(Some(&source), &err));
            if let Err(e) = std::fs::write(output, bytes) {
                fail(None, &CompileError::io(output, e));
            }
        }
    }
}
