//! Amber Compiler CLI
//!
//! Command-line interface for parsing, compiling and running Amber
//! frame programs.

use amberc::{CompilerConfig, ScriptThread, compile_source, dump_component, parse_source};
use clap::{CommandFactory, Parser as ClapParser, Subcommand};
use clap_complete::{Shell, generate};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process;
use tracing_subscriber::EnvFilter;

#[derive(ClapParser)]
#[command(name = "amberc")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Amber compiler - build and run reactive frame programs", long_about = None)]
struct Cli {
    /// Compiler configuration (TOML)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Log every compile pass
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a source file and print the frame tree
    Parse {
        /// Input .amb source file
        input: PathBuf,

        /// Print the frame tree as JSON instead of source text
        #[arg(long)]
        json: bool,
    },

    /// Compile a source file and dump the resulting components
    Compile {
        /// Input .amb source file
        input: PathBuf,
    },

    /// Compile and execute a source file on a script thread
    Run {
        /// Input .amb source file
        input: PathBuf,

        /// Script evaluated after execution; its result is printed
        #[arg(short, long = "eval", value_name = "SCRIPT")]
        scripts: Vec<String>,

        /// Script expression passed to every Init function
        #[arg(long, value_name = "EXPR")]
        arg: Option<String>,
    },

    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Commands::Completions { shell } = cli.command {
        run_completions(shell);
        return;
    }

    let config = load_config(cli.config.as_deref());
    match cli.command {
        Commands::Parse { input, json } => run_parse(&input, json, &config),
        Commands::Compile { input } => run_compile(&input, &config),
        Commands::Run {
            input,
            scripts,
            arg,
        } => run_script(&input, scripts, arg, config),
        Commands::Completions { .. } => {}
    }
}

fn init_tracing(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let mut filter = EnvFilter::from_default_env();
    for target in ["amberc", "amber_script"] {
        if let Ok(directive) = format!("{}={}", target, level).parse() {
            filter = filter.add_directive(directive);
        }
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run_completions(shell: Shell) {
    let mut cmd = Cli::command();
    generate(shell, &mut cmd, "amberc", &mut io::stdout());
}

fn load_config(path: Option<&Path>) -> CompilerConfig {
    match path {
        Some(path) => match CompilerConfig::load(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Error: {}", e);
                process::exit(1);
            }
        },
        None => CompilerConfig::default(),
    }
}

fn read_source(input: &Path) -> String {
    match fs::read_to_string(input) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("Error: failed to read {}: {}", input.display(), e);
            process::exit(1);
        }
    }
}

fn run_parse(input: &Path, json: bool, config: &CompilerConfig) {
    let source = read_source(input);
    let frame = match parse_source(&source, config) {
        Ok(frame) => frame,
        Err(e) => {
            eprintln!("Error: {}: {}", input.display(), e);
            process::exit(1);
        }
    };
    if !json {
        print!("{}", frame);
        return;
    }
    match serde_json::to_string_pretty(&frame) {
        Ok(text) => println!("{}", text),
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}

fn run_compile(input: &Path, config: &CompilerConfig) {
    let source = read_source(input);
    let program = match compile_source(&source, config, config.create_engine()) {
        Ok(program) => program,
        Err(e) => {
            eprintln!("Error: {}: {}", input.display(), e);
            process::exit(1);
        }
    };
    print!("{}", dump_component(program.component.as_ref()));

    let errors = program.diagnostics.errors();
    for error in &errors {
        eprintln!("Warning: {}", error);
    }
    let reported = program.diagnostics.reported();
    if reported > 0 {
        eprintln!("{} observer error(s)", reported);
    }
}

fn run_script(input: &Path, scripts: Vec<String>, arg: Option<String>, config: CompilerConfig) {
    let source = read_source(input);
    let name = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "main".to_string());

    let mut thread = ScriptThread::new(name, source, config);
    for script in scripts {
        thread = thread.with_script(script);
    }
    if let Some(arg) = arg {
        thread = thread.with_argument(arg);
    }

    let status = match thread.spawn() {
        Ok(handle) => handle.join(),
        Err(e) => {
            eprintln!("Error: failed to start script thread: {}", e);
            1
        }
    };
    process::exit(status);
}
