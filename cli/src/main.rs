use std::{
    fs,
    path::{Component, Path, PathBuf},
};

use anyhow::{Context, Result, bail};
use clap::{ArgAction, Parser, Subcommand};
use conscript_core::{Console, ConsoleConfig, LogLevel, Program, vm::dso};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;


#[derive(Debug, Parser)]
#[command(name = "conscript", author, version, about = "Compile, run and inspect console scripts", long_about = None)]
struct CliArgs {
    /// Console settings (TOML)
    #[arg(long, value_name = "FILE", global = true, value_parser = parse_sanitized_path)]
    config: Option<PathBuf>,

    /// More log output; repeat for more detail. Overrides RUST_LOG.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Compile a JSON statement tree into a persisted unit.
    Compile {
        #[arg(value_name = "INPUT", value_parser = parse_sanitized_path)]
        input: PathBuf,
        /// Defaults to INPUT with a `.dso` extension
        #[arg(short, long, value_name = "OUTPUT", value_parser = parse_sanitized_path)]
        output: Option<PathBuf>,
    },
    /// Run a JSON statement tree or a persisted unit and print its result.
    Run {
        #[arg(value_name = "FILE", value_parser = parse_sanitized_path)]
        file: PathBuf,
        /// Afterwards call this global function with ARGS and print its result
        #[arg(long, value_name = "FUNCTION")]
        call: Option<String>,
        #[arg(value_name = "ARGS", requires = "call")]
        args: Vec<String>,
    },
    /// Print the instructions of a JSON statement tree or persisted unit.
    Disasm {
        #[arg(value_name = "FILE", value_parser = parse_sanitized_path)]
        file: PathBuf,
    },
}

/// What a path on the command line holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum InputKind {
    Tree,
    Image,
}

pub(crate) fn input_kind(path: &Path) -> InputKind {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("json") => InputKind::Tree,
        _ => InputKind::Image,
    }
}

pub(crate) fn default_output(input: &Path) -> PathBuf {
    input.with_extension("dso")
}

pub(crate) fn sanitize_path(raw: &str) -> Result<PathBuf> {
    let p = Path::new(raw);
    if p.components().any(|c| matches!(c, Component::ParentDir)) {
        bail!("Parent directory components ('..') are not allowed in file paths.");
    }
    Ok(p.to_path_buf())
}

fn parse_sanitized_path(raw: &str) -> Result<PathBuf, String> {
    sanitize_path(raw).map_err(|e| e.to_string())
}

pub(crate) fn filter_for_verbosity(verbose: u8) -> Option<&'static str> {
    match verbose {
        0 => None,
        1 => Some("info"),
        2 => Some("debug"),
        _ => Some("trace"),
    }
}

fn init_tracing(verbose: u8) {
    let filter = match filter_for_verbosity(verbose) {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    };
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

fn load_config(path: Option<&Path>) -> Result<ConsoleConfig> {
    let Some(path) = path else {
        return Ok(ConsoleConfig::default());
    };
    let text = fs::read_to_string(path).with_context(|| format!("reading config '{}'", path.display()))?;
    ConsoleConfig::from_toml_str(&text).with_context(|| format!("in config '{}'", path.display()))
}

fn new_console(config: ConsoleConfig) -> Console {
    let mut console = Console::with_config(config);
    conscript_stdlib::register_stdlib(&mut console);
    // Warnings and errors already reach stderr through tracing.
    console.add_consumer(|level, line| {
        if level == LogLevel::Normal {
            println!("{line}");
        }
    });
    console
}

fn read_tree(path: &Path) -> Result<Program> {
    let text = fs::read_to_string(path).with_context(|| format!("reading '{}'", path.display()))?;
    Program::from_json(&text).with_context(|| format!("in '{}'", path.display()))
}

fn unit_name(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Compile or load `path` into a unit owned by `console`.
fn open_unit(console: &mut Console, path: &Path) -> Result<std::rc::Rc<conscript_core::vm::CompiledUnit>> {
    let name = unit_name(path);
    match input_kind(path) {
        InputKind::Tree => {
            let program = read_tree(path)?;
            console.compile(Some(&name), &program)
        }
        InputKind::Image => {
            let bytes = fs::read(path).with_context(|| format!("reading '{}'", path.display()))?;
            match console.load_unit(&bytes, Some(&name))? {
                Some(unit) => Ok(unit),
                None => bail!(
                    "'{}' was written by another format version; recompile it from its source",
                    path.display()
                ),
            }
        }
    }
}

fn compile(input: &Path, output: Option<&Path>, config: ConsoleConfig) -> Result<()> {
    let mut console = Console::with_config(config);
    let program = read_tree(input)?;
    let unit = console.compile(Some(&unit_name(input)), &program)?;
    let output = output.map(Path::to_path_buf).unwrap_or_else(|| default_output(input));
    let bytes = dso::write_unit(&unit);
    fs::write(&output, &bytes).with_context(|| format!("writing '{}'", output.display()))?;
    info!(input = %input.display(), output = %output.display(), bytes = bytes.len(), "compiled");
    Ok(())
}

fn run(file: &Path, call: Option<&str>, args: &[String], config: ConsoleConfig) -> Result<()> {
    let mut console = new_console(config);
    let unit = open_unit(&mut console, file)?;
    let result = console.run_unit(&unit);
    debug!(file = %file.display(), "top-level statements finished");
    if !result.is_empty() {
        println!("{result}");
    }
    if let Some(function) = call {
        let mut argv: Vec<&str> = vec![function];
        argv.extend(args.iter().map(String::as_str));
        let result = console.execute(&argv);
        if !result.is_empty() {
            println!("{result}");
        }
    }
    Ok(())
}

fn disasm(file: &Path, config: ConsoleConfig) -> Result<()> {
    let mut console = Console::with_config(config);
    let unit = open_unit(&mut console, file)?;
    print!("{}", unit.disassemble());
    Ok(())
}

fn main() -> Result<()> {
    let CliArgs {
        config,
        verbose,
        command,
    } = CliArgs::parse();
    init_tracing(verbose);
    let config = load_config(config.as_deref())?;

    match command {
        Commands::Compile { input, output } => compile(&input, output.as_deref(), config),
        Commands::Run { file, call, args } => run(&file, call.as_deref(), &args, config),
        Commands::Disasm { file } => disasm(&file, config),
    }
}
