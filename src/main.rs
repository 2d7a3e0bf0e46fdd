//! nc-forge CLI
//!
//! Usage:
//!   nc-forge [OPTIONS] <COMMAND>
//!
//! Commands:
//!   list       List the solutions in the catalog
//!   params     Show the parameters a solution uses
//!   validate   Validate resolved values for a solution
//!   render     Render one or all templates of a solution
//!   library    Inspect or edit the parameter library
//!
//! Options:
//!   -c, --config <FILE>  Application configuration (TOML)
//!   -v, --verbose        Raise log level (repeat for debug)

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use nc_forge::{AppConfig, CoreError, Value, ValueMap, Workbench};

#[derive(Parser)]
#[command(name = "nc-forge")]
#[command(about = "Generate NC programs from parameterized templates")]
struct Cli {
    /// Application configuration file (TOML format)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Raise log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the solutions in the catalog
    List,

    /// Show the parameters of a solution
    Params {
        solution: String,
        /// Show every effective parameter, not only the ones templates use
        #[arg(short, long)]
        all: bool,
    },

    /// Validate resolved values for a solution
    Validate {
        solution: String,
        /// Caller value, as NAME=VALUE
        #[arg(short, long = "set", value_name = "NAME=VALUE")]
        set: Vec<String>,
    },

    /// Render a template; without a template name every template is
    /// rendered into the exports directory
    Render {
        solution: String,
        template: Option<String>,
        /// Caller value, as NAME=VALUE
        #[arg(short, long = "set", value_name = "NAME=VALUE")]
        set: Vec<String>,
        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Write to the exports directory instead of stdout
        #[arg(short, long)]
        export: bool,
    },

    /// Inspect or edit the parameter library
    Library {
        #[command(subcommand)]
        command: LibraryCommand,
    },
}

#[derive(Subcommand)]
enum LibraryCommand {
    /// Summary of groups and parameter types
    Info,
    /// Check the library invariants
    Validate,
    /// Print a group (or every group) in file form
    Show { group: Option<String> },
    /// Delete a group and its parameters
    RemoveGroup { group: String },
    /// Create a group from a YAML map of parameter definitions
    Import { group: String, file: PathBuf },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = match &cli.config {
        Some(path) => match AppConfig::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Error loading configuration '{}': {}", path.display(), e);
                process::exit(1);
            }
        },
        None => AppConfig::default(),
    };

    let mut bench = match Workbench::open(config) {
        Ok(bench) => bench,
        Err(e) => fail(&e),
    };

    if let Err(e) = run(&mut bench, cli.command) {
        report(&e);
        fail(&e);
    }
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn run(bench: &mut Workbench, command: Command) -> Result<(), CoreError> {
    match command {
        Command::List => {
            for solution in bench.solutions() {
                println!(
                    "{:<20} {} (v{}, {} template(s))",
                    solution.id,
                    solution.name,
                    solution.version,
                    solution.templates.len()
                );
            }
            Ok(())
        }
        Command::Params { solution, all } => {
            bench.activate(&solution)?;
            let values = bench.resolve(&ValueMap::new())?;
            if all {
                for param in bench.effective_parameters()? {
                    print_parameter(param, values.get(&param.name));
                }
            } else {
                for presented in bench.presentable_parameters()? {
                    println!("[{}] {}", presented.group.name, presented.group.description);
                    for param in presented.parameters {
                        print_parameter(param, values.get(&param.name));
                    }
                }
            }
            Ok(())
        }
        Command::Validate { solution, set } => {
            let caller = parse_assignments(&set)?;
            bench.activate(&solution)?;
            bench.validate(&caller)?;
            println!("solution '{}' is valid", solution);
            Ok(())
        }
        Command::Render {
            solution,
            template,
            set,
            output,
            export,
        } => {
            let caller = parse_assignments(&set)?;
            bench.activate(&solution)?;
            match template {
                Some(name) => {
                    let result = bench.render(&name, &caller);
                    if output.is_some() || export {
                        let path = bench.write_output(&result, output.as_deref())?;
                        eprintln!("wrote {}", path.display());
                    } else {
                        let content = result.outcome?;
                        let mut stdout = io::stdout();
                        stdout
                            .write_all(content.as_bytes())
                            .map_err(|e| CoreError::io(Path::new("<stdout>"), e))?;
                    }
                }
                None => {
                    let mut failures = 0;
                    for result in bench.render_all(&caller)? {
                        match bench.write_output(&result, None) {
                            Ok(path) => eprintln!("wrote {}", path.display()),
                            Err(e) => {
                                report(&e);
                                eprintln!("Error: {}", e);
                                failures += 1;
                            }
                        }
                    }
                    if failures > 0 {
                        process::exit(1);
                    }
                }
            }
            Ok(())
        }
        Command::Library { command } => run_library(bench, command),
    }
}

fn run_library(bench: &mut Workbench, command: LibraryCommand) -> Result<(), CoreError> {
    match command {
        LibraryCommand::Info => {
            println!("{}", bench.library().info());
            Ok(())
        }
        LibraryCommand::Validate => {
            bench.library().validate_library()?;
            println!("parameter library is valid");
            Ok(())
        }
        LibraryCommand::Show { group } => {
            let names: Vec<String> = match group {
                Some(name) => vec![name],
                None => bench
                    .library()
                    .library()
                    .group_names()
                    .into_iter()
                    .map(str::to_string)
                    .collect(),
            };
            for name in names {
                println!("# {}", name);
                print!("{}", bench.library().export_group(&name)?);
            }
            Ok(())
        }
        LibraryCommand::RemoveGroup { group } => {
            bench.library_mut().remove_group(&group)?;
            println!("removed group '{}'", group);
            Ok(())
        }
        LibraryCommand::Import { group, file } => {
            let text = fs::read_to_string(&file).map_err(|e| CoreError::io(&file, e))?;
            let definitions: ValueMap =
                serde_yaml::from_str(&text).map_err(|e| CoreError::malformed(&file, e.to_string()))?;
            let source = file.display().to_string();
            let count = bench.library_mut().import_group(&group, &source, &definitions)?;
            println!("imported {} parameter(s) into '{}'", count, group);
            Ok(())
        }
    }
}

/// Parse `NAME=VALUE` pairs; values are typed loosely (numbers, booleans)
fn parse_assignments(pairs: &[String]) -> Result<ValueMap, CoreError> {
    let mut values = ValueMap::new();
    for pair in pairs {
        let (name, raw) = pair.split_once('=').ok_or_else(|| {
            CoreError::ValidationFailure(vec![nc_forge::Violation::new(
                format!("argument '{}'", pair),
                "expected NAME=VALUE",
            )])
        })?;
        values.insert(name.trim().to_string(), Value::parse_loose(raw));
    }
    Ok(values)
}

fn print_parameter(param: &nc_forge::GlobalParameter, value: Option<&Value>) {
    let value = value.map(|v| v.to_string()).unwrap_or_default();
    let unit = if param.unit.is_empty() {
        String::new()
    } else {
        format!(" {}", param.unit)
    };
    let required = if param.required { "" } else { " (optional)" };
    println!(
        "  {:<20} {:<8} = {}{}{}  {}",
        param.name,
        param.kind.as_str(),
        value,
        unit,
        required,
        param.description
    );
}

/// Print an annotated source report for template syntax errors
fn report(err: &CoreError) {
    if let CoreError::MalformedDocument { path, .. } = err {
        let rendered = fs::read_to_string(path).ok().and_then(|source| err.report(&source));
        if let Some(rendered) = rendered {
            eprintln!("{}", rendered);
        }
    }
}

fn fail(err: &CoreError) -> ! {
    if err.violations().is_empty() {
        eprintln!("Error: {}", err);
    } else {
        eprintln!("Error: validation failed");
        for violation in err.violations() {
            eprintln!("  - {}", violation);
        }
    }
    process::exit(1);
}
