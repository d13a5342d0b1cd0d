use std::{
    fs,
    io::{self, Read},
    path::PathBuf,
};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use sample_runner::{
    fixtures::Fixture,
    layout::remove_common_indent,
    parse,
    run::DEFAULT_MAX_DEPTH,
    run_source,
    structure::outline,
    IndentationPolicy, RunnerConfig,
};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log more. `-v` for debug, `-vv` for trace. `RUST_LOG` takes precedence.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a program, printing its output as it goes
    Run {
        #[command(flatten)]
        source: SourceArgs,
        /// Reject misindented lines instead of warning about them
        #[arg(long)]
        strict: bool,
        /// Stop after this many statements
        #[arg(long)]
        max_steps: Option<u64>,
        #[arg(long, default_value_t = DEFAULT_MAX_DEPTH)]
        max_depth: usize,
    },
    /// Parse a program and report indentation diagnostics
    Check {
        #[command(flatten)]
        source: SourceArgs,
        #[arg(long)]
        strict: bool,
        #[arg(long)]
        json: bool,
    },
    /// Print the block structure of a program
    Outline {
        #[command(flatten)]
        source: SourceArgs,
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args, Debug)]
struct SourceArgs {
    /// The source file, or `-` for stdin
    #[arg(required_unless_present = "fixture")]
    file: Option<PathBuf>,
    /// Use a built in fixture instead of a file
    #[arg(long, conflicts_with = "file")]
    fixture: Option<Fixture>,
}

impl SourceArgs {
    fn name(&self) -> String {
        match (&self.fixture, &self.file) {
            (Some(fixture), _) => fixture.file_name(),
            (None, Some(file)) => file.display().to_string(),
            (None, None) => "<none>".to_owned(),
        }
    }

    fn read(&self) -> Result<String> {
        let source = match (&self.fixture, &self.file) {
            (Some(fixture), _) => fixture.source().to_owned(),
            (None, Some(file)) if file.as_os_str() == "-" => {
                let mut source = String::new();
                io::stdin()
                    .read_to_string(&mut source)
                    .context("Couldn't read stdin")?;
                source
            }
            (None, Some(file)) => fs::read_to_string(file)
                .with_context(|| format!("Couldn't read '{}'", file.display()))?,
            (None, None) => anyhow::bail!("No source given"),
        };

        Ok(remove_common_indent(&source))
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Run {
            source,
            strict,
            max_steps,
            max_depth,
        } => {
            let config = RunnerConfig {
                indentation: policy(strict),
                max_steps,
                max_depth,
                echo: true,
            };
            let report = run_source(&source.read()?, &config)
                .with_context(|| format!("Couldn't parse '{}'", source.name()))?;

            if let Some(error) = report.error {
                return Err(error).with_context(|| format!("'{}' failed", source.name()));
            }
        }
        Command::Check {
            source,
            strict,
            json,
        } => {
            let module = parse(&source.read()?, policy(strict))
                .with_context(|| format!("Couldn't parse '{}'", source.name()))?;
            let diagnostics = module.diagnostics();

            if json {
                println!("{}", serde_json::to_string_pretty(diagnostics)?);
            } else {
                for diagnostic in diagnostics {
                    println!(
                        "{}:{}: {}\n{}",
                        source.name(),
                        diagnostic.line,
                        diagnostic.kind,
                        diagnostic.text
                    );
                }

                println!("{}: {} diagnostic(s)", source.name(), diagnostics.len());
            }
        }
        Command::Outline { source, json } => {
            let module = parse(&source.read()?, IndentationPolicy::Lenient)
                .with_context(|| format!("Couldn't parse '{}'", source.name()))?;
            let blocks = outline(&module);

            if json {
                println!("{}", serde_json::to_string_pretty(&blocks)?);
            } else {
                for block in blocks {
                    println!(
                        "{:indent$}{}{} {}-{}",
                        "",
                        block.kind,
                        block.name.map(|name| format!(" {name}")).unwrap_or_default(),
                        block.start_line,
                        block.end_line,
                        indent = block.depth * 4
                    );
                }
            }
        }
    }

    Ok(())
}

fn policy(strict: bool) -> IndentationPolicy {
    if strict {
        IndentationPolicy::Strict
    } else {
        IndentationPolicy::Lenient
    }
}

/// Logs go to stderr, so they never mix with program output.
fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr).with_target(false))
        .with(filter)
        .init();
}
