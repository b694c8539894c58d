//! Command-line tools for the guide agent: check plans, rank elements, and
//! manage the configuration file.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use serde::Deserialize;

use guide::core::grounding::{DEFAULT_MAX_RESULTS, rank};
use guide::core::payload::parse_json_payload;
use guide::core::snapshot::{Element, PageSnapshot};
use guide::core::validator::{MAX_PLAN_STEPS, validate_plan};
use guide::exit_codes;
use guide::io::config::{GuideConfig, load_config, write_config};
use guide::logging;

const DEFAULT_CONFIG_PATH: &str = "guide.toml";

#[derive(Parser)]
#[command(
    name = "guide",
    version,
    about = "Orchestration tools for the web-page guide agent"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Validate and sanitize a plan (`{"steps": [...]}`); `-` reads stdin.
    Validate {
        plan: PathBuf,
        /// Steps kept from the plan.
        #[arg(long, default_value_t = MAX_PLAN_STEPS)]
        max_steps: usize,
    },
    /// Rank snapshot elements against an instruction.
    Rank {
        instruction: String,
        /// JSON snapshot: `{"elements": [...]}` or a bare element array.
        #[arg(short, long)]
        snapshot: PathBuf,
        #[arg(long, default_value_t = DEFAULT_MAX_RESULTS)]
        max_results: usize,
    },
    /// Manage the TOML configuration file.
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Write the default configuration.
    Init {
        #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
        path: PathBuf,
        /// Overwrite an existing file.
        #[arg(short, long)]
        force: bool,
    },
    /// Print the effective configuration (defaults when the file is missing).
    Show {
        #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
        path: PathBuf,
    },
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SnapshotFile {
    Page(PageSnapshot),
    Elements(Vec<Element>),
}

impl SnapshotFile {
    fn into_elements(self) -> Vec<Element> {
        match self {
            SnapshotFile::Page(page) => page.elements,
            SnapshotFile::Elements(elements) => elements,
        }
    }
}

fn main() -> ExitCode {
    logging::init();
    match run() {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            eprintln!("{err:#}");
            ExitCode::from(exit_code(exit_codes::INVALID))
        }
    }
}

fn run() -> Result<u8> {
    let cli = Cli::parse();
    let code = match cli.command {
        Command::Validate { plan, max_steps } => cmd_validate(&plan, max_steps)?,
        Command::Rank {
            instruction,
            snapshot,
            max_results,
        } => cmd_rank(&instruction, &snapshot, max_results)?,
        Command::Config { command } => match command {
            ConfigCommand::Init { path, force } => cmd_config_init(&path, force)?,
            ConfigCommand::Show { path } => cmd_config_show(&path)?,
        },
    };
    Ok(exit_code(code))
}

fn exit_code(code: i32) -> u8 {
    u8::try_from(code).unwrap_or(1)
}

fn cmd_validate(path: &Path, max_steps: usize) -> Result<i32> {
    let raw = read_input(path)?;
    let payload = parse_json_payload(&raw).context("parse plan json")?;
    let validation = validate_plan(&payload, max_steps);
    println!(
        "{}",
        serde_json::to_string_pretty(&validation).context("serialize validation")?
    );
    Ok(if validation.is_usable() {
        exit_codes::OK
    } else {
        exit_codes::INVALID
    })
}

fn cmd_rank(instruction: &str, snapshot: &Path, max_results: usize) -> Result<i32> {
    let raw = read_input(snapshot)?;
    let file: SnapshotFile = serde_json::from_str(&raw)
        .with_context(|| format!("parse snapshot {}", snapshot.display()))?;
    let elements = file.into_elements();
    let ranked = rank(instruction, &elements, max_results);
    if ranked.is_empty() {
        eprintln!("no element matches {instruction:?}");
        return Ok(exit_codes::NO_MATCH);
    }
    for entry in &ranked {
        println!("{:.1}\t{}", entry.score, entry.element.id);
    }
    Ok(exit_codes::OK)
}

fn cmd_config_init(path: &Path, force: bool) -> Result<i32> {
    if path.exists() && !force {
        bail!(
            "{} already exists (use --force to overwrite)",
            path.display()
        );
    }
    write_config(path, &GuideConfig::default())?;
    println!("{}", path.display());
    Ok(exit_codes::OK)
}

fn cmd_config_show(path: &Path) -> Result<i32> {
    let cfg = load_config(path)?;
    print!(
        "{}",
        toml::to_string_pretty(&cfg).context("serialize config toml")?
    );
    Ok(exit_codes::OK)
}

fn read_input(path: &Path) -> Result<String> {
    if path.as_os_str() == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("read stdin")?;
        return Ok(buf);
    }
    fs::read_to_string(path).with_context(|| format!("read {}", path.display()))
}
