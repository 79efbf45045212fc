use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use walkdir::WalkDir;

#[derive(Parser)]
#[command(author, version, about = "Project automation commands", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run cargo nextest with default configuration
    Nextest {
        #[arg(long)]
        profile: Option<String>,
        #[arg(long)]
        release: bool,
    },
    /// Validate `.goat` artifacts and TOML assets in the workspace
    Check {
        /// Directory to scan; the workspace root when omitted
        #[arg(long)]
        dir: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Nextest { profile, release } => run_nextest(profile, release)?,
        Commands::Check { dir } => {
            let root = match dir {
                Some(dir) => dir,
                None => workspace_root()?,
            };
            run_check(&root)?
        }
    }
    Ok(())
}

fn run_nextest(profile: Option<String>, release: bool) -> Result<()> {
    let mut cmd = Command::new("cargo");
    cmd.arg("nextest").arg("run").arg("--workspace");
    if let Some(profile) = profile {
        cmd.arg("--profile").arg(profile);
    }
    if release {
        cmd.arg("--release");
    }
    let status = cmd.status()?;
    if !status.success() {
        bail!("cargo nextest run failed");
    }
    Ok(())
}

fn workspace_root() -> Result<PathBuf> {
    let metadata = cargo_metadata::MetadataCommand::new()
        .no_deps()
        .exec()
        .context("failed to read cargo metadata")?;
    Ok(metadata.workspace_root.into_std_path_buf())
}

fn run_check(root: &Path) -> Result<()> {
    let mut checked = 0usize;
    let mut failures = Vec::new();

    let entries = WalkDir::new(root).into_iter().filter_entry(|entry| {
        let name = entry.file_name().to_string_lossy();
        !(name == "target" || name == ".git" || name == "examples")
    });
    for entry in entries {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let result = match path.extension().and_then(|ext| ext.to_str()) {
            Some("goat") => check_artifact(path),
            Some("toml") if path.components().any(|part| part.as_os_str() == "assets") => {
                check_toml(path)
            }
            _ => continue,
        };
        checked += 1;
        if let Err(err) = result {
            failures.push(format!("{}: {err:#}", path.display()));
        }
    }

    println!("checked {checked} file(s)");
    if !failures.is_empty() {
        for failure in &failures {
            eprintln!("{failure}");
        }
        bail!("{} file(s) failed validation", failures.len());
    }
    Ok(())
}

fn check_artifact(path: &Path) -> Result<()> {
    goatdom::app::artifact::read_artifact(path)?;
    Ok(())
}

fn check_toml(path: &Path) -> Result<()> {
    let data = fs::read_to_string(path)?;
    data.parse::<toml::Table>().context("not valid TOML")?;
    Ok(())
}
