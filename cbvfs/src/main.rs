mod output;

use anyhow::{Context, Result};
use cbvfs_core::{Entry, EntryRef, LocalCookbooksDir, VersionedName, resolve};
use clap::{Parser, Subcommand};
use output::{
    CookbookInfo, LsOutput, OutputWriter, ParseOutput, ParsedName, Report, TreeEntryInfo,
    TreeOutput,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// cbvfs - Browse versioned cookbook repositories
#[derive(Parser)]
#[command(name = "cbvfs")]
#[command(about = "Virtual filesystem over versioned cookbook repositories", long_about = None)]
#[command(version)]
struct Cli {
    /// Repository directory (defaults to CBVFS_REPO env var or the current directory)
    #[arg(short, long, global = true)]
    repo: Option<PathBuf>,

    /// Output results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Enable debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List versioned cookbooks in the repository
    Ls {
        /// Show cookbook name and version columns
        #[arg(short, long)]
        long: bool,
    },

    /// List the files of one versioned cookbook
    Tree {
        /// Versioned cookbook name, e.g. apache2-1.0.1
        cookbook: String,
    },

    /// Split versioned cookbook names into name and version
    Parse {
        /// Names to parse
        #[arg(required = true)]
        names: Vec<String>,
    },
}

/// Exit code when a command fails.
const EXIT_FAILURE: u8 = 1;

/// Exit code when `parse` is given a name that does not match.
const EXIT_INVALID_NAME: u8 = 2;

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let output = OutputWriter::new(cli.json);

    // Determine repository: CLI arg > CBVFS_REPO env var > current directory
    let repo = cli
        .repo
        .or_else(|| std::env::var("CBVFS_REPO").ok().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("."));

    let result = match cli.command {
        Commands::Ls { long } => cmd_ls(&output, &repo, long),
        Commands::Tree { cookbook } => cmd_tree(&output, &repo, &cookbook),
        Commands::Parse { names } => cmd_parse(&output, &names),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            output.write_error(&e, EXIT_FAILURE);
            ExitCode::from(EXIT_FAILURE)
        }
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn open_repo(repo: &Path) -> Result<EntryRef> {
    let dir = LocalCookbooksDir::open(repo)
        .with_context(|| format!("Failed to open repository at {}", repo.display()))?;
    Ok(Arc::new(dir))
}

fn cmd_ls(output: &OutputWriter, repo: &Path, long: bool) -> Result<u8> {
    let cookbooks = open_repo(repo)?;
    let children = cookbooks
        .children()
        .with_context(|| format!("Failed to list cookbooks in {}", repo.display()))?;

    let mut infos = Vec::with_capacity(children.len());
    for child in children {
        // Listing only yields names that parse
        let versioned = VersionedName::parse(child.name())?;
        infos.push(CookbookInfo {
            name: child.name().to_string(),
            cookbook: versioned.name,
            version: versioned.version,
            path: child.path().to_string(),
        });
    }

    let report = Report::ok(LsOutput {
        repo: repo.display().to_string(),
        cookbooks: infos,
    });
    output.write(&report, || {
        let cookbooks = &report.data.cookbooks;
        if cookbooks.is_empty() {
            return vec!["No versioned cookbooks".to_string()];
        }
        cookbooks
            .iter()
            .map(|info| {
                if long {
                    format!("{:<40} {:<24} {}", info.name, info.cookbook, info.version)
                } else {
                    info.name.clone()
                }
            })
            .collect()
    })?;

    Ok(0)
}

fn cmd_tree(output: &OutputWriter, repo: &Path, cookbook: &str) -> Result<u8> {
    let cookbooks = open_repo(repo)?;
    let root = resolve(&cookbooks, cookbook)
        .with_context(|| format!("Cookbook not found: {}", cookbook))?;

    let mut entries = Vec::new();
    collect_tree(&root, root.path(), &mut entries)
        .with_context(|| format!("Failed to list {}", cookbook))?;

    let report = Report::ok(TreeOutput {
        cookbook: cookbook.to_string(),
        entries,
    });
    output.write(&report, || {
        report
            .data
            .entries
            .iter()
            .map(|e| {
                let suffix = if e.entry_type == "dir" { "/" } else { "" };
                format!("{}{}", e.path, suffix)
            })
            .collect()
    })?;

    Ok(0)
}

/// Depth-first listing of `entry`, paths relative to `base`.
fn collect_tree(
    entry: &EntryRef,
    base: &str,
    out: &mut Vec<TreeEntryInfo>,
) -> cbvfs_core::Result<()> {
    for child in entry.children()? {
        let relative = child
            .path()
            .strip_prefix(base)
            .unwrap_or(child.path())
            .trim_start_matches('/')
            .to_string();
        out.push(TreeEntryInfo {
            path: relative,
            entry_type: if child.is_dir() { "dir" } else { "file" }.to_string(),
        });
        if child.is_dir() {
            collect_tree(child, base, out)?;
        }
    }
    Ok(())
}

fn cmd_parse(output: &OutputWriter, names: &[String]) -> Result<u8> {
    let parsed: Vec<ParsedName> = names
        .iter()
        .map(|input| match VersionedName::parse(input) {
            Ok(v) => ParsedName {
                input: input.clone(),
                valid: true,
                cookbook: Some(v.name),
                version: Some(v.version),
            },
            Err(_) => ParsedName {
                input: input.clone(),
                valid: false,
                cookbook: None,
                version: None,
            },
        })
        .collect();

    let all_valid = parsed.iter().all(|p| p.valid);
    let result_code = if all_valid { 0 } else { EXIT_INVALID_NAME };

    let report = Report::new(result_code, ParseOutput { names: parsed });
    output.write(&report, || {
        report
            .data
            .names
            .iter()
            .map(|p| match (&p.cookbook, &p.version) {
                (Some(cookbook), Some(version)) => {
                    format!("{} {} {}", p.input, cookbook, version)
                }
                _ => format!("{} (not a versioned cookbook name)", p.input),
            })
            .collect()
    })?;

    Ok(result_code)
}
