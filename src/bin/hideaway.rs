//! # Hideaway CLI
//!
//! Command-line front end for building a Hideaway site and for checking a
//! secret against a published one.
//!
//! ## Usage
//! ```bash
//! # One-off production build (clears the previous output)
//! HIDEAWAY_SECRET_KEY=... hideaway build --mode production
//!
//! # Development: build once, then rebuild on every descriptor change
//! HIDEAWAY_SECRET_KEY=... hideaway watch --source ./source
//!
//! # Client side: unlock the secret partition and remember it for 30 days
//! hideaway unlock --site ./dist/api --days 30
//!
//! # Show what the cached secret unlocks
//! hideaway list --site ./dist/api
//! ```

use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use humantime::format_duration;
use indicatif::{ProgressBar, ProgressStyle};
use hideaway::watch::SourceWatcher;
use hideaway::{
    format_bytes, BuildMode, FileSecretCache, HideawayError, Outcome, PathTree, PublishReport, Publisher,
    PublisherBuilder, Result, ServerKey, SessionContext, SiteReader,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Hideaway CLI - publish static indices with a key-gated secret partition
#[derive(Parser)]
#[command(name = "hideaway")]
#[command(version)]
#[command(about = "Publish static indices with a key-gated secret partition")]
#[command(long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args, Clone)]
struct BuildArgs {
    /// Directory holding the descriptor files
    #[arg(short, long, default_value = "source")]
    source: PathBuf,

    /// Output directory (defaults to public/api or dist/api by mode)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Project directory the default output is resolved against
    #[arg(long, default_value = ".")]
    project: PathBuf,

    /// Target environment
    #[arg(short, long, value_enum, default_value = "development")]
    mode: ModeArg,

    /// Server-held key; never written to the output
    #[arg(short, long, env = "HIDEAWAY_SECRET_KEY", hide_env_values = true)]
    key: String,

    /// Remove the output directory before building
    #[arg(long)]
    clean: bool,
}

#[derive(clap::Args, Clone)]
struct SiteArgs {
    /// Published output directory to read
    #[arg(long, default_value = "dist/api")]
    site: PathBuf,

    /// File holding the cached intermediate value
    #[arg(long, default_value = ".hideaway-secret.json")]
    cache: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the site once
    Build {
        #[command(flatten)]
        args: BuildArgs,

        /// Show progress
        #[arg(long)]
        progress: bool,
    },

    /// Build, then rebuild whenever a descriptor changes
    Watch {
        #[command(flatten)]
        args: BuildArgs,

        /// Quiet period before rebuilding, in milliseconds
        #[arg(long, default_value = "300")]
        debounce: u64,
    },

    /// Print the opaque directory name of the current epoch
    Resolve {
        /// Published output directory
        #[arg(short, long, default_value = "dist/api")]
        output: PathBuf,

        /// Server-held key
        #[arg(short, long, env = "HIDEAWAY_SECRET_KEY", hide_env_values = true)]
        key: String,
    },

    /// Check a secret against a published site and cache the result
    Unlock {
        #[command(flatten)]
        site: SiteArgs,

        /// The shared secret (read from HIDEAWAY_SECRET if omitted)
        #[arg(long, env = "HIDEAWAY_SECRET", hide_env_values = true)]
        secret: String,

        /// Days to remember a successful check
        #[arg(long, default_value = "7")]
        days: u32,
    },

    /// Check the cached secret against a published site
    Status {
        #[command(flatten)]
        site: SiteArgs,
    },

    /// Print the index the cached secret gives access to
    #[command(alias = "ls")]
    List {
        #[command(flatten)]
        site: SiteArgs,
    },

    /// Forget the cached secret
    Lock {
        #[command(flatten)]
        site: SiteArgs,
    },
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum ModeArg {
    Development,
    Production,
}

impl From<ModeArg> for BuildMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Development => BuildMode::Development,
            ModeArg::Production => BuildMode::Production,
        }
    }
}

fn main() {
    let cli = Cli::parse();

    // Set up logging
    if cli.verbose || std::env::var_os("RUST_LOG").is_some() {
        let filter = if cli.verbose {
            EnvFilter::new("hideaway=debug")
        } else {
            EnvFilter::from_default_env()
        };
        tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
    }

    // Disable colors if needed
    if std::env::var("NO_COLOR").is_ok() {
        colored::control::set_override(false);
    }

    if let Err(e) = run(cli) {
        eprintln!("{}: {}", "Error".red().bold(), e.user_message());
        std::process::exit(1);
    }
}

/// Main command runner
fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Build { args, progress } => cmd_build(args, progress),
        Commands::Watch { args, debounce } => cmd_watch(args, debounce),
        Commands::Resolve { output, key } => cmd_resolve(output, key),
        Commands::Unlock { site, secret, days } => block_on(cmd_unlock(site, secret, days)),
        Commands::Status { site } => block_on(cmd_status(site)),
        Commands::List { site } => block_on(cmd_list(site)),
        Commands::Lock { site } => cmd_lock(site),
    }
}

fn block_on<F: std::future::Future<Output = Result<()>>>(future: F) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build()?;
    runtime.block_on(future)
}

fn make_publisher(args: BuildArgs) -> Result<Publisher> {
    let mode = BuildMode::from(args.mode);
    let output = args.output.unwrap_or_else(|| mode.default_output_root(&args.project));
    // Production output is always rebuilt from scratch
    let clean = args.clean || mode == BuildMode::Production;

    PublisherBuilder::new()
        .mode(mode)
        .clean_before_build(clean)
        .build(args.source, output, ServerKey::new(args.key)?)
}

/// Build the site once
///
/// Writes the epoch record, both indices and every payload, then prints a
/// short report.
fn cmd_build(args: BuildArgs, show_progress: bool) -> Result<()> {
    let publisher = make_publisher(args)?;
    let ctx = publisher.context();
    println!(
        "{} {} → {} ({})",
        "Building".blue().bold(),
        ctx.source_root.display().to_string().cyan(),
        ctx.output_root.display().to_string().cyan(),
        ctx.mode
    );

    let progress = if show_progress {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message("Scanning descriptors...");
        pb.enable_steady_tick(Duration::from_millis(80));
        Some(pb)
    } else {
        None
    };

    let report = publisher.publish();
    if let Some(pb) = progress {
        pb.finish_and_clear();
    }

    print_report(&report?, &publisher.context().output_root);
    Ok(())
}

fn print_report(report: &PublishReport, output_root: &Path) {
    println!("{} Published epoch {}", "✓".green().bold(), report.record.update_time.to_string().yellow());
    if report.cleaned {
        println!("  {}", "Previous output removed".dimmed());
    }
    println!(
        "  Public: {} entries, {} payloads",
        report.public.search_entries.to_string().cyan(),
        report.public.payloads_written.to_string().cyan()
    );
    println!(
        "  Full:   {} entries, {} secret payloads",
        report.full.search_entries.to_string().cyan(),
        report.full.payloads_written.to_string().cyan()
    );
    if let Ok(size) = dir_size(output_root) {
        println!("  Size: {}", format_bytes(size).cyan());
    }
    println!(
        "  Time: {}",
        format_duration(Duration::from_millis(report.duration_ms)).to_string().cyan()
    );
}

/// Build, then keep rebuilding on descriptor changes until interrupted
fn cmd_watch(mut args: BuildArgs, debounce_ms: u64) -> Result<()> {
    // Every watched build starts from an empty output root
    args.clean = true;
    let publisher = make_publisher(args)?;
    let output_root = publisher.context().output_root.clone();

    print_report(&publisher.publish()?, &output_root);
    println!("{} {}", "Watching".blue().bold(), publisher.context().source_root.display());

    let watcher = SourceWatcher::new(publisher).debounce(Duration::from_millis(debounce_ms));
    watcher.run(|result| match result {
        Ok(report) => print_report(&report, &output_root),
        Err(e) => eprintln!("{}: {}", "Rebuild failed".red().bold(), e.user_message()),
    })
}

/// Print the opaque directory name for the persisted epoch
fn cmd_resolve(output: PathBuf, key: String) -> Result<()> {
    let token = hideaway::EpochGenerator::new(&output).resolve(&ServerKey::new(key)?)?;
    println!("{}", token);
    Ok(())
}

async fn open_session(site: &SiteArgs) -> Result<(SiteReader, SessionContext)> {
    let reader = SiteReader::new(&site.site);
    let cache = Arc::new(FileSecretCache::new(&site.cache));
    let session = SessionContext::mount(&reader, cache).await?;
    Ok((reader, session))
}

/// Verify a secret and cache the derived intermediate on success
async fn cmd_unlock(site: SiteArgs, secret: String, days: u32) -> Result<()> {
    let (_, session) = open_session(&site).await?;
    let session = session.with_expiry_days(days);

    match session.verify_secret(&secret).await? {
        Outcome::Granted(token) => {
            println!("{} Secret accepted", "✓".green().bold());
            println!("  Directory: {}", token.to_string().yellow());
            println!("  Remembered for {} days in {}", days, site.cache.display());
            Ok(())
        }
        Outcome::Denied => Err(HideawayError::AccessDenied("secret does not match this epoch".to_string())),
    }
}

/// Report whether the cached secret still unlocks the site
async fn cmd_status(site: SiteArgs) -> Result<()> {
    let (_, session) = open_session(&site).await?;
    let record = session.record();
    let built = record
        .built_at()
        .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| record.update_time.to_string());

    println!("{}", "Hideaway Status:".blue().bold());
    println!("  Epoch: {}", built);
    match session.wait_checked().await? {
        Outcome::Granted(token) => {
            println!("  Secret: {}", "✓ Granted".green());
            println!("  Directory: {}", token.to_string().dimmed());
        }
        Outcome::Denied => println!("  Secret: {}", "✗ Denied".red()),
    }
    Ok(())
}

/// Print the tree visible to the current session
async fn cmd_list(site: SiteArgs) -> Result<()> {
    let (reader, session) = open_session(&site).await?;
    let tree = match session.token() {
        Some(token) => reader.full_tree(&token).await?,
        None => reader.public_tree().await?,
    };
    print_tree(&tree, 0);
    Ok(())
}

fn print_tree(node: &PathTree, depth: usize) {
    let indent = "  ".repeat(depth);
    for child in &node.children {
        println!("{}{}/", indent, child.name.blue().bold());
        print_tree(child, depth + 1);
    }
    for file in &node.files {
        let marker = if file.is_secret == Some(true) { " 🔒" } else { "" };
        match file.kind {
            hideaway::DescriptorKind::Url => {
                println!("{}{} → {}{}", indent, file.name, file.json_name.dimmed(), marker)
            }
            hideaway::DescriptorKind::File => println!("{}{}{}", indent, file.name, marker),
        }
    }
}

/// Forget the cached secret
fn cmd_lock(site: SiteArgs) -> Result<()> {
    use hideaway::SecretCache;
    FileSecretCache::new(&site.cache).clear()?;
    println!("{} Cached secret removed", "✓".green().bold());
    Ok(())
}

fn dir_size(path: &Path) -> std::io::Result<u64> {
    let mut total = 0;
    for entry in std::fs::read_dir(path)? {
        let entry = entry?;
        let meta = entry.metadata()?;
        total += if meta.is_dir() { dir_size(&entry.path())? } else { meta.len() };
    }
    Ok(total)
}
