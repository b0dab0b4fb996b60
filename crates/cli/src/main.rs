use anyhow::{Context as AnyhowContext, Result};
use clap::{Args, Parser, Subcommand};
use scanmap_diagnostics::DEFAULT_MAX_DIAGNOSTICS_PER_FILE;
use scanmap_protocol::{parse_host_request, HostRequest};
use serde_json::json;
use std::env;
use std::io::{self, BufRead, Write as IoWrite};
use std::path::{Path, PathBuf};

mod config;
mod host;
mod log_reader;
mod session;

use config::load_config;
use host::{print_problem_lists, print_summary, uri_from_input};
use session::{Session, SessionOptions};

#[derive(Parser)]
#[command(name = "scanmap")]
#[command(about = "Map static-analysis log results onto the local tree", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors (stdout is reserved for output)
    #[arg(long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve one analysis log against the local tree
    Resolve(ResolveArgs),

    /// Execute JSON host requests read line-by-line from stdin
    Command(CommandArgs),
}

#[derive(Args)]
struct ResolveArgs {
    /// Analysis log to open
    log: PathBuf,

    /// Candidate local base URI or path (repeatable, tried in order)
    #[arg(long = "base")]
    bases: Vec<String>,

    /// Never prompt; unresolvable results stay flagged as unmapped
    #[arg(long)]
    non_interactive: bool,

    /// Per-file display ceiling before the list is truncated
    #[arg(long)]
    max_per_file: Option<usize>,

    /// Base-URI cache file (overrides .scanmap.toml)
    #[arg(long)]
    cache: Option<PathBuf>,
}

#[derive(Args)]
struct CommandArgs {
    /// Candidate local base URI or path (repeatable, tried in order)
    #[arg(long = "base")]
    bases: Vec<String>,

    /// Never prompt; unresolvable results stay flagged as unmapped
    #[arg(long)]
    non_interactive: bool,

    /// Base-URI cache file (overrides .scanmap.toml)
    #[arg(long)]
    cache: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stderr).init();

    match cli.command {
        Commands::Resolve(args) => run_resolve(args).await?,
        Commands::Command(args) => run_command(args).await?,
    }

    Ok(())
}

fn build_options(
    bases: &[String],
    non_interactive: bool,
    max_per_file: Option<usize>,
    cache: Option<PathBuf>,
) -> Result<SessionOptions> {
    let cwd = env::current_dir().context("resolving current directory")?;
    let config = load_config(&cwd)?;

    let mut base_inputs = config.uri_bases;
    base_inputs.extend(bases.iter().cloned());
    Ok(SessionOptions {
        uri_bases: base_inputs.iter().map(|b| uri_from_input(b)).collect(),
        max_diagnostics_per_file: max_per_file
            .or(config.max_diagnostics_per_file)
            .unwrap_or(DEFAULT_MAX_DIAGNOSTICS_PER_FILE),
        cache_path: cache.or(config.cache_path),
        interactive: !non_interactive,
    })
}

async fn run_resolve(args: ResolveArgs) -> Result<()> {
    let options = build_options(&args.bases, args.non_interactive, args.max_per_file, args.cache)?;
    let mut session = Session::create(options).await?;
    session.open_log(&args.log).await?;

    print_problem_lists(session.sink());
    print_summary(session.mapped_len(), session.unmapped_len());
    Ok(())
}

async fn run_command(args: CommandArgs) -> Result<()> {
    let options = build_options(&args.bases, args.non_interactive, None, args.cache)?;
    let mut session = Session::create(options).await?;

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    for line in stdin.lock().lines() {
        let line = line.context("reading request from stdin")?;
        if line.trim().is_empty() {
            continue;
        }
        let reply = match parse_host_request(&line) {
            Ok(request) => execute_request(&mut session, request).await,
            Err(err) => Err(anyhow::Error::new(err)),
        };
        let payload = match reply {
            Ok(value) => value,
            Err(err) => json!({ "ok": false, "error": format!("{err:#}") }),
        };
        serde_json::to_writer(&mut stdout, &payload)?;
        writeln!(stdout)?;
        stdout.flush()?;
    }
    Ok(())
}

async fn execute_request(session: &mut Session, request: HostRequest) -> Result<serde_json::Value> {
    match request {
        HostRequest::OpenLog { path } => {
            session.open_log(Path::new(&path)).await?;
        }
        HostRequest::CloseLog { path } => {
            session.close_log(Path::new(&path)).await?;
        }
        HostRequest::CloseAllLogs => {
            session.close_all_logs().await?;
        }
        HostRequest::RemapResult { key } => {
            let remapped = session.remap_result(key).await?;
            return Ok(json!({
                "ok": true,
                "remapped": remapped,
                "mapped": session.mapped_len(),
                "unmapped": session.unmapped_len(),
            }));
        }
        HostRequest::AddUriBase { base } => {
            session.add_uri_base(base).await?;
        }
    }
    Ok(json!({
        "ok": true,
        "mapped": session.mapped_len(),
        "unmapped": session.unmapped_len(),
    }))
}
