use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use linescope::config::{Config, DEFAULT_CONFIG_FILE};
use linescope::files::{decode, join_lines, read_lines, split_lines, write_lines};
use linescope::job::{run_jobs, tweaks, Outcome};
use linescope::{edit_lines, fingerprint_of, Error, Script};

/// Scoped, marker-based editing of generated build files.
#[derive(Debug, Parser)]
#[command(name = "linescope", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Apply an edit script to a file, in place.
    Apply {
        /// File to edit, or `-` to read stdin and print the result.
        file: PathBuf,
        /// Edit script, or `-` to read it from stdin.
        script: PathBuf,
        /// Print the edited content instead of writing the file.
        #[arg(long)]
        dry_run: bool,
        /// Rewrite `COPY` instructions to `COPY --link` before running the script.
        #[arg(long)]
        copy_link: bool,
    },
    /// Print the fingerprint of an edit script.
    Fingerprint {
        /// Edit script, or `-` to read it from stdin.
        script: PathBuf,
        /// Print the token stream instead of its digest.
        #[arg(long)]
        tokens: bool,
    },
    /// Run every job of a config file.
    Run {
        #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
        config: PathBuf,
        /// Edit files even when their stamp is up to date.
        #[arg(long)]
        force: bool,
    },
}

fn is_stdin(path: &Path) -> bool {
    path.as_os_str() == "-"
}

fn read_stdin() -> Result<String, Error> {
    let stdin = Path::new("<stdin>");
    let mut bytes = Vec::new();
    io::stdin()
        .read_to_end(&mut bytes)
        .map_err(|source| Error::Io {
            path: stdin.to_path_buf(),
            source,
        })?;
    decode(stdin, bytes)
}

fn load_script(path: &Path) -> Result<Script> {
    if is_stdin(path) {
        let text = read_stdin()?;
        return Script::parse(&text).context("invalid edit script <stdin>");
    }
    Ok(Script::load(path)?)
}

fn apply(file: &Path, script: &Path, dry_run: bool, copy_link: bool) -> Result<()> {
    if is_stdin(file) && is_stdin(script) {
        bail!("file and script cannot both be read from stdin");
    }
    let script = load_script(script)?;

    let mut lines = if is_stdin(file) {
        split_lines(&read_stdin()?)
    } else {
        read_lines(file)?
    };
    edit_lines(&mut lines, &tweaks(copy_link, &script))
        .with_context(|| format!("failed to edit {}", file.display()))?;

    if dry_run || is_stdin(file) {
        io::stdout().write_all(join_lines(&lines).as_bytes())?;
    } else {
        write_lines(file, &lines)?;
        tracing::info!(file = %file.display(), lines = lines.len(), "written");
    }
    Ok(())
}

fn fingerprint(script: &Path, tokens: bool) -> Result<()> {
    let script = load_script(script)?;
    let fp = fingerprint_of(&[&script])?;
    if tokens {
        for token in fp.tokens() {
            println!("{token}");
        }
    } else {
        println!("{}", fp.digest());
    }
    Ok(())
}

fn run(config_path: &Path, force: bool) -> Result<()> {
    let config = Config::load_from_path(config_path).map_err(Error::from)?;
    let base = match config_path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let jobs = config.jobs(base);
    let outcomes = run_jobs(&jobs, force)?;
    for (job, outcome) in jobs.iter().zip(outcomes) {
        let status = match outcome {
            Outcome::Edited => "edited",
            Outcome::UpToDate => "up-to-date",
        };
        println!("{status}  {}", job.file.display());
    }
    Ok(())
}

fn exit_code(err: &anyhow::Error) -> u8 {
    err.downcast_ref::<Error>()
        .map(|e| e.exit_code() as u8)
        .unwrap_or(2)
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let result = match &cli.command {
        Command::Apply {
            file,
            script,
            dry_run,
            copy_link,
        } => apply(file, script, *dry_run, *copy_link),
        Command::Fingerprint { script, tokens } => fingerprint(script, *tokens),
        Command::Run { config, force } => run(config, *force),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(exit_code(&e))
        }
    }
}
