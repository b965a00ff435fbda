use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use linescope::files::read_lines;
use linescope::{EditError, RegionEditor, Side};

/// Print the region of a file selected by a chain of scopes.
///
/// Lines are printed as `<index>  <content>`, with 0-based indices.
#[derive(Debug, Parser)]
#[command(name = "scopeview", version, about)]
struct Cli {
    file: PathBuf,
    /// Scopes applied in order, as `after=MARKER` or `before=MARKER`.
    #[arg(value_parser = parse_scope)]
    scopes: Vec<(Side, String)>,
}

fn parse_scope(s: &str) -> Result<(Side, String), String> {
    let (side, marker) = s
        .split_once('=')
        .ok_or_else(|| format!("expected after=MARKER or before=MARKER, got {s:?}"))?;
    match side {
        "after" => Ok((Side::After, marker.to_string())),
        "before" => Ok((Side::Before, marker.to_string())),
        other => Err(format!("unknown scope {other:?}, expected after or before")),
    }
}

fn region(editor: &mut RegionEditor<'_>, chain: &[(Side, String)]) -> Result<Vec<(usize, String)>, EditError> {
    match chain.split_first() {
        Some(((side, marker), rest)) => editor.scoped(*side, marker, |child| region(child, rest)),
        None => {
            let range = editor.region()?;
            Ok(editor.lines()[range.clone()]
                .iter()
                .enumerate()
                .map(|(i, l)| (range.start + i, l.clone()))
                .collect())
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let mut lines = match read_lines(&cli.file) {
        Ok(lines) => lines,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::from(e.exit_code() as u8);
        }
    };

    match region(&mut RegionEditor::new(&mut lines), &cli.scopes) {
        Ok(selected) => {
            for (idx, line) in selected {
                println!("{idx}  {line}");
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::from(2)
        }
    }
}
