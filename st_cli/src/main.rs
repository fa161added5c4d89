//! Structured Text command-line interface
//!
//! `stx check` lexes and parses a source file and reports diagnostics;
//! `stx run` initializes the tag store and drives N scan cycles
//! against it, printing selected tags (or the whole store) afterwards.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use log::info;
use st_interpreter::{create_runtime_state, initialize, run_scan, TagStore};
use st_parser::ast::CompilationUnit;
use std::path::PathBuf;
use std::process::ExitCode;

/// Scan-cycle interpreter for IEC 61131-3 Structured Text
#[derive(Parser)]
#[command(name = "stx")]
#[command(about = "Scan-cycle interpreter for IEC 61131-3 Structured Text")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a source file and report diagnostics
    Check {
        /// Path to the ST source file
        file: PathBuf,
    },

    /// Run scan cycles against a source file
    Run {
        /// Path to the ST source file
        file: PathBuf,

        /// Number of scan cycles to execute
        #[arg(long, default_value_t = 1)]
        scans: u64,

        /// Elapsed time per scan in milliseconds
        #[arg(long, default_value_t = 100)]
        delta_ms: u64,

        /// Seed an input tag before the first scan (NAME=VALUE, repeatable)
        #[arg(long = "set", value_name = "NAME=VALUE")]
        sets: Vec<String>,

        /// Print the whole tag store as JSON after the last scan
        #[arg(long)]
        dump_store: bool,

        /// Tags to print after the last scan (defaults to none)
        #[arg(long = "print", value_name = "NAME")]
        prints: Vec<String>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut builder = env_logger::Builder::from_default_env();
    if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.init();

    let result = match cli.command {
        Commands::Check { file } => check(&file),
        Commands::Run {
            file,
            scans,
            delta_ms,
            sets,
            dump_store,
            prints,
        } => run(&file, scans, delta_ms, &sets, dump_store, &prints),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("error: {:#}", error);
            ExitCode::FAILURE
        }
    }
}

fn load(file: &PathBuf) -> Result<CompilationUnit> {
    let source = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    st_parser::parse_source(&source)
        .with_context(|| format!("failed to parse {}", file.display()))
}

fn check(file: &PathBuf) -> Result<()> {
    let unit = load(file)?;
    let pous = unit.units.len();
    println!(
        "{}: {} POU{} parsed",
        file.display(),
        pous,
        if pous == 1 { "" } else { "s" }
    );
    Ok(())
}

fn run(
    file: &PathBuf,
    scans: u64,
    delta_ms: u64,
    sets: &[String],
    dump_store: bool,
    prints: &[String],
) -> Result<()> {
    let unit = load(file)?;

    let mut store = TagStore::new();
    initialize(&unit, &mut store).context("initialization failed")?;
    let mut state = create_runtime_state(&unit);

    for entry in sets {
        apply_set(&mut store, entry)?;
    }

    for scan in 1..=scans {
        info!("scan {}/{}", scan, scans);
        run_scan(&unit, &mut store, &mut state, delta_ms)
            .with_context(|| format!("scan {} failed", scan))?;
    }

    for name in prints {
        match store.read_scalar(name) {
            Some(value) => println!("{} = {}", name, value),
            None => println!("{} = <undeclared>", name),
        }
    }

    if dump_store {
        println!("{}", serde_json::to_string_pretty(&store)?);
    }

    Ok(())
}

/// Apply one NAME=VALUE input override into the tag's declared bucket
fn apply_set(store: &mut TagStore, entry: &str) -> Result<()> {
    let Some((name, raw)) = entry.split_once('=') else {
        bail!("--set needs NAME=VALUE, got '{}'", entry);
    };
    let name = name.trim();
    let raw = raw.trim();

    if store.get_bool(name).is_some() {
        let value = match raw.to_ascii_uppercase().as_str() {
            "TRUE" | "1" => true,
            "FALSE" | "0" => false,
            other => bail!("'{}' is not a BOOL value", other),
        };
        store.set_bool(name, value);
    } else if store.get_int(name).is_some() {
        store.set_int(name, raw.parse().with_context(|| format!("parsing '{}'", raw))?);
    } else if store.get_real(name).is_some() {
        store.set_real(name, raw.parse().with_context(|| format!("parsing '{}'", raw))?);
    } else if store.get_time(name).is_some() {
        store.set_time(name, raw.parse().with_context(|| format!("parsing '{}'", raw))?);
    } else if store.get_string(name).is_some() {
        store.set_string(name, raw);
    } else {
        bail!("'{}' is not a declared scalar tag", name);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_source(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(content.as_bytes()).expect("write source");
        file
    }

    #[test]
    fn test_run_counts_scans() {
        let file = write_source(
            r#"PROGRAM P
VAR
    n : INT;
END_VAR
n := n + 1;
END_PROGRAM"#,
        );
        let path = file.path().to_path_buf();
        let unit = load(&path).unwrap();
        let mut store = TagStore::new();
        initialize(&unit, &mut store).unwrap();
        let mut state = create_runtime_state(&unit);
        for _ in 0..5 {
            run_scan(&unit, &mut store, &mut state, 100).unwrap();
        }
        assert_eq!(store.get_int("n"), Some(5));
    }

    #[test]
    fn test_apply_set_respects_buckets() {
        let file = write_source(
            r#"PROGRAM P
VAR
    flag : BOOL;
    level : INT;
END_VAR
END_PROGRAM"#,
        );
        let unit = load(&file.path().to_path_buf()).unwrap();
        let mut store = TagStore::new();
        initialize(&unit, &mut store).unwrap();

        apply_set(&mut store, "flag=TRUE").unwrap();
        apply_set(&mut store, "level=42").unwrap();
        assert_eq!(store.get_bool("flag"), Some(true));
        assert_eq!(store.get_int("level"), Some(42));
        assert!(apply_set(&mut store, "missing=1").is_err());
    }

    #[test]
    fn test_check_rejects_bad_source() {
        let file = write_source("PROGRAM P VAR x INT; END_VAR END_PROGRAM");
        assert!(check(&file.path().to_path_buf()).is_err());
    }
}
