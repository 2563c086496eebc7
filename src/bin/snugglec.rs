// src/bin/snugglec.rs

use clap::Parser;
use miette::{IntoDiagnostic, NamedSource, Result};
use snuggle::cli::{Cli, Commands, InspectKind};
use snuggle::driver::Compiler;
use std::fs;
use std::path::Path;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Check { file } => run(&file, None),
        Commands::Inspect { what, file } => run(&file, Some(what)),
    }
}

fn run(path: &Path, inspect: Option<InspectKind>) -> Result<()> {
    let source = fs::read_to_string(path).into_diagnostic()?;
    let entry = file_name(path);

    let mut compiler = Compiler::new();
    // Sibling .sn files are importable by their stem
    if let Some(dir) = path.parent() {
        if let Ok(entries) = fs::read_dir(dir) {
            for sibling in entries.flatten() {
                let sibling_path = sibling.path();
                if sibling_path.extension().and_then(|e| e.to_str()) == Some("sn") {
                    if let Ok(text) = fs::read_to_string(&sibling_path) {
                        compiler.add_source(file_name(&sibling_path), text);
                    }
                }
            }
        }
    }
    compiler.add_source(entry.clone(), source.clone());

    let render = |err: snuggle::errors::CompileError| {
        miette::Report::new(err)
            .with_source_code(NamedSource::new(path.display().to_string(), source.clone()))
    };

    match inspect {
        Some(InspectKind::Ast) => {
            let file = compiler.parse(&entry).map_err(render)?;
            println!("{file:#?}");
        }
        Some(InspectKind::Ir) => {
            let program = compiler.compile(&entry).map_err(render)?;
            println!("{program:#?}");
        }
        None => {
            compiler.compile(&entry).map_err(render)?;
            println!("ok: {}", path.display());
        }
    }
    Ok(())
}

fn file_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
