// src/cli/args.rs

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// What `inspect` dumps
#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum InspectKind {
    /// The parsed AST
    Ast,
    /// The lowered IR program
    Ir,
}

/// Snuggle programming language compiler
#[derive(Parser)]
#[command(name = "snugglec")]
#[command(version = "0.1.0")]
#[command(about = "Snuggle programming language compiler", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Check a Snuggle source file for errors
    Check {
        /// Path to the .sn file to check
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Inspect compilation output (AST, IR)
    Inspect {
        /// What to inspect: ast, ir
        #[arg(value_enum)]
        what: InspectKind,
        /// Path to the .sn file to compile
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
}
