// src/driver.rs
//
// Pipeline orchestration: the compiler owns a source map (file name ->
// source text) and the host-class registry, and runs lex -> parse ->
// resolve -> check -> lower over the entry file and everything it imports.

use crate::errors::CompileError;
use crate::frontend::{Interner, Parser, ast::File};
use crate::lower::{self, Program};
use crate::reflect::HostRegistry;
use crate::resolver::{DefArena, Resolver};
use crate::sema::{BuiltinSet, Checker, TypedProgram};
use rustc_hash::FxHashMap;
use tracing::debug_span;

/// Output of the front and middle end: the typed program plus the interner
/// that owns every identifier in it.
pub struct Analysis {
    pub typed: TypedProgram,
    pub interner: Interner,
}

pub struct Compiler {
    sources: FxHashMap<String, String>,
    registry: HostRegistry,
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new()
    }
}

impl Compiler {
    pub fn new() -> Self {
        Self::with_registry(HostRegistry::default_registry())
    }

    pub fn with_registry(registry: HostRegistry) -> Self {
        Self {
            sources: FxHashMap::default(),
            registry,
        }
    }

    /// Register a source file. Imports refer to files by these names.
    pub fn add_source(&mut self, name: impl Into<String>, source: impl Into<String>) {
        self.sources.insert(name.into(), source.into());
    }

    /// Parse a single file without resolving it (driver inspection)
    pub fn parse(&self, file: &str) -> Result<File, CompileError> {
        let source = self.sources.get(file).ok_or_else(|| {
            CompileError::Resolve(crate::errors::ResolutionError::MissingImport {
                file: file.to_string(),
                span: (0, 0).into(),
            })
        })?;
        let mut interner = Interner::new();
        Ok(Parser::new(source, &mut interner).parse_file()?)
    }

    /// Run name resolution and type checking on the entry file
    pub fn analyze(&self, entry: &str) -> Result<Analysis, CompileError> {
        // Bridge validation failures are fatal before any pass runs
        self.registry.validate()?;

        let mut interner = Interner::new();
        let mut def_arena = DefArena::new();
        let builtins = BuiltinSet::install(&mut def_arena, &mut interner, &self.registry);

        let resolved = {
            let _span = debug_span!("resolve", entry).entered();
            Resolver::new(&self.sources, &mut interner, def_arena, &builtins.scope)
                .resolve(entry)?
        };
        let typed = {
            let _span = debug_span!("check", entry).entered();
            Checker::check(&resolved, &interner, &self.registry, &builtins)?
        };
        Ok(Analysis { typed, interner })
    }

    /// Full pipeline: source text to IR program
    pub fn compile(&self, entry: &str) -> Result<Program, CompileError> {
        let analysis = self.analyze(entry)?;
        let _span = debug_span!("lower", entry).entered();
        Ok(lower::lower(&analysis.typed)?)
    }
}
