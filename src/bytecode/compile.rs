use serde::{Deserialize, Serialize};

use crate::bytecode::compile_error::CompileError;
use crate::bytecode::object::ObjectFile;
use crate::diagnostics::Diagnostic;
use crate::frontend::lexer::Lexer;
use crate::frontend::parser::Parser;
use crate::frontend::token::TokenSource;

/// Limits and knobs of the translator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    /// Tokens that must be consumed after an error before the next one is reported.
    pub min_error_distance: usize,
    pub max_globals: usize,
    pub max_fields: usize,
    pub max_locals: usize,
    /// Capped at `i16::MAX` so every address fits a jump offset.
    pub max_code_size: usize,
    /// Name of the entry point.
    pub main_method: String,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        CompilerConfig {
            min_error_distance: 3,
            max_globals: 32767,
            max_fields: 32767,
            max_locals: 127,
            max_code_size: 8192,
            main_method: "main".to_string(),
        }
    }
}

/// Result of one pass over a program.
///
/// The object is always produced. It is only meaningful when `diagnostics`
/// is empty.
#[derive(Debug, Clone)]
pub struct Compilation {
    pub object: ObjectFile,
    pub diagnostics: Vec<Diagnostic>,
}

impl Compilation {
    pub fn is_ok(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct Compiler {
    config: CompilerConfig,
}

impl Compiler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: CompilerConfig) -> Self {
        Compiler { config }
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    pub fn compile_source(&self, source: &str) -> Result<Compilation, CompileError> {
        self.compile_tokens(Lexer::new(source))
    }

    /// Runs the translator over any token stream.
    pub fn compile_tokens<S: TokenSource>(&self, tokens: S) -> Result<Compilation, CompileError> {
        let compilation = Parser::new(tokens, self.config.clone()).parse()?;
        tracing::debug!(
            errors = compilation.diagnostics.len(),
            code_size = compilation.object.code.len(),
            data_size = compilation.object.data_size,
            "compiled"
        );
        Ok(compilation)
    }
}
