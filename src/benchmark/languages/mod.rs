//! Language-specific handlers for compilation and execution

pub mod cpp;
pub mod python;

use crate::{
    constants::languages,
    error::{AppError, AppResult},
};

/// Language handler for compilation and execution
#[derive(Debug, Clone, PartialEq)]
pub struct LanguageHandler {
    language: &'static str,
    source_file: &'static str,
    compile_command: Option<&'static str>,
    run_command: &'static str,
}

impl LanguageHandler {
    /// Get handler for a specific language
    pub fn for_language(language: &str) -> AppResult<Self> {
        match language {
            languages::CPP => Ok(cpp::handler()),
            languages::PYTHON => Ok(python::handler()),
            _ => Err(AppError::InvalidInput(format!(
                "Unsupported language: {} (supported: {})",
                language,
                languages::ALL.join(", ")
            ))),
        }
    }

    pub fn language(&self) -> &'static str {
        self.language
    }

    /// Source file name inside the workspace
    pub fn source_file(&self) -> &'static str {
        self.source_file
    }

    /// Compile command, if the language needs one before timing
    pub fn compile_command(&self) -> Option<&'static str> {
        self.compile_command
    }

    /// Command that runs the program; input arrives on stdin
    pub fn run_command(&self) -> &'static str {
        self.run_command
    }
}
