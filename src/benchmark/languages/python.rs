//! Python language handler

use super::LanguageHandler;

/// Get handler for Python
pub fn handler() -> LanguageHandler {
    LanguageHandler {
        language: "python",
        source_file: "solution.py",
        compile_command: None,
        run_command: "python3 /work/solution.py",
    }
}
