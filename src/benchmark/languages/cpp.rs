//! C++ language handler

use super::LanguageHandler;

/// Get handler for C++
pub fn handler() -> LanguageHandler {
    LanguageHandler {
        language: "cpp",
        source_file: "solution.cpp",
        compile_command: Some("g++ -O2 -std=gnu++17 /work/solution.cpp -o /work/a.out"),
        run_command: "/work/a.out",
    }
}
