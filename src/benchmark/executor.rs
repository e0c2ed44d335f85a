//! Sandboxed execution with outcome classification

use std::path::Path;
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use regex::Regex;

use crate::{
    config::ClockStart,
    constants::{MAX_STDERR_BYTES, TIMEOUT_EXIT_CODE},
    error::{AppError, AppResult},
    models::{ExecutionOutcome, ResourceLimits},
};

use super::container::{RunRequest, RunStatus, SandboxRuntime};

/// Recursion-limit and native stack-exhaustion signatures
static STACK_OVERFLOW_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(maximum recursion depth exceeded|recursionerror|stack overflow|stackoverflowerror|has overflowed its stack)",
    )
    .expect("stack overflow pattern is valid")
});

/// Everything needed to run one program in a sandbox
#[derive(Debug, Clone)]
pub struct Invocation {
    pub image: String,
    pub command: String,
    pub stdin: Option<Vec<u8>>,
    pub limits: ResourceLimits,
    pub timeout: Duration,
}

/// Runs commands in resource-limited containers and classifies the result
#[derive(Clone)]
pub struct SandboxExecutor {
    runtime: Arc<dyn SandboxRuntime>,
    clock_start: ClockStart,
}

impl SandboxExecutor {
    pub fn new(runtime: Arc<dyn SandboxRuntime>, clock_start: ClockStart) -> Self {
        Self {
            runtime,
            clock_start,
        }
    }

    /// Execute one measured invocation.
    ///
    /// Never fails: a runtime error (container create, wait stream, bind
    /// mount) is recorded as a `runtime_error` outcome carrying the error text.
    pub async fn execute(&self, workspace: &Path, invocation: &Invocation) -> ExecutionOutcome {
        let request = self.request(workspace, invocation, invocation.stdin.clone());
        let output = match self.runtime.run(&request).await {
            Ok(output) => output,
            Err(e) => {
                tracing::warn!(
                    image = %invocation.image,
                    code = e.error_code(),
                    "Sandbox invocation failed, recorded as runtime error: {}",
                    e
                );
                return ExecutionOutcome::runtime_error(truncate_stderr(&format!(
                    "sandbox failure: {}",
                    e
                )));
            }
        };

        let outcome = match output.status {
            RunStatus::TimedOut => ExecutionOutcome::timeout(""),
            RunStatus::Exited {
                exit_code,
                stderr,
                oom_killed,
            } => classify_exit(exit_code, &stderr, oom_killed, output.elapsed),
        };

        tracing::trace!(
            image = %invocation.image,
            kind = %outcome.kind(),
            elapsed_ms = outcome.elapsed().map(|d| d.as_secs_f64() * 1000.0),
            "Invocation finished"
        );

        outcome
    }

    /// Run a compile command with no stdin under the same hard timeout.
    ///
    /// Any failure is fatal to the run.
    pub async fn compile(&self, workspace: &Path, invocation: &Invocation) -> AppResult<()> {
        let request = self.request(workspace, invocation, None);
        let output = self.runtime.run(&request).await?;

        match output.status {
            RunStatus::Exited { exit_code: 0, .. } => {
                tracing::info!(
                    image = %invocation.image,
                    elapsed_ms = output.elapsed.as_secs_f64() * 1000.0,
                    "Compilation finished"
                );
                Ok(())
            }
            RunStatus::Exited {
                exit_code, stderr, ..
            } => Err(AppError::Compilation(format!(
                "exit code {}:\n{}",
                exit_code,
                truncate_stderr(&stderr)
            ))),
            RunStatus::TimedOut => Err(AppError::Compilation(format!(
                "timed out after {:.1}s",
                invocation.timeout.as_secs_f64()
            ))),
        }
    }

    fn request(
        &self,
        workspace: &Path,
        invocation: &Invocation,
        stdin: Option<Vec<u8>>,
    ) -> RunRequest {
        RunRequest {
            image: invocation.image.clone(),
            workdir: workspace.to_path_buf(),
            command: invocation.command.clone(),
            stdin,
            limits: invocation.limits.clone(),
            timeout: invocation.timeout,
            clock_start: self.clock_start,
        }
    }
}

/// Classify a process that terminated on its own.
///
/// Structured signals are checked before stderr heuristics.
pub fn classify_exit(
    exit_code: i64,
    stderr: &str,
    oom_killed: bool,
    elapsed: Duration,
) -> ExecutionOutcome {
    let stderr = truncate_stderr(stderr);

    if exit_code == 0 {
        return ExecutionOutcome::success(elapsed, stderr);
    }
    if exit_code == TIMEOUT_EXIT_CODE {
        return ExecutionOutcome::timeout(stderr);
    }
    if oom_killed {
        return ExecutionOutcome::runtime_error(format!(
            "container killed: out of memory (exit code {})\n{}",
            exit_code, stderr
        ));
    }
    if is_stack_overflow(&stderr) {
        return ExecutionOutcome::stack_overflow(stderr);
    }

    tracing::debug!(exit_code, "Unrecognized failure, classified as runtime error");
    ExecutionOutcome::runtime_error(stderr)
}

/// Whether stderr carries a recursion-limit or stack-exhaustion signature
pub fn is_stack_overflow(stderr: &str) -> bool {
    STACK_OVERFLOW_PATTERN.is_match(stderr)
}

/// Keep the tail of stderr, where interpreters print the final error
fn truncate_stderr(stderr: &str) -> String {
    if stderr.len() <= MAX_STDERR_BYTES {
        return stderr.to_string();
    }

    let mut start = stderr.len() - MAX_STDERR_BYTES;
    while !stderr.is_char_boundary(start) {
        start += 1;
    }
    stderr[start..].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::benchmark::container::{MockSandboxRuntime, RunOutput};
    use crate::models::OutcomeKind;

    fn invocation() -> Invocation {
        Invocation {
            image: "adaptivejudge-python:latest".to_string(),
            command: "python3 /work/solution.py".to_string(),
            stdin: Some(b"10\n".to_vec()),
            limits: ResourceLimits::default(),
            timeout: Duration::from_secs(2),
        }
    }

    fn executor_returning(status: RunStatus) -> SandboxExecutor {
        let mut runtime = MockSandboxRuntime::new();
        runtime.expect_run().returning(move |_| {
            Ok(RunOutput {
                elapsed: Duration::from_millis(250),
                status: status.clone(),
            })
        });
        SandboxExecutor::new(Arc::new(runtime), ClockStart::BeforeCreate)
    }

    fn exited(exit_code: i64, stderr: &str) -> RunStatus {
        RunStatus::Exited {
            exit_code,
            stderr: stderr.to_string(),
            oom_killed: false,
        }
    }

    #[tokio::test]
    async fn test_success_carries_elapsed() {
        let executor = executor_returning(exited(0, ""));
        let outcome = executor
            .execute(Path::new("/tmp/ws"), &invocation())
            .await;

        assert!(outcome.ok());
        assert_eq!(outcome.kind(), OutcomeKind::Success);
        assert_eq!(outcome.elapsed(), Some(Duration::from_millis(250)));
    }

    #[tokio::test]
    async fn test_hard_timeout_has_no_elapsed() {
        let executor = executor_returning(RunStatus::TimedOut);
        let outcome = executor
            .execute(Path::new("/tmp/ws"), &invocation())
            .await;

        assert!(!outcome.ok());
        assert_eq!(outcome.kind(), OutcomeKind::Timeout);
        assert_eq!(outcome.elapsed(), None);
    }

    #[tokio::test]
    async fn test_python_recursion_is_stack_overflow() {
        let stderr = "Traceback (most recent call last):\nRecursionError: maximum recursion depth exceeded";
        let executor = executor_returning(exited(1, stderr));
        let outcome = executor
            .execute(Path::new("/tmp/ws"), &invocation())
            .await;

        assert_eq!(outcome.kind(), OutcomeKind::StackOverflow);
        assert!(outcome.stderr().contains("RecursionError"));
    }

    #[tokio::test]
    async fn test_request_carries_invocation() {
        let mut runtime = MockSandboxRuntime::new();
        runtime
            .expect_run()
            .withf(|req| {
                req.workdir == Path::new("/tmp/ws")
                    && req.stdin.as_deref() == Some(b"10\n".as_slice())
                    && req.clock_start == ClockStart::AfterStart
                    && req.timeout == Duration::from_secs(2)
            })
            .times(1)
            .returning(|_| {
                Ok(RunOutput {
                    elapsed: Duration::from_millis(5),
                    status: RunStatus::Exited {
                        exit_code: 0,
                        stderr: String::new(),
                        oom_killed: false,
                    },
                })
            });

        let executor = SandboxExecutor::new(Arc::new(runtime), ClockStart::AfterStart);
        let outcome = executor
            .execute(Path::new("/tmp/ws"), &invocation())
            .await;
        assert!(outcome.ok());
    }

    #[tokio::test]
    async fn test_runtime_failure_is_a_runtime_error_sample() {
        let mut runtime = MockSandboxRuntime::new();
        runtime
            .expect_run()
            .returning(|_| Err(AppError::Docker("container create failed".to_string())));

        let executor = SandboxExecutor::new(Arc::new(runtime), ClockStart::BeforeCreate);
        let outcome = executor.execute(Path::new("/tmp/ws"), &invocation()).await;

        assert_eq!(outcome.kind(), OutcomeKind::RuntimeError);
        assert_eq!(outcome.elapsed(), None);
        assert!(outcome.stderr().contains("container create failed"));
    }

    #[tokio::test]
    async fn test_compile_sends_no_stdin() {
        let mut runtime = MockSandboxRuntime::new();
        runtime
            .expect_run()
            .withf(|req| req.stdin.is_none())
            .times(1)
            .returning(|_| {
                Ok(RunOutput {
                    elapsed: Duration::from_secs(1),
                    status: RunStatus::Exited {
                        exit_code: 0,
                        stderr: String::new(),
                        oom_killed: false,
                    },
                })
            });

        let executor = SandboxExecutor::new(Arc::new(runtime), ClockStart::BeforeCreate);
        tokio_test::assert_ok!(executor.compile(Path::new("/tmp/ws"), &invocation()).await);
    }

    #[tokio::test]
    async fn test_compile_failure_is_fatal() {
        let executor = executor_returning(exited(1, "solution.cpp:1:1: error: expected ';'"));
        let err = executor
            .compile(Path::new("/tmp/ws"), &invocation())
            .await
            .unwrap_err();

        assert_eq!(err.error_code(), "COMPILATION_ERROR");
        assert!(err.to_string().contains("expected ';'"));
    }

    #[tokio::test]
    async fn test_compile_timeout_is_fatal() {
        let executor = executor_returning(RunStatus::TimedOut);
        let err = executor
            .compile(Path::new("/tmp/ws"), &invocation())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Compilation(_)));
    }

    #[test]
    fn test_classify_exit_codes() {
        let elapsed = Duration::from_millis(10);

        assert_eq!(classify_exit(0, "", false, elapsed).kind(), OutcomeKind::Success);
        assert_eq!(classify_exit(124, "", false, elapsed).kind(), OutcomeKind::Timeout);
        assert_eq!(classify_exit(124, "", false, elapsed).elapsed(), None);
        assert_eq!(
            classify_exit(139, "Segmentation fault", false, elapsed).kind(),
            OutcomeKind::RuntimeError
        );
        assert_eq!(
            classify_exit(1, "", false, elapsed).kind(),
            OutcomeKind::RuntimeError
        );
    }

    #[test]
    fn test_oom_kill_wins_over_stderr() {
        let outcome = classify_exit(137, "stack overflow", true, Duration::ZERO);
        assert_eq!(outcome.kind(), OutcomeKind::RuntimeError);
        assert!(outcome.stderr().contains("out of memory"));
    }

    #[test]
    fn test_stack_overflow_signatures() {
        assert!(is_stack_overflow("RecursionError: maximum recursion depth exceeded"));
        assert!(is_stack_overflow("thread 'main' has overflowed its stack"));
        assert!(is_stack_overflow("Exception in thread \"main\" java.lang.StackOverflowError"));
        assert!(is_stack_overflow("STACK OVERFLOW detected"));
        assert!(!is_stack_overflow("ZeroDivisionError: division by zero"));
        assert!(!is_stack_overflow(""));
    }

    #[test]
    fn test_truncate_keeps_tail() {
        let long = format!("{}RecursionError", "x".repeat(MAX_STDERR_BYTES * 2));
        let truncated = truncate_stderr(&long);

        assert_eq!(truncated.len(), MAX_STDERR_BYTES);
        assert!(truncated.ends_with("RecursionError"));
        assert_eq!(truncate_stderr("short"), "short");
    }
}
