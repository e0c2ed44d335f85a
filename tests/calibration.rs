//! End-to-end calibration runs against a scripted sandbox runtime

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use adaptivejudge::{
    AppResult,
    benchmark::{
        BenchmarkRequest, BenchmarkRunner, LanguageSubmission, SandboxRuntime,
        container::{BuildSpec, RunOutput, RunRequest, RunStatus},
    },
    config::{BenchmarkConfig, ImageConfig},
    db::{BenchmarkRepository, JsonFileRepository},
    models::{CalibrationStatus, OutcomeKind, PolicyTable, StabilityStatus},
    services::BenchmarkService,
};

/// Runtime answering by command prefix and remembering what it was asked
struct ScriptedRuntime {
    present: Mutex<HashSet<String>>,
    built: Mutex<Vec<String>>,
    commands: Mutex<Vec<String>>,
    python: Box<dyn Fn(usize) -> RunOutput + Send + Sync>,
}

impl ScriptedRuntime {
    fn new(python: impl Fn(usize) -> RunOutput + Send + Sync + 'static) -> Self {
        Self {
            present: Mutex::new(
                ["adaptivejudge-cpp:latest", "adaptivejudge-python:latest"]
                    .into_iter()
                    .map(String::from)
                    .collect(),
            ),
            built: Mutex::new(Vec::new()),
            commands: Mutex::new(Vec::new()),
            python: Box::new(python),
        }
    }

    fn without_images(self) -> Self {
        self.present.lock().unwrap().clear();
        self
    }

    fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }
}

fn exited(elapsed: Duration, exit_code: i64, stderr: &str) -> RunOutput {
    RunOutput {
        elapsed,
        status: RunStatus::Exited {
            exit_code,
            stderr: stderr.to_string(),
            oom_killed: false,
        },
    }
}

#[async_trait]
impl SandboxRuntime for ScriptedRuntime {
    async fn image_exists(&self, tag: &str) -> AppResult<bool> {
        Ok(self.present.lock().unwrap().contains(tag))
    }

    async fn build(&self, tag: &str, _spec: &BuildSpec) -> AppResult<()> {
        self.built.lock().unwrap().push(tag.to_string());
        self.present.lock().unwrap().insert(tag.to_string());
        Ok(())
    }

    async fn run(&self, request: &RunRequest) -> AppResult<RunOutput> {
        let python_calls = {
            let mut commands = self.commands.lock().unwrap();
            commands.push(request.command.clone());
            commands.iter().filter(|c| c.starts_with("python3")).count()
        };

        if request.command.starts_with("g++") {
            assert!(request.stdin.is_none());
            return Ok(exited(Duration::from_secs(2), 0, ""));
        }

        assert_eq!(request.stdin.as_deref(), Some(&b"2000000\n"[..]));
        assert!(request.workdir.join("input.txt").exists());

        if request.command.starts_with("python3") {
            Ok((self.python)(python_calls))
        } else {
            Ok(exited(Duration::from_millis(100), 0, ""))
        }
    }
}

fn request(factor_cap: Option<f64>) -> BenchmarkRequest {
    BenchmarkRequest {
        problem_id: "sum-range".to_string(),
        reference: LanguageSubmission::new(
            "cpp",
            "#include <cstdio>\nint main(){long long n,s=0;scanf(\"%lld\",&n);for(long long i=1;i<=n;i++)s+=i;printf(\"%lld\\n\",s);}",
        ),
        target: LanguageSubmission::new("python", "n=int(input())\nprint(sum(range(1,n+1)))"),
        input: b"2000000\n".to_vec(),
        factor_cap,
    }
}

fn runner(runtime: Arc<ScriptedRuntime>, workspaces: &std::path::Path) -> BenchmarkRunner {
    BenchmarkRunner::new(
        runtime,
        BenchmarkConfig {
            workspace_root: workspaces.to_path_buf(),
            ..Default::default()
        },
        ImageConfig::default(),
        PolicyTable::default(),
    )
}

#[tokio::test]
async fn calibrates_and_persists_record() {
    let workspaces = tempfile::tempdir().unwrap();
    let storage = tempfile::tempdir().unwrap();
    let runtime = Arc::new(ScriptedRuntime::new(|_| {
        exited(Duration::from_millis(800), 0, "")
    }));

    let repository = Arc::new(JsonFileRepository::new(storage.path()));
    let service = BenchmarkService::new(runner(runtime.clone(), workspaces.path()), repository.clone());

    let (id, record) = service.calibrate(&request(Some(12.0)), Some("setter")).await.unwrap();

    assert_eq!(record.calibration_status, CalibrationStatus::Calibrated);
    assert!((record.adjustment_factor.unwrap() - 8.0).abs() < 1e-9);
    assert_eq!(record.base_time_reference, Some(0.1));
    assert_eq!(record.reference.runs.len(), 5);
    assert_eq!(record.target.stats.status, StabilityStatus::Stable);

    let stored = repository.find_by_id("sum-range", &id).await.unwrap().unwrap();
    assert_eq!(stored.record.adjustment_factor, record.adjustment_factor);

    let json = std::fs::read_to_string(
        storage.path().join("sum-range").join(format!("{}.json", id)),
    )
    .unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["calibration_status"], "calibrated");
    assert_eq!(value["target"]["counts"]["success"], 5);
    assert_eq!(value["repeat_count"], 5);

    let active = repository.find_active("sum-range").await.unwrap().unwrap();
    assert_eq!(active.benchmark_id, id);

    // Workspace is gone once the run completes
    assert_eq!(std::fs::read_dir(workspaces.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn compiles_once_then_samples_target_before_reference() {
    let workspaces = tempfile::tempdir().unwrap();
    let runtime = Arc::new(ScriptedRuntime::new(|_| {
        exited(Duration::from_millis(800), 0, "")
    }));

    runner(runtime.clone(), workspaces.path())
        .run(&request(Some(12.0)))
        .await
        .unwrap();

    let commands = runtime.commands();
    // 1 compile + (1 warm-up + 5 repeats) per language
    assert_eq!(commands.len(), 13);
    assert!(commands[0].starts_with("g++"));
    assert!(commands[1..7].iter().all(|c| c.starts_with("python3")));
    assert!(commands[7..].iter().all(|c| c == "/work/a.out"));
}

#[tokio::test]
async fn warmup_results_are_discarded() {
    let workspaces = tempfile::tempdir().unwrap();
    // First python invocation is the warm-up and crashes
    let runtime = Arc::new(ScriptedRuntime::new(|call| {
        if call == 1 {
            exited(Duration::from_millis(50), 1, "Segmentation fault")
        } else {
            exited(Duration::from_millis(500), 0, "")
        }
    }));

    let record = runner(runtime, workspaces.path())
        .run(&request(None))
        .await
        .unwrap();

    assert_eq!(record.target.counts.get(&OutcomeKind::RuntimeError), None);
    assert_eq!(record.target.counts[&OutcomeKind::Success], 5);
    assert!((record.adjustment_factor.unwrap() - 5.0).abs() < 1e-9);
}

#[tokio::test]
async fn never_finishing_target_uses_cap() {
    let workspaces = tempfile::tempdir().unwrap();
    let runtime = Arc::new(ScriptedRuntime::new(|_| RunOutput {
        elapsed: Duration::from_secs(60),
        status: RunStatus::TimedOut,
    }));

    let record = runner(runtime, workspaces.path())
        .run(&request(Some(12.0)))
        .await
        .unwrap();

    assert_eq!(record.target.stats.status, StabilityStatus::NoSuccess);
    assert_eq!(record.target.stats.median, None);
    assert_eq!(record.target.counts[&OutcomeKind::Timeout], 5);
    assert_eq!(record.adjustment_factor, Some(12.0));
    assert_eq!(record.calibration_status, CalibrationStatus::CappedCensoredTarget);
    assert!(record.notes.iter().any(|n| n.contains("censored")));
}

#[tokio::test]
async fn recursion_errors_are_stack_overflows() {
    let workspaces = tempfile::tempdir().unwrap();
    let runtime = Arc::new(ScriptedRuntime::new(|_| {
        exited(
            Duration::from_millis(300),
            1,
            "RecursionError: maximum recursion depth exceeded",
        )
    }));

    let record = runner(runtime, workspaces.path())
        .run(&request(None))
        .await
        .unwrap();

    assert_eq!(record.target.counts[&OutcomeKind::StackOverflow], 5);
    assert_eq!(record.adjustment_factor, None);
    assert_eq!(
        record.calibration_status,
        CalibrationStatus::IncompleteCensoredTarget
    );
}

#[tokio::test]
async fn missing_images_are_built_once() {
    let workspaces = tempfile::tempdir().unwrap();
    let runtime = Arc::new(
        ScriptedRuntime::new(|_| exited(Duration::from_millis(400), 0, "")).without_images(),
    );

    let runner = runner(runtime.clone(), workspaces.path());
    runner.run(&request(Some(12.0))).await.unwrap();
    runner.run(&request(Some(12.0))).await.unwrap();

    let built = runtime.built.lock().unwrap().clone();
    assert_eq!(
        built,
        vec![
            "adaptivejudge-cpp:latest".to_string(),
            "adaptivejudge-python:latest".to_string()
        ]
    );
}
