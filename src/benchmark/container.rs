//! Docker container management for benchmarking
//!
//! [`SandboxRuntime`] is the seam between the benchmark engine and the
//! container runtime. [`DockerRuntime`] implements it against the Docker API:
//! one fresh container per invocation, the workspace bind-mounted at `/work`,
//! resource caps set on the host config and a hard timeout enforced from the
//! host side.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bollard::{
    container::{AttachContainerResults, LogOutput},
    models::{ContainerCreateBody, HostConfig, ResourcesUlimits},
    query_parameters::{
        AttachContainerOptionsBuilder, InspectContainerOptions, KillContainerOptions,
        RemoveContainerOptionsBuilder, StartContainerOptions, WaitContainerOptions,
    },
    Docker, API_DEFAULT_VERSION,
};
use futures::StreamExt;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::{
    config::{ClockStart, DockerConfig},
    constants::{CONTAINER_PIDS_LIMIT, CONTAINER_WORKDIR, DOCKER_API_TIMEOUT_SECONDS},
    error::{AppError, AppResult},
    models::ResourceLimits,
};

/// How long to wait for the output stream to drain after the container exits
const STDERR_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Build instructions for a sandbox image
#[derive(Debug, Clone, PartialEq)]
pub struct BuildSpec {
    pub dockerfile: PathBuf,
}

impl BuildSpec {
    pub fn new(dockerfile: impl Into<PathBuf>) -> Self {
        Self {
            dockerfile: dockerfile.into(),
        }
    }

    /// Build context: the directory holding the Dockerfile
    pub fn context(&self) -> &Path {
        self.dockerfile
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."))
    }
}

/// One sandboxed command execution
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub image: String,
    /// Host directory mounted at `/work`
    pub workdir: PathBuf,
    /// Shell command, run with `bash -lc`
    pub command: String,
    pub stdin: Option<Vec<u8>>,
    pub limits: ResourceLimits,
    pub timeout: Duration,
    pub clock_start: ClockStart,
}

/// How a sandboxed process ended
#[derive(Debug, Clone, PartialEq)]
pub enum RunStatus {
    /// Process terminated on its own
    Exited {
        exit_code: i64,
        stderr: String,
        /// Kernel OOM killer terminated the container
        oom_killed: bool,
    },
    /// Hard timeout expired and the container was killed
    TimedOut,
}

/// Result of a sandboxed run with its host wall-clock time
#[derive(Debug, Clone, PartialEq)]
pub struct RunOutput {
    pub elapsed: Duration,
    pub status: RunStatus,
}

/// Container runtime used by the benchmark engine
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SandboxRuntime: Send + Sync {
    /// Whether the image is present in the local registry
    async fn image_exists(&self, tag: &str) -> AppResult<bool>;

    /// Build an image from a Dockerfile
    async fn build(&self, tag: &str, spec: &BuildSpec) -> AppResult<()>;

    /// Run a command to completion or until the hard timeout
    async fn run(&self, request: &RunRequest) -> AppResult<RunOutput>;
}

/// Docker-backed sandbox runtime
pub struct DockerRuntime {
    docker: Docker,
    binary: String,
}

impl DockerRuntime {
    /// Create a runtime from an existing client
    pub fn new(docker: Docker, binary: impl Into<String>) -> Self {
        Self {
            docker,
            binary: binary.into(),
        }
    }

    /// Connect to the daemon socket and verify the connection
    pub async fn connect(config: &DockerConfig) -> AppResult<Self> {
        let docker = Docker::connect_with_socket(
            &config.socket_path,
            DOCKER_API_TIMEOUT_SECONDS,
            API_DEFAULT_VERSION,
        )?;

        let version = docker.version().await?;
        tracing::info!(
            "Connected to Docker version: {}",
            version.version.unwrap_or_default()
        );

        Ok(Self::new(docker, config.binary.clone()))
    }

    /// Create a container for one invocation
    async fn create_container(&self, request: &RunRequest) -> AppResult<String> {
        let workdir = request.workdir.canonicalize().map_err(|e| {
            AppError::Workspace(format!(
                "Could not canonicalize {}: {}",
                request.workdir.display(),
                e
            ))
        })?;

        let ulimits = request.limits.stack_bytes().map(|bytes| {
            vec![ResourcesUlimits {
                name: Some("stack".to_string()),
                soft: Some(bytes),
                hard: Some(bytes),
            }]
        });

        let host_config = HostConfig {
            binds: Some(vec![format!("{}:{}", workdir.display(), CONTAINER_WORKDIR)]),
            nano_cpus: Some(request.limits.nano_cpus()),
            memory: Some(request.limits.memory_bytes()),
            memory_swap: Some(request.limits.memory_bytes()),
            network_mode: Some("none".to_string()),
            pids_limit: Some(CONTAINER_PIDS_LIMIT),
            ulimits,
            ..Default::default()
        };

        let config = ContainerCreateBody {
            image: Some(request.image.clone()),
            cmd: Some(vec![
                "bash".to_string(),
                "-lc".to_string(),
                request.command.clone(),
            ]),
            working_dir: Some(CONTAINER_WORKDIR.to_string()),
            attach_stdin: Some(request.stdin.is_some()),
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            open_stdin: Some(request.stdin.is_some()),
            stdin_once: Some(request.stdin.is_some()),
            tty: Some(false),
            network_disabled: Some(true),
            host_config: Some(host_config),
            labels: Some(HashMap::from([(
                "adaptivejudge.workspace".to_string(),
                workdir.display().to_string(),
            )])),
            ..Default::default()
        };

        let container = self
            .docker
            .create_container(None::<bollard::query_parameters::CreateContainerOptions>, config)
            .await?;

        Ok(container.id)
    }

    /// Attach, start, feed stdin and wait for the container under the timeout
    async fn drive(
        &self,
        container_id: &str,
        request: &RunRequest,
        clock: Instant,
    ) -> AppResult<RunOutput> {
        let options = AttachContainerOptionsBuilder::default()
            .stdin(request.stdin.is_some())
            .stdout(true)
            .stderr(true)
            .stream(true)
            .build();

        let AttachContainerResults { mut output, mut input } = self
            .docker
            .attach_container(container_id, Some(options))
            .await?;

        // stdout is discarded; stderr is kept for classification
        let stderr_task = tokio::spawn(async move {
            let mut stderr = Vec::new();
            while let Some(msg) = output.next().await {
                match msg {
                    Ok(LogOutput::StdErr { message }) => stderr.extend_from_slice(&message),
                    Ok(_) => {}
                    Err(e) => {
                        tracing::debug!("Output stream closed: {}", e);
                        break;
                    }
                }
            }
            String::from_utf8_lossy(&stderr).into_owned()
        });

        self.docker
            .start_container(container_id, None::<StartContainerOptions>)
            .await?;

        let started = match request.clock_start {
            ClockStart::BeforeCreate => clock,
            ClockStart::AfterStart => Instant::now(),
        };

        if let Some(bytes) = request.stdin.clone() {
            tokio::spawn(async move {
                if let Err(e) = input.write_all(&bytes).await {
                    // The process may exit without reading all of its input
                    tracing::debug!("stdin write interrupted: {}", e);
                }
                let _ = input.shutdown().await;
            });
        }

        let waited = tokio::time::timeout(request.timeout, self.wait_exit(container_id)).await;
        let elapsed = started.elapsed();

        let exit_code = match waited {
            Ok(code) => code?,
            Err(_) => {
                stderr_task.abort();
                if let Err(e) = self
                    .docker
                    .kill_container(container_id, None::<KillContainerOptions>)
                    .await
                {
                    tracing::warn!(container = %container_id, "Failed to kill timed out container: {}", e);
                }
                return Ok(RunOutput {
                    elapsed,
                    status: RunStatus::TimedOut,
                });
            }
        };

        let stderr = match tokio::time::timeout(STDERR_DRAIN_TIMEOUT, stderr_task).await {
            Ok(Ok(stderr)) => stderr,
            _ => String::new(),
        };

        let oom_killed = self
            .docker
            .inspect_container(container_id, None::<InspectContainerOptions>)
            .await?
            .state
            .and_then(|state| state.oom_killed)
            .unwrap_or(false);

        Ok(RunOutput {
            elapsed,
            status: RunStatus::Exited {
                exit_code,
                stderr,
                oom_killed,
            },
        })
    }

    /// Block until the container stops and return its exit status
    async fn wait_exit(&self, container_id: &str) -> AppResult<i64> {
        let mut stream = self
            .docker
            .wait_container(container_id, None::<WaitContainerOptions>);

        match stream.next().await {
            Some(Ok(response)) => Ok(response.status_code),
            // Non-zero exits surface as a wait error carrying the status
            Some(Err(bollard::errors::Error::DockerContainerWaitError { code, .. })) => Ok(code),
            Some(Err(e)) => Err(e.into()),
            None => Err(AppError::Docker(format!(
                "Wait stream for container {} ended without a status",
                container_id
            ))),
        }
    }

    async fn remove_container(&self, container_id: &str) {
        let options = RemoveContainerOptionsBuilder::default().force(true).build();

        if let Err(e) = self
            .docker
            .remove_container(container_id, Some(options))
            .await
        {
            tracing::warn!(container = %container_id, "Failed to remove container: {}", e);
        }
    }
}

#[async_trait]
impl SandboxRuntime for DockerRuntime {
    async fn image_exists(&self, tag: &str) -> AppResult<bool> {
        match self.docker.inspect_image(tag).await {
            Ok(_) => Ok(true),
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 404, ..
            }) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn build(&self, tag: &str, spec: &BuildSpec) -> AppResult<()> {
        let dockerfile_name = spec
            .dockerfile
            .file_name()
            .ok_or_else(|| {
                AppError::Provisioning(format!(
                    "Invalid Dockerfile path: {}",
                    spec.dockerfile.display()
                ))
            })?
            .to_os_string();

        tracing::debug!(
            image = %tag,
            dockerfile = %spec.dockerfile.display(),
            "Spawning docker build"
        );

        let output = Command::new(&self.binary)
            .arg("build")
            .arg("-t")
            .arg(tag)
            .arg("-f")
            .arg(&dockerfile_name)
            .arg(".")
            .current_dir(spec.context())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| AppError::Provisioning(format!("Failed to spawn docker build: {}", e)))?;

        if !output.status.success() {
            return Err(AppError::Provisioning(format!(
                "Failed to build {}:\n{}{}",
                tag,
                String::from_utf8_lossy(&output.stdout),
                String::from_utf8_lossy(&output.stderr)
            )));
        }

        Ok(())
    }

    async fn run(&self, request: &RunRequest) -> AppResult<RunOutput> {
        let clock = Instant::now();
        let container_id = self.create_container(request).await?;

        tracing::trace!(
            container = %container_id,
            image = %request.image,
            cmd = %request.command,
            "Container created"
        );

        let result = self.drive(&container_id, request, clock).await;
        self.remove_container(&container_id).await;
        result
    }
}
