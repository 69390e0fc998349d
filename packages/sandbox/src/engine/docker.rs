// ABOUTME: Docker implementation of the container engine trait via bollard
// ABOUTME: Pull, create, exec stream demultiplexing, and tar archive transfer

use async_trait::async_trait;
use bollard::{
    container::{
        Config, CreateContainerOptions, DownloadFromContainerOptions, LogOutput,
        RemoveContainerOptions, StartContainerOptions, StopContainerOptions,
        UploadToContainerOptions,
    },
    errors::Error as BollardError,
    exec::{CreateExecOptions, StartExecResults},
    image::CreateImageOptions,
    models::HostConfig,
    Docker,
};
use futures_util::StreamExt;
use std::collections::HashMap;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::{
    ContainerEngine, ContainerHandle, EngineError, EngineResult, ExecSpec, ExecStream,
    OutputChunk, StreamKind,
};

/// Label applied to all Vessel containers for identification
const VESSEL_LABEL: &str = "vessel.managed";

pub struct DockerEngine {
    client: Docker,
}

impl DockerEngine {
    /// Connect to the Docker daemon with default settings and verify the
    /// connection with a ping
    pub async fn connect() -> EngineResult<Self> {
        let client = Docker::connect_with_defaults()
            .map_err(|e| EngineError::Connection(e.to_string()))?;

        client.ping().await.map_err(|e| {
            error!("Failed to connect to Docker daemon: {}", e);
            EngineError::Connection(e.to_string())
        })?;

        info!("Successfully connected to Docker daemon");
        Ok(Self { client })
    }

    /// Create with a specific Docker connection
    pub fn with_client(client: Docker) -> Self {
        Self { client }
    }

    fn map_container_error(container_id: &str, e: BollardError) -> EngineError {
        match e {
            BollardError::DockerResponseServerError {
                status_code: 404, ..
            } => EngineError::NotFound(container_id.to_string()),
            other => EngineError::Container(other.to_string()),
        }
    }
}

#[async_trait]
impl ContainerEngine for DockerEngine {
    async fn pull_image(&self, image: &str) -> EngineResult<()> {
        info!("Pulling image: {}", image);

        let options = CreateImageOptions {
            from_image: image.to_string(),
            ..Default::default()
        };

        let mut stream = self.client.create_image(Some(options), None, None);
        let mut last_status = String::new();

        while let Some(result) = stream.next().await {
            match result {
                Ok(progress) => {
                    if let Some(status) = &progress.status {
                        if status != &last_status {
                            debug!("Pull status: {}", status);
                            last_status = status.clone();
                        }
                    }
                    if let Some(error) = progress.error {
                        return Err(EngineError::Image(format!(
                            "Failed to pull image {}: {}",
                            image, error
                        )));
                    }
                }
                Err(e) => {
                    return Err(EngineError::Image(format!(
                        "Failed to pull image {}: {}",
                        image, e
                    )));
                }
            }
        }

        info!("Successfully pulled image: {}", image);
        Ok(())
    }

    async fn image_exists(&self, image: &str) -> EngineResult<bool> {
        match self.client.inspect_image(image).await {
            Ok(_) => Ok(true),
            Err(BollardError::DockerResponseServerError {
                status_code: 404, ..
            }) => Ok(false),
            Err(e) => Err(EngineError::Image(e.to_string())),
        }
    }

    async fn create_container(&self, image: &str) -> EngineResult<ContainerHandle> {
        let labels = HashMap::from([(VESSEL_LABEL.to_string(), "true".to_string())]);

        // Interactive shell keeps the container alive between execs;
        // auto_remove makes the engine clean up the filesystem on stop.
        let config = Config {
            image: Some(image.to_string()),
            cmd: Some(vec!["/bin/sh".to_string()]),
            open_stdin: Some(true),
            tty: Some(false),
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            labels: Some(labels),
            host_config: Some(HostConfig {
                auto_remove: Some(true),
                ..Default::default()
            }),
            ..Default::default()
        };

        let container_name = format!("vessel-{}", uuid::Uuid::new_v4());
        let options = CreateContainerOptions {
            name: container_name,
            platform: None,
        };

        let response = self
            .client
            .create_container(Some(options), config)
            .await
            .map_err(|e| {
                error!("Failed to create container: {}", e);
                EngineError::Container(e.to_string())
            })?;

        info!("Created container {}", response.id);
        Ok(ContainerHandle::new(response.id))
    }

    async fn start_container(&self, handle: &ContainerHandle) -> EngineResult<()> {
        debug!("Starting container {}", handle.id);

        self.client
            .start_container(&handle.id, None::<StartContainerOptions<String>>)
            .await
            .map_err(|e| Self::map_container_error(&handle.id, e))?;

        info!("Started container {}", handle.id);
        Ok(())
    }

    async fn stop_container(
        &self,
        handle: &ContainerHandle,
        timeout_secs: i64,
    ) -> EngineResult<()> {
        debug!("Stopping container {}", handle.id);

        let options = StopContainerOptions { t: timeout_secs };

        match self.client.stop_container(&handle.id, Some(options)).await {
            Ok(_) => {}
            // Container already stopped is not an error
            Err(BollardError::DockerResponseServerError {
                status_code: 304, ..
            }) => {
                debug!("Container {} already stopped", handle.id);
            }
            Err(e) => return Err(Self::map_container_error(&handle.id, e)),
        }

        // auto_remove tears the container down on stop; removal is
        // best-effort for engines configured without it.
        let options = RemoveContainerOptions {
            force: false,
            v: true,
            ..Default::default()
        };
        if let Err(e) = self.client.remove_container(&handle.id, Some(options)).await {
            match e {
                BollardError::DockerResponseServerError {
                    status_code: 404, ..
                } => {}
                other => warn!("Failed to remove container {}: {}", handle.id, other),
            }
        }

        info!("Stopped container {}", handle.id);
        Ok(())
    }

    async fn container_running(&self, handle: &ContainerHandle) -> EngineResult<bool> {
        let inspect = self
            .client
            .inspect_container(&handle.id, None)
            .await
            .map_err(|e| Self::map_container_error(&handle.id, e))?;

        Ok(inspect
            .state
            .and_then(|state| state.running)
            .unwrap_or(false))
    }

    async fn start_exec(
        &self,
        handle: &ContainerHandle,
        spec: &ExecSpec,
    ) -> EngineResult<ExecStream> {
        debug!(
            "Executing command in container {}: {}",
            handle.id, spec.command
        );

        let exec_config = CreateExecOptions {
            cmd: Some(vec![
                "/bin/sh".to_string(),
                "-c".to_string(),
                spec.command.clone(),
            ]),
            working_dir: Some(spec.working_dir.clone()),
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            attach_stdin: Some(spec.stdin.is_some()),
            ..Default::default()
        };

        let exec = self
            .client
            .create_exec(&handle.id, exec_config)
            .await
            .map_err(|e| EngineError::Exec(e.to_string()))?;

        let start_result = self
            .client
            .start_exec(&exec.id, None)
            .await
            .map_err(|e| EngineError::Exec(e.to_string()))?;

        let (tx, rx) = mpsc::unbounded_channel();

        match start_result {
            StartExecResults::Attached { output, mut input } => {
                if let Some(stdin) = spec.stdin.clone() {
                    tokio::spawn(async move {
                        if let Err(e) = input.write_all(stdin.as_bytes()).await {
                            warn!("Failed to write exec stdin: {}", e);
                        }
                        let _ = input.shutdown().await;
                    });
                }

                tokio::spawn(async move {
                    let mut output = output;
                    while let Some(msg) = output.next().await {
                        let chunk = match msg {
                            Ok(LogOutput::StdOut { message })
                            | Ok(LogOutput::Console { message }) => OutputChunk {
                                kind: StreamKind::Stdout,
                                data: message.to_vec(),
                            },
                            Ok(LogOutput::StdErr { message }) => OutputChunk {
                                kind: StreamKind::Stderr,
                                data: message.to_vec(),
                            },
                            Ok(_) => continue,
                            Err(e) => {
                                error!("Error reading exec output: {}", e);
                                break;
                            }
                        };
                        if tx.send(chunk).is_err() {
                            // Receiver dropped: local stream torn down
                            break;
                        }
                    }
                });
            }
            StartExecResults::Detached => {
                return Err(EngineError::Exec(
                    "Exec was detached unexpectedly".to_string(),
                ));
            }
        }

        Ok(ExecStream {
            exec_id: exec.id,
            output: rx,
        })
    }

    async fn exec_exit_code(&self, exec_id: &str) -> EngineResult<Option<i64>> {
        let inspect = self
            .client
            .inspect_exec(exec_id)
            .await
            .map_err(|e| EngineError::Exec(e.to_string()))?;

        Ok(inspect.exit_code)
    }

    async fn put_archive(
        &self,
        handle: &ContainerHandle,
        container_path: &str,
        archive: Vec<u8>,
    ) -> EngineResult<()> {
        debug!(
            "Uploading archive ({} bytes) to container {}:{}",
            archive.len(),
            handle.id,
            container_path
        );

        let options = UploadToContainerOptions {
            path: container_path.to_string(),
            ..Default::default()
        };

        self.client
            .upload_to_container(&handle.id, Some(options), archive.into())
            .await
            .map_err(|e| EngineError::Transfer(e.to_string()))
    }

    async fn get_archive(
        &self,
        handle: &ContainerHandle,
        container_path: &str,
    ) -> EngineResult<Vec<u8>> {
        debug!(
            "Downloading archive from container {}:{}",
            handle.id, container_path
        );

        let options = DownloadFromContainerOptions {
            path: container_path.to_string(),
        };

        let mut stream = self
            .client
            .download_from_container(&handle.id, Some(options));

        let mut data = Vec::new();
        while let Some(chunk) = stream.next().await {
            let bytes = chunk.map_err(|e| EngineError::Transfer(e.to_string()))?;
            data.extend_from_slice(&bytes);
        }

        Ok(data)
    }
}
