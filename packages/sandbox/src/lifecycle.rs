// ABOUTME: Container lifecycle operations for task sessions
// ABOUTME: Pull, create/start with registration, best-effort stop, orphan sweep

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::engine::{ContainerEngine, ContainerHandle, EngineError};
use crate::error::{Result, SandboxError};
use crate::registry::{ContainerRegistry, RegistryEntry};

/// Ensure an image is available locally, pulling it when missing. Pull
/// failure is fatal to the session; no container is created.
pub async fn pull_image(engine: &dyn ContainerEngine, image: &str) -> Result<()> {
    if engine.image_exists(image).await? {
        debug!("Image {} already exists locally", image);
        return Ok(());
    }

    engine
        .pull_image(image)
        .await
        .map_err(|e| SandboxError::ImageError(e.to_string()))
}

/// Create a container, persist its id to the registry, and start it
pub async fn create_and_start_container(
    engine: &dyn ContainerEngine,
    registry: &ContainerRegistry,
    image: &str,
) -> Result<ContainerHandle> {
    let handle = engine.create_container(image).await?;

    registry.register(RegistryEntry {
        container_id: handle.id.clone(),
        image: image.to_string(),
        created_at: Utc::now(),
    })?;

    engine.start_container(&handle).await?;
    Ok(handle)
}

/// Best-effort stop. A failed stop (container already gone) is treated as
/// success, and the id is always removed from the registry. Never fails.
pub async fn stop_container(
    engine: &dyn ContainerEngine,
    registry: &ContainerRegistry,
    handle: &ContainerHandle,
    timeout_secs: i64,
) {
    if let Err(e) = engine.stop_container(handle, timeout_secs).await {
        warn!(
            "Failed to stop container {} (treating as stopped): {}",
            handle.id, e
        );
    }

    if let Err(e) = registry.unregister(&handle.id) {
        warn!("Failed to unregister container {}: {}", handle.id, e);
    }
}

/// Recover containers orphaned by a crashed prior session: stop those still
/// running, ignore ids the engine no longer knows, and clear the registry
/// regardless of individual failures.
pub async fn cleanup_orphaned_containers(
    engine: &dyn ContainerEngine,
    registry: &ContainerRegistry,
    stop_timeout_secs: i64,
) -> Result<()> {
    let entries = registry.entries()?;
    if entries.is_empty() {
        return Ok(());
    }

    info!("Checking {} cached containers for orphans", entries.len());

    for entry in entries {
        let handle = ContainerHandle::new(entry.container_id.clone());
        match engine.container_running(&handle).await {
            Ok(true) => {
                info!("Stopping orphaned container {}", handle.id);
                if let Err(e) = engine.stop_container(&handle, stop_timeout_secs).await {
                    warn!("Failed to stop orphaned container {}: {}", handle.id, e);
                }
            }
            Ok(false) => {
                debug!("Orphaned container {} already stopped", handle.id);
            }
            Err(EngineError::NotFound(_)) => {
                debug!("Container {} no longer exists", handle.id);
            }
            Err(e) => {
                warn!("Failed to inspect container {}: {}", handle.id, e);
            }
        }
    }

    registry.clear()
}
