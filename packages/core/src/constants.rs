use std::env;
use std::path::PathBuf;

/// Get the path to the Vessel directory (~/.vessel)
pub fn vessel_dir() -> PathBuf {
    // First try HOME environment variable (useful for tests)
    if let Ok(home) = env::var("HOME") {
        PathBuf::from(home).join(".vessel")
    } else {
        // Fall back to dirs crate for normal usage
        dirs::home_dir()
            .expect("Unable to get home directory")
            .join(".vessel")
    }
}

/// Get the path to the container registry file (~/.vessel/containers.json)
pub fn containers_file() -> PathBuf {
    vessel_dir().join("containers.json")
}
