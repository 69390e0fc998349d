// ABOUTME: Core constants and shared control primitives for Vessel
// ABOUTME: Foundational package providing paths, confirmation gates, and pause control

pub mod constants;
pub mod gate;
pub mod pause;

// Re-export constants
pub use constants::{containers_file, vessel_dir};

// Re-export gates
pub use gate::{AutoGate, ConfirmGate, Confirmation, TerminalGate};

// Re-export pause control
pub use pause::{pause_pair, PauseControl, PauseGate};
