/// On-disk frame cache.
pub mod cache;
/// Captured frame type.
pub mod frame;
/// Progress accounting and pipeline events.
pub mod progress;
/// Pipeline driver.
pub mod renderer;
/// Display library collaborator.
pub mod stage;
/// Scene-edge transitions.
pub mod transition;
