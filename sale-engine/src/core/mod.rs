//! Engine core: configuration, state wiring, background task supervision

pub mod config;
pub mod state;
pub mod tasks;

pub use config::Config;
pub use state::EngineState;
pub use tasks::{BackgroundTasks, TaskKind};
