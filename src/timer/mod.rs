pub mod commands;
pub mod controller;
mod error;
pub mod history;
mod locks;
pub mod state;
pub mod store;

pub use controller::{StartTimerRequest, TimerController, TimerSnapshot};
pub use error::TimerError;
pub use history::HistorySink;
pub use state::{OwnerId, Remaining, TimerPhase, TimerRecord, TimerSpec, Transition};
pub use store::{MemoryTimerStore, TimerStore};
