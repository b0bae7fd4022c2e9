pub mod session;

pub use session::{HistoryEntry, LeaderboardRow, SessionType};
