pub mod cookies;
pub mod heartbeat;
pub mod sheets;

pub use heartbeat::Heartbeat;
pub use sheets::{GoogleSheetStore, MemorySheetStore, SheetStore};
