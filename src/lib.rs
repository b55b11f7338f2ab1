pub mod core;
pub mod features;
pub mod scraping;
pub mod tools;

// --- Primary core exports ---
pub use core::types;
pub use core::types::*;
pub use core::AppState;

pub use features::{cookies, heartbeat, sheets};
pub use tools::{batch_scrape, cron_job, scheduler};
