pub mod browser_manager;
pub mod cards;
pub mod cdp;
pub mod flows;
pub mod harvest;
pub mod layout;
pub mod page;
pub mod selectors;
pub mod text;
pub mod worker;

pub use page::{BrowserLauncher, BrowserSession, PageNode, VideoPage};
pub use worker::scrape_video;
