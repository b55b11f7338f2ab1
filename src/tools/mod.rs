pub mod batch_scrape;
pub mod cron_job;
pub mod scheduler;
