//! marketharvest - secondhand marketplace listing harvester.
//!
//! The crawl core drives page-by-page and scroll-by-scroll link discovery
//! against a headless browser session, recovers the session across transient
//! failures, fans independent crawl tasks out over a bounded worker pool,
//! and upserts listings keyed by canonical URL so repeated or concurrent
//! runs never duplicate a record.

pub mod adapters;
pub mod cli;
pub mod config;
pub mod harvest;
pub mod models;
pub mod orchestrator;
pub mod retry;
pub mod scheduler;
pub mod session;
pub mod store;
pub mod utils;
