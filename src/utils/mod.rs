//! Small shared helpers for the crawl core.

pub mod time;
pub mod urlnorm;

pub use time::{parse_relative_time, run_timestamp};
pub use urlnorm::{absolutize, canonical_url};
