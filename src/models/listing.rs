//! Listing model for normalized marketplace records.
//!
//! A listing's identity is its canonical URL (query string stripped); the
//! persistence gateway upserts on that key with last-write-wins semantics,
//! so the same URL never produces two records.

use serde::{Deserialize, Serialize};

/// Sale status of a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListingStatus {
    OnSale,
    Reserved,
    Sold,
}

impl ListingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OnSale => "on_sale",
            Self::Reserved => "reserved",
            Self::Sold => "sold",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "on_sale" => Some(Self::OnSale),
            "reserved" => Some(Self::Reserved),
            "sold" => Some(Self::Sold),
            _ => None,
        }
    }

    /// Map the Korean status markers the sites render to the normalized enum.
    pub fn from_marker(marker: &str) -> Option<Self> {
        match marker.trim() {
            "판매중" => Some(Self::OnSale),
            "예약중" => Some(Self::Reserved),
            "판매완료" | "거래완료" => Some(Self::Sold),
            _ => None,
        }
    }
}

impl Default for ListingStatus {
    fn default() -> Self {
        Self::OnSale
    }
}

/// Documented per-field defaults substituted when a detail page is missing
/// the corresponding element. A missing field never aborts extraction of
/// the rest of the record.
pub mod defaults {
    pub const NO_TITLE: &str = "no title";
    pub const NO_PRICE: &str = "no price info";
    pub const NO_CONDITION: &str = "no condition info";
    pub const NO_UPLOAD_TIME: &str = "no upload time";
    pub const NO_REGION: &str = "no region info";
    pub const UNKNOWN_CONDITION: &str = "unknown";
}

/// A normalized marketplace listing, the unit of persisted data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    /// Listing title as rendered on the detail page.
    pub title: String,
    /// Raw price text; parsing into integers is a downstream concern.
    pub price: String,
    /// Product condition text, or "unknown" for sites that don't expose it.
    pub condition: String,
    /// Normalized upload timestamp ("YYYY-MM-DD HH:MM:SS") derived from the
    /// site's relative-time text, or the site's absolute timestamp.
    pub upload_time: String,
    /// Trade region text.
    pub region: String,
    /// Canonical URL - the sole identity key.
    pub url: String,
    /// Primary product image URL; empty when none was found.
    #[serde(default)]
    pub image_url: String,
    /// Sale status.
    #[serde(default)]
    pub status: ListingStatus,
    /// Free-form description, where the site exposes one on the card/detail.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Source site identifier.
    pub platform: String,
    /// Site-specific taxonomy bucket the listing was crawled under.
    pub category: String,
}
