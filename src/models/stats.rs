//! Per-run crawl statistics.

use serde::Serialize;

/// Counters accumulated over one crawl run and reported at the end.
///
/// These are observational: none of them gate continuation. The struct is
/// threaded through the orchestrator explicitly rather than living in
/// module-level state.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct CrawlStats {
    /// Sponsored/ad entries dropped during link harvesting.
    pub ads_skipped: u64,
    /// Detail records dropped by the buy-request exclusion filter.
    pub filtered: u64,
    /// URLs skipped because the store already knew them.
    pub duplicates_skipped: u64,
    /// Pages abandoned after the retry budget ran out.
    pub pages_failed: u64,
    /// Persistence batches lost to store errors.
    pub batches_failed: u64,
    /// Detail records successfully extracted.
    pub extracted: u64,
    /// Records newly inserted by upserts.
    pub inserted: u64,
    /// Records overwritten by upserts.
    pub updated: u64,
}

impl CrawlStats {
    /// Fold another run's counters into this one.
    pub fn merge(&mut self, other: &CrawlStats) {
        self.ads_skipped += other.ads_skipped;
        self.filtered += other.filtered;
        self.duplicates_skipped += other.duplicates_skipped;
        self.pages_failed += other.pages_failed;
        self.batches_failed += other.batches_failed;
        self.extracted += other.extracted;
        self.inserted += other.inserted;
        self.updated += other.updated;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_adds_all_counters() {
        let mut a = CrawlStats {
            ads_skipped: 1,
            filtered: 2,
            duplicates_skipped: 3,
            pages_failed: 4,
            batches_failed: 5,
            extracted: 6,
            inserted: 7,
            updated: 8,
        };
        let b = a;
        a.merge(&b);
        assert_eq!(a.ads_skipped, 2);
        assert_eq!(a.filtered, 4);
        assert_eq!(a.duplicates_skipped, 6);
        assert_eq!(a.pages_failed, 8);
        assert_eq!(a.batches_failed, 10);
        assert_eq!(a.extracted, 12);
        assert_eq!(a.inserted, 14);
        assert_eq!(a.updated, 16);
    }
}
