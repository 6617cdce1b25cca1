//! Daangn (당근마켓) adapter: region×keyword search feeds behind a
//! "show more" button.

use std::time::Duration;

use async_trait::async_trait;
use scraper::Html;
use tracing::warn;

use crate::config::CrawlSettings;
use crate::harvest::{show_more_harvest, Harvest, HarvestSpec, ScrollPolicy};
use crate::models::{defaults, Listing, ListingStatus};
use crate::session::{PageSession, SessionError};

use super::{
    first_attr, first_text, is_buy_request, og_content, DetailOutcome, Pagination, SiteAdapter,
};

const ITEM_SELECTOR: &str = "a[data-gtm='search_article']";
const SHOW_MORE_SELECTOR: &str = "div[data-gtm='search_show_more_articles'] > button";
const DESCRIPTION_SELECTOR: &str = "#article-detail";

pub struct DaangnAdapter {
    element_wait: Duration,
    scroll: ScrollPolicy,
    spec: HarvestSpec,
}

impl DaangnAdapter {
    pub fn new(crawl: &CrawlSettings) -> Self {
        Self {
            element_wait: crawl.element_wait(),
            scroll: ScrollPolicy::from_crawl(crawl),
            spec: HarvestSpec {
                item_selector: ITEM_SELECTOR.to_string(),
                link_base: "https://www.daangn.com".to_string(),
                link_must_contain: None,
                ad_marker: None,
                show_more_selector: Some(SHOW_MORE_SELECTOR.to_string()),
            },
        }
    }

    /// Build the search URL for one region×keyword combination.
    pub fn search_url(region_url: &str, keyword: &str) -> String {
        let encoded: String = url::form_urlencoded::byte_serialize(keyword.as_bytes()).collect();
        format!("{region_url}&search={encoded}")
    }
}

#[async_trait]
impl SiteAdapter for DaangnAdapter {
    fn site_id(&self) -> &'static str {
        "daangn"
    }

    fn platform(&self) -> &'static str {
        "당근마켓"
    }

    fn pagination(&self) -> Pagination {
        Pagination::FullFeed
    }

    async fn harvest_links(
        &self,
        session: &mut dyn PageSession,
        page_url: &str,
    ) -> Result<Harvest, SessionError> {
        session.navigate(page_url).await?;
        session.wait_visible(ITEM_SELECTOR, self.element_wait).await;
        // Click "show more" until the trigger disappears or growth stops.
        show_more_harvest(session, &self.spec, &self.scroll).await
    }

    async fn extract_detail(
        &self,
        session: &mut dyn PageSession,
        url: &str,
        category: &str,
    ) -> DetailOutcome {
        if let Err(e) = session.navigate(url).await {
            warn!("detail page load failed: {url} - {e}");
            return DetailOutcome::Failed;
        }
        session
            .wait_visible(DESCRIPTION_SELECTOR, self.element_wait)
            .await;

        let html = match session.html().await {
            Ok(html) => html,
            Err(e) => {
                warn!("detail page read failed: {url} - {e}");
                return DetailOutcome::Failed;
            }
        };

        parse_detail(&html, url, self.platform(), category)
    }
}

/// Parse a rendered Daangn article page into a listing.
fn parse_detail(html: &str, url: &str, platform: &str, category: &str) -> DetailOutcome {
    let document = Html::parse_document(html);

    let title = first_text(&document, &["#article-title", "h1"])
        .or_else(|| og_content(&document, "title"))
        .unwrap_or_else(|| defaults::NO_TITLE.to_string());
    if is_buy_request(&title) {
        return DetailOutcome::Filtered;
    }

    let price = first_text(&document, &["#article-price", "p.price"])
        .unwrap_or_else(|| defaults::NO_PRICE.to_string());

    let region = first_text(&document, &["#region-name", "#article-region-name"])
        .map(|text| {
            // "역삼동 · 3시간 전" style suffixes are not part of the region.
            text.split('·').next().unwrap_or(&text).trim().to_string()
        })
        .unwrap_or_else(|| defaults::NO_REGION.to_string());

    let status = first_text(&document, &["#article-status"])
        .and_then(|text| ListingStatus::from_marker(&text))
        .unwrap_or_default();

    // The article timestamp is absolute, unlike the relative text elsewhere.
    let upload_time = first_attr(&document, "time", "datetime")
        .unwrap_or_else(|| defaults::NO_UPLOAD_TIME.to_string());

    // og:image first, first in-article image as the backup.
    let image_url = og_content(&document, "image")
        .or_else(|| first_attr(&document, "article img", "src"))
        .or_else(|| first_attr(&document, "article img", "data-src"))
        .unwrap_or_default();

    let description = first_text(&document, &[DESCRIPTION_SELECTOR, "article section p"]);

    DetailOutcome::Extracted(Listing {
        title,
        price,
        condition: defaults::UNKNOWN_CONDITION.to_string(),
        upload_time,
        region,
        url: url.to_string(),
        image_url,
        status,
        description,
        platform: platform.to_string(),
        category: category.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_url_percent_encodes_keywords() {
        let url = DaangnAdapter::search_url(
            "https://www.daangn.com/kr/buy-sell/?in=역삼동-6035",
            "아이폰",
        );
        assert!(url.starts_with("https://www.daangn.com/kr/buy-sell/?in=역삼동-6035&search="));
        assert!(!url.contains("아이폰"));
        assert!(url.contains("%EC%95%84%EC%9D%B4%ED%8F%B0"));
    }

    const DETAIL_HTML: &str = r#"
        <html>
        <head>
            <meta property="og:title" content="아이폰 12 블랙"/>
            <meta property="og:image" content="https://dnvefa72aowie.cloudfront.net/origin/article/a.jpg"/>
        </head>
        <body>
            <article>
                <h1 id="article-title">아이폰 12 블랙</h1>
                <p id="article-status">예약중</p>
                <p id="article-price">250,000원</p>
                <p id="region-name">역삼동 · 끌올 3시간 전</p>
                <time datetime="2025-06-15T09:12:00+09:00">3시간 전</time>
                <div id="article-detail">깨끗하게 사용했습니다. 배터리 87%</div>
            </article>
        </body></html>
    "#;

    #[test]
    fn detail_parse_extracts_every_field() {
        let outcome = parse_detail(
            DETAIL_HTML,
            "https://www.daangn.com/articles/510",
            "당근마켓",
            "아이폰",
        );
        let DetailOutcome::Extracted(listing) = outcome else {
            panic!("expected extraction");
        };
        assert_eq!(listing.title, "아이폰 12 블랙");
        assert_eq!(listing.price, "250,000원");
        assert_eq!(listing.region, "역삼동");
        assert_eq!(listing.status, ListingStatus::Reserved);
        assert_eq!(listing.upload_time, "2025-06-15T09:12:00+09:00");
        assert_eq!(
            listing.image_url,
            "https://dnvefa72aowie.cloudfront.net/origin/article/a.jpg"
        );
        assert_eq!(
            listing.description.as_deref(),
            Some("깨끗하게 사용했습니다. 배터리 87%")
        );
        assert_eq!(listing.condition, defaults::UNKNOWN_CONDITION);
    }

    #[test]
    fn metadata_fallbacks_cover_a_bare_page() {
        let html = r#"
            <html><head><meta property="og:title" content="갤럭시 워치"/></head>
            <body><article><img src="https://img.example/w.jpg"/></article></body></html>
        "#;
        let outcome = parse_detail(
            html,
            "https://www.daangn.com/articles/511",
            "당근마켓",
            "갤럭시",
        );
        let DetailOutcome::Extracted(listing) = outcome else {
            panic!("expected extraction");
        };
        assert_eq!(listing.title, "갤럭시 워치");
        assert_eq!(listing.image_url, "https://img.example/w.jpg");
        assert_eq!(listing.price, defaults::NO_PRICE);
        assert_eq!(listing.upload_time, defaults::NO_UPLOAD_TIME);
        assert_eq!(listing.region, defaults::NO_REGION);
    }
}
