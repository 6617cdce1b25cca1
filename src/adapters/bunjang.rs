//! Bunjang (번개장터) adapter: classic pagination, ad-badged cards.

use std::time::Duration;

use async_trait::async_trait;
use scraper::{Html, Selector};
use tracing::warn;

use crate::config::CrawlSettings;
use crate::harvest::{scan_links, Harvest, HarvestSpec};
use crate::models::{defaults, Listing, ListingStatus};
use crate::session::{PageSession, SessionError};
use crate::utils::parse_relative_time;

use super::{
    element_text, first_attr, first_text, is_buy_request, DetailOutcome, Pagination, SiteAdapter,
};

const ITEM_SELECTOR: &str = "a[href^='/products/']";
const TITLE_SELECTOR: &str = "div.ProductSummarystyle__Name-sc-oxz0oy-3";
const PRICE_SELECTOR: &str = "div.ProductSummarystyle__Price-sc-oxz0oy-5";
const TIME_SELECTOR: &str = "div.ProductSummarystyle__Status-sc-oxz0oy-11";
const LABEL_SELECTOR: &str = "div.ProductSummarystyle__Label-sc-oxz0oy-20";
const VALUE_SELECTOR: &str = "div.ProductSummarystyle__Value-sc-oxz0oy-21";
const STATUS_IMG_SELECTOR: &str = "div.Productsstyle__ProductStatus-sc-13cvfvh-39 img";
const IMAGE_SELECTOR: &str = "img[src^='https://media.bunjang.co.kr/product/']";

pub struct BunjangAdapter {
    element_wait: Duration,
    spec: HarvestSpec,
}

impl BunjangAdapter {
    pub fn new(crawl: &CrawlSettings) -> Self {
        Self {
            element_wait: crawl.element_wait(),
            spec: HarvestSpec {
                item_selector: ITEM_SELECTOR.to_string(),
                link_base: "https://m.bunjang.co.kr".to_string(),
                link_must_contain: None,
                ad_marker: Some("AD".to_string()),
                show_more_selector: None,
            },
        }
    }
}

#[async_trait]
impl SiteAdapter for BunjangAdapter {
    fn site_id(&self) -> &'static str {
        "bunjang"
    }

    fn platform(&self) -> &'static str {
        "번개장터"
    }

    fn pagination(&self) -> Pagination {
        Pagination::Paged
    }

    async fn harvest_links(
        &self,
        session: &mut dyn PageSession,
        page_url: &str,
    ) -> Result<Harvest, SessionError> {
        session.navigate(page_url).await?;
        // Proceed with whatever rendered if the wait misses.
        session.wait_visible(ITEM_SELECTOR, self.element_wait).await;
        let html = session.html().await?;
        Ok(scan_links(&html, &self.spec))
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
        session.wait_visible(TITLE_SELECTOR, self.element_wait).await;

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

/// Parse a rendered Bunjang detail page into a listing.
fn parse_detail(html: &str, url: &str, platform: &str, category: &str) -> DetailOutcome {
    let document = Html::parse_document(html);

    let title = first_text(&document, &[TITLE_SELECTOR])
        .unwrap_or_else(|| defaults::NO_TITLE.to_string());
    if is_buy_request(&title) {
        return DetailOutcome::Filtered;
    }

    let price = first_text(&document, &[PRICE_SELECTOR])
        .unwrap_or_else(|| defaults::NO_PRICE.to_string());

    // The newest of the status lines carries the relative upload time.
    let mut raw_time = "0초 전".to_string();
    if let Ok(selector) = Selector::parse(TIME_SELECTOR) {
        for element in document.select(&selector) {
            let text = element_text(&element);
            if parse_relative_time(&text).is_some() {
                raw_time = text;
                break;
            }
        }
    }
    let upload_time =
        parse_relative_time(&raw_time).unwrap_or_else(|| defaults::NO_UPLOAD_TIME.to_string());

    let (condition, region) = label_values(&document);

    let image_url = first_attr(&document, IMAGE_SELECTOR, "src").unwrap_or_default();

    let status = first_attr(&document, STATUS_IMG_SELECTOR, "alt")
        .and_then(|alt| ListingStatus::from_marker(&alt))
        .unwrap_or_default();

    DetailOutcome::Extracted(Listing {
        title,
        price,
        condition,
        upload_time,
        region,
        url: url.to_string(),
        image_url,
        status,
        description: None,
        platform: platform.to_string(),
        category: category.to_string(),
    })
}

/// Read the label/value summary table ("• 상품 상태" → "중고" etc).
fn label_values(document: &Html) -> (String, String) {
    let mut condition = defaults::NO_CONDITION.to_string();
    let mut region = defaults::NO_REGION.to_string();

    let (Ok(labels), Ok(values)) = (
        Selector::parse(LABEL_SELECTOR),
        Selector::parse(VALUE_SELECTOR),
    ) else {
        return (condition, region);
    };

    for (label, value) in document.select(&labels).zip(document.select(&values)) {
        // Labels render with scattered whitespace; compare without it.
        let key: String = element_text(&label)
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();
        let value = element_text(&value);
        match key.as_str() {
            "•상품상태" => condition = value,
            "•직거래지역" => region = value,
            _ => {}
        }
    }

    (condition, region)
}

#[cfg(test)]
mod tests {
    use super::*;

    const DETAIL_HTML: &str = r#"
        <html><body>
            <div class="ProductSummarystyle__Name-sc-oxz0oy-3">아이폰 13 프로 256기가</div>
            <div class="ProductSummarystyle__Price-sc-oxz0oy-5">650,000원</div>
            <div class="ProductSummarystyle__Status-sc-oxz0oy-11"><img src="x.svg"/>3시간 전</div>
            <div class="ProductSummarystyle__Label-sc-oxz0oy-20">• 상품 상태</div>
            <div class="ProductSummarystyle__Label-sc-oxz0oy-20">• 직거래 지역</div>
            <div class="ProductSummarystyle__Value-sc-oxz0oy-21">중고</div>
            <div class="ProductSummarystyle__Value-sc-oxz0oy-21">서초동</div>
            <img src="https://media.bunjang.co.kr/product/12345_1.jpg"/>
            <div class="Productsstyle__ProductStatus-sc-13cvfvh-39"><img alt="판매완료"/></div>
        </body></html>
    "#;

    #[test]
    fn detail_parse_extracts_every_field() {
        let outcome = parse_detail(
            DETAIL_HTML,
            "https://m.bunjang.co.kr/products/12345",
            "번개장터",
            "스마트폰",
        );
        let DetailOutcome::Extracted(listing) = outcome else {
            panic!("expected extraction");
        };
        assert_eq!(listing.title, "아이폰 13 프로 256기가");
        assert_eq!(listing.price, "650,000원");
        assert_eq!(listing.condition, "중고");
        assert_eq!(listing.region, "서초동");
        assert_eq!(
            listing.image_url,
            "https://media.bunjang.co.kr/product/12345_1.jpg"
        );
        assert_eq!(listing.status, ListingStatus::Sold);
        assert_eq!(listing.platform, "번개장터");
        assert_eq!(listing.category, "스마트폰");
        // Relative time resolved to an absolute timestamp.
        assert_ne!(listing.upload_time, defaults::NO_UPLOAD_TIME);
    }

    #[test]
    fn buy_request_titles_are_filtered() {
        let html = r#"<div class="ProductSummarystyle__Name-sc-oxz0oy-3">아이폰 전기종 매입</div>"#;
        let outcome = parse_detail(html, "https://m.bunjang.co.kr/products/1", "번개장터", "폰");
        assert!(matches!(outcome, DetailOutcome::Filtered));
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let html = r#"<div class="ProductSummarystyle__Name-sc-oxz0oy-3">아이폰</div>"#;
        let outcome = parse_detail(html, "https://m.bunjang.co.kr/products/2", "번개장터", "폰");
        let DetailOutcome::Extracted(listing) = outcome else {
            panic!("expected extraction");
        };
        assert_eq!(listing.price, defaults::NO_PRICE);
        assert_eq!(listing.condition, defaults::NO_CONDITION);
        assert_eq!(listing.region, defaults::NO_REGION);
        assert_eq!(listing.image_url, "");
        assert_eq!(listing.status, ListingStatus::OnSale);
    }

    #[test]
    fn page_url_appends_page_parameter() {
        let adapter = BunjangAdapter::new(&CrawlSettings::default());
        assert_eq!(
            adapter.page_url("https://m.bunjang.co.kr/categories/600700001?&order=date", 3),
            "https://m.bunjang.co.kr/categories/600700001?&order=date&page=3"
        );
    }
}
