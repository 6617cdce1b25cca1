//! Joongna (중고나라) adapter: paged search with scroll-accumulated results.

use std::time::Duration;

use async_trait::async_trait;
use scraper::Html;
use tracing::warn;

use crate::config::CrawlSettings;
use crate::harvest::{scroll_harvest, Harvest, HarvestSpec, ScrollPolicy};
use crate::models::{defaults, Listing, ListingStatus};
use crate::session::{PageSession, SessionError};
use crate::utils::parse_relative_time;

use super::{
    first_attr, first_text, is_buy_request, label_sibling_text, og_content, DetailOutcome,
    Pagination, SiteAdapter,
};

const ITEM_SELECTOR: &str = "a[href^='/product/']";
const PRICE_SELECTOR: &str = "div[class*='font-bold'][class*='text-heading']";
const TIME_SELECTOR: &str = "div.flex.items-center.justify-between.mb-4.text-xs.font-normal span";
const IMAGE_SELECTOR: &str = "img[src^='https://img2.joongna.com/media/original/']";

pub struct JoongnaAdapter {
    element_wait: Duration,
    scroll: ScrollPolicy,
    spec: HarvestSpec,
}

impl JoongnaAdapter {
    pub fn new(crawl: &CrawlSettings) -> Self {
        Self {
            element_wait: crawl.element_wait(),
            scroll: ScrollPolicy::from_crawl(crawl),
            spec: HarvestSpec {
                item_selector: ITEM_SELECTOR.to_string(),
                link_base: "https://web.joongna.com".to_string(),
                link_must_contain: Some("/product/".to_string()),
                ad_marker: None,
                show_more_selector: None,
            },
        }
    }
}

#[async_trait]
impl SiteAdapter for JoongnaAdapter {
    fn site_id(&self) -> &'static str {
        "joongna"
    }

    fn platform(&self) -> &'static str {
        "중고나라"
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
        session.wait_visible(ITEM_SELECTOR, self.element_wait).await;
        // Result lists load lazily; keep scrolling until nothing new shows.
        scroll_harvest(session, &self.spec, &self.scroll).await
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
        session.wait_visible("h1", self.element_wait).await;

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

/// Parse a rendered Joongna detail page into a listing.
fn parse_detail(html: &str, url: &str, platform: &str, category: &str) -> DetailOutcome {
    let document = Html::parse_document(html);

    // h1 first, open-graph title as the backup.
    let title = first_text(&document, &["h1"])
        .or_else(|| og_content(&document, "title"))
        .unwrap_or_else(|| defaults::NO_TITLE.to_string());
    if is_buy_request(&title) {
        return DetailOutcome::Filtered;
    }

    let price = first_text(&document, &[PRICE_SELECTOR])
        .unwrap_or_else(|| defaults::NO_PRICE.to_string());

    let upload_time = first_text(&document, &[TIME_SELECTOR])
        .and_then(|text| parse_relative_time(&text))
        .unwrap_or_else(|| defaults::NO_UPLOAD_TIME.to_string());

    // "상품 상태" / "거래 지역" render as label spans with the value in a
    // neighboring element.
    let condition = label_sibling_text(&document, &["상품 상태"])
        .unwrap_or_else(|| defaults::NO_CONDITION.to_string());
    let region = label_sibling_text(&document, &["거래 지역", "거래지역"])
        .unwrap_or_else(|| defaults::NO_REGION.to_string());

    let image_url = first_attr(&document, IMAGE_SELECTOR, "src").unwrap_or_default();

    DetailOutcome::Extracted(Listing {
        title,
        price,
        condition,
        upload_time,
        region,
        url: url.to_string(),
        image_url,
        status: ListingStatus::OnSale,
        description: None,
        platform: platform.to_string(),
        category: category.to_string(),
    })
}
