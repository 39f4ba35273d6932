//! Keyword-search business directory.
//!
//! Search results link to detail pages under `/id/`; a detail page shows the
//! company name in `h1` and its facts as label/value element pairs.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use tracing::{debug, info};
use url::Url;

use super::{first_external_link, first_text, resolve_links, CollectScope};
use crate::company::{Origin, RawCompany};
use crate::config::{AppConfig, CollectorConfig};
use crate::fetcher::PageFetcher;
use crate::labeled_field::{LabelLayout, LabeledField};
use crate::normalize::{extract_tax_id, find_industry_code, is_valid_tax_id, parse_employee_count, parse_revenue};

static COMPANY_LINK_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse(r#"a[href*="/id/"]"#).unwrap());
static H1_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("h1").unwrap());
static DATA_TAX_ID_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("[data-inn]").unwrap());
static ANCHOR_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").unwrap());

static TAX_ID_TEXT_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"ИНН\s*[0-9]+").unwrap());

pub struct DirectoryCollector<'a, F: PageFetcher> {
    fetcher: &'a F,
    base: Url,
    search_url: String,
    settings: &'a CollectorConfig,
    min_revenue: u64,
    revenue: LabeledField<u64>,
    employees: LabeledField<u64>,
    industry: LabeledField<String>,
}

impl<'a, F: PageFetcher> DirectoryCollector<'a, F> {
    pub fn new(fetcher: &'a F, config: &'a AppConfig) -> anyhow::Result<Self> {
        let base = Url::parse(&config.sources.directory_base_url)?;
        let search_url = base.join("/search")?.to_string();

        Ok(Self {
            fetcher,
            base,
            search_url,
            settings: &config.collector,
            min_revenue: config.search.min_revenue,
            revenue: LabeledField::new(
                "revenue",
                &["Выручка", "Revenue", "Общие доходы"],
                LabelLayout::FollowingSiblings,
                parse_revenue,
            )?,
            employees: LabeledField::new(
                "employees",
                &["Сотрудники", "Employees", "Численность"],
                LabelLayout::FollowingSiblings,
                parse_employee_count,
            )?,
            industry: LabeledField::new(
                "industry_code",
                &["ОКВЭД", "Основной вид деятельности"],
                LabelLayout::FollowingSiblings,
                find_industry_code,
            )?,
        })
    }

    /// Search each configured keyword and resolve the result links, stopping
    /// once `keyword_strategy_limit` records are collected
    pub async fn collect_by_keywords(&self, scope: &CollectScope<'_>) -> Vec<RawCompany> {
        let mut companies = Vec::new();

        for keyword in &self.settings.search_keywords {
            if scope.cancelled() {
                break;
            }
            scope.progress.advance(keyword);
            info!("Searching directory for '{}'", keyword);

            let links = self
                .search(&[("query", keyword.as_str()), ("type", "ul")], self.settings.links_per_keyword)
                .await;

            for link in links {
                if scope.cancelled() {
                    return companies;
                }
                if let Some(company) = self.company_details(&link, Origin::DirectorySearch).await {
                    companies.push(company);
                    if companies.len() >= self.settings.keyword_strategy_limit {
                        info!("Reached limit of {} companies", self.settings.keyword_strategy_limit);
                        return companies;
                    }
                }
            }

            self.settings.keyword_delay_ms.pause().await;
        }

        companies
    }

    /// Revenue-sorted search; keeps only records whose revenue clears the threshold
    pub async fn collect_by_revenue(&self, scope: &CollectScope<'_>) -> Vec<RawCompany> {
        let mut companies = Vec::new();

        for term in &self.settings.revenue_sort_terms {
            if scope.cancelled() {
                break;
            }
            scope.progress.advance(term);
            info!("Searching directory by revenue for '{}'", term);

            let links = self
                .search(
                    &[("query", term.as_str()), ("type", "ul"), ("sort", "revenue_desc")],
                    self.settings.links_per_revenue_term,
                )
                .await;

            for link in links {
                if scope.cancelled() {
                    return companies;
                }
                let Some(company) = self.company_details(&link, Origin::DirectoryRevenueSort).await else {
                    continue;
                };
                let revenue = company.revenue.as_deref().and_then(parse_revenue);
                if revenue.is_some_and(|r| r >= self.min_revenue) {
                    companies.push(company);
                } else {
                    debug!("Skipping {}: revenue {:?} below threshold", link, revenue);
                }
            }

            self.settings.revenue_term_delay_ms.pause().await;
        }

        companies
    }

    async fn search(&self, params: &[(&str, &str)], limit: usize) -> Vec<String> {
        let Some(page) = self.fetcher.fetch(&self.search_url, params).await else {
            return Vec::new();
        };
        let links = resolve_links(&page.document(), &COMPANY_LINK_SELECTOR, &self.base, limit);
        debug!("Search {:?} returned {} company links", params, links.len());
        links
    }

    /// Fetch and parse one detail page; `None` when unreachable or lacking a valid tax id
    pub async fn company_details(&self, url: &str, origin: Origin) -> Option<RawCompany> {
        let page = self.fetcher.fetch(url, &[]).await?;
        self.parse_detail(&page.document(), url, origin)
    }

    pub fn parse_detail(&self, document: &Html, url: &str, origin: Origin) -> Option<RawCompany> {
        let tax_id = document
            .root_element()
            .text()
            .filter(|t| TAX_ID_TEXT_REGEX.is_match(t))
            .find_map(extract_tax_id)
            .or_else(|| {
                document
                    .select(&DATA_TAX_ID_SELECTOR)
                    .find_map(|el| el.value().attr("data-inn"))
                    .map(|v| v.trim().to_string())
            });

        let Some(tax_id) = tax_id.filter(|t| is_valid_tax_id(t)) else {
            debug!("No valid tax id on {}", url);
            return None;
        };

        let mut company = RawCompany::new(origin);
        company.tax_id = Some(tax_id);
        company.name = first_text(document, &H1_SELECTOR);
        company.revenue = self.revenue.extract(document).map(|m| m.raw);
        if company.revenue.is_none() {
            debug!("No parseable {} on {}", self.revenue.name(), url);
        }
        company.employee_count = self.employees.extract(document).map(|m| m.raw);
        company.industry_code = self.industry.extract(document).map(|m| m.raw);
        company.website = first_external_link(document, &ANCHOR_SELECTOR, &self.base);
        company.detail_link = Some(url.to_string());

        Some(company)
    }
}
