//! Form-based company registry.
//!
//! Detail pages lay facts out as `<td>label</td><td>value</td>` table rows.

use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use tracing::{debug, info};
use url::Url;

use super::{first_external_link, first_text, resolve_links, CollectScope};
use crate::company::{Origin, RawCompany};
use crate::config::{AppConfig, CollectorConfig};
use crate::fetcher::PageFetcher;
use crate::labeled_field::{LabelLayout, LabeledField};
use crate::normalize::{extract_tax_id, normalize_industry_code, parse_employee_count, parse_revenue};

static COMPANY_LINK_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse(r#"a[href*="/company/"]"#).unwrap());
static H1_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("h1").unwrap());
static ABSOLUTE_LINK_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse(r#"a[href^="http"]"#).unwrap());

pub struct RegistryCollector<'a, F: PageFetcher> {
    fetcher: &'a F,
    base: Url,
    search_url: String,
    settings: &'a CollectorConfig,
    tax_id: LabeledField<String>,
    revenue: LabeledField<u64>,
    employees: LabeledField<u64>,
    industry: LabeledField<String>,
}

impl<'a, F: PageFetcher> RegistryCollector<'a, F> {
    pub fn new(fetcher: &'a F, config: &'a AppConfig) -> anyhow::Result<Self> {
        let base = Url::parse(&config.sources.registry_base_url)?;
        let search_url = base.join("/search")?.to_string();

        Ok(Self {
            fetcher,
            base,
            search_url,
            settings: &config.collector,
            tax_id: LabeledField::new("tax_id", &["ИНН"], LabelLayout::AdjacentCell, extract_tax_id)?,
            revenue: LabeledField::new("revenue", &["Выручка"], LabelLayout::AdjacentCell, parse_revenue)?,
            employees: LabeledField::new(
                "employees",
                &["Сотрудник"],
                LabelLayout::AdjacentCell,
                parse_employee_count,
            )?,
            industry: LabeledField::new(
                "industry_code",
                &["ОКВЭД"],
                LabelLayout::AdjacentCell,
                normalize_industry_code,
            )?,
        })
    }

    pub async fn collect(&self, scope: &CollectScope<'_>) -> Vec<RawCompany> {
        let mut companies = Vec::new();
        info!("Searching registry for '{}'", self.settings.registry_query);

        let params = [("val", self.settings.registry_query.as_str()), ("type", "all")];
        let Some(page) = self.fetcher.fetch(&self.search_url, &params).await else {
            return companies;
        };
        let links = resolve_links(
            &page.document(),
            &COMPANY_LINK_SELECTOR,
            &self.base,
            self.settings.registry_link_limit,
        );
        debug!("Registry search returned {} company links", links.len());

        for link in links {
            if scope.cancelled() {
                break;
            }
            if let Some(company) = self.company_details(&link).await {
                companies.push(company);
            }
            self.settings.registry_delay_ms.pause().await;
        }

        companies
    }

    pub async fn company_details(&self, url: &str) -> Option<RawCompany> {
        let page = self.fetcher.fetch(url, &[]).await?;
        self.parse_detail(&page.document(), url)
    }

    pub fn parse_detail(&self, document: &Html, url: &str) -> Option<RawCompany> {
        let Some(tax_id) = self.tax_id.extract(document) else {
            debug!("No valid {} on {}", self.tax_id.name(), url);
            return None;
        };

        let mut company = RawCompany::new(Origin::RegistryLookup);
        company.tax_id = Some(tax_id.value);
        company.name = first_text(document, &H1_SELECTOR);
        company.revenue = self.revenue.extract(document).map(|m| m.raw);
        if company.revenue.is_none() {
            debug!("No parseable {} on {}", self.revenue.name(), url);
        }
        company.employee_count = self.employees.extract(document).map(|m| m.raw);
        company.industry_code = self.industry.extract(document).map(|m| m.raw);
        company.website = first_external_link(document, &ABSOLUTE_LINK_SELECTOR, &self.base);
        company.detail_link = Some(url.to_string());

        Some(company)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::Page;

    struct NoNetwork;

    impl PageFetcher for NoNetwork {
        async fn fetch(&self, _url: &str, _params: &[(&str, &str)]) -> Option<Page> {
            None
        }
    }

    #[test]
    fn test_parse_registry_table() {
        let config = AppConfig::embedded().unwrap();
        let collector = RegistryCollector::new(&NoNetwork, &config).unwrap();
        let html = Html::parse_document(
            r#"<html><body><h1>АО "Лингва"</h1>
            <a href="https://www.list-org.com/list">list</a>
            <table>
              <tr><td>ИНН:</td><td>7709000000</td></tr>
              <tr><td>Выручка</td><td>1,2 млрд руб</td></tr>
              <tr><td>Сотрудников</td><td>340</td></tr>
              <tr><td>ОКВЭД</td><td>74.30</td></tr>
            </table>
            <a href="http://lingva.ru/">lingva.ru</a>
            </body></html>"#,
        );

        let company = collector.parse_detail(&html, "https://www.list-org.com/company/1").unwrap();
        assert_eq!(company.tax_id.as_deref(), Some("7709000000"));
        assert_eq!(company.name.as_deref(), Some("АО \"Лингва\""));
        assert_eq!(company.revenue.as_deref(), Some("1,2 млрд руб"));
        assert_eq!(company.employee_count.as_deref(), Some("340"));
        assert_eq!(company.industry_code.as_deref(), Some("74.30"));
        assert_eq!(company.website.as_deref(), Some("http://lingva.ru/"));
        assert_eq!(company.origin, Origin::RegistryLookup);
    }

    #[test]
    fn test_registry_page_without_tax_id() {
        let config = AppConfig::embedded().unwrap();
        let collector = RegistryCollector::new(&NoNetwork, &config).unwrap();
        let html = Html::parse_document("<table><tr><td>ИНН</td><td>нет</td></tr></table>");
        assert!(collector.parse_detail(&html, "https://www.list-org.com/company/2").is_none());
    }
}
