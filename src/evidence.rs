//! CAT-system evidence scoring for company websites
//!
//! A site is scanned on its home page, on up to a few careers pages linked
//! from it, and on a fixed list of candidate subsections. Every whole-word
//! keyword occurrence becomes one [`EvidenceItem`]; the score is their count.

use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use scraper::{Html, Node, Selector};
use std::collections::HashSet;
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::company::{Company, Evidence, EvidenceStatus};
use crate::config::{AppConfig, EvidenceConfig};
use crate::fetcher::PageFetcher;
use crate::normalize::is_valid_url;

static ANCHOR_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").unwrap());

const HIDDEN_TAGS: [&str; 4] = ["script", "style", "noscript", "template"];
const JOB_POSTING_BOOST: f32 = 0.1;
const MAX_PRODUCT_MENTIONS: usize = 3;
const MAX_KEYWORDS_PER_SECTION: usize = 5;

#[derive(Error, Debug)]
pub enum EvidenceError {
    #[error("invalid website URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
}

/// Where on the site a keyword was found
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Section {
    MainPage,
    JobPosting,
    Path(String),
}

impl Section {
    pub fn label(&self) -> String {
        match self {
            Section::MainPage => "Main page".to_string(),
            Section::JobPosting => "Job postings".to_string(),
            Section::Path(path) => match path.as_str() {
                "/services" => "Services section".to_string(),
                "/technology" => "Technology section".to_string(),
                "/solutions" => "Solutions section".to_string(),
                "/products" => "Products section".to_string(),
                "/translation" => "Translation section".to_string(),
                "/about" => "About the company".to_string(),
                other => other.to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EvidenceItem {
    pub keyword: String,
    pub context: String,
    pub section: Section,
    pub confidence: f32,
}

struct KeywordPattern {
    keyword: String,
    pattern: Regex,
    confidence: f32,
}

struct ProductPattern {
    name: String,
    lowered: String,
    pattern: Regex,
}

pub struct EvidenceScorer<'a, F: PageFetcher> {
    fetcher: &'a F,
    settings: &'a EvidenceConfig,
    keywords: Vec<KeywordPattern>,
    products: Vec<ProductPattern>,
    strong_keywords: Vec<String>,
    product_keywords: Vec<String>,
}

fn whole_word(term: &str) -> Result<Regex, regex::Error> {
    RegexBuilder::new(&format!(r"\b{}\b", regex::escape(term)))
        .case_insensitive(true)
        .build()
}

fn lowered(values: &[String]) -> Vec<String> {
    values.iter().map(|v| v.trim().to_lowercase()).filter(|v| !v.is_empty()).collect()
}

impl<'a, F: PageFetcher> EvidenceScorer<'a, F> {
    pub fn new(fetcher: &'a F, config: &'a AppConfig) -> anyhow::Result<Self> {
        let strong_keywords = lowered(&config.search.strong_keywords);
        let general_terms = lowered(&config.evidence.general_terms);

        let mut seen = HashSet::new();
        let mut keywords = Vec::new();
        for keyword in lowered(&config.search.keywords_cat)
            .into_iter()
            .chain(lowered(&config.evidence.extra_keywords))
        {
            if !seen.insert(keyword.clone()) {
                continue;
            }
            let confidence = keyword_confidence(&keyword, &strong_keywords, &general_terms);
            keywords.push(KeywordPattern {
                pattern: whole_word(&keyword)?,
                keyword,
                confidence,
            });
        }

        let products = config
            .search
            .cat_products
            .iter()
            .map(|name| {
                let lowered = name.to_lowercase();
                Ok(ProductPattern {
                    pattern: whole_word(&lowered)?,
                    name: name.clone(),
                    lowered,
                })
            })
            .collect::<Result<Vec<_>, regex::Error>>()?;

        Ok(Self {
            fetcher,
            settings: &config.evidence,
            keywords,
            products,
            strong_keywords,
            product_keywords: lowered(&config.search.product_keywords),
        })
    }

    /// Analyse a company's website. Never fails: problems become negative markers.
    pub async fn score(&self, company: &Company) -> Evidence {
        let Some(website) = company.website.as_deref().filter(|w| is_valid_url(w)) else {
            debug!("{}: no usable website", company.name);
            return Evidence::negative(EvidenceStatus::NoSite);
        };

        info!("Analyzing website: {}", website);
        match self.collect_items(website).await {
            Ok(None) => Evidence::negative(EvidenceStatus::FetchFailed),
            Ok(Some(items)) if items.is_empty() => Evidence::negative(EvidenceStatus::NoEvidence),
            Ok(Some(items)) => {
                let evidence = self.summarize(&items);
                info!(
                    "{}: {} evidence items, products [{}]",
                    company.name,
                    evidence.score,
                    evidence.matched_products.join(", ")
                );
                evidence
            }
            Err(e) => {
                debug!("Analysis of {} failed: {}", website, e);
                Evidence::negative(EvidenceStatus::AnalysisError(e.to_string()))
            }
        }
    }

    /// `Ok(None)` when the home page could not be fetched
    async fn collect_items(&self, website: &str) -> Result<Option<Vec<EvidenceItem>>, EvidenceError> {
        let site = Url::parse(website).map_err(|source| EvidenceError::InvalidUrl {
            url: website.to_string(),
            source,
        })?;

        let Some(home) = self.fetcher.fetch(website, &[]).await else {
            return Ok(None);
        };
        let (home_text, career_links) = {
            let document = home.document();
            let base = Url::parse(&home.url).unwrap_or_else(|_| site.clone());
            (visible_text(&document), self.career_links(&document, &base))
        };

        let mut items = self.scan_text(&home_text, Section::MainPage);

        for link in career_links {
            let Some(page) = self.fetcher.fetch(&link, &[]).await else {
                continue;
            };
            let text = visible_text(&page.document());
            items.extend(self.scan_text(&text, Section::JobPosting).into_iter().map(|mut item| {
                item.confidence = (item.confidence + JOB_POSTING_BOOST).min(1.0);
                item
            }));
        }

        for path in self.settings.target_sections.iter().take(self.settings.max_sections) {
            let Ok(section_url) = site.join(path) else {
                debug!("Cannot resolve section {} against {}", path, site);
                continue;
            };
            if let Some(page) = self.fetcher.fetch(section_url.as_str(), &[]).await {
                let text = visible_text(&page.document());
                items.extend(self.scan_text(&text, Section::Path(path.clone())));
            }
            self.settings.section_delay_ms.pause().await;
        }

        Ok(Some(items))
    }

    /// Links whose text or target mentions a career term, resolved and deduplicated
    fn career_links(&self, document: &Html, base: &Url) -> Vec<String> {
        let terms = lowered(&self.settings.career_terms);
        let mut seen = HashSet::new();
        document
            .select(&ANCHOR_SELECTOR)
            .filter_map(|a| {
                let href = a.value().attr("href")?;
                let text = a.text().collect::<String>().to_lowercase();
                let href_lower = href.to_lowercase();
                terms
                    .iter()
                    .any(|t| text.contains(t) || href_lower.contains(t))
                    .then(|| base.join(href.trim()).ok())
                    .flatten()
            })
            .map(|url| url.to_string())
            .filter(|url| seen.insert(url.clone()))
            .take(self.settings.max_job_pages)
            .collect()
    }

    /// Every whole-word keyword occurrence in `text`
    pub fn scan_text(&self, text: &str, section: Section) -> Vec<EvidenceItem> {
        let text = text.to_lowercase();
        let mut items = Vec::new();
        for keyword in &self.keywords {
            for found in keyword.pattern.find_iter(&text) {
                items.push(EvidenceItem {
                    keyword: keyword.keyword.clone(),
                    context: context_window(&text, found.start(), found.end(), self.settings.context_chars),
                    section: section.clone(),
                    confidence: keyword.confidence,
                });
            }
        }
        items
    }

    /// Score, matched products and the human-readable summary for a non-empty item list
    pub fn summarize(&self, items: &[EvidenceItem]) -> Evidence {
        let matched_products = self
            .products
            .iter()
            .filter(|product| {
                items.iter().any(|item| {
                    item.keyword.contains(&product.lowered) || product.pattern.is_match(&item.context)
                })
            })
            .map(|product| product.name.clone())
            .collect();

        let mut parts = Vec::new();

        let mut product_mentions: Vec<&str> = Vec::new();
        for item in items {
            let product = self.product_keywords.iter().any(|p| item.keyword.contains(p.as_str()));
            if product && !product_mentions.contains(&item.keyword.as_str()) {
                product_mentions.push(&item.keyword);
            }
        }
        if !product_mentions.is_empty() {
            product_mentions.truncate(MAX_PRODUCT_MENTIONS);
            parts.push(format!("Products mentioned: {}", product_mentions.join(", ")));
        }

        let mut sections: Vec<(&Section, Vec<&str>)> = Vec::new();
        for item in items {
            let index = match sections.iter().position(|(s, _)| *s == &item.section) {
                Some(index) => index,
                None => {
                    sections.push((&item.section, Vec::new()));
                    sections.len() - 1
                }
            };
            let keywords = &mut sections[index].1;
            if keywords.len() < MAX_KEYWORDS_PER_SECTION && !keywords.contains(&item.keyword.as_str()) {
                keywords.push(&item.keyword);
            }
        }
        for (section, keywords) in sections {
            parts.push(format!("{}: {}", section.label(), keywords.join(", ")));
        }

        let text = truncate_summary(&parts.join("; "), self.settings.summary_limit);
        Evidence::found(text, matched_products, items.len() as u32)
    }
}

/// 0.9 for product names, 0.7 for general CAT terminology, 0.5 otherwise
pub fn keyword_confidence(keyword: &str, strong: &[String], general: &[String]) -> f32 {
    let keyword = keyword.to_lowercase();
    if strong.iter().any(|s| keyword.contains(s.as_str())) {
        0.9
    } else if general.iter().any(|g| keyword.contains(g.as_str())) {
        0.7
    } else {
        0.5
    }
}

/// Evidence filter outcome for one company
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterDecision {
    pub accepted: bool,
    /// The summary text names a strong product keyword
    pub strong_match: bool,
}

/// Accept only found evidence with at least two hits or a strong product keyword in the text
pub fn evidence_decision(evidence: &Evidence, strong_keywords: &[String]) -> FilterDecision {
    let text = evidence.text.to_lowercase();
    let strong_match = strong_keywords.iter().any(|k| text.contains(&k.to_lowercase()));
    let found = evidence.status == EvidenceStatus::Found && evidence.score > 0;
    FilterDecision {
        accepted: found && (evidence.score >= 2 || strong_match),
        strong_match,
    }
}

pub fn passes_evidence_filter(evidence: &Evidence, strong_keywords: &[String]) -> bool {
    evidence_decision(evidence, strong_keywords).accepted
}

/// Text of an HTML document minus script-like elements, trimmed nodes joined by spaces
pub fn visible_text(document: &Html) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for node in document.tree.root().descendants() {
        let Node::Text(text) = node.value() else {
            continue;
        };
        let hidden = node.ancestors().any(|ancestor| {
            matches!(ancestor.value(), Node::Element(el) if HIDDEN_TAGS.contains(&el.name()))
        });
        if hidden {
            continue;
        }
        let trimmed = text.trim();
        if !trimmed.is_empty() {
            parts.push(trimmed);
        }
    }
    parts.join(" ")
}

/// Up to `chars` characters either side of `start..end`, cut on char boundaries
fn context_window(text: &str, start: usize, end: usize, chars: usize) -> String {
    let from = if chars == 0 {
        start
    } else {
        text[..start]
            .char_indices()
            .rev()
            .nth(chars - 1)
            .map(|(i, _)| i)
            .unwrap_or(0)
    };
    let to = text[end..]
        .char_indices()
        .nth(chars)
        .map(|(i, _)| end + i)
        .unwrap_or(text.len());
    text[from..to].trim().to_string()
}

fn truncate_summary(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let kept: String = text.chars().take(limit.saturating_sub(3)).collect();
    format!("{}...", kept)
}
