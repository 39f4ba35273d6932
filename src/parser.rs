//! Raw record validation, normalization, deduplication and enrichment

use chrono::{DateTime, Utc};
use std::collections::HashSet;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::company::{Company, Evidence, RawCompany, RevenueBucket, SizeBucket};
use crate::normalize::{
    extract_tax_id, is_valid_tax_id, normalize_industry_code, normalize_name, normalize_website,
    parse_employee_count, parse_revenue, strip_query,
};

/// Why a raw record was discarded
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    #[error("invalid tax id '{0}'")]
    InvalidTaxId(String),

    #[error("missing company name")]
    MissingName,

    #[error("missing revenue")]
    MissingRevenue,

    #[error("unparseable revenue '{0}'")]
    UnparseableRevenue(String),

    #[error("revenue {revenue} below threshold {min}")]
    BelowThreshold { revenue: u64, min: u64 },
}

/// Turn one raw record into a typed company, or say why it cannot be used
pub fn parse_company(raw: &RawCompany, collected_at: DateTime<Utc>) -> Result<Company, RejectReason> {
    let raw_tax_id = raw.tax_id.as_deref().unwrap_or_default();
    let tax_id = extract_tax_id(raw_tax_id).unwrap_or_else(|| raw_tax_id.trim().to_string());
    if !is_valid_tax_id(&tax_id) {
        return Err(RejectReason::InvalidTaxId(tax_id));
    }

    let name = raw.name.as_deref().map(normalize_name).unwrap_or_default();
    if name.is_empty() {
        return Err(RejectReason::MissingName);
    }

    let revenue_text = raw.revenue.as_deref().ok_or(RejectReason::MissingRevenue)?;
    let revenue = parse_revenue(revenue_text)
        .ok_or_else(|| RejectReason::UnparseableRevenue(revenue_text.to_string()))?;

    Ok(Company {
        tax_id,
        name,
        revenue,
        employee_count: raw.employee_count.as_deref().and_then(parse_employee_count),
        industry_code: raw.industry_code.as_deref().and_then(normalize_industry_code),
        website: raw.website.as_deref().and_then(normalize_website),
        origin: raw.origin,
        detail_link: raw.detail_link.as_ref().map(|l| l.trim().to_string()).filter(|l| !l.is_empty()),
        size_bucket: None,
        revenue_bucket: None,
        collected_at,
        evidence: Evidence::default(),
    })
}

/// Parse every record, logging and dropping rejects
pub fn parse_companies(raws: &[RawCompany], collected_at: DateTime<Utc>) -> Vec<Company> {
    let mut parsed = Vec::with_capacity(raws.len());
    for raw in raws {
        match parse_company(raw, collected_at) {
            Ok(company) => parsed.push(company),
            Err(reason) => warn!(
                "Rejected {} (tax id {}, {}): {}",
                raw.name.as_deref().unwrap_or("<unnamed>"),
                raw.tax_id.as_deref().map(str::trim).unwrap_or("<none>"),
                raw.origin,
                reason
            ),
        }
    }
    info!("Parsed {} of {} records", parsed.len(), raws.len());
    parsed
}

/// Revenue boundary check: exactly the minimum passes
pub fn check_revenue(company: &Company, min_revenue: u64) -> Result<(), RejectReason> {
    if company.revenue >= min_revenue {
        Ok(())
    } else {
        Err(RejectReason::BelowThreshold {
            revenue: company.revenue,
            min: min_revenue,
        })
    }
}

pub fn filter_by_revenue(companies: Vec<Company>, min_revenue: u64) -> Vec<Company> {
    let before = companies.len();
    let kept: Vec<Company> = companies
        .into_iter()
        .filter(|c| match check_revenue(c, min_revenue) {
            Ok(()) => true,
            Err(reason) => {
                info!("Dropping {} (tax id {}): {}", c.name, c.tax_id, reason);
                false
            }
        })
        .collect();
    info!("{} of {} companies meet the revenue threshold", kept.len(), before);
    kept
}

/// Keep the first raw record per trimmed tax id; records without one are dropped
pub fn dedupe_raw(raws: Vec<RawCompany>) -> Vec<RawCompany> {
    let before = raws.len();
    let mut seen = HashSet::new();
    let unique: Vec<RawCompany> = raws
        .into_iter()
        .filter(|raw| match raw.tax_id.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            Some(tax_id) => {
                let fresh = seen.insert(tax_id.to_string());
                if !fresh {
                    debug!("Duplicate tax id found: {}", tax_id);
                }
                fresh
            }
            None => false,
        })
        .collect();
    info!("Removed {} duplicate or unidentified records", before - unique.len());
    unique
}

/// Keep the first company per tax id, preserving input order
pub fn dedupe_companies(companies: Vec<Company>) -> Vec<Company> {
    let mut seen = HashSet::new();
    companies
        .into_iter()
        .filter(|c| seen.insert(c.tax_id.clone()))
        .collect()
}

/// Assign buckets and drop tracking parameters from the website
pub fn enrich(company: &mut Company) {
    company.size_bucket = company.employee_count.map(SizeBucket::from_employees);
    company.revenue_bucket = Some(RevenueBucket::from_revenue(company.revenue));
    if let Some(site) = company.website.as_mut() {
        *site = strip_query(site);
    }
}
