//! Field normalizers for scraped company data
//!
//! Every function takes free text as it appears on a directory page and
//! returns either a canonical value or `None`.

use once_cell::sync::Lazy;
use regex::Regex;
use url::{Host, Url};

static TAX_ID_LABEL_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(?:ИНН|INN)\s*[:=№]?\s*([0-9]+)").unwrap());

static DIGIT_RUN_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"[0-9]+").unwrap());

static EMPLOYEES_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[0-9][0-9 \u{00A0}\u{202F}]*").unwrap());

static INDUSTRY_CODE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[0-9]{2}\.?[0-9]{0,2}\.?[0-9]{0,2}").unwrap());

static WHITESPACE_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Dotted ASCII host; internationalized labels arrive here already punycoded
static DOMAIN_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:[a-z0-9](?:[a-z0-9-]{0,61}[a-z0-9])?\.)+(?:[a-z]{2,63}|xn--[a-z0-9-]{1,59})\.?$").unwrap()
});

/// Revenue unit tokens, checked in this order
const REVENUE_UNITS: [(&[&str], u64); 3] = [
    (&["млн", "million"], 1_000_000),
    (&["млрд", "billion"], 1_000_000_000),
    (&["тыс", "thousand"], 1_000),
];

/// Collapse runs of whitespace and trim
pub fn normalize_name(text: &str) -> String {
    WHITESPACE_REGEX.replace_all(text.trim(), " ").into_owned()
}

/// A tax id is exactly 10 or 12 ASCII digits
pub fn is_valid_tax_id(value: &str) -> bool {
    (value.len() == 10 || value.len() == 12) && value.bytes().all(|b| b.is_ascii_digit())
}

/// Extract a tax id (ИНН) from free text.
///
/// When a label is present the digits right after it are the only candidate;
/// otherwise the first standalone run of 10 or 12 digits is used.
pub fn extract_tax_id(text: &str) -> Option<String> {
    if let Some(caps) = TAX_ID_LABEL_REGEX.captures(text) {
        let digits = caps.get(1)?.as_str();
        return is_valid_tax_id(digits).then(|| digits.to_string());
    }

    DIGIT_RUN_REGEX
        .find_iter(text)
        .map(|m| m.as_str())
        .find(|run| is_valid_tax_id(run))
        .map(str::to_string)
}

/// Parse a revenue figure such as "100 млн ₽", "10.5 млрд" or "1 234 567 ₽".
///
/// Fractions are kept exactly until the unit multiplier is applied, then
/// truncated toward zero.
pub fn parse_revenue(text: &str) -> Option<u64> {
    let lowered = text.to_lowercase();
    let multiplier = REVENUE_UNITS
        .iter()
        .find(|(tokens, _)| tokens.iter().any(|t| lowered.contains(t)))
        .map(|(_, m)| *m)
        .unwrap_or(1);

    let cleaned: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == ',')
        .map(|c| if c == ',' { '.' } else { c })
        .collect();

    let (int_part, frac_part) = match cleaned.split_once('.') {
        Some((i, f)) => (i, f),
        None => (cleaned.as_str(), ""),
    };
    if frac_part.contains('.') || (int_part.is_empty() && frac_part.is_empty()) {
        return None;
    }

    let int_value: u128 = if int_part.is_empty() { 0 } else { int_part.parse().ok()? };
    let mut total = int_value.checked_mul(multiplier as u128)?;

    if !frac_part.is_empty() {
        // Digits beyond the multiplier's precision cannot change the truncated result
        let frac = &frac_part[..frac_part.len().min(18)];
        let numerator: u128 = frac.parse().ok()?;
        let denominator = 10u128.pow(frac.len() as u32);
        total = total.checked_add(numerator * multiplier as u128 / denominator)?;
    }

    u64::try_from(total).ok()
}

/// First number in free text; space, NBSP and narrow NBSP act as thousands separators
pub fn parse_employee_count(text: &str) -> Option<u64> {
    let found = EMPLOYEES_REGEX.find(text)?;
    let digits: String = found.as_str().chars().filter(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

/// Reduce an industry code (ОКВЭД) like "62.01.1" to its digits.
/// Text without a code passes through trimmed.
pub fn normalize_industry_code(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    match INDUSTRY_CODE_REGEX.find(trimmed) {
        Some(m) => Some(m.as_str().replace('.', "")),
        None => Some(trimmed.to_string()),
    }
}

/// Like [`normalize_industry_code`] but only succeeds when the text contains a code
pub fn find_industry_code(text: &str) -> Option<String> {
    INDUSTRY_CODE_REGEX
        .find(text)
        .map(|m| m.as_str().replace('.', ""))
}

/// Ensure a website carries a scheme; bare domains get `https://`
pub fn normalize_website(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        Some(trimmed.to_string())
    } else {
        Some(format!("https://{}", trimmed))
    }
}

/// Drop everything from the first `?`
pub fn strip_query(url: &str) -> String {
    match url.split_once('?') {
        Some((base, _)) => base.to_string(),
        None => url.to_string(),
    }
}

/// Absolute http(s) URL whose host is a dotted domain (IDN allowed), `localhost` or an IPv4 address
pub fn is_valid_url(url: &str) -> bool {
    let Ok(parsed) = Url::parse(url) else {
        return false;
    };
    if !matches!(parsed.scheme(), "http" | "https") {
        return false;
    }
    match parsed.host() {
        Some(Host::Ipv4(_)) => true,
        Some(Host::Domain(domain)) => domain == "localhost" || DOMAIN_REGEX.is_match(domain),
        _ => false,
    }
}
