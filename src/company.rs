use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Which collector produced a record
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    DirectorySearch,
    DirectoryRevenueSort,
    RegistryLookup,
    SeedFile,
}

impl std::fmt::Display for Origin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Origin {
    pub fn as_str(&self) -> &'static str {
        match self {
            Origin::DirectorySearch => "directory_search",
            Origin::DirectoryRevenueSort => "directory_revenue_sort",
            Origin::RegistryLookup => "registry_lookup",
            Origin::SeedFile => "seed_file",
        }
    }
}

/// Headcount bucket
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum SizeBucket {
    Micro,
    Small,
    Medium,
    Large,
}

impl SizeBucket {
    pub fn from_employees(count: u64) -> Self {
        match count {
            0..=15 => SizeBucket::Micro,
            16..=100 => SizeBucket::Small,
            101..=250 => SizeBucket::Medium,
            _ => SizeBucket::Large,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SizeBucket::Micro => "micro",
            SizeBucket::Small => "small",
            SizeBucket::Medium => "medium",
            SizeBucket::Large => "large",
        }
    }
}

/// Revenue bucket
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum RevenueBucket {
    Small,
    Medium,
    Large,
}

impl RevenueBucket {
    pub fn from_revenue(revenue: u64) -> Self {
        if revenue >= 1_000_000_000 {
            RevenueBucket::Large
        } else if revenue >= 500_000_000 {
            RevenueBucket::Medium
        } else {
            RevenueBucket::Small
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RevenueBucket::Small => "small",
            RevenueBucket::Medium => "medium",
            RevenueBucket::Large => "large",
        }
    }
}

/// Outcome of a website analysis
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EvidenceStatus {
    /// Not analysed yet
    Pending,
    NoSite,
    FetchFailed,
    NoEvidence,
    AnalysisError(String),
    Found,
}

impl EvidenceStatus {
    /// Marker text written in place of a summary for negative outcomes
    pub fn marker(&self) -> Option<String> {
        match self {
            EvidenceStatus::Pending | EvidenceStatus::Found => None,
            EvidenceStatus::NoSite => Some("No website or invalid URL".to_string()),
            EvidenceStatus::FetchFailed => Some("Failed to load website".to_string()),
            EvidenceStatus::NoEvidence => Some("No CAT system evidence found".to_string()),
            EvidenceStatus::AnalysisError(cause) => Some(format!("Analysis error: {}", cause)),
        }
    }
}

/// Website evidence attached to a company
#[derive(Debug, Clone, PartialEq)]
pub struct Evidence {
    pub status: EvidenceStatus,
    pub text: String,
    pub matched_products: Vec<String>,
    pub score: u32,
}

impl Default for Evidence {
    fn default() -> Self {
        Self {
            status: EvidenceStatus::Pending,
            text: String::new(),
            matched_products: Vec::new(),
            score: 0,
        }
    }
}

impl Evidence {
    /// Negative outcome carrying its marker text and a zero score
    pub fn negative(status: EvidenceStatus) -> Self {
        let text = status.marker().unwrap_or_default();
        Self {
            status,
            text,
            matched_products: Vec::new(),
            score: 0,
        }
    }

    pub fn found(text: String, matched_products: Vec<String>, score: u32) -> Self {
        Self {
            status: EvidenceStatus::Found,
            text,
            matched_products,
            score,
        }
    }
}

/// A company as scraped, before normalization. Every field is raw text.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct RawCompany {
    #[serde(default, alias = "inn", deserialize_with = "string_or_number")]
    pub tax_id: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub revenue: Option<String>,
    #[serde(default, alias = "employees", deserialize_with = "string_or_number")]
    pub employee_count: Option<String>,
    #[serde(default, alias = "okved_main", deserialize_with = "string_or_number")]
    pub industry_code: Option<String>,
    #[serde(default, alias = "site", deserialize_with = "string_or_number")]
    pub website: Option<String>,
    #[serde(default, alias = "detail_url", deserialize_with = "string_or_number")]
    pub detail_link: Option<String>,
    #[serde(skip, default = "default_origin")]
    pub origin: Origin,
}

fn default_origin() -> Origin {
    Origin::SeedFile
}

impl RawCompany {
    pub fn new(origin: Origin) -> Self {
        Self {
            tax_id: None,
            name: None,
            revenue: None,
            employee_count: None,
            industry_code: None,
            website: None,
            detail_link: None,
            origin,
        }
    }
}

/// Accepts JSON strings or numbers (seed files often store tax ids and revenue as numbers).
/// Empty strings become `None`.
fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Value {
        Text(String),
        Int(i64),
        Float(f64),
    }

    let value: Option<Value> = Option::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Text(s)) if s.trim().is_empty() => None,
        Some(Value::Text(s)) => Some(s),
        Some(Value::Int(n)) => Some(n.to_string()),
        Some(Value::Float(f)) => Some(f.to_string()),
        None => None,
    })
}

/// A normalized company record
#[derive(Debug, Clone, PartialEq)]
pub struct Company {
    pub tax_id: String,
    pub name: String,
    pub revenue: u64,
    pub employee_count: Option<u64>,
    pub industry_code: Option<String>,
    pub website: Option<String>,
    pub origin: Origin,
    pub detail_link: Option<String>,
    pub size_bucket: Option<SizeBucket>,
    pub revenue_bucket: Option<RevenueBucket>,
    pub collected_at: DateTime<Utc>,
    pub evidence: Evidence,
}
