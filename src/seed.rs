//! Seed input: known companies supplied by the operator in a CSV or JSON file
//!
//! Seed records carry raw text exactly like scraped ones and go through the
//! same normalization, threshold and evidence stages.
//!
//! Supported layouts:
//! - CSV with a header row naming the columns (`tax_id`/`inn`, `name`,
//!   `revenue`, `employee_count`/`employees`, `industry_code`/`okved_main`,
//!   `website`/`site`, `detail_link`/`detail_url`)
//! - JSON array of objects with the same keys; values may be strings or numbers

use anyhow::{bail, Context, Result};
use std::fs;
use std::path::Path;
use tracing::info;

use crate::company::{Origin, RawCompany};

/// Input format for seed files
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputFormat {
    Csv,
    Json,
}

impl InputFormat {
    /// Detect format from file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension().and_then(|e| e.to_str()).map(|e| e.to_lowercase()).as_deref() {
            Some("csv") => Some(Self::Csv),
            Some("json") => Some(Self::Json),
            _ => None,
        }
    }
}

/// Load seed records from a file (format from extension)
pub fn load_seed_file(path: &Path) -> Result<Vec<RawCompany>> {
    let format = InputFormat::from_path(path).with_context(|| {
        format!(
            "Cannot determine seed format from file extension. Expected .csv or .json: {}",
            path.display()
        )
    })?;

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read seed file: {}", path.display()))?;
    let content = content.trim_start_matches('\u{feff}');

    let records = match format {
        InputFormat::Csv => parse_csv_seed(content)?,
        InputFormat::Json => parse_json_seed(content)?,
    };
    info!("Loaded {} seed records from {}", records.len(), path.display());
    Ok(records)
}

fn column_field(header: &str) -> Option<&'static str> {
    match header.trim().to_lowercase().as_str() {
        "tax_id" | "inn" => Some("tax_id"),
        "name" => Some("name"),
        "revenue" => Some("revenue"),
        "employee_count" | "employees" => Some("employee_count"),
        "industry_code" | "okved_main" | "okved" => Some("industry_code"),
        "website" | "site" => Some("website"),
        "detail_link" | "detail_url" => Some("detail_link"),
        _ => None,
    }
}

/// Parse seed records from CSV content with a header row.
/// Every value is kept as text so leading zeros in tax ids survive.
pub fn parse_csv_seed(content: &str) -> Result<Vec<RawCompany>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let columns: Vec<Option<&'static str>> = reader
        .headers()
        .context("Failed to read seed CSV header")?
        .iter()
        .map(column_field)
        .collect();

    if !columns.contains(&Some("tax_id")) {
        bail!("Seed CSV must have a 'tax_id' (or 'inn') column");
    }

    let mut records = Vec::new();
    for (line, result) in reader.records().enumerate() {
        let row = result.with_context(|| format!("Failed to parse seed CSV row {}", line + 2))?;
        let mut company = RawCompany::new(Origin::SeedFile);

        for (field, value) in columns.iter().zip(row.iter()) {
            let Some(field) = field else { continue };
            let value = (!value.is_empty()).then(|| value.to_string());
            match *field {
                "tax_id" => company.tax_id = value,
                "name" => company.name = value,
                "revenue" => company.revenue = value,
                "employee_count" => company.employee_count = value,
                "industry_code" => company.industry_code = value,
                "website" => company.website = value,
                "detail_link" => company.detail_link = value,
                _ => {}
            }
        }
        records.push(company);
    }

    Ok(records)
}

/// Parse seed records from a JSON array of objects
pub fn parse_json_seed(content: &str) -> Result<Vec<RawCompany>> {
    let records: Vec<RawCompany> =
        serde_json::from_str(content).context("Seed JSON must be an array of company objects")?;
    Ok(records
        .into_iter()
        .map(|mut r| {
            r.origin = Origin::SeedFile;
            r
        })
        .collect())
}
