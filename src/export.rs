use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use csv::WriterBuilder;
use rust_xlsxwriter::{Format, Workbook};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::company::Company;
use crate::config::{AppConfig, OutputConfig};
use crate::logger::format_thousands;

pub const CSV_FILE: &str = "companies.csv";
pub const XLSX_FILE: &str = "companies.xlsx";
pub const REPORT_FILE: &str = "report.txt";

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Column order shared by the CSV and XLSX outputs
pub const COLUMNS: [&str; 14] = [
    "tax_id",
    "name",
    "revenue",
    "website",
    "evidence_text",
    "matched_products",
    "evidence_score",
    "employee_count",
    "industry_code",
    "origin",
    "detail_link",
    "size_bucket",
    "revenue_bucket",
    "collection_timestamp",
];

/// Write the CSV, XLSX and text report into `directory`, returning the written paths
pub fn write_outputs(companies: &[Company], config: &AppConfig, directory: &Path) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(directory)
        .with_context(|| format!("Failed to create output directory {}", directory.display()))?;

    let csv_path = directory.join(CSV_FILE);
    export_csv(companies, &csv_path, &config.output)?;

    let xlsx_path = directory.join(XLSX_FILE);
    export_xlsx(companies, &xlsx_path)?;

    let report_path = directory.join(REPORT_FILE);
    export_report(companies, config, &report_path)?;

    Ok(vec![csv_path, xlsx_path, report_path])
}

fn row_values(company: &Company) -> [String; 14] {
    [
        company.tax_id.clone(),
        company.name.clone(),
        company.revenue.to_string(),
        company.website.clone().unwrap_or_default(),
        company.evidence.text.clone(),
        company.evidence.matched_products.join(", "),
        company.evidence.score.to_string(),
        company.employee_count.map(|n| n.to_string()).unwrap_or_default(),
        company.industry_code.clone().unwrap_or_default(),
        company.origin.to_string(),
        company.detail_link.clone().unwrap_or_default(),
        company.size_bucket.map(|b| b.as_str().to_string()).unwrap_or_default(),
        company.revenue_bucket.map(|b| b.as_str().to_string()).unwrap_or_default(),
        company.collected_at.to_rfc3339_opts(SecondsFormat::Secs, true),
    ]
}

pub fn export_csv(companies: &[Company], output_path: &Path, output: &OutputConfig) -> Result<()> {
    debug!("Exporting {} companies to CSV: {}", companies.len(), output_path.display());

    let mut file = File::create(output_path)
        .with_context(|| format!("Failed to create {}", output_path.display()))?;
    if output.write_bom() {
        file.write_all(UTF8_BOM)?;
    }

    let mut wtr = WriterBuilder::new()
        .delimiter(output.delimiter_byte())
        .from_writer(file);

    wtr.write_record(COLUMNS)?;
    for company in companies {
        wtr.write_record(row_values(company))?;
    }

    wtr.flush()?;
    info!("Exported {} companies to CSV: {}", companies.len(), output_path.display());

    Ok(())
}

pub fn export_xlsx(companies: &[Company], output_path: &Path) -> Result<()> {
    debug!("Exporting {} companies to XLSX: {}", companies.len(), output_path.display());

    let mut workbook = Workbook::new();
    let header = Format::new().set_bold();
    let sheet = workbook.add_worksheet();
    sheet.set_name("Companies")?;

    for (col, title) in COLUMNS.iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, *title, &header)?;
    }

    for (index, company) in companies.iter().enumerate() {
        let row = index as u32 + 1;
        for (col, value) in row_values(company).iter().enumerate() {
            let col = col as u16;
            match COLUMNS[col as usize] {
                "revenue" => sheet.write_number(row, col, company.revenue as f64)?,
                "evidence_score" => sheet.write_number(row, col, f64::from(company.evidence.score))?,
                "employee_count" => match company.employee_count {
                    Some(count) => sheet.write_number(row, col, count as f64)?,
                    None => sheet.write_string(row, col, "")?,
                },
                _ => sheet.write_string(row, col, value)?,
            };
        }
    }

    workbook
        .save(output_path)
        .with_context(|| format!("Failed to save {}", output_path.display()))?;
    info!("Exported {} companies to XLSX: {}", companies.len(), output_path.display());

    Ok(())
}

pub fn export_report(companies: &[Company], config: &AppConfig, output_path: &Path) -> Result<()> {
    let content = render_report(companies, config, Utc::now());
    fs::write(output_path, content)
        .with_context(|| format!("Failed to write {}", output_path.display()))?;
    info!("Report written to {}", output_path.display());
    Ok(())
}

/// Aggregates shown in the text report
#[derive(Debug, Default, PartialEq)]
pub struct ReportStats {
    pub total: usize,
    pub over_100m: usize,
    pub over_500m: usize,
    pub over_1b: usize,
    pub revenue_sum: u128,
    pub revenue_avg: u64,
    pub revenue_median: u64,
    pub revenue_min: u64,
    pub revenue_max: u64,
    pub total_employees: u64,
    pub by_origin: Vec<(String, usize)>,
    pub by_product: Vec<(String, usize)>,
    pub by_industry: Vec<(String, usize)>,
    pub by_size: Vec<(String, usize)>,
}

impl ReportStats {
    pub fn from_companies(companies: &[Company]) -> Self {
        if companies.is_empty() {
            return Self::default();
        }

        let mut revenues: Vec<u64> = companies.iter().map(|c| c.revenue).collect();
        revenues.sort_unstable();
        let revenue_sum: u128 = revenues.iter().map(|&r| u128::from(r)).sum();
        let mid = revenues.len() / 2;
        let revenue_median = if revenues.len() % 2 == 0 {
            ((u128::from(revenues[mid - 1]) + u128::from(revenues[mid])) / 2) as u64
        } else {
            revenues[mid]
        };

        Self {
            total: companies.len(),
            over_100m: companies.iter().filter(|c| c.revenue >= 100_000_000).count(),
            over_500m: companies.iter().filter(|c| c.revenue >= 500_000_000).count(),
            over_1b: companies.iter().filter(|c| c.revenue >= 1_000_000_000).count(),
            revenue_sum,
            revenue_avg: (revenue_sum / companies.len() as u128) as u64,
            revenue_median,
            revenue_min: revenues[0],
            revenue_max: revenues[revenues.len() - 1],
            total_employees: companies.iter().filter_map(|c| c.employee_count).sum(),
            by_origin: ranked(companies.iter().map(|c| c.origin.to_string())),
            by_product: ranked(
                companies
                    .iter()
                    .flat_map(|c| c.evidence.matched_products.iter().cloned()),
            ),
            by_industry: ranked(companies.iter().filter_map(|c| c.industry_code.clone())),
            by_size: ranked(
                companies
                    .iter()
                    .filter_map(|c| c.size_bucket.map(|b| b.as_str().to_string())),
            ),
        }
    }
}

/// Count occurrences, most frequent first, ties by name
fn ranked(values: impl Iterator<Item = String>) -> Vec<(String, usize)> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for value in values {
        *counts.entry(value).or_insert(0) += 1;
    }
    let mut ranked: Vec<(String, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked
}

fn shorten(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max_chars).collect();
        format!("{}...", cut)
    }
}

pub fn render_report(companies: &[Company], config: &AppConfig, generated_at: DateTime<Utc>) -> String {
    let stats = ReportStats::from_companies(companies);
    let rule = "=".repeat(60);
    let mut content = String::new();

    content.push_str(&format!("{rule}\nDATA COLLECTION REPORT\n{rule}\n\n"));
    content.push_str(&format!("Generated at: {}\n", generated_at.format("%Y-%m-%d %H:%M:%S UTC")));
    content.push_str(&format!(
        "Revenue threshold: {} ₽ (reporting year {})\n\n",
        format_thousands(config.search.min_revenue),
        config.search.revenue_year
    ));

    content.push_str(&format!("Total companies found: {}\n", stats.total));
    content.push_str(&format!("  Revenue >= 100M ₽: {}\n", stats.over_100m));
    content.push_str(&format!("  Revenue >= 500M ₽: {}\n", stats.over_500m));
    content.push_str(&format!("  Revenue >= 1B ₽: {}\n\n", stats.over_1b));

    let sum = u64::try_from(stats.revenue_sum).map(format_thousands).unwrap_or_else(|_| stats.revenue_sum.to_string());
    content.push_str(&format!("Total revenue sum: {} ₽\n", sum));
    content.push_str(&format!("Average revenue: {} ₽\n", format_thousands(stats.revenue_avg)));
    content.push_str(&format!("Median revenue: {} ₽\n", format_thousands(stats.revenue_median)));
    content.push_str(&format!(
        "Revenue range: {} - {} ₽\n",
        format_thousands(stats.revenue_min),
        format_thousands(stats.revenue_max)
    ));
    content.push_str(&format!("Total employees: {}\n\n", format_thousands(stats.total_employees)));

    content.push_str("Data sources:\n");
    for (origin, count) in &stats.by_origin {
        content.push_str(&format!("  {}: {} companies\n", origin, count));
    }

    if !stats.by_product.is_empty() {
        content.push_str("\nTop CAT products found:\n");
        for (product, count) in stats.by_product.iter().take(10) {
            content.push_str(&format!("  {}: {} companies\n", product, count));
        }
    }

    if !stats.by_industry.is_empty() {
        content.push_str("\nTop industry codes:\n");
        for (code, count) in stats.by_industry.iter().take(5) {
            content.push_str(&format!("  {}: {} companies\n", code, count));
        }
    }

    if !stats.by_size.is_empty() {
        content.push_str("\nCompany size distribution:\n");
        for (bucket, count) in &stats.by_size {
            content.push_str(&format!("  {}: {} companies\n", bucket, count));
        }
    }

    let mut by_revenue: Vec<&Company> = companies.iter().collect();
    by_revenue.sort_by(|a, b| b.revenue.cmp(&a.revenue));
    let top_n = config.output.top_n;

    content.push_str(&format!("\nTop {} companies by revenue:\n", top_n));
    for (rank, company) in by_revenue.iter().take(top_n).enumerate() {
        content.push_str(&format!("{}. {}\n", rank + 1, company.name));
        content.push_str(&format!("   Tax ID: {}\n", company.tax_id));
        content.push_str(&format!("   Revenue: {} ₽\n", format_thousands(company.revenue)));
        content.push_str(&format!(
            "   Employees: {}\n",
            company.employee_count.map(format_thousands).unwrap_or_else(|| "n/a".to_string())
        ));
        content.push_str(&format!("   Website: {}\n", company.website.as_deref().unwrap_or("n/a")));
        content.push_str(&format!("   Evidence: {}\n", shorten(&company.evidence.text, 100)));
        if !company.evidence.matched_products.is_empty() {
            content.push_str(&format!("   Products: {}\n", company.evidence.matched_products.join(", ")));
        }
    }

    content
}
