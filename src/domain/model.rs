use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 原始輸入表：表頭加上尚未轉型的文字列
#[derive(Debug, Clone, Default)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<RawRecord>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    /// 0-based data row index (header excluded)
    pub row_index: usize,
    pub fields: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedRecord {
    pub source_row: usize,
    pub invoice_id: String,
    pub stock_code: String,
    pub description: String,
    pub quantity: i64,
    pub invoice_timestamp: NaiveDateTime,
    pub unit_price: f64,
    pub customer_id: Option<String>,
    pub country: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrichedRecord {
    pub record: NormalizedRecord,
    pub invoice_ym: String,
    pub line_total: f64,
    pub is_credit_note: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Partition {
    Sale,
    Return,
}

#[derive(Debug, Clone, Default)]
pub struct ClassifiedDataset {
    pub sales: Vec<EnrichedRecord>,
    pub returns: Vec<EnrichedRecord>,
    /// 進入分類器的筆數，供一致性檢查使用
    pub input_count: usize,
}

impl ClassifiedDataset {
    pub fn len(&self) -> usize {
        self.sales.len() + self.returns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = &EnrichedRecord> {
        self.sales.iter().chain(self.returns.iter())
    }
}

/// Row-level rejection reason. Rows carrying one of these never reach the deriver.
#[derive(Debug, Clone, PartialEq, thiserror::Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RowError {
    #[error("cannot convert {field} value '{value}' to {expected}")]
    TypeConversion {
        field: String,
        value: String,
        expected: String,
    },

    #[error("cannot parse {field} value '{value}' as a timestamp")]
    DateParse { field: String, value: String },

    #[error("required field {field} is empty")]
    MissingValue { field: String },
}

impl RowError {
    pub fn kind(&self) -> &'static str {
        match self {
            RowError::TypeConversion { .. } => "type_conversion",
            RowError::DateParse { .. } => "date_parse",
            RowError::MissingValue { .. } => "missing_value",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rejection {
    pub row_index: usize,
    pub reason: RowError,
}

#[derive(Debug, Clone, Default)]
pub struct NormalizeOutcome {
    pub records: Vec<NormalizedRecord>,
    pub rejections: Vec<Rejection>,
}

impl NormalizeOutcome {
    pub fn rejected_indices(&self) -> Vec<usize> {
        self.rejections.iter().map(|r| r.row_index).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckSeverity {
    Hard,
    Info,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckResult {
    pub check_name: String,
    pub passed: bool,
    pub detail: String,
    pub severity: CheckSeverity,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidationReport {
    pub checks: Vec<CheckResult>,
}

impl ValidationReport {
    pub fn get(&self, check_name: &str) -> Option<&CheckResult> {
        self.checks.iter().find(|c| c.check_name == check_name)
    }

    pub fn hard_failures(&self) -> Vec<&CheckResult> {
        self.checks
            .iter()
            .filter(|c| !c.passed && c.severity == CheckSeverity::Hard)
            .collect()
    }

    pub fn has_hard_failures(&self) -> bool {
        !self.hard_failures().is_empty()
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== VALIDATION REPORT ===")?;
        for check in &self.checks {
            let status = match (check.passed, check.severity) {
                (true, _) => "ok",
                (false, CheckSeverity::Hard) => "FAIL",
                (false, CheckSeverity::Info) => "warn",
            };
            writeln!(f, "{:<5} {:<36} {}", status, check.check_name, check.detail)?;
        }
        Ok(())
    }
}

/// A fixed-column output row. `COLUMNS` matches the serde field order.
pub trait TableRow: Serialize {
    const COLUMNS: &'static [&'static str];
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactLine {
    pub invoice_id: String,
    pub stock_code: String,
    pub description: String,
    pub quantity: i64,
    pub invoice_timestamp: String,
    pub unit_price: f64,
    pub customer_id: Option<String>,
    pub country: String,
    pub is_credit_note: bool,
    pub line_total: f64,
    pub invoice_date: NaiveDate,
    pub invoice_ym: String,
}

impl TableRow for FactLine {
    const COLUMNS: &'static [&'static str] = &[
        "invoice_id",
        "stock_code",
        "description",
        "quantity",
        "invoice_timestamp",
        "unit_price",
        "customer_id",
        "country",
        "is_credit_note",
        "line_total",
        "invoice_date",
        "invoice_ym",
    ];
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductDim {
    pub stock_code: String,
    pub description: String,
}

impl TableRow for ProductDim {
    const COLUMNS: &'static [&'static str] = &["stock_code", "description"];
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CustomerDim {
    pub customer_id: String,
    pub country: String,
}

impl TableRow for CustomerDim {
    const COLUMNS: &'static [&'static str] = &["customer_id", "country"];
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvoiceDim {
    pub invoice_id: String,
    pub invoice_timestamp: String,
}

impl TableRow for InvoiceDim {
    const COLUMNS: &'static [&'static str] = &["invoice_id", "invoice_timestamp"];
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RejectionRow {
    pub row_index: usize,
    pub kind: String,
    pub message: String,
}

impl TableRow for RejectionRow {
    const COLUMNS: &'static [&'static str] = &["row_index", "kind", "message"];
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dimensions {
    pub sales_with_customer: Vec<FactLine>,
    pub dim_products: Vec<ProductDim>,
    pub dim_customers: Vec<CustomerDim>,
    pub dim_invoices: Vec<InvoiceDim>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MaterializedTables {
    pub sales: Vec<FactLine>,
    pub returns: Vec<FactLine>,
    pub dimensions: Option<Dimensions>,
}

#[derive(Debug, Clone)]
pub struct TransformResult {
    pub rejections: Vec<Rejection>,
    pub classified: ClassifiedDataset,
    pub report: ValidationReport,
    pub tables: MaterializedTables,
}

#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub output_path: String,
    pub written_files: Vec<String>,
    pub rejected_rows: usize,
    pub sales_rows: usize,
    pub return_rows: usize,
    pub report: ValidationReport,
}
