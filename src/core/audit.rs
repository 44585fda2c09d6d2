use crate::core::materializer::TIMESTAMP_FORMAT;
use crate::core::{validator, Storage};
use crate::domain::model::{
    CheckResult, CheckSeverity, ClassifiedDataset, EnrichedRecord, FactLine, NormalizedRecord,
    TableRow, ValidationReport,
};
use crate::utils::error::Result;
use chrono::NaiveDateTime;
use csv::ReaderBuilder;
use std::path::Path;

pub const COLUMNS_PRESENT: &str = "columns_present";
pub const DTYPES_BASIC: &str = "dtypes_basic";

/// 從已寫出的 csv 讀回的一張事實表
#[derive(Debug, Clone, Default)]
pub struct FactTable {
    pub headers: Vec<String>,
    pub records: Vec<EnrichedRecord>,
    /// 欄位型別不符、無法轉回 FactLine 的列數
    pub bad_rows: usize,
}

pub fn table_path(output_path: &str, table: &str) -> String {
    Path::new(output_path)
        .join(format!("{}.csv", table))
        .to_string_lossy()
        .into_owned()
}

fn into_enriched(source_row: usize, line: FactLine) -> Option<EnrichedRecord> {
    let invoice_timestamp =
        NaiveDateTime::parse_from_str(&line.invoice_timestamp, TIMESTAMP_FORMAT).ok()?;
    Some(EnrichedRecord {
        record: NormalizedRecord {
            source_row,
            invoice_id: line.invoice_id,
            stock_code: line.stock_code,
            description: line.description,
            quantity: line.quantity,
            invoice_timestamp,
            unit_price: line.unit_price,
            customer_id: line.customer_id,
            country: line.country,
        },
        invoice_ym: line.invoice_ym,
        line_total: line.line_total,
        is_credit_note: line.is_credit_note,
    })
}

/// Read a written fact table back. Rows that no longer type-check are counted, not fatal.
pub fn read_fact_table(bytes: &[u8]) -> Result<FactTable> {
    let mut reader = ReaderBuilder::new().has_headers(true).from_reader(bytes);
    let headers: Vec<String> = reader.headers()?.iter().map(|h| h.trim().to_string()).collect();

    let mut table = FactTable {
        headers,
        ..FactTable::default()
    };
    for (row, result) in reader.deserialize::<FactLine>().enumerate() {
        match result.map(|line| into_enriched(row, line)) {
            Ok(Some(record)) => table.records.push(record),
            Ok(None) => {
                tracing::debug!("Fact row {} has an unreadable invoice_timestamp", row);
                table.bad_rows += 1;
            }
            Err(e) => {
                tracing::debug!("Fact row {} does not match the table layout: {}", row, e);
                table.bad_rows += 1;
            }
        }
    }
    Ok(table)
}

fn columns_present(sales: &FactTable, returns: &FactTable) -> CheckResult {
    let missing: Vec<&str> = FactLine::COLUMNS
        .iter()
        .copied()
        .filter(|col| {
            !sales.headers.iter().any(|h| h == col) || !returns.headers.iter().any(|h| h == col)
        })
        .collect();
    CheckResult {
        check_name: COLUMNS_PRESENT.to_string(),
        passed: missing.is_empty(),
        detail: format!("missing=[{}]", missing.join(", ")),
        severity: CheckSeverity::Hard,
    }
}

fn dtypes_basic(sales: &FactTable, returns: &FactTable) -> CheckResult {
    let bad = sales.bad_rows + returns.bad_rows;
    CheckResult {
        check_name: DTYPES_BASIC.to_string(),
        passed: bad == 0,
        detail: format!("unreadable_rows={}", bad),
        severity: CheckSeverity::Hard,
    }
}

/// 讀回的表格不重跑 ETL：先檢查欄位與型別，再跑與管線相同的檢查組
pub fn validate_tables(sales: FactTable, returns: FactTable) -> ValidationReport {
    let mut checks = vec![columns_present(&sales, &returns), dtypes_basic(&sales, &returns)];

    let offset = sales.records.len();
    let returns_records: Vec<EnrichedRecord> = returns
        .records
        .into_iter()
        .map(|mut r| {
            r.record.source_row += offset;
            r
        })
        .collect();
    let dataset = ClassifiedDataset {
        input_count: offset + returns_records.len(),
        sales: sales.records,
        returns: returns_records,
    };

    checks.extend(validator::validate(&dataset).checks);
    ValidationReport { checks }
}

pub async fn validate_outputs<S: Storage>(
    storage: &S,
    sales_path: &str,
    returns_path: &str,
) -> Result<ValidationReport> {
    let sales = read_fact_table(&storage.read_file(sales_path).await?)?;
    let returns = read_fact_table(&storage.read_file(returns_path).await?)?;
    tracing::info!(
        "📥 Read back sales={} returns={} from {} / {}",
        sales.records.len(),
        returns.records.len(),
        sales_path,
        returns_path
    );
    Ok(validate_tables(sales, returns))
}
