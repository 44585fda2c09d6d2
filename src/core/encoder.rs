use crate::config::settings::OutputFormat;
use crate::domain::model::{MaterializedTables, Rejection, RejectionRow, TableRow, ValidationReport};
use crate::utils::error::{EtlError, Result};
use csv::WriterBuilder;
use std::io::Write;
use zip::write::{SimpleFileOptions, ZipWriter};

pub const SALES_TABLE: &str = "fact_sales_lines";
pub const RETURNS_TABLE: &str = "fact_returns_lines";
pub const SALES_WITH_CUSTOMER_TABLE: &str = "fact_sales_lines_with_customer";
pub const DIM_PRODUCTS_TABLE: &str = "dim_products";
pub const DIM_CUSTOMERS_TABLE: &str = "dim_customers";
pub const DIM_INVOICES_TABLE: &str = "dim_invoices";
pub const REPORT_FILE: &str = "validation_report.json";
pub const REJECTIONS_FILE: &str = "rejected_rows.csv";

/// 一個待寫出的檔案
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedFile {
    pub name: String,
    pub data: Vec<u8>,
}

fn delimited<T: TableRow>(rows: &[T], delimiter: u8) -> Result<Vec<u8>> {
    let mut writer = WriterBuilder::new()
        .delimiter(delimiter)
        .terminator(csv::Terminator::Any(b'\n'))
        .has_headers(false)
        .from_writer(Vec::new());

    // 表頭一律寫出，空表也保有欄位資訊
    writer.write_record(T::COLUMNS)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.into_inner().map_err(|e| EtlError::ProcessingError {
        message: format!("failed to flush table writer: {}", e),
    })
}

pub fn encode_table<T: TableRow>(rows: &[T], format: OutputFormat) -> Result<Vec<u8>> {
    match format {
        OutputFormat::Csv => delimited(rows, b','),
        OutputFormat::Tsv => delimited(rows, b'\t'),
        OutputFormat::Json => Ok(serde_json::to_vec_pretty(rows)?),
    }
}

fn push<T: TableRow>(files: &mut Vec<EncodedFile>, name: &str, rows: &[T], format: OutputFormat) -> Result<()> {
    files.push(EncodedFile {
        name: format!("{}.{}", name, format.extension()),
        data: encode_table(rows, format)?,
    });
    Ok(())
}

/// Encode every materialized table in a fixed order.
pub fn encode_tables(tables: &MaterializedTables, format: OutputFormat) -> Result<Vec<EncodedFile>> {
    let mut files = Vec::new();
    push(&mut files, SALES_TABLE, &tables.sales, format)?;
    push(&mut files, RETURNS_TABLE, &tables.returns, format)?;

    if let Some(dims) = &tables.dimensions {
        push(&mut files, SALES_WITH_CUSTOMER_TABLE, &dims.sales_with_customer, format)?;
        push(&mut files, DIM_PRODUCTS_TABLE, &dims.dim_products, format)?;
        push(&mut files, DIM_CUSTOMERS_TABLE, &dims.dim_customers, format)?;
        push(&mut files, DIM_INVOICES_TABLE, &dims.dim_invoices, format)?;
    }
    Ok(files)
}

pub fn encode_report(report: &ValidationReport) -> Result<EncodedFile> {
    Ok(EncodedFile {
        name: REPORT_FILE.to_string(),
        data: serde_json::to_vec_pretty(report)?,
    })
}

pub fn encode_rejections(rejections: &[Rejection]) -> Result<EncodedFile> {
    let rows: Vec<RejectionRow> = rejections
        .iter()
        .map(|r| RejectionRow {
            row_index: r.row_index,
            kind: r.reason.kind().to_string(),
            message: r.reason.to_string(),
        })
        .collect();
    Ok(EncodedFile {
        name: REJECTIONS_FILE.to_string(),
        data: delimited(&rows, b',')?,
    })
}

/// 將所有輸出打包成單一 zip；固定時間戳讓同樣的輸入產生同樣的壓縮檔
pub fn bundle(files: &[EncodedFile]) -> Result<Vec<u8>> {
    let mut zip = ZipWriter::new(std::io::Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().last_modified_time(zip::DateTime::default());

    for file in files {
        zip.start_file(file.name.as_str(), options)?;
        zip.write_all(&file.data)?;
    }

    let cursor = zip.finish()?;
    Ok(cursor.into_inner())
}
