use crate::config::settings::InputEncoding;
use crate::domain::model::{RawRecord, RawTable};
use crate::utils::error::{EtlError, Result};
use csv::ReaderBuilder;

/// 依設定的編碼把位元組轉成字串。Latin-1 每個位元組直接對應到同值的 code point。
pub fn decode(bytes: &[u8], encoding: InputEncoding) -> String {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    match encoding {
        InputEncoding::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
        InputEncoding::Latin1 => bytes.iter().map(|&b| b as char).collect(),
    }
}

fn normalize_header(raw: &str) -> String {
    raw.trim().trim_matches('\u{feff}').to_string()
}

/// Parse delimited text into a raw table. Cells are kept verbatim; trimming belongs to the normalizer.
pub fn parse_table(text: &str, delimiter: u8) -> Result<RawTable> {
    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader.headers()?.iter().map(normalize_header).collect();
    if headers.iter().all(|h| h.is_empty()) {
        return Err(EtlError::ProcessingError {
            message: "input has no header row".to_string(),
        });
    }

    let mut rows = Vec::new();
    // 全空的列（例如 ",,,"）會被略過，但仍佔用一個列號，退件索引才對得回原始檔案
    for (row_index, record) in reader.records().enumerate() {
        let record = record?;
        if record.iter().all(|value| value.trim().is_empty()) {
            continue;
        }
        let mut fields: Vec<String> = record.iter().map(str::to_string).collect();
        if fields.len() < headers.len() {
            fields.resize(headers.len(), String::new());
        }
        rows.push(RawRecord { row_index, fields });
    }

    tracing::debug!("Parsed {} raw rows with {} columns", rows.len(), headers.len());
    Ok(RawTable { headers, rows })
}

pub fn read_table(bytes: &[u8], encoding: InputEncoding, delimiter: u8) -> Result<RawTable> {
    parse_table(&decode(bytes, encoding), delimiter)
}
