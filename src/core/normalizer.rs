use crate::config::settings::{Field, TransformSettings};
use crate::domain::model::{
    NormalizeOutcome, NormalizedRecord, RawRecord, RawTable, Rejection, RowError,
};
use crate::utils::error::{EtlError, Result};
use chrono::{NaiveDate, NaiveDateTime};
use std::collections::BTreeMap;

/// Column positions of the canonical fields inside a raw table.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnIndex {
    positions: BTreeMap<Field, usize>,
}

impl ColumnIndex {
    pub fn position(&self, field: Field) -> Option<usize> {
        self.positions.get(&field).copied()
    }
}

/// 對應表頭到標準欄位，缺少任何必要欄位即回傳 SchemaError
pub fn resolve_columns(headers: &[String], settings: &TransformSettings) -> Result<ColumnIndex> {
    let mut positions = BTreeMap::new();
    for (idx, header) in headers.iter().enumerate() {
        let Some(field) = settings.columns.resolve(header) else {
            tracing::debug!("Ignoring unmapped column '{}'", header);
            continue;
        };
        if positions.contains_key(&field) {
            tracing::debug!(
                "Column '{}' maps to {} which is already bound; keeping the first one",
                header,
                field
            );
            continue;
        }
        positions.insert(field, idx);
    }

    let missing: Vec<String> = Field::ALL
        .iter()
        .filter(|f| !positions.contains_key(f))
        .map(|f| f.canonical_name().to_string())
        .collect();
    if !missing.is_empty() {
        return Err(EtlError::SchemaError {
            missing,
            found: headers.to_vec(),
        });
    }

    Ok(ColumnIndex { positions })
}

fn cell<'a>(row: &'a RawRecord, index: &ColumnIndex, field: Field) -> &'a str {
    index
        .position(field)
        .and_then(|pos| row.fields.get(pos))
        .map(|v| v.trim())
        .unwrap_or("")
}

fn required_text(row: &RawRecord, index: &ColumnIndex, field: Field) -> std::result::Result<String, RowError> {
    let value = cell(row, index, field);
    if value.is_empty() {
        return Err(RowError::MissingValue {
            field: field.canonical_name().to_string(),
        });
    }
    Ok(value.to_string())
}

pub fn parse_quantity(value: &str) -> std::result::Result<i64, RowError> {
    let conversion_error = || RowError::TypeConversion {
        field: Field::Quantity.canonical_name().to_string(),
        value: value.to_string(),
        expected: "integer".to_string(),
    };

    if let Ok(q) = value.parse::<i64>() {
        return Ok(q);
    }
    // 匯出工具偶爾會輸出 "6.0"
    match value.parse::<f64>() {
        Ok(q) if q.is_finite() && q.fract() == 0.0 && q.abs() < i64::MAX as f64 => Ok(q as i64),
        _ => Err(conversion_error()),
    }
}

pub fn parse_price(value: &str) -> std::result::Result<f64, RowError> {
    match value.parse::<f64>() {
        Ok(p) if p.is_finite() => Ok(p),
        _ => Err(RowError::TypeConversion {
            field: Field::UnitPrice.canonical_name().to_string(),
            value: value.to_string(),
            expected: "decimal".to_string(),
        }),
    }
}

/// Try each format in order as date+time, then as a bare date at midnight.
pub fn parse_timestamp(value: &str, formats: &[String]) -> std::result::Result<NaiveDateTime, RowError> {
    for format in formats {
        if let Ok(ts) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(ts);
        }
    }
    for format in formats {
        if let Ok(date) = NaiveDate::parse_from_str(value, format) {
            if let Some(ts) = date.and_hms_opt(0, 0, 0) {
                return Ok(ts);
            }
        }
    }
    Err(RowError::DateParse {
        field: Field::InvoiceTimestamp.canonical_name().to_string(),
        value: value.to_string(),
    })
}

/// 客戶編號可能被匯出成浮點數 (17850.0)，統一成整數字串；空值視為 null
pub fn normalize_customer_id(value: &str) -> Option<String> {
    if value.is_empty() || value.eq_ignore_ascii_case("nan") {
        return None;
    }
    if let Some(int_part) = value.strip_suffix(".0") {
        if !int_part.is_empty() && int_part.chars().all(|c| c.is_ascii_digit()) {
            return Some(int_part.to_string());
        }
    }
    Some(value.to_string())
}

pub fn normalize_row(
    row: &RawRecord,
    index: &ColumnIndex,
    settings: &TransformSettings,
) -> std::result::Result<NormalizedRecord, RowError> {
    let invoice_id = required_text(row, index, Field::InvoiceId)?;
    let stock_code = required_text(row, index, Field::StockCode)?;
    let description = required_text(row, index, Field::Description)?;

    let quantity = parse_quantity(cell(row, index, Field::Quantity))?;
    let invoice_timestamp = parse_timestamp(
        cell(row, index, Field::InvoiceTimestamp),
        &settings.timestamp_formats,
    )?;
    let unit_price = parse_price(cell(row, index, Field::UnitPrice))?;

    Ok(NormalizedRecord {
        source_row: row.row_index,
        invoice_id,
        stock_code,
        description,
        quantity,
        invoice_timestamp,
        unit_price,
        customer_id: normalize_customer_id(cell(row, index, Field::CustomerId)),
        country: cell(row, index, Field::Country).to_string(),
    })
}

/// Normalize a whole raw table. Schema problems abort; row problems are collected.
pub fn normalize(table: &RawTable, settings: &TransformSettings) -> Result<NormalizeOutcome> {
    let index = resolve_columns(&table.headers, settings)?;

    let mut outcome = NormalizeOutcome::default();
    for row in &table.rows {
        match normalize_row(row, &index, settings) {
            Ok(record) => outcome.records.push(record),
            Err(reason) => {
                tracing::debug!("Rejecting row {}: {}", row.row_index, reason);
                outcome.rejections.push(Rejection {
                    row_index: row.row_index,
                    reason,
                });
            }
        }
    }

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::source::parse_table;
    use chrono::{Datelike, Timelike};

    const HEADER: &str = "InvoiceNo,StockCode,Description,Quantity,InvoiceDate,UnitPrice,CustomerID,Country";

    fn table(rows: &[&str]) -> RawTable {
        let mut text = String::from(HEADER);
        for row in rows {
            text.push('\n');
            text.push_str(row);
        }
        parse_table(&text, b',').unwrap()
    }

    #[test]
    fn test_normalize_valid_row() {
        let raw = table(&["536365, 85123A ,  WHITE HANGING HEART T-LIGHT HOLDER ,6,12/1/2010 8:26,2.55,17850.0,United Kingdom "]);
        let outcome = normalize(&raw, &TransformSettings::default()).unwrap();

        assert!(outcome.rejections.is_empty());
        let record = &outcome.records[0];
        assert_eq!(record.invoice_id, "536365");
        assert_eq!(record.stock_code, "85123A");
        assert_eq!(record.description, "WHITE HANGING HEART T-LIGHT HOLDER");
        assert_eq!(record.quantity, 6);
        assert_eq!(record.invoice_timestamp.year(), 2010);
        assert_eq!(record.invoice_timestamp.month(), 12);
        assert_eq!(record.invoice_timestamp.hour(), 8);
        assert_eq!(record.unit_price, 2.55);
        assert_eq!(record.customer_id.as_deref(), Some("17850"));
        assert_eq!(record.country, "United Kingdom");
    }

    #[test]
    fn test_missing_column_is_schema_error() {
        let raw = parse_table("InvoiceNo,StockCode,Quantity\n1,A,2\n", b',').unwrap();
        let err = normalize(&raw, &TransformSettings::default()).unwrap_err();
        match err {
            EtlError::SchemaError { missing, .. } => {
                assert_eq!(
                    missing,
                    vec!["description", "invoice_timestamp", "unit_price", "customer_id", "country"]
                );
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_headers_match_regardless_of_case_and_spacing() {
        let text = "invoice no,STOCK CODE,description,Quantity ,Invoice_Date,unit price,Customer ID,country\n\
                    536365,85123A,HEART,6,2011-01-15 10:00:00,2.55,,France\n";
        let raw = parse_table(text, b',').unwrap();
        let outcome = normalize(&raw, &TransformSettings::default()).unwrap();
        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.records[0].customer_id, None);
    }

    #[test]
    fn test_bad_rows_are_collected_not_fatal() {
        let raw = table(&[
            "536365,85123A,HEART,six,12/1/2010 8:26,2.55,17850,United Kingdom",
            "536366,22633,HAND WARMER,6,not a date,1.85,17850,United Kingdom",
            "536367,84879,BIRD ORNAMENT,32,12/1/2010 8:34,abc,13047,United Kingdom",
            "536368,,NO CODE,1,12/1/2010 8:34,1.0,13047,United Kingdom",
            "536369,21730,GLASS STAR,6,12/1/2010 8:26,4.25,17850,United Kingdom",
        ]);
        let outcome = normalize(&raw, &TransformSettings::default()).unwrap();

        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.records[0].source_row, 4);
        assert_eq!(outcome.rejected_indices(), vec![0, 1, 2, 3]);
        assert_eq!(outcome.rejections[0].reason.kind(), "type_conversion");
        assert_eq!(outcome.rejections[1].reason.kind(), "date_parse");
        assert_eq!(outcome.rejections[2].reason.kind(), "type_conversion");
        assert_eq!(
            outcome.rejections[3].reason,
            RowError::MissingValue {
                field: "stock_code".to_string()
            }
        );
    }

    #[test]
    fn test_second_column_for_same_field_is_ignored() {
        let text = format!("{},Invoice\n536365,85123A,HEART,6,12/1/2010 8:26,2.55,,France,999999\n", HEADER);
        let raw = parse_table(&text, b',').unwrap();
        let index = resolve_columns(&raw.headers, &TransformSettings::default()).unwrap();
        assert_eq!(index.position(Field::InvoiceId), Some(0));

        let outcome = normalize(&raw, &TransformSettings::default()).unwrap();
        assert_eq!(outcome.records[0].invoice_id, "536365");
    }

    #[test]
    fn test_rejection_index_counts_skipped_empty_rows() {
        let raw = table(&[
            "536365,85123A,HEART,6,12/1/2010 8:26,2.55,17850,United Kingdom",
            ",,,,,,,",
            "536366,22633,HAND WARMER,bad,12/1/2010 8:28,1.85,17850,United Kingdom",
        ]);
        let outcome = normalize(&raw, &TransformSettings::default()).unwrap();

        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.records[0].source_row, 0);
        assert_eq!(outcome.rejected_indices(), vec![2]);
    }

    #[test]
    fn test_parse_helpers() {
        assert_eq!(parse_quantity("-3").unwrap(), -3);
        assert_eq!(parse_quantity("6.0").unwrap(), 6);
        assert!(parse_quantity("6.5").is_err());
        assert!(parse_price("NaN").is_err());
        assert!(parse_price("inf").is_err());
        assert_eq!(parse_price("-11062.06").unwrap(), -11062.06);

        let formats = TransformSettings::default().timestamp_formats;
        let ts = parse_timestamp("2011-01-15T10:00", &formats).unwrap();
        assert_eq!((ts.year(), ts.month(), ts.day(), ts.hour()), (2011, 1, 15, 10));
        let midnight = parse_timestamp("2011-01-15", &formats).unwrap();
        assert_eq!(midnight.hour(), 0);

        let with_seconds = parse_timestamp("12/1/2010 8:26:00", &formats).unwrap();
        assert_eq!(
            (with_seconds.month(), with_seconds.day(), with_seconds.hour(), with_seconds.minute()),
            (12, 1, 8, 26)
        );
        let fractional = parse_timestamp("2010-12-01 08:26:00.000", &formats).unwrap();
        assert_eq!(fractional, with_seconds);
        let fractional_t = parse_timestamp("2010-12-01T08:26:00.500", &formats).unwrap();
        assert_eq!(fractional_t.date(), with_seconds.date());

        assert_eq!(normalize_customer_id("12583.0").as_deref(), Some("12583"));
        assert_eq!(normalize_customer_id("ABC.0").as_deref(), Some("ABC.0"));
        assert_eq!(normalize_customer_id("nan"), None);
    }
}
