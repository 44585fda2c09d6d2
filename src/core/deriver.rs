use crate::config::settings::CreditNoteRule;
use crate::domain::model::{EnrichedRecord, NormalizedRecord};

/// Year-month period key, e.g. "2011-01".
pub fn invoice_ym(record: &NormalizedRecord) -> String {
    record.invoice_timestamp.format("%Y-%m").to_string()
}

/// quantity * unit_price in f64, unrounded
pub fn line_total(record: &NormalizedRecord) -> f64 {
    record.quantity as f64 * record.unit_price
}

pub fn derive(record: NormalizedRecord, credit_note: &CreditNoteRule) -> EnrichedRecord {
    EnrichedRecord {
        invoice_ym: invoice_ym(&record),
        line_total: line_total(&record),
        is_credit_note: credit_note.matches(&record.invoice_id),
        record,
    }
}

pub fn derive_all(records: Vec<NormalizedRecord>, credit_note: &CreditNoteRule) -> Vec<EnrichedRecord> {
    records
        .into_iter()
        .map(|record| derive(record, credit_note))
        .collect()
}
