use crate::domain::model::{CheckResult, CheckSeverity, ClassifiedDataset, EnrichedRecord, ValidationReport};
use std::collections::{BTreeMap, HashSet};

pub const REQUIRED_FIELDS_PRESENT: &str = "required_fields_present";
pub const UNIT_PRICE_NON_NEGATIVE_IN_SALES: &str = "unit_price_non_negative_in_sales";
pub const DUPLICATE_INVOICE_STOCK_PAIRS: &str = "duplicate_invoice_stock_pairs";
pub const CLASSIFICATION_COMPLETE: &str = "classification_complete";
pub const LINE_TOTAL_CONSISTENCY: &str = "line_total_consistency";
pub const QUANTITY_POSITIVE_IN_SALES: &str = "quantity_positive_in_sales";
pub const NO_CREDIT_NOTES_IN_SALES: &str = "no_credit_notes_in_sales";
pub const TRIMMED_TEXT_FIELDS: &str = "trimmed_text_fields";
pub const RETURNS_PRESENT: &str = "returns_present";

fn check(name: &str, passed: bool, detail: String, severity: CheckSeverity) -> CheckResult {
    CheckResult {
        check_name: name.to_string(),
        passed,
        detail,
        severity,
    }
}

fn required_fields_present(dataset: &ClassifiedDataset) -> CheckResult {
    let mut invoice_id = 0usize;
    let mut stock_code = 0usize;
    for r in dataset.iter() {
        if r.record.invoice_id.trim().is_empty() {
            invoice_id += 1;
        }
        if r.record.stock_code.trim().is_empty() {
            stock_code += 1;
        }
    }
    check(
        REQUIRED_FIELDS_PRESENT,
        invoice_id + stock_code == 0,
        format!(
            "missing invoice_id={}, stock_code={} (invoice_timestamp is non-null by type)",
            invoice_id, stock_code
        ),
        CheckSeverity::Hard,
    )
}

fn unit_price_non_negative_in_sales(dataset: &ClassifiedDataset) -> CheckResult {
    let negative = dataset
        .sales
        .iter()
        .filter(|r| r.record.unit_price < 0.0)
        .count();
    check(
        UNIT_PRICE_NON_NEGATIVE_IN_SALES,
        negative == 0,
        format!("negative_prices={}", negative),
        CheckSeverity::Hard,
    )
}

/// Rows beyond the first occurrence of each (invoice_id, stock_code) pair.
pub fn count_duplicate_pairs(dataset: &ClassifiedDataset) -> usize {
    let mut counts: BTreeMap<(&str, &str), usize> = BTreeMap::new();
    for r in dataset.iter() {
        *counts
            .entry((r.record.invoice_id.as_str(), r.record.stock_code.as_str()))
            .or_insert(0) += 1;
    }
    counts.values().map(|n| n - 1).sum()
}

fn duplicate_invoice_stock_pairs(dataset: &ClassifiedDataset) -> CheckResult {
    let duplicates = count_duplicate_pairs(dataset);
    check(
        DUPLICATE_INVOICE_STOCK_PAIRS,
        duplicates == 0,
        format!("duplicates={}", duplicates),
        CheckSeverity::Info,
    )
}

fn classification_complete(dataset: &ClassifiedDataset) -> CheckResult {
    let mut seen = HashSet::new();
    let mut repeated = 0usize;
    for r in dataset.iter() {
        if !seen.insert(r.record.source_row) {
            repeated += 1;
        }
    }
    let total = dataset.len();
    check(
        CLASSIFICATION_COMPLETE,
        total == dataset.input_count && repeated == 0,
        format!(
            "sales={} returns={} input={} repeated={}",
            dataset.sales.len(),
            dataset.returns.len(),
            dataset.input_count,
            repeated
        ),
        CheckSeverity::Hard,
    )
}

fn is_close(actual: f64, expected: f64) -> bool {
    (actual - expected).abs() <= 1e-9 + 1e-6 * expected.abs()
}

fn line_total_consistency(dataset: &ClassifiedDataset) -> CheckResult {
    let mismatches = dataset
        .iter()
        .filter(|r| !is_close(r.line_total, r.record.quantity as f64 * r.record.unit_price))
        .count();
    check(
        LINE_TOTAL_CONSISTENCY,
        mismatches == 0,
        format!("mismatches={}", mismatches),
        CheckSeverity::Hard,
    )
}

fn quantity_positive_in_sales(dataset: &ClassifiedDataset) -> CheckResult {
    let bad = dataset.sales.iter().filter(|r| r.record.quantity <= 0).count();
    check(
        QUANTITY_POSITIVE_IN_SALES,
        bad == 0,
        format!("non_positive={}", bad),
        CheckSeverity::Hard,
    )
}

fn no_credit_notes_in_sales(dataset: &ClassifiedDataset) -> CheckResult {
    let bad = dataset.sales.iter().filter(|r| r.is_credit_note).count();
    check(
        NO_CREDIT_NOTES_IN_SALES,
        bad == 0,
        format!("credit_notes={}", bad),
        CheckSeverity::Hard,
    )
}

fn has_edge_spaces(value: &str) -> bool {
    value.starts_with(char::is_whitespace) || value.ends_with(char::is_whitespace)
}

fn untrimmed(r: &EnrichedRecord) -> bool {
    has_edge_spaces(&r.record.invoice_id)
        || has_edge_spaces(&r.record.stock_code)
        || has_edge_spaces(&r.record.description)
        || has_edge_spaces(&r.record.country)
}

fn trimmed_text_fields(dataset: &ClassifiedDataset) -> CheckResult {
    let bad = dataset.iter().filter(|r| untrimmed(r)).count();
    check(
        TRIMMED_TEXT_FIELDS,
        bad == 0,
        format!("untrimmed_rows={}", bad),
        CheckSeverity::Hard,
    )
}

fn returns_present(dataset: &ClassifiedDataset) -> CheckResult {
    check(
        RETURNS_PRESENT,
        !dataset.returns.is_empty(),
        format!("returns={}", dataset.returns.len()),
        CheckSeverity::Info,
    )
}

/// Run every check; none short-circuits and the order is fixed.
pub fn validate(dataset: &ClassifiedDataset) -> ValidationReport {
    let checks = vec![
        required_fields_present(dataset),
        unit_price_non_negative_in_sales(dataset),
        duplicate_invoice_stock_pairs(dataset),
        classification_complete(dataset),
        line_total_consistency(dataset),
        quantity_positive_in_sales(dataset),
        no_credit_notes_in_sales(dataset),
        trimmed_text_fields(dataset),
        returns_present(dataset),
    ];

    for c in checks.iter().filter(|c| !c.passed) {
        tracing::debug!("Check {} did not pass: {}", c.check_name, c.detail);
    }
    ValidationReport { checks }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::settings::{ClassificationRule, CreditNoteRule};
    use crate::core::classifier::classify;
    use crate::core::deriver::derive;
    use crate::domain::model::NormalizedRecord;
    use chrono::NaiveDate;

    fn enriched(row: usize, invoice_id: &str, stock_code: &str, quantity: i64, unit_price: f64) -> EnrichedRecord {
        derive(
            NormalizedRecord {
                source_row: row,
                invoice_id: invoice_id.to_string(),
                stock_code: stock_code.to_string(),
                description: "JUMBO BAG RED RETROSPOT".to_string(),
                quantity,
                invoice_timestamp: NaiveDate::from_ymd_opt(2011, 3, 4)
                    .unwrap()
                    .and_hms_opt(12, 0, 0)
                    .unwrap(),
                unit_price,
                customer_id: Some("12583".to_string()),
                country: "France".to_string(),
            },
            &CreditNoteRule::default(),
        )
    }

    fn dataset(records: Vec<EnrichedRecord>) -> ClassifiedDataset {
        classify(records, &ClassificationRule::default())
    }

    #[test]
    fn test_clean_dataset_has_no_hard_failures() {
        let report = validate(&dataset(vec![
            enriched(0, "536365", "85099B", 10, 1.95),
            enriched(1, "C536379", "D", -1, 27.5),
        ]));

        assert_eq!(report.checks.len(), 9);
        assert!(!report.has_hard_failures());
        assert!(report.checks.iter().all(|c| c.passed));
        assert_eq!(report.checks[0].check_name, REQUIRED_FIELDS_PRESENT);
    }

    #[test]
    fn test_duplicates_are_informational() {
        let report = validate(&dataset(vec![
            enriched(0, "536365", "85099B", 10, 1.95),
            enriched(1, "536365", "85099B", 10, 1.95),
            enriched(2, "536365", "85099B", 2, 1.95),
            enriched(3, "C536379", "D", -1, 27.5),
        ]));

        let dup = report.get(DUPLICATE_INVOICE_STOCK_PAIRS).unwrap();
        assert!(!dup.passed);
        assert_eq!(dup.detail, "duplicates=2");
        assert_eq!(dup.severity, CheckSeverity::Info);
        assert!(!report.has_hard_failures());
    }

    #[test]
    fn test_negative_price_sale_fails_range_check() {
        let report = validate(&dataset(vec![enriched(0, "A563185", "B", 1, -11062.06)]));

        let range = report.get(UNIT_PRICE_NON_NEGATIVE_IN_SALES).unwrap();
        assert!(!range.passed);
        assert!(report.has_hard_failures());
        // 其他檢查照常執行
        assert!(report.get(LINE_TOTAL_CONSISTENCY).unwrap().passed);
        assert!(!report.get(RETURNS_PRESENT).unwrap().passed);
    }

    #[test]
    fn test_tampered_dataset_fails_structural_checks() {
        let mut ds = dataset(vec![
            enriched(0, "536365", "85099B", 10, 1.95),
            enriched(1, "536366", "22633", 6, 1.85),
        ]);
        ds.sales[1].line_total = 999.0;
        ds.sales[1].record.description = " HAND WARMER".to_string();
        ds.sales[0].record.stock_code = String::new();
        let dup = ds.sales[0].clone();
        ds.returns.push(dup);

        let report = validate(&ds);
        let failed: Vec<&str> = report
            .hard_failures()
            .iter()
            .map(|c| c.check_name.as_str())
            .collect();
        assert_eq!(
            failed,
            vec![
                REQUIRED_FIELDS_PRESENT,
                CLASSIFICATION_COMPLETE,
                LINE_TOTAL_CONSISTENCY,
                TRIMMED_TEXT_FIELDS,
            ]
        );
        assert_eq!(
            report.get(REQUIRED_FIELDS_PRESENT).unwrap().detail,
            "missing invoice_id=0, stock_code=2 (invoice_timestamp is non-null by type)"
        );
    }

    #[test]
    fn test_misrouted_credit_note_is_caught() {
        let mut ds = dataset(vec![enriched(0, "536365", "85099B", 10, 1.95)]);
        let credit = enriched(1, "C536379", "D", 1, 27.5);
        ds.sales.push(credit);
        ds.input_count = 2;

        let report = validate(&ds);
        assert!(!report.get(NO_CREDIT_NOTES_IN_SALES).unwrap().passed);
        assert!(report.get(QUANTITY_POSITIVE_IN_SALES).unwrap().passed);
    }
}
