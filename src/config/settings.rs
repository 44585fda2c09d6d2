use crate::utils::error::{EtlError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// 標準欄位 (canonical schema)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    InvoiceId,
    StockCode,
    Description,
    Quantity,
    InvoiceTimestamp,
    UnitPrice,
    CustomerId,
    Country,
}

impl Field {
    pub const ALL: [Field; 8] = [
        Field::InvoiceId,
        Field::StockCode,
        Field::Description,
        Field::Quantity,
        Field::InvoiceTimestamp,
        Field::UnitPrice,
        Field::CustomerId,
        Field::Country,
    ];

    pub fn canonical_name(self) -> &'static str {
        match self {
            Field::InvoiceId => "invoice_id",
            Field::StockCode => "stock_code",
            Field::Description => "description",
            Field::Quantity => "quantity",
            Field::InvoiceTimestamp => "invoice_timestamp",
            Field::UnitPrice => "unit_price",
            Field::CustomerId => "customer_id",
            Field::Country => "country",
        }
    }

    pub fn from_canonical(name: &str) -> Option<Field> {
        Field::ALL
            .into_iter()
            .find(|f| f.canonical_name() == name.trim())
    }

    /// Header spellings recognized out of the box, compared after `header_key`.
    fn default_aliases(self) -> &'static [&'static str] {
        match self {
            Field::InvoiceId => &["invoiceno", "invoiceid", "invoice", "invoicenumber"],
            Field::StockCode => &["stockcode", "productcode", "sku"],
            Field::Description => &["description", "productdescription"],
            Field::Quantity => &["quantity", "qty"],
            Field::InvoiceTimestamp => &[
                "invoicedate",
                "invoicetimestamp",
                "invoicedatetime",
                "invoicetime",
            ],
            Field::UnitPrice => &["unitprice", "price"],
            Field::CustomerId => &["customerid", "customer", "customerno"],
            Field::Country => &["country"],
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.canonical_name())
    }
}

/// 將表頭正規化成比對用的 key：去 BOM、轉小寫、移除空白與底線/連字號
pub fn header_key(raw: &str) -> String {
    raw.trim()
        .trim_matches('\u{feff}')
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-' && *c != '.')
        .flat_map(char::to_lowercase)
        .collect()
}

/// Enumerated raw-header → canonical-field mapping handed to the normalizer.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnMapping {
    aliases: BTreeMap<String, Field>,
}

impl Default for ColumnMapping {
    fn default() -> Self {
        let mut aliases = BTreeMap::new();
        for field in Field::ALL {
            aliases.insert(header_key(field.canonical_name()), field);
            for alias in field.default_aliases() {
                aliases.insert((*alias).to_string(), field);
            }
        }
        Self { aliases }
    }
}

impl ColumnMapping {
    pub fn with_alias(mut self, field: Field, alias: &str) -> Self {
        self.aliases.insert(header_key(alias), field);
        self
    }

    /// 套用設定檔中 `[columns]` 區段的額外別名
    pub fn with_extra_aliases(mut self, extra: &BTreeMap<String, Vec<String>>) -> Result<Self> {
        for (canonical, aliases) in extra {
            let field = Field::from_canonical(canonical).ok_or_else(|| {
                EtlError::InvalidConfigValueError {
                    field: format!("columns.{}", canonical),
                    value: canonical.clone(),
                    reason: format!(
                        "Unknown canonical column. Valid columns: {}",
                        Field::ALL
                            .iter()
                            .map(|f| f.canonical_name())
                            .collect::<Vec<_>>()
                            .join(", ")
                    ),
                }
            })?;
            for alias in aliases {
                self = self.with_alias(field, alias);
            }
        }
        Ok(self)
    }

    pub fn resolve(&self, raw_header: &str) -> Option<Field> {
        self.aliases.get(&header_key(raw_header)).copied()
    }
}

/// Credit-note marker on `invoice_id`. The UK retail export marks credit notes with a leading "C".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreditNoteRule {
    pub prefix: String,
    pub case_sensitive: bool,
}

impl Default for CreditNoteRule {
    fn default() -> Self {
        Self {
            prefix: "C".to_string(),
            case_sensitive: true,
        }
    }
}

impl CreditNoteRule {
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            ..Self::default()
        }
    }

    pub fn matches(&self, invoice_id: &str) -> bool {
        if self.prefix.is_empty() {
            return false;
        }
        if self.case_sensitive {
            invoice_id.starts_with(&self.prefix)
        } else {
            invoice_id
                .to_uppercase()
                .starts_with(&self.prefix.to_uppercase())
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassificationRule {
    pub credit_note: CreditNoteRule,
    /// 舊版清理腳本把 unit_price <= 0 的列也視為退貨
    pub zero_price_is_return: bool,
}

pub const DEFAULT_TIMESTAMP_FORMATS: &[&str] = &[
    "%m/%d/%Y %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%m/%d/%Y",
    "%Y-%m-%d",
];

/// Everything the pure transformation core needs. No ambient state.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformSettings {
    pub columns: ColumnMapping,
    pub timestamp_formats: Vec<String>,
    pub classification: ClassificationRule,
    pub build_dimensions: bool,
}

impl Default for TransformSettings {
    fn default() -> Self {
        Self {
            columns: ColumnMapping::default(),
            timestamp_formats: DEFAULT_TIMESTAMP_FORMATS
                .iter()
                .map(|f| f.to_string())
                .collect(),
            classification: ClassificationRule::default(),
            build_dimensions: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InputEncoding {
    #[default]
    #[serde(alias = "utf8")]
    Utf8,
    #[serde(alias = "latin1", alias = "iso-8859-1")]
    Latin1,
}

impl InputEncoding {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "utf-8" | "utf8" => Some(InputEncoding::Utf8),
            "latin-1" | "latin1" | "iso-8859-1" => Some(InputEncoding::Latin1),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Csv,
    Tsv,
    Json,
}

impl OutputFormat {
    pub const VALID: [&'static str; 3] = ["csv", "tsv", "json"];

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "csv" => Some(OutputFormat::Csv),
            "tsv" => Some(OutputFormat::Tsv),
            "json" => Some(OutputFormat::Json),
            _ => None,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Csv => "csv",
            OutputFormat::Tsv => "tsv",
            OutputFormat::Json => "json",
        }
    }
}

pub fn parse_output_formats(field_name: &str, values: &[String]) -> Result<Vec<OutputFormat>> {
    let mut formats = Vec::new();
    for value in values {
        let format = OutputFormat::parse(value).ok_or_else(|| EtlError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.clone(),
            reason: format!(
                "Unsupported format. Valid formats: {}",
                OutputFormat::VALID.join(", ")
            ),
        })?;
        if !formats.contains(&format) {
            formats.push(format);
        }
    }
    if formats.is_empty() {
        formats.push(OutputFormat::Csv);
    }
    Ok(formats)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_key_ignores_case_and_spacing() {
        assert_eq!(header_key("InvoiceNo"), "invoiceno");
        assert_eq!(header_key("  Invoice No "), "invoiceno");
        assert_eq!(header_key("\u{feff}invoice_no"), "invoiceno");
        assert_eq!(header_key("Unit-Price"), "unitprice");
    }

    #[test]
    fn test_default_mapping_covers_retail_export_headers() {
        let mapping = ColumnMapping::default();
        let headers = [
            "InvoiceNo",
            "StockCode",
            "Description",
            "Quantity",
            "InvoiceDate",
            "UnitPrice",
            "CustomerID",
            "Country",
        ];
        let resolved: Vec<Field> = headers
            .iter()
            .filter_map(|h| mapping.resolve(h))
            .collect();
        assert_eq!(resolved, Field::ALL.to_vec());
        assert_eq!(mapping.resolve("invoice_id"), Some(Field::InvoiceId));
        assert_eq!(mapping.resolve("Customer Id"), Some(Field::CustomerId));
        assert_eq!(mapping.resolve("Discount"), None);
    }

    #[test]
    fn test_extra_aliases_reject_unknown_field() {
        let mut extra = BTreeMap::new();
        extra.insert("invoice_id".to_string(), vec!["Bill Ref".to_string()]);
        let mapping = ColumnMapping::default().with_extra_aliases(&extra).unwrap();
        assert_eq!(mapping.resolve("BILL_REF"), Some(Field::InvoiceId));

        let mut bad = BTreeMap::new();
        bad.insert("discount".to_string(), vec!["Disc".to_string()]);
        assert!(ColumnMapping::default().with_extra_aliases(&bad).is_err());
    }

    #[test]
    fn test_credit_note_rule() {
        let rule = CreditNoteRule::default();
        assert!(rule.matches("C536379"));
        assert!(!rule.matches("536379"));
        assert!(!rule.matches("c536379"));

        let relaxed = CreditNoteRule {
            prefix: "c".to_string(),
            case_sensitive: false,
        };
        assert!(relaxed.matches("C536379"));

        assert!(!CreditNoteRule::with_prefix("").matches("C1"));
    }

    #[test]
    fn test_parse_output_formats_dedupes_and_defaults() {
        let formats =
            parse_output_formats("output.formats", &["csv".into(), "JSON".into(), "csv".into()])
                .unwrap();
        assert_eq!(formats, vec![OutputFormat::Csv, OutputFormat::Json]);
        assert_eq!(
            parse_output_formats("output.formats", &[]).unwrap(),
            vec![OutputFormat::Csv]
        );
        assert!(parse_output_formats("output.formats", &["parquet".into()]).is_err());
    }
}
