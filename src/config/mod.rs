pub mod cli;
pub mod settings;
pub mod toml_config;

#[cfg(feature = "cli")]
use crate::config::settings::{
    parse_output_formats, ClassificationRule, ColumnMapping, CreditNoteRule, InputEncoding,
    OutputFormat, TransformSettings,
};
#[cfg(feature = "cli")]
use crate::config::toml_config::{BundleConfig, TomlConfig};
#[cfg(feature = "cli")]
use crate::core::ConfigProvider;
#[cfg(feature = "cli")]
use crate::utils::error::Result;
#[cfg(feature = "cli")]
use crate::utils::logger::LogFormat;
#[cfg(feature = "cli")]
use crate::utils::validation::{self, Validate};
#[cfg(feature = "cli")]
use clap::Parser;

#[cfg(feature = "cli")]
pub const DEFAULT_RAW_PATH: &str = "data/raw/OnlineRetail.csv";
#[cfg(feature = "cli")]
pub const DEFAULT_OUTPUT_PATH: &str = "data/clean";

/// 命令列參數。帶 `--config` 時以 TOML 為主，其餘有給的旗標會覆蓋設定檔
#[cfg(feature = "cli")]
#[derive(Debug, Clone, Parser)]
#[command(name = "retail-etl")]
#[command(about = "Online retail cleaner: raw export -> sales/returns tables + validation report")]
pub struct CliConfig {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    pub config: Option<String>,

    /// Path to the raw export (default: data/raw/OnlineRetail.csv)
    #[arg(long)]
    pub raw: Option<String>,

    /// Output folder (default: data/clean)
    #[arg(long)]
    pub out: Option<String>,

    /// Input encoding: utf-8 or latin-1 (default: latin-1)
    #[arg(long)]
    pub encoding: Option<String>,

    /// Input field delimiter (default: ",")
    #[arg(long)]
    pub delimiter: Option<String>,

    /// Output formats, comma separated: csv,tsv,json
    #[arg(long, value_delimiter = ',')]
    pub formats: Vec<String>,

    /// Generate dimension tables and the known-customer fact table (1/0 or true/false)
    #[arg(long, value_parser = parse_switch)]
    pub dims: Option<bool>,

    /// Invoice id prefix marking credit notes
    #[arg(long)]
    pub credit_prefix: Option<String>,

    /// Also treat lines with unit_price <= 0 as returns
    #[arg(long)]
    pub zero_price_is_return: bool,

    /// Bundle every output file into this zip archive
    #[arg(long)]
    pub bundle: Option<String>,

    /// Exit non-zero when a hard validation check fails
    #[arg(long)]
    pub strict: bool,

    /// Log elapsed time and memory per stage
    #[arg(long)]
    pub monitor: bool,

    /// Only validate already written fact tables, without running the ETL
    #[arg(long)]
    pub validate_only: bool,

    /// Sales table to validate (default: <out>/fact_sales_lines.csv)
    #[arg(long)]
    pub sales: Option<String>,

    /// Returns table to validate (default: <out>/fact_returns_lines.csv)
    #[arg(long)]
    pub returns: Option<String>,

    /// Log format: compact or json
    #[arg(long)]
    pub log_format: Option<String>,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,
}

/// 接受舊版腳本的 1/0 以及 true/false
#[cfg(feature = "cli")]
fn parse_switch(value: &str) -> std::result::Result<bool, String> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(format!("expected 1/0 or true/false, got '{}'", other)),
    }
}

#[cfg(feature = "cli")]
impl CliConfig {
    pub fn log_format(&self) -> LogFormat {
        self.log_format
            .as_deref()
            .and_then(LogFormat::parse)
            .unwrap_or_default()
    }

    /// 將有指定的命令列旗標套用到 TOML 設定上
    pub fn apply_overrides(&self, config: &mut TomlConfig) {
        if let Some(raw) = &self.raw {
            config.input.path = raw.clone();
        }
        if let Some(out) = &self.out {
            config.output.path = out.clone();
        }
        if let Some(encoding) = &self.encoding {
            config.input.encoding = Some(encoding.clone());
        }
        if let Some(delimiter) = &self.delimiter {
            config.input.delimiter = Some(delimiter.clone());
        }
        if !self.formats.is_empty() {
            config.output.formats = Some(self.formats.clone());
        }
        if let Some(dims) = self.dims {
            config.output.dimensions = Some(dims);
        }
        if let Some(prefix) = &self.credit_prefix {
            config.set_credit_note_prefix(prefix);
        }
        if self.zero_price_is_return {
            config.set_zero_price_is_return(true);
        }
        if let Some(bundle) = &self.bundle {
            config.output.bundle = Some(BundleConfig {
                enabled: true,
                filename: bundle.clone(),
            });
        }
        if self.strict {
            config.output.strict = Some(true);
        }
    }
}

#[cfg(feature = "cli")]
impl ConfigProvider for CliConfig {
    fn input_path(&self) -> &str {
        self.raw.as_deref().unwrap_or(DEFAULT_RAW_PATH)
    }

    fn input_encoding(&self) -> InputEncoding {
        self.encoding
            .as_deref()
            .and_then(InputEncoding::parse)
            .unwrap_or(InputEncoding::Latin1)
    }

    fn input_delimiter(&self) -> u8 {
        self.delimiter
            .as_deref()
            .and_then(|d| validation::validate_delimiter("delimiter", d).ok())
            .unwrap_or(b',')
    }

    fn output_path(&self) -> &str {
        self.out.as_deref().unwrap_or(DEFAULT_OUTPUT_PATH)
    }

    fn output_formats(&self) -> Vec<OutputFormat> {
        parse_output_formats("formats", &self.formats).unwrap_or_else(|_| vec![OutputFormat::Csv])
    }

    fn bundle_filename(&self) -> Option<&str> {
        self.bundle.as_deref()
    }

    fn strict(&self) -> bool {
        self.strict
    }

    fn transform_settings(&self) -> Result<TransformSettings> {
        let credit_note = match &self.credit_prefix {
            Some(prefix) => CreditNoteRule::with_prefix(prefix.clone()),
            None => CreditNoteRule::default(),
        };
        Ok(TransformSettings {
            columns: ColumnMapping::default(),
            classification: ClassificationRule {
                credit_note,
                zero_price_is_return: self.zero_price_is_return,
            },
            build_dimensions: self.dims.unwrap_or(true),
            ..TransformSettings::default()
        })
    }
}

#[cfg(feature = "cli")]
impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        validation::validate_path("raw", self.input_path())?;
        validation::validate_file_extension("raw", self.input_path(), &["csv", "tsv", "txt"])?;
        validation::validate_path("out", self.output_path())?;
        parse_output_formats("formats", &self.formats)?;
        if let Some(encoding) = &self.encoding {
            if InputEncoding::parse(encoding).is_none() {
                validation::validate_one_of("encoding", encoding, &["utf-8", "latin-1"])?;
            }
        }
        if let Some(delimiter) = &self.delimiter {
            validation::validate_delimiter("delimiter", delimiter)?;
        }
        if let Some(bundle) = &self.bundle {
            validation::validate_file_extension("bundle", bundle, &["zip"])?;
        }
        if let Some(log_format) = &self.log_format {
            if LogFormat::parse(log_format).is_none() {
                validation::validate_one_of("log-format", log_format, &["compact", "json"])?;
            }
        }
        Ok(())
    }
}
