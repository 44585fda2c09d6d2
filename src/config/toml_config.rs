use crate::config::settings::{
    parse_output_formats, ClassificationRule, ColumnMapping, CreditNoteRule, InputEncoding,
    OutputFormat, TransformSettings, DEFAULT_TIMESTAMP_FORMATS,
};
use crate::core::ConfigProvider;
use crate::utils::error::{EtlError, Result};
use crate::utils::logger::LogFormat;
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TomlConfig {
    pub pipeline: PipelineConfig,
    pub input: InputConfig,
    pub columns: Option<BTreeMap<String, Vec<String>>>,
    pub timestamps: Option<TimestampConfig>,
    pub classification: Option<ClassificationConfig>,
    pub output: OutputConfig,
    pub monitoring: Option<MonitoringConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub name: String,
    pub description: Option<String>,
    pub version: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputConfig {
    pub path: String,
    pub delimiter: Option<String>,
    pub encoding: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimestampConfig {
    pub formats: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClassificationConfig {
    pub credit_note_prefix: Option<String>,
    pub case_sensitive: Option<bool>,
    pub zero_price_is_return: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    pub path: String,
    pub formats: Option<Vec<String>>,
    pub dimensions: Option<bool>,
    pub strict: Option<bool>,
    pub bundle: Option<BundleConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleConfig {
    pub enabled: bool,
    pub filename: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    pub enabled: bool,
    pub log_format: Option<String>,
}

impl TomlConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(EtlError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| EtlError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${RETAIL_DATA_DIR})，未定義的變數保持原樣
    fn substitute_env_vars(content: &str) -> Result<String> {
        use regex::Regex;
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| EtlError::ProcessingError {
            message: format!("invalid substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn validate_config(&self) -> Result<()> {
        validation::validate_non_empty_string("pipeline.name", &self.pipeline.name)?;
        validation::validate_path("input.path", &self.input.path)?;
        validation::validate_file_extension("input.path", &self.input.path, &["csv", "tsv", "txt"])?;
        validation::validate_path("output.path", &self.output.path)?;

        if let Some(delimiter) = &self.input.delimiter {
            validation::validate_delimiter("input.delimiter", delimiter)?;
        }
        if let Some(encoding) = &self.input.encoding {
            if InputEncoding::parse(encoding).is_none() {
                validation::validate_one_of("input.encoding", encoding, &["utf-8", "latin-1"])?;
            }
        }

        parse_output_formats("output.formats", self.output.formats.as_deref().unwrap_or(&[]))?;

        if let Some(bundle) = self.output.bundle.as_ref().filter(|b| b.enabled) {
            validation::validate_file_extension("output.bundle.filename", &bundle.filename, &["zip"])?;
        }

        if let Some(timestamps) = &self.timestamps {
            if timestamps.formats.is_empty() {
                return Err(EtlError::InvalidConfigValueError {
                    field: "timestamps.formats".to_string(),
                    value: "[]".to_string(),
                    reason: "At least one timestamp format is required".to_string(),
                });
            }
        }

        if let Some(log_format) = self.monitoring.as_ref().and_then(|m| m.log_format.as_deref()) {
            if LogFormat::parse(log_format).is_none() {
                validation::validate_one_of("monitoring.log_format", log_format, &["compact", "json"])?;
            }
        }

        // 未知的標準欄位名稱會在這裡被擋下
        self.column_mapping()?;
        Ok(())
    }

    fn column_mapping(&self) -> Result<ColumnMapping> {
        match &self.columns {
            Some(extra) => ColumnMapping::default().with_extra_aliases(extra),
            None => Ok(ColumnMapping::default()),
        }
    }

    pub fn monitoring_enabled(&self) -> bool {
        self.monitoring.as_ref().map(|m| m.enabled).unwrap_or(false)
    }

    pub fn log_format(&self) -> LogFormat {
        self.monitoring
            .as_ref()
            .and_then(|m| m.log_format.as_deref())
            .and_then(LogFormat::parse)
            .unwrap_or_default()
    }

    fn classification_mut(&mut self) -> &mut ClassificationConfig {
        self.classification.get_or_insert_with(ClassificationConfig::default)
    }

    pub fn set_credit_note_prefix(&mut self, prefix: &str) {
        self.classification_mut().credit_note_prefix = Some(prefix.to_string());
    }

    pub fn set_zero_price_is_return(&mut self, enabled: bool) {
        self.classification_mut().zero_price_is_return = Some(enabled);
    }
}

impl ConfigProvider for TomlConfig {
    fn input_path(&self) -> &str {
        &self.input.path
    }

    fn input_encoding(&self) -> InputEncoding {
        self.input
            .encoding
            .as_deref()
            .and_then(InputEncoding::parse)
            .unwrap_or_default()
    }

    fn input_delimiter(&self) -> u8 {
        self.input
            .delimiter
            .as_deref()
            .and_then(|d| validation::validate_delimiter("input.delimiter", d).ok())
            .unwrap_or(b',')
    }

    fn output_path(&self) -> &str {
        &self.output.path
    }

    fn output_formats(&self) -> Vec<OutputFormat> {
        parse_output_formats("output.formats", self.output.formats.as_deref().unwrap_or(&[]))
            .unwrap_or_else(|_| vec![OutputFormat::Csv])
    }

    fn bundle_filename(&self) -> Option<&str> {
        self.output
            .bundle
            .as_ref()
            .filter(|b| b.enabled)
            .map(|b| b.filename.as_str())
    }

    fn strict(&self) -> bool {
        self.output.strict.unwrap_or(false)
    }

    fn transform_settings(&self) -> Result<TransformSettings> {
        let classification = self.classification.clone().unwrap_or_default();
        let defaults = CreditNoteRule::default();

        Ok(TransformSettings {
            columns: self.column_mapping()?,
            timestamp_formats: self
                .timestamps
                .as_ref()
                .map(|t| t.formats.clone())
                .unwrap_or_else(|| DEFAULT_TIMESTAMP_FORMATS.iter().map(|f| f.to_string()).collect()),
            classification: ClassificationRule {
                credit_note: CreditNoteRule {
                    prefix: classification.credit_note_prefix.unwrap_or(defaults.prefix),
                    case_sensitive: classification
                        .case_sensitive
                        .unwrap_or(defaults.case_sensitive),
                },
                zero_price_is_return: classification.zero_price_is_return.unwrap_or(false),
            },
            build_dimensions: self.output.dimensions.unwrap_or(true),
        })
    }
}

impl Validate for TomlConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
