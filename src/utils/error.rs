use thiserror::Error;

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("Zip operation failed: {0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Schema error: missing required column(s): {}", missing.join(", "))]
    SchemaError {
        missing: Vec<String>,
        found: Vec<String>,
    },

    #[error("Configuration error in '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Data processing error: {message}")]
    ProcessingError { message: String },

    #[error("Validation failed: {}", failed_checks.join(", "))]
    ValidationFailed { failed_checks: Vec<String> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Schema,
    Io,
    Processing,
    Validation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl EtlError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            EtlError::ConfigValidationError { .. }
            | EtlError::InvalidConfigValueError { .. }
            | EtlError::MissingConfigError { .. } => ErrorCategory::Configuration,
            EtlError::SchemaError { .. } => ErrorCategory::Schema,
            EtlError::IoError(_) | EtlError::ZipError(_) => ErrorCategory::Io,
            EtlError::CsvError(_)
            | EtlError::SerializationError(_)
            | EtlError::ProcessingError { .. } => ErrorCategory::Processing,
            EtlError::ValidationFailed { .. } => ErrorCategory::Validation,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Validation => ErrorSeverity::High,
            ErrorCategory::Io => ErrorSeverity::Medium,
            ErrorCategory::Processing | ErrorCategory::Schema => ErrorSeverity::High,
            ErrorCategory::Configuration => ErrorSeverity::Critical,
        }
    }

    /// 給終端使用者看的簡短訊息
    pub fn user_friendly_message(&self) -> String {
        match self {
            EtlError::SchemaError { missing, .. } => {
                format!("輸入檔缺少必要欄位: {}", missing.join(", "))
            }
            EtlError::IoError(e) => format!("檔案讀寫失敗: {}", e),
            EtlError::CsvError(e) => format!("CSV 格式錯誤: {}", e),
            EtlError::ValidationFailed { failed_checks } => {
                format!("資料驗證未通過: {}", failed_checks.join(", "))
            }
            other => other.to_string(),
        }
    }

    pub fn recovery_suggestion(&self) -> String {
        match self {
            EtlError::SchemaError { found, .. } => format!(
                "Check the header row or add aliases under [columns]. Headers found: {}",
                found.join(", ")
            ),
            EtlError::IoError(_) => {
                "Check that the input file exists and the output directory is writable".to_string()
            }
            EtlError::CsvError(_) => {
                "Check the delimiter and encoding settings under [input]".to_string()
            }
            EtlError::ValidationFailed { .. } => {
                "Inspect validation_report.json; outputs were written but are not trustworthy"
                    .to_string()
            }
            EtlError::ConfigValidationError { .. }
            | EtlError::InvalidConfigValueError { .. }
            | EtlError::MissingConfigError { .. } => {
                "Fix the configuration file or command line flags".to_string()
            }
            _ => "Re-run with --verbose for details".to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, EtlError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_error_lists_missing_columns() {
        let err = EtlError::SchemaError {
            missing: vec!["quantity".to_string(), "country".to_string()],
            found: vec!["InvoiceNo".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "Schema error: missing required column(s): quantity, country"
        );
        assert_eq!(err.category(), ErrorCategory::Schema);
        assert!(err.recovery_suggestion().contains("InvoiceNo"));
    }

    #[test]
    fn test_severity_ordering_drives_exit_codes() {
        let config = EtlError::MissingConfigError {
            field: "input.path".to_string(),
        };
        let validation = EtlError::ValidationFailed {
            failed_checks: vec!["required_fields_present".to_string()],
        };
        assert_eq!(config.severity(), ErrorSeverity::Critical);
        assert_eq!(validation.severity(), ErrorSeverity::High);
        assert!(config.severity() > validation.severity());
    }
}
