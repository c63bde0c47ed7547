use thiserror::Error;

/// 致命解析错误：缺表、缺列、文件不可读。出现即中止本次运行
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Unsupported file type: {0} (expected .xlsx, .xls or .csv)")]
    UnsupportedFormat(String),

    #[error("Failed to read workbook: {0}")]
    Workbook(String),

    #[error("Required sheet '{0}' is missing")]
    MissingSheet(String),

    #[error("Required column '{column}' is missing in sheet '{sheet}'")]
    MissingColumn { sheet: String, column: String },

    #[error("Sheet '{0}' has no header row")]
    EmptySheet(String),
}

/// 应用层错误
#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

impl AppError {
    /// 是否为输入文件问题（调用方可据此返回 400）
    pub fn is_parse_error(&self) -> bool {
        matches!(self, AppError::Parse(_))
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
