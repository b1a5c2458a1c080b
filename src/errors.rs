use std::fmt;

/// 追踪被拒绝的机器可读原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    /// PixelApp 已禁用
    AppDisabled,
    /// 未绑定任何域名（显式锁定，不回退为放行）
    NoDomainAssigned,
    /// 请求域名与绑定域名不一致
    DomainMismatch,
    /// 既无页面 URL 也无 Origin/Referer，无法确定来源域名
    MissingHost,
}

impl DenyReason {
    pub fn as_code(&self) -> &'static str {
        match self {
            DenyReason::AppDisabled => "app_disabled",
            DenyReason::NoDomainAssigned => "no_domain_assigned",
            DenyReason::DomainMismatch => "domain_mismatch",
            DenyReason::MissingHost => "missing_host",
        }
    }
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_code())
    }
}

#[derive(Debug, Clone)]
pub enum PixelRelayError {
    DatabaseConfig(String),
    DatabaseConnection(String),
    DatabaseOperation(String),
    QueueTimeout(String),
    OperationTimeout(String),
    TransientInfra(String),
    Validation(String),
    TrackingDisabled(DenyReason, String),
    NotFound(String),
    Serialization(String),
    Upstream(String),
}

impl PixelRelayError {
    /// 获取错误代码
    pub fn code(&self) -> &'static str {
        match self {
            PixelRelayError::DatabaseConfig(_) => "E001",
            PixelRelayError::DatabaseConnection(_) => "E002",
            PixelRelayError::DatabaseOperation(_) => "E003",
            PixelRelayError::QueueTimeout(_) => "E004",
            PixelRelayError::OperationTimeout(_) => "E005",
            PixelRelayError::TransientInfra(_) => "E006",
            PixelRelayError::Validation(_) => "E007",
            PixelRelayError::TrackingDisabled(..) => "E008",
            PixelRelayError::NotFound(_) => "E009",
            PixelRelayError::Serialization(_) => "E010",
            PixelRelayError::Upstream(_) => "E011",
        }
    }

    /// 获取错误类型名称
    pub fn error_type(&self) -> &'static str {
        match self {
            PixelRelayError::DatabaseConfig(_) => "Database Configuration Error",
            PixelRelayError::DatabaseConnection(_) => "Database Connection Error",
            PixelRelayError::DatabaseOperation(_) => "Database Operation Error",
            PixelRelayError::QueueTimeout(_) => "Database Queue Timeout",
            PixelRelayError::OperationTimeout(_) => "Database Operation Timeout",
            PixelRelayError::TransientInfra(_) => "Transient Infrastructure Error",
            PixelRelayError::Validation(_) => "Validation Error",
            PixelRelayError::TrackingDisabled(..) => "Tracking Disabled",
            PixelRelayError::NotFound(_) => "Resource Not Found",
            PixelRelayError::Serialization(_) => "Serialization Error",
            PixelRelayError::Upstream(_) => "Upstream API Error",
        }
    }

    /// 获取错误详情
    pub fn message(&self) -> &str {
        match self {
            PixelRelayError::DatabaseConfig(msg) => msg,
            PixelRelayError::DatabaseConnection(msg) => msg,
            PixelRelayError::DatabaseOperation(msg) => msg,
            PixelRelayError::QueueTimeout(msg) => msg,
            PixelRelayError::OperationTimeout(msg) => msg,
            PixelRelayError::TransientInfra(msg) => msg,
            PixelRelayError::Validation(msg) => msg,
            PixelRelayError::TrackingDisabled(_, msg) => msg,
            PixelRelayError::NotFound(msg) => msg,
            PixelRelayError::Serialization(msg) => msg,
            PixelRelayError::Upstream(msg) => msg,
        }
    }

    /// 是否为基础设施瞬时错误（对外映射为 503 + Retry-After）
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            PixelRelayError::QueueTimeout(_)
                | PixelRelayError::OperationTimeout(_)
                | PixelRelayError::TransientInfra(_)
        )
    }

    /// 格式化为彩色输出（用于启动失败时的终端输出）
    pub fn format_colored(&self) -> String {
        use colored::Colorize;
        format!(
            "{} {} {}\n  {}",
            "[ERROR]".red().bold(),
            self.code().yellow(),
            self.error_type().red(),
            self.message().white()
        )
    }

    /// 格式化为简洁输出
    pub fn format_simple(&self) -> String {
        format!("{}: {}", self.error_type(), self.message())
    }
}

impl fmt::Display for PixelRelayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_simple())
    }
}

impl std::error::Error for PixelRelayError {}

// 便捷的构造函数
impl PixelRelayError {
    pub fn database_config<T: Into<String>>(msg: T) -> Self {
        PixelRelayError::DatabaseConfig(msg.into())
    }

    pub fn database_connection<T: Into<String>>(msg: T) -> Self {
        PixelRelayError::DatabaseConnection(msg.into())
    }

    pub fn database_operation<T: Into<String>>(msg: T) -> Self {
        PixelRelayError::DatabaseOperation(msg.into())
    }

    pub fn queue_timeout<T: Into<String>>(msg: T) -> Self {
        PixelRelayError::QueueTimeout(msg.into())
    }

    pub fn operation_timeout<T: Into<String>>(msg: T) -> Self {
        PixelRelayError::OperationTimeout(msg.into())
    }

    pub fn transient_infra<T: Into<String>>(msg: T) -> Self {
        PixelRelayError::TransientInfra(msg.into())
    }

    pub fn validation<T: Into<String>>(msg: T) -> Self {
        PixelRelayError::Validation(msg.into())
    }

    pub fn tracking_disabled<T: Into<String>>(reason: DenyReason, msg: T) -> Self {
        PixelRelayError::TrackingDisabled(reason, msg.into())
    }

    pub fn not_found<T: Into<String>>(msg: T) -> Self {
        PixelRelayError::NotFound(msg.into())
    }

    pub fn serialization<T: Into<String>>(msg: T) -> Self {
        PixelRelayError::Serialization(msg.into())
    }

    pub fn upstream<T: Into<String>>(msg: T) -> Self {
        PixelRelayError::Upstream(msg.into())
    }
}

// 为常见的错误类型实现 From trait
impl From<sea_orm::DbErr> for PixelRelayError {
    fn from(err: sea_orm::DbErr) -> Self {
        PixelRelayError::DatabaseOperation(err.to_string())
    }
}

impl From<serde_json::Error> for PixelRelayError {
    fn from(err: serde_json::Error) -> Self {
        PixelRelayError::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PixelRelayError>;
