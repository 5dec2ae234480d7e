use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum AppError {
    /// ログインしていない状態でミューテーションを試みた
    NotAuthenticated,
    /// 所有者でないエンティティへのミューテーション
    NotAuthorized(String),
    /// リモート（クエリサービス）呼び出しの失敗
    RemoteFailure(String),
    CapacityExceeded {
        spot_id: String,
        capacity: u32,
    },
    AlreadyCheckedIn(String),
    NotCheckedIn,
    /// 詳細取得に失敗した購読イベント。UI には伝播させない
    StaleEvent(String),
    Database(String),
    NotFound(String),
    ValidationError(String),
    ConfigurationError(String),
    SerializationError(String),
    DeserializationError(String),
    Internal(String),
}

impl AppError {
    /// ドメインルールによる拒否（致命的ではない）かどうか
    pub fn is_domain_rejection(&self) -> bool {
        matches!(
            self,
            AppError::CapacityExceeded { .. } | AppError::AlreadyCheckedIn(_) | AppError::NotCheckedIn
        )
    }

    pub fn remote(message: impl Into<String>) -> Self {
        AppError::RemoteFailure(message.into())
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::NotAuthenticated => write!(f, "Not authenticated"),
            AppError::NotAuthorized(msg) => write!(f, "Not authorized: {}", msg),
            AppError::RemoteFailure(msg) => write!(f, "Remote failure: {}", msg),
            AppError::CapacityExceeded { spot_id, capacity } => {
                write!(f, "Spot {} is at capacity ({})", spot_id, capacity)
            }
            AppError::AlreadyCheckedIn(spot_id) => {
                write!(f, "Already checked in at spot {}", spot_id)
            }
            AppError::NotCheckedIn => write!(f, "No active check-in"),
            AppError::StaleEvent(msg) => write!(f, "Stale event dropped: {}", msg),
            AppError::Database(msg) => write!(f, "Database error: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            AppError::ConfigurationError(msg) => write!(f, "Configuration error: {}", msg),
            AppError::SerializationError(msg) => write!(f, "Serialization error: {}", msg),
            AppError::DeserializationError(msg) => write!(f, "Deserialization error: {}", msg),
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Database(err.to_string())
    }
}

impl From<sqlx::migrate::MigrateError> for AppError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        AppError::Database(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::SerializationError(err.to_string())
    }
}

impl From<String> for AppError {
    fn from(err: String) -> Self {
        AppError::Internal(err)
    }
}

impl From<&str> for AppError {
    fn from(err: &str) -> Self {
        AppError::Internal(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
