use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub realtime: RealtimeConfig,
    pub feed: FeedConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub connection_timeout: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RealtimeConfig {
    /// broadcast チャネルのバッファ長。溢れた購読者はイベントを取りこぼす
    pub channel_capacity: usize,
    /// false の場合、変更イベントは ID のみで配信され詳細取得が必要になる
    pub include_records: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeedConfig {
    /// コールドロード時に取得する最大件数
    pub list_limit: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite::memory:".to_string(),
                max_connections: 1,
                connection_timeout: 30,
            },
            realtime: RealtimeConfig::default(),
            feed: FeedConfig::default(),
        }
    }
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 256,
            include_records: true,
        }
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self { list_limit: 100 }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        // 既定値
        let mut cfg = Self::default();

        if let Some(v) = lookup("CAMPUS_DATABASE_URL") {
            let trimmed = v.trim();
            if !trimmed.is_empty() {
                cfg.database.url = trimmed.to_string();
            }
        }
        if let Some(value) = lookup("CAMPUS_DATABASE_MAX_CONNECTIONS").and_then(|v| parse_u32(&v))
        {
            cfg.database.max_connections = value;
        }
        if let Some(value) = lookup("CAMPUS_REALTIME_CHANNEL_CAPACITY").and_then(|v| parse_usize(&v))
        {
            cfg.realtime.channel_capacity = value;
        }
        if let Some(v) = lookup("CAMPUS_REALTIME_INCLUDE_RECORDS") {
            cfg.realtime.include_records = parse_bool(&v, cfg.realtime.include_records);
        }
        if let Some(value) = lookup("CAMPUS_FEED_LIST_LIMIT").and_then(|v| parse_u32(&v)) {
            cfg.feed.list_limit = value;
        }

        cfg
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.database.url.trim().is_empty() {
            return Err("Database url must not be empty".to_string());
        }
        if self.database.max_connections == 0 {
            return Err("Database max_connections must be greater than 0".to_string());
        }
        if self.realtime.channel_capacity == 0 {
            return Err("Realtime channel_capacity must be greater than 0".to_string());
        }
        if self.feed.list_limit == 0 {
            return Err("Feed list_limit must be greater than 0".to_string());
        }
        Ok(())
    }
}

fn parse_bool(s: &str, default: bool) -> bool {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        _ => default,
    }
}

fn parse_u32(value: &str) -> Option<u32> {
    value.trim().parse::<u32>().ok()
}

fn parse_usize(value: &str) -> Option<usize> {
    value.trim().parse::<usize>().ok()
}
