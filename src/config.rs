//! 配置模块，负责加载JSON配置文件

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::value::{Culture, TimeZoneSetting};

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("配置文件不存在: {0}")]
    NotFound(String),
    #[error("无法读取配置文件 {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("无法解析JSON配置文件 {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("未知的格式化区域: {0}")]
    UnknownCulture(String),
    #[error("无效的时区: {0}")]
    InvalidTimeZone(String),
}

/// 实体名到数据库表名的映射
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableMapping {
    #[serde(flatten)]
    pub mappings: HashMap<String, String>,
}

impl TableMapping {
    pub fn new(mappings: HashMap<String, String>) -> Self {
        Self { mappings }
    }

    /// 获取实体对应的表名，如果不存在则返回小写的实体名
    pub fn get_table_name(&self, entity: &str) -> String {
        self.mappings
            .get(entity)
            .cloned()
            .unwrap_or_else(|| entity.to_lowercase())
    }

    pub fn insert(&mut self, entity: impl Into<String>, table: impl Into<String>) {
        self.mappings.insert(entity.into(), table.into());
    }
}

/// 过滤引擎配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// 操作数转换使用的区域 ("invariant", "en-US", "ru-RU", "de-DE", "zh-CN")
    pub formatting_culture: String,
    /// 日期按天扩展时使用的时区 ("local", "utc", "+03:00")
    pub time_zone: String,
    /// Like 运算符的通配符
    pub like_wildcard: char,
    pub table_mapping: TableMapping,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            formatting_culture: Culture::INVARIANT.name.to_string(),
            time_zone: "local".to_string(),
            like_wildcard: '%',
            table_mapping: TableMapping::default(),
        }
    }
}

impl FilterConfig {
    /// 从JSON文件加载配置
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();
        let display = path_ref.display().to_string();

        // 检查文件是否存在
        if !path_ref.exists() {
            return Err(ConfigError::NotFound(display));
        }

        let content = fs::read_to_string(path_ref).map_err(|source| ConfigError::Read {
            path: display.clone(),
            source,
        })?;

        let config: FilterConfig = serde_json::from_str(&content)
            .map_err(|source| ConfigError::Parse { path: display, source })?;

        // 提前检查区域和时区, 避免在请求时才失败
        config.culture()?;
        config.zone()?;
        Ok(config)
    }

    pub fn culture(&self) -> Result<Culture, ConfigError> {
        Culture::by_name(&self.formatting_culture)
            .ok_or_else(|| ConfigError::UnknownCulture(self.formatting_culture.clone()))
    }

    pub fn zone(&self) -> Result<TimeZoneSetting, ConfigError> {
        self.time_zone
            .parse()
            .map_err(|_| ConfigError::InvalidTimeZone(self.time_zone.clone()))
    }

    pub fn with_culture(mut self, culture: Culture) -> Self {
        self.formatting_culture = culture.name.to_string();
        self
    }

    pub fn with_time_zone(mut self, zone: TimeZoneSetting) -> Self {
        self.time_zone = zone.to_string();
        self
    }
}
