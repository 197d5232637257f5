//! 服务器配置

use crate::error::{Error, Result};
use crate::ingest::{IngestOptions, DEFAULT_BATCH_SIZE, DEFAULT_DELIMITER};
use std::path::PathBuf;

pub const DEFAULT_MAX_BODY_BYTES: usize = 256 * 1024 * 1024;

/// 服务器配置
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// CSV 导入默认批次大小
    pub default_batch_size: usize,
    /// CSV 导入默认分隔符
    pub default_delimiter: char,
    /// 启动时预加载的查询文件（JSON 对象）
    pub queries_file: Option<PathBuf>,
    /// 请求体大小上限（字节），CSV 导入也受此限制
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            default_batch_size: DEFAULT_BATCH_SIZE,
            default_delimiter: DEFAULT_DELIMITER,
            queries_file: None,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

impl ServerConfig {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn ingest_defaults(&self) -> IngestOptions {
        IngestOptions {
            delimiter: self.default_delimiter,
            batch_size: self.default_batch_size,
        }
    }

    /// 启动前检查
    pub fn validate(&self) -> Result<()> {
        if self.default_batch_size == 0 {
            return Err(Error::InputFormat("默认批次大小必须大于 0".to_string()));
        }
        if !self.default_delimiter.is_ascii() {
            return Err(Error::InputFormat(format!(
                "默认分隔符必须是单字节字符: {:?}",
                self.default_delimiter
            )));
        }
        if let Some(path) = &self.queries_file {
            if !path.is_file() {
                return Err(Error::InputFormat(format!(
                    "查询文件不存在: {}",
                    path.display()
                )));
            }
        }
        Ok(())
    }
}
