//! 错误类型定义

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// 请求体或 CSV 输入无法解析（含字段数不匹配、数值转换失败）
    #[error("输入格式错误: {0}")]
    InputFormat(String),

    /// 查询引擎拒绝执行，消息保持引擎原文
    #[error("{0}")]
    QueryExecution(String),

    #[error("{0}")]
    QueryParse(String),

    #[error("未找到: {0}")]
    UnknownKey(String),

    /// 只读路径上出现写查询
    #[error("只读请求不允许写查询: {0}")]
    RejectedMutation(String),

    #[error("导入已取消")]
    Cancelled,

    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),

    #[error("序列化错误: {0}")]
    Serialization(String),

    #[error("服务器错误: {0}")]
    Server(String),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<csv::Error> for Error {
    fn from(e: csv::Error) -> Self {
        if !e.is_io_error() {
            return Error::InputFormat(format!("CSV 解析错误: {}", e));
        }
        match e.into_kind() {
            csv::ErrorKind::Io(io) => Error::Io(io),
            _ => Error::InputFormat("CSV 解析错误".to_string()),
        }
    }
}
