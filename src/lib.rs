//! graphrest - 存储图查询服务
//!
//! 把预先注册的图查询暴露为按 key 访问的操作：
//! - 查询结果递归规范化为确定性的 JSON 树
//! - CSV 表格数据分块事务批量导入，累计变更统计
//! - 单个/多个参数对象请求的结果合并规则

pub mod classify;
pub mod coerce;
pub mod config;
pub mod engine;
pub mod error;
pub mod ingest;
pub mod metrics;
pub mod normalize;
pub mod registry;
pub mod response;
pub mod server;
pub mod service;
pub mod stats;
pub mod types;

// 重导出常用类型
pub use engine::{MemoryGraph, QueryEngine, QueryResult, Transaction, TxScope};
pub use error::{Error, Result};
pub use ingest::{BatchIngestor, CancelFlag, IngestOptions};
pub use normalize::ResultNormalizer;
pub use response::{collapse, present, JsonCodec, Reply};
pub use service::QueryService;
pub use stats::{MutationStats, StatsCounters};
pub use types::{CanonicalValue, ElementSnapshot, GraphElement, Path, PropertyValue, Value};

/// 库版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
