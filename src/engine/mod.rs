//! 查询引擎接口
//!
//! 引擎只对外提供一种能力：在事务内执行带参数的查询文本，
//! 返回有序的行以及可选的变更计数。`TxScope` 包装一个事务，
//! 任何退出路径都以提交或回滚结束。

pub mod memory;

use crate::error::{Error, Result};
use crate::stats::MutationStats;
use crate::types::{Params, Row};

pub use memory::MemoryGraph;

/// 单次执行的结果
#[derive(Debug, Default)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
    /// 仅当执行产生变更时存在
    pub stats: Option<MutationStats>,
}

impl QueryResult {
    /// 引擎报告的行数
    pub fn row_count(&self) -> u64 {
        self.rows.len() as u64
    }
}

/// 打开的事务，未 `commit` 即丢弃时必须撤销其全部修改
pub trait Transaction {
    fn execute(&mut self, query: &str, params: &Params) -> Result<QueryResult>;

    fn commit(self: Box<Self>) -> Result<()>;

    fn rollback(self: Box<Self>);
}

pub trait QueryEngine: Send + Sync {
    fn begin(&self) -> Result<Box<dyn Transaction + '_>>;
}

/// 作用域事务：未提交时在 drop 中回滚
pub struct TxScope<'a> {
    tx: Option<Box<dyn Transaction + 'a>>,
}

impl<'a> TxScope<'a> {
    pub fn begin(engine: &'a dyn QueryEngine) -> Result<Self> {
        Ok(Self {
            tx: Some(engine.begin()?),
        })
    }

    pub fn execute(&mut self, query: &str, params: &Params) -> Result<QueryResult> {
        match self.tx.as_mut() {
            Some(tx) => tx.execute(query, params),
            None => Err(Error::QueryExecution(
                "transaction already closed".to_string(),
            )),
        }
    }

    pub fn commit(mut self) -> Result<()> {
        match self.tx.take() {
            Some(tx) => tx.commit(),
            None => Ok(()),
        }
    }
}

impl Drop for TxScope<'_> {
    fn drop(&mut self) {
        if let Some(tx) = self.tx.take() {
            tracing::debug!("rolling back uncommitted transaction");
            tx.rollback();
        }
    }
}
