//! 变更统计
//!
//! `MutationStats` 是一次执行上报的计数；`StatsCounters` 是导入过程中的累计值，
//! 序列化后正好是导入接口返回的 8 个键。

use serde::{Deserialize, Serialize};

/// 单次执行的变更计数
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationStats {
    pub nodes_created: u64,
    pub nodes_deleted: u64,
    pub relationships_created: u64,
    pub relationships_deleted: u64,
    pub labels_added: u64,
    pub labels_removed: u64,
    pub properties_set: u64,
}

impl MutationStats {
    pub fn contains_updates(&self) -> bool {
        *self != Self::default()
    }
}

/// 累计计数，键顺序即响应中的顺序
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsCounters {
    pub nodes_created: u64,
    pub nodes_deleted: u64,
    pub relationships_created: u64,
    pub relationships_deleted: u64,
    pub labels_added: u64,
    pub labels_removed: u64,
    pub properties_set: u64,
    pub rows: u64,
}

impl StatsCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录一次执行。没有变更计数的执行只累加行数。
    pub fn record(&mut self, stats: Option<&MutationStats>, rows: u64) {
        if let Some(s) = stats {
            self.nodes_created += s.nodes_created;
            self.nodes_deleted += s.nodes_deleted;
            self.relationships_created += s.relationships_created;
            self.relationships_deleted += s.relationships_deleted;
            self.labels_added += s.labels_added;
            self.labels_removed += s.labels_removed;
            self.properties_set += s.properties_set;
        }
        self.rows += rows;
    }

    /// 合并另一组累计值（分块提交时使用）
    pub fn merge(&mut self, other: &StatsCounters) {
        self.nodes_created += other.nodes_created;
        self.nodes_deleted += other.nodes_deleted;
        self.relationships_created += other.relationships_created;
        self.relationships_deleted += other.relationships_deleted;
        self.labels_added += other.labels_added;
        self.labels_removed += other.labels_removed;
        self.properties_set += other.properties_set;
        self.rows += other.rows;
    }
}
