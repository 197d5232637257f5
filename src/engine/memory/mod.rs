//! 内存属性图引擎
//!
//! 实现 `QueryEngine` 接口的小型参考引擎，服务可以直接运行并做端到端测试。
//! 事务持有存储锁并在图的私有副本上工作：提交时发布副本，回滚时丢弃。

mod ast;
mod executor;
mod parser;

pub use parser::{parse, StatementParser};

use super::{QueryEngine, QueryResult, Transaction};
use crate::error::Result;
use crate::types::{ElementSnapshot, Params, PropertyValue};
use indexmap::IndexMap;
use parking_lot::{Mutex, MutexGuard};
use std::collections::BTreeMap;
use std::sync::Arc;

/// 存储的节点
#[derive(Debug, Clone)]
pub(crate) struct NodeRecord {
    pub id: u64,
    pub labels: Vec<String>,
    pub properties: IndexMap<String, PropertyValue>,
}

/// 存储的关系
#[derive(Debug, Clone)]
pub(crate) struct RelRecord {
    pub id: u64,
    pub rel_type: String,
    pub start: u64,
    pub end: u64,
    pub properties: IndexMap<String, PropertyValue>,
}

/// 整个图的内容，事务开始时克隆
#[derive(Debug, Clone, Default)]
pub(crate) struct GraphState {
    pub next_node_id: u64,
    pub next_rel_id: u64,
    pub nodes: BTreeMap<u64, NodeRecord>,
    pub relationships: BTreeMap<u64, RelRecord>,
}

impl GraphState {
    pub fn create_node(
        &mut self,
        labels: Vec<String>,
        properties: IndexMap<String, PropertyValue>,
    ) -> u64 {
        let id = self.next_node_id;
        self.next_node_id += 1;
        self.nodes.insert(
            id,
            NodeRecord {
                id,
                labels,
                properties,
            },
        );
        id
    }

    pub fn create_relationship(
        &mut self,
        rel_type: String,
        start: u64,
        end: u64,
        properties: IndexMap<String, PropertyValue>,
    ) -> u64 {
        let id = self.next_rel_id;
        self.next_rel_id += 1;
        self.relationships.insert(
            id,
            RelRecord {
                id,
                rel_type,
                start,
                end,
                properties,
            },
        );
        id
    }

    /// 与节点相连的关系
    pub fn attached(&self, node: u64) -> Vec<u64> {
        self.relationships
            .values()
            .filter(|r| r.start == node || r.end == node)
            .map(|r| r.id)
            .collect()
    }

    pub fn node_snapshot(&self, id: u64) -> Option<ElementSnapshot> {
        self.nodes
            .get(&id)
            .map(|n| ElementSnapshot::node(n.id).with_properties(n.properties.clone()))
    }

    pub fn rel_snapshot(&self, id: u64) -> Option<ElementSnapshot> {
        self.relationships
            .get(&id)
            .map(|r| ElementSnapshot::relationship(r.id).with_properties(r.properties.clone()))
    }
}

/// 内存图数据库
#[derive(Debug, Default)]
pub struct MemoryGraph {
    state: Mutex<GraphState>,
}

impl MemoryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    pub fn node_count(&self) -> usize {
        self.state.lock().nodes.len()
    }

    pub fn relationship_count(&self) -> usize {
        self.state.lock().relationships.len()
    }
}

impl QueryEngine for MemoryGraph {
    fn begin(&self) -> Result<Box<dyn Transaction + '_>> {
        let guard = self.state.lock();
        let working = guard.clone();
        Ok(Box::new(MemoryTransaction { guard, working }))
    }
}

/// 基于图私有副本的事务
pub struct MemoryTransaction<'a> {
    guard: MutexGuard<'a, GraphState>,
    working: GraphState,
}

impl Transaction for MemoryTransaction<'_> {
    fn execute(&mut self, query: &str, params: &Params) -> Result<QueryResult> {
        let statement = parse(query)?;
        executor::execute(&mut self.working, &statement, params)
    }

    fn commit(self: Box<Self>) -> Result<()> {
        let MemoryTransaction { mut guard, working } = *self;
        *guard = working;
        Ok(())
    }

    fn rollback(self: Box<Self>) {}
}
