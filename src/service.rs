//! 查询服务
//!
//! 把注册表、查询引擎、结果规范化与响应整形串起来，对外提供
//! 读、写、导入以及存储查询的增删。所有方法都是阻塞调用。

use crate::classify::is_write_query;
use crate::engine::{QueryEngine, TxScope};
use crate::error::{Error, Result};
use crate::ingest::{BatchIngestor, CancelFlag, IngestOptions};
use crate::metrics::Metrics;
use crate::normalize::ResultNormalizer;
use crate::registry::QueryRegistry;
use crate::response::{collapse, present, JsonCodec, Reply};
use crate::stats::StatsCounters;
use crate::types::{CanonicalValue, Params};
use std::io::Read;
use std::sync::Arc;

pub struct QueryService {
    engine: Arc<dyn QueryEngine>,
    registry: QueryRegistry,
    normalizer: ResultNormalizer,
    codec: JsonCodec,
    metrics: Arc<Metrics>,
    ingest_defaults: IngestOptions,
}

impl QueryService {
    pub fn new(engine: Arc<dyn QueryEngine>, registry: QueryRegistry) -> Self {
        Self {
            engine,
            registry,
            normalizer: ResultNormalizer::new(),
            codec: JsonCodec::new(),
            metrics: Arc::new(Metrics::new()),
            ingest_defaults: IngestOptions::default(),
        }
    }

    pub fn with_ingest_defaults(mut self, options: IngestOptions) -> Self {
        self.ingest_defaults = options;
        self
    }

    pub fn registry(&self) -> &QueryRegistry {
        &self.registry
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub fn codec(&self) -> JsonCodec {
        self.codec
    }

    pub fn ingest_defaults(&self) -> IngestOptions {
        self.ingest_defaults
    }

    /// 保存查询，返回是否覆盖了已有的查询
    pub fn put(&self, key: &str, query: &str) -> bool {
        tracing::debug!(key, "保存查询");
        self.registry.put(key, query)
    }

    pub fn remove(&self, key: &str) -> Result<()> {
        tracing::debug!(key, "删除查询");
        self.registry.remove(key)
    }

    /// 只读执行。写查询在执行前被拒绝；无结果行时返回 `None`。
    pub fn read(&self, key: &str, params: &Params) -> Result<Option<CanonicalValue>> {
        let query = self.registry.get(key)?;
        if is_write_query(&query) {
            self.metrics.record_rejected_mutation();
            tracing::warn!(key, "只读请求拒绝写查询");
            return Err(Error::RejectedMutation(key.to_string()));
        }
        tracing::debug!(key, params = params.len(), "执行只读查询");

        self.timed(|| {
            let mut scope = TxScope::begin(self.engine.as_ref())?;
            let result = scope.execute(&query, params)?;
            scope.commit()?;
            Ok(present(self.normalizer.normalize(result.rows)))
        })
    }

    /// 写执行：每个参数对象执行一次，全部在同一个事务内，
    /// 任一执行失败则整体回滚。
    pub fn write(&self, key: &str, batch: &[Params]) -> Result<Reply> {
        let query = self.registry.get(key)?;
        if batch.is_empty() {
            return Err(Error::InputFormat("参数数组不能为空".to_string()));
        }
        tracing::debug!(key, executions = batch.len(), "执行写查询");

        self.timed(|| {
            let mut scope = TxScope::begin(self.engine.as_ref())?;
            let mut results = Vec::with_capacity(batch.len());
            for params in batch {
                let result = scope.execute(&query, params)?;
                results.push(present(self.normalizer.normalize(result.rows)));
            }
            scope.commit()?;
            Ok(collapse(results))
        })
    }

    /// 解析 JSON 请求体后执行写查询
    pub fn write_json(&self, key: &str, body: &[u8]) -> Result<Reply> {
        // 键不存在时优先报告未找到
        self.registry.get(key)?;
        let batch = self.codec.decode_params(body)?;
        self.write(key, &batch)
    }

    /// CSV 批量导入
    pub fn ingest<R: Read>(
        &self,
        key: &str,
        input: R,
        options: IngestOptions,
        cancel: Option<CancelFlag>,
    ) -> Result<StatsCounters> {
        let query = self.registry.get(key)?;
        tracing::debug!(
            key,
            batch_size = options.batch_size,
            delimiter = %options.delimiter.escape_debug(),
            "开始导入"
        );

        let mut ingestor = BatchIngestor::new(self.engine.as_ref()).with_options(options);
        if let Some(flag) = cancel {
            ingestor = ingestor.with_cancel_flag(flag);
        }
        let result = ingestor.ingest(&query, input);
        self.metrics.record_ingest(result.as_ref().ok());
        result
    }

    fn timed<T>(&self, f: impl FnOnce() -> Result<T>) -> Result<T> {
        let timer = self.metrics.record_query_start();
        let result = f();
        self.metrics.record_query_complete(timer, result.is_ok());
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coerce::bind_query_params;
    use crate::engine::MemoryGraph;
    use serde_json::json;

    const UPDATE_QUERY: &str = "match (n) where id(n) = {id} SET n.name={name} return n";
    const MULTI_COLUMN_QUERY: &str =
        "MATCH (n) WHERE id(n) IN $ids RETURN length(n.name) AS l, n.name AS name";

    fn service() -> (Arc<MemoryGraph>, QueryService) {
        let graph = MemoryGraph::shared();
        let service = QueryService::new(graph.clone(), QueryRegistry::new());
        (graph, service)
    }

    fn seed_people(service: &QueryService) {
        service.put("seed", "CREATE (:Person {name: 'Andres'}), (:Person {name: 'Peter'})");
        service.write("seed", &[Params::new()]).unwrap();
    }

    #[test]
    fn test_read_single_and_multi_row() {
        let (_, service) = service();
        seed_people(&service);
        service.put("cols", MULTI_COLUMN_QUERY);

        let params = bind_query_params([("ids", "0")]).unwrap();
        assert_eq!(
            service.read("cols", &params).unwrap(),
            Some(json!({"l": 6, "name": "Andres"}))
        );

        let params = bind_query_params([("ids", "0"), ("ids", "1")]).unwrap();
        assert_eq!(
            service.read("cols", &params).unwrap(),
            Some(json!([{"l": 6, "name": "Andres"}, {"l": 5, "name": "Peter"}]))
        );

        let params = bind_query_params([("ids", "0"), ("ids", "99")]).unwrap();
        assert_eq!(
            service.read("cols", &params).unwrap(),
            Some(json!({"l": 6, "name": "Andres"}))
        );
    }

    #[test]
    fn test_read_no_rows_and_unknown_key() {
        let (_, service) = service();
        service.put("nobody", "MATCH (n:Nobody) RETURN n");
        assert_eq!(service.read("nobody", &Params::new()).unwrap(), None);
        assert!(matches!(
            service.read("missing", &Params::new()),
            Err(Error::UnknownKey(_))
        ));
    }

    #[test]
    fn test_read_rejects_write_query_before_execution() {
        let (graph, service) = service();
        service.put("add", "create (n:Node {name:{name}}) return n");
        let params = bind_query_params([("name", "foobar")]).unwrap();
        assert!(matches!(
            service.read("add", &params),
            Err(Error::RejectedMutation(_))
        ));
        assert_eq!(graph.node_count(), 0);
        assert_eq!(service.metrics().snapshot().rejected_mutations, 1);
    }

    #[test]
    fn test_write_single_returns_bare_object() {
        let (_, service) = service();
        service.put("add", "create (n:Node {name:{name}}) return n");
        let reply = service
            .write_json("add", br#"{"name": "foobar"}"#)
            .unwrap();
        assert_eq!(reply, Reply::Body(json!({"name": "foobar"})));
    }

    #[test]
    fn test_write_multi_with_absent_results() {
        let (_, service) = service();
        service.put("add", "CREATE (n {name: 'bar'})");
        service.write("add", &[Params::new()]).unwrap();
        service.put("update", UPDATE_QUERY);

        let reply = service
            .write_json(
                "update",
                br#"[{"id": 0, "name": "Neo"}, {"id": -234, "name": "Neo2"}]"#,
            )
            .unwrap();
        assert_eq!(reply, Reply::Body(json!([{"name": "Neo"}, null])));

        let reply = service
            .write_json(
                "update",
                br#"[{"id": -234, "name": "Neo"}, {"id": -234, "name": "Neo"}]"#,
            )
            .unwrap();
        assert_eq!(reply, Reply::Body(json!([null, null])));

        let reply = service
            .write_json("update", br#"{"id": -234, "name": "Neo"}"#)
            .unwrap();
        assert_eq!(reply, Reply::NoContent);
    }

    #[test]
    fn test_write_failure_rolls_back_whole_request() {
        let (graph, service) = service();
        service.put("add", "CREATE (n {name: $name}) RETURN n");
        let err = service
            .write_json("add", br#"[{"name": "ok"}, {"other": 1}]"#)
            .unwrap_err();
        assert!(matches!(err, Error::QueryExecution(_)));
        assert_eq!(graph.node_count(), 0);
    }

    #[test]
    fn test_write_json_errors() {
        let (_, service) = service();
        assert!(matches!(
            service.write_json("missing", b"not json"),
            Err(Error::UnknownKey(_))
        ));
        service.put("add", "CREATE (n {name: $name})");
        assert!(matches!(
            service.write_json("add", b"not json"),
            Err(Error::InputFormat(_))
        ));
    }

    #[test]
    fn test_ingest_records_metrics() {
        let (graph, service) = service();
        service.put("add", "create (n {name:{name}}) return n");
        let stats = service
            .ingest(
                "add",
                "name\nfoo\nbar\nfoobar\n".as_bytes(),
                IngestOptions {
                    delimiter: ',',
                    batch_size: 2,
                },
                None,
            )
            .unwrap();
        assert_eq!(stats.nodes_created, 3);
        assert_eq!(stats.properties_set, 3);
        assert_eq!(stats.rows, 3);
        assert_eq!(graph.node_count(), 3);

        let snapshot = service.metrics().snapshot();
        assert_eq!(snapshot.ingestions, 1);
        assert_eq!(snapshot.rows_ingested, 3);
    }

    #[test]
    fn test_remove() {
        let (_, service) = service();
        assert!(!service.put("k", "MATCH (n) RETURN n"));
        service.remove("k").unwrap();
        assert!(matches!(service.remove("k"), Err(Error::UnknownKey(_))));
    }
}
