//! 性能指标收集模块
//!
//! 请求与导入计数，导出为 Prometheus 文本格式。指标实例由服务持有。

use crate::stats::StatsCounters;
use serde::{Deserialize, Serialize};
use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// 服务指标
#[derive(Debug)]
pub struct Metrics {
    /// 查询统计
    query_stats: QueryStats,
    /// 导入统计
    ingest_stats: IngestStats,
    /// 启动时间
    start_time: Instant,
}

/// 查询统计（读/写请求）
#[derive(Debug, Default)]
struct QueryStats {
    total_queries: AtomicU64,
    success_queries: AtomicU64,
    failed_queries: AtomicU64,
    /// 查询总耗时（微秒）
    total_duration_us: AtomicU64,
    /// 慢查询数（>1s）
    slow_queries: AtomicU64,
    /// 只读路径拒绝的写查询
    rejected_mutations: AtomicU64,
}

/// 导入统计
#[derive(Debug, Default)]
struct IngestStats {
    ingestions: AtomicU64,
    failed_ingestions: AtomicU64,
    rows_ingested: AtomicU64,
    nodes_created: AtomicU64,
    relationships_created: AtomicU64,
}

/// 可导出的指标快照
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub total_queries: u64,
    pub success_queries: u64,
    pub failed_queries: u64,
    pub avg_query_duration_ms: f64,
    pub slow_queries: u64,
    pub rejected_mutations: u64,

    pub ingestions: u64,
    pub failed_ingestions: u64,
    pub rows_ingested: u64,
    pub nodes_created: u64,
    pub relationships_created: u64,

    pub uptime_seconds: u64,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            query_stats: QueryStats::default(),
            ingest_stats: IngestStats::default(),
            start_time: Instant::now(),
        }
    }

    /// 记录查询开始
    pub fn record_query_start(&self) -> QueryTimer {
        self.query_stats.total_queries.fetch_add(1, Ordering::Relaxed);
        QueryTimer::new()
    }

    /// 记录查询完成
    pub fn record_query_complete(&self, timer: QueryTimer, success: bool) {
        let duration = timer.elapsed();

        if success {
            self.query_stats.success_queries.fetch_add(1, Ordering::Relaxed);
        } else {
            self.query_stats.failed_queries.fetch_add(1, Ordering::Relaxed);
        }

        self.query_stats
            .total_duration_us
            .fetch_add(duration.as_micros() as u64, Ordering::Relaxed);

        if duration.as_secs() >= 1 {
            self.query_stats.slow_queries.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_rejected_mutation(&self) {
        self.query_stats
            .rejected_mutations
            .fetch_add(1, Ordering::Relaxed);
    }

    /// 记录一次导入结果
    pub fn record_ingest(&self, result: Option<&StatsCounters>) {
        self.ingest_stats.ingestions.fetch_add(1, Ordering::Relaxed);
        match result {
            Some(stats) => {
                self.ingest_stats
                    .rows_ingested
                    .fetch_add(stats.rows, Ordering::Relaxed);
                self.ingest_stats
                    .nodes_created
                    .fetch_add(stats.nodes_created, Ordering::Relaxed);
                self.ingest_stats
                    .relationships_created
                    .fetch_add(stats.relationships_created, Ordering::Relaxed);
            }
            None => {
                self.ingest_stats
                    .failed_ingestions
                    .fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// 获取指标快照
    pub fn snapshot(&self) -> MetricsSnapshot {
        let total_queries = self.query_stats.total_queries.load(Ordering::Relaxed);
        let total_duration_us = self.query_stats.total_duration_us.load(Ordering::Relaxed);

        let avg_query_duration_ms = if total_queries > 0 {
            (total_duration_us as f64) / (total_queries as f64) / 1000.0
        } else {
            0.0
        };

        MetricsSnapshot {
            total_queries,
            success_queries: self.query_stats.success_queries.load(Ordering::Relaxed),
            failed_queries: self.query_stats.failed_queries.load(Ordering::Relaxed),
            avg_query_duration_ms,
            slow_queries: self.query_stats.slow_queries.load(Ordering::Relaxed),
            rejected_mutations: self.query_stats.rejected_mutations.load(Ordering::Relaxed),
            ingestions: self.ingest_stats.ingestions.load(Ordering::Relaxed),
            failed_ingestions: self.ingest_stats.failed_ingestions.load(Ordering::Relaxed),
            rows_ingested: self.ingest_stats.rows_ingested.load(Ordering::Relaxed),
            nodes_created: self.ingest_stats.nodes_created.load(Ordering::Relaxed),
            relationships_created: self
                .ingest_stats
                .relationships_created
                .load(Ordering::Relaxed),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }

    /// 导出为 Prometheus 格式
    pub fn to_prometheus(&self) -> String {
        let s = self.snapshot();
        let mut content = String::new();

        let entries: [(&str, &str, &str, String); 12] = [
            ("graphrest_queries_total", "counter", "Total number of read/write requests", s.total_queries.to_string()),
            ("graphrest_queries_success_total", "counter", "Number of successful requests", s.success_queries.to_string()),
            ("graphrest_queries_failed_total", "counter", "Number of failed requests", s.failed_queries.to_string()),
            ("graphrest_query_duration_avg_ms", "gauge", "Average request duration in milliseconds", format!("{:.2}", s.avg_query_duration_ms)),
            ("graphrest_slow_queries_total", "counter", "Number of slow requests (>1s)", s.slow_queries.to_string()),
            ("graphrest_rejected_mutations_total", "counter", "Write queries rejected on the read path", s.rejected_mutations.to_string()),
            ("graphrest_ingestions_total", "counter", "Number of CSV ingestions", s.ingestions.to_string()),
            ("graphrest_ingestions_failed_total", "counter", "Number of failed CSV ingestions", s.failed_ingestions.to_string()),
            ("graphrest_rows_ingested_total", "counter", "Rows executed by successful ingestions", s.rows_ingested.to_string()),
            ("graphrest_nodes_created_total", "counter", "Nodes created by successful ingestions", s.nodes_created.to_string()),
            ("graphrest_relationships_created_total", "counter", "Relationships created by successful ingestions", s.relationships_created.to_string()),
            ("graphrest_uptime_seconds", "counter", "Service uptime in seconds", s.uptime_seconds.to_string()),
        ];

        for (name, kind, help, value) in entries {
            let _ = writeln!(content, "# HELP {} {}", name, help);
            let _ = writeln!(content, "# TYPE {} {}", name, kind);
            let _ = writeln!(content, "{} {}", name, value);
        }
        content
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// 查询计时器
pub struct QueryTimer {
    start: Instant,
}

impl QueryTimer {
    fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_snapshot() {
        let metrics = Metrics::new();

        let timer = metrics.record_query_start();
        std::thread::sleep(Duration::from_millis(10));
        metrics.record_query_complete(timer, true);

        let timer = metrics.record_query_start();
        metrics.record_query_complete(timer, false);
        metrics.record_rejected_mutation();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.total_queries, 2);
        assert_eq!(snapshot.success_queries, 1);
        assert_eq!(snapshot.failed_queries, 1);
        assert_eq!(snapshot.rejected_mutations, 1);
        assert!(snapshot.avg_query_duration_ms >= 5.0);
    }

    #[test]
    fn test_ingest_counters() {
        let metrics = Metrics::new();
        metrics.record_ingest(Some(&StatsCounters {
            nodes_created: 3,
            properties_set: 3,
            rows: 3,
            ..Default::default()
        }));
        metrics.record_ingest(None);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.ingestions, 2);
        assert_eq!(snapshot.failed_ingestions, 1);
        assert_eq!(snapshot.rows_ingested, 3);
        assert_eq!(snapshot.nodes_created, 3);
    }

    #[test]
    fn test_prometheus_export() {
        let metrics = Metrics::new();
        metrics.record_query_start();

        let prom = metrics.to_prometheus();
        assert!(prom.contains("# TYPE graphrest_queries_total counter\n"));
        assert!(prom.contains("graphrest_queries_total 1\n"));
        assert!(prom.contains("graphrest_rows_ingested_total 0\n"));
    }
}
