//! graphrest 服务器入口
//!
//! 在内存图引擎上启动存储查询 HTTP 服务

use anyhow::Context;
use clap::Parser;
use graphrest::config::ServerConfig;
use graphrest::engine::MemoryGraph;
use graphrest::ingest::{DEFAULT_BATCH_SIZE, DEFAULT_DELIMITER};
use graphrest::registry::QueryRegistry;
use graphrest::server::start_server;
use graphrest::service::QueryService;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "graphrest-server")]
#[command(about = "存储图查询 HTTP 服务")]
struct Args {
    /// 监听地址
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// 监听端口
    #[arg(short, long, default_value = "8080")]
    port: u16,

    /// CSV 导入默认批次大小
    #[arg(short, long, default_value_t = DEFAULT_BATCH_SIZE)]
    batch_size: usize,

    /// CSV 导入默认分隔符
    #[arg(short, long, default_value_t = DEFAULT_DELIMITER)]
    delimiter: char,

    /// 启动时加载的查询文件（JSON 对象：key → 查询文本）
    #[arg(short, long)]
    queries: Option<PathBuf>,

    /// 日志级别，RUST_LOG 优先
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn init_tracing(level: &str) -> anyhow::Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(format!("{},tower_http=info", level))
            .with_context(|| format!("无效的日志级别: {}", level))?,
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(&args.log_level)?;

    let config = ServerConfig {
        host: args.host,
        port: args.port,
        default_batch_size: args.batch_size,
        default_delimiter: args.delimiter,
        queries_file: args.queries,
        ..Default::default()
    };
    config.validate()?;

    let registry = QueryRegistry::new();
    if let Some(path) = &config.queries_file {
        registry.load_file(path)?;
    }

    let service = QueryService::new(MemoryGraph::shared(), registry)
        .with_ingest_defaults(config.ingest_defaults());

    tracing::info!(
        batch_size = config.default_batch_size,
        queries = service.registry().len(),
        "内存图引擎已就绪"
    );

    start_server(config, Arc::new(service)).await?;
    Ok(())
}
