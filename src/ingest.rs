//! 批量导入模块
//!
//! 读取带表头的分隔文本，逐行转换字段类型并执行同一条写查询。
//! 每 `batch_size` 行提交一次事务：已提交的分块在后续失败时保持生效，
//! 出错时只回滚当前未提交的分块。行按输入顺序串行执行。

use crate::coerce::coerce;
use crate::engine::{QueryEngine, TxScope};
use crate::error::{Error, Result};
use crate::stats::StatsCounters;
use crate::types::Params;
use std::io::{self, Read};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub const DEFAULT_BATCH_SIZE: usize = 30_000;
pub const DEFAULT_DELIMITER: char = ',';

/// 导入参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestOptions {
    pub delimiter: char,
    pub batch_size: usize,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            delimiter: DEFAULT_DELIMITER,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl IngestOptions {
    fn validate(&self) -> Result<u8> {
        if self.batch_size == 0 {
            return Err(Error::InputFormat("批次大小必须大于 0".to_string()));
        }
        if !self.delimiter.is_ascii() {
            return Err(Error::InputFormat(format!(
                "分隔符必须是单字节字符: {:?}",
                self.delimiter
            )));
        }
        Ok(self.delimiter as u8)
    }
}

/// 取消标记，只在两行之间检查
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// 批量导入器，每次调用独占自己的事务序列
pub struct BatchIngestor<'a> {
    engine: &'a dyn QueryEngine,
    options: IngestOptions,
    cancel: Option<CancelFlag>,
}

impl<'a> BatchIngestor<'a> {
    pub fn new(engine: &'a dyn QueryEngine) -> Self {
        Self {
            engine,
            options: IngestOptions::default(),
            cancel: None,
        }
    }

    pub fn with_options(mut self, options: IngestOptions) -> Self {
        self.options = options;
        self
    }

    /// 设置批次大小
    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.options.batch_size = size;
        self
    }

    pub fn with_delimiter(mut self, delimiter: char) -> Self {
        self.options.delimiter = delimiter;
        self
    }

    pub fn with_cancel_flag(mut self, flag: CancelFlag) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// 执行导入，返回已提交执行的累计统计
    pub fn ingest<R: Read>(&self, query: &str, input: R) -> Result<StatsCounters> {
        let delimiter = self.options.validate()?;
        let start = std::time::Instant::now();
        let mut committed = StatsCounters::new();

        match self.run(query, input, delimiter, &mut committed) {
            Ok(()) => {
                tracing::info!(
                    rows = committed.rows,
                    nodes_created = committed.nodes_created,
                    relationships_created = committed.relationships_created,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "导入完成"
                );
                Ok(committed)
            }
            Err(e) => {
                tracing::warn!(
                    committed_rows = committed.rows,
                    error = %e,
                    "导入中止，当前分块已回滚"
                );
                Err(e)
            }
        }
    }

    fn run<R: Read>(
        &self,
        query: &str,
        input: R,
        delimiter: u8,
        committed: &mut StatsCounters,
    ) -> Result<()> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .delimiter(delimiter)
            .flexible(true)
            .from_reader(InputTracker::new(input));
        let mut record = csv::StringRecord::new();

        if !reader.read_record(&mut record)? {
            return Err(Error::InputFormat("缺少表头行".to_string()));
        }
        let header: Vec<String> = record.iter().map(str::to_string).collect();

        let mut chunk = Chunk::default();
        let mut row = 0usize;
        loop {
            let start_line = reader.position().line();
            if !reader.read_record(&mut record)? {
                break;
            }
            let consumed = reader.position().line().saturating_sub(start_line);

            // csv 会跳过空行，按本条记录消耗的行数找回
            let blank_lines = skipped_blank_lines(consumed, &record, reader.get_ref());
            if blank_lines > 0 {
                if header.len() != 1 {
                    return Err(Error::InputFormat(format!(
                        "第 {} 条记录前有 {} 个空行, 表头有 {} 个字段",
                        row + 1,
                        blank_lines,
                        header.len()
                    )));
                }
                // 单列表头下空行即一个空字段
                let empty = csv::StringRecord::from(vec![""]);
                for _ in 0..blank_lines {
                    row += 1;
                    self.ingest_row(&mut chunk, query, &header, &empty, committed)?;
                }
            }

            row += 1;
            self.ingest_row(&mut chunk, query, &header, &record, committed)?;
        }

        chunk.finish(committed)
    }

    fn ingest_row(
        &self,
        chunk: &mut Chunk<'a>,
        query: &str,
        header: &[String],
        record: &csv::StringRecord,
        committed: &mut StatsCounters,
    ) -> Result<()> {
        self.check_cancelled()?;
        if record.len() != header.len() {
            let line = record.position().map(|p| p.line()).unwrap_or_default();
            return Err(Error::InputFormat(format!(
                "第 {} 行有 {} 个字段, 表头有 {} 个",
                line,
                record.len(),
                header.len()
            )));
        }
        let params = to_params(header, record)?;

        chunk.execute(self.engine, query, &params)?;
        if chunk.rows == self.options.batch_size {
            chunk.commit(committed)?;
        }
        Ok(())
    }

    fn check_cancelled(&self) -> Result<()> {
        match &self.cancel {
            Some(flag) if flag.is_cancelled() => Err(Error::Cancelled),
            _ => Ok(()),
        }
    }
}

/// 当前未提交的分块，事务按需开启，空输入不会产生事务
#[derive(Default)]
struct Chunk<'e> {
    scope: Option<TxScope<'e>>,
    pending: StatsCounters,
    rows: usize,
    index: usize,
}

impl<'e> Chunk<'e> {
    fn execute(&mut self, engine: &'e dyn QueryEngine, query: &str, params: &Params) -> Result<()> {
        let tx = match self.scope.take() {
            Some(tx) => tx,
            None => TxScope::begin(engine)?,
        };
        let tx = self.scope.insert(tx);
        let result = tx.execute(query, params)?;
        self.pending.record(result.stats.as_ref(), result.row_count());
        self.rows += 1;
        Ok(())
    }

    fn commit(&mut self, committed: &mut StatsCounters) -> Result<()> {
        if let Some(tx) = self.scope.take() {
            tx.commit()?;
            committed.merge(&self.pending);
            tracing::debug!(chunk = self.index, rows = self.rows, "分块已提交");
            self.index += 1;
        }
        self.pending = StatsCounters::new();
        self.rows = 0;
        Ok(())
    }

    fn finish(mut self, committed: &mut StatsCounters) -> Result<()> {
        self.commit(committed)
    }
}

/// 记录输入是否已读完、是否使用 CRLF 换行
struct InputTracker<R> {
    inner: R,
    last: Option<u8>,
    eof: bool,
    crlf: bool,
}

impl<R> InputTracker<R> {
    fn new(inner: R) -> Self {
        Self {
            inner,
            last: None,
            eof: false,
            crlf: false,
        }
    }

    /// 输入已读完且最后一行没有换行符
    fn ended_without_newline(&self) -> bool {
        self.eof && !matches!(self.last, Some(b'\n') | Some(b'\r'))
    }
}

impl<R: Read> Read for InputTracker<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        if n == 0 && !buf.is_empty() {
            self.eof = true;
        }
        for &b in &buf[..n] {
            if b == b'\n' && self.last == Some(b'\r') {
                self.crlf = true;
            }
            self.last = Some(b);
        }
        Ok(n)
    }
}

/// 读取一条记录时被跳过的空行数
///
/// 以 LF 结尾的记录消耗自身的换行符；CRLF 的 '\n' 总是在下一次读取时消耗，
/// 因此每条记录同样计一行。只有 LF 文件中没有换行符的末行不计。
fn skipped_blank_lines<R>(consumed: u64, record: &csv::StringRecord, input: &InputTracker<R>) -> u64 {
    let embedded: u64 = record
        .iter()
        .map(|field| field.matches('\n').count() as u64)
        .sum();
    let terminator = if input.ended_without_newline() && !input.crlf {
        0
    } else {
        1
    };
    consumed.saturating_sub(embedded + terminator)
}

fn to_params(header: &[String], record: &csv::StringRecord) -> Result<Params> {
    let mut params = Params::with_capacity(header.len());
    for (name, field) in header.iter().zip(record.iter()) {
        params.insert(name.clone(), coerce(field)?);
    }
    Ok(params)
}
