//! 查询结果规范化
//!
//! 把引擎返回的多态值递归转换为可直接序列化的 JSON 树：
//! - 行内列顺序保持投影顺序
//! - 图元素转换为属性对象，键按字节序升序排列，输出与存储迭代顺序无关
//! - 路径只保留元素序列，方向与长度信息丢弃
//! - 列表与惰性序列完全展开

use crate::types::{CanonicalValue, GraphElement, Row, Value};
use serde_json::{Map, Number};

/// 无状态的结果规范化器，可在多个线程上同时使用
#[derive(Debug, Clone, Copy, Default)]
pub struct ResultNormalizer;

impl ResultNormalizer {
    pub fn new() -> Self {
        Self
    }

    /// 规范化一组结果行。没有任何行时返回 `None`（无内容）。
    pub fn normalize<I>(&self, rows: I) -> Option<CanonicalValue>
    where
        I: IntoIterator<Item = Row>,
    {
        let mut rows = rows.into_iter().peekable();
        rows.peek()?;
        Some(CanonicalValue::Array(
            rows.map(|row| self.convert_row(row)).collect(),
        ))
    }

    pub fn convert_row(&self, row: Row) -> CanonicalValue {
        let mut out = Map::with_capacity(row.len());
        for (column, value) in row {
            out.insert(column, self.convert(value));
        }
        CanonicalValue::Object(out)
    }

    /// 转换单个值。
    ///
    /// 分支顺序固定：null、映射、路径、列表、图元素、惰性序列、标量。
    pub fn convert(&self, value: Value) -> CanonicalValue {
        match value {
            Value::Null => CanonicalValue::Null,
            Value::Map(map) => {
                let mut out = Map::with_capacity(map.len());
                for (key, value) in map {
                    out.insert(key, self.convert(value));
                }
                CanonicalValue::Object(out)
            }
            Value::Path(path) => CanonicalValue::Array(
                path.into_elements()
                    .into_iter()
                    .map(|element| self.convert_element(element.as_ref()))
                    .collect(),
            ),
            Value::List(items) => {
                CanonicalValue::Array(items.into_iter().map(|v| self.convert(v)).collect())
            }
            Value::Element(element) => self.convert_element(element.as_ref()),
            Value::Seq(seq) => CanonicalValue::Array(seq.map(|v| self.convert(v)).collect()),
            Value::Bool(b) => CanonicalValue::Bool(b),
            Value::Integer(i) => CanonicalValue::Number(i.into()),
            Value::Unsigned(u) => CanonicalValue::Number(u.into()),
            // NaN 与无穷大没有 JSON 表示
            Value::Float(f) => Number::from_f64(f)
                .map(CanonicalValue::Number)
                .unwrap_or(CanonicalValue::Null),
            Value::String(s) => CanonicalValue::String(s),
        }
    }

    fn convert_element(&self, element: &dyn GraphElement) -> CanonicalValue {
        let mut keys = element.property_keys();
        if keys.is_empty() {
            return CanonicalValue::Object(Map::new());
        }
        keys.sort_unstable();

        let mut out = Map::with_capacity(keys.len());
        for key in keys {
            // 列出键之后被删除的属性直接跳过
            if let Some(raw) = element.property(&key) {
                let converted = self.convert(raw);
                out.insert(key, converted);
            }
        }
        CanonicalValue::Object(out)
    }
}
