//! 通用类型定义
//!
//! - `PropertyValue`: 参数与存储属性（可序列化、可克隆）
//! - `Value`: 查询引擎返回的值，可能包含图元素、路径和惰性序列
//! - `CanonicalValue`: 规范化后的 JSON 树

use crate::error::{Error, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// 规范化输出值。`serde_json` 开启了 `preserve_order`，对象保持插入顺序。
pub type CanonicalValue = serde_json::Value;

/// 一行查询结果：列名 → 值，顺序即投影顺序
pub type Row = IndexMap<String, Value>;

/// 一次执行的命名参数
pub type Params = IndexMap<String, PropertyValue>;

/// 属性值
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    List(Vec<PropertyValue>),
    Map(IndexMap<String, PropertyValue>),
}

impl PropertyValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            PropertyValue::Null => "null",
            PropertyValue::Bool(_) => "bool",
            PropertyValue::Integer(_) => "int",
            PropertyValue::Float(_) => "float",
            PropertyValue::String(_) => "string",
            PropertyValue::List(_) => "list",
            PropertyValue::Map(_) => "map",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, PropertyValue::Null)
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            PropertyValue::Integer(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            PropertyValue::Integer(v) => Some(*v as f64),
            PropertyValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_string(&self) -> Option<&str> {
        match self {
            PropertyValue::String(v) => Some(v),
            _ => None,
        }
    }
}

impl From<bool> for PropertyValue {
    fn from(v: bool) -> Self {
        PropertyValue::Bool(v)
    }
}

impl From<i64> for PropertyValue {
    fn from(v: i64) -> Self {
        PropertyValue::Integer(v)
    }
}

impl From<f64> for PropertyValue {
    fn from(v: f64) -> Self {
        PropertyValue::Float(v)
    }
}

impl From<String> for PropertyValue {
    fn from(v: String) -> Self {
        PropertyValue::String(v)
    }
}

impl From<&str> for PropertyValue {
    fn from(v: &str) -> Self {
        PropertyValue::String(v.to_string())
    }
}

impl From<Vec<PropertyValue>> for PropertyValue {
    fn from(v: Vec<PropertyValue>) -> Self {
        PropertyValue::List(v)
    }
}

/// 图元素种类。规范化时两者没有区别。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementKind {
    Node,
    Relationship,
}

/// 不透明的图元素句柄，只暴露属性包
pub trait GraphElement: fmt::Debug + Send + Sync {
    fn kind(&self) -> ElementKind;

    /// 属性键，顺序由存储决定
    fn property_keys(&self) -> Vec<String>;

    fn property(&self, key: &str) -> Option<Value>;
}

pub type ElementRef = Arc<dyn GraphElement>;

/// 图元素的只读快照
#[derive(Debug, Clone)]
pub struct ElementSnapshot {
    kind: ElementKind,
    id: u64,
    properties: IndexMap<String, PropertyValue>,
}

impl ElementSnapshot {
    pub fn node(id: u64) -> Self {
        Self {
            kind: ElementKind::Node,
            id,
            properties: IndexMap::new(),
        }
    }

    pub fn relationship(id: u64) -> Self {
        Self {
            kind: ElementKind::Relationship,
            id,
            properties: IndexMap::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn with_properties(mut self, properties: IndexMap<String, PropertyValue>) -> Self {
        self.properties = properties;
        self
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn into_ref(self) -> ElementRef {
        Arc::new(self)
    }
}

impl GraphElement for ElementSnapshot {
    fn kind(&self) -> ElementKind {
        self.kind
    }

    fn property_keys(&self) -> Vec<String> {
        self.properties.keys().cloned().collect()
    }

    fn property(&self, key: &str) -> Option<Value> {
        self.properties.get(key).cloned().map(Value::from)
    }
}

/// 路径：节点与关系交替出现，以节点开头和结尾
#[derive(Debug, Clone)]
pub struct Path {
    elements: Vec<ElementRef>,
}

impl Path {
    pub fn new(start: ElementRef) -> Self {
        Self {
            elements: vec![start],
        }
    }

    /// 追加一跳（关系 + 下一个节点）
    pub fn push(mut self, relationship: ElementRef, node: ElementRef) -> Self {
        self.elements.push(relationship);
        self.elements.push(node);
        self
    }

    pub fn from_elements(elements: Vec<ElementRef>) -> Result<Self> {
        if elements.len() % 2 == 0 {
            return Err(Error::QueryExecution(format!(
                "path must hold an odd number of elements, got {}",
                elements.len()
            )));
        }
        for (i, element) in elements.iter().enumerate() {
            let expected = if i % 2 == 0 {
                ElementKind::Node
            } else {
                ElementKind::Relationship
            };
            if element.kind() != expected {
                return Err(Error::QueryExecution(format!(
                    "path element {} should be a {:?}",
                    i, expected
                )));
            }
        }
        Ok(Self { elements })
    }

    /// 关系数
    pub fn length(&self) -> usize {
        self.elements.len() / 2
    }

    pub fn elements(&self) -> &[ElementRef] {
        &self.elements
    }

    pub fn into_elements(self) -> Vec<ElementRef> {
        self.elements
    }
}

/// 有限的惰性值序列，只能消费一次
pub struct ValueSeq(Box<dyn Iterator<Item = Value> + Send>);

impl ValueSeq {
    pub fn new<I>(iter: I) -> Self
    where
        I: IntoIterator<Item = Value>,
        I::IntoIter: Send + 'static,
    {
        Self(Box::new(iter.into_iter()))
    }
}

impl Iterator for ValueSeq {
    type Item = Value;

    fn next(&mut self) -> Option<Value> {
        self.0.next()
    }
}

impl fmt::Debug for ValueSeq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ValueSeq(..)")
    }
}

/// 查询引擎返回的值
#[derive(Debug)]
pub enum Value {
    Null,
    Bool(bool),
    Integer(i64),
    /// 超出 i64 范围的非负整数
    Unsigned(u64),
    Float(f64),
    String(String),
    Map(IndexMap<String, Value>),
    Path(Path),
    List(Vec<Value>),
    Element(ElementRef),
    Seq(ValueSeq),
}

impl From<PropertyValue> for Value {
    fn from(v: PropertyValue) -> Self {
        match v {
            PropertyValue::Null => Value::Null,
            PropertyValue::Bool(b) => Value::Bool(b),
            PropertyValue::Integer(i) => Value::Integer(i),
            PropertyValue::Float(f) => Value::Float(f),
            PropertyValue::String(s) => Value::String(s),
            PropertyValue::List(items) => Value::List(items.into_iter().map(Value::from).collect()),
            PropertyValue::Map(map) => {
                Value::Map(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

impl From<CanonicalValue> for Value {
    fn from(v: CanonicalValue) -> Self {
        match v {
            CanonicalValue::Null => Value::Null,
            CanonicalValue::Bool(b) => Value::Bool(b),
            CanonicalValue::Number(n) => match (n.as_i64(), n.as_u64()) {
                (Some(i), _) => Value::Integer(i),
                (None, Some(u)) => Value::Unsigned(u),
                _ => n.as_f64().map(Value::Float).unwrap_or(Value::Null),
            },
            CanonicalValue::String(s) => Value::String(s),
            CanonicalValue::Array(items) => Value::List(items.into_iter().map(Value::from).collect()),
            CanonicalValue::Object(map) => {
                Value::Map(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

impl From<ElementSnapshot> for Value {
    fn from(v: ElementSnapshot) -> Self {
        Value::Element(v.into_ref())
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}
