//! 内存引擎的语句 AST

use crate::types::PropertyValue;

/// 语句是作用于绑定流的一串子句
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub clauses: Vec<Clause>,
}

impl Statement {
    pub fn returns_rows(&self) -> bool {
        self.clauses
            .iter()
            .any(|c| matches!(c, Clause::Return(_)))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Clause {
    Match {
        patterns: Vec<PathPattern>,
        conditions: Vec<Comparison>,
    },
    Create(Vec<PathPattern>),
    Set(Vec<SetItem>),
    Delete {
        detach: bool,
        variables: Vec<String>,
    },
    Remove(Vec<RemoveItem>),
    Return(Vec<ReturnItem>),
}

/// `[p =] (a)-[r]->(b)...`
#[derive(Debug, Clone, PartialEq)]
pub struct PathPattern {
    pub variable: Option<String>,
    pub start: NodePattern,
    pub hops: Vec<(RelPattern, NodePattern)>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodePattern {
    pub variable: Option<String>,
    pub labels: Vec<String>,
    pub properties: Vec<(String, Expr)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelDirection {
    Outgoing,
    Incoming,
    Either,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RelPattern {
    pub variable: Option<String>,
    pub rel_type: Option<String>,
    pub direction: RelDirection,
    pub properties: Vec<(String, Expr)>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(PropertyValue),
    Parameter(String),
    Variable(String),
    Property(String, String),
    Function(String, Vec<Expr>),
    List(Vec<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    In,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    pub left: Expr,
    pub op: CompareOp,
    pub right: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SetItem {
    Property {
        variable: String,
        key: String,
        value: Expr,
    },
    Label {
        variable: String,
        label: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum RemoveItem {
    Property { variable: String, key: String },
    Label { variable: String, label: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReturnItem {
    pub expr: Expr,
    /// 列名：别名，或按原文书写的表达式文本
    pub column: String,
}
