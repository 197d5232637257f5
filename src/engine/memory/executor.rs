//! 内存引擎的语句执行器
//!
//! 子句依次作用于变量绑定列表，初始为一个空绑定。变更在应用时计数。

use super::ast::*;
use super::GraphState;
use crate::engine::QueryResult;
use crate::error::{Error, Result};
use crate::stats::MutationStats;
use crate::types::{ElementRef, Params, Path, PropertyValue, Row, Value};
use indexmap::IndexMap;
use std::cmp::Ordering;
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq)]
enum Bound {
    Node(u64),
    Rel(u64),
    Path(Vec<PathStep>),
    Value(PropertyValue),
}

impl Bound {
    fn type_name(&self) -> &'static str {
        match self {
            Bound::Node(_) => "Node",
            Bound::Rel(_) => "Relationship",
            Bound::Path(_) => "Path",
            Bound::Value(v) => v.type_name(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PathStep {
    Node(u64),
    Rel(u64),
}

type Binding = IndexMap<String, Bound>;

struct Executor<'a> {
    graph: &'a mut GraphState,
    params: &'a Params,
    stats: MutationStats,
}

/// 在工作副本上执行已解析的语句
pub(super) fn execute(
    graph: &mut GraphState,
    statement: &Statement,
    params: &Params,
) -> Result<QueryResult> {
    let columns = check_statement(statement)?;
    let mut executor = Executor {
        graph,
        params,
        stats: MutationStats::default(),
    };

    let mut bindings = vec![Binding::new()];
    let mut rows = Vec::new();
    for clause in &statement.clauses {
        match clause {
            Clause::Match {
                patterns,
                conditions,
            } => bindings = executor.match_clause(bindings, patterns, conditions)?,
            Clause::Create(patterns) => executor.create(&mut bindings, patterns)?,
            Clause::Set(items) => executor.set(&bindings, items)?,
            Clause::Delete { detach, variables } => {
                executor.delete(&bindings, *detach, variables)?
            }
            Clause::Remove(items) => executor.remove(&bindings, items)?,
            Clause::Return(items) => rows = executor.project(&bindings, items)?,
        }
    }

    let stats = executor.stats;
    Ok(QueryResult {
        columns,
        rows,
        stats: stats.contains_updates().then_some(stats),
    })
}

/// RETURN 必须位于最后，且列名不能重复
fn check_statement(statement: &Statement) -> Result<Vec<String>> {
    let last = statement.clauses.len().saturating_sub(1);
    let mut columns = Vec::new();
    for (i, clause) in statement.clauses.iter().enumerate() {
        if let Clause::Return(items) = clause {
            if i != last {
                return Err(Error::QueryExecution(
                    "RETURN can only be used at the end of the query".to_string(),
                ));
            }
            for item in items {
                if columns.contains(&item.column) {
                    return Err(Error::QueryExecution(format!(
                        "Multiple result columns with the same name '{}' are not supported",
                        item.column
                    )));
                }
                columns.push(item.column.clone());
            }
        }
    }
    Ok(columns)
}

impl Executor<'_> {
    // ==================== MATCH ====================

    fn match_clause(
        &self,
        bindings: Vec<Binding>,
        patterns: &[PathPattern],
        conditions: &[Comparison],
    ) -> Result<Vec<Binding>> {
        let mut current = bindings;
        for pattern in patterns {
            let mut next = Vec::new();
            for binding in current {
                next.extend(self.match_path(pattern, binding)?);
            }
            current = next;
        }

        let mut matched = Vec::with_capacity(current.len());
        for binding in current {
            if self.conditions_hold(conditions, &binding)? {
                matched.push(binding);
            }
        }
        Ok(matched)
    }

    fn match_path(&self, pattern: &PathPattern, binding: Binding) -> Result<Vec<Binding>> {
        let mut results = Vec::new();
        for start in self.node_candidates(&pattern.start, &binding)? {
            let mut extended = binding.clone();
            if let Some(var) = &pattern.start.variable {
                extended.insert(var.clone(), Bound::Node(start));
            }
            self.expand(
                pattern,
                0,
                start,
                extended,
                vec![PathStep::Node(start)],
                &mut results,
            )?;
        }
        Ok(results)
    }

    fn expand(
        &self,
        pattern: &PathPattern,
        hop: usize,
        current: u64,
        binding: Binding,
        steps: Vec<PathStep>,
        out: &mut Vec<Binding>,
    ) -> Result<()> {
        let Some((rel_pattern, node_pattern)) = pattern.hops.get(hop) else {
            let mut binding = binding;
            if let Some(var) = &pattern.variable {
                binding.insert(var.clone(), Bound::Path(steps));
            }
            out.push(binding);
            return Ok(());
        };

        for rel in self.graph.relationships.values() {
            let next = match rel_pattern.direction {
                RelDirection::Outgoing if rel.start == current => rel.end,
                RelDirection::Incoming if rel.end == current => rel.start,
                RelDirection::Either if rel.start == current => rel.end,
                RelDirection::Either if rel.end == current => rel.start,
                _ => continue,
            };
            // 同一路径中关系最多出现一次
            if steps.contains(&PathStep::Rel(rel.id)) {
                continue;
            }
            if !self.rel_matches(rel_pattern, rel.id, &binding)?
                || !self.node_matches(node_pattern, next, &binding)?
            {
                continue;
            }

            let mut extended = binding.clone();
            if let Some(var) = &rel_pattern.variable {
                extended.insert(var.clone(), Bound::Rel(rel.id));
            }
            if let Some(var) = &node_pattern.variable {
                extended.insert(var.clone(), Bound::Node(next));
            }
            let mut next_steps = steps.clone();
            next_steps.push(PathStep::Rel(rel.id));
            next_steps.push(PathStep::Node(next));
            self.expand(pattern, hop + 1, next, extended, next_steps, out)?;
        }
        Ok(())
    }

    fn node_candidates(&self, pattern: &NodePattern, binding: &Binding) -> Result<Vec<u64>> {
        if let Some(var) = &pattern.variable {
            match binding.get(var) {
                Some(Bound::Node(id)) => {
                    return Ok(if self.node_matches(pattern, *id, binding)? {
                        vec![*id]
                    } else {
                        Vec::new()
                    })
                }
                Some(other) => {
                    return Err(Error::QueryExecution(format!(
                        "Type mismatch: `{}` defined with conflicting type {} (expected Node)",
                        var,
                        other.type_name()
                    )))
                }
                None => {}
            }
        }

        let mut candidates = Vec::new();
        for id in self.graph.nodes.keys() {
            if self.node_matches(pattern, *id, binding)? {
                candidates.push(*id);
            }
        }
        Ok(candidates)
    }

    fn node_matches(&self, pattern: &NodePattern, id: u64, binding: &Binding) -> Result<bool> {
        if let Some(var) = &pattern.variable {
            if let Some(bound) = binding.get(var) {
                if *bound != Bound::Node(id) {
                    return Ok(false);
                }
            }
        }
        let Some(node) = self.graph.nodes.get(&id) else {
            return Ok(false);
        };
        if !pattern.labels.iter().all(|l| node.labels.contains(l)) {
            return Ok(false);
        }
        self.properties_match(&pattern.properties, &node.properties, binding)
    }

    fn rel_matches(&self, pattern: &RelPattern, id: u64, binding: &Binding) -> Result<bool> {
        if let Some(var) = &pattern.variable {
            if let Some(bound) = binding.get(var) {
                if *bound != Bound::Rel(id) {
                    return Ok(false);
                }
            }
        }
        let Some(rel) = self.graph.relationships.get(&id) else {
            return Ok(false);
        };
        if let Some(rel_type) = &pattern.rel_type {
            if rel.rel_type != *rel_type {
                return Ok(false);
            }
        }
        self.properties_match(&pattern.properties, &rel.properties, binding)
    }

    fn properties_match(
        &self,
        expected: &[(String, Expr)],
        actual: &IndexMap<String, PropertyValue>,
        binding: &Binding,
    ) -> Result<bool> {
        for (key, expr) in expected {
            let want = self.eval(expr, binding)?;
            match actual.get(key) {
                Some(have) if !want.is_null() && values_equal(have, &want) => {}
                _ => return Ok(false),
            }
        }
        Ok(true)
    }

    fn conditions_hold(&self, conditions: &[Comparison], binding: &Binding) -> Result<bool> {
        for condition in conditions {
            if !self.compare(condition, binding)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn compare(&self, condition: &Comparison, binding: &Binding) -> Result<bool> {
        let left = self.eval(&condition.left, binding)?;
        let right = self.eval(&condition.right, binding)?;
        if left.is_null() || right.is_null() {
            return Ok(false);
        }

        Ok(match condition.op {
            CompareOp::Eq => values_equal(&left, &right),
            CompareOp::Ne => !values_equal(&left, &right),
            // 标量右值按单元素列表处理，GET 中只出现一次的参数即为标量
            CompareOp::In => match &right {
                PropertyValue::List(items) => items.iter().any(|item| values_equal(&left, item)),
                single => values_equal(&left, single),
            },
            op => match compare_values(&left, &right) {
                Some(ordering) => match op {
                    CompareOp::Lt => ordering == Ordering::Less,
                    CompareOp::Le => ordering != Ordering::Greater,
                    CompareOp::Gt => ordering == Ordering::Greater,
                    _ => ordering != Ordering::Less,
                },
                None => false,
            },
        })
    }

    // ==================== CREATE ====================

    fn create(&mut self, bindings: &mut [Binding], patterns: &[PathPattern]) -> Result<()> {
        for binding in bindings.iter_mut() {
            for pattern in patterns {
                self.create_path(pattern, binding)?;
            }
        }
        Ok(())
    }

    fn create_path(&mut self, pattern: &PathPattern, binding: &mut Binding) -> Result<()> {
        let start = self.create_or_bind_node(&pattern.start, binding)?;
        let mut steps = vec![PathStep::Node(start)];
        let mut current = start;

        for (rel_pattern, node_pattern) in &pattern.hops {
            let next = self.create_or_bind_node(node_pattern, binding)?;
            let rel_type = rel_pattern.rel_type.clone().ok_or_else(|| {
                Error::QueryExecution(
                    "Exactly one relationship type must be specified for CREATE".to_string(),
                )
            })?;
            let (from, to) = match rel_pattern.direction {
                RelDirection::Outgoing => (current, next),
                RelDirection::Incoming => (next, current),
                RelDirection::Either => {
                    return Err(Error::QueryExecution(
                        "Only directed relationships are supported in CREATE".to_string(),
                    ))
                }
            };
            if let Some(var) = &rel_pattern.variable {
                if binding.contains_key(var) {
                    return Err(Error::QueryExecution(format!(
                        "Can't create relationship `{}`: variable already declared",
                        var
                    )));
                }
            }

            let properties = self.eval_properties(&rel_pattern.properties, binding)?;
            self.stats.properties_set += properties.len() as u64;
            let id = self
                .graph
                .create_relationship(rel_type, from, to, properties);
            self.stats.relationships_created += 1;
            if let Some(var) = &rel_pattern.variable {
                binding.insert(var.clone(), Bound::Rel(id));
            }

            steps.push(PathStep::Rel(id));
            steps.push(PathStep::Node(next));
            current = next;
        }

        if let Some(var) = &pattern.variable {
            binding.insert(var.clone(), Bound::Path(steps));
        }
        Ok(())
    }

    fn create_or_bind_node(&mut self, pattern: &NodePattern, binding: &mut Binding) -> Result<u64> {
        if let Some(var) = &pattern.variable {
            match binding.get(var) {
                Some(Bound::Node(id))
                    if pattern.labels.is_empty() && pattern.properties.is_empty() =>
                {
                    return Ok(*id)
                }
                Some(_) => {
                    return Err(Error::QueryExecution(format!(
                        "Can't create node `{}` with labels or properties here. The variable is already declared in this context",
                        var
                    )))
                }
                None => {}
            }
        }

        let properties = self.eval_properties(&pattern.properties, binding)?;
        let mut labels: Vec<String> = Vec::with_capacity(pattern.labels.len());
        for label in &pattern.labels {
            if !labels.contains(label) {
                labels.push(label.clone());
            }
        }

        self.stats.properties_set += properties.len() as u64;
        self.stats.labels_added += labels.len() as u64;
        let id = self.graph.create_node(labels, properties);
        self.stats.nodes_created += 1;

        if let Some(var) = &pattern.variable {
            binding.insert(var.clone(), Bound::Node(id));
        }
        Ok(id)
    }

    /// 计算属性映射，null 值不存储
    fn eval_properties(
        &self,
        properties: &[(String, Expr)],
        binding: &Binding,
    ) -> Result<IndexMap<String, PropertyValue>> {
        let mut out = IndexMap::with_capacity(properties.len());
        for (key, expr) in properties {
            let value = self.eval(expr, binding)?;
            check_storable(key, &value)?;
            if !value.is_null() {
                out.insert(key.clone(), value);
            }
        }
        Ok(out)
    }

    // ==================== SET / REMOVE / DELETE ====================

    fn set(&mut self, bindings: &[Binding], items: &[SetItem]) -> Result<()> {
        for binding in bindings {
            for item in items {
                match item {
                    SetItem::Property {
                        variable,
                        key,
                        value,
                    } => {
                        let value = self.eval(value, binding)?;
                        check_storable(key, &value)?;
                        let properties = properties_mut(&mut *self.graph, variable, binding)?;
                        if value.is_null() {
                            if properties.shift_remove(key).is_some() {
                                self.stats.properties_set += 1;
                            }
                        } else {
                            properties.insert(key.clone(), value);
                            self.stats.properties_set += 1;
                        }
                    }
                    SetItem::Label { variable, label } => {
                        let labels = labels_mut(&mut *self.graph, variable, binding)?;
                        if !labels.contains(label) {
                            labels.push(label.clone());
                            self.stats.labels_added += 1;
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn remove(&mut self, bindings: &[Binding], items: &[RemoveItem]) -> Result<()> {
        for binding in bindings {
            for item in items {
                match item {
                    RemoveItem::Property { variable, key } => {
                        let properties = properties_mut(&mut *self.graph, variable, binding)?;
                        if properties.shift_remove(key).is_some() {
                            self.stats.properties_set += 1;
                        }
                    }
                    RemoveItem::Label { variable, label } => {
                        let labels = labels_mut(&mut *self.graph, variable, binding)?;
                        if let Some(pos) = labels.iter().position(|l| l == label) {
                            labels.remove(pos);
                            self.stats.labels_removed += 1;
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn delete(&mut self, bindings: &[Binding], detach: bool, variables: &[String]) -> Result<()> {
        let mut nodes = BTreeSet::new();
        let mut rels = BTreeSet::new();
        for binding in bindings {
            for var in variables {
                match binding.get(var) {
                    Some(Bound::Node(id)) => {
                        nodes.insert(*id);
                    }
                    Some(Bound::Rel(id)) => {
                        rels.insert(*id);
                    }
                    Some(Bound::Path(steps)) => {
                        for step in steps {
                            match step {
                                PathStep::Node(id) => nodes.insert(*id),
                                PathStep::Rel(id) => rels.insert(*id),
                            };
                        }
                    }
                    Some(Bound::Value(PropertyValue::Null)) => {}
                    Some(other) => {
                        return Err(Error::QueryExecution(format!(
                            "Type mismatch: cannot delete `{}` of type {}",
                            var,
                            other.type_name()
                        )))
                    }
                    None => return Err(undefined(var)),
                }
            }
        }

        for node in &nodes {
            let attached = self.graph.attached(*node);
            if detach {
                rels.extend(attached);
            } else if attached.iter().any(|r| !rels.contains(r)) {
                return Err(Error::QueryExecution(format!(
                    "Cannot delete node<{}>, because it still has relationships. To delete this node, you must first delete its relationships.",
                    node
                )));
            }
        }

        for rel in rels {
            if self.graph.relationships.remove(&rel).is_some() {
                self.stats.relationships_deleted += 1;
            }
        }
        for node in nodes {
            if self.graph.nodes.remove(&node).is_some() {
                self.stats.nodes_deleted += 1;
            }
        }
        Ok(())
    }

    // ==================== RETURN ====================

    fn project(&self, bindings: &[Binding], items: &[ReturnItem]) -> Result<Vec<Row>> {
        let mut rows = Vec::with_capacity(bindings.len());
        for binding in bindings {
            let mut row = Row::with_capacity(items.len());
            for item in items {
                row.insert(item.column.clone(), self.eval_value(&item.expr, binding)?);
            }
            rows.push(row);
        }
        Ok(rows)
    }

    /// 计算为结果值，图实体转为元素句柄
    fn eval_value(&self, expr: &Expr, binding: &Binding) -> Result<Value> {
        match expr {
            Expr::Variable(var) => match binding.get(var) {
                Some(Bound::Node(id)) => Ok(self
                    .graph
                    .node_snapshot(*id)
                    .map(Value::from)
                    .unwrap_or(Value::Null)),
                Some(Bound::Rel(id)) => Ok(self
                    .graph
                    .rel_snapshot(*id)
                    .map(Value::from)
                    .unwrap_or(Value::Null)),
                Some(Bound::Path(steps)) => Ok(self
                    .materialize_path(steps)
                    .map(Value::Path)
                    .unwrap_or(Value::Null)),
                Some(Bound::Value(v)) => Ok(Value::from(v.clone())),
                None => Err(undefined(var)),
            },
            Expr::List(items) => items
                .iter()
                .map(|item| self.eval_value(item, binding))
                .collect::<Result<Vec<_>>>()
                .map(Value::List),
            other => self.eval(other, binding).map(Value::from),
        }
    }

    fn materialize_path(&self, steps: &[PathStep]) -> Option<Path> {
        let mut elements: Vec<ElementRef> = Vec::with_capacity(steps.len());
        for step in steps {
            let snapshot = match step {
                PathStep::Node(id) => self.graph.node_snapshot(*id)?,
                PathStep::Rel(id) => self.graph.rel_snapshot(*id)?,
            };
            elements.push(snapshot.into_ref());
        }
        Path::from_elements(elements).ok()
    }

    // ==================== 表达式 ====================

    fn eval(&self, expr: &Expr, binding: &Binding) -> Result<PropertyValue> {
        match expr {
            Expr::Literal(v) => Ok(v.clone()),
            Expr::Parameter(name) => self.params.get(name).cloned().ok_or_else(|| {
                Error::QueryExecution(format!("Expected a parameter named {}", name))
            }),
            Expr::Variable(var) => match binding.get(var) {
                Some(Bound::Value(v)) => Ok(v.clone()),
                Some(other) => Err(Error::QueryExecution(format!(
                    "Type mismatch: expected a property value but `{}` is a {}",
                    var,
                    other.type_name()
                ))),
                None => Err(undefined(var)),
            },
            Expr::Property(var, key) => match binding.get(var) {
                Some(Bound::Node(id)) => Ok(self
                    .graph
                    .nodes
                    .get(id)
                    .and_then(|n| n.properties.get(key).cloned())
                    .unwrap_or(PropertyValue::Null)),
                Some(Bound::Rel(id)) => Ok(self
                    .graph
                    .relationships
                    .get(id)
                    .and_then(|r| r.properties.get(key).cloned())
                    .unwrap_or(PropertyValue::Null)),
                Some(Bound::Value(PropertyValue::Map(map))) => {
                    Ok(map.get(key).cloned().unwrap_or(PropertyValue::Null))
                }
                Some(Bound::Value(PropertyValue::Null)) => Ok(PropertyValue::Null),
                Some(other) => Err(Error::QueryExecution(format!(
                    "Type mismatch: cannot read property '{}' of {}",
                    key,
                    other.type_name()
                ))),
                None => Err(undefined(var)),
            },
            Expr::List(items) => items
                .iter()
                .map(|item| self.eval(item, binding))
                .collect::<Result<Vec<_>>>()
                .map(PropertyValue::List),
            Expr::Function(name, args) => self.call_function(name, args, binding),
        }
    }

    fn call_function(&self, name: &str, args: &[Expr], binding: &Binding) -> Result<PropertyValue> {
        let [arg] = args else {
            return Err(Error::QueryExecution(format!(
                "Function {}() takes exactly one argument",
                name
            )));
        };

        match name {
            "id" => match arg {
                Expr::Variable(var) => match binding.get(var) {
                    Some(Bound::Node(id)) | Some(Bound::Rel(id)) => Ok(PropertyValue::Integer(*id as i64)),
                    Some(Bound::Value(PropertyValue::Null)) => Ok(PropertyValue::Null),
                    Some(other) => Err(Error::QueryExecution(format!(
                        "Type mismatch: id() expects a Node or Relationship but got {}",
                        other.type_name()
                    ))),
                    None => Err(undefined(var)),
                },
                _ => Err(Error::QueryExecution(
                    "id() expects a variable".to_string(),
                )),
            },
            "length" | "size" => {
                if let Expr::Variable(var) = arg {
                    if let Some(Bound::Path(steps)) = binding.get(var) {
                        return Ok(PropertyValue::Integer((steps.len() / 2) as i64));
                    }
                }
                match self.eval(arg, binding)? {
                    PropertyValue::String(s) => Ok(PropertyValue::Integer(s.chars().count() as i64)),
                    PropertyValue::List(items) => Ok(PropertyValue::Integer(items.len() as i64)),
                    PropertyValue::Null => Ok(PropertyValue::Null),
                    other => Err(Error::QueryExecution(format!(
                        "Type mismatch: {}() does not accept {}",
                        name,
                        other.type_name()
                    ))),
                }
            }
            other => Err(Error::QueryExecution(format!(
                "Unknown function '{}'",
                other
            ))),
        }
    }
}

fn undefined(var: &str) -> Error {
    Error::QueryExecution(format!("Variable `{}` not defined", var))
}

fn properties_mut<'g>(
    graph: &'g mut GraphState,
    variable: &str,
    binding: &Binding,
) -> Result<&'g mut IndexMap<String, PropertyValue>> {
    let deleted = || {
        Error::QueryExecution(format!(
            "`{}` was deleted in this transaction",
            variable
        ))
    };
    match binding.get(variable) {
        Some(Bound::Node(id)) => graph
            .nodes
            .get_mut(id)
            .map(|n| &mut n.properties)
            .ok_or_else(deleted),
        Some(Bound::Rel(id)) => graph
            .relationships
            .get_mut(id)
            .map(|r| &mut r.properties)
            .ok_or_else(deleted),
        Some(other) => Err(Error::QueryExecution(format!(
            "Type mismatch: cannot set properties on {}",
            other.type_name()
        ))),
        None => Err(undefined(variable)),
    }
}

fn labels_mut<'g>(
    graph: &'g mut GraphState,
    variable: &str,
    binding: &Binding,
) -> Result<&'g mut Vec<String>> {
    match binding.get(variable) {
        Some(Bound::Node(id)) => graph
            .nodes
            .get_mut(id)
            .map(|n| &mut n.labels)
            .ok_or_else(|| {
                Error::QueryExecution(format!(
                    "`{}` was deleted in this transaction",
                    variable
                ))
            }),
        Some(other) => Err(Error::QueryExecution(format!(
            "Type mismatch: labels can only be changed on a Node, not {}",
            other.type_name()
        ))),
        None => Err(undefined(variable)),
    }
}

/// 存储的属性只能是标量或标量列表
fn check_storable(key: &str, value: &PropertyValue) -> Result<()> {
    let ok = match value {
        PropertyValue::Map(_) => false,
        PropertyValue::List(items) => items
            .iter()
            .all(|v| !matches!(v, PropertyValue::Map(_) | PropertyValue::List(_))),
        _ => true,
    };
    if ok {
        Ok(())
    } else {
        Err(Error::QueryExecution(format!(
            "Property values can only be of primitive types or arrays thereof (property '{}')",
            key
        )))
    }
}

fn values_equal(a: &PropertyValue, b: &PropertyValue) -> bool {
    match (a, b) {
        (PropertyValue::Integer(x), PropertyValue::Float(y))
        | (PropertyValue::Float(y), PropertyValue::Integer(x)) => (*x as f64) == *y,
        (PropertyValue::List(xs), PropertyValue::List(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| values_equal(x, y))
        }
        _ => a == b,
    }
}

fn compare_values(a: &PropertyValue, b: &PropertyValue) -> Option<Ordering> {
    match (a, b) {
        (PropertyValue::String(x), PropertyValue::String(y)) => Some(x.cmp(y)),
        (PropertyValue::Bool(x), PropertyValue::Bool(y)) => Some(x.cmp(y)),
        _ => a.as_float()?.partial_cmp(&b.as_float()?),
    }
}

#[cfg(test)]
mod tests {
    use super::super::parse;
    use super::*;

    fn run(graph: &mut GraphState, query: &str, params: &Params) -> Result<QueryResult> {
        execute(graph, &parse(query)?, params)
    }

    fn people() -> GraphState {
        let mut graph = GraphState::default();
        run(
            &mut graph,
            "CREATE (a:Person {name: 'Andres', age: 21}), (p:Person {name: 'Peter', age: 42}), (a)-[:KNOWS {since: 2010}]->(p)",
            &Params::new(),
        )
        .unwrap();
        graph
    }

    #[test]
    fn test_create_counts() {
        let mut graph = GraphState::default();
        let result = run(
            &mut graph,
            "CREATE (a:Person:Person {name: 'x', nick: null})-[:KNOWS]->(b:Robot)",
            &Params::new(),
        )
        .unwrap();
        let stats = result.stats.unwrap();
        assert_eq!(stats.nodes_created, 2);
        assert_eq!(stats.labels_added, 2);
        assert_eq!(stats.properties_set, 1);
        assert_eq!(stats.relationships_created, 1);
        assert!(result.rows.is_empty());
    }

    #[test]
    fn test_match_where_in_with_ids() {
        let mut graph = people();
        let mut params = Params::new();
        params.insert(
            "ids".to_string(),
            PropertyValue::List(vec![PropertyValue::Integer(0), PropertyValue::Integer(1)]),
        );
        let result = run(
            &mut graph,
            "match (n) where id(n) in {ids} return length(n.name) as l, n.name as name",
            &params,
        )
        .unwrap();
        assert_eq!(result.columns, vec!["l", "name"]);
        assert_eq!(result.rows.len(), 2);
        assert!(matches!(result.rows[0]["l"], Value::Integer(6)));
        assert!(matches!(result.rows[1]["l"], Value::Integer(5)));
    }

    #[test]
    fn test_in_with_scalar_is_single_element_list() {
        let mut graph = people();
        let mut params = Params::new();
        params.insert("ids".to_string(), PropertyValue::Integer(1));
        let result = run(
            &mut graph,
            "MATCH (n) WHERE id(n) IN $ids RETURN n.name AS name",
            &params,
        )
        .unwrap();
        assert_eq!(result.rows.len(), 1);
        assert!(matches!(&result.rows[0]["name"], Value::String(s) if s == "Peter"));
    }

    #[test]
    fn test_match_directions() {
        let mut graph = people();
        let outgoing = run(
            &mut graph,
            "MATCH (a {name: 'Peter'})-[:KNOWS]->(b) RETURN b",
            &Params::new(),
        )
        .unwrap();
        assert!(outgoing.rows.is_empty());

        let incoming = run(
            &mut graph,
            "MATCH (a {name: 'Peter'})<-[:KNOWS]-(b) RETURN b.name",
            &Params::new(),
        )
        .unwrap();
        assert_eq!(incoming.rows.len(), 1);

        let either = run(
            &mut graph,
            "MATCH (a)-[r]-(b) WHERE r.since >= 2000 RETURN a.name",
            &Params::new(),
        )
        .unwrap();
        assert_eq!(either.rows.len(), 2);
    }

    #[test]
    fn test_set_and_remove() {
        let mut graph = people();
        let result = run(
            &mut graph,
            "MATCH (n:Person) WHERE n.age > 30 SET n.name = 'Neo', n:Admin REMOVE n.age RETURN n.name",
            &Params::new(),
        )
        .unwrap();
        let stats = result.stats.unwrap();
        assert_eq!(stats.properties_set, 2);
        assert_eq!(stats.labels_added, 1);
        assert!(matches!(&result.rows[0]["n.name"], Value::String(s) if s == "Neo"));
    }

    #[test]
    fn test_update_without_match_has_no_rows() {
        let mut graph = people();
        let mut params = Params::new();
        params.insert("id".to_string(), PropertyValue::Integer(-234));
        params.insert("name".to_string(), PropertyValue::from("Neo"));
        let result = run(
            &mut graph,
            "match (n) where id(n) = {id} SET n.name={name} return n",
            &params,
        )
        .unwrap();
        assert!(result.rows.is_empty());
        assert!(result.stats.is_none());
    }

    #[test]
    fn test_delete_requires_detach() {
        let mut graph = people();
        let err = run(&mut graph, "MATCH (n:Person) DELETE n", &Params::new()).unwrap_err();
        assert!(err.to_string().contains("still has relationships"));

        let result = run(&mut graph, "MATCH (n:Person) DETACH DELETE n", &Params::new()).unwrap();
        let stats = result.stats.unwrap();
        assert_eq!(stats.nodes_deleted, 2);
        assert_eq!(stats.relationships_deleted, 1);
        assert!(graph.nodes.is_empty());
    }

    #[test]
    fn test_missing_parameter() {
        let mut graph = GraphState::default();
        let err = run(&mut graph, "CREATE (n {name: $name})", &Params::new()).unwrap_err();
        assert_eq!(err.to_string(), "Expected a parameter named name");
    }

    #[test]
    fn test_map_property_rejected() {
        let mut graph = GraphState::default();
        let mut params = Params::new();
        params.insert(
            "m".to_string(),
            PropertyValue::Map(IndexMap::from([("a".to_string(), PropertyValue::Integer(1))])),
        );
        assert!(run(&mut graph, "CREATE (n {m: $m})", &params).is_err());
    }

    #[test]
    fn test_return_must_be_last() {
        let mut graph = GraphState::default();
        assert!(run(&mut graph, "MATCH (n) RETURN n CREATE (m)", &Params::new()).is_err());
    }
}
