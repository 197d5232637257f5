//! 内存引擎的语句解析器
//!
//! 手写递归下降解析，关键字不区分大小写。
//! 参数写作 `$name`，或旧式的 `{name}`。

use super::ast::*;
use crate::error::{Error, Result};
use crate::types::PropertyValue;

pub struct StatementParser {
    input: String,
    pos: usize,
}

/// 解析完整语句
pub fn parse(input: &str) -> Result<Statement> {
    StatementParser::new(input).parse()
}

impl StatementParser {
    pub fn new(input: &str) -> Self {
        Self {
            input: input.to_string(),
            pos: 0,
        }
    }

    pub fn parse(&mut self) -> Result<Statement> {
        let mut clauses = Vec::new();
        loop {
            self.skip_whitespace();
            if self.pos >= self.input.len() {
                break;
            }
            if self.try_char(';') {
                continue;
            }
            clauses.push(self.parse_clause()?);
        }
        if clauses.is_empty() {
            return Err(Error::QueryParse("Empty statement".to_string()));
        }
        Ok(Statement { clauses })
    }

    fn parse_clause(&mut self) -> Result<Clause> {
        if self.try_keyword("MATCH") {
            let patterns = self.parse_patterns()?;
            let conditions = if self.try_keyword("WHERE") {
                self.parse_conditions()?
            } else {
                Vec::new()
            };
            return Ok(Clause::Match {
                patterns,
                conditions,
            });
        }
        if self.try_keyword("CREATE") {
            return Ok(Clause::Create(self.parse_patterns()?));
        }
        if self.try_keyword("SET") {
            return self.parse_set();
        }
        if self.try_keyword("DETACH") {
            self.expect_keyword("DELETE")?;
            return Ok(Clause::Delete {
                detach: true,
                variables: self.parse_identifier_list()?,
            });
        }
        if self.try_keyword("DELETE") {
            return Ok(Clause::Delete {
                detach: false,
                variables: self.parse_identifier_list()?,
            });
        }
        if self.try_keyword("REMOVE") {
            return self.parse_remove();
        }
        if self.try_keyword("RETURN") {
            return self.parse_return();
        }
        let found = self.peek_keyword().unwrap_or_default();
        Err(Error::QueryParse(format!(
            "Invalid input '{}' at position {}: expected MATCH, CREATE, SET, DELETE, REMOVE or RETURN",
            found, self.pos
        )))
    }

    // ==================== 模式 ====================

    fn parse_patterns(&mut self) -> Result<Vec<PathPattern>> {
        let mut patterns = vec![self.parse_path_pattern()?];
        while self.try_char(',') {
            patterns.push(self.parse_path_pattern()?);
        }
        Ok(patterns)
    }

    fn parse_path_pattern(&mut self) -> Result<PathPattern> {
        self.skip_whitespace();
        let mut variable = None;
        if self.peek_char_is_alpha() {
            let start = self.pos;
            let ident = self.parse_identifier()?;
            if self.try_char('=') {
                variable = Some(ident);
            } else {
                self.pos = start;
            }
        }

        let start = self.parse_node_pattern()?;
        let mut hops = Vec::new();
        loop {
            self.skip_whitespace();
            if !(self.peek_str("-") || self.peek_str("<-")) {
                break;
            }
            let rel = self.parse_rel_pattern()?;
            let node = self.parse_node_pattern()?;
            hops.push((rel, node));
        }

        Ok(PathPattern {
            variable,
            start,
            hops,
        })
    }

    fn parse_node_pattern(&mut self) -> Result<NodePattern> {
        self.expect_char('(')?;
        let mut pattern = NodePattern::default();

        self.skip_whitespace();
        if self.peek_char_is_alpha() {
            pattern.variable = Some(self.parse_identifier()?);
        }
        while self.try_char(':') {
            pattern.labels.push(self.parse_identifier()?);
        }
        self.skip_whitespace();
        if self.peek_char_is('{') {
            pattern.properties = self.parse_property_map()?;
        }
        self.expect_char(')')?;
        Ok(pattern)
    }

    fn parse_rel_pattern(&mut self) -> Result<RelPattern> {
        let incoming = self.try_str("<-");
        if !incoming {
            self.expect_char('-')?;
        }

        let mut variable = None;
        let mut rel_type = None;
        let mut properties = Vec::new();
        if self.try_char('[') {
            self.skip_whitespace();
            if self.peek_char_is_alpha() {
                variable = Some(self.parse_identifier()?);
            }
            if self.try_char(':') {
                rel_type = Some(self.parse_identifier()?);
            }
            self.skip_whitespace();
            if self.peek_char_is('{') {
                properties = self.parse_property_map()?;
            }
            self.expect_char(']')?;
        }

        let outgoing = self.try_str("->");
        if !outgoing {
            self.expect_char('-')?;
        }

        let direction = match (incoming, outgoing) {
            (true, true) => {
                return Err(Error::QueryParse(
                    "Relationship cannot point both ways".to_string(),
                ))
            }
            (true, false) => RelDirection::Incoming,
            (false, true) => RelDirection::Outgoing,
            (false, false) => RelDirection::Either,
        };

        Ok(RelPattern {
            variable,
            rel_type,
            direction,
            properties,
        })
    }

    fn parse_property_map(&mut self) -> Result<Vec<(String, Expr)>> {
        self.expect_char('{')?;
        let mut properties = Vec::new();
        if self.try_char('}') {
            return Ok(properties);
        }
        loop {
            let key = self.parse_identifier()?;
            self.expect_char(':')?;
            let value = self.parse_expression()?;
            properties.push((key, value));
            if self.try_char(',') {
                continue;
            }
            self.expect_char('}')?;
            return Ok(properties);
        }
    }

    // ==================== 子句 ====================

    fn parse_conditions(&mut self) -> Result<Vec<Comparison>> {
        let mut conditions = vec![self.parse_comparison()?];
        while self.try_keyword("AND") {
            conditions.push(self.parse_comparison()?);
        }
        Ok(conditions)
    }

    fn parse_comparison(&mut self) -> Result<Comparison> {
        let left = self.parse_expression()?;
        self.skip_whitespace();
        let op = if self.try_str("<>") || self.try_str("!=") {
            CompareOp::Ne
        } else if self.try_str("<=") {
            CompareOp::Le
        } else if self.try_str(">=") {
            CompareOp::Ge
        } else if self.try_char('=') {
            CompareOp::Eq
        } else if self.try_char('<') {
            CompareOp::Lt
        } else if self.try_char('>') {
            CompareOp::Gt
        } else if self.try_keyword("IN") {
            CompareOp::In
        } else {
            return Err(Error::QueryParse(format!(
                "Expected comparison operator at position {}",
                self.pos
            )));
        };
        let right = self.parse_expression()?;
        Ok(Comparison { left, op, right })
    }

    fn parse_set(&mut self) -> Result<Clause> {
        let mut items = Vec::new();
        loop {
            let variable = self.parse_identifier()?;
            if self.try_char(':') {
                let label = self.parse_identifier()?;
                items.push(SetItem::Label { variable, label });
            } else {
                self.expect_char('.')?;
                let key = self.parse_identifier()?;
                self.expect_char('=')?;
                let value = self.parse_expression()?;
                items.push(SetItem::Property {
                    variable,
                    key,
                    value,
                });
            }
            if !self.try_char(',') {
                return Ok(Clause::Set(items));
            }
        }
    }

    fn parse_remove(&mut self) -> Result<Clause> {
        let mut items = Vec::new();
        loop {
            let variable = self.parse_identifier()?;
            if self.try_char(':') {
                let label = self.parse_identifier()?;
                items.push(RemoveItem::Label { variable, label });
            } else {
                self.expect_char('.')?;
                let key = self.parse_identifier()?;
                items.push(RemoveItem::Property { variable, key });
            }
            if !self.try_char(',') {
                return Ok(Clause::Remove(items));
            }
        }
    }

    fn parse_return(&mut self) -> Result<Clause> {
        let mut items = Vec::new();
        loop {
            self.skip_whitespace();
            let start = self.pos;
            let expr = self.parse_expression()?;
            let text = self.input[start..self.pos].trim().to_string();
            let column = if self.try_keyword("AS") {
                self.parse_identifier()?
            } else {
                text
            };
            items.push(ReturnItem { expr, column });
            if !self.try_char(',') {
                return Ok(Clause::Return(items));
            }
        }
    }

    fn parse_identifier_list(&mut self) -> Result<Vec<String>> {
        let mut idents = vec![self.parse_identifier()?];
        while self.try_char(',') {
            idents.push(self.parse_identifier()?);
        }
        Ok(idents)
    }

    // ==================== 表达式 ====================

    fn parse_expression(&mut self) -> Result<Expr> {
        self.skip_whitespace();
        let c = self
            .peek_char()
            .ok_or_else(|| Error::QueryParse("Unexpected end of input".to_string()))?;

        match c {
            '$' => {
                self.pos += 1;
                Ok(Expr::Parameter(self.parse_identifier()?))
            }
            '{' => {
                self.pos += 1;
                let name = self.parse_identifier()?;
                self.expect_char('}')?;
                Ok(Expr::Parameter(name))
            }
            '\'' | '"' => Ok(Expr::Literal(PropertyValue::String(self.parse_string()?))),
            '[' => {
                self.pos += 1;
                let mut items = Vec::new();
                if !self.try_char(']') {
                    loop {
                        items.push(self.parse_expression()?);
                        if self.try_char(',') {
                            continue;
                        }
                        self.expect_char(']')?;
                        break;
                    }
                }
                Ok(Expr::List(items))
            }
            c if c.is_ascii_digit() || c == '-' => self.parse_number_literal(),
            c if c.is_alphabetic() || c == '_' => {
                let ident = self.parse_identifier()?;
                if ident.eq_ignore_ascii_case("true") {
                    return Ok(Expr::Literal(PropertyValue::Bool(true)));
                }
                if ident.eq_ignore_ascii_case("false") {
                    return Ok(Expr::Literal(PropertyValue::Bool(false)));
                }
                if ident.eq_ignore_ascii_case("null") {
                    return Ok(Expr::Literal(PropertyValue::Null));
                }
                if self.try_char('(') {
                    let mut args = Vec::new();
                    if !self.try_char(')') {
                        loop {
                            args.push(self.parse_expression()?);
                            if self.try_char(',') {
                                continue;
                            }
                            self.expect_char(')')?;
                            break;
                        }
                    }
                    return Ok(Expr::Function(ident.to_lowercase(), args));
                }
                // 属性访问紧密结合，'.' 前不允许空白
                if self.peek_char_is('.') {
                    self.pos += 1;
                    let key = self.parse_identifier()?;
                    return Ok(Expr::Property(ident, key));
                }
                Ok(Expr::Variable(ident))
            }
            other => Err(Error::QueryParse(format!(
                "Invalid input '{}' at position {}",
                other, self.pos
            ))),
        }
    }

    fn parse_number_literal(&mut self) -> Result<Expr> {
        let start = self.pos;
        if self.peek_char_is('-') {
            self.pos += 1;
        }
        while let Some(c) = self.peek_char() {
            if c.is_ascii_digit() || c == '.' {
                self.pos += 1;
            } else {
                break;
            }
        }
        let text = &self.input[start..self.pos];
        let value = if text.contains('.') {
            text.parse::<f64>().map(PropertyValue::Float).ok()
        } else {
            text.parse::<i64>().map(PropertyValue::Integer).ok()
        };
        value
            .map(Expr::Literal)
            .ok_or_else(|| Error::QueryParse(format!("Invalid number '{}'", text)))
    }

    // ==================== 辅助方法 ====================

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek_char() {
            if c.is_whitespace() {
                self.pos += c.len_utf8();
            } else if self.peek_str("//") {
                while self.pos < self.input.len() && !self.peek_str("\n") {
                    self.pos += self.peek_char().map(char::len_utf8).unwrap_or(1);
                }
            } else {
                break;
            }
        }
    }

    fn peek_char(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn peek_char_is(&self, c: char) -> bool {
        self.peek_char() == Some(c)
    }

    fn peek_char_is_alpha(&self) -> bool {
        self.peek_char()
            .map(|c| c.is_alphabetic() || c == '_')
            .unwrap_or(false)
    }

    fn peek_str(&self, s: &str) -> bool {
        self.input[self.pos..].starts_with(s)
    }

    fn try_char(&mut self, c: char) -> bool {
        self.skip_whitespace();
        if self.peek_char() == Some(c) {
            self.pos += c.len_utf8();
            true
        } else {
            false
        }
    }

    fn expect_char(&mut self, c: char) -> Result<()> {
        if self.try_char(c) {
            Ok(())
        } else {
            Err(Error::QueryParse(format!(
                "Expected '{}' at position {}, got {:?}",
                c,
                self.pos,
                self.peek_char()
            )))
        }
    }

    fn try_str(&mut self, s: &str) -> bool {
        self.skip_whitespace();
        if self.peek_str(s) {
            self.pos += s.len();
            true
        } else {
            false
        }
    }

    fn peek_keyword(&self) -> Option<String> {
        let word: String = self.input[self.pos..]
            .chars()
            .take_while(|c| c.is_alphanumeric() || *c == '_')
            .collect();
        if word.is_empty() {
            self.peek_char().map(String::from)
        } else {
            Some(word)
        }
    }

    fn try_keyword(&mut self, keyword: &str) -> bool {
        self.skip_whitespace();
        let end = self.pos + keyword.len();
        if end > self.input.len() || !self.input.is_char_boundary(end) {
            return false;
        }
        if !self.input[self.pos..end].eq_ignore_ascii_case(keyword) {
            return false;
        }
        let boundary = self.input[end..]
            .chars()
            .next()
            .map(|c| !c.is_alphanumeric() && c != '_')
            .unwrap_or(true);
        if boundary {
            self.pos = end;
        }
        boundary
    }

    fn expect_keyword(&mut self, keyword: &str) -> Result<()> {
        if self.try_keyword(keyword) {
            Ok(())
        } else {
            Err(Error::QueryParse(format!("Expected keyword '{}'", keyword)))
        }
    }

    fn parse_identifier(&mut self) -> Result<String> {
        self.skip_whitespace();
        if self.try_char('`') {
            let start = self.pos;
            while let Some(c) = self.peek_char() {
                if c == '`' {
                    let ident = self.input[start..self.pos].to_string();
                    self.pos += 1;
                    return Ok(ident);
                }
                self.pos += c.len_utf8();
            }
            return Err(Error::QueryParse("Unclosed quoted identifier".to_string()));
        }

        let start = self.pos;
        match self.peek_char() {
            Some(c) if c.is_alphabetic() || c == '_' => self.pos += c.len_utf8(),
            _ => {
                return Err(Error::QueryParse(format!(
                    "Expected identifier at position {}",
                    self.pos
                )))
            }
        }
        while let Some(c) = self.peek_char() {
            if c.is_alphanumeric() || c == '_' {
                self.pos += c.len_utf8();
            } else {
                break;
            }
        }
        Ok(self.input[start..self.pos].to_string())
    }

    fn parse_string(&mut self) -> Result<String> {
        let quote = self
            .peek_char()
            .ok_or_else(|| Error::QueryParse("Expected string".to_string()))?;
        self.pos += quote.len_utf8();

        let mut result = String::new();
        while let Some(c) = self.peek_char() {
            self.pos += c.len_utf8();
            if c == quote {
                return Ok(result);
            }
            if c == '\\' {
                if let Some(escaped) = self.peek_char() {
                    self.pos += escaped.len_utf8();
                    match escaped {
                        'n' => result.push('\n'),
                        't' => result.push('\t'),
                        'r' => result.push('\r'),
                        other => result.push(other),
                    }
                }
            } else {
                result.push(c);
            }
        }

        Err(Error::QueryParse("Unclosed string".to_string()))
    }
}
