//! 文本字段类型转换
//!
//! CSV 字段和 URL 查询参数都是文本，执行前按固定规则转换为标量：
//! 1. 忽略大小写的 `true` / `false` → 布尔
//! 2. 形如 `^[+-]?[0-9.]+$` → 含 `.` 为浮点，否则为 64 位整数；解析失败即报错
//! 3. 其余保持原字符串
//!
//! 看起来像数字的字符串总会被转成数字，这是已知限制。

use crate::error::{Error, Result};
use crate::types::{Params, PropertyValue};

/// 转换单个文本字段
pub fn coerce(field: &str) -> Result<PropertyValue> {
    if field.eq_ignore_ascii_case("true") {
        return Ok(PropertyValue::Bool(true));
    }
    if field.eq_ignore_ascii_case("false") {
        return Ok(PropertyValue::Bool(false));
    }
    if looks_numeric(field) {
        return if field.contains('.') {
            field
                .parse::<f64>()
                .map(PropertyValue::Float)
                .map_err(|e| Error::InputFormat(format!("无法解析浮点数 '{}': {}", field, e)))
        } else {
            field
                .parse::<i64>()
                .map(PropertyValue::Integer)
                .map_err(|e| Error::InputFormat(format!("无法解析整数 '{}': {}", field, e)))
        };
    }
    Ok(PropertyValue::String(field.to_string()))
}

fn looks_numeric(field: &str) -> bool {
    let body = field
        .strip_prefix('+')
        .or_else(|| field.strip_prefix('-'))
        .unwrap_or(field);
    !body.is_empty() && body.bytes().all(|b| b.is_ascii_digit() || b == b'.')
}

/// 将 URL 查询参数绑定为命名参数。
///
/// 同名参数只出现一次时取转换后的标量，出现多次时为转换后的列表，
/// 列表顺序与出现顺序一致。
pub fn bind_query_params<I, K, V>(pairs: I) -> Result<Params>
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: AsRef<str>,
{
    let mut grouped: indexmap::IndexMap<String, Vec<PropertyValue>> = indexmap::IndexMap::new();
    for (key, value) in pairs {
        grouped
            .entry(key.into())
            .or_default()
            .push(coerce(value.as_ref())?);
    }

    Ok(grouped
        .into_iter()
        .map(|(key, mut values)| {
            let value = if values.len() == 1 {
                values.remove(0)
            } else {
                PropertyValue::List(values)
            };
            (key, value)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coerce_booleans() {
        assert_eq!(coerce("true").unwrap(), PropertyValue::Bool(true));
        assert_eq!(coerce("FALSE").unwrap(), PropertyValue::Bool(false));
        assert_eq!(coerce("True").unwrap(), PropertyValue::Bool(true));
    }

    #[test]
    fn test_coerce_numbers() {
        assert_eq!(coerce("-12").unwrap(), PropertyValue::Integer(-12));
        assert_eq!(coerce("+5").unwrap(), PropertyValue::Integer(5));
        assert_eq!(coerce("3.5").unwrap(), PropertyValue::Float(3.5));
        assert_eq!(coerce(".5").unwrap(), PropertyValue::Float(0.5));
        // 前导零的编号同样会变成数字
        assert_eq!(coerce("007").unwrap(), PropertyValue::Integer(7));
    }

    #[test]
    fn test_coerce_strings() {
        assert_eq!(coerce("bar").unwrap(), PropertyValue::from("bar"));
        assert_eq!(coerce("").unwrap(), PropertyValue::from(""));
        assert_eq!(coerce("-").unwrap(), PropertyValue::from("-"));
        assert_eq!(coerce("1e5").unwrap(), PropertyValue::from("1e5"));
        assert_eq!(coerce("12 ").unwrap(), PropertyValue::from("12 "));
    }

    #[test]
    fn test_coerce_numeric_failures_are_errors() {
        assert!(matches!(coerce("1.2.3"), Err(Error::InputFormat(_))));
        assert!(matches!(coerce("."), Err(Error::InputFormat(_))));
        assert!(matches!(
            coerce("99999999999999999999"),
            Err(Error::InputFormat(_))
        ));
    }

    #[test]
    fn test_bind_query_params() {
        let params = bind_query_params(vec![
            ("id", "1"),
            ("name", "Neo"),
            ("id", "2"),
        ])
        .unwrap();
        assert_eq!(
            params["id"],
            PropertyValue::List(vec![PropertyValue::Integer(1), PropertyValue::Integer(2)])
        );
        assert_eq!(params["name"], PropertyValue::from("Neo"));
    }
}
