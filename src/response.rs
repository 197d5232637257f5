//! 响应整形
//!
//! 规范化之后的行集合在这里变成最终响应体：
//! - 零行为无内容
//! - 一行直接返回该行对象
//! - 多行返回对象数组
//!
//! 多个参数对象的写请求再经过 `collapse` 合并。

use crate::error::{Error, Result};
use crate::types::{CanonicalValue, Params};

/// 传输层看到的结果
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// 无内容，与 JSON `null` 区分
    NoContent,
    Body(CanonicalValue),
}

impl Reply {
    pub fn is_no_content(&self) -> bool {
        matches!(self, Reply::NoContent)
    }

    pub fn into_body(self) -> Option<CanonicalValue> {
        match self {
            Reply::NoContent => None,
            Reply::Body(v) => Some(v),
        }
    }
}

/// 把 `ResultNormalizer::normalize` 的输出整形成单个请求的结果。
///
/// 结果只有一列且该列的值都是对象（或 null）时，每行展开为该值，
/// 例如 `RETURN n` 直接得到节点属性。是否展开按整个结果决定，同一响应内各行形状一致。
pub fn present(normalized: Option<CanonicalValue>) -> Option<CanonicalValue> {
    let rows = match normalized? {
        CanonicalValue::Array(rows) => rows,
        other => return Some(other),
    };
    let mut rows = if is_single_element_column(&rows) {
        rows.into_iter().map(unwrap_single_column).collect()
    } else {
        rows
    };
    match rows.len() {
        0 => None,
        1 => rows.pop(),
        _ => Some(CanonicalValue::Array(rows)),
    }
}

/// 所有行共享同一个唯一列，且至少有一个对象值、其余为 null
fn is_single_element_column(rows: &[CanonicalValue]) -> bool {
    let mut column: Option<&String> = None;
    let mut has_object = false;
    for row in rows {
        let map = match row {
            CanonicalValue::Object(map) if map.len() == 1 => map,
            _ => return false,
        };
        let (key, value) = match map.iter().next() {
            Some(entry) => entry,
            None => return false,
        };
        match column {
            Some(existing) if existing != key => return false,
            _ => column = Some(key),
        }
        match value {
            CanonicalValue::Object(_) => has_object = true,
            CanonicalValue::Null => {}
            _ => return false,
        }
    }
    has_object
}

fn unwrap_single_column(row: CanonicalValue) -> CanonicalValue {
    match row {
        CanonicalValue::Object(map) => map
            .into_iter()
            .next()
            .map(|(_, inner)| inner)
            .unwrap_or(CanonicalValue::Null),
        other => other,
    }
}

/// 单个/多个参数对象的合并规则：一个结果原样返回（绝不包一层数组），
/// 多个结果按提交顺序组成数组，缺失的位置为 `null`。
pub fn collapse(results: Vec<Option<CanonicalValue>>) -> Reply {
    if results.len() == 1 {
        return match results.into_iter().next().flatten() {
            Some(value) => Reply::Body(value),
            None => Reply::NoContent,
        };
    }
    Reply::Body(CanonicalValue::Array(
        results
            .into_iter()
            .map(|r| r.unwrap_or(CanonicalValue::Null))
            .collect(),
    ))
}

/// 无状态 JSON 编解码器，由需要的组件各自持有
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl JsonCodec {
    pub fn new() -> Self {
        Self
    }

    pub fn encode(&self, value: &CanonicalValue) -> Result<String> {
        Ok(serde_json::to_string(value)?)
    }

    /// 解析写请求体：一个对象或对象数组，每个对象对应一次执行
    pub fn decode_params(&self, body: &[u8]) -> Result<Vec<Params>> {
        let data: CanonicalValue = serde_json::from_slice(body)
            .map_err(|e| Error::InputFormat(format!("无法解析为 JSON 对象或数组: {}", e)))?;
        match data {
            CanonicalValue::Object(_) => Ok(vec![to_params(data)?]),
            CanonicalValue::Array(items) if !items.is_empty() => {
                items.into_iter().map(to_params).collect()
            }
            CanonicalValue::Array(_) => {
                Err(Error::InputFormat("参数数组不能为空".to_string()))
            }
            other => Err(Error::InputFormat(format!(
                "无法解析为 JSON 对象或数组: {}",
                other
            ))),
        }
    }
}

fn to_params(value: CanonicalValue) -> Result<Params> {
    if !value.is_object() {
        return Err(Error::InputFormat(format!("参数必须是 JSON 对象: {}", value)));
    }
    serde_json::from_value(value).map_err(|e| Error::InputFormat(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PropertyValue;
    use serde_json::json;

    #[test]
    fn test_present_shapes_rows() {
        assert_eq!(present(None), None);
        assert_eq!(
            present(Some(json!([{"l": 6, "name": "Andres"}]))),
            Some(json!({"l": 6, "name": "Andres"}))
        );
        assert_eq!(
            present(Some(json!([{"l": 6, "name": "Andres"}, {"l": 5, "name": "Peter"}]))),
            Some(json!([{"l": 6, "name": "Andres"}, {"l": 5, "name": "Peter"}]))
        );
    }

    #[test]
    fn test_present_unwraps_single_element_column() {
        assert_eq!(
            present(Some(json!([{"n": {"foo": "bar"}}]))),
            Some(json!({"foo": "bar"}))
        );
        assert_eq!(
            present(Some(json!([{"n": {"name": "Andres"}}, {"n": {"name": "Peter"}}]))),
            Some(json!([{"name": "Andres"}, {"name": "Peter"}]))
        );
        // 标量列保持行对象
        assert_eq!(
            present(Some(json!([{"n.name": "Andres"}]))),
            Some(json!({"n.name": "Andres"}))
        );
    }

    #[test]
    fn test_present_keeps_one_shape_per_result() {
        // 对象与 null 混合的列整体展开
        assert_eq!(
            present(Some(json!([{"m": {"a": 1}}, {"m": null}, {"m": {}}]))),
            Some(json!([{"a": 1}, null, {}]))
        );
        // 有一行是标量时所有行都保持包装
        assert_eq!(
            present(Some(json!([{"m": {"a": 1}}, {"m": 2}]))),
            Some(json!([{"m": {"a": 1}}, {"m": 2}]))
        );
        // 全为 null 时不展开
        assert_eq!(
            present(Some(json!([{"m": null}, {"m": null}]))),
            Some(json!([{"m": null}, {"m": null}]))
        );
    }

    #[test]
    fn test_collapse_single_and_multi() {
        assert_eq!(
            collapse(vec![Some(json!({"name": "foobar"}))]),
            Reply::Body(json!({"name": "foobar"}))
        );
        assert_eq!(collapse(vec![None]), Reply::NoContent);
        assert_eq!(collapse(vec![None, None]), Reply::Body(json!([null, null])));
        assert_eq!(
            collapse(vec![Some(json!({"name": "Neo"})), None]),
            Reply::Body(json!([{"name": "Neo"}, null]))
        );
        // 单个结果本身是数组时不再包装
        assert_eq!(
            collapse(vec![Some(json!([1, 2]))]),
            Reply::Body(json!([1, 2]))
        );
    }

    #[test]
    fn test_decode_params() {
        let codec = JsonCodec::new();
        let single = codec.decode_params(br#"{"id": 1, "name": "Neo"}"#).unwrap();
        assert_eq!(single.len(), 1);
        assert_eq!(single[0]["id"], PropertyValue::Integer(1));
        assert_eq!(single[0]["name"], PropertyValue::from("Neo"));

        let multi = codec
            .decode_params(br#"[{"ids": [1, 2]}, {"ids": []}]"#)
            .unwrap();
        assert_eq!(multi.len(), 2);
        assert_eq!(
            multi[0]["ids"],
            PropertyValue::List(vec![1i64.into(), 2i64.into()])
        );
    }

    #[test]
    fn test_decode_rejects_other_shapes() {
        let codec = JsonCodec::new();
        let bodies: [&[u8]; 5] = [b"42", b"\"text\"", b"[1, 2]", b"[]", b"{not json"];
        for body in bodies {
            assert!(matches!(
                codec.decode_params(body),
                Err(Error::InputFormat(_))
            ));
        }
    }

    #[test]
    fn test_encode_keeps_column_order() {
        let codec = JsonCodec::new();
        let value = json!({"z": 1, "a": [true, null]});
        assert_eq!(codec.encode(&value).unwrap(), r#"{"z":1,"a":[true,null]}"#);
    }
}
