//! 写查询识别
//!
//! 只读路径在执行前用关键字集合判断查询是否会修改数据。

/// 会修改数据的关键字
pub const WRITE_KEYWORDS: [&str; 6] = ["create", "set", "remove", "merge", "delete", "drop"];

/// 查询中出现任一写关键字（不区分大小写、按整词匹配）即视为写查询。
///
/// 按整词匹配，`created_at`、`offset` 这类标识符不会被误判。
pub fn is_write_query(query: &str) -> bool {
    query
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|word| !word.is_empty())
        .any(|word| {
            WRITE_KEYWORDS
                .iter()
                .any(|keyword| word.eq_ignore_ascii_case(keyword))
        })
}
