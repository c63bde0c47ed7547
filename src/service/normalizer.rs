/// 名称规范化：小写、标点替换为空格、合并空白
///
/// 不做词序重排，词序不敏感由匹配器的 token 排序打分负责。
/// 空串原样返回。
pub fn normalize(name: &str) -> String {
    let folded: String = name
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c.is_whitespace() {
                c
            } else {
                ' '
            }
        })
        .collect::<String>()
        .to_lowercase();

    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// 规范化后按空白切词并排序拼接
pub fn sorted_tokens(name: &str) -> String {
    let normalized = normalize(name);
    let mut tokens: Vec<&str> = normalized.split_whitespace().collect();
    tokens.sort_unstable();
    tokens.join(" ")
}
