use crate::models::{Catalog, MatchKind, MatchResult, MerchantEntry, MerchantField, MerchantMatch};
use crate::service::normalizer::{normalize, sorted_tokens};

/// 两个字符串的相似度 (0-100)，四舍五入；非完全相同时最多 99
///
/// 插删距离归一化：2 * LCS / (|a| + |b|)，长度差只按缺失字符计分
pub fn ratio(a: &str, b: &str) -> u8 {
    if a == b {
        return if a.is_empty() { 0 } else { 100 };
    }
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() || b.is_empty() {
        return 0;
    }
    let total = a.len() + b.len();
    let common = lcs_len(&a, &b);
    let score = (200.0 * common as f64 / total as f64).round() as u8;
    score.min(99)
}

/// 最长公共子序列长度 (两行滚动)
fn lcs_len(a: &[char], b: &[char]) -> usize {
    let mut prev = vec![0usize; b.len() + 1];
    let mut curr = vec![0usize; b.len() + 1];
    for &ca in a {
        for (j, &cb) in b.iter().enumerate() {
            curr[j + 1] = if ca == cb {
                prev[j] + 1
            } else {
                prev[j + 1].max(curr[j])
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

/// 词序不敏感相似度：规范化、切词排序后比较
pub fn token_sort_ratio(a: &str, b: &str) -> u8 {
    ratio(&sorted_tokens(a), &sorted_tokens(b))
}

/// 按得分分类
pub fn classify(score: u8, partial_min_score: u8) -> MatchKind {
    if score == 100 {
        MatchKind::Exact
    } else if score >= partial_min_score {
        MatchKind::Fuzzy
    } else {
        MatchKind::None
    }
}

/// 商品匹配：与全部目录名称计算词序不敏感得分，取最高者 (同分取目录中靠前者)
pub fn match_product(order_name: &str, catalog: &Catalog, partial_min_score: u8) -> MatchResult {
    let query = sorted_tokens(order_name);
    if query.is_empty() {
        return MatchResult::none(0);
    }

    let mut best: Option<(usize, u8)> = None;
    for (id, entry) in catalog.entries().iter().enumerate() {
        let score = ratio(&query, &sorted_tokens(&entry.normalized_name));
        let is_better = match best {
            None => true,
            Some((_, best_score)) => score > best_score,
        };
        if is_better {
            best = Some((id, score));
            if score == 100 {
                break;
            }
        }
    }

    let Some((id, score)) = best else {
        return MatchResult::none(0);
    };

    match classify(score, partial_min_score) {
        MatchKind::None => MatchResult::none(score),
        kind => MatchResult {
            entry: Some(id),
            name: Some(catalog.name_of(id).to_string()),
            score,
            kind,
        },
    }
}

/// 商户匹配：仅接受 shop_name 或 merchant_name 的完全匹配 (先 shop_name)
///
/// 未命中时 score 为两字段中的最高相似度，仅用于报告
pub fn match_merchant(order_name: &str, merchants: &[MerchantEntry]) -> MerchantMatch {
    let query = normalize(order_name);
    if query.is_empty() {
        return MerchantMatch {
            result: MatchResult::none(0),
            field: None,
        };
    }

    let fields = [MerchantField::ShopName, MerchantField::MerchantName];
    for field in fields {
        let hit = merchants.iter().position(|m| {
            let candidate = match field {
                MerchantField::ShopName => &m.shop_name,
                MerchantField::MerchantName => &m.merchant_name,
            };
            normalize(candidate) == query
        });
        if let Some(idx) = hit {
            let name = match field {
                MerchantField::ShopName => merchants[idx].shop_name.clone(),
                MerchantField::MerchantName => merchants[idx].merchant_name.clone(),
            };
            return MerchantMatch {
                result: MatchResult {
                    entry: Some(idx),
                    name: Some(name),
                    score: 100,
                    kind: MatchKind::Exact,
                },
                field: Some(field),
            };
        }
    }

    let best = merchants
        .iter()
        .flat_map(|m| [&m.shop_name, &m.merchant_name])
        .map(|candidate| token_sort_ratio(&query, candidate))
        .max()
        .unwrap_or(0);

    MerchantMatch {
        // 词序不同的完全同词也不算命中
        result: MatchResult::none(best.min(99)),
        field: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Batch;

    fn catalog() -> Catalog {
        Catalog::builder()
            .with_batch("Surf Excel Easy Wash 1kg", Batch::new("B1", "P1", 10))
            .with_batch("Lifebuoy Total 10 125g", Batch::new("B2", "P2", 10))
            .with_batch("Lux Soft Touch 100g", Batch::new("B3", "P3", 10))
            .build()
    }

    #[test]
    fn exact_match_ignores_case_and_token_order() {
        let result = match_product("1kg surf EXCEL easy wash", &catalog(), 70);
        assert_eq!(result.kind, MatchKind::Exact);
        assert_eq!(result.score, 100);
        assert_eq!(result.name.as_deref(), Some("Surf Excel Easy Wash 1kg"));
        assert_eq!(result.entry, Some(0));
    }

    #[test]
    fn close_name_is_fuzzy() {
        let result = match_product("Lifebuoy Total 10 120g", &catalog(), 70);
        assert_eq!(result.kind, MatchKind::Fuzzy);
        assert!(result.score >= 70 && result.score < 100, "score {}", result.score);
        assert_eq!(result.entry, Some(1));
    }

    #[test]
    fn unrelated_name_is_none_with_score_kept() {
        let result = match_product("Colgate Toothpaste", &catalog(), 70);
        assert_eq!(result.kind, MatchKind::None);
        assert!(result.entry.is_none());
        assert!(result.score < 70);
    }

    #[test]
    fn empty_name_never_matches() {
        assert_eq!(match_product("  ", &catalog(), 70), MatchResult::none(0));
    }

    #[test]
    fn matching_is_idempotent() {
        let catalog = catalog();
        let first = match_product("lux soft touch", &catalog, 70);
        let second = match_product("lux soft touch", &catalog, 70);
        assert_eq!(first, second);
    }

    #[test]
    fn merchant_matches_shop_name_then_merchant_name() {
        let merchants = vec![
            MerchantEntry::new("Sharma General Store", "Ravi Sharma"),
            MerchantEntry::new("Gupta Kirana", "Anil Gupta"),
        ];
        let by_shop = match_merchant("sharma  general store", &merchants);
        assert!(by_shop.is_exact());
        assert_eq!(by_shop.field, Some(MerchantField::ShopName));

        let by_owner = match_merchant("ANIL GUPTA", &merchants);
        assert!(by_owner.is_exact());
        assert_eq!(by_owner.field, Some(MerchantField::MerchantName));
        assert_eq!(by_owner.result.entry, Some(1));
    }

    #[test]
    fn merchant_near_miss_is_not_a_match() {
        let merchants = vec![MerchantEntry::new("Sharma General Store", "Ravi Sharma")];
        let result = match_merchant("Sharma General Stores", &merchants);
        assert!(!result.is_exact());
        assert_eq!(result.result.kind, MatchKind::None);
        assert!(result.result.score >= 90 && result.result.score < 100);
    }

    #[test]
    fn ratio_bounds() {
        assert_eq!(ratio("abc", "abc"), 100);
        assert_eq!(ratio("", ""), 0);
        assert_eq!(ratio("abc", ""), 0);
        assert_eq!(ratio("abcd", "abce"), 75);
    }

    #[test]
    fn missing_words_only_cost_their_characters() {
        assert_eq!(ratio("lux soap", "100g lux soap"), 76);
        assert_eq!(ratio("colgate xyl", "colgate gel"), 82);

        let result = match_product("Surf Excel 1kg", &catalog(), 70);
        assert_eq!(result.kind, MatchKind::Fuzzy);
        assert_eq!(result.score, 74);
        assert_eq!(result.entry, Some(0));
    }
}
