use crate::models::{Category, LineOutcome, MatchKind};
use indexmap::IndexMap;

/// 单行归类
///
/// 优先级: 退货 > 错误 > 部分匹配 / 有效
pub fn categorize(outcome: &LineOutcome) -> Category {
    if outcome.line.is_return() {
        return Category::Return;
    }

    let product = &outcome.matches.product;
    let has_error = product.kind == MatchKind::None
        || !outcome.matches.merchant.is_exact()
        || !outcome.issues.is_empty()
        || !outcome.is_fully_allocated();
    if has_error {
        return Category::Error;
    }

    match product.kind {
        MatchKind::Exact => Category::Valid,
        MatchKind::Fuzzy if outcome.confirmed => Category::Valid,
        MatchKind::Fuzzy => Category::Partial,
        MatchKind::None => Category::Error,
    }
}

/// 订单整体归类：同一订单 (非退货行) 中任一行出错则整单进错误表，
/// 否则任一行部分匹配则整单进部分匹配表
pub fn apply_order_cohesion(outcomes: &mut [LineOutcome]) {
    let mut worst: IndexMap<String, Category> = IndexMap::new();
    for o in outcomes.iter().filter(|o| o.category != Category::Return) {
        let slot = worst.entry(o.line.order_id.clone()).or_insert(o.category);
        if o.category.severity() > slot.severity() {
            *slot = o.category;
        }
    }

    for o in outcomes.iter_mut() {
        if o.category == Category::Return {
            o.sheet = Category::Return;
            continue;
        }
        let order_sheet = worst
            .get(&o.line.order_id)
            .copied()
            .unwrap_or(o.category);
        o.sheet = order_sheet;
        if order_sheet != o.category {
            o.cohesion_note = Some(match order_sheet {
                Category::Error => "Order has rows with errors".to_string(),
                _ => "Order has partially matched rows".to_string(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        AllocationRecord, LineIssue, LineMatch, MatchResult, MerchantField, MerchantMatch,
        OrderLine, ResolutionState,
    };
    use bigdecimal::BigDecimal;
    use chrono::NaiveDate;

    fn outcome(order_id: &str, qty: i64, kind: MatchKind, merchant_exact: bool) -> LineOutcome {
        let line = OrderLine::new(
            0,
            order_id,
            NaiveDate::from_ymd_opt(2024, 3, 3).unwrap(),
            "Vim Bar",
            "Shop",
            qty,
            BigDecimal::from(qty * 5),
        );
        let score = match kind {
            MatchKind::Exact => 100,
            MatchKind::Fuzzy => 82,
            MatchKind::None => 40,
        };
        let allocations = if qty > 0 {
            vec![AllocationRecord {
                line_id: 0,
                batch_id: "B1".into(),
                product_id: "P1".into(),
                product_name: "Vim Bar".into(),
                allocated_qty: qty,
                allocated_price: BigDecimal::from(5),
            }]
        } else {
            Vec::new()
        };
        LineOutcome {
            line,
            matches: LineMatch {
                product: MatchResult {
                    entry: (kind != MatchKind::None).then_some(0),
                    name: (kind != MatchKind::None).then(|| "Vim Bar".to_string()),
                    score,
                    kind,
                },
                merchant: MerchantMatch {
                    result: if merchant_exact {
                        MatchResult {
                            entry: Some(0),
                            name: Some("Shop".into()),
                            score: 100,
                            kind: MatchKind::Exact,
                        }
                    } else {
                        MatchResult::none(95)
                    },
                    field: merchant_exact.then_some(MerchantField::ShopName),
                },
            },
            confirmed: false,
            needs_confirmation: kind == MatchKind::Fuzzy,
            state: ResolutionState::Resolved,
            issues: Vec::new(),
            allocations,
            shortfall: 0,
            substitutes: Vec::new(),
            return_batch: None,
            category: Category::Valid,
            sheet: Category::Valid,
            cohesion_note: None,
        }
    }

    #[test]
    fn returns_win_over_everything() {
        let o = outcome("R", -3, MatchKind::None, false);
        assert_eq!(categorize(&o), Category::Return);
    }

    #[test]
    fn exact_and_fully_allocated_is_valid() {
        assert_eq!(categorize(&outcome("A", 5, MatchKind::Exact, true)), Category::Valid);
    }

    #[test]
    fn unconfirmed_fuzzy_is_partial_and_confirmed_is_valid() {
        let mut o = outcome("A", 5, MatchKind::Fuzzy, true);
        assert_eq!(categorize(&o), Category::Partial);
        o.confirmed = true;
        assert_eq!(categorize(&o), Category::Valid);
    }

    #[test]
    fn merchant_miss_is_error_even_with_exact_product() {
        assert_eq!(categorize(&outcome("A", 5, MatchKind::Exact, false)), Category::Error);
    }

    #[test]
    fn shortfall_is_error() {
        let mut o = outcome("A", 5, MatchKind::Fuzzy, true);
        o.allocations[0].allocated_qty = 3;
        o.shortfall = 2;
        o.issues.push(LineIssue::InsufficientStock {
            requested: 5,
            fulfilled: 3,
            product: "Vim Bar".into(),
        });
        assert_eq!(categorize(&o), Category::Error);
    }

    #[test]
    fn cohesion_moves_whole_order() {
        let mut rows = vec![
            outcome("A", 5, MatchKind::Exact, true),
            outcome("A", 5, MatchKind::Exact, false),
            outcome("B", 5, MatchKind::Exact, true),
            outcome("B", 5, MatchKind::Fuzzy, true),
            outcome("B", -2, MatchKind::Exact, true),
        ];
        for r in rows.iter_mut() {
            r.category = categorize(r);
        }
        apply_order_cohesion(&mut rows);

        let sheets: Vec<_> = rows.iter().map(|r| r.sheet).collect();
        assert_eq!(
            sheets,
            vec![
                Category::Error,
                Category::Error,
                Category::Partial,
                Category::Partial,
                Category::Return
            ]
        );
        assert_eq!(rows[0].category, Category::Valid);
        assert!(rows[0].cohesion_note.is_some());
        assert!(rows[1].cohesion_note.is_none());
    }
}
