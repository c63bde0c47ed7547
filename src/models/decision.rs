use crate::service::normalizer::normalize;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 待确认问题类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryKind {
    /// 模糊匹配的商品需人工确认
    ConfirmMatch,
    /// 主商品库存不足，可用变体补足
    Variant,
    /// 主商品 (及变体) 库存不足，可用关联商品补足
    Related,
}

/// 候选项
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub name: String,
    pub available_stock: i64,
    pub score: Option<u8>,
}

/// 引擎向调用方提出的问题
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionQuery {
    pub line_id: usize,
    pub order_id: String,
    pub kind: QueryKind,
    /// 订单中的原始商品名
    pub input_product: String,
    /// 匹配到的目录商品
    pub matched_product: String,
    pub candidates: Vec<Candidate>,
    /// 提问时主商品可用库存
    pub main_stock: i64,
    pub required_qty: i64,
}

/// 调用方答复类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionKind {
    ConfirmMatch,
    UseVariant,
    UseRelated,
    Reject,
}

/// 调用方对某行的答复
///
/// `chosen` 为空时作用于该行同类全部候选
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolutionDecision {
    pub line_id: usize,
    pub kind: DecisionKind,
    #[serde(default)]
    pub chosen: Option<String>,
}

impl ResolutionDecision {
    pub fn new(line_id: usize, kind: DecisionKind, chosen: Option<&str>) -> Self {
        Self {
            line_id,
            kind,
            chosen: chosen.map(|s| s.to_string()),
        }
    }

    fn applies_to(&self, name: &str) -> bool {
        match &self.chosen {
            None => true,
            Some(chosen) => normalize(chosen) == normalize(name),
        }
    }
}

/// 按行索引的决策集合；未答复的问题一律视为拒绝
#[derive(Debug, Clone, Default)]
pub struct DecisionSet {
    by_line: HashMap<usize, Vec<ResolutionDecision>>,
}

impl DecisionSet {
    pub fn new(decisions: impl IntoIterator<Item = ResolutionDecision>) -> Self {
        let mut by_line: HashMap<usize, Vec<ResolutionDecision>> = HashMap::new();
        for d in decisions {
            by_line.entry(d.line_id).or_default().push(d);
        }
        Self { by_line }
    }

    pub fn len(&self) -> usize {
        self.by_line.values().map(|v| v.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_line.is_empty()
    }

    fn for_line(&self, line_id: usize) -> &[ResolutionDecision] {
        self.by_line.get(&line_id).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// 是否明确拒绝了某个名称
    pub fn is_rejected(&self, line_id: usize, name: &str) -> bool {
        self.for_line(line_id)
            .iter()
            .any(|d| d.kind == DecisionKind::Reject && d.applies_to(name))
    }

    /// 模糊匹配是否已被确认
    pub fn is_confirmed(&self, line_id: usize, matched_name: &str) -> bool {
        !self.is_rejected(line_id, matched_name)
            && self
                .for_line(line_id)
                .iter()
                .any(|d| d.kind == DecisionKind::ConfirmMatch && d.applies_to(matched_name))
    }

    /// 是否授权使用某个变体/关联商品
    pub fn authorizes(&self, line_id: usize, kind: DecisionKind, candidate: &str) -> bool {
        !self.is_rejected(line_id, candidate)
            && self
                .for_line(line_id)
                .iter()
                .any(|d| d.kind == kind && d.applies_to(candidate))
    }
}

impl FromIterator<ResolutionDecision> for DecisionSet {
    fn from_iter<T: IntoIterator<Item = ResolutionDecision>>(iter: T) -> Self {
        DecisionSet::new(iter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unanswered_defaults_to_reject() {
        let decisions = DecisionSet::default();
        assert!(!decisions.is_confirmed(0, "Lux Soap"));
        assert!(!decisions.authorizes(0, DecisionKind::UseVariant, "Lux Soap 2"));
    }

    #[test]
    fn chosen_candidate_matches_by_normalized_name() {
        let decisions = DecisionSet::new(vec![ResolutionDecision::new(
            3,
            DecisionKind::UseVariant,
            Some("lux  soap (new)"),
        )]);
        assert!(decisions.authorizes(3, DecisionKind::UseVariant, "Lux Soap New"));
        assert!(!decisions.authorizes(3, DecisionKind::UseRelated, "Lux Soap New"));
        assert!(!decisions.authorizes(4, DecisionKind::UseVariant, "Lux Soap New"));
    }

    #[test]
    fn reject_overrides_acceptance() {
        let decisions = DecisionSet::new(vec![
            ResolutionDecision::new(1, DecisionKind::UseRelated, None),
            ResolutionDecision::new(1, DecisionKind::Reject, Some("Rin Bar")),
        ]);
        assert!(decisions.authorizes(1, DecisionKind::UseRelated, "Rin Bar Lemon"));
        assert!(!decisions.authorizes(1, DecisionKind::UseRelated, "Rin Bar"));
    }

    #[test]
    fn blanket_reject_withholds_confirmation() {
        let decisions: DecisionSet = vec![
            ResolutionDecision::new(2, DecisionKind::ConfirmMatch, None),
            ResolutionDecision::new(2, DecisionKind::Reject, None),
        ]
        .into_iter()
        .collect();
        assert!(!decisions.is_confirmed(2, "Dove Shampoo"));
        assert_eq!(decisions.len(), 2);
    }
}
