use serde::{Deserialize, Serialize};

/// 匹配类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    /// 得分 100
    Exact,
    /// 达到阈值但不足 100
    Fuzzy,
    None,
}

/// 单个目标 (商品或商户) 的匹配结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    /// 命中的目录下标
    pub entry: Option<usize>,
    /// 命中条目的名称
    pub name: Option<String>,
    /// 0-100；未命中时仍保留最佳得分以便报告
    pub score: u8,
    pub kind: MatchKind,
}

impl MatchResult {
    pub fn none(score: u8) -> Self {
        Self {
            entry: None,
            name: None,
            score,
            kind: MatchKind::None,
        }
    }

    pub fn is_exact(&self) -> bool {
        self.kind == MatchKind::Exact
    }

    pub fn is_fuzzy(&self) -> bool {
        self.kind == MatchKind::Fuzzy
    }

    pub fn is_match(&self) -> bool {
        self.kind != MatchKind::None
    }
}

/// 商户命中字段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MerchantField {
    ShopName,
    MerchantName,
}

/// 商户匹配结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MerchantMatch {
    pub result: MatchResult,
    pub field: Option<MerchantField>,
}

impl MerchantMatch {
    pub fn is_exact(&self) -> bool {
        self.result.is_exact()
    }
}

/// 一行订单在第一阶段得到的匹配
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineMatch {
    pub product: MatchResult,
    pub merchant: MerchantMatch,
}
