use crate::models::{LineMatch, OrderLine};
use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 行最终类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Valid,
    Partial,
    Error,
    Return,
}

impl Category {
    /// 输出工作簿中的表名
    pub fn sheet_name(&self) -> &'static str {
        match self {
            Category::Valid => "Sale Order Demo",
            Category::Partial => "Partially Matched",
            Category::Error => "Error Rows",
            Category::Return => "Sales Return Sheet",
        }
    }

    /// 订单整体归类时的严重程度
    pub fn severity(&self) -> u8 {
        match self {
            Category::Valid => 0,
            Category::Partial => 1,
            Category::Error => 2,
            Category::Return => 0,
        }
    }
}

/// 解析状态机
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionState {
    Unresolved,
    ProductMatched,
    MerchantMatched,
    VariantCheck,
    RelatedCheck,
    Resolved,
    Failed,
}

/// 行级问题 (可恢复，行进入错误表，处理继续)
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LineIssue {
    #[error("Product not found in reference")]
    ProductNotFound,

    #[error("Product match score too low ({score}%) - may be similar but different product")]
    LowMatchScore { score: u8 },

    #[error("Product match rejected by reviewer ({score}%)")]
    MatchRejected { score: u8 },

    #[error("Merchant not matched")]
    MerchantNotMatched { score: u8 },

    #[error("Insufficient stock: need {requested}, only {fulfilled} available across all batches (matched to: '{product}')")]
    InsufficientStock {
        requested: i64,
        fulfilled: i64,
        product: String,
    },
}

impl LineIssue {
    pub fn is_product_issue(&self) -> bool {
        matches!(
            self,
            LineIssue::ProductNotFound
                | LineIssue::LowMatchScore { .. }
                | LineIssue::MatchRejected { .. }
                | LineIssue::InsufficientStock { .. }
        )
    }

    /// 缺货数量
    pub fn shortfall(&self) -> i64 {
        match self {
            LineIssue::InsufficientStock {
                requested,
                fulfilled,
                ..
            } => requested - fulfilled,
            _ => 0,
        }
    }
}

/// 单批次分配记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationRecord {
    pub line_id: usize,
    pub batch_id: String,
    pub product_id: String,
    /// 批次所属目录商品 (变体/关联商品时与主商品不同)
    pub product_name: String,
    pub allocated_qty: i64,
    /// 分配单价 (订单单价)
    pub allocated_price: BigDecimal,
}

/// 一行订单的完整处理结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineOutcome {
    pub line: OrderLine,
    pub matches: LineMatch,
    /// 模糊匹配已由调用方确认
    pub confirmed: bool,
    /// 模糊匹配尚待确认
    pub needs_confirmation: bool,
    pub state: ResolutionState,
    pub issues: Vec<LineIssue>,
    pub allocations: Vec<AllocationRecord>,
    pub shortfall: i64,
    /// 经授权参与分配的变体/关联商品
    pub substitutes: Vec<String>,
    /// 退货行对应的批次
    pub return_batch: Option<(String, String)>,
    pub category: Category,
    /// 订单整体归类后实际落入的表
    pub sheet: Category,
    /// 因同订单其它行而被调整归类时的说明
    pub cohesion_note: Option<String>,
}

impl LineOutcome {
    pub fn allocated_qty(&self) -> i64 {
        self.allocations.iter().map(|a| a.allocated_qty).sum()
    }

    pub fn is_multi_batch(&self) -> bool {
        self.allocations.len() > 1
    }

    pub fn is_fully_allocated(&self) -> bool {
        !self.line.is_return() && self.shortfall == 0 && self.allocated_qty() == self.line.quantity
    }
}

/// 原因计数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReasonCount {
    pub reason: String,
    pub count: usize,
}

/// 有效订单拆表信息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SheetInfo {
    pub sheet_name: String,
    pub order_count: usize,
    pub row_count: usize,
}

/// 运行统计
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub total_lines: usize,
    pub valid_lines: usize,
    pub partial_lines: usize,
    pub error_lines: usize,
    pub return_lines: usize,
    pub valid_orders: usize,
    pub partial_orders: usize,
    pub error_orders: usize,
    /// 拆成多个批次的行数
    pub multi_batch_lines: usize,
    /// 上述行共产生的分配记录数
    pub multi_batch_rows: usize,
    pub skipped_zero_quantity: usize,
    pub dropped_incomplete: usize,
    pub top_error_reasons: Vec<ReasonCount>,
    pub top_partial_reasons: Vec<ReasonCount>,
    pub valid_sheets: Vec<SheetInfo>,
}
