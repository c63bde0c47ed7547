use crate::config::ReportConfig;
use crate::models::{
    Category, LineOutcome, MatchKind, MerchantEntry, OrderSheet, ReasonCount, ReferenceData,
    RunSummary, Sheet, SheetInfo,
};
use bigdecimal::{BigDecimal, Zero};
use chrono::NaiveDate;
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};

/// 前四张表共用的固定列顺序 (与品牌无关)
pub const ORDER_COLUMNS: [&str; 19] = [
    "order_id",
    "order_date",
    "warehouse_name",
    "product_id",
    "batch_id",
    "buyer_mobile",
    "buyer_branch_id",
    "quantity",
    "selling_price",
    "due_date",
    "dms_invoice",
    "low_price_reason",
    "product_name",
    "matched_product_name",
    "product_match_score",
    "merchant_name",
    "matched_shop_name",
    "merchant_match_score",
    "brand_fields",
];

pub const RETURN_COLUMNS: [&str; 12] = [
    "order_id",
    "product_id",
    "batch_id",
    "product_name",
    "price",
    "return_qty",
    "return_amount",
    "reason",
    "error_message",
    "sales_return_date",
    "note",
    "remark",
];

/// 输出工作簿
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Workbook {
    pub sheets: Vec<Sheet>,
}

impl Workbook {
    pub fn sheet(&self, name: &str) -> Option<&Sheet> {
        self.sheets.iter().find(|s| s.name == name)
    }
}

/// 一次运行的完整输出
#[derive(Debug, Clone)]
pub struct RunReport {
    pub outcomes: Vec<LineOutcome>,
    pub workbook: Workbook,
    pub summary: RunSummary,
}

impl RunReport {
    pub fn outcome(&self, line_id: usize) -> Option<&LineOutcome> {
        self.outcomes.iter().find(|o| o.line.line_id == line_id)
    }
}

/// 错误原因：商品问题、商户问题、未确认的商品得分、商户得分
pub fn error_message(outcome: &LineOutcome) -> String {
    let mut parts: Vec<String> = Vec::new();
    for issue in outcome.issues.iter().filter(|i| i.is_product_issue()) {
        parts.push(issue.to_string());
    }
    for issue in outcome.issues.iter().filter(|i| !i.is_product_issue()) {
        parts.push(issue.to_string());
    }

    let product = &outcome.matches.product;
    if product.score < 100 && !outcome.confirmed {
        parts.push(format!("Product match {}%", product.score));
    }
    let merchant = &outcome.matches.merchant.result;
    if merchant.score < 100 {
        parts.push(format!("Merchant match {}%", merchant.score));
    }
    if let Some(note) = &outcome.cohesion_note {
        parts.push(note.clone());
    }
    parts.join(", ")
}

/// 部分匹配原因
pub fn partial_reason(outcome: &LineOutcome) -> String {
    let mut parts: Vec<String> = Vec::new();
    let product = &outcome.matches.product;
    if outcome.confirmed {
        parts.push(format!("User confirmed match ({}%)", product.score));
    } else if product.score < 100 {
        parts.push(format!("Product match {}%", product.score));
    }
    if let Some(note) = &outcome.cohesion_note {
        parts.push(note.clone());
    }
    if parts.is_empty() {
        "Partial match".to_string()
    } else {
        parts.join(", ")
    }
}

fn fmt_date(date: Option<NaiveDate>) -> String {
    date.map(|d| d.format("%d/%m/%Y").to_string())
        .unwrap_or_default()
}

fn fmt_money(value: &BigDecimal) -> String {
    value.round(2).to_string()
}

fn top_reasons(reasons: impl Iterator<Item = String>, n: usize) -> Vec<ReasonCount> {
    let mut counter: IndexMap<String, usize> = IndexMap::new();
    for reason in reasons.filter(|r| !r.is_empty()) {
        *counter.entry(reason).or_insert(0) += 1;
    }
    let mut counts: Vec<ReasonCount> = counter
        .into_iter()
        .map(|(reason, count)| ReasonCount { reason, count })
        .collect();
    // 稳定排序：同频次保持首次出现顺序
    counts.sort_by(|a, b| b.count.cmp(&a.count));
    counts.truncate(n);
    counts
}

/// 报表构建器
pub struct ReportBuilder<'a> {
    config: &'a ReportConfig,
}

impl<'a> ReportBuilder<'a> {
    pub fn new(config: &'a ReportConfig) -> Self {
        Self { config }
    }

    pub fn build(
        &self,
        outcomes: Vec<LineOutcome>,
        reference: &ReferenceData,
        orders: &OrderSheet,
    ) -> RunReport {
        let merchants = &reference.merchants;

        let mut valid_rows: Vec<(String, Vec<String>)> = Vec::new();
        let mut partial = order_sheet(Category::Partial.sheet_name(), "partial_match_reason");
        let mut error = order_sheet(Category::Error.sheet_name(), "error_message");
        let mut returns = Sheet::new(
            Category::Return.sheet_name(),
            RETURN_COLUMNS.iter().map(|c| c.to_string()).collect(),
        );

        for o in &outcomes {
            match o.sheet {
                Category::Valid => {
                    for row in order_rows(o, merchants) {
                        valid_rows.push((o.line.order_id.clone(), row));
                    }
                }
                Category::Partial => {
                    let reason = partial_reason(o);
                    for mut row in order_rows(o, merchants) {
                        row.push(reason.clone());
                        partial.push_row(row);
                    }
                }
                Category::Error => {
                    let message = error_message(o);
                    for mut row in order_rows(o, merchants) {
                        row.push(message.clone());
                        error.push_row(row);
                    }
                }
                Category::Return => returns.push_row(return_row(o)),
            }
        }

        let (valid_sheets, valid_info) = self.split_valid(valid_rows);

        let mut sheets = valid_sheets;
        sheets.push(partial);
        sheets.push(error);
        sheets.push(returns);
        sheets.push(reference.product_sheet.clone());
        sheets.push(reference.merchant_sheet.clone());

        let summary = self.summarize(&outcomes, orders, valid_info);
        tracing::info!(
            "报表完成: 有效 {} 行, 部分匹配 {} 行, 错误 {} 行, 退货 {} 行",
            summary.valid_lines,
            summary.partial_lines,
            summary.error_lines,
            summary.return_lines
        );

        RunReport {
            outcomes,
            workbook: Workbook { sheets },
            summary,
        }
    }

    /// 有效订单超过上限时按订单拆表，同一订单不跨表
    fn split_valid(&self, rows: Vec<(String, Vec<String>)>) -> (Vec<Sheet>, Vec<SheetInfo>) {
        let headers: Vec<String> = ORDER_COLUMNS.iter().map(|c| c.to_string()).collect();
        let base = Category::Valid.sheet_name();

        let mut by_order: IndexMap<String, Vec<Vec<String>>> = IndexMap::new();
        for (order_id, row) in rows {
            by_order.entry(order_id).or_default().push(row);
        }

        let limit = self.config.max_orders_per_sheet.max(1);
        if by_order.len() <= limit {
            let mut sheet = Sheet::new(base, headers);
            for row in by_order.values().flatten() {
                sheet.push_row(row.clone());
            }
            let info = SheetInfo {
                sheet_name: base.to_string(),
                order_count: by_order.len(),
                row_count: sheet.len(),
            };
            return (vec![sheet], vec![info]);
        }

        let orders: Vec<(String, Vec<Vec<String>>)> = by_order.into_iter().collect();
        let mut sheets = Vec::new();
        let mut infos = Vec::new();
        for (idx, chunk) in orders.chunks(limit).enumerate() {
            let name = format!("{} {}", base, idx + 1);
            let mut sheet = Sheet::new(name.clone(), headers.clone());
            for (_, rows) in chunk {
                for row in rows {
                    sheet.push_row(row.clone());
                }
            }
            infos.push(SheetInfo {
                sheet_name: name,
                order_count: chunk.len(),
                row_count: sheet.len(),
            });
            sheets.push(sheet);
        }
        tracing::info!("有效订单拆分为 {} 张表", sheets.len());
        (sheets, infos)
    }

    fn summarize(
        &self,
        outcomes: &[LineOutcome],
        orders: &OrderSheet,
        valid_sheets: Vec<SheetInfo>,
    ) -> RunSummary {
        let count = |c: Category| outcomes.iter().filter(|o| o.category == c).count();
        let orders_in = |c: Category| {
            outcomes
                .iter()
                .filter(|o| o.sheet == c)
                .map(|o| o.line.order_id.as_str())
                .collect::<IndexSet<_>>()
                .len()
        };
        let multi: Vec<&LineOutcome> = outcomes
            .iter()
            .filter(|o| o.is_multi_batch() && o.is_fully_allocated())
            .collect();

        RunSummary {
            total_lines: outcomes.len(),
            valid_lines: count(Category::Valid),
            partial_lines: count(Category::Partial),
            error_lines: count(Category::Error),
            return_lines: count(Category::Return),
            valid_orders: orders_in(Category::Valid),
            partial_orders: orders_in(Category::Partial),
            error_orders: orders_in(Category::Error),
            multi_batch_lines: multi.len(),
            multi_batch_rows: multi.iter().map(|o| o.allocations.len()).sum(),
            skipped_zero_quantity: orders.skipped_zero_quantity,
            dropped_incomplete: orders.dropped_incomplete,
            top_error_reasons: top_reasons(
                outcomes
                    .iter()
                    .filter(|o| o.sheet == Category::Error)
                    .map(error_message),
                self.config.top_reasons,
            ),
            top_partial_reasons: top_reasons(
                outcomes
                    .iter()
                    .filter(|o| o.sheet == Category::Partial)
                    .map(partial_reason),
                self.config.top_reasons,
            ),
            valid_sheets,
        }
    }
}

fn order_sheet(name: &str, reason_column: &str) -> Sheet {
    let mut headers: Vec<String> = ORDER_COLUMNS.iter().map(|c| c.to_string()).collect();
    headers.push(reason_column.to_string());
    Sheet::new(name, headers)
}

/// 订单行：每条分配记录一行；无分配时输出一行原始数量
fn order_rows(o: &LineOutcome, merchants: &[MerchantEntry]) -> Vec<Vec<String>> {
    let line = &o.line;
    let product = &o.matches.product;
    let merchant = &o.matches.merchant.result;
    let mobile = merchant
        .entry
        .and_then(|idx| merchants.get(idx))
        .map(|m| m.mobile.clone())
        .unwrap_or_default();
    let brand_fields = line
        .brand_fields
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("; ");
    let product_score = if product.kind == MatchKind::None && product.score == 0 {
        String::new()
    } else {
        product.score.to_string()
    };

    let row = |product_id: &str, batch_id: &str, qty: i64, price: &BigDecimal| -> Vec<String> {
        vec![
            line.order_id.clone(),
            fmt_date(Some(line.order_date)),
            line.warehouse_name.clone(),
            product_id.to_string(),
            batch_id.to_string(),
            mobile.clone(),
            line.buyer_branch_id.clone(),
            qty.to_string(),
            fmt_money(price),
            fmt_date(line.due_date),
            line.dms_invoice.clone(),
            line.low_price_reason.clone(),
            line.product_name.clone(),
            product.name.clone().unwrap_or_default(),
            product_score.clone(),
            line.merchant_name.clone(),
            merchant.name.clone().unwrap_or_default(),
            merchant.score.to_string(),
            brand_fields.clone(),
        ]
    };

    if o.allocations.is_empty() {
        return vec![row("", "", line.quantity, &line.unit_price)];
    }
    o.allocations
        .iter()
        .map(|a| row(&a.product_id, &a.batch_id, a.allocated_qty, &a.allocated_price))
        .collect()
}

fn return_row(o: &LineOutcome) -> Vec<String> {
    let line = &o.line;
    let qty = line.requested();
    let amount = line.net_sales.abs();
    let price = if qty == 0 {
        BigDecimal::zero()
    } else {
        &amount / BigDecimal::from(qty)
    };
    let (batch_id, product_id) = o.return_batch.clone().unwrap_or_default();
    let issues = o
        .issues
        .iter()
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join(", ");

    vec![
        line.order_id.clone(),
        product_id,
        batch_id,
        o.matches
            .product
            .name
            .clone()
            .unwrap_or_else(|| line.product_name.clone()),
        fmt_money(&price),
        qty.to_string(),
        fmt_money(&amount),
        line.low_price_reason.clone(),
        issues,
        fmt_date(Some(line.order_date)),
        String::new(),
        String::new(),
    ]
}
