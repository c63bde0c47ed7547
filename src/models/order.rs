use bigdecimal::{BigDecimal, Zero};
use chrono::NaiveDate;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// 订单明细行 (由品牌列映射生成，解析后不可变)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderLine {
    /// 源表中的数据行序号，用作决策关联键
    pub line_id: usize,
    pub order_id: String,
    pub dms_invoice: String,
    pub order_date: NaiveDate,
    pub due_date: Option<NaiveDate>,
    pub product_name: String,
    pub merchant_name: String,
    /// 有符号数量，负数为退货
    pub quantity: i64,
    pub net_sales: BigDecimal,
    /// 单价 = net_sales / quantity
    pub unit_price: BigDecimal,
    pub low_price_reason: String,
    pub buyer_branch_id: String,
    pub warehouse_name: String,
    /// 品牌特有字段 (税率列等)，保持源表列顺序
    pub brand_fields: IndexMap<String, String>,
}

impl OrderLine {
    pub fn new(
        line_id: usize,
        order_id: impl Into<String>,
        order_date: NaiveDate,
        product_name: impl Into<String>,
        merchant_name: impl Into<String>,
        quantity: i64,
        net_sales: BigDecimal,
    ) -> Self {
        let order_id = order_id.into();
        let unit_price = unit_price(&net_sales, quantity);
        Self {
            line_id,
            dms_invoice: order_id.clone(),
            order_id,
            order_date,
            due_date: None,
            product_name: product_name.into(),
            merchant_name: merchant_name.into(),
            quantity,
            net_sales,
            unit_price,
            low_price_reason: "low price".to_string(),
            buyer_branch_id: String::new(),
            warehouse_name: String::new(),
            brand_fields: IndexMap::new(),
        }
    }

    pub fn is_return(&self) -> bool {
        self.quantity < 0
    }

    /// 需求数量 (绝对值)
    pub fn requested(&self) -> i64 {
        self.quantity.saturating_abs()
    }
}

/// 单价，数量为 0 时为 0
pub fn unit_price(net_sales: &BigDecimal, quantity: i64) -> BigDecimal {
    if quantity == 0 {
        return BigDecimal::zero();
    }
    (net_sales / BigDecimal::from(quantity)).round(4)
}

/// 列映射后的订单集合及被丢弃行的计数
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderSheet {
    pub lines: Vec<OrderLine>,
    /// 数量为 0 的行 (跳过，不算错误)
    pub skipped_zero_quantity: usize,
    /// 缺少订单号/日期/商品/商户或数量无法解析的行
    pub dropped_incomplete: usize,
}

impl OrderSheet {
    pub fn from_lines(lines: Vec<OrderLine>) -> Self {
        Self {
            lines,
            skipped_zero_quantity: 0,
            dropped_incomplete: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn unit_price_divides_net_sales() {
        let price = unit_price(&BigDecimal::from_str("150").unwrap(), 4);
        assert_eq!(price, BigDecimal::from_str("37.5").unwrap());
    }

    #[test]
    fn unit_price_of_return_is_negative_over_negative() {
        let price = unit_price(&BigDecimal::from_str("-100").unwrap(), -4);
        assert_eq!(price, BigDecimal::from(25));
    }

    #[test]
    fn requested_saturates_at_extreme_quantity() {
        let line = OrderLine::new(
            0,
            "INV-1",
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            "Vim Bar",
            "Shop",
            i64::MIN,
            BigDecimal::zero(),
        );
        assert!(line.is_return());
        assert_eq!(line.requested(), i64::MAX);
    }

    #[test]
    fn zero_quantity_has_zero_price() {
        assert!(unit_price(&BigDecimal::from(10), 0).is_zero());
    }
}
