use crate::error::ParseError;
use crate::models::{OrderLine, OrderSheet, Sheet};
use bigdecimal::{BigDecimal, Zero};
use chrono::{Duration, NaiveDate};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// 品牌 (决定订单表的列布局)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Brand {
    #[serde(rename = "HUL", alias = "hul", alias = "Hul")]
    Hul,
    #[serde(alias = "britannia")]
    Britannia,
    #[serde(alias = "marico")]
    Marico,
    #[serde(alias = "unicharm")]
    Unicharm,
}

impl Brand {
    pub const ALL: [Brand; 4] = [Brand::Hul, Brand::Britannia, Brand::Marico, Brand::Unicharm];

    pub fn name(&self) -> &'static str {
        match self {
            Brand::Hul => "HUL",
            Brand::Britannia => "Britannia",
            Brand::Marico => "Marico",
            Brand::Unicharm => "Unicharm",
        }
    }

    /// (表头起始行, 表头行数)
    pub fn header_layout(&self) -> (usize, usize) {
        match self {
            Brand::Unicharm => (6, 3),
            _ => (0, 1),
        }
    }

    /// 到期日：Unicharm 固定为订单日 + 10 天，其余品牌读取到期日列
    pub fn fixed_due_days(&self) -> Option<i64> {
        match self {
            Brand::Unicharm => Some(10),
            _ => None,
        }
    }

    /// 各字段的默认表头
    pub fn default_header(&self, field: OrderField) -> &'static str {
        use OrderField::*;
        match (self, field) {
            (Brand::Hul, OrderId | DmsInvoice) => "Bill Number",
            (Brand::Hul, OrderDate) => "Bill Date",
            (Brand::Hul, ProductName) => "Product Description",
            (Brand::Hul, MerchantName) => "Party",
            (Brand::Hul, Quantity) => "Units",
            (Brand::Hul, SellingPrice) => "Net Sales",

            (Brand::Britannia, OrderId | DmsInvoice) => "Invoice No",
            (Brand::Britannia, OrderDate) => "Invoice Date",
            (Brand::Britannia, ProductName) => "Material No Desc",
            (Brand::Britannia, MerchantName) => "Sold To Party Name",
            (Brand::Britannia, Quantity) => "Quantity",
            (Brand::Britannia, SellingPrice) => "Net Amount",

            (Brand::Marico, OrderId | DmsInvoice) => "Invoice Number",
            (Brand::Marico, OrderDate) => "Invoice Date",
            (Brand::Marico, ProductName) => "Item Description",
            (Brand::Marico, MerchantName) => "Retailer Name",
            (Brand::Marico, Quantity) => "Item Qty",
            (Brand::Marico, SellingPrice) => "Value Incl of Tax",

            (Brand::Unicharm, OrderId | DmsInvoice) => "Invoice Number",
            (Brand::Unicharm, OrderDate) => "Invoice Date",
            (Brand::Unicharm, ProductName) => "Product Name",
            (Brand::Unicharm, MerchantName) => "Retailer Name",
            (Brand::Unicharm, Quantity) => "Total Quantity",
            (Brand::Unicharm, SellingPrice) => "Product Level NetAmount",

            (_, LowPriceReason) => "Low Price Reason",
            (_, BuyerBranchId) => "Buyer Branch Id",
            (_, WarehouseName) => "Warehouse Name",
            (_, DueDate) => "Due Date",
        }
    }
}

impl fmt::Display for Brand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Brand {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Brand::ALL
            .into_iter()
            .find(|b| b.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown brand '{}'", s))
    }
}

/// 订单行字段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderField {
    OrderId,
    DmsInvoice,
    OrderDate,
    ProductName,
    MerchantName,
    Quantity,
    SellingPrice,
    LowPriceReason,
    BuyerBranchId,
    WarehouseName,
    DueDate,
}

impl OrderField {
    pub const ALL: [OrderField; 11] = [
        OrderField::OrderId,
        OrderField::DmsInvoice,
        OrderField::OrderDate,
        OrderField::ProductName,
        OrderField::MerchantName,
        OrderField::Quantity,
        OrderField::SellingPrice,
        OrderField::LowPriceReason,
        OrderField::BuyerBranchId,
        OrderField::WarehouseName,
        OrderField::DueDate,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            OrderField::OrderId => "order_id",
            OrderField::DmsInvoice => "dms_invoice",
            OrderField::OrderDate => "order_date",
            OrderField::ProductName => "product_name",
            OrderField::MerchantName => "merchant_name",
            OrderField::Quantity => "quantity",
            OrderField::SellingPrice => "selling_price",
            OrderField::LowPriceReason => "low_price_reason",
            OrderField::BuyerBranchId => "buyer_branch_id",
            OrderField::WarehouseName => "warehouse_name",
            OrderField::DueDate => "due_date",
        }
    }

    pub fn is_required(&self) -> bool {
        !matches!(
            self,
            OrderField::LowPriceReason
                | OrderField::BuyerBranchId
                | OrderField::WarehouseName
                | OrderField::DueDate
        )
    }
}

/// 调用方显式指定的列：字段键 (如 `order_id`) -> 表头
pub type ColumnOverrides = HashMap<String, String>;

/// 品牌参数：对应列缺失时的默认值
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrandParams {
    pub warehouse_name: String,
    pub low_price_reason: String,
    pub buyer_branch_id: String,
}

impl Default for BrandParams {
    fn default() -> Self {
        Self {
            warehouse_name: String::new(),
            low_price_reason: "low price".to_string(),
            buyer_branch_id: String::new(),
        }
    }
}

/// 按表头定位列：先精确匹配，再忽略大小写的双向包含
pub fn find_column(headers: &[String], expected: &str) -> Option<usize> {
    let expected = expected.trim();
    if expected.is_empty() {
        return None;
    }
    if let Some(idx) = headers.iter().position(|h| h.trim() == expected) {
        return Some(idx);
    }
    let wanted = expected.to_lowercase();
    headers.iter().position(|h| {
        let h = h.trim().to_lowercase();
        !h.is_empty() && (h.contains(&wanted) || wanted.contains(&h))
    })
}

/// 税率列 (含 gst/tax 且带 % 或 rate)
fn is_tax_rate_header(header: &str) -> bool {
    let lower = header.to_lowercase();
    (lower.contains("gst") || lower.contains("tax"))
        && (lower.contains('%') || lower.contains("rate"))
}

/// 日期解析：日在前优先，其次 ISO，最后月在前
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    const FORMATS: [&str; 10] = [
        "%d/%m/%Y", "%d-%m-%Y", "%d.%m.%Y", "%d/%m/%y", "%d-%b-%Y", "%d %b %Y", "%Y-%m-%d",
        "%Y/%m/%d", "%m/%d/%Y", "%m-%d-%Y",
    ];
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    let try_all =
        |s: &str| FORMATS.iter().find_map(|f| NaiveDate::parse_from_str(s, f).ok());
    try_all(raw).or_else(|| {
        // 带时间部分："2024-01-05 00:00:00" / "2024-01-05T00:00:00"
        raw.split(|c| c == ' ' || c == 'T')
            .next()
            .filter(|head| head.len() < raw.len())
            .and_then(try_all)
    })
}

/// 数量上限，超出视为无法解析
const MAX_QUANTITY: f64 = (i64::MAX / 2) as f64;

fn parse_quantity(raw: &str) -> Option<i64> {
    let v = raw.trim().replace(',', "").parse::<f64>().ok()?;
    (v.is_finite() && v.abs() <= MAX_QUANTITY).then(|| v.round() as i64)
}

fn parse_amount(raw: &str) -> BigDecimal {
    BigDecimal::from_str(raw.trim().replace(',', "").as_str()).unwrap_or_else(|_| BigDecimal::zero())
}

/// 解析后的列位置
struct ColumnMap {
    columns: HashMap<OrderField, usize>,
    tax_columns: Vec<usize>,
}

impl ColumnMap {
    fn resolve(sheet: &Sheet, brand: Brand, overrides: &ColumnOverrides) -> Result<Self, ParseError> {
        let mut columns = HashMap::new();
        for field in OrderField::ALL {
            let expected = overrides
                .get(field.key())
                .map(|s| s.as_str())
                .unwrap_or_else(|| brand.default_header(field));
            match find_column(&sheet.headers, expected) {
                Some(idx) => {
                    columns.insert(field, idx);
                }
                None if field.is_required() => {
                    return Err(ParseError::MissingColumn {
                        sheet: sheet.name.clone(),
                        column: expected.to_string(),
                    });
                }
                None => {}
            }
        }

        let tax_columns = sheet
            .headers
            .iter()
            .enumerate()
            .filter(|(idx, h)| is_tax_rate_header(h) && !columns.values().any(|c| c == idx))
            .map(|(idx, _)| idx)
            .collect();

        Ok(Self {
            columns,
            tax_columns,
        })
    }

    fn get<'a>(&self, sheet: &'a Sheet, row: usize, field: OrderField) -> &'a str {
        self.columns
            .get(&field)
            .map(|&c| sheet.cell(row, c).trim())
            .unwrap_or("")
    }
}

/// 将品牌订单表映射为标准订单行
///
/// 缺少必需列时整体失败；单行缺字段或数量无法解析则丢弃并计数，数量为 0 的行跳过并计数
pub fn map_orders(
    sheet: &Sheet,
    brand: Brand,
    params: &BrandParams,
    overrides: &ColumnOverrides,
) -> Result<OrderSheet, ParseError> {
    let map = ColumnMap::resolve(sheet, brand, overrides)?;
    let mut out = OrderSheet::default();

    for row in 0..sheet.len() {
        let order_id = map.get(sheet, row, OrderField::OrderId);
        let product = map.get(sheet, row, OrderField::ProductName);
        let merchant = map.get(sheet, row, OrderField::MerchantName);
        let order_date = parse_date(map.get(sheet, row, OrderField::OrderDate));
        let quantity = parse_quantity(map.get(sheet, row, OrderField::Quantity));

        let (Some(order_date), Some(quantity)) = (order_date, quantity) else {
            out.dropped_incomplete += 1;
            continue;
        };
        if order_id.is_empty() || product.is_empty() || merchant.is_empty() {
            out.dropped_incomplete += 1;
            continue;
        }
        if quantity == 0 {
            out.skipped_zero_quantity += 1;
            continue;
        }

        let net_sales = parse_amount(map.get(sheet, row, OrderField::SellingPrice));
        let mut line = OrderLine::new(row, order_id, order_date, product, merchant, quantity, net_sales);

        let dms_invoice = map.get(sheet, row, OrderField::DmsInvoice);
        if !dms_invoice.is_empty() {
            line.dms_invoice = dms_invoice.to_string();
        }
        line.low_price_reason = non_empty_or(
            map.get(sheet, row, OrderField::LowPriceReason),
            &params.low_price_reason,
        );
        line.buyer_branch_id = non_empty_or(
            map.get(sheet, row, OrderField::BuyerBranchId),
            &params.buyer_branch_id,
        );
        line.warehouse_name = non_empty_or(
            map.get(sheet, row, OrderField::WarehouseName),
            &params.warehouse_name,
        );
        line.due_date = match brand.fixed_due_days() {
            Some(days) => order_date.checked_add_signed(Duration::days(days)),
            None => parse_date(map.get(sheet, row, OrderField::DueDate)),
        };

        let mut brand_fields = IndexMap::new();
        for &col in &map.tax_columns {
            brand_fields.insert(
                sheet.headers[col].trim().to_string(),
                sheet.cell(row, col).trim().to_string(),
            );
        }
        line.brand_fields = brand_fields;

        out.lines.push(line);
    }

    tracing::info!(
        "[{}] 订单映射完成: {} 行有效, 丢弃 {} 行不完整, 跳过 {} 行零数量",
        brand,
        out.lines.len(),
        out.dropped_incomplete,
        out.skipped_zero_quantity
    );
    Ok(out)
}

fn non_empty_or(value: &str, fallback: &str) -> String {
    if value.is_empty() {
        fallback.trim().to_string()
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hul_sheet(rows: &[&[&str]]) -> Sheet {
        let headers = [
            "Bill Number",
            "Bill Date",
            "Product Description",
            "Party",
            "Units",
            "Net Sales",
            "CGST %",
            "Value Incl of Tax",
        ];
        let mut sheet = Sheet::new("orders", headers.iter().map(|h| h.to_string()).collect());
        for r in rows {
            sheet.push_row(r.iter().map(|c| c.to_string()).collect());
        }
        sheet
    }

    #[test]
    fn maps_hul_rows_and_counts_skips() {
        let sheet = hul_sheet(&[
            &["B1", "05/03/2024", "Vim Bar", "Sri Ram Stores", "10", "250", "9", "270"],
            &["B2", "06/03/2024", "Vim Bar", "Sri Ram Stores", "0", "0", "9", "0"],
            &["B3", "not a date", "Vim Bar", "Sri Ram Stores", "4", "100", "9", "110"],
            &["B4", "07/03/2024", "", "Sri Ram Stores", "4", "100", "9", "110"],
            &["B5", "08/03/2024", "Lux", "Lakshmi", "-2", "-40", "9", "-44"],
        ]);
        let orders =
            map_orders(&sheet, Brand::Hul, &BrandParams::default(), &ColumnOverrides::new())
                .unwrap();

        assert_eq!(orders.lines.len(), 2);
        assert_eq!(orders.skipped_zero_quantity, 1);
        assert_eq!(orders.dropped_incomplete, 2);

        let first = &orders.lines[0];
        assert_eq!(first.order_date, NaiveDate::from_ymd_opt(2024, 3, 5).unwrap());
        assert_eq!(first.unit_price, BigDecimal::from(25));
        assert_eq!(first.low_price_reason, "low price");
        assert_eq!(first.brand_fields.get("CGST %").map(|s| s.as_str()), Some("9"));
        assert!(!first.brand_fields.contains_key("Value Incl of Tax"));
        assert!(orders.lines[1].is_return());
    }

    #[test]
    fn out_of_range_quantity_is_dropped() {
        let sheet = hul_sheet(&[
            &["B1", "05/03/2024", "Vim Bar", "Sri Ram Stores", "-1e30", "-40", "9", "-44"],
            &["B2", "05/03/2024", "Vim Bar", "Sri Ram Stores", "1e19", "40", "9", "44"],
            &["B3", "05/03/2024", "Vim Bar", "Sri Ram Stores", "1,200", "40", "9", "44"],
        ]);
        let orders =
            map_orders(&sheet, Brand::Hul, &BrandParams::default(), &ColumnOverrides::new())
                .unwrap();

        assert_eq!(orders.dropped_incomplete, 2);
        assert_eq!(orders.lines.len(), 1);
        assert_eq!(orders.lines[0].quantity, 1200);
        assert_eq!(parse_quantity("NaN"), None);
        assert_eq!(parse_quantity("-3.6"), Some(-4));
    }

    #[test]
    fn missing_required_column_is_fatal() {
        let sheet = Sheet::new("orders", vec!["Bill Number".into(), "Bill Date".into()]);
        let err = map_orders(&sheet, Brand::Hul, &BrandParams::default(), &ColumnOverrides::new())
            .unwrap_err();
        assert!(matches!(err, ParseError::MissingColumn { .. }));
    }

    #[test]
    fn overrides_and_containment_resolve_columns() {
        let headers: Vec<String> = ["Inv No.", "Invoice Date", "SKU Name", "Outlet", "Qty", "Amount"]
            .iter()
            .map(|h| h.to_string())
            .collect();
        let mut sheet = Sheet::new("orders", headers);
        sheet.push_row(
            ["X1", "2024-02-01", "Tide 1kg", "Outlet A", "3", "90"]
                .iter()
                .map(|c| c.to_string())
                .collect(),
        );
        let overrides: ColumnOverrides = [
            ("order_id", "Inv No."),
            ("dms_invoice", "Inv No."),
            ("product_name", "SKU Name"),
            ("merchant_name", "Outlet"),
            ("quantity", "Qty"),
            ("selling_price", "Amount"),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let params = BrandParams {
            warehouse_name: "Main WH".into(),
            ..BrandParams::default()
        };
        let orders = map_orders(&sheet, Brand::Unicharm, &params, &overrides).unwrap();
        let line = &orders.lines[0];
        assert_eq!(line.order_id, "X1");
        assert_eq!(line.warehouse_name, "Main WH");
        assert_eq!(line.due_date, NaiveDate::from_ymd_opt(2024, 2, 11));
    }

    #[test]
    fn dates_prefer_day_first() {
        assert_eq!(parse_date("03/04/2024"), NaiveDate::from_ymd_opt(2024, 4, 3));
        assert_eq!(parse_date("2024-04-03 00:00:00"), NaiveDate::from_ymd_opt(2024, 4, 3));
        assert_eq!(parse_date("12/31/2024"), NaiveDate::from_ymd_opt(2024, 12, 31));
        assert_eq!(parse_date(""), None);
    }

    #[test]
    fn find_column_ignores_empty_headers() {
        let headers = vec![String::new(), "Retailer Name".to_string()];
        assert_eq!(find_column(&headers, "retailer"), Some(1));
        assert_eq!(find_column(&headers, "Invoice"), None);
    }

    #[test]
    fn brand_names_parse() {
        assert_eq!("hul".parse::<Brand>(), Ok(Brand::Hul));
        assert_eq!("Unicharm".parse::<Brand>().map(|b| b.header_layout()), Ok((6, 3)));
        assert!("acme".parse::<Brand>().is_err());
    }
}
