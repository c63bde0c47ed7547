pub mod mapping;
pub mod reader;
pub mod reference;
pub mod writer;

/// 参考表：商品目录
pub const PRODUCT_SHEET: &str = "Product Details";
/// 参考表：商户目录
pub const MERCHANT_SHEET: &str = "merchant_data";

pub use mapping::{map_orders, Brand, BrandParams, ColumnOverrides, OrderField};
pub use reader::read_table;
pub use reference::{load_reference, reference_from_sheets};
pub use writer::{write_workbook, SUMMARY_FILE};

use crate::error::ParseError;
use crate::models::OrderSheet;
use std::path::Path;

/// 读取并映射品牌订单文件 (取第一张工作表)
pub fn load_orders(
    path: &Path,
    brand: Brand,
    params: &BrandParams,
    overrides: &ColumnOverrides,
) -> Result<OrderSheet, ParseError> {
    let (header_row, header_depth) = brand.header_layout();
    let sheet = read_table(path, None, header_row, header_depth)?;
    tracing::info!("[{}] 读取订单表 '{}': {} 行", brand, sheet.name, sheet.len());
    map_orders(&sheet, brand, params, overrides)
}
