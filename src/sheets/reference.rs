use crate::error::ParseError;
use crate::models::{Batch, Catalog, MerchantEntry, ReferenceData, Sheet, UNLIMITED_STOCK};
use crate::sheets::reader::read_table;
use crate::sheets::{MERCHANT_SHEET, PRODUCT_SHEET};
use bigdecimal::BigDecimal;
use std::path::Path;
use std::str::FromStr;

/// 加载参考数据 ("Product Details" + "merchant_data" 两张表均必需)
///
/// `state_filter` 非空时只保留该州的商户
pub fn load_reference(path: &Path, state_filter: Option<&str>) -> Result<ReferenceData, ParseError> {
    let products = read_table(path, Some(PRODUCT_SHEET), 0, 1)?;
    let merchants = read_table(path, Some(MERCHANT_SHEET), 0, 1)?;
    reference_from_sheets(products, merchants, state_filter)
}

/// 由已读取的两张表构建参考数据
pub fn reference_from_sheets(
    products: Sheet,
    merchants: Sheet,
    state_filter: Option<&str>,
) -> Result<ReferenceData, ParseError> {
    let catalog = build_catalog(&products)?;
    let merchant_sheet = filter_state(merchants, state_filter)?;
    let merchant_entries = build_merchants(&merchant_sheet)?;

    tracing::info!(
        "参考数据加载完成: {} 个商品, {} 个商户",
        catalog.len(),
        merchant_entries.len()
    );

    let mut reference = ReferenceData::new(catalog, merchant_entries);
    reference.product_sheet = products;
    reference.merchant_sheet = merchant_sheet;
    Ok(reference)
}

fn require(sheet: &Sheet, column: &str) -> Result<usize, ParseError> {
    sheet
        .column_index(column)
        .ok_or_else(|| ParseError::MissingColumn {
            sheet: sheet.name.clone(),
            column: column.to_string(),
        })
}

fn optional_cell<'a>(sheet: &'a Sheet, row: usize, col: Option<usize>) -> &'a str {
    col.map(|c| sheet.cell(row, c).trim()).unwrap_or("")
}

/// `123.0` -> `123` (Excel 数值型批次号)
pub fn clean_batch_id(raw: &str) -> String {
    let raw = raw.trim();
    match raw.split_once('.') {
        Some((head, tail))
            if !head.is_empty()
                && head.chars().all(|c| c.is_ascii_digit())
                && tail.chars().all(|c| c == '0') =>
        {
            head.to_string()
        }
        _ => raw.to_string(),
    }
}

/// 库存：空值视为不限量，无法解析视为 0
fn parse_stock(raw: &str, product: &str) -> i64 {
    if raw.is_empty() {
        return UNLIMITED_STOCK;
    }
    match raw.replace(',', "").parse::<f64>() {
        Ok(v) if v.is_finite() => v.floor().max(0.0) as i64,
        Ok(_) => UNLIMITED_STOCK,
        Err(_) => {
            tracing::warn!("商品 '{}' 库存值无法解析: '{}'", product, raw);
            0
        }
    }
}

fn build_catalog(sheet: &Sheet) -> Result<Catalog, ParseError> {
    let name_col = require(sheet, "product_name")?;
    let batch_col = require(sheet, "batch_id")?;
    let product_id_col = sheet.column_index("product_id");
    let stock_col = sheet.column_index("available_stock");
    let price_col = sheet.column_index("price");

    let mut builder = Catalog::builder();
    for row in 0..sheet.len() {
        let name = sheet.cell(row, name_col).trim();
        if name.is_empty() {
            continue;
        }
        let mut batch = Batch::new(
            clean_batch_id(sheet.cell(row, batch_col)),
            optional_cell(sheet, row, product_id_col),
            parse_stock(optional_cell(sheet, row, stock_col), name),
        );
        batch.price = BigDecimal::from_str(optional_cell(sheet, row, price_col)).ok();
        builder.add_batch(name, batch);
    }
    Ok(builder.build())
}

fn filter_state(sheet: Sheet, state: Option<&str>) -> Result<Sheet, ParseError> {
    let Some(state) = state.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(sheet);
    };
    let state_col = require(&sheet, "shop_state")?;
    let before = sheet.len();
    let Sheet { name, headers, rows } = sheet;
    let rows: Vec<Vec<String>> = rows
        .into_iter()
        .filter(|r| r.get(state_col).map(|s| s.trim()) == Some(state))
        .collect();
    tracing::info!("按州 '{}' 过滤商户: {} -> {}", state, before, rows.len());
    Ok(Sheet { name, headers, rows })
}

fn build_merchants(sheet: &Sheet) -> Result<Vec<MerchantEntry>, ParseError> {
    let shop_col = require(sheet, "shop_name")?;
    let merchant_col = require(sheet, "merchant_name")?;
    let id_col = sheet.column_index("merchant_id");
    let mobile_col = sheet.column_index("merchant_mobile_number");
    let state_col = sheet.column_index("shop_state");

    let mut merchants = Vec::with_capacity(sheet.len());
    for row in 0..sheet.len() {
        let shop = sheet.cell(row, shop_col).trim();
        let merchant = sheet.cell(row, merchant_col).trim();
        if shop.is_empty() && merchant.is_empty() {
            continue;
        }
        let mut entry = MerchantEntry::new(shop, merchant);
        entry.merchant_id = optional_cell(sheet, row, id_col).to_string();
        entry.mobile = optional_cell(sheet, row, mobile_col).to_string();
        entry.shop_state = optional_cell(sheet, row, state_col).to_string();
        merchants.push(entry);
    }
    Ok(merchants)
}
