use crate::models::Sheet;
use crate::service::normalizer::normalize;
use bigdecimal::BigDecimal;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 目录条目下标 (按参考表中首次出现的顺序)
pub type EntryId = usize;

/// 参考表未填写库存时视为不限量
pub const UNLIMITED_STOCK: i64 = i64::MAX;

/// 库存批次
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Batch {
    pub batch_id: String,
    pub product_id: String,
    pub available_stock: i64,
    pub price: Option<BigDecimal>,
}

impl Batch {
    pub fn new(batch_id: impl Into<String>, product_id: impl Into<String>, available_stock: i64) -> Self {
        Self {
            batch_id: batch_id.into(),
            product_id: product_id.into(),
            available_stock,
            price: None,
        }
    }
}

/// 商品目录条目：同名的所有批次归为一条
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub product_id: String,
    pub canonical_name: String,
    pub normalized_name: String,
    /// 若为变体，指向主商品
    pub is_variant_of: Option<EntryId>,
    pub batches: Vec<Batch>,
}

impl CatalogEntry {
    pub fn total_stock(&self) -> i64 {
        self.batches
            .iter()
            .fold(0i64, |acc, b| acc.saturating_add(b.available_stock.max(0)))
    }
}

/// 商品目录 (只读)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Catalog {
    entries: Vec<CatalogEntry>,
    /// 共享 product_id 的名称组，组内按名称字母序，首个为主商品
    variant_groups: Vec<Vec<EntryId>>,
}

impl Catalog {
    pub fn builder() -> CatalogBuilder {
        CatalogBuilder::default()
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn get(&self, id: EntryId) -> Option<&CatalogEntry> {
        self.entries.get(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 按规范化名称查找
    pub fn find(&self, name: &str) -> Option<EntryId> {
        let key = normalize(name);
        self.entries.iter().position(|e| e.normalized_name == key)
    }

    pub fn name_of(&self, id: EntryId) -> &str {
        self.entries
            .get(id)
            .map(|e| e.canonical_name.as_str())
            .unwrap_or("")
    }

    /// 变体候选
    ///
    /// 主商品 -> 其全部变体；变体 -> 主商品 + 其余兄弟变体
    pub fn variant_candidates(&self, id: EntryId) -> Vec<EntryId> {
        if let Some(group) = self.variant_groups.iter().find(|g| g.first() == Some(&id)) {
            return group[1..].to_vec();
        }
        if let Some(group) = self.variant_groups.iter().find(|g| g.contains(&id)) {
            return group.iter().copied().filter(|&other| other != id).collect();
        }
        Vec::new()
    }
}

/// 目录构建器：逐批次追加，`build` 时计算变体关系
#[derive(Debug, Default)]
pub struct CatalogBuilder {
    entries: Vec<CatalogEntry>,
    index: HashMap<String, EntryId>,
}

impl CatalogBuilder {
    pub fn add_batch(&mut self, product_name: &str, batch: Batch) -> &mut Self {
        // 按去空白后的原名分组，大小写不同视为不同商品
        let name = product_name.trim();
        let id = match self.index.get(name) {
            Some(&id) => id,
            None => {
                let id = self.entries.len();
                self.entries.push(CatalogEntry {
                    product_id: batch.product_id.clone(),
                    canonical_name: name.to_string(),
                    normalized_name: normalize(name),
                    is_variant_of: None,
                    batches: Vec::new(),
                });
                self.index.insert(name.to_string(), id);
                id
            }
        };
        self.entries[id].batches.push(batch);
        self
    }

    /// 链式调用便捷版本
    pub fn with_batch(mut self, product_name: &str, batch: Batch) -> Self {
        self.add_batch(product_name, batch);
        self
    }

    pub fn build(mut self) -> Catalog {
        // product_id -> 名称集合 (去重，保持首次出现顺序)
        let mut by_product_id: IndexMap<String, Vec<EntryId>> = IndexMap::new();
        for (id, entry) in self.entries.iter().enumerate() {
            for batch in &entry.batches {
                let pid = batch.product_id.trim();
                if pid.is_empty() {
                    continue;
                }
                let ids = by_product_id.entry(pid.to_string()).or_default();
                if !ids.contains(&id) {
                    ids.push(id);
                }
            }
        }

        let mut variant_groups = Vec::new();
        for (_, mut ids) in by_product_id {
            if ids.len() < 2 {
                continue;
            }
            ids.sort_by(|a, b| {
                self.entries[*a]
                    .canonical_name
                    .cmp(&self.entries[*b].canonical_name)
            });
            let main = ids[0];
            for &variant in &ids[1..] {
                if self.entries[variant].is_variant_of.is_none() {
                    self.entries[variant].is_variant_of = Some(main);
                }
            }
            variant_groups.push(ids);
        }

        Catalog {
            entries: self.entries,
            variant_groups,
        }
    }
}

/// 商户目录条目
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MerchantEntry {
    pub shop_name: String,
    pub merchant_name: String,
    pub merchant_id: String,
    pub mobile: String,
    pub shop_state: String,
}

impl MerchantEntry {
    pub fn new(shop_name: impl Into<String>, merchant_name: impl Into<String>) -> Self {
        Self {
            shop_name: shop_name.into(),
            merchant_name: merchant_name.into(),
            ..Default::default()
        }
    }
}

/// 参考数据：商品目录 + 商户目录 + 原始表 (用于输出回显)
#[derive(Debug, Clone, Default)]
pub struct ReferenceData {
    pub catalog: Catalog,
    pub merchants: Vec<MerchantEntry>,
    pub product_sheet: Sheet,
    pub merchant_sheet: Sheet,
}

impl ReferenceData {
    pub fn new(catalog: Catalog, merchants: Vec<MerchantEntry>) -> Self {
        Self {
            catalog,
            merchants,
            product_sheet: Sheet::new(crate::sheets::PRODUCT_SHEET, Vec::new()),
            merchant_sheet: Sheet::new(crate::sheets::MERCHANT_SHEET, Vec::new()),
        }
    }
}
