use crate::models::{Catalog, EntryId};
use serde::{Deserialize, Serialize};

/// 批次状态 - 追踪每个批次的剩余可用库存
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchState {
    pub entry: EntryId,
    pub batch_id: String,
    pub product_id: String,
    pub original_stock: i64,
    pub available_stock: i64, // 剩余可用库存
    /// 在参考表中的出现顺序，用于同库存时的稳定排序
    pub seq: usize,
}

/// 批次定位：(目录条目, 条目内下标)
pub type BatchRef = (EntryId, usize);

/// 库存索引：每个商品一组批次，按可用库存降序
///
/// 一次运行独占一份，分配只在本索引内扣减，不回写参考数据
#[derive(Debug, Clone, Default)]
pub struct InventoryIndex {
    batches: Vec<Vec<BatchState>>,
}

impl InventoryIndex {
    /// 从目录构建，每个商品内批次按库存降序 (同库存保持参考表顺序)
    pub fn from_catalog(catalog: &Catalog) -> Self {
        let mut seq = 0usize;
        let batches = catalog
            .entries()
            .iter()
            .enumerate()
            .map(|(entry, e)| {
                let mut states: Vec<BatchState> = e
                    .batches
                    .iter()
                    .map(|b| {
                        let state = BatchState {
                            entry,
                            batch_id: b.batch_id.clone(),
                            product_id: b.product_id.clone(),
                            original_stock: b.available_stock.max(0),
                            available_stock: b.available_stock.max(0),
                            seq,
                        };
                        seq += 1;
                        state
                    })
                    .collect();
                states.sort_by(|a, b| b.available_stock.cmp(&a.available_stock));
                states
            })
            .collect();

        Self { batches }
    }

    /// 某商品当前可用总库存
    pub fn available(&self, entry: EntryId) -> i64 {
        self.batches
            .get(entry)
            .map(|states| {
                states
                    .iter()
                    .fold(0i64, |acc, b| acc.saturating_add(b.available_stock))
            })
            .unwrap_or(0)
    }

    /// 多个商品的可用总库存
    pub fn available_across(&self, entries: &[EntryId]) -> i64 {
        entries
            .iter()
            .fold(0i64, |acc, &e| acc.saturating_add(self.available(e)))
    }

    pub fn batch(&self, (entry, idx): BatchRef) -> Option<&BatchState> {
        self.batches.get(entry).and_then(|states| states.get(idx))
    }

    /// 收集若干商品的全部批次，按当前库存降序
    ///
    /// 同库存时按传入商品顺序、再按参考表顺序 (稳定排序)
    pub fn sorted_batches(&self, entries: &[EntryId]) -> Vec<BatchRef> {
        let mut refs: Vec<(BatchRef, i64, usize, usize)> = Vec::new();
        for (rank, &entry) in entries.iter().enumerate() {
            if let Some(states) = self.batches.get(entry) {
                for (idx, state) in states.iter().enumerate() {
                    refs.push(((entry, idx), state.available_stock, rank, state.seq));
                }
            }
        }
        refs.sort_by(|a, b| {
            b.1.cmp(&a.1)
                .then_with(|| a.2.cmp(&b.2))
                .then_with(|| a.3.cmp(&b.3))
        });
        refs.into_iter().map(|(r, _, _, _)| r).collect()
    }

    /// 扣减批次库存，返回实际扣减量 (不会使库存为负)
    pub fn consume(&mut self, batch: BatchRef, qty: i64) -> i64 {
        let Some(state) = self
            .batches
            .get_mut(batch.0)
            .and_then(|states| states.get_mut(batch.1))
        else {
            return 0;
        };
        let consumed = qty.clamp(0, state.available_stock);
        state.available_stock -= consumed;
        consumed
    }

    /// 当前库存最多的批次
    pub fn fullest_batch(&self, entry: EntryId) -> Option<BatchRef> {
        self.sorted_batches(&[entry]).into_iter().next()
    }

    /// 退货回补：加到当前库存最多的批次
    pub fn restock(&mut self, entry: EntryId, qty: i64) -> Option<BatchRef> {
        let target = self.fullest_batch(entry)?;
        if let Some(state) = self
            .batches
            .get_mut(target.0)
            .and_then(|states| states.get_mut(target.1))
        {
            state.available_stock = state.available_stock.saturating_add(qty.max(0));
        }
        Some(target)
    }

    /// 被动过的批次数
    pub fn touched_count(&self) -> usize {
        self.batches
            .iter()
            .flatten()
            .filter(|b| b.available_stock != b.original_stock)
            .count()
    }
}
