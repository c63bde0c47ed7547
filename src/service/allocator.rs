use crate::models::{AllocationRecord, Catalog, EntryId, OrderLine};
use crate::service::inventory::InventoryIndex;

/// 一行订单的分配结果
#[derive(Debug, Clone, PartialEq)]
pub struct Allocation {
    pub records: Vec<AllocationRecord>,
    /// 批次耗尽后仍未满足的数量
    pub shortfall: i64,
}

impl Allocation {
    pub fn allocated(&self) -> i64 {
        self.records.iter().map(|r| r.allocated_qty).sum()
    }

    pub fn is_complete(&self) -> bool {
        self.shortfall == 0
    }
}

/// 多批次贪心分配
///
/// 汇总 eligible 中全部批次，按可用库存降序依次取
/// `min(剩余需求, 批次库存)`，直到需求满足或批次耗尽。
/// 已分配部分不回滚，缺口记录在 shortfall。退货行不走分配。
pub fn allocate(
    line: &OrderLine,
    eligible: &[EntryId],
    catalog: &Catalog,
    inventory: &mut InventoryIndex,
) -> Allocation {
    if line.quantity <= 0 {
        return Allocation {
            records: Vec::new(),
            shortfall: 0,
        };
    }

    let mut remaining = line.quantity;
    let mut records = Vec::new();

    for batch_ref in inventory.sorted_batches(eligible) {
        if remaining <= 0 {
            break;
        }

        let Some(batch) = inventory.batch(batch_ref) else {
            continue;
        };
        if batch.available_stock <= 0 {
            continue;
        }
        let batch_id = batch.batch_id.clone();
        let product_id = batch.product_id.clone();

        let taken = inventory.consume(batch_ref, remaining);
        if taken <= 0 {
            continue;
        }

        records.push(AllocationRecord {
            line_id: line.line_id,
            batch_id,
            product_id,
            product_name: catalog.name_of(batch_ref.0).to_string(),
            allocated_qty: taken,
            allocated_price: line.unit_price.clone(),
        });
        remaining -= taken;
    }

    Allocation {
        records,
        shortfall: remaining.max(0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Batch;
    use bigdecimal::BigDecimal;
    use chrono::NaiveDate;

    fn line(qty: i64) -> OrderLine {
        OrderLine::new(
            0,
            "INV-1",
            NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            "A",
            "Shop",
            qty,
            BigDecimal::from(qty * 10),
        )
    }

    fn setup(stocks: &[i64]) -> (Catalog, InventoryIndex) {
        let mut builder = Catalog::builder();
        for (i, stock) in stocks.iter().enumerate() {
            builder.add_batch("A", Batch::new(format!("B{}", i + 1), "PA", *stock));
        }
        let catalog = builder.build();
        let inventory = InventoryIndex::from_catalog(&catalog);
        (catalog, inventory)
    }

    #[test]
    fn single_batch_covers_order() {
        let (catalog, mut inventory) = setup(&[100]);
        let result = allocate(&line(50), &[0], &catalog, &mut inventory);
        assert_eq!(result.records.len(), 1);
        assert_eq!(result.records[0].allocated_qty, 50);
        assert_eq!(result.records[0].allocated_price, BigDecimal::from(10));
        assert!(result.is_complete());
        assert_eq!(inventory.available(0), 50);
    }

    #[test]
    fn spills_over_into_next_largest_batch() {
        let (catalog, mut inventory) = setup(&[80, 100]);
        let result = allocate(&line(150), &[0], &catalog, &mut inventory);
        let split: Vec<_> = result
            .records
            .iter()
            .map(|r| (r.batch_id.as_str(), r.allocated_qty))
            .collect();
        assert_eq!(split, vec![("B2", 100), ("B1", 50)]);
        assert_eq!(result.allocated(), 150);
    }

    #[test]
    fn shortfall_keeps_partial_allocation() {
        let (catalog, mut inventory) = setup(&[100]);
        let result = allocate(&line(150), &[0], &catalog, &mut inventory);
        assert_eq!(result.allocated(), 100);
        assert_eq!(result.shortfall, 50);
        assert_eq!(inventory.available(0), 0);
    }

    #[test]
    fn empty_batches_are_skipped() {
        let (catalog, mut inventory) = setup(&[0, 5]);
        let result = allocate(&line(5), &[0], &catalog, &mut inventory);
        assert_eq!(result.records.len(), 1);
        assert_eq!(result.records[0].batch_id, "B2");
    }

    #[test]
    fn returns_bypass_allocation() {
        let (catalog, mut inventory) = setup(&[10]);
        let result = allocate(&line(-4), &[0], &catalog, &mut inventory);
        assert!(result.records.is_empty());
        assert_eq!(inventory.available(0), 10);
    }
}
