//! 分配行合併

use std::collections::BTreeMap;
use wms_core::{
    AllocationId, DemandId, LocationId, LotId, PackageId, PartnerId, ProductId, Result,
    TransferId, Warehouse,
};

/// 合併鍵：(物料, 來源, 目的, 包裝, 批號, 貨主, 需求)
pub type MergeKey = (
    ProductId,
    LocationId,
    LocationId,
    Option<PackageId>,
    Option<LotId>,
    Option<PartnerId>,
    DemandId,
);

/// 分配行合併器
pub struct Merger;

impl Merger {
    /// 可合併的分配行分組（尚未作業、需求未結束）
    pub fn group(
        store: &Warehouse,
        transfer: TransferId,
    ) -> Result<BTreeMap<MergeKey, Vec<AllocationId>>> {
        let mut groups: BTreeMap<MergeKey, Vec<AllocationId>> = BTreeMap::new();
        for id in store.allocations_of_transfer(transfer) {
            let allocation = store.allocation(id)?;
            let rounding = store.rounding(allocation.product)?;
            if allocation.is_started(&rounding) || store.demand(allocation.demand)?.is_closed() {
                continue;
            }
            let key = (
                allocation.product,
                allocation.location_src,
                allocation.location_dest,
                allocation.package,
                allocation.lot,
                allocation.owner,
                allocation.demand,
            );
            groups.entry(key).or_default().push(id);
        }
        Ok(groups)
    }

    /// 合併同組分配行，返回被合併掉的分配行
    ///
    /// 第一筆保留並承接整組數量；預留維度相同，庫存預留不變。
    pub fn merge(store: &mut Warehouse, transfer: TransferId) -> Result<Vec<AllocationId>> {
        let mut removed = Vec::new();
        for (_, ids) in Self::group(store, transfer)? {
            let Some((&survivor, rest)) = ids.split_first() else {
                continue;
            };
            if rest.is_empty() {
                continue;
            }
            for &id in rest {
                let merged = store.forget_allocation(id)?;
                store.allocation_mut(survivor)?.ordered_quantity += merged.ordered_quantity;
                removed.push(id);
            }
        }
        if !removed.is_empty() {
            tracing::info!("調撥單 {} 合併 {} 筆分配行", transfer, removed.len());
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal::Decimal;
    use wms_core::{Allocation, Location, Product, Tracking, Transfer, TransferTypeConfig};

    fn setup(lines: &[(i64, i64)]) -> (Warehouse, TransferId, Vec<AllocationId>) {
        let mut store = Warehouse::new();
        let product = store.add_product(Product::new("Apple", Tracking::None));
        let stock = store.add_location(Location::new("Stock"));
        let output = store.add_location(Location::new("Output"));
        let kind = store.add_transfer_type(TransferTypeConfig::new("Pick"));
        let transfer = store.add_transfer(Transfer::new("PICK0001", kind, stock, output));
        let total: i64 = lines.iter().map(|(ordered, _)| ordered).sum();
        let demand = store
            .add_transfer_demand(transfer, product, Decimal::from(total))
            .unwrap();

        let ids = lines
            .iter()
            .map(|&(ordered, done)| {
                let mut allocation =
                    Allocation::for_demand(store.demand(demand).unwrap(), Decimal::from(ordered));
                allocation.done_quantity = Decimal::from(done);
                store.add_allocation(allocation)
            })
            .collect();
        (store, transfer, ids)
    }

    fn total(store: &Warehouse, transfer: TransferId) -> Decimal {
        store
            .allocations_of_transfer(transfer)
            .iter()
            .map(|id| store.allocation(*id).unwrap().ordered_quantity)
            .sum()
    }

    #[test]
    fn test_merge_identical_lines() {
        let (mut store, transfer, ids) = setup(&[(2, 0), (3, 0), (4, 0)]);
        let removed = Merger::merge(&mut store, transfer).unwrap();

        assert_eq!(removed, vec![ids[1], ids[2]]);
        assert_eq!(store.allocations_of_transfer(transfer), vec![ids[0]]);
        assert_eq!(store.allocation(ids[0]).unwrap().ordered_quantity, Decimal::from(9));
    }

    #[test]
    fn test_merge_skips_worked_lines() {
        let (mut store, transfer, ids) = setup(&[(2, 2), (3, 0)]);
        let removed = Merger::merge(&mut store, transfer).unwrap();

        assert!(removed.is_empty());
        assert_eq!(store.allocations_of_transfer(transfer), ids);
    }

    #[test]
    fn test_merge_respects_lot() {
        let (mut store, transfer, ids) = setup(&[(2, 0), (3, 0)]);
        store.allocation_mut(ids[1]).unwrap().lot = Some(LotId(99));
        assert!(Merger::merge(&mut store, transfer).unwrap().is_empty());
    }

    proptest! {
        #[test]
        fn prop_merge_is_safe(lines in prop::collection::vec((1i64..20, 0i64..3), 1..10)) {
            // done 只取 0 或等於 ordered
            let lines: Vec<(i64, i64)> = lines
                .into_iter()
                .map(|(ordered, flag)| (ordered, if flag == 0 { ordered } else { 0 }))
                .collect();
            let (mut store, transfer, ids) = setup(&lines);
            let before = total(&store, transfer);

            let removed = Merger::merge(&mut store, transfer).unwrap();

            prop_assert_eq!(total(&store, transfer), before);
            for (id, (ordered, done)) in ids.iter().zip(&lines) {
                if *done > 0 {
                    prop_assert!(!removed.contains(id));
                    let allocation = store.allocation(*id).unwrap();
                    prop_assert_eq!(allocation.ordered_quantity, Decimal::from(*ordered));
                }
            }
        }
    }
}
