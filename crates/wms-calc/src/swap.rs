//! 批號/序號調換
//!
//! 作業員掃描到與預留不同的批號時，把分配行改指向掃描到的批號。
//! 新批號優先取自未預留的庫存，不足時向其他調撥單尚未作業的分配行取回，
//! 被取回的一方改持有被換出的批號，物料的預留總量保持不變。

use rust_decimal::Decimal;
use std::collections::{BTreeMap, BTreeSet};
use wms_core::{
    AllocationId, LocationId, LotId, ProductId, Result, Rounding, TransferId, Warehouse, WmsError,
};

use crate::splitter::Splitter;

/// 掃描要求的批號與數量
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LotRequest {
    pub name: String,
    pub quantity: Decimal,
}

impl LotRequest {
    pub fn new(name: impl Into<String>, quantity: Decimal) -> Self {
        Self {
            name: name.into(),
            quantity,
        }
    }
}

/// 調換結果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SwapReport {
    /// 本調撥單中改持新批號的分配行
    pub swapped: Vec<AllocationId>,

    /// 受影響（已寫入審計記錄）的調撥單
    pub transfers: BTreeSet<TransferId>,
}

impl SwapReport {
    pub fn is_empty(&self) -> bool {
        self.swapped.is_empty()
    }
}

/// 分配行的庫存維度
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct StockKey {
    location: LocationId,
    package: Option<wms_core::PackageId>,
    lot: Option<LotId>,
    owner: Option<wms_core::PartnerId>,
}

impl StockKey {
    fn of(allocation: &wms_core::Allocation) -> Self {
        Self {
            location: allocation.location_src,
            package: allocation.package,
            lot: allocation.lot,
            owner: allocation.owner,
        }
    }

    fn assign(&self, store: &mut Warehouse, id: AllocationId) -> Result<()> {
        let allocation = store.allocation_mut(id)?;
        allocation.location_src = self.location;
        allocation.package = self.package;
        allocation.lot = self.lot;
        allocation.owner = self.owner;
        Ok(())
    }
}

/// 調換審計記錄（依調撥單彙整）
#[derive(Debug, Default)]
struct SwapNotes {
    lines: BTreeMap<TransferId, Vec<String>>,
}

impl SwapNotes {
    fn record(
        &mut self,
        transfer: Option<TransferId>,
        product: &str,
        quantity: Decimal,
        out_lot: &str,
        in_lot: &str,
    ) {
        if let Some(transfer) = transfer {
            self.lines.entry(transfer).or_default().push(format!(
                "{} 數量 {}：換出 {}，換入 {}",
                product, quantity, out_lot, in_lot
            ));
        }
    }

    fn post(self, store: &mut Warehouse) -> Result<BTreeSet<TransferId>> {
        let mut touched = BTreeSet::new();
        for (transfer, lines) in self.lines {
            store.post_note(transfer, format!("批號調換\n{}", lines.join("\n")))?;
            touched.insert(transfer);
        }
        Ok(touched)
    }
}

/// 批號調換器
pub struct Swapper;

impl Swapper {
    /// 讓調撥單 `transfer` 中物料 `product` 的分配行改持掃描要求的批號
    ///
    /// 來源儲位不追蹤預留、掃描批號都已預留、或沒有可改指向的分配行時不做任何事。
    /// 已開始作業的分配行永不被調換。
    pub fn swap(
        store: &mut Warehouse,
        transfer: TransferId,
        product: ProductId,
        requests: &[LotRequest],
        candidates: &[AllocationId],
    ) -> Result<SwapReport> {
        let rounding = store.rounding(product)?;
        let (source, transfer_name) = {
            let t = store.transfer(transfer)?;
            (t.location_src, t.name.clone())
        };
        if !store.location(source)?.tracks_reservations() {
            return Ok(SwapReport::default());
        }

        let requested: BTreeSet<&str> = requests.iter().map(|r| r.name.as_str()).collect();
        let mut unchanged = Vec::new();
        let mut to_change = Vec::new();
        let mut foreign = Vec::new();
        for &id in candidates {
            let allocation = store.allocation(id)?;
            if allocation.transfer != Some(transfer) {
                foreign.push(id);
                continue;
            }
            if allocation.product != product || allocation.is_started(&rounding) {
                continue;
            }
            match store.lot_name(allocation.lot) {
                Some(name) if requested.contains(name) => unchanged.push(id),
                _ => to_change.push(id),
            }
        }
        if !foreign.is_empty() {
            return Err(WmsError::TransferMismatch {
                transfer: transfer_name,
                allocations: foreign,
            });
        }

        let held: BTreeSet<String> = unchanged
            .iter()
            .filter_map(|id| store.allocation(*id).ok())
            .filter_map(|a| store.lot_name(a.lot).map(str::to_string))
            .collect();
        let requested_total: Decimal = requests.iter().map(|r| r.quantity).sum();
        let unchanged_total: Decimal = unchanged
            .iter()
            .filter_map(|id| store.allocation(*id).ok())
            .map(|a| a.ordered_quantity)
            .sum();
        let swap_quantity = rounding.round(requested_total - unchanged_total);
        let new_requests: Vec<&LotRequest> = requests
            .iter()
            .filter(|r| !held.contains(&r.name))
            .collect();

        if swap_quantity <= Decimal::ZERO || new_requests.is_empty() || to_change.is_empty() {
            return Ok(SwapReport::default());
        }

        // 檢查新批號在來源儲位下的可取得數量
        let mut lots = Vec::with_capacity(new_requests.len());
        let mut obtainable = Decimal::ZERO;
        for request in &new_requests {
            let lot = store.find_lot(product, &request.name);
            if let Some(lot) = lot {
                obtainable += Self::obtainable(store, transfer, product, lot, source, &rounding);
            }
            lots.push((*request, lot));
        }
        if rounding.less_than(obtainable, swap_quantity) {
            return Err(WmsError::InsufficientQuantity {
                product: store.product(product)?.name.clone(),
                requested: swap_quantity,
                available: obtainable,
            });
        }

        tracing::debug!(
            "調撥單 {} 調換批號：數量 {}，新批號 {} 個",
            transfer_name,
            swap_quantity,
            lots.len()
        );

        let mut notes = SwapNotes::default();
        let mut report = SwapReport::default();
        let mut left = swap_quantity;
        for (request, lot) in lots {
            let Some(lot) = lot else { continue };
            let amount = request.quantity.min(left);
            if rounding.is_zero(amount) {
                break;
            }

            let outcome =
                Splitter::move_lines_for_qty(store, &to_change, amount, &rounding, true)?;
            to_change.retain(|id| !outcome.covering.contains(id));
            if let Some(overflow) = outcome.overflow {
                to_change.push(overflow);
            }

            for id in outcome.covering {
                let pieces =
                    Self::claim(store, id, transfer, lot, source, &rounding, &mut notes)?;
                report.swapped.extend(pieces);
            }
            left = rounding.round(left - amount + outcome.remainder);
            if rounding.is_zero(left) {
                break;
            }
        }

        report.transfers = notes.post(store)?;
        tracing::info!(
            "調撥單 {} 完成批號調換：{} 筆分配行，影響調撥單 {} 張",
            transfer_name,
            report.swapped.len(),
            report.transfers.len()
        );
        Ok(report)
    }

    /// 批號在來源儲位下可取得的數量：未預留數量 + 其他調撥單尚未作業的預留
    fn obtainable(
        store: &Warehouse,
        transfer: TransferId,
        product: ProductId,
        lot: LotId,
        source: LocationId,
        rounding: &Rounding,
    ) -> Decimal {
        let free: Decimal = store
            .stock_units()
            .filter(|u| u.lot == Some(lot) && store.is_within(u.location, source))
            .map(|u| u.available())
            .sum();
        let reclaimable: Decimal = Self::holders(store, transfer, product, lot, source, rounding)
            .iter()
            .filter_map(|id| store.allocation(*id).ok())
            .map(|a| a.ordered_quantity)
            .sum();
        free + reclaimable
    }

    /// 其他調撥單中持有該批號且尚未作業的分配行
    fn holders(
        store: &Warehouse,
        transfer: TransferId,
        product: ProductId,
        lot: LotId,
        source: LocationId,
        rounding: &Rounding,
    ) -> Vec<AllocationId> {
        store
            .allocations()
            .filter(|a| {
                a.product == product
                    && a.lot == Some(lot)
                    && a.transfer != Some(transfer)
                    && !a.is_started(rounding)
                    && store.is_within(a.location_src, source)
                    && store.demand(a.demand).is_ok_and(|d| !d.is_closed())
            })
            .map(|a| a.id)
            .collect()
    }

    /// 把分配行 `id` 的全部數量改為批號 `lot`，返回改指向後的各段分配行
    fn claim(
        store: &mut Warehouse,
        id: AllocationId,
        transfer: TransferId,
        lot: LotId,
        source: LocationId,
        rounding: &Rounding,
        notes: &mut SwapNotes,
    ) -> Result<Vec<AllocationId>> {
        let original = store.allocation(id)?.clone();
        let old_key = StockKey::of(&original);
        let product_name = store.product(original.product)?.name.clone();
        let old_lot_name = store.lot_name(original.lot).unwrap_or("-").to_string();
        let new_lot_name = store.lot(lot)?.name.clone();

        store.release_for(&original, original.ordered_quantity)?;

        let mut pieces = Vec::new();
        let mut current = Some(id);
        let mut need = original.ordered_quantity;

        // 未預留的庫存
        for unit_id in store.units_within(original.product, source) {
            let Some(piece) = current else { break };
            let unit = store.stock_unit(unit_id)?;
            if unit.lot != Some(lot) || unit.available() <= Decimal::ZERO {
                continue;
            }
            let key = StockKey {
                location: unit.location,
                package: unit.package,
                lot: unit.lot,
                owner: unit.owner,
            };
            let take = unit.available().min(need);

            current = Self::carve(store, piece, take, need, rounding)?;
            key.assign(store, piece)?;
            let claimed = store.allocation(piece)?.clone();
            store.reserve_for(&claimed, take)?;
            notes.record(Some(transfer), &product_name, take, &old_lot_name, &new_lot_name);
            pieces.push(piece);
            need -= take;
        }

        // 向其他調撥單取回
        for holder_id in Self::holders(store, transfer, original.product, lot, source, rounding) {
            let Some(piece) = current else { break };
            let holder = store.allocation(holder_id)?.clone();
            let take = holder.ordered_quantity.min(need);

            store.release_for(&holder, take)?;
            if rounding.less_than(take, holder.ordered_quantity) {
                store.allocation_mut(holder_id)?.ordered_quantity =
                    rounding.round(holder.ordered_quantity - take);
                let mut sibling = holder.clone();
                sibling.ordered_quantity = take;
                let sibling_id = store.add_allocation(sibling);
                old_key.assign(store, sibling_id)?;
                let displaced = store.allocation(sibling_id)?.clone();
                store.reserve_for(&displaced, take)?;
            } else {
                old_key.assign(store, holder_id)?;
                let displaced = store.allocation(holder_id)?.clone();
                store.reserve_for(&displaced, take)?;
            }
            notes.record(holder.transfer, &product_name, take, &new_lot_name, &old_lot_name);

            current = Self::carve(store, piece, take, need, rounding)?;
            StockKey::of(&holder).assign(store, piece)?;
            let claimed = store.allocation(piece)?.clone();
            store.reserve_for(&claimed, take)?;
            notes.record(Some(transfer), &product_name, take, &old_lot_name, &new_lot_name);
            pieces.push(piece);
            need -= take;
        }

        if current.is_some() && !rounding.is_zero(need) {
            return Err(WmsError::InsufficientQuantity {
                product: product_name,
                requested: original.ordered_quantity,
                available: original.ordered_quantity - need,
            });
        }
        Ok(pieces)
    }

    /// 從 `piece` 切出 `take`，返回剩餘未處理的部分
    fn carve(
        store: &mut Warehouse,
        piece: AllocationId,
        take: Decimal,
        need: Decimal,
        rounding: &Rounding,
    ) -> Result<Option<AllocationId>> {
        if rounding.less_than(take, need) {
            Ok(Some(store.split_allocation(piece, take, rounding)?))
        } else {
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use wms_core::{
        Allocation, DemandId, Location, Product, StockUnit, Tracking, Transfer, TransferTypeConfig,
    };

    struct Fixture {
        store: Warehouse,
        product: ProductId,
        stock: LocationId,
        output: LocationId,
        pick: wms_core::TransferTypeId,
    }

    fn fixture(tracking: Tracking) -> Fixture {
        let mut store = Warehouse::new();
        let product = store.add_product(Product::new("Strawberry", tracking));
        let stock = store.add_location(Location::new("Stock"));
        let output = store.add_location(Location::new("Output"));
        let pick = store.add_transfer_type(
            TransferTypeConfig::new("Pick").with_allow_swap_tracked(true),
        );
        Fixture {
            store,
            product,
            stock,
            output,
            pick,
        }
    }

    impl Fixture {
        fn lot_stock(&mut self, name: &str, quantity: i64) -> LotId {
            let lot = self.store.get_or_create_lot(self.product, name);
            self.store.add_stock(
                StockUnit::new(self.product, self.stock, Decimal::from(quantity)).with_lot(lot),
            );
            lot
        }

        fn reserved_pick(
            &mut self,
            name: &str,
            lot: LotId,
            quantity: i64,
        ) -> (TransferId, DemandId, AllocationId) {
            let transfer = self
                .store
                .add_transfer(Transfer::new(name, self.pick, self.stock, self.output));
            let demand = self
                .store
                .add_transfer_demand(transfer, self.product, Decimal::from(quantity))
                .unwrap();
            let allocation =
                Allocation::for_demand(self.store.demand(demand).unwrap(), Decimal::from(quantity))
                    .with_lot(Some(lot));
            self.store
                .reserve_for(&allocation, Decimal::from(quantity))
                .unwrap();
            let id = self.store.add_allocation(allocation);
            (transfer, demand, id)
        }
    }

    #[test]
    fn test_swap_serial_from_free_stock() {
        let mut f = fixture(Tracking::Serial);
        let sn1 = f.lot_stock("1", 1);
        let sn2 = f.lot_stock("2", 1);
        let (transfer, _, allocation) = f.reserved_pick("PICK0001", sn1, 1);

        let report = Swapper::swap(
            &mut f.store,
            transfer,
            f.product,
            &[LotRequest::new("2", Decimal::ONE)],
            &[allocation],
        )
        .unwrap();

        assert_eq!(report.swapped, vec![allocation]);
        assert_eq!(f.store.allocation(allocation).unwrap().lot, Some(sn2));
        assert_eq!(f.store.reserved_quantity(f.product, Some(sn1)), Decimal::ZERO);
        assert_eq!(f.store.reserved_quantity(f.product, Some(sn2)), Decimal::ONE);
        assert_eq!(f.store.transfer(transfer).unwrap().notes.len(), 1);
    }

    #[test]
    fn test_swap_reclaims_from_other_transfer() {
        let mut f = fixture(Tracking::Serial);
        let sn1 = f.lot_stock("1", 1);
        let sn2 = f.lot_stock("2", 1);
        let (first, _, mine) = f.reserved_pick("PICK0001", sn1, 1);
        let (second, _, theirs) = f.reserved_pick("PICK0002", sn2, 1);
        let before = f.store.reserved_quantity(f.product, None);

        let report = Swapper::swap(
            &mut f.store,
            first,
            f.product,
            &[LotRequest::new("2", Decimal::ONE)],
            &[mine],
        )
        .unwrap();

        assert_eq!(f.store.allocation(mine).unwrap().lot, Some(sn2));
        assert_eq!(f.store.allocation(theirs).unwrap().lot, Some(sn1));
        assert_eq!(f.store.reserved_quantity(f.product, None), before);
        assert_eq!(f.store.reserved_quantity(f.product, Some(sn1)), Decimal::ONE);
        assert_eq!(f.store.reserved_quantity(f.product, Some(sn2)), Decimal::ONE);
        assert!(report.transfers.contains(&first));
        assert!(report.transfers.contains(&second));
        assert_eq!(f.store.transfer(second).unwrap().notes.len(), 1);
    }

    #[test]
    fn test_swap_lot_partial_reclaim_creates_sibling() {
        let mut f = fixture(Tracking::Lot);
        let lot_a = f.lot_stock("LOT-A", 10);
        let lot_b = f.lot_stock("LOT-B", 10);
        let (first, _, mine) = f.reserved_pick("PICK0001", lot_a, 4);
        let (second, _, theirs) = f.reserved_pick("PICK0002", lot_b, 10);
        let before = f.store.reserved_quantity(f.product, None);

        Swapper::swap(
            &mut f.store,
            first,
            f.product,
            &[LotRequest::new("LOT-B", Decimal::from(4))],
            &[mine],
        )
        .unwrap();

        assert_eq!(f.store.allocation(mine).unwrap().lot, Some(lot_b));
        assert_eq!(
            f.store.allocation(theirs).unwrap().ordered_quantity,
            Decimal::from(6)
        );
        let sibling: Vec<_> = f
            .store
            .allocations_of_transfer(second)
            .into_iter()
            .filter(|id| *id != theirs)
            .collect();
        assert_eq!(sibling.len(), 1);
        let sibling = f.store.allocation(sibling[0]).unwrap();
        assert_eq!(sibling.lot, Some(lot_a));
        assert_eq!(sibling.ordered_quantity, Decimal::from(4));
        assert_eq!(f.store.reserved_quantity(f.product, None), before);
    }

    #[test]
    fn test_swap_fails_when_not_available() {
        let mut f = fixture(Tracking::Lot);
        let lot_a = f.lot_stock("LOT-A", 10);
        f.lot_stock("LOT-B", 2);
        let (transfer, _, mine) = f.reserved_pick("PICK0001", lot_a, 5);

        let err = Swapper::swap(
            &mut f.store,
            transfer,
            f.product,
            &[LotRequest::new("LOT-B", Decimal::from(5))],
            &[mine],
        )
        .unwrap_err();

        assert!(matches!(err, WmsError::InsufficientQuantity { .. }));
        assert_eq!(f.store.allocation(mine).unwrap().lot, Some(lot_a));
    }

    #[test]
    fn test_swap_skips_requested_lots_already_reserved() {
        let mut f = fixture(Tracking::Serial);
        let sn1 = f.lot_stock("1", 1);
        let (transfer, _, mine) = f.reserved_pick("PICK0001", sn1, 1);

        let report = Swapper::swap(
            &mut f.store,
            transfer,
            f.product,
            &[LotRequest::new("1", Decimal::ONE)],
            &[mine],
        )
        .unwrap();

        assert!(report.is_empty());
        assert!(f.store.transfer(transfer).unwrap().notes.is_empty());
    }

    #[test]
    fn test_swap_rejects_foreign_allocations() {
        let mut f = fixture(Tracking::Serial);
        let sn1 = f.lot_stock("1", 1);
        let sn2 = f.lot_stock("2", 1);
        let (first, _, _) = f.reserved_pick("PICK0001", sn1, 1);
        let (_, _, theirs) = f.reserved_pick("PICK0002", sn2, 1);

        let err = Swapper::swap(
            &mut f.store,
            first,
            f.product,
            &[LotRequest::new("3", Decimal::ONE)],
            &[theirs],
        )
        .unwrap_err();
        assert!(matches!(err, WmsError::TransferMismatch { .. }));
    }

    proptest! {
        #[test]
        fn prop_swap_conserves_reservation(
            mine in 1i64..10,
            free_a in 0i64..5,
            stock_b in 1i64..15,
            held_b in 0i64..15,
            requested in 1i64..10,
        ) {
            let held_b = held_b.min(stock_b);
            let requested = requested.min(mine);
            let mut f = fixture(Tracking::Lot);
            let lot_a = f.lot_stock("LOT-A", mine + free_a);
            let lot_b = f.lot_stock("LOT-B", stock_b);
            let (transfer, _, line) = f.reserved_pick("PICK0001", lot_a, mine);
            if held_b > 0 {
                f.reserved_pick("PICK0002", lot_b, held_b);
            }
            let before = f.store.reserved_quantity(f.product, None);
            let before_a = f.store.reserved_quantity(f.product, Some(lot_a));

            let result = Swapper::swap(
                &mut f.store,
                transfer,
                f.product,
                &[LotRequest::new("LOT-B", Decimal::from(requested))],
                &[line],
            );

            prop_assert_eq!(f.store.reserved_quantity(f.product, None), before);
            let by_lot = f.store.reserved_quantity(f.product, Some(lot_a))
                + f.store.reserved_quantity(f.product, Some(lot_b));
            prop_assert_eq!(by_lot, before);
            if result.is_err() {
                prop_assert_eq!(f.store.reserved_quantity(f.product, Some(lot_a)), before_a);
            }
        }
    }
}
