//! 掃描比對（Prepare）
//!
//! 把掃描/點數輸入比對到調撥單尚未完成的分配行，產生「標記完成」要寫入的欄位值。
//! 比對期間只會拆分分配行、建立批號與未預期作業；完成數量要等 [`MarkDoneUpdates::apply`]
//! 才寫入。

use rust_decimal::Decimal;
use std::collections::{BTreeMap, BTreeSet};
use wms_core::{
    Allocation, AllocationId, Demand, DemandState, LocationId, LotId, PackageId, Product,
    ProductId, Result, StockUnitId, TransferId, Warehouse, WmsError,
};

use crate::splitter::Splitter;
use crate::swap::{LotRequest, Swapper};

/// 一筆掃描輸入
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanEntry {
    pub product: ProductId,
    pub quantity: Decimal,

    /// 批號/序號名稱（追蹤物料必填）
    pub lot_names: Vec<String>,

    /// 每個批號的數量（序號物料可省略，預設每個 1）
    pub lot_quantities: Vec<Decimal>,
}

impl ScanEntry {
    pub fn new(product: ProductId, quantity: Decimal) -> Self {
        Self {
            product,
            quantity,
            lot_names: Vec::new(),
            lot_quantities: Vec::new(),
        }
    }

    /// 建構器模式：設置批號名稱
    pub fn with_lot_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.lot_names = names.into_iter().map(Into::into).collect();
        self
    }

    /// 建構器模式：設置每個批號的數量
    pub fn with_lot_quantities(mut self, quantities: Vec<Decimal>) -> Self {
        self.lot_quantities = quantities;
        self
    }

    /// 檢查輸入並展開為批號要求
    pub fn lot_requests(&self, product: &Product) -> Result<Vec<LotRequest>> {
        if self.quantity <= Decimal::ZERO {
            return Err(WmsError::MalformedScan(format!(
                "物料 {} 數量必須大於 0",
                product.name
            )));
        }
        if !product.is_tracked() {
            if !self.lot_names.is_empty() {
                return Err(WmsError::MalformedScan(format!(
                    "物料 {} 未追蹤批號，不應提供批號",
                    product.name
                )));
            }
            return Ok(Vec::new());
        }
        if self.lot_names.is_empty() {
            return Err(WmsError::MalformedScan(format!(
                "物料 {} 需要批號/序號",
                product.name
            )));
        }

        let mut seen = BTreeSet::new();
        let repeated: BTreeSet<String> = self
            .lot_names
            .iter()
            .filter(|name| !seen.insert(name.as_str()))
            .cloned()
            .collect();
        if !repeated.is_empty() {
            return Err(WmsError::RepeatedLotNames {
                product: product.name.clone(),
                names: repeated.into_iter().collect(),
            });
        }

        let quantities = if self.lot_quantities.is_empty() {
            if product.is_serial() {
                vec![Decimal::ONE; self.lot_names.len()]
            } else if self.lot_names.len() == 1 {
                vec![self.quantity]
            } else {
                return Err(WmsError::MalformedScan(format!(
                    "物料 {} 有 {} 個批號但沒有批號數量",
                    product.name,
                    self.lot_names.len()
                )));
            }
        } else {
            self.lot_quantities.clone()
        };

        if quantities.len() != self.lot_names.len() {
            return Err(WmsError::MalformedScan(format!(
                "物料 {} 批號數量 {} 與批號個數 {} 不符",
                product.name,
                quantities.len(),
                self.lot_names.len()
            )));
        }
        if product.is_serial() && quantities.iter().any(|q| *q != Decimal::ONE) {
            return Err(WmsError::MalformedScan(format!(
                "序號物料 {} 每個序號數量必須為 1",
                product.name
            )));
        }
        let total: Decimal = quantities.iter().sum();
        if !product.rounding.equals(total, self.quantity) {
            return Err(WmsError::MalformedScan(format!(
                "物料 {} 批號數量合計 {} 與掃描數量 {} 不符",
                product.name, total, self.quantity
            )));
        }

        Ok(self
            .lot_names
            .iter()
            .zip(quantities)
            .map(|(name, quantity)| LotRequest::new(name.clone(), quantity))
            .collect())
    }
}

/// 掃描情境（包裝、儲位與結果）
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrepareContext {
    /// 來源包裝（含子包裝）
    pub package: Option<PackageId>,

    /// 來源儲位（含子儲位）
    pub location: Option<LocationId>,

    /// 目的包裝
    pub result_package: Option<PackageId>,

    /// 目的儲位
    pub location_dest: Option<LocationId>,
}

impl PrepareContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_package(mut self, package: PackageId) -> Self {
        self.package = Some(package);
        self
    }

    pub fn with_location(mut self, location: LocationId) -> Self {
        self.location = Some(location);
        self
    }

    pub fn with_result_package(mut self, package: PackageId) -> Self {
        self.result_package = Some(package);
        self
    }

    pub fn with_location_dest(mut self, location: LocationId) -> Self {
        self.location_dest = Some(location);
        self
    }
}

/// 標記完成時寫入分配行的欄位值
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AllocationValues {
    pub done_quantity: Decimal,
    pub lot: Option<LotId>,
    pub result_package: Option<PackageId>,
    pub location_dest: Option<LocationId>,
}

/// 待寫入的標記完成結果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MarkDoneUpdates {
    values: BTreeMap<AllocationId, AllocationValues>,
}

impl MarkDoneUpdates {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, allocation: AllocationId, values: AllocationValues) {
        self.values.insert(allocation, values);
    }

    pub fn get(&self, allocation: AllocationId) -> Option<&AllocationValues> {
        self.values.get(&allocation)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn allocations(&self) -> Vec<AllocationId> {
        self.values.keys().copied().collect()
    }

    /// 依寫入值分組：同一組分配行寫入相同欄位值
    pub fn groups(&self) -> BTreeMap<AllocationValues, Vec<AllocationId>> {
        let mut groups: BTreeMap<AllocationValues, Vec<AllocationId>> = BTreeMap::new();
        for (id, values) in &self.values {
            groups.entry(*values).or_default().push(*id);
        }
        groups
    }

    /// 將所有分配行的目的儲位設為 `location`
    pub fn set_location_dest(&mut self, location: LocationId) {
        for values in self.values.values_mut() {
            values.location_dest = Some(location);
        }
    }

    /// 寫入欄位值；任何分配行已開始作業即失敗
    ///
    /// 批號變更時，預留隨之從舊批號移到新批號。
    pub fn apply(&self, store: &mut Warehouse) -> Result<Vec<AllocationId>> {
        for (&id, values) in &self.values {
            let allocation = store.allocation(id)?.clone();
            let rounding = store.rounding(allocation.product)?;
            if allocation.is_started(&rounding) {
                return Err(WmsError::AlreadyDone(format!(
                    "分配行 {} 已完成 {}",
                    id, allocation.done_quantity
                )));
            }

            if values.lot != allocation.lot {
                store.release_for(&allocation, allocation.ordered_quantity)?;
                store.allocation_mut(id)?.lot = values.lot;
                let relotted = store.allocation(id)?.clone();
                store.reserve_for(&relotted, relotted.ordered_quantity)?;
            }

            let target = store.allocation_mut(id)?;
            target.done_quantity = values.done_quantity;
            if values.result_package.is_some() {
                target.result_package = values.result_package;
            }
            if let Some(location) = values.location_dest {
                target.location_dest = location;
            }
        }
        Ok(self.allocations())
    }
}

/// 掃描比對器
pub struct Preparer;

impl Preparer {
    /// 比對掃描輸入，返回待寫入的欄位值
    ///
    /// 步驟（每筆輸入）：
    /// 1. 篩選候選分配行（物料、包裝、儲位）
    /// 2. 追蹤物料且允許調換時先進行批號調換
    /// 3. 追蹤物料逐批號比對；未追蹤物料直接依數量拆分
    /// 4. 仍未滿足的數量建立未預期作業（需允許超收）
    pub fn prepare(
        store: &mut Warehouse,
        transfer: TransferId,
        entries: &[ScanEntry],
        context: &PrepareContext,
    ) -> Result<MarkDoneUpdates> {
        let config = store.transfer_config(transfer)?.clone();
        let transfer_name = store.transfer(transfer)?.name.clone();
        let mut updates = MarkDoneUpdates::new();

        tracing::debug!("調撥單 {} 比對掃描 {} 筆", transfer_name, entries.len());

        for entry in entries {
            let product = store.product(entry.product)?.clone();
            let rounding = product.rounding;
            let requests = entry.lot_requests(&product)?;
            let mut unexpected: Vec<(Option<LotId>, Decimal)> = Vec::new();

            if product.is_tracked() {
                if config.allow_swap_tracked {
                    let candidates =
                        Self::candidates(store, transfer, product.id, context, &updates)?;
                    Swapper::swap(store, transfer, product.id, &requests, &candidates)?;
                }

                for request in &requests {
                    let existing = store.find_lot(product.id, &request.name);
                    if let Some(lot) = existing {
                        Self::check_lot_not_done(store, transfer, &product, lot, &request.name)?;
                    }

                    let mut left = request.quantity;
                    if existing.is_some() {
                        let matching: Vec<AllocationId> =
                            Self::candidates(store, transfer, product.id, context, &updates)?
                                .into_iter()
                                .filter(|id| store.allocation(*id).is_ok_and(|a| a.lot == existing))
                                .collect();
                        let outcome =
                            Splitter::move_lines_for_qty(store, &matching, left, &rounding, true)?;
                        Self::cover(store, &mut updates, &outcome.covering, existing, context)?;
                        left = outcome.remainder;
                    }

                    if !rounding.is_zero(left) {
                        let unbound: Vec<AllocationId> =
                            Self::candidates(store, transfer, product.id, context, &updates)?
                                .into_iter()
                                .filter(|id| store.allocation(*id).is_ok_and(|a| a.lot.is_none()))
                                .collect();
                        let lot = store.get_or_create_lot(product.id, &request.name);
                        let outcome =
                            Splitter::move_lines_for_qty(store, &unbound, left, &rounding, true)?;
                        Self::cover(store, &mut updates, &outcome.covering, Some(lot), context)?;
                        if !rounding.is_zero(outcome.remainder) {
                            unexpected.push((Some(lot), outcome.remainder));
                        }
                    }
                }
            } else {
                let candidates = Self::candidates(store, transfer, product.id, context, &updates)?;
                let outcome = Splitter::move_lines_for_qty(
                    store,
                    &candidates,
                    entry.quantity,
                    &rounding,
                    true,
                )?;
                Self::cover(store, &mut updates, &outcome.covering, None, context)?;
                if !rounding.is_zero(outcome.remainder) {
                    unexpected.push((None, outcome.remainder));
                }
            }

            for (lot, quantity) in unexpected {
                if !config.over_receive {
                    return Err(WmsError::OverReceive {
                        transfer: transfer_name,
                        product: product.name.clone(),
                        quantity,
                    });
                }
                for (id, done) in
                    Self::add_unexpected(store, transfer, &product, lot, quantity, context)?
                {
                    updates.insert(
                        id,
                        AllocationValues {
                            done_quantity: done,
                            lot,
                            result_package: context.result_package,
                            location_dest: context.location_dest,
                        },
                    );
                }
            }
        }

        Ok(updates)
    }

    /// 不帶掃描輸入：候選分配行全部標記完成
    pub fn prepare_all(
        store: &Warehouse,
        transfer: TransferId,
        context: &PrepareContext,
    ) -> Result<MarkDoneUpdates> {
        let packages = Self::package_tree(store, context.package);
        let mut updates = MarkDoneUpdates::new();
        for id in store.allocations_of_transfer(transfer) {
            let allocation = store.allocation(id)?;
            if !Self::in_context(store, allocation, context, &packages)? {
                continue;
            }
            let rounding = store.rounding(allocation.product)?;
            if allocation.is_started(&rounding) {
                return Err(WmsError::AlreadyDone(format!(
                    "調撥單 {} 的分配行 {}",
                    store.transfer(transfer)?.name,
                    id
                )));
            }
            updates.insert(
                id,
                AllocationValues {
                    done_quantity: allocation.ordered_quantity,
                    lot: allocation.lot,
                    result_package: context.result_package,
                    location_dest: context.location_dest,
                },
            );
        }
        Ok(updates)
    }

    /// 候選分配行：本調撥單、物料相符、尚未完成、需求未結束、符合包裝/儲位，且未被本次比對占用
    fn candidates(
        store: &Warehouse,
        transfer: TransferId,
        product: ProductId,
        context: &PrepareContext,
        claimed: &MarkDoneUpdates,
    ) -> Result<Vec<AllocationId>> {
        let packages = Self::package_tree(store, context.package);
        let rounding = store.rounding(product)?;
        let mut candidates = Vec::new();
        for id in store.allocations_of_transfer(transfer) {
            if claimed.get(id).is_some() {
                continue;
            }
            let allocation = store.allocation(id)?;
            if allocation.product != product || !allocation.is_incomplete(&rounding) {
                continue;
            }
            if Self::in_context(store, allocation, context, &packages)? {
                candidates.push(id);
            }
        }
        Ok(candidates)
    }

    fn in_context(
        store: &Warehouse,
        allocation: &Allocation,
        context: &PrepareContext,
        packages: &BTreeSet<PackageId>,
    ) -> Result<bool> {
        if store.demand(allocation.demand)?.is_closed() {
            return Ok(false);
        }
        if context.package.is_some()
            && !allocation.package.is_some_and(|p| packages.contains(&p))
        {
            return Ok(false);
        }
        if let Some(location) = context.location {
            if !store.is_within(allocation.location_src, location) {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// 包裝及其所有子包裝
    fn package_tree(store: &Warehouse, package: Option<PackageId>) -> BTreeSet<PackageId> {
        let mut tree = BTreeSet::new();
        let mut stack: Vec<PackageId> = package.into_iter().collect();
        while let Some(package) = stack.pop() {
            if tree.insert(package) {
                stack.extend(store.package_children(package));
            }
        }
        tree
    }

    fn check_lot_not_done(
        store: &Warehouse,
        transfer: TransferId,
        product: &Product,
        lot: LotId,
        name: &str,
    ) -> Result<()> {
        let done = store.allocations_of_transfer(transfer).into_iter().any(|id| {
            store.allocation(id).is_ok_and(|a| {
                a.product == product.id
                    && a.lot == Some(lot)
                    && a.is_started(&product.rounding)
            })
        });
        if done {
            return Err(WmsError::AlreadyDone(format!(
                "物料 {} 批號 {}",
                product.name, name
            )));
        }
        Ok(())
    }

    fn cover(
        store: &Warehouse,
        updates: &mut MarkDoneUpdates,
        covering: &[AllocationId],
        lot: Option<LotId>,
        context: &PrepareContext,
    ) -> Result<()> {
        for &id in covering {
            let allocation = store.allocation(id)?;
            updates.insert(
                id,
                AllocationValues {
                    done_quantity: allocation.ordered_quantity,
                    lot: lot.or(allocation.lot),
                    result_package: context.result_package,
                    location_dest: context.location_dest,
                },
            );
        }
        Ok(())
    }

    /// 為未計劃的庫存建立需求（原始數量 0）與分配行（應作業數量 0）
    ///
    /// 來源儲位記錄預留時，依入庫日期逐一綁定可用的庫存單位並預留，每個庫存單位一筆分配行；
    /// 可用數量不足時失敗。返回分配行與其完成數量。
    fn add_unexpected(
        store: &mut Warehouse,
        transfer: TransferId,
        product: &Product,
        lot: Option<LotId>,
        quantity: Decimal,
        context: &PrepareContext,
    ) -> Result<Vec<(AllocationId, Decimal)>> {
        let t = store.transfer(transfer)?.clone();
        let source = context.location.unwrap_or(t.location_src);

        let mut takes: Vec<(StockUnitId, Decimal)> = Vec::new();
        if store.location(source)?.tracks_reservations() {
            let mut needed = quantity;
            for unit_id in store.units_within(product.id, source) {
                if product.rounding.is_zero(needed) {
                    break;
                }
                let unit = store.stock_unit(unit_id)?;
                if lot.is_some() && unit.lot != lot {
                    continue;
                }
                if context.package.is_some() && unit.package != context.package {
                    continue;
                }
                let take = unit.available().min(needed);
                if product.rounding.is_zero(take) {
                    continue;
                }
                takes.push((unit_id, take));
                needed -= take;
            }
            if !product.rounding.is_zero(needed) {
                return Err(WmsError::InsufficientQuantity {
                    product: product.name.clone(),
                    requested: quantity,
                    available: quantity - needed,
                });
            }
        }

        let demand = Demand::new(product.id, t.location_src, t.location_dest, Decimal::ZERO)
            .with_transfer(transfer)
            .with_transfer_type(t.transfer_type)
            .with_state(DemandState::Assigned);
        let demand = store.add_demand(demand);

        let mut created = Vec::new();
        if takes.is_empty() {
            let allocation = Allocation::for_demand(store.demand(demand)?, Decimal::ZERO)
                .with_location_src(source)
                .with_package(context.package)
                .with_lot(lot);
            created.push((store.add_allocation(allocation), quantity));
        }
        for (unit_id, take) in takes {
            let unit = store.stock_unit(unit_id)?;
            let allocation = Allocation::for_demand(store.demand(demand)?, Decimal::ZERO)
                .with_location_src(unit.location)
                .with_package(unit.package)
                .with_lot(unit.lot)
                .with_owner(unit.owner);
            store.stock_unit_mut(unit_id)?.reserve(take)?;
            created.push((store.add_allocation(allocation), take));
        }
        tracing::info!(
            "調撥單 {} 新增未預期作業：{} 筆分配行，數量 {}",
            t.name,
            created.len(),
            quantity
        );
        Ok(created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use wms_core::{
        Location, LocationUsage, Package, StockUnit, Tracking, Transfer, TransferTypeConfig,
        TransferTypeId,
    };

    struct Fixture {
        store: Warehouse,
        stock: LocationId,
        output: LocationId,
    }

    fn fixture() -> Fixture {
        let mut store = Warehouse::new();
        let stock = store.add_location(Location::new("Stock"));
        let output = store.add_location(Location::new("Output"));
        Fixture {
            store,
            stock,
            output,
        }
    }

    impl Fixture {
        fn transfer_type(&mut self, config: TransferTypeConfig) -> TransferTypeId {
            self.store.add_transfer_type(config)
        }

        fn pick(&mut self, kind: TransferTypeId) -> TransferId {
            self.store
                .add_transfer(Transfer::new("PICK0001", kind, self.stock, self.output))
        }

        fn reserved(
            &mut self,
            transfer: TransferId,
            product: ProductId,
            quantity: i64,
            lot: Option<LotId>,
            package: Option<PackageId>,
        ) -> AllocationId {
            let mut unit = StockUnit::new(product, self.stock, Decimal::from(quantity));
            unit.lot = lot;
            unit.package = package;
            self.store.add_stock(unit);

            let demand = self
                .store
                .add_transfer_demand(transfer, product, Decimal::from(quantity))
                .unwrap();
            let allocation = Allocation::for_demand(
                self.store.demand(demand).unwrap(),
                Decimal::from(quantity),
            )
            .with_lot(lot)
            .with_package(package);
            self.store
                .reserve_for(&allocation, Decimal::from(quantity))
                .unwrap();
            self.store.add_allocation(allocation)
        }
    }

    fn product(tracking: Tracking) -> Product {
        Product::new("Banana", tracking)
    }

    #[rstest]
    #[case(Tracking::Serial, 2, vec!["SN1"], vec![])]
    #[case(Tracking::Lot, 5, vec!["A", "B"], vec![])]
    #[case(Tracking::Lot, 5, vec!["A", "B"], vec![2])]
    #[case(Tracking::Lot, 5, vec!["A", "B"], vec![2, 2])]
    #[case(Tracking::Lot, 5, vec![], vec![])]
    #[case(Tracking::None, 5, vec!["A"], vec![])]
    fn test_malformed_scan(
        #[case] tracking: Tracking,
        #[case] quantity: i64,
        #[case] names: Vec<&str>,
        #[case] quantities: Vec<i64>,
    ) {
        let entry = ScanEntry::new(ProductId(1), Decimal::from(quantity))
            .with_lot_names(names)
            .with_lot_quantities(quantities.into_iter().map(Decimal::from).collect());
        let err = entry.lot_requests(&product(tracking)).unwrap_err();
        assert!(matches!(err, WmsError::MalformedScan(_)));
    }

    #[test]
    fn test_repeated_lot_names() {
        let entry = ScanEntry::new(ProductId(1), Decimal::from(2)).with_lot_names(["SN1", "SN1"]);
        let err = entry.lot_requests(&product(Tracking::Serial)).unwrap_err();
        assert_eq!(
            err,
            WmsError::RepeatedLotNames {
                product: "Banana".to_string(),
                names: vec!["SN1".to_string()],
            }
        );
    }

    #[test]
    fn test_lot_requests_expand_serials() {
        let entry = ScanEntry::new(ProductId(1), Decimal::from(2)).with_lot_names(["SN1", "SN2"]);
        let requests = entry.lot_requests(&product(Tracking::Serial)).unwrap();
        assert_eq!(
            requests,
            vec![
                LotRequest::new("SN1", Decimal::ONE),
                LotRequest::new("SN2", Decimal::ONE)
            ]
        );
    }

    #[test]
    fn test_prepare_untracked_splits_line() {
        let mut f = fixture();
        let kind = f.transfer_type(TransferTypeConfig::new("Pick"));
        let apple = f.store.add_product(product(Tracking::None));
        let transfer = f.pick(kind);
        let line = f.reserved(transfer, apple, 10, None, None);

        let updates = Preparer::prepare(
            &mut f.store,
            transfer,
            &[ScanEntry::new(apple, Decimal::from(4))],
            &PrepareContext::new(),
        )
        .unwrap();

        assert_eq!(updates.allocations(), vec![line]);
        assert_eq!(updates.get(line).unwrap().done_quantity, Decimal::from(4));
        assert_eq!(f.store.allocations_of_transfer(transfer).len(), 2);
        // 比對不寫入完成數量
        assert_eq!(f.store.allocation(line).unwrap().done_quantity, Decimal::ZERO);

        updates.apply(&mut f.store).unwrap();
        assert_eq!(f.store.allocation(line).unwrap().done_quantity, Decimal::from(4));
        assert!(updates.apply(&mut f.store).is_err());
    }

    #[test]
    fn test_prepare_rejects_over_receive() {
        let mut f = fixture();
        let kind = f.transfer_type(TransferTypeConfig::new("Pick"));
        let apple = f.store.add_product(product(Tracking::None));
        let transfer = f.pick(kind);
        f.reserved(transfer, apple, 3, None, None);

        let err = Preparer::prepare(
            &mut f.store,
            transfer,
            &[ScanEntry::new(apple, Decimal::from(5))],
            &PrepareContext::new(),
        )
        .unwrap_err();
        assert!(matches!(err, WmsError::OverReceive { .. }));
    }

    #[test]
    fn test_prepare_creates_unexpected_pick() {
        let mut f = fixture();
        let kind = f.transfer_type(TransferTypeConfig::new("Pick").with_over_receive(true));
        let apple = f.store.add_product(product(Tracking::None));
        let transfer = f.pick(kind);
        let line = f.reserved(transfer, apple, 3, None, None);
        let shelf = f
            .store
            .add_location(Location::new("Shelf 1").with_parent(f.stock));
        f.store
            .add_stock(StockUnit::new(apple, shelf, Decimal::from(4)));

        let updates = Preparer::prepare(
            &mut f.store,
            transfer,
            &[ScanEntry::new(apple, Decimal::from(5))],
            &PrepareContext::new(),
        )
        .unwrap();

        assert_eq!(updates.len(), 2);
        let extra = updates
            .allocations()
            .into_iter()
            .find(|id| *id != line)
            .unwrap();
        let allocation = f.store.allocation(extra).unwrap();
        assert_eq!(allocation.ordered_quantity, Decimal::ZERO);
        assert_eq!(allocation.location_src, shelf);
        assert_eq!(updates.get(extra).unwrap().done_quantity, Decimal::from(2));
        let demand = f.store.demand(allocation.demand).unwrap();
        assert_eq!(demand.initial_quantity, Decimal::ZERO);
        assert_eq!(f.store.reserved_quantity(apple, None), Decimal::from(5));
    }

    #[test]
    fn test_unexpected_pick_needs_free_stock() {
        let mut f = fixture();
        let kind = f.transfer_type(TransferTypeConfig::new("Pick").with_over_receive(true));
        let apple = f.store.add_product(product(Tracking::None));
        let transfer = f.pick(kind);
        f.reserved(transfer, apple, 3, None, None);
        let other = f.pick(kind);
        f.reserved(other, apple, 2, None, None);
        f.store
            .add_stock(StockUnit::new(apple, f.stock, Decimal::ONE));

        let err = Preparer::prepare(
            &mut f.store,
            transfer,
            &[ScanEntry::new(apple, Decimal::from(6))],
            &PrepareContext::new(),
        )
        .unwrap_err();

        assert_eq!(
            err,
            WmsError::InsufficientQuantity {
                product: "Banana".to_string(),
                requested: Decimal::from(3),
                available: Decimal::ONE,
            }
        );
    }

    #[test]
    fn test_prepare_receipt_assigns_new_lot_names() {
        let mut f = fixture();
        let supplier = f
            .store
            .add_location(Location::new("Suppliers").with_usage(LocationUsage::Supplier));
        let kind = f.transfer_type(TransferTypeConfig::new("Goods In"));
        let cherry = f.store.add_product(Product::new("Cherry", Tracking::Serial));
        let transfer = f
            .store
            .add_transfer(Transfer::new("IN0001", kind, supplier, f.stock));
        let demand = f
            .store
            .add_transfer_demand(transfer, cherry, Decimal::from(2))
            .unwrap();
        let allocation = Allocation::for_demand(f.store.demand(demand).unwrap(), Decimal::from(2));
        f.store.add_allocation(allocation);

        let updates = Preparer::prepare(
            &mut f.store,
            transfer,
            &[ScanEntry::new(cherry, Decimal::from(2)).with_lot_names(["SN1", "SN2"])],
            &PrepareContext::new(),
        )
        .unwrap();

        assert_eq!(updates.len(), 2);
        let sn1 = f.store.find_lot(cherry, "SN1").unwrap();
        let sn2 = f.store.find_lot(cherry, "SN2").unwrap();
        let lots: BTreeSet<_> = updates
            .groups()
            .keys()
            .filter_map(|values| values.lot)
            .collect();
        assert_eq!(lots, BTreeSet::from([sn1, sn2]));
    }

    #[test]
    fn test_prepare_tracked_matches_reserved_lot() {
        let mut f = fixture();
        let kind = f.transfer_type(TransferTypeConfig::new("Pick"));
        let cherry = f.store.add_product(Product::new("Cherry", Tracking::Lot));
        let lot = f.store.get_or_create_lot(cherry, "LOT-A");
        let transfer = f.pick(kind);
        let line = f.reserved(transfer, cherry, 6, Some(lot), None);

        let updates = Preparer::prepare(
            &mut f.store,
            transfer,
            &[ScanEntry::new(cherry, Decimal::from(6)).with_lot_names(["LOT-A"])],
            &PrepareContext::new(),
        )
        .unwrap();
        assert_eq!(updates.get(line).unwrap().lot, Some(lot));
        updates.apply(&mut f.store).unwrap();

        let err = Preparer::prepare(
            &mut f.store,
            transfer,
            &[ScanEntry::new(cherry, Decimal::from(6)).with_lot_names(["LOT-A"])],
            &PrepareContext::new(),
        )
        .unwrap_err();
        assert!(matches!(err, WmsError::AlreadyDone(_)));
    }

    #[test]
    fn test_prepare_all_respects_package_tree() {
        let mut f = fixture();
        let kind = f.transfer_type(TransferTypeConfig::new("Pick"));
        let apple = f.store.add_product(product(Tracking::None));
        let pallet = f.store.add_package(Package::new("PALLET01"));
        let crate_a = f.store.add_package(Package::new("CRATE01").with_parent(pallet));
        let loose = f.store.add_package(Package::new("CRATE02"));
        let transfer = f.pick(kind);
        let inside = f.reserved(transfer, apple, 2, None, Some(crate_a));
        f.reserved(transfer, apple, 3, None, Some(loose));

        let updates = Preparer::prepare_all(
            &f.store,
            transfer,
            &PrepareContext::new().with_package(pallet),
        )
        .unwrap();
        assert_eq!(updates.allocations(), vec![inside]);
    }
}
