//! 記錄存放區
//!
//! 所有記錄以 ID 為鍵存放於有序映射中，迭代順序即建立順序。
//! 引擎的每個公開操作都在 [`Warehouse::atomically`] 內執行：
//! 先在副本上運算，全部成功才替換，失敗時不留下任何部分寫入。

use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use crate::allocation::Allocation;
use crate::config::TransferTypeConfig;
use crate::demand::{Demand, DemandLinks, DemandState};
use crate::ids::{
    AllocationId, DemandId, LocationId, LotId, PackageId, PartnerId, ProductId, StockUnitId,
    TransferId, TransferTypeId,
};
use crate::location::{Location, Package};
use crate::product::{Lot, Product};
use crate::quantity::Rounding;
use crate::stock::StockUnit;
use crate::transfer::Transfer;
use crate::{Result, WmsError};

/// 調撥單數量彙總
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TransferQuantities {
    /// 已完成數量
    pub done: Decimal,
    /// 需求總數量
    pub total: Decimal,
    /// 是否有差異（任一需求完成數量 != 需求數量）
    pub has_discrepancies: bool,
}

/// 倉儲記錄存放區
#[derive(Debug, Clone, Default)]
pub struct Warehouse {
    products: BTreeMap<ProductId, Product>,
    locations: BTreeMap<LocationId, Location>,
    packages: BTreeMap<PackageId, Package>,
    lots: BTreeMap<LotId, Lot>,
    stock_units: BTreeMap<StockUnitId, StockUnit>,
    demands: BTreeMap<DemandId, Demand>,
    allocations: BTreeMap<AllocationId, Allocation>,
    transfers: BTreeMap<TransferId, Transfer>,
    transfer_types: BTreeMap<TransferTypeId, TransferTypeConfig>,
    links: DemandLinks,
    backorder_sequences: BTreeMap<TransferId, u32>,
    last_id: u64,
}

fn not_found(kind: &'static str, id: u64) -> WmsError {
    WmsError::NotFound { kind, id }
}

impl Warehouse {
    /// 創建空的存放區
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&mut self) -> u64 {
        self.last_id += 1;
        self.last_id
    }

    /// 原子執行：在副本上執行 `f`，成功才套用
    pub fn atomically<T, F>(&mut self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Warehouse) -> Result<T>,
    {
        let mut working = self.clone();
        let value = f(&mut working)?;
        *self = working;
        Ok(value)
    }

    // ---------------------------------------------------------------
    // 主檔
    // ---------------------------------------------------------------

    pub fn add_product(&mut self, mut product: Product) -> ProductId {
        let id = ProductId(self.next_id());
        product.id = id;
        self.products.insert(id, product);
        id
    }

    pub fn product(&self, id: ProductId) -> Result<&Product> {
        self.products.get(&id).ok_or_else(|| not_found("物料", id.0))
    }

    /// 物料的數量精度
    pub fn rounding(&self, product: ProductId) -> Result<Rounding> {
        Ok(self.product(product)?.rounding)
    }

    pub fn add_location(&mut self, mut location: Location) -> LocationId {
        let id = LocationId(self.next_id());
        location.id = id;
        self.locations.insert(id, location);
        id
    }

    pub fn location(&self, id: LocationId) -> Result<&Location> {
        self.locations.get(&id).ok_or_else(|| not_found("儲位", id.0))
    }

    pub fn locations(&self) -> impl Iterator<Item = &Location> {
        self.locations.values()
    }

    /// `location` 是否等於 `ancestor` 或位於其下
    pub fn is_within(&self, location: LocationId, ancestor: LocationId) -> bool {
        let mut current = Some(location);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.locations.get(&id).and_then(|l| l.parent);
        }
        false
    }

    pub fn add_package(&mut self, mut package: Package) -> PackageId {
        let id = PackageId(self.next_id());
        package.id = id;
        self.packages.insert(id, package);
        id
    }

    pub fn package(&self, id: PackageId) -> Result<&Package> {
        self.packages.get(&id).ok_or_else(|| not_found("包裝", id.0))
    }

    /// 直接子包裝
    pub fn package_children(&self, id: PackageId) -> Vec<PackageId> {
        self.packages
            .values()
            .filter(|p| p.parent == Some(id))
            .map(|p| p.id)
            .collect()
    }

    pub fn add_lot(&mut self, mut lot: Lot) -> LotId {
        let id = LotId(self.next_id());
        lot.id = id;
        self.lots.insert(id, lot);
        id
    }

    pub fn lot(&self, id: LotId) -> Result<&Lot> {
        self.lots.get(&id).ok_or_else(|| not_found("批號", id.0))
    }

    pub fn lot_name(&self, id: Option<LotId>) -> Option<&str> {
        id.and_then(|id| self.lots.get(&id)).map(|l| l.name.as_str())
    }

    /// 依名稱查找物料的批號
    pub fn find_lot(&self, product: ProductId, name: &str) -> Option<LotId> {
        self.lots
            .values()
            .find(|l| l.product == product && l.name == name)
            .map(|l| l.id)
    }

    /// 查找批號，不存在時建立
    pub fn get_or_create_lot(&mut self, product: ProductId, name: &str) -> LotId {
        match self.find_lot(product, name) {
            Some(id) => id,
            None => {
                tracing::debug!("建立新批號 {} (物料 {})", name, product);
                self.add_lot(Lot::new(name, product))
            }
        }
    }

    pub fn add_transfer_type(&mut self, config: TransferTypeConfig) -> TransferTypeId {
        let id = TransferTypeId(self.next_id());
        self.transfer_types.insert(id, config);
        id
    }

    pub fn transfer_type(&self, id: TransferTypeId) -> Result<&TransferTypeConfig> {
        self.transfer_types
            .get(&id)
            .ok_or_else(|| not_found("調撥類型", id.0))
    }

    /// 調撥單所屬類型的配置
    pub fn transfer_config(&self, transfer: TransferId) -> Result<&TransferTypeConfig> {
        self.transfer_type(self.transfer(transfer)?.transfer_type)
    }

    // ---------------------------------------------------------------
    // 庫存單位
    // ---------------------------------------------------------------

    pub fn add_stock(&mut self, mut unit: StockUnit) -> StockUnitId {
        let id = StockUnitId(self.next_id());
        unit.id = id;
        self.stock_units.insert(id, unit);
        id
    }

    pub fn stock_unit(&self, id: StockUnitId) -> Result<&StockUnit> {
        self.stock_units
            .get(&id)
            .ok_or_else(|| not_found("庫存單位", id.0))
    }

    pub fn stock_unit_mut(&mut self, id: StockUnitId) -> Result<&mut StockUnit> {
        self.stock_units
            .get_mut(&id)
            .ok_or_else(|| not_found("庫存單位", id.0))
    }

    pub fn stock_units(&self) -> impl Iterator<Item = &StockUnit> {
        self.stock_units.values()
    }

    /// 位於 `location` 之下的物料庫存單位，依入庫日期排序（無日期者優先）
    pub fn units_within(&self, product: ProductId, location: LocationId) -> Vec<StockUnitId> {
        let mut units: Vec<&StockUnit> = self
            .stock_units
            .values()
            .filter(|u| u.product == product && self.is_within(u.location, location))
            .collect();
        units.sort_by(|a, b| a.in_date.cmp(&b.in_date).then(a.id.cmp(&b.id)));
        units.into_iter().map(|u| u.id).collect()
    }

    fn units_exact(
        &self,
        product: ProductId,
        location: LocationId,
        package: Option<PackageId>,
        lot: Option<LotId>,
        owner: Option<PartnerId>,
    ) -> Vec<StockUnitId> {
        self.units_within(product, location)
            .into_iter()
            .filter(|id| {
                self.stock_units.get(id).is_some_and(|u| {
                    u.location == location && u.matches(product, package, lot, owner)
                })
            })
            .collect()
    }

    fn reserves_at(&self, location: LocationId) -> bool {
        self.locations
            .get(&location)
            .is_some_and(|l| l.tracks_reservations())
    }

    /// 在完全符合維度的庫存單位上預留數量
    pub fn reserve_stock(
        &mut self,
        product: ProductId,
        location: LocationId,
        package: Option<PackageId>,
        lot: Option<LotId>,
        owner: Option<PartnerId>,
        quantity: Decimal,
    ) -> Result<()> {
        if quantity <= Decimal::ZERO || !self.reserves_at(location) {
            return Ok(());
        }
        let units = self.units_exact(product, location, package, lot, owner);
        let available: Decimal = units
            .iter()
            .filter_map(|id| self.stock_units.get(id))
            .map(|u| u.available())
            .sum();
        if available < quantity {
            return Err(WmsError::InsufficientQuantity {
                product: self.product(product)?.name.clone(),
                requested: quantity,
                available,
            });
        }

        let mut remaining = quantity;
        for id in units {
            if remaining <= Decimal::ZERO {
                break;
            }
            let unit = self.stock_unit_mut(id)?;
            let take = unit.available().min(remaining);
            if take > Decimal::ZERO {
                unit.reserve(take)?;
                remaining -= take;
            }
        }
        Ok(())
    }

    /// 在完全符合維度的庫存單位上釋放預留
    pub fn unreserve_stock(
        &mut self,
        product: ProductId,
        location: LocationId,
        package: Option<PackageId>,
        lot: Option<LotId>,
        owner: Option<PartnerId>,
        quantity: Decimal,
    ) -> Result<()> {
        if quantity <= Decimal::ZERO || !self.reserves_at(location) {
            return Ok(());
        }
        let units = self.units_exact(product, location, package, lot, owner);
        let reserved: Decimal = units
            .iter()
            .filter_map(|id| self.stock_units.get(id))
            .map(|u| u.reserved_quantity)
            .sum();
        if reserved < quantity {
            return Err(WmsError::Reservation(format!(
                "物料 {} 在儲位 {} 只預留 {}, 無法釋放 {}",
                product, location, reserved, quantity
            )));
        }

        let mut remaining = quantity;
        for id in units.into_iter().rev() {
            if remaining <= Decimal::ZERO {
                break;
            }
            let unit = self.stock_unit_mut(id)?;
            let give = unit.reserved_quantity.min(remaining);
            if give > Decimal::ZERO {
                unit.unreserve(give)?;
                remaining -= give;
            }
        }
        Ok(())
    }

    /// 為分配行預留其庫存維度上的數量
    pub fn reserve_for(&mut self, allocation: &Allocation, quantity: Decimal) -> Result<()> {
        self.reserve_stock(
            allocation.product,
            allocation.location_src,
            allocation.package,
            allocation.lot,
            allocation.owner,
            quantity,
        )
    }

    /// 釋放分配行庫存維度上的預留
    pub fn release_for(&mut self, allocation: &Allocation, quantity: Decimal) -> Result<()> {
        self.unreserve_stock(
            allocation.product,
            allocation.location_src,
            allocation.package,
            allocation.lot,
            allocation.owner,
            quantity,
        )
    }

    /// 物料（可選批號）的總預留數量
    pub fn reserved_quantity(&self, product: ProductId, lot: Option<LotId>) -> Decimal {
        self.stock_units
            .values()
            .filter(|u| u.product == product && (lot.is_none() || u.lot == lot))
            .map(|u| u.reserved_quantity)
            .sum()
    }

    /// 批號在 `location` 之下的現有數量
    pub fn lot_quantity_within(&self, lot: LotId, location: LocationId) -> Decimal {
        self.stock_units
            .values()
            .filter(|u| u.lot == Some(lot) && self.is_within(u.location, location))
            .map(|u| u.quantity)
            .sum()
    }

    /// 從儲位扣除實體數量（呼叫前應已釋放對應預留）
    ///
    /// 只扣除未預留的部分；會動到其他分配行的預留時失敗。
    pub fn consume_stock(
        &mut self,
        product: ProductId,
        location: LocationId,
        package: Option<PackageId>,
        lot: Option<LotId>,
        owner: Option<PartnerId>,
        quantity: Decimal,
    ) -> Result<()> {
        if quantity <= Decimal::ZERO || !self.reserves_at(location) {
            return Ok(());
        }
        let units = self.units_exact(product, location, package, lot, owner);
        let (on_hand, free) = units
            .iter()
            .filter_map(|id| self.stock_units.get(id))
            .fold((Decimal::ZERO, Decimal::ZERO), |(on_hand, free), u| {
                (on_hand + u.quantity, free + u.available())
            });
        if on_hand < quantity {
            return Err(WmsError::InsufficientQuantity {
                product: self.product(product)?.name.clone(),
                requested: quantity,
                available: on_hand,
            });
        }
        if free < quantity {
            return Err(WmsError::Reservation(format!(
                "物料 {} 在儲位 {} 可用 {}, 扣除 {} 會動到其他作業的預留",
                self.product(product)?.name,
                self.location(location)?.name,
                free,
                quantity
            )));
        }

        let mut remaining = quantity;
        for id in units {
            if remaining <= Decimal::ZERO {
                break;
            }
            let unit = self.stock_unit_mut(id)?;
            let take = unit.available().min(remaining);
            if take <= Decimal::ZERO {
                continue;
            }
            unit.quantity -= take;
            remaining -= take;
            if unit.quantity.is_zero() {
                self.stock_units.remove(&id);
            }
        }
        Ok(())
    }

    /// 在儲位增加實體數量，沒有相同維度的庫存單位時建立
    pub fn receive_stock(
        &mut self,
        product: ProductId,
        location: LocationId,
        package: Option<PackageId>,
        lot: Option<LotId>,
        owner: Option<PartnerId>,
        quantity: Decimal,
    ) -> Result<()> {
        if quantity <= Decimal::ZERO || !self.reserves_at(location) {
            return Ok(());
        }
        match self
            .units_exact(product, location, package, lot, owner)
            .first()
            .copied()
        {
            Some(id) => self.stock_unit_mut(id)?.quantity += quantity,
            None => {
                let mut unit = StockUnit::new(product, location, quantity);
                unit.package = package;
                unit.lot = lot;
                unit.owner = owner;
                self.add_stock(unit);
            }
        }
        Ok(())
    }

    // ---------------------------------------------------------------
    // 需求
    // ---------------------------------------------------------------

    pub fn add_demand(&mut self, mut demand: Demand) -> DemandId {
        let id = DemandId(self.next_id());
        demand.id = id;
        self.demands.insert(id, demand);
        id
    }

    pub fn demand(&self, id: DemandId) -> Result<&Demand> {
        self.demands.get(&id).ok_or_else(|| not_found("需求", id.0))
    }

    pub fn demand_mut(&mut self, id: DemandId) -> Result<&mut Demand> {
        self.demands.get_mut(&id).ok_or_else(|| not_found("需求", id.0))
    }

    pub fn demands_of_transfer(&self, transfer: TransferId) -> Vec<DemandId> {
        self.demands
            .values()
            .filter(|d| d.transfer == Some(transfer))
            .map(|d| d.id)
            .collect()
    }

    /// 刪除需求及其關聯（分配行須先移走）
    pub fn remove_demand(&mut self, id: DemandId) -> Result<Demand> {
        if !self.allocations_of_demand(id).is_empty() {
            return Err(WmsError::InvalidState(format!("需求 {} 仍有分配行，無法刪除", id)));
        }
        self.links.remove(id);
        self.demands.remove(&id).ok_or_else(|| not_found("需求", id.0))
    }

    pub fn links(&self) -> &DemandLinks {
        &self.links
    }

    pub fn links_mut(&mut self) -> &mut DemandLinks {
        &mut self.links
    }

    /// 依預留數量重新計算需求狀態
    pub fn recompute_demand_state(&mut self, id: DemandId) -> Result<DemandState> {
        let demand = self.demand(id)?;
        if matches!(
            demand.state,
            DemandState::Draft | DemandState::Done | DemandState::Cancel
        ) {
            return Ok(demand.state);
        }

        let rounding = self.rounding(demand.product)?;
        let current = demand.current_quantity;
        let reserved: Decimal = self
            .allocations
            .values()
            .filter(|a| a.demand == id)
            .map(|a| a.ordered_quantity)
            .sum();
        let waiting = self
            .links
            .predecessors(id)
            .iter()
            .any(|p| self.demands.get(p).is_some_and(|d| !d.is_closed()));

        let state = if rounding.at_least(reserved, current) {
            DemandState::Assigned
        } else if !rounding.is_zero(reserved) {
            DemandState::PartiallyAvailable
        } else if waiting {
            DemandState::Waiting
        } else {
            DemandState::Confirmed
        };

        self.demand_mut(id)?.state = state;
        Ok(state)
    }

    // ---------------------------------------------------------------
    // 分配行
    // ---------------------------------------------------------------

    pub fn add_allocation(&mut self, mut allocation: Allocation) -> AllocationId {
        let id = AllocationId(self.next_id());
        allocation.id = id;
        self.allocations.insert(id, allocation);
        id
    }

    pub fn allocation(&self, id: AllocationId) -> Result<&Allocation> {
        self.allocations
            .get(&id)
            .ok_or_else(|| not_found("分配行", id.0))
    }

    pub fn allocation_mut(&mut self, id: AllocationId) -> Result<&mut Allocation> {
        self.allocations
            .get_mut(&id)
            .ok_or_else(|| not_found("分配行", id.0))
    }

    pub fn allocations(&self) -> impl Iterator<Item = &Allocation> {
        self.allocations.values()
    }

    pub fn allocations_of_transfer(&self, transfer: TransferId) -> Vec<AllocationId> {
        self.allocations
            .values()
            .filter(|a| a.transfer == Some(transfer))
            .map(|a| a.id)
            .collect()
    }

    pub fn allocations_of_demand(&self, demand: DemandId) -> Vec<AllocationId> {
        self.allocations
            .values()
            .filter(|a| a.demand == demand)
            .map(|a| a.id)
            .collect()
    }

    /// 拆分分配行：原分配行保留 `keep`，其餘數量移到新分配行
    ///
    /// 兩者指向同一庫存，預留總量不變。新分配行完成數量為 0，不帶目的包裝。
    pub fn split_allocation(
        &mut self,
        id: AllocationId,
        keep: Decimal,
        rounding: &Rounding,
    ) -> Result<AllocationId> {
        let original = self.allocation(id)?;
        if rounding.less_than(keep, original.done_quantity) {
            return Err(WmsError::PartialLineSplit(format!(
                "分配行 {} 已完成 {}, 不能只保留 {}",
                id, original.done_quantity, keep
            )));
        }
        let rest = rounding.round(original.ordered_quantity - keep);
        if rest <= Decimal::ZERO {
            return Err(WmsError::InvalidState(format!(
                "分配行 {} 數量 {} 不足以拆出 {}",
                id, original.ordered_quantity, keep
            )));
        }

        let mut overflow = original.clone();
        overflow.ordered_quantity = rest;
        overflow.done_quantity = Decimal::ZERO;
        overflow.result_package = None;

        self.allocation_mut(id)?.ordered_quantity = keep;
        let new_id = self.add_allocation(overflow);
        tracing::debug!("拆分分配行 {} → 保留 {}, 新分配行 {} 數量 {}", id, keep, new_id, rest);
        Ok(new_id)
    }

    /// 刪除分配行並釋放其預留
    pub fn remove_allocation(&mut self, id: AllocationId) -> Result<Allocation> {
        let allocation = self.allocation(id)?.clone();
        self.release_for(&allocation, allocation.ordered_quantity)?;
        self.allocations.remove(&id);
        Ok(allocation)
    }

    /// 刪除分配行但不釋放預留（預留已由其他分配行承接）
    pub fn forget_allocation(&mut self, id: AllocationId) -> Result<Allocation> {
        self.allocations
            .remove(&id)
            .ok_or_else(|| not_found("分配行", id.0))
    }

    // ---------------------------------------------------------------
    // 調撥單
    // ---------------------------------------------------------------

    /// 新增調撥單；未指定欠交鏈根時以自身為根
    pub fn add_transfer(&mut self, mut transfer: Transfer) -> TransferId {
        let id = TransferId(self.next_id());
        transfer.id = id;
        if transfer.root == TransferId::default() {
            transfer.root = id;
        }
        self.transfers.insert(id, transfer);
        id
    }

    pub fn transfer(&self, id: TransferId) -> Result<&Transfer> {
        self.transfers.get(&id).ok_or_else(|| not_found("調撥單", id.0))
    }

    pub fn transfer_mut(&mut self, id: TransferId) -> Result<&mut Transfer> {
        self.transfers
            .get_mut(&id)
            .ok_or_else(|| not_found("調撥單", id.0))
    }

    pub fn transfers(&self) -> impl Iterator<Item = &Transfer> {
        self.transfers.values()
    }

    /// 刪除空的調撥單
    pub fn remove_transfer(&mut self, id: TransferId) -> Result<Transfer> {
        if !self.demands_of_transfer(id).is_empty() || !self.allocations_of_transfer(id).is_empty()
        {
            return Err(WmsError::InvalidState(format!(
                "調撥單 {} 非空，無法刪除",
                self.transfer(id)?.name
            )));
        }
        self.transfers.remove(&id).ok_or_else(|| not_found("調撥單", id.0))
    }

    /// 在調撥單上新增需求（沿用調撥單的儲位與類型）
    pub fn add_transfer_demand(
        &mut self,
        transfer: TransferId,
        product: ProductId,
        quantity: Decimal,
    ) -> Result<DemandId> {
        let t = self.transfer(transfer)?;
        let demand = Demand::new(product, t.location_src, t.location_dest, quantity)
            .with_transfer(transfer)
            .with_transfer_type(t.transfer_type);
        self.product(product)?;
        Ok(self.add_demand(demand))
    }

    /// 調撥單狀態：非取消需求中最差的狀態
    pub fn transfer_state(&self, id: TransferId) -> Result<DemandState> {
        self.transfer(id)?;
        let states: Vec<DemandState> = self
            .demands
            .values()
            .filter(|d| d.transfer == Some(id))
            .map(|d| d.state)
            .collect();
        if states.is_empty() {
            return Ok(DemandState::Draft);
        }
        Ok(states
            .iter()
            .copied()
            .filter(|s| *s != DemandState::Cancel)
            .min()
            .unwrap_or(DemandState::Cancel))
    }

    /// 欠交鏈最後使用的序號
    pub fn last_backorder_sequence(&self, root: TransferId) -> u32 {
        self.backorder_sequences.get(&root).copied().unwrap_or(0)
    }

    pub fn set_last_backorder_sequence(&mut self, root: TransferId, sequence: u32) {
        self.backorder_sequences.insert(root, sequence);
    }

    pub fn post_note(&mut self, transfer: TransferId, body: impl Into<String>) -> Result<()> {
        self.transfer_mut(transfer)?.post_note(body);
        Ok(())
    }

    /// 調撥單完成數量、需求總量與差異標記
    pub fn transfer_quantities(&self, id: TransferId) -> Result<TransferQuantities> {
        let mut quantities = TransferQuantities {
            done: Decimal::ZERO,
            total: Decimal::ZERO,
            has_discrepancies: false,
        };
        for demand in self
            .demands
            .values()
            .filter(|d| d.transfer == Some(id) && d.state != DemandState::Cancel)
        {
            let done: Decimal = self
                .allocations
                .values()
                .filter(|a| a.demand == demand.id)
                .map(|a| a.done_quantity)
                .sum();
            if done != demand.current_quantity {
                quantities.has_discrepancies = true;
            }
            quantities.done += done;
            quantities.total += demand.current_quantity;
        }
        Ok(quantities)
    }

    fn transfers_of(&self, demands: impl IntoIterator<Item = DemandId>) -> BTreeSet<TransferId> {
        demands
            .into_iter()
            .filter_map(|d| self.demands.get(&d).and_then(|d| d.transfer))
            .collect()
    }

    /// 上一張調撥單（前置需求所在）
    pub fn previous_transfers(&self, id: TransferId) -> BTreeSet<TransferId> {
        let preds = self
            .demands_of_transfer(id)
            .into_iter()
            .flat_map(|d| self.links.predecessors(d));
        self.transfers_of(preds)
    }

    /// 下一張調撥單（後續需求所在）
    pub fn next_transfers(&self, id: TransferId) -> BTreeSet<TransferId> {
        let succs = self
            .demands_of_transfer(id)
            .into_iter()
            .flat_map(|d| self.links.successors(d));
        self.transfers_of(succs)
    }

    /// 鏈上最初的調撥單（沒有前置需求的需求所在）
    pub fn first_transfers(&self, id: TransferId) -> BTreeSet<TransferId> {
        let roots = self.links.roots(&self.demands_of_transfer(id));
        self.transfers_of(roots)
    }

    /// 由此調撥單建立的欠交單
    pub fn created_backorders(&self, id: TransferId) -> Vec<TransferId> {
        self.transfers
            .values()
            .filter(|t| t.backorder_of == Some(id))
            .map(|t| t.id)
            .collect()
    }
}
