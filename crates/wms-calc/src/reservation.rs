//! 預留（先進先出）

use rust_decimal::Decimal;
use wms_core::{Allocation, AllocationId, DemandId, Result, TransferId, Warehouse};

/// 預留計算器
pub struct ReservationCalculator;

impl ReservationCalculator {
    /// 為調撥單所有需求預留庫存，返回新建的分配行
    pub fn reserve_transfer(
        store: &mut Warehouse,
        transfer: TransferId,
    ) -> Result<Vec<AllocationId>> {
        let mut created = Vec::new();
        for demand in store.demands_of_transfer(transfer) {
            created.extend(Self::reserve_demand(store, demand)?);
        }
        Ok(created)
    }

    /// 為需求預留庫存
    ///
    /// - 草稿或已結束的需求不預留
    /// - 仍有未結束前置需求時保持等待
    /// - 來源儲位不追蹤預留（例如供應商）時建立一筆不綁定庫存的分配行
    /// - 否則依入庫日期（無日期者優先）逐一預留庫存單位，每個庫存單位一筆分配行
    pub fn reserve_demand(store: &mut Warehouse, demand_id: DemandId) -> Result<Vec<AllocationId>> {
        let demand = store.demand(demand_id)?.clone();
        if demand.state == wms_core::DemandState::Draft || demand.is_closed() {
            return Ok(Vec::new());
        }

        let waiting = store
            .links()
            .predecessors(demand_id)
            .into_iter()
            .any(|p| store.demand(p).is_ok_and(|d| !d.is_closed()));
        if waiting {
            store.recompute_demand_state(demand_id)?;
            return Ok(Vec::new());
        }

        let rounding = store.rounding(demand.product)?;
        let reserved: Decimal = store
            .allocations_of_demand(demand_id)
            .iter()
            .map(|id| store.allocation(*id).map(|a| a.ordered_quantity))
            .sum::<Result<Decimal>>()?;
        let mut needed = rounding.round(demand.current_quantity - reserved);
        if needed <= Decimal::ZERO {
            store.recompute_demand_state(demand_id)?;
            return Ok(Vec::new());
        }

        let mut created = Vec::new();
        if !store.location(demand.location_src)?.tracks_reservations() {
            let allocation = Allocation::for_demand(&demand, needed);
            created.push(store.add_allocation(allocation));
        } else {
            for unit_id in store.units_within(demand.product, demand.location_src) {
                if rounding.is_zero(needed) {
                    break;
                }
                let unit = store.stock_unit(unit_id)?;
                let take = unit.available().min(needed);
                if rounding.is_zero(take) {
                    continue;
                }
                let allocation = Allocation::for_demand(&demand, take)
                    .with_location_src(unit.location)
                    .with_package(unit.package)
                    .with_lot(unit.lot)
                    .with_owner(unit.owner);
                store.stock_unit_mut(unit_id)?.reserve(take)?;
                created.push(store.add_allocation(allocation));
                needed -= take;
            }
        }

        let state = store.recompute_demand_state(demand_id)?;
        tracing::debug!(
            "需求 {} 預留 {} 筆分配行，狀態 {:?}",
            demand_id,
            created.len(),
            state
        );
        Ok(created)
    }
}
