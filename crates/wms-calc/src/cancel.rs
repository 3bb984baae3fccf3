//! 需求取消與傳播

use rust_decimal::Decimal;
use wms_core::{DemandId, DemandState, Result, Rounding, Warehouse, WmsError};

/// 取消計算器
pub struct CancelCalculator;

impl CancelCalculator {
    /// 取消需求，返回所有被取消的需求（含傳播）
    ///
    /// 調撥類型設定 `propagate_cancel` 時沿後續需求傳播：
    /// 數量不超過取消數量的後續需求一併取消，較大者扣減取消數量後繼續往下傳播。
    pub fn cancel_demand(store: &mut Warehouse, demand: DemandId) -> Result<Vec<DemandId>> {
        let mut cancelled = Vec::new();
        Self::cancel_one(store, demand, &mut cancelled)?;
        tracing::info!("取消需求 {}，共取消 {} 筆", demand, cancelled.len());
        Ok(cancelled)
    }

    fn cancel_one(
        store: &mut Warehouse,
        demand_id: DemandId,
        cancelled: &mut Vec<DemandId>,
    ) -> Result<()> {
        let demand = store.demand(demand_id)?.clone();
        match demand.state {
            DemandState::Done => {
                return Err(WmsError::AlreadyDone(format!("需求 {}", demand_id)));
            }
            DemandState::Cancel => return Ok(()),
            _ => {}
        }

        let rounding = store.rounding(demand.product)?;
        let allocations = store.allocations_of_demand(demand_id);
        for &id in &allocations {
            if store.allocation(id)?.is_started(&rounding) {
                return Err(WmsError::InvalidState(format!(
                    "需求 {} 已有完成作業，無法取消",
                    demand_id
                )));
            }
        }
        for id in allocations {
            store.remove_allocation(id)?;
        }
        store.demand_mut(demand_id)?.state = DemandState::Cancel;
        cancelled.push(demand_id);

        let successors = store.links().successors(demand_id);
        if Self::propagates(store, demand_id)? {
            Self::propagate(store, &successors, demand.current_quantity, cancelled)?;
        }
        for successor in successors {
            store.recompute_demand_state(successor)?;
        }
        Ok(())
    }

    fn propagate(
        store: &mut Warehouse,
        successors: &[DemandId],
        quantity: Decimal,
        cancelled: &mut Vec<DemandId>,
    ) -> Result<()> {
        for &successor in successors {
            let demand = store.demand(successor)?.clone();
            if demand.is_closed() {
                continue;
            }
            let rounding = store.rounding(demand.product)?;
            if rounding.at_least(quantity, demand.current_quantity) {
                Self::cancel_one(store, successor, cancelled)?;
                continue;
            }

            let remaining = rounding.round(demand.current_quantity - quantity);
            store.demand_mut(successor)?.current_quantity = remaining;
            Self::trim_reservation(store, successor, remaining, &rounding)?;
            tracing::debug!("後續需求 {} 扣減 {}，剩餘 {}", successor, quantity, remaining);

            if Self::propagates(store, successor)? {
                let next = store.links().successors(successor);
                Self::propagate(store, &next, quantity, cancelled)?;
            }
            store.recompute_demand_state(successor)?;
        }
        Ok(())
    }

    fn propagates(store: &Warehouse, demand: DemandId) -> Result<bool> {
        match store.demand(demand)?.transfer_type {
            Some(kind) => Ok(store.transfer_type(kind)?.propagate_cancel),
            None => Ok(false),
        }
    }

    /// 釋放超出需求數量的預留（由後建立的分配行開始）
    fn trim_reservation(
        store: &mut Warehouse,
        demand: DemandId,
        target: Decimal,
        rounding: &Rounding,
    ) -> Result<()> {
        let allocations = store.allocations_of_demand(demand);
        let mut reserved: Decimal = allocations
            .iter()
            .map(|id| store.allocation(*id).map(|a| a.ordered_quantity))
            .sum::<Result<Decimal>>()?;

        for id in allocations.into_iter().rev() {
            if !rounding.less_than(target, reserved) {
                break;
            }
            let allocation = store.allocation(id)?.clone();
            if allocation.is_started(rounding) {
                continue;
            }
            let excess = reserved - target;
            if rounding.at_least(excess, allocation.ordered_quantity) {
                store.remove_allocation(id)?;
                reserved -= allocation.ordered_quantity;
            } else {
                store.release_for(&allocation, excess)?;
                store.allocation_mut(id)?.ordered_quantity =
                    rounding.round(allocation.ordered_quantity - excess);
                reserved -= excess;
            }
        }
        Ok(())
    }
}
