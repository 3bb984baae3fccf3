//! 欠交引擎
//!
//! 已完成的作業留在原調撥單，未完成的需求拆到新的欠交單。
//! 欠交單以欠交鏈的最初調撥單命名：`ROOT-001`、`ROOT-002`…

use rust_decimal::Decimal;
use wms_core::{
    AllocationId, DemandId, Result, Transfer, TransferId, Warehouse, WmsError,
};

/// 欠交引擎
pub struct BackorderEngine;

impl BackorderEngine {
    /// 調撥單是否需要欠交：任一未結束需求未被完整作業的分配行涵蓋
    pub fn requires_backorder(store: &Warehouse, transfer: TransferId) -> Result<bool> {
        for demand_id in store.demands_of_transfer(transfer) {
            let demand = store.demand(demand_id)?;
            if demand.is_closed() {
                continue;
            }
            let rounding = store.rounding(demand.product)?;
            let covered: Decimal = store
                .allocations_of_demand(demand_id)
                .iter()
                .filter_map(|id| store.allocation(*id).ok())
                .filter(|a| a.is_fully_worked(&rounding))
                .map(|a| a.accounted_quantity())
                .sum();
            if rounding.less_than(covered, demand.current_quantity) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// 拆分單一需求：保留 `retained` 分配行，其餘移到需求副本
    ///
    /// 保留數量已涵蓋需求時返回 `None`。副本不屬於任何調撥單。
    pub fn split_out_move(
        store: &mut Warehouse,
        demand: DemandId,
        retained: &[AllocationId],
    ) -> Result<Option<DemandId>> {
        let original = store.demand(demand)?.clone();
        let rounding = store.rounding(original.product)?;
        let own = store.allocations_of_demand(demand);

        let foreign: Vec<AllocationId> = retained
            .iter()
            .copied()
            .filter(|id| !own.contains(id))
            .collect();
        if !foreign.is_empty() {
            let transfer = match original.transfer {
                Some(t) => store.transfer(t)?.name.clone(),
                None => "-".to_string(),
            };
            return Err(WmsError::TransferMismatch {
                transfer,
                allocations: foreign,
            });
        }
        Self::check_whole_lines(store, &own)?;

        let retained_quantity: Decimal = retained
            .iter()
            .map(|id| store.allocation(*id).map(|a| a.accounted_quantity()))
            .sum::<Result<Decimal>>()?;
        if rounding.at_least(retained_quantity, original.current_quantity) {
            return Ok(None);
        }

        let moved: Vec<AllocationId> = own
            .into_iter()
            .filter(|id| !retained.contains(id))
            .collect();
        let quantity = rounding.round(original.current_quantity - retained_quantity);
        Self::split_off(store, demand, &moved, quantity).map(Some)
    }

    /// 拆分整張調撥單，返回新建的欠交單
    ///
    /// `retained` 為空值時保留所有完整作業的分配行。沒有需要拆分的需求時返回 `None`，
    /// 不做任何修改。
    pub fn backorder_move_lines(
        store: &mut Warehouse,
        transfer: TransferId,
        retained: Option<&[AllocationId]>,
    ) -> Result<Option<TransferId>> {
        let original = store.transfer(transfer)?.clone();
        let config = store.transfer_type(original.transfer_type)?.clone();
        let allocations = store.allocations_of_transfer(transfer);

        let retained: Vec<AllocationId> = match retained {
            Some(ids) => {
                let foreign: Vec<AllocationId> = ids
                    .iter()
                    .copied()
                    .filter(|id| !allocations.contains(id))
                    .collect();
                if !foreign.is_empty() {
                    return Err(WmsError::TransferMismatch {
                        transfer: original.name,
                        allocations: foreign,
                    });
                }
                ids.to_vec()
            }
            None => {
                let mut fully_worked = Vec::new();
                for &id in &allocations {
                    let allocation = store.allocation(id)?;
                    if allocation.is_fully_worked(&store.rounding(allocation.product)?) {
                        fully_worked.push(id);
                    }
                }
                fully_worked
            }
        };

        if retained.is_empty() {
            let mut started = false;
            for &id in &allocations {
                let allocation = store.allocation(id)?;
                started |= allocation.is_started(&store.rounding(allocation.product)?);
            }
            if !started {
                return Err(WmsError::NothingToBackorder(original.name));
            }
        }

        // 先決定哪些需求要拆分，出錯時不留下任何修改
        let mut plan: Vec<(DemandId, Vec<AllocationId>)> = Vec::new();
        for demand_id in store.demands_of_transfer(transfer) {
            let demand = store.demand(demand_id)?;
            if demand.is_closed() {
                continue;
            }
            let rounding = store.rounding(demand.product)?;
            let own = store.allocations_of_demand(demand_id);
            Self::check_whole_lines(store, &own)?;

            let kept: Vec<AllocationId> = own
                .into_iter()
                .filter(|id| retained.contains(id))
                .collect();
            let kept_quantity: Decimal = kept
                .iter()
                .filter_map(|id| store.allocation(*id).ok())
                .map(|a| a.accounted_quantity())
                .sum();
            if rounding.less_than(kept_quantity, demand.current_quantity) {
                plan.push((demand_id, kept));
            }
        }
        if plan.is_empty() {
            tracing::debug!("調撥單 {} 不需要欠交", original.name);
            return Ok(None);
        }

        let root_name = store.transfer(original.root)?.name.clone();
        let sequence = store.last_backorder_sequence(original.root) + 1;
        if sequence > config.max_backorder_sequence {
            return Err(WmsError::SequenceExceeded {
                root: root_name,
                max: config.max_backorder_sequence,
            });
        }

        let mut backorder = Transfer::new(
            format!("{}-{:03}", root_name, sequence),
            original.transfer_type,
            original.location_src,
            original.location_dest,
        );
        backorder.origin = original.origin.clone();
        backorder.partner = original.partner;
        backorder.priority = original.priority;
        backorder.scheduled_date = original.scheduled_date;
        if config.backorder_preserve_batch {
            backorder.batch = original.batch;
        }
        backorder.backorder_of = Some(transfer);
        backorder.root = original.root;
        backorder.sequence = sequence;
        let backorder_id = store.add_transfer(backorder);
        store.set_last_backorder_sequence(original.root, sequence);

        for (demand_id, kept) in plan {
            if let Some(copy) = Self::split_out_move(store, demand_id, &kept)? {
                Self::rehome(store, copy, backorder_id)?;
            }
        }

        tracing::info!(
            "調撥單 {} 建立欠交單 {}",
            original.name,
            store.transfer(backorder_id)?.name
        );
        Ok(Some(backorder_id))
    }

    /// 把需求及其分配行移到調撥單 `transfer`
    pub(crate) fn rehome(
        store: &mut Warehouse,
        demand: DemandId,
        transfer: TransferId,
    ) -> Result<()> {
        store.demand_mut(demand)?.transfer = Some(transfer);
        for id in store.allocations_of_demand(demand) {
            store.allocation_mut(id)?.transfer = Some(transfer);
        }
        Ok(())
    }

    /// 建立數量為 `quantity` 的需求副本並把 `moved` 分配行移過去
    ///
    /// 副本繼承原需求的後續需求與尚未結束的前置需求。
    pub(crate) fn split_off(
        store: &mut Warehouse,
        demand: DemandId,
        moved: &[AllocationId],
        quantity: Decimal,
    ) -> Result<DemandId> {
        let original = store.demand(demand)?.clone();
        let rounding = store.rounding(original.product)?;

        let mut copy = original.clone();
        copy.transfer = None;
        copy.current_quantity = quantity;
        copy.initial_quantity = quantity;
        let copy_id = store.add_demand(copy);

        for &id in moved {
            let allocation = store.allocation_mut(id)?;
            allocation.demand = copy_id;
            allocation.transfer = None;
        }

        let remaining = rounding
            .round(original.current_quantity - quantity)
            .max(Decimal::ZERO);
        let shrunk = store.demand_mut(demand)?;
        shrunk.current_quantity = remaining;
        shrunk.initial_quantity = remaining;

        for successor in store.links().successors(demand) {
            store.links_mut().link(copy_id, successor);
        }
        for predecessor in store.links().predecessors(demand) {
            if !store.demand(predecessor)?.is_closed() {
                store.links_mut().link(predecessor, copy_id);
            }
        }

        store.recompute_demand_state(demand)?;
        store.recompute_demand_state(copy_id)?;
        tracing::debug!(
            "需求 {} 拆出 {} 數量 {}，保留 {}",
            demand,
            copy_id,
            quantity,
            remaining
        );
        Ok(copy_id)
    }

    fn check_whole_lines(store: &Warehouse, allocations: &[AllocationId]) -> Result<()> {
        for &id in allocations {
            let allocation = store.allocation(id)?;
            if allocation.is_partially_worked(&store.rounding(allocation.product)?) {
                return Err(WmsError::PartialLineSplit(format!(
                    "分配行 {} 已完成 {} / {}",
                    id, allocation.done_quantity, allocation.ordered_quantity
                )));
            }
        }
        Ok(())
    }
}
