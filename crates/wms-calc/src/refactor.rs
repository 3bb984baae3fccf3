//! 調撥單重構策略

use rust_decimal::Decimal;
use std::collections::BTreeMap;
use wms_core::{
    Allocation, AllocationId, AllocationKeyField, DemandId, RefactorAction, Result, Transfer,
    TransferId, Warehouse,
};

use crate::backorder::BackorderEngine;
use crate::merge::Merger;

/// 重構計算器
pub struct RefactorCalculator;

impl RefactorCalculator {
    /// 執行重構動作，返回新建的調撥單
    pub fn apply(
        store: &mut Warehouse,
        transfer: TransferId,
        action: RefactorAction,
    ) -> Result<Vec<TransferId>> {
        tracing::debug!("調撥單 {} 執行重構 {:?}", transfer, action);
        match action {
            RefactorAction::MergeAllocations => {
                Merger::merge(store, transfer)?;
                Ok(Vec::new())
            }
            RefactorAction::GroupByAllocationKey(field) => {
                Self::group_by_allocation_key(store, transfer, field)
            }
        }
    }

    fn key(allocation: &Allocation, field: AllocationKeyField) -> Option<u64> {
        match field {
            AllocationKeyField::SourceLocation => Some(allocation.location_src.0),
            AllocationKeyField::DestinationLocation => Some(allocation.location_dest.0),
            AllocationKeyField::Package => allocation.package.map(|p| p.0),
        }
    }

    /// 依分配行欄位分組，每組移到新的調撥單
    ///
    /// 只有一組時不動。未預留的需求數量留在原調撥單；原調撥單清空後標記為空。
    fn group_by_allocation_key(
        store: &mut Warehouse,
        transfer: TransferId,
        field: AllocationKeyField,
    ) -> Result<Vec<TransferId>> {
        let mut groups: BTreeMap<Option<u64>, Vec<AllocationId>> = BTreeMap::new();
        for id in store.allocations_of_transfer(transfer) {
            let allocation = store.allocation(id)?;
            if store.demand(allocation.demand)?.is_closed() {
                continue;
            }
            groups
                .entry(Self::key(allocation, field))
                .or_default()
                .push(id);
        }
        if groups.len() <= 1 {
            return Ok(Vec::new());
        }

        let original = store.transfer(transfer)?.clone();
        let mut created = Vec::new();
        for (index, ids) in groups.into_values().enumerate() {
            let mut split = Transfer::new(
                format!("{}/{}", original.name, index + 1),
                original.transfer_type,
                original.location_src,
                original.location_dest,
            );
            split.origin = original.origin.clone();
            split.partner = original.partner;
            split.priority = original.priority;
            split.scheduled_date = original.scheduled_date;
            split.batch = original.batch;
            let split_id = store.add_transfer(split);

            let mut by_demand: BTreeMap<DemandId, Vec<AllocationId>> = BTreeMap::new();
            for id in ids {
                by_demand.entry(store.allocation(id)?.demand).or_default().push(id);
            }
            for (demand, moved) in by_demand {
                let rounding = store.rounding(store.demand(demand)?.product)?;
                let quantity: Decimal = moved
                    .iter()
                    .map(|id| store.allocation(*id).map(|a| a.accounted_quantity()))
                    .sum::<Result<Decimal>>()?;
                let current = store.demand(demand)?.current_quantity;
                let whole = rounding.at_least(quantity, current)
                    && store.allocations_of_demand(demand).len() == moved.len();

                let target = if whole {
                    demand
                } else {
                    BackorderEngine::split_off(store, demand, &moved, quantity)?
                };
                BackorderEngine::rehome(store, target, split_id)?;
            }
            created.push(split_id);
        }

        // 已被完整拆走的需求
        for demand in store.demands_of_transfer(transfer) {
            let rounding = store.rounding(store.demand(demand)?.product)?;
            if rounding.is_zero(store.demand(demand)?.current_quantity)
                && store.allocations_of_demand(demand).is_empty()
            {
                store.remove_demand(demand)?;
            }
        }
        if store.demands_of_transfer(transfer).is_empty() {
            store.transfer_mut(transfer)?.is_empty = true;
        }

        tracing::info!(
            "調撥單 {} 依 {:?} 拆成 {} 張",
            original.name,
            field,
            created.len()
        );
        Ok(created)
    }
}
