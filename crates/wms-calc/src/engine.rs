//! 調撥單流程入口
//!
//! 每個公開操作都在 [`Warehouse::atomically`] 內執行，失敗時存放區保持原狀。

use rust_decimal::Decimal;
use wms_core::{
    AllocationId, DemandId, DemandState, LocationId, RefactorAction, Result, TransferId, Warehouse,
    WmsError,
};

use crate::backorder::BackorderEngine;
use crate::cancel::CancelCalculator;
use crate::destination::{DestinationPolicy, NoSuggestion};
use crate::merge::Merger;
use crate::prepare::{PrepareContext, Preparer, ScanEntry};
use crate::refactor::RefactorCalculator;
use crate::reservation::ReservationCalculator;
use crate::splitter::{SplitOutcome, Splitter};

/// 標記完成請求
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MarkDoneRequest {
    /// 掃描輸入；為空時候選分配行全部標記完成
    pub entries: Vec<ScanEntry>,
    pub context: PrepareContext,
}

impl MarkDoneRequest {
    pub fn new() -> Self {
        Self::default()
    }

    /// 建構器模式：新增掃描輸入
    pub fn with_entry(mut self, entry: ScanEntry) -> Self {
        self.entries.push(entry);
        self
    }

    /// 建構器模式：設置掃描情境
    pub fn with_context(mut self, context: PrepareContext) -> Self {
        self.context = context;
        self
    }
}

/// 調撥單引擎
pub struct TransferEngine<P: DestinationPolicy = NoSuggestion> {
    policy: P,
}

impl TransferEngine<NoSuggestion> {
    /// 創建不帶目的儲位建議的引擎
    pub fn new() -> Self {
        Self {
            policy: NoSuggestion,
        }
    }
}

impl Default for TransferEngine<NoSuggestion> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: DestinationPolicy> TransferEngine<P> {
    /// 創建帶目的儲位建議策略的引擎
    pub fn with_policy(policy: P) -> Self {
        Self { policy }
    }

    /// 確認調撥單：草稿需求轉為確認（或等待前置需求），執行確認後重構
    pub fn confirm(&self, store: &mut Warehouse, transfer: TransferId) -> Result<Vec<TransferId>> {
        store.atomically(|tx| {
            Self::ensure_open(tx, transfer)?;
            let demands = tx.demands_of_transfer(transfer);
            if demands.is_empty() {
                return Err(WmsError::InvalidState(format!(
                    "調撥單 {} 沒有需求",
                    tx.transfer(transfer)?.name
                )));
            }
            for demand in demands {
                if tx.demand(demand)?.state == DemandState::Draft {
                    tx.demand_mut(demand)?.state = DemandState::Confirmed;
                    tx.recompute_demand_state(demand)?;
                }
            }
            tracing::info!("確認調撥單 {}", tx.transfer(transfer)?.name);

            match tx.transfer_config(transfer)?.post_confirm_action {
                Some(action) => RefactorCalculator::apply(tx, transfer, action),
                None => Ok(Vec::new()),
            }
        })
    }

    /// 預留調撥單庫存，執行預留後重構
    pub fn assign(&self, store: &mut Warehouse, transfer: TransferId) -> Result<Vec<AllocationId>> {
        store.atomically(|tx| {
            Self::ensure_open(tx, transfer)?;
            let created = ReservationCalculator::reserve_transfer(tx, transfer)?;
            tracing::info!(
                "調撥單 {} 預留完成，新建 {} 筆分配行",
                tx.transfer(transfer)?.name,
                created.len()
            );
            if let Some(action) = tx.transfer_config(transfer)?.post_assign_action {
                RefactorCalculator::apply(tx, transfer, action)?;
            }
            Ok(created)
        })
    }

    /// 依掃描輸入標記分配行完成
    ///
    /// 目的儲位必須位於調撥單目的地之下，且在策略有建議時屬於建議之一。
    /// 調撥類型設定自動驗收且不再需要欠交時，接著驗收調撥單。
    pub fn mark_as_done(
        &self,
        store: &mut Warehouse,
        transfer: TransferId,
        request: &MarkDoneRequest,
    ) -> Result<Vec<AllocationId>> {
        store.atomically(|tx| {
            Self::ensure_open(tx, transfer)?;
            let updates = if request.entries.is_empty() {
                Preparer::prepare_all(tx, transfer, &request.context)?
            } else {
                Preparer::prepare(tx, transfer, &request.entries, &request.context)?
            };
            if updates.is_empty() {
                return Err(WmsError::InvalidState(format!(
                    "調撥單 {} 找不到可標記完成的分配行",
                    tx.transfer(transfer)?.name
                )));
            }
            if let Some(location) = request.context.location_dest {
                self.check_destination(tx, transfer, &updates.allocations(), location)?;
            }

            let done = updates.apply(tx)?;
            tracing::info!(
                "調撥單 {} 標記完成 {} 筆分配行",
                tx.transfer(transfer)?.name,
                done.len()
            );

            if tx.transfer_config(transfer)?.auto_validate
                && !BackorderEngine::requires_backorder(tx, transfer)?
            {
                tracing::debug!("自動驗收調撥單 {}", transfer);
                Self::validate_in(tx, transfer)?;
            }
            Ok(done)
        })
    }

    /// 驗收調撥單，返回欠交單
    ///
    /// 需要欠交時（允許短收才可）先拆出欠交單；接著搬移完成數量的庫存、
    /// 需求標記完成，再對欠交單執行驗收後重構。
    pub fn validate(
        &self,
        store: &mut Warehouse,
        transfer: TransferId,
    ) -> Result<Option<TransferId>> {
        store.atomically(|tx| Self::validate_in(tx, transfer))
    }

    /// 拆出欠交單（不驗收）
    pub fn backorder(
        &self,
        store: &mut Warehouse,
        transfer: TransferId,
        retained: Option<&[AllocationId]>,
    ) -> Result<Option<TransferId>> {
        store.atomically(|tx| BackorderEngine::backorder_move_lines(tx, transfer, retained))
    }

    /// 拆分單一需求
    pub fn split_out_move(
        &self,
        store: &mut Warehouse,
        demand: DemandId,
        retained: &[AllocationId],
    ) -> Result<Option<DemandId>> {
        store.atomically(|tx| BackorderEngine::split_out_move(tx, demand, retained))
    }

    /// 依數量拆分分配行（使用第一筆分配行的物料精度）
    pub fn move_lines_for_qty(
        &self,
        store: &mut Warehouse,
        allocations: &[AllocationId],
        quantity: Decimal,
        sort: bool,
    ) -> Result<SplitOutcome> {
        store.atomically(|tx| {
            let Some(first) = allocations.first() else {
                return Ok(SplitOutcome {
                    remainder: quantity.max(Decimal::ZERO),
                    ..SplitOutcome::empty()
                });
            };
            let rounding = tx.rounding(tx.allocation(*first)?.product)?;
            Splitter::move_lines_for_qty(tx, allocations, quantity, &rounding, sort)
        })
    }

    /// 取消預留：釋放未作業的分配行，需求數量還原，刪除未計劃的需求
    pub fn unreserve(&self, store: &mut Warehouse, transfer: TransferId) -> Result<()> {
        store.atomically(|tx| {
            Self::ensure_open(tx, transfer)?;
            for id in tx.allocations_of_transfer(transfer) {
                let allocation = tx.allocation(id)?;
                if !allocation.is_started(&tx.rounding(allocation.product)?) {
                    tx.remove_allocation(id)?;
                }
            }
            for demand_id in tx.demands_of_transfer(transfer) {
                let demand = tx.demand(demand_id)?.clone();
                if demand.is_closed() {
                    continue;
                }
                if demand.initial_quantity.is_zero()
                    && tx.allocations_of_demand(demand_id).is_empty()
                {
                    tx.remove_demand(demand_id)?;
                    continue;
                }
                tx.demand_mut(demand_id)?.current_quantity = demand.initial_quantity;
                tx.recompute_demand_state(demand_id)?;
            }
            tracing::info!("調撥單 {} 已取消預留", tx.transfer(transfer)?.name);
            Ok(())
        })
    }

    /// 取消需求（依設定傳播）
    pub fn cancel_demand(&self, store: &mut Warehouse, demand: DemandId) -> Result<Vec<DemandId>> {
        store.atomically(|tx| CancelCalculator::cancel_demand(tx, demand))
    }

    /// 取消調撥單所有未結束的需求
    pub fn cancel(&self, store: &mut Warehouse, transfer: TransferId) -> Result<Vec<DemandId>> {
        store.atomically(|tx| {
            Self::ensure_open(tx, transfer)?;
            let mut cancelled = Vec::new();
            for demand in tx.demands_of_transfer(transfer) {
                if !tx.demand(demand)?.is_closed() {
                    cancelled.extend(CancelCalculator::cancel_demand(tx, demand)?);
                }
            }
            Ok(cancelled)
        })
    }

    /// 執行重構動作
    pub fn refactor(
        &self,
        store: &mut Warehouse,
        transfer: TransferId,
        action: RefactorAction,
    ) -> Result<Vec<TransferId>> {
        store.atomically(|tx| RefactorCalculator::apply(tx, transfer, action))
    }

    /// 合併調撥單中相同維度的分配行
    pub fn merge(&self, store: &mut Warehouse, transfer: TransferId) -> Result<Vec<AllocationId>> {
        store.atomically(|tx| Merger::merge(tx, transfer))
    }

    fn ensure_open(store: &Warehouse, transfer: TransferId) -> Result<()> {
        let name = &store.transfer(transfer)?.name;
        match store.transfer_state(transfer)? {
            DemandState::Done => Err(WmsError::AlreadyDone(format!("調撥單 {}", name))),
            DemandState::Cancel => Err(WmsError::InvalidState(format!("調撥單 {} 已取消", name))),
            _ => Ok(()),
        }
    }

    fn check_destination(
        &self,
        store: &Warehouse,
        transfer: TransferId,
        allocations: &[AllocationId],
        location: LocationId,
    ) -> Result<()> {
        let expected = store.transfer(transfer)?.location_dest;
        let location_name = || -> Result<String> { Ok(store.location(location)?.name.clone()) };
        if !store.is_within(location, expected) {
            return Err(WmsError::InvalidDestination {
                location: location_name()?,
                expected: store.location(expected)?.name.clone(),
            });
        }

        let candidates = self.policy.candidates(store, transfer, allocations)?;
        if !candidates.is_empty() && !candidates.contains(&location) {
            let names: Vec<String> = candidates
                .iter()
                .map(|id| store.location(*id).map(|l| l.name.clone()))
                .collect::<Result<_>>()?;
            return Err(WmsError::InvalidDestination {
                location: location_name()?,
                expected: names.join(", "),
            });
        }
        Ok(())
    }

    fn validate_in(store: &mut Warehouse, transfer: TransferId) -> Result<Option<TransferId>> {
        Self::ensure_open(store, transfer)?;
        let original = store.transfer(transfer)?.clone();
        let config = store.transfer_type(original.transfer_type)?.clone();

        let mut started = false;
        for id in store.allocations_of_transfer(transfer) {
            let allocation = store.allocation(id)?;
            started |= allocation.is_started(&store.rounding(allocation.product)?);
        }
        if !started {
            return Err(WmsError::InvalidState(format!(
                "調撥單 {} 沒有已完成的數量",
                original.name
            )));
        }

        let mut backorder = None;
        if BackorderEngine::requires_backorder(store, transfer)? {
            if !config.under_receive {
                return Err(WmsError::UnderReceive(original.name));
            }
            backorder = BackorderEngine::backorder_move_lines(store, transfer, None)?;
        }

        for id in store.allocations_of_transfer(transfer) {
            let allocation = store.allocation(id)?.clone();
            if !allocation.is_started(&store.rounding(allocation.product)?) {
                store.remove_allocation(id)?;
                continue;
            }
            store.release_for(&allocation, allocation.accounted_quantity())?;
            store.consume_stock(
                allocation.product,
                allocation.location_src,
                allocation.package,
                allocation.lot,
                allocation.owner,
                allocation.done_quantity,
            )?;
            store.receive_stock(
                allocation.product,
                allocation.location_dest,
                allocation.result_package,
                allocation.lot,
                allocation.owner,
                allocation.done_quantity,
            )?;
        }

        let demands = store.demands_of_transfer(transfer);
        for &demand in &demands {
            if !store.demand(demand)?.is_closed() {
                store.demand_mut(demand)?.state = DemandState::Done;
            }
        }
        for demand in demands {
            for successor in store.links().successors(demand) {
                store.recompute_demand_state(successor)?;
            }
        }

        if let (Some(backorder), Some(action)) = (backorder, config.post_validate_action) {
            RefactorCalculator::apply(store, backorder, action)?;
        }

        tracing::info!(
            "調撥單 {} 驗收完成{}",
            original.name,
            match backorder {
                Some(id) => format!("，欠交單 {}", store.transfer(id)?.name),
                None => String::new(),
            }
        );
        Ok(backorder)
    }
}
