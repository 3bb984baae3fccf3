//! 需求模型

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::ids::{DemandId, LocationId, ProductId, TransferId, TransferTypeId};

/// 需求狀態
///
/// 宣告順序即為「完成程度」，調撥單狀態取非取消需求中最差者。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DemandState {
    Draft,
    Waiting,
    Confirmed,
    PartiallyAvailable,
    Assigned,
    Done,
    Cancel,
}

impl DemandState {
    /// 是否已結束（完成或取消）
    pub fn is_closed(self) -> bool {
        matches!(self, DemandState::Done | DemandState::Cancel)
    }
}

/// 需求：某物料從來源儲位移動到目的儲位的數量
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Demand {
    pub id: DemandId,
    pub product: ProductId,
    pub location_src: LocationId,
    pub location_dest: LocationId,

    /// 所屬調撥單（拆分後暫時為空）
    pub transfer: Option<TransferId>,

    /// 調撥類型
    pub transfer_type: Option<TransferTypeId>,

    /// 目前需求數量（部分取消/傳播時縮小）
    pub current_quantity: Decimal,

    /// 建立時的需求數量，全部取消預留時用來還原
    pub initial_quantity: Decimal,

    pub state: DemandState,
}

impl Demand {
    /// 創建新的需求
    pub fn new(
        product: ProductId,
        location_src: LocationId,
        location_dest: LocationId,
        quantity: Decimal,
    ) -> Self {
        Self {
            id: DemandId::default(),
            product,
            location_src,
            location_dest,
            transfer: None,
            transfer_type: None,
            current_quantity: quantity,
            initial_quantity: quantity,
            state: DemandState::Draft,
        }
    }

    /// 建構器模式：設置所屬調撥單
    pub fn with_transfer(mut self, transfer: TransferId) -> Self {
        self.transfer = Some(transfer);
        self
    }

    /// 建構器模式：設置調撥類型
    pub fn with_transfer_type(mut self, transfer_type: TransferTypeId) -> Self {
        self.transfer_type = Some(transfer_type);
        self
    }

    /// 建構器模式：設置狀態
    pub fn with_state(mut self, state: DemandState) -> Self {
        self.state = state;
        self
    }

    pub fn is_closed(&self) -> bool {
        self.state.is_closed()
    }
}

/// 需求前後關聯表
///
/// 以兩張無所有權的多對多關聯表保存，避免物件間的循環參照；
/// 「最初、上一張、下一張」調撥單都由此遞移計算。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DemandLinks {
    predecessors: BTreeMap<DemandId, BTreeSet<DemandId>>,
    successors: BTreeMap<DemandId, BTreeSet<DemandId>>,
}

impl DemandLinks {
    pub fn new() -> Self {
        Self::default()
    }

    /// 建立前後關聯（`from` 完成後才輪到 `to`）
    pub fn link(&mut self, from: DemandId, to: DemandId) {
        self.successors.entry(from).or_default().insert(to);
        self.predecessors.entry(to).or_default().insert(from);
    }

    /// 移除前後關聯
    pub fn unlink(&mut self, from: DemandId, to: DemandId) {
        if let Some(set) = self.successors.get_mut(&from) {
            set.remove(&to);
        }
        if let Some(set) = self.predecessors.get_mut(&to) {
            set.remove(&from);
        }
    }

    /// 移除需求的所有關聯
    pub fn remove(&mut self, demand: DemandId) {
        for pred in self.predecessors(demand) {
            self.unlink(pred, demand);
        }
        for succ in self.successors(demand) {
            self.unlink(demand, succ);
        }
        self.predecessors.remove(&demand);
        self.successors.remove(&demand);
    }

    pub fn predecessors(&self, demand: DemandId) -> Vec<DemandId> {
        self.predecessors
            .get(&demand)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn successors(&self, demand: DemandId) -> Vec<DemandId> {
        self.successors
            .get(&demand)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// 沿前置關聯回溯，返回沒有前置需求的最初需求
    pub fn roots(&self, demands: &[DemandId]) -> BTreeSet<DemandId> {
        let mut roots = BTreeSet::new();
        let mut visited = BTreeSet::new();
        let mut stack: Vec<DemandId> = demands.to_vec();

        while let Some(demand) = stack.pop() {
            if !visited.insert(demand) {
                continue;
            }
            let preds = self.predecessors(demand);
            if preds.is_empty() {
                roots.insert(demand);
            } else {
                stack.extend(preds);
            }
        }

        roots
    }
}
