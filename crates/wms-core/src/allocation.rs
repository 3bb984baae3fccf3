//! 分配行模型

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::demand::Demand;
use crate::ids::{
    AllocationId, DemandId, LocationId, LotId, PackageId, PartnerId, ProductId, TransferId,
};
use crate::quantity::Rounding;

/// 分配行：需求中的一段具體數量，可綁定到特定庫存（儲位/包裝/批號）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Allocation {
    pub id: AllocationId,

    /// 所屬需求
    pub demand: DemandId,

    /// 所屬調撥單
    pub transfer: Option<TransferId>,

    pub product: ProductId,

    /// 應作業數量（已預留）
    pub ordered_quantity: Decimal,

    /// 已完成數量
    pub done_quantity: Decimal,

    pub location_src: LocationId,

    /// 目的儲位（完成前可修改）
    pub location_dest: LocationId,

    /// 來源包裝
    pub package: Option<PackageId>,

    /// 目的包裝
    pub result_package: Option<PackageId>,

    pub lot: Option<LotId>,
    pub owner: Option<PartnerId>,
}

impl Allocation {
    /// 依需求創建新的分配行
    pub fn for_demand(demand: &Demand, ordered_quantity: Decimal) -> Self {
        Self {
            id: AllocationId::default(),
            demand: demand.id,
            transfer: demand.transfer,
            product: demand.product,
            ordered_quantity,
            done_quantity: Decimal::ZERO,
            location_src: demand.location_src,
            location_dest: demand.location_dest,
            package: None,
            result_package: None,
            lot: None,
            owner: None,
        }
    }

    /// 建構器模式：設置來源儲位
    pub fn with_location_src(mut self, location: LocationId) -> Self {
        self.location_src = location;
        self
    }

    /// 建構器模式：設置來源包裝
    pub fn with_package(mut self, package: Option<PackageId>) -> Self {
        self.package = package;
        self
    }

    /// 建構器模式：設置批號
    pub fn with_lot(mut self, lot: Option<LotId>) -> Self {
        self.lot = lot;
        self
    }

    /// 建構器模式：設置貨主
    pub fn with_owner(mut self, owner: Option<PartnerId>) -> Self {
        self.owner = owner;
        self
    }

    /// 尚未完成（完成數量 < 應作業數量）
    pub fn is_incomplete(&self, rounding: &Rounding) -> bool {
        rounding.less_than(self.done_quantity, self.ordered_quantity)
    }

    /// 已完整作業（完成數量 >= 應作業數量，且確實做過）
    pub fn is_fully_worked(&self, rounding: &Rounding) -> bool {
        !rounding.is_zero(self.done_quantity)
            && rounding.at_least(self.done_quantity, self.ordered_quantity)
    }

    /// 已開始作業
    pub fn is_started(&self, rounding: &Rounding) -> bool {
        !rounding.is_zero(self.done_quantity)
    }

    /// 部分完成（0 < 完成 < 應作業）
    pub fn is_partially_worked(&self, rounding: &Rounding) -> bool {
        self.is_started(rounding) && self.is_incomplete(rounding)
    }

    /// 此分配行在需求中代表的數量
    pub fn accounted_quantity(&self) -> Decimal {
        self.ordered_quantity.max(self.done_quantity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn allocation(ordered: i64, done: i64) -> Allocation {
        let demand = Demand::new(ProductId(1), LocationId(2), LocationId(3), Decimal::from(10));
        let mut allocation = Allocation::for_demand(&demand, Decimal::from(ordered));
        allocation.done_quantity = Decimal::from(done);
        allocation
    }

    #[rstest]
    #[case(5, 0, true, false, false)]
    #[case(5, 3, true, false, true)]
    #[case(5, 5, false, true, false)]
    #[case(0, 2, false, true, false)]
    fn test_work_states(
        #[case] ordered: i64,
        #[case] done: i64,
        #[case] incomplete: bool,
        #[case] fully_worked: bool,
        #[case] partial: bool,
    ) {
        let rounding = Rounding::unit();
        let allocation = allocation(ordered, done);
        assert_eq!(allocation.is_incomplete(&rounding), incomplete);
        assert_eq!(allocation.is_fully_worked(&rounding), fully_worked);
        assert_eq!(allocation.is_partially_worked(&rounding), partial);
    }

    #[test]
    fn test_accounted_quantity_covers_unplanned_picks() {
        assert_eq!(allocation(0, 4).accounted_quantity(), Decimal::from(4));
        assert_eq!(allocation(6, 2).accounted_quantity(), Decimal::from(6));
    }
}
