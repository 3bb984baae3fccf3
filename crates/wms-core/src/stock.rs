//! 庫存單位模型

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::ids::{LocationId, LotId, PackageId, PartnerId, ProductId, StockUnitId};
use crate::{Result, WmsError};

/// 庫存單位：某物料在某儲位（可選包裝、批號、貨主）的實體數量
///
/// 不變式：`0 <= reserved_quantity <= quantity`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockUnit {
    pub id: StockUnitId,
    pub product: ProductId,
    pub location: LocationId,
    pub package: Option<PackageId>,
    pub lot: Option<LotId>,
    pub owner: Option<PartnerId>,

    /// 現有數量
    pub quantity: Decimal,

    /// 已預留數量
    pub reserved_quantity: Decimal,

    /// 入庫日期（預留時先進先出）
    pub in_date: Option<NaiveDateTime>,
}

impl StockUnit {
    /// 創建新的庫存單位
    pub fn new(product: ProductId, location: LocationId, quantity: Decimal) -> Self {
        Self {
            id: StockUnitId::default(),
            product,
            location,
            package: None,
            lot: None,
            owner: None,
            quantity,
            reserved_quantity: Decimal::ZERO,
            in_date: None,
        }
    }

    /// 建構器模式：設置包裝
    pub fn with_package(mut self, package: PackageId) -> Self {
        self.package = Some(package);
        self
    }

    /// 建構器模式：設置批號
    pub fn with_lot(mut self, lot: LotId) -> Self {
        self.lot = Some(lot);
        self
    }

    /// 建構器模式：設置貨主
    pub fn with_owner(mut self, owner: PartnerId) -> Self {
        self.owner = Some(owner);
        self
    }

    /// 建構器模式：設置入庫日期
    pub fn with_in_date(mut self, in_date: NaiveDateTime) -> Self {
        self.in_date = Some(in_date);
        self
    }

    /// 可用數量（現有 - 已預留）
    pub fn available(&self) -> Decimal {
        (self.quantity - self.reserved_quantity).max(Decimal::ZERO)
    }

    /// 是否與給定的維度完全一致
    pub fn matches(
        &self,
        product: ProductId,
        package: Option<PackageId>,
        lot: Option<LotId>,
        owner: Option<PartnerId>,
    ) -> bool {
        self.product == product && self.package == package && self.lot == lot && self.owner == owner
    }

    /// 預留庫存
    pub fn reserve(&mut self, quantity: Decimal) -> Result<()> {
        if quantity > self.available() {
            return Err(WmsError::Reservation(format!(
                "庫存單位 {} 可用 {}, 要求預留 {}",
                self.id,
                self.available(),
                quantity
            )));
        }
        self.reserved_quantity += quantity;
        Ok(())
    }

    /// 釋放已預留的庫存
    pub fn unreserve(&mut self, quantity: Decimal) -> Result<()> {
        if quantity > self.reserved_quantity {
            return Err(WmsError::Reservation(format!(
                "庫存單位 {} 已預留 {}, 要求釋放 {}",
                self.id, self.reserved_quantity, quantity
            )));
        }
        self.reserved_quantity -= quantity;
        Ok(())
    }
}
