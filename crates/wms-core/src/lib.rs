//! # WMS Core
//!
//! 倉儲作業核心資料模型：庫存單位、需求、分配、調撥單與記錄存放區

pub mod allocation;
pub mod config;
pub mod demand;
pub mod ids;
pub mod location;
pub mod product;
pub mod quantity;
pub mod stock;
pub mod store;
pub mod transfer;

// Re-export 主要類型
pub use allocation::Allocation;
pub use config::{AllocationKeyField, RefactorAction, TransferTypeConfig};
pub use demand::{Demand, DemandLinks, DemandState};
pub use ids::{
    AllocationId, BatchId, DemandId, LocationId, LotId, PackageId, PartnerId, ProductId,
    StockUnitId, TransferId, TransferTypeId,
};
pub use location::{Location, LocationUsage, Package};
pub use product::{Lot, Product, Tracking};
pub use quantity::Rounding;
pub use stock::StockUnit;
pub use store::Warehouse;
pub use transfer::{AuditNote, Transfer};

use rust_decimal::Decimal;

/// WMS 錯誤類型
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum WmsError {
    #[error("找不到{kind}: {id}")]
    NotFound { kind: &'static str, id: u64 },

    #[error("掃描資料格式錯誤: {0}")]
    MalformedScan(String),

    #[error("批號/序號重複: {names:?}（物料 {product}）")]
    RepeatedLotNames { product: String, names: Vec<String> },

    #[error("要求數量超過可用數量：物料 {product} 要求 {requested}, 可用 {available}")]
    InsufficientQuantity {
        product: String,
        requested: Decimal,
        available: Decimal,
    },

    #[error("無法拆分部分完成的分配行: {0}")]
    PartialLineSplit(String),

    #[error("調撥單 {0} 沒有可欠交的內容")]
    NothingToBackorder(String),

    #[error("欠交序號超過最大值：{root} 已達 {max}")]
    SequenceExceeded { root: String, max: u32 },

    #[error("分配行不屬於調撥單 {transfer}: {allocations:?}")]
    TransferMismatch {
        transfer: String,
        allocations: Vec<AllocationId>,
    },

    #[error("作業已完成: {0}")]
    AlreadyDone(String),

    #[error("調撥單 {transfer} 不接受超收：物料 {product} 多出 {quantity}")]
    OverReceive {
        transfer: String,
        product: String,
        quantity: Decimal,
    },

    #[error("調撥單 {0} 不允許短收驗收")]
    UnderReceive(String),

    #[error("目的儲位 {location} 不在調撥單目的地 {expected} 之下")]
    InvalidDestination { location: String, expected: String },

    #[error("狀態錯誤: {0}")]
    InvalidState(String),

    #[error("預留數量錯誤: {0}")]
    Reservation(String),

    #[error("配置錯誤: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, WmsError>;
