//! 物料與批號模型

use serde::{Deserialize, Serialize};

use crate::ids::{LotId, ProductId};
use crate::quantity::Rounding;

/// 追蹤方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Tracking {
    /// 不追蹤
    None,
    /// 批號追蹤
    Lot,
    /// 序號追蹤（每單位一個序號）
    Serial,
}

/// 物料
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    /// 物料ID（由存放區指派）
    pub id: ProductId,

    /// 物料名稱/條碼
    pub name: String,

    /// 追蹤方式
    pub tracking: Tracking,

    /// 數量精度
    pub rounding: Rounding,
}

impl Product {
    /// 創建新的物料
    pub fn new(name: impl Into<String>, tracking: Tracking) -> Self {
        Self {
            id: ProductId::default(),
            name: name.into(),
            tracking,
            rounding: Rounding::unit(),
        }
    }

    /// 建構器模式：設置數量精度
    pub fn with_rounding(mut self, rounding: Rounding) -> Self {
        self.rounding = rounding;
        self
    }

    /// 是否需要批號/序號
    pub fn is_tracked(&self) -> bool {
        self.tracking != Tracking::None
    }

    pub fn is_serial(&self) -> bool {
        self.tracking == Tracking::Serial
    }
}

/// 批號/序號（同一物料內名稱唯一）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lot {
    pub id: LotId,
    pub name: String,
    pub product: ProductId,
}

impl Lot {
    pub fn new(name: impl Into<String>, product: ProductId) -> Self {
        Self {
            id: LotId::default(),
            name: name.into(),
            product,
        }
    }
}
