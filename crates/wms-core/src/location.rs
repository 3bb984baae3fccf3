//! 儲位與包裝模型

use serde::{Deserialize, Serialize};

use crate::ids::{LocationId, PackageId};

/// 儲位用途
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LocationUsage {
    /// 倉內儲位（會記錄預留）
    Internal,
    /// 供應商
    Supplier,
    /// 客戶
    Customer,
    /// 虛擬儲位（盤點、報廢）
    Virtual,
}

/// 儲位
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Location {
    pub id: LocationId,

    /// 儲位名稱
    pub name: String,

    /// 上層儲位
    pub parent: Option<LocationId>,

    /// 用途
    pub usage: LocationUsage,
}

impl Location {
    /// 創建新的倉內儲位
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: LocationId::default(),
            name: name.into(),
            parent: None,
            usage: LocationUsage::Internal,
        }
    }

    /// 建構器模式：設置上層儲位
    pub fn with_parent(mut self, parent: LocationId) -> Self {
        self.parent = Some(parent);
        self
    }

    /// 建構器模式：設置用途
    pub fn with_usage(mut self, usage: LocationUsage) -> Self {
        self.usage = usage;
        self
    }

    /// 庫存單位在此儲位是否記錄預留
    pub fn tracks_reservations(&self) -> bool {
        self.usage == LocationUsage::Internal
    }
}

/// 包裝（棧板、箱）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Package {
    pub id: PackageId,
    pub name: String,

    /// 上層包裝（例如箱子所在的棧板）
    pub parent: Option<PackageId>,
}

impl Package {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: PackageId::default(),
            name: name.into(),
            parent: None,
        }
    }

    pub fn with_parent(mut self, parent: PackageId) -> Self {
        self.parent = Some(parent);
        self
    }
}
