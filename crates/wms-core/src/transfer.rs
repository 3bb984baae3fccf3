//! 調撥單模型

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::ids::{BatchId, LocationId, PartnerId, TransferId, TransferTypeId};

/// 調撥單審計記錄
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditNote {
    pub body: String,
}

/// 調撥單：共享生命週期的一組需求與分配行
///
/// 需求與分配行以 `transfer` 欄位反向指向調撥單，由存放區查詢。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transfer {
    pub id: TransferId,

    /// 調撥單號（欠交單為 `ROOT-001` 形式）
    pub name: String,

    pub transfer_type: TransferTypeId,
    pub location_src: LocationId,
    pub location_dest: LocationId,

    /// 來源單據
    pub origin: Option<String>,

    pub partner: Option<PartnerId>,

    /// 優先級（0-3，3最高）
    pub priority: u8,

    pub scheduled_date: Option<NaiveDateTime>,

    pub batch: Option<BatchId>,

    /// 欠交來源調撥單
    pub backorder_of: Option<TransferId>,

    /// 欠交鏈的最初調撥單（建立時設定，沿鏈不變）
    pub root: TransferId,

    /// 欠交鏈中的序號（最初調撥單為 0）
    pub sequence: u32,

    /// 重構後已清空，待刪除
    pub is_empty: bool,

    /// 審計記錄
    pub notes: Vec<AuditNote>,
}

impl Transfer {
    /// 創建新的調撥單
    pub fn new(
        name: impl Into<String>,
        transfer_type: TransferTypeId,
        location_src: LocationId,
        location_dest: LocationId,
    ) -> Self {
        Self {
            id: TransferId::default(),
            name: name.into(),
            transfer_type,
            location_src,
            location_dest,
            origin: None,
            partner: None,
            priority: 1,
            scheduled_date: None,
            batch: None,
            backorder_of: None,
            root: TransferId::default(),
            sequence: 0,
            is_empty: false,
            notes: Vec::new(),
        }
    }

    /// 建構器模式：設置來源單據
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    /// 建構器模式：設置夥伴
    pub fn with_partner(mut self, partner: PartnerId) -> Self {
        self.partner = Some(partner);
        self
    }

    /// 建構器模式：設置優先級
    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority.min(3);
        self
    }

    pub fn with_scheduled_date(mut self, date: NaiveDateTime) -> Self {
        self.scheduled_date = Some(date);
        self
    }

    pub fn with_batch(mut self, batch: BatchId) -> Self {
        self.batch = Some(batch);
        self
    }

    /// 是否為欠交單
    pub fn is_backorder(&self) -> bool {
        self.backorder_of.is_some()
    }

    /// 新增審計記錄
    pub fn post_note(&mut self, body: impl Into<String>) {
        self.notes.push(AuditNote { body: body.into() });
    }
}
