//! 調撥類型配置

use serde::{Deserialize, Serialize};

use crate::{Result, WmsError};

/// 預設欠交序號上限
pub const DEFAULT_MAX_BACKORDER_SEQUENCE: u32 = 999;

/// 調撥類型配置（唯讀輸入）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferTypeConfig {
    /// 類型名稱
    pub name: String,

    /// 是否允許掃描與預留不同的批號/序號（調換）
    pub allow_swap_tracked: bool,

    /// 是否允許超收（接受未計劃的庫存）
    pub over_receive: bool,

    /// 是否允許短收驗收（剩餘部分轉為欠交單）
    pub under_receive: bool,

    /// 作業全部完成後自動驗收
    pub auto_validate: bool,

    /// 欠交單保留原批次作業
    pub backorder_preserve_batch: bool,

    /// 取消需求時是否傳播到後續需求
    pub propagate_cancel: bool,

    /// 欠交序號上限
    pub max_backorder_sequence: u32,

    /// 確認後重構
    pub post_confirm_action: Option<RefactorAction>,

    /// 預留後重構
    pub post_assign_action: Option<RefactorAction>,

    /// 驗收後重構
    pub post_validate_action: Option<RefactorAction>,
}

impl TransferTypeConfig {
    /// 創建新的調撥類型配置
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            allow_swap_tracked: false,
            over_receive: false,
            under_receive: true,
            auto_validate: false,
            backorder_preserve_batch: false,
            propagate_cancel: false,
            max_backorder_sequence: DEFAULT_MAX_BACKORDER_SEQUENCE,
            post_confirm_action: None,
            post_assign_action: None,
            post_validate_action: None,
        }
    }

    /// 從 JSON 載入配置，未列出的欄位使用預設值
    ///
    /// # 範例
    /// ```
    /// # use wms_core::TransferTypeConfig;
    /// let config = TransferTypeConfig::from_json(r#"{"name": "Pick", "allow_swap_tracked": true}"#)
    ///     .unwrap();
    /// assert!(config.allow_swap_tracked);
    /// assert_eq!(config.max_backorder_sequence, 999);
    /// ```
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| WmsError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// 檢查配置
    pub fn validate(&self) -> Result<()> {
        if self.max_backorder_sequence == 0 && self.under_receive {
            return Err(WmsError::Config(format!(
                "調撥類型 {} 允許短收但欠交序號上限為 0",
                self.name
            )));
        }
        Ok(())
    }

    /// 建構器模式：設置是否允許調換批號
    pub fn with_allow_swap_tracked(mut self, allow: bool) -> Self {
        self.allow_swap_tracked = allow;
        self
    }

    /// 建構器模式：設置是否允許超收
    pub fn with_over_receive(mut self, allow: bool) -> Self {
        self.over_receive = allow;
        self
    }

    /// 建構器模式：設置是否允許短收
    pub fn with_under_receive(mut self, allow: bool) -> Self {
        self.under_receive = allow;
        self
    }

    /// 建構器模式：設置自動驗收
    pub fn with_auto_validate(mut self, auto: bool) -> Self {
        self.auto_validate = auto;
        self
    }

    /// 建構器模式：設置欠交單保留批次
    pub fn with_backorder_preserve_batch(mut self, preserve: bool) -> Self {
        self.backorder_preserve_batch = preserve;
        self
    }

    /// 建構器模式：設置取消傳播
    pub fn with_propagate_cancel(mut self, propagate: bool) -> Self {
        self.propagate_cancel = propagate;
        self
    }

    /// 建構器模式：設置欠交序號上限
    pub fn with_max_backorder_sequence(mut self, max: u32) -> Self {
        self.max_backorder_sequence = max;
        self
    }

    pub fn with_post_confirm_action(mut self, action: RefactorAction) -> Self {
        self.post_confirm_action = Some(action);
        self
    }

    pub fn with_post_assign_action(mut self, action: RefactorAction) -> Self {
        self.post_assign_action = Some(action);
        self
    }

    pub fn with_post_validate_action(mut self, action: RefactorAction) -> Self {
        self.post_validate_action = Some(action);
        self
    }
}

impl Default for TransferTypeConfig {
    fn default() -> Self {
        Self::new("")
    }
}

/// 重構動作（封閉集合，由重構計算器統一分派）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefactorAction {
    /// 合併維度相同的未作業分配行
    MergeAllocations,

    /// 依分配行欄位分組，每組拆成獨立調撥單
    GroupByAllocationKey(AllocationKeyField),
}

/// 分配行分組欄位
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocationKeyField {
    /// 來源儲位
    SourceLocation,
    /// 目的儲位
    DestinationLocation,
    /// 來源包裝
    Package,
}
