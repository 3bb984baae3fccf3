//! # WMS
//!
//! 倉儲分配與對帳引擎
//!
//! - [`core`]：資料模型與記錄存放區
//! - [`calc`]：拆分、掃描比對、批號調換、欠交、合併與調撥單流程

pub use wms_calc as calc;
pub use wms_core as core;

pub use wms_calc::{MarkDoneRequest, PrepareContext, ScanEntry, TransferEngine};
pub use wms_core::{Result, Warehouse, WmsError};
