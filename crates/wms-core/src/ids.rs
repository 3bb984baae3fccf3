//! 記錄識別碼

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! record_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash,
            Serialize, Deserialize,
        )]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

record_id!(
    /// 物料ID
    ProductId
);
record_id!(
    /// 儲位ID
    LocationId
);
record_id!(
    /// 包裝ID
    PackageId
);
record_id!(
    /// 批號/序號ID
    LotId
);
record_id!(
    /// 貨主/夥伴ID
    PartnerId
);
record_id!(
    /// 庫存單位ID
    StockUnitId
);
record_id!(
    /// 需求ID
    DemandId
);
record_id!(
    /// 分配行ID
    AllocationId
);
record_id!(
    /// 調撥單ID
    TransferId
);
record_id!(
    /// 調撥類型ID
    TransferTypeId
);
record_id!(
    /// 批次作業ID
    BatchId
);
