//! # WMS Calculation Engine
//!
//! 分配與對帳引擎：拆分、掃描比對、批號調換、欠交、合併與調撥單流程

pub mod backorder;
pub mod cancel;
pub mod destination;
pub mod engine;
pub mod merge;
pub mod prepare;
pub mod refactor;
pub mod reservation;
pub mod splitter;
pub mod swap;

// Re-export 主要類型
pub use backorder::BackorderEngine;
pub use cancel::CancelCalculator;
pub use destination::{ChildOfDestination, DestinationPolicy, NoSuggestion};
pub use engine::{MarkDoneRequest, TransferEngine};
pub use merge::Merger;
pub use prepare::{AllocationValues, MarkDoneUpdates, PrepareContext, Preparer, ScanEntry};
pub use refactor::RefactorCalculator;
pub use reservation::ReservationCalculator;
pub use splitter::{SplitOutcome, Splitter};
pub use swap::{LotRequest, SwapReport, Swapper};
