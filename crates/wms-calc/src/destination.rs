//! 目的儲位建議

use wms_core::{AllocationId, LocationId, LocationUsage, Result, TransferId, Warehouse};

/// 目的儲位建議策略
///
/// 返回空集合表示沒有限制。
pub trait DestinationPolicy {
    fn candidates(
        &self,
        store: &Warehouse,
        transfer: TransferId,
        allocations: &[AllocationId],
    ) -> Result<Vec<LocationId>>;
}

/// 不提供建議
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSuggestion;

impl DestinationPolicy for NoSuggestion {
    fn candidates(
        &self,
        _store: &Warehouse,
        _transfer: TransferId,
        _allocations: &[AllocationId],
    ) -> Result<Vec<LocationId>> {
        Ok(Vec::new())
    }
}

/// 只允許調撥單目的儲位之下的內部子儲位
#[derive(Debug, Clone, Copy, Default)]
pub struct ChildOfDestination;

impl DestinationPolicy for ChildOfDestination {
    fn candidates(
        &self,
        store: &Warehouse,
        transfer: TransferId,
        _allocations: &[AllocationId],
    ) -> Result<Vec<LocationId>> {
        let destination = store.transfer(transfer)?.location_dest;
        Ok(store
            .locations()
            .filter(|l| {
                l.id != destination
                    && l.usage == LocationUsage::Internal
                    && store.is_within(l.id, destination)
            })
            .map(|l| l.id)
            .collect())
    }
}
