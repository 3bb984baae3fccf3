//! 分配行拆分（依目標數量選出分配行）

use rust_decimal::Decimal;
use wms_core::{AllocationId, Result, Rounding, Warehouse};

/// 拆分結果
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SplitOutcome {
    /// 應作業數量加總等於 min(目標, 可用) 的分配行
    pub covering: Vec<AllocationId>,

    /// 拆分後多出的新分配行（至多一筆）
    pub overflow: Option<AllocationId>,

    /// 未能滿足的數量 max(0, 目標 - 可用)
    pub remainder: Decimal,
}

impl SplitOutcome {
    /// 不需作業
    pub fn empty() -> Self {
        Self::default()
    }
}

/// 分配行拆分器
pub struct Splitter;

impl Splitter {
    /// 從候選分配行中選出剛好涵蓋 `quantity` 的子集，必要時拆分最後一筆
    ///
    /// - 已部分完成的分配行先拆出已完成部分，該部分不再參與選擇
    /// - 已完整作業的分配行不參與選擇
    /// - `sort` 為真時：優先挑選應作業數量 >= 目標的最小一筆；
    ///   否則由大到小依序累加
    /// - `sort` 為假時：依傳入順序累加
    pub fn move_lines_for_qty(
        store: &mut Warehouse,
        candidates: &[AllocationId],
        quantity: Decimal,
        rounding: &Rounding,
        sort: bool,
    ) -> Result<SplitOutcome> {
        if rounding.is_zero(quantity) || quantity < Decimal::ZERO {
            return Ok(SplitOutcome::empty());
        }
        let quantity = rounding.round(quantity);

        let mut pool: Vec<(AllocationId, Decimal)> = Vec::with_capacity(candidates.len());
        for &id in candidates {
            let allocation = store.allocation(id)?;
            if allocation.is_fully_worked(rounding) {
                continue;
            }
            if allocation.is_partially_worked(rounding) {
                // 已完成部分留在原分配行，未完成部分成為候選
                let done = allocation.done_quantity;
                let rest = store.split_allocation(id, done, rounding)?;
                let ordered = store.allocation(rest)?.ordered_quantity;
                pool.push((rest, ordered));
                continue;
            }
            if !rounding.is_zero(allocation.ordered_quantity) {
                pool.push((id, allocation.ordered_quantity));
            }
        }

        if sort {
            // 由大到小；同數量保持原順序
            pool.sort_by(|a, b| b.1.cmp(&a.1));

            if let Some(&(id, ordered)) = pool
                .iter()
                .rev()
                .find(|(_, ordered)| rounding.at_least(*ordered, quantity))
            {
                let overflow = if rounding.equals(ordered, quantity) {
                    None
                } else {
                    Some(store.split_allocation(id, quantity, rounding)?)
                };
                tracing::debug!("單筆分配行 {} 涵蓋數量 {}", id, quantity);
                return Ok(SplitOutcome {
                    covering: vec![id],
                    overflow,
                    remainder: Decimal::ZERO,
                });
            }
        }

        let mut covering = Vec::new();
        let mut overflow = None;
        let mut total = Decimal::ZERO;
        for (id, ordered) in pool {
            if rounding.at_least(total, quantity) {
                break;
            }
            let missing = rounding.round(quantity - total);
            if rounding.less_than(missing, ordered) {
                overflow = Some(store.split_allocation(id, missing, rounding)?);
                total += missing;
            } else {
                total += ordered;
            }
            covering.push(id);
        }

        let remainder = if rounding.less_than(total, quantity) {
            rounding.round(quantity - total)
        } else {
            Decimal::ZERO
        };
        tracing::debug!(
            "拆分完成：涵蓋 {} 筆，拆出 {:?}，剩餘 {}",
            covering.len(),
            overflow,
            remainder
        );

        Ok(SplitOutcome {
            covering,
            overflow,
            remainder,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;
    use wms_core::{
        Allocation, Location, Product, ProductId, Tracking, Transfer, TransferId,
        TransferTypeConfig,
    };

    fn setup(quantities: &[i64]) -> (Warehouse, TransferId, ProductId, Vec<AllocationId>) {
        let mut store = Warehouse::new();
        let product = store.add_product(Product::new("APPLE", Tracking::None));
        let stock = store.add_location(Location::new("Stock"));
        let output = store.add_location(Location::new("Output"));
        let pick = store.add_transfer_type(TransferTypeConfig::new("Pick"));
        let transfer = store.add_transfer(Transfer::new("PICK0001", pick, stock, output));
        let total: i64 = quantities.iter().sum();
        let demand = store
            .add_transfer_demand(transfer, product, Decimal::from(total))
            .unwrap();

        let ids = quantities
            .iter()
            .map(|&q| {
                let allocation =
                    Allocation::for_demand(store.demand(demand).unwrap(), Decimal::from(q));
                store.add_allocation(allocation)
            })
            .collect();
        (store, transfer, product, ids)
    }

    fn ordered(store: &Warehouse, ids: &[AllocationId]) -> Vec<Decimal> {
        ids.iter()
            .map(|id| store.allocation(*id).unwrap().ordered_quantity)
            .collect()
    }

    fn transfer_total(store: &Warehouse, transfer: TransferId) -> Decimal {
        store
            .allocations_of_transfer(transfer)
            .iter()
            .map(|id| store.allocation(*id).unwrap().ordered_quantity)
            .sum()
    }

    #[test]
    fn test_zero_quantity_is_noop() {
        let (mut store, transfer, _, ids) = setup(&[5]);
        let outcome =
            Splitter::move_lines_for_qty(&mut store, &ids, Decimal::ZERO, &Rounding::unit(), true)
                .unwrap();
        assert_eq!(outcome, SplitOutcome::empty());
        assert_eq!(store.allocations_of_transfer(transfer).len(), 1);
    }

    #[test]
    fn test_split_single_line() {
        let (mut store, _, _, ids) = setup(&[5]);
        let outcome =
            Splitter::move_lines_for_qty(&mut store, &ids, Decimal::ONE, &Rounding::unit(), true)
                .unwrap();

        assert_eq!(ordered(&store, &outcome.covering), vec![Decimal::ONE]);
        let overflow = outcome.overflow.unwrap();
        assert_eq!(store.allocation(overflow).unwrap().ordered_quantity, Decimal::from(4));
        assert_eq!(outcome.remainder, Decimal::ZERO);
    }

    #[test]
    fn test_exact_line_is_not_split() {
        let (mut store, transfer, _, ids) = setup(&[3, 5, 7]);
        let outcome = Splitter::move_lines_for_qty(
            &mut store,
            &ids,
            Decimal::from(5),
            &Rounding::unit(),
            true,
        )
        .unwrap();

        assert_eq!(outcome.covering, vec![ids[1]]);
        assert!(outcome.overflow.is_none());
        assert_eq!(store.allocations_of_transfer(transfer).len(), 3);
    }

    #[rstest]
    #[case(true, vec![17, 2])]
    #[case(false, vec![5, 14])]
    fn test_split_across_lines(#[case] sort: bool, #[case] expected: Vec<i64>) {
        let (mut store, _, _, ids) = setup(&[5, 17]);
        let outcome = Splitter::move_lines_for_qty(
            &mut store,
            &ids,
            Decimal::from(19),
            &Rounding::unit(),
            sort,
        )
        .unwrap();

        let expected: Vec<Decimal> = expected.into_iter().map(Decimal::from).collect();
        assert_eq!(ordered(&store, &outcome.covering), expected);
        let overflow = outcome.overflow.unwrap();
        assert_eq!(store.allocation(overflow).unwrap().ordered_quantity, Decimal::from(3));
    }

    #[test]
    fn test_remainder_when_not_enough() {
        let (mut store, _, _, ids) = setup(&[5]);
        let outcome = Splitter::move_lines_for_qty(
            &mut store,
            &ids,
            Decimal::from(11),
            &Rounding::unit(),
            true,
        )
        .unwrap();

        assert_eq!(ordered(&store, &outcome.covering), vec![Decimal::from(5)]);
        assert!(outcome.overflow.is_none());
        assert_eq!(outcome.remainder, Decimal::from(6));
    }

    #[test]
    fn test_split_with_done_quantity() {
        let (mut store, transfer, _, ids) = setup(&[5]);
        store.allocation_mut(ids[0]).unwrap().done_quantity = Decimal::from(3);

        let outcome =
            Splitter::move_lines_for_qty(&mut store, &ids, Decimal::ONE, &Rounding::unit(), true)
                .unwrap();

        assert_eq!(ordered(&store, &outcome.covering), vec![Decimal::ONE]);
        let overflow = outcome.overflow.unwrap();
        assert_eq!(store.allocation(overflow).unwrap().ordered_quantity, Decimal::ONE);

        // 已完成部分保持不變
        let residual = store.allocation(ids[0]).unwrap();
        assert_eq!(residual.ordered_quantity, Decimal::from(3));
        assert_eq!(residual.done_quantity, Decimal::from(3));
        assert!(!outcome.covering.contains(&ids[0]));
        assert_eq!(transfer_total(&store, transfer), Decimal::from(5));
    }

    #[test]
    fn test_fractional_rounding() {
        let (mut store, _, _, ids) = setup(&[1]);
        let rounding = Rounding::new(Decimal::new(1, 2));
        let outcome =
            Splitter::move_lines_for_qty(&mut store, &ids, Decimal::new(333, 3), &rounding, true)
                .unwrap();

        assert_eq!(ordered(&store, &outcome.covering), vec![Decimal::new(33, 2)]);
        let overflow = outcome.overflow.unwrap();
        assert_eq!(
            store.allocation(overflow).unwrap().ordered_quantity,
            Decimal::new(67, 2)
        );
    }

    proptest! {
        #[test]
        fn prop_split_conserves_quantity(
            quantities in prop::collection::vec(1i64..50, 1..8),
            target_seed in 0i64..400,
            sort in any::<bool>(),
        ) {
            let (mut store, transfer, _, ids) = setup(&quantities);
            let available: i64 = quantities.iter().sum();
            let target = target_seed % (available + 1);

            let outcome = Splitter::move_lines_for_qty(
                &mut store,
                &ids,
                Decimal::from(target),
                &Rounding::unit(),
                sort,
            )
            .unwrap();

            let covered: Decimal = ordered(&store, &outcome.covering).into_iter().sum();
            prop_assert_eq!(covered, Decimal::from(target));
            prop_assert_eq!(outcome.remainder, Decimal::ZERO);
            prop_assert_eq!(transfer_total(&store, transfer), Decimal::from(available));
        }
    }
}
