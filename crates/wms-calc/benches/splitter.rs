//! 分配行拆分效能測試

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rust_decimal::Decimal;
use wms_calc::Splitter;
use wms_core::{
    Allocation, AllocationId, Location, Product, Rounding, Tracking, Transfer, TransferTypeConfig,
    Warehouse,
};

/// 一張調撥單，單一需求拆成 `lines` 筆零碎分配行
fn fragmented(lines: usize) -> (Warehouse, Vec<AllocationId>) {
    let mut store = Warehouse::new();
    let product = store.add_product(Product::new("Screw", Tracking::None));
    let stock = store.add_location(Location::new("Stock"));
    let output = store.add_location(Location::new("Output"));
    let kind = store.add_transfer_type(TransferTypeConfig::new("Pick"));
    let transfer = store.add_transfer(Transfer::new("PICK0001", kind, stock, output));
    let total: i64 = (0..lines as i64).map(|i| i % 7 + 1).sum();
    let demand = store
        .add_transfer_demand(transfer, product, Decimal::from(total))
        .unwrap();

    let ids = (0..lines as i64)
        .map(|i| {
            let allocation =
                Allocation::for_demand(store.demand(demand).unwrap(), Decimal::from(i % 7 + 1));
            store.add_allocation(allocation)
        })
        .collect();
    (store, ids)
}

fn bench_move_lines_for_qty(c: &mut Criterion) {
    let mut group = c.benchmark_group("move_lines_for_qty");
    let rounding = Rounding::unit();

    for lines in [10usize, 100, 1000] {
        let (store, ids) = fragmented(lines);
        let target = Decimal::from(lines as i64 * 2 + 1);

        for sort in [true, false] {
            let label = if sort { "sorted" } else { "in_order" };
            group.bench_with_input(BenchmarkId::new(label, lines), &lines, |b, _| {
                b.iter_batched(
                    || store.clone(),
                    |mut store| {
                        Splitter::move_lines_for_qty(
                            &mut store,
                            black_box(&ids),
                            black_box(target),
                            &rounding,
                            sort,
                        )
                        .unwrap()
                    },
                    criterion::BatchSize::SmallInput,
                )
            });
        }
    }
    group.finish();
}

criterion_group!(benches, bench_move_lines_for_qty);
criterion_main!(benches);
