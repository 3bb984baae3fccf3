//! 簡單揀貨示例：預留、掃描、部分驗收並產生欠交單

use rust_decimal::Decimal;
use wms::core::{Location, Product, StockUnit, Tracking, Transfer, TransferTypeConfig};
use wms::{MarkDoneRequest, ScanEntry, TransferEngine, Warehouse};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().init();
    println!("=== 簡單揀貨示例 ===\n");

    let mut store = Warehouse::new();
    let apple = store.add_product(Product::new("Apple", Tracking::None));
    let stock = store.add_location(Location::new("WH/Stock"));
    let output = store.add_location(Location::new("WH/Output"));
    store.add_stock(StockUnit::new(apple, stock, Decimal::from(6)));
    store.add_stock(StockUnit::new(apple, stock, Decimal::from(10)));

    let pick = store.add_transfer_type(TransferTypeConfig::from_json(
        r#"{"name": "Pick", "post_assign_action": "merge_allocations"}"#,
    )?);
    let transfer = store.add_transfer(
        Transfer::new("WH/PICK/0001", pick, stock, output).with_origin("SO-001"),
    );
    store.add_transfer_demand(transfer, apple, Decimal::from(12))?;

    let engine = TransferEngine::new();
    engine.confirm(&mut store, transfer)?;
    engine.assign(&mut store, transfer)?;

    println!("分配行:");
    for id in store.allocations_of_transfer(transfer) {
        let allocation = store.allocation(id)?;
        println!("  - {} 應作業 {}", id, allocation.ordered_quantity);
    }

    let request = MarkDoneRequest::new().with_entry(ScanEntry::new(apple, Decimal::from(8)));
    engine.mark_as_done(&mut store, transfer, &request)?;

    if let Some(backorder) = engine.validate(&mut store, transfer)? {
        let quantities = store.transfer_quantities(backorder)?;
        println!(
            "\n欠交單 {}：剩餘 {}",
            store.transfer(backorder)?.name,
            quantities.total
        );
    }

    Ok(())
}
