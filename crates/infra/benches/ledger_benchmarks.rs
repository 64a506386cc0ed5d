use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use retailpos_auth::{PermissionId, Role, RoleId, SessionContext};
use retailpos_core::{AggregateId, TenantId, UserId};
use retailpos_infra::store::StockStore;
use retailpos_infra::{InMemoryStore, InventoryLedger};
use retailpos_inventory::{ProductId, SaleItem, StockKey, StockRecord, StoreId, TransferItem};
use tokio::runtime::Runtime;

fn runtime() -> Runtime {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .expect("failed to build runtime")
}

fn context() -> SessionContext {
    SessionContext::new(
        UserId::new(),
        TenantId::new(),
        RoleId::new(AggregateId::new()),
        Role::new("bench"),
    )
}

/// Ledger with `products` stocked at a fresh source store.
fn stocked_ledger(
    rt: &Runtime,
    ctx: &SessionContext,
    products: usize,
) -> (InventoryLedger<InMemoryStore>, StoreId, Vec<ProductId>) {
    let ledger = InventoryLedger::new(InMemoryStore::default());
    let source = StoreId::generate();
    let ids: Vec<ProductId> = (0..products).map(|_| ProductId::generate()).collect();

    rt.block_on(async {
        for product in &ids {
            ledger
                .store()
                .insert_stock(
                    ctx.tenant_id,
                    StockRecord::new(StockKey::new(*product, source), i64::MAX / 4),
                )
                .await
                .unwrap();
        }
    });

    (ledger, source, ids)
}

fn bench_transfer_apply(c: &mut Criterion) {
    let rt = runtime();
    let ctx = context();
    let mut group = c.benchmark_group("transfer_apply");

    for item_count in [1usize, 10, 100] {
        let (ledger, source, products) = stocked_ledger(&rt, &ctx, item_count);
        let destination = StoreId::generate();
        let items: Vec<TransferItem> = products
            .iter()
            .map(|p| TransferItem {
                product_id: *p,
                quantity: 1,
            })
            .collect();

        group.throughput(Throughput::Elements(item_count as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(item_count),
            &items,
            |b, items| {
                b.iter(|| {
                    rt.block_on(async {
                        let transfer = ledger
                            .create_transfer(&ctx, source, destination, items.clone())
                            .await
                            .unwrap();
                        black_box(ledger.apply_transfer(&ctx, transfer).await.unwrap())
                    })
                });
            },
        );
    }

    group.finish();
}

fn bench_sale_decrement(c: &mut Criterion) {
    let rt = runtime();
    let ctx = context();
    let mut group = c.benchmark_group("sale_decrement");

    for line_count in [1usize, 10, 100] {
        let (ledger, shop, products) = stocked_ledger(&rt, &ctx, line_count);
        let lines: Vec<SaleItem> = products.iter().map(|p| SaleItem::new(*p, 1, 100)).collect();

        group.throughput(Throughput::Elements(line_count as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(line_count),
            &lines,
            |b, lines| {
                b.iter(|| {
                    rt.block_on(async {
                        black_box(
                            ledger
                                .apply_sale_decrement(&ctx, shop, lines)
                                .await
                                .unwrap(),
                        )
                    })
                });
            },
        );
    }

    group.finish();
}

fn bench_permission_reconcile(c: &mut Criterion) {
    let rt = runtime();
    let ctx = context();
    let mut group = c.benchmark_group("permission_reconcile");

    for size in [10usize, 100] {
        let ledger = InventoryLedger::new(InMemoryStore::default());
        let role = RoleId::new(AggregateId::new());
        let desired: Vec<PermissionId> = (0..size)
            .map(|_| PermissionId::new(AggregateId::new()))
            .collect();
        rt.block_on(ledger.reconcile_permissions(&ctx, role, &desired))
            .unwrap();

        // Converged role: measures the read-and-diff path with no writes.
        group.bench_with_input(BenchmarkId::new("converged", size), &desired, |b, desired| {
            b.iter(|| {
                rt.block_on(async {
                    black_box(
                        ledger
                            .reconcile_permissions(&ctx, role, desired)
                            .await
                            .unwrap(),
                    )
                })
            });
        });

        // Alternate between two disjoint sets so every iteration rewrites the role.
        let other: Vec<PermissionId> = (0..size)
            .map(|_| PermissionId::new(AggregateId::new()))
            .collect();
        let mut flip = false;
        group.bench_function(BenchmarkId::new("full_swap", size), |b| {
            b.iter(|| {
                flip = !flip;
                let target = if flip { &other } else { &desired };
                rt.block_on(async {
                    black_box(
                        ledger
                            .reconcile_permissions(&ctx, role, target)
                            .await
                            .unwrap(),
                    )
                })
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_transfer_apply,
    bench_sale_decrement,
    bench_permission_reconcile
);
criterion_main!(benches);
