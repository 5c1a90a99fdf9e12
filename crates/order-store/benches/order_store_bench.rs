use chrono::Utc;
use common::{
    LineItemId, LogEntryId, OrderId, OrderNumber, OrderNumberSequenceId, ProductId, ProductNumber,
    ShopId, StorefrontId, UserId,
};
use criterion::{Criterion, criterion_group, criterion_main};
use order_store::{
    InMemoryOrderStore, LineItemRecord, LogEntryRecord, LogQuery, NewOrder,
    OrderNumberSequenceRecord, OrderRecord, OrderStore, OrderStoreExt, StockChange,
};

fn make_order(number: u32, product_id: ProductId) -> NewOrder {
    let order_id = OrderId::new();
    let order_number = OrderNumber::new(format!("ORDER-{number:05}"));
    let now = Utc::now();

    NewOrder {
        order: OrderRecord {
            id: order_id,
            created_at: now,
            shop_id: ShopId::new("shop"),
            storefront_id: StorefrontId::new("storefront"),
            order_number: order_number.clone(),
            placed_by_id: UserId::new(),
            company: None,
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            country: "Germany".to_string(),
            zip_code: "31337".to_string(),
            city: "Example City".to_string(),
            street: "Example Street 1".to_string(),
            currency: "EUR".to_string(),
            total_amount_cents: 1000,
            payment_method: None,
            payment_state: "open".to_string(),
            payment_state_updated_at: None,
            payment_state_updated_by_id: None,
            cancellation_reason: None,
            invoice_created_at: None,
            processing_required: false,
            processed_at: None,
        },
        line_items: vec![LineItemRecord {
            id: LineItemId::new(),
            order_id,
            order_number,
            product_id,
            product_number: ProductNumber::new("P-00001"),
            product_type: "physical".to_string(),
            name: "Product".to_string(),
            unit_price_cents: 1000,
            tax_rate_basis_points: 1900,
            quantity: 1,
            line_amount_cents: 1000,
            processing_required: false,
            processing_result: serde_json::json!({}),
            processed_at: None,
        }],
        log_entry: LogEntryRecord {
            id: LogEntryId::new(),
            occurred_at: now,
            event_type: "order-placed".to_string(),
            order_id,
            data: serde_json::json!({}),
        },
        stock_decrements: vec![StockChange::new(product_id, 1)],
    }
}

fn bench_increment_sequence(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = InMemoryOrderStore::new();
    let sequence_id = OrderNumberSequenceId::new();
    rt.block_on(async {
        store
            .create_order_number_sequence(OrderNumberSequenceRecord {
                id: sequence_id,
                shop_id: ShopId::new("shop"),
                prefix: "ORDER-".to_string(),
                value: 0,
            })
            .await
            .unwrap();
    });

    c.bench_function("order_store/increment_sequence", |b| {
        b.iter(|| {
            rt.block_on(async {
                store
                    .increment_order_number_sequence(sequence_id)
                    .await
                    .unwrap();
            });
        });
    });
}

fn bench_insert_order(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("order_store/insert_order", |b| {
        b.iter(|| {
            rt.block_on(async {
                let store = InMemoryOrderStore::new();
                let product_id = ProductId::new();
                store.set_stock(product_id, 1).await.unwrap();
                store.insert_order(make_order(1, product_id)).await.unwrap();
            });
        });
    });
}

fn bench_find_order_among_100(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = InMemoryOrderStore::new();
    let product_id = ProductId::new();
    let order_id = rt.block_on(async {
        store.set_stock(product_id, 100).await.unwrap();
        let mut last = None;
        for n in 1..=100 {
            let new_order = make_order(n, product_id);
            last = Some(new_order.order.id);
            store.insert_order(new_order).await.unwrap();
        }
        last.unwrap()
    });

    c.bench_function("order_store/find_order_among_100", |b| {
        b.iter(|| {
            rt.block_on(async {
                store.get_order(order_id).await.unwrap();
            });
        });
    });

    c.bench_function("order_store/query_log_for_order", |b| {
        b.iter(|| {
            rt.block_on(async {
                store
                    .get_log_entries(LogQuery::for_order(order_id))
                    .await
                    .unwrap();
            });
        });
    });
}

criterion_group!(
    benches,
    bench_increment_sequence,
    bench_insert_order,
    bench_find_order_among_100,
);
criterion_main!(benches);
