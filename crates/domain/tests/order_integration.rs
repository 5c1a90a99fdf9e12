//! Integration tests for the order lifecycle.
//!
//! These tests drive `OrderService` against the in-memory store and verify
//! stock accounting, the payment state machine and the order log.

use common::{Currency, Money, ProductId, ProductNumber, ShopId, StorefrontId, TaxRate, UserId};
use domain::{
    Address, CancelOrder, CartError, DomainError, InMemoryShopCatalog, InMemoryUserDirectory,
    MAX_QUANTITY, MarkOrderAsPaid, NoFulfillment, Order, OrderError, OrderLogEventType,
    OrderService, Orderer, PaymentState, PlaceOrder, Product, ProductType, ProductTypeParams, Shop,
    Storefront, User,
};
use order_store::{InMemoryOrderStore, OrderStore};

type Service =
    OrderService<InMemoryOrderStore, InMemoryShopCatalog, InMemoryUserDirectory, NoFulfillment>;

const STOREFRONT: &str = "cozylan-2024";

struct Shopfront {
    service: Service,
    store: InMemoryOrderStore,
    orderer: Orderer,
    admin: UserId,
    article: Product,
}

async fn open_shop(stock: i32) -> Shopfront {
    let store = InMemoryOrderStore::new();
    let catalog = InMemoryShopCatalog::new();
    let users = InMemoryUserDirectory::new();
    let service = OrderService::new(store.clone(), catalog.clone(), users.clone(), NoFulfillment);

    let shop_id = ShopId::new("cozylan");
    catalog
        .add_shop(Shop {
            id: shop_id.clone(),
            title: "CozyLAN".to_string(),
            currency: Currency::EUR,
        })
        .await;
    let sequence = service
        .sequences()
        .create_sequence(shop_id.clone(), "CL24-")
        .await
        .unwrap();
    catalog
        .add_storefront(Storefront {
            id: StorefrontId::new(STOREFRONT),
            shop_id: shop_id.clone(),
            order_number_sequence_id: sequence.id,
        })
        .await;

    let article = Product {
        id: ProductId::new(),
        shop_id,
        item_number: ProductNumber::new("CL24-A00001"),
        product_type: ProductType::Physical,
        type_params: ProductTypeParams::default(),
        name: "T-Shirt".to_string(),
        price: Money::from_cents(1995, Currency::EUR),
        tax_rate: TaxRate::from_percent(19),
        processing_required: false,
    };
    catalog.add_product(article.clone()).await;
    store.set_stock(article.id, stock).await.unwrap();

    let orderer_user = User::new(UserId::new(), "Orderer");
    let admin = User::new(UserId::new(), "Admin");
    users.add_user(orderer_user.clone()).await;
    users.add_user(admin.clone()).await;

    Shopfront {
        service,
        store,
        orderer: Orderer {
            user: orderer_user,
            company: None,
            first_name: "Hiro".to_string(),
            last_name: "Protagonist".to_string(),
            address: Address {
                country: "Germany".to_string(),
                zip_code: "22999".to_string(),
                city: "Büttenwarder".to_string(),
                street: "Deichstraße 23".to_string(),
            },
        },
        admin: admin.id,
        article,
    }
}

async fn place(shop: &Shopfront, quantity: u32) -> Result<Order, DomainError> {
    let cart = shop
        .service
        .create_cart(&StorefrontId::new(STOREFRONT), &[(shop.article.id, quantity)])
        .await?;
    let (order, _) = shop
        .service
        .place_order(PlaceOrder::new(STOREFRONT, shop.orderer.clone(), cart))
        .await?;
    Ok(order)
}

async fn stock(shop: &Shopfront) -> i32 {
    shop.store
        .get_stock(shop.article.id)
        .await
        .unwrap()
        .unwrap_or_default()
}

mod scenarios {
    use super::*;

    #[tokio::test]
    async fn place_order_decrements_stock() {
        let shop = open_shop(8).await;

        let order = place(&shop, 3).await.unwrap();

        assert_eq!(stock(&shop).await, 5);
        assert_eq!(order.payment_state(), PaymentState::Open);
        assert_eq!(order.total_amount(), shop.article.price.checked_multiply(3).unwrap());
        assert_eq!(order.order_number().as_str(), "CL24-00001");
    }

    #[tokio::test]
    async fn mark_as_paid_logs_former_state_and_method() {
        let shop = open_shop(8).await;
        let order = place(&shop, 3).await.unwrap();

        let (order, event) = shop
            .service
            .mark_order_as_paid(MarkOrderAsPaid::new(order.id(), "bank_transfer", shop.admin))
            .await
            .unwrap();

        assert_eq!(order.payment_state(), PaymentState::Paid);
        assert_eq!(event.order_number, *order.order_number());

        let log = shop.service.get_log_entries(order.id()).await.unwrap();
        let paid = log
            .iter()
            .find(|entry| entry.event_type == OrderLogEventType::OrderPaid)
            .expect("order-paid entry");
        assert_eq!(paid.data["former_payment_state"], "open");
        assert_eq!(paid.data["payment_method"], "bank_transfer");
    }

    #[tokio::test]
    async fn cancel_paid_order_restores_stock() {
        let shop = open_shop(8).await;
        let order = place(&shop, 3).await.unwrap();
        shop.service
            .mark_order_as_paid(MarkOrderAsPaid::new(order.id(), "bank_transfer", shop.admin))
            .await
            .unwrap();

        let (order, _) = shop
            .service
            .cancel_order(CancelOrder::new(order.id(), shop.admin, "duplicate"))
            .await
            .unwrap();

        assert_eq!(order.payment_state(), PaymentState::CanceledAfterPaid);
        assert_eq!(order.cancellation_reason(), Some("duplicate"));
        assert_eq!(stock(&shop).await, 8);
    }
}

mod properties {
    use super::*;
    use futures_util::future::join_all;
    use std::collections::HashSet;

    #[tokio::test]
    async fn concurrent_placements_get_distinct_numbers() {
        let shop = open_shop(1_000).await;

        let results = join_all((0..25).map(|_| place(&shop, 1))).await;

        let numbers: HashSet<_> = results
            .into_iter()
            .map(|r| r.unwrap().order_number().clone())
            .collect();
        assert_eq!(numbers.len(), 25);
        assert_eq!(stock(&shop).await, 975);
    }

    #[tokio::test]
    async fn cancel_before_paid_is_stock_neutral() {
        let shop = open_shop(10).await;

        let first = place(&shop, 4).await.unwrap();
        let second = place(&shop, 2).await.unwrap();
        assert_eq!(stock(&shop).await, 4);

        for order in [first, second] {
            let (canceled, _) = shop
                .service
                .cancel_order(CancelOrder::new(order.id(), shop.admin, "changed mind"))
                .await
                .unwrap();
            assert_eq!(canceled.payment_state(), PaymentState::CanceledBeforePaid);
        }
        assert_eq!(stock(&shop).await, 10);
    }

    #[tokio::test]
    async fn insufficient_stock_leaves_no_trace() {
        let shop = open_shop(2).await;

        let result = place(&shop, 3).await;

        assert!(matches!(result, Err(DomainError::OrderFailed(_))));
        assert_eq!(stock(&shop).await, 2);
        assert_eq!(shop.store.order_count().await, 0);
        assert_eq!(shop.store.log_entry_count().await, 0);
    }

    #[tokio::test]
    async fn quantity_beyond_stored_range_is_rejected() {
        let shop = open_shop(i32::MAX).await;

        let result = place(&shop, 3_000_000_000).await;

        assert!(matches!(
            result,
            Err(DomainError::Cart(CartError::InvalidQuantity {
                quantity: 3_000_000_000
            }))
        ));
        assert_eq!(stock(&shop).await, i32::MAX);
        assert_eq!(shop.store.order_count().await, 0);
        assert_eq!(shop.store.log_entry_count().await, 0);
    }

    #[tokio::test]
    async fn maximum_quantity_is_stored_exactly() {
        let shop = open_shop(i32::MAX).await;

        let order = place(&shop, MAX_QUANTITY).await.unwrap();

        let stored = shop.service.get_order(order.id()).await.unwrap();
        let item = &stored.line_items()[0];
        assert_eq!(item.quantity(), MAX_QUANTITY);
        assert_eq!(
            item.line_amount().cents(),
            shop.article.price.cents() * i64::from(MAX_QUANTITY)
        );
        assert_eq!(stored.total_amount(), item.line_amount());
        assert_eq!(stock(&shop).await, 0);
    }

    #[tokio::test]
    async fn rejected_transitions_leave_state_unchanged() {
        let shop = open_shop(10).await;
        let order = place(&shop, 1).await.unwrap();
        shop.service
            .cancel_order(CancelOrder::new(order.id(), shop.admin, "test"))
            .await
            .unwrap();

        let paid = shop
            .service
            .mark_order_as_paid(MarkOrderAsPaid::new(order.id(), "cash", shop.admin))
            .await;
        assert!(matches!(
            paid,
            Err(DomainError::Order(OrderError::AlreadyCanceled(_)))
        ));

        let canceled_again = shop
            .service
            .cancel_order(CancelOrder::new(order.id(), shop.admin, "again"))
            .await;
        assert!(matches!(
            canceled_again,
            Err(DomainError::Order(OrderError::AlreadyCanceled(_)))
        ));

        let order = shop.service.get_order(order.id()).await.unwrap();
        assert_eq!(order.payment_state(), PaymentState::CanceledBeforePaid);
        assert_eq!(order.cancellation_reason(), Some("test"));
        assert_eq!(stock(&shop).await, 10);
    }

    #[tokio::test]
    async fn log_only_grows_until_deletion() {
        let shop = open_shop(10).await;
        let order = place(&shop, 1).await.unwrap();
        assert_eq!(log_len(&shop, &order).await, 1);

        shop.service
            .mark_order_as_paid(MarkOrderAsPaid::new(order.id(), "cash", shop.admin))
            .await
            .unwrap();
        // payment-created and order-paid
        assert_eq!(log_len(&shop, &order).await, 3);

        shop.service
            .set_invoiced_flag(order.id(), shop.admin)
            .await
            .unwrap();
        assert_eq!(log_len(&shop, &order).await, 4);

        shop.service
            .cancel_order(CancelOrder::new(order.id(), shop.admin, "refund"))
            .await
            .unwrap();
        assert_eq!(log_len(&shop, &order).await, 5);

        let _ = shop
            .service
            .cancel_order(CancelOrder::new(order.id(), shop.admin, "refund"))
            .await;
        assert_eq!(log_len(&shop, &order).await, 5);

        shop.service.delete_order(order.id()).await.unwrap();
        assert_eq!(log_len(&shop, &order).await, 0);
    }

    async fn log_len(shop: &Shopfront, order: &Order) -> usize {
        shop.service.get_log_entries(order.id()).await.unwrap().len()
    }

    #[tokio::test]
    async fn second_payment_is_rejected() {
        let shop = open_shop(10).await;
        let order = place(&shop, 1).await.unwrap();

        let (first, _) = shop
            .service
            .mark_order_as_paid(MarkOrderAsPaid::new(order.id(), "paypal", shop.admin))
            .await
            .unwrap();

        let second = shop
            .service
            .mark_order_as_paid(MarkOrderAsPaid::new(order.id(), "cash", shop.admin))
            .await;
        assert!(matches!(
            second,
            Err(DomainError::Order(OrderError::AlreadyMarkedAsPaid(_)))
        ));

        let reloaded = shop.service.get_order(order.id()).await.unwrap();
        assert_eq!(reloaded.payment_method(), Some("paypal"));
        assert_eq!(
            reloaded.payment_state_updated_at(),
            first.payment_state_updated_at()
        );
        assert_eq!(
            shop.service
                .get_payments_for_order(order.id())
                .await
                .unwrap()
                .len(),
            1
        );
    }
}
