use std::sync::Arc;

use chrono::Duration;
use gaming_store_api::{
    checkout::{
        Checkout,
        gateway::{FixedGateway, PaymentOutcome},
        inventory::InventoryLedger,
        ledger::OrderLedger,
        MAX_LINE_QUANTITY,
        sessions::PaymentSessionStore,
    },
    dto::orders::OrderRequest,
    error::AppError,
    models::{DeliveryOption, OrderItem, OrderStatus, Product, ShippingInfo},
    repository::{
        ProductRepository, UserRepository,
        memory::{InMemoryOrderRepository, InMemoryProductRepository, InMemoryUserRepository},
    },
};
use uuid::Uuid;

struct Harness {
    checkout: Arc<Checkout>,
    inventory: InventoryLedger,
    orders: OrderLedger,
    products: Arc<dyn ProductRepository>,
    users: Arc<dyn UserRepository>,
}

fn product(id: &str, name: &str, price: i64, stock: i32) -> Product {
    Product {
        id: id.into(),
        name: name.into(),
        description: None,
        price,
        stock,
        image_url: None,
        category: Some("consolas".into()),
    }
}

fn catalog() -> Vec<Product> {
    vec![
        product("5", "Nintendo Switch", 349990, 8),
        product("13", "PlayStation 5", 549990, 2),
        product("21", "Control DualSense", 69990, 1),
    ]
}

fn harness(outcome: PaymentOutcome, ttl: Duration) -> Harness {
    let products: Arc<dyn ProductRepository> =
        Arc::new(InMemoryProductRepository::with_products(catalog()));
    let users: Arc<dyn UserRepository> = Arc::new(InMemoryUserRepository::default());
    let inventory = InventoryLedger::new(products.clone());
    let orders = OrderLedger::new(Arc::new(InMemoryOrderRepository::default()), inventory.clone());
    let checkout = Arc::new(Checkout::new(
        Arc::new(FixedGateway(outcome)),
        Arc::new(PaymentSessionStore::new(ttl)),
        inventory.clone(),
        orders.clone(),
        users.clone(),
    ));
    Harness {
        checkout,
        inventory,
        orders,
        products,
        users,
    }
}

fn approving() -> Harness {
    harness(PaymentOutcome::Authorized, Duration::seconds(300))
}

fn line(product_id: &str, quantity: i32, price: i64) -> OrderItem {
    OrderItem {
        product_id: product_id.into(),
        quantity,
        name: format!("Product {product_id}"),
        price,
        image: None,
        original_price: None,
        discount_applied: false,
    }
}

fn cart(items: Vec<OrderItem>) -> OrderRequest {
    OrderRequest {
        items,
        shipping_info: ShippingInfo {
            first_name: "Juan".into(),
            last_name: "Perez".into(),
            email: "juan@example.com".into(),
            address: "Av. Siempre Viva 742".into(),
            city: "Santiago".into(),
            region: "RM".into(),
            ..ShippingInfo::default()
        },
        delivery_option: DeliveryOption::Standard,
    }
}

#[tokio::test]
async fn approved_checkout_records_completed_order_and_decrements_stock() {
    let h = approving();
    let user_id = Uuid::new_v4();

    let order = h
        .checkout
        .submit(user_id, cart(vec![line("5", 1, 349990)]))
        .await
        .unwrap();

    assert_eq!(order.status, OrderStatus::Completed);
    assert_eq!(order.user_id, user_id);
    assert_eq!(order.subtotal, 349990);
    assert_eq!(order.tax, 27999);
    assert_eq!(order.shipping_cost, 2500);
    assert_eq!(order.total, 349990 + 27999 + 2500);
    assert_eq!(h.inventory.stock_of("5").await.unwrap(), 7);
    assert_eq!(h.orders.find(order.id).await.unwrap(), order);
}

#[tokio::test]
async fn declined_checkout_records_cancelled_order_without_touching_stock() {
    let h = harness(PaymentOutcome::Declined, Duration::seconds(300));

    let order = h
        .checkout
        .submit(Uuid::new_v4(), cart(vec![line("5", 2, 349990)]))
        .await
        .unwrap();

    assert_eq!(order.status, OrderStatus::Cancelled);
    assert_eq!(h.inventory.stock_of("5").await.unwrap(), 8);
    assert_eq!(h.orders.list_all().await.unwrap().len(), 1);
}

#[tokio::test]
async fn insufficient_stock_rejects_whole_cart() {
    let h = approving();

    let err = h
        .checkout
        .submit(
            Uuid::new_v4(),
            cart(vec![line("5", 1, 349990), line("13", 3, 549990)]),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::InsufficientStock { ref product_id, .. } if product_id == "13"));
    assert_eq!(h.inventory.stock_of("5").await.unwrap(), 8);
    assert_eq!(h.inventory.stock_of("13").await.unwrap(), 2);
    assert!(h.orders.list_all().await.unwrap().is_empty());
}

#[tokio::test]
async fn unknown_product_is_reported_and_nothing_is_recorded() {
    let h = approving();

    let err = h
        .checkout
        .submit(Uuid::new_v4(), cart(vec![line("5", 1, 349990), line("404", 1, 100)]))
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::ProductNotFound(ref id) if id == "404"));
    assert_eq!(h.inventory.stock_of("5").await.unwrap(), 8);
    assert!(h.orders.list_all().await.unwrap().is_empty());
}

#[tokio::test]
async fn empty_or_invalid_carts_are_rejected() {
    let h = approving();

    let err = h.checkout.submit(Uuid::new_v4(), cart(vec![])).await.unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    let err = h
        .checkout
        .submit(Uuid::new_v4(), cart(vec![line("5", 0, 349990)]))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    let err = h
        .checkout
        .initiate(Uuid::new_v4(), cart(vec![line("5", -1, 349990)]))
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    assert_eq!(h.inventory.stock_of("5").await.unwrap(), 8);
}

#[tokio::test]
async fn two_phase_checkout_settles_once() {
    let h = approving();
    let user_id = Uuid::new_v4();

    let token = h
        .checkout
        .initiate(user_id, cart(vec![line("5", 1, 349990)]))
        .unwrap();
    assert_eq!(h.inventory.stock_of("5").await.unwrap(), 8);

    let order = h.checkout.confirm(&token, "AUTHORIZED").await.unwrap();
    assert_eq!(order.status, OrderStatus::Completed);
    assert_eq!(order.user_id, user_id);
    assert_eq!(h.inventory.stock_of("5").await.unwrap(), 7);

    let err = h.checkout.confirm(&token, "AUTHORIZED").await.unwrap_err();
    assert!(matches!(err, AppError::SessionNotFound));
    assert_eq!(h.inventory.stock_of("5").await.unwrap(), 7);
    assert_eq!(h.orders.list_all().await.unwrap().len(), 1);
}

#[tokio::test]
async fn non_authorized_verdict_cancels_without_stock_change() {
    let h = approving();

    for verdict in ["REJECTED", "authorized", "FAILED"] {
        let token = h
            .checkout
            .initiate(Uuid::new_v4(), cart(vec![line("5", 1, 349990)]))
            .unwrap();
        let order = h.checkout.confirm(&token, verdict).await.unwrap();
        assert_eq!(order.status, OrderStatus::Cancelled, "verdict {verdict}");
    }
    assert_eq!(h.inventory.stock_of("5").await.unwrap(), 8);
}

#[tokio::test]
async fn expired_session_is_rejected_and_spent() {
    let h = harness(PaymentOutcome::Authorized, Duration::milliseconds(50));

    let token = h
        .checkout
        .initiate(Uuid::new_v4(), cart(vec![line("5", 1, 349990)]))
        .unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(120)).await;

    let err = h.checkout.confirm(&token, "AUTHORIZED").await.unwrap_err();
    assert!(matches!(err, AppError::SessionExpired));

    let err = h.checkout.confirm(&token, "AUTHORIZED").await.unwrap_err();
    assert!(matches!(err, AppError::SessionNotFound));

    assert_eq!(h.inventory.stock_of("5").await.unwrap(), 8);
    assert!(h.orders.list_all().await.unwrap().is_empty());
}

#[tokio::test]
async fn unknown_token_is_rejected() {
    let h = approving();
    let err = h.checkout.confirm("not-a-token", "AUTHORIZED").await.unwrap_err();
    assert!(matches!(err, AppError::SessionNotFound));
}

#[tokio::test]
async fn confirm_loses_race_for_last_unit() {
    let h = approving();

    let first = h
        .checkout
        .initiate(Uuid::new_v4(), cart(vec![line("21", 1, 69990)]))
        .unwrap();
    let second = h
        .checkout
        .initiate(Uuid::new_v4(), cart(vec![line("21", 1, 69990)]))
        .unwrap();

    h.checkout.confirm(&first, "AUTHORIZED").await.unwrap();
    let err = h.checkout.confirm(&second, "AUTHORIZED").await.unwrap_err();
    assert!(matches!(err, AppError::InsufficientStock { .. }));

    // The losing token is spent as well.
    let err = h.checkout.confirm(&second, "AUTHORIZED").await.unwrap_err();
    assert!(matches!(err, AppError::SessionNotFound));
    assert_eq!(h.inventory.stock_of("21").await.unwrap(), 0);
}

#[tokio::test]
async fn deleting_any_order_restores_its_quantities() {
    let h = approving();

    let completed = h
        .checkout
        .submit(Uuid::new_v4(), cart(vec![line("5", 2, 349990), line("13", 1, 549990)]))
        .await
        .unwrap();
    assert_eq!(h.inventory.stock_of("5").await.unwrap(), 6);
    assert_eq!(h.inventory.stock_of("13").await.unwrap(), 1);

    h.orders.remove(completed.id).await.unwrap();
    assert_eq!(h.inventory.stock_of("5").await.unwrap(), 8);
    assert_eq!(h.inventory.stock_of("13").await.unwrap(), 2);

    let err = h.orders.remove(completed.id).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound));
    assert_eq!(h.inventory.stock_of("5").await.unwrap(), 8);
}

#[tokio::test]
async fn status_can_move_between_any_values() {
    let h = approving();
    let order = h
        .checkout
        .submit(Uuid::new_v4(), cart(vec![line("5", 1, 349990)]))
        .await
        .unwrap();

    let updated = h.orders.set_status(order.id, OrderStatus::Pending).await.unwrap();
    assert_eq!(updated.status, OrderStatus::Pending);
    let updated = h.orders.set_status(order.id, OrderStatus::Completed).await.unwrap();
    assert_eq!(updated.status, OrderStatus::Completed);

    // Status changes never move stock.
    assert_eq!(h.inventory.stock_of("5").await.unwrap(), 7);

    let err = h
        .orders
        .set_status(Uuid::new_v4(), OrderStatus::Failed)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_checkouts_never_oversell() {
    let h = approving();

    let mut handles = Vec::new();
    for _ in 0..10 {
        let checkout = h.checkout.clone();
        handles.push(tokio::spawn(async move {
            checkout
                .submit(Uuid::new_v4(), cart(vec![line("13", 1, 549990)]))
                .await
        }));
    }

    let mut completed = 0;
    let mut rejected = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(order) => {
                assert_eq!(order.status, OrderStatus::Completed);
                completed += 1;
            }
            Err(AppError::InsufficientStock { .. }) => rejected += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(completed, 2);
    assert_eq!(rejected, 8);
    assert_eq!(h.inventory.stock_of("13").await.unwrap(), 0);
}

#[tokio::test]
async fn stock_plus_completed_quantities_is_conserved() {
    let h = approving();
    let initial: i64 = catalog().iter().map(|p| i64::from(p.stock)).sum();

    let a = h
        .checkout
        .submit(Uuid::new_v4(), cart(vec![line("5", 3, 349990), line("21", 1, 69990)]))
        .await
        .unwrap();
    h.checkout
        .submit(Uuid::new_v4(), cart(vec![line("13", 2, 549990)]))
        .await
        .unwrap();
    let _ = h
        .checkout
        .submit(Uuid::new_v4(), cart(vec![line("13", 1, 549990)]))
        .await
        .unwrap_err();
    h.orders.remove(a.id).await.unwrap();

    let mut stock = 0i64;
    for p in catalog() {
        stock += i64::from(h.inventory.stock_of(&p.id).await.unwrap());
    }
    let held: i64 = h
        .orders
        .list_all()
        .await
        .unwrap()
        .iter()
        .filter(|o| o.status == OrderStatus::Completed)
        .flat_map(|o| o.items.iter())
        .map(|i| i64::from(i.quantity))
        .sum();

    assert_eq!(stock + held, initial);
}

#[tokio::test]
async fn line_items_are_priced_from_the_catalog() {
    let h = approving();
    let mut tampered = line("5", 2, 1);
    tampered.name = "Free console".into();
    tampered.image = Some("https://evil.example/x.png".into());
    tampered.original_price = Some(999_999_999);
    tampered.discount_applied = true;

    let order = h
        .checkout
        .submit(Uuid::new_v4(), cart(vec![tampered]))
        .await
        .unwrap();

    let item = &order.items[0];
    assert_eq!(item.name, "Nintendo Switch");
    assert_eq!(item.price, 349990);
    assert_eq!(item.image, None);
    assert_eq!(item.original_price, None);
    assert!(!item.discount_applied);
    assert_eq!(order.subtotal, 349990 * 2);
    assert_eq!(order.duoc_discount, 0);
}

#[tokio::test]
async fn snapshot_does_not_follow_later_catalog_edits() {
    let h = approving();
    let order = h
        .checkout
        .submit(Uuid::new_v4(), cart(vec![line("5", 1, 0)]))
        .await
        .unwrap();

    let mut repriced = h.products.get_product("5").await.unwrap().unwrap();
    repriced.price = 299990;
    repriced.name = "Nintendo Switch OLED".into();
    h.products.save_product(repriced).await.unwrap();

    let stored = h.orders.find(order.id).await.unwrap();
    assert_eq!(stored.items[0].price, 349990);
    assert_eq!(stored.items[0].name, "Nintendo Switch");
}

#[tokio::test]
async fn student_accounts_get_the_discount_server_side() {
    let h = approving();
    let student = h
        .users
        .create_user("ana@DuocUC.cl", "hash", "user")
        .await
        .unwrap();

    let order = h
        .checkout
        .submit(student.id, cart(vec![line("21", 1, 1)]))
        .await
        .unwrap();

    let item = &order.items[0];
    assert!(item.discount_applied);
    assert_eq!(item.original_price, Some(69990));
    assert_eq!(item.price, 55992);
    assert_eq!(order.subtotal, 69990);
    assert_eq!(order.duoc_discount, 69990 - 55992);
    assert_eq!(order.tax, (55992 * 8 + 50) / 100);
    assert_eq!(
        order.total,
        order.subtotal - order.duoc_discount + order.tax + order.shipping_cost
    );
}

#[tokio::test]
async fn quantities_above_the_per_order_cap_are_rejected() {
    let h = harness(PaymentOutcome::Declined, Duration::seconds(300));

    let err = h
        .checkout
        .submit(Uuid::new_v4(), cart(vec![line("5", i32::MAX, 1)]))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    // Repeated lines count together.
    let err = h
        .checkout
        .submit(
            Uuid::new_v4(),
            cart(vec![line("5", MAX_LINE_QUANTITY, 1), line("5", 1, 1)]),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    let err = h
        .checkout
        .initiate(Uuid::new_v4(), cart(vec![line("5", MAX_LINE_QUANTITY + 1, 1)]))
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));
    assert!(h.orders.list_all().await.unwrap().is_empty());
}

#[tokio::test]
async fn deleting_a_large_declined_order_restores_without_overflow() {
    let h = harness(PaymentOutcome::Declined, Duration::seconds(300));

    let order = h
        .checkout
        .submit(Uuid::new_v4(), cart(vec![line("5", MAX_LINE_QUANTITY, 1)]))
        .await
        .unwrap();
    assert_eq!(order.status, OrderStatus::Cancelled);
    assert!(order.total >= 0);

    h.orders.remove(order.id).await.unwrap();
    assert_eq!(h.inventory.stock_of("5").await.unwrap(), 8 + MAX_LINE_QUANTITY);
}

#[tokio::test]
async fn failed_restore_keeps_the_order() {
    let h = harness(PaymentOutcome::Declined, Duration::seconds(300));
    let order = h
        .checkout
        .submit(Uuid::new_v4(), cart(vec![line("21", 10, 69990)]))
        .await
        .unwrap();

    let mut full = h.products.get_product("21").await.unwrap().unwrap();
    full.stock = i32::MAX - 5;
    h.products.save_product(full).await.unwrap();

    let err = h.orders.remove(order.id).await.unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));
    assert_eq!(h.orders.find(order.id).await.unwrap(), order);
    assert_eq!(h.inventory.stock_of("21").await.unwrap(), i32::MAX - 5);
}

#[tokio::test]
async fn huge_catalog_price_is_rejected_instead_of_wrapping() {
    let h = approving();
    h.products
        .save_product(product("99", "Coleccionista", i64::MAX / 2, 10))
        .await
        .unwrap();

    let err = h
        .checkout
        .submit(Uuid::new_v4(), cart(vec![line("99", 3, 1)]))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));
    assert_eq!(h.inventory.stock_of("99").await.unwrap(), 10);
    assert!(h.orders.list_all().await.unwrap().is_empty());
}
