//! Cash path: create, confirm, cancel, refund against a real SQLite file

mod common;

use common::{TestEnv, cash, cashier, order_request};
use pos_server::db::repository::inventory as log_repo;
use pos_server::db::repository::product as product_repo;
use pos_server::notify::PosEvent;
use pos_server::orders::{CancelOrderRequest, PipelineError, UpdateStatusRequest};
use shared::models::{InventoryLogType, OrderStatus, PaymentMethod, PaymentStatus, ReferenceType};
use shared::util::now_millis;

#[tokio::test]
async fn test_cash_order_settles_with_change_and_ledger_rows() {
    let env = TestEnv::new().await;
    let coffee = env.product("Kopi Susu", 10000.0, 10).await;
    let toast = env.product("Roti Bakar", 5000.0, 4).await;

    let order = env.order(&[(&coffee, 2), (&toast, 1)]).await;
    assert_eq!(order.status, OrderStatus::PendingPayment);
    assert_eq!(order.total_amount, 25000.0);
    assert_eq!(order.items.len(), 2);
    // Creation checks stock but does not touch it
    assert_eq!(env.reload_product(coffee.id).await.quantity, 10);

    let paid = env
        .orders
        .confirm_payment(order.id, cash(30000.0), &cashier())
        .await
        .unwrap();
    assert_eq!(paid.status, OrderStatus::Paid);
    assert_eq!(paid.payment_status, PaymentStatus::Completed);
    assert_eq!(paid.paid_amount, 30000.0);
    assert_eq!(paid.change_amount, 5000.0);
    assert_eq!(paid.payment_method, Some(PaymentMethod::Cash));
    assert!(paid.paid_at.is_some());

    assert_eq!(env.reload_product(coffee.id).await.quantity, 8);
    assert_eq!(env.reload_product(toast.id).await.quantity, 3);

    let logs = log_repo::find_by_order(&env.db.pool, order.id).await.unwrap();
    assert_eq!(logs.len(), 2);
    for log in &logs {
        assert_eq!(log.log_type, InventoryLogType::Out);
        assert_eq!(log.reference_type, Some(ReferenceType::Order));
        assert_eq!(log.actor_id, Some(cashier().id));
    }
    let coffee_log = logs.iter().find(|l| l.product_id == coffee.id).unwrap();
    assert_eq!((coffee_log.previous_stock, coffee_log.current_stock), (10, 8));

    let payments = env.orders.list_payments(order.id).await.unwrap();
    assert_eq!(payments.len(), 1);
    assert_eq!(payments[0].status, PaymentStatus::Completed);
    assert_eq!(payments[0].verified_by, Some(cashier().id));

    assert_eq!(
        env.events
            .count(|e| matches!(e, PosEvent::PaymentConfirmed { order_id, .. } if *order_id == order.id)),
        1
    );
}

#[tokio::test]
async fn test_insufficient_payment_reports_shortage_and_writes_nothing() {
    let env = TestEnv::new().await;
    let coffee = env.product("Kopi Susu", 10000.0, 10).await;
    let toast = env.product("Roti Bakar", 5000.0, 4).await;
    let order = env.order(&[(&coffee, 2), (&toast, 1)]).await;

    let err = env
        .orders
        .confirm_payment(order.id, cash(20000.0), &cashier())
        .await
        .unwrap_err();
    match err {
        PipelineError::InsufficientPayment { total, paid, shortage } => {
            assert_eq!(total, 25000.0);
            assert_eq!(paid, 20000.0);
            assert_eq!(shortage, 5000.0);
        }
        other => panic!("unexpected error: {other:?}"),
    }

    let order = env.orders.get_order(order.id).await.unwrap();
    assert_eq!(order.status, OrderStatus::PendingPayment);
    assert_eq!(env.reload_product(coffee.id).await.quantity, 10);
    assert!(env.orders.list_payments(order.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_confirm_twice_is_rejected_without_second_decrement() {
    let env = TestEnv::new().await;
    let coffee = env.product("Kopi Susu", 10000.0, 10).await;
    let order = env.paid_order(&[(&coffee, 3)]).await;

    let err = env
        .orders
        .confirm_payment(order.id, cash(30000.0), &cashier())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        PipelineError::OrderAlreadySettled { status: OrderStatus::Paid }
    ));
    assert_eq!(env.reload_product(coffee.id).await.quantity, 7);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_confirms_settle_exactly_once() {
    let env = TestEnv::new().await;
    let coffee = env.product("Kopi Susu", 10000.0, 10).await;
    let order = env.order(&[(&coffee, 2)]).await;

    let cashier_a = cashier();
    let cashier_b = cashier();
    let (a, b) = tokio::join!(
        env.orders.confirm_payment(order.id, cash(20000.0), &cashier_a),
        env.orders.confirm_payment(order.id, cash(50000.0), &cashier_b),
    );
    let ok = [a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count();
    assert_eq!(ok, 1, "exactly one confirm must win");
    let loser = if a.is_err() { a.unwrap_err() } else { b.unwrap_err() };
    assert!(matches!(loser, PipelineError::OrderAlreadySettled { .. }));

    assert_eq!(env.reload_product(coffee.id).await.quantity, 8);
    let completed = env
        .orders
        .list_payments(order.id)
        .await
        .unwrap()
        .into_iter()
        .filter(|p| p.status == PaymentStatus::Completed)
        .count();
    assert_eq!(completed, 1);
}

#[tokio::test]
async fn test_confirm_rejected_when_stock_ran_out_after_creation() {
    let env = TestEnv::new().await;
    let coffee = env.product("Kopi Susu", 10000.0, 2).await;
    let first = env.order(&[(&coffee, 2)]).await;
    let second = env.order(&[(&coffee, 2)]).await;

    env.orders
        .confirm_payment(first.id, cash(20000.0), &cashier())
        .await
        .unwrap();
    let err = env
        .orders
        .confirm_payment(second.id, cash(20000.0), &cashier())
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::InsufficientStock { available: 0, requested: 2, .. }));

    // The failed settlement rolled back its status write too
    let second = env.orders.get_order(second.id).await.unwrap();
    assert_eq!(second.status, OrderStatus::PendingPayment);
    assert!(env.orders.list_payments(second.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_create_rejects_insufficient_stock_and_unknown_product() {
    let env = TestEnv::new().await;
    let coffee = env.product("Kopi Susu", 10000.0, 1).await;

    let err = env
        .orders
        .create_order(order_request(&[(&coffee, 2)]), &cashier())
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::InsufficientStock { available: 1, requested: 2, .. }));

    let mut request = order_request(&[(&coffee, 1)]);
    request.items[0].product_id = 9999;
    let err = env.orders.create_order(request, &cashier()).await.unwrap_err();
    assert!(matches!(err, PipelineError::NotFound { resource: "Product", .. }));
}

#[tokio::test]
async fn test_untracked_products_never_touch_stock() {
    let env = TestEnv::new().await;
    let water = env.product_with("Air Mineral", 3000.0, 0, false).await;
    let order = env.order(&[(&water, 5)]).await;
    env.orders
        .confirm_payment(order.id, cash(15000.0), &cashier())
        .await
        .unwrap();

    assert_eq!(env.reload_product(water.id).await.quantity, 0);
    assert!(log_repo::find_by_order(&env.db.pool, order.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_duplicate_order_number_rejected() {
    let env = TestEnv::new().await;
    let coffee = env.product("Kopi Susu", 10000.0, 10).await;

    let mut request = order_request(&[(&coffee, 1)]);
    request.order_number = Some("ORD-COUNTER-1".into());
    env.orders.create_order(request.clone(), &cashier()).await.unwrap();

    let err = env.orders.create_order(request, &cashier()).await.unwrap_err();
    assert!(matches!(err, PipelineError::DuplicateOrderNumber(n) if n == "ORD-COUNTER-1"));
}

#[tokio::test]
async fn test_client_total_mismatch_rejected() {
    let env = TestEnv::new().await;
    let coffee = env.product("Kopi Susu", 10000.0, 10).await;

    let mut request = order_request(&[(&coffee, 2)]);
    request.total_amount = Some(19000.0);
    let err = env.orders.create_order(request, &cashier()).await.unwrap_err();
    assert!(matches!(err, PipelineError::ValidationFailed(_)));

    let mut request = order_request(&[(&coffee, 2)]);
    request.tax_amount = 2000.0;
    request.total_amount = Some(22000.0);
    let order = env.orders.create_order(request, &cashier()).await.unwrap();
    assert_eq!(order.total_amount, 22000.0);
}

#[tokio::test]
async fn test_item_snapshot_survives_product_rename() {
    let env = TestEnv::new().await;
    let coffee = env.product("Kopi Susu", 10000.0, 10).await;
    let order = env.order(&[(&coffee, 1)]).await;

    product_repo::rename(&env.db.pool, coffee.id, "Kopi Susu Gula Aren", now_millis())
        .await
        .unwrap();

    let order = env.orders.get_order(order.id).await.unwrap();
    assert_eq!(order.items[0].product_name, "Kopi Susu");
    assert_eq!(order.items[0].unit_price, 10000.0);
}

#[tokio::test]
async fn test_cancel_paid_order_restores_stock_with_in_rows() {
    let env = TestEnv::new().await;
    let coffee = env.product("Kopi Susu", 10000.0, 10).await;
    let toast = env.product("Roti Bakar", 5000.0, 4).await;
    let order = env.paid_order(&[(&coffee, 2), (&toast, 1)]).await;
    assert_eq!(env.reload_product(coffee.id).await.quantity, 8);

    let cancelled = env
        .orders
        .cancel_order(
            order.id,
            CancelOrderRequest {
                reason: Some("Customer changed their mind".into()),
            },
            &cashier(),
        )
        .await
        .unwrap();
    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    assert_eq!(
        cancelled.cancellation_reason.as_deref(),
        Some("Customer changed their mind")
    );
    assert_eq!(env.reload_product(coffee.id).await.quantity, 10);
    assert_eq!(env.reload_product(toast.id).await.quantity, 4);

    let logs = log_repo::find_by_order(&env.db.pool, order.id).await.unwrap();
    let restored: Vec<_> = logs
        .iter()
        .filter(|l| l.log_type == InventoryLogType::In)
        .collect();
    assert_eq!(restored.len(), 2);

    for product in [&coffee, &toast] {
        let check = env.inventory.verify_ledger(product.id).await.unwrap();
        assert!(check.consistent, "ledger out of sync: {check:?}");
    }

    // Re-cancel is a no-op, stock stays put
    env.orders
        .cancel_order(order.id, CancelOrderRequest::default(), &cashier())
        .await
        .unwrap();
    assert_eq!(env.reload_product(coffee.id).await.quantity, 10);
}

#[tokio::test]
async fn test_cancel_unpaid_order_leaves_stock_alone() {
    let env = TestEnv::new().await;
    let coffee = env.product("Kopi Susu", 10000.0, 10).await;
    let order = env.order(&[(&coffee, 2)]).await;

    let cancelled = env
        .orders
        .cancel_order(order.id, CancelOrderRequest::default(), &cashier())
        .await
        .unwrap();
    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    assert_eq!(env.reload_product(coffee.id).await.quantity, 10);
    assert!(log_repo::find_by_order(&env.db.pool, order.id).await.unwrap().is_empty());

    let err = env
        .orders
        .confirm_payment(order.id, cash(20000.0), &cashier())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        PipelineError::OrderNotSettleable { status: OrderStatus::Cancelled }
    ));
}

#[tokio::test]
async fn test_failed_restock_rolls_back_the_whole_cancel() {
    let env = TestEnv::new().await;
    let coffee = env.product("Kopi Susu", 10000.0, 10).await;
    let toast = env.product("Roti Bakar", 5000.0, 4).await;
    let order = env.paid_order(&[(&coffee, 2), (&toast, 1)]).await;

    // Fail the second restock row only
    sqlx::query(&format!(
        r#"
        CREATE TRIGGER fail_toast_restock BEFORE INSERT ON inventory_logs
        WHEN NEW.log_type = 'IN' AND NEW.product_id = {}
        BEGIN
            SELECT RAISE(ABORT, 'restock rejected');
        END
        "#,
        toast.id
    ))
    .execute(&env.db.pool)
    .await
    .unwrap();

    let result = env
        .orders
        .cancel_order(order.id, CancelOrderRequest::default(), &cashier())
        .await;
    assert!(result.is_err());

    let order = env.orders.get_order(order.id).await.unwrap();
    assert_eq!(order.status, OrderStatus::Paid);
    assert_eq!(env.reload_product(coffee.id).await.quantity, 8);
    assert_eq!(env.reload_product(toast.id).await.quantity, 3);
    let logs = log_repo::find_by_order(&env.db.pool, order.id).await.unwrap();
    assert!(logs.iter().all(|l| l.log_type == InventoryLogType::Out));
}

#[tokio::test]
async fn test_refund_keeps_stock_out() {
    let env = TestEnv::new().await;
    let coffee = env.product("Kopi Susu", 10000.0, 10).await;
    let order = env.paid_order(&[(&coffee, 2)]).await;

    let refunded = env.orders.refund_order(order.id, &cashier()).await.unwrap();
    assert_eq!(refunded.status, OrderStatus::Refunded);
    assert_eq!(refunded.payment_status, PaymentStatus::Refunded);
    assert_eq!(env.reload_product(coffee.id).await.quantity, 8);

    let payments = env.orders.list_payments(order.id).await.unwrap();
    assert_eq!(payments[0].status, PaymentStatus::Refunded);

    let err = env
        .orders
        .cancel_order(order.id, CancelOrderRequest::default(), &cashier())
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::InvalidTransition { .. }));
}

#[tokio::test]
async fn test_kitchen_progression_and_invalid_jumps() {
    let env = TestEnv::new().await;
    let coffee = env.product("Kopi Susu", 10000.0, 10).await;
    let unpaid = env.order(&[(&coffee, 1)]).await;

    let err = env
        .orders
        .update_status(
            unpaid.id,
            UpdateStatusRequest {
                status: OrderStatus::Preparing,
                reason: None,
            },
            &cashier(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::InvalidTransition { .. }));

    let order = env.paid_order(&[(&coffee, 1)]).await;
    for next in [OrderStatus::Preparing, OrderStatus::Ready, OrderStatus::Completed] {
        let updated = env
            .orders
            .update_status(
                order.id,
                UpdateStatusRequest {
                    status: next,
                    reason: None,
                },
                &cashier(),
            )
            .await
            .unwrap();
        assert_eq!(updated.status, next);
    }

    // Completed orders can be hidden, not cancelled
    env.orders.soft_delete_order(order.id, &cashier()).await.unwrap();
    let err = env.orders.get_order(order.id).await.unwrap_err();
    assert!(matches!(err, PipelineError::NotFound { .. }));
}
