//! Order → gateway transaction request
//!
//! The gateway checks that item prices times quantities sum to the gross
//! amount, in whole currency units. Order-level discounts, charges and
//! rounding are folded into one "Adjustment" line so that check holds.

use shared::models::Order;
use shared::util::truncate_chars;
use validator::ValidateEmail;

use super::gateway::{
    Callbacks, CustomerDetails, Expiry, ItemDetail, TransactionDetails, TransactionRequest,
};
use crate::orders::money;

const ITEM_NAME_MAX: usize = 50;
const PERSON_NAME_MAX: usize = 20;
const PHONE_MAX: usize = 19;

/// Build the creation request for one gateway attempt
///
/// `order.items` must be loaded.
pub fn build_transaction_request(
    order: &Order,
    gateway_order_id: &str,
    expiry_minutes: i64,
    finish_url: Option<&str>,
) -> TransactionRequest {
    let gross_amount = money::to_whole_units(order.total_amount);

    let mut items: Vec<ItemDetail> = order
        .items
        .iter()
        .map(|item| ItemDetail {
            id: item.product_id.to_string(),
            price: money::to_whole_units(item.unit_price),
            quantity: item.quantity,
            name: truncate_chars(&item.product_name, ITEM_NAME_MAX),
        })
        .collect();

    let items_sum: i64 = items.iter().map(|i| i.price * i.quantity).sum();
    if items_sum != gross_amount {
        items.push(ItemDetail {
            id: "ADJUSTMENT".into(),
            price: gross_amount - items_sum,
            quantity: 1,
            name: "Adjustment".into(),
        });
    }

    let customer = customer_details(order);
    TransactionRequest {
        transaction_details: TransactionDetails {
            order_id: gateway_order_id.to_string(),
            gross_amount,
        },
        item_details: items,
        customer_details: (!customer.is_empty()).then_some(customer),
        callbacks: finish_url.map(|finish| Callbacks {
            finish: finish.to_string(),
        }),
        expiry: Expiry {
            unit: "minutes".into(),
            duration: expiry_minutes,
        },
    }
}

/// Each field is cleaned on its own; a bad one is dropped, not sent
fn customer_details(order: &Order) -> CustomerDetails {
    let (first_name, last_name) = order
        .customer_name
        .as_deref()
        .map(split_name)
        .unwrap_or_default();
    CustomerDetails {
        first_name,
        last_name,
        email: order
            .customer_email
            .as_deref()
            .map(str::trim)
            .filter(|email| email.validate_email())
            .map(str::to_string),
        phone: order.customer_phone.as_deref().and_then(clean_phone),
    }
}

fn split_name(name: &str) -> (Option<String>, Option<String>) {
    let mut parts = name.split_whitespace();
    let first = parts
        .next()
        .map(|first| truncate_chars(first, PERSON_NAME_MAX));
    let rest = parts.collect::<Vec<_>>().join(" ");
    let last = (!rest.is_empty()).then(|| truncate_chars(&rest, PERSON_NAME_MAX));
    (first, last)
}

/// Digits with an optional leading `+`; `None` if too short to dial
fn clean_phone(phone: &str) -> Option<String> {
    let trimmed = phone.trim();
    let mut cleaned = String::with_capacity(trimmed.len());
    if trimmed.starts_with('+') {
        cleaned.push('+');
    }
    cleaned.extend(trimmed.chars().filter(char::is_ascii_digit));
    let digits = cleaned.trim_start_matches('+').len();
    (digits >= 5).then(|| truncate_chars(&cleaned, PHONE_MAX))
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::models::{OrderItem, OrderSource, OrderStatus, OrderType, PaymentStatus};

    fn item(product_id: i64, name: &str, quantity: i64, unit_price: f64) -> OrderItem {
        OrderItem {
            id: product_id,
            order_id: 1,
            product_id,
            product_name: name.into(),
            product_sku: None,
            quantity,
            unit_price,
            cost_price: None,
            discount_amount: 0.0,
            tax_amount: 0.0,
            total_amount: unit_price * quantity as f64,
            notes: None,
        }
    }

    fn order(total: f64, items: Vec<OrderItem>) -> Order {
        Order {
            id: 1,
            order_number: "ORD-1".into(),
            order_type: OrderType::Takeaway,
            order_source: OrderSource::Online,
            status: OrderStatus::PendingPayment,
            payment_status: PaymentStatus::Pending,
            customer_name: Some("Siti Nur Aisyah Rahmawati Putri".into()),
            customer_phone: Some("+62 812-3456-7890".into()),
            customer_email: Some("not-an-email".into()),
            table_number: None,
            notes: None,
            subtotal: total,
            discount_amount: 0.0,
            tax_amount: 0.0,
            service_charge: 0.0,
            delivery_fee: 0.0,
            total_amount: total,
            paid_amount: 0.0,
            change_amount: 0.0,
            payment_method: None,
            payment_token: None,
            payment_redirect_url: None,
            gateway_order_id: None,
            token_issued_at: None,
            paid_at: None,
            preparing_at: None,
            ready_at: None,
            completed_at: None,
            cancelled_at: None,
            cancellation_reason: None,
            created_by: None,
            created_at: 0,
            updated_at: 0,
            deleted_at: None,
            items,
        }
    }

    #[test]
    fn test_items_sum_to_gross_without_adjustment() {
        let order = order(25000.0, vec![item(1, "Kopi Susu", 2, 10000.0), item(2, "Roti", 1, 5000.0)]);
        let request = build_transaction_request(&order, "ORD-1", 10, None);
        assert_eq!(request.transaction_details.gross_amount, 25000);
        assert_eq!(request.item_details.len(), 2);
        assert_eq!(request.expiry.duration, 10);
    }

    #[test]
    fn test_adjustment_line_balances_order_level_amounts() {
        // 2 x 10000 plus a 2750.5 service charge
        let order = order(22750.5, vec![item(1, "Kopi Susu", 2, 10000.0)]);
        let request = build_transaction_request(&order, "ORD-1-R1", 10, Some("https://shop.test/done"));
        let sum: i64 = request.item_details.iter().map(|i| i.price * i.quantity).sum();
        assert_eq!(request.transaction_details.gross_amount, 22751);
        assert_eq!(sum, 22751);
        let adjustment = request.item_details.last().unwrap();
        assert_eq!(adjustment.name, "Adjustment");
        assert_eq!(adjustment.price, 2751);
        assert_eq!(request.transaction_details.order_id, "ORD-1-R1");
        assert!(request.callbacks.is_some());
    }

    #[test]
    fn test_field_limits_and_malformed_email() {
        let long_name = "Nasi Goreng Kampung Spesial Telur Mata Sapi Ekstra Pedas";
        let order = order(15000.0, vec![item(1, long_name, 1, 15000.0)]);
        let request = build_transaction_request(&order, "ORD-1", 10, None);
        assert_eq!(request.item_details[0].name.chars().count(), 50);

        let customer = request.customer_details.unwrap();
        assert_eq!(customer.first_name.as_deref(), Some("Siti"));
        assert_eq!(customer.last_name.unwrap().chars().count(), 20);
        assert_eq!(customer.email, None);
        assert_eq!(customer.phone.as_deref(), Some("+6281234567890"));
    }

    #[test]
    fn test_clean_phone() {
        assert_eq!(clean_phone("0812 3456 7890 1234 5678 999"), Some("0812345678901234567".into()));
        assert_eq!(clean_phone("12"), None);
        assert_eq!(clean_phone("+62-21-555"), Some("+6221555".into()));
    }
}
