//! Order creation
//!
//! Validates the cart against the catalog and persists the order with its
//! lines in one transaction. Stock is checked but neither decremented nor
//! reserved; that happens at settlement.

use std::collections::HashMap;

use rust_decimal::Decimal;
use shared::models::{Order, Product};
use shared::util::{now_millis, snowflake_id};

use super::money::{self, OrderAmounts};
use super::{Actor, CreateOrderRequest, OrdersManager, PipelineError, PipelineResult};
use crate::db::repository::order::{self as order_repo, NewOrder, NewOrderItem};
use crate::db::repository::product as product_repo;
use crate::notify::PosEvent;

/// `ORD{YYYYMMDD}{snowflake}`
pub fn generate_order_number() -> String {
    format!("ORD{}{}", chrono::Utc::now().format("%Y%m%d"), snowflake_id())
}

fn blank_to_none(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl OrdersManager {
    pub async fn create_order(
        &self,
        request: CreateOrderRequest,
        actor: &Actor,
    ) -> PipelineResult<Order> {
        if request.items.is_empty() {
            return Err(PipelineError::ValidationFailed(
                "order must contain at least one item".into(),
            ));
        }

        // Catalog lookup, once per distinct product
        let mut products: HashMap<i64, Product> = HashMap::new();
        let mut requested: HashMap<i64, i64> = HashMap::new();
        for item in &request.items {
            if item.quantity <= 0 {
                return Err(PipelineError::ValidationFailed(format!(
                    "quantity must be positive for product {}, got {}",
                    item.product_id, item.quantity
                )));
            }
            if !products.contains_key(&item.product_id) {
                let product = product_repo::find_by_id(&self.pool, item.product_id)
                    .await?
                    .filter(Product::is_orderable)
                    .ok_or_else(|| PipelineError::product_not_found(item.product_id))?;
                products.insert(item.product_id, product);
            }
            *requested.entry(item.product_id).or_default() += item.quantity;
        }

        for (product_id, quantity) in &requested {
            let product = &products[product_id];
            if product.track_inventory && product.quantity < *quantity {
                return Err(PipelineError::InsufficientStock {
                    product_id: *product_id,
                    available: product.quantity,
                    requested: *quantity,
                });
            }
        }

        // Lines with product snapshots
        let mut lines = Vec::with_capacity(request.items.len());
        let mut subtotal = Decimal::ZERO;
        for item in &request.items {
            let product = &products[&item.product_id];
            let unit_price = item.unit_price.unwrap_or(product.price);
            let total = money::line_total(unit_price, item.quantity, item.discount_amount, item.tax_amount);
            if total.is_sign_negative() {
                return Err(PipelineError::ValidationFailed(format!(
                    "line total for product {} is negative",
                    item.product_id
                )));
            }
            subtotal += total;
            lines.push(NewOrderItem {
                product_id: product.id,
                product_name: product.name.clone(),
                product_sku: product.sku.clone(),
                quantity: item.quantity,
                unit_price,
                cost_price: product.cost_price,
                discount_amount: item.discount_amount,
                tax_amount: item.tax_amount,
                total_amount: money::to_f64(total),
                notes: item.notes.clone(),
            });
        }

        if let Some(client_subtotal) = request.subtotal
            && !money::amounts_match(money::to_decimal(client_subtotal), subtotal)
        {
            return Err(PipelineError::ValidationFailed(format!(
                "subtotal {client_subtotal} does not match line totals {subtotal}"
            )));
        }

        let amounts = OrderAmounts {
            subtotal: money::to_f64(subtotal),
            discount: request.discount_amount,
            tax: request.tax_amount,
            service_charge: request.service_charge,
            delivery_fee: request.delivery_fee,
        };
        let expected_total = amounts.expected_total();
        if expected_total.is_sign_negative() {
            return Err(PipelineError::ValidationFailed(
                "discount exceeds order amount".into(),
            ));
        }
        if let Some(client_total) = request.total_amount
            && !money::amounts_match(money::to_decimal(client_total), expected_total)
        {
            return Err(PipelineError::ValidationFailed(format!(
                "total_amount {client_total} does not match computed total {expected_total}"
            )));
        }

        let order_number =
            blank_to_none(request.order_number).unwrap_or_else(generate_order_number);
        let new_order = NewOrder {
            order_number: order_number.clone(),
            order_type: request.order_type,
            order_source: request.order_source,
            customer_name: blank_to_none(request.customer_name),
            customer_phone: blank_to_none(request.customer_phone),
            customer_email: blank_to_none(request.customer_email),
            table_number: blank_to_none(request.table_number),
            notes: blank_to_none(request.notes),
            subtotal: amounts.subtotal,
            discount_amount: request.discount_amount,
            tax_amount: request.tax_amount,
            service_charge: request.service_charge,
            delivery_fee: request.delivery_fee,
            total_amount: money::to_f64(expected_total),
            payment_method: request.payment_method,
            created_by: Some(actor.id),
        };

        let now = now_millis();
        let mut tx = self.pool.begin().await?;
        let order_id = match order_repo::insert(&mut *tx, &new_order, now).await {
            Ok(id) => id,
            Err(e) if e.is_duplicate_on("orders.order_number") => {
                return Err(PipelineError::DuplicateOrderNumber(order_number));
            }
            Err(e) => return Err(e.into()),
        };
        for line in &lines {
            order_repo::insert_item(&mut *tx, order_id, line).await?;
        }
        tx.commit().await?;

        tracing::info!(
            order_id,
            order_number = %order_number,
            items = lines.len(),
            total = new_order.total_amount,
            actor_id = actor.id,
            "Order created"
        );
        self.emit(PosEvent::OrderCreated {
            order_id,
            order_number,
            total_amount: new_order.total_amount,
        });

        self.get_order(order_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_order_number_shape() {
        let number = generate_order_number();
        assert!(number.starts_with("ORD"));
        assert!(number[3..11].chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn test_blank_to_none() {
        assert_eq!(blank_to_none(Some("  ".into())), None);
        assert_eq!(blank_to_none(Some(" A1 ".into())), Some("A1".into()));
        assert_eq!(blank_to_none(None), None);
    }
}
