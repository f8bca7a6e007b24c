use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Outcome, Resource};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Pending,
    Accepted,
    Processing,
    Completed,
    Failed,
}

impl OrderStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Failed)
    }
}

/// Payment order. The caller-chosen `order_id` is the store key.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentOrder {
    pub order_id: String,
    pub job_id: Option<String>,
    pub customer_email: Option<String>,
    pub amount: f64,
    pub currency: Option<String>,
    pub payment_method: Option<String>,
    pub status: OrderStatus,
    pub metadata: Option<HashMap<String, String>>,
    pub timestamp: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
    pub idempotency_key: Option<String>,
}

/// First `len` characters of a fresh hyphenated UUID v4.
pub fn short_uuid(len: usize) -> String {
    let mut s = Uuid::new_v4().to_string();
    s.truncate(len);
    s
}

impl PaymentOrder {
    /// Validated creation payload → PENDING order with a fresh job id.
    pub fn from_request(order_id: String, req: CreateOrder) -> Self {
        Self {
            order_id,
            job_id: Some(format!("job-{}", short_uuid(12))),
            customer_email: req.customer_email,
            amount: req.amount.unwrap_or_default(),
            currency: req.currency,
            payment_method: req.payment_method,
            status: OrderStatus::Pending,
            metadata: req.metadata,
            timestamp: req.timestamp.unwrap_or_else(Utc::now),
            processed_at: None,
            transaction_id: None,
            idempotency_key: req.idempotency_key,
        }
    }
}

impl Resource for PaymentOrder {
    const KIND: &'static str = "Order";

    fn id(&self) -> &str {
        &self.order_id
    }

    fn assign_id(&mut self, id: String) {
        self.order_id = id;
    }

    fn idempotency_key(&self) -> Option<&str> {
        self.idempotency_key.as_deref()
    }

    fn mark_accepted(&mut self) {
        self.status = OrderStatus::Accepted;
    }

    fn mark_processing(&mut self) {
        self.status = OrderStatus::Processing;
    }

    fn finish(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Completed => {
                self.status = OrderStatus::Completed;
                self.processed_at = Some(Utc::now());
                self.transaction_id = Some(format!("txn-{}", short_uuid(12)));
            }
            Outcome::Failed => self.status = OrderStatus::Failed,
        }
    }

    fn is_complete(&self) -> bool {
        self.status.is_terminal()
    }
}

// ── Request payloads ─────────────────────────────────────────────────────────

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrder {
    pub order_id: Option<String>,
    pub customer_email: Option<String>,
    pub amount: Option<f64>,
    pub currency: Option<String>,
    pub payment_method: Option<String>,
    pub metadata: Option<HashMap<String, String>>,
    pub timestamp: Option<DateTime<Utc>>,
    pub idempotency_key: Option<String>,
}

// ── Status view ──────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderStatusView {
    pub order_id: String,
    pub job_id: String,
    pub status: OrderStatus,
    pub processed_at: Option<DateTime<Utc>>,
    pub payment_result: PaymentResult,
}

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentResult {
    Success {
        #[serde(rename = "transactionId")]
        transaction_id: String,
    },
    Failed,
    Pending,
}

impl From<&PaymentOrder> for OrderStatusView {
    fn from(order: &PaymentOrder) -> Self {
        let payment_result = match (order.status, &order.transaction_id) {
            (OrderStatus::Completed, Some(txn)) => PaymentResult::Success {
                transaction_id: txn.clone(),
            },
            (OrderStatus::Failed, _) => PaymentResult::Failed,
            _ => PaymentResult::Pending,
        };
        Self {
            order_id: order.order_id.clone(),
            job_id: order.job_id.clone().unwrap_or_default(),
            status: order.status,
            processed_at: order.processed_at,
            payment_result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order(id: &str) -> PaymentOrder {
        PaymentOrder::from_request(
            id.to_string(),
            CreateOrder {
                customer_email: Some("a@example.com".to_string()),
                amount: Some(12.5),
                ..Default::default()
            },
        )
    }

    #[test]
    fn job_id_has_prefix_and_length() {
        let o = order("o1");
        let job = o.job_id.unwrap();
        assert!(job.starts_with("job-"));
        assert_eq!(job.len(), "job-".len() + 12);
    }

    #[test]
    fn completion_stamps_processed_at_and_transaction() {
        let mut o = order("o1");
        o.mark_accepted();
        assert_eq!(o.status, OrderStatus::Accepted);
        o.finish(Outcome::Completed);
        assert!(o.processed_at.is_some());
        assert!(o.transaction_id.as_deref().unwrap().starts_with("txn-"));
    }

    #[test]
    fn failure_leaves_processed_at_empty() {
        let mut o = order("o1");
        o.finish(Outcome::Failed);
        assert_eq!(o.status, OrderStatus::Failed);
        assert!(o.processed_at.is_none());
        assert!(o.transaction_id.is_none());
    }

    #[test]
    fn status_view_reports_payment_result() {
        let mut o = order("o1");
        o.mark_accepted();
        let v = serde_json::to_value(OrderStatusView::from(&o)).unwrap();
        assert_eq!(v["paymentResult"]["status"], "PENDING");
        assert_eq!(v["status"], "ACCEPTED");

        o.finish(Outcome::Completed);
        let v = serde_json::to_value(OrderStatusView::from(&o)).unwrap();
        assert_eq!(v["paymentResult"]["status"], "SUCCESS");
        assert_eq!(v["paymentResult"]["transactionId"], o.transaction_id.clone().unwrap());
    }

    #[test]
    fn wire_format_is_camel_case() {
        let v = serde_json::to_value(order("o1")).unwrap();
        assert_eq!(v["orderId"], "o1");
        assert_eq!(v["customerEmail"], "a@example.com");
        assert!(v.get("processedAt").is_some());
        assert!(v.get("transactionId").is_none());
    }
}
