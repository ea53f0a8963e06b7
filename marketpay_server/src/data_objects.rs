use std::fmt::Display;

use marketpay_engine::db_types::{OrderQueryFilter, OrderStatusType, Pagination, DEFAULT_PAGE_SIZE};
use serde::{Deserialize, Serialize};

pub const DEFAULT_REFUND_REASON: &str = "Requested by customer";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse {
    pub success: bool,
    pub message: String,
}

impl JsonResponse {
    pub fn success<S: Display>(message: S) -> Self {
        Self { success: true, message: message.to_string() }
    }

    pub fn failure<S: Display>(message: S) -> Self {
        Self { success: false, message: message.to_string() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessPaymentRequest {
    /// The provider's handle for the charge the buyer authorised, e.g. a TOSS payment key or a Stripe payment intent.
    pub pg_transaction_id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RefundParams {
    pub reason: Option<String>,
}

impl RefundParams {
    pub fn reason(&self) -> &str {
        self.reason.as_deref().map(str::trim).filter(|s| !s.is_empty()).unwrap_or(DEFAULT_REFUND_REASON)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageParams {
    #[serde(default)]
    pub page: u32,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

impl From<PageParams> for Pagination {
    fn from(params: PageParams) -> Self {
        Pagination::new(params.page, params.page_size)
    }
}

fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderSearchParams {
    pub buyer_id: Option<i64>,
    pub seller_id: Option<i64>,
    pub status: Option<OrderStatusType>,
    #[serde(default)]
    pub page: u32,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

impl OrderSearchParams {
    pub fn filter(&self) -> OrderQueryFilter {
        OrderQueryFilter { buyer_id: self.buyer_id, seller_id: self.seller_id, status: self.status }
    }

    pub fn pagination(&self) -> Pagination {
        Pagination::new(self.page, self.page_size)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOrderStatusRequest {
    pub seller_id: i64,
    pub status: OrderStatusType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelOrderRequest {
    pub buyer_id: i64,
}
