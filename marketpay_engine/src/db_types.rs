use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use log::error;
pub use mpg_common::Money;
use mpg_common::DEFAULT_CURRENCY_CODE;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{types::Json, FromRow, Type};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("Conversion error: {0}")]
pub struct ConversionError(String);

//--------------------------------------        OrderId        ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct OrderId(pub i64);

impl FromStr for OrderId {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<i64>().map(Self).map_err(|_| ConversionError(format!("Invalid order id: {s}")))
    }
}

impl From<i64> for OrderId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl OrderId {
    pub fn value(&self) -> i64 {
        self.0
    }
}

//--------------------------------------       PaymentId       ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct PaymentId(pub i64);

impl FromStr for PaymentId {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<i64>().map(Self).map_err(|_| ConversionError(format!("Invalid payment id: {s}")))
    }
}

impl From<i64> for PaymentId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl Display for PaymentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "pay-{}", self.0)
    }
}

impl PaymentId {
    pub fn value(&self) -> i64 {
        self.0
    }
}

//--------------------------------------   OrderStatusType     ---------------------------------------------------------
/// The lifecycle of an order. See [`crate::state_machine`] for the permitted transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatusType {
    /// The order has been placed, but not paid for.
    Pending,
    /// Payment has been received.
    Paid,
    /// A payment for the order has been confirmed with the payment provider.
    Confirmed,
    /// The seller has dispatched the order.
    Shipping,
    /// The order has reached the buyer.
    Delivered,
    /// The order has been cancelled by the buyer, or as a result of a refund.
    Cancelled,
}

impl OrderStatusType {
    pub const ALL: [OrderStatusType; 6] = [
        OrderStatusType::Pending,
        OrderStatusType::Paid,
        OrderStatusType::Confirmed,
        OrderStatusType::Shipping,
        OrderStatusType::Delivered,
        OrderStatusType::Cancelled,
    ];
}

impl Display for OrderStatusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatusType::Pending => write!(f, "Pending"),
            OrderStatusType::Paid => write!(f, "Paid"),
            OrderStatusType::Confirmed => write!(f, "Confirmed"),
            OrderStatusType::Shipping => write!(f, "Shipping"),
            OrderStatusType::Delivered => write!(f, "Delivered"),
            OrderStatusType::Cancelled => write!(f, "Cancelled"),
        }
    }
}

impl FromStr for OrderStatusType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "paid" => Ok(Self::Paid),
            "confirmed" => Ok(Self::Confirmed),
            "shipping" => Ok(Self::Shipping),
            "delivered" => Ok(Self::Delivered),
            "cancelled" | "canceled" => Ok(Self::Cancelled),
            s => Err(ConversionError(format!("Invalid order status: {s}"))),
        }
    }
}

impl From<String> for OrderStatusType {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid order status: {value}. But this conversion cannot fail. Defaulting to Pending");
            OrderStatusType::Pending
        })
    }
}

//--------------------------------------     PaymentStatus     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    /// Created, awaiting confirmation with the provider.
    Pending,
    /// The provider has confirmed the charge.
    Completed,
    /// Confirmation failed. Terminal.
    Failed,
    /// The charge was reversed. Terminal.
    Refunded,
}

impl PaymentStatus {
    /// A payment is active while it is `Pending` or `Completed`. At most one active payment may exist per order.
    pub fn is_active(&self) -> bool {
        matches!(self, PaymentStatus::Pending | PaymentStatus::Completed)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PaymentStatus::Failed | PaymentStatus::Refunded)
    }
}

impl Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentStatus::Pending => write!(f, "Pending"),
            PaymentStatus::Completed => write!(f, "Completed"),
            PaymentStatus::Failed => write!(f, "Failed"),
            PaymentStatus::Refunded => write!(f, "Refunded"),
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "refunded" => Ok(Self::Refunded),
            s => Err(ConversionError(format!("Invalid payment status: {s}"))),
        }
    }
}

//--------------------------------------    CanonicalStatus    ---------------------------------------------------------
/// The provider-independent outcome of a payment, as reported by an adapter or a webhook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CanonicalStatus {
    Completed,
    Failed,
    Refunded,
}

impl CanonicalStatus {
    /// The payment status this outcome moves a payment into.
    pub fn target(&self) -> PaymentStatus {
        match self {
            CanonicalStatus::Completed => PaymentStatus::Completed,
            CanonicalStatus::Failed => PaymentStatus::Failed,
            CanonicalStatus::Refunded => PaymentStatus::Refunded,
        }
    }

    /// The only payment status from which this outcome may be applied.
    pub fn required_source(&self) -> PaymentStatus {
        match self {
            CanonicalStatus::Completed | CanonicalStatus::Failed => PaymentStatus::Pending,
            CanonicalStatus::Refunded => PaymentStatus::Completed,
        }
    }
}

impl Display for CanonicalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.target())
    }
}

impl FromStr for CanonicalStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "refunded" => Ok(Self::Refunded),
            s => Err(ConversionError(format!("Invalid canonical status: {s}"))),
        }
    }
}

//--------------------------------------     PaymentMethod     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    Card,
    BankTransfer,
    Paypal,
    Stripe,
}

impl Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentMethod::Card => write!(f, "Card"),
            PaymentMethod::BankTransfer => write!(f, "BankTransfer"),
            PaymentMethod::Paypal => write!(f, "Paypal"),
            PaymentMethod::Stripe => write!(f, "Stripe"),
        }
    }
}

//--------------------------------------      ProviderTag      ---------------------------------------------------------
/// Names the payment provider adapter that handles a payment. Tags are case-insensitive and stored upper case.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(from = "String", into = "String")]
pub struct ProviderTag(String);

impl ProviderTag {
    pub fn new<S: AsRef<str>>(tag: S) -> Self {
        Self(tag.as_ref().trim().to_ascii_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for ProviderTag {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&str> for ProviderTag {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<ProviderTag> for String {
    fn from(value: ProviderTag) -> Self {
        value.0
    }
}

impl Display for ProviderTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

//--------------------------------------        Order       ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    pub buyer_id: i64,
    pub seller_id: i64,
    pub total_price: Money,
    pub currency: String,
    pub status: OrderStatusType,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------        NewOrder       ---------------------------------------------------------
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrder {
    /// The user placing the order
    pub buyer_id: i64,
    /// The user fulfilling the order
    pub seller_id: i64,
    /// The total price of the order, in major currency units
    pub total_price: Money,
    /// The currency of the order
    #[serde(default = "default_currency")]
    pub currency: String,
}

impl NewOrder {
    pub fn new(buyer_id: i64, seller_id: i64, total_price: Money) -> Self {
        Self { buyer_id, seller_id, total_price, currency: default_currency() }
    }

    pub fn with_currency<S: Into<String>>(mut self, currency: S) -> Self {
        self.currency = currency.into();
        self
    }
}

fn default_currency() -> String {
    DEFAULT_CURRENCY_CODE.to_string()
}

/// Three ASCII letters, e.g. `USD`.
pub fn is_valid_currency_code(code: &str) -> bool {
    code.len() == 3 && code.chars().all(|c| c.is_ascii_alphabetic())
}

//--------------------------------------       Payment        ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: PaymentId,
    pub order_id: OrderId,
    pub amount: Money,
    pub currency: String,
    #[serde(rename = "paymentMethod")]
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    #[serde(rename = "pgProvider")]
    pub provider: ProviderTag,
    #[serde(rename = "pgTransactionId")]
    pub external_txn_id: Option<String>,
    #[serde(rename = "pgResponse")]
    pub raw_response: Json<Value>,
    pub created_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
    pub refunded_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------      NewPayment      ---------------------------------------------------------
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPayment {
    pub order_id: OrderId,
    pub amount: Money,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(rename = "paymentMethod")]
    pub method: PaymentMethod,
    #[serde(rename = "pgProvider")]
    pub provider: ProviderTag,
}

impl NewPayment {
    pub fn new(order_id: OrderId, amount: Money, method: PaymentMethod, provider: ProviderTag) -> Self {
        Self { order_id, amount, currency: default_currency(), method, provider }
    }

    pub fn with_currency<S: Into<String>>(mut self, currency: S) -> Self {
        self.currency = currency.into();
        self
    }
}

//--------------------------------------    PaymentUpdate     ---------------------------------------------------------
/// The fields written when a payment changes status. `None` leaves the stored value untouched.
#[derive(Debug, Clone)]
pub struct PaymentUpdate {
    pub status: PaymentStatus,
    pub external_txn_id: Option<String>,
    pub raw_response: Option<Value>,
    pub paid_at: Option<DateTime<Utc>>,
    pub refunded_at: Option<DateTime<Utc>>,
}

impl PaymentUpdate {
    pub fn new(status: PaymentStatus) -> Self {
        Self { status, external_txn_id: None, raw_response: None, paid_at: None, refunded_at: None }
    }

    pub fn with_external_txn_id<S: Into<String>>(mut self, txn_id: S) -> Self {
        self.external_txn_id = Some(txn_id.into());
        self
    }

    pub fn with_raw_response(mut self, raw: Value) -> Self {
        self.raw_response = Some(raw);
        self
    }

    pub fn with_paid_at(mut self, at: DateTime<Utc>) -> Self {
        self.paid_at = Some(at);
        self
    }

    pub fn with_refunded_at(mut self, at: DateTime<Utc>) -> Self {
        self.refunded_at = Some(at);
        self
    }
}

//--------------------------------------   OrderQueryFilter   ---------------------------------------------------------
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderQueryFilter {
    pub buyer_id: Option<i64>,
    pub seller_id: Option<i64>,
    pub status: Option<OrderStatusType>,
}

impl OrderQueryFilter {
    pub fn with_buyer_id(mut self, buyer_id: i64) -> Self {
        self.buyer_id = Some(buyer_id);
        self
    }

    pub fn with_seller_id(mut self, seller_id: i64) -> Self {
        self.seller_id = Some(seller_id);
        self
    }

    pub fn with_status(mut self, status: OrderStatusType) -> Self {
        self.status = Some(status);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.buyer_id.is_none() && self.seller_id.is_none() && self.status.is_none()
    }
}

//--------------------------------------      Pagination      ---------------------------------------------------------
pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;

/// Zero-based page selection. Page sizes are clamped to `1..=MAX_PAGE_SIZE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    #[serde(default)]
    pub page: u32,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

impl Default for Pagination {
    fn default() -> Self {
        Self { page: 0, page_size: DEFAULT_PAGE_SIZE }
    }
}

impl Pagination {
    pub fn new(page: u32, page_size: u32) -> Self {
        Self { page, page_size }
    }

    pub fn limit(&self) -> i64 {
        i64::from(self.page_size.clamp(1, MAX_PAGE_SIZE))
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page) * self.limit()
    }
}
