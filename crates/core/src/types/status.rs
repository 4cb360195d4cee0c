//! Enumerated choices stored on profile and order documents.
//!
//! The stored representation is the human-readable label shown in the
//! profile form (e.g. `"Extra Hot"`, `"Cash on Delivery"`), so documents
//! written by older clients still decode.

use serde::{Deserialize, Serialize};

/// Preferred spice level for orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum SpiceLevel {
    Mild,
    #[default]
    Medium,
    Hot,
    #[serde(rename = "Extra Hot")]
    ExtraHot,
}

/// Preferred delivery time for orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum DeliveryTime {
    #[default]
    #[serde(rename = "ASAP")]
    Asap,
    #[serde(rename = "In 30 mins")]
    In30Minutes,
    #[serde(rename = "In 1 hour")]
    InOneHour,
    #[serde(rename = "Schedule for later")]
    Scheduled,
}

/// Saved payment method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum PaymentMethod {
    #[default]
    Card,
    #[serde(rename = "Bank Transfer")]
    BankTransfer,
    #[serde(rename = "Mobile Payment")]
    MobilePayment,
    #[serde(rename = "Cash on Delivery")]
    CashOnDelivery,
}

/// Mobile wallet providers accepted for mobile payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MobileProvider {
    #[serde(rename = "OPay")]
    OPay,
    PalmPay,
    #[serde(rename = "MTN MoMo")]
    MtnMoMo,
    Kuda,
}

/// Order status as recorded by the fulfilment side.
///
/// Orders without a status are treated as pending.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Preparing,
    #[serde(alias = "out for delivery")]
    OutForDelivery,
    Delivered,
    Cancelled,
    /// Any status this client does not know about.
    #[serde(untagged)]
    Other(String),
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Preparing => write!(f, "preparing"),
            Self::OutForDelivery => write!(f, "out_for_delivery"),
            Self::Delivered => write!(f, "delivered"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::Other(s) => write!(f, "{s}"),
        }
    }
}
