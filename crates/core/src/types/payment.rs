//! External payment enumerations.

use core::fmt;

use serde::{Deserialize, Serialize};

use super::cosmetic::{ParseEnumError, string_enum};

/// Payment provider that confirmed an external payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Sellauth,
    Paypal,
    Cashapp,
}

string_enum!(PaymentMethod, "payment method", {
    Sellauth => "sellauth",
    Paypal => "paypal",
    Cashapp => "cashapp",
});

/// Settlement state reported by the payment provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Completed,
    Failed,
    Refunded,
}

string_enum!(PaymentStatus, "payment status", {
    Pending => "pending",
    Completed => "completed",
    Failed => "failed",
    Refunded => "refunded",
});
