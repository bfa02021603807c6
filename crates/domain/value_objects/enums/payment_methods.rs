use std::fmt::Display;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    CreditCard,
    Pix,
    Boleto,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::CreditCard => "credit_card",
            PaymentMethod::Pix => "pix",
            PaymentMethod::Boleto => "boleto",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "credit_card" => Some(PaymentMethod::CreditCard),
            "pix" => Some(PaymentMethod::Pix),
            "boleto" => Some(PaymentMethod::Boleto),
            _ => None,
        }
    }

    /// Name of the matching Stripe `payment_method_types` entry.
    pub fn stripe_type(&self) -> &'static str {
        match self {
            PaymentMethod::CreditCard => "card",
            PaymentMethod::Pix => "pix",
            PaymentMethod::Boleto => "boleto",
        }
    }
}

impl Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
