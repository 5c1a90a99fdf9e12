//! Orderer snapshot value objects.

use serde::{Deserialize, Serialize};

use crate::user::User;

/// Postal address snapshot taken at placement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub country: String,
    pub zip_code: String,
    pub city: String,
    pub street: String,
}

/// The identity and billing details of whoever places an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Orderer {
    pub user: User,
    pub company: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub address: Address,
}

impl Orderer {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}
