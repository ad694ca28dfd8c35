use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::envelope::DecodeError;

/// Every namespace producers publish under. One default broker binding
/// (`<namespace>.#`) is derived per entry.
pub const NAMESPACES: [&str; 7] = [
    "product",
    "category",
    "order",
    "production",
    "user",
    "sale",
    "dispatch",
];

/// The closed catalog of domain events the relay forwards.
///
/// Wire form is the dotted routing key, e.g. `"order.sale.confirmed"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum EventType {
    ProductCreated,
    ProductUpdated,
    ProductDeleted,
    ProductStockChanged,
    CategoryCreated,
    CategoryUpdated,
    CategoryDeleted,
    OrderStarted,
    OrderSaleConfirmed,
    OrderDispatchConfirmed,
    OrderCancelled,
    ProductionCreated,
    ProductionUpdated,
    ProductionFinalized,
    ProductionDeleted,
    UserCreated,
    UserUpdated,
    UserDeleted,
    SaleCreated,
    DispatchCreated,
}

impl EventType {
    pub const ALL: [EventType; 20] = [
        EventType::ProductCreated,
        EventType::ProductUpdated,
        EventType::ProductDeleted,
        EventType::ProductStockChanged,
        EventType::CategoryCreated,
        EventType::CategoryUpdated,
        EventType::CategoryDeleted,
        EventType::OrderStarted,
        EventType::OrderSaleConfirmed,
        EventType::OrderDispatchConfirmed,
        EventType::OrderCancelled,
        EventType::ProductionCreated,
        EventType::ProductionUpdated,
        EventType::ProductionFinalized,
        EventType::ProductionDeleted,
        EventType::UserCreated,
        EventType::UserUpdated,
        EventType::UserDeleted,
        EventType::SaleCreated,
        EventType::DispatchCreated,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::ProductCreated => "product.created",
            EventType::ProductUpdated => "product.updated",
            EventType::ProductDeleted => "product.deleted",
            EventType::ProductStockChanged => "product.stock.changed",
            EventType::CategoryCreated => "category.created",
            EventType::CategoryUpdated => "category.updated",
            EventType::CategoryDeleted => "category.deleted",
            EventType::OrderStarted => "order.started",
            EventType::OrderSaleConfirmed => "order.sale.confirmed",
            EventType::OrderDispatchConfirmed => "order.dispatch.confirmed",
            EventType::OrderCancelled => "order.cancelled",
            EventType::ProductionCreated => "production.created",
            EventType::ProductionUpdated => "production.updated",
            EventType::ProductionFinalized => "production.finalized",
            EventType::ProductionDeleted => "production.deleted",
            EventType::UserCreated => "user.created",
            EventType::UserUpdated => "user.updated",
            EventType::UserDeleted => "user.deleted",
            EventType::SaleCreated => "sale.created",
            EventType::DispatchCreated => "dispatch.created",
        }
    }

    /// First dotted segment: `"order.sale.confirmed"` → `"order"`.
    pub fn namespace(&self) -> &'static str {
        let s = self.as_str();
        s.split('.').next().unwrap_or(s)
    }

    /// Look up a catalog entry by its dotted name.
    pub fn parse(s: &str) -> Result<Self, DecodeError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(DecodeError::MissingType);
        }
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| DecodeError::UnknownEventType(s.to_string()))
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for EventType {
    type Error = DecodeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<EventType> for String {
    fn from(t: EventType) -> Self {
        t.as_str().to_string()
    }
}
