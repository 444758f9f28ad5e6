//! Collaborator traits the conversation engine persists through.
//!
//! Reference data (catalog, address directory) is read-only from the bot's
//! point of view; orders are a small CRUD surface keyed by `OrderId`. Each
//! stored order also has one stop on the delivery-route sheet, kept in step
//! with the order by the store.

use std::fmt;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::DatabaseError;
use crate::matching::{AddressEntry, CatalogItem};
use crate::order::{Order, RouteStop};

/// Stable identifier of a stored order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OrderId(pub i64);

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One row of a user's order list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderSummary {
    pub id: OrderId,
    pub customer: String,
    pub dispatch_date: NaiveDate,
}

#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn list_catalog(&self) -> Result<Vec<CatalogItem>, DatabaseError>;
}

#[async_trait]
pub trait AddressSource: Send + Sync {
    async fn list_addresses(&self) -> Result<Vec<AddressEntry>, DatabaseError>;
}

/// Order persistence.
///
/// `append` and `update` write the order's [`RouteStop`] along with it and
/// `delete` removes it, so the route sheet always mirrors the stored
/// orders.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Store a new order and its route stop; return the order's id.
    async fn append(&self, order: &Order) -> Result<OrderId, DatabaseError>;

    /// Orders submitted by `user`, oldest first.
    async fn list_by_user(&self, user: &str) -> Result<Vec<OrderSummary>, DatabaseError>;

    async fn load(&self, id: OrderId) -> Result<Option<Order>, DatabaseError>;

    /// Remove an order. Missing ids are `DatabaseError::NotFound`.
    async fn delete(&self, id: OrderId) -> Result<(), DatabaseError>;

    /// Route stops for orders dispatched on `date`, by order id.
    async fn route_sheet(&self, date: NaiveDate) -> Result<Vec<(OrderId, RouteStop)>, DatabaseError>;

    /// Replace a stored order and return the id it now lives under.
    ///
    /// The default removes the old record and appends the new one, so the
    /// returned id differs from `id`. Stores with in-place update override
    /// this and return `id` unchanged.
    async fn update(&self, id: OrderId, order: &Order) -> Result<OrderId, DatabaseError> {
        self.delete(id).await?;
        self.append(order).await
    }
}
