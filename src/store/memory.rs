//! In-process store, used by the CLI demo and the test suite.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;
use chrono::NaiveDate;
use tracing::debug;

use crate::error::DatabaseError;
use crate::matching::{AddressEntry, CatalogItem};
use crate::order::{Order, RouteStop};
use crate::store::traits::{AddressSource, CatalogSource, OrderId, OrderStore, OrderSummary};

#[derive(Default)]
struct Inner {
    next_id: i64,
    orders: Vec<(OrderId, Order)>,
    routes: BTreeMap<OrderId, RouteStop>,
}

/// Orders in insertion order plus optional reference data.
///
/// Uses the trait's delete-then-append `update`, so an edited order moves
/// to a new id.
#[derive(Default)]
pub struct MemoryOrderStore {
    inner: Mutex<Inner>,
    catalog: Vec<CatalogItem>,
    addresses: Vec<AddressEntry>,
    fail_next_append: AtomicBool,
    unavailable: AtomicBool,
}

impl MemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reference_data(catalog: Vec<CatalogItem>, addresses: Vec<AddressEntry>) -> Self {
        Self {
            catalog,
            addresses,
            ..Self::default()
        }
    }

    /// Make the next `append` fail once.
    pub fn fail_next_append(&self) {
        self.fail_next_append.store(true, Ordering::SeqCst);
    }

    /// Make every operation fail until switched back.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.orders.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Snapshot of every stored order.
    pub async fn all(&self) -> Vec<(OrderId, Order)> {
        self.inner.lock().await.orders.clone()
    }

    fn check_available(&self) -> Result<(), DatabaseError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(DatabaseError::Unavailable("memory store switched off".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl OrderStore for MemoryOrderStore {
    async fn append(&self, order: &Order) -> Result<OrderId, DatabaseError> {
        self.check_available()?;
        if self.fail_next_append.swap(false, Ordering::SeqCst) {
            return Err(DatabaseError::Unavailable("injected append failure".into()));
        }

        let mut inner = self.inner.lock().await;
        inner.next_id += 1;
        let id = OrderId(inner.next_id);
        inner.orders.push((id, order.clone()));
        inner.routes.insert(id, order.route_stop());
        debug!(order_id = %id, customer = %order.customer, "Order stored in memory");
        Ok(id)
    }

    async fn list_by_user(&self, user: &str) -> Result<Vec<OrderSummary>, DatabaseError> {
        self.check_available()?;
        let inner = self.inner.lock().await;
        Ok(inner
            .orders
            .iter()
            .filter(|(_, o)| o.submitted_by == user)
            .map(|(id, o)| OrderSummary {
                id: *id,
                customer: o.customer.clone(),
                dispatch_date: o.dispatch_date,
            })
            .collect())
    }

    async fn load(&self, id: OrderId) -> Result<Option<Order>, DatabaseError> {
        self.check_available()?;
        let inner = self.inner.lock().await;
        Ok(inner
            .orders
            .iter()
            .find(|(oid, _)| *oid == id)
            .map(|(_, o)| o.clone()))
    }

    async fn delete(&self, id: OrderId) -> Result<(), DatabaseError> {
        self.check_available()?;
        let mut inner = self.inner.lock().await;
        let pos = inner
            .orders
            .iter()
            .position(|(oid, _)| *oid == id)
            .ok_or_else(|| DatabaseError::NotFound {
                entity: "order".into(),
                id: id.to_string(),
            })?;
        inner.orders.remove(pos);
        inner.routes.remove(&id);
        Ok(())
    }

    async fn route_sheet(&self, date: NaiveDate) -> Result<Vec<(OrderId, RouteStop)>, DatabaseError> {
        self.check_available()?;
        let inner = self.inner.lock().await;
        Ok(inner
            .routes
            .iter()
            .filter(|(_, stop)| stop.dispatch_date == date)
            .map(|(id, stop)| (*id, stop.clone()))
            .collect())
    }
}

#[async_trait]
impl CatalogSource for MemoryOrderStore {
    async fn list_catalog(&self) -> Result<Vec<CatalogItem>, DatabaseError> {
        self.check_available()?;
        Ok(self.catalog.clone())
    }
}

#[async_trait]
impl AddressSource for MemoryOrderStore {
    async fn list_addresses(&self) -> Result<Vec<AddressEntry>, DatabaseError> {
        self.check_available()?;
        Ok(self.addresses.clone())
    }
}
