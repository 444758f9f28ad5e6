//! libSQL backend for orders and reference data.
//!
//! Supports local file and in-memory databases. Order lines are stored as a
//! JSON array in a single column; optional text fields are stored as empty
//! strings. Each order's route stop lives in `routes`, written in the same
//! transaction as the order.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Local, NaiveDate, NaiveDateTime};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::{debug, info};

use crate::error::DatabaseError;
use crate::matching::{AddressEntry, CatalogItem};
use crate::order::{Order, OrderLine, RouteStop};
use crate::store::migrations;
use crate::store::traits::{AddressSource, CatalogSource, OrderId, OrderStore, OrderSummary};

const DATE_FMT: &str = "%Y-%m-%d";
const DATETIME_FMT: &str = "%Y-%m-%d %H:%M:%S";

const ORDER_COLUMNS: &str = "customer, lines, dispatch_date, note, manual_address, address, \
                             submitted_by, created_at";

/// libSQL-backed order store and reference-data source.
///
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlStore {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlStore {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;
        let store = Self::from_database(db).await?;
        info!(path = %path.display(), "Database opened");
        Ok(store)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;
        Self::from_database(db).await
    }

    async fn from_database(db: LibSqlDatabase) -> Result<Self, DatabaseError> {
        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;
        migrations::run_migrations(&conn).await?;
        Ok(Self {
            db: Arc::new(db),
            conn,
        })
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Replace the catalog and address directory in one transaction.
    pub async fn replace_reference_data(
        &self,
        catalog: &[CatalogItem],
        addresses: &[AddressEntry],
    ) -> Result<(), DatabaseError> {
        let tx = self
            .conn()
            .transaction()
            .await
            .map_err(|e| DatabaseError::Query(format!("begin reference import: {e}")))?;

        tx.execute("DELETE FROM catalog_items", ())
            .await
            .map_err(|e| DatabaseError::Query(format!("clear catalog_items: {e}")))?;
        tx.execute("DELETE FROM address_entries", ())
            .await
            .map_err(|e| DatabaseError::Query(format!("clear address_entries: {e}")))?;

        for (position, item) in catalog.iter().enumerate() {
            tx.execute(
                "INSERT INTO catalog_items (position, code, memo, alt_description, full_name)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    position as i64,
                    item.code.clone(),
                    item.memo.clone(),
                    item.alt_description.clone(),
                    item.full_name.clone()
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("insert catalog item: {e}")))?;
        }

        for (position, entry) in addresses.iter().enumerate() {
            tx.execute(
                "INSERT INTO address_entries (position, name, address) VALUES (?1, ?2, ?3)",
                params![position as i64, entry.name.clone(), entry.address.clone()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("insert address entry: {e}")))?;
        }

        tx.commit()
            .await
            .map_err(|e| DatabaseError::Query(format!("commit reference import: {e}")))?;

        info!(
            catalog = catalog.len(),
            addresses = addresses.len(),
            "Reference data replaced"
        );
        Ok(())
    }
}

// ── Helper functions ────────────────────────────────────────────────

fn parse_date(s: &str) -> Result<NaiveDate, DatabaseError> {
    NaiveDate::parse_from_str(s, DATE_FMT)
        .map_err(|e| DatabaseError::Serialization(format!("bad dispatch_date {s:?}: {e}")))
}

fn parse_datetime(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, DATETIME_FMT).unwrap_or(NaiveDateTime::MIN)
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() { None } else { Some(s) }
}

fn row_to_order(row: &libsql::Row) -> Result<Order, DatabaseError> {
    let get = |i: i32| {
        row.get::<String>(i)
            .map_err(|e| DatabaseError::Query(format!("order column {i}: {e}")))
    };

    let lines: Vec<OrderLine> = serde_json::from_str(&get(1)?)
        .map_err(|e| DatabaseError::Serialization(format!("order lines: {e}")))?;

    Ok(Order {
        customer: get(0)?,
        lines,
        dispatch_date: parse_date(&get(2)?)?,
        note: non_empty(get(3)?),
        manual_address: non_empty(get(4)?),
        address: get(5)?,
        submitted_by: get(6)?,
        created_at: parse_datetime(&get(7)?),
    })
}

fn lines_json(order: &Order) -> Result<String, DatabaseError> {
    serde_json::to_string(&order.lines)
        .map_err(|e| DatabaseError::Serialization(format!("order lines: {e}")))
}

fn timestamp() -> String {
    Local::now().naive_local().format(DATETIME_FMT).to_string()
}

/// Insert or overwrite the route stop of order `id`.
async fn write_route(
    conn: &Connection,
    id: OrderId,
    order: &Order,
    now: &str,
) -> Result<(), DatabaseError> {
    let stop = order.route_stop();
    conn.execute(
        "INSERT OR REPLACE INTO routes
             (order_id, customer, address, notes, seller, dispatch_date, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            id.0,
            stop.customer,
            stop.address,
            stop.notes,
            stop.seller,
            stop.dispatch_date.format(DATE_FMT).to_string(),
            now
        ],
    )
    .await
    .map_err(|e| DatabaseError::Query(format!("write route stop: {e}")))?;
    Ok(())
}

#[async_trait]
impl OrderStore for LibSqlStore {
    async fn append(&self, order: &Order) -> Result<OrderId, DatabaseError> {
        let now = timestamp();
        let tx = self
            .conn()
            .transaction()
            .await
            .map_err(|e| DatabaseError::Query(format!("begin append: {e}")))?;

        let mut rows = tx
            .query(
                &format!(
                    "INSERT INTO orders ({ORDER_COLUMNS}, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                     RETURNING id"
                ),
                params![
                    order.customer.clone(),
                    lines_json(order)?,
                    order.dispatch_date.format(DATE_FMT).to_string(),
                    order.note.clone().unwrap_or_default(),
                    order.manual_address.clone().unwrap_or_default(),
                    order.address.clone(),
                    order.submitted_by.clone(),
                    order.created_at.format(DATETIME_FMT).to_string(),
                    now.clone()
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("append order: {e}")))?;

        let row = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("append order: {e}")))?
            .ok_or_else(|| DatabaseError::Query("append order returned no id".into()))?;
        let id = OrderId(
            row.get::<i64>(0)
                .map_err(|e| DatabaseError::Query(format!("append order id: {e}")))?,
        );
        drop(row);
        drop(rows);

        write_route(&tx, id, order, &now).await?;
        tx.commit()
            .await
            .map_err(|e| DatabaseError::Query(format!("commit append: {e}")))?;

        debug!(order_id = %id, customer = %order.customer, "Order inserted");
        Ok(id)
    }

    async fn list_by_user(&self, user: &str) -> Result<Vec<OrderSummary>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT id, customer, dispatch_date FROM orders
                 WHERE submitted_by = ?1 ORDER BY id",
                params![user],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("list_by_user: {e}")))?;

        let mut out = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("list_by_user: {e}")))?
        {
            let id: i64 = row
                .get(0)
                .map_err(|e| DatabaseError::Query(format!("list_by_user id: {e}")))?;
            let customer: String = row
                .get(1)
                .map_err(|e| DatabaseError::Query(format!("list_by_user customer: {e}")))?;
            let date: String = row
                .get(2)
                .map_err(|e| DatabaseError::Query(format!("list_by_user date: {e}")))?;
            out.push(OrderSummary {
                id: OrderId(id),
                customer,
                dispatch_date: parse_date(&date)?,
            });
        }
        Ok(out)
    }

    async fn load(&self, id: OrderId) -> Result<Option<Order>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = ?1"),
                params![id.0],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("load order: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_order(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("load order: {e}"))),
        }
    }

    async fn delete(&self, id: OrderId) -> Result<(), DatabaseError> {
        let tx = self
            .conn()
            .transaction()
            .await
            .map_err(|e| DatabaseError::Query(format!("begin delete: {e}")))?;
        let affected = tx
            .execute("DELETE FROM orders WHERE id = ?1", params![id.0])
            .await
            .map_err(|e| DatabaseError::Query(format!("delete order: {e}")))?;
        if affected == 0 {
            return Err(DatabaseError::NotFound {
                entity: "order".into(),
                id: id.to_string(),
            });
        }
        tx.execute("DELETE FROM routes WHERE order_id = ?1", params![id.0])
            .await
            .map_err(|e| DatabaseError::Query(format!("delete route stop: {e}")))?;
        tx.commit()
            .await
            .map_err(|e| DatabaseError::Query(format!("commit delete: {e}")))?;
        debug!(order_id = %id, "Order deleted");
        Ok(())
    }

    /// In-place update; the id is preserved.
    async fn update(&self, id: OrderId, order: &Order) -> Result<OrderId, DatabaseError> {
        let now = timestamp();
        let tx = self
            .conn()
            .transaction()
            .await
            .map_err(|e| DatabaseError::Query(format!("begin update: {e}")))?;
        let affected = tx
            .execute(
                "UPDATE orders SET customer = ?1, lines = ?2, dispatch_date = ?3, note = ?4,
                     manual_address = ?5, address = ?6, submitted_by = ?7, updated_at = ?8
                 WHERE id = ?9",
                params![
                    order.customer.clone(),
                    lines_json(order)?,
                    order.dispatch_date.format(DATE_FMT).to_string(),
                    order.note.clone().unwrap_or_default(),
                    order.manual_address.clone().unwrap_or_default(),
                    order.address.clone(),
                    order.submitted_by.clone(),
                    now.clone(),
                    id.0
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("update order: {e}")))?;
        if affected == 0 {
            return Err(DatabaseError::NotFound {
                entity: "order".into(),
                id: id.to_string(),
            });
        }
        write_route(&tx, id, order, &now).await?;
        tx.commit()
            .await
            .map_err(|e| DatabaseError::Query(format!("commit update: {e}")))?;
        debug!(order_id = %id, "Order updated in place");
        Ok(id)
    }

    async fn route_sheet(&self, date: NaiveDate) -> Result<Vec<(OrderId, RouteStop)>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT order_id, customer, address, notes, seller, dispatch_date FROM routes
                 WHERE dispatch_date = ?1 ORDER BY order_id",
                params![date.format(DATE_FMT).to_string()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("route_sheet: {e}")))?;

        let mut out = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("route_sheet: {e}")))?
        {
            let id: i64 = row
                .get(0)
                .map_err(|e| DatabaseError::Query(format!("route_sheet id: {e}")))?;
            let text = |i: i32| {
                row.get::<String>(i)
                    .map_err(|e| DatabaseError::Query(format!("route column {i}: {e}")))
            };
            out.push((
                OrderId(id),
                RouteStop {
                    customer: text(1)?,
                    address: text(2)?,
                    notes: text(3)?,
                    seller: text(4)?,
                    dispatch_date: parse_date(&text(5)?)?,
                },
            ));
        }
        Ok(out)
    }
}

#[async_trait]
impl CatalogSource for LibSqlStore {
    async fn list_catalog(&self) -> Result<Vec<CatalogItem>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT code, memo, alt_description, full_name FROM catalog_items ORDER BY position",
                (),
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("list_catalog: {e}")))?;

        let mut out = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("list_catalog: {e}")))?
        {
            out.push(CatalogItem {
                code: row.get::<String>(0).unwrap_or_default(),
                memo: row.get::<String>(1).unwrap_or_default(),
                alt_description: row.get::<String>(2).unwrap_or_default(),
                full_name: row.get::<String>(3).unwrap_or_default(),
            });
        }
        Ok(out)
    }
}

#[async_trait]
impl AddressSource for LibSqlStore {
    async fn list_addresses(&self) -> Result<Vec<AddressEntry>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT name, address FROM address_entries ORDER BY position",
                (),
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("list_addresses: {e}")))?;

        let mut out = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("list_addresses: {e}")))?
        {
            out.push(AddressEntry {
                name: row.get::<String>(0).unwrap_or_default(),
                address: row.get::<String>(1).unwrap_or_default(),
            });
        }
        Ok(out)
    }
}
