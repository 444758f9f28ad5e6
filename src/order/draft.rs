//! Order under construction and the finalized order it produces.

use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::error::OrderError;
use crate::matching::{AddressEntry, AddressResolver};

/// A positive whole-number quantity, entered as a string of ASCII digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Quantity(u32);

impl Quantity {
    pub fn new(value: u32) -> Result<Self, OrderError> {
        if value == 0 {
            return Err(OrderError::InvalidQuantity(value.to_string()));
        }
        Ok(Self(value))
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

impl Default for Quantity {
    fn default() -> Self {
        Self(1)
    }
}

impl FromStr for Quantity {
    type Err = OrderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(OrderError::InvalidQuantity(s.to_string()));
        }
        let value: u32 = s
            .parse()
            .map_err(|_| OrderError::InvalidQuantity(s.to_string()))?;
        Self::new(value).map_err(|_| OrderError::InvalidQuantity(s.to_string()))
    }
}

impl TryFrom<u32> for Quantity {
    type Error = OrderError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Quantity> for u32 {
    fn from(q: Quantity) -> Self {
        q.0
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One product line. Description, quantity and code travel together, so
/// adding or removing a line can never desynchronize them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub description: String,
    pub quantity: Quantity,
    /// Catalog code; empty for products typed by hand.
    #[serde(default)]
    pub code: String,
}

impl OrderLine {
    pub fn new(description: impl Into<String>, quantity: Quantity, code: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            quantity,
            code: code.into(),
        }
    }

    /// Whether this line was typed by hand rather than picked from the catalog.
    pub fn is_unmatched(&self) -> bool {
        self.code.is_empty()
    }
}

impl fmt::Display for OrderLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.description, self.quantity)
    }
}

/// Mutable order aggregate owned by a conversation session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderDraft {
    pub customer: String,
    lines: Vec<OrderLine>,
    pub dispatch_date: Option<NaiveDate>,
    pub note: Option<String>,
    pub manual_address: Option<String>,
    pub submitted_by: String,
}

impl OrderDraft {
    pub fn new(submitted_by: impl Into<String>) -> Self {
        Self {
            submitted_by: submitted_by.into(),
            ..Self::default()
        }
    }

    pub fn lines(&self) -> &[OrderLine] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn add_line(&mut self, description: impl Into<String>, quantity: Quantity, code: impl Into<String>) {
        self.lines.push(OrderLine::new(description, quantity, code));
    }

    /// Remove the line at zero-based `index` and return its description.
    pub fn remove_line(&mut self, index: usize) -> Result<String, OrderError> {
        if index >= self.lines.len() {
            return Err(OrderError::LineOutOfRange {
                index,
                len: self.lines.len(),
            });
        }
        Ok(self.lines.remove(index).description)
    }

    /// Address the order would ship to right now.
    pub fn effective_address(&self, resolver: &AddressResolver, directory: &[AddressEntry]) -> String {
        match self.manual_address.as_deref() {
            Some(manual) if !manual.trim().is_empty() => manual.to_string(),
            _ => resolver.resolve(&self.customer, directory),
        }
    }

    /// Freeze the draft. The dispatch date defaults to `now`'s date when the
    /// user never set one.
    pub fn finalize(
        &self,
        resolver: &AddressResolver,
        directory: &[AddressEntry],
        now: NaiveDateTime,
    ) -> Result<Order, OrderError> {
        if self.customer.trim().is_empty() {
            return Err(OrderError::NoCustomer);
        }
        if self.lines.is_empty() {
            return Err(OrderError::NoLines);
        }

        Ok(Order {
            customer: self.customer.clone(),
            lines: self.lines.clone(),
            dispatch_date: self.dispatch_date.unwrap_or_else(|| now.date()),
            note: self.note.clone().filter(|n| !n.trim().is_empty()),
            manual_address: self.manual_address.clone(),
            address: self.effective_address(resolver, directory),
            submitted_by: if self.submitted_by.is_empty() {
                UNKNOWN_USER.to_string()
            } else {
                self.submitted_by.clone()
            },
            created_at: now,
        })
    }
}

/// Submitter recorded when the transport knows nothing about the sender.
pub const UNKNOWN_USER: &str = "Desconocido";

/// A finalized order. Always has at least one line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub customer: String,
    pub lines: Vec<OrderLine>,
    pub dispatch_date: NaiveDate,
    pub note: Option<String>,
    pub manual_address: Option<String>,
    /// Delivery address: the manual override, or the one resolved from the
    /// address directory when the order was saved.
    pub address: String,
    pub submitted_by: String,
    pub created_at: NaiveDateTime,
}

impl Order {
    /// Single-line summary for the delivery route: `desc (qty), desc (qty)`.
    pub fn route_notes(&self) -> String {
        self.lines
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// This order's row on the delivery-route sheet.
    pub fn route_stop(&self) -> RouteStop {
        RouteStop {
            customer: self.customer.clone(),
            address: self.address.clone(),
            notes: self.route_notes(),
            seller: self.submitted_by.clone(),
            dispatch_date: self.dispatch_date,
        }
    }

    /// Dispatch date as `MM/DD/YYYY`.
    pub fn dispatch_label(&self) -> String {
        format_date(self.dispatch_date)
    }

    pub fn remove_line(&mut self, index: usize) -> Result<OrderLine, OrderError> {
        if index >= self.lines.len() {
            return Err(OrderError::LineOutOfRange {
                index,
                len: self.lines.len(),
            });
        }
        if self.lines.len() == 1 {
            return Err(OrderError::NoLines);
        }
        Ok(self.lines.remove(index))
    }

    pub fn set_quantity(&mut self, index: usize, quantity: Quantity) -> Result<(), OrderError> {
        let len = self.lines.len();
        let line = self
            .lines
            .get_mut(index)
            .ok_or(OrderError::LineOutOfRange { index, len })?;
        line.quantity = quantity;
        Ok(())
    }

    pub fn set_manual_address(&mut self, address: impl Into<String>) {
        let address = address.into();
        self.address = address.clone();
        self.manual_address = Some(address);
    }
}

/// One stop on the delivery route: who, where, and what to drop off.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteStop {
    pub customer: String,
    pub address: String,
    pub notes: String,
    pub seller: String,
    pub dispatch_date: NaiveDate,
}

pub fn format_date(date: NaiveDate) -> String {
    date.format("%m/%d/%Y").to_string()
}
