//! Order drafts, finalized orders, and the parsers for user-typed order input.

pub mod date;
pub mod draft;
pub mod quick;

pub use date::{parse_dispatch_date, parse_dispatch_date_from};
pub use draft::{Order, OrderDraft, OrderLine, Quantity, RouteStop, UNKNOWN_USER, format_date};
pub use quick::{QuickItem, QuickOrder, parse_quick_order};
