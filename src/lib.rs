//! Order Desk: a chat bot that takes product orders in Spanish, matching
//! free-text product and customer names against a catalog.

pub mod bot;
pub mod channels;
pub mod config;
pub mod conversation;
pub mod error;
pub mod matching;
pub mod order;
pub mod store;
