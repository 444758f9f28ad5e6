//! Quick-order block parsing.
//!
//! ```text
//! A&W Truck Service              <- customer
//! * Paleta de Mistyk 1           <- item, trailing number is the quantity
//! * Delo                         <- item, quantity defaults to 1
//! 5401 Bernal Dr, Dallas, TX     <- optional manual address (last line only)
//! ```

use std::sync::LazyLock;

use regex::Regex;

use super::draft::Quantity;
use crate::error::OrderError;

static ITEM_WITH_QUANTITY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.+?)\s+(\d+)$").expect("item regex is valid"));

/// One `*` line: the product text to match and its quantity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuickItem {
    pub text: String,
    pub quantity: Quantity,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuickOrder {
    pub customer: String,
    pub items: Vec<QuickItem>,
    pub manual_address: Option<String>,
}

/// Parse a whole quick-order message. Blank lines are ignored; non-`*`
/// lines other than the first and last carry no meaning and are skipped.
pub fn parse_quick_order(block: &str) -> Result<QuickOrder, OrderError> {
    let lines: Vec<&str> = block
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();

    if lines.len() < 2 {
        return Err(OrderError::InvalidQuickOrder(
            "a customer line and at least one product line are required".into(),
        ));
    }

    let customer = lines[0].to_string();
    let last = lines.len() - 1;
    let mut items = Vec::new();
    let mut manual_address = None;

    for (i, line) in lines.iter().enumerate().skip(1) {
        if let Some(rest) = line.strip_prefix('*') {
            items.push(parse_item(rest.trim())?);
        } else if i == last {
            manual_address = Some(line.to_string());
        }
    }

    if items.is_empty() {
        return Err(OrderError::InvalidQuickOrder("no product lines starting with '*'".into()));
    }

    Ok(QuickOrder {
        customer,
        items,
        manual_address,
    })
}

fn parse_item(text: &str) -> Result<QuickItem, OrderError> {
    if text.is_empty() {
        return Err(OrderError::InvalidQuickOrder("empty product line".into()));
    }

    match ITEM_WITH_QUANTITY.captures(text) {
        Some(caps) => Ok(QuickItem {
            text: caps[1].trim().to_string(),
            quantity: caps[2].parse()?,
        }),
        None => Ok(QuickItem {
            text: text.to_string(),
            quantity: Quantity::default(),
        }),
    }
}
