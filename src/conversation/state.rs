//! Conversation states. Each variant carries exactly the data that is live
//! while the session sits in it: candidate lists only exist in selection
//! states, and a loaded order only exists in edit states.

use std::fmt;

use crate::matching::{CatalogItem, MatchCandidate, MatchProfile};
use crate::order::{Order, OrderLine, QuickItem, Quantity};
use crate::store::{OrderId, OrderSummary};

/// A stored order loaded for editing, with the id it is stored under.
#[derive(Debug, Clone, PartialEq)]
pub struct EditTarget {
    pub id: OrderId,
    pub order: Order,
}

impl EditTarget {
    pub fn new(id: OrderId, order: Order) -> Self {
        Self { id, order }
    }

    pub fn lines(&self) -> &[OrderLine] {
        &self.order.lines
    }
}

/// Where a product picked through search/selection/quantity ends up.
#[derive(Debug, Clone, PartialEq)]
pub enum LineTarget {
    /// The step-by-step draft.
    Draft,
    /// The draft of a quick order under review.
    Quick,
    /// A stored order being edited; committed right after the quantity.
    Edit(EditTarget),
}

impl LineTarget {
    /// Ranking profile used for queries aimed at this target.
    pub fn profile(&self) -> MatchProfile {
        match self {
            Self::Draft => MatchProfile::Search,
            Self::Quick | Self::Edit(_) => MatchProfile::Guided,
        }
    }
}

/// Screen to return to once a draft line has been removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resume {
    AddAnother,
    Summary,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum ConversationState {
    /// Main menu.
    #[default]
    Start,

    // Step-by-step order.
    CustomerName,
    ProductQuery {
        target: LineTarget,
    },
    Selecting {
        candidates: Vec<MatchCandidate<CatalogItem>>,
        target: LineTarget,
    },
    NoMatch {
        query: String,
        target: LineTarget,
    },
    Quantity {
        description: String,
        code: String,
        target: LineTarget,
    },
    AddAnother,
    RemoveLine {
        resume: Resume,
    },
    Date,
    NotePrompt,
    Note,
    Summary,
    ManualAddress,

    // Quick order.
    QuickOrder,
    QuickSelecting {
        query: String,
        quantity: Quantity,
        candidates: Vec<MatchCandidate<CatalogItem>>,
        /// Block items still waiting to be matched.
        remaining: Vec<QuickItem>,
    },
    QuickConfirm,
    QuickRemoveLine,
    QuickAddress,

    // Editing a stored order.
    SelectOrder {
        orders: Vec<OrderSummary>,
    },
    EditMenu {
        target: EditTarget,
    },
    EditProducts {
        target: EditTarget,
    },
    SelectLineToModify {
        target: EditTarget,
    },
    NewQuantity {
        target: EditTarget,
        index: usize,
    },
    SelectLineToDelete {
        target: EditTarget,
    },
    EditDate {
        target: EditTarget,
    },
    EditAddress {
        target: EditTarget,
    },
    ContinueEditing {
        id: OrderId,
    },
}

impl ConversationState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::CustomerName => "customer_name",
            Self::ProductQuery { .. } => "product_query",
            Self::Selecting { .. } => "selecting",
            Self::NoMatch { .. } => "no_match",
            Self::Quantity { .. } => "quantity",
            Self::AddAnother => "add_another",
            Self::RemoveLine { .. } => "remove_line",
            Self::Date => "date",
            Self::NotePrompt => "note_prompt",
            Self::Note => "note",
            Self::Summary => "summary",
            Self::ManualAddress => "manual_address",
            Self::QuickOrder => "quick_order",
            Self::QuickSelecting { .. } => "quick_selecting",
            Self::QuickConfirm => "quick_confirm",
            Self::QuickRemoveLine => "quick_remove_line",
            Self::QuickAddress => "quick_address",
            Self::SelectOrder { .. } => "select_order",
            Self::EditMenu { .. } => "edit_menu",
            Self::EditProducts { .. } => "edit_products",
            Self::SelectLineToModify { .. } => "select_line_to_modify",
            Self::NewQuantity { .. } => "new_quantity",
            Self::SelectLineToDelete { .. } => "select_line_to_delete",
            Self::EditDate { .. } => "edit_date",
            Self::EditAddress { .. } => "edit_address",
            Self::ContinueEditing { .. } => "continue_editing",
        }
    }

    /// Candidates offered to the user, if this is a selection state.
    pub fn pending_candidates(&self) -> Option<&[MatchCandidate<CatalogItem>]> {
        match self {
            Self::Selecting { candidates, .. } | Self::QuickSelecting { candidates, .. } => {
                Some(candidates)
            }
            _ => None,
        }
    }

    /// Stored order this state operates on, if any.
    pub fn edit_target(&self) -> Option<&EditTarget> {
        match self {
            Self::EditMenu { target }
            | Self::EditProducts { target }
            | Self::SelectLineToModify { target }
            | Self::NewQuantity { target, .. }
            | Self::SelectLineToDelete { target }
            | Self::EditDate { target }
            | Self::EditAddress { target } => Some(target),
            Self::ProductQuery { target: LineTarget::Edit(t) }
            | Self::Selecting { target: LineTarget::Edit(t), .. }
            | Self::NoMatch { target: LineTarget::Edit(t), .. }
            | Self::Quantity { target: LineTarget::Edit(t), .. } => Some(t),
            _ => None,
        }
    }
}

impl fmt::Display for ConversationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn target() -> EditTarget {
        let created = NaiveDate::from_ymd_opt(2025, 1, 2)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap();
        EditTarget::new(
            OrderId(7),
            Order {
                customer: "ABC".into(),
                lines: vec![OrderLine::new("Delo", Quantity::default(), "D")],
                dispatch_date: created.date(),
                note: None,
                manual_address: None,
                address: String::new(),
                submitted_by: "ana".into(),
                created_at: created,
            },
        )
    }

    #[test]
    fn display_is_snake_case() {
        assert_eq!(ConversationState::Start.to_string(), "start");
        assert_eq!(
            ConversationState::SelectLineToModify { target: target() }.to_string(),
            "select_line_to_modify"
        );
    }

    #[test]
    fn candidates_only_in_selection_states() {
        let selecting = ConversationState::Selecting {
            candidates: vec![MatchCandidate {
                item: CatalogItem::new("D", "Delo", "", ""),
                score: 1.0,
            }],
            target: LineTarget::Draft,
        };
        assert_eq!(selecting.pending_candidates().map(<[_]>::len), Some(1));
        assert!(ConversationState::Summary.pending_candidates().is_none());
        assert!(ConversationState::AddAnother.pending_candidates().is_none());
    }

    #[test]
    fn edit_target_is_reachable_through_line_states() {
        let state = ConversationState::Quantity {
            description: "Delo".into(),
            code: "D".into(),
            target: LineTarget::Edit(target()),
        };
        assert_eq!(state.edit_target().map(|t| t.id), Some(OrderId(7)));
        assert!(ConversationState::Summary.edit_target().is_none());
    }

    #[test]
    fn draft_searches_use_search_profile() {
        assert_eq!(LineTarget::Draft.profile(), MatchProfile::Search);
        assert_eq!(LineTarget::Quick.profile(), MatchProfile::Guided);
        assert_eq!(LineTarget::Edit(target()).profile(), MatchProfile::Guided);
    }
}
