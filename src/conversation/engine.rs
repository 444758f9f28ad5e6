//! ConversationEngine: routes each inbound message to the handler of the
//! session's current state.
//!
//! Handlers take the state by value and hand back the next one, so data
//! that belongs to a state (candidates, a loaded order) moves with it and
//! is dropped on the way out. Validation failures hand back the same state
//! and leave the draft untouched.

use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use tokio::sync::RwLock;

use super::prompts;
use super::session::{Session, SessionStore};
use super::state::{ConversationState, EditTarget, LineTarget, Resume};
use crate::error::{DatabaseError, OrderError, Result, SessionError};
use crate::matching::{
    normalize, AddressResolver, CatalogItem, CatalogMatcher, MatchCandidate, MatchProfile,
    MatchWeights,
};
use crate::order::{
    parse_dispatch_date_from, parse_quick_order, Order, OrderDraft, OrderLine, QuickItem,
    Quantity, UNKNOWN_USER,
};
use crate::store::{AddressSource, CatalogSource, OrderStore, OrderSummary, ReferenceData};

/// Literal input that resets a session from any state.
pub const RESET_TOKEN: &str = "000";

/// Outcome of one handled message.
struct Turn {
    /// `None` ends the session.
    next: Option<ConversationState>,
    reply: String,
}

impl Turn {
    fn go(next: ConversationState, reply: impl Into<String>) -> Self {
        Self {
            next: Some(next),
            reply: reply.into(),
        }
    }

    fn end(reply: impl Into<String>) -> Self {
        Self {
            next: None,
            reply: reply.into(),
        }
    }
}

/// Per-message context shared by the handlers.
struct Ctx<'a> {
    key: &'a str,
    user: &'a str,
    text: &'a str,
    now: NaiveDateTime,
    reference: Arc<ReferenceData>,
}

impl Ctx<'_> {
    fn today(&self) -> NaiveDate {
        self.now.date()
    }
}

pub struct ConversationEngine {
    sessions: Arc<SessionStore>,
    orders: Arc<dyn OrderStore>,
    reference: RwLock<Arc<ReferenceData>>,
    matcher: CatalogMatcher,
    resolver: AddressResolver,
}

impl ConversationEngine {
    pub fn new(
        sessions: Arc<SessionStore>,
        orders: Arc<dyn OrderStore>,
        reference: Arc<ReferenceData>,
        weights: MatchWeights,
    ) -> Self {
        Self {
            sessions,
            orders,
            reference: RwLock::new(reference),
            matcher: CatalogMatcher::new(weights.clone()),
            resolver: AddressResolver::new(weights),
        }
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    pub async fn reference(&self) -> Arc<ReferenceData> {
        self.reference.read().await.clone()
    }

    /// Swap in a freshly loaded catalog/address snapshot. Sessions pick it
    /// up on their next message.
    pub async fn reload_reference(&self, catalog: &dyn CatalogSource, addresses: &dyn AddressSource) {
        let fresh = ReferenceData::load(catalog, addresses).await;
        *self.reference.write().await = fresh;
    }

    /// Handle one inbound message for session `key` sent by `user`.
    ///
    /// Returns the reply to send, or `None` for input that is ignored
    /// (blank text). An `Err` means the operation was aborted; the session
    /// is discarded and the caller should send a generic failure.
    pub async fn handle(&self, key: &str, user: &str, text: &str) -> Result<Option<String>> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(None);
        }
        let user = if user.trim().is_empty() { UNKNOWN_USER } else { user.trim() };

        loop {
            let (handle, created) = self.sessions.get_or_create(key).await;
            let mut session = handle.lock().await;
            if session.is_evicted() {
                // Swept between lookup and lock.
                continue;
            }

            let now = self.sessions.clock().now();
            session.last_activity = now;

            if text == RESET_TOKEN {
                session.reset();
                tracing::info!(session = %key, "Session reset");
                return Ok(Some(prompts::reset()));
            }
            if created {
                return Ok(Some(prompts::MAIN_MENU.to_string()));
            }

            return self.dispatch(&mut session, user, text, now).await.map(Some);
        }
    }

    async fn dispatch(
        &self,
        session: &mut Session,
        user: &str,
        text: &str,
        now: NaiveDateTime,
    ) -> Result<String> {
        let key = session.key.clone();
        let ctx = Ctx {
            key: &key,
            user,
            text,
            now,
            reference: self.reference().await,
        };
        let from = session.state.name();
        let state = std::mem::take(&mut session.state);

        match self.step(&ctx, state, &mut session.draft).await {
            Ok(Turn {
                next: Some(next),
                reply,
            }) => {
                tracing::debug!(session = %ctx.key, from, to = %next, "State transition");
                session.state = next;
                Ok(reply)
            }
            Ok(Turn { next: None, reply }) => {
                tracing::debug!(session = %ctx.key, from, "Session finished");
                self.sessions.remove(session).await;
                Ok(reply)
            }
            Err(e) => {
                tracing::error!(session = %ctx.key, state = from, error = %e, "Conversation step aborted");
                self.sessions.remove(session).await;
                Err(e)
            }
        }
    }

    async fn step(
        &self,
        ctx: &Ctx<'_>,
        state: ConversationState,
        draft: &mut OrderDraft,
    ) -> Result<Turn> {
        use ConversationState as S;

        let turn = match state {
            S::Start => self.on_start(ctx, draft).await,
            S::CustomerName => {
                draft.customer = ctx.text.to_string();
                Turn::go(
                    S::ProductQuery {
                        target: LineTarget::Draft,
                    },
                    prompts::ASK_PRODUCT,
                )
            }
            S::ProductQuery { target } => self.search(ctx, ctx.text, target),
            S::Selecting { candidates, target } => self.on_selecting(ctx, candidates, target),
            S::NoMatch { query, target } => on_no_match(ctx, query, target),
            S::Quantity {
                description,
                code,
                target,
            } => self.on_quantity(ctx, description, code, target, draft).await?,
            S::AddAnother => on_add_another(ctx, draft),
            S::RemoveLine { resume } => self.on_remove_line(ctx, resume, draft),
            S::Date => match parse_dispatch_date_from(ctx.text, ctx.today()) {
                Ok(date) => {
                    draft.dispatch_date = Some(date);
                    Turn::go(S::NotePrompt, prompts::NOTE_MENU)
                }
                Err(_) => Turn::go(S::Date, prompts::INVALID_DATE),
            },
            S::NotePrompt => match ctx.text {
                "1" => Turn::go(S::Note, prompts::ASK_NOTE),
                "2" => {
                    draft.note = None;
                    Turn::go(S::Summary, self.summary(ctx, draft))
                }
                _ => Turn::go(S::NotePrompt, prompts::invalid_option(prompts::NOTE_MENU)),
            },
            S::Note => {
                draft.note = Some(ctx.text.to_string());
                Turn::go(S::Summary, self.summary(ctx, draft))
            }
            S::Summary => self.on_summary(ctx, draft).await,
            S::ManualAddress => {
                draft.manual_address = Some(ctx.text.to_string());
                Turn::go(S::Summary, self.summary(ctx, draft))
            }

            S::QuickOrder => self.on_quick_order(ctx, draft),
            S::QuickSelecting {
                query,
                quantity,
                candidates,
                remaining,
            } => self.on_quick_selecting(ctx, query, quantity, candidates, remaining, draft),
            S::QuickConfirm => self.on_quick_confirm(ctx, draft).await,
            S::QuickRemoveLine => {
                match ctx.text.parse::<usize>().ok().and_then(|n| n.checked_sub(1)) {
                    Some(index) => match draft.remove_line(index) {
                        Ok(description) => Turn::go(
                            S::QuickConfirm,
                            prompts::removed(&description, &self.quick_summary(ctx, draft)),
                        ),
                        Err(_) => Turn::go(S::QuickRemoveLine, prompts::INVALID_LINE),
                    },
                    None => Turn::go(S::QuickRemoveLine, prompts::INVALID_LINE),
                }
            }
            S::QuickAddress => {
                draft.manual_address = Some(ctx.text.to_string());
                Turn::go(
                    S::QuickConfirm,
                    prompts::address_changed(ctx.text, &self.quick_summary(ctx, draft)),
                )
            }

            S::SelectOrder { orders } => self.on_select_order(ctx, orders).await,
            S::EditMenu { target } => self.on_edit_menu(ctx, target).await,
            S::EditProducts { target } => match ctx.text {
                "1" => Turn::go(
                    S::ProductQuery {
                        target: LineTarget::Edit(target),
                    },
                    prompts::ASK_NEW_PRODUCT,
                ),
                "2" => {
                    let reply = prompts::pick_line_to_modify(target.lines());
                    Turn::go(S::SelectLineToModify { target }, reply)
                }
                "3" => {
                    let reply = prompts::pick_line_to_delete(target.lines());
                    Turn::go(S::SelectLineToDelete { target }, reply)
                }
                _ => Turn::go(
                    S::EditProducts { target },
                    prompts::invalid_option(prompts::EDIT_PRODUCTS_MENU),
                ),
            },
            S::SelectLineToModify { target } => match parse_index(ctx.text, target.lines().len()) {
                Some(index) => Turn::go(S::NewQuantity { target, index }, prompts::ASK_NEW_QUANTITY),
                None => Turn::go(S::SelectLineToModify { target }, prompts::INVALID_SELECTION),
            },
            S::NewQuantity { target, index } => match ctx.text.parse::<Quantity>() {
                Ok(quantity) => {
                    let mut updated = target.order.clone();
                    updated.set_quantity(index, quantity)?;
                    self.commit(ctx, target, updated, "Cambios guardados exitosamente", |t| {
                        S::NewQuantity { target: t, index }
                    })
                    .await
                }
                Err(_) => Turn::go(S::NewQuantity { target, index }, prompts::INVALID_QUANTITY),
            },
            S::SelectLineToDelete { target } => self.on_delete_line(ctx, target).await,
            S::EditDate { target } => match parse_dispatch_date_from(ctx.text, ctx.today()) {
                Ok(date) => {
                    let mut updated = target.order.clone();
                    updated.dispatch_date = date;
                    self.commit(ctx, target, updated, "Fecha actualizada", |t| S::EditDate {
                        target: t,
                    })
                    .await
                }
                Err(_) => Turn::go(S::EditDate { target }, prompts::INVALID_DATE),
            },
            S::EditAddress { target } => {
                let mut updated = target.order.clone();
                updated.set_manual_address(ctx.text);
                self.commit(ctx, target, updated, "Dirección actualizada", |t| {
                    S::EditAddress { target: t }
                })
                .await
            }
            S::ContinueEditing { id } => match ctx.text {
                "1" => match self.orders.load(id).await {
                    Ok(Some(order)) => {
                        let reply = prompts::order_details(&order);
                        Turn::go(
                            S::EditMenu {
                                target: EditTarget::new(id, order),
                            },
                            reply,
                        )
                    }
                    Ok(None) => {
                        return Err(SessionError::OrderVanished {
                            key: ctx.key.to_string(),
                            id: id.0,
                        }
                        .into());
                    }
                    Err(e) => {
                        tracing::warn!(session = %ctx.key, order = %id, error = %e, "Failed to reload order");
                        Turn::go(S::ContinueEditing { id }, prompts::GENERIC_FAILURE)
                    }
                },
                "2" => {
                    tracing::info!(session = %ctx.key, order = %id, "Editing finished");
                    Turn::end(prompts::EDITS_DONE)
                }
                _ => Turn::go(
                    S::ContinueEditing { id },
                    prompts::invalid_option(prompts::CONTINUE_MENU),
                ),
            },
        };
        Ok(turn)
    }

    // ── Main menu ───────────────────────────────────────────────────────

    async fn on_start(&self, ctx: &Ctx<'_>, draft: &mut OrderDraft) -> Turn {
        match ctx.text {
            "1" => {
                *draft = OrderDraft::new(ctx.user);
                Turn::go(ConversationState::CustomerName, prompts::ASK_CUSTOMER)
            }
            "2" => match self.orders.list_by_user(ctx.user).await {
                Ok(orders) if orders.is_empty() => Turn::end(prompts::NO_ORDERS),
                Ok(orders) => {
                    let reply = prompts::order_list(&orders);
                    Turn::go(ConversationState::SelectOrder { orders }, reply)
                }
                Err(e) => {
                    tracing::warn!(session = %ctx.key, error = %e, "Failed to list orders");
                    Turn::go(ConversationState::Start, prompts::GENERIC_FAILURE)
                }
            },
            "3" => {
                *draft = OrderDraft::new(ctx.user);
                Turn::go(ConversationState::QuickOrder, prompts::QUICK_FORMAT)
            }
            _ => Turn::go(
                ConversationState::Start,
                prompts::invalid_option(prompts::MAIN_MENU),
            ),
        }
    }

    // ── Product search, selection and quantity ──────────────────────────

    fn rank(&self, ctx: &Ctx<'_>, query: &str, profile: MatchProfile) -> Vec<MatchCandidate<CatalogItem>> {
        self.matcher.rank(query, &ctx.reference.catalog, profile)
    }

    fn search(&self, ctx: &Ctx<'_>, query: &str, target: LineTarget) -> Turn {
        let candidates = self.rank(ctx, query, target.profile());
        if candidates.is_empty() {
            return Turn::go(
                ConversationState::NoMatch {
                    query: query.to_string(),
                    target,
                },
                prompts::NO_MATCH_MENU,
            );
        }
        let reply = prompts::candidates(&candidates);
        Turn::go(ConversationState::Selecting { candidates, target }, reply)
    }

    fn on_selecting(
        &self,
        ctx: &Ctx<'_>,
        mut candidates: Vec<MatchCandidate<CatalogItem>>,
        target: LineTarget,
    ) -> Turn {
        if let Some(index) = parse_index(ctx.text, candidates.len()) {
            let chosen = candidates.swap_remove(index).item;
            let reply = prompts::ask_quantity(&chosen.memo);
            return Turn::go(
                ConversationState::Quantity {
                    description: chosen.memo,
                    code: chosen.code,
                    target,
                },
                reply,
            );
        }
        if is_number(ctx.text) {
            return Turn::go(
                ConversationState::Selecting { candidates, target },
                prompts::INVALID_SELECTION,
            );
        }
        self.search(ctx, ctx.text, target)
    }

    async fn on_quantity(
        &self,
        ctx: &Ctx<'_>,
        description: String,
        code: String,
        target: LineTarget,
        draft: &mut OrderDraft,
    ) -> Result<Turn> {
        let Ok(quantity) = ctx.text.parse::<Quantity>() else {
            return Ok(Turn::go(
                ConversationState::Quantity {
                    description,
                    code,
                    target,
                },
                prompts::INVALID_QUANTITY,
            ));
        };

        let turn = match target {
            LineTarget::Draft => {
                draft.add_line(description, quantity, code);
                Turn::go(ConversationState::AddAnother, prompts::ADD_ANOTHER_MENU)
            }
            LineTarget::Quick => {
                draft.add_line(description, quantity, code);
                Turn::go(ConversationState::QuickConfirm, self.quick_summary(ctx, draft))
            }
            LineTarget::Edit(target) => {
                let mut updated = target.order.clone();
                updated
                    .lines
                    .push(OrderLine::new(description.clone(), quantity, code.clone()));
                self.commit(ctx, target, updated, "Producto agregado", move |t| {
                    ConversationState::Quantity {
                        description,
                        code,
                        target: LineTarget::Edit(t),
                    }
                })
                .await
            }
        };
        Ok(turn)
    }

    // ── Step-by-step order ──────────────────────────────────────────────

    fn on_remove_line(&self, ctx: &Ctx<'_>, resume: Resume, draft: &mut OrderDraft) -> Turn {
        let removed = ctx
            .text
            .parse::<usize>()
            .ok()
            .and_then(|n| n.checked_sub(1))
            .ok_or(())
            .and_then(|index| draft.remove_line(index).map_err(|_| ()));

        match removed {
            Ok(description) => match resume {
                Resume::AddAnother => Turn::go(
                    ConversationState::AddAnother,
                    prompts::removed(&description, prompts::ADD_ANOTHER_MENU),
                ),
                Resume::Summary => Turn::go(
                    ConversationState::Summary,
                    prompts::removed(&description, &self.summary(ctx, draft)),
                ),
            },
            Err(()) => Turn::go(ConversationState::RemoveLine { resume }, prompts::INVALID_LINE),
        }
    }

    fn summary(&self, ctx: &Ctx<'_>, draft: &OrderDraft) -> String {
        let address = draft.effective_address(&self.resolver, &ctx.reference.addresses);
        prompts::summary(draft, &address)
    }

    async fn on_summary(&self, ctx: &Ctx<'_>, draft: &mut OrderDraft) -> Turn {
        match ctx.text {
            "0" => {
                tracing::info!(session = %ctx.key, "Order cancelled");
                Turn::end(prompts::ORDER_CANCELLED)
            }
            "1" => Turn::go(
                ConversationState::ProductQuery {
                    target: LineTarget::Draft,
                },
                prompts::ASK_NEW_PRODUCT,
            ),
            "2" if draft.is_empty() => Turn::go(ConversationState::Summary, prompts::NO_PRODUCTS),
            "2" => Turn::go(
                ConversationState::RemoveLine {
                    resume: Resume::Summary,
                },
                prompts::remove_list(draft.lines()),
            ),
            "3" => self.save(ctx, draft, ConversationState::Summary).await,
            "4" => Turn::go(ConversationState::ManualAddress, prompts::ASK_MANUAL_ADDRESS),
            text if normalize(text) == "direccion" => {
                Turn::go(ConversationState::ManualAddress, prompts::ASK_MANUAL_ADDRESS)
            }
            _ => Turn::go(
                ConversationState::Summary,
                prompts::invalid_option(prompts::ORDER_MENU),
            ),
        }
    }

    /// Finalize and append the draft. On failure the draft and `stay` are
    /// kept so the user can retry.
    async fn save(&self, ctx: &Ctx<'_>, draft: &mut OrderDraft, stay: ConversationState) -> Turn {
        if draft.submitted_by.is_empty() {
            draft.submitted_by = ctx.user.to_string();
        }

        let order = match draft.finalize(&self.resolver, &ctx.reference.addresses, ctx.now) {
            Ok(order) => order,
            Err(OrderError::NoLines) => return Turn::go(stay, prompts::NO_PRODUCTS),
            Err(e) => {
                tracing::warn!(session = %ctx.key, error = %e, "Order not ready to save");
                return Turn::go(stay, prompts::GENERIC_FAILURE);
            }
        };

        match self.orders.append(&order).await {
            Ok(id) => {
                tracing::info!(
                    session = %ctx.key,
                    order = %id,
                    customer = %order.customer,
                    lines = order.lines.len(),
                    "Order saved"
                );
                Turn::end(prompts::ORDER_SAVED)
            }
            Err(e) => {
                tracing::warn!(session = %ctx.key, error = %e, "Failed to save order, keeping draft");
                Turn::go(stay, prompts::SAVE_FAILED)
            }
        }
    }

    // ── Quick order ─────────────────────────────────────────────────────

    fn quick_summary(&self, ctx: &Ctx<'_>, draft: &OrderDraft) -> String {
        let address = draft.effective_address(&self.resolver, &ctx.reference.addresses);
        prompts::quick_summary(draft, &address)
    }

    fn on_quick_order(&self, ctx: &Ctx<'_>, draft: &mut OrderDraft) -> Turn {
        let block = match parse_quick_order(ctx.text) {
            Ok(block) => block,
            Err(e) => {
                let reply = match e {
                    OrderError::InvalidQuantity(_) => prompts::QUICK_BAD_QUANTITY,
                    _ if ctx.text.lines().filter(|l| !l.trim().is_empty()).count() < 2 => {
                        prompts::QUICK_TOO_SHORT
                    }
                    _ => prompts::QUICK_NO_ITEMS,
                };
                return Turn::go(ConversationState::QuickOrder, reply);
            }
        };

        draft.customer = block.customer;
        draft.manual_address = block.manual_address;
        draft.dispatch_date = Some(ctx.today());
        tracing::debug!(session = %ctx.key, items = block.items.len(), "Quick order parsed");

        self.match_quick_items(ctx, block.items, draft)
    }

    /// Work through the block's items in order. Items without catalog
    /// candidates are kept under the typed name; the first item with
    /// candidates pauses processing until the user picks one.
    fn match_quick_items(&self, ctx: &Ctx<'_>, items: Vec<QuickItem>, draft: &mut OrderDraft) -> Turn {
        let mut items = items.into_iter();
        while let Some(item) = items.next() {
            let candidates = self.rank(ctx, &item.text, MatchProfile::Quick);
            if candidates.is_empty() {
                draft.add_line(item.text, item.quantity, "");
                continue;
            }

            let reply = prompts::quick_candidates(&item.text, &candidates);
            return Turn::go(
                ConversationState::QuickSelecting {
                    query: item.text,
                    quantity: item.quantity,
                    candidates,
                    remaining: items.collect(),
                },
                reply,
            );
        }
        Turn::go(ConversationState::QuickConfirm, self.quick_summary(ctx, draft))
    }

    fn on_quick_selecting(
        &self,
        ctx: &Ctx<'_>,
        query: String,
        quantity: Quantity,
        mut candidates: Vec<MatchCandidate<CatalogItem>>,
        remaining: Vec<QuickItem>,
        draft: &mut OrderDraft,
    ) -> Turn {
        if let Some(index) = parse_index(ctx.text, candidates.len()) {
            let chosen = candidates.swap_remove(index).item;
            draft.add_line(chosen.memo, quantity, chosen.code);
            return self.match_quick_items(ctx, remaining, draft);
        }

        if is_number(ctx.text) {
            return Turn::go(
                ConversationState::QuickSelecting {
                    query,
                    quantity,
                    candidates,
                    remaining,
                },
                prompts::INVALID_SELECTION,
            );
        }

        let fresh = self.rank(ctx, ctx.text, MatchProfile::Quick);
        if fresh.is_empty() {
            let reply = format!(
                "{}\n\n{}",
                prompts::RESEARCH_EMPTY,
                prompts::quick_candidates(&query, &candidates)
            );
            return Turn::go(
                ConversationState::QuickSelecting {
                    query,
                    quantity,
                    candidates,
                    remaining,
                },
                reply,
            );
        }

        let reply = prompts::quick_candidates(ctx.text, &fresh);
        Turn::go(
            ConversationState::QuickSelecting {
                query: ctx.text.to_string(),
                quantity,
                candidates: fresh,
                remaining,
            },
            reply,
        )
    }

    async fn on_quick_confirm(&self, ctx: &Ctx<'_>, draft: &mut OrderDraft) -> Turn {
        match ctx.text {
            "0" => {
                tracing::info!(session = %ctx.key, "Quick order cancelled");
                Turn::end(prompts::ORDER_CANCELLED)
            }
            "1" => Turn::go(
                ConversationState::ProductQuery {
                    target: LineTarget::Quick,
                },
                prompts::ASK_NEW_PRODUCT,
            ),
            "2" if draft.is_empty() => Turn::go(ConversationState::QuickConfirm, prompts::NO_PRODUCTS),
            "2" => Turn::go(
                ConversationState::QuickRemoveLine,
                prompts::remove_list(draft.lines()),
            ),
            "3" => self.save(ctx, draft, ConversationState::QuickConfirm).await,
            "4" => Turn::go(ConversationState::QuickAddress, prompts::ASK_QUICK_ADDRESS),
            _ => Turn::go(
                ConversationState::QuickConfirm,
                prompts::invalid_option(prompts::ORDER_MENU),
            ),
        }
    }

    // ── Editing a stored order ──────────────────────────────────────────

    async fn on_select_order(&self, ctx: &Ctx<'_>, mut orders: Vec<OrderSummary>) -> Turn {
        let Some(index) = parse_index(ctx.text, orders.len()) else {
            return Turn::go(
                ConversationState::SelectOrder { orders },
                prompts::INVALID_SELECTION,
            );
        };

        let id = orders[index].id;
        match self.orders.load(id).await {
            Ok(Some(order)) => {
                tracing::debug!(session = %ctx.key, order = %id, "Order loaded for editing");
                let reply = prompts::order_details(&order);
                Turn::go(
                    ConversationState::EditMenu {
                        target: EditTarget::new(id, order),
                    },
                    reply,
                )
            }
            Ok(None) => {
                orders.remove(index);
                if orders.is_empty() {
                    return Turn::end(prompts::ORDER_GONE);
                }
                let reply = format!("{}\n\n{}", prompts::ORDER_GONE, prompts::order_list(&orders));
                Turn::go(ConversationState::SelectOrder { orders }, reply)
            }
            Err(e) => {
                tracing::warn!(session = %ctx.key, order = %id, error = %e, "Failed to load order");
                Turn::go(ConversationState::SelectOrder { orders }, prompts::GENERIC_FAILURE)
            }
        }
    }

    async fn on_edit_menu(&self, ctx: &Ctx<'_>, target: EditTarget) -> Turn {
        match ctx.text {
            "1" => Turn::go(
                ConversationState::EditProducts { target },
                prompts::EDIT_PRODUCTS_MENU,
            ),
            "2" => Turn::go(ConversationState::EditDate { target }, prompts::ASK_NEW_DATE),
            "3" => Turn::go(ConversationState::EditAddress { target }, prompts::ASK_NEW_ADDRESS),
            "4" => match self.orders.delete(target.id).await {
                Ok(()) => {
                    tracing::info!(session = %ctx.key, order = %target.id, "Order deleted");
                    Turn::end(prompts::ORDER_DELETED)
                }
                Err(DatabaseError::NotFound { .. }) => Turn::end(prompts::ORDER_GONE),
                Err(e) => {
                    tracing::warn!(session = %ctx.key, order = %target.id, error = %e, "Failed to delete order");
                    Turn::go(ConversationState::EditMenu { target }, prompts::GENERIC_FAILURE)
                }
            },
            _ => Turn::go(
                ConversationState::EditMenu { target },
                prompts::invalid_option(prompts::EDIT_MENU),
            ),
        }
    }

    async fn on_delete_line(&self, ctx: &Ctx<'_>, target: EditTarget) -> Turn {
        let Some(index) = parse_index(ctx.text, target.lines().len()) else {
            return Turn::go(
                ConversationState::SelectLineToDelete { target },
                prompts::INVALID_SELECTION,
            );
        };

        let mut updated = target.order.clone();
        match updated.remove_line(index) {
            Ok(_) => {
                self.commit(ctx, target, updated, "Producto eliminado", |t| {
                    ConversationState::SelectLineToDelete { target: t }
                })
                .await
            }
            Err(OrderError::NoLines) => Turn::go(
                ConversationState::EditProducts { target },
                format!("{}\n\n{}", prompts::KEEP_ONE_LINE, prompts::EDIT_PRODUCTS_MENU),
            ),
            Err(_) => Turn::go(
                ConversationState::SelectLineToDelete { target },
                prompts::INVALID_SELECTION,
            ),
        }
    }

    /// Persist an edited order. On success the session only keeps the id
    /// the order now lives under; on failure `back` rebuilds the state the
    /// user was in.
    async fn commit(
        &self,
        ctx: &Ctx<'_>,
        target: EditTarget,
        updated: Order,
        what: &str,
        back: impl FnOnce(EditTarget) -> ConversationState,
    ) -> Turn {
        match self.orders.update(target.id, &updated).await {
            Ok(id) => {
                tracing::info!(session = %ctx.key, old = %target.id, order = %id, "Order updated");
                Turn::go(ConversationState::ContinueEditing { id }, prompts::edit_saved(what))
            }
            Err(DatabaseError::NotFound { .. }) => {
                tracing::warn!(session = %ctx.key, order = %target.id, "Edited order no longer exists");
                Turn::end(prompts::ORDER_GONE)
            }
            Err(e) => {
                tracing::warn!(session = %ctx.key, order = %target.id, error = %e, "Failed to update order");
                Turn::go(back(target), prompts::EDIT_FAILED)
            }
        }
    }
}

fn on_no_match(ctx: &Ctx<'_>, query: String, target: LineTarget) -> Turn {
    match ctx.text {
        "1" => Turn::go(
            ConversationState::ProductQuery { target },
            prompts::ASK_PRODUCT_AGAIN,
        ),
        "2" => {
            let reply = prompts::ask_quantity(&query);
            Turn::go(
                ConversationState::Quantity {
                    description: query,
                    code: String::new(),
                    target,
                },
                reply,
            )
        }
        _ => Turn::go(
            ConversationState::NoMatch { query, target },
            prompts::invalid_option(prompts::NO_MATCH_MENU),
        ),
    }
}

fn on_add_another(ctx: &Ctx<'_>, draft: &OrderDraft) -> Turn {
    match ctx.text {
        "1" => Turn::go(
            ConversationState::ProductQuery {
                target: LineTarget::Draft,
            },
            prompts::ASK_NEXT_PRODUCT,
        ),
        "2" if draft.is_empty() => Turn::go(
            ConversationState::ProductQuery {
                target: LineTarget::Draft,
            },
            format!("{}\n\n{}", prompts::NO_PRODUCTS, prompts::ASK_PRODUCT),
        ),
        "2" => Turn::go(ConversationState::Date, prompts::ASK_DATE),
        "3" if draft.is_empty() => Turn::go(
            ConversationState::AddAnother,
            format!("{}\n\n{}", prompts::NO_PRODUCTS, prompts::ADD_ANOTHER_MENU),
        ),
        "3" => Turn::go(
            ConversationState::RemoveLine {
                resume: Resume::AddAnother,
            },
            prompts::remove_list(draft.lines()),
        ),
        _ => Turn::go(
            ConversationState::AddAnother,
            prompts::invalid_option(prompts::ADD_ANOTHER_MENU),
        ),
    }
}

/// Zero-based index for a 1-based menu pick in `1..=len`.
fn parse_index(text: &str, len: usize) -> Option<usize> {
    if !is_number(text) {
        return None;
    }
    let n: usize = text.parse().ok()?;
    (1..=len).contains(&n).then(|| n - 1)
}

fn is_number(text: &str) -> bool {
    !text.is_empty() && text.bytes().all(|b| b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, NaiveDate};

    use super::*;
    use crate::conversation::session::ManualClock;
    use crate::matching::AddressEntry;
    use crate::store::{MemoryOrderStore, OrderId};

    const KEY: &str = "test:1";
    const USER: &str = "ana";

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 6, 10)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap()
    }

    fn reference() -> Arc<ReferenceData> {
        Arc::new(ReferenceData::new(
            vec![
                CatalogItem::new("MOB", "Mobil Delvac MX 15W40 Galon", "", ""),
                CatalogItem::new("DELO", "Chevron Delo 400 LE 15W40 Galon", "", "Chevron Delo 400"),
            ],
            vec![AddressEntry::new("ABC Trucking", "123 Main St, Austin, TX")],
        ))
    }

    fn engine() -> (ConversationEngine, Arc<MemoryOrderStore>) {
        let store = Arc::new(MemoryOrderStore::new());
        let sessions = Arc::new(SessionStore::new(
            Arc::new(ManualClock::new(now())),
            Duration::minutes(30),
        ));
        let engine =
            ConversationEngine::new(sessions, store.clone(), reference(), MatchWeights::default());
        (engine, store)
    }

    async fn say(engine: &ConversationEngine, text: &str) -> String {
        engine.handle(KEY, USER, text).await.unwrap().unwrap_or_default()
    }

    async fn state(engine: &ConversationEngine) -> ConversationState {
        let handle = engine.sessions().get(KEY).await.unwrap();
        let session = handle.lock().await;
        session.state.clone()
    }

    #[test]
    fn index_parsing() {
        assert_eq!(parse_index("1", 3), Some(0));
        assert_eq!(parse_index("3", 3), Some(2));
        assert_eq!(parse_index("0", 3), None);
        assert_eq!(parse_index("4", 3), None);
        assert_eq!(parse_index("x", 3), None);
        assert_eq!(parse_index("+1", 3), None);
        assert_eq!(parse_index(" 1", 3), None);
        assert!(is_number("12"));
        assert!(!is_number("+1"));
        assert!(!is_number("12a"));
    }

    #[tokio::test]
    async fn blank_input_is_ignored() {
        let (engine, _) = engine();
        assert_eq!(engine.handle(KEY, USER, "   ").await.unwrap(), None);
        assert!(engine.sessions().is_empty().await);
    }

    #[tokio::test]
    async fn first_message_shows_menu() {
        let (engine, _) = engine();
        assert_eq!(say(&engine, "hola").await, prompts::MAIN_MENU);
        assert_eq!(state(&engine).await, ConversationState::Start);
    }

    #[tokio::test]
    async fn unknown_menu_input_repeats_menu() {
        let (engine, _) = engine();
        say(&engine, "hola").await;
        let reply = say(&engine, "9").await;
        assert!(reply.starts_with("❌ Opción inválida"));
        assert!(reply.ends_with(prompts::MAIN_MENU));
        assert_eq!(state(&engine).await, ConversationState::Start);
    }

    #[tokio::test]
    async fn quantity_rejects_non_digits() {
        let (engine, _) = engine();
        say(&engine, "hola").await;
        say(&engine, "1").await;
        say(&engine, "ABC Trucking").await;
        say(&engine, "mobil 15w40").await;
        say(&engine, "1").await;

        assert_eq!(say(&engine, "12a").await, prompts::INVALID_QUANTITY);
        assert!(matches!(state(&engine).await, ConversationState::Quantity { .. }));

        let handle = engine.sessions().get(KEY).await.unwrap();
        assert!(handle.lock().await.draft.is_empty());
    }

    #[tokio::test]
    async fn failed_save_keeps_draft() {
        let (engine, store) = engine();
        say(&engine, "hola").await;
        say(&engine, "1").await;
        say(&engine, "ABC Trucking").await;
        say(&engine, "mobil").await;
        say(&engine, "1").await;
        say(&engine, "2").await;
        say(&engine, "2").await;
        say(&engine, "06/12").await;
        say(&engine, "2").await;

        store.fail_next_append();
        assert_eq!(say(&engine, "3").await, prompts::SAVE_FAILED);
        assert_eq!(state(&engine).await, ConversationState::Summary);

        assert_eq!(say(&engine, "3").await, prompts::ORDER_SAVED);
        assert!(engine.sessions().get(KEY).await.is_none());
        let saved = store.all().await;
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].1.address, "123 Main St, Austin, TX");
        assert_eq!(saved[0].1.submitted_by, USER);
    }

    #[tokio::test]
    async fn vanished_order_aborts_editing() {
        let (engine, store) = engine();
        {
            let (handle, _) = engine.sessions().get_or_create(KEY).await;
            handle.lock().await.state = ConversationState::ContinueEditing { id: OrderId(99) };
        }
        let err = engine.handle(KEY, USER, "1").await.unwrap_err();
        assert!(matches!(
            err,
            crate::error::Error::Session(SessionError::OrderVanished { id: 99, .. })
        ));
        assert!(engine.sessions().get(KEY).await.is_none());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn reload_swaps_reference_snapshot() {
        let (engine, _) = engine();
        assert_eq!(engine.reference().await.catalog.len(), 2);

        let source = MemoryOrderStore::with_reference_data(
            vec![CatalogItem::new("SAE90", "Valvoline SAE 90 Galon", "", "")],
            vec![],
        );
        engine.reload_reference(&source, &source).await;
        let reference = engine.reference().await;
        assert_eq!(reference.catalog.len(), 1);
        assert!(!reference.fallback);

        // An unreachable source falls back to the built-in catalog.
        source.set_unavailable(true);
        engine.reload_reference(&source, &source).await;
        assert!(engine.reference().await.fallback);
    }
}
