//! End-to-end dialogues against the conversation engine, backed by the
//! in-memory order store and a manual clock.

use std::sync::Arc;

use chrono::{Duration, NaiveDate, NaiveDateTime};

use order_desk::conversation::prompts;
use order_desk::conversation::{ConversationEngine, ConversationState, ManualClock, SessionStore};
use order_desk::matching::{AddressEntry, CatalogItem, MatchWeights};
use order_desk::order::{OrderDraft, Quantity};
use order_desk::store::{MemoryOrderStore, OrderStore, ReferenceData};

const KEY: &str = "telegram:-1001";
const USER: &str = "ana_t";

struct Harness {
    engine: ConversationEngine,
    store: Arc<MemoryOrderStore>,
    clock: Arc<ManualClock>,
}

fn start_time() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2026, 3, 2)
        .unwrap()
        .and_hms_opt(9, 0, 0)
        .unwrap()
}

fn harness() -> Harness {
    let reference = ReferenceData::new(
        vec![
            CatalogItem::new("MOB", "Mobil Delvac MX 15W40 Galon", "", "Mobil Delvac MX"),
            CatalogItem::new("DELO", "Chevron Delo 400 LE 15W40 Galon", "", "Chevron Delo 400"),
        ],
        vec![
            AddressEntry::new("ABC Trucking", "123 Main St, Austin, TX"),
            AddressEntry::new("Transportes XYZ", "456 Oak St, Houston, TX"),
        ],
    );
    let store = Arc::new(MemoryOrderStore::new());
    let clock = Arc::new(ManualClock::new(start_time()));
    let sessions = Arc::new(SessionStore::new(clock.clone(), Duration::minutes(30)));
    let engine = ConversationEngine::new(
        sessions,
        store.clone(),
        Arc::new(reference),
        MatchWeights::default(),
    );
    Harness {
        engine,
        store,
        clock,
    }
}

impl Harness {
    async fn say(&self, text: &str) -> String {
        self.engine
            .handle(KEY, USER, text)
            .await
            .unwrap()
            .unwrap_or_default()
    }

    async fn state(&self) -> Option<ConversationState> {
        let handle = self.engine.sessions().get(KEY).await?;
        let session = handle.lock().await;
        Some(session.state.clone())
    }

    async fn draft(&self) -> OrderDraft {
        let handle = self.engine.sessions().get(KEY).await.unwrap();
        let session = handle.lock().await;
        session.draft.clone()
    }

    /// Walk the step-by-step flow up to the quantity prompt for "delo".
    async fn to_quantity(&self) {
        assert_eq!(self.say("hola").await, prompts::MAIN_MENU);
        assert_eq!(self.say("1").await, prompts::ASK_CUSTOMER);
        assert_eq!(self.say("ABC Trucking").await, prompts::ASK_PRODUCT);
        let options = self.say("delo").await;
        assert!(options.contains("Chevron Delo 400"), "{options}");
        let ask = self.say("1").await;
        assert!(ask.contains("Chevron Delo 400 LE 15W40 Galon"), "{ask}");
    }

    /// Save a one-line order through the step-by-step flow.
    async fn place_order(&self) {
        self.to_quantity().await;
        assert_eq!(self.say("6").await, prompts::ADD_ANOTHER_MENU);
        assert_eq!(self.say("2").await, prompts::ASK_DATE);
        assert_eq!(self.say("03/15").await, prompts::NOTE_MENU);
        self.say("2").await;
        assert_eq!(self.say("3").await, prompts::ORDER_SAVED);
    }
}

impl Harness {
    /// From the main menu, open the user's first stored order for editing.
    async fn open_stored_order(&self) {
        assert_eq!(self.say("hola").await, prompts::MAIN_MENU);
        self.say("2").await;
        let details = self.say("1").await;
        assert!(details.ends_with(prompts::EDIT_MENU), "{details}");
    }

    /// Pick the listed candidate with catalog `code` from a selection state.
    async fn pick(&self, code: &str) -> String {
        let Some(ConversationState::Selecting { candidates, .. }) = self.state().await else {
            panic!("not selecting a product");
        };
        let position = candidates
            .iter()
            .position(|c| c.item.code == code)
            .unwrap_or_else(|| panic!("{code} not among the candidates"));
        self.say(&(position + 1).to_string()).await
    }
}

fn dispatch_day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, 15).unwrap()
}

fn qty(n: u32) -> Quantity {
    Quantity::new(n).unwrap()
}

#[tokio::test]
async fn step_by_step_order_is_saved() {
    let h = harness();
    h.to_quantity().await;

    // Non-numeric quantity keeps the state.
    assert_eq!(h.say("12a").await, prompts::INVALID_QUANTITY);
    assert!(matches!(h.state().await, Some(ConversationState::Quantity { .. })));
    assert!(h.draft().await.is_empty());

    assert_eq!(h.say("12").await, prompts::ADD_ANOTHER_MENU);
    assert_eq!(h.say("2").await, prompts::ASK_DATE);
    assert_eq!(h.say("15/03").await, prompts::INVALID_DATE);
    assert_eq!(h.say("03/15").await, prompts::NOTE_MENU);
    assert_eq!(h.say("1").await, prompts::ASK_NOTE);

    let summary = h.say("Entregar antes de las 10").await;
    assert!(summary.contains("ABC Trucking"), "{summary}");
    assert!(summary.contains("123 Main St, Austin, TX"), "{summary}");
    assert!(summary.contains("Entregar antes de las 10"), "{summary}");
    assert!(summary.ends_with(prompts::ORDER_MENU), "{summary}");

    assert_eq!(h.say("3").await, prompts::ORDER_SAVED);
    assert!(h.state().await.is_none(), "session ends after saving");

    let orders = h.store.all().await;
    assert_eq!(orders.len(), 1);
    let order = &orders[0].1;
    assert_eq!(order.customer, "ABC Trucking");
    assert_eq!(order.lines.len(), 1);
    assert_eq!(order.lines[0].code, "DELO");
    assert_eq!(order.lines[0].quantity, qty(12));
    assert_eq!(order.dispatch_date, NaiveDate::from_ymd_opt(2026, 3, 15).unwrap());
    assert_eq!(order.note.as_deref(), Some("Entregar antes de las 10"));
    assert_eq!(order.address, "123 Main St, Austin, TX");
    assert_eq!(order.submitted_by, USER);
    assert_eq!(order.created_at, start_time());
}

#[tokio::test]
async fn reset_token_returns_to_menu_from_any_state() {
    let h = harness();
    h.to_quantity().await;
    h.say("3").await;
    assert!(!h.draft().await.is_empty());

    assert_eq!(h.say("000").await, prompts::reset());
    assert_eq!(h.state().await, Some(ConversationState::Start));
    assert_eq!(h.draft().await, OrderDraft::default());

    // The menu works again right away.
    assert_eq!(h.say("1").await, prompts::ASK_CUSTOMER);
}

#[tokio::test]
async fn reset_token_from_selection_quantity_quick_and_edit_states() {
    for setup in ["selecting", "quantity", "quick_selecting", "edit_menu"] {
        let h = harness();
        match setup {
            "selecting" => {
                h.say("hola").await;
                h.say("1").await;
                h.say("ABC Trucking").await;
                h.say("delo").await;
                assert!(matches!(h.state().await, Some(ConversationState::Selecting { .. })));
            }
            "quantity" => {
                h.to_quantity().await;
                assert!(matches!(h.state().await, Some(ConversationState::Quantity { .. })));
            }
            "quick_selecting" => {
                h.say("hola").await;
                h.say("3").await;
                h.say("ABC Trucking\n* delo 4").await;
                assert!(matches!(
                    h.state().await,
                    Some(ConversationState::QuickSelecting { .. })
                ));
            }
            _ => {
                h.place_order().await;
                h.open_stored_order().await;
                assert!(matches!(h.state().await, Some(ConversationState::EditMenu { .. })));
            }
        }

        assert_eq!(h.say("000").await, prompts::reset(), "reset from {setup}");
        assert_eq!(h.state().await, Some(ConversationState::Start), "{setup}");
        assert_eq!(h.draft().await, OrderDraft::default(), "{setup}");
        assert_eq!(h.say("1").await, prompts::ASK_CUSTOMER, "{setup}");
    }
}

#[tokio::test]
async fn typed_text_during_selection_searches_again() {
    let h = harness();
    h.say("hola").await;
    h.say("1").await;
    h.say("ABC Trucking").await;

    let first = h.say("delo").await;
    assert!(first.contains("Chevron Delo 400"), "{first}");

    let second = h.say("mobil delvac").await;
    assert!(second.contains("Mobil Delvac MX"), "{second}");
    let Some(ConversationState::Selecting { candidates, .. }) = h.state().await else {
        panic!("a new search stays in selection");
    };
    assert!(candidates.iter().any(|c| c.item.code == "MOB"));

    let ask = h.pick("MOB").await;
    assert_eq!(ask, prompts::ask_quantity("Mobil Delvac MX 15W40 Galon"));
    assert_eq!(h.say("2").await, prompts::ADD_ANOTHER_MENU);
    assert_eq!(h.draft().await.lines()[0].code, "MOB");
}

#[tokio::test]
async fn unmatched_product_can_be_typed_by_hand() {
    let h = harness();
    h.say("hola").await;
    h.say("1").await;
    h.say("Transportes XYZ").await;

    assert_eq!(h.say("zzqq").await, prompts::NO_MATCH_MENU);
    assert_eq!(h.say("2").await, prompts::ask_quantity("zzqq"));
    assert_eq!(h.say("3").await, prompts::ADD_ANOTHER_MENU);

    let draft = h.draft().await;
    assert_eq!(draft.len(), 1);
    assert_eq!(draft.lines()[0].description, "zzqq");
    assert!(draft.lines()[0].is_unmatched());
}

#[tokio::test]
async fn manual_address_overrides_directory() {
    let h = harness();
    h.to_quantity().await;
    h.say("1").await;
    h.say("2").await;
    h.say("03/20").await;
    h.say("2").await;

    assert_eq!(h.say("direccion").await, prompts::ASK_MANUAL_ADDRESS);
    let summary = h.say("9 Elm St, Waco, TX").await;
    assert!(summary.contains("9 Elm St, Waco, TX"), "{summary}");

    assert_eq!(h.say("3").await, prompts::ORDER_SAVED);
    let orders = h.store.all().await;
    assert_eq!(orders[0].1.address, "9 Elm St, Waco, TX");
    assert_eq!(orders[0].1.manual_address.as_deref(), Some("9 Elm St, Waco, TX"));
}

#[tokio::test]
async fn failed_save_keeps_the_draft_for_retry() {
    let h = harness();
    h.to_quantity().await;
    h.say("2").await;
    h.say("2").await;
    h.say("04/01").await;
    h.say("2").await;

    h.store.fail_next_append();
    assert_eq!(h.say("3").await, prompts::SAVE_FAILED);
    assert_eq!(h.state().await, Some(ConversationState::Summary));
    assert_eq!(h.draft().await.len(), 1);
    assert!(h.store.is_empty().await);

    assert_eq!(h.say("3").await, prompts::ORDER_SAVED);
    assert_eq!(h.store.len().await, 1);
}

#[tokio::test]
async fn quick_order_block() {
    let h = harness();
    h.say("hola").await;
    assert_eq!(h.say("3").await, prompts::QUICK_FORMAT);

    assert_eq!(h.say("ABC Trucking").await, prompts::QUICK_TOO_SHORT);
    assert_eq!(h.say("ABC Trucking\n* delo 0").await, prompts::QUICK_BAD_QUANTITY);

    let block = "ABC Trucking\n\
                 * delo 4\n\
                 * zzqq 2\n\
                 * mobil delvac 5\n\
                 55 Elm St, Waco, TX";
    let first = h.say(block).await;
    assert!(first.contains("\"delo\""), "{first}");
    assert!(matches!(
        h.state().await,
        Some(ConversationState::QuickSelecting { .. })
    ));

    // Out-of-range pick is rejected without losing the item.
    assert_eq!(h.say("9").await, prompts::INVALID_SELECTION);

    let second = h.say("1").await;
    assert!(second.contains("\"mobil delvac\""), "{second}");

    let summary = h.say("1").await;
    assert_eq!(h.state().await, Some(ConversationState::QuickConfirm));
    assert!(summary.contains("⚠️"), "{summary}");
    assert!(summary.contains("zzqq"), "{summary}");
    assert!(summary.contains("55 Elm St, Waco, TX"), "{summary}");

    let draft = h.draft().await;
    let described: Vec<(&str, u32, &str)> = draft
        .lines()
        .iter()
        .map(|l| (l.description.as_str(), l.quantity.get(), l.code.as_str()))
        .collect();
    assert_eq!(
        described,
        vec![
            ("Chevron Delo 400 LE 15W40 Galon", 4, "DELO"),
            ("zzqq", 2, ""),
            ("Mobil Delvac MX 15W40 Galon", 5, "MOB"),
        ]
    );

    // Drop the unmatched line, then save.
    assert_eq!(h.say("2").await, prompts::remove_list(draft.lines()));
    let after_remove = h.say("2").await;
    assert!(after_remove.starts_with("🗑 Producto eliminado: zzqq"), "{after_remove}");
    assert_eq!(h.say("3").await, prompts::ORDER_SAVED);

    let orders = h.store.all().await;
    let order = &orders[0].1;
    assert_eq!(order.lines.len(), 2);
    assert_eq!(order.dispatch_date, start_time().date());
    assert_eq!(order.address, "55 Elm St, Waco, TX");
}

#[tokio::test]
async fn edit_flow_follows_the_order_to_its_new_id() {
    let h = harness();
    h.place_order().await;
    let first_id = h.store.all().await[0].0;

    assert_eq!(h.say("hola").await, prompts::MAIN_MENU);
    let list = h.say("2").await;
    assert!(list.contains("ABC Trucking"), "{list}");

    let details = h.say("1").await;
    assert!(details.ends_with(prompts::EDIT_MENU), "{details}");
    assert_eq!(h.say("1").await, prompts::EDIT_PRODUCTS_MENU);
    h.say("2").await;
    assert_eq!(h.say("1").await, prompts::ASK_NEW_QUANTITY);
    assert_eq!(h.say("x").await, prompts::INVALID_QUANTITY);
    assert_eq!(
        h.say("7").await,
        prompts::edit_saved("Cambios guardados exitosamente")
    );

    let stored = h.store.all().await;
    assert_eq!(stored.len(), 1);
    let new_id = stored[0].0;
    assert_ne!(new_id, first_id, "memory store updates by delete + append");
    assert_eq!(stored[0].1.lines[0].quantity, qty(7));
    assert_eq!(
        h.state().await,
        Some(ConversationState::ContinueEditing { id: new_id })
    );

    // Keep editing: the reloaded order is the updated one.
    let details = h.say("1").await;
    assert!(details.contains('7'), "{details}");
    assert_eq!(h.say("2").await, prompts::ASK_NEW_DATE);
    assert_eq!(h.say("04/02").await, prompts::edit_saved("Fecha actualizada"));
    assert_eq!(
        h.store.all().await[0].1.dispatch_date,
        NaiveDate::from_ymd_opt(2026, 4, 2).unwrap()
    );

    assert_eq!(h.say("2").await, prompts::EDITS_DONE);
    assert!(h.state().await.is_none());
}

#[tokio::test]
async fn saved_order_gets_a_route_stop() {
    let h = harness();
    h.place_order().await;
    let id = h.store.all().await[0].0;

    let sheet = h.store.route_sheet(dispatch_day()).await.unwrap();
    assert_eq!(sheet.len(), 1);
    let (stop_id, stop) = &sheet[0];
    assert_eq!(*stop_id, id);
    assert_eq!(stop.customer, "ABC Trucking");
    assert_eq!(stop.address, "123 Main St, Austin, TX");
    assert_eq!(stop.notes, "Chevron Delo 400 LE 15W40 Galon (6)");
    assert_eq!(stop.seller, USER);
}

#[tokio::test]
async fn product_added_to_a_stored_order() {
    let h = harness();
    h.place_order().await;
    h.open_stored_order().await;

    assert_eq!(h.say("1").await, prompts::EDIT_PRODUCTS_MENU);
    assert_eq!(h.say("1").await, prompts::ASK_NEW_PRODUCT);
    let options = h.say("mobil").await;
    assert!(options.contains("Mobil Delvac MX"), "{options}");
    assert_eq!(
        h.pick("MOB").await,
        prompts::ask_quantity("Mobil Delvac MX 15W40 Galon")
    );
    assert_eq!(h.say("cero").await, prompts::INVALID_QUANTITY);
    assert_eq!(h.say("2").await, prompts::edit_saved("Producto agregado"));

    let stored = h.store.all().await;
    assert_eq!(stored.len(), 1);
    let (id, order) = &stored[0];
    assert_eq!(
        h.state().await,
        Some(ConversationState::ContinueEditing { id: *id })
    );
    let reloaded = h.store.load(*id).await.unwrap().unwrap();
    assert_eq!(&reloaded, order);
    let lines: Vec<(&str, u32)> = reloaded
        .lines
        .iter()
        .map(|l| (l.code.as_str(), l.quantity.get()))
        .collect();
    assert_eq!(lines, vec![("DELO", 6), ("MOB", 2)]);

    let sheet = h.store.route_sheet(dispatch_day()).await.unwrap();
    assert_eq!(sheet.len(), 1);
    assert_eq!(sheet[0].0, *id);
    assert_eq!(
        sheet[0].1.notes,
        "Chevron Delo 400 LE 15W40 Galon (6), Mobil Delvac MX 15W40 Galon (2)"
    );
}

#[tokio::test]
async fn address_of_a_stored_order_is_changed() {
    let h = harness();
    h.place_order().await;
    h.open_stored_order().await;

    assert_eq!(h.say("3").await, prompts::ASK_NEW_ADDRESS);
    assert_eq!(
        h.say("9 Elm St, Waco, TX").await,
        prompts::edit_saved("Dirección actualizada")
    );

    let stored = h.store.all().await;
    assert_eq!(stored.len(), 1);
    let id = stored[0].0;
    let reloaded = h.store.load(id).await.unwrap().unwrap();
    assert_eq!(reloaded.address, "9 Elm St, Waco, TX");
    assert_eq!(reloaded.manual_address.as_deref(), Some("9 Elm St, Waco, TX"));
    assert_eq!(reloaded.lines.len(), 1);

    let sheet = h.store.route_sheet(dispatch_day()).await.unwrap();
    assert_eq!(sheet.len(), 1, "the old stop is gone");
    assert_eq!(sheet[0].0, id);
    assert_eq!(sheet[0].1.address, "9 Elm St, Waco, TX");

    assert_eq!(h.say("2").await, prompts::EDITS_DONE);
}

#[tokio::test]
async fn stored_order_keeps_its_last_line() {
    let h = harness();
    h.place_order().await;

    h.say("hola").await;
    h.say("2").await;
    h.say("1").await;
    h.say("1").await;
    h.say("3").await;
    let reply = h.say("1").await;
    assert!(reply.starts_with(prompts::KEEP_ONE_LINE), "{reply}");
    assert!(matches!(
        h.state().await,
        Some(ConversationState::EditProducts { .. })
    ));
    assert_eq!(h.store.all().await[0].1.lines.len(), 1);
}

#[tokio::test]
async fn deleting_a_stored_order() {
    let h = harness();
    h.place_order().await;

    h.say("hola").await;
    h.say("2").await;
    h.say("1").await;
    assert_eq!(h.say("4").await, prompts::ORDER_DELETED);
    assert!(h.store.is_empty().await);

    h.say("hola").await;
    assert_eq!(h.say("2").await, prompts::NO_ORDERS);
}

#[tokio::test]
async fn idle_sessions_are_swept() {
    let h = harness();
    h.say("hola").await;
    h.say("1").await;

    h.clock.advance(Duration::minutes(29));
    assert_eq!(h.engine.sessions().sweep().await, 0);
    assert_eq!(h.state().await, Some(ConversationState::CustomerName));

    // Activity refreshes the idle window.
    h.say("ABC Trucking").await;
    h.clock.advance(Duration::minutes(29));
    assert_eq!(h.engine.sessions().sweep().await, 0);

    h.clock.advance(Duration::minutes(1));
    assert_eq!(h.engine.sessions().sweep().await, 1);
    assert!(h.state().await.is_none());

    // A message after eviction starts over at the main menu.
    assert_eq!(h.say("delo").await, prompts::MAIN_MENU);
}

#[tokio::test]
async fn sessions_are_independent() {
    let h = harness();
    h.say("hola").await;
    h.say("1").await;

    let other = "telegram:-2002";
    assert_eq!(
        h.engine.handle(other, "luis", "hola").await.unwrap().unwrap(),
        prompts::MAIN_MENU
    );
    assert_eq!(h.state().await, Some(ConversationState::CustomerName));
    assert_eq!(h.engine.sessions().len().await, 2);
}
