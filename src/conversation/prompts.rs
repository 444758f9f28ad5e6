//! User-facing text. Menus are numbered with keycap emoji; the digits a
//! user types are the ones shown.

use crate::matching::{CatalogItem, MatchCandidate};
use crate::order::{Order, OrderDraft, OrderLine, format_date};
use crate::store::OrderSummary;

pub const MAIN_MENU: &str = "👋 ¿Qué deseas hacer?\n\
    1️⃣ Hacer un nuevo pedido (paso a paso)\n\
    2️⃣ Modificar un pedido viejo\n\
    3️⃣ Nuevo pedido rápido";

pub const ASK_CUSTOMER: &str = "📝 ¿Cuál es el nombre del cliente?";
pub const ASK_PRODUCT: &str = "📦 Escribe el nombre del producto:";
pub const ASK_PRODUCT_AGAIN: &str = "📦 Escribe el nombre del producto otra vez:";
pub const ASK_NEXT_PRODUCT: &str = "📦 Escribe el nombre del próximo producto:";
pub const ASK_NEW_PRODUCT: &str = "📦 Escribe el nombre del nuevo producto:";

pub const NO_MATCH_MENU: &str = "❌ No se encontró ninguna coincidencia.\n\
    ¿Qué deseas hacer?\n\
    1️⃣ Buscar otra vez\n\
    2️⃣ Escribir producto manual";

pub const INVALID_QUANTITY: &str = "❌ Por favor ingresa una cantidad válida (solo números).";
pub const INVALID_SELECTION: &str = "❌ Selección inválida";
pub const INVALID_LINE: &str = "❌ Número de producto inválido.";
pub const INVALID_DATE: &str = "❌ Fecha inválida. Usa el formato MM/DD.";

pub const ADD_ANOTHER_MENU: &str = "¿Qué deseas hacer ahora?\n\
    1️⃣ Añadir otro producto\n\
    2️⃣ Finalizar productos\n\
    3️⃣ Eliminar producto";

pub const NO_PRODUCTS: &str = "⚠️ No hay productos en el pedido. Añade al menos uno.";
pub const ASK_DATE: &str = "🗓 ¿Cuál es la fecha de despacho? (MM/DD)";
pub const NOTE_MENU: &str = "🗒 ¿Quieres hacer una nota?\n1️⃣ Sí\n2️⃣ No";
pub const ASK_NOTE: &str = "✍️ Escribe tu nota:";

pub const ORDER_MENU: &str = "¿Deseas?\n\
    0️⃣ Cancelar pedido\n\
    1️⃣ Añadir otro producto\n\
    2️⃣ Eliminar un producto\n\
    3️⃣ Finalizar pedido\n\
    4️⃣ Modificar dirección";

pub const ASK_MANUAL_ADDRESS: &str = "📍 Escribe la dirección manual para este pedido:";
pub const ASK_QUICK_ADDRESS: &str = "📍 Escribe la nueva dirección:";

pub const ORDER_SAVED: &str =
    "✅ Pedido guardado con éxito. Puedes iniciar otro pedido enviando un nuevo mensaje.";
pub const ORDER_CANCELLED: &str = "❌ Pedido cancelado. Puedes iniciar uno nuevo cuando quieras.";
pub const SAVE_FAILED: &str =
    "❌ No se pudo guardar el pedido. Tu pedido sigue abierto, intenta finalizarlo de nuevo.";
pub const GENERIC_FAILURE: &str = "❌ Ocurrió un error. Por favor, intenta nuevamente.";

pub const QUICK_FORMAT: &str = "📝 Envía el pedido completo en este formato:\n\n\
    Nombre del Cliente\n\
    * Producto1 cantidad\n\
    * Producto2 cantidad\n\
    * Producto3 cantidad\n\
    Dirección (opcional)\n\n\
    Ejemplo:\n\
    A&W Truck Service\n\
    * Paleta de Mistyk 1\n\
    * Delo 4\n\
    * Rotella T4 8\n\
    5401 Bernal Dr, Dallas, TX 75212";
pub const QUICK_TOO_SHORT: &str =
    "❌ Formato inválido. Necesito al menos el nombre del cliente y un producto.";
pub const QUICK_NO_ITEMS: &str = "❌ No se encontraron productos válidos en el formato correcto.";
pub const QUICK_BAD_QUANTITY: &str =
    "❌ Hay una cantidad inválida en el pedido. Usa números mayores que cero.";
pub const RESEARCH_EMPTY: &str = "❌ No se encontró ninguna coincidencia para esa búsqueda. \
    Elige un número de la lista o prueba otra búsqueda.";

pub const NO_ORDERS: &str = "❌ No tienes pedidos anteriores para modificar.";
pub const ORDER_GONE: &str = "❌ El pedido ya no existe";
pub const EDIT_MENU: &str = "¿Qué deseas modificar?\n\
    1️⃣ Modificar productos\n\
    2️⃣ Modificar fecha\n\
    3️⃣ Modificar dirección\n\
    4️⃣ Eliminar pedido";
pub const EDIT_PRODUCTS_MENU: &str = "¿Qué operación deseas realizar?\n\
    1️⃣ Agregar producto\n\
    2️⃣ Modificar cantidad\n\
    3️⃣ Eliminar producto";
pub const ASK_NEW_QUANTITY: &str = "Ingresa la nueva cantidad:";
pub const ASK_NEW_DATE: &str = "🗓 Ingresa la nueva fecha de despacho (MM/DD):";
pub const ASK_NEW_ADDRESS: &str = "📍 Ingresa la nueva dirección:";
pub const CONTINUE_MENU: &str = "1️⃣ Seguir editando\n2️⃣ Terminar";
pub const KEEP_ONE_LINE: &str =
    "❌ El pedido debe conservar al menos un producto. Usa 4️⃣ Eliminar pedido para borrarlo.";
pub const EDIT_FAILED: &str = "❌ Error al guardar los cambios. Intenta nuevamente.";
pub const ORDER_DELETED: &str = "✅ Pedido eliminado correctamente";
pub const EDITS_DONE: &str = "✅ Modificaciones finalizadas";

pub fn reset() -> String {
    format!("🔄 Bot reiniciado.\n\n{MAIN_MENU}")
}

/// Rejection for input a menu state has no branch for; repeats the menu.
pub fn invalid_option(menu: &str) -> String {
    format!("❌ Opción inválida. Elige una de estas opciones:\n\n{menu}")
}

pub fn candidates(list: &[MatchCandidate<CatalogItem>]) -> String {
    format!(
        "🔍 Opciones encontradas:\n{}\n\n\
         Selecciona un producto escribiendo su número o escribe una nueva búsqueda \
         si no encuentras lo que buscas.",
        numbered_memos(list)
    )
}

pub fn quick_candidates(query: &str, list: &[MatchCandidate<CatalogItem>]) -> String {
    format!(
        "🔍 Opciones encontradas para \"{query}\":\n{}\n\n\
         Selecciona el número del producto correcto o escribe una nueva búsqueda.",
        numbered_memos(list)
    )
}

fn numbered_memos(list: &[MatchCandidate<CatalogItem>]) -> String {
    list.iter()
        .enumerate()
        .map(|(i, c)| format!("{}. {}", i + 1, c.item.memo))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn ask_quantity(description: &str) -> String {
    format!("📦 Escribe la cantidad para *{description}*:")
}

pub fn address_changed(address: &str, next: &str) -> String {
    format!("📍 Nueva dirección: {address}\n\n{next}")
}

pub fn remove_list(lines: &[OrderLine]) -> String {
    format!("🗑 ¿Cuál producto deseas eliminar?\n{}", numbered_lines(lines))
}

pub fn removed(description: &str, next_menu: &str) -> String {
    format!("🗑 Producto eliminado: {description}\n\n{next_menu}")
}

fn numbered_lines(lines: &[OrderLine]) -> String {
    lines
        .iter()
        .enumerate()
        .map(|(i, l)| format!("{}. {l}", i + 1))
        .collect::<Vec<_>>()
        .join("\n")
}

fn bullet_lines(lines: &[OrderLine]) -> String {
    lines
        .iter()
        .map(|l| format!("• {l}"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn address_label(address: &str) -> &str {
    if address.trim().is_empty() {
        "(sin dirección)"
    } else {
        address
    }
}

/// Review screen of the step-by-step flow.
pub fn summary(draft: &OrderDraft, address: &str) -> String {
    let mut out = format!(
        "📄 *Pedido para: {}*\n\n{}\n\n📍 Dirección: {}",
        draft.customer,
        bullet_lines(draft.lines()),
        address_label(address)
    );
    if let Some(date) = draft.dispatch_date {
        out.push_str(&format!("\n🗓 Fecha: {}", format_date(date)));
    }
    if let Some(note) = draft.note.as_deref().filter(|n| !n.trim().is_empty()) {
        out.push_str(&format!("\n🗒 Nota: {note}"));
    }
    out.push_str("\n\n");
    out.push_str(ORDER_MENU);
    out
}

/// Review screen of the quick flow. Lines typed by hand are listed in a
/// warning so the user can fix them before saving.
pub fn quick_summary(draft: &OrderDraft, address: &str) -> String {
    let mut out = format!(
        "📄 *Resumen del pedido:*\n\n📦 *Cliente: {}*\n\n{}\n\n📍 Dirección: {}",
        draft.customer,
        bullet_lines(draft.lines()),
        address_label(address)
    );

    let unmatched: Vec<&OrderLine> = draft.lines().iter().filter(|l| l.is_unmatched()).collect();
    if !unmatched.is_empty() {
        out.push_str(
            "\n\n⚠️ Los siguientes productos no se encontraron exactamente en el catálogo:\n",
        );
        for line in unmatched {
            out.push_str(&format!("• {}\n", line.description));
        }
        out.push_str("Se guardarán con el nombre proporcionado.");
    }

    out.push_str("\n\n");
    out.push_str(ORDER_MENU);
    out
}

pub fn order_list(orders: &[OrderSummary]) -> String {
    let list = orders
        .iter()
        .enumerate()
        .map(|(i, o)| format!("{}. {} - {}", i + 1, o.customer, format_date(o.dispatch_date)))
        .collect::<Vec<_>>()
        .join("\n");
    format!("📋 Tus pedidos:\n{list}\n\nSelecciona el número del pedido a modificar:")
}

/// Loaded order followed by the edit menu.
pub fn order_details(order: &Order) -> String {
    format!(
        "📄 *Pedido seleccionado:*\n\n\
         *Cliente:* {}\n\
         *Fecha:* {}\n\
         *Productos:*\n{}\n\n\
         📍 *Dirección:* {}\n\n{EDIT_MENU}",
        order.customer,
        order.dispatch_label(),
        bullet_lines(&order.lines),
        address_label(&order.address)
    )
}

pub fn pick_line_to_modify(lines: &[OrderLine]) -> String {
    format!("Selecciona el producto a modificar:\n{}", numbered_lines(lines))
}

pub fn pick_line_to_delete(lines: &[OrderLine]) -> String {
    let list = lines
        .iter()
        .enumerate()
        .map(|(i, l)| format!("{}. {}", i + 1, l.description))
        .collect::<Vec<_>>()
        .join("\n");
    format!("Selecciona el producto a eliminar:\n{list}")
}

pub fn edit_saved(what: &str) -> String {
    format!("✅ {what}\n{CONTINUE_MENU}")
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::order::Quantity;

    fn draft() -> OrderDraft {
        let mut d = OrderDraft::new("ana");
        d.customer = "ABC Trucking".into();
        d.add_line("Delo 400", Quantity::new(3).unwrap(), "DELO400");
        d.add_line("Cosa rara", Quantity::new(1).unwrap(), "");
        d
    }

    #[test]
    fn summary_lists_lines_address_and_menu() {
        let mut d = draft();
        d.dispatch_date = NaiveDate::from_ymd_opt(2025, 7, 4);
        let text = summary(&d, "123 Main St");
        assert!(text.contains("• Delo 400 (3)"));
        assert!(text.contains("📍 Dirección: 123 Main St"));
        assert!(text.contains("🗓 Fecha: 07/04/2025"));
        assert!(text.ends_with(ORDER_MENU));
    }

    #[test]
    fn quick_summary_warns_about_unmatched_lines() {
        let text = quick_summary(&draft(), "");
        assert!(text.contains("⚠️"));
        assert!(text.contains("• Cosa rara\n"));
        assert!(!text.contains("• Delo 400\n"));
        assert!(text.contains("(sin dirección)"));
    }

    #[test]
    fn invalid_option_repeats_menu() {
        assert!(invalid_option(MAIN_MENU).ends_with(MAIN_MENU));
    }
}
