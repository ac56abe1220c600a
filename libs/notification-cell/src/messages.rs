// libs/notification-cell/src/messages.rs
//! Message bodies as the clinic's patients receive them.

use chrono::NaiveDateTime;

use crate::models::{NotificationKind, NotificationPayload};

fn human(ts: NaiveDateTime) -> String {
    ts.format("%d/%m/%Y %H:%M").to_string()
}

pub fn render(kind: NotificationKind, payload: &NotificationPayload) -> String {
    let when = human(payload.slot_start);
    match kind {
        NotificationKind::Confirmation => format!(
            "✅ *Cita reservada*\nFecha y hora: {}\nEscribe *confirmar* para confirmar o *cambiar* para ver otras opciones.",
            when
        ),
        NotificationKind::Reminder => format!(
            "⏰ Recordatorio (24h)\nTu cita es: {}\nSi necesitas, escribe *cambiar* para reprogramar o *confirmar* para confirmar.",
            when
        ),
        NotificationKind::WaitlistOffer => {
            let until = payload
                .hold_until
                .map(|t| format!("\nTe lo apartamos hasta las {}.", t.format("%H:%M")))
                .unwrap_or_default();
            format!(
                "🔔 *Se liberó un espacio*\nFecha y hora: {}{}\nEscribe *reservar* para tomarlo.",
                when, until
            )
        }
    }
}

/// Single-line form for logs.
pub fn flatten(body: &str) -> String {
    body.replace('\n', " | ")
}
