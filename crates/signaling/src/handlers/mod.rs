//! Handler fuer alle Relay-Ereignisse
//!
//! Jeder Handler ist fuer eine Ereignisgruppe zustaendig und hat Zugriff
//! auf den gemeinsamen RelayState. Fehler werden vom Dispatcher geloggt
//! und verworfen; sichtbare Ablehnungen senden die Handler selbst.

pub mod admin_handler;
pub mod join_handler;
pub mod server_link_handler;
pub mod signal_handler;

use std::sync::Arc;

use proxvoice_core::RaumCode;

use crate::error::{SignalingError, SignalingResult};
use crate::kontext::VerbindungsKontext;
use crate::registry::RaumHandle;
use crate::server_state::RelayState;

/// Raum dem die Verbindung beigetreten ist
pub(crate) fn eigener_raum(
    state: &Arc<RelayState>,
    ctx: &VerbindungsKontext,
) -> SignalingResult<(RaumCode, RaumHandle)> {
    let code = ctx.raum.clone().ok_or(SignalingError::NichtImRaum)?;
    let raum = state
        .registry
        .finden(&code)
        .ok_or_else(|| SignalingError::RaumNichtGefunden(code.clone()))?;
    Ok((code, raum))
}
