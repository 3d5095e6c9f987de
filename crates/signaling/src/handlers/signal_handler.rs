//! Signal-Handler – WebRTC-Signaling und Mikrofon-Status
//!
//! Signaling-Payloads (SDP, ICE-Kandidaten) werden nicht inspiziert, nur
//! an die adressierte Verbindung im selben Raum weitergereicht.

use std::sync::Arc;

use proxvoice_protocol::events::{MikrofonDaten, MikrofonStatus, SignalDaten, SignalWeiterleitung};
use proxvoice_protocol::AusgehendesEreignis;

use crate::error::{SignalingError, SignalingResult};
use crate::handlers::eigener_raum;
use crate::kontext::VerbindungsKontext;
use crate::server_state::RelayState;

/// Verarbeitet `signal`
pub fn handle_signal(
    daten: SignalDaten,
    ctx: &VerbindungsKontext,
    state: &Arc<RelayState>,
) -> SignalingResult<()> {
    let (_, raum) = eigener_raum(state, ctx)?;

    let client = {
        let r = raum.lock();
        if !r.ist_mitglied(&daten.to) {
            return Err(SignalingError::zugriff_verweigert(format!(
                "Ziel {} ist nicht im selben Raum",
                daten.to
            )));
        }
        r.clients
            .get(&ctx.id)
            .cloned()
            .ok_or(SignalingError::NichtImRaum)?
    };

    state.broadcaster.an_verbindung_senden(
        &daten.to,
        AusgehendesEreignis::Signal(SignalWeiterleitung {
            from: ctx.id,
            data: daten.data,
            client,
        }),
    );
    Ok(())
}

/// Verarbeitet `microphone-state`
pub fn handle_microphone_state(
    daten: MikrofonDaten,
    ctx: &VerbindungsKontext,
    state: &Arc<RelayState>,
) -> SignalingResult<()> {
    let (_, raum) = eigener_raum(state, ctx)?;

    let andere = {
        let mut r = raum.lock();
        let record = r
            .clients
            .get_mut(&ctx.id)
            .ok_or(SignalingError::NichtImRaum)?;
        record.is_muted = daten.is_muted;
        r.andere_mitglieder(&ctx.id)
    };

    tracing::trace!(verbindung = %ctx.id, stumm = daten.is_muted, "Mikrofon-Status");
    state.broadcaster.an_verbindungen_senden(
        &andere,
        &AusgehendesEreignis::MicrophoneState(MikrofonStatus {
            socket_id: ctx.id,
            is_muted: daten.is_muted,
        }),
    );
    Ok(())
}
