//! Event-Broadcaster – Sendet Ereignisse an verbundene Clients
//!
//! Jede Verbindung hat zwei Send-Queues:
//! - **zuverlaessig** (unbegrenzt): Join/Leave, Signal, Config, Map,
//!   Exceptions und das Trenn-Signal. Verlust wuerde den Protokollzustand
//!   der Clients verfaelschen.
//! - **fluechtig** (begrenzt, `try_send`): Positionen und Tuer-Rotationen.
//!   Bei Rueckstau wird verworfen, der naechste Tick ersetzt die Daten.
//!
//! Das Trenn-Signal reist durch die zuverlaessige Queue, dadurch erreicht
//! eine vorher eingereihte Exception den Client garantiert vor dem Close.

use dashmap::DashMap;
use proxvoice_core::VerbindungsId;
use proxvoice_protocol::AusgehendesEreignis;
use std::sync::Arc;
use tokio::sync::mpsc;

// ---------------------------------------------------------------------------
// Konfiguration
// ---------------------------------------------------------------------------

/// Standardgroesse der fluechtigen Queue pro Client
pub const FLUECHTIGE_QUEUE_GROESSE: usize = 32;

// ---------------------------------------------------------------------------
// Queue-Elemente
// ---------------------------------------------------------------------------

/// Element der zuverlaessigen Queue
#[derive(Debug, Clone, PartialEq)]
pub enum Ausgehend {
    Ereignis(AusgehendesEreignis),
    /// Verbindung nach allen vorher eingereihten Ereignissen schliessen
    Trennen,
}

/// Empfangsseite einer Verbindung (liest der Transport)
#[derive(Debug)]
pub struct ClientEmpfaenger {
    pub zuverlaessig: mpsc::UnboundedReceiver<Ausgehend>,
    pub fluechtig: mpsc::Receiver<AusgehendesEreignis>,
}

// ---------------------------------------------------------------------------
// ClientSender
// ---------------------------------------------------------------------------

/// Handle auf die Send-Queues eines verbundenen Clients
#[derive(Clone, Debug)]
pub struct ClientSender {
    pub verbindung: VerbindungsId,
    zuverlaessig: mpsc::UnboundedSender<Ausgehend>,
    fluechtig: mpsc::Sender<AusgehendesEreignis>,
}

impl ClientSender {
    /// Reiht ein Ereignis zuverlaessig ein
    ///
    /// Gibt `false` zurueck wenn die Verbindung bereits geschlossen ist.
    pub fn senden(&self, ereignis: AusgehendesEreignis) -> bool {
        if self.zuverlaessig.send(Ausgehend::Ereignis(ereignis)).is_err() {
            tracing::debug!(verbindung = %self.verbindung, "Send-Queue geschlossen (Client getrennt)");
            return false;
        }
        true
    }

    /// Sendet nicht-blockierend; bei voller Queue wird verworfen
    pub fn fluechtig_senden(&self, ereignis: AusgehendesEreignis) -> bool {
        match self.fluechtig.try_send(ereignis) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(e)) => {
                tracing::trace!(
                    verbindung = %self.verbindung,
                    ereignis = e.name(),
                    "Fluechtige Queue voll – Ereignis verworfen"
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::debug!(verbindung = %self.verbindung, "Send-Queue geschlossen (Client getrennt)");
                false
            }
        }
    }

    pub fn trennen(&self) -> bool {
        self.zuverlaessig.send(Ausgehend::Trennen).is_ok()
    }
}

// ---------------------------------------------------------------------------
// EventBroadcaster
// ---------------------------------------------------------------------------

/// Zentraler Event-Broadcaster fuer alle verbundenen Clients
///
/// Thread-safe via Arc + DashMap. Clone teilt den inneren Zustand.
/// Raum-Mitgliedschaften kennt der Broadcaster nicht; die Empfaengerlisten
/// liefert die Raum-Registry.
#[derive(Clone)]
pub struct EventBroadcaster {
    inner: Arc<EventBroadcasterInner>,
}

struct EventBroadcasterInner {
    clients: DashMap<VerbindungsId, ClientSender>,
    fluechtige_queue_groesse: usize,
}

impl EventBroadcaster {
    pub fn neu() -> Self {
        Self::mit_queue_groesse(FLUECHTIGE_QUEUE_GROESSE)
    }

    pub fn mit_queue_groesse(fluechtige_queue_groesse: usize) -> Self {
        Self {
            inner: Arc::new(EventBroadcasterInner {
                clients: DashMap::new(),
                fluechtige_queue_groesse: fluechtige_queue_groesse.max(1),
            }),
        }
    }

    /// Registriert eine neue Verbindung und gibt ihre Empfangs-Queues zurueck
    pub fn client_registrieren(&self, verbindung: VerbindungsId) -> ClientEmpfaenger {
        let (z_tx, z_rx) = mpsc::unbounded_channel();
        let (f_tx, f_rx) = mpsc::channel(self.inner.fluechtige_queue_groesse);
        self.inner.clients.insert(
            verbindung,
            ClientSender {
                verbindung,
                zuverlaessig: z_tx,
                fluechtig: f_tx,
            },
        );
        tracing::debug!(verbindung = %verbindung, "Client im Broadcaster registriert");
        ClientEmpfaenger {
            zuverlaessig: z_rx,
            fluechtig: f_rx,
        }
    }

    pub fn client_entfernen(&self, verbindung: &VerbindungsId) {
        if self.inner.clients.remove(verbindung).is_some() {
            tracing::debug!(verbindung = %verbindung, "Client aus Broadcaster entfernt");
        }
    }

    fn sender(&self, verbindung: &VerbindungsId) -> Option<ClientSender> {
        self.inner.clients.get(verbindung).map(|s| s.clone())
    }

    /// Sendet ein Ereignis zuverlaessig an eine Verbindung
    pub fn an_verbindung_senden(
        &self,
        verbindung: &VerbindungsId,
        ereignis: AusgehendesEreignis,
    ) -> bool {
        match self.sender(verbindung) {
            Some(sender) => sender.senden(ereignis),
            None => {
                tracing::debug!(verbindung = %verbindung, "Senden an unbekannte Verbindung");
                false
            }
        }
    }

    /// Sendet ein Ereignis zuverlaessig an mehrere Verbindungen
    ///
    /// Gibt die Anzahl der erfolgreichen Sendungen zurueck.
    pub fn an_verbindungen_senden(
        &self,
        verbindungen: &[VerbindungsId],
        ereignis: &AusgehendesEreignis,
    ) -> usize {
        verbindungen
            .iter()
            .filter_map(|v| self.sender(v))
            .filter(|s| s.senden(ereignis.clone()))
            .count()
    }

    /// Sendet ein Ereignis best-effort an mehrere Verbindungen
    pub fn an_verbindungen_fluechtig(
        &self,
        verbindungen: &[VerbindungsId],
        ereignis: &AusgehendesEreignis,
    ) -> usize {
        verbindungen
            .iter()
            .filter_map(|v| self.sender(v))
            .filter(|s| s.fluechtig_senden(ereignis.clone()))
            .count()
    }

    /// Sendet ein Ereignis an alle verbundenen Clients
    pub fn an_alle_senden(&self, ereignis: &AusgehendesEreignis) -> usize {
        let sender: Vec<ClientSender> =
            self.inner.clients.iter().map(|e| e.value().clone()).collect();
        sender
            .iter()
            .filter(|s| s.senden(ereignis.clone()))
            .count()
    }

    /// Schliesst eine Verbindung nach allen bereits eingereihten Ereignissen
    pub fn trennen(&self, verbindung: &VerbindungsId) -> bool {
        self.sender(verbindung).is_some_and(|s| s.trennen())
    }

    pub fn client_anzahl(&self) -> usize {
        self.inner.clients.len()
    }

    pub fn ist_registriert(&self, verbindung: &VerbindungsId) -> bool {
        self.inner.clients.contains_key(verbindung)
    }
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::neu()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
