//! proxvoice-signaling – Raum-Koordination und WebRTC-Signaling-Relay
//!
//! Dieser Crate verwaltet die Raeume der Game-Server, gleicht deren
//! Telemetrie mit den beigetretenen Voice-Clients ab und reicht
//! WebRTC-Signaling zwischen den Clients eines Raums weiter.
//!
//! ## Architektur
//!
//! ```text
//! WebSocket (/ws)
//!     |
//!     v
//! Handshake (pro Verbindung)
//!     |  Game-Server-Link (API-Key) oder Voice-Client (Session-Token)
//!     |  State Machine: Verbindend -> Authentifiziert -> ImRaum -> Getrennt
//!     v
//! MessageDispatcher
//!     |
//!     +-- JoinHandler        (join-room)
//!     +-- SignalHandler      (signal, microphone-state)
//!     +-- AdminHandler       (mute-player, update-config)
//!     +-- ServerLinkHandler  (server-config, current-map, door-rotation,
//!                             player-positions)
//!
//! RaumRegistry     – Raeume und Identitaets-Index
//! presence         – Telemetrie-Abgleich und Broadcast-Drosselung
//! watchdog         – Raum-, Peer- und Benachrichtigungs-Timer
//! EventBroadcaster – Zuverlaessige und fluechtige Send-Queues
//! ```

pub mod broadcast;
pub mod dispatcher;
pub mod error;
pub mod handlers;
pub mod handshake;
pub mod konfig;
pub mod kontext;
pub mod presence;
pub mod registry;
pub mod room;
pub mod server_state;
pub mod watchdog;
pub mod websocket;

// Bequeme Re-Exporte
pub use broadcast::{Ausgehend, ClientEmpfaenger, EventBroadcaster};
pub use dispatcher::MessageDispatcher;
pub use error::{SignalingError, SignalingResult};
pub use handshake::{verbinden, Handshake};
pub use konfig::RelayKonfig;
pub use kontext::{Rolle, VerbindungsKontext, VerbindungsZustand};
pub use registry::{RaumHandle, RaumRegistry};
pub use room::{JoinedPeer, Room};
pub use server_state::{RelayState, RelayStatistik};
