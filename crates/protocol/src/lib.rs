//! proxvoice-protocol – Protokoll-Definitionen des Relays
//!
//! Dieses Crate definiert alle Ereignisse die zwischen Client, Game-Server
//! und Relay ausgetauscht werden, den kompakten Telemetrie-Codec fuer
//! Spielerpositionen sowie die raumweite Voice-Konfiguration.

pub mod error;
pub mod events;
pub mod feed;
pub mod voice_config;

pub use error::{ProtocolError, ProtocolResult};
pub use events::{
    Ausnahme, AusgehendesEreignis, ClientRecord, EingehendesEreignis, ExceptionCode,
    JoinRoomAntwort,
};
pub use feed::{AuthoritativePlayer, Team, Vektor3};
pub use voice_config::{VoiceConfig, VoiceConfigPatch};
