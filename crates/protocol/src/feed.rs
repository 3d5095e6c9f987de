//! Telemetrie-Codec fuer Spielerdaten (MessagePack)
//!
//! Der Game-Server sendet pro Push ein MessagePack-Array mit einem
//! 12-Tupel pro Spieler:
//!
//! ```text
//! [steamId, name, isAdmin, originX, originY, originZ,
//!  lookAtX, lookAtY, lookAtZ, team, isAlive, spectatingC4]
//! ```
//!
//! Positions- und Blickrichtungswerte sind Festkommazahlen (Wert * 10000).
//! `dekodieren` rechnet sie in Gleitkomma zurueck, `kodieren` skaliert
//! wieder hoch, sodass der Relay eine gefilterte Teilmenge im selben
//! Format an die Voice-Clients weitergeben kann.

use serde::{Deserialize, Serialize};

use crate::error::ProtocolResult;

/// Skalierungsfaktor der Festkomma-Darstellung
pub const FESTKOMMA_FAKTOR: f64 = 10_000.0;

// ---------------------------------------------------------------------------
// Typen
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vektor3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vektor3 {
    pub fn neu(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

/// Team eines Spielers
///
/// Unbekannte Werte bleiben erhalten damit sie unveraendert
/// weitergegeben werden koennen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Team {
    Keins,
    Zuschauer,
    Terroristen,
    AntiTerroristen,
    Unbekannt(i64),
}

impl From<i64> for Team {
    fn from(wert: i64) -> Self {
        match wert {
            0 => Self::Keins,
            1 => Self::Zuschauer,
            2 => Self::Terroristen,
            3 => Self::AntiTerroristen,
            andere => Self::Unbekannt(andere),
        }
    }
}

impl From<Team> for i64 {
    fn from(team: Team) -> Self {
        match team {
            Team::Keins => 0,
            Team::Zuschauer => 1,
            Team::Terroristen => 2,
            Team::AntiTerroristen => 3,
            Team::Unbekannt(wert) => wert,
        }
    }
}

/// Ein Eintrag der autoritativen Spielerliste
#[derive(Debug, Clone, PartialEq)]
pub struct AuthoritativePlayer {
    pub steam_id: String,
    pub name: String,
    pub is_admin: bool,
    pub origin: Vektor3,
    pub look_at: Vektor3,
    pub team: Team,
    pub is_alive: bool,
    /// Zuschauer der gerade den C4-Timer beobachtet
    pub spectating_c4: bool,
}

/// Drahtformat eines Spielers (positionelles Tupel)
#[derive(Debug, Serialize, Deserialize)]
struct DrahtSpieler(
    String,
    String,
    bool,
    i64,
    i64,
    i64,
    i64,
    i64,
    i64,
    i64,
    bool,
    bool,
);

fn herunterskalieren(wert: i64) -> f64 {
    wert as f64 / FESTKOMMA_FAKTOR
}

fn hochskalieren(wert: f64) -> i64 {
    (wert * FESTKOMMA_FAKTOR).round() as i64
}

impl From<DrahtSpieler> for AuthoritativePlayer {
    fn from(d: DrahtSpieler) -> Self {
        Self {
            steam_id: d.0,
            name: d.1,
            is_admin: d.2,
            origin: Vektor3::neu(
                herunterskalieren(d.3),
                herunterskalieren(d.4),
                herunterskalieren(d.5),
            ),
            look_at: Vektor3::neu(
                herunterskalieren(d.6),
                herunterskalieren(d.7),
                herunterskalieren(d.8),
            ),
            team: Team::from(d.9),
            is_alive: d.10,
            spectating_c4: d.11,
        }
    }
}

impl From<&AuthoritativePlayer> for DrahtSpieler {
    fn from(p: &AuthoritativePlayer) -> Self {
        DrahtSpieler(
            p.steam_id.clone(),
            p.name.clone(),
            p.is_admin,
            hochskalieren(p.origin.x),
            hochskalieren(p.origin.y),
            hochskalieren(p.origin.z),
            hochskalieren(p.look_at.x),
            hochskalieren(p.look_at.y),
            hochskalieren(p.look_at.z),
            i64::from(p.team),
            p.is_alive,
            p.spectating_c4,
        )
    }
}

// ---------------------------------------------------------------------------
// Codec
// ---------------------------------------------------------------------------

/// Dekodiert einen Telemetrie-Push in die typisierte Spielerliste
pub fn dekodieren(bytes: &[u8]) -> ProtocolResult<Vec<AuthoritativePlayer>> {
    let draht: Vec<DrahtSpieler> = rmp_serde::from_slice(bytes)?;
    Ok(draht.into_iter().map(AuthoritativePlayer::from).collect())
}

/// Kodiert eine (gefilterte) Spielerliste ins Drahtformat
pub fn kodieren(spieler: &[AuthoritativePlayer]) -> ProtocolResult<Vec<u8>> {
    let draht: Vec<DrahtSpieler> = spieler.iter().map(DrahtSpieler::from).collect();
    Ok(rmp_serde::to_vec(&draht)?)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
