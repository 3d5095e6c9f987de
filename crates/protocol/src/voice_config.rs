//! Raumweite Voice-Konfiguration
//!
//! Drei Darstellungen derselben Werte:
//! - `VoiceConfig` (camelCase) – an Clients, als JSON im Join-Snapshot und
//!   als MessagePack-Map im `server-config`-Ereignis
//! - `VoiceConfigPatch` – Teil-Update eines Admins, jedes Feld optional
//! - natives Format des Game-Server-Plugins (PascalCase-Map)

use serde::{Deserialize, Serialize};

use crate::error::ProtocolResult;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceConfig {
    /// Millisekunden bis ein gestorbener Spieler stummgeschaltet wird
    pub dead_player_mute_delay: f64,
    pub allow_dead_team_voice: bool,
    pub allow_spectator_c4_voice: bool,
    pub volume_falloff_factor: f64,
    pub volume_max_distance: f64,
    pub occlusion_near: f64,
    pub occlusion_far: f64,
    pub occlusion_end_dist: f64,
    pub occlusion_falloff_factor: f64,
    pub always_hear_visible_players: bool,
    pub dead_voice_filter_frequency: f64,
    pub spectators_can_talk: bool,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            dead_player_mute_delay: 1000.0,
            allow_dead_team_voice: true,
            allow_spectator_c4_voice: true,
            volume_falloff_factor: 0.5,
            volume_max_distance: 2000.0,
            occlusion_near: 300.0,
            occlusion_far: 25.0,
            occlusion_end_dist: 2000.0,
            occlusion_falloff_factor: 3.0,
            always_hear_visible_players: true,
            dead_voice_filter_frequency: 750.0,
            spectators_can_talk: false,
        }
    }
}

/// Teil-Update: nicht gesetzte Felder behalten ihren bisherigen Wert
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VoiceConfigPatch {
    pub dead_player_mute_delay: Option<f64>,
    pub allow_dead_team_voice: Option<bool>,
    pub allow_spectator_c4_voice: Option<bool>,
    pub volume_falloff_factor: Option<f64>,
    pub volume_max_distance: Option<f64>,
    pub occlusion_near: Option<f64>,
    pub occlusion_far: Option<f64>,
    pub occlusion_end_dist: Option<f64>,
    pub occlusion_falloff_factor: Option<f64>,
    pub always_hear_visible_players: Option<bool>,
    pub dead_voice_filter_frequency: Option<f64>,
    pub spectators_can_talk: Option<bool>,
}

/// Ergebnis eines Merges
#[derive(Debug, Clone, PartialEq)]
pub struct ZusammenfuehrungsErgebnis {
    pub config: VoiceConfig,
    /// Felder die wegen ungueltiger Werte verworfen wurden
    pub verworfen: Vec<&'static str>,
}

fn zahl_uebernehmen(
    ziel: &mut f64,
    wert: Option<f64>,
    feld: &'static str,
    verworfen: &mut Vec<&'static str>,
) {
    if let Some(wert) = wert {
        if wert.is_finite() && wert >= 0.0 {
            *ziel = wert;
        } else {
            verworfen.push(feld);
        }
    }
}

impl VoiceConfig {
    /// Fuehrt ein Teil-Update feldweise ueber diese Konfiguration zusammen
    ///
    /// Zahlen muessen endlich und nicht negativ sein; ungueltige Felder
    /// werden verworfen, gueltige trotzdem uebernommen.
    pub fn zusammenfuehren(&self, patch: &VoiceConfigPatch) -> ZusammenfuehrungsErgebnis {
        let mut config = self.clone();
        let mut verworfen = Vec::new();

        zahl_uebernehmen(
            &mut config.dead_player_mute_delay,
            patch.dead_player_mute_delay,
            "deadPlayerMuteDelay",
            &mut verworfen,
        );
        zahl_uebernehmen(
            &mut config.volume_falloff_factor,
            patch.volume_falloff_factor,
            "volumeFalloffFactor",
            &mut verworfen,
        );
        zahl_uebernehmen(
            &mut config.volume_max_distance,
            patch.volume_max_distance,
            "volumeMaxDistance",
            &mut verworfen,
        );
        zahl_uebernehmen(
            &mut config.occlusion_near,
            patch.occlusion_near,
            "occlusionNear",
            &mut verworfen,
        );
        zahl_uebernehmen(
            &mut config.occlusion_far,
            patch.occlusion_far,
            "occlusionFar",
            &mut verworfen,
        );
        zahl_uebernehmen(
            &mut config.occlusion_end_dist,
            patch.occlusion_end_dist,
            "occlusionEndDist",
            &mut verworfen,
        );
        zahl_uebernehmen(
            &mut config.occlusion_falloff_factor,
            patch.occlusion_falloff_factor,
            "occlusionFalloffFactor",
            &mut verworfen,
        );
        zahl_uebernehmen(
            &mut config.dead_voice_filter_frequency,
            patch.dead_voice_filter_frequency,
            "deadVoiceFilterFrequency",
            &mut verworfen,
        );

        if let Some(v) = patch.allow_dead_team_voice {
            config.allow_dead_team_voice = v;
        }
        if let Some(v) = patch.allow_spectator_c4_voice {
            config.allow_spectator_c4_voice = v;
        }
        if let Some(v) = patch.always_hear_visible_players {
            config.always_hear_visible_players = v;
        }
        if let Some(v) = patch.spectators_can_talk {
            config.spectators_can_talk = v;
        }

        ZusammenfuehrungsErgebnis { config, verworfen }
    }

    /// MessagePack-Map (camelCase) fuer das `server-config`-Ereignis an Clients
    pub fn kodieren(&self) -> ProtocolResult<Vec<u8>> {
        Ok(rmp_serde::to_vec_named(self)?)
    }

    /// Liest die PascalCase-Map des Game-Server-Plugins; fehlende Felder
    /// werden mit den Standardwerten belegt
    pub fn aus_nativ(bytes: &[u8]) -> ProtocolResult<Self> {
        let nativ: NativeVoiceConfig = rmp_serde::from_slice(bytes)?;
        Ok(nativ.into())
    }

    /// Kodiert das Feld-Set das das Plugin versteht (ohne Dead-Voice-Filter
    /// und Zuschauer-Sprechrecht)
    pub fn nativ_kodieren(&self) -> ProtocolResult<Vec<u8>> {
        let ausgang = NativeVoiceConfigAusgang {
            dead_player_mute_delay: self.dead_player_mute_delay,
            allow_dead_team_voice: self.allow_dead_team_voice,
            allow_spectator_c4_voice: self.allow_spectator_c4_voice,
            volume_falloff_factor: self.volume_falloff_factor,
            volume_max_distance: self.volume_max_distance,
            occlusion_near: self.occlusion_near,
            occlusion_far: self.occlusion_far,
            occlusion_end_dist: self.occlusion_end_dist,
            occlusion_falloff_factor: self.occlusion_falloff_factor,
            always_hear_visible_players: self.always_hear_visible_players,
        };
        Ok(rmp_serde::to_vec_named(&ausgang)?)
    }
}

// ---------------------------------------------------------------------------
// Natives Plugin-Format
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct NativeVoiceConfig {
    dead_player_mute_delay: f64,
    allow_dead_team_voice: bool,
    allow_spectator_c4_voice: bool,
    volume_falloff_factor: f64,
    volume_max_distance: f64,
    occlusion_near: f64,
    occlusion_far: f64,
    occlusion_end_dist: f64,
    occlusion_falloff_factor: f64,
    always_hear_visible_players: bool,
    dead_voice_filter_frequency: f64,
    spectators_can_talk: bool,
}

impl Default for NativeVoiceConfig {
    fn default() -> Self {
        let d = VoiceConfig::default();
        Self {
            dead_player_mute_delay: d.dead_player_mute_delay,
            allow_dead_team_voice: d.allow_dead_team_voice,
            allow_spectator_c4_voice: d.allow_spectator_c4_voice,
            volume_falloff_factor: d.volume_falloff_factor,
            volume_max_distance: d.volume_max_distance,
            occlusion_near: d.occlusion_near,
            occlusion_far: d.occlusion_far,
            occlusion_end_dist: d.occlusion_end_dist,
            occlusion_falloff_factor: d.occlusion_falloff_factor,
            always_hear_visible_players: d.always_hear_visible_players,
            dead_voice_filter_frequency: d.dead_voice_filter_frequency,
            spectators_can_talk: d.spectators_can_talk,
        }
    }
}

impl From<NativeVoiceConfig> for VoiceConfig {
    fn from(n: NativeVoiceConfig) -> Self {
        Self {
            dead_player_mute_delay: n.dead_player_mute_delay,
            allow_dead_team_voice: n.allow_dead_team_voice,
            allow_spectator_c4_voice: n.allow_spectator_c4_voice,
            volume_falloff_factor: n.volume_falloff_factor,
            volume_max_distance: n.volume_max_distance,
            occlusion_near: n.occlusion_near,
            occlusion_far: n.occlusion_far,
            occlusion_end_dist: n.occlusion_end_dist,
            occlusion_falloff_factor: n.occlusion_falloff_factor,
            always_hear_visible_players: n.always_hear_visible_players,
            dead_voice_filter_frequency: n.dead_voice_filter_frequency,
            spectators_can_talk: n.spectators_can_talk,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct NativeVoiceConfigAusgang {
    dead_player_mute_delay: f64,
    allow_dead_team_voice: bool,
    allow_spectator_c4_voice: bool,
    volume_falloff_factor: f64,
    volume_max_distance: f64,
    occlusion_near: f64,
    occlusion_far: f64,
    occlusion_end_dist: f64,
    occlusion_falloff_factor: f64,
    always_hear_visible_players: bool,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn teil_update_aendert_nur_gesetzte_felder() {
        let alt = VoiceConfig::default();
        let patch = VoiceConfigPatch {
            volume_max_distance: Some(3500.0),
            spectators_can_talk: Some(true),
            ..Default::default()
        };
        let ergebnis = alt.zusammenfuehren(&patch);

        assert!(ergebnis.verworfen.is_empty());
        assert_eq!(ergebnis.config.volume_max_distance, 3500.0);
        assert!(ergebnis.config.spectators_can_talk);
        assert_eq!(ergebnis.config.occlusion_near, alt.occlusion_near);
        assert_eq!(ergebnis.config.dead_player_mute_delay, alt.dead_player_mute_delay);
    }

    #[test]
    fn ungueltige_zahlen_werden_verworfen() {
        let alt = VoiceConfig::default();
        let patch = VoiceConfigPatch {
            occlusion_far: Some(-1.0),
            volume_falloff_factor: Some(f64::NAN),
            occlusion_near: Some(150.0),
            ..Default::default()
        };
        let ergebnis = alt.zusammenfuehren(&patch);

        assert_eq!(ergebnis.verworfen, vec!["volumeFalloffFactor", "occlusionFar"]);
        assert_eq!(ergebnis.config.occlusion_far, alt.occlusion_far);
        assert_eq!(ergebnis.config.occlusion_near, 150.0);
    }

    #[test]
    fn patch_aus_json() {
        let patch: VoiceConfigPatch =
            serde_json::from_str(r#"{"allowSpectatorC4Voice":false,"occlusionEndDist":1500}"#)
                .unwrap();
        assert_eq!(patch.allow_spectator_c4_voice, Some(false));
        assert_eq!(patch.occlusion_end_dist, Some(1500.0));
        assert_eq!(patch.occlusion_near, None);
    }

    #[test]
    fn nativ_fehlende_felder_bekommen_standardwerte() {
        let mut map = BTreeMap::new();
        map.insert("VolumeMaxDistance", 1234.0);
        map.insert("DeadPlayerMuteDelay", 0.0);
        let bytes = rmp_serde::to_vec_named(&map).unwrap();

        let config = VoiceConfig::aus_nativ(&bytes).unwrap();
        assert_eq!(config.volume_max_distance, 1234.0);
        assert_eq!(config.dead_player_mute_delay, 0.0);
        assert_eq!(config.occlusion_far, 25.0);
        assert!(!config.spectators_can_talk);
    }

    #[test]
    fn nativ_akzeptiert_ganzzahlen() {
        let mut map = BTreeMap::new();
        map.insert("OcclusionNear", 280i64);
        let bytes = rmp_serde::to_vec_named(&map).unwrap();
        assert_eq!(VoiceConfig::aus_nativ(&bytes).unwrap().occlusion_near, 280.0);
    }

    #[test]
    fn nativ_kodieren_enthaelt_zehn_felder() {
        let bytes = VoiceConfig::default().nativ_kodieren().unwrap();
        let map: BTreeMap<String, beliebig::Wert> = rmp_serde::from_slice(&bytes).unwrap();
        assert_eq!(map.len(), 10);
        assert!(map.contains_key("AlwaysHearVisiblePlayers"));
        assert!(!map.contains_key("DeadVoiceFilterFrequency"));
        assert!(!map.contains_key("SpectatorsCanTalk"));
    }

    #[test]
    fn client_kodierung_ist_camel_case_map() {
        let bytes = VoiceConfig::default().kodieren().unwrap();
        let zurueck: VoiceConfig = rmp_serde::from_slice(&bytes).unwrap();
        assert_eq!(zurueck, VoiceConfig::default());
        let map: BTreeMap<String, beliebig::Wert> = rmp_serde::from_slice(&bytes).unwrap();
        assert!(map.contains_key("allowSpectatorC4Voice"));
    }

    /// Nimmt beliebige Map-Werte auf ohne sie auszuwerten
    mod beliebig {
        use serde::Deserialize;

        #[derive(Debug, Deserialize)]
        #[serde(untagged)]
        pub enum Wert {
            Bool(bool),
            Zahl(f64),
        }
    }
}
