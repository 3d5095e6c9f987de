//! Session-Token-Pruefung fuer Proxvoice
//!
//! Clients melden sich mit einem signierten JWT (HS256) an, das nach dem
//! Steam-Login ausgestellt wurde. Geprueft werden Signatur, Ablauf und
//! Audience (die konfigurierte Domain); der Claim `steamId` muss vorhanden
//! und ungleich `"0"` sein.

use chrono::Utc;
use jsonwebtoken::{errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use proxvoice_core::SteamId;
use serde::{Deserialize, Serialize};

use crate::error::{AuthError, AuthResult};

/// Claims eines Session-Tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionClaims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    steam_id: Option<String>,
    exp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    iat: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    aud: Option<String>,
}

/// Prueft (und stellt fuer Tests und Tools aus) Session-Tokens
#[derive(Clone)]
pub struct SessionVerifier {
    dekodier_schluessel: DecodingKey,
    kodier_schluessel: EncodingKey,
    validierung: Validation,
    audience: String,
}

impl std::fmt::Debug for SessionVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionVerifier")
            .field("audience", &self.audience)
            .finish_non_exhaustive()
    }
}

impl SessionVerifier {
    pub fn neu(geheimnis: &str, audience: impl Into<String>) -> Self {
        let audience = audience.into();
        let mut validierung = Validation::new(Algorithm::HS256);
        validierung.set_audience(&[audience.as_str()]);
        Self {
            dekodier_schluessel: DecodingKey::from_secret(geheimnis.as_bytes()),
            kodier_schluessel: EncodingKey::from_secret(geheimnis.as_bytes()),
            validierung,
            audience,
        }
    }

    /// Verifiziert ein Session-Token und liefert die Steam-Identitaet
    ///
    /// Abgelaufene Tokens werden als `TokenAbgelaufen` gemeldet, alle
    /// anderen Fehler als `TokenUngueltig`.
    pub fn pruefen(&self, token: &str) -> AuthResult<SteamId> {
        let daten = jsonwebtoken::decode::<SessionClaims>(
            token,
            &self.dekodier_schluessel,
            &self.validierung,
        )
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => AuthError::TokenAbgelaufen,
            _ => AuthError::TokenUngueltig(e.to_string()),
        })?;

        let steam_id = daten
            .claims
            .steam_id
            .ok_or_else(|| AuthError::TokenUngueltig("steamId fehlt".into()))?;

        SteamId::parse(steam_id).map_err(|e| AuthError::TokenUngueltig(e.to_string()))
    }

    /// Stellt ein Token fuer eine Steam-Identitaet aus
    pub fn ausstellen(&self, steam_id: &SteamId, gueltig_sekunden: i64) -> AuthResult<String> {
        let jetzt = Utc::now().timestamp();
        let claims = SessionClaims {
            steam_id: Some(steam_id.as_str().to_string()),
            exp: jetzt + gueltig_sekunden,
            iat: Some(jetzt),
            aud: Some(self.audience.clone()),
        };
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.kodier_schluessel)
            .map_err(|e| AuthError::intern(format!("Token-Signatur fehlgeschlagen: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verifier() -> SessionVerifier {
        SessionVerifier::neu("geheim", "voice.example.org")
    }

    fn token_mit(claims: serde_json::Value, geheimnis: &str) -> String {
        jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(geheimnis.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn gueltiges_token_liefert_steam_id() {
        let v = verifier();
        let steam = SteamId::parse("76561198000000001").unwrap();
        let token = v.ausstellen(&steam, 3600).unwrap();
        assert_eq!(v.pruefen(&token).unwrap(), steam);
    }

    #[test]
    fn abgelaufenes_token_wird_unterschieden() {
        let token = token_mit(
            serde_json::json!({
                "steamId": "7656",
                "exp": Utc::now().timestamp() - 3600,
                "aud": "voice.example.org",
            }),
            "geheim",
        );
        assert!(matches!(
            verifier().pruefen(&token),
            Err(AuthError::TokenAbgelaufen)
        ));
    }

    #[test]
    fn falsche_signatur_ist_ungueltig() {
        let token = token_mit(
            serde_json::json!({
                "steamId": "7656",
                "exp": Utc::now().timestamp() + 3600,
                "aud": "voice.example.org",
            }),
            "anderes-geheimnis",
        );
        assert!(matches!(
            verifier().pruefen(&token),
            Err(AuthError::TokenUngueltig(_))
        ));
    }

    #[test]
    fn falsche_audience_ist_ungueltig() {
        let token = token_mit(
            serde_json::json!({
                "steamId": "7656",
                "exp": Utc::now().timestamp() + 3600,
                "aud": "andere.domain",
            }),
            "geheim",
        );
        assert!(matches!(
            verifier().pruefen(&token),
            Err(AuthError::TokenUngueltig(_))
        ));
    }

    #[test]
    fn sentinel_und_fehlende_steam_id_werden_abgelehnt() {
        let exp = Utc::now().timestamp() + 3600;
        let sentinel = token_mit(
            serde_json::json!({"steamId": "0", "exp": exp, "aud": "voice.example.org"}),
            "geheim",
        );
        let ohne = token_mit(
            serde_json::json!({"exp": exp, "aud": "voice.example.org"}),
            "geheim",
        );
        assert!(verifier().pruefen(&sentinel).is_err());
        assert!(verifier().pruefen(&ohne).is_err());
    }

    #[test]
    fn muell_ist_ungueltig() {
        assert!(matches!(
            verifier().pruefen("kein.jwt.token"),
            Err(AuthError::TokenUngueltig(_))
        ));
    }
}
