//! proxvoice-auth – Authenticator und Rate-Limiter
//!
//! Dieses Crate implementiert:
//! - Session-Token-Pruefung (JWT, HS256, Audience)
//! - API-Key-Pruefung fuer Game-Server-Links gegen einen `KeyStore`
//! - Versionspruefung fuer Client und Plugin (Semver-Untergrenze)
//! - Token-Bucket-Rate-Limiter mit getrennten Budgets (oeffentlich/admin)
//! - TURN-Credential-Ausgabe (HMAC-SHA1) fuer ICE-Server

pub mod api_key;
pub mod error;
pub mod rate_limit;
pub mod session;
pub mod turn;
pub mod version;

// Bequeme Re-Exporte
pub use api_key::{api_key_pruefen, ApiKeyRecord, JsonKeyStore, KeyStore, MemoryKeyStore};
pub use error::{AuthError, AuthResult};
pub use rate_limit::{RateLimitBudget, RateLimitKonfig, RateLimiter};
pub use session::SessionVerifier;
pub use turn::{IceKonfig, IceServer, IceServerKonfig, IceTyp, TurnAussteller, TurnCredential};
pub use version::{client_version_aus_user_agent, VersionsPruefer};
