//! Broadcast adapter and the in-process hub behind it.
//!
//! Clients call `negotiate` to get a hub URL plus a signed access token,
//! then hold a subscription open on that URL. Every `publish` fans a named
//! event out to all live subscribers. Delivery is best effort: no
//! acknowledgement, no retry, and a subscriber that falls more than
//! `capacity` messages behind loses the oldest ones.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tokio::sync::broadcast;

use crate::config::HubSettings;
use crate::entity::SprintPlanningEntity;
use crate::error::{Result, SprintError};

type HmacSha256 = Hmac<Sha256>;

/// Event name every successful write is announced under.
pub const TEAM_DATA_EVENT: &str = "sprintPlanningTeamData";

// ---------------------------------------------------------------------------
// Contract
// ---------------------------------------------------------------------------

/// Credentials a client uses to subscribe to the hub directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionInfo {
    pub url: String,
    pub access_token: String,
}

/// One published event as subscribers receive it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HubMessage {
    pub target: String,
    pub arguments: Vec<SprintPlanningEntity>,
}

pub trait Broadcaster: Send + Sync {
    /// Enqueue `target` with `arguments` for every current subscriber.
    fn publish(&self, target: &str, arguments: Vec<SprintPlanningEntity>) -> Result<()>;

    /// Issue a short-lived connection credential. A missing `client_id` gets
    /// a generated one.
    fn negotiate(&self, client_id: Option<&str>) -> Result<ConnectionInfo>;
}

// ---------------------------------------------------------------------------
// Tokens
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenClaims {
    pub hub: String,
    pub sub: String,
    pub exp: i64,
}

/// Generate a random 32-character alphanumeric signing secret.
pub fn generate_secret() -> String {
    use rand::{distributions::Alphanumeric, Rng};
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect()
}

// ---------------------------------------------------------------------------
// Hub
// ---------------------------------------------------------------------------

pub struct Hub {
    name: String,
    url: String,
    secret: Vec<u8>,
    ttl_secs: u64,
    tx: broadcast::Sender<HubMessage>,
}

impl Hub {
    /// Build a hub whose subscription URL lives under `public_url`.
    pub fn new(settings: &HubSettings, public_url: &str) -> Self {
        let secret = match &settings.token_secret {
            Some(s) => s.clone(),
            None => {
                tracing::warn!("no hub token secret configured; tokens will not survive restart");
                generate_secret()
            }
        };
        let (tx, _) = broadcast::channel(settings.capacity.max(1));
        Self {
            name: settings.name.clone(),
            url: format!("{}/hub/{}", public_url.trim_end_matches('/'), settings.name),
            secret: secret.into_bytes(),
            ttl_secs: settings.token_ttl_secs,
            tx,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn subscribe(&self) -> broadcast::Receiver<HubMessage> {
        self.tx.subscribe()
    }

    fn sign(&self, payload: &[u8]) -> Result<HmacSha256> {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| SprintError::TokenInvalid(e.to_string()))?;
        mac.update(payload);
        Ok(mac)
    }

    pub fn issue_token(&self, client_id: &str, now: DateTime<Utc>) -> Result<String> {
        let exp = i64::try_from(self.ttl_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .and_then(|ttl| now.checked_add_signed(ttl))
            .ok_or_else(|| {
                SprintError::ConfigInvalid(format!(
                    "hub.token_ttl_secs {} is out of range",
                    self.ttl_secs
                ))
            })?;
        let claims = TokenClaims {
            hub: self.name.clone(),
            sub: client_id.to_string(),
            exp: exp.timestamp(),
        };
        let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims)?);
        let signature = self.sign(payload.as_bytes())?.finalize().into_bytes();
        Ok(format!("{payload}.{}", URL_SAFE_NO_PAD.encode(signature)))
    }

    pub fn verify(&self, token: &str) -> Result<TokenClaims> {
        self.verify_at(token, Utc::now())
    }

    /// Check signature, hub name, and expiry as of `now`.
    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<TokenClaims> {
        let (payload, signature) = token
            .split_once('.')
            .ok_or_else(|| SprintError::TokenInvalid("malformed token".into()))?;
        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|e| SprintError::TokenInvalid(e.to_string()))?;
        self.sign(payload.as_bytes())?
            .verify_slice(&signature)
            .map_err(|_| SprintError::TokenInvalid("bad signature".into()))?;

        let raw = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|e| SprintError::TokenInvalid(e.to_string()))?;
        let claims: TokenClaims = serde_json::from_slice(&raw)
            .map_err(|e| SprintError::TokenInvalid(e.to_string()))?;
        if claims.hub != self.name {
            return Err(SprintError::TokenInvalid(format!(
                "token issued for hub '{}'",
                claims.hub
            )));
        }
        if claims.exp <= now.timestamp() {
            return Err(SprintError::TokenExpired);
        }
        Ok(claims)
    }
}

impl Broadcaster for Hub {
    fn publish(&self, target: &str, arguments: Vec<SprintPlanningEntity>) -> Result<()> {
        let message = HubMessage {
            target: target.to_string(),
            arguments,
        };
        // A send error only means nobody is listening right now.
        match self.tx.send(message) {
            Ok(n) => tracing::debug!(event = target, receivers = n, "published"),
            Err(_) => tracing::debug!(event = target, "published with no subscribers"),
        }
        Ok(())
    }

    fn negotiate(&self, client_id: Option<&str>) -> Result<ConnectionInfo> {
        let client_id = match client_id {
            Some(id) if !id.trim().is_empty() => id.to_string(),
            _ => uuid::Uuid::new_v4().to_string(),
        };
        let access_token = self.issue_token(&client_id, Utc::now())?;
        tracing::info!(client = %client_id, url = %self.url, "issued hub connection");
        Ok(ConnectionInfo {
            url: self.url.clone(),
            access_token,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
