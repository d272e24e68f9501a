//! Shared utility functions for the Bazaar application.

use axum::http::HeaderMap;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use unicode_normalization::UnicodeNormalization;

use crate::models::PlanTier;

pub const SECONDS_PER_DAY: i64 = 86400;

/// Calculated subscription window for a purchase.
#[derive(Debug, Clone, Copy)]
pub struct SubscriptionWindow {
    /// When the subscription started (Unix timestamp)
    pub started_at: i64,
    /// When the entitlement lapses
    pub ends_at: i64,
}

impl SubscriptionWindow {
    /// Compute the window from a plan's duration.
    ///
    /// `base_time` is typically `Utc::now().timestamp()` at purchase.
    pub fn from_duration(duration_days: i32, base_time: i64) -> Self {
        Self {
            started_at: base_time,
            ends_at: base_time + (duration_days as i64) * SECONDS_PER_DAY,
        }
    }

    /// Whether the window still covers `now`.
    pub fn is_active_at(&self, now: i64) -> bool {
        now < self.ends_at
    }
}

/// Slot quota for a tier. The same numeric scale backs both promotion
/// slots (store owners) and scan slots (resellers).
pub fn slot_limit(tier: PlanTier) -> i32 {
    match tier {
        PlanTier::Tier1 => 20,
        PlanTier::Tier2 => 50,
        PlanTier::Tier3 => 100,
    }
}

/// Normalize an email for storage and lookup: NFKC, trimmed, lowercased.
pub fn normalize_email(email: &str) -> String {
    email.nfkc().collect::<String>().trim().to_lowercase()
}

/// Extract a Bearer token from the Authorization header.
///
/// Returns the token string without the "Bearer " prefix, or None if
/// the header is missing, malformed, or empty after the prefix.
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
}

/// Generate an opaque account bearer token. Only the hash is persisted;
/// the plaintext is shown to the caller exactly once.
pub fn generate_api_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    format!("bzr_{}", URL_SAFE_NO_PAD.encode(bytes))
}

/// Hash an account token for storage/lookup.
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(b"bazaar-token-v1:");
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// Constant-time comparison of a presented token against a stored hash.
pub fn token_matches(token: &str, stored_hash: &str) -> bool {
    hash_token(token)
        .as_bytes()
        .ct_eq(stored_hash.as_bytes())
        .into()
}
