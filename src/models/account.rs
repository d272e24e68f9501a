use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

use crate::models::AccountType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AccountRole {
    Admin,
    Reseller,
    StoreOwner,
}

impl AccountRole {
    /// Admins never hold a subscription; the other two roles buy plans
    /// typed to their side of the marketplace.
    pub fn subscribable_type(&self) -> Option<AccountType> {
        match self {
            AccountRole::Admin => None,
            AccountRole::Reseller => Some(AccountType::Reseller),
            AccountRole::StoreOwner => Some(AccountType::StoreOwner),
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, AccountRole::Admin)
    }
}

/// The quota an account currently holds. Two distinct shapes by role:
/// store owners track used against total, resellers only carry a total.
/// Callers must not assume symmetry between the arms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Entitlement {
    Promotions { total: i32, used: i32 },
    Scans { total: i32 },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub email: String,
    pub full_name: String,
    pub role: AccountRole,
    #[serde(skip_serializing)]
    pub api_token_hash: String,
    pub current_subscription_id: Option<String>,
    pub subscription_end_at: Option<i64>,
    pub total_promotion_slots: i32,
    pub used_promotion_slots: i32,
    pub total_scan_slots: i32,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Account {
    /// The counters as the role-shaped sum type. Admins hold no quota.
    pub fn entitlement(&self) -> Option<Entitlement> {
        match self.role {
            AccountRole::Admin => None,
            AccountRole::StoreOwner => Some(Entitlement::Promotions {
                total: self.total_promotion_slots,
                used: self.used_promotion_slots,
            }),
            AccountRole::Reseller => Some(Entitlement::Scans {
                total: self.total_scan_slots,
            }),
        }
    }

    /// Whether the subscription window still covers `now`. This is only
    /// half of the ACTIVE check: the referenced record's status must also
    /// be `completed` (verified against the record where it matters).
    /// Expiry is lazy; counters alone must never gate anything.
    pub fn subscription_window_open(&self, now: i64) -> bool {
        self.current_subscription_id.is_some()
            && self.subscription_end_at.map(|end| now < end).unwrap_or(false)
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateAccount {
    pub email: String,
    pub full_name: String,
    pub role: AccountRole,
}

impl CreateAccount {
    pub fn validate(&self) -> crate::error::Result<()> {
        use crate::error::{AppError, FieldViolation};
        let mut violations = Vec::new();
        if self.email.trim().is_empty() || !self.email.contains('@') {
            violations.push(FieldViolation::new("email", "must be a valid email address"));
        }
        if self.full_name.trim().is_empty() {
            violations.push(FieldViolation::new("full_name", "must not be empty"));
        }
        if violations.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(violations))
        }
    }
}
