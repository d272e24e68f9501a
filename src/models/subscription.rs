use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

use crate::error::{AppError, FieldViolation, Result};
use crate::models::{AccountType, PlanTier};

/// Terminal and in-flight states of a purchase record. `Cancelled` and
/// `PaymentFailed` are distinct causes of non-active termination.
/// `Pending` exists in the domain but is never produced by the current
/// flows (payment capture is synchronous).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SubscriptionStatus {
    Completed,
    Cancelled,
    PaymentFailed,
    Pending,
}

/// What survives of the payment instrument: holder and expiry only.
/// The card number and CVC are validated in transit and then dropped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentMethodSummary {
    pub card_holder: String,
    pub expiry_month: String,
    pub expiry_year: String,
}

/// One purchase/renewal attempt. Never physically deleted; superseded
/// records become history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionRecord {
    pub id: String,
    pub order_id: String,
    pub account_id: String,
    pub account_type: AccountType,
    pub tier: PlanTier,
    pub amount: i64,
    pub status: SubscriptionStatus,
    pub started_at: i64,
    pub duration_days: i32,
    #[serde(flatten)]
    pub payment_method: PaymentMethodSummary,
}

/// Conceptual lifecycle state of an account's subscription. Nothing
/// stores this; it is derived at read time from the current record and
/// the account's end timestamp (expiry is lazy, there is no sweeper).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SubscriptionState {
    None,
    Active,
    Expired,
    Cancelled,
}

/// ACTIVE iff a current record exists, its status is `completed`, and
/// the end timestamp is still in the future.
pub fn derive_subscription_state(
    record: Option<&SubscriptionRecord>,
    end_at: Option<i64>,
    now: i64,
) -> SubscriptionState {
    match record {
        None => SubscriptionState::None,
        Some(r) => match r.status {
            SubscriptionStatus::Completed => {
                if end_at.map(|end| now < end).unwrap_or(false) {
                    SubscriptionState::Active
                } else {
                    SubscriptionState::Expired
                }
            }
            SubscriptionStatus::Cancelled => SubscriptionState::Cancelled,
            SubscriptionStatus::PaymentFailed | SubscriptionStatus::Pending => {
                SubscriptionState::None
            }
        },
    }
}

/// Payment instrument as submitted by the caller. Card number and CVC
/// never leave this struct: not persisted, not logged, not echoed in
/// errors. The Debug impl is accordingly redacted.
#[derive(Clone, Deserialize)]
pub struct PaymentMethod {
    pub card_number: String,
    pub card_holder: String,
    pub expiry_month: String,
    pub expiry_year: String,
    pub cvc: String,
}

impl std::fmt::Debug for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentMethod")
            .field("card_number", &"[redacted]")
            .field("card_holder", &self.card_holder)
            .field("expiry_month", &self.expiry_month)
            .field("expiry_year", &self.expiry_year)
            .field("cvc", &"[redacted]")
            .finish()
    }
}

impl PaymentMethod {
    /// Shape-check every field, reporting all violations at once.
    pub fn validate(&self) -> Result<()> {
        let mut violations = Vec::new();

        if self.card_number.len() != 16 || !self.card_number.chars().all(|c| c.is_ascii_digit()) {
            violations.push(FieldViolation::new(
                "card_number",
                "must be a 16-digit number",
            ));
        }
        if self.card_holder.trim().is_empty() {
            violations.push(FieldViolation::new("card_holder", "must not be empty"));
        }
        let month_ok = self.expiry_month.len() == 2
            && self
                .expiry_month
                .parse::<u8>()
                .map(|m| (1..=12).contains(&m))
                .unwrap_or(false);
        if !month_ok {
            violations.push(FieldViolation::new(
                "expiry_month",
                "must be a two-digit month between 01 and 12",
            ));
        }
        if self.expiry_year.len() != 4 || !self.expiry_year.chars().all(|c| c.is_ascii_digit()) {
            violations.push(FieldViolation::new(
                "expiry_year",
                "must be a four-digit year",
            ));
        }
        if !(3..=4).contains(&self.cvc.len()) || !self.cvc.chars().all(|c| c.is_ascii_digit()) {
            violations.push(FieldViolation::new("cvc", "must be a 3 or 4 digit code"));
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(violations))
        }
    }

    /// The persistable remainder once the sensitive fields are dropped.
    pub fn summary(&self) -> PaymentMethodSummary {
        PaymentMethodSummary {
            card_holder: self.card_holder.trim().to_string(),
            expiry_month: self.expiry_month.clone(),
            expiry_year: self.expiry_year.clone(),
        }
    }
}
