use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

use crate::error::{AppError, FieldViolation, Result};

/// Which side of the marketplace a plan is sold to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AccountType {
    Reseller,
    StoreOwner,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PlanTier {
    Tier1,
    Tier2,
    Tier3,
}

/// Catalog entry, keyed uniquely by (account_type, tier).
/// Seeded with defaults at first run; admin-editable; never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    pub id: String,
    pub account_type: AccountType,
    pub tier: PlanTier,
    pub amount: i64,
    pub duration_days: i32,
    pub updated_at: i64,
}

/// One entry of the admin tier-upsert request body.
#[derive(Debug, Clone, Deserialize)]
pub struct UpsertPlanEntry {
    pub account_type: AccountType,
    pub tier: PlanTier,
    pub amount: i64,
    pub duration_days: i32,
}

impl UpsertPlanEntry {
    /// Zero is a valid amount; negative is not. Durations start at one day.
    pub fn validate(&self) -> Result<()> {
        let mut violations = Vec::new();
        if self.amount < 0 {
            violations.push(FieldViolation::new(
                "amount",
                "must be a non-negative number",
            ));
        }
        if self.duration_days < 1 {
            violations.push(FieldViolation::new(
                "duration_days",
                "must be a positive integer",
            ));
        }
        if violations.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(violations))
        }
    }
}

/// Catalog defaults applied at first run when a (type, tier) entry is absent.
pub fn default_plans() -> Vec<UpsertPlanEntry> {
    const TIERS: [(PlanTier, i64, i32); 3] = [
        (PlanTier::Tier1, 10, 30),
        (PlanTier::Tier2, 25, 30),
        (PlanTier::Tier3, 50, 30),
    ];
    let mut plans = Vec::with_capacity(6);
    for account_type in [AccountType::Reseller, AccountType::StoreOwner] {
        for (tier, amount, duration_days) in TIERS {
            plans.push(UpsertPlanEntry {
                account_type,
                tier,
                amount,
                duration_days,
            });
        }
    }
    plans
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_amount_is_valid_negative_is_not() {
        let mut entry = UpsertPlanEntry {
            account_type: AccountType::Reseller,
            tier: PlanTier::Tier2,
            amount: 0,
            duration_days: 30,
        };
        assert!(entry.validate().is_ok());

        entry.amount = -1;
        let err = entry.validate().unwrap_err();
        match err {
            AppError::Validation(v) => assert_eq!(v[0].field, "amount"),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn zero_duration_is_rejected() {
        let entry = UpsertPlanEntry {
            account_type: AccountType::StoreOwner,
            tier: PlanTier::Tier1,
            amount: 10,
            duration_days: 0,
        };
        let err = entry.validate().unwrap_err();
        match err {
            AppError::Validation(v) => assert_eq!(v[0].field, "duration_days"),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn defaults_cover_every_type_tier_pair() {
        let plans = default_plans();
        assert_eq!(plans.len(), 6);
        for p in &plans {
            assert!(p.validate().is_ok());
        }
    }

    #[test]
    fn tier_strings_round_trip() {
        assert_eq!(PlanTier::Tier2.as_ref(), "tier2");
        assert_eq!("tier3".parse::<PlanTier>().unwrap(), PlanTier::Tier3);
        assert_eq!(AccountType::StoreOwner.as_ref(), "store_owner");
        assert_eq!(
            "reseller".parse::<AccountType>().unwrap(),
            AccountType::Reseller
        );
    }
}
