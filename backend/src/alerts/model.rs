use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConditionType {
    PriceAbove,
    PriceBelow,
    /// Threshold is a percentage move against a baseline price.
    PercentChange,
}

impl ConditionType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PriceAbove => "PRICE_ABOVE",
            Self::PriceBelow => "PRICE_BELOW",
            Self::PercentChange => "PERCENT_CHANGE",
        }
    }

    /// Human-readable name used in notification text.
    pub fn label(self) -> &'static str {
        match self {
            Self::PriceAbove => "Price Above",
            Self::PriceBelow => "Price Below",
            Self::PercentChange => "Percent Change",
        }
    }
}

impl fmt::Display for ConditionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConditionType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PRICE_ABOVE" => Ok(Self::PriceAbove),
            "PRICE_BELOW" => Ok(Self::PriceBelow),
            "PERCENT_CHANGE" => Ok(Self::PercentChange),
            other => Err(anyhow!("unknown condition type: {other}")),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    pub id: Uuid,
    pub user_id: Uuid,
    pub stock_id: Uuid,
    pub condition: ConditionType,
    /// Always > 0.
    pub threshold: Decimal,
    /// Deactivated after its first trigger.
    pub one_time: bool,
    pub is_active: bool,
    pub triggered_at: Option<DateTime<Utc>>,
    pub last_checked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Alert {
    /// Eligible for evaluation.
    pub fn is_pending(&self) -> bool {
        self.is_active && self.triggered_at.is_none()
    }
}

#[derive(Clone, Debug)]
pub struct NewAlert {
    pub user_id: Uuid,
    pub stock_id: Uuid,
    pub condition: ConditionType,
    pub threshold: Decimal,
    pub one_time: bool,
}

impl NewAlert {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.threshold <= Decimal::ZERO {
            return Err(ValidationError::NonPositiveThreshold);
        }
        if self.condition == ConditionType::PercentChange && self.threshold > Decimal::ONE_HUNDRED {
            return Err(ValidationError::PercentOutOfRange);
        }
        Ok(())
    }
}

/// An alert joined with what evaluation and notification text need.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AlertContext {
    pub alert: Alert,
    pub symbol: String,
    pub stock_name: String,
    pub user_email: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_alert(condition: ConditionType, threshold: Decimal) -> NewAlert {
        NewAlert {
            user_id: Uuid::new_v4(),
            stock_id: Uuid::new_v4(),
            condition,
            threshold,
            one_time: true,
        }
    }

    #[test]
    fn threshold_must_be_positive() {
        assert_eq!(
            new_alert(ConditionType::PriceAbove, Decimal::ZERO).validate(),
            Err(ValidationError::NonPositiveThreshold)
        );
        assert_eq!(
            new_alert(ConditionType::PriceBelow, Decimal::new(-5, 0)).validate(),
            Err(ValidationError::NonPositiveThreshold)
        );
        assert!(new_alert(ConditionType::PriceAbove, Decimal::new(1, 2)).validate().is_ok());
    }

    #[test]
    fn percent_threshold_capped_at_hundred() {
        assert!(new_alert(ConditionType::PercentChange, Decimal::ONE_HUNDRED).validate().is_ok());
        assert_eq!(
            new_alert(ConditionType::PercentChange, Decimal::new(10001, 2)).validate(),
            Err(ValidationError::PercentOutOfRange)
        );
        // absolute price thresholds have no upper bound
        assert!(new_alert(ConditionType::PriceAbove, Decimal::new(5000, 0)).validate().is_ok());
    }

    #[test]
    fn condition_labels() {
        assert_eq!(ConditionType::PriceBelow.label(), "Price Below");
        assert_eq!(
            "PERCENT_CHANGE".parse::<ConditionType>().unwrap(),
            ConditionType::PercentChange
        );
        assert!("PRICE_EQUALS".parse::<ConditionType>().is_err());
    }
}
