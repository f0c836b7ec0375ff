use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationKind {
    PriceAlert,
    System,
    Account,
}

impl NotificationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PriceAlert => "PRICE_ALERT",
            Self::System => "SYSTEM",
            Self::Account => "ACCOUNT",
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NotificationKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PRICE_ALERT" => Ok(Self::PriceAlert),
            "SYSTEM" => Ok(Self::System),
            "ACCOUNT" => Ok(Self::Account),
            other => Err(anyhow!("unknown notification kind: {other}")),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Channel {
    Email,
    Webhook,
    InApp,
}

impl Channel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Email => "EMAIL",
            Self::Webhook => "WEBHOOK",
            Self::InApp => "IN_APP",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Channel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "EMAIL" => Ok(Self::Email),
            "WEBHOOK" => Ok(Self::Webhook),
            "IN_APP" => Ok(Self::InApp),
            other => Err(anyhow!("unknown notification channel: {other}")),
        }
    }
}

/// Delivery state. `Pending` moves to exactly one of the terminal states.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationStatus {
    Pending,
    Sent,
    Failed,
}

impl NotificationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Sent => "SENT",
            Self::Failed => "FAILED",
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl fmt::Display for NotificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NotificationStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "SENT" => Ok(Self::Sent),
            "FAILED" => Ok(Self::Failed),
            other => Err(anyhow!("unknown notification status: {other}")),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    /// Weak reference: cleared when the alert is deleted.
    pub alert_id: Option<Uuid>,
    pub kind: NotificationKind,
    pub channel: Channel,
    pub subject: String,
    pub body: String,
    pub status: NotificationStatus,
    pub sent_at: Option<DateTime<Utc>>,
    /// Last delivery error; empty unless `status` is `Failed`.
    pub error_message: String,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl NotificationRecord {
    /// A fresh email notification awaiting its first delivery attempt.
    pub fn pending(
        user_id: Uuid,
        alert_id: Option<Uuid>,
        kind: NotificationKind,
        subject: impl Into<String>,
        body: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            alert_id,
            kind,
            channel: Channel::Email,
            subject: subject.into(),
            body: body.into(),
            status: NotificationStatus::Pending,
            sent_at: None,
            error_message: String::new(),
            read_at: None,
            created_at: now,
        }
    }

    pub fn is_read(&self) -> bool {
        self.read_at.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_parse_back() {
        for k in [
            NotificationKind::PriceAlert,
            NotificationKind::System,
            NotificationKind::Account,
        ] {
            assert_eq!(k.as_str().parse::<NotificationKind>().unwrap(), k);
        }
        for c in [Channel::Email, Channel::Webhook, Channel::InApp] {
            assert_eq!(c.as_str().parse::<Channel>().unwrap(), c);
        }
        for s in [
            NotificationStatus::Pending,
            NotificationStatus::Sent,
            NotificationStatus::Failed,
        ] {
            assert_eq!(s.as_str().parse::<NotificationStatus>().unwrap(), s);
        }
        assert!("SMS".parse::<Channel>().is_err());
    }

    #[test]
    fn pending_record_defaults() {
        let n = NotificationRecord::pending(
            Uuid::new_v4(),
            None,
            NotificationKind::System,
            "hi",
            "body",
            Utc::now(),
        );
        assert_eq!(n.status, NotificationStatus::Pending);
        assert_eq!(n.channel, Channel::Email);
        assert!(!n.status.is_terminal());
        assert!(n.error_message.is_empty());
        assert!(!n.is_read());
    }
}
