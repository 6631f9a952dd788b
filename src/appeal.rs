//! # Appeal Relay
//!
//! Household appeals are logged first and then fanned out to every admin.
//! Delivery is best effort: each recipient is tried independently and the
//! outcome of every attempt is returned to the caller.

use std::future::Future;

use teloxide::types::UserId;
use tracing::{info, warn};

use crate::content::Appeal;
use crate::errors::StoreError;
use crate::presentation::appeal_notification;
use crate::store::ContentStore;

/// Words that abort an appeal instead of submitting it
const CANCELLATION_KEYWORDS: &[&str] = &["cancel", "stop", "back", "отмена", "стоп", "назад"];

/// Delivers a text message to one user
pub trait Notifier: Send + Sync {
    fn notify(
        &self,
        recipient: UserId,
        text: &str,
    ) -> impl Future<Output = anyhow::Result<()>> + Send;
}

/// Outcome of notifying one admin
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub recipient: UserId,
    pub outcome: Result<(), String>,
}

/// Per-recipient results of a fan-out
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelayReport {
    pub deliveries: Vec<Delivery>,
}

impl RelayReport {
    pub fn delivered(&self) -> usize {
        self.deliveries.iter().filter(|d| d.outcome.is_ok()).count()
    }

    pub fn failed(&self) -> Vec<UserId> {
        self.deliveries
            .iter()
            .filter(|d| d.outcome.is_err())
            .map(|d| d.recipient)
            .collect()
    }
}

/// Returns `true` if the text asks to abort the appeal
pub fn is_cancellation(text: &str) -> bool {
    let normalized = text.trim().trim_start_matches('/').to_lowercase();
    CANCELLATION_KEYWORDS.contains(&normalized.as_str())
}

/// Send `text` to every recipient, continuing past failures
pub async fn fan_out<N: Notifier>(notifier: &N, recipients: &[UserId], text: &str) -> RelayReport {
    let mut report = RelayReport::default();
    for &recipient in recipients {
        let outcome = match notifier.notify(recipient, text).await {
            Ok(()) => Ok(()),
            Err(e) => {
                warn!(admin_id = %recipient, error = %e, "Failed to deliver appeal to admin");
                Err(e.to_string())
            }
        };
        report.deliveries.push(Delivery { recipient, outcome });
    }
    report
}

/// Log an appeal, then notify every admin
///
/// Nothing is sent if the log append fails.
pub async fn relay_appeal<S: ContentStore, N: Notifier>(
    store: &S,
    notifier: &N,
    recipients: &[UserId],
    appeal: &Appeal,
) -> Result<RelayReport, StoreError> {
    store.append_appeal(appeal).await?;

    let report = fan_out(notifier, recipients, &appeal_notification(appeal, None)).await;
    info!(
        user_id = %appeal.sender_id,
        delivered = report.delivered(),
        failed = report.failed().len(),
        "Appeal relayed to admins"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancellation_keywords() {
        assert!(is_cancellation("cancel"));
        assert!(is_cancellation(" Отмена "));
        assert!(is_cancellation("/cancel"));
        assert!(!is_cancellation("cancel my tent booking please"));
    }

    #[test]
    fn test_report_counts() {
        let report = RelayReport {
            deliveries: vec![
                Delivery {
                    recipient: UserId(1),
                    outcome: Ok(()),
                },
                Delivery {
                    recipient: UserId(2),
                    outcome: Err("blocked".to_string()),
                },
            ],
        };
        assert_eq!(report.delivered(), 1);
        assert_eq!(report.failed(), vec![UserId(2)]);
    }
}
