//! Badge notifications.
//!
//! Notices are fire-and-forget: a sink that fails to deliver never affects the award that
//! triggered it.

use crate::errors::{Error, Result};
use tokio::sync::mpsc;
use tracing::{info, warn};

/// A badge that was just awarded to a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BadgeNotice {
    /// Internal user key
    pub user_id: i64,
    /// Badge name
    pub badge_name: String,
    /// Badge description
    pub description: String,
    /// Buds the badge pays, 0 for badges without a reward
    pub reward_amount: i64,
}

impl BadgeNotice {
    /// Headline shown to the user.
    #[must_use]
    pub fn title(&self) -> String {
        format!("Badge Earned: {}", self.badge_name)
    }

    /// Description line, with the reward appended when there is one.
    #[must_use]
    pub fn message(&self) -> String {
        if self.reward_amount > 0 {
            format!("{} (+{} buds)", self.description, self.reward_amount)
        } else {
            self.description.clone()
        }
    }
}

/// Sink for badge notices.
pub trait BadgeNotifier: Send + Sync {
    /// Delivers a notice.
    ///
    /// # Errors
    /// Returns [`Error::NotificationFailed`] if the sink cannot accept the notice.
    fn notify(&self, notice: &BadgeNotice) -> Result<()>;
}

/// Writes notices to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl BadgeNotifier for TracingNotifier {
    fn notify(&self, notice: &BadgeNotice) -> Result<()> {
        info!(user_id = notice.user_id, "{}: {}", notice.title(), notice.message());
        Ok(())
    }
}

/// Forwards notices to an in-process channel, e.g. for a UI push task.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    sender: mpsc::UnboundedSender<BadgeNotice>,
}

impl ChannelNotifier {
    /// Creates a notifier and the receiving half of its channel.
    #[must_use]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<BadgeNotice>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl BadgeNotifier for ChannelNotifier {
    fn notify(&self, notice: &BadgeNotice) -> Result<()> {
        self.sender
            .send(notice.clone())
            .map_err(|_| Error::NotificationFailed {
                message: "notification receiver dropped".to_string(),
            })
    }
}

/// Sends a notice and logs, rather than returns, any delivery failure.
pub fn deliver(notifier: &dyn BadgeNotifier, notice: &BadgeNotice) {
    if let Err(e) = notifier.notify(notice) {
        warn!(
            user_id = notice.user_id,
            badge = %notice.badge_name,
            "Failed to deliver badge notice: {e}"
        );
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    fn notice(reward_amount: i64) -> BadgeNotice {
        BadgeNotice {
            user_id: 1,
            badge_name: "Eco Streak".to_string(),
            description: "Logged actions 7 days in a row".to_string(),
            reward_amount,
        }
    }

    #[test]
    fn test_message_includes_reward() {
        assert_eq!(notice(75).title(), "Badge Earned: Eco Streak");
        assert_eq!(
            notice(75).message(),
            "Logged actions 7 days in a row (+75 buds)"
        );
        assert_eq!(notice(0).message(), "Logged actions 7 days in a row");
    }

    #[test]
    fn test_channel_notifier_forwards() {
        let (notifier, mut receiver) = ChannelNotifier::channel();
        notifier.notify(&notice(75)).unwrap();
        assert_eq!(receiver.try_recv().unwrap(), notice(75));
    }

    #[test]
    fn test_closed_channel_fails_without_panicking() {
        let (notifier, receiver) = ChannelNotifier::channel();
        drop(receiver);
        assert!(matches!(
            notifier.notify(&notice(10)),
            Err(Error::NotificationFailed { .. })
        ));
        // Swallowed by deliver
        deliver(&notifier, &notice(10));
    }
}
