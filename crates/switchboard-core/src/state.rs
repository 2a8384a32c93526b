// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation control state machine.
//!
//! Bot enablement, escalation, auto-pin, pinning, and assignment are one
//! [`ConversationControl`] value. [`ConversationControl::apply`] is the only
//! way to derive a new value, so every mutation path (orchestrator turns and
//! admin actions) goes through the same transition table.
//!
//! ```text
//!   Normal ──Escalate──▶ Escalated ──CancelEscalation──▶ Normal
//!   Normal ──AutoPin───▶ AutoPinned ──CancelEscalation─▶ Normal
//!   any ──AdminTookOver / SetBotEnabled(false)──▶ Manual
//!   any ──SetBotEnabled(true)──▶ Normal
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::SwitchboardError;

/// Who is answering the conversation.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum BotState {
    /// Bot replies automatically.
    #[default]
    Normal,
    /// Customer asked for a human; bot suppressed and admins notified.
    Escalated,
    /// Returning customer on an unrecognized topic; bot suppressed, no notification.
    AutoPinned,
    /// An admin took over or switched the bot off; needs explicit re-enable.
    Manual,
}

/// Pin metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pin {
    pub reason: String,
    pub pinned_at: DateTime<Utc>,
}

/// Control state of one conversation.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ConversationControl {
    pub state: BotState,
    pub pin: Option<Pin>,
    pub assigned_admin: Option<String>,
}

/// Everything that can change a conversation's control state.
#[derive(Debug, Clone, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum ControlEvent {
    /// Resolver recognized an explicit request for a human.
    Escalate { reason: String },
    /// Customer sent a cancel phrase while the bot was suppressed.
    CancelEscalation,
    /// Returning customer and the resolver deferred.
    AutoPin { reason: String },
    /// An admin sent a manual message or media.
    AdminTookOver,
    /// Admin bot toggle.
    SetBotEnabled(bool),
    /// Admin pin; re-pinning only updates the reason.
    Pin { reason: String },
    /// Admin unpin.
    Unpin,
    /// Admin assign (`Some`) or unassign (`None`).
    Assign(Option<String>),
}

impl ConversationControl {
    /// Whether the bot may reply automatically.
    pub fn bot_enabled(&self) -> bool {
        self.state == BotState::Normal
    }

    pub fn pinned(&self) -> bool {
        self.pin.is_some()
    }

    pub fn pin_reason(&self) -> Option<&str> {
        self.pin.as_ref().map(|p| p.reason.as_str())
    }

    /// Computes the control state that results from `event`.
    ///
    /// Returns [`SwitchboardError::InvalidTransition`] when the event does not
    /// apply to the current state. Self-loops that change nothing are allowed
    /// for idempotent admin actions.
    pub fn apply(
        &self,
        event: &ControlEvent,
        now: DateTime<Utc>,
    ) -> Result<ConversationControl, SwitchboardError> {
        let mut next = self.clone();
        match event {
            ControlEvent::Escalate { reason } => match self.state {
                BotState::Normal | BotState::Escalated => {
                    next.state = BotState::Escalated;
                    next.pin = Some(self.repin(reason, now));
                }
                _ => return Err(self.invalid(event)),
            },
            ControlEvent::CancelEscalation => match self.state {
                BotState::Escalated | BotState::AutoPinned => {
                    next.state = BotState::Normal;
                    next.pin = None;
                }
                _ => return Err(self.invalid(event)),
            },
            ControlEvent::AutoPin { reason } => match self.state {
                BotState::Normal => {
                    next.state = BotState::AutoPinned;
                    next.pin = Some(self.repin(reason, now));
                }
                _ => return Err(self.invalid(event)),
            },
            ControlEvent::AdminTookOver | ControlEvent::SetBotEnabled(false) => {
                next.state = BotState::Manual;
            }
            ControlEvent::SetBotEnabled(true) => {
                next.state = BotState::Normal;
            }
            ControlEvent::Pin { reason } => {
                next.pin = Some(self.repin(reason, now));
            }
            ControlEvent::Unpin => {
                next.pin = None;
                next.state = match self.state {
                    BotState::AutoPinned => BotState::Normal,
                    // An unpinned escalation is an admin handling it by hand.
                    BotState::Escalated => BotState::Manual,
                    other => other,
                };
            }
            ControlEvent::Assign(admin) => {
                next.assigned_admin = admin.clone();
            }
        }
        Ok(next)
    }

    fn repin(&self, reason: &str, now: DateTime<Utc>) -> Pin {
        Pin {
            reason: reason.to_string(),
            pinned_at: self.pin.as_ref().map_or(now, |p| p.pinned_at),
        }
    }

    fn invalid(&self, event: &ControlEvent) -> SwitchboardError {
        SwitchboardError::InvalidTransition {
            from: self.state.to_string(),
            event: event.to_string(),
        }
    }
}

/// Human-readable reason for an auto-pin, e.g. "returned after 3h 15m".
pub fn gap_reason(gap: chrono::Duration) -> String {
    let minutes = gap.num_minutes().max(0);
    let (days, hours, mins) = (minutes / 1440, (minutes % 1440) / 60, minutes % 60);
    if days > 0 {
        format!("returned after {days}d {hours}h")
    } else if hours > 0 {
        format!("returned after {hours}h {mins}m")
    } else {
        format!("returned after {mins}m")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn escalate(reason: &str) -> ControlEvent {
        ControlEvent::Escalate {
            reason: reason.into(),
        }
    }

    #[test]
    fn escalation_pins_and_disables_bot() {
        let next = ConversationControl::default()
            .apply(&escalate("asked for staff"), now())
            .unwrap();
        assert_eq!(next.state, BotState::Escalated);
        assert!(next.pinned());
        assert!(!next.bot_enabled());
        assert_eq!(next.pin_reason(), Some("asked for staff"));
    }

    #[test]
    fn cancel_restores_normal_and_unpins() {
        let escalated = ConversationControl::default()
            .apply(&escalate("x"), now())
            .unwrap();
        let next = escalated
            .apply(&ControlEvent::CancelEscalation, now())
            .unwrap();
        assert!(next.bot_enabled());
        assert!(!next.pinned());
    }

    #[test]
    fn cancel_from_manual_is_rejected() {
        let manual = ConversationControl::default()
            .apply(&ControlEvent::AdminTookOver, now())
            .unwrap();
        let err = manual
            .apply(&ControlEvent::CancelEscalation, now())
            .unwrap_err();
        assert!(matches!(err, SwitchboardError::InvalidTransition { .. }));
    }

    #[test]
    fn auto_pin_only_from_normal() {
        let pinned = ConversationControl::default()
            .apply(
                &ControlEvent::AutoPin {
                    reason: "returned after 3h 0m".into(),
                },
                now(),
            )
            .unwrap();
        assert_eq!(pinned.state, BotState::AutoPinned);
        assert!(!pinned.bot_enabled());
        assert!(
            pinned
                .apply(&ControlEvent::AutoPin { reason: "again".into() }, now())
                .is_err()
        );
    }

    #[test]
    fn admin_takeover_is_sticky_until_reenabled() {
        let manual = ConversationControl::default()
            .apply(&escalate("x"), now())
            .unwrap()
            .apply(&ControlEvent::AdminTookOver, now())
            .unwrap();
        assert_eq!(manual.state, BotState::Manual);
        assert!(manual.pinned(), "takeover keeps the pin");

        let enabled = manual
            .apply(&ControlEvent::SetBotEnabled(true), now())
            .unwrap();
        assert!(enabled.bot_enabled());
    }

    #[test]
    fn cancel_is_rejected_after_takeover_even_while_pinned() {
        let manual = ConversationControl::default()
            .apply(&escalate("x"), now())
            .unwrap()
            .apply(&ControlEvent::AdminTookOver, now())
            .unwrap();
        assert!(manual.pinned());
        assert!(
            manual
                .apply(&ControlEvent::CancelEscalation, now())
                .is_err()
        );
    }

    #[test]
    fn repin_updates_reason_but_keeps_timestamp() {
        let first = ConversationControl::default()
            .apply(&ControlEvent::Pin { reason: "a".into() }, now())
            .unwrap();
        let later = now() + chrono::Duration::hours(1);
        let second = first
            .apply(&ControlEvent::Pin { reason: "b".into() }, later)
            .unwrap();
        assert_eq!(second.pin_reason(), Some("b"));
        assert_eq!(second.pin.unwrap().pinned_at, now());
    }

    #[test]
    fn unpin_resolves_suppressed_states() {
        let auto = ConversationControl::default()
            .apply(&ControlEvent::AutoPin { reason: "r".into() }, now())
            .unwrap();
        assert_eq!(
            auto.apply(&ControlEvent::Unpin, now()).unwrap().state,
            BotState::Normal
        );

        let escalated = ConversationControl::default()
            .apply(&escalate("r"), now())
            .unwrap();
        assert_eq!(
            escalated.apply(&ControlEvent::Unpin, now()).unwrap().state,
            BotState::Manual
        );
    }

    #[test]
    fn assign_leaves_state_untouched() {
        let assigned = ConversationControl::default()
            .apply(&ControlEvent::Assign(Some("alice".into())), now())
            .unwrap();
        assert_eq!(assigned.assigned_admin.as_deref(), Some("alice"));
        assert!(assigned.bot_enabled());
    }

    #[test]
    fn gap_reason_formats() {
        assert_eq!(gap_reason(chrono::Duration::minutes(195)), "returned after 3h 15m");
        assert_eq!(gap_reason(chrono::Duration::hours(50)), "returned after 2d 2h");
        assert_eq!(gap_reason(chrono::Duration::minutes(5)), "returned after 5m");
    }
}
