//! View-model for the attestation badge strip.
//!
//! The board owns an explicit per-tag status arena; what a badge looks like
//! is derived from that state and from the palette hash, never from
//! per-render randomness. Actual drawing belongs to the host page.

use std::collections::HashMap;

use poll_types::Identity;

use crate::palette::{self, PaletteSlot};

/// Visual status of one badge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BadgeStatus {
    /// Attested and settled.
    Confirmed,
    /// Toggle-to-add submitted, not yet acknowledged.
    PendingAdd,
    /// Toggle-to-remove submitted, not yet acknowledged.
    PendingRemove,
}

impl BadgeStatus {
    pub fn is_pending(self) -> bool {
        matches!(self, BadgeStatus::PendingAdd | BadgeStatus::PendingRemove)
    }
}

/// One renderable badge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Badge {
    pub label: String,
    pub slot: PaletteSlot,
    pub status: BadgeStatus,
}

/// The affordance rendered next to the badges on an interactive board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Composer {
    /// Identity connected: offer an input to attest a new tag.
    TagInput,
    /// No identity: offer to connect one first.
    ConnectPrompt,
}

/// Everything the host needs to draw the strip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardView {
    pub badges: Vec<Badge>,
    pub composer: Option<Composer>,
}

/// A toggle the host should submit to its attestation backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToggleAction {
    Add(String),
    Remove(String),
}

/// Ordered tag list plus per-tag status.
///
/// Duplicate tags are allowed and render independently; they share one
/// status entry since status is keyed by the tag string.
#[derive(Debug)]
pub struct AttestationBoard {
    tags: Vec<String>,
    status: HashMap<String, BadgeStatus>,
    interactive: bool,
}

impl AttestationBoard {
    /// A board seeded with already-attested tags.
    pub fn new(tags: Vec<String>, interactive: bool) -> Self {
        let status = tags
            .iter()
            .map(|t| (t.clone(), BadgeStatus::Confirmed))
            .collect();
        Self {
            tags,
            status,
            interactive,
        }
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    /// Start toggling `tag`: queue an add for an unknown tag, a removal for a
    /// confirmed one. Returns `None` on a non-interactive board or while the
    /// tag already has a toggle in flight.
    pub fn begin_toggle(&mut self, tag: &str) -> Option<ToggleAction> {
        if !self.interactive {
            return None;
        }
        match self.status.get(tag).copied() {
            Some(status) if status.is_pending() => None,
            Some(BadgeStatus::Confirmed) => {
                self.status.insert(tag.to_string(), BadgeStatus::PendingRemove);
                Some(ToggleAction::Remove(tag.to_string()))
            }
            _ => {
                self.tags.push(tag.to_string());
                self.status.insert(tag.to_string(), BadgeStatus::PendingAdd);
                Some(ToggleAction::Add(tag.to_string()))
            }
        }
    }

    /// Settle a pending toggle: `accepted` confirms it, otherwise the board
    /// rolls back to the pre-toggle state.
    pub fn resolve_toggle(&mut self, tag: &str, accepted: bool) {
        match self.status.get(tag).copied() {
            Some(BadgeStatus::PendingAdd) => {
                if accepted {
                    self.status.insert(tag.to_string(), BadgeStatus::Confirmed);
                } else {
                    self.remove_tag(tag);
                }
            }
            Some(BadgeStatus::PendingRemove) => {
                if accepted {
                    self.remove_tag(tag);
                } else {
                    self.status.insert(tag.to_string(), BadgeStatus::Confirmed);
                }
            }
            _ => {}
        }
    }

    /// Snapshot for rendering. Colors come from the palette hash, statuses
    /// from the arena, and the composer from whether an identity is present.
    pub fn view(&self, identity: Option<&Identity>) -> BoardView {
        let badges = self
            .tags
            .iter()
            .map(|tag| Badge {
                label: tag.clone(),
                slot: palette::slot(tag),
                status: self
                    .status
                    .get(tag)
                    .copied()
                    .unwrap_or(BadgeStatus::Confirmed),
            })
            .collect();
        let composer = if self.interactive {
            Some(if identity.is_some() {
                Composer::TagInput
            } else {
                Composer::ConnectPrompt
            })
        } else {
            None
        };
        BoardView { badges, composer }
    }

    fn remove_tag(&mut self, tag: &str) {
        self.tags.retain(|t| t != tag);
        self.status.remove(tag);
    }
}
