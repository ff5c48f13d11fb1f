// Popup lifecycle: round-summary and game-over notice visibility.
//
// The two popups are tracked independently; either can be up while the other
// is not. Nothing here knows how a popup is drawn.

use serde::Serialize;

use crate::protocol::{ReadyResponse, Snapshot};

/// The round-summary popup as it is currently shown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoundSummary {
    /// Authority-supplied HTML fragment.
    pub html: String,
    /// Whether the viewer is in the ready set.
    pub viewer_ready: bool,
    /// Captured when the popup was shown; switches the ready labels to the
    /// new-game wording.
    pub game_over: bool,
}

impl RoundSummary {
    /// Label for the ready-toggle control.
    pub fn ready_label(&self) -> &'static str {
        ready_label(self.game_over, self.viewer_ready)
    }
}

pub fn ready_label(game_over: bool, viewer_ready: bool) -> &'static str {
    match (game_over, viewer_ready) {
        (true, true) => "Cancel New Game",
        (true, false) => "Ready for New Game",
        (false, true) => "Cancel Ready",
        (false, false) => "I'm Ready",
    }
}

/// What a single observation changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PopupChange {
    pub summary_shown: bool,
    /// The round is no longer over, so the summary went away. The caller
    /// also clears the last-played display.
    pub summary_dismissed: bool,
    pub notice_shown: bool,
}

/// Outcome of a ready toggle, once applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadyOutcome {
    pub viewer_ready: bool,
    pub label: &'static str,
    /// Everyone is ready: the summary has been dismissed and the caller must
    /// clear the action log and reconcile immediately.
    pub all_ready: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PopupLifecycle {
    summary: Option<RoundSummary>,
    notice: Option<String>,
}

impl PopupLifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply the popup transitions for one snapshot.
    ///
    /// `restart` is the round-restart edge computed by the reconciler; a
    /// summary is never shown on that edge.
    pub fn observe(&mut self, snapshot: &Snapshot, viewer: Option<&str>, restart: bool) -> PopupChange {
        let mut change = PopupChange::default();

        if self.summary.is_some() && !snapshot.round_ended {
            self.summary = None;
            change.summary_dismissed = true;
        }

        if snapshot.round_ended && !restart && self.summary.is_none() {
            if let Some(html) = snapshot.round_summary() {
                let viewer_ready =
                    viewer.is_some_and(|v| snapshot.ready_players.iter().any(|p| p == v));
                self.summary = Some(RoundSummary {
                    html: html.to_string(),
                    viewer_ready,
                    game_over: snapshot.game_over,
                });
                change.summary_shown = true;
            }
        }

        if self.notice.is_none() {
            if let Some(html) = snapshot.game_over_notice() {
                self.notice = Some(html.to_string());
                change.notice_shown = true;
            }
        }

        change
    }

    /// Fold the authority's answer to a ready toggle into the popup.
    ///
    /// Applying the same response twice leaves the same state.
    pub fn apply_ready(&mut self, response: &ReadyResponse, viewer: &str) -> ReadyOutcome {
        let viewer_ready = response.includes(viewer);
        let game_over = self.summary.as_ref().is_some_and(|s| s.game_over);

        if let Some(summary) = self.summary.as_mut() {
            summary.viewer_ready = viewer_ready;
        }
        if response.all_ready {
            self.summary = None;
        }

        ReadyOutcome {
            viewer_ready,
            label: ready_label(game_over, viewer_ready),
            all_ready: response.all_ready,
        }
    }

    /// Dismiss the game-over notice. Only explicit acknowledgment does this.
    pub fn acknowledge_notice(&mut self) -> bool {
        self.notice.take().is_some()
    }

    pub fn round_summary(&self) -> Option<&RoundSummary> {
        self.summary.as_ref()
    }

    pub fn game_over_notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    /// Forget both popups (session end).
    pub fn reset(&mut self) {
        self.summary = None;
        self.notice = None;
    }
}
