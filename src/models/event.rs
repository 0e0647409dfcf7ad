//! Events the core publishes to the presentation layer.

use super::card::Card;

/// Notification broadcast by the core.
#[derive(Debug, Clone, PartialEq)]
pub enum CoreEvent {
    /// Fired once per successful admission.
    CardCreated(Card),
    ShowPanel,
    HidePanel,
}
