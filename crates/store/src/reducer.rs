#![forbid(unsafe_code)]

use livefeed_core::{Action, Direction, Fragment, LedgerMessage, PageVariant, ReducerConfig, ViewState};

/// The batched update reducer, parameterized by entity kind, scope and threshold.
///
/// `reduce` is pure: it never performs I/O, never panics, and returns a fresh
/// state value for every transition. Batch actions for another entity and
/// unknown actions return the input unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchedReducer {
    config: ReducerConfig,
}

impl BatchedReducer {
    pub fn new(config: ReducerConfig) -> Self { Self { config } }

    pub fn for_variant(variant: PageVariant) -> Self { Self::new(variant.config()) }

    pub fn config(&self) -> &ReducerConfig { &self.config }

    pub fn initial_state(&self) -> ViewState { ViewState::default() }

    pub fn reduce(&self, state: &ViewState, action: &Action) -> ViewState {
        match action {
            Action::PageLoad(fields) | Action::ElementsLoad(fields) => state.clone().with_bootstrap(fields),
            Action::ChannelDisconnected => {
                if state.beyond_page_one {
                    return state.clone();
                }
                ViewState { channel_disconnected: true, pending_batch: Vec::new(), ..state.clone() }
            }
            Action::NavigatingAway => ViewState { navigating_away: true, ..state.clone() },
            Action::ReceivedNewFeePaymentBatch { .. } | Action::ReceivedNewForwardTransferBatch { .. } => {
                match action.batch() {
                    Some((entity, msgs)) if entity == self.config.entity => self.merge(state, msgs),
                    _ => state.clone(),
                }
            }
            Action::Unknown => state.clone(),
        }
    }

    /// Fold one delivery into the state: filter, project, reverse, then either
    /// render directly or accumulate into the pending batch.
    fn merge(&self, state: &ViewState, msgs: &[LedgerMessage]) -> ViewState {
        if state.channel_disconnected || state.beyond_page_one {
            return state.clone();
        }

        let mut incoming: Vec<Fragment> = msgs
            .iter()
            .filter(|m| !self.config.has_address_filter || passes_filter(state, m))
            .map(|m| self.config.project(m))
            .collect();
        incoming.reverse();

        let mut next = state.clone();
        if state.pending_batch.is_empty() && incoming.len() < self.config.threshold {
            next.items = prepend(incoming, &state.items);
        } else {
            next.pending_batch = prepend(incoming, &state.pending_batch);
        }
        if self.config.has_running_count {
            next.running_count = Some(state.running_count.unwrap_or(0).saturating_add(msgs.len() as u64));
        }
        next
    }
}

/// Direction filter. A message or state missing the compared hash never matches.
fn passes_filter(state: &ViewState, msg: &LedgerMessage) -> bool {
    let side = match state.filter {
        None => return true,
        Some(Direction::To) => msg.to_address_hash.as_deref(),
        Some(Direction::From) => msg.from_address_hash.as_deref(),
    };
    match (side, state.address_hash.as_deref()) {
        (Some(hash), Some(subject)) => hash == subject,
        _ => false,
    }
}

fn prepend(mut head: Vec<Fragment>, tail: &[Fragment]) -> Vec<Fragment> {
    head.extend_from_slice(tail);
    head
}
