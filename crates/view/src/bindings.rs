#![forbid(unsafe_code)]

use livefeed_core::{BootstrapFields, EntityKind, PageVariant, Scope, ViewState};

use crate::{format_count, parse_count, ElementBinding, ElementSnapshot, Surface};

pub const DISCONNECTED_MESSAGE: &str = r#"[data-selector="channel-disconnected-message"]"#;
pub const BATCHING_COUNT: &str = r#"[data-selector="channel-batching-count"]"#;
pub const BATCHING_MESSAGE: &str = r#"[data-selector="channel-batching-message"]"#;
pub const FILTER_DROPDOWN: &str = r#"[data-test="filter_dropdown"]"#;
pub const FEE_PAYMENT_COUNT: &str = r#"[data-selector="fee-payment-count"]"#;
pub const FORWARD_TRANSFER_COUNT: &str = r#"[data-selector="forward-transfer-count"]"#;

/// Class keeping the filter dropdown visible on an empty filtered listing.
pub const NO_REMOVE_CLASS: &str = "no-rm";

pub fn count_selector(entity: EntityKind) -> &'static str {
    match entity {
        EntityKind::FeePayment => FEE_PAYMENT_COUNT,
        EntityKind::ForwardTransfer => FORWARD_TRANSFER_COUNT,
    }
}

pub fn bindings_for(variant: PageVariant) -> Vec<Box<dyn ElementBinding>> {
    let mut out: Vec<Box<dyn ElementBinding>> = vec![Box::new(DisconnectedMessage), Box::new(BatchingCount)];
    match variant.scope() {
        Scope::Global => out.push(Box::new(RunningCount { selector: count_selector(variant.entity()) })),
        Scope::Address => out.push(Box::new(FilterDropdown)),
    }
    out
}

/// Disconnect banner. Shown once the channel failed, unless the page is being left.
pub struct DisconnectedMessage;

impl ElementBinding for DisconnectedMessage {
    fn selector(&self) -> &str { DISCONNECTED_MESSAGE }

    fn render(&self, surface: &mut dyn Surface, state: &ViewState, _prev: &ViewState) {
        if state.channel_disconnected && !state.navigating_away {
            surface.show(DISCONNECTED_MESSAGE);
        }
    }
}

/// "N new items" indicator for the pending batch.
pub struct BatchingCount;

impl ElementBinding for BatchingCount {
    fn selector(&self) -> &str { BATCHING_COUNT }

    fn render(&self, surface: &mut dyn Surface, state: &ViewState, _prev: &ViewState) {
        if state.pending_batch.is_empty() {
            surface.hide(BATCHING_MESSAGE);
            return;
        }
        surface.show(BATCHING_MESSAGE);
        surface.set_text(BATCHING_COUNT, &format_count(state.pending_batch.len() as u64));
    }
}

/// Running total on global pages; seeded from the server-rendered count.
pub struct RunningCount {
    selector: &'static str,
}

impl RunningCount {
    pub fn new(entity: EntityKind) -> Self { Self { selector: count_selector(entity) } }
}

impl ElementBinding for RunningCount {
    fn selector(&self) -> &str { self.selector }

    fn load(&self, page: &ElementSnapshot) -> Option<BootstrapFields> {
        let count = parse_count(page.text(self.selector)?)?;
        Some(BootstrapFields { running_count: Some(count), ..Default::default() })
    }

    fn render(&self, surface: &mut dyn Surface, state: &ViewState, prev: &ViewState) {
        if state.running_count == prev.running_count {
            return;
        }
        if let Some(n) = state.running_count {
            surface.set_text(self.selector, &format_count(n));
        }
    }
}

/// Direction filter dropdown on address pages.
pub struct FilterDropdown;

impl ElementBinding for FilterDropdown {
    fn selector(&self) -> &str { FILTER_DROPDOWN }

    fn render(&self, surface: &mut dyn Surface, state: &ViewState, _prev: &ViewState) {
        if state.empty_response && !state.is_search {
            if state.filter.is_some() {
                surface.add_class(FILTER_DROPDOWN, NO_REMOVE_CLASS);
            } else {
                surface.hide(FILTER_DROPDOWN);
                return;
            }
        } else {
            surface.remove_class(FILTER_DROPDOWN, NO_REMOVE_CLASS);
        }
        surface.show(FILTER_DROPDOWN);
    }
}
