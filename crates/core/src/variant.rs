#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};

use crate::{Fragment, LedgerMessage, LiveFeedError, LiveFeedResult};

/// Group size at or above which a delivery is deferred instead of rendered.
pub const BATCH_THRESHOLD: usize = 10;

/// The streamed domain object of a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    FeePayment,
    ForwardTransfer,
}

impl EntityKind {
    pub fn batch_action_tag(&self) -> &'static str {
        match self {
            EntityKind::FeePayment => "RECEIVED_NEW_FEE_PAYMENT_BATCH",
            EntityKind::ForwardTransfer => "RECEIVED_NEW_FORWARD_TRANSFER_BATCH",
        }
    }

    /// Transport event name carrying this entity.
    pub fn event_name(&self) -> &'static str {
        match self {
            EntityKind::FeePayment => "fee_payment",
            EntityKind::ForwardTransfer => "forward_transfer",
        }
    }

    pub fn global_topic(&self) -> &'static str {
        match self {
            EntityKind::FeePayment => "fee-payments:new_transaction",
            EntityKind::ForwardTransfer => "forward-transfers:new_transaction",
        }
    }

    /// Entity-specific rendered field, used by address-scoped pages.
    pub fn entity_html<'a>(&self, msg: &'a LedgerMessage) -> Option<&'a str> {
        match self {
            EntityKind::FeePayment => msg.fee_payment_html.as_deref(),
            EntityKind::ForwardTransfer => msg.forward_transfer_html.as_deref(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    /// All entities; keeps a running total.
    Global,
    /// One address; supports direction filtering.
    Address,
}

/// Parameters of one batched update reducer instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReducerConfig {
    pub entity: EntityKind,
    pub has_address_filter: bool,
    pub has_running_count: bool,
    pub threshold: usize,
}

impl ReducerConfig {
    pub fn new(entity: EntityKind, scope: Scope) -> Self {
        Self {
            entity,
            has_address_filter: scope == Scope::Address,
            has_running_count: scope == Scope::Global,
            threshold: BATCH_THRESHOLD,
        }
    }

    pub fn with_threshold(mut self, threshold: usize) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn scope(&self) -> Scope {
        if self.has_address_filter { Scope::Address } else { Scope::Global }
    }

    /// Display fragment for a message. Global pages render `transaction_html`,
    /// address pages the entity-specific field. Absent fields give an empty fragment.
    pub fn project(&self, msg: &LedgerMessage) -> Fragment {
        let html = if self.has_address_filter {
            self.entity.entity_html(msg)
        } else {
            msg.transaction_html.as_deref()
        };
        Fragment(html.unwrap_or_default().to_string())
    }
}

/// The four list pages that stream live entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PageVariant {
    FeePayments,
    ForwardTransfers,
    AddressFeePayments,
    AddressForwardTransfers,
}

impl PageVariant {
    pub const ALL: [PageVariant; 4] = [
        PageVariant::FeePayments,
        PageVariant::ForwardTransfers,
        PageVariant::AddressFeePayments,
        PageVariant::AddressForwardTransfers,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            PageVariant::FeePayments => "fee-payments",
            PageVariant::ForwardTransfers => "forward-transfers",
            PageVariant::AddressFeePayments => "address-fee-payments",
            PageVariant::AddressForwardTransfers => "address-forward-transfers",
        }
    }

    pub fn entity(&self) -> EntityKind {
        match self {
            PageVariant::FeePayments | PageVariant::AddressFeePayments => EntityKind::FeePayment,
            PageVariant::ForwardTransfers | PageVariant::AddressForwardTransfers => EntityKind::ForwardTransfer,
        }
    }

    pub fn scope(&self) -> Scope {
        match self {
            PageVariant::FeePayments | PageVariant::ForwardTransfers => Scope::Global,
            PageVariant::AddressFeePayments | PageVariant::AddressForwardTransfers => Scope::Address,
        }
    }

    pub fn config(&self) -> ReducerConfig { ReducerConfig::new(self.entity(), self.scope()) }

    /// `data-page` marker identifying the page in the document.
    pub fn page_marker(&self) -> &'static str {
        match self {
            PageVariant::FeePayments => "fee-payment-list",
            PageVariant::ForwardTransfers => "forward-transfer-list",
            PageVariant::AddressFeePayments => "address-fee-payments",
            PageVariant::AddressForwardTransfers => "address-forward-transfers",
        }
    }

    /// Path the list store uses to read a row's identifier.
    pub fn identifier_path(&self) -> &'static str {
        match self {
            PageVariant::FeePayments => "dataset.identifierHash",
            _ => "dataset.identifier",
        }
    }

    /// Transport topic. Address pages subscribe to `addresses:<hash>`.
    pub fn topic(&self, address_hash: Option<&str>) -> LiveFeedResult<String> {
        match self.scope() {
            Scope::Global => Ok(self.entity().global_topic().to_string()),
            Scope::Address => match address_hash {
                Some(h) if !h.is_empty() => Ok(format!("addresses:{}", h)),
                _ => Err(LiveFeedError::MissingAddress(self.name())),
            },
        }
    }
}

impl std::fmt::Display for PageVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { f.write_str(self.name()) }
}

impl std::str::FromStr for PageVariant {
    type Err = LiveFeedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PageVariant::ALL
            .iter()
            .copied()
            .find(|v| v.name() == s || v.page_marker() == s)
            .ok_or_else(|| LiveFeedError::InvalidVariant(s.to_string()))
    }
}
