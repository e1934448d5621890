//! livefeed core types: live ledger messages, per-page view state, reducer actions
//! and the page variants that parameterize the batched update reducer.

#![forbid(unsafe_code)]

use serde::{Deserialize, Deserializer, Serialize};

pub mod action;
pub mod variant;

pub use action::Action;
pub use variant::{EntityKind, PageVariant, ReducerConfig, Scope, BATCH_THRESHOLD};

/// Errors raised at the fallible edges (parsing flags, building topics, decoding payloads).
/// The reducer itself never returns one.
#[derive(Debug, thiserror::Error)]
pub enum LiveFeedError {
    #[error("invalid direction filter: {0} (expected \"to\" or \"from\")")]
    InvalidDirection(String),
    #[error("invalid page variant: {0}")]
    InvalidVariant(String),
    #[error("page variant {0} is address-scoped and needs an address hash")]
    MissingAddress(&'static str),
    #[error("decode: {0}")]
    Decode(#[from] serde_json::Error),
}

pub type LiveFeedResult<T> = Result<T, LiveFeedError>;

/// Pre-rendered display fragment for one list row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fragment(pub String);

impl Fragment {
    pub fn as_str(&self) -> &str { &self.0 }
}

impl From<&str> for Fragment {
    fn from(s: &str) -> Self { Self(s.to_string()) }
}

impl From<String> for Fragment {
    fn from(s: String) -> Self { Self(s) }
}

/// One live ledger event as delivered by the transport.
///
/// Keys are accepted in wire casing (`to_address_hash`) and in normalized casing
/// (`toAddressHash`); when both are present the wire key wins. Fields holding
/// anything other than a string decode as `None`, so a malformed message never
/// fails the whole delivery.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LedgerMessage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_address_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_address_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_html: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fee_payment_html: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub forward_transfer_html: Option<String>,
}

impl LedgerMessage {
    pub fn from_value(v: serde_json::Value) -> LiveFeedResult<Self> {
        Ok(serde_json::from_value(v)?)
    }
}

impl<'de> Deserialize<'de> for LedgerMessage {
    fn deserialize<D: Deserializer<'de>>(de: D) -> Result<Self, D::Error> {
        let map = serde_json::Map::<String, serde_json::Value>::deserialize(de)?;
        let field = |wire: &str, normalized: &str| {
            [wire, normalized]
                .into_iter()
                .find_map(|k| map.get(k).and_then(serde_json::Value::as_str))
                .map(str::to_string)
        };
        Ok(Self {
            to_address_hash: field("to_address_hash", "toAddressHash"),
            from_address_hash: field("from_address_hash", "fromAddressHash"),
            transaction_html: field("transaction_html", "transactionHtml"),
            fee_payment_html: field("fee_payment_html", "feePaymentHtml"),
            forward_transfer_html: field("forward_transfer_html", "forwardTransferHtml"),
        })
    }
}

/// Direction filter for address-scoped pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    To,
    From,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::To => "to",
            Direction::From => "from",
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { f.write_str(self.as_str()) }
}

impl std::str::FromStr for Direction {
    type Err = LiveFeedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "to" => Ok(Direction::To),
            "from" => Ok(Direction::From),
            other => Err(LiveFeedError::InvalidDirection(other.to_string())),
        }
    }
}

/// Values scraped or supplied when a page (or one of its elements) loads.
/// `Some` fields overwrite the state; `None` fields leave it alone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BootstrapFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<Direction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub running_count: Option<u64>,
}

impl BootstrapFields {
    pub fn is_empty(&self) -> bool {
        self.address_hash.is_none() && self.filter.is_none() && self.running_count.is_none()
    }
}

/// Pagination metadata owned by the list store and merged into the state before each reducer call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMeta {
    #[serde(default)]
    pub items: Vec<Fragment>,
    #[serde(default)]
    pub beyond_page_one: bool,
    #[serde(default)]
    pub empty_response: bool,
    #[serde(default)]
    pub is_search: bool,
}

/// Per-page view state. Treated as immutable between transitions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewState {
    pub channel_disconnected: bool,
    pub address_hash: Option<String>,
    pub filter: Option<Direction>,
    /// Deferred fragments, newest first. Non-empty iff batching mode is active.
    pub pending_batch: Vec<Fragment>,
    pub items: Vec<Fragment>,
    /// Global pages only.
    pub running_count: Option<u64>,
    pub beyond_page_one: bool,
    pub empty_response: bool,
    pub is_search: bool,
    pub navigating_away: bool,
}

impl ViewState {
    pub fn batching(&self) -> bool { !self.pending_batch.is_empty() }

    pub fn with_bootstrap(mut self, fields: &BootstrapFields) -> Self {
        if let Some(h) = &fields.address_hash {
            self.address_hash = Some(h.clone());
        }
        if let Some(f) = fields.filter {
            self.filter = Some(f);
        }
        if let Some(c) = fields.running_count {
            self.running_count = Some(c);
        }
        self
    }

    pub fn with_page(mut self, meta: &PageMeta) -> Self {
        self.items = meta.items.clone();
        self.beyond_page_one = meta.beyond_page_one;
        self.empty_response = meta.empty_response;
        self.is_search = meta.is_search;
        self
    }

    pub fn page_meta(&self) -> PageMeta {
        PageMeta {
            items: self.items.clone(),
            beyond_page_one: self.beyond_page_one,
            empty_response: self.empty_response,
            is_search: self.is_search,
        }
    }
}

pub mod prelude {
    pub use super::{
        Action, BootstrapFields, Direction, EntityKind, Fragment, LedgerMessage, LiveFeedError, LiveFeedResult, PageMeta,
        PageVariant, ReducerConfig, Scope, ViewState, BATCH_THRESHOLD,
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_accepts_wire_and_normalized_keys() {
        let wire = LedgerMessage::from_value(serde_json::json!({
            "to_address_hash": "0xA",
            "fee_payment_html": "<tr/>",
        }))
        .unwrap();
        let norm = LedgerMessage::from_value(serde_json::json!({
            "toAddressHash": "0xA",
            "feePaymentHtml": "<tr/>",
        }))
        .unwrap();
        assert_eq!(wire, norm);
        assert_eq!(wire.to_address_hash.as_deref(), Some("0xA"));
    }

    #[test]
    fn mistyped_fields_decode_as_absent() {
        let m = LedgerMessage::from_value(serde_json::json!({
            "toAddressHash": 42,
            "fromAddressHash": null,
            "transactionHtml": "<tr/>",
        }))
        .unwrap();
        assert_eq!(m.to_address_hash, None);
        assert_eq!(m.from_address_hash, None);
        assert_eq!(m.transaction_html.as_deref(), Some("<tr/>"));
    }

    #[test]
    fn both_casings_of_one_key_prefer_the_wire_key() {
        let m = LedgerMessage::from_value(serde_json::json!({
            "to_address_hash": "0xA",
            "toAddressHash": "0xB",
            "fromAddressHash": "0xC",
            "from_address_hash": 7,
        }))
        .unwrap();
        assert_eq!(m.to_address_hash.as_deref(), Some("0xA"));
        assert_eq!(m.from_address_hash.as_deref(), Some("0xC"));

        let action: Action = serde_json::from_value(serde_json::json!({
            "type": "RECEIVED_NEW_FEE_PAYMENT_BATCH",
            "msgs": [{ "fee_payment_html": "<tr/>", "feePaymentHtml": "<tr/>" }],
        }))
        .unwrap();
        assert_eq!(action.batch().map(|(_, msgs)| msgs.len()), Some(1));
    }

    #[test]
    fn non_object_message_is_rejected() {
        assert!(LedgerMessage::from_value(serde_json::json!("not-an-object")).is_err());
    }

    #[test]
    fn direction_parses_case_insensitively() {
        assert_eq!("To".parse::<Direction>().unwrap(), Direction::To);
        assert_eq!(" from ".parse::<Direction>().unwrap(), Direction::From);
        assert!("sideways".parse::<Direction>().is_err());
    }

    #[test]
    fn bootstrap_only_overwrites_present_fields() {
        let s = ViewState { address_hash: Some("0xA".into()), running_count: Some(3), ..Default::default() };
        let s = s.with_bootstrap(&BootstrapFields { filter: Some(Direction::From), ..Default::default() });
        assert_eq!(s.address_hash.as_deref(), Some("0xA"));
        assert_eq!(s.filter, Some(Direction::From));
        assert_eq!(s.running_count, Some(3));
    }
}
