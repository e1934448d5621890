#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};

use crate::{BootstrapFields, EntityKind, LedgerMessage};

/// Reducer actions. Serialized internally tagged, e.g.
/// `{"type": "RECEIVED_NEW_FEE_PAYMENT_BATCH", "msgs": [...]}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    PageLoad(BootstrapFields),
    ElementsLoad(BootstrapFields),
    ChannelDisconnected,
    ReceivedNewFeePaymentBatch { msgs: Vec<LedgerMessage> },
    ReceivedNewForwardTransferBatch { msgs: Vec<LedgerMessage> },
    NavigatingAway,
    /// Any tag this crate does not know; reduces to the identity.
    #[serde(other)]
    Unknown,
}

impl Action {
    pub fn received_batch(entity: EntityKind, msgs: Vec<LedgerMessage>) -> Self {
        match entity {
            EntityKind::FeePayment => Action::ReceivedNewFeePaymentBatch { msgs },
            EntityKind::ForwardTransfer => Action::ReceivedNewForwardTransferBatch { msgs },
        }
    }

    /// Entity and messages of a batch action.
    pub fn batch(&self) -> Option<(EntityKind, &[LedgerMessage])> {
        match self {
            Action::ReceivedNewFeePaymentBatch { msgs } => Some((EntityKind::FeePayment, msgs)),
            Action::ReceivedNewForwardTransferBatch { msgs } => Some((EntityKind::ForwardTransfer, msgs)),
            _ => None,
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            Action::PageLoad(_) => "PAGE_LOAD",
            Action::ElementsLoad(_) => "ELEMENTS_LOAD",
            Action::ChannelDisconnected => "CHANNEL_DISCONNECTED",
            Action::ReceivedNewFeePaymentBatch { .. } => EntityKind::FeePayment.batch_action_tag(),
            Action::ReceivedNewForwardTransferBatch { .. } => EntityKind::ForwardTransfer.batch_action_tag(),
            Action::NavigatingAway => "NAVIGATING_AWAY",
            Action::Unknown => "UNKNOWN",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Direction;

    #[test]
    fn decodes_tagged_batch() {
        let a: Action = serde_json::from_value(serde_json::json!({
            "type": "RECEIVED_NEW_FORWARD_TRANSFER_BATCH",
            "msgs": [{ "forwardTransferHtml": "<tr/>" }],
        }))
        .unwrap();
        let (entity, msgs) = a.batch().unwrap();
        assert_eq!(entity, EntityKind::ForwardTransfer);
        assert_eq!(msgs.len(), 1);
        assert_eq!(a.tag(), "RECEIVED_NEW_FORWARD_TRANSFER_BATCH");
    }

    #[test]
    fn decodes_page_load_payload() {
        let a: Action = serde_json::from_value(serde_json::json!({
            "type": "PAGE_LOAD",
            "addressHash": "0xA",
            "filter": "to",
        }))
        .unwrap();
        assert_eq!(
            a,
            Action::PageLoad(BootstrapFields {
                address_hash: Some("0xA".into()),
                filter: Some(Direction::To),
                running_count: None,
            })
        );
    }

    #[test]
    fn unknown_tag_decodes_as_unknown() {
        let a: Action = serde_json::from_value(serde_json::json!({ "type": "SOMETHING_ELSE" })).unwrap();
        assert_eq!(a, Action::Unknown);
    }
}
