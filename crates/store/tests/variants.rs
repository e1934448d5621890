#![forbid(unsafe_code)]

use livefeed_core::{Action, BootstrapFields, LedgerMessage, PageMeta, PageVariant, Scope, ViewState};
use livefeed_store::BatchedReducer;

/// A message every variant renders and every filter keeps when the subject is 0xA.
fn row(html: &str) -> LedgerMessage {
    LedgerMessage {
        to_address_hash: Some("0xA".into()),
        from_address_hash: Some("0xA".into()),
        transaction_html: Some(html.into()),
        fee_payment_html: Some(html.into()),
        forward_transfer_html: Some(html.into()),
    }
}

fn seeded(variant: PageVariant) -> (BatchedReducer, ViewState) {
    let r = BatchedReducer::for_variant(variant);
    let s = r.reduce(
        &r.initial_state(),
        &Action::PageLoad(BootstrapFields { address_hash: Some("0xA".into()), ..Default::default() }),
    );
    (r, s)
}

fn deliver(variant: PageVariant, n: usize, prefix: &str) -> Action {
    Action::received_batch(variant.entity(), (0..n).map(|i| row(&format!("{}{}", prefix, i))).collect())
}

#[test]
fn threshold_boundary_holds_for_every_variant() {
    for v in PageVariant::ALL {
        let (r, s) = seeded(v);
        let nine = r.reduce(&s, &deliver(v, 9, "m"));
        assert_eq!(nine.items.len(), 9, "{}", v);
        assert!(nine.pending_batch.is_empty(), "{}", v);

        let ten = r.reduce(&s, &deliver(v, 10, "m"));
        assert!(ten.items.is_empty(), "{}", v);
        assert_eq!(ten.pending_batch.len(), 10, "{}", v);
    }
}

#[test]
fn reversal_holds_for_every_variant() {
    for v in PageVariant::ALL {
        let (r, s) = seeded(v);
        let s = r.reduce(&s, &deliver(v, 2, "old"));
        let s = r.reduce(&s, &deliver(v, 3, "new"));
        let items: Vec<&str> = s.items.iter().map(|f| f.as_str()).collect();
        assert_eq!(items, vec!["new2", "new1", "new0", "old1", "old0"], "{}", v);
    }
}

#[test]
fn disconnect_latches_for_every_variant() {
    for v in PageVariant::ALL {
        let (r, s) = seeded(v);
        let s = r.reduce(&s, &Action::ChannelDisconnected);
        for n in [1, 9, 10, 25] {
            assert_eq!(r.reduce(&s, &deliver(v, n, "x")), s, "{}", v);
        }
    }
}

#[test]
fn beyond_page_one_suppresses_every_variant() {
    for v in PageVariant::ALL {
        let (r, s) = seeded(v);
        let s = s.with_page(&PageMeta { beyond_page_one: true, ..Default::default() });
        assert_eq!(r.reduce(&s, &Action::ChannelDisconnected), s, "{}", v);
        assert_eq!(r.reduce(&s, &deliver(v, 4, "x")), s, "{}", v);
    }
}

#[test]
fn running_count_only_on_global_pages() {
    for v in PageVariant::ALL {
        let (r, mut s) = seeded(v);
        for n in [2, 11, 9, 1] {
            s = r.reduce(&s, &deliver(v, n, "x"));
        }
        match v.scope() {
            Scope::Global => assert_eq!(s.running_count, Some(23), "{}", v),
            Scope::Address => assert_eq!(s.running_count, None, "{}", v),
        }
    }
}

#[test]
fn actions_decoded_from_json_drive_the_reducer() {
    let (r, s) = seeded(PageVariant::AddressForwardTransfers);
    let action: Action = serde_json::from_value(serde_json::json!({
        "type": "RECEIVED_NEW_FORWARD_TRANSFER_BATCH",
        "msgs": [
            { "toAddressHash": "0xA", "fromAddressHash": "0xB", "forwardTransferHtml": "<tr>1</tr>" },
            { "toAddressHash": "0xB", "fromAddressHash": "0xA", "forwardTransferHtml": "<tr>2</tr>" }
        ]
    }))
    .unwrap();
    let filter: Action = serde_json::from_value(serde_json::json!({ "type": "ELEMENTS_LOAD", "filter": "from" })).unwrap();
    let s = r.reduce(&r.reduce(&s, &filter), &action);
    let items: Vec<&str> = s.items.iter().map(|f| f.as_str()).collect();
    assert_eq!(items, vec!["<tr>2</tr>"]);
}
