// Verify the frame format browser dashboards already parse.
// Viewers read `type` and `data` from every SSE message body.

use relay_protocol::{Envelope, EventType, StreamFrame};
use serde_json::{json, Value};

#[test]
fn frame_has_type_and_data_only() {
    let env = Envelope::new(EventType::ProductCreated, json!({"id": 1}));
    let json = StreamFrame::from_envelope(&env).to_json();

    let parsed: Value = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, json!({"type": "product.created", "data": {"id": 1}}));
}

#[test]
fn frame_keeps_payload_opaque() {
    let data = json!({"nested": {"list": [1, "two", null]}, "flag": false});
    let env = Envelope::new(EventType::OrderSaleConfirmed, data.clone());
    let json = StreamFrame::from(&env).to_json();

    let parsed: Value = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed["type"], "order.sale.confirmed");
    assert_eq!(parsed["data"], data);
}

#[test]
fn frame_is_single_line() {
    // An SSE data field must not contain raw newlines.
    let env = Envelope::new(EventType::UserUpdated, json!({"bio": "line one\nline two"}));
    let json = StreamFrame::from_envelope(&env).to_json();
    assert!(!json.contains('\n'));
}

#[test]
fn envelope_serializes_like_frame() {
    let env = Envelope::new(EventType::DispatchCreated, json!({"id": 3}));
    let a = serde_json::to_value(&env).unwrap();
    let b: Value = serde_json::from_str(&StreamFrame::from_envelope(&env).to_json()).unwrap();
    assert_eq!(a, b);
}

#[test]
fn legacy_producer_message_decodes() {
    // Shape emitted by the existing producers on the topic exchange.
    let body = br#"{"pattern":"production.finalized","data":{"batch":"B-12"}}"#;
    let env = Envelope::decode("production.finalized", body).unwrap();
    assert_eq!(env.event_type, EventType::ProductionFinalized);
    assert_eq!(env.data, json!({"batch": "B-12"}));
}
