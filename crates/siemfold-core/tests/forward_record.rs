use serde_json::json;
use siemfold_core::{EventFields, ForwardRecord, Labels, RawEvent};

#[test]
fn forward_record_serializes_flat() {
    let event = RawEvent::from_payload(
        json!({
            "signature": "1:40000:1",
            "message": "Port scan",
            "ts": "2024-03-01T10:00:00.000000Z",
            "srcIp": "192.0.2.10"
        }),
        &EventFields::default(),
    );

    let record = ForwardRecord::new(&event, 7, &Labels::new("acme", "MER"));
    let value = serde_json::to_value(&record).expect("Serialization failed");

    assert_eq!(value["timestamp"], "2024-03-01T10:00:00.000000Z");
    assert_eq!(value["organization"], "acme");
    assert_eq!(value["tool"], "MER");
    assert_eq!(value["signature"], "1:40000:1");
    assert_eq!(value["message"], "Port scan");
    assert_eq!(value["count"], 7);
    assert_eq!(value["event"]["srcIp"], "192.0.2.10");
}

#[test]
fn forward_record_without_timestamp_serializes_null() {
    let event = RawEvent::from_payload(json!({"signature": "s"}), &EventFields::default());

    let record = ForwardRecord::new(&event, 1, &Labels::new("acme", "UMB"));
    let value = serde_json::to_value(&record).expect("Serialization failed");

    assert!(value["timestamp"].is_null());
    assert_eq!(value["message"], "");
}
