//! Tests for the envelope wire format.

use plexus::wire::codec;
use plexus::wire::proto::{
    MetadataRequest, RequestKind, ResponseKind, ServiceId, ServiceRequest, ServiceResponse,
};
use prost::Message;

#[test]
fn service_id_orders_by_type_then_name() {
    let mut ids = vec![
        ServiceId::new("z", "counter"),
        ServiceId::new("a", "map"),
        ServiceId::new("a", "counter"),
        ServiceId::new("m", "lock"),
    ];
    ids.sort();
    assert_eq!(
        ids,
        vec![
            ServiceId::new("a", "counter"),
            ServiceId::new("z", "counter"),
            ServiceId::new("m", "lock"),
            ServiceId::new("a", "map"),
        ]
    );
}

#[test]
fn request_kinds_round_trip() {
    let id = ServiceId::new("c1", "counter");
    let requests = vec![
        ServiceRequest::create(id.clone()),
        ServiceRequest::delete(id.clone()),
        ServiceRequest::command(id.clone(), b"payload".to_vec()),
        ServiceRequest::query(id.clone(), b"payload".to_vec()),
        ServiceRequest::metadata("counter"),
    ];

    for request in requests {
        let bytes = codec::encode(&request);
        let decoded: ServiceRequest = codec::decode(&bytes).unwrap();
        assert_eq!(decoded, request);
    }
}

#[test]
fn response_kinds_round_trip() {
    let responses = vec![
        ServiceResponse::create(),
        ServiceResponse::delete(),
        ServiceResponse::command(b"out".to_vec()),
        ServiceResponse::query(b"out".to_vec()),
        ServiceResponse::metadata(vec![
            ServiceId::new("a", "counter"),
            ServiceId::new("b", "counter"),
        ]),
    ];

    for response in responses {
        let bytes = codec::encode(&response);
        let decoded: ServiceResponse = codec::decode(&bytes).unwrap();
        assert_eq!(decoded, response);
    }
}

#[test]
fn metadata_filter_defaults_to_empty() {
    let request = MetadataRequest::default();
    assert!(request.service_type.is_empty());
    assert_eq!(request.encoded_len(), 0);
}

#[test]
fn unknown_fields_are_skipped() {
    let mut bytes = codec::encode(&ServiceId::new("c1", "counter"));
    // Append an unknown varint field (tag 15) after the known fields.
    bytes.extend_from_slice(&[0x78, 0x01]);

    let decoded: ServiceId = codec::decode(&bytes).unwrap();
    assert_eq!(decoded, ServiceId::new("c1", "counter"));
}

#[test]
fn later_oneof_field_wins() {
    // A command request with a query field appended after it: last field wins,
    // matching protobuf oneof merge semantics.
    let mut bytes = codec::encode(&ServiceRequest::command(
        ServiceId::new("c1", "counter"),
        b"cmd".to_vec(),
    ));
    bytes.extend_from_slice(&[0x2a, 0x03]); // field 5, length-delimited, 3 bytes
    bytes.extend_from_slice(b"qry");

    let decoded: ServiceRequest = codec::decode(&bytes).unwrap();
    assert_eq!(decoded.kind, Some(RequestKind::Query(b"qry".to_vec())));
}

#[test]
fn empty_bodies_decode_to_defaults() {
    let decoded: ServiceRequest = codec::decode(&[]).unwrap();
    assert_eq!(decoded, ServiceRequest::default());
    assert!(decoded.id.is_none());
    assert!(decoded.kind.is_none());

    let decoded: ServiceResponse = codec::decode(&[]).unwrap();
    assert!(decoded.kind.is_none());
}

#[test]
fn truncated_envelope_is_a_decode_error() {
    let bytes = codec::encode(&ServiceRequest::command(
        ServiceId::new("c1", "counter"),
        b"payload".to_vec(),
    ));
    let result: Result<ServiceRequest, _> = codec::decode(&bytes[..bytes.len() - 2]);
    assert!(result.is_err());
}

#[test]
fn metadata_response_preserves_listing_order() {
    let services = vec![
        ServiceId::new("a", "counter"),
        ServiceId::new("b", "counter"),
        ServiceId::new("m1", "map"),
    ];
    let response = ServiceResponse::metadata(services.clone());
    let bytes = codec::encode(&response);
    let decoded: ServiceResponse = codec::decode(&bytes).unwrap();
    match decoded.kind {
        Some(ResponseKind::Metadata(metadata)) => assert_eq!(metadata.services, services),
        other => panic!("expected metadata response, got {other:?}"),
    }
}
