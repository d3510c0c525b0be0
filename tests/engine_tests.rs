//! Integration tests for the ingress pipeline: gating, heartbeat filtering,
//! pattern precedence, structural decode, and the event fan-out.

use dart_rs::bus::{EventBus, LogKind};
use dart_rs::dart::transaction::{PumpStatus, PumpTransaction};
use dart_rs::engine::ProtocolEngine;
use dart_rs::util::hex::hex_to_bytes;

fn engine_with_bus() -> (ProtocolEngine, EventBus) {
    let bus = EventBus::new();
    (ProtocolEngine::new(bus.clone()), bus)
}

/// Heartbeat shapes are never emitted as pump messages, whatever their
/// surroundings.
#[test]
fn test_heartbeat_totality() {
    let (mut engine, bus) = engine_with_bus();
    let mut pump_rx = bus.subscribe_pump();

    let heartbeats: Vec<Vec<u8>> = vec![
        vec![0x50, 0x20, 0xFA],
        vec![0x50, 0x70, 0xFA],
        vec![0x50, 0xC5, 0xFA],
        vec![0x51, 0x00, 0x03, 0xFA],
        vec![0x50, 0x20, 0x51, 0x70, 0x50, 0x20, 0x03, 0xFA],
        vec![0x50, 0x51, 0x50, 0x51, 0x50, 0x51, 0x03, 0xFA],
    ];
    for heartbeat in heartbeats {
        assert!(
            engine.ingest(&heartbeat).is_empty(),
            "heartbeat surfaced: {heartbeat:02X?}"
        );
    }
    assert!(pump_rx.try_recv().is_err());
}

/// A 9-byte status frame decodes through the pattern path even with CRC
/// bytes no CCITT calculation would produce.
#[test]
fn test_pattern_tolerates_foreign_crc() {
    let (mut engine, _bus) = engine_with_bus();
    let messages = engine.ingest(&hex_to_bytes("5031010105DEAD03FA"));
    assert_eq!(messages.len(), 1);
    assert_eq!(
        messages[0].transaction,
        PumpTransaction::Status {
            status: PumpStatus::FillingCompleted
        }
    );
}

/// A frame longer than the status shape must go through the structural
/// parser exactly once, emitting its transactions in wire order with one
/// shared timestamp.
#[test]
fn test_multi_transaction_precedence() {
    let (mut engine, _bus) = engine_with_bus();
    let messages = engine.ingest(&hex_to_bytes("50340101050304002180119C8203FA"));
    assert_eq!(messages.len(), 2);
    assert_eq!(
        messages[0].transaction,
        PumpTransaction::Status {
            status: PumpStatus::FillingCompleted
        }
    );
    assert_eq!(
        messages[1].transaction,
        PumpTransaction::NozzleStatus {
            price: 2.18,
            nozzle: 1,
            nozzle_out: true
        }
    );
    assert_eq!(messages[0].timestamp_ms, messages[1].timestamp_ms);
    assert_eq!(messages[0].raw_hex, messages[1].raw_hex);
}

/// An unknown transaction is logged and skipped while its neighbours in the
/// same frame still decode.
#[test]
fn test_unknown_transaction_does_not_abort_frame() {
    let (mut engine, bus) = engine_with_bus();
    let mut log_rx = bus.subscribe_log();

    // DC1(5), then an unsupported 0x42 transaction, then DC5 alarm 9.
    let frame = hex_to_bytes("500001010542020000050109AABB03FA");
    let messages = engine.ingest(&frame);
    assert_eq!(messages.len(), 2);
    assert!(matches!(
        messages[0].transaction,
        PumpTransaction::Status { .. }
    ));
    assert_eq!(messages[1].transaction, PumpTransaction::Alarm { code: 9 });

    let mut saw_unknown = false;
    while let Ok(event) = log_rx.try_recv() {
        if event.kind == LogKind::Unknown && event.message.contains("0x42") {
            saw_unknown = true;
        }
    }
    assert!(saw_unknown, "unknown transaction was not logged");
}

/// Out-of-band DC3 prices are dropped but the rest of the frame survives.
#[test]
fn test_price_clamp_in_pipeline() {
    let (mut engine, _bus) = engine_with_bus();
    // DC1(2) then DC3 with price 30.4, which no dispenser charges.
    let frame = hex_to_bytes("5036010102030403040001AABB03FA");
    let messages = engine.ingest(&frame);
    assert_eq!(messages.len(), 1);
    assert_eq!(
        messages[0].transaction,
        PumpTransaction::Status {
            status: PumpStatus::Authorized
        }
    );
}

/// A frame that produces nothing is reported once on the log topic with its
/// hex dump, and decoding continues afterwards.
#[test]
fn test_unrecognized_frame_logged() {
    let (mut engine, bus) = engine_with_bus();
    let mut log_rx = bus.subscribe_log();

    // Valid address and terminator, but the body parses to nothing.
    assert!(engine.ingest(&hex_to_bytes("5200017F001234 03FA")).is_empty());

    let mut saw_report = false;
    while let Ok(event) = log_rx.try_recv() {
        if matches!(event.kind, LogKind::Frame | LogKind::Unknown) && event.hex.is_some() {
            saw_report = true;
        }
    }
    assert!(saw_report);

    // The engine keeps decoding.
    assert_eq!(engine.ingest(&hex_to_bytes("5031010105DEAD03FA")).len(), 1);
}

/// The ingress buffer is bounded under terminator-free noise.
#[test]
fn test_noise_keeps_buffer_bounded() {
    let (mut engine, _bus) = engine_with_bus();
    for _ in 0..10 {
        engine.ingest(&[0xAAu8; 400]);
    }
    assert!(engine.buffered_len() <= 1000);
}

/// Wrapper blocks interleaved mid-stream do not corrupt frame reassembly.
#[test]
fn test_wrapper_blocks_between_reads() {
    let (mut engine, _bus) = engine_with_bus();
    assert!(engine.ingest(&[0x50, 0xC1, 0xFA]).is_empty());
    let messages = engine.ingest(&hex_to_bytes("5031010105DEAD03FA"));
    assert_eq!(messages.len(), 1);
    assert_eq!(engine.buffered_len(), 0);
}

/// State projection is visible through the engine after ingest.
#[test]
fn test_projection_after_ingest() {
    let (mut engine, _bus) = engine_with_bus();
    engine.ingest(&hex_to_bytes("5031010105DEAD03FA"));
    // DC2: 12.50 litres, 27.25 currency units
    engine.ingest(&hex_to_bytes("50000208000012500000272 5AABB03FA"));
    let state = engine.pump_state(0x50).expect("state exists");
    assert_eq!(state.status, Some(PumpStatus::FillingCompleted));
    assert_eq!(state.volume, Some(12.5));
    assert_eq!(state.amount, Some(27.25));
}
