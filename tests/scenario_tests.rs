//! End-to-end scenarios with literal wire bytes captured from the reference
//! deployment.

use dart_rs::bus::EventBus;
use dart_rs::dart::crc::crc16_ccitt;
use dart_rs::dart::transaction::{PumpCommand, PumpStatus, PumpTransaction};
use dart_rs::engine::ProtocolEngine;
use dart_rs::util::hex::hex_to_bytes;

fn engine() -> ProtocolEngine {
    ProtocolEngine::new(EventBus::new())
}

/// Status request to pump 0x50 with no control override.
#[test]
fn test_status_request_wire_bytes() {
    let frame =
        ProtocolEngine::build_command(0x50, None, &PumpCommand::Command { command: 0x00 })
            .unwrap();
    assert_eq!(&frame[..5], &hex_to_bytes("5000010100")[..]);
    let crc = crc16_ccitt(&frame[..5]);
    assert_eq!(frame[5], (crc >> 8) as u8);
    assert_eq!(frame[6], (crc & 0xFF) as u8);
    assert_eq!(&frame[7..], &[0x03, 0xFA]);
}

/// RESET and AUTHORIZE pick their empirical control bytes.
#[test]
fn test_reset_and_authorize_wire_bytes() {
    let reset =
        ProtocolEngine::build_command(0x50, None, &PumpCommand::Command { command: 0x05 })
            .unwrap();
    assert_eq!(&reset[..5], &hex_to_bytes("5039010105")[..]);

    let authorize =
        ProtocolEngine::build_command(0x50, None, &PumpCommand::Command { command: 0x06 })
            .unwrap();
    assert_eq!(&authorize[..5], &hex_to_bytes("503C010106")[..]);
}

/// Captured idle frame: DC1(5) followed by a DC3 carrying the station's
/// 2.18 unit price with nozzle 1 lifted.
#[test]
fn test_decode_captured_status_and_nozzle_frame() {
    let mut engine = engine();
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
}

/// Idle keepalive alternation: the exported status converges to
/// FILLING_COMPLETED on the first 5 and stays there while the alternation
/// persists.
#[test]
fn test_idle_alternation_converges() {
    let mut engine = engine();
    let zero = hex_to_bytes("50310101009EA003FA");
    let five = hex_to_bytes("5032010105AABB03FA");

    engine.ingest(&zero);
    for _ in 0..4 {
        engine.ingest(&five);
        assert_eq!(
            engine.pump_state(0x50).unwrap().status,
            Some(PumpStatus::FillingCompleted)
        );
        engine.ingest(&zero);
        assert_eq!(
            engine.pump_state(0x50).unwrap().status,
            Some(PumpStatus::FillingCompleted)
        );
    }
}

/// An AUTHORIZED status flips the exported status immediately, regardless of
/// the idle statuses around it.
#[test]
fn test_authorized_overrides_idle() {
    let mut engine = engine();
    engine.ingest(&hex_to_bytes("5031010105AABB03FA"));
    assert_eq!(
        engine.pump_state(0x50).unwrap().status,
        Some(PumpStatus::FillingCompleted)
    );

    let messages = engine.ingest(&hex_to_bytes("50360101020304030400010E4803FA"));
    assert_eq!(messages.len(), 1, "implausible DC3 price must be dropped");
    assert_eq!(
        engine.pump_state(0x50).unwrap().status,
        Some(PumpStatus::Authorized)
    );
}

/// Byte-split ingress: feeding a frame one byte at a time produces exactly
/// one extraction with an empty remainder.
#[test]
fn test_byte_split_ingress() {
    let mut engine = engine();
    let frame = hex_to_bytes("50390101059EA003FA");
    let mut messages = Vec::new();
    for &byte in &frame {
        messages.extend(engine.ingest(&[byte]));
    }
    assert_eq!(messages.len(), 1);
    assert_eq!(
        messages[0].transaction,
        PumpTransaction::Status {
            status: PumpStatus::FillingCompleted
        }
    );
    assert_eq!(engine.buffered_len(), 0);
}
