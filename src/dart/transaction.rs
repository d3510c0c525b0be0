//! # Transaction Catalogue
//!
//! Typed commands (CD, supervisor to pump) and data transactions (DC, pump
//! to supervisor), with encoding to and decoding from the length-prefixed
//! wire form.
//!
//! Command encoding validates every parameter before a single byte is
//! produced. Data decoding is tolerant in the ways the line demands: an
//! unsupported transaction number is reported but never aborts the frame,
//! an unrecognized status byte is dropped, and a DC3 whose price falls
//! outside the configured range is discarded because structural decode
//! sometimes aligns unrelated bytes as if they were a price field.

use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::dart::bcd::{
    decode_bcd, decode_identity, decode_price, decode_quantity, encode_price, encode_quantity,
};
use crate::dart::frame::RawTransaction;
use crate::error::DartError;

/// Pump status codes carried by DC1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PumpStatus {
    NotProgrammed,
    Reset,
    Authorized,
    Filling,
    FillingCompleted,
    MaxAmountReached,
    SwitchedOff,
    Suspended,
}

impl PumpStatus {
    /// Maps a wire status byte to its status, if recognized.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(PumpStatus::NotProgrammed),
            1 => Some(PumpStatus::Reset),
            2 => Some(PumpStatus::Authorized),
            4 => Some(PumpStatus::Filling),
            5 => Some(PumpStatus::FillingCompleted),
            6 => Some(PumpStatus::MaxAmountReached),
            7 => Some(PumpStatus::SwitchedOff),
            8 => Some(PumpStatus::Suspended),
            _ => None,
        }
    }

    /// The wire byte for this status.
    pub fn code(self) -> u8 {
        match self {
            PumpStatus::NotProgrammed => 0,
            PumpStatus::Reset => 1,
            PumpStatus::Authorized => 2,
            PumpStatus::Filling => 4,
            PumpStatus::FillingCompleted => 5,
            PumpStatus::MaxAmountReached => 6,
            PumpStatus::SwitchedOff => 7,
            PumpStatus::Suspended => 8,
        }
    }
}

/// Accepted unit-price band for DC3 transactions.
///
/// The band is a semantic filter, not a protocol rule: misaligned bytes can
/// masquerade as a DC3, and an implausible price is the tell. The default
/// covers the reference retail deployment; other markets should widen it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceRange {
    pub min: f64,
    pub max: f64,
}

impl Default for PriceRange {
    fn default() -> Self {
        PriceRange {
            min: PRICE_MIN,
            max: PRICE_MAX,
        }
    }
}

impl PriceRange {
    pub fn contains(&self, price: f64) -> bool {
        (self.min..=self.max).contains(&price)
    }
}

/// A command request bound for the pump.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum PumpCommand {
    /// CD1: single-byte pump command (status request, reset, authorize, ...)
    #[serde(rename = "CD1")]
    Command { command: u8 },
    /// CD2: the set of nozzles the customer may lift
    #[serde(rename = "CD2")]
    AllowedNozzles { nozzles: Vec<u8> },
    /// CD3: preset volume limit in litres
    #[serde(rename = "CD3")]
    PresetVolume { volume: f64 },
    /// CD4: preset amount limit in currency units
    #[serde(rename = "CD4")]
    PresetAmount { amount: f64 },
    /// CD5: one unit price per configured grade
    #[serde(rename = "CD5")]
    PriceUpdate { prices: Vec<f64> },
    /// CD7: output function and its command byte
    #[serde(rename = "CD7")]
    OutputControl { function: u8, command: u8 },
    /// CD9: pump parameter download
    #[serde(rename = "CD9")]
    PumpParameters {
        #[serde(default)]
        dp_vol: u8,
        #[serde(default)]
        dp_amo: u8,
        #[serde(default)]
        dp_unp: u8,
        #[serde(default)]
        max_amount: f64,
    },
    /// CD13: cash or credit filling
    #[serde(rename = "CD13")]
    FillingType { filling_type: u8 },
    /// CD14: suspend a nozzle
    #[serde(rename = "CD14")]
    Suspend { nozzle: u8 },
    /// CD15: resume a nozzle
    #[serde(rename = "CD15")]
    Resume { nozzle: u8 },
    /// CD101: request a total counter
    #[serde(rename = "CD101")]
    RequestCounters { counter: u8 },
}

impl PumpCommand {
    /// Encodes the command as a wire transaction, validating all parameters
    /// first. No bytes are produced for an invalid request.
    pub fn encode(&self) -> Result<RawTransaction, DartError> {
        match self {
            PumpCommand::Command { command } => {
                if !CD1_COMMANDS.contains(command) {
                    return Err(DartError::InvalidArgument(format!(
                        "unrecognized CD1 command 0x{command:02X}"
                    )));
                }
                Ok(RawTransaction::new(CD_COMMAND, vec![*command]))
            }
            PumpCommand::AllowedNozzles { nozzles } => {
                if nozzles.is_empty() {
                    return Err(DartError::InvalidArgument(
                        "allowed-nozzle set must not be empty".to_string(),
                    ));
                }
                for &n in nozzles {
                    if !(1..=15).contains(&n) {
                        return Err(DartError::InvalidArgument(format!(
                            "nozzle {n} out of range 1..=15"
                        )));
                    }
                }
                Ok(RawTransaction::new(CD_ALLOWED_NOZZLES, nozzles.clone()))
            }
            PumpCommand::PresetVolume { volume } => {
                let bytes = encode_quantity(*volume)?;
                Ok(RawTransaction::new(CD_PRESET_VOLUME, bytes.to_vec()))
            }
            PumpCommand::PresetAmount { amount } => {
                let bytes = encode_quantity(*amount)?;
                Ok(RawTransaction::new(CD_PRESET_AMOUNT, bytes.to_vec()))
            }
            PumpCommand::PriceUpdate { prices } => {
                if prices.is_empty() {
                    return Err(DartError::InvalidArgument(
                        "price update needs at least one price".to_string(),
                    ));
                }
                let mut data = Vec::with_capacity(prices.len() * 3);
                for &p in prices {
                    data.extend_from_slice(&encode_price(p)?);
                }
                Ok(RawTransaction::new(CD_PRICE_UPDATE, data))
            }
            PumpCommand::OutputControl { function, command } => Ok(RawTransaction::new(
                CD_OUTPUT,
                vec![*function, *command],
            )),
            PumpCommand::PumpParameters {
                dp_vol,
                dp_amo,
                dp_unp,
                max_amount,
            } => {
                // Fixed 51-byte layout with reserved regions zeroed.
                let mut data = vec![0u8; 22];
                data.push(*dp_vol);
                data.push(*dp_amo);
                data.push(*dp_unp);
                data.extend_from_slice(&[0u8; 5]);
                data.extend_from_slice(&encode_quantity(*max_amount)?);
                data.extend_from_slice(&[0u8; 17]);
                Ok(RawTransaction::new(CD_PARAMETERS, data))
            }
            PumpCommand::FillingType { filling_type } => {
                if *filling_type > 1 {
                    return Err(DartError::InvalidArgument(format!(
                        "filling type must be 0 (cash) or 1 (credit), got {filling_type}"
                    )));
                }
                Ok(RawTransaction::new(CD_FILLING_TYPE, vec![*filling_type]))
            }
            PumpCommand::Suspend { nozzle } => {
                if *nozzle > 15 {
                    return Err(DartError::InvalidArgument(format!(
                        "nozzle {nozzle} out of range 0..=15"
                    )));
                }
                Ok(RawTransaction::new(CD_SUSPEND, vec![*nozzle]))
            }
            PumpCommand::Resume { nozzle } => {
                if *nozzle > 15 {
                    return Err(DartError::InvalidArgument(format!(
                        "nozzle {nozzle} out of range 0..=15"
                    )));
                }
                Ok(RawTransaction::new(CD_RESUME, vec![*nozzle]))
            }
            PumpCommand::RequestCounters { counter } => {
                if !(0x01..=0x09).contains(counter) && !(0x11..=0x19).contains(counter) {
                    return Err(DartError::InvalidArgument(format!(
                        "counter id 0x{counter:02X} out of range"
                    )));
                }
                Ok(RawTransaction::new(CD_TOTAL_COUNTERS, vec![*counter]))
            }
        }
    }

    /// The control byte used when the supervisor does not supply one.
    ///
    /// RESET and AUTHORIZE only take effect with these values on the
    /// reference dispensers; everything else goes out with 0x00.
    pub fn default_control(&self) -> u8 {
        match self {
            PumpCommand::Command { command } if *command == CD1_RESET => CTRL_RESET,
            PumpCommand::Command { command } if *command == CD1_AUTHORIZE => CTRL_AUTHORIZE,
            _ => CTRL_DEFAULT,
        }
    }
}

/// A decoded data transaction from the pump.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum PumpTransaction {
    /// DC1: pump status
    #[serde(rename = "DC1")]
    Status { status: PumpStatus },
    /// DC2: filled volume and amount so far
    #[serde(rename = "DC2")]
    FillingInfo { volume: f64, amount: f64 },
    /// DC3: nozzle state and unit price
    #[serde(rename = "DC3")]
    NozzleStatus {
        price: f64,
        nozzle: u8,
        nozzle_out: bool,
    },
    /// DC5: alarm code
    #[serde(rename = "DC5")]
    Alarm { code: u8 },
    /// DC7: pump parameters
    #[serde(rename = "DC7")]
    PumpParameters {
        dp_vol: u8,
        dp_amo: u8,
        dp_unp: u8,
        max_amount: f64,
        grades: Vec<u8>,
    },
    /// DC9: pump identity, ten decimal digits
    #[serde(rename = "DC9")]
    Identity { identity: String },
    /// DC14: suspend acknowledgement
    #[serde(rename = "DC14")]
    Suspended { nozzle: u8 },
    /// DC15: resume acknowledgement
    #[serde(rename = "DC15")]
    Resumed { nozzle: u8 },
    /// DC101: total counters
    #[serde(rename = "DC101")]
    Counters {
        counter: u8,
        total_value: u64,
        total_m1: u64,
        total_m2: u64,
    },
    /// DC102: IFSF stand-alone mode report
    #[serde(rename = "DC102")]
    StandAloneMode { mode: u8, pressed: bool },
    /// DC103: unit-price table
    #[serde(rename = "DC103")]
    UnitPrices { prices: Vec<f64> },
}

fn require_len(raw: &RawTransaction, min: usize) -> Result<(), DartError> {
    if raw.data.len() < min {
        return Err(DartError::MalformedFrame(format!(
            "transaction 0x{:02X} needs {} data bytes, got {}",
            raw.trans,
            min,
            raw.data.len()
        )));
    }
    Ok(())
}

/// Structurally decodes one wire transaction.
///
/// Returns `Ok(None)` for transactions that are dropped on semantic grounds:
/// a DC1 with an unrecognized status byte, or a DC3 whose price falls
/// outside `price_range`.
pub fn decode_transaction(
    raw: &RawTransaction,
    price_range: &PriceRange,
) -> Result<Option<PumpTransaction>, DartError> {
    match raw.trans {
        DC_STATUS => {
            require_len(raw, 1)?;
            Ok(PumpStatus::from_code(raw.data[0]).map(|status| PumpTransaction::Status { status }))
        }
        DC_FILLING_INFO => {
            require_len(raw, 8)?;
            Ok(Some(PumpTransaction::FillingInfo {
                volume: decode_quantity(&raw.data[0..4]),
                amount: decode_quantity(&raw.data[4..8]),
            }))
        }
        DC_NOZZLE_STATUS => {
            require_len(raw, 4)?;
            let price = decode_price(&raw.data[0..3]);
            if !price_range.contains(price) {
                return Ok(None);
            }
            Ok(Some(PumpTransaction::NozzleStatus {
                price,
                nozzle: raw.data[3] & 0x0F,
                nozzle_out: raw.data[3] & 0x10 != 0,
            }))
        }
        DC_ALARM => {
            require_len(raw, 1)?;
            Ok(Some(PumpTransaction::Alarm { code: raw.data[0] }))
        }
        DC_PARAMETERS => {
            require_len(raw, 50)?;
            Ok(Some(PumpTransaction::PumpParameters {
                dp_vol: raw.data[22],
                dp_amo: raw.data[23],
                dp_unp: raw.data[24],
                max_amount: decode_quantity(&raw.data[29..33]),
                grades: raw.data[35..50].to_vec(),
            }))
        }
        DC_IDENTITY => {
            require_len(raw, 5)?;
            Ok(Some(PumpTransaction::Identity {
                identity: decode_identity(&raw.data[0..5]),
            }))
        }
        DC_SUSPENDED => {
            require_len(raw, 1)?;
            Ok(Some(PumpTransaction::Suspended {
                nozzle: raw.data[0],
            }))
        }
        DC_RESUMED => {
            require_len(raw, 1)?;
            Ok(Some(PumpTransaction::Resumed {
                nozzle: raw.data[0],
            }))
        }
        DC_COUNTERS => {
            require_len(raw, 11)?;
            let total_m2 = if raw.data.len() >= 16 {
                decode_bcd(&raw.data[11..16])
            } else {
                0
            };
            Ok(Some(PumpTransaction::Counters {
                counter: raw.data[0],
                total_value: decode_bcd(&raw.data[1..6]),
                total_m1: decode_bcd(&raw.data[6..11]),
                total_m2,
            }))
        }
        DC_STANDALONE_MODE => {
            require_len(raw, 2)?;
            Ok(Some(PumpTransaction::StandAloneMode {
                mode: raw.data[0],
                pressed: raw.data[1] != 0,
            }))
        }
        DC_UNIT_PRICES => {
            require_len(raw, 3)?;
            let prices = raw
                .data
                .chunks_exact(3)
                .map(decode_price)
                .collect::<Vec<_>>();
            Ok(Some(PumpTransaction::UnitPrices { prices }))
        }
        other => Err(DartError::UnknownTransaction(other)),
    }
}
