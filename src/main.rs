use anyhow::{bail, Context};
use clap::{Parser, Subcommand};

use dart_rs::gateway::{AddressInput, SendCommandRequest};
use dart_rs::util::hex::parse_hex_lenient;
use dart_rs::{
    init_logger, log_info, EventBus, GatewayConfig, ProtocolEngine, PumpCommand, PumpGateway,
};

#[derive(Parser)]
#[command(name = "dart-rs")]
#[command(about = "Gateway and decoder for DART fuel-dispenser pump interfaces")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Open the serial line and print decoded pump traffic
    Listen {
        port: String,
        #[arg(short, long, default_value = "9600")]
        baudrate: u32,
        #[arg(short, long, default_value = "0x50")]
        address: String,
    },
    /// Send a single command to the pump
    Send {
        port: String,
        /// Command name: status, filling-info, stop, switch-off, reset,
        /// authorize, identity, prices, preset-volume, preset-amount,
        /// price-update, suspend, resume, counters
        command: String,
        #[arg(short, long, default_value = "9600")]
        baudrate: u32,
        #[arg(short, long, default_value = "0x50")]
        address: String,
        /// Value for commands that take one (litres, amount, price,
        /// nozzle id, counter id)
        #[arg(short, long)]
        value: Option<f64>,
        /// Override the control byte instead of the per-command default
        #[arg(short, long)]
        control: Option<u8>,
    },
    /// Replay a capture file through the decode pipeline
    Decode {
        /// Line-oriented capture; hex bytes, optionally after a DATA: marker
        file: String,
    },
}

fn command_from_name(name: &str, value: Option<f64>) -> anyhow::Result<PumpCommand> {
    let need_value =
        || value.with_context(|| format!("command {name:?} needs --value"));
    Ok(match name {
        "status" => PumpCommand::Command { command: 0x00 },
        "filling-info" => PumpCommand::Command { command: 0x02 },
        "stop" => PumpCommand::Command { command: 0x03 },
        "switch-off" => PumpCommand::Command { command: 0x04 },
        "reset" => PumpCommand::Command { command: 0x05 },
        "authorize" => PumpCommand::Command { command: 0x06 },
        "identity" => PumpCommand::Command { command: 0x08 },
        "prices" => PumpCommand::Command { command: 0x0A },
        "preset-volume" => PumpCommand::PresetVolume {
            volume: need_value()?,
        },
        "preset-amount" => PumpCommand::PresetAmount {
            amount: need_value()?,
        },
        "price-update" => PumpCommand::PriceUpdate {
            prices: vec![need_value()?],
        },
        "suspend" => PumpCommand::Suspend {
            nozzle: need_value()? as u8,
        },
        "resume" => PumpCommand::Resume {
            nozzle: need_value()? as u8,
        },
        "counters" => PumpCommand::RequestCounters {
            counter: need_value()? as u8,
        },
        other => bail!("unknown command {other:?}"),
    })
}

async fn listen(port: String, baudrate: u32, address: String) -> anyhow::Result<()> {
    let pump_address = dart_rs::parse_pump_address(&address)?;
    let (mut gateway, handle) = PumpGateway::new(GatewayConfig {
        port,
        baudrate,
        pump_address,
    })?;
    gateway.open()?;
    log_info("Connected, listening for pump traffic");

    let mut pump_rx = handle.subscribe_pump();
    let mut conn_rx = handle.subscribe_connection();
    tokio::spawn(gateway.run());

    loop {
        tokio::select! {
            message = pump_rx.recv() => match message {
                Ok(message) => println!("{}", serde_json::to_string(&message)?),
                Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                    log_info(&format!("dropped {n} messages"));
                }
                Err(_) => break,
            },
            event = conn_rx.recv() => {
                if let Ok(event) = event {
                    if !event.connected {
                        bail!("disconnected: {}", event.error.unwrap_or_default());
                    }
                }
            }
        }
    }
    Ok(())
}

async fn send(
    port: String,
    baudrate: u32,
    address: String,
    command: PumpCommand,
    control: Option<u8>,
) -> anyhow::Result<()> {
    let pump_address = dart_rs::parse_pump_address(&address)?;
    let (mut gateway, _handle) = PumpGateway::new(GatewayConfig {
        port,
        baudrate,
        pump_address,
    })?;
    gateway.open()?;

    let receipt = gateway
        .send_command(SendCommandRequest {
            command,
            pump_address: AddressInput::from(pump_address),
            control,
        })
        .await?;
    println!("sent frame: {}", receipt.frame.hex);
    gateway.close();
    Ok(())
}

fn decode(file: &str) -> anyhow::Result<()> {
    let raw = std::fs::read_to_string(file).with_context(|| format!("reading {file}"))?;

    let mut engine = ProtocolEngine::new(EventBus::new());
    let mut total = 0usize;
    for line in raw.lines() {
        let payload = match line.split_once("DATA:") {
            Some((_, rest)) => rest,
            None => line,
        };
        let Ok(bytes) = parse_hex_lenient(payload) else {
            continue;
        };
        for message in engine.ingest(&bytes) {
            println!("{}", serde_json::to_string(&message)?);
            total += 1;
        }
    }
    log_info(&format!("decoded {total} transactions"));
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logger();

    let cli = Cli::parse();
    match cli.command {
        Commands::Listen {
            port,
            baudrate,
            address,
        } => listen(port, baudrate, address).await?,
        Commands::Send {
            port,
            command,
            baudrate,
            address,
            value,
            control,
        } => {
            let command = command_from_name(&command, value)?;
            send(port, baudrate, address, command, control).await?;
        }
        Commands::Decode { file } => decode(&file)?,
    }
    Ok(())
}
