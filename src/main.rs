use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use serialpoll::config::{Config, ConfigLoader, LogFormat};
use serialpoll::error::{AppError, AppResult};
use serialpoll::port::{
    self, DataBits, FlowControl, FlushSelection, Parity, PortConfiguration, SerialPortAdapter,
    StopBits,
};
use serialpoll::{logging, service};
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

// Command-line arguments
#[derive(Parser, Debug)]
#[command(
    name = "serialpoll",
    version,
    about = "Inspect, configure, and exchange data with serial ports.",
    long_about = "Lists serial devices, applies line settings, and moves bytes using non-blocking readiness polling. The device's original settings are restored when each command finishes."
)]
struct Cli {
    /// Configuration file (overrides the standard search locations).
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Log output format.
    #[arg(long, global = true, value_enum)]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List serial devices present on this host.
    List {
        /// Print JSON instead of a table.
        #[arg(long)]
        json: bool,
    },
    /// Open and configure a port, then report its state.
    Probe {
        /// Device path or alias (defaults to serial.default_port).
        port: Option<String>,
        #[command(flatten)]
        line: LineArgs,
        #[arg(long)]
        json: bool,
    },
    /// Print received bytes until the duration elapses.
    Monitor {
        port: Option<String>,
        #[command(flatten)]
        line: LineArgs,
        /// How long to listen (defaults to monitor.duration_ms).
        #[arg(long)]
        duration_ms: Option<u64>,
        /// Print bytes as hex instead of text.
        #[arg(long)]
        hex: bool,
    },
    /// Write bytes to a port.
    Send {
        port: String,
        data: String,
        #[command(flatten)]
        line: LineArgs,
        /// DATA is hex, e.g. "de ad be ef".
        #[arg(long)]
        hex: bool,
        /// Append a newline.
        #[arg(long)]
        newline: bool,
    },
    /// Send a message on TX and check that it arrives on RX.
    Loopback {
        tx: String,
        rx: String,
        #[command(flatten)]
        line: LineArgs,
        #[arg(long, default_value = "Hello World!")]
        message: String,
        #[arg(long, default_value_t = 1000)]
        timeout_ms: u64,
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args, Debug, Default)]
struct LineArgs {
    /// Baud rate; any positive integer.
    #[arg(long)]
    baud: Option<u32>,
    /// Input baud rate when different from --baud.
    #[arg(long)]
    input_baud: Option<u32>,
    #[arg(long, value_enum)]
    parity: Option<ParityArg>,
    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=2))]
    stop_bits: Option<u8>,
    #[arg(long, value_parser = clap::value_parser!(u8).range(5..=8))]
    data_bits: Option<u8>,
    #[arg(long, value_enum)]
    flow_control: Option<FlowArg>,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ParityArg {
    None,
    Odd,
    Even,
    Mark,
    Space,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum FlowArg {
    None,
    Software,
    Hardware,
}

impl LineArgs {
    /// Overlay the flags that were given on the configured defaults.
    fn apply(&self, mut line: PortConfiguration) -> AppResult<PortConfiguration> {
        if let Some(baud) = self.baud {
            line.baud_rate = baud.into();
        }
        if let Some(baud) = self.input_baud {
            line.input_baud_rate = Some(baud.into());
        }
        if let Some(parity) = self.parity {
            line.parity = match parity {
                ParityArg::None => Parity::None,
                ParityArg::Odd => Parity::Odd,
                ParityArg::Even => Parity::Even,
                ParityArg::Mark => Parity::Mark,
                ParityArg::Space => Parity::Space,
            };
        }
        if let Some(bits) = self.stop_bits {
            line.stop_bits = if bits == 2 { StopBits::Two } else { StopBits::One };
        }
        if let Some(bits) = self.data_bits {
            line.data_bits = DataBits::try_from(bits)?;
        }
        if let Some(flow) = self.flow_control {
            line.flow_control = match flow {
                FlowArg::None => FlowControl::None,
                FlowArg::Software => FlowControl::Software,
                FlowArg::Hardware => FlowControl::Hardware,
            };
        }
        Ok(line)
    }
}

#[derive(Debug, Serialize)]
struct ProbeReport {
    port: String,
    settings: PortConfiguration,
    bytes_queued: usize,
    readable: bool,
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("error: {}", e);
        std::process::exit(e.exit_code());
    }
}

fn run(cli: Cli) -> AppResult<()> {
    let loader = match &cli.config {
        Some(path) => ConfigLoader::load_from(path)?,
        None => ConfigLoader::load()?,
    };
    logging::init(&loader.config().logging, cli.log_format, cli.verbose)?;
    if let Some(path) = &loader.config_path {
        debug!("Loaded configuration from {}", path.display());
    }
    let config = loader.into_config();

    match cli.command {
        Command::List { json } => list(json),
        Command::Probe { port, line, json } => probe(&config, port.as_deref(), &line, json),
        Command::Monitor {
            port,
            line,
            duration_ms,
            hex,
        } => monitor(&config, port.as_deref(), &line, duration_ms, hex),
        Command::Send {
            port,
            data,
            line,
            hex,
            newline,
        } => {
            let mut bytes = if hex {
                parse_hex(&data)?
            } else {
                data.into_bytes()
            };
            if newline {
                bytes.push(b'\n');
            }
            send(&config, &port, &line, &bytes)
        }
        Command::Loopback {
            tx,
            rx,
            line,
            message,
            timeout_ms,
            json,
        } => loopback(
            &config,
            &tx,
            &rx,
            &line,
            message.as_bytes(),
            Duration::from_millis(timeout_ms),
            json,
        ),
    }
}

// ========== Subcommands ==========

fn list(json: bool) -> AppResult<()> {
    let mut stubs = Vec::new();
    for stub in port::iterate()? {
        stubs.push(stub?);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&stubs)?);
    } else if stubs.is_empty() {
        println!("No serial ports found.");
    } else {
        let width = stubs.iter().map(|s| s.name().len()).max().unwrap_or(0);
        for stub in &stubs {
            println!("{:<width$}  {}", stub.name(), stub.path(), width = width);
        }
    }
    Ok(())
}

fn open_configured(
    config: &Config,
    name: Option<&str>,
    line: &LineArgs,
) -> AppResult<(port::NativePort, PortConfiguration)> {
    let path = config.serial.port_or_default(name)?;
    let settings = line.apply(config.serial.to_port_configuration())?;
    let handle = port::open_with(&path, &settings)?;
    info!("Opened {} at {}", path, settings);
    Ok((handle, settings))
}

fn probe(config: &Config, name: Option<&str>, line: &LineArgs, json: bool) -> AppResult<()> {
    let (mut handle, settings) = open_configured(config, name, line)?;
    let report = ProbeReport {
        port: handle.name().to_string(),
        settings,
        bytes_queued: handle.bytes_to_read()?,
        readable: handle.poll()?,
    };
    handle.close();

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Port:      {}", report.port);
        println!("Settings:  {}", report.settings);
        println!("Queued:    {} bytes", report.bytes_queued);
        println!("Readable:  {}", report.readable);
    }
    Ok(())
}

fn monitor(
    config: &Config,
    name: Option<&str>,
    line: &LineArgs,
    duration_ms: Option<u64>,
    hex: bool,
) -> AppResult<()> {
    let (mut handle, _) = open_configured(config, name, line)?;
    let duration = duration_ms
        .map(Duration::from_millis)
        .unwrap_or_else(|| config.monitor.duration());

    let stdout = std::io::stdout();
    let summary = service::monitor(
        &mut handle,
        duration,
        config.monitor.poll_interval(),
        config.monitor.read_chunk,
        |data| {
            let mut out = stdout.lock();
            let _ = if hex {
                writeln!(out, "{}", format_hex(data))
            } else {
                write!(out, "{}", String::from_utf8_lossy(data))
            };
            let _ = out.flush();
        },
    )?;
    handle.close();

    info!(
        "Received {} bytes in {} chunks",
        summary.bytes_read, summary.chunks
    );
    Ok(())
}

fn send(config: &Config, name: &str, line: &LineArgs, data: &[u8]) -> AppResult<()> {
    let (mut handle, _) = open_configured(config, Some(name), line)?;
    service::write_all(&mut handle, data, config.testing.timeout())?;
    handle.close();
    println!("Wrote {} bytes", data.len());
    Ok(())
}

fn loopback(
    config: &Config,
    tx: &str,
    rx: &str,
    line: &LineArgs,
    message: &[u8],
    timeout: Duration,
    json: bool,
) -> AppResult<()> {
    let (mut tx_handle, _) = open_configured(config, Some(tx), line)?;
    let (mut rx_handle, _) = open_configured(config, Some(rx), line)?;
    tx_handle.flush_queues(FlushSelection::OUTPUT)?;

    let report = service::loopback_exchange(&mut tx_handle, &mut rx_handle, message, timeout)?;
    tx_handle.close();
    rx_handle.close();

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!(
            "{} -> {}: sent {} bytes, received {} in {} ms",
            report.tx_port,
            report.rx_port,
            report.bytes_sent,
            report.received.len(),
            report.elapsed_ms
        );
    }

    if !report.ready_after_write {
        return Err(AppError::Timeout(timeout));
    }
    if !report.matches(message) {
        let matching = report
            .received
            .iter()
            .zip(message)
            .take_while(|(a, b)| a == b)
            .count();
        return Err(AppError::LoopbackMismatch {
            sent: message.len(),
            received: report.received.len(),
            matching,
        });
    }
    Ok(())
}

// ========== Helpers ==========

fn parse_hex(input: &str) -> AppResult<Vec<u8>> {
    let digits: Vec<u8> = input
        .bytes()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    if digits.len() % 2 != 0 {
        return Err(AppError::InvalidArgument(
            "hex data must have an even number of digits".to_string(),
        ));
    }
    digits
        .chunks(2)
        .map(|pair| {
            std::str::from_utf8(pair)
                .ok()
                .and_then(|s| u8::from_str_radix(s, 16).ok())
                .ok_or_else(|| {
                    AppError::InvalidArgument(format!(
                        "invalid hex byte '{}'",
                        String::from_utf8_lossy(pair)
                    ))
                })
        })
        .collect()
}

fn format_hex(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{:02x}", b))
        .collect::<Vec<_>>()
        .join(" ")
}
