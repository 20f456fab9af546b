// Command line front end for blueline
//
// Scans for advertisers and dumps, reads, writes or listens to the GATT
// attributes of a peripheral through the privileged helper.

use anyhow::{Context, Result};
use blueline::config::parse_iface;
use blueline::protocol::parse_hex_u16;
use blueline::{
    Characteristic, Notification, Peripheral, ScanEntry, ScanMode, Scanner, SessionConfig,
    UuidNames,
};
use clap::{Args, Parser, Subcommand};
use log::{info, warn, LevelFilter};
use std::path::PathBuf;
use std::time::{Duration, Instant};

#[derive(Parser)]
#[command(name = "blueline")]
#[command(about = "Bluetooth LE scanner and GATT client", long_about = None)]
#[command(version)]
struct Cli {
    /// Controller to use (hci0, hci1, ... or just the index)
    #[arg(short = 'i', long, global = true)]
    hci: Option<String>,

    /// Path to the privileged helper
    #[arg(long, global = true)]
    helper: Option<PathBuf>,

    /// Command timeout in seconds
    #[arg(short, long, global = true)]
    timeout: Option<u64>,

    /// More output; repeat for more
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// UUID name table (JSON)
    #[arg(long, global = true)]
    names: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan for advertising devices
    Scan(ScanArgs),

    /// List services, characteristics and descriptors
    Services {
        address: String,

        /// The address is a random one
        #[arg(short, long)]
        random: bool,
    },

    /// Read a characteristic value
    Read {
        address: String,

        /// Value handle (hex)
        #[arg(value_parser = parse_handle)]
        handle: u16,

        #[arg(short, long)]
        random: bool,
    },

    /// Write a characteristic value
    Write {
        address: String,

        /// Value handle (hex)
        #[arg(value_parser = parse_handle)]
        handle: u16,

        /// Value to write (hex)
        value: String,

        /// Write command instead of write request
        #[arg(long)]
        no_response: bool,

        #[arg(short, long)]
        random: bool,
    },

    /// Subscribe to a characteristic and print what it sends
    Listen {
        address: String,

        /// Value handle (hex)
        #[arg(value_parser = parse_handle)]
        handle: u16,

        /// How long to listen, in seconds
        #[arg(short = 'T', long = "listen-time", default_value = "10")]
        listen_time: u64,

        /// Use indications instead of notifications
        #[arg(long)]
        indicate: bool,

        #[arg(short, long)]
        random: bool,
    },
}

#[derive(Args)]
struct ScanArgs {
    /// Scan time in seconds
    #[arg(short = 'T', long = "scan-time", default_value = "4")]
    scan_time: u64,

    /// Ignore devices weaker than this RSSI (dBm)
    #[arg(short, long, default_value_t = -128, allow_hyphen_values = true)]
    sensitivity: i16,

    /// Print every advertising element
    #[arg(short, long)]
    all: bool,

    /// Print only devices not seen before in this scan
    #[arg(short, long)]
    new: bool,

    /// Connect to each connectable device and list its services
    #[arg(short, long)]
    discover: bool,

    /// Passive scan (no scan requests)
    #[arg(short, long)]
    passive: bool,
}

fn parse_handle(raw: &str) -> Result<u16, String> {
    parse_hex_u16(raw).ok_or_else(|| format!("{:?} is not a hex handle", raw))
}

fn address_type(random: bool) -> &'static str {
    if random {
        "random"
    } else {
        "public"
    }
}

fn session_config(cli: &Cli) -> Result<SessionConfig> {
    let mut config = SessionConfig::from_env();
    if let Some(hci) = &cli.hci {
        let iface =
            parse_iface(hci).with_context(|| format!("invalid interface {:?}", hci))?;
        config.worker = config.worker.with_iface(iface);
    }
    if let Some(helper) = &cli.helper {
        config.worker = config.worker.with_helper_path(helper.clone());
    }
    if let Some(secs) = cli.timeout {
        config = config.with_command_timeout(Duration::from_secs(secs));
    }
    Ok(config)
}

fn uuid_names(cli: &Cli) -> Result<UuidNames> {
    match &cli.names {
        Some(path) => UuidNames::from_path(path)
            .with_context(|| format!("loading UUID names from {}", path.display())),
        None => Ok(UuidNames::with_well_known()),
    }
}

fn connect(address: &str, random: bool, config: &SessionConfig) -> Result<Peripheral> {
    info!("Connecting to {}", address);
    Peripheral::connect_to(address, address_type(random), config.clone())
        .with_context(|| format!("connecting to {}", address))
}

/// Printable text as is, anything else as hex.
fn format_value(value: &[u8]) -> String {
    match std::str::from_utf8(value) {
        Ok(text) if !text.is_empty() && text.chars().all(|c| !c.is_control()) => {
            format!("{:?}", text)
        }
        _ => hex::encode(value),
    }
}

fn print_entry(entry: &ScanEntry, is_new_device: bool, all: bool) {
    let status = if is_new_device { "new" } else { "update" };
    let connectable = if entry.connectable {
        ""
    } else {
        " (not connectable)"
    };
    let addr_type = entry
        .addr_type
        .map(|t| t.to_string())
        .unwrap_or_else(|| "?".to_string());
    println!(
        "    Device ({}): {} ({}), {} dBm{}",
        status, entry.addr, addr_type, entry.rssi, connectable
    );

    if all {
        for (_, description, text) in entry.scan_data() {
            println!("\t{}: {}", description, text);
        }
    } else if let Some(name) = entry.local_name() {
        println!("\tName: {}", name);
    }
}

fn dump_services(peripheral: &Peripheral, names: &UuidNames) -> Result<()> {
    for service in peripheral.services().context("discovering services")? {
        println!(
            "{} [0x{:04x}-0x{:04x}]",
            names.display_name(&service.uuid),
            service.start_handle,
            service.end_handle
        );

        let characteristics = peripheral
            .characteristics_of(&service)
            .with_context(|| format!("discovering characteristics of {}", service))?;
        for characteristic in &characteristics {
            dump_characteristic(peripheral, names, characteristic)?;
        }
    }
    Ok(())
}

fn dump_characteristic(
    peripheral: &Peripheral,
    names: &UuidNames,
    characteristic: &Characteristic,
) -> Result<()> {
    println!(
        "    {} (0x{:04x}): {}",
        names.display_name(&characteristic.uuid),
        characteristic.value_handle,
        characteristic.properties_to_string()
    );

    if characteristic.supports_read() {
        match peripheral.read_characteristic(characteristic.value_handle) {
            Ok(value) => println!("        Value: {}", format_value(&value)),
            // Reads can be refused (authentication, authorization); keep going
            Err(e) if e.att_code().is_some() => println!("        Value: <{}>", e),
            Err(e) => return Err(e).context("reading characteristic"),
        }
    }

    for descriptor in peripheral
        .descriptors_of(characteristic)
        .context("discovering descriptors")?
    {
        println!(
            "        {} (0x{:04x})",
            names.display_name(&descriptor.uuid),
            descriptor.handle
        );
    }
    Ok(())
}

fn scan(config: &SessionConfig, names: &UuidNames, args: &ScanArgs) -> Result<()> {
    let mode = if args.passive {
        ScanMode::Passive
    } else {
        ScanMode::Active
    };
    let (sensitivity, all, new) = (args.sensitivity, args.all, args.new);

    let mut scanner = Scanner::new(config.clone())
        .context("starting the helper")?
        .with_handler(move |entry: &ScanEntry, is_new_device: bool, is_new_data: bool| {
            if entry.rssi < sensitivity {
                return;
            }
            if new && !is_new_device {
                return;
            }
            if is_new_device || is_new_data {
                print_entry(entry, is_new_device, all);
            }
        });

    println!("Scanning for {} seconds...", args.scan_time);
    let found = scanner
        .scan(Duration::from_secs(args.scan_time), mode)
        .context("scanning")?;
    println!("Found {} devices", found.len());

    if !args.discover {
        return Ok(());
    }

    for entry in found
        .iter()
        .filter(|e| e.connectable && e.rssi >= sensitivity)
    {
        let Some(addr_type) = entry.addr_type else {
            continue;
        };
        println!("\n{}", entry.addr);
        let result = Peripheral::connect_to(
            &entry.addr.to_string(),
            addr_type.as_str(),
            config.clone(),
        )
        .map_err(anyhow::Error::from)
        .and_then(|peripheral| dump_services(&peripheral, names));
        if let Err(e) = result {
            warn!("{}: {:#}", entry.addr, e);
        }
    }
    Ok(())
}

fn listen(
    peripheral: &Peripheral,
    handle: u16,
    listen_time: Duration,
    indicate: bool,
) -> Result<()> {
    let characteristic = peripheral
        .characteristics()
        .context("discovering characteristics")?
        .into_iter()
        .find(|c| c.value_handle == handle)
        .with_context(|| format!("no characteristic with value handle 0x{:04x}", handle))?;

    peripheral.set_notification_handler(|notification: &Notification| {
        println!("{}", notification);
    })?;
    if indicate {
        peripheral.enable_indications(&characteristic)?;
    } else {
        peripheral.enable_notifications(&characteristic)?;
    }
    println!("Listening to 0x{:04x} for {:?}", handle, listen_time);

    let deadline = Instant::now() + listen_time;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            break;
        }
        peripheral.wait_for_notifications(remaining)?;
    }

    if let Err(e) = peripheral.disable_notifications(&characteristic) {
        warn!("Could not unsubscribe: {}", e);
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();

    let config = session_config(&cli)?;
    let names = uuid_names(&cli)?;

    match cli.command {
        Commands::Scan(args) => scan(&config, &names, &args)?,
        Commands::Services { address, random } => {
            let peripheral = connect(&address, random, &config)?;
            dump_services(&peripheral, &names)?;
            peripheral.disconnect()?;
        }
        Commands::Read {
            address,
            handle,
            random,
        } => {
            let peripheral = connect(&address, random, &config)?;
            let value = peripheral
                .read_characteristic(handle)
                .with_context(|| format!("reading 0x{:04x}", handle))?;
            println!("{}", format_value(&value));
        }
        Commands::Write {
            address,
            handle,
            value,
            no_response,
            random,
        } => {
            let bytes = hex::decode(&value)
                .with_context(|| format!("{:?} is not a hex value", value))?;
            let peripheral = connect(&address, random, &config)?;
            peripheral
                .write_characteristic(handle, &bytes, !no_response)
                .with_context(|| format!("writing 0x{:04x}", handle))?;
        }
        Commands::Listen {
            address,
            handle,
            listen_time,
            indicate,
            random,
        } => {
            let peripheral = connect(&address, random, &config)?;
            listen(
                &peripheral,
                handle,
                Duration::from_secs(listen_time),
                indicate,
            )?;
        }
    }
    Ok(())
}
