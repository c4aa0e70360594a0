#![deny(clippy::unwrap_used)]

use chrono::Local;
use clap::{arg, command, value_parser, ArgAction};
use std::io::ErrorKind;
use std::process::exit;
use std::time::Duration;

use tsiflow::measurement::{Quantity, Selection};
use tsiflow::proto::command::FlowUnits;
use tsiflow::{Device, ProtoError, Result, SessionConfig, DEFAULT_BAUDRATE};

fn main() {
    let matches = command!() // requires `cargo` feature
        .arg(
            arg!(
                -p --device <PORT> "Serial port of the flow meter, probed if omitted"
            )
            .required(false),
        )
        .arg(arg!(
            -d --debug ... "Turn debugging information on"
        ))
        .arg(
            arg!(
                -t --timeout <MS> "Timeout for a single read or write in milliseconds"
            )
            .default_value("2000")
            .value_parser(value_parser!(u64)),
        )
        .arg(
            arg!(
                --deadline <SECS> "Abort a streamed measurement after this many seconds"
            )
            .required(false)
            .value_parser(value_parser!(u64)),
        )
        .subcommand(clap::Command::new("ident").about("Device identification"))
        .subcommand(
            clap::Command::new("rate")
                .about("Set sample rate")
                .arg(
                    arg!(<ms> "Milliseconds per sample (1..1000)")
                        .allow_negative_numbers(true)
                        .value_parser(value_parser!(i64)),
                ),
        )
        .subcommand(
            clap::Command::new("units")
                .about("Set flow units")
                .arg(arg!(<units> "Flow units").value_parser(["standard", "volumetric"])),
        )
        .subcommand(
            clap::Command::new("measure")
                .about("Measure flow, temperature and/or pressure")
                .arg(arg!(--flow "Measure flow").action(ArgAction::SetTrue))
                .arg(arg!(--temp "Measure temperature").action(ArgAction::SetTrue))
                .arg(arg!(--press "Measure pressure").action(ArgAction::SetTrue))
                .arg(
                    arg!(-n --samples <N> "Number of samples (1..9999)")
                        .default_value("1")
                        .allow_negative_numbers(true)
                        .value_parser(value_parser!(i64)),
                ),
        )
        .subcommand(
            clap::Command::new("volume").about("Measure volume").arg(
                arg!(-n --samples <N> "Number of samples (1..9999)")
                    .default_value("1")
                    .allow_negative_numbers(true)
                    .value_parser(value_parser!(i64)),
            ),
        )
        .subcommand_required(true)
        .get_matches();

    init_logging(matches.get_count("debug"));

    if let Err(e) = handle_args(&matches) {
        let port = matches
            .get_one::<String>("device")
            .map(String::as_str)
            .unwrap_or("<auto>");
        match e {
            ProtoError::Open(err) => {
                if err.kind() == serialport::ErrorKind::NoDevice
                    || matches!(err.kind(), serialport::ErrorKind::Io(ErrorKind::NotFound))
                {
                    eprintln!("{}: File not found", port);
                } else {
                    eprintln!("I/O Error: {} [device: {}]", err, port);
                }
            }
            ProtoError::TransportRead(err) | ProtoError::TransportWrite(err) => {
                eprintln!("I/O Error: {} [device: {}]", err, port);
            }
            ProtoError::NoDeviceFound => {
                eprintln!("No flow meter found, try to specify the port with --device");
            }
            ProtoError::Device { code } => {
                eprintln!("Device returned error {}, aborting!", code);
            }
            ProtoError::UnexpectedResponse { raw } => {
                eprintln!("Received an unexpected response from device: {:?}", raw);
            }
            ProtoError::InvalidSelection => {
                eprintln!("Select at least one of --flow, --temp or --press");
            }
            ProtoError::MalformedSample { raw } => {
                eprintln!("Received a corrupted sample line, aborting: {:?}", raw);
            }
        }
        exit(-1);
    }
}

fn init_logging(debug: u8) {
    let level = match debug {
        0 => tracing::Level::INFO,
        1 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .with_target(false)
        .init();
}

fn handle_args(matches: &clap::ArgMatches) -> Result<()> {
    let timeout = matches.get_one::<u64>("timeout").copied().unwrap_or(2000);
    let config = SessionConfig {
        port: matches.get_one::<String>("device").cloned(),
        baudrate: DEFAULT_BAUDRATE,
        timeout: Duration::from_millis(timeout),
        stream_deadline: matches
            .get_one::<u64>("deadline")
            .map(|secs| Duration::from_secs(*secs)),
        ..SessionConfig::default()
    };

    let mut device = Device::open(&config)?;
    eprintln!("Connected to: {}\n", device.port());

    match matches.subcommand() {
        Some(("ident", _args)) => {
            let ident = device.identity()?;
            println!("Model: {}", ident.model);
            println!("Serial: {}", ident.serial);
            println!("Firmware: {}", ident.firmware);
            println!("Calibrated: {}", ident.calibration_date);
        }
        Some(("rate", args)) => {
            let requested = args.get_one::<i64>("ms").copied().unwrap_or(500);
            let applied = device.set_sample_rate(requested)?;
            println!("Sample rate: {} ms", applied);
        }
        Some(("units", args)) => {
            let units = args
                .get_one::<String>("units")
                .and_then(|u| u.parse::<FlowUnits>().ok())
                .unwrap_or_default();
            device.set_units(units)?;
            println!("Flow units: {}", units);
        }
        Some(("measure", args)) => {
            let selection = Selection {
                flow: args.get_flag("flow"),
                temperature: args.get_flag("temp"),
                pressure: args.get_flag("press"),
            };
            let samples = args.get_one::<i64>("samples").copied().unwrap_or(1);
            let stream = device.stream_ftp(selection, samples)?;
            print_header(stream.field_map().quantities().iter().map(Quantity::key));
            for sample in stream {
                println!("{}", sample?);
            }
        }
        Some(("volume", args)) => {
            let samples = args.get_one::<i64>("samples").copied().unwrap_or(1);
            let values = device.measure_volume(samples)?;
            print_header(["volume"]);
            for value in values {
                println!("{}", value);
            }
        }
        _ => unreachable!("subcommand is required"),
    }

    device.close();
    Ok(())
}

fn print_header<'a>(columns: impl IntoIterator<Item = &'a str>) {
    println!("# {}", Local::now().format("%d/%m/%Y %H:%M:%S"));
    println!("{}", columns.into_iter().collect::<Vec<_>>().join(","));
}
