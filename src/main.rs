mod device;
mod discovery;
mod gesture;
mod latch;
mod output;
mod report;
mod rmi;
mod transport;

use clap::Parser;
use device::{DeviceContext, INFO_DRIVER_VERSION, INFO_FIRMWARE_VERSION, INFO_PRODUCT_ID};
use discovery::DeviceDiscovery;
use gesture::settings::Settings;
use latch::FrameLatch;
use report::{ChannelSink, LogSink, PendingReadSink, ReportSink, REPORTID_SETTINGS};
use rmi::frame::{FrameStatus, Resolution};
use rmi::protocol::{RmiClient, ATTN_REPORT_ID};
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use transport::{rmi_report, RmiTransport, INPUT_TRANSACTION_LEN};

#[cfg(target_os = "linux")]
type PlatformDiscovery = discovery::udev_discovery::UdevDiscovery;
#[cfg(target_os = "linux")]
type PlatformTransport = transport::hidraw::HidrawTransport;

#[cfg(target_os = "windows")]
type PlatformDiscovery = discovery::windows_discovery::WindowsDiscovery;
#[cfg(target_os = "windows")]
type PlatformTransport = transport::windows_hid::WinHidTransport;

#[derive(Parser)]
#[command(name = "synatap", about = "Synaptics RMI touchpad gesture driver")]
struct Cli {
    /// HID device to open instead of the first discovered RMI touchpad
    #[arg(short, long)]
    device: Option<PathBuf>,

    /// Enable verbose logging to stderr
    #[arg(short, long)]
    verbose: bool,

    /// Replay interval for the last frame when the touchpad goes quiet
    #[arg(long, default_value_t = 10)]
    poll_ms: u64,

    /// Output coordinate range as WIDTHxHEIGHT (defaults to the sensor's)
    #[arg(long, value_parser = parse_resolution)]
    resolution: Option<Resolution>,

    /// Write a settings register before starting, as REGISTER=VALUE
    #[arg(long = "set", value_parser = parse_setting)]
    settings: Vec<(u8, u8)>,

    /// Log synthesized reports instead of injecting them
    #[arg(long)]
    dry_run: bool,

    /// Hand each report only to a waiting reader, dropping it while the
    /// output side is busy, the way a HID host read behaves
    #[arg(long)]
    host_reads: bool,

    /// Print driver and touchpad identification, then exit
    #[arg(long)]
    info: bool,
}

fn parse_resolution(s: &str) -> Result<Resolution, String> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{}'", s))?;
    let x: i32 = w.trim().parse().map_err(|e| format!("width: {}", e))?;
    let y: i32 = h.trim().parse().map_err(|e| format!("height: {}", e))?;
    if x <= 0 || y <= 0 {
        return Err(String::from("resolution must be positive"));
    }
    Ok(Resolution { x, y })
}

fn parse_setting(s: &str) -> Result<(u8, u8), String> {
    let (reg, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected REGISTER=VALUE, got '{}'", s))?;
    let reg = reg.trim().parse().map_err(|e| format!("register: {}", e))?;
    let value = value.trim().parse().map_err(|e| format!("value: {}", e))?;
    Ok((reg, value))
}

fn find_device(cli: &Cli) -> PathBuf {
    if let Some(path) = &cli.device {
        return path.clone();
    }
    match PlatformDiscovery::find_rmi_devices() {
        Ok(devices) => {
            let device = &devices[0];
            tracing::info!(
                devnode = %device.devnode.display(),
                product_id = format!("{:04x}", device.product_id),
                "found touchpad"
            );
            device.devnode.clone()
        }
        Err(e) => {
            eprintln!("Unable to find touchpad: {}", e);
            std::process::exit(1);
        }
    }
}

#[cfg(target_os = "linux")]
fn output_sink(dry_run: bool) -> io::Result<Box<dyn ReportSink + Send>> {
    if dry_run {
        return Ok(Box::new(LogSink));
    }
    Ok(Box::new(output::uinput::UinputSink::create("synatap virtual pointer")?))
}

#[cfg(not(target_os = "linux"))]
fn output_sink(_dry_run: bool) -> io::Result<Box<dyn ReportSink + Send>> {
    Ok(Box::new(LogSink))
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(if cli.verbose {
            tracing::Level::TRACE
        } else {
            tracing::Level::INFO
        })
        .with_writer(io::stderr)
        .init();

    let devnode = find_device(&cli);
    let transport = match PlatformTransport::open(&devnode) {
        Ok(t) => t,
        Err(e) => {
            eprintln!("Failed to open {}: {}", devnode.display(), e);
            std::process::exit(1);
        }
    };

    let mut client = RmiClient::new(transport);
    let layout = match device::init(&mut client) {
        Ok(l) => l,
        Err(e) => {
            eprintln!("Touchpad initialization failed: {}", e);
            std::process::exit(1);
        }
    };
    let transport = client.into_transport();

    let (sink, reports) = if cli.host_reads {
        let (sink, reports) = PendingReadSink::new();
        (Box::new(sink) as Box<dyn ReportSink + Send>, reports)
    } else {
        let (sink, reports) = ChannelSink::new();
        (Box::new(sink) as Box<dyn ReportSink + Send>, reports)
    };
    let mut context = DeviceContext::new(&layout, cli.resolution, Settings::default(), sink);
    for (register, value) in &cli.settings {
        context.handle_host_report(&[REPORTID_SETTINGS, *register, *value]);
    }

    if cli.info {
        for which in [INFO_DRIVER_VERSION, INFO_PRODUCT_ID, INFO_FIRMWARE_VERSION] {
            println!("{}", context.info(which));
        }
        return;
    }
    tracing::debug!(feature = ?context.feature_report(), settings = ?context.settings(), "engine ready");

    let out = match output_sink(cli.dry_run) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Failed to create output device: {}", e);
            std::process::exit(1);
        }
    };
    output::spawn_delivery(reports, out);

    let engine = Arc::new(Mutex::new(context));
    let latch = Arc::new(FrameLatch::new());

    // Replays the last frame so held fingers keep ticking while the pad is silent
    let timer_engine = Arc::clone(&engine);
    let timer_latch = Arc::clone(&latch);
    let poll = Duration::from_millis(cli.poll_ms.max(1));
    thread::spawn(move || loop {
        thread::sleep(poll);
        if let Some(frame) = timer_latch.replay_if_stale() {
            let mut ctx = timer_engine.lock().unwrap_or_else(|e| e.into_inner());
            ctx.process(&frame);
        }
    });

    let reader = thread::spawn(move || {
        let mut transaction = [0u8; INPUT_TRANSACTION_LEN];
        loop {
            match transport.read_input(&mut transaction) {
                Ok(()) => {
                    let frame = rmi_report(&transaction);
                    if frame[0] == ATTN_REPORT_ID {
                        latch.store(&frame);
                    }
                    let mut ctx = engine.lock().unwrap_or_else(|e| e.into_inner());
                    if let FrameStatus::Skipped(id) = ctx.process(&frame) {
                        tracing::debug!(report_id = id, "non-attention input report");
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::TimedOut => continue,
                Err(e) => {
                    tracing::error!(error = %e, "input read failed");
                    break;
                }
            }
        }
    });

    if reader.join().is_err() {
        tracing::error!("reader thread panicked");
    }
    std::process::exit(1);
}
