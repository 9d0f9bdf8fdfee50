use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use digibase_lib::usb::NusbBulk;
use digibase_lib::{ArmedAcquisition, BackgroundModel, DetectionLoop, DetectionSample, DeviceConfig, Digibase};
use std::fs::File;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// HV settle time between enabling HV and starting acquisition.
const HV_SETTLE: Duration = Duration::from_secs(1);
/// Granularity at which long sleeps notice Ctrl-C.
const SLEEP_SLICE: Duration = Duration::from_millis(100);

/// Simple DAQ for the ORTEC/AMETEK digiBase.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// PMT high voltage in volts
    #[arg(long, default_value_t = 800.0, global = true)]
    pmt_hv: f64,
    /// Lower level discriminator; 0 leaves the device setting alone
    #[arg(long, default_value_t = 0, global = true)]
    disc: u32,
    /// Shaping time in microseconds, 0.75 to 2.0
    #[arg(long, global = true)]
    pulse_width: Option<f64>,
    /// Directory holding digiBase.rbf / digiBaseRH.rbf
    #[arg(long, default_value = ".", global = true)]
    firmware_dir: PathBuf,
    /// Serial number of the base to use when several are attached
    #[arg(long, global = true)]
    serial: Option<String>,
    /// Optional path to a file to write logs to, in addition to the console.
    #[arg(short, long, global = true)]
    log_file: Option<PathBuf>,
    #[command(flatten)]
    verbose: Verbosity<WarnLevel>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Acquire a spectrum and write it to a background file
    Spect {
        /// Time, in seconds, to integrate the spectrum
        duration: f64,
        /// Output file in which the spectrum is saved
        filename: PathBuf,
        /// Short run description (max 63 bytes)
        #[arg(short = 'm', long)]
        comment: Option<String>,
    },
    /// Detect presence of signal over background
    Detect {
        /// Integration time of each query interval, in seconds
        duration: f64,
        /// Number of intervals
        n: usize,
        /// Background file for subtraction
        filename: PathBuf,
        /// Channel number of the low side of the signal region
        sig0: usize,
        /// Channel number of the high side of the signal region (exclusive)
        sig1: usize,
        /// Exponential moving average parameter in (0, 1]
        #[arg(short, long)]
        alpha: Option<f64>,
        /// Emit one JSON object per interval instead of text
        #[arg(long)]
        json: bool,
    },
    /// Print identity, setpoints, counters and the raw status register
    Status,
    /// Capture in list mode and print the raw 32-bit hit words
    Hits {
        /// Acquisition time in seconds
        duration: f64,
    },
}

/// Front-end settings applied before every acquisition.
#[derive(Debug, Clone, Copy)]
struct FrontEnd {
    hv: f64,
    disc: u32,
    pulse_width: Option<f64>,
}

fn setup_logging(log_file_path: Option<PathBuf>, verbosity: &Verbosity<WarnLevel>) -> Result<Option<WorkerGuard>> {
    // Stdout carries data; logs go to stderr.
    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false);

    let (file_layer, guard) = if let Some(ref path) = log_file_path {
        let log_file =
            File::create(path).with_context(|| format!("Failed to create log file at: {:?}", path))?;
        let (non_blocking_writer, guard) = tracing_appender::non_blocking(log_file);
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(non_blocking_writer)
            .with_ansi(false)
            .with_target(false);
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    let filter = EnvFilter::builder()
        .with_default_directive(verbosity.tracing_level_filter().into())
        .from_env_lossy();

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    if let Some(path) = log_file_path {
        info!("Logging to file: {:?}", path);
    }

    Ok(guard)
}

/// Sets `stop` on Ctrl-C. Runs on its own thread so the driver stays synchronous.
fn install_interrupt_handler(stop: Arc<AtomicBool>) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to build signal runtime")?;
    std::thread::Builder::new()
        .name("ctrl-c".into())
        .spawn(move || {
            runtime.block_on(async {
                match tokio::signal::ctrl_c().await {
                    Ok(()) => {
                        warn!("Interrupted, stopping acquisition");
                        stop.store(true, Ordering::Relaxed);
                    }
                    Err(e) => error!("Failed to listen for Ctrl-C: {}", e),
                }
            })
        })
        .context("Failed to spawn signal thread")?;
    Ok(())
}

/// Sleeps for `duration`, waking early once `stop` is set. Returns false if interrupted.
fn sleep_unless_stopped(duration: Duration, stop: &AtomicBool) -> bool {
    let deadline = Instant::now() + duration;
    loop {
        if stop.load(Ordering::Relaxed) {
            return false;
        }
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        std::thread::sleep(SLEEP_SLICE.min(deadline - now));
    }
}

fn seconds(value: f64, what: &str) -> Result<Duration> {
    Duration::try_from_secs_f64(value).with_context(|| format!("Invalid {what}: {value} s"))
}

/// Clears the base, applies the front-end settings, enables HV and starts
/// acquisition. The returned guard stops acquisition and drops HV on every
/// exit path.
fn arm<'a>(
    base: &'a mut Digibase<NusbBulk>,
    front_end: FrontEnd,
    stop: &AtomicBool,
) -> Result<ArmedAcquisition<'a, NusbBulk>> {
    let mut armed = base.arm();
    armed.clear_spectrum().context("Failed to clear spectrum")?;
    armed.clear_counters().context("Failed to clear counters")?;
    if front_end.disc > 0 {
        armed.set_lld(front_end.disc).context("Failed to set LLD")?;
    }
    if let Some(micros) = front_end.pulse_width {
        armed.set_pulse_width(micros)?;
    }
    armed.set_hv(front_end.hv)?;
    armed.enable_hv()?;
    if !sleep_unless_stopped(HV_SETTLE, stop) {
        bail!("Interrupted while HV settled");
    }
    armed.start().context("Failed to start acquisition")?;
    info!(hv = front_end.hv, "Acquisition started");
    Ok(armed)
}

fn spect(
    base: &mut Digibase<NusbBulk>,
    front_end: FrontEnd,
    stop: &AtomicBool,
    duration: f64,
    filename: PathBuf,
    comment: Option<String>,
) -> Result<()> {
    let interval = seconds(duration, "duration")?;
    let mut armed = arm(base, front_end, stop)?;
    if !sleep_unless_stopped(interval, stop) {
        bail!("Interrupted before the spectrum was complete; nothing written");
    }
    let frame = armed.spectrum().context("Failed to read spectrum")?;
    armed.disarm()?;

    info!(total = frame.total(), "Spectrum captured");
    let model = BackgroundModel::new(frame.to_i32(), duration, comment.unwrap_or_default());
    model
        .save(&filename)
        .with_context(|| format!("Failed to write background file {:?}", filename))?;
    println!("Wrote {} channels to {}", model.spectrum.len(), filename.display());
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn detect(
    base: &mut Digibase<NusbBulk>,
    front_end: FrontEnd,
    stop: Arc<AtomicBool>,
    duration: f64,
    n: usize,
    filename: PathBuf,
    roi: std::ops::Range<usize>,
    alpha: Option<f64>,
    json: bool,
) -> Result<()> {
    let interval = seconds(duration, "duration")?;
    let background = BackgroundModel::load(&filename)
        .with_context(|| format!("Failed to read background file {:?}", filename))?;
    info!(
        exposure = background.exposure_seconds,
        comment = %background.comment,
        captured = ?background.captured_at(),
        "Background loaded"
    );
    let mut detection = DetectionLoop::new(&background, interval, n, roi, alpha)?.with_stop_flag(stop.clone());

    let mut armed = arm(base, front_end, &stop)?;
    let print = |sample: &DetectionSample| {
        if json {
            match serde_json::to_string(sample) {
                Ok(line) => println!("{line}"),
                Err(e) => warn!("Failed to encode sample: {}", e),
            }
        } else {
            println!("{sample}");
        }
    };
    detection.run_with(
        &mut *armed,
        |d| {
            sleep_unless_stopped(d, &stop);
        },
        print,
    )?;
    armed.disarm()?;
    Ok(())
}

fn hits(base: &mut Digibase<NusbBulk>, front_end: FrontEnd, stop: &AtomicBool, duration: f64) -> Result<()> {
    let interval = seconds(duration, "duration")?;
    let mut armed = arm(base, front_end, stop)?;
    armed.set_acq_mode_list()?;
    armed.start()?;
    if !sleep_unless_stopped(interval, stop) {
        warn!("Interrupted, reading what was captured so far");
    }
    let words = armed.hits().context("Failed to read hits")?;
    armed.disarm()?;

    for word in &words {
        println!("{word:08x}");
    }
    info!(count = words.len(), "Hits read");
    Ok(())
}

fn status(base: &mut Digibase<NusbBulk>) -> Result<()> {
    let identity = base.identity().clone();
    println!("Variant:     {}", identity.variant);
    println!("USB ID:      {:04x}:{:04x}", identity.vendor_id, identity.product_id);
    println!("Serial:      {}", identity.serial.as_deref().unwrap_or("<none>"));
    println!("HV setpoint: {:.0} V", base.hv()?);
    println!("HV readback: {}", base.hv_readback()?);
    println!("Pulse width: {:.4} us", base.pulse_width()?);
    println!("LLD / ULD:   {} / {}", base.lld()?, base.uld()?);
    println!("Live time:   {}", base.livetime()?);
    println!("Real time:   {}", base.realtime()?);
    println!("Status register:");
    println!("{}", base.status_dump()?);
    Ok(())
}

fn run(cli: Cli, stop: Arc<AtomicBool>) -> Result<()> {
    let mut config = DeviceConfig::default().with_firmware_dir(&cli.firmware_dir);
    if let Some(serial) = &cli.serial {
        config = config.with_serial(serial);
    }
    let mut base = Digibase::open(&config).context("Failed to open digiBase")?;
    info!(
        variant = %base.variant(),
        serial = base.serial().unwrap_or("<none>"),
        "Connected"
    );

    let front_end = FrontEnd {
        hv: cli.pmt_hv,
        disc: cli.disc,
        pulse_width: cli.pulse_width,
    };
    match cli.command {
        Command::Spect {
            duration,
            filename,
            comment,
        } => spect(&mut base, front_end, &stop, duration, filename, comment),
        Command::Detect {
            duration,
            n,
            filename,
            sig0,
            sig1,
            alpha,
            json,
        } => detect(&mut base, front_end, stop, duration, n, filename, sig0..sig1, alpha, json),
        Command::Status => status(&mut base),
        Command::Hits { duration } => hits(&mut base, front_end, &stop, duration),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let _guard = setup_logging(cli.log_file.clone(), &cli.verbose)?;

    let stop = Arc::new(AtomicBool::new(false));
    install_interrupt_handler(stop.clone())?;

    if let Err(e) = run(cli, stop) {
        error!("{:?}", e);
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
    Ok(())
}
