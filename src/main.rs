use anyhow::{Context, Result};
use clap::Parser;
use clap_verbosity_flag::{InfoLevel, Verbosity};
use digibase_lib::DeviceIdentity;
use digibase_lib::variant::Phase;
use nusb::transfer::EndpointType;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Lists attached ORTEC digiBase units.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Open each base and print the endpoints its active configuration reports
    #[arg(short, long)]
    descriptors: bool,
    #[command(flatten)]
    verbose: Verbosity<InfoLevel>,
}

fn print_identity(index: usize, identity: &DeviceIdentity) {
    let config = identity.variant.config();
    let init = config.endpoints(Phase::Init);
    let normal = config.endpoints(Phase::Normal);
    println!(
        "#{index}: {} {:04x}:{:04x} serial {}",
        identity.variant,
        identity.vendor_id,
        identity.product_id,
        identity.serial.as_deref().unwrap_or("<not available>")
    );
    if let (Some(bus), Some(address)) = (identity.bus_number, identity.device_address) {
        println!("    bus {bus:03} address {address:03}");
    }
    println!(
        "    init pair   out {:#04x} / in {:#04x}",
        init.out, init.r#in
    );
    println!(
        "    normal pair out {:#04x} / in {:#04x}",
        normal.out, normal.r#in
    );
    println!("    firmware    {} ({} bytes)", config.firmware_file, config.firmware_len());
}

/// Prints the bulk endpoints reported by the device's active configuration.
fn print_descriptors(identity: &DeviceIdentity) -> Result<()> {
    let device_info = nusb::list_devices()?
        .find(|d| Some(d.bus_number()) == identity.bus_number && Some(d.device_address()) == identity.device_address)
        .context("Device disappeared")?;
    let device = device_info
        .open()
        .context("Failed to open device. Check permissions (udev rules on Linux).")?;
    let config = device.active_configuration()?;
    println!("    configuration {}", config.configuration_value());
    for group in config.interfaces() {
        for setting in group.alt_settings() {
            println!(
                "    interface {} alt {} class {:#04x}",
                setting.interface_number(),
                setting.alternate_setting(),
                setting.class()
            );
            for endpoint in setting.endpoints() {
                let kind = match endpoint.transfer_type() {
                    EndpointType::Control => "control",
                    EndpointType::Isochronous => "isochronous",
                    EndpointType::Bulk => "bulk",
                    EndpointType::Interrupt => "interrupt",
                };
                let direction = if endpoint.address() & 0x80 != 0 { "IN" } else { "OUT" };
                println!(
                    "      endpoint {:#04x} {direction:<3} {kind} max packet {}",
                    endpoint.address(),
                    endpoint.max_packet_size()
                );
            }
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let filter = EnvFilter::builder()
        .with_default_directive(cli.verbose.tracing_level_filter().into())
        .from_env_lossy();
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false).without_time())
        .init();

    let devices = digibase_lib::usb::enumerate().context("Failed to list USB devices")?;
    if devices.is_empty() {
        info!("No digiBase found.");
        return Ok(());
    }

    for (i, identity) in devices.iter().enumerate() {
        print_identity(i + 1, identity);
        if cli.descriptors {
            if let Err(e) = print_descriptors(identity) {
                warn!("    could not read descriptors: {:#}", e);
            }
        }
    }
    Ok(())
}
