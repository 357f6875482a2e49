//! padmap daemon
//!
//! Reads an arcade panel's buttons from an MCP23017 GPIO expander over I2C
//! and injects keyboard events into the host via uinput.

mod combo;
mod dispatcher;
mod expander;
mod injector;
mod keys;
mod panel;
mod sampler;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use padmap_config::SamplingMode;
use rppal::gpio::{Gpio, Trigger};
use tokio::sync::{mpsc, watch};
use tracing_subscriber::EnvFilter;

use crate::dispatcher::Dispatcher;
use crate::expander::Mcp23017;
use crate::injector::VirtualDevice;
use crate::sampler::Sampler;

#[derive(Parser, Debug)]
#[command(name = "padmapd")]
#[command(about = "Arcade control-panel input daemon")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "/etc/padmap/config.kdl")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Expand tilde in config path
    let config_path: PathBuf = shellexpand::tilde(&args.config).into_owned().into();

    // The config carries the default log level, so parse it before
    // initializing tracing; RUST_LOG still wins when set.
    let config = match padmap_config::parse_config(&config_path) {
        Ok(config) => config,
        Err(e) => {
            // Render the miette diagnostic (with source spans) on the way out.
            eprintln!("failed to load {}", config_path.display());
            eprintln!("{:?}", miette::Report::new(e));
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.global.log_level.as_str())),
        )
        .init();

    tracing::info!(
        "Loaded {} with {} button(s) and {} combo(s)",
        config_path.display(),
        config.buttons.len(),
        config.combos.len()
    );

    // Resolve key names and build the engine; any malformed mapping stops
    // the daemon here, before the hardware is touched.
    let dispatcher = Dispatcher::from_config(&config)?;

    // Device setup failures are fatal: sampling must not start against
    // unconfigured hardware.
    let mut bus = Mcp23017::open(config.global.i2c_bus, config.global.i2c_address)?;
    bus.configure_inputs(dispatcher.enabled_masks())?;

    let virtual_device = VirtualDevice::new_keyboard("padmap", &dispatcher.emittable_keys())
        .context("failed to create uinput device (is /dev/uinput accessible?)")?;

    let (tick_tx, tick_rx) = mpsc::channel(4);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let mut sampler = Sampler::new(bus, dispatcher, virtual_device);

    // Exactly one tick producer is active; the worker owns all mutable
    // state and processes ticks one at a time.
    let _interrupt_pin = match config.global.sampling {
        SamplingMode::Poll { interval_ms } => {
            tracing::info!("polling every {} ms", interval_ms);
            spawn_poll_ticker(tick_tx.clone(), Duration::from_millis(interval_ms));
            None
        }
        SamplingMode::Interrupt { gpio_pin } => {
            tracing::info!("waiting for interrupts on GPIO {}", gpio_pin);
            sampler = sampler.with_followup(tick_tx.clone());
            Some(register_interrupt(gpio_pin, tick_tx.clone())?)
        }
    };

    // Prime one pass so the engine syncs with the real pin state.
    let _ = tick_tx.try_send(());

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for ctrl-c: {}", e);
        }
        tracing::info!("Shutting down...");
        let _ = shutdown_tx.send(true);
    });

    sampler.run(tick_rx, shutdown_rx).await
}

/// Poll mode: a timer task enqueues one tick per interval. `try_send`
/// coalesces ticks if a pass ever outlasts the interval.
fn spawn_poll_ticker(tx: mpsc::Sender<()>, interval: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            match tx.try_send(()) {
                Ok(()) | Err(mpsc::error::TrySendError::Full(())) => {}
                Err(mpsc::error::TrySendError::Closed(())) => break,
            }
        }
    });
}

/// Interrupt mode: the expander's INT line is wired to a Pi GPIO pin and
/// pulls low while any enabled pin differs from its idle value. The
/// callback only enqueues a tick; sampling happens on the worker.
///
/// The returned pin must stay alive for the process lifetime or the
/// interrupt registration is dropped with it.
fn register_interrupt(gpio_pin: u8, tx: mpsc::Sender<()>) -> Result<rppal::gpio::InputPin> {
    let gpio = Gpio::new().context("failed to open GPIO")?;
    let mut pin = gpio
        .get(gpio_pin)
        .with_context(|| format!("failed to claim GPIO {}", gpio_pin))?
        .into_input_pullup();

    pin.set_async_interrupt(Trigger::FallingEdge, move |_level| {
        let _ = tx.try_send(());
    })
    .with_context(|| format!("failed to register interrupt on GPIO {}", gpio_pin))?;

    Ok(pin)
}
