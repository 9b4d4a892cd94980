//! lamco-thinkpad - ThinkPad hardware daemon and tools
//!
//! Entry point for the command-line binary.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand};
use nix::sys::signal::{SigSet, Signal};
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

use lamco_thinkpad::acpi::{AcpiEvent, AcpiEventSource};
use lamco_thinkpad::config::Config;
use lamco_thinkpad::display::{ConnectionState, DisplayServer, DryRunDisplay, Rotation, X11Display};
use lamco_thinkpad::hardware::DockProbe;
use lamco_thinkpad::ini::Ini;
use lamco_thinkpad::multimon::{ConfigurationManager, LayoutProfile};
use lamco_thinkpad::power::{PowerStateManager, SuspendReason};
use lamco_thinkpad::utils::format_user_error;

/// Command-line arguments for lamco-thinkpad
#[derive(Parser, Debug)]
#[command(name = "lamco-thinkpad")]
#[command(version, about = "ThinkPad dock, ACPI event and multi-monitor tools", long_about = None)]
pub struct Args {
    /// Configuration file path
    #[arg(short, long, env = "LAMCO_THINKPAD_CONFIG")]
    pub config: Option<PathBuf>,

    /// Verbose logging (can be specified multiple times)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Log format (json|pretty|compact)
    #[arg(long, default_value = "pretty", global = true)]
    pub log_format: String,

    /// Write logs to file (in addition to stdout)
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    /// Record display changes instead of applying them
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Listen for ACPI and dock events until interrupted
    Listen {
        /// Suspend on lid close (undocked) and sleep keys
        #[arg(long)]
        suspend: bool,
    },
    /// List outputs, their modes and controllers
    Monitors,
    /// Arrange monitors around a primary and apply the layout
    Layout(LayoutArgs),
    /// Show dock presence and state
    Dock,
    /// Show or set the panel backlight
    Backlight {
        /// Action, `get` when omitted
        #[command(subcommand)]
        action: Option<BacklightAction>,
    },
    /// Show the ThinkLight state
    Thinklight,
}

/// Backlight actions
#[derive(Subcommand, Debug)]
pub enum BacklightAction {
    /// Print the current level
    Get,
    /// Set the level as a fraction of the maximum (0.0 to 1.0)
    Set {
        /// Fraction of the maximum brightness
        factor: f32,
    },
}

/// Compass layout arguments
#[derive(ClapArgs, Debug)]
pub struct LayoutArgs {
    /// Primary output, e.g. LVDS-1
    #[arg(long, required_unless_present = "profile")]
    pub primary: Option<String>,

    /// Output right of the primary
    #[arg(long)]
    pub right: Option<String>,

    /// Output left of the primary
    #[arg(long)]
    pub left: Option<String>,

    /// Output above the primary
    #[arg(long)]
    pub top: Option<String>,

    /// Output below the primary
    #[arg(long)]
    pub bottom: Option<String>,

    /// Output mirroring the primary
    #[arg(long)]
    pub mirror: Option<String>,

    /// Rotation of the primary in degrees
    #[arg(long, value_parser = parse_rotation)]
    pub rotate: Option<Rotation>,

    /// Load the layout from an INI profile
    #[arg(long, conflicts_with = "primary")]
    pub profile: Option<PathBuf>,

    /// Save the layout to an INI profile
    #[arg(long)]
    pub save: Option<PathBuf>,
}

fn parse_rotation(value: &str) -> std::result::Result<Rotation, String> {
    value
        .parse::<u16>()
        .ok()
        .and_then(Rotation::from_degrees)
        .ok_or_else(|| format!("{value} is not one of 0, 90, 180, 270"))
}

fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = args.config.clone().or_else(default_config_path);
    let loaded = match &config_path {
        Some(path) if path.exists() => Config::load(path).map(Some),
        _ => Ok(None),
    };

    // Logging needs the log directory, so configuration is read first and
    // its outcome reported once the subscriber is up.
    let log_dir = loaded
        .as_ref()
        .ok()
        .and_then(|c| c.as_ref())
        .and_then(|c| c.logging.log_dir.clone());
    let _guard = init_logging(&args, log_dir.as_deref())?;

    info!("════════════════════════════════════════════════════════");
    info!("  lamco-thinkpad v{}", env!("CARGO_PKG_VERSION"));
    info!("  Built: {} {}", env!("BUILD_DATE"), env!("BUILD_TIME"));
    info!("  Commit: {}", env!("GIT_HASH"));
    info!("  Profile: {}", if cfg!(debug_assertions) { "debug" } else { "release" });
    info!("════════════════════════════════════════════════════════");

    let config = match resolve_config(loaded, args.config.is_some()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", format_user_error(&e));
            return Err(e);
        }
    };
    debug!("Config: {:?}", config);

    if let Err(e) = run(&args, &config) {
        eprintln!("{}", format_user_error(&e));
        return Err(e);
    }
    Ok(())
}

/// Settle the outcome of reading the config file
///
/// A file named with `--config` must be valid. The default location may be
/// absent or broken, in which case the defaults are used.
fn resolve_config(loaded: Result<Option<Config>>, explicit: bool) -> Result<Config> {
    match loaded {
        Ok(Some(config)) => {
            info!("Configuration loaded successfully");
            Ok(config)
        }
        Ok(None) => {
            warn!("No config file found, using defaults");
            Ok(Config::default_config())
        }
        Err(e) if explicit => Err(e.context("Invalid configuration file given with --config")),
        Err(e) => {
            warn!("Failed to load config: {:#}, using defaults", e);
            Ok(Config::default_config())
        }
    }
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("lamco-thinkpad").join("config.toml"))
}

fn run(args: &Args, config: &Config) -> Result<()> {
    match &args.command {
        Command::Listen { suspend } => listen(config, *suspend),
        Command::Monitors => monitors(&open_display(args, config)?),
        Command::Layout(layout_args) => layout(&open_display(args, config)?, layout_args),
        Command::Dock => {
            let dock = config.dock_probe();
            let present = dock.probe();
            println!(
                "Dock device ({}): {}",
                dock.sysfs_path().display(),
                if present { "present" } else { "absent" }
            );
            if present {
                println!("Docked: {}", if dock.is_docked() { "yes" } else { "no" });
            }
            Ok(())
        }
        Command::Backlight { action } => {
            let backlight = config.backlight();
            match action {
                None | Some(BacklightAction::Get) => {
                    let level = backlight.level().context("Failed to read backlight")?;
                    println!("{:.0}%", level * 100.0);
                }
                Some(BacklightAction::Set { factor }) => {
                    backlight
                        .set_level(*factor)
                        .context("Failed to set backlight")?;
                    info!("Backlight set to {:.0}%", factor.clamp(0.0, 1.0) * 100.0);
                }
            }
            Ok(())
        }
        Command::Thinklight => {
            let light = config.thinklight();
            if !light.probe() {
                println!("No ThinkLight at {}", light.path().display());
                return Ok(());
            }
            let on = light.is_on().context("Failed to read ThinkLight")?;
            println!("ThinkLight: {}", if on { "on" } else { "off" });
            Ok(())
        }
    }
}

fn open_display(args: &Args, config: &Config) -> Result<Arc<dyn DisplayServer>> {
    let live = match &config.display.display_name {
        Some(name) => Arc::new(
            X11Display::connect(Some(name))
                .with_context(|| format!("Failed to open X11 display {name}"))?,
        ),
        None => X11Display::shared().context("Failed to open X11 display")?,
    };

    if args.dry_run || config.display.dry_run {
        info!("Dry run: display changes are recorded, not applied");
        let snapshot = DryRunDisplay::snapshot_of(&*live)
            .context("Failed to snapshot RandR resources")?
            .logging_requests();
        return Ok(Arc::new(snapshot));
    }
    Ok(live)
}

fn listen(config: &Config, suspend: bool) -> Result<()> {
    lamco_thinkpad::utils::log_startup_diagnostics();

    // Block before any thread starts so every thread inherits the mask and
    // the signals are only seen by sigwait below.
    let mut signals = SigSet::empty();
    signals.add(Signal::SIGINT);
    signals.add(Signal::SIGTERM);
    signals.thread_block().context("Failed to block signals")?;

    let dock: Arc<dyn DockProbe> = Arc::new(config.dock_probe());
    let mut source = AcpiEventSource::new(config.acpi_source(), Arc::clone(&dock))
        .context("Failed to create ACPI event source")?;

    source.add_event_handler(Arc::new(|event: AcpiEvent| {
        if event.is_known() {
            info!("Event: {}", event);
        } else {
            debug!("Event: {}", event);
        }
    }));

    if suspend {
        let power = PowerStateManager::with_logind(dock);
        source.add_event_handler(Arc::new(move |event: AcpiEvent| {
            let reason = match event {
                AcpiEvent::LidClosed => SuspendReason::Lid,
                AcpiEvent::ButtonFnF4Sleep | AcpiEvent::ButtonFnF12Suspend => SuspendReason::Button,
                _ => return,
            };
            power.request_suspend(reason);
        }));
    }

    source.start();
    if !source.is_running() {
        anyhow::bail!("No ACPI listener could be started, check acpid and udev configuration");
    }
    info!("Listening for ACPI events, press Ctrl+C to stop");

    let signal = signals.wait().context("Failed to wait for signals")?;
    info!("Received {:?}, shutting down", signal);
    source.stop();

    let stats = source.bus().stats();
    info!(
        "Dispatched {} events ({} jobs, {} dropped)",
        stats.events_dispatched, stats.jobs_queued, stats.jobs_dropped
    );
    Ok(())
}

fn monitors(display: &Arc<dyn DisplayServer>) -> Result<()> {
    let manager = ConfigurationManager::from_display(Arc::clone(display))
        .context("Failed to query RandR resources")?;
    let resources = manager.resources();

    for monitor in manager.monitors() {
        let info = monitor.output_info();
        let state = match info.connection {
            ConnectionState::Connected => "connected",
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Unknown => "unknown",
        };
        let (mm_w, mm_h) = monitor.physical_size_mm();
        println!("{} {} {}x{} mm", info.name, state, mm_w, mm_h);

        match (monitor.controller(), monitor.output_mode(), monitor.position()) {
            (Some(controller), Some(mode), Some(position)) => println!(
                "  {} {} {} {}",
                controller,
                mode.name,
                position,
                monitor.rotation()
            ),
            (Some(controller), None, _) => println!("  {} off", controller),
            _ => println!("  no controller"),
        }

        let preferred = monitor.preferred_output_mode();
        for &mode_id in &info.modes {
            if let Some(mode) = resources.mode(mode_id) {
                let current = monitor.output_mode().map(|m| m.id) == Some(mode_id);
                println!(
                    "    {:<12} {:>6.2} Hz{}{}",
                    mode.name,
                    mode.refresh_rate(),
                    if current { " *" } else { "" },
                    if preferred == Some(mode_id) { " +" } else { "" }
                );
            }
        }
    }
    Ok(())
}

fn layout(display: &Arc<dyn DisplayServer>, args: &LayoutArgs) -> Result<()> {
    let profile = match &args.profile {
        Some(path) => {
            let ini = Ini::read(path)
                .with_context(|| format!("Failed to read layout profile {}", path.display()))?;
            LayoutProfile::from_ini(&ini)?
        }
        None => LayoutProfile {
            primary: args.primary.clone().unwrap_or_default(),
            left: args.left.clone(),
            right: args.right.clone(),
            top: args.top.clone(),
            bottom: args.bottom.clone(),
            mirror: args.mirror.clone(),
            rotation: args.rotate.unwrap_or_default(),
        },
    };

    let mut manager = ConfigurationManager::from_display(Arc::clone(display))
        .context("Failed to query RandR resources")?;
    profile.apply(&mut manager).context("Failed to build layout")?;

    let report = manager
        .commit()
        .context("Layout has no primary monitor")?;
    if let Some(size) = report.screen_size {
        println!(
            "Screen {}x{} ({}x{} mm): {} applied, {} failed",
            size.width, size.height, size.mm_width, size.mm_height, report.applied, report.failed
        );
    }

    if let Some(path) = &args.save {
        save_profile(&profile, path)?;
    }

    if report.failed > 0 {
        anyhow::bail!("{} monitors could not be configured", report.failed);
    }
    Ok(())
}

fn save_profile(profile: &LayoutProfile, path: &Path) -> Result<()> {
    profile
        .to_ini()?
        .write(path)
        .with_context(|| format!("Failed to save layout profile {}", path.display()))?;
    info!("Layout saved to {}", path.display());
    Ok(())
}

fn init_logging(
    args: &Args,
    log_dir: Option<&Path>,
) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    use std::fs::File;

    let log_level = match args.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        // zbus logs every message at debug
        tracing_subscriber::EnvFilter::new(format!(
            "lamco_thinkpad={level},zbus=info,warn",
            level = log_level
        ))
    });

    let stdout = match args.log_format.as_str() {
        "json" => tracing_subscriber::fmt::layer().json().boxed(),
        "compact" => tracing_subscriber::fmt::layer().compact().boxed(),
        _ => tracing_subscriber::fmt::layer().pretty().boxed(),
    };

    // Explicit log file wins over the configured log directory
    let (writer, guard, target) = if let Some(path) = &args.log_file {
        let file = File::create(path)
            .with_context(|| format!("Failed to create log file {}", path.display()))?;
        let (writer, guard) = tracing_appender::non_blocking(file);
        (Some(writer), Some(guard), Some(path.display().to_string()))
    } else if let Some(dir) = log_dir {
        let appender = tracing_appender::rolling::daily(dir, "lamco-thinkpad.log");
        let (writer, guard) = tracing_appender::non_blocking(appender);
        (Some(writer), Some(guard), Some(dir.display().to_string()))
    } else {
        (None, None, None)
    };

    let file_layer = writer.map(|writer| {
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(writer)
            .with_ansi(false);
        match args.log_format.as_str() {
            "json" => layer.json().boxed(),
            _ => layer.boxed(),
        }
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout)
        .with(file_layer)
        .init();

    if let Some(target) = target {
        info!("Logging to file: {}", target);
    }
    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load(contents: &str) -> Result<Option<Config>> {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, contents).unwrap();
        Config::load(&path).map(Some)
    }

    // ===== Configuration =====

    #[test]
    fn test_explicit_invalid_config_is_fatal() {
        let err = resolve_config(load("[logging]\nlevel = \"loud\"\n"), true).unwrap_err();
        assert!(format!("{err:#}").contains("--config"));
    }

    #[test]
    fn test_default_location_falls_back() {
        let config = resolve_config(load("[logging]\nlevel = \"loud\"\n"), false).unwrap();
        assert_eq!(config.logging.level, Config::default_config().logging.level);

        assert!(resolve_config(Ok(None), true).is_ok());
    }

    #[test]
    fn test_valid_config_is_used() {
        let config = resolve_config(load("[logging]\nlevel = \"trace\"\n"), true).unwrap();
        assert_eq!(config.logging.level, "trace");
    }

    #[test]
    fn test_rotation_argument() {
        assert_eq!(parse_rotation("270"), Ok(Rotation::Right));
        assert!(parse_rotation("45").is_err());
    }
}
