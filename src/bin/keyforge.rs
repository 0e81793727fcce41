// Keyforge CLI
// Runs the remapping engine against the local keyboards until interrupted

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::{debug, error, info, warn};

use keyforge_core::input::known_names;
use keyforge_core::{
    detect_provider, ui_channel, DeviceFilter, EngineError, EngineStatus, EvdevHook,
    EvdevKeySource, EventLoop, ForegroundGate, KeyCapture, KeyEventEngine, RepeatingTimer,
    RuleTable, Settings, TimerHandle, UiEvent, UiInbox, VirtualKeyboard, COMMON_KEYS,
    DEFAULT_UI_CAPACITY,
};

/// How long --detect-key waits for a key press
const DETECT_KEY_TIMEOUT: Duration = Duration::from_secs(30);

/// Single-key remapper that only acts while a chosen application has focus
#[derive(Parser, Debug)]
#[command(name = "keyforge")]
#[command(version)]
#[command(about = "Single-key remapper gated on the foreground application", long_about = None)]
struct Args {
    /// TOML configuration file (default: ~/.config/keyforge/config.toml)
    #[arg(short, long, value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Validate config and exit
    #[arg(long)]
    check_config: bool,

    /// List titles of open windows and exit
    #[arg(long)]
    list_windows: bool,

    /// List key names usable in rules and exit
    #[arg(long)]
    list_keys: bool,

    /// Wait for one key press and print its name
    #[arg(long)]
    detect_key: bool,

    /// List the keyboards that would be grabbed and exit
    #[arg(long)]
    devices: bool,
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp_millis()
        .init();
}

fn check_config(settings: &Settings) -> Result<()> {
    let table = RuleTable::from_records(settings.rules()).context("Invalid rules")?;
    match settings.source_path() {
        Some(path) => println!("Configuration {} is valid", path.display()),
        None => println!("No configuration file found; defaults are valid"),
    }
    println!(
        "  focus: {}",
        if settings.enforce_app_focus() {
            format!("only while \"{}\" has focus", settings.target_app_name())
        } else {
            "global".to_string()
        }
    );
    println!("  {} rule(s), {} enabled", table.len(), table.enabled_count());
    for rule in table.rules() {
        println!("    {}", rule);
    }
    Ok(())
}

fn list_windows() -> Result<()> {
    let gate = ForegroundGate::new(detect_provider());
    println!("Window provider: {}", gate.provider_name());
    gate.update_status();
    if let Some(window) = gate.last_window() {
        println!("Focused: {}", window);
    }
    let titles = gate.enumerate_open_windows();
    println!("{} open window(s):", titles.len());
    for title in titles {
        println!("  {}", title);
    }
    Ok(())
}

fn list_keys() {
    for group in COMMON_KEYS {
        println!("{}:", group.title);
        println!("  {}", group.keys.join(", "));
    }
    let all: Vec<&str> = known_names().collect();
    println!("All key names:");
    println!("  {}", all.join(", "));
}

fn list_devices(settings: &Settings) -> Result<()> {
    let devices = EventLoop::list_devices(&DeviceFilter::new(settings.devices()))
        .context("Error finding keyboard devices")?;
    println!("Found {} keyboard device(s):", devices.len());
    for device in &devices {
        println!("  {} ({})", device.name, device.path);
    }
    Ok(())
}

fn detect_key(settings: &Settings) -> Result<()> {
    let (notifier, inbox) = ui_channel(DEFAULT_UI_CAPACITY);
    let capture = KeyCapture::new(notifier);
    let filter = DeviceFilter::new(settings.devices());

    println!("Press a key...");
    capture.listen_for_next_key(move || EvdevKeySource::open(&filter));

    match inbox.recv_timeout(DETECT_KEY_TIMEOUT) {
        Some(UiEvent::KeyCaptured(Ok(key))) => {
            println!("{}", key);
            Ok(())
        }
        Some(UiEvent::KeyCaptured(Err(reason))) => bail!("Key capture failed: {}", reason),
        _ => bail!("No key pressed within {}s", DETECT_KEY_TIMEOUT.as_secs()),
    }
}

fn install_signal_handler(running: Arc<AtomicBool>) -> Result<()> {
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals = Signals::new([SIGINT, SIGTERM]).context("Cannot install signal handler")?;
    std::thread::Builder::new()
        .name("keyforge-signals".into())
        .spawn(move || {
            if let Some(signal) = signals.forever().next() {
                info!("Received signal {}, shutting down", signal);
                running.store(false, Ordering::SeqCst);
            }
        })
        .context("Cannot spawn signal thread")?;
    Ok(())
}

/// Keep the gate current: push-based when the provider supports it,
/// otherwise a polling timer
fn track_focus(gate: &Arc<ForegroundGate>, settings: &Settings) -> Result<Option<TimerHandle>> {
    if !settings.enforce_app_focus() {
        return Ok(None);
    }
    if gate.subscribe_foreground_changes(|window, status| match window {
        Some(window) => debug!("Focus: {} ({})", window, status),
        None => debug!("Focus: no window ({})", status),
    }) {
        return Ok(None);
    }

    let polled = gate.clone();
    let timer = RepeatingTimer::start(settings.poll_interval(), move || {
        polled.update_status();
    })
    .context("Cannot start focus polling")?;
    info!(
        "Polling the foreground window every {}ms",
        settings.poll_interval().as_millis()
    );
    Ok(Some(timer))
}

fn report(event: UiEvent) {
    match event {
        UiEvent::Engine(EngineStatus::Error(reason)) => error!("Engine error: {}", reason),
        UiEvent::Engine(status) => info!("Engine {}", status),
        UiEvent::Gate(status) => info!("Remapping {}", status),
        UiEvent::Focus {
            title: Some(title),
            status,
        } => info!("Focus: {} ({})", title, status),
        UiEvent::Focus { title: None, status } => info!("Focus: no window ({})", status),
        UiEvent::KeyCaptured(result) => debug!("Key captured: {:?}", result),
    }
}

fn drain_until_stopped(inbox: &UiInbox, running: &AtomicBool) {
    while running.load(Ordering::SeqCst) {
        if let Some(event) = inbox.recv_timeout(Duration::from_millis(200)) {
            report(event);
        }
        inbox.dispatch(report);
    }
}

fn run(settings: &Settings) -> Result<()> {
    let table = RuleTable::from_records(settings.rules()).context("Invalid rules")?;
    if table.is_empty() {
        warn!(
            "No rules configured; add [[rules]] to {}",
            settings
                .source_path()
                .map(|p| p.display().to_string())
                .or_else(|| Settings::default_path().map(|p| p.display().to_string()))
                .unwrap_or_else(|| "the configuration file".to_string())
        );
    }

    let (notifier, inbox) = ui_channel(DEFAULT_UI_CAPACITY);

    let gate = Arc::new(ForegroundGate::with_cache_ttl(
        detect_provider(),
        settings.cache_ttl(),
    ));
    gate.set_notifier(notifier.clone());
    gate.set_target_app(settings.target_app_name());
    gate.set_enforce_focus(settings.enforce_app_focus());

    let output = Arc::new(VirtualKeyboard::new().map_err(EngineError::from)?);
    let hook = EvdevHook::new(DeviceFilter::new(settings.devices()), output.clone());
    let mut engine = KeyEventEngine::new(
        table.dispatch_handle(),
        gate.clone(),
        output.clone(),
        Box::new(hook),
    )
    .with_notifier(notifier);

    let running = Arc::new(AtomicBool::new(true));
    install_signal_handler(running.clone())?;

    let focus_timer = track_focus(&gate, settings)?;
    engine.start()?;
    info!(
        "Remapping {} rule(s) via {} window tracking",
        table.enabled_count(),
        gate.provider_name()
    );

    drain_until_stopped(&inbox, &running);

    if let Some(timer) = focus_timer {
        timer.stop();
    }
    gate.unsubscribe();
    let released = engine.stop()?;
    if !released.is_empty() {
        info!("Released {} held key(s)", released.len());
    }
    inbox.dispatch(report);
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    if args.list_keys {
        list_keys();
        return Ok(());
    }
    if args.list_windows {
        return list_windows();
    }

    let settings = Settings::load(args.config.as_deref()).with_context(|| match &args.config {
        Some(path) => format!("Cannot load {}", path.display()),
        None => "Cannot load the default configuration".to_string(),
    })?;

    if args.check_config {
        return check_config(&settings);
    }
    if args.devices {
        return list_devices(&settings);
    }
    if args.detect_key {
        return detect_key(&settings);
    }

    run(&settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_parsing() {
        let args = Args::parse_from(["keyforge", "--config", "/tmp/test.toml"]);
        assert_eq!(args.config, Some(PathBuf::from("/tmp/test.toml")));
        assert!(!args.verbose);
        assert!(!args.check_config);
        assert!(!args.list_windows);
        assert!(!args.detect_key);
        assert!(!args.devices);
    }

    #[test]
    fn test_args_flags() {
        let args = Args::parse_from(["keyforge", "-v", "--check-config", "--list-keys"]);
        assert!(args.verbose);
        assert!(args.check_config);
        assert!(args.list_keys);
        assert_eq!(args.config, None);
    }

    #[test]
    fn test_check_config_rejects_cycle() {
        let settings = Settings::from_toml(
            r#"
[[rules]]
key_to_replace = "a"
replacement_key = "b"

[[rules]]
key_to_replace = "b"
replacement_key = "a"
"#,
        )
        .unwrap();
        assert!(check_config(&settings).is_err());
    }
}
