//! Klipper Voice main entry point
//!
//! Stands in for the printer host: reads one line per trigger from stdin and
//! drives the announcement engine between lines.
//! 1. `EVENT <name>` - printer lifecycle event
//! 2. `PRINT_STATE <state>` / `TEMPERATURE <heater> <temp> <target>` - status samples
//! 3. `API <endpoint> [json]` - remote interface
//! 4. anything else - voice command

use anyhow::Context;
use klipper_voice::commands::{execute, Command};
use klipper_voice::events::{EventSink, PrintStateTracker, PrinterEvent, TemperatureTracker};
use klipper_voice::scheduler::POLL_INTERVAL;
use klipper_voice::state::config::Config;
use klipper_voice::state::State;
use klipper_voice::{api, APP_NAME, VERSION};
use log::{debug, error, info, warn};
use mio::unix::SourceFd;
use mio::{Events, Interest, Poll, Token};
use nix::errno::Errno;
use nix::fcntl::{fcntl, FcntlArg, OFlag};
use nix::unistd;
use std::collections::HashMap;
use std::io::{self, BufRead};
use std::os::unix::io::{AsRawFd, RawFd};
use std::path::PathBuf;
use std::process;
use std::thread;
use std::time::{Duration, Instant};

/// Token for stdin in mio poll
const STDIN: Token = Token(0);

/// How long shutdown waits for stopped players to exit
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Per-heater trackers plus the print-state tracker
#[derive(Default)]
struct Trackers {
    print_state: PrintStateTracker,
    heaters: HashMap<String, TemperatureTracker>,
}

fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let debug_mode = args.iter().any(|arg| arg == "--debug" || arg == "-d");

    // Initialize logger
    if debug_mode {
        use std::fs::OpenOptions;
        match OpenOptions::new()
            .create(true)
            .append(true)
            .open("klipper-voice.log")
        {
            Ok(log_file) => {
                env_logger::Builder::new()
                    .filter_level(log::LevelFilter::Debug)
                    .target(env_logger::Target::Pipe(Box::new(log_file)))
                    .init();
            }
            Err(e) => {
                eprintln!(
                    "Warning: Failed to open klipper-voice.log for debug logging: {}",
                    e
                );
                eprintln!("Continuing without file logging...");
                env_logger::Builder::new()
                    .filter_level(log::LevelFilter::Warn)
                    .init();
            }
        }

        info!(
            "{} version {} starting (debug mode, logging to klipper-voice.log)",
            APP_NAME, VERSION
        );
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
            .init();
    }

    if let Err(e) = run(&args) {
        error!("Fatal error: {:#}", e);
        process::exit(1);
    }
}

/// Value following `--config`, if given
fn config_path(args: &[String]) -> anyhow::Result<Option<PathBuf>> {
    match args.iter().position(|arg| arg == "--config" || arg == "-c") {
        Some(pos) => args
            .get(pos + 1)
            .map(|p| Some(PathBuf::from(p)))
            .context("--config needs a path"),
        None => Ok(None),
    }
}

fn run(args: &[String]) -> anyhow::Result<()> {
    let path = config_path(args)?.unwrap_or_else(Config::default_path);
    let config = Config::load(&path)
        .with_context(|| format!("Failed to load config {}", path.display()))?;
    info!("Configuration loaded from {}", path.display());

    let state = State::new(config, Some(path));
    let mut trackers = Trackers::default();

    state.on_event(PrinterEvent::Ready, Instant::now());
    info!("{} ready - reading triggers from stdin", APP_NAME);

    let stdin_fd = io::stdin().as_raw_fd();
    let mut poll = Poll::new()?;
    let registered = poll
        .registry()
        .register(&mut SourceFd(&stdin_fd), STDIN, Interest::READABLE);

    if let Err(e) = registered {
        // Regular files cannot be polled
        debug!("stdin not pollable ({}), reading sequentially", e);
        return run_sequential(&state, &mut trackers);
    }

    // mio is edge-triggered: stdin must be drained until EAGAIN on every wakeup
    let _nonblocking = NonBlocking::set(stdin_fd)?;

    let mut events = Events::with_capacity(16);
    let mut pending = Vec::new();

    loop {
        state.tick(Instant::now());

        let timeout = state
            .time_until_next_tick()
            .map(|d| d.min(POLL_INTERVAL))
            .unwrap_or(POLL_INTERVAL);

        if let Err(e) = poll.poll(&mut events, Some(timeout)) {
            if e.kind() == io::ErrorKind::Interrupted {
                continue;
            }
            return Err(e.into());
        }

        for event in events.iter() {
            if event.token() != STDIN {
                continue;
            }

            let eof = drain_stdin(stdin_fd, &mut pending)?;
            while let Some(pos) = pending.iter().position(|&b| b == b'\n') {
                let line: Vec<u8> = pending.drain(..=pos).collect();
                handle_line(&state, &mut trackers, &String::from_utf8_lossy(&line));
            }

            if eof {
                // Last line without a trailing newline
                if !pending.is_empty() {
                    handle_line(&state, &mut trackers, &String::from_utf8_lossy(&pending));
                }
                info!("stdin closed, shutting down");
                shutdown(&state);
                return Ok(());
            }
        }
    }
}

/// O_NONBLOCK on a descriptor, restored to the original flags on drop
struct NonBlocking {
    fd: RawFd,
    flags: OFlag,
}

impl NonBlocking {
    fn set(fd: RawFd) -> nix::Result<Self> {
        let flags = OFlag::from_bits_truncate(fcntl(fd, FcntlArg::F_GETFL)?);
        fcntl(fd, FcntlArg::F_SETFL(flags | OFlag::O_NONBLOCK))?;
        Ok(Self { fd, flags })
    }
}

impl Drop for NonBlocking {
    fn drop(&mut self) {
        if let Err(e) = fcntl(self.fd, FcntlArg::F_SETFL(self.flags)) {
            debug!("Failed to restore stdin flags: {}", e);
        }
    }
}

/// Read everything stdin has available into `pending`
///
/// Returns true once the writer has closed its end.
fn drain_stdin(fd: RawFd, pending: &mut Vec<u8>) -> nix::Result<bool> {
    let mut buf = [0u8; 4096];
    loop {
        match unistd::read(fd, &mut buf) {
            Ok(0) => return Ok(true),
            Ok(n) => pending.extend_from_slice(&buf[..n]),
            Err(Errno::EAGAIN) => return Ok(false),
            Err(Errno::EINTR) => continue,
            Err(e) => return Err(e),
        }
    }
}

/// Fallback loop for stdin that mio cannot watch
fn run_sequential(state: &State, trackers: &mut Trackers) -> anyhow::Result<()> {
    for line in io::stdin().lock().lines() {
        state.tick(Instant::now());
        handle_line(state, trackers, &line?);
    }

    // Let the last playback finish before exiting
    while state.time_until_next_tick().is_some() {
        thread::sleep(POLL_INTERVAL);
        state.tick(Instant::now());
    }

    shutdown(state);
    Ok(())
}

fn shutdown(state: &State) {
    state.on_event(PrinterEvent::Shutdown, Instant::now());

    // Reap players that are still exiting after the stop
    let deadline = Instant::now() + SHUTDOWN_GRACE;
    while state.time_until_next_tick().is_some() && Instant::now() < deadline {
        thread::sleep(POLL_INTERVAL);
        state.tick(Instant::now());
    }

    info!("{} stopped", APP_NAME);
}

/// Dispatch one input line
fn handle_line(state: &State, trackers: &mut Trackers, line: &str) {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return;
    }

    let now = Instant::now();
    let (head, rest) = match line.split_once(char::is_whitespace) {
        Some((head, rest)) => (head, rest.trim()),
        None => (line, ""),
    };

    match head.to_ascii_uppercase().as_str() {
        "EVENT" => match rest.parse::<PrinterEvent>() {
            Ok(event) => {
                state.on_event(event, now);
            }
            Err(e) => warn!("{}", e),
        },
        "PRINT_STATE" => {
            if let Some(event) = trackers.print_state.update(rest) {
                state.on_event(event, now);
            }
        }
        "TEMPERATURE" => handle_temperature(state, trackers, rest, now),
        "API" => {
            let (endpoint, body) = match rest.split_once(char::is_whitespace) {
                Some((endpoint, body)) => (endpoint, Some(body)),
                None => (rest, None),
            };
            match api::handle_request(state, endpoint, body, now) {
                Ok(reply) => println!("{}", reply),
                Err(e) => println!("{}", serde_json::json!({ "error": e.to_string() })),
            }
        }
        _ => match Command::parse(line).and_then(|cmd| execute(state, cmd, now)) {
            Ok(lines) => {
                for line in lines {
                    println!("{}", line);
                }
            }
            Err(e) => println!("!! {}", e),
        },
    }
}

fn handle_temperature(state: &State, trackers: &mut Trackers, rest: &str, now: Instant) {
    let fields: Vec<&str> = rest.split_whitespace().collect();
    let parsed = match fields.as_slice() {
        [heater, temp, target] => temp
            .parse::<f32>()
            .ok()
            .zip(target.parse::<f32>().ok())
            .map(|(temp, target)| (*heater, temp, target)),
        _ => None,
    };

    let Some((heater, temp, target)) = parsed else {
        warn!("Malformed TEMPERATURE line: '{}'", rest);
        return;
    };

    let tracker = trackers.heaters.entry(heater.to_string()).or_default();
    if let Some(event) = tracker.update(temp, target) {
        debug!("{} -> {:?}", heater, event);
        state.on_event(event, now);
    }
}
