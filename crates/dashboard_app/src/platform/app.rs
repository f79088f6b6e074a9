use std::io::{self, BufRead};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, TryRecvError};
use std::thread;
use std::time::Duration;

use anyhow::Context;
use chrono::Utc;
use dashboard_core::{update, AppState, Effect, Msg, Period};
use dashboard_engine::{AtomicFileWriter, EngineCommand, EngineHandle, FileJobStore, JobStore};
use engine_logging::{engine_info, engine_warn, targets};

use super::commands::{parse_command, Command, HELP};
use super::effects::{event_to_msg, EffectRunner};
use super::logging;
use super::render::render;
use super::settings::{read_settings, settings_path, Settings, SettingsError};

/// How long one loop turn waits for engine events before checking stdin.
const PUMP_INTERVAL: Duration = Duration::from_millis(20);

pub fn run_app() -> anyhow::Result<()> {
    let path = settings_path();
    let loaded = read_settings(&path);
    let settings = match &loaded {
        Ok(settings) => settings.clone(),
        Err(_) => Settings::default(),
    };
    logging::initialize(settings.log_destination);
    match loaded {
        Ok(_) => engine_info!("Loaded settings from {:?}", path),
        Err(SettingsError::Missing(_)) => engine_info!("No settings at {:?}; using defaults", path),
        Err(err) => engine_warn!("{}; using defaults", err),
    }

    let mut controller = Controller::start(&settings)?;
    println!("{}", render(&controller.state.view()));
    let lines = spawn_stdin_reader();

    loop {
        controller.pump_engine(PUMP_INTERVAL);
        match lines.try_recv() {
            Ok(line) => {
                if controller.handle_line(&line) == Flow::Quit {
                    break;
                }
            }
            Err(TryRecvError::Empty) => {}
            Err(TryRecvError::Disconnected) => break,
        }
    }

    controller.shutdown();
    Ok(())
}

fn spawn_stdin_reader() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Owns the coordinator state and its collaborators for one application run.
pub struct Controller {
    state: AppState,
    runner: EffectRunner,
}

impl Controller {
    /// Builds the engine, resumes a persisted job, loads config and opens the live channel.
    pub fn start(settings: &Settings) -> anyhow::Result<Self> {
        let engine = EngineHandle::new(settings.engine_settings())
            .context("could not build the backend client")?;
        let store = FileJobStore::new(settings.state_dir.clone());
        let state = AppState::with_limits(settings.max_logs, settings.notification_duration());
        Ok(Self::with_parts(state, engine, Box::new(store)))
    }

    pub fn with_parts(state: AppState, engine: EngineHandle, store: Box<dyn JobStore>) -> Self {
        let mut controller = Self {
            state,
            runner: EffectRunner::new(engine, store),
        };
        match controller.runner.store().load() {
            Ok(Some(job_id)) => controller.dispatch(Msg::RestoreJob(job_id)),
            Ok(None) => {}
            Err(err) => engine_warn!(target: targets::STORE, "Ignoring persisted job: {}", err),
        }
        controller.runner.run(vec![Effect::LoadConfig]);
        controller.runner.engine().send(EngineCommand::Connect);
        controller
    }

    /// Feeds one message through `update`, runs its effects and redraws when dirty.
    pub fn dispatch(&mut self, msg: Msg) {
        let state = std::mem::take(&mut self.state);
        let (mut state, effects) = update(state, msg);
        let dirty = state.consume_dirty();
        self.state = state;
        self.runner.run(effects);
        if dirty {
            println!("{}", render(&self.state.view()));
        }
    }

    /// Waits up to `wait` for the first engine event, then drains the rest.
    pub fn pump_engine(&mut self, wait: Duration) {
        let Some(first) = self.runner.engine().recv_timeout(wait) else {
            return;
        };
        self.dispatch(event_to_msg(first));
        while let Some(event) = self.runner.engine().try_recv() {
            self.dispatch(event_to_msg(event));
        }
    }

    pub fn handle_line(&mut self, line: &str) -> Flow {
        let command = match parse_command(line) {
            Ok(command) => command,
            Err(err) => {
                println!("{err}");
                return Flow::Continue;
            }
        };
        match command {
            Command::Send(msg) => self.dispatch(msg),
            Command::Period { start, end } => {
                let use_d1_anbima = self
                    .state
                    .config()
                    .map_or(true, |config| config.period.use_d1_anbima);
                self.dispatch(Msg::PeriodChanged(Period {
                    start_date: start,
                    end_date: end,
                    use_d1_anbima,
                }));
            }
            Command::Export(target) => {
                let target = target.unwrap_or_else(default_export_path);
                match export_to(&target, &self.state.export_logs()) {
                    Ok(path) => println!("logs written to {}", path.display()),
                    Err(err) => println!("export failed: {err:#}"),
                }
            }
            Command::Status => println!("{}", render(&self.state.view())),
            Command::Help => println!("{HELP}"),
            Command::Quit => return Flow::Quit,
        }
        Flow::Continue
    }

    /// Unsubscribes from the live channel, disconnects and stops polling.
    pub fn shutdown(&mut self) {
        self.runner.shutdown();
    }
}

fn default_export_path() -> PathBuf {
    PathBuf::from(format!(
        "etl-logs-{}.txt",
        Utc::now().format("%Y-%m-%dT%H-%M-%SZ")
    ))
}

fn export_to(target: &Path, content: &str) -> anyhow::Result<PathBuf> {
    let file_name = target
        .file_name()
        .and_then(|name| name.to_str())
        .with_context(|| format!("{} does not name a file", target.display()))?;
    let dir = match target.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let written = AtomicFileWriter::new(dir).write(file_name, content)?;
    Ok(written)
}
