use dashboard_core::{Effect, Msg};
use dashboard_engine::{EngineCommand, EngineEvent, EngineHandle, JobStore};
use engine_logging::{engine_error, engine_info, targets};

/// Carries out effects: durable job-key effects here, everything else on the engine.
pub struct EffectRunner {
    engine: EngineHandle,
    store: Box<dyn JobStore>,
}

impl EffectRunner {
    pub fn new(engine: EngineHandle, store: Box<dyn JobStore>) -> Self {
        Self { engine, store }
    }

    pub fn engine(&self) -> &EngineHandle {
        &self.engine
    }

    pub fn store(&self) -> &dyn JobStore {
        self.store.as_ref()
    }

    pub fn run(&self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::PersistJob(job_id) => match self.store.save(job_id) {
                    Ok(()) => engine_info!(target: targets::STORE, "Persisted job {}", job_id),
                    Err(err) => {
                        engine_error!(target: targets::STORE, "Failed to persist job {}: {}", job_id, err)
                    }
                },
                Effect::ForgetJob => {
                    if let Err(err) = self.store.clear() {
                        engine_error!(target: targets::STORE, "Failed to clear persisted job: {}", err);
                    }
                }
                other => {
                    if let Some(command) = engine_command(other) {
                        self.engine.send(command);
                    }
                }
            }
        }
    }

    pub fn shutdown(&mut self) {
        self.engine.shutdown();
    }
}

pub fn engine_command(effect: Effect) -> Option<EngineCommand> {
    let command = match effect {
        Effect::LoadConfig => EngineCommand::LoadConfig,
        Effect::SaveConfig(config) => EngineCommand::SaveConfig(config),
        Effect::PushSystemToggle { system_id, active } => {
            EngineCommand::ToggleSystem { system_id, active }
        }
        Effect::PushOptionToggle {
            system_id,
            option,
            value,
        } => EngineCommand::UpdateOption {
            system_id,
            option,
            value,
        },
        Effect::Execute { request, body } => EngineCommand::Execute { request, body },
        Effect::CancelJob { job_id } => EngineCommand::Cancel { job_id },
        Effect::StartPolling { job_id } => EngineCommand::StartPolling { job_id },
        Effect::StopPolling => EngineCommand::StopPolling,
        Effect::PollNow { job_id } => EngineCommand::PollNow { job_id },
        Effect::Reconnect => EngineCommand::Reconnect,
        Effect::ExpireNotification { id, after } => EngineCommand::ExpireNotification { id, after },
        Effect::PersistJob(_) | Effect::ForgetJob => return None,
    };
    Some(command)
}

pub fn event_to_msg(event: EngineEvent) -> Msg {
    match event {
        EngineEvent::ConfigLoaded(result) => Msg::ConfigLoaded(result),
        EngineEvent::ConfigSaved(result) => Msg::ConfigSaved(result),
        EngineEvent::ExecuteResponded { request, result } => {
            Msg::ExecuteResponded { request, result }
        }
        EngineEvent::CancelResponded { job_id, result } => Msg::CancelResponded { job_id, result },
        EngineEvent::JobPolled { job_id, result } => Msg::JobPolled { job_id, result },
        EngineEvent::ConnectionChanged(connected) => Msg::ConnectionChanged(connected),
        EngineEvent::ReconnectExhausted => Msg::ReconnectExhausted,
        EngineEvent::Log(entry) => Msg::LogReceived(entry),
        EngineEvent::Status { system_id, update } => Msg::StatusReceived { system_id, update },
        EngineEvent::JobComplete(completion) => Msg::JobCompleted(completion),
        EngineEvent::NotificationExpired { id } => Msg::NotificationExpired { id },
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use dashboard_core::{JobCompletion, JobStatus};
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn durable_key_effects_stay_off_the_engine() {
        assert_eq!(engine_command(Effect::PersistJob(42)), None);
        assert_eq!(engine_command(Effect::ForgetJob), None);
    }

    #[test]
    fn io_effects_become_engine_commands() {
        assert_eq!(
            engine_command(Effect::PushSystemToggle {
                system_id: "maps".to_string(),
                active: true
            }),
            Some(EngineCommand::ToggleSystem {
                system_id: "maps".to_string(),
                active: true
            })
        );
        assert_eq!(
            engine_command(Effect::ExpireNotification {
                id: 4,
                after: Duration::from_secs(4)
            }),
            Some(EngineCommand::ExpireNotification {
                id: 4,
                after: Duration::from_secs(4)
            })
        );
        assert_eq!(
            engine_command(Effect::Reconnect),
            Some(EngineCommand::Reconnect)
        );
    }

    #[test]
    fn live_events_become_messages() {
        let completion = JobCompletion {
            job_id: 42,
            status: JobStatus::Completed,
            duration_secs: 8,
        };
        assert_eq!(
            event_to_msg(EngineEvent::JobComplete(completion.clone())),
            Msg::JobCompleted(completion)
        );
        assert_eq!(
            event_to_msg(EngineEvent::ConnectionChanged(false)),
            Msg::ConnectionChanged(false)
        );
    }
}
