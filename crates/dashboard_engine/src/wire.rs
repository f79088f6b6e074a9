//! Live channel frames: a JSON envelope `{ "type": ..., "payload": ... }`.

use dashboard_core::{
    JobCompletion, JobId, JobStatus, LogEntry, LogLevel, StatusUpdate, SystemStatusKind,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::{FrameError, FrameKind};

/// A decoded inbound event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    Log(LogEntry),
    Status {
        system_id: String,
        update: StatusUpdate,
    },
    JobComplete(JobCompletion),
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    payload: serde_json::Value,
}

#[derive(Deserialize)]
struct LogPayload {
    #[serde(default)]
    level: String,
    #[serde(default)]
    sistema: String,
    #[serde(default)]
    mensagem: String,
    #[serde(default)]
    timestamp: String,
    #[serde(default)]
    job_id: Option<JobId>,
}

#[derive(Deserialize)]
struct StatusPayload {
    sistema_id: String,
    status: String,
    #[serde(default)]
    progresso: f64,
    #[serde(default)]
    mensagem: Option<String>,
}

#[derive(Deserialize)]
struct JobCompletePayload {
    job_id: JobId,
    status: String,
    #[serde(default)]
    duracao_segundos: f64,
}

pub fn decode_frame(text: &str) -> Result<ChannelEvent, FrameError> {
    let envelope: Envelope =
        serde_json::from_str(text).map_err(|err| FrameError::Malformed(err.to_string()))?;

    match envelope.kind.as_str() {
        "log" => {
            let payload: LogPayload = payload(FrameKind::Log, envelope.payload)?;
            Ok(ChannelEvent::Log(LogEntry {
                level: LogLevel::parse_lenient(&payload.level),
                system: payload.sistema,
                message: payload.mensagem,
                timestamp: payload.timestamp,
                job_id: payload.job_id,
            }))
        }
        "status" => {
            let payload: StatusPayload = payload(FrameKind::Status, envelope.payload)?;
            let status = SystemStatusKind::parse(&payload.status).ok_or_else(|| {
                FrameError::InvalidPayload {
                    kind: FrameKind::Status,
                    reason: format!("unknown status {:?}", payload.status),
                }
            })?;
            Ok(ChannelEvent::Status {
                system_id: payload.sistema_id,
                update: StatusUpdate {
                    status,
                    progress: payload.progresso.clamp(0.0, 100.0).round() as u8,
                    message: payload.mensagem,
                },
            })
        }
        "job_complete" => {
            let payload: JobCompletePayload = payload(FrameKind::JobComplete, envelope.payload)?;
            Ok(ChannelEvent::JobComplete(JobCompletion {
                job_id: payload.job_id,
                status: JobStatus::parse(&payload.status),
                duration_secs: payload.duracao_segundos.max(0.0).round() as u64,
            }))
        }
        other => Err(FrameError::UnknownType(other.to_string())),
    }
}

fn payload<T: DeserializeOwned>(kind: FrameKind, value: serde_json::Value) -> Result<T, FrameError> {
    serde_json::from_value(value).map_err(|err| FrameError::InvalidPayload {
        kind,
        reason: err.to_string(),
    })
}
