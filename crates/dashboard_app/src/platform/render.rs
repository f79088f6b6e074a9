use std::fmt::Write;

use dashboard_core::{AppViewModel, ExecutionPhase, NotificationKind, SystemStatusKind};

/// Log lines shown under the system table; the full buffer stays exportable.
const LOG_TAIL: usize = 15;

pub fn render(view: &AppViewModel) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", header(view));

    if let Some(period) = &view.period {
        let _ = writeln!(
            out,
            "period: {} .. {}{}",
            period.start_date.as_deref().unwrap_or("-"),
            period.end_date.as_deref().unwrap_or("-"),
            if period.use_d1_anbima { " (D-1 ANBIMA)" } else { "" }
        );
    }

    let _ = writeln!(
        out,
        "systems: {} total, {} active, {} inactive",
        view.total_systems, view.active_systems, view.inactive_systems
    );
    for row in &view.systems {
        let _ = write!(
            out,
            "  [{}] {:<10} {:<9} {:>3}%",
            if row.active { "x" } else { " " },
            row.id,
            status_label(row.status),
            row.progress
        );
        if let Some(message) = &row.message {
            let _ = write!(out, "  {message}");
        }
        let enabled: Vec<&str> = row
            .options
            .iter()
            .filter(|(_, on)| *on)
            .map(|(name, _)| name.as_str())
            .collect();
        if !enabled.is_empty() {
            let _ = write!(out, "  {{{}}}", enabled.join(", "));
        }
        out.push('\n');
    }

    let _ = writeln!(
        out,
        "logs: {} shown / {} buffered{}",
        view.visible_logs.len(),
        view.buffered_logs,
        if view.logs_paused { " (paused)" } else { "" }
    );
    let skip = view.visible_logs.len().saturating_sub(LOG_TAIL);
    for entry in &view.visible_logs[skip..] {
        let _ = writeln!(
            out,
            "  {} {:<7} [{}] {}",
            entry.timestamp,
            entry.level.as_str(),
            entry.system,
            entry.message
        );
    }

    if let Some(notification) = &view.notification {
        let _ = writeln!(
            out,
            "{} {}",
            notification_label(notification.kind),
            notification.message
        );
    }
    out
}

fn header(view: &AppViewModel) -> String {
    let link = if view.connected { "online" } else { "offline" };
    let execution = match view.phase {
        ExecutionPhase::Idle => "idle".to_string(),
        ExecutionPhase::Launching { .. } => "launching".to_string(),
        ExecutionPhase::Running { job_id } => format!("running job {job_id}"),
    };
    let last_job = match (view.phase, view.job_id, view.job_status) {
        (ExecutionPhase::Running { .. }, _, _) | (_, None, _) => String::new(),
        (_, Some(job_id), Some(status)) => format!(" | last job {job_id}: {}", status.as_str()),
        (_, Some(job_id), None) => format!(" | last job {job_id}"),
    };
    format!("== ETL dashboard | live: {link} | {execution}{last_job} ==")
}

fn status_label(status: SystemStatusKind) -> &'static str {
    match status {
        SystemStatusKind::Idle => "idle",
        SystemStatusKind::Running => "running",
        SystemStatusKind::Success => "success",
        SystemStatusKind::Error => "error",
        SystemStatusKind::Cancelled => "cancelled",
    }
}

fn notification_label(kind: NotificationKind) -> &'static str {
    match kind {
        NotificationKind::Success => "[ok]",
        NotificationKind::Error => "[error]",
        NotificationKind::Warning => "[warn]",
        NotificationKind::Info => "[info]",
    }
}

#[cfg(test)]
mod tests {
    use dashboard_core::{
        JobStatus, LogEntry, LogLevel, Notification, Period, SystemRowView,
    };

    use super::*;

    fn view() -> AppViewModel {
        AppViewModel {
            phase: ExecutionPhase::Running { job_id: 42 },
            executing: true,
            connected: false,
            job_id: Some(42),
            job_status: Some(JobStatus::Running),
            systems: vec![SystemRowView {
                id: "maps".to_string(),
                name: "MAPS".to_string(),
                active: true,
                status: SystemStatusKind::Running,
                progress: 40,
                message: Some("downloading".to_string()),
                options: vec![("excel".to_string(), true), ("pdf".to_string(), false)],
            }],
            total_systems: 1,
            active_systems: 1,
            inactive_systems: 0,
            period: Some(Period::default()),
            visible_logs: (0..20)
                .map(|n| LogEntry {
                    level: LogLevel::Info,
                    system: "maps".to_string(),
                    message: format!("line {n}"),
                    timestamp: "t".to_string(),
                    job_id: Some(42),
                })
                .collect(),
            buffered_logs: 20,
            logs_paused: true,
            notification: Some(Notification {
                id: 1,
                kind: NotificationKind::Warning,
                message: "Live connection lost".to_string(),
            }),
        }
    }

    #[test]
    fn shows_connection_and_execution_independently() {
        let text = render(&view());
        assert!(text.starts_with("== ETL dashboard | live: offline | running job 42 =="));
        assert!(text.contains("[x] maps       running    40%  downloading  {excel}"));
        assert!(text.contains("logs: 20 shown / 20 buffered (paused)"));
        assert!(text.contains("[warn] Live connection lost"));
    }

    #[test]
    fn only_the_log_tail_is_printed() {
        let text = render(&view());
        assert!(!text.contains("line 4\n"));
        assert!(text.contains("line 5\n"));
        assert!(text.contains("line 19\n"));
    }

    #[test]
    fn settled_job_is_shown_as_last_job() {
        let mut settled = view();
        settled.phase = ExecutionPhase::Idle;
        settled.job_status = Some(JobStatus::Completed);
        settled.connected = true;
        let text = render(&settled);
        assert!(text.starts_with("== ETL dashboard | live: online | idle | last job 42: completed =="));
    }
}
