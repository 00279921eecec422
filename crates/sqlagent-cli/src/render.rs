//! Plain-text rendering of the session snapshots.

use std::fmt::Write;

use sqlagent_core::models::{QueryId, QueryRecord};
use sqlagent_session::{HistoryState, ResultBody, ResultDisplay, SubmissionPhase};

const QUESTION_WIDTH: usize = 60;

fn timestamp(ts: jiff::Timestamp) -> String {
    ts.strftime("%Y-%m-%d %H:%M:%S").to_string()
}

/// Shorten to `width` characters, marking the cut with an ellipsis.
pub fn truncate(text: &str, width: usize) -> String {
    let line = text.lines().next().unwrap_or_default();
    let cut = line.chars().count() > width || line.len() < text.trim_end().len();
    if !cut {
        return line.to_string();
    }
    let kept: String = line.chars().take(width.saturating_sub(1)).collect();
    format!("{kept}…")
}

/// Status line under the input. Empty when idle.
pub fn submission(phase: &SubmissionPhase) -> String {
    match phase {
        SubmissionPhase::Idle => String::new(),
        SubmissionPhase::Pending { question } => {
            format!("submitting: {}", truncate(question, QUESTION_WIDTH))
        }
        SubmissionPhase::Succeeded(detail) => {
            format!("submitted {} ({})", detail.id, detail.status)
        }
        SubmissionPhase::Failed { question, error } => {
            format!(
                "error: {error}\nyour question was kept: {}",
                truncate(question, QUESTION_WIDTH)
            )
        }
    }
}

fn history_row(out: &mut String, record: &QueryRecord, selected: Option<&QueryId>) {
    let marker = if selected == Some(&record.id) { '>' } else { ' ' };
    let _ = writeln!(
        out,
        "{marker} {:<12} {:<9} {}  {}",
        record.id.as_str(),
        record.status.as_str(),
        timestamp(record.created_at),
        truncate(&record.question, QUESTION_WIDTH),
    );
}

pub fn history(state: &HistoryState, selected: Option<&QueryId>) -> String {
    match state {
        HistoryState::Loading => "loading history…\n".to_string(),
        HistoryState::Error(e) => format!("could not load history: {e}\n"),
        HistoryState::Ready { records, .. } if records.is_empty() => "no queries yet\n".to_string(),
        HistoryState::Ready {
            records,
            refreshing,
            ..
        } => {
            let mut out = String::new();
            for record in records {
                history_row(&mut out, record, selected);
            }
            if *refreshing {
                out.push_str("(refreshing)\n");
            }
            out
        }
    }
}

pub fn result(display: &ResultDisplay) -> String {
    let mut out = match &display.body {
        ResultBody::Empty => "no query selected\n".to_string(),
        ResultBody::Loading => "loading…\n".to_string(),
        ResultBody::Answer(text) => format!("{}\n", text.trim_end()),
        ResultBody::QueryFailed(message) => format!("query failed: {message}\n"),
        ResultBody::NoAnswerYet => "no answer yet\n".to_string(),
        ResultBody::Unavailable(e) => format!("could not load result: {e}\n"),
    };

    if let Some(meta) = &display.meta {
        let _ = write!(
            out,
            "\n[{}] {} · {}",
            meta.id,
            meta.status,
            timestamp(meta.created_at)
        );
        if let Some(latency) = meta.latency_seconds {
            let _ = write!(out, " · {latency:.2}s");
        }
        if let Some(thread) = &meta.thread_id {
            let _ = write!(out, " · thread {thread}");
        }
        if meta.provisional {
            out.push_str(" · refreshing");
        }
        out.push('\n');
    }
    out
}
