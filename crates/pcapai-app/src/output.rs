//! Plain-text rendering for the terminal.

use pcapai_chat::Answer;
use pcapai_filter::CaptureSummary;
use pcapai_session::{CaptureSession, SessionInfo};

pub fn format_loaded(session: &CaptureSession) -> String {
    let mut out = format!(
        "Loaded {} ({} packets",
        session.identity().path.display(),
        session.records().len()
    );
    if session.skipped() > 0 {
        out.push_str(&format!(", {} skipped", session.skipped()));
    }
    out.push(')');
    if let Some(focus) = session.focus() {
        out.push_str(&format!(", focus {}", focus));
    }
    out.push('\n');
    out
}

pub fn format_info(info: &SessionInfo, summary: Option<&CaptureSummary>) -> String {
    let mut out = String::new();
    out.push_str(&format!("Capture:     {}\n", info.path.display()));
    out.push_str(&format!("Fingerprint: {}\n", info.fingerprint));
    out.push_str(&format!("Size:        {} bytes\n", info.size_bytes));
    out.push_str(&format!(
        "Records:     {} ({} skipped, {} timestamps adjusted)\n",
        info.records, info.skipped, info.timestamp_adjustments
    ));
    out.push_str(&format!(
        "Focus:       {}\n",
        info.focus.as_deref().unwrap_or("none")
    ));
    out.push_str(&format!("Parses:      {}\n", info.parse_count));
    out.push_str(&format!(
        "Snapshot:    {}\n",
        if info.snapshot_present { "saved" } else { "none" }
    ));
    if let Some(summary) = summary {
        out.push('\n');
        out.push_str(&summary.to_string());
    }
    out
}

pub fn format_answer(answer: &Answer) -> String {
    let mut out = answer.answer.trim_end().to_string();
    out.push('\n');
    if !answer.is_answered() {
        out.push_str(&format!(
            "[{} after {} tool rounds]\n",
            answer.terminated, answer.rounds_used
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pcapai_chat::Termination;
    use std::path::PathBuf;

    fn info() -> SessionInfo {
        SessionInfo {
            path: PathBuf::from("/tmp/trace.pcap"),
            fingerprint: "abc123".into(),
            size_bytes: 2048,
            records: 10,
            skipped: 1,
            timestamp_adjustments: 0,
            focus: Some("nfs".into()),
            parse_count: 1,
            snapshot_present: true,
        }
    }

    #[test]
    fn test_format_info() {
        let text = format_info(&info(), None);
        assert!(text.contains("Capture:     /tmp/trace.pcap"));
        assert!(text.contains("Records:     10 (1 skipped, 0 timestamps adjusted)"));
        assert!(text.contains("Focus:       nfs"));
        assert!(text.contains("Snapshot:    saved"));
    }

    #[test]
    fn test_format_info_with_summary() {
        let summary = CaptureSummary {
            total_packets: 10,
            ..CaptureSummary::default()
        };
        let text = format_info(&info(), Some(&summary));
        assert!(text.contains("Total packets: 10"));
    }

    #[test]
    fn test_format_answer_marks_aborted() {
        let answered = Answer {
            answer: "Two hosts.\n".into(),
            terminated: Termination::Answered,
            rounds_used: 1,
        };
        assert_eq!(format_answer(&answered), "Two hosts.\n");

        let aborted = Answer {
            answer: "Round limit reached".into(),
            terminated: Termination::Aborted,
            rounds_used: 5,
        };
        assert!(format_answer(&aborted).ends_with("[aborted after 5 tool rounds]\n"));
    }
}
