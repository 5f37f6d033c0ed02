//! Seed context and fallback answers.

use std::sync::LazyLock;

use pcapai_core::CaptureIdentity;
use pcapai_filter::CaptureSummary;
use regex::Regex;

static MENTIONS_PROTOCOLS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bprotocols?\b").expect("Invalid protocol keyword regex"));
static MENTIONS_HOSTS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(ips?|address(es)?|hosts?)\b").expect("Invalid host keyword regex")
});

/// System turn opening every question.
pub fn system_prompt(
    identity: &CaptureIdentity,
    summary: &CaptureSummary,
    focus: Option<&str>,
    max_rounds: u32,
) -> String {
    let mut prompt = String::from(
        "You are an expert network analyst answering questions about one packet capture.\n\
         Use the provided tools to inspect packets; do not guess at values you can look up.\n\
         Answer in plain English once you have enough evidence.\n\n",
    );
    prompt.push_str(&format!("Capture: {}\n", identity.path.display()));
    prompt.push_str(&format!("{}\n\n", summary));
    if let Some(focus) = focus {
        prompt.push_str(&format!(
            "Protocol focus: {}. Filters without an explicit protocol are restricted to {} packets.\n",
            focus, focus
        ));
    }
    prompt.push_str(&format!(
        "You may request tools for at most {} rounds before answering.\n",
        max_rounds
    ));
    prompt
}

/// Answer used when the round budget runs out.
pub fn round_limit_answer(rounds: u32, last_tool_result: Option<&str>, summary: &CaptureSummary) -> String {
    let mut answer = format!(
        "Round limit reached: no final answer after {} tool rounds.\n\n",
        rounds
    );
    match last_tool_result {
        Some(result) => {
            answer.push_str("Last tool result:\n");
            answer.push_str(result);
        }
        None => {
            answer.push_str("Capture summary:\n");
            answer.push_str(&summary.to_string());
        }
    }
    answer
}

/// Answer built from the capture alone when the model cannot be reached.
pub fn offline_answer(
    question: &str,
    reason: &str,
    summary: &CaptureSummary,
    last_tool_result: Option<&str>,
) -> String {
    let mut answer = format!("OFFLINE MODE - model unavailable ({}).\n\n", reason);

    if MENTIONS_PROTOCOLS.is_match(question) {
        answer.push_str("Protocols detected in this capture:\n");
        for (protocol, count) in &summary.protocols {
            answer.push_str(&format!("- {}: {} packets\n", protocol, count));
        }
        answer.push_str(&format!("\nTotal packets analyzed: {}\n", summary.total_packets));
    } else if MENTIONS_HOSTS.is_match(question) {
        answer.push_str("Top source IP addresses:\n");
        for (ip, count) in summary.top_source_ips.iter().take(5) {
            answer.push_str(&format!("- {}: {} packets\n", ip, count));
        }
        answer.push_str(&format!("\nTotal packets analyzed: {}\n", summary.total_packets));
    } else {
        answer.push_str("Capture summary:\n");
        answer.push_str(&summary.to_string());
        answer.push('\n');
    }

    if let Some(result) = last_tool_result {
        answer.push_str("\nLast tool result:\n");
        answer.push_str(result);
    }
    answer
}
