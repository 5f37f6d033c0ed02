//! Host state shared by the one-shot commands and the interactive shell.

use std::path::Path;
use std::sync::Arc;

use pcapai_chat::{Answer, CommandModel, ConversationHistory, LanguageModel, OfflineModel, Orchestrator};
use pcapai_core::config::PcapAiConfig;
use pcapai_core::error::PcapAiError;
use pcapai_filter::CaptureSummary;
use pcapai_session::{AutoParser, CaptureSession, SessionCache, SessionError, SessionInfo, SnapshotStore};
use tracing::{info, warn};

/// One active capture, the orchestrator that answers questions about it, and
/// the exchanges of this process.
pub struct Host {
    cache: SessionCache,
    orchestrator: Orchestrator,
    history: ConversationHistory,
}

impl Host {
    /// Wire the tshark-backed cache, the snapshot store under `data_dir` and
    /// the configured model transport.
    pub fn from_config(config: &PcapAiConfig, data_dir: &Path) -> Self {
        let parser = AutoParser::new(config.session.tshark_path.clone());
        let mut cache = SessionCache::new(Box::new(parser));
        if config.session.snapshot_enabled {
            let path = data_dir.join(&config.session.snapshot_file);
            match SnapshotStore::new(&path) {
                Ok(store) => cache = cache.with_snapshots(store),
                Err(e) => warn!(
                    path = %path.display(),
                    error = %e,
                    "Snapshot store unavailable, sessions will not persist"
                ),
            }
        }

        let model: Arc<dyn LanguageModel> = match CommandModel::from_config(&config.model) {
            Some(model) => {
                info!(model = %config.model.model, "Model command configured");
                Arc::new(model)
            }
            None => {
                info!("No model command configured, answering offline");
                Arc::new(OfflineModel)
            }
        };

        Self::with_parts(cache, model, config)
    }

    pub fn with_parts(cache: SessionCache, model: Arc<dyn LanguageModel>, config: &PcapAiConfig) -> Self {
        Self {
            cache,
            orchestrator: Orchestrator::new(model, config),
            history: ConversationHistory::new(),
        }
    }

    /// Reinstate the persisted session, if it is still valid.
    pub fn restore(&mut self) -> Option<Arc<CaptureSession>> {
        self.cache.restore()
    }

    /// Make `path` the active capture. Switching to different content
    /// starts a fresh conversation.
    pub fn load(&mut self, path: &Path) -> Result<Arc<CaptureSession>, SessionError> {
        let previous = self.cache.current().map(|s| s.identity().fingerprint.clone());
        let session = self.cache.load(path)?;
        if previous.as_deref() != Some(session.identity().fingerprint.as_str()) {
            self.history.clear();
        }
        Ok(session)
    }

    /// Answer one question about the active capture.
    ///
    /// `focus` overrides the session focus for this question only. The
    /// exchange is recorded only once an answer exists, so dropping the
    /// returned future leaves the history untouched.
    pub async fn ask(&mut self, question: &str, focus: Option<&str>) -> Result<Answer, PcapAiError> {
        let mut session = self.cache.current().ok_or(PcapAiError::NoCapture)?;
        if let Some(focus) = focus {
            session = Arc::new(session.with_focus(normalize_focus(focus)));
        }

        let answer = self
            .orchestrator
            .ask(&session, &self.history, question)
            .await?;
        self.history.push(question.trim(), &answer);
        Ok(answer)
    }

    /// Set or clear (`none`) the persisted protocol focus.
    pub fn set_focus(&mut self, focus: &str) -> Result<Option<String>, SessionError> {
        let session = self.cache.set_focus(Some(focus))?;
        Ok(session.focus().map(str::to_string))
    }

    pub fn info(&self) -> Option<SessionInfo> {
        self.cache.info()
    }

    pub fn summary(&self) -> Option<CaptureSummary> {
        self.cache
            .current()
            .map(|s| CaptureSummary::from_records(s.records()))
    }

    pub fn clear(&mut self) -> Result<(), SessionError> {
        self.history.clear();
        self.cache.clear()
    }

    pub fn history(&self) -> &ConversationHistory {
        &self.history
    }
}

fn normalize_focus(focus: &str) -> Option<String> {
    let focus = focus.trim().to_ascii_lowercase();
    (!focus.is_empty() && focus != "none").then_some(focus)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pcapai_chat::{ModelResponse, ScriptedModel, Termination, ToolCall};
    use pcapai_session::JsonExportParser;
    use serde_json::json;
    use std::path::PathBuf;

    fn http_packet(number: u32, method: &str, src: &str) -> serde_json::Value {
        json!({
            "_source": {"layers": {
                "frame": {
                    "frame.number": number.to_string(),
                    "frame.time_epoch": format!("1700000000.{:03}000000", number),
                    "frame.len": "120",
                    "frame.protocols": "eth:ethertype:ip:tcp:http"
                },
                "ip": {"ip.src": src, "ip.dst": "10.0.0.80"},
                "tcp": {"tcp.srcport": "51000", "tcp.dstport": "80"},
                "http": {"http.request.method": method, "http.host": "example.com"}
            }}
        })
    }

    fn write_export(dir: &Path, name: &str, packets: Vec<serde_json::Value>) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, serde_json::to_vec(&packets).unwrap()).unwrap();
        path
    }

    fn host_with(model: Arc<dyn LanguageModel>) -> Host {
        let mut config = PcapAiConfig::default();
        config.orchestrator.retry_delay_ms = 0;
        let cache = SessionCache::new(Box::new(JsonExportParser));
        Host::with_parts(cache, model, &config)
    }

    fn tool_request(args: serde_json::Value) -> ModelResponse {
        ModelResponse::ToolCalls(vec![ToolCall::new("c1", "filter_packets_by_protocol", args)])
    }

    #[tokio::test]
    async fn test_ask_without_capture() {
        let mut host = host_with(Arc::new(OfflineModel));
        let err = host.ask("anything?", None).await.unwrap_err();
        assert!(matches!(err, PcapAiError::NoCapture));
    }

    #[tokio::test]
    async fn test_ask_records_history() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_export(
            dir.path(),
            "trace.json",
            vec![http_packet(1, "GET", "10.0.0.1"), http_packet(2, "POST", "10.0.0.2")],
        );
        let model = Arc::new(ScriptedModel::new(vec![
            Ok(tool_request(json!({"protocol": "http"}))),
            Ok(ModelResponse::Text("Two HTTP requests.".into())),
        ]));
        let mut host = host_with(model.clone());
        host.load(&path).unwrap();

        let answer = host.ask("  how many http requests?  ", None).await.unwrap();
        assert_eq!(answer.terminated, Termination::Answered);
        assert_eq!(answer.rounds_used, 1);
        assert_eq!(answer.answer, "Two HTTP requests.");
        assert_eq!(host.history().len(), 1);
        assert_eq!(
            host.history().exchanges().next().unwrap().question,
            "how many http requests?"
        );

        let requests = model.requests();
        let tool_result = &requests[1].messages.last().unwrap().content;
        assert!(tool_result.contains("\"total_matches\":2"));
    }

    #[tokio::test]
    async fn test_focus_override_is_not_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_export(dir.path(), "trace.json", vec![http_packet(1, "GET", "10.0.0.1")]);
        let model = Arc::new(ScriptedModel::new(vec![Ok(ModelResponse::Text("ok".into()))]));
        let mut host = host_with(model.clone());
        host.load(&path).unwrap();

        host.ask("what is there?", Some("NFS")).await.unwrap();
        let system = &model.requests()[0].messages[0].content;
        assert!(system.contains("Protocol focus: nfs"));
        assert_eq!(host.info().unwrap().focus, None);
    }

    #[test]
    fn test_set_focus_none_clears() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_export(dir.path(), "trace.json", vec![http_packet(1, "GET", "10.0.0.1")]);
        let mut host = host_with(Arc::new(OfflineModel));
        host.load(&path).unwrap();

        assert_eq!(host.set_focus("HTTP").unwrap().as_deref(), Some("http"));
        assert_eq!(host.set_focus("none").unwrap(), None);
    }

    #[tokio::test]
    async fn test_loading_new_content_resets_history() {
        let dir = tempfile::tempdir().unwrap();
        let first = write_export(dir.path(), "a.json", vec![http_packet(1, "GET", "10.0.0.1")]);
        let second = write_export(dir.path(), "b.json", vec![http_packet(1, "POST", "10.0.0.9")]);
        let mut host = host_with(Arc::new(OfflineModel));

        host.load(&first).unwrap();
        let answer = host.ask("which protocols?", None).await.unwrap();
        assert_eq!(answer.terminated, Termination::Aborted);
        assert_eq!(host.history().len(), 1);

        host.load(&first).unwrap();
        assert_eq!(host.history().len(), 1);

        host.load(&second).unwrap();
        assert!(host.history().is_empty());
    }

    #[test]
    fn test_summary_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_export(
            dir.path(),
            "trace.json",
            vec![http_packet(1, "GET", "10.0.0.1"), http_packet(2, "GET", "10.0.0.1")],
        );
        let mut host = host_with(Arc::new(OfflineModel));
        assert!(host.summary().is_none());
        host.load(&path).unwrap();
        assert_eq!(host.summary().unwrap().total_packets, 2);

        host.clear().unwrap();
        assert!(host.info().is_none());
    }

    #[test]
    fn test_from_config_persists_across_hosts() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_export(dir.path(), "trace.json", vec![http_packet(1, "GET", "10.0.0.1")]);
        let data_dir = dir.path().join("data");
        let config = PcapAiConfig::default();

        let mut first = Host::from_config(&config, &data_dir);
        first.load(&path).unwrap();
        first.set_focus("http").unwrap();

        let mut second = Host::from_config(&config, &data_dir);
        let restored = second.restore().unwrap();
        assert_eq!(restored.focus(), Some("http"));
        assert_eq!(second.info().unwrap().parse_count, 0);
    }

    #[test]
    fn test_normalize_focus() {
        assert_eq!(normalize_focus(" DNS "), Some("dns".to_string()));
        assert_eq!(normalize_focus("None"), None);
        assert_eq!(normalize_focus(""), None);
    }
}
