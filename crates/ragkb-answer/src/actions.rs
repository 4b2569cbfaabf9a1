//! Follow-up actions offered next to an answer.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use ragkb_core::types::Evidence;

use crate::knowledge::KnowledgeBase;

/// At most this many `show_file` actions per answer.
pub const MAX_FILE_ACTIONS: usize = 3;
const VIEWABLE_EXTENSIONS: [&str; 4] = ["md", "txt", "sh", "log"];
const LOGS_SUGGESTION: &str = "Can you paste the output of `journalctl -u <service> -n 80`?";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FixTopic {
    DnsBind9,
    SshHardening,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ActionKind {
    ShowFile { source: String },
    ProposeFix { topic: FixTopic },
    AskFollowup { suggestion: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    pub id: String,
    pub label: String,
    #[serde(flatten)]
    pub kind: ActionKind,
}

impl Action {
    fn new(label: impl Into<String>, kind: ActionKind) -> Self {
        let mut id = Uuid::new_v4().simple().to_string();
        id.truncate(8);
        Self { id, label: label.into(), kind }
    }

    pub fn show_file(source: &str) -> Self {
        Self::new(format!("Open {source}"), ActionKind::ShowFile { source: source.to_string() })
    }

    pub fn propose_fix(topic: FixTopic) -> Self {
        let label = match topic {
            FixTopic::DnsBind9 => "Propose a Bind9 fix",
            FixTopic::SshHardening => "Harden SSH",
        };
        Self::new(label, ActionKind::ProposeFix { topic })
    }

    pub fn ask_for_logs() -> Self {
        Self::new("Ask me for the logs", ActionKind::AskFollowup { suggestion: LOGS_SUGGESTION.to_string() })
    }
}

fn is_viewable(source: &str) -> bool {
    source
        .rsplit_once('.')
        .is_some_and(|(_, ext)| VIEWABLE_EXTENSIONS.iter().any(|v| ext.eq_ignore_ascii_case(v)))
}

/// Actions for an answer built from `context`.
///
/// Files are offered for the first few `sources` with a plain-text extension
/// that exist in `kb`; fixes are proposed from keywords in the question (and
/// the context, for DNS); a request for logs always closes the list.
pub fn suggest_actions(
    question: &str,
    sources: &[String],
    context: &[Evidence],
    kb: Option<&KnowledgeBase>,
) -> Vec<Action> {
    let mut actions = Vec::new();
    if let Some(kb) = kb {
        for source in sources.iter().take(MAX_FILE_ACTIONS) {
            if is_viewable(source) && kb.contains(source) {
                actions.push(Action::show_file(source));
            }
        }
    }

    let question = question.to_lowercase();
    let mentions_dns = |text: &str| text.contains("dns") || text.contains("bind");
    if mentions_dns(&question) || context.iter().any(|e| mentions_dns(&e.text.to_lowercase())) {
        actions.push(Action::propose_fix(FixTopic::DnsBind9));
    }
    if question.contains("ssh") {
        actions.push(Action::propose_fix(FixTopic::SshHardening));
    }
    actions.push(Action::ask_for_logs());
    actions
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_check_ignores_case() {
        assert!(is_viewable("notes.MD"));
        assert!(is_viewable("deploy.sh"));
        assert!(!is_viewable("diagram.pdf"));
        assert!(!is_viewable("README"));
    }

    #[test]
    fn serialized_shape() {
        let json = serde_json::to_value(Action::propose_fix(FixTopic::DnsBind9)).unwrap();
        assert_eq!(json["type"], "propose_fix");
        assert_eq!(json["payload"]["topic"], "dns_bind9");
        assert_eq!(json["label"], "Propose a Bind9 fix");
        assert_eq!(json["id"].as_str().map(str::len), Some(8));
    }
}
