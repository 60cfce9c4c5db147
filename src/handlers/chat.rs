//! Open conversation with the assistant

use std::sync::LazyLock;
use std::time::Duration;

use regex::{Captures, Regex};

use crate::error::with_timeout;
use crate::integrations::ChatModel;
use crate::session::Conversation;

fn pattern(re: &str) -> Regex {
    Regex::new(re).unwrap_or_else(|e| panic!("invalid markdown pattern {re}: {e}"))
}

static CODE_BLOCK: LazyLock<Regex> = LazyLock::new(|| pattern(r"(?s)```.*?```"));
static INLINE_CODE: LazyLock<Regex> = LazyLock::new(|| pattern(r"`([^`]+)`"));
static HEADING: LazyLock<Regex> = LazyLock::new(|| pattern(r"(?m)^\s*#+\s+"));
static LIST_ITEM: LazyLock<Regex> =
    LazyLock::new(|| pattern(r"(?m)^[ \t]*(?:[*\-+]|\d+\.)[ \t]+(.*)$"));
static EMPHASIS: LazyLock<Regex> = LazyLock::new(|| pattern(r"\*+|_+"));
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| pattern(r"\s+"));

/// Flatten model markdown into one plain line ready for speech
///
/// Code blocks are dropped and inline code keeps its text. Each list item
/// becomes its own sentence, and emphasis markers disappear.
#[must_use]
pub fn strip_markdown(text: &str) -> String {
    let text = CODE_BLOCK.replace_all(text, "");
    let text = INLINE_CODE.replace_all(&text, "$1");
    let text = HEADING.replace_all(&text, "");
    let text = LIST_ITEM.replace_all(&text, |caps: &Captures| end_sentence(&caps[1]));
    let text = EMPHASIS.replace_all(&text, "");
    let text = WHITESPACE.replace_all(&text, " ");
    text.trim_matches(|c: char| c == ',' || c.is_whitespace()).to_string()
}

fn end_sentence(item: &str) -> String {
    let item = item.trim_end();
    if item.is_empty() || item.ends_with(['.', '!', '?', ':', ';']) {
        item.to_string()
    } else {
        format!("{item}.")
    }
}

/// Ask the model and record the exchange; `None` when it did not answer
pub async fn respond(
    model: &dyn ChatModel,
    conversation: &mut Conversation,
    text: &str,
    budget: Duration,
) -> Option<String> {
    let answer = match with_timeout("llm", budget, model.reply(conversation.history(), text)).await {
        Ok(answer) => strip_markdown(&answer),
        Err(e) => {
            tracing::warn!(error = %e, "conversational model failed");
            return None;
        }
    };

    if answer.is_empty() {
        tracing::warn!("model answer was empty after cleanup");
        return None;
    }

    conversation.record_exchange(text, &answer);
    Some(answer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_emphasis_and_code() {
        assert_eq!(
            strip_markdown("**Hà Nội** là _thủ đô_. Dùng `cargo` nhé.\n```rust\nfn main() {}\n```"),
            "Hà Nội là thủ đô. Dùng cargo nhé."
        );
    }

    #[test]
    fn list_items_become_sentences() {
        assert_eq!(
            strip_markdown("Gợi ý:\n- Phở\n- Bún chả\n1. Một\n2. Hai"),
            "Gợi ý: Phở. Bún chả. Một. Hai."
        );
        assert_eq!(
            strip_markdown("Bạn nên:\n* **Ngủ sớm**!\n* Uống nước"),
            "Bạn nên: Ngủ sớm! Uống nước."
        );
    }

    #[test]
    fn list_items_split_into_separate_units() {
        let spoken = strip_markdown("Món ngon:\n- Phở\n- Bún chả\n- Nem rán");
        assert!(!spoken.contains(','));
        let units: Vec<_> = crate::voice::split_sentences(&spoken)
            .into_iter()
            .map(|unit| unit.text)
            .collect();
        assert_eq!(units, ["Món ngon: Phở.", "Bún chả.", "Nem rán."]);
    }

    #[test]
    fn headings_and_whitespace() {
        assert_eq!(strip_markdown("## Tiêu đề\n\n  nội   dung  "), "Tiêu đề nội dung");
    }
}
