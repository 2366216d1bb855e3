//! Plain-text rendering of conversation state for the terminal.

use docchat_core::{ConversationState, Document, Exchange};

/// Longest question shown in the history list.
const HISTORY_PREVIEW_CHARS: usize = 60;

fn label(exchange: &Exchange) -> &'static str {
    if exchange.is_user() {
        "you"
    } else {
        "assistant"
    }
}

pub fn format_message(exchange: &Exchange) -> String {
    format!("{}> {}", label(exchange), exchange.text)
}

/// Every message on screen, pending answer included.
///
/// With a history pair selected, every line is indented and the selected
/// pair's question and answer are marked with `*`.
pub fn format_transcript(state: &ConversationState) -> String {
    let selected = state.selected_index();
    state
        .display_messages()
        .iter()
        .enumerate()
        .map(|(i, message)| match selected {
            None => format_message(message),
            Some(index) if state.pair_index_for_message(i) == Some(index) => {
                format!("* {}", format_message(message))
            }
            Some(_) => format!("  {}", format_message(message)),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Numbered source list, or `None` when the answer has no sources.
pub fn format_sources(documents: Option<&[Document]>) -> Option<String> {
    let documents = documents.filter(|docs| !docs.is_empty())?;
    let mut out = String::from("Sources:");
    for (i, doc) in documents.iter().enumerate() {
        let source = if doc.source_id.is_empty() {
            "(unknown source)"
        } else {
            doc.source_id.as_str()
        };
        out.push_str(&format!("\n  [{}] {}", i + 1, source));
    }
    Some(out)
}

fn preview(text: &str) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(HISTORY_PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{}...", head)
    } else {
        head
    }
}

/// The history sidebar: one line per pair, 1-based, selected entry marked.
pub fn format_history(state: &ConversationState) -> String {
    let pairs = state.history_pairs();
    if pairs.is_empty() {
        return "No history yet.".to_string();
    }
    pairs
        .iter()
        .enumerate()
        .map(|(i, pair)| {
            let marker = if state.selected_index() == Some(i) {
                '*'
            } else {
                ' '
            };
            format!("{} {:>2}. {}", marker, i + 1, preview(pair.question()))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use docchat_core::persistence::Transcript;
    use docchat_core::{ConversationStore, HistoryPair};

    fn state_with_pairs(pairs: &[(&str, &str)]) -> ConversationState {
        let store = ConversationStore::new();
        let mut exchanges = Vec::new();
        let mut history = Vec::new();
        for (q, a) in pairs {
            exchanges.push(Exchange::user(*q));
            exchanges.push(Exchange::assistant(*a, None));
            history.push(HistoryPair::new(*q, *a));
        }
        store.restore(Transcript::new(exchanges, history)).unwrap();
        store.snapshot()
    }

    #[test]
    fn messages_are_labelled_by_role() {
        assert_eq!(format_message(&Exchange::user("hi")), "you> hi");
        assert_eq!(
            format_message(&Exchange::assistant("hello", None)),
            "assistant> hello"
        );
    }

    #[test]
    fn transcript_lists_messages_in_order() {
        let state = state_with_pairs(&[("Q1", "A1")]);
        assert_eq!(format_transcript(&state), "you> Q1\nassistant> A1");
    }

    #[test]
    fn transcript_marks_selected_pair() {
        let store = ConversationStore::new();
        store
            .restore(Transcript::new(
                vec![
                    Exchange::assistant("Hi", None),
                    Exchange::user("dropped"),
                    Exchange::user("Q1"),
                    Exchange::assistant("A1", None),
                    Exchange::user("Q2"),
                    Exchange::assistant("A2", None),
                ],
                vec![HistoryPair::new("Q1", "A1"), HistoryPair::new("Q2", "A2")],
            ))
            .unwrap();
        store.select_history(Some(0)).unwrap();

        assert_eq!(
            format_transcript(&store.snapshot()),
            "  assistant> Hi\n  you> dropped\n* you> Q1\n* assistant> A1\n  you> Q2\n  assistant> A2"
        );
    }

    #[test]
    fn sources_are_numbered() {
        let docs = vec![Document::new("a", "docs/a.md"), Document::new("b", "")];
        assert_eq!(
            format_sources(Some(docs.as_slice())).unwrap(),
            "Sources:\n  [1] docs/a.md\n  [2] (unknown source)"
        );
    }

    #[test]
    fn no_sources() {
        assert_eq!(format_sources(None), None);
        assert_eq!(format_sources(Some(&[][..])), None);
    }

    #[test]
    fn empty_history() {
        assert_eq!(format_history(&ConversationState::new()), "No history yet.");
    }

    #[test]
    fn history_marks_selection() {
        let store = ConversationStore::new();
        store
            .restore(Transcript::new(
                vec![],
                vec![HistoryPair::new("Q1", "A1"), HistoryPair::new("Q2", "A2")],
            ))
            .unwrap();
        store.select_history(Some(1)).unwrap();

        assert_eq!(format_history(&store.snapshot()), "   1. Q1\n*  2. Q2");
    }

    #[test]
    fn long_questions_are_shortened() {
        let long = "x".repeat(HISTORY_PREVIEW_CHARS + 5);
        let state = state_with_pairs(&[(&long, "A")]);
        let line = format_history(&state);
        assert!(line.ends_with("..."));
        assert_eq!(line.chars().filter(|c| *c == 'x').count(), HISTORY_PREVIEW_CHARS);
    }
}
