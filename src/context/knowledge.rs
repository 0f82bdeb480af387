//! Session knowledge items included in AI prompts.

use serde::{Deserialize, Serialize};

/// A user-provided reference document attached to the session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeItem {
    pub id: String,
    pub name: String,
    pub text: String,
}

/// Renders knowledge items into a prompt section bounded by `budget`
/// bytes. Returns the rendered text and whether anything was cut.
pub fn render_knowledge(items: &[KnowledgeItem], budget: usize) -> (String, bool) {
    let mut rendered = String::new();
    let mut truncated = false;

    for item in items {
        let section = format!("[{}]\n{}\n\n", item.name, item.text);
        if rendered.len() + section.len() > budget {
            let remaining = budget.saturating_sub(rendered.len());
            let mut cut = remaining;
            while cut > 0 && !section.is_char_boundary(cut) {
                cut -= 1;
            }
            rendered.push_str(&section[..cut]);
            truncated = true;
            break;
        }
        rendered.push_str(&section);
    }

    (rendered.trim_end().to_string(), truncated)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(name: &str, text: &str) -> KnowledgeItem {
        KnowledgeItem {
            id: format!("id-{name}"),
            name: name.to_string(),
            text: text.to_string(),
        }
    }

    #[test]
    fn test_render_empty_items() {
        let (text, truncated) = render_knowledge(&[], 1024);
        assert!(text.is_empty());
        assert!(!truncated);
    }

    #[test]
    fn test_render_within_budget() {
        let items = vec![item("roadmap", "Q3 goals"), item("team", "five people")];
        let (text, truncated) = render_knowledge(&items, 1024);

        assert!(!truncated);
        assert!(text.contains("[roadmap]"));
        assert!(text.contains("Q3 goals"));
        assert!(text.contains("[team]"));
    }

    #[test]
    fn test_render_truncates_at_budget() {
        let items = vec![item("big", &"x".repeat(100))];
        let (text, truncated) = render_knowledge(&items, 32);

        assert!(truncated);
        assert!(text.len() <= 32);
        assert!(text.starts_with("[big]"));
    }

    #[test]
    fn test_later_items_dropped_after_budget() {
        let items = vec![item("first", &"a".repeat(40)), item("second", "never seen")];
        let (text, truncated) = render_knowledge(&items, 48);

        assert!(truncated);
        assert!(!text.contains("second"));
    }

    #[test]
    fn test_truncation_respects_char_boundaries() {
        let items = vec![item("utf8", &"é".repeat(50))];
        let (text, truncated) = render_knowledge(&items, 20);

        assert!(truncated);
        // Must not panic and must stay valid UTF-8 under the budget.
        assert!(text.len() <= 20);
    }

    #[test]
    fn test_item_serde_roundtrip() {
        let original = item("doc", "content");
        let json = serde_json::to_string(&original).unwrap();
        let parsed: KnowledgeItem = serde_json::from_str(&json).unwrap();
        assert_eq!(original, parsed);
    }
}
