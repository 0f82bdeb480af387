//! Prompt assembly for Q&A, insights, and suggested questions.
//!
//! Prompts always carry the complete transcript; the model's large
//! context window is the design assumption, and nothing here truncates
//! transcript text. Knowledge sections are the only bounded part.

/// The fixed first suggested question.
pub const FIXED_FIRST_QUESTION: &str = "Summarize recent discussion";

/// Slot fill-ins for a session that has no transcript yet.
pub const DEFAULT_QUESTIONS: &[&str] = &[
    "What are the main topics being discussed?",
    "What decisions have been made so far?",
    "Are there any action items or next steps?",
    "What questions or concerns were raised?",
    "What are the key technical details mentioned?",
    "Who is responsible for each task?",
];

fn focus_prefix(focus: &str) -> String {
    if focus.is_empty() {
        String::new()
    } else {
        format!("The user's goal for this session is: '{focus}'\n\n")
    }
}

fn knowledge_section(knowledge: &str, truncated: bool) -> String {
    if knowledge.is_empty() {
        return String::new();
    }
    let marker = if truncated { " (truncated=true)" } else { "" };
    format!("Reference material{marker}:\n{knowledge}\n\n")
}

/// Prompt for answering a live question over the full transcript.
pub fn qa_prompt(
    focus: &str,
    knowledge: &str,
    knowledge_truncated: bool,
    transcript: &str,
    history: &[(String, String)],
    question: &str,
) -> String {
    let mut prompt = focus_prefix(focus);
    prompt.push_str(&knowledge_section(knowledge, knowledge_truncated));

    prompt.push_str(
        "You are an assistant with access to the complete meeting transcript \
         from beginning to end. Answer the question using any information \
         from the entire meeting.\n\nComplete meeting transcript:\n",
    );
    if transcript.is_empty() {
        prompt.push_str("(no meeting content yet)");
    } else {
        prompt.push_str(transcript);
    }

    if !history.is_empty() {
        prompt.push_str("\n\nEarlier questions in this session:\n");
        for (q, a) in history {
            prompt.push_str(&format!("Q: {q}\nA: {a}\n"));
        }
    }

    prompt.push_str(&format!(
        "\n\nQuestion: {question}\n\nAnswer concisely based on the transcript:"
    ));
    prompt
}

/// Prompt asking for a summary, action items, and follow-up questions in
/// one pass, in a line-oriented format the insight parser understands.
pub fn insights_prompt(focus: &str, transcript: &str) -> String {
    let mut prompt = focus_prefix(focus);
    prompt.push_str(&format!(
        "Review the complete meeting transcript below. Respond with:\n\
         1. A short summary of the discussion so far (1-2 plain sentences).\n\
         2. Action items, each on its own line starting with \"- \".\n\
         3. Follow-up questions worth asking, each on its own line ending \
         with a question mark.\n\n\
         Complete meeting transcript:\n{transcript}\n\n\
         Respond with those lines only, no headings:"
    ));
    prompt
}

/// Prompt regenerating one rotating suggested-question slot.
pub fn question_prompt(focus: &str, transcript: &str, existing: &[String]) -> String {
    let mut prompt = focus_prefix(focus);
    prompt.push_str(
        "Based on the complete meeting transcript, suggest one specific \
         question an attendee might want to ask next. It must end with a \
         question mark and must differ from these existing suggestions:\n",
    );
    for question in existing {
        prompt.push_str(&format!("- {question}\n"));
    }
    prompt.push_str(&format!(
        "\nComplete meeting transcript:\n{transcript}\n\n\
         Respond with the question alone on a single line:"
    ));
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qa_prompt_includes_all_sections() {
        let history = vec![("earlier?".to_string(), "earlier answer".to_string())];
        let prompt = qa_prompt(
            "ship the beta",
            "[roadmap]\nQ3 goals",
            false,
            "[10:00:00] we discussed the beta",
            &history,
            "when do we ship?",
        );

        assert!(prompt.contains("ship the beta"));
        assert!(prompt.contains("[roadmap]"));
        assert!(prompt.contains("we discussed the beta"));
        assert!(prompt.contains("earlier answer"));
        assert!(prompt.contains("when do we ship?"));
    }

    #[test]
    fn test_qa_prompt_empty_focus_has_no_goal_line() {
        let prompt = qa_prompt("", "", false, "text", &[], "q?");
        assert!(!prompt.contains("goal for this session"));
    }

    #[test]
    fn test_qa_prompt_marks_truncated_knowledge() {
        let prompt = qa_prompt("", "[doc]\npartial", true, "text", &[], "q?");
        assert!(prompt.contains("truncated=true"));

        let prompt = qa_prompt("", "[doc]\nfull", false, "text", &[], "q?");
        assert!(!prompt.contains("truncated=true"));
    }

    #[test]
    fn test_qa_prompt_empty_transcript_placeholder() {
        let prompt = qa_prompt("", "", false, "", &[], "q?");
        assert!(prompt.contains("no meeting content yet"));
    }

    #[test]
    fn test_insights_prompt_carries_transcript_and_focus() {
        let prompt = insights_prompt("hiring", "[10:00:00] interview debrief");
        assert!(prompt.contains("hiring"));
        assert!(prompt.contains("interview debrief"));
        assert!(prompt.contains("Action items"));
    }

    #[test]
    fn test_question_prompt_lists_existing_questions() {
        let existing = vec!["What was decided?".to_string()];
        let prompt = question_prompt("", "transcript text", &existing);
        assert!(prompt.contains("What was decided?"));
        assert!(prompt.contains("transcript text"));
    }

    #[test]
    fn test_default_questions_cover_rotation_slots() {
        assert!(DEFAULT_QUESTIONS.len() >= crate::defaults::NUM_DYNAMIC_QUESTIONS);
        assert!(DEFAULT_QUESTIONS.iter().all(|q| !q.is_empty()));
    }
}
