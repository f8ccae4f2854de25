//! Prompt construction for the initial comparison and for follow-up turns.
//!
//! Both builders are pure: same inputs, same prompt.

use coach_core::types::{ChatMessage, Prompt};

use crate::session::record::{HistoryEntry, Speaker};

/// Section headings the initial feedback is asked to contain, in order
pub const FEEDBACK_SECTIONS: [&str; 3] = ["Alignment Assessment", "Notable Gaps", "Notable Matches"];

const INITIAL_TEMPLATE: &str = "You are an expert Resume Coach AI. Your task is to analyze a provided resume against a job description.
Provide clear, concise, and actionable feedback structured in three sections:
1.  **{section_1}:** Briefly state how well the resume aligns with the job description (e.g., Highly Qualified, Qualified, Partially Qualified, Not Qualified) and provide a 1-2 sentence explanation referencing specific resume points and job requirements.
2.  **{section_2}:** List the key skills or experiences mentioned in the job description that are *not* clearly present in the resume. Be specific. If nothing significant is missing, state that clearly.
3.  **{section_3}:** Highlight 2-3 key strengths or experiences from the resume that *directly* match important requirements in the job description. Quote or reference specific parts of the resume and job description.

Analyze the following:
Job Description:
{job_description}

Resume:
{resume}

Provide only the structured analysis as described above.";

const FOLLOW_UP_TEMPLATE: &str = "You are the Resume Coach AI, continuing a conversation with a user about their resume and a job description.
You have already provided an initial analysis. Now, answer the user's current follow-up question based only on the information contained within the resume, the job description, your previous analysis, and the preceding chat history.
Do not invent new information or make assumptions beyond this context. If the context does not contain the answer, say so. Keep your answer concise and directly related to the current question.

Static Context:
--- Job Description ---
{job_description}
--- Resume ---
{resume}
--- Initial Analysis You Provided ---
{analysis}
--- End Static Context ---

Chat History (User questions and your previous answers) follows.";

/// Build the prompt that produces the initial feedback
pub fn initial_prompt(primary_text: &str, reference_text: &str) -> Prompt {
    // Documents are substituted last so their content is never re-scanned for placeholders.
    let system = INITIAL_TEMPLATE
        .replace("{section_1}", FEEDBACK_SECTIONS[0])
        .replace("{section_2}", FEEDBACK_SECTIONS[1])
        .replace("{section_3}", FEEDBACK_SECTIONS[2]);
    let system = fill_documents(&system, primary_text, reference_text, None);

    Prompt::new(vec![ChatMessage::system(system)])
}

/// Build the prompt for a follow-up question: static context, the full history in
/// order, then the new question.
pub fn follow_up_prompt(
    primary_text: &str,
    reference_text: &str,
    initial_feedback: &str,
    history: &[HistoryEntry],
    question: &str,
) -> Prompt {
    let system = fill_documents(
        FOLLOW_UP_TEMPLATE,
        primary_text,
        reference_text,
        Some(initial_feedback),
    );

    let mut prompt = Prompt::new(Vec::with_capacity(history.len() + 2));
    prompt.push(ChatMessage::system(system));
    for entry in history {
        prompt.push(match entry.role {
            Speaker::User => ChatMessage::user(entry.text.clone()),
            Speaker::Assistant => ChatMessage::assistant(entry.text.clone()),
        });
    }
    prompt.push(ChatMessage::user(question));
    prompt
}

/// Single-pass substitution of the document placeholders
fn fill_documents(template: &str, resume: &str, job_description: &str, analysis: Option<&str>) -> String {
    let mut out = String::with_capacity(template.len() + resume.len() + job_description.len());
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        let (value, consumed) = if tail.starts_with("{resume}") {
            (Some(resume), "{resume}".len())
        } else if tail.starts_with("{job_description}") {
            (Some(job_description), "{job_description}".len())
        } else if tail.starts_with("{analysis}") {
            (analysis, "{analysis}".len())
        } else {
            (None, 1)
        };

        match value {
            Some(value) => out.push_str(value),
            None => out.push_str(&tail[..consumed]),
        }
        rest = &tail[consumed..];
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use coach_core::types::MessageRole;

    const RESUME: &str = "Senior backend engineer, 5 yrs Go, AWS";
    const JOB: &str = "Looking for Go engineer with cloud experience";

    #[test]
    fn initial_prompt_embeds_both_documents() {
        let prompt = initial_prompt(RESUME, JOB);

        assert_eq!(prompt.messages.len(), 1);
        assert_eq!(prompt.messages[0].role, MessageRole::System);
        let text = &prompt.messages[0].content;
        assert!(text.contains(&format!("Resume:\n{}", RESUME)));
        assert!(text.contains(&format!("Job Description:\n{}", JOB)));
        assert!(!text.contains("{resume}"));
        assert!(!text.contains("{section_"));
    }

    #[test]
    fn initial_prompt_requests_sections_in_order() {
        let text = initial_prompt(RESUME, JOB).messages[0].content.clone();

        let positions: Vec<usize> = FEEDBACK_SECTIONS
            .iter()
            .map(|section| text.find(&format!("**{}:**", section)).expect("section missing"))
            .collect();
        assert!(positions[0] < positions[1] && positions[1] < positions[2]);
    }

    #[test]
    fn initial_prompt_is_deterministic() {
        assert_eq!(initial_prompt(RESUME, JOB), initial_prompt(RESUME, JOB));
    }

    #[test]
    fn placeholders_inside_documents_are_left_alone() {
        let prompt = initial_prompt("I know {job_description} templating", "Needs {resume} skills");
        let text = &prompt.messages[0].content;

        assert!(text.contains("I know {job_description} templating"));
        assert!(text.contains("Needs {resume} skills"));
    }

    #[test]
    fn follow_up_prompt_orders_context_history_question() {
        let history = vec![
            HistoryEntry { role: Speaker::User, text: "first question".into() },
            HistoryEntry { role: Speaker::Assistant, text: "first answer".into() },
            HistoryEntry { role: Speaker::User, text: "second question".into() },
            HistoryEntry { role: Speaker::Assistant, text: "second answer".into() },
        ];

        let prompt = follow_up_prompt(RESUME, JOB, "Strong match", &history, "What should I add?");

        let roles: Vec<MessageRole> = prompt.messages.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![
                MessageRole::System,
                MessageRole::User,
                MessageRole::Assistant,
                MessageRole::User,
                MessageRole::Assistant,
                MessageRole::User,
            ]
        );
        assert_eq!(prompt.messages[1].content, "first question");
        assert_eq!(prompt.messages[4].content, "second answer");
        assert_eq!(prompt.messages[5].content, "What should I add?");
    }

    #[test]
    fn follow_up_system_message_carries_context_and_grounding_rule() {
        let prompt = follow_up_prompt(RESUME, JOB, "Strong match", &[], "Why?");
        let system = &prompt.messages[0].content;

        assert!(system.contains(RESUME));
        assert!(system.contains(JOB));
        assert!(system.contains("--- Initial Analysis You Provided ---\nStrong match"));
        assert!(system.contains("Do not invent new information"));
        assert_eq!(prompt.messages.len(), 2);
    }
}
