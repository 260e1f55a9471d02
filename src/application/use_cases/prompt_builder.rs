use crate::domain::conversation::{ChatMessage, ConversationTurn};
use crate::domain::test_case::TestCaseSpec;

const CHAT_SYSTEM_PROMPT: &str = "You are an AI assistant specializing in automotive embedded system testing.
You help engineers with:
- Test case analysis and optimization
- Understanding framework libraries and resources and mapping them to test cases
- Robot Framework test development
- Code review and best practices

Be concise and technical, and give practical examples when helpful.";

const GENERATOR_SYSTEM_PROMPT: &str = "You are an expert Robot Framework test generator for automotive embedded systems.

Generate high-quality, executable Robot Framework test cases from the test case pre-conditions, test steps and expected results, using the framework keywords you are given.

Guidelines:
- Use proper Robot Framework syntax and structure
- Include appropriate setup and teardown
- Add meaningful documentation and tags
- Use variables for configurable values

Output ONLY the Robot Framework code, no explanations.";

const REVIEWER_SYSTEM_PROMPT: &str = "You are an expert Robot Framework test reviewer for automotive embedded systems.

Review test cases by checking:
1. Syntax correctness
2. Proper use of keywords and libraries
3. Test coverage and edge cases
4. Documentation completeness

Give specific, actionable feedback with examples of improvements.";

/// System prompt, then the last `max_turns` turns, then the new user message.
pub fn build_chat_prompt(
    history: &[ConversationTurn],
    new_message: &str,
    context: Option<&str>,
    max_turns: usize,
) -> Vec<ChatMessage> {
    let mut system = CHAT_SYSTEM_PROMPT.to_string();
    if let Some(context) = context.map(str::trim).filter(|c| !c.is_empty()) {
        system.push_str("\n\nContext:\n");
        system.push_str(context);
    }

    let start = history.len().saturating_sub(max_turns);
    let mut messages = Vec::with_capacity(history.len() - start + 2);
    messages.push(ChatMessage::system(system));
    messages.extend(history[start..].iter().map(ConversationTurn::to_message));
    messages.push(ChatMessage::user(new_message));
    messages
}

fn push_field(out: &mut String, label: &str, value: &str) {
    let value = value.trim();
    if !value.is_empty() {
        out.push_str(&format!("{}:\n{}\n\n", label, value));
    }
}

pub fn build_generation_prompt(
    spec: Option<&TestCaseSpec>,
    automation_context: Option<&str>,
    test_case_id: &str,
) -> Vec<ChatMessage> {
    let mut system = GENERATOR_SYSTEM_PROMPT.to_string();
    if let Some(context) = automation_context.map(str::trim).filter(|c| !c.is_empty()) {
        system.push_str("\n\nFramework keywords and style guidance:\n");
        system.push_str(context);
    }

    let user = match spec {
        Some(spec) => {
            let mut body = format!(
                "Generate a Robot Framework test for test case {}.\n\n",
                test_case_id
            );
            push_field(&mut body, "Name", &spec.name);
            push_field(&mut body, "Feature", &spec.feature);
            push_field(&mut body, "Pre-conditions", &spec.precondition);
            push_field(&mut body, "Test steps", &spec.steps);
            push_field(&mut body, "Expected results", &spec.expected);
            if let Some(priority) = spec.priority.as_deref() {
                push_field(&mut body, "Priority", priority);
            }
            body.push_str("Output ONLY the Robot Framework code.");
            body
        }
        None => format!(
            "No details are available for test case {}. Generate a plausible Robot Framework test for it, named after the identifier.\n\nOutput ONLY the Robot Framework code.",
            test_case_id
        ),
    };

    vec![ChatMessage::system(system), ChatMessage::user(user)]
}

pub fn build_review_prompt(
    script: &str,
    test_case_id: &str,
    focus_areas: &[String],
) -> Vec<ChatMessage> {
    let mut user = String::from("Please review this Robot Framework test");
    if !test_case_id.trim().is_empty() {
        user.push_str(&format!(" for test case {}", test_case_id.trim()));
    }
    user.push(':');
    let focus: Vec<&str> = focus_areas
        .iter()
        .map(|area| area.trim())
        .filter(|area| !area.is_empty())
        .collect();
    if !focus.is_empty() {
        user.push_str(&format!("\nFocus on these areas: {}", focus.join(", ")));
    }
    user.push_str(&format!(
        "\n\n```robot\n{}\n```\n\nGive your feedback, list each suggestion as a bullet starting with '- ', and end with a line of the form 'Score: N/10'.",
        script.trim_end()
    ));

    vec![
        ChatMessage::system(REVIEWER_SYSTEM_PROMPT),
        ChatMessage::user(user),
    ]
}

pub fn build_improvement_prompt(script: &str, improvement_request: &str) -> Vec<ChatMessage> {
    let user = format!(
        "Improve this Robot Framework test based on the following request:\n\nRequest: {}\n\nOriginal test:\n```robot\n{}\n```\n\nOutput ONLY the improved Robot Framework code.",
        improvement_request.trim(),
        script.trim_end()
    );
    vec![
        ChatMessage::system(GENERATOR_SYSTEM_PROMPT),
        ChatMessage::user(user),
    ]
}
