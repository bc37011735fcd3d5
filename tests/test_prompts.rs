//! Checks the shipped prompt templates under config/prompts.

use std::fs;

use learnbot::assistant::prompt::PromptBuilder;

#[test]
fn system_prompt_file_exists() {
    let text = fs::read_to_string("config/prompts/system.md").expect("system.md prompt file missing");
    assert!(!text.trim().is_empty());
}

#[test]
fn assistant_prompt_template_vars() {
    let text = fs::read_to_string("config/prompts/assistant.md").expect("assistant.md prompt file missing");
    assert!(text.contains("{{context}}"), "assistant.md should contain {{{{context}}}}");
    assert!(text.contains("{{message}}"), "assistant.md should contain {{{{message}}}}");
}

#[test]
fn assistant_prompt_renders_without_placeholders() {
    let prompt = PromptBuilder::new("config/prompts")
        .layer("assistant.md")
        .with_vars([("context", "Knowledge: none"), ("message", "hi there")])
        .build();
    assert!(prompt.contains("Current message from user: hi there"));
    assert!(prompt.contains("Knowledge: none"));
    assert!(!prompt.contains("{{"));
}
