//! Prompt templates

const SYSTEM_TEMPLATE: &str = include_str!("prompts/system_prompt.md");
const RAG_TEMPLATE: &str = include_str!("prompts/rag_prompt.md");
const SUMMARIZATION_TEMPLATE: &str = include_str!("prompts/summarization_prompt.md");

/// Returned in blocking mode when the completion call fails.
pub const FALLBACK_RESPONSE: &str = "I do not have enough information to answer this question \
accurately. Could you provide more details or reformulate your question?";

/// Sent as the streaming error frame.
pub const ERROR_RESPONSE: &str = "I am encountering technical difficulties in processing your \
request. Please try again in a few moments or reformulate your question.";

const CHAIN_OF_THOUGHT_SUFFIX: &str =
    "Think step by step to provide an accurate response by relying on the documents provided.";

/// Substitute `{{name}}` placeholders in a single pass over the template.
/// Unknown placeholders are left as-is and inserted values are never rescanned.
fn render(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find("}}") else {
            out.push_str(&rest[start..]);
            rest = "";
            break;
        };

        let name = &after[..end];
        match vars.iter().find(|(key, _)| *key == name) {
            Some((_, value)) => out.push_str(value),
            None => {
                out.push_str("{{");
                out.push_str(name);
                out.push_str("}}");
            },
        }
        rest = &after[end + 2..];
    }
    out.push_str(rest);

    out.trim().to_string()
}

pub struct PromptService;

impl PromptService {
    pub fn system_prompt(additional_context: &str, specialized_knowledge: &str) -> String {
        render(
            SYSTEM_TEMPLATE,
            &[
                ("additional_context", additional_context),
                ("specialized_knowledge", specialized_knowledge),
            ],
        )
    }

    pub fn default_system_prompt() -> String {
        Self::system_prompt("", "")
    }

    /// System prompt with an optional leading instruction line.
    pub fn system_prompt_with_instruction(instruction: Option<&str>) -> String {
        let base = Self::default_system_prompt();
        match instruction {
            Some(line) => format!("{}\n\n{}", line, base),
            None => base,
        }
    }

    pub fn rag_prompt(query: &str, documents: &[String], include_chain_of_thought: bool) -> String {
        let formatted = documents
            .iter()
            .enumerate()
            .map(|(i, doc)| format!("Document {}:\n{}", i + 1, doc.trim()))
            .collect::<Vec<_>>()
            .join("\n\n");

        let mut prompt = render(RAG_TEMPLATE, &[("documents", &formatted), ("query", query)]);
        if include_chain_of_thought {
            prompt.push_str("\n\n");
            prompt.push_str(CHAIN_OF_THOUGHT_SUFFIX);
        }
        prompt
    }

    pub fn summarization_prompt(text: &str, max_length: usize) -> String {
        render(
            SUMMARIZATION_TEMPLATE,
            &[("text", text), ("max_length", &max_length.to_string())],
        )
    }

    /// Rephrase a user query so it embeds closer to explanatory passages.
    pub fn enhance_query_for_retrieval(query: &str) -> String {
        format!(
            "I am looking for information about: {}\nComplete and detailed response containing all important aspects of this subject:",
            query.trim()
        )
    }
}
