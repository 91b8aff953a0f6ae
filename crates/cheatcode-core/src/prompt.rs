//! Prompt construction for question condensation and answering.

use cheatcode_index::store::ScoredChunk;
use cheatcode_llm::Message;

use crate::chain::Turn;

const CONDENSE_TEMPLATE: &str = "Given the following conversation and a follow up question, \
rephrase the follow up question to be a standalone question, in its original language.\n\n\
Chat History:\n{chat_history}\nFollow Up Input: {question}\nStandalone question:";

const ANSWER_SYSTEM_TEMPLATE: &str = "Use the following pieces of context to answer the user's \
question.\nIf you don't know the answer, just say that you don't know, don't try to make up an \
answer.\n----------------\n{context}";

const CONTEXT_SEPARATOR: &str = "\n\n";

/// Rough token estimate: four characters per token, rounded up.
#[must_use]
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(4)
}

#[must_use]
pub fn render_history(history: &[Turn]) -> String {
    history
        .iter()
        .map(|turn| format!("Human: {}\nAssistant: {}", turn.question, turn.answer))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Messages asking the model to rewrite `question` so it stands without `history`.
#[must_use]
pub fn condense_messages(history: &[Turn], question: &str) -> Vec<Message> {
    let prompt = CONDENSE_TEMPLATE
        .replace("{chat_history}", &render_history(history))
        .replace("{question}", question);
    vec![Message::user(prompt)]
}

/// Keep the leading chunks that fit, together with the answer prompt and
/// `question`, within `max_tokens`.
///
/// Each chunk is charged for its `file:` header and separator as well as its
/// content. Summing rounded-up estimates of the parts never undercounts the
/// estimate of the assembled request.
#[must_use]
pub fn pack_context(
    chunks: Vec<ScoredChunk>,
    question: &str,
    max_tokens: usize,
) -> Vec<ScoredChunk> {
    let mut used = prompt_overhead(question);
    let mut kept = Vec::with_capacity(chunks.len());
    for chunk in chunks {
        let cost = estimate_tokens(&render_chunk(&chunk)) + estimate_tokens(CONTEXT_SEPARATOR);
        if used + cost > max_tokens {
            break;
        }
        used += cost;
        kept.push(chunk);
    }
    kept
}

/// Estimated tokens of the answer request with no context.
#[must_use]
pub fn prompt_overhead(question: &str) -> usize {
    estimate_tokens(&ANSWER_SYSTEM_TEMPLATE.replace("{context}", "")) + estimate_tokens(question)
}

/// Estimated tokens of a whole request.
#[must_use]
pub fn request_tokens(messages: &[Message]) -> usize {
    messages.iter().map(|m| estimate_tokens(&m.content)).sum()
}

fn render_chunk(chunk: &ScoredChunk) -> String {
    format!("file: {}\n{}", chunk.chunk.source_path, chunk.chunk.content)
}

#[must_use]
pub fn render_context(chunks: &[ScoredChunk]) -> String {
    chunks
        .iter()
        .map(render_chunk)
        .collect::<Vec<_>>()
        .join(CONTEXT_SEPARATOR)
}

/// System message carrying the retrieved context, followed by the user's question.
#[must_use]
pub fn answer_messages(context: &[ScoredChunk], question: &str) -> Vec<Message> {
    let system = ANSWER_SYSTEM_TEMPLATE.replace("{context}", &render_context(context));
    vec![Message::system(system), Message::user(question)]
}
