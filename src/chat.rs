use std::fmt::Write as _;

use cheatcode_core::{ChainAnswer, ConversationChain, CoreError, Turn};
use cheatcode_llm::LlmProvider;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

const PROMPT: &str = "-> **Question**: ";

/// Interactive question loop. Ends on `exit` (any case) or end of input.
///
/// History lives only as long as the loop.
pub(crate) async fn run<P, R, W>(
    chain: &ConversationChain<P>,
    input: R,
    mut output: W,
    show_sources: bool,
) -> anyhow::Result<Vec<Turn>>
where
    P: LlmProvider,
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();
    let mut history: Vec<Turn> = Vec::new();

    loop {
        output.write_all(PROMPT.as_bytes()).await?;
        output.flush().await?;

        let Some(line) = lines.next_line().await? else {
            output.write_all(b"\n").await?;
            break;
        };
        let question = line.trim();
        if question.eq_ignore_ascii_case("exit") {
            break;
        }
        if question.is_empty() {
            continue;
        }

        let result = match chain.ask(question, &history).await {
            Ok(result) => result,
            Err(e @ CoreError::PromptTooLarge { .. }) => {
                output.write_all(format!("{e}\n\n").as_bytes()).await?;
                continue;
            }
            Err(e) => return Err(e.into()),
        };
        output
            .write_all(render_answer(&result, show_sources).as_bytes())
            .await?;
        history.push(Turn::new(question, result.answer));
    }

    output.flush().await?;
    Ok(history)
}

fn render_answer(result: &ChainAnswer, show_sources: bool) -> String {
    let mut out = format!("**Answer**: {}\n", result.answer);
    if show_sources && !result.sources.is_empty() {
        out.push_str("Sources:\n");
        for source in &result.sources {
            let _ = writeln!(
                out,
                "  {} (chunk {}, score {:.3})",
                source.chunk.source_path, source.chunk.chunk_index, source.score
            );
        }
    }
    out.push('\n');
    out
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use cheatcode_index::DocumentChunk;
    use cheatcode_index::retriever::{CodeRetriever, RetrievalConfig};
    use cheatcode_index::store::VectorIndex;
    use cheatcode_llm::mock::MockProvider;

    use super::*;

    fn chain(provider: &Arc<MockProvider>) -> ConversationChain<MockProvider> {
        let content = "def add(a,b): return a+b";
        let index = VectorIndex::from_embeddings(
            "mock-embedding",
            vec![(
                DocumentChunk {
                    source_path: "foo.py".into(),
                    content: content.into(),
                    chunk_index: 0,
                },
                provider.embedding_for(content),
            )],
        )
        .unwrap();
        let retriever =
            CodeRetriever::new(Arc::clone(provider), Arc::new(index), RetrievalConfig::default())
                .unwrap();
        ConversationChain::new(retriever, Arc::clone(provider), 10_000)
    }

    #[tokio::test]
    async fn answers_until_exit() {
        let provider = Arc::new(MockProvider::with_responses(vec![
            "It adds numbers.".into(),
            "What does add return?".into(),
            "a + b".into(),
            "never used".into(),
        ]));
        let input: &[u8] = b"What does foo.py do?\n\nWhat does it return?\nEXIT\nignored\n";
        let mut output = Vec::new();

        let history = run(&chain(&provider), input, &mut output, false).await.unwrap();

        let text = String::from_utf8(output).unwrap();
        assert!(text.starts_with("-> **Question**: **Answer**: It adds numbers.\n"));
        assert!(text.contains("**Answer**: a + b\n"));
        assert_eq!(
            history,
            vec![
                Turn::new("What does foo.py do?", "It adds numbers."),
                Turn::new("What does it return?", "a + b"),
            ]
        );
        assert_eq!(provider.chat_requests().len(), 3);
    }

    #[tokio::test]
    async fn end_of_input_ends_session() {
        let provider = Arc::new(MockProvider::default());
        let input: &[u8] = b"";
        let mut output = Vec::new();

        let history = run(&chain(&provider), input, &mut output, false).await.unwrap();
        assert!(history.is_empty());
        assert!(provider.chat_requests().is_empty());
    }

    #[tokio::test]
    async fn shows_sources_when_requested() {
        let provider = Arc::new(MockProvider::default());
        let input: &[u8] = b"what is add\nexit\n";
        let mut output = Vec::new();

        run(&chain(&provider), input, &mut output, true).await.unwrap();
        let text = String::from_utf8(output).unwrap();
        assert!(text.contains("Sources:\n  foo.py (chunk 0, score "));
    }

    #[tokio::test]
    async fn oversized_question_is_reported_and_loop_continues() {
        let provider = Arc::new(MockProvider::with_responses(vec!["It adds.".into()]));
        let small = ConversationChain::new(
            CodeRetriever::new(
                Arc::clone(&provider),
                Arc::new(VectorIndex::from_embeddings("mock-embedding", Vec::new()).unwrap()),
                RetrievalConfig::default(),
            )
            .unwrap(),
            Arc::clone(&provider),
            60,
        );
        let input = format!("{}\nwhat is add\nexit\n", "why ".repeat(100));
        let mut output = Vec::new();

        let history = run(&small, input.as_bytes(), &mut output, false).await.unwrap();

        let text = String::from_utf8(output).unwrap();
        assert!(text.contains("token ceiling"));
        assert!(text.contains("**Answer**: It adds.\n"));
        assert_eq!(history.len(), 1);
    }

    #[tokio::test]
    async fn service_failure_propagates() {
        let provider = Arc::new(MockProvider::default().with_fail_chat());
        let input: &[u8] = b"what is add\n";
        let mut output = Vec::new();

        assert!(run(&chain(&provider), input, &mut output, false).await.is_err());
    }
}
