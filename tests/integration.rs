use std::path::Path;
use std::sync::Arc;

use cheatcode_core::{ConversationChain, Turn};
use cheatcode_index::IndexError;
use cheatcode_index::document::{LoaderConfig, SourceLoader, SplitterConfig, TextSplitter};
use cheatcode_index::indexer::{CodeIndexer, IndexerConfig};
use cheatcode_index::retriever::{CodeRetriever, RetrievalConfig};
use cheatcode_index::store::{DistanceMetric, VectorIndex, db_dir};
use cheatcode_llm::mock::MockProvider;

// -- Helpers --

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

fn indexer(provider: &Arc<MockProvider>) -> CodeIndexer<MockProvider> {
    CodeIndexer::new(Arc::clone(provider), IndexerConfig::default()).unwrap()
}

fn retrieval(k: usize, fetch_k: usize) -> RetrievalConfig {
    RetrievalConfig::new(DistanceMetric::Cosine, fetch_k, k, true, 0.5).unwrap()
}

// -- Loading and indexing --

#[tokio::test]
async fn directory_without_sources_gives_empty_index() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "README.md", "# project\n");
    write(dir.path(), "data/config.json", "{}\n");
    write(dir.path(), ".venv/lib/site.py", "ignored = True\n");
    let provider = Arc::new(MockProvider::default());

    let report = indexer(&provider).init(dir.path()).await.unwrap();

    assert_eq!(report.files_scanned, 0);
    assert_eq!(report.chunks_created, 0);
    assert!(VectorIndex::load(&db_dir(dir.path())).unwrap().is_empty());
}

#[tokio::test]
async fn small_files_give_one_chunk_each_and_large_files_split() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "a.py", "def a():\n    return 1\n");
    write(dir.path(), "b.py", "def b():\n    return 2\n");
    let large = "x".repeat(2500);
    write(dir.path(), "large.py", &large);

    let loader = SourceLoader::new(
        LoaderConfig::default(),
        TextSplitter::new(SplitterConfig::default()).unwrap(),
    );
    let (chunks, _) = loader.load(dir.path()).await.unwrap();

    let count = |path: &str| chunks.iter().filter(|c| c.source_path == path).count();
    assert_eq!(count("a.py"), 1);
    assert_eq!(count("b.py"), 1);
    assert_eq!(count("large.py"), 3);

    let rebuilt: String = chunks
        .iter()
        .filter(|c| c.source_path == "large.py")
        .map(|c| c.content.as_str())
        .collect();
    assert_eq!(rebuilt, large);
}

#[tokio::test]
async fn init_twice_leaves_existing_index_untouched() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "foo.py", "def add(a,b): return a+b");
    let provider = Arc::new(MockProvider::default());
    let indexer = indexer(&provider);

    indexer.init(dir.path()).await.unwrap();
    let index_file = db_dir(dir.path()).join("index.json");
    let before = std::fs::read(&index_file).unwrap();

    write(dir.path(), "bar.py", "def sub(a,b): return a-b");
    let err = indexer.init(dir.path()).await.unwrap_err();

    assert!(matches!(err, IndexError::AlreadyInitialized(_)));
    assert_eq!(std::fs::read(&index_file).unwrap(), before);
}

#[tokio::test]
async fn empty_db_dir_does_not_block_init() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "foo.py", "def add(a,b): return a+b");
    std::fs::create_dir_all(db_dir(dir.path())).unwrap();
    let provider = Arc::new(MockProvider::default());

    assert!(matches!(
        CodeRetriever::open(Arc::clone(&provider), dir.path(), RetrievalConfig::default()),
        Err(IndexError::NotInitialized(_))
    ));
    indexer(&provider).init(dir.path()).await.unwrap();

    let retriever =
        CodeRetriever::open(Arc::clone(&provider), dir.path(), RetrievalConfig::default()).unwrap();
    assert_eq!(retriever.index().len(), 1);
}

// -- Retrieval --

#[tokio::test]
async fn k_bounds_result_count() {
    let dir = tempfile::tempdir().unwrap();
    for i in 0..10 {
        write(
            dir.path(),
            &format!("mod_{i}.py"),
            &format!("def handler_{i}(request):\n    return request\n"),
        );
    }
    let provider = Arc::new(MockProvider::default());
    indexer(&provider).init(dir.path()).await.unwrap();

    let retriever = CodeRetriever::open(Arc::clone(&provider), dir.path(), retrieval(3, 10)).unwrap();
    assert_eq!(retriever.index().len(), 10);
    assert_eq!(retriever.retrieve("handler request").await.unwrap().len(), 3);

    let wide = CodeRetriever::open(Arc::clone(&provider), dir.path(), retrieval(20, 20)).unwrap();
    assert_eq!(wide.retrieve("handler request").await.unwrap().len(), 10);
}

#[tokio::test]
async fn persisted_index_answers_like_in_memory_index() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "math.py", "def add(a, b):\n    return a + b\n");
    write(dir.path(), "greet.py", "def greet(name):\n    print(\"hello\", name)\n");
    write(dir.path(), "files.py", "def read_text(path):\n    with open(path) as f:\n        return f.read()\n");
    let provider = Arc::new(MockProvider::default());
    let indexer = indexer(&provider);

    let (in_memory, _) = indexer.build(dir.path()).await.unwrap();
    indexer.init(dir.path()).await.unwrap();

    let config = retrieval(2, 3);
    let fresh = CodeRetriever::new(Arc::clone(&provider), Arc::new(in_memory), config).unwrap();
    let reloaded = CodeRetriever::open(Arc::clone(&provider), dir.path(), config).unwrap();

    for query in ["how do I add numbers", "read a file", "say hello"] {
        assert_eq!(
            fresh.retrieve(query).await.unwrap(),
            reloaded.retrieve(query).await.unwrap()
        );
    }
}

// -- Conversation --

#[tokio::test]
async fn end_to_end_question_cites_source_file() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "foo.py", "def add(a,b): return a+b");
    let provider = Arc::new(MockProvider::with_responses(vec![
        "foo.py defines an addition function, add(a, b).".into(),
    ]));
    indexer(&provider).init(dir.path()).await.unwrap();

    let retriever =
        CodeRetriever::open(Arc::clone(&provider), dir.path(), RetrievalConfig::default()).unwrap();
    let chain = ConversationChain::new(retriever, Arc::clone(&provider), 10_000);

    let result = chain.ask("What does foo.py do?", &[]).await.unwrap();

    assert!(result.answer.contains("addition"));
    assert!(result.sources.iter().any(|s| s.chunk.source_path == "foo.py"));
}

#[tokio::test]
async fn follow_up_resolves_reference_through_history() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "math.py", "def add(a, b):\n    return a + b\n");
    write(dir.path(), "greet.py", "def greet(name):\n    print(\"hello\", name)\n");
    write(dir.path(), "files.py", "def read_text(path):\n    with open(path) as f:\n        return f.read()\n");
    let provider = Arc::new(MockProvider::with_responses(vec![
        "add returns the sum of a and b.".into(),
        "What does function add return?".into(),
        "It returns a + b.".into(),
    ]));
    indexer(&provider).init(dir.path()).await.unwrap();

    let retriever = CodeRetriever::open(Arc::clone(&provider), dir.path(), retrieval(1, 3)).unwrap();
    let chain = ConversationChain::new(retriever, Arc::clone(&provider), 10_000);

    let mut history = Vec::new();
    let first = chain.ask("What is function add?", &history).await.unwrap();
    history.push(Turn::new("What is function add?", first.answer));

    let second = chain.ask("What does it return?", &history).await.unwrap();

    let condense_prompt = &provider.chat_requests()[1][0].content;
    assert!(condense_prompt.contains("Human: What is function add?"));
    assert!(condense_prompt.contains("Follow Up Input: What does it return?"));
    assert_eq!(second.standalone_question, "What does function add return?");
    assert_eq!(
        provider.embedded_texts().last().map(String::as_str),
        Some("What does function add return?")
    );
    assert_eq!(second.sources.len(), 1);
    assert_eq!(second.sources[0].chunk.source_path, "math.py");
}
