#![expect(
    clippy::tests_outside_test_module,
    reason = "integration tests are only compiled in test mode"
)]

use std::sync::Arc;
use std::time::Duration;

use pdf_rag::testing::{BagOfWordsEmbedder, CountingModel, write_test_pdf};
use pdf_rag::RagError;
use pdf_rag::config::RetrievalConfig;
use pdf_rag::database::VectorStore;
use pdf_rag::embeddings::{ChunkingConfig, Embedder};
use pdf_rag::ingest::Ingestor;
use pdf_rag::llm::{PromptStyle, PromptTemplate};
use pdf_rag::query::run_query_loop;
use pdf_rag::retrieval::{Retriever, VectorRetriever};
use pdf_rag::server::{AppContext, NO_RESULTS_ANSWER};
use tempfile::TempDir;

const PAGE_ONE: &str = "The bank pays each player $200 for passing Go";
const PAGE_TWO: &str = "Each player starts the game with $1500 in cash";

async fn ingest_rules(temp_dir: &TempDir) -> std::path::PathBuf {
    let source = temp_dir.path().join("monopoly.pdf");
    write_test_pdf(&source, &[PAGE_ONE, PAGE_TWO]);
    let db_path = temp_dir.path().join("rag_db");

    Ingestor::new(
        Arc::new(BagOfWordsEmbedder),
        ChunkingConfig::default(),
        db_path.clone(),
    )
    .run(&source, &mut std::io::sink())
    .await
    .expect("ingestion should succeed");

    db_path
}

async fn open_retriever(db_path: &std::path::Path) -> VectorRetriever {
    let store = VectorStore::open_existing(db_path)
        .await
        .expect("store should exist");
    VectorRetriever::open(Arc::new(BagOfWordsEmbedder), store)
        .await
        .expect("retriever should open")
}

#[tokio::test(flavor = "multi_thread")]
async fn question_about_go_cites_page_one() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let db_path = ingest_rules(&temp_dir).await;
    let retriever = open_retriever(&db_path).await;

    let results = retriever
        .similarity_search("How much do you get for passing Go?", 3)
        .await
        .expect("search should succeed");
    assert!(results[0].content.contains("$200"), "{:?}", results[0]);

    let llm = CountingModel::default();
    let context = AppContext {
        retriever: Arc::new(retriever),
        llm: Arc::new(llm.clone()),
        prompt: PromptTemplate::from_style(PromptStyle::Strict),
        top_k: 5,
        llm_timeout: Duration::from_secs(5),
    };

    let response = context
        .answer("How much do you get for passing Go?")
        .await
        .expect("chat should succeed");

    let sources = response.sources.expect("sources accompany an answer");
    assert_eq!(sources.len(), 2, "min(k, available) sources");
    assert_eq!(sources[0].page, 1);
    assert!(sources[0].source.ends_with("monopoly.pdf"));
    assert_eq!(llm.calls(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn stored_chunks_find_themselves() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let db_path = ingest_rules(&temp_dir).await;
    let retriever = open_retriever(&db_path).await;

    for (page, text) in [(1, PAGE_ONE), (2, PAGE_TWO)] {
        let results = retriever
            .similarity_search(text, 1)
            .await
            .expect("search should succeed");
        assert_eq!(results[0].metadata.page, page);
        assert!(results[0].content.contains(text), "{:?}", results[0]);
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn empty_store_gives_canned_answer_without_model_call() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let store = VectorStore::create_or_open(&temp_dir.path().join("rag_db"))
        .await
        .expect("should create store");
    let retriever = VectorRetriever::open(Arc::new(BagOfWordsEmbedder), store)
        .await
        .expect("retriever should open");

    let llm = CountingModel::default();
    let context = AppContext {
        retriever: Arc::new(retriever),
        llm: Arc::new(llm.clone()),
        prompt: PromptTemplate::default(),
        top_k: 3,
        llm_timeout: Duration::from_secs(5),
    };

    let response = context.answer("Anything?").await.expect("chat should succeed");
    assert_eq!(response.answer, NO_RESULTS_ANSWER);
    assert!(response.sources.is_none());
    assert_eq!(llm.calls(), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn missing_source_creates_no_store() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let db_path = temp_dir.path().join("rag_db");

    let result = Ingestor::new(
        Arc::new(BagOfWordsEmbedder),
        ChunkingConfig::default(),
        db_path.clone(),
    )
    .run(&temp_dir.path().join("monopoly.pdf"), &mut std::io::sink())
    .await;

    assert!(matches!(result, Err(RagError::Document(_))));
    assert!(!db_path.exists());
}

#[tokio::test(flavor = "multi_thread")]
async fn interactive_session_over_ingested_store() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let db_path = ingest_rules(&temp_dir).await;
    let retriever = open_retriever(&db_path).await;

    let mut output = Vec::new();
    let searched = run_query_loop(
        &retriever,
        &RetrievalConfig::default(),
        "passing Go\nexit\n".as_bytes(),
        &mut output,
    )
    .await
    .expect("session should succeed");

    let printed = String::from_utf8(output).expect("output is utf-8");
    assert_eq!(searched, 1);
    assert!(printed.contains("Found 2 relevant chunks:"));
    let first = printed
        .split("--- Result 1 ---\n")
        .nth(1)
        .expect("first result is printed");
    assert!(first.starts_with("The bank pays"), "{first}");
}

#[tokio::test(flavor = "multi_thread")]
async fn reingestion_appends() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let db_path = ingest_rules(&temp_dir).await;
    let db_path_again = ingest_rules(&temp_dir).await;
    assert_eq!(db_path, db_path_again);

    let store = VectorStore::open_existing(&db_path)
        .await
        .expect("store should exist");
    assert_eq!(store.count_chunks().await.expect("should count"), 4);
    assert_eq!(
        store.recorded_embedding_model().await.expect("should read"),
        Some(BagOfWordsEmbedder.model().to_string())
    );
}
