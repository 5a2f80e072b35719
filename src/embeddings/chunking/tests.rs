use super::*;
use std::path::PathBuf;

fn config(chunk_size: usize, chunk_overlap: usize) -> ChunkingConfig {
    ChunkingConfig {
        chunk_size,
        chunk_overlap,
        ..ChunkingConfig::default()
    }
}

fn numbered_words(count: usize) -> String {
    (0..count)
        .map(|i| format!("word{i:03}"))
        .collect::<Vec<_>>()
        .join(" ")
}

fn page(text: &str, number: u32) -> Page {
    Page {
        text: text.to_string(),
        metadata: PageMetadata {
            source: PathBuf::from("rules.pdf"),
            page: number,
        },
    }
}

#[test]
fn short_text_is_a_single_chunk() {
    let chunks = split_text("  The bank pays each player $200 for passing Go.  ", &config(800, 80));
    assert_eq!(chunks, vec!["The bank pays each player $200 for passing Go."]);
}

#[test]
fn blank_text_produces_no_chunks() {
    assert!(split_text("", &ChunkingConfig::default()).is_empty());
    assert!(split_text(" \n\n \t ", &ChunkingConfig::default()).is_empty());
}

#[test]
fn chunks_never_exceed_chunk_size() {
    let text = format!(
        "{}\n\n{}\n{}",
        numbered_words(400),
        "x".repeat(1234),
        numbered_words(57)
    );

    for (size, overlap) in [(800, 80), (100, 10), (50, 0), (20, 5), (9, 3)] {
        let chunks = split_text(&text, &config(size, overlap));
        assert!(!chunks.is_empty());
        for chunk in &chunks {
            assert!(
                chunk.chars().count() <= size,
                "chunk of {} chars exceeds limit {}: {:?}",
                chunk.chars().count(),
                size,
                chunk
            );
        }
    }
}

#[test]
fn consecutive_chunks_overlap() {
    // Every piece is " wordNNN" (8 chars) so a 20 char overlap carries two words
    let text = numbered_words(200);
    let chunks = split_text(&text, &config(100, 20));
    assert!(chunks.len() > 2);

    for pair in chunks.windows(2) {
        let next_words: Vec<&str> = pair[1].split_whitespace().take(2).collect();
        let carried = next_words.join(" ");
        assert!(
            pair[0].ends_with(&carried),
            "expected {:?} to end with {:?}",
            pair[0],
            carried
        );
    }
}

#[test]
fn zero_overlap_does_not_repeat_text() {
    let text = numbered_words(100);
    let chunks = split_text(&text, &config(60, 0));

    let rejoined = chunks.join(" ");
    assert_eq!(rejoined, text);
}

#[test]
fn paragraph_boundaries_are_preferred() {
    let first = "The bank pays each player $200 for passing Go.";
    let second = "Players roll two dice to move around the board.";
    let text = format!("{first}\n\n{second}");

    let chunks = split_text(&text, &config(60, 0));
    assert_eq!(chunks, vec![first.to_string(), second.to_string()]);
}

#[test]
fn line_breaks_are_used_when_paragraphs_are_too_long() {
    let text = format!("{}\n{}", "a ".repeat(20).trim(), "b ".repeat(20).trim());
    let chunks = split_text(&text, &config(45, 0));
    assert_eq!(chunks.len(), 2);
    assert!(chunks[0].chars().all(|c| c == 'a' || c == ' '));
    assert!(chunks[1].chars().all(|c| c == 'b' || c == ' '));
}

#[test]
fn text_without_separators_is_hard_cut() {
    let text = "x".repeat(250);
    let chunks = split_text(&text, &config(100, 10));

    assert_eq!(chunks.len(), 3);
    assert_eq!(chunks[0].len(), 100);
    assert_eq!(chunks[1].len(), 100);
    assert_eq!(chunks[2].len(), 70);
}

#[test]
fn custom_separators_still_respect_the_limit() {
    let cfg = ChunkingConfig {
        chunk_size: 50,
        chunk_overlap: 0,
        separators: vec!["\n\n".to_string()],
    };
    let text = format!("{}\n\nshort tail", "y".repeat(150));

    let chunks = split_text(&text, &cfg);
    assert!(chunks.iter().all(|c| c.chars().count() <= 50));
    assert_eq!(chunks.last().map(String::as_str), Some("short tail"));
}

#[test]
fn multibyte_text_is_measured_in_characters() {
    let text = "é".repeat(120);
    let chunks = split_text(&text, &config(50, 5));

    assert!(chunks.iter().all(|c| c.chars().count() <= 50));
    assert_eq!(chunks[0].chars().count(), 50);
}

#[test]
fn chunk_pages_inherits_page_metadata() {
    let pages = vec![
        page("The bank pays each player $200 for passing Go.", 1),
        page("   ", 2),
        page(&numbered_words(30), 3),
    ];

    let chunks = chunk_pages(&pages, &config(100, 10));

    assert!(chunks.len() >= 3);
    assert_eq!(chunks[0].metadata.page, 1);
    assert_eq!(chunks[0].metadata.source, PathBuf::from("rules.pdf"));
    assert!(chunks[1..].iter().all(|c| c.metadata.page == 3));
    assert!(chunks.iter().all(|c| !c.content.is_empty()));

    for (expected, chunk) in chunks.iter().enumerate() {
        assert_eq!(chunk.chunk_index, expected);
    }
}

#[test]
fn chunks_do_not_span_pages() {
    let pages = vec![page("alpha beta", 1), page("gamma delta", 2)];
    let chunks = chunk_pages(&pages, &ChunkingConfig::default());

    assert_eq!(chunks.len(), 2);
    assert_eq!(chunks[0].content, "alpha beta");
    assert_eq!(chunks[1].content, "gamma delta");
}
