// Interactive query module
// Read-evaluate loop printing the nearest chunks for each question


use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

use crate::Result;
use crate::config::RetrievalConfig;
use crate::retrieval::Retriever;

pub const PROMPT: &str = "Ask a question about your PDF (or type 'exit' to quit): ";
const SEPARATOR_WIDTH: usize = 40;

/// Ask questions until `exit` or end of input.
/// Returns how many questions were searched.
pub async fn run_query_loop<R, W>(
    retriever: &dyn Retriever,
    settings: &RetrievalConfig,
    input: R,
    output: &mut W,
) -> Result<usize>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();
    let mut searched = 0;

    loop {
        let banner = format!("\n{}\n{}", "-".repeat(SEPARATOR_WIDTH), PROMPT);
        output.write_all(banner.as_bytes()).await?;
        output.flush().await?;

        let Some(line) = lines.next_line().await? else {
            debug!("End of input, leaving query loop");
            break;
        };

        let query = line.trim();
        if query.eq_ignore_ascii_case("exit") {
            break;
        }
        if query.is_empty() {
            continue;
        }

        output
            .write_all(format!("\nSearching for: '{query}'...\n").as_bytes())
            .await?;

        let results = retriever
            .similarity_search(query, settings.top_k)
            .await?;
        searched += 1;

        if results.is_empty() {
            output.write_all(b"No matches found.\n").await?;
            continue;
        }

        let header = format!("Found {} relevant chunks:\n\n", results.len());
        output.write_all(header.as_bytes()).await?;
        for (rank, result) in results.iter().enumerate() {
            let entry = format!(
                "--- Result {} ---\n{}\n\n\n",
                rank + 1,
                preview(&result.content, settings.preview_chars)
            );
            output.write_all(entry.as_bytes()).await?;
        }
    }

    output.flush().await?;
    Ok(searched)
}

/// First `max_chars` characters of `text`, with `...` appended when cut short.
///
/// Text that already fits is returned whole with no `...`, so the marker
/// always means something was left out.
#[inline]
pub fn preview(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}
