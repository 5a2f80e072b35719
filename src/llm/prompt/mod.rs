
use serde::{Deserialize, Serialize};

use crate::{RagError, Result};

pub const CONTEXT_PLACEHOLDER: &str = "{context}";
pub const QUESTION_PLACEHOLDER: &str = "{question}";

const BASIC_TEMPLATE: &str = "
Answer the question based ONLY on the following context:
{context}

Question: {question}
";

const STRICT_TEMPLATE: &str = "
You are a helpful assistant answering questions about a set of reference material.
Answer the question using ONLY the information below. If the information below does
not contain the answer, say that you don't know.

The material may cover several unrelated topics. Work out which topic the question is
about and answer from that part alone, ignoring the rest.

Answer directly. Never refer to \"the context\", \"the documents\" or \"the text\" in
your answer.

{context}

Question: {question}
";

/// Built-in prompt variants
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptStyle {
    /// Answer from the retrieved text only
    Basic,
    /// Also pick the relevant sub-topic and never mention the retrieved text
    #[default]
    Strict,
}

/// A prompt with `{context}` and `{question}` placeholders
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    template: String,
}

impl PromptTemplate {
    #[inline]
    pub fn from_style(style: PromptStyle) -> Self {
        let template = match style {
            PromptStyle::Basic => BASIC_TEMPLATE,
            PromptStyle::Strict => STRICT_TEMPLATE,
        };
        Self {
            template: template.to_string(),
        }
    }

    /// Use a caller supplied template, which must contain both placeholders
    #[inline]
    pub fn custom(template: String) -> Result<Self> {
        if !template.contains(CONTEXT_PLACEHOLDER) || !template.contains(QUESTION_PLACEHOLDER) {
            return Err(RagError::Config(format!(
                "Prompt template must contain {} and {}",
                CONTEXT_PLACEHOLDER, QUESTION_PLACEHOLDER
            )));
        }
        Ok(Self { template })
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.template
    }

    /// Substitute both placeholders in one pass.
    /// Substituted text is never rescanned, so a question containing
    /// `{context}` stays literal.
    #[inline]
    pub fn render(&self, context: &str, question: &str) -> String {
        let mut rendered =
            String::with_capacity(self.template.len() + context.len() + question.len());
        let mut rest = self.template.as_str();

        while let Some(start) = rest.find('{') {
            rendered.push_str(&rest[..start]);
            let tail = &rest[start..];

            if let Some(after) = tail.strip_prefix(CONTEXT_PLACEHOLDER) {
                rendered.push_str(context);
                rest = after;
            } else if let Some(after) = tail.strip_prefix(QUESTION_PLACEHOLDER) {
                rendered.push_str(question);
                rest = after;
            } else {
                rendered.push('{');
                rest = &tail[1..];
            }
        }

        rendered.push_str(rest);
        rendered
    }
}

impl Default for PromptTemplate {
    #[inline]
    fn default() -> Self {
        Self::from_style(PromptStyle::default())
    }
}

/// Join retrieved chunk texts in rank order, separated by a blank line
#[inline]
pub fn build_context<'a, I>(chunks: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    chunks.into_iter().collect::<Vec<_>>().join("\n\n")
}
