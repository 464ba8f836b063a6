//! Prompt construction for event synthesis.

use crate::api::Prompt;
use crate::models::{ScrapedArticle, ScrapedData};
use crate::utils::truncate_chars;
use std::fmt::Write;

/// Articles fed to the model, longest first.
pub const MAX_PROMPT_ARTICLES: usize = 15;
/// Per-article character cap inside the prompt.
pub const MAX_ARTICLE_CHARS: usize = 4000;
/// Search snippets included as fallback context.
pub const MAX_PROMPT_SNIPPETS: usize = 15;

const SYSTEM_PROMPT: &str = "You are an investigative research assistant documenting \
overlooked social-justice incidents. You write factual, neutral, well-sourced summaries \
and you respond with a single JSON object and nothing else.";

const OUTPUT_CONTRACT: &str = r#"Return ONLY a JSON object with exactly these five fields:

{
  "location": "City, region and country where the incident happened (under 15 words)",
  "details": "A 250-400 word narrative of what happened, why it matters and what followed, in 3-4 paragraphs separated by \n\n",
  "accused": ["Each person, organization or institution accused of wrongdoing, with their role (5-20 words each)"],
  "victims": ["Each victim or affected group, with what happened to them (5-20 words each)"],
  "timeline": ["Date: one-sentence description of a key development, in chronological order (4-10 entries)"]
}

Highlighting: wrap only the most critical facts in **double asterisks**, 2-3 words each,
at most 2-3 highlights per field. Never highlight whole sentences.

Rules:
- Use only facts supported by the sources below; do not invent names, numbers or dates.
- If a field cannot be determined, use "" for text fields and [] for lists.
- No Markdown fences, no commentary before or after the JSON."#;

/// The 15 longest articles, each cut to 4000 characters.
pub fn select_articles(articles: &[ScrapedArticle]) -> Vec<ScrapedArticle> {
    let mut ranked: Vec<&ScrapedArticle> = articles.iter().collect();
    ranked.sort_by_key(|a| std::cmp::Reverse(a.content.chars().count()));
    ranked
        .into_iter()
        .take(MAX_PROMPT_ARTICLES)
        .map(|a| ScrapedArticle {
            content: truncate_chars(&a.content, MAX_ARTICLE_CHARS),
            ..a.clone()
        })
        .collect()
}

/// Build the synthesis prompt for `query` from scraped articles and top snippets.
pub fn build_event_prompt(query: &str, data: &ScrapedData) -> Prompt {
    let mut user = String::new();
    let _ = writeln!(user, "Research topic: {query}\n");

    let _ = writeln!(user, "## Source articles\n");
    for (i, article) in select_articles(&data.articles).iter().enumerate() {
        let _ = writeln!(user, "### Article {} ({})", i + 1, article.source);
        let _ = writeln!(user, "Title: {}", article.title);
        if let Some(date) = &article.publish_date {
            let _ = writeln!(user, "Published: {date}");
        }
        let _ = writeln!(user, "URL: {}\n{}\n", article.url, article.content);
    }

    let _ = writeln!(user, "## Additional search snippets\n");
    for result in data.results.iter().take(MAX_PROMPT_SNIPPETS) {
        let _ = writeln!(user, "- {}: {} ({})", result.title, result.snippet, result.link);
    }

    let _ = write!(user, "\n{OUTPUT_CONTRACT}");

    Prompt {
        system: SYSTEM_PROMPT.to_string(),
        user,
    }
}
