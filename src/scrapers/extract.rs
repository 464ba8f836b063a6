//! Best-effort article text extraction from arbitrary HTML.
//!
//! Article markup differs from site to site, so extraction walks a ladder of
//! progressively looser heuristics and stops at the first tier that yields enough
//! text:
//!
//! | Tier | Candidates | Accepted when |
//! |------|------------|---------------|
//! | A | `<article>`, `<main>`, content-classed `<div>` (longest wins) | always tried |
//! | B | `<p>` elements over 50 chars, joined | tier A < 300 chars |
//! | C | text/content/article-classed `<div>` over 50 chars | still < 200 chars, and longer |
//! | D | `meta[name=description]` | still < 100 chars |
//!
//! `<script>`, `<style>`, `<nav>`, `<header>` and `<footer>` subtrees never
//! contribute text at any tier.

use crate::models::ScrapedArticle;
use crate::utils::{bare_hostname, truncate_chars};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

/// Hard cap on extracted content length, in characters.
pub const MAX_CONTENT_CHARS: usize = 5000;

const NOISE_TAGS: [&str; 5] = ["script", "style", "nav", "header", "footer"];
const CONTAINER_CLASS_HINTS: [&str; 7] = ["content", "article", "post", "story", "news", "entry", "body"];
const TEXT_DIV_CLASS_HINTS: [&str; 3] = ["text", "content", "article"];
const MIN_BLOCK_CHARS: usize = 50;
const TIER_A_MIN_CHARS: usize = 300;
const TIER_B_MIN_CHARS: usize = 200;
const TIER_C_MIN_CHARS: usize = 100;

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

fn selector(css: &str) -> Selector {
    Selector::parse(css).unwrap()
}

static CONTAINERS: Lazy<Selector> = Lazy::new(|| selector("article, main, div[class]"));
static PARAGRAPHS: Lazy<Selector> = Lazy::new(|| selector("p"));
static CLASSED_DIVS: Lazy<Selector> = Lazy::new(|| selector("div[class]"));
static TITLE: Lazy<Selector> = Lazy::new(|| selector("title"));
static H1: Lazy<Selector> = Lazy::new(|| selector("h1"));
static TIME: Lazy<Selector> = Lazy::new(|| selector("time[datetime]"));

/// Extract an article from `html` fetched from `url`.
///
/// Never fails: the content may come back empty.
pub fn extract_article(html: &str, url: &str) -> ScrapedArticle {
    let document = Html::parse_document(html);
    let description = meta_content(&document, "name", "description").unwrap_or_default();

    let mut content = longest_container_text(&document);

    if char_len(&content) < TIER_A_MIN_CHARS {
        let paragraphs = joined_blocks(&document, &PARAGRAPHS, |_| true);
        if char_len(&paragraphs) > char_len(&content) {
            content = paragraphs;
        }
    }

    if char_len(&content) < TIER_B_MIN_CHARS {
        let divs = joined_blocks(&document, &CLASSED_DIVS, |el| {
            class_contains_any(el, &TEXT_DIV_CLASS_HINTS)
        });
        if char_len(&divs) > char_len(&content) {
            content = divs;
        }
    }

    if char_len(&content) < TIER_C_MIN_CHARS && char_len(&description) > char_len(&content) {
        content = collapse_whitespace(&description);
    }

    ScrapedArticle {
        url: url.to_string(),
        title: extract_title(&document),
        content: truncate_chars(&content, MAX_CONTENT_CHARS),
        publish_date: extract_publish_date(&document),
        author: meta_content(&document, "name", "author")
            .or_else(|| meta_content(&document, "property", "article:author")),
        source: bare_hostname(url),
    }
}

/// Tier A: longest `<article>`, `<main>` or content-classed `<div>`.
fn longest_container_text(document: &Html) -> String {
    document
        .select(&CONTAINERS)
        .filter(|el| !inside_noise(el))
        .filter(|el| match el.value().name() {
            "div" => class_contains_any(el, &CONTAINER_CLASS_HINTS),
            _ => true,
        })
        .map(|el| visible_text(&el))
        .max_by_key(|text| char_len(text))
        .unwrap_or_default()
}

/// Tiers B and C: texts of matching elements longer than 50 chars, space-joined.
fn joined_blocks<F>(document: &Html, sel: &Selector, keep: F) -> String
where
    F: Fn(&ElementRef<'_>) -> bool,
{
    document
        .select(sel)
        .filter(|el| !inside_noise(el) && keep(el))
        .map(|el| visible_text(&el))
        .filter(|text| char_len(text) > MIN_BLOCK_CHARS)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Text of `element` with noise subtrees skipped and whitespace collapsed.
///
/// The parser has already decoded entities (`&nbsp;` arrives as U+00A0, which
/// `\s` matches).
fn visible_text(element: &ElementRef<'_>) -> String {
    let mut raw = String::new();
    collect_text(*element, &mut raw);
    collapse_whitespace(&raw)
}

fn collect_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        if let Some(text) = child.value().as_text() {
            out.push_str(text);
            out.push(' ');
        } else if let Some(child_el) = ElementRef::wrap(child) {
            if !NOISE_TAGS.contains(&child_el.value().name()) {
                collect_text(child_el, out);
            }
        }
    }
}

fn inside_noise(element: &ElementRef<'_>) -> bool {
    NOISE_TAGS.contains(&element.value().name())
        || element.ancestors().any(|node| {
            node.value()
                .as_element()
                .is_some_and(|el| NOISE_TAGS.contains(&el.name()))
        })
}

fn class_contains_any(element: &ElementRef<'_>, hints: &[&str]) -> bool {
    element
        .value()
        .attr("class")
        .map(str::to_ascii_lowercase)
        .is_some_and(|class| hints.iter().any(|hint| class.contains(hint)))
}

/// Title priority: `og:title`, `twitter:title`, `<title>`, first `<h1>`, `meta[name=title]`.
fn extract_title(document: &Html) -> String {
    meta_content(document, "property", "og:title")
        .or_else(|| meta_content(document, "name", "twitter:title"))
        .or_else(|| first_text(document, &TITLE))
        .or_else(|| first_text(document, &H1))
        .or_else(|| meta_content(document, "name", "title"))
        .unwrap_or_default()
}

fn extract_publish_date(document: &Html) -> Option<String> {
    meta_content(document, "property", "article:published_time")
        .or_else(|| meta_content(document, "name", "date"))
        .or_else(|| meta_content(document, "itemprop", "datePublished"))
        .or_else(|| {
            document
                .select(&TIME)
                .next()
                .and_then(|el| el.value().attr("datetime"))
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        })
}

fn meta_content(document: &Html, attr: &str, value: &str) -> Option<String> {
    let sel = Selector::parse(&format!(r#"meta[{attr}="{value}"]"#)).ok()?;
    document
        .select(&sel)
        .filter_map(|el| el.value().attr("content"))
        .map(collapse_whitespace)
        .find(|s| !s.is_empty())
}

fn first_text(document: &Html, sel: &Selector) -> Option<String> {
    document
        .select(sel)
        .map(|el| visible_text(&el))
        .find(|s| !s.is_empty())
}

fn collapse_whitespace(s: &str) -> String {
    WHITESPACE.replace_all(s, " ").trim().to_string()
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    const URL: &str = "https://www.example.org/news/story";

    fn sentence(n: usize) -> String {
        "The tribunal heard testimony from several residents about the events. ".repeat(n)
    }

    #[test]
    fn test_article_tag_is_preferred() {
        let html = format!(
            "<html><head><title>Story</title></head><body>\
             <div class='sidebar-news'>Short teaser text only.</div>\
             <article><p>{}</p></article></body></html>",
            sentence(6)
        );
        let article = extract_article(&html, URL);
        assert!(article.content.starts_with("The tribunal heard"));
        assert!(!article.content.contains("teaser"));
        assert_eq!(article.title, "Story");
        assert_eq!(article.source, "example.org");
    }

    #[test]
    fn test_longest_container_wins() {
        let html = format!(
            "<body><div class='post-summary'>{}</div><main>{}</main></body>",
            sentence(5),
            sentence(9)
        );
        let article = extract_article(&html, URL);
        assert_eq!(article.content.chars().count(), sentence(9).trim().chars().count());
    }

    #[test]
    fn test_noise_blocks_are_stripped() {
        let html = format!(
            "<body><article><script>var tracking = 1;</script>\
             <nav>Home Sections Subscribe</nav><p>{}</p>\
             <style>.x{{color:red}}</style><footer>Copyright notice</footer></article></body>",
            sentence(6)
        );
        let article = extract_article(&html, URL);
        assert!(!article.content.contains("tracking"));
        assert!(!article.content.contains("Subscribe"));
        assert!(!article.content.contains("color:red"));
        assert!(!article.content.contains("Copyright"));
    }

    #[test]
    fn test_falls_through_to_paragraphs() {
        let long = sentence(2);
        let html = format!(
            "<body><div class='wrapper'><p>Too short.</p><p>{long}</p><p>{long}</p></div></body>"
        );
        let article = extract_article(&html, URL);
        assert!(!article.content.contains("Too short"));
        assert_eq!(article.content, format!("{} {}", long.trim(), long.trim()));
    }

    #[test]
    fn test_short_container_survives_shorter_paragraph_pass() {
        let html = format!(
            "<body><article>{}</article><p>A single paragraph about something unrelated to the hearing.</p></body>",
            sentence(3)
        );
        let article = extract_article(&html, URL);
        assert_eq!(article.content, sentence(3).trim());
        assert!(!article.content.contains("unrelated"));
    }

    #[test]
    fn test_thin_content_kept_over_shorter_description() {
        let html = "<head><meta name='description' content='Hearing.'></head>                    <body><article>Brief note about the hearing outcome, posted late.</article></body>";
        let article = extract_article(html, URL);
        assert_eq!(article.content, "Brief note about the hearing outcome, posted late.");
    }

    #[test]
    fn test_text_divs_used_when_paragraphs_missing() {
        let html = format!(
            "<body><div class='rich-text'>{}</div><div class='rich-text'>tiny</div></body>",
            sentence(2)
        );
        let article = extract_article(&html, URL);
        assert_eq!(article.content, sentence(2).trim());
    }

    #[test]
    fn test_meta_description_fallback() {
        let html = "<html><head><meta name='description' content='A community demanded answers after the closure of the clinic in 1998.'></head>\
                    <body><span>nothing here</span></body></html>";
        let article = extract_article(html, URL);
        assert_eq!(
            article.content,
            "A community demanded answers after the closure of the clinic in 1998."
        );
    }

    #[test]
    fn test_garbage_input_never_panics() {
        for html in ["", "<<<>>>", "<div class=", "plain text", "<p>&amp;&lt;&gt;</p>"] {
            let article = extract_article(html, "not a url");
            assert!(article.content.chars().count() <= MAX_CONTENT_CHARS);
            assert_eq!(article.source, "");
        }
    }

    #[test]
    fn test_content_is_capped() {
        let html = format!("<article>{}</article>", sentence(200));
        let article = extract_article(&html, URL);
        assert_eq!(article.content.chars().count(), MAX_CONTENT_CHARS);
    }

    #[test]
    fn test_entities_decoded_and_whitespace_collapsed() {
        let html = format!(
            "<article>Smith&nbsp;&amp;&nbsp;Sons   said &quot;no&quot; &lt;again&gt;\n\n{}</article>",
            sentence(5)
        );
        let article = extract_article(&html, URL);
        assert!(article.content.starts_with(r#"Smith & Sons said "no" <again> The tribunal"#));
    }

    #[test]
    fn test_title_priority() {
        let html = "<head><title>Plain</title><meta property='og:title' content='Open Graph'>\
                    <meta name='twitter:title' content='Twitter'></head><body><h1>Heading</h1></body>";
        assert_eq!(extract_article(html, URL).title, "Open Graph");

        let html = "<head><title>Plain</title><meta name='twitter:title' content='Twitter'></head>";
        assert_eq!(extract_article(html, URL).title, "Twitter");

        let html = "<body><h1>Heading</h1></body>";
        assert_eq!(extract_article(html, URL).title, "Heading");

        let html = "<head><meta name='title' content='Meta Title'></head>";
        assert_eq!(extract_article(html, URL).title, "Meta Title");
    }

    #[test]
    fn test_metadata_extraction() {
        let html = "<head><meta property='article:published_time' content='2021-03-04T10:00:00Z'>\
                    <meta name='author' content='Jane Reporter'></head><body></body>";
        let article = extract_article(html, URL);
        assert_eq!(article.publish_date.as_deref(), Some("2021-03-04T10:00:00Z"));
        assert_eq!(article.author.as_deref(), Some("Jane Reporter"));

        let html = "<body><time datetime='2019-07-01'>July 1</time></body>";
        assert_eq!(extract_article(html, URL).publish_date.as_deref(), Some("2019-07-01"));
    }
}
