use std::sync::LazyLock;

use pulldown_cmark::{CodeBlockKind, Event, Options, Parser, Tag, TagEnd, html};
use syntect::highlighting::ThemeSet;
use syntect::html::highlighted_html_for_string;
use syntect::parsing::SyntaxSet;

// Initialize syntax highlighting resources once
static SYNTAX_SET: LazyLock<SyntaxSet> = LazyLock::new(SyntaxSet::load_defaults_newlines);
static THEME_SET: LazyLock<ThemeSet> = LazyLock::new(ThemeSet::load_defaults);

const HIGHLIGHT_THEME: &str = "base16-ocean.dark";

/// Renders markdown to HTML. Fenced code blocks with a known language are
/// syntax highlighted; everything else goes through pulldown-cmark as is.
pub fn render_html(markdown: &str) -> String {
    let events: Vec<Event> = Parser::new_ext(markdown, Options::all()).collect();
    let mut processed_events = Vec::with_capacity(events.len());
    let mut i = 0;

    while i < events.len() {
        match &events[i] {
            Event::Start(Tag::CodeBlock(CodeBlockKind::Fenced(lang))) => {
                // Collect all text events until the end of the code block
                let mut code_content = String::new();
                i += 1;

                while i < events.len() {
                    match &events[i] {
                        Event::End(TagEnd::CodeBlock) => break,
                        Event::Text(text) => code_content.push_str(text),
                        _ => {}
                    }
                    i += 1;
                }

                processed_events.push(Event::Html(highlight(lang, &code_content).into()));
            }
            event => processed_events.push(event.clone()),
        }
        i += 1;
    }

    let mut out = String::new();
    html::push_html(&mut out, processed_events.into_iter());
    out
}

fn highlight(lang: &str, code: &str) -> String {
    // Info strings may carry attributes after the language, e.g. "rust,ignore".
    let token = lang
        .split(|c: char| c == ',' || c.is_whitespace())
        .next()
        .unwrap_or_default();

    let syntax = match token {
        "" => None,
        "toml" => SYNTAX_SET.find_syntax_by_name("YAML"),
        _ => SYNTAX_SET.find_syntax_by_token(token),
    };

    let plain = || format!("<pre><code>{}</code></pre>", html_escape::encode_text(code));

    match (syntax, THEME_SET.themes.get(HIGHLIGHT_THEME)) {
        (Some(syntax), Some(theme)) => {
            highlighted_html_for_string(code, &SYNTAX_SET, syntax, theme).unwrap_or_else(|_| plain())
        }
        _ => plain(),
    }
}

/// Text content of the first paragraph, with every run of whitespace
/// collapsed to a single space. Empty when the document has no paragraph.
pub fn first_paragraph_text(markdown: &str) -> String {
    let mut in_paragraph = false;
    let mut text = String::new();

    for event in Parser::new_ext(markdown, Options::all()) {
        match event {
            Event::Start(Tag::Paragraph) => in_paragraph = true,
            Event::End(TagEnd::Paragraph) if in_paragraph => break,
            Event::Text(t) | Event::Code(t) if in_paragraph => text.push_str(&t),
            Event::SoftBreak | Event::HardBreak if in_paragraph => text.push(' '),
            _ => continue,
        }
    }

    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
