//! Uplift request comments to HTML.
//!
//! An uplift request is a list of `[question]: answer` lines, answers possibly
//! running over several lines. Each answer is rendered as Markdown. Raw HTML
//! in the comment is shown as text, never passed through.

use pulldown_cmark::{CowStr, Event, LinkType, Options, Parser, Tag, TagEnd, TextMergeStream, html};

pub struct MarkdownRenderer {
    tracker_url: String,
}

impl MarkdownRenderer {
    pub fn new(tracker_url: &str) -> Self {
        Self {
            tracker_url: tracker_url.trim_end_matches('/').to_string(),
        }
    }

    /// Render a whole uplift comment.
    pub fn render(&self, text: &str) -> String {
        let sections = parse_sections(text);
        if sections.is_empty() {
            return self.markdown(text);
        }

        let mut out = String::new();
        for (question, answer) in sections {
            out.push_str("<div class=\"question\"><h1>");
            out.push_str(&escape_html(&question));
            out.push_str("</h1><div class=\"answer\">");
            out.push_str(&self.markdown(&answer));
            out.push_str("</div></div>");
        }
        out
    }

    /// Markdown to HTML with raw HTML escaped and bug references linked.
    pub fn markdown(&self, text: &str) -> String {
        let mut events = Vec::new();
        let mut link_depth = 0_usize;

        for event in TextMergeStream::new(Parser::new_ext(text, Options::ENABLE_STRIKETHROUGH)) {
            match event {
                Event::Start(tag @ Tag::Link { .. }) => {
                    link_depth += 1;
                    events.push(Event::Start(tag));
                }
                Event::End(TagEnd::Link) => {
                    link_depth = link_depth.saturating_sub(1);
                    events.push(Event::End(TagEnd::Link));
                }
                Event::Html(raw) | Event::InlineHtml(raw) => events.push(Event::Text(raw)),
                Event::Text(chunk) if link_depth == 0 => self.link_bugs(&chunk, &mut events),
                other => events.push(other),
            }
        }

        let mut out = String::new();
        html::push_html(&mut out, events.into_iter());
        out
    }

    fn link_bugs<'a>(&self, text: &str, events: &mut Vec<Event<'a>>) {
        for segment in split_bug_refs(text) {
            match segment {
                Segment::Text(plain) => events.push(Event::Text(CowStr::from(plain.to_string()))),
                Segment::Bug { label, id } => {
                    events.push(Event::Start(Tag::Link {
                        link_type: LinkType::Inline,
                        dest_url: CowStr::from(format!("{}/{id}", self.tracker_url)),
                        title: CowStr::from(""),
                        id: CowStr::from(""),
                    }));
                    events.push(Event::Text(CowStr::from(label.to_string())));
                    events.push(Event::End(TagEnd::Link));
                }
            }
        }
    }
}

/// Split `[question]: answer` sections. Lines before the first question are
/// dropped; lines after a question belong to its answer.
fn parse_sections(text: &str) -> Vec<(String, String)> {
    let mut sections: Vec<(String, String)> = Vec::new();

    for line in text.lines() {
        if let Some((question, answer)) = parse_question(line) {
            sections.push((question.to_string(), answer.to_string()));
        } else if let Some((_, answer)) = sections.last_mut() {
            answer.push('\n');
            answer.push_str(line);
        }
    }

    for (_, answer) in &mut sections {
        let trimmed = answer.trim().to_string();
        *answer = trimmed;
    }
    sections
}

fn parse_question(line: &str) -> Option<(&str, &str)> {
    let rest = line.trim_start().strip_prefix('[')?;
    let (question, answer) = rest.split_once("]:")?;
    let question = question.trim();
    if question.is_empty() || question.contains('[') {
        return None;
    }
    Some((question, answer.trim()))
}

#[derive(Debug, PartialEq, Eq)]
enum Segment<'a> {
    Text(&'a str),
    Bug { label: &'a str, id: u64 },
}

/// Find `bug 1234` / `Bug #1234` references.
fn split_bug_refs(text: &str) -> Vec<Segment<'_>> {
    let bytes = text.as_bytes();
    let mut segments = Vec::new();
    let mut plain_start = 0;
    let mut i = 0;

    while i + 3 <= bytes.len() {
        let at_word_start = i == 0 || !bytes[i - 1].is_ascii_alphanumeric();
        if !(at_word_start && bytes[i..i + 3].eq_ignore_ascii_case(b"bug")) {
            i += 1;
            continue;
        }

        let mut j = i + 3;
        while j < bytes.len() && matches!(bytes[j], b' ' | b'#') {
            j += 1;
        }
        let digits_start = j;
        while j < bytes.len() && bytes[j].is_ascii_digit() {
            j += 1;
        }
        let at_word_end = j == bytes.len() || !bytes[j].is_ascii_alphanumeric();

        match text[digits_start..j].parse::<u64>() {
            Ok(id) if digits_start > i + 3 && at_word_end => {
                if plain_start < i {
                    segments.push(Segment::Text(&text[plain_start..i]));
                }
                segments.push(Segment::Bug {
                    label: &text[i..j],
                    id,
                });
                plain_start = j;
                i = j;
            }
            _ => i += 1,
        }
    }

    if plain_start < text.len() {
        segments.push(Segment::Text(&text[plain_start..]));
    }
    segments
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}
