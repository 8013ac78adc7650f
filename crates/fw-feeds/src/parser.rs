use quick_xml::events::{BytesStart, BytesText, Event};
use quick_xml::reader::Reader;

use fw_core::{
    domain::{FeedEntry, ParsedFeed},
    ports::FetchError,
};

use crate::text::plain_text;

/// Parse an RSS 2.0, RSS 1.0 (RDF) or Atom document.
///
/// Entries keep document order. Entries without a link are dropped. A missing feed title falls
/// back to `fallback_title`.
pub fn parse_feed(xml: &[u8], fallback_title: &str) -> Result<ParsedFeed, FetchError> {
    // Text is kept untrimmed: whitespace between inline markup separates words.
    // `plain_text` collapses it afterwards.
    let mut reader = Reader::from_reader(xml);

    let mut buf = Vec::new();
    let mut stack: Vec<Vec<u8>> = Vec::new();
    let mut seen_root = false;

    let mut feed_title: Option<String> = None;
    let mut entries = Vec::new();
    let mut dropped = 0usize;

    let mut current: Option<(EntryBuilder, usize)> = None;
    let mut capture: Option<(Field, usize)> = None;
    let mut text = String::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let name = e.name().as_ref().to_vec();
                if !seen_root {
                    check_root(&name)?;
                    seen_root = true;
                }
                let parent_is_feed = stack
                    .last()
                    .is_some_and(|p| p.as_slice() == b"channel" || p.as_slice() == b"feed");
                stack.push(name);
                let depth = stack.len();

                if capture.is_some() {
                    // Markup nested inside a captured field (Atom xhtml content).
                    if !text.is_empty() {
                        text.push(' ');
                    }
                } else if let Some((entry, entry_depth)) = current.as_mut() {
                    if depth == *entry_depth + 1 {
                        let field = match stack[depth - 1].as_slice() {
                            b"link" => match attr(&e, b"href") {
                                Some(href) => {
                                    entry.push_href(attr(&e, b"rel").as_deref(), href);
                                    None
                                }
                                None => Some(Field::Link),
                            },
                            b"title" => Some(Field::Title),
                            b"description" | b"summary" => Some(Field::Summary),
                            b"content" => Some(Field::Content),
                            _ => None,
                        };
                        if let Some(field) = field {
                            capture = Some((field, depth));
                            text.clear();
                        }
                    }
                } else if is_entry(&stack[depth - 1]) {
                    current = Some((EntryBuilder::default(), depth));
                } else if parent_is_feed && stack[depth - 1].as_slice() == b"title" {
                    capture = Some((Field::FeedTitle, depth));
                    text.clear();
                }
            }
            Ok(Event::Empty(e)) => {
                if !seen_root {
                    check_root(e.name().as_ref())?;
                    seen_root = true;
                }
                if let Some((entry, entry_depth)) = current.as_mut() {
                    if capture.is_none()
                        && stack.len() == *entry_depth
                        && e.name().as_ref() == b"link"
                    {
                        if let Some(href) = attr(&e, b"href") {
                            entry.push_href(attr(&e, b"rel").as_deref(), href);
                        }
                    }
                }
            }
            Ok(Event::Text(e)) => {
                if capture.is_some() {
                    text.push_str(&unescape_lossy(&e));
                }
            }
            Ok(Event::CData(e)) => {
                if capture.is_some() {
                    text.push_str(&String::from_utf8_lossy(&e.into_inner()));
                }
            }
            Ok(Event::End(_)) => {
                let depth = stack.len();
                if let Some((field, field_depth)) = capture {
                    if field_depth == depth {
                        let value = std::mem::take(&mut text);
                        match (field, current.as_mut()) {
                            (Field::FeedTitle, _) => {
                                if feed_title.is_none() {
                                    feed_title = Some(plain_text(&value));
                                }
                            }
                            (field, Some((entry, _))) => entry.set(field, value),
                            (_, None) => {}
                        }
                        capture = None;
                    }
                }

                if current.as_ref().is_some_and(|(_, d)| *d == depth) {
                    if let Some((entry, _)) = current.take() {
                        match entry.build() {
                            Some(built) => entries.push(built),
                            None => dropped += 1,
                        }
                    }
                }
                stack.pop();
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(FetchError::Malformed(format!(
                    "XML parse error at byte {}: {e}",
                    reader.error_position()
                )))
            }
            _ => {}
        }
        buf.clear();
    }

    if !seen_root {
        return Err(FetchError::Malformed("empty document".to_string()));
    }
    if !stack.is_empty() {
        return Err(FetchError::Malformed(
            "document ended before closing all elements".to_string(),
        ));
    }
    if dropped > 0 {
        tracing::debug!(dropped, "dropped feed entries without a link");
    }

    let title = feed_title
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| fallback_title.to_string());
    Ok(ParsedFeed { title, entries })
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Field {
    FeedTitle,
    Title,
    Link,
    Summary,
    Content,
}

#[derive(Default)]
struct EntryBuilder {
    title: Option<String>,
    link: Option<String>,
    alternate_href: Option<String>,
    other_href: Option<String>,
    summary: Option<String>,
    content: Option<String>,
}

impl EntryBuilder {
    fn set(&mut self, field: Field, value: String) {
        match field {
            Field::Title => self.title = Some(plain_text(&value)),
            Field::Link => self.link = Some(value.trim().to_string()),
            Field::Summary => self.summary = Some(plain_text(&value)),
            Field::Content => self.content = Some(plain_text(&value)),
            Field::FeedTitle => {}
        }
    }

    fn push_href(&mut self, rel: Option<&str>, href: String) {
        let href = href.trim().to_string();
        if href.is_empty() {
            return;
        }
        match rel {
            None | Some("alternate") => {
                if self.alternate_href.is_none() {
                    self.alternate_href = Some(href);
                }
            }
            Some(_) => {
                if self.other_href.is_none() {
                    self.other_href = Some(href);
                }
            }
        }
    }

    fn build(self) -> Option<FeedEntry> {
        let link = self
            .alternate_href
            .or(self.link.filter(|l| !l.is_empty()))
            .or(self.other_href)?;
        let summary = self
            .summary
            .filter(|s| !s.is_empty())
            .or(self.content)
            .unwrap_or_default();
        Some(FeedEntry {
            link,
            title: self.title.unwrap_or_default(),
            summary,
        })
    }
}

fn check_root(name: &[u8]) -> Result<(), FetchError> {
    match name {
        b"rss" | b"rdf:RDF" | b"feed" => Ok(()),
        other => Err(FetchError::Malformed(format!(
            "unrecognized root element <{}>",
            String::from_utf8_lossy(other)
        ))),
    }
}

fn is_entry(name: &[u8]) -> bool {
    name == b"item" || name == b"entry"
}

fn attr(e: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    e.try_get_attribute(key)
        .ok()
        .flatten()
        .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()))
}

/// XML-unescape, keeping the raw text when it carries HTML-only entities such as `&nbsp;`
/// (those are decoded later by [`plain_text`]).
fn unescape_lossy(e: &BytesText<'_>) -> String {
    match e.unescape() {
        Ok(t) => t.into_owned(),
        Err(_) => String::from_utf8_lossy(e).into_owned(),
    }
}
