//! Wikimedia XML dump parser
//!
//! Streams `<page>` elements out of a dump one at a time. Only the text of the
//! `<title>`, `<ns>` and `<text>` elements is kept; everything else is skipped
//! as it is read, so memory use is bounded by the largest single page.

use std::io::BufRead;
use std::sync::Arc;

use quick_xml::events::Event;
use quick_xml::reader::Reader;
use tracing::{debug, info, trace};

use super::filter::NamespaceFilter;
use super::progress::ImportProgress;
use super::source::{ImportError, PageUnit};

/// Which page field character data is currently routed to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Title,
    Namespace,
    Body,
}

impl Field {
    fn from_tag(name: &[u8]) -> Option<Self> {
        match name {
            b"title" => Some(Field::Title),
            b"ns" => Some(Field::Namespace),
            b"text" => Some(Field::Body),
            _ => None,
        }
    }
}

/// Page being built from XML events
#[derive(Debug, Default)]
struct PartialPage {
    title: String,
    namespace: String,
    body: String,
}

impl PartialPage {
    fn buffer(&mut self, field: Field) -> &mut String {
        match field {
            Field::Title => &mut self.title,
            Field::Namespace => &mut self.namespace,
            Field::Body => &mut self.body,
        }
    }

    fn finish(self) -> PageUnit {
        PageUnit {
            title: self.title.trim().to_string(),
            body: self.body.trim().to_string(),
            namespace: self.namespace.trim().parse().ok(),
        }
    }
}

/// Forward-only reader yielding every page in a dump, unfiltered
pub struct PageReader<R: BufRead> {
    reader: Reader<R>,
    buf: Vec<u8>,
    /// Currently open elements, used to detect truncated input
    depth: usize,
    finished: bool,
}

impl<R: BufRead> PageReader<R> {
    pub fn new(input: R) -> Self {
        let mut reader = Reader::from_reader(input);
        reader.check_end_names(true);

        Self {
            reader,
            buf: Vec::with_capacity(8192),
            depth: 0,
            finished: false,
        }
    }

    /// Approximate byte offset into the input
    pub fn position(&self) -> usize {
        self.reader.buffer_position()
    }

    /// Read up to and including the next `</page>`.
    ///
    /// Returns `Ok(None)` at a clean end of input. Any error is final: later
    /// calls return `Ok(None)`.
    pub fn next_page(&mut self) -> Result<Option<PageUnit>, ImportError> {
        if self.finished {
            return Ok(None);
        }

        let result = self.read_page();
        if !matches!(result, Ok(Some(_))) {
            self.finished = true;
        }
        result
    }

    fn read_page(&mut self) -> Result<Option<PageUnit>, ImportError> {
        let mut page: Option<PartialPage> = None;
        // Open title/ns/text markers, innermost last
        let mut fields: Vec<Field> = Vec::new();

        loop {
            self.buf.clear();
            let event = match self.reader.read_event_into(&mut self.buf) {
                Ok(event) => event,
                Err(e) => {
                    let position = self.reader.buffer_position();
                    return Err(ImportError::XmlParse {
                        position,
                        message: e.to_string(),
                    });
                }
            };

            // Raw bytes of every event are checked, including skipped elements,
            // tag names and attributes
            std::str::from_utf8(&event)?;

            match event {
                Event::Start(ref e) => {
                    self.depth += 1;
                    let name = e.name();
                    if name.as_ref() == b"page" {
                        if page.is_some() {
                            let position = self.reader.buffer_position();
                            return Err(ImportError::XmlParse {
                                position,
                                message: "nested <page> element".to_string(),
                            });
                        }
                        page = Some(PartialPage::default());
                    } else if page.is_some() {
                        if let Some(f) = Field::from_tag(name.as_ref()) {
                            fields.push(f);
                        }
                    }
                }
                Event::Text(ref e) => {
                    if let (Some(page), Some(&f)) = (page.as_mut(), fields.last()) {
                        let text = match e.unescape() {
                            Ok(text) => text,
                            Err(err) => {
                                let position = self.reader.buffer_position();
                                return Err(ImportError::XmlParse {
                                    position,
                                    message: err.to_string(),
                                });
                            }
                        };
                        page.buffer(f).push_str(&text);
                    }
                }
                Event::CData(ref e) => {
                    if let (Some(page), Some(&f)) = (page.as_mut(), fields.last()) {
                        let text = std::str::from_utf8(e)?;
                        page.buffer(f).push_str(text);
                    }
                }
                Event::End(ref e) => {
                    self.depth = self.depth.saturating_sub(1);
                    let name = e.name();
                    if name.as_ref() == b"page" {
                        if let Some(done) = page.take() {
                            return Ok(Some(done.finish()));
                        }
                    } else if page.is_some() && Field::from_tag(name.as_ref()).is_some() {
                        fields.pop();
                    }
                }
                Event::Eof => {
                    if page.is_some() {
                        return Err(ImportError::UnexpectedEof(
                            "input ended inside a <page> element".to_string(),
                        ));
                    }
                    if self.depth > 0 {
                        return Err(ImportError::UnexpectedEof(format!(
                            "{} element(s) left open",
                            self.depth
                        )));
                    }
                    return Ok(None);
                }
                // Self-closing elements (`<text/>`, `<redirect .../>`), declarations,
                // comments and processing instructions carry no page text.
                _ => {}
            }
        }
    }
}

impl<R: BufRead> Iterator for PageReader<R> {
    type Item = Result<PageUnit, ImportError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_page().transpose()
    }
}

/// Drives a [`PageReader`], filters by namespace and feeds the intake channel.
///
/// This is the pipeline's only producer and its only back-pressure point: when
/// the intake channel is full, `send_blocking` stalls parsing, which stalls reading.
pub struct DumpParser<R: BufRead> {
    pages: PageReader<R>,
    filter: Arc<dyn NamespaceFilter>,
    progress: Arc<ImportProgress>,
    max_articles: Option<u64>,
}

impl<R: BufRead> DumpParser<R> {
    pub fn new(input: R, filter: Arc<dyn NamespaceFilter>, progress: Arc<ImportProgress>) -> Self {
        Self {
            pages: PageReader::new(input),
            filter,
            progress,
            max_articles: None,
        }
    }

    /// Stop after this many accepted pages
    pub fn with_max_articles(mut self, max_articles: Option<u64>) -> Self {
        self.max_articles = max_articles;
        self
    }

    /// Parse the whole input, blocking on the intake channel when it is full.
    ///
    /// Returns the number of pages enqueued. Must run on a thread that may block.
    pub fn run(mut self, intake: &async_channel::Sender<PageUnit>) -> Result<u64, ImportError> {
        let mut enqueued = 0u64;

        while let Some(page) = self.pages.next_page()? {
            self.progress.page_seen();

            if !self.filter.accepts(page.namespace) {
                trace!("Skipping '{}' (namespace {:?})", page.title, page.namespace);
                continue;
            }

            self.progress.article_accepted();
            intake
                .send_blocking(page)
                .map_err(|_| ImportError::PipelineClosed("intake"))?;
            enqueued += 1;

            if let Some(max) = self.max_articles {
                if enqueued >= max {
                    info!("Reached max articles limit: {}", max);
                    break;
                }
            }
        }

        debug!(
            "Parser finished at byte {} after enqueuing {} pages",
            self.pages.position(),
            enqueued
        );
        Ok(enqueued)
    }
}
