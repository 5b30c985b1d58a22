use log::warn;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use thiserror::Error;
use zip::ZipArchive;
use zip::result::ZipError;

const DOCUMENT_PART: &str = "word/document.xml";

/// Separator placed between the cell texts of one table row.
pub const CELL_SEPARATOR: &str = " | ";

/// Word refuses tables wider than 63 grid columns; larger spans are clamped.
const MAX_GRID_COLUMNS: usize = 63;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("open .docx failed: {0}")]
    Open(#[source] io::Error),
    #[error("open .docx zip failed: {0}")]
    Archive(#[from] ZipError),
    #[error("missing {0}")]
    MissingPart(&'static str),
    #[error("read {part} failed: {source}")]
    ReadPart {
        part: &'static str,
        #[source]
        source: io::Error,
    },
    #[error("parse .docx XML failed: {0}")]
    Xml(#[from] quick_xml::Error),
}

/// Plain-text rendering of a document: one entry per body paragraph, then
/// one entry per table row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinearText {
    lines: Vec<String>,
}

impl LinearText {
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn into_lines(self) -> Vec<String> {
        self.lines
    }

    pub fn text(&self) -> String {
        self.lines.join("\n")
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// Outcome of extracting one file. A failure reads as empty text but keeps
/// its cause.
#[derive(Debug)]
pub enum Extraction {
    Parsed(LinearText),
    Failed(ExtractError),
}

impl Extraction {
    pub fn lines(&self) -> &[String] {
        match self {
            Extraction::Parsed(text) => text.lines(),
            Extraction::Failed(_) => &[],
        }
    }

    pub fn text(&self) -> String {
        match self {
            Extraction::Parsed(text) => text.text(),
            Extraction::Failed(_) => String::new(),
        }
    }

    pub fn error(&self) -> Option<&ExtractError> {
        match self {
            Extraction::Parsed(_) => None,
            Extraction::Failed(err) => Some(err),
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Extraction::Failed(_))
    }
}

/// Extracts `p`, logging and absorbing any failure so a batch can move on.
pub fn extract(p: &Path) -> Extraction {
    match extract_text_from_docx(p) {
        Ok(text) => Extraction::Parsed(text),
        Err(e) => {
            warn!("Error processing {}: {}", p.display(), e);
            Extraction::Failed(e)
        }
    }
}

pub fn extract_text_from_docx(p: &Path) -> Result<LinearText, ExtractError> {
    let file = File::open(p).map_err(ExtractError::Open)?;
    let mut zip = ZipArchive::new(file)?;
    let mut doc = zip.by_name(DOCUMENT_PART).map_err(|e| match e {
        ZipError::FileNotFound => ExtractError::MissingPart(DOCUMENT_PART),
        other => ExtractError::Archive(other),
    })?;
    let mut xml = String::new();
    doc.read_to_string(&mut xml)
        .map_err(|source| ExtractError::ReadPart {
            part: DOCUMENT_PART,
            source,
        })?;
    parse_docx_xml(&xml)
}

// ---- Internal helpers ----

fn parse_docx_xml(xml: &str) -> Result<LinearText, ExtractError> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();
    let mut lin = Linearizer::default();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => lin.open(&e),
            Event::Empty(e) => {
                lin.open(&e);
                lin.close();
            }
            Event::End(_) => lin.close(),
            Event::Text(t) => {
                if lin.in_text() {
                    lin.push_text(&t.unescape()?);
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(lin.finish())
}

/// Where the text of a paragraph ends up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    Body,
    Cell,
    Nowhere,
}

/// Open element, as far as linearization cares. `tracked` marks the table
/// structure that belongs to a top-level table; nested tables are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Frame {
    Body,
    Paragraph(Target),
    Hyperlink,
    Table { top: bool },
    Row { tracked: bool },
    Cell { tracked: bool },
    CellProps { tracked: bool },
    Run,
    Text,
    Other,
}

#[derive(Debug, Default)]
struct CellBuf {
    paragraphs: Vec<String>,
    span: usize,
    continues: bool,
}

#[derive(Debug, Default)]
struct Linearizer {
    stack: Vec<Frame>,
    paragraphs: Vec<String>,
    rows: Vec<String>,
    para: String,
    cell: CellBuf,
    row: Vec<String>,
    // Expanded cell texts of the previous row, by grid column.
    above: Vec<String>,
}

impl Linearizer {
    fn open(&mut self, e: &BytesStart<'_>) {
        let parent = self.stack.last().copied();
        let in_run = parent == Some(Frame::Run);
        let in_cell_props = parent == Some(Frame::CellProps { tracked: true });

        let frame = match e.local_name().as_ref() {
            b"body" => Frame::Body,
            b"p" => {
                let target = match parent {
                    Some(Frame::Body) => Target::Body,
                    Some(Frame::Cell { tracked: true }) => Target::Cell,
                    _ => Target::Nowhere,
                };
                if target != Target::Nowhere {
                    self.para.clear();
                }
                Frame::Paragraph(target)
            }
            b"tbl" => {
                let top = parent == Some(Frame::Body);
                if top {
                    self.above.clear();
                }
                Frame::Table { top }
            }
            b"tr" => {
                let tracked = parent == Some(Frame::Table { top: true });
                if tracked {
                    self.row.clear();
                }
                Frame::Row { tracked }
            }
            b"tc" => {
                let tracked = parent == Some(Frame::Row { tracked: true });
                if tracked {
                    self.cell = CellBuf {
                        span: 1,
                        ..CellBuf::default()
                    };
                }
                Frame::Cell { tracked }
            }
            b"tcPr" => Frame::CellProps {
                tracked: parent == Some(Frame::Cell { tracked: true }),
            },
            b"gridSpan" if in_cell_props => {
                if let Some(span) = attr_value(e, b"val").and_then(|v| v.parse::<usize>().ok()) {
                    self.cell.span = span.clamp(1, MAX_GRID_COLUMNS);
                }
                Frame::Other
            }
            b"vMerge" if in_cell_props => {
                // A bare <w:vMerge/> continues the cell above.
                self.cell.continues = attr_value(e, b"val").is_none_or(|v| v != "restart");
                Frame::Other
            }
            // Only runs directly under the paragraph or one of its hyperlinks
            // carry paragraph text; runs inside w:ins, w:sdt, w:smartTag or
            // w:fldSimple do not.
            b"hyperlink" if matches!(parent, Some(Frame::Paragraph(_))) => Frame::Hyperlink,
            b"r" if matches!(parent, Some(Frame::Paragraph(_) | Frame::Hyperlink)) => Frame::Run,
            b"t" if in_run => Frame::Text,
            b"tab" if in_run => {
                self.push_text("\t");
                Frame::Other
            }
            b"br" if in_run => {
                // Page and column breaks carry no text.
                if matches!(attr_value(e, b"type").as_deref(), None | Some("textWrapping")) {
                    self.push_text("\n");
                }
                Frame::Other
            }
            b"cr" if in_run => {
                self.push_text("\n");
                Frame::Other
            }
            b"noBreakHyphen" if in_run => {
                self.push_text("-");
                Frame::Other
            }
            _ => Frame::Other,
        };
        self.stack.push(frame);
    }

    fn close(&mut self) {
        match self.stack.pop() {
            Some(Frame::Paragraph(Target::Body)) => {
                self.paragraphs.push(std::mem::take(&mut self.para));
            }
            Some(Frame::Paragraph(Target::Cell)) => {
                self.cell.paragraphs.push(std::mem::take(&mut self.para));
            }
            Some(Frame::Cell { tracked: true }) => self.finish_cell(),
            Some(Frame::Row { tracked: true }) => {
                self.rows.push(self.row.join(CELL_SEPARATOR));
                self.above = std::mem::take(&mut self.row);
            }
            _ => {}
        }
    }

    fn finish_cell(&mut self) {
        let cell = std::mem::take(&mut self.cell);
        let span = cell.span.clamp(1, MAX_GRID_COLUMNS);
        if cell.continues {
            let start = self.row.len();
            for col in start..start.saturating_add(span) {
                let text = self.above.get(col).cloned().unwrap_or_default();
                self.row.push(text);
            }
        } else {
            let text = cell.paragraphs.join("\n");
            self.row.extend(std::iter::repeat_n(text, span));
        }
    }

    fn in_text(&self) -> bool {
        self.stack.last() == Some(&Frame::Text)
    }

    fn push_text(&mut self, s: &str) {
        if self.paragraph_target() != Target::Nowhere {
            self.para.push_str(s);
        }
    }

    fn paragraph_target(&self) -> Target {
        self.stack
            .iter()
            .rev()
            .find_map(|f| match f {
                Frame::Paragraph(target) => Some(*target),
                _ => None,
            })
            .unwrap_or(Target::Nowhere)
    }

    fn finish(self) -> LinearText {
        let mut lines = self.paragraphs;
        lines.extend(self.rows);
        LinearText { lines }
    }
}

fn attr_value(e: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.local_name().as_ref() == key)
        .map(|a| String::from_utf8_lossy(&a.value).into_owned())
}
