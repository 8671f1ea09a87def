use crate::types::*;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::Path;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

const DOCUMENT_PART: &str = "word/document.xml";
const CONTENT_TYPES_PART: &str = "[Content_Types].xml";
const RELATIONSHIPS_PART: &str = "_rels/.rels";

const CONTENT_TYPES_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/></Types>"#;

const RELATIONSHIPS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/></Relationships>"#;

const DOCUMENT_HEADER: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>"#;

// A4 with one-inch margins, in twentieths of a point.
const SECTION_PROPERTIES: &str = r#"<w:sectPr><w:pgSz w:w="11906" w:h="16838"/><w:pgMar w:top="1440" w:right="1440" w:bottom="1440" w:left="1440" w:header="708" w:footer="708" w:gutter="0"/></w:sectPr>"#;

const PAGE_BREAK: &str = r#"<w:p><w:r><w:br w:type="page"/></w:r></w:p>"#;

/// A top-level piece of a Word document body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Paragraph(String),
    /// One table row; each cell's paragraphs are joined with `\n`.
    TableRow(Vec<String>),
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DocxProcessor;

impl DocxProcessor {
    pub fn new() -> Self {
        Self
    }

    /// Read the body of a `.docx` package as paragraphs and table rows in
    /// document order.
    pub fn read_blocks(&self, path: &Path) -> Result<Vec<Block>, ConversionError> {
        let file = File::open(path)?;
        let mut archive = ZipArchive::new(BufReader::new(file)).map_err(|e| {
            ConversionError::InvalidDocument {
                message: format!("not a Word (.docx) package: {}", e),
            }
        })?;

        let mut xml = String::new();
        archive
            .by_name(DOCUMENT_PART)
            .map_err(|_| ConversionError::InvalidDocument {
                message: format!("missing {}", DOCUMENT_PART),
            })?
            .read_to_string(&mut xml)?;

        self.parse_document_xml(&xml)
    }

    pub fn parse_document_xml(&self, xml: &str) -> Result<Vec<Block>, ConversionError> {
        let mut reader = Reader::from_str(xml);
        let mut body = BodyCollector::default();

        loop {
            match reader.read_event()? {
                Event::Start(e) => body.open(&e),
                Event::Empty(e) => {
                    body.open(&e);
                    body.close(&e);
                }
                Event::End(e) => match e.local_name().as_ref() {
                    b"tbl" => body.close_table(),
                    b"tr" => body.close_row(),
                    b"tc" => body.close_cell(),
                    b"p" => body.close_paragraph(),
                    b"t" => body.in_text = false,
                    _ => {}
                },
                Event::Text(e) if body.in_text => body.push_text(&e.unescape()?),
                Event::Eof => break,
                _ => {}
            }
        }

        Ok(body.blocks)
    }

    /// Flatten blocks into newline-separated text. Blank paragraphs are
    /// dropped; table rows become trimmed cells joined with `" | "`.
    pub fn flatten_blocks(&self, blocks: &[Block]) -> String {
        let parts: Vec<String> = blocks
            .iter()
            .filter_map(|block| match block {
                Block::Paragraph(text) => {
                    (!text.trim().is_empty()).then(|| text.clone())
                }
                Block::TableRow(cells) => {
                    let row = cells
                        .iter()
                        .map(|cell| cell.trim())
                        .collect::<Vec<_>>()
                        .join(" | ");
                    (!row.trim().is_empty()).then_some(row)
                }
            })
            .collect();

        parts.join("\n")
    }

    /// Write one page of text per entry as a minimal `.docx` package. Each
    /// non-blank line becomes a paragraph and pages are separated by page
    /// breaks.
    pub fn write_docx(&self, path: &Path, pages: &[String]) -> Result<(), ConversionError> {
        let mut zip = ZipWriter::new(File::create(path)?);
        let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

        zip.start_file(CONTENT_TYPES_PART, options)?;
        zip.write_all(CONTENT_TYPES_XML.as_bytes())?;

        zip.start_file(RELATIONSHIPS_PART, options)?;
        zip.write_all(RELATIONSHIPS_XML.as_bytes())?;

        zip.start_file(DOCUMENT_PART, options)?;
        zip.write_all(document_xml(pages).as_bytes())?;

        zip.finish()?;
        Ok(())
    }
}

fn document_xml(pages: &[String]) -> String {
    let mut xml = String::from(DOCUMENT_HEADER);

    for (index, page) in pages.iter().enumerate() {
        if index > 0 {
            xml.push_str(PAGE_BREAK);
        }
        for line in page.lines().filter(|line| !line.trim().is_empty()) {
            // Control characters other than tab are not allowed in XML 1.0.
            let clean: String = line
                .chars()
                .filter(|c| !c.is_control() || *c == '\t')
                .collect();
            xml.push_str(r#"<w:p><w:r><w:t xml:space="preserve">"#);
            xml.push_str(&quick_xml::escape::escape(clean.as_str()));
            xml.push_str("</w:t></w:r></w:p>");
        }
    }

    xml.push_str(SECTION_PROPERTIES);
    xml.push_str("</w:body></w:document>");
    xml
}

/// Walks `w:body`, keeping body paragraphs and the rows of outermost tables.
#[derive(Default)]
struct BodyCollector {
    blocks: Vec<Block>,
    table_depth: usize,
    paragraph_depth: usize,
    in_text: bool,
    paragraph: Option<String>,
    row: Option<Vec<String>>,
    cell: Option<Vec<String>>,
}

impl BodyCollector {
    fn open(&mut self, e: &BytesStart) {
        match e.local_name().as_ref() {
            b"tbl" => self.table_depth += 1,
            b"tr" if self.table_depth == 1 => self.row = Some(Vec::new()),
            b"tc" if self.table_depth == 1 => self.cell = Some(Vec::new()),
            b"p" => {
                self.paragraph_depth += 1;
                // Text boxes nest paragraphs inside a paragraph; their text
                // joins the outer one.
                if self.paragraph_depth == 1 && self.table_depth <= 1 {
                    self.paragraph = Some(String::new());
                }
            }
            b"t" => self.in_text = true,
            b"tab" => self.push_text("\t"),
            b"br" if !is_page_break(e) => self.push_text("\n"),
            b"cr" => self.push_text("\n"),
            _ => {}
        }
    }

    /// Closes elements that were written in their empty form (`<w:p/>`).
    fn close(&mut self, e: &BytesStart) {
        match e.local_name().as_ref() {
            b"tbl" => self.close_table(),
            b"tr" => self.close_row(),
            b"tc" => self.close_cell(),
            b"p" => self.close_paragraph(),
            b"t" => self.in_text = false,
            _ => {}
        }
    }

    fn close_table(&mut self) {
        self.table_depth = self.table_depth.saturating_sub(1);
    }

    fn close_row(&mut self) {
        if self.table_depth == 1 {
            if let Some(cells) = self.row.take() {
                self.blocks.push(Block::TableRow(cells));
            }
        }
    }

    fn close_cell(&mut self) {
        if self.table_depth == 1 {
            if let (Some(row), Some(paragraphs)) = (self.row.as_mut(), self.cell.take()) {
                row.push(paragraphs.join("\n"));
            }
        }
    }

    fn close_paragraph(&mut self) {
        if self.paragraph_depth == 1 {
            if let Some(text) = self.paragraph.take() {
                if self.table_depth == 0 {
                    self.blocks.push(Block::Paragraph(text));
                } else if let Some(cell) = self.cell.as_mut() {
                    cell.push(text);
                }
            }
        }
        self.paragraph_depth = self.paragraph_depth.saturating_sub(1);
    }

    fn push_text(&mut self, text: &str) {
        if let Some(paragraph) = self.paragraph.as_mut() {
            paragraph.push_str(text);
        }
    }
}

fn is_page_break(e: &BytesStart) -> bool {
    e.attributes()
        .flatten()
        .any(|attr| attr.key.local_name().as_ref() == b"type" && attr.value.as_ref() == b"page")
}
