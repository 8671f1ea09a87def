use crate::types::*;
use lopdf::encryption::crypt_filters::{CryptFilter, Rc4CryptFilter};
use lopdf::encryption::DecryptionError;
use lopdf::{Document as PdfDocument, Object};
use md5::{Digest, Md5};
use pdf_writer::{Content, Finish, Name, Pdf, Rect, Ref, Str};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

// A4 in points
pub const PAGE_WIDTH: f32 = 595.0;
pub const PAGE_HEIGHT: f32 = 842.0;

// Text layout, measured from the top of the page.
pub const TOP_MARGIN: f32 = 50.0;
pub const LEFT_MARGIN: f32 = 50.0;
pub const LINE_HEIGHT: f32 = 15.0;
pub const MAX_Y: f32 = 750.0;
pub const FONT_SIZE: f32 = 11.0;
pub const MAX_LINE_CHARS: usize = 80;

const FONT_NAME: Name<'static> = Name(b"F1");

// Standard security handler password padding.
const PASSWORD_PAD: [u8; 32] = [
    0x28, 0xBF, 0x4E, 0x5E, 0x4E, 0x75, 0x8A, 0x41, 0x64, 0x00, 0x4E, 0x56, 0xFF, 0xFA, 0x01, 0x08,
    0x2E, 0x2E, 0x00, 0xB6, 0xD0, 0x68, 0x3E, 0x80, 0x2F, 0x0C, 0xA9, 0xFE, 0x64, 0x53, 0x69, 0x7A,
];

/// A line of text positioned on a page, `y` counted down from the top edge.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedLine {
    pub x: f32,
    pub y: f32,
    pub text: String,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PdfProcessor;

impl PdfProcessor {
    pub fn new() -> Self {
        Self
    }

    /// Load a PDF whose text is going to be read. lopdf decrypts documents
    /// that open with the empty password while loading them; anything still
    /// encrypted afterwards needs a real password.
    pub fn open_for_reading(&self, path: &Path) -> Result<PdfDocument, ConversionError> {
        let doc = PdfDocument::load(path)?;
        if doc.is_encrypted() {
            return Err(ConversionError::Encrypted);
        }
        Ok(doc)
    }

    /// Extracted text of every page, in page order.
    pub fn extract_page_texts(&self, doc: &PdfDocument) -> Result<Vec<String>, ConversionError> {
        doc.get_pages()
            .keys()
            .map(|&page_number| {
                doc.extract_text(&[page_number])
                    .map_err(ConversionError::from)
            })
            .collect()
    }

    pub fn extract_text(&self, doc: &PdfDocument) -> Result<String, ConversionError> {
        Ok(self.extract_page_texts(doc)?.join("\n\n"))
    }

    /// Load `path` with its encryption removed.
    ///
    /// Documents that open with the empty password (owner-only protection)
    /// need no password at all. Otherwise `password` may be either the user
    /// or the owner password. Unencrypted documents load as they are.
    pub fn unlock(&self, path: &Path, password: Option<&str>) -> Result<PdfDocument, ConversionError> {
        let doc = PdfDocument::load(path).map_err(unreadable)?;
        if !doc.is_encrypted() {
            return Ok(doc);
        }

        let password = password
            .filter(|password| !password.is_empty())
            .ok_or(ConversionError::PasswordRequired)?;

        match doc.authenticate_password(password) {
            Ok(()) => {
                let user_password = if doc.authenticate_user_password(password).is_ok() {
                    password.to_string()
                } else {
                    recover_user_password(&doc, password)?
                };
                PdfDocument::load_with_password(path, &user_password).map_err(unreadable)
            }
            Err(e) if is_password_rejection(&e) => Err(unreadable(e)),
            Err(e) => Err(ConversionError::UnsupportedEncryption {
                message: e.to_string(),
            }),
        }
    }

    pub fn save(&self, doc: &mut PdfDocument, path: &Path) -> Result<(), ConversionError> {
        let mut writer = BufWriter::new(File::create(path)?);
        doc.save_to(&mut writer)?;
        writer.flush()?;
        Ok(())
    }

    /// Place lines on pages: each page starts 50pt from the top, every
    /// non-blank line takes 15pt, and once the cursor passes 750pt the next
    /// line goes to a fresh page. Blank lines are skipped without moving the
    /// cursor. There is always at least one page.
    pub fn layout_lines<'a, I>(&self, lines: I) -> Vec<Vec<PlacedLine>>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut pages: Vec<Vec<PlacedLine>> = vec![Vec::new()];
        let mut y = TOP_MARGIN;

        for line in lines {
            if y > MAX_Y {
                pages.push(Vec::new());
                y = TOP_MARGIN;
            }

            if line.trim().is_empty() {
                continue;
            }

            if let Some(page) = pages.last_mut() {
                page.push(PlacedLine {
                    x: LEFT_MARGIN,
                    y,
                    text: line.chars().take(MAX_LINE_CHARS).collect(),
                });
            }
            y += LINE_HEIGHT;
        }

        pages
    }

    /// Write laid-out pages as a PDF using the built-in Helvetica font.
    pub fn render(&self, pages: &[Vec<PlacedLine>]) -> Vec<u8> {
        let catalog_id = Ref::new(1);
        let page_tree_id = Ref::new(2);
        let font_id = Ref::new(3);
        // Each page takes two refs: the page object and its content stream.
        let page_ids: Vec<Ref> = (0..pages.len())
            .map(|index| Ref::new(4 + 2 * index as i32))
            .collect();

        let mut pdf = Pdf::new();
        pdf.catalog(catalog_id).pages(page_tree_id);
        pdf.pages(page_tree_id)
            .kids(page_ids.iter().copied())
            .count(page_ids.len() as i32);
        pdf.type1_font(font_id)
            .base_font(Name(b"Helvetica"))
            .encoding_predefined(Name(b"WinAnsiEncoding"));

        for (index, lines) in pages.iter().enumerate() {
            let page_id = page_ids[index];
            let content_id = Ref::new(5 + 2 * index as i32);

            let mut page = pdf.page(page_id);
            page.media_box(Rect::new(0.0, 0.0, PAGE_WIDTH, PAGE_HEIGHT));
            page.parent(page_tree_id);
            page.contents(content_id);
            page.resources().fonts().pair(FONT_NAME, font_id);
            page.finish();

            let mut content = Content::new();
            for line in lines {
                let encoded = encode_win_ansi(&line.text);
                content.begin_text();
                content.set_font(FONT_NAME, FONT_SIZE);
                content.next_line(line.x, PAGE_HEIGHT - line.y);
                content.show(Str(encoded.as_slice()));
                content.end_text();
            }
            pdf.stream(content_id, &content.finish());
        }

        pdf.finish()
    }

    /// Lay out newline-separated text and render it.
    pub fn text_to_pdf(&self, text: &str) -> Vec<u8> {
        let pages = self.layout_lines(text.split('\n'));
        log::info!(
            "Rendering {} line(s) onto {} page(s)",
            pages.iter().map(Vec::len).sum::<usize>(),
            pages.len()
        );
        self.render(&pages)
    }
}

fn unreadable(e: lopdf::Error) -> ConversionError {
    ConversionError::UnreadablePdf {
        message: e.to_string(),
    }
}

/// Errors that mean the password was wrong, as opposed to a security
/// handler lopdf cannot evaluate.
/// Decrypt the user password held in `/O` with an authenticated owner
/// password. lopdf derives revision 2 to 4 file keys from the user password
/// only; revision 5 and later carry the owner key themselves.
fn recover_user_password(doc: &PdfDocument, owner_password: &str) -> Result<String, ConversionError> {
    let encrypt = doc.get_encrypted()?;
    let revision = encrypt.get(b"R").and_then(Object::as_i64)?;
    if revision >= 5 {
        return Ok(owner_password.to_string());
    }

    let key_len = if revision >= 3 {
        let bits = encrypt.get(b"Length").and_then(Object::as_i64).unwrap_or(40);
        (bits.clamp(40, 128) / 8) as usize
    } else {
        5
    };

    let password = owner_password.as_bytes();
    let len = password.len().min(32);
    let mut hasher = Md5::new();
    hasher.update(&password[..len]);
    hasher.update(&PASSWORD_PAD[..32 - len]);
    let mut hash = hasher.finalize();
    if revision >= 3 {
        for _ in 0..50 {
            hash = Md5::digest(hash);
        }
    }
    let key = &hash[..key_len];

    let rounds: Vec<u8> = if revision >= 3 { (0..20).rev().collect() } else { vec![0] };
    let mut padded = encrypt.get(b"O").and_then(Object::as_str)?.to_vec();
    for round in rounds {
        let round_key: Vec<u8> = key.iter().map(|byte| byte ^ round).collect();
        padded = Rc4CryptFilter
            .decrypt(&round_key, &padded)
            .map_err(|e| ConversionError::UnsupportedEncryption {
                message: e.to_string(),
            })?;
    }

    let user_len = (0..padded.len())
        .find(|&n| PASSWORD_PAD.starts_with(&padded[n..]))
        .unwrap_or(padded.len());
    padded.truncate(user_len);
    String::from_utf8(padded).map_err(|_| ConversionError::UnsupportedEncryption {
        message: "the user password is not valid UTF-8".to_string(),
    })
}

fn is_password_rejection(e: &lopdf::Error) -> bool {
    matches!(
        e,
        lopdf::Error::InvalidPassword
            | lopdf::Error::Decryption(DecryptionError::IncorrectPassword)
            | lopdf::Error::Decryption(DecryptionError::StringPrep(_))
    )
}

/// Map text onto the WinAnsi code page used by the page font. Characters
/// it cannot represent become `?`.
fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c {
            '\t' => b' ',
            ' '..='~' | '\u{a0}'..='\u{ff}' => c as u8,
            '€' => 0x80,
            '‚' => 0x82,
            '„' => 0x84,
            '…' => 0x85,
            '‘' => 0x91,
            '’' => 0x92,
            '“' => 0x93,
            '”' => 0x94,
            '•' => 0x95,
            '–' => 0x96,
            '—' => 0x97,
            '™' => 0x99,
            _ => b'?',
        })
        .collect()
}
