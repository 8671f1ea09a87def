#![allow(dead_code)]

use actix_web::http::header;
use actix_web::test::TestRequest;
use actix_web::web;
use lopdf::content::{Content, Operation};
use lopdf::encryption::crypt_filters::{Aes128CryptFilter, Aes256CryptFilter, CryptFilter};
use lopdf::{
    dictionary, Document, EncryptionState, EncryptionVersion, Object, Permissions, Stream,
    StringFormat,
};
use std::collections::BTreeMap;
use std::io::{Cursor, Write};
use std::path::Path;
use std::sync::Arc;
use zip::write::FileOptions;

use document_converter::handlers::AppState;
use document_converter::ServerConfig;

const BOUNDARY: &str = "----document-converter-test-boundary";

const FILE_ID: [u8; 16] = *b"converter-testid";

const FILE_KEY: [u8; 32] = *b"converter-test-file-key-32-bytes";

pub fn state(upload_dir: &Path) -> web::Data<AppState> {
    state_with_limit(upload_dir, ServerConfig::default().max_upload_bytes)
}

pub fn state_with_limit(upload_dir: &Path, max_upload_bytes: u64) -> web::Data<AppState> {
    let config = ServerConfig {
        upload_dir: upload_dir.to_path_buf(),
        max_upload_bytes,
        ..ServerConfig::default()
    };
    web::Data::new(AppState::new(&config).unwrap())
}

pub fn staged_files(dir: &Path) -> Vec<String> {
    std::fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect()
}

pub fn multipart_body(filename: &str, content: &[u8], password: Option<&str>) -> Vec<u8> {
    let mut body = Vec::new();
    write!(
        body,
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
    )
    .unwrap();
    body.extend_from_slice(content);
    body.extend_from_slice(b"\r\n");

    if let Some(password) = password {
        write!(
            body,
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"password\"\r\n\r\n{password}\r\n"
        )
        .unwrap();
    }

    write!(body, "--{BOUNDARY}--\r\n").unwrap();
    body
}

pub fn upload(uri: &str, filename: &str, content: &[u8], password: Option<&str>) -> TestRequest {
    TestRequest::post()
        .uri(uri)
        .insert_header((
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        ))
        .set_payload(multipart_body(filename, content, password))
}

/// One page per entry, one text line per string.
pub fn text_pdf_document(pages: &[&[&str]]) -> Document {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => font_id,
        },
    });

    let mut kids: Vec<Object> = Vec::new();
    for lines in pages {
        let mut operations = Vec::new();
        for (index, line) in lines.iter().enumerate() {
            operations.push(Operation::new("BT", vec![]));
            operations.push(Operation::new("Tf", vec!["F1".into(), 12.into()]));
            operations.push(Operation::new(
                "Td",
                vec![72.into(), (720 - 20 * index as i64).into()],
            ));
            operations.push(Operation::new("Tj", vec![Object::string_literal(*line)]));
            operations.push(Operation::new("ET", vec![]));
        }
        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc
}

pub fn to_bytes(doc: &mut Document) -> Vec<u8> {
    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
}

pub fn text_pdf(pages: &[&[&str]]) -> Vec<u8> {
    to_bytes(&mut text_pdf_document(pages))
}

#[derive(Debug, Clone, Copy)]
pub enum Protection {
    /// 128-bit RC4, standard security handler revision 3.
    Rc4,
    /// AES-128, revision 4.
    Aes128,
    /// AES-256, revision 6.
    Aes256,
}

/// 128-bit RC4 protection, the common case for older tools.
pub fn encrypted_pdf(pages: &[&[&str]], user_password: &str, owner_password: &str) -> Vec<u8> {
    protected_pdf(pages, Protection::Rc4, user_password, owner_password)
}

pub fn protected_pdf(
    pages: &[&[&str]],
    protection: Protection,
    user_password: &str,
    owner_password: &str,
) -> Vec<u8> {
    to_bytes(&mut protected_document(pages, protection, user_password, owner_password))
}

fn protected_document(
    pages: &[&[&str]],
    protection: Protection,
    user_password: &str,
    owner_password: &str,
) -> Document {
    let mut doc = text_pdf_document(pages);
    doc.trailer.set(
        "ID",
        Object::Array(vec![
            Object::String(FILE_ID.to_vec(), StringFormat::Hexadecimal),
            Object::String(FILE_ID.to_vec(), StringFormat::Hexadecimal),
        ]),
    );

    let permissions = Permissions::all();
    let version = match protection {
        Protection::Rc4 => EncryptionVersion::V2 {
            document: &doc,
            owner_password,
            user_password,
            key_length: 128,
            permissions,
        },
        Protection::Aes128 => EncryptionVersion::V4 {
            document: &doc,
            encrypt_metadata: true,
            crypt_filters: std_crypt_filter(Arc::new(Aes128CryptFilter)),
            stream_filter: b"StdCF".to_vec(),
            string_filter: b"StdCF".to_vec(),
            owner_password,
            user_password,
            permissions,
        },
        Protection::Aes256 => EncryptionVersion::V5 {
            encrypt_metadata: true,
            crypt_filters: std_crypt_filter(Arc::new(Aes256CryptFilter)),
            file_encryption_key: &FILE_KEY,
            stream_filter: b"StdCF".to_vec(),
            string_filter: b"StdCF".to_vec(),
            owner_password,
            user_password,
            permissions,
        },
    };

    let state = EncryptionState::try_from(version).unwrap();
    doc.encrypt(&state).unwrap();
    doc
}

/// Encrypted with a security handler revision nothing implements.
pub fn unsupported_encryption_pdf(pages: &[&[&str]]) -> Vec<u8> {
    let mut doc = protected_document(pages, Protection::Rc4, "secret", "owner-pass");
    let encrypt_id = doc
        .trailer
        .get(b"Encrypt")
        .and_then(Object::as_reference)
        .unwrap();
    let encrypt = doc
        .get_object_mut(encrypt_id)
        .and_then(Object::as_dict_mut)
        .unwrap();
    encrypt.set("V", 9);
    encrypt.set("R", 9);
    to_bytes(&mut doc)
}

fn std_crypt_filter(filter: Arc<dyn CryptFilter>) -> BTreeMap<Vec<u8>, Arc<dyn CryptFilter>> {
    BTreeMap::from([(b"StdCF".to_vec(), filter)])
}

pub fn docx(body_xml: &str) -> Vec<u8> {
    let document = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{}</w:body></w:document>"#,
        body_xml
    );

    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
    zip.start_file("word/document.xml", FileOptions::default())
        .unwrap();
    zip.write_all(document.as_bytes()).unwrap();
    zip.finish().unwrap().into_inner()
}

pub fn paragraphs(texts: &[&str]) -> String {
    texts
        .iter()
        .map(|text| format!("<w:p><w:r><w:t>{}</w:t></w:r></w:p>", text))
        .collect()
}

pub fn all_text(pdf: &[u8]) -> String {
    let doc = Document::load_mem(pdf).unwrap();
    let pages: Vec<u32> = doc.get_pages().keys().copied().collect();
    doc.extract_text(&pages).unwrap()
}
