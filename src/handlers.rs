use actix_multipart::Multipart;
use actix_web::http::header::{
    CacheControl, CacheDirective, Charset, ContentDisposition, DispositionParam,
    DispositionType, ExtendedValue,
};
use actix_web::{web, HttpResponse};
use std::io;
use uuid::Uuid;

use crate::config::ServerConfig;
use crate::converter::DocumentConverter;
use crate::error::ApiError;
use crate::types::*;
use crate::upload::{StagingArea, UploadForm};

const CONVERSION_FAILED: &str = "Conversion failed";
const UNLOCKING_FAILED: &str = "Unlocking failed";

/// Shared, read-only state handed to every request.
pub struct AppState {
    pub converter: DocumentConverter,
    pub max_upload_bytes: u64,
}

impl AppState {
    pub fn new(config: &ServerConfig) -> io::Result<Self> {
        let staging = StagingArea::new(&config.upload_dir)?;
        Ok(Self {
            converter: DocumentConverter::new(staging),
            max_upload_bytes: config.max_upload_bytes,
        })
    }

    async fn read_upload(
        &self,
        payload: Multipart,
        job_id: &Uuid,
        kind: UploadKind,
    ) -> Result<UploadForm, ApiError> {
        let form = UploadForm::read(
            payload,
            self.converter.staging(),
            job_id,
            kind,
            self.max_upload_bytes,
        )
        .await
        .map_err(|e| {
            log::warn!("Job {} rejected: {}", job_id, e);
            e
        })?;

        log::info!(
            "Job {} staged {} ({} bytes)",
            job_id,
            form.upload.filename,
            form.upload.size
        );
        Ok(form)
    }
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(root))
        .route("/health", web::get().to(health))
        .service(
            web::scope("/api")
                .route("/pdf-to-word", web::post().to(pdf_to_word))
                .route("/word-to-pdf", web::post().to(word_to_pdf))
                .route("/pdf-to-txt", web::post().to(pdf_to_txt))
                .route("/pdf-unlock", web::post().to(pdf_unlock)),
        );
}

async fn root() -> HttpResponse {
    HttpResponse::Ok().json(StatusResponse {
        message: "Document Converter API".to_string(),
    })
}

async fn health() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "capabilities": {
            "input_formats": ["PDF", "DOCX", "DOC"],
            "output_formats": ["PDF", "DOCX", "TXT"],
            "operations": ["pdf-to-word", "word-to-pdf", "pdf-to-txt", "pdf-unlock"]
        }
    }))
}

async fn pdf_to_word(
    payload: Multipart,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let job_id = Uuid::new_v4();
    log::info!("📄 PDF to Word request received (job {})", job_id);

    let form = state.read_upload(payload, &job_id, UploadKind::Pdf).await?;
    let converted = state
        .converter
        .pdf_to_word(&job_id, form.upload)
        .await
        .map_err(|e| failed(&job_id, CONVERSION_FAILED, e))?;

    Ok(download(converted))
}

async fn word_to_pdf(
    payload: Multipart,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let job_id = Uuid::new_v4();
    log::info!("📝 Word to PDF request received (job {})", job_id);

    let form = state.read_upload(payload, &job_id, UploadKind::Word).await?;
    let converted = state
        .converter
        .word_to_pdf(&job_id, form.upload)
        .await
        .map_err(|e| failed(&job_id, CONVERSION_FAILED, e))?;

    Ok(download(converted))
}

async fn pdf_to_txt(
    payload: Multipart,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let job_id = Uuid::new_v4();
    log::info!("📃 PDF to text request received (job {})", job_id);

    let form = state.read_upload(payload, &job_id, UploadKind::Pdf).await?;
    let converted = state
        .converter
        .pdf_to_text(&job_id, form.upload)
        .await
        .map_err(|e| failed(&job_id, CONVERSION_FAILED, e))?;

    Ok(download(converted))
}

async fn pdf_unlock(
    payload: Multipart,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let job_id = Uuid::new_v4();
    log::info!("🔓 PDF unlock request received (job {})", job_id);

    let form = state.read_upload(payload, &job_id, UploadKind::Pdf).await?;
    let converted = state
        .converter
        .unlock_pdf(&job_id, form.upload, form.password)
        .await
        .map_err(|e| failed(&job_id, UNLOCKING_FAILED, e))?;

    Ok(download(converted))
}

fn failed(job_id: &Uuid, context: &'static str, error: ConversionError) -> ApiError {
    if error.is_client_error() {
        log::warn!("Job {} rejected: {}", job_id, error);
    } else {
        log::error!("❌ Job {} failed: {}: {}", job_id, context, error);
    }
    ApiError::from_conversion(context, error)
}

fn download(document: ConvertedDocument) -> HttpResponse {
    log::info!("✅ Sending {} ({} bytes)", document.filename, document.size());

    HttpResponse::Ok()
        .content_type(document.media_type)
        .insert_header(attachment(document.filename))
        .insert_header(CacheControl(vec![CacheDirective::NoCache]))
        .body(document.content)
}

/// `filename` carries an ASCII fallback; non-ASCII names are also sent as
/// RFC 6266 `filename*` in UTF-8.
fn attachment(filename: String) -> ContentDisposition {
    let mut parameters = Vec::with_capacity(2);
    if filename.is_ascii() {
        parameters.push(DispositionParam::Filename(filename));
    } else {
        let fallback = filename
            .chars()
            .map(|c| if c.is_ascii() { c } else { '_' })
            .collect();
        parameters.push(DispositionParam::Filename(fallback));
        parameters.push(DispositionParam::FilenameExt(ExtendedValue {
            charset: Charset::Ext("UTF-8".to_string()),
            language_tag: None,
            value: filename.into_bytes(),
        }));
    }

    ContentDisposition {
        disposition: DispositionType::Attachment,
        parameters,
    }
}
