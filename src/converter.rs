use crate::docx_processor::DocxProcessor;
use crate::pdf_processor::PdfProcessor;
use crate::types::*;
use crate::upload::{StagingArea, Upload};
use actix_web::web;
use std::fs;
use uuid::Uuid;

/// Runs the four conversions. Every operation owns its staged input and
/// output for the whole conversion, so both files are gone by the time it
/// returns, whether it succeeded or not.
#[derive(Debug, Clone)]
pub struct DocumentConverter {
    staging: StagingArea,
    pdf_processor: PdfProcessor,
    docx_processor: DocxProcessor,
}

impl DocumentConverter {
    pub fn new(staging: StagingArea) -> Self {
        Self {
            staging,
            pdf_processor: PdfProcessor::new(),
            docx_processor: DocxProcessor::new(),
        }
    }

    pub fn staging(&self) -> &StagingArea {
        &self.staging
    }

    pub async fn pdf_to_word(
        &self,
        job_id: &Uuid,
        upload: Upload,
    ) -> Result<ConvertedDocument, ConversionError> {
        let filename = DocumentKind::Word.rename(&upload.filename);
        let output = self.staging.create(job_id, ".docx")?;
        let pdf = self.pdf_processor;
        let docx = self.docx_processor;

        let content = run_blocking(move || {
            let doc = pdf.open_for_reading(upload.file.path())?;
            let pages = pdf.extract_page_texts(&doc)?;
            log::info!("Extracted text from {} page(s)", pages.len());

            docx.write_docx(output.path(), &pages)?;
            let content = output.read_all()?;

            upload.file.discard();
            output.discard();
            Ok(content)
        })
        .await?;

        Ok(self.finish(job_id, filename, DocumentKind::Word, content))
    }

    pub async fn word_to_pdf(
        &self,
        job_id: &Uuid,
        upload: Upload,
    ) -> Result<ConvertedDocument, ConversionError> {
        let filename = DocumentKind::Pdf.rename(&upload.filename);
        let output = self.staging.create(job_id, ".pdf")?;
        let pdf = self.pdf_processor;
        let docx = self.docx_processor;

        let content = run_blocking(move || {
            let blocks = docx.read_blocks(upload.file.path())?;
            log::info!("Read {} block(s) from Word document", blocks.len());

            let text = docx.flatten_blocks(&blocks);
            fs::write(output.path(), pdf.text_to_pdf(&text))?;
            let content = output.read_all()?;

            upload.file.discard();
            output.discard();
            Ok(content)
        })
        .await?;

        Ok(self.finish(job_id, filename, DocumentKind::Pdf, content))
    }

    pub async fn pdf_to_text(
        &self,
        job_id: &Uuid,
        upload: Upload,
    ) -> Result<ConvertedDocument, ConversionError> {
        let filename = DocumentKind::Text.rename(&upload.filename);
        let output = self.staging.create(job_id, ".txt")?;
        let pdf = self.pdf_processor;

        let content = run_blocking(move || {
            let doc = pdf.open_for_reading(upload.file.path())?;
            let text = pdf.extract_text(&doc)?;

            fs::write(output.path(), text.as_bytes())?;
            let content = output.read_all()?;

            upload.file.discard();
            output.discard();
            Ok(content)
        })
        .await?;

        Ok(self.finish(job_id, filename, DocumentKind::Text, content))
    }

    /// Remove password protection. The result is always written without
    /// encryption, even when the input was not encrypted to begin with.
    pub async fn unlock_pdf(
        &self,
        job_id: &Uuid,
        upload: Upload,
        password: Option<String>,
    ) -> Result<ConvertedDocument, ConversionError> {
        let filename = format!("unlocked_{}", upload.filename);
        let output = self.staging.create(job_id, ".pdf")?;
        let pdf = self.pdf_processor;

        let content = run_blocking(move || {
            let mut doc = pdf.unlock(upload.file.path(), password.as_deref())?;
            log::info!(
                "PDF with {} page(s) unlocked (was encrypted: {})",
                doc.get_pages().len(),
                doc.was_encrypted()
            );

            pdf.save(&mut doc, output.path())?;
            let content = output.read_all()?;

            upload.file.discard();
            output.discard();
            Ok(content)
        })
        .await?;

        Ok(self.finish(job_id, filename, DocumentKind::Pdf, content))
    }

    fn finish(
        &self,
        job_id: &Uuid,
        filename: String,
        kind: DocumentKind,
        content: Vec<u8>,
    ) -> ConvertedDocument {
        let converted = ConvertedDocument {
            filename,
            media_type: kind.media_type(),
            content: content.into(),
        };
        log::info!(
            "Job {} produced {} ({} bytes)",
            job_id,
            converted.filename,
            converted.size()
        );
        converted
    }
}

async fn run_blocking<T, F>(task: F) -> Result<T, ConversionError>
where
    F: FnOnce() -> Result<T, ConversionError> + Send + 'static,
    T: Send + 'static,
{
    match web::block(task).await {
        Ok(result) => result,
        Err(_) => Err(ConversionError::Cancelled),
    }
}
