//! Document Converter Library
//!
//! HTTP service that converts between PDF, Word and plain text and removes
//! password protection from PDFs. Each request stages its upload in a
//! temporary file, runs one conversion, and cleans up before responding.

pub mod config;
pub mod converter;
pub mod docx_processor;
pub mod error;
pub mod handlers;
pub mod pdf_processor;
pub mod types;
pub mod upload;

pub use config::ServerConfig;
pub use converter::DocumentConverter;
pub use error::ApiError;
pub use types::*;
