use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use std::io;

use document_converter::handlers::{self, AppState};
use document_converter::ServerConfig;

fn cors(config: &ServerConfig) -> Cors {
    let cors = if config.allows_any_origin() {
        Cors::default().allow_any_origin()
    } else {
        config
            .cors_origins
            .iter()
            .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin))
    };

    cors.allow_any_method()
        .allow_any_header()
        .supports_credentials()
        .max_age(3600)
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = ServerConfig::from_env()
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

    log::info!("🦀 Starting Document Converter API");
    log::info!("📍 Listening on {}:{}", config.host, config.port);
    log::info!("📁 Staging directory: {}", config.upload_dir.display());
    log::info!("🌐 CORS origins: {:?}", config.cors_origins);
    log::info!("🔧 Operations: pdf-to-word, word-to-pdf, pdf-to-txt, pdf-unlock");

    let state = web::Data::new(AppState::new(&config)?);
    let server_config = config.clone();

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(Logger::default())
            .wrap(cors(&server_config))
            .configure(handlers::configure)
    })
    .bind(config.bind_address())?
    .run()
    .await
}
