use actix_files::Files;
use actix_web::{
    get, http::StatusCode, post, web, App, HttpResponse, HttpServer, Responder, ResponseError,
};
use log::*;
use serde::{Deserialize, Serialize};
use stderrlog::StdErrLog;
use tera::Tera;
use thiserror::Error;

use std::io;

mod config;
mod error;
mod message;
mod storage;
mod wall;

use config::Config;
use error::WallError;
use wall::WallStore;

/// Largest `POST /api/wall` body accepted. Anything bigger is answered
/// with the same 500 as any other failure to read the request.
const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

struct AppState {
    tera: Tera,
    wall: WallStore,
}

/// Body of `POST /api/wall`. `message` is kept untyped so a non-string value
/// is rejected as an invalid message rather than as malformed JSON.
#[derive(Deserialize)]
struct PostMessageTdo {
    #[serde(default)]
    message: Option<serde_json::Value>,
}

impl PostMessageTdo {
    fn text(&self) -> Result<&str, WallError> {
        match &self.message {
            Some(serde_json::Value::String(s)) => Ok(s),
            _ => Err(WallError::InvalidInput),
        }
    }
}

#[derive(Serialize)]
struct SuccessTdo {
    success: bool,
}

#[derive(Serialize)]
struct ErrorTdo {
    error: String,
}

/// What the HTTP layer reports. Details of the underlying failure are logged,
/// never sent to the client.
#[derive(Error, Debug)]
enum ApiError {
    #[error("Invalid message")]
    InvalidMessage,
    #[error("Failed to retrieve messages")]
    RetrieveFailed,
    #[error("Failed to post message")]
    PostFailed,
    #[error("Failed to render page")]
    RenderFailed,
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::InvalidMessage => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorTdo {
            error: self.to_string(),
        })
    }
}

#[get("/")]
async fn get_index(data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let messages = data.wall.list_messages().await.map_err(|e| {
        error!("GET /: {}", e);
        ApiError::RetrieveFailed
    })?;

    let mut context = tera::Context::new();
    context.insert("messages", &messages);
    let output = data.tera.render("index.html", &context).map_err(|e| {
        error!("Rendering index.html: {}", e);
        ApiError::RenderFailed
    })?;
    Ok(HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .body(output))
}

#[get("/api/wall")]
async fn get_wall(data: web::Data<AppState>) -> Result<impl Responder, ApiError> {
    match data.wall.list_messages().await {
        Ok(messages) => Ok(HttpResponse::Ok().json(messages)),
        Err(e) => {
            error!("GET /api/wall: {}", e);
            Err(ApiError::RetrieveFailed)
        }
    }
}

#[post("/api/wall")]
async fn post_wall(
    body: Result<web::Bytes, actix_web::Error>,
    data: web::Data<AppState>,
) -> Result<impl Responder, ApiError> {
    let body = body.map_err(|e| {
        error!("POST /api/wall: reading body: {}", e);
        ApiError::PostFailed
    })?;
    let form: PostMessageTdo = serde_json::from_slice(&body).map_err(|e| {
        error!("POST /api/wall: parsing body: {}", e);
        ApiError::PostFailed
    })?;
    let text = form.text().map_err(|_| ApiError::InvalidMessage)?;

    match data.wall.append_message(text).await {
        Ok(_) => Ok(HttpResponse::Created().json(SuccessTdo { success: true })),
        Err(e) if e.is_invalid_input() => Err(ApiError::InvalidMessage),
        Err(e) => {
            error!("POST /api/wall: {}", e);
            Err(ApiError::PostFailed)
        }
    }
}

fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::PayloadConfig::new(MAX_BODY_BYTES))
        .service(get_index)
        .service(get_wall)
        .service(post_wall);
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    let config = match Config::load() {
        Ok(val) => val,
        Err(err) => {
            eprintln!("FATAL: Failed to load config\n{}", err);
            ::std::process::exit(1);
        }
    };

    StdErrLog::new()
        .verbosity(config.log_level())
        .module(module_path!())
        .init()
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;

    let backend = match config.build_backend() {
        Ok(b) => b,
        Err(e) => {
            error!("FATAL: {}", e);
            ::std::process::exit(1);
        }
    };
    let wall = WallStore::new(backend);

    let tera = match Tera::new(&config.templates) {
        Ok(t) => t,
        Err(e) => {
            error!("Parsing error: {}", e);
            ::std::process::exit(1);
        }
    };

    info!(
        "Serving the wall from the {} backend on {}",
        wall.backend_name(),
        config.listen_addr
    );

    let app_data = web::Data::new(AppState { tera, wall });
    let static_dir = config.static_dir.clone();

    HttpServer::new(move || {
        App::new()
            .app_data(app_data.clone())
            .configure(configure)
            .service(Files::new("/static", &static_dir))
    })
    .bind(&config.listen_addr)?
    .run()
    .await?;

    info!("Bye!");
    Ok(())
}
