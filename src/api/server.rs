// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the fieldlogger-bridge project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see the license field in Cargo.toml).

use std::path::PathBuf;
use std::sync::Arc;

use rocket::fairing::{Fairing, Info, Kind};
use rocket::figment::Figment;
use rocket::http::{Header, Status};
use rocket::response::status;
use rocket::serde::json::{json, Json, Value};
use rocket::{catch, catchers, options, routes, Build, Request, Response, Rocket};

use super::control::{self, Controls};
use super::ingest;
use crate::storage::ReadingStore;

/// Error response carrying `{"error": message}`
pub type ApiError = status::Custom<Json<Value>>;

/// Result type of every JSON route
pub type ApiResult = Result<Json<Value>, ApiError>;

pub fn api_error(code: Status, message: impl Into<String>) -> ApiError {
    status::Custom(code, Json(json!({ "error": message.into() })))
}

pub struct CORS;

#[rocket::async_trait]
impl Fairing for CORS {
    fn info(&self) -> Info {
        Info {
            name: "Add CORS headers to responses",
            kind: Kind::Response,
        }
    }

    async fn on_response<'r>(&self, _request: &'r Request<'_>, response: &mut Response<'r>) {
        response.set_header(Header::new("Access-Control-Allow-Origin", "*"));
        response.set_header(Header::new(
            "Access-Control-Allow-Methods",
            "POST, GET, OPTIONS",
        ));
        response.set_header(Header::new("Access-Control-Allow-Headers", "*"));
        response.set_header(Header::new("Access-Control-Allow-Credentials", "true"));
    }
}

/// # Answers to OPTIONS requests
#[options("/<_path..>")]
async fn options(_path: PathBuf) -> Result<(), std::io::Error> {
    Ok(())
}

#[catch(default)]
fn default_catcher(status: Status, _request: &Request) -> Json<Value> {
    Json(json!({ "error": status.reason_lossy() }))
}

/// Build the ingestion and control server.
///
/// # Arguments
///
/// * `figment` - Rocket configuration (address, port, TLS, limits)
/// * `store` - Reading store served by the ingestion routes
/// * `controls` - Conveyor and relay controllers used by the control routes
pub async fn build_rocket(
    figment: Figment,
    store: Arc<ReadingStore>,
    controls: Controls,
) -> Rocket<Build> {
    rocket::custom(figment)
        .attach(CORS)
        .mount(
            "/",
            routes![
                options,
                ingest::post_status,
                ingest::post_temperature,
                ingest::post_humidity,
                ingest::post_dome_temperature,
                ingest::post_small_count,
                ingest::post_large_count,
                ingest::post_speed,
                ingest::latest_temperature,
                ingest::latest_humidity,
                ingest::latest_speed,
                ingest::latest_dome_temperature,
                control::set_conveyor,
                control::conveyor_status,
                control::set_fan,
                control::set_humidifier,
                control::write_register,
            ],
        )
        .register("/", catchers![default_catcher])
        .manage(store)
        .manage(controls)
}
