// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the fieldlogger-bridge project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see the license field in Cargo.toml).

//! Ingestion and latest-reading routes
//!
//! Every POST appends one record and answers `{"msg": ..., "dados": record}`,
//! where the record carries its `_id` and `timestamp`. The latest-reading
//! routes answer `{"timestamp", "valor"}` or 404.

use std::sync::Arc;

use log::error;
use rocket::http::Status;
use rocket::serde::json::{json, Json};
use rocket::serde::Deserialize;
use rocket::{get, post, State};

use super::server::{api_error, ApiResult};
use crate::storage::{parse_timestamp, Collection, Reading, ReadingStore};

#[derive(Debug, Deserialize)]
#[serde(crate = "rocket::serde")]
pub struct StatusInput {
    pub status: i64,
}

#[derive(Debug, Deserialize)]
#[serde(crate = "rocket::serde")]
pub struct SensorInput {
    pub sensor: String,
    pub valor: f64,
}

#[derive(Debug, Deserialize)]
#[serde(crate = "rocket::serde")]
pub struct CounterInput {
    pub sensor: String,
    pub valor: u64,
}

#[derive(Debug, Deserialize)]
#[serde(crate = "rocket::serde")]
pub struct SpeedInput {
    /// ISO-8601, taken as UTC when it has no offset
    pub timestamp: String,
    pub valor: f64,
}

fn record(store: &ReadingStore, reading: Reading, msg: &str) -> ApiResult {
    let stored = store.insert(&reading).map_err(|e| {
        error!("Cannot store {} reading: {}", reading.collection(), e);
        api_error(Status::InternalServerError, e.to_string())
    })?;
    Ok(Json(json!({ "msg": msg, "dados": stored })))
}

fn latest(store: &ReadingStore, collection: Collection, missing: &str) -> ApiResult {
    let record = store
        .latest(collection)
        .ok_or_else(|| api_error(Status::NotFound, missing))?;
    Ok(Json(json!({
        "timestamp": record.timestamp,
        "valor": record.valor(),
    })))
}

#[post("/status_logger", format = "json", data = "<input>")]
pub fn post_status(store: &State<Arc<ReadingStore>>, input: Json<StatusInput>) -> ApiResult {
    record(
        store,
        Reading::Status {
            status: input.status,
        },
        "status recorded",
    )
}

#[post("/temperatura_logger", format = "json", data = "<input>")]
pub fn post_temperature(store: &State<Arc<ReadingStore>>, input: Json<SensorInput>) -> ApiResult {
    let SensorInput { sensor, valor } = input.into_inner();
    record(
        store,
        Reading::Temperature { sensor, valor },
        "temperature recorded",
    )
}

#[post("/humidade_logger", format = "json", data = "<input>")]
pub fn post_humidity(store: &State<Arc<ReadingStore>>, input: Json<SensorInput>) -> ApiResult {
    let SensorInput { sensor, valor } = input.into_inner();
    record(store, Reading::Humidity { sensor, valor }, "humidity recorded")
}

#[post("/temperatura_cupula", format = "json", data = "<input>")]
pub fn post_dome_temperature(
    store: &State<Arc<ReadingStore>>,
    input: Json<SensorInput>,
) -> ApiResult {
    let SensorInput { sensor, valor } = input.into_inner();
    record(
        store,
        Reading::DomeTemperature { sensor, valor },
        "dome temperature recorded",
    )
}

#[post("/contador_unidades_logger", format = "json", data = "<input>")]
pub fn post_small_count(store: &State<Arc<ReadingStore>>, input: Json<CounterInput>) -> ApiResult {
    let CounterInput { sensor, valor } = input.into_inner();
    record(
        store,
        Reading::SmallCount { sensor, valor },
        "small part count recorded",
    )
}

#[post("/contador_unidades_logger_grandes", format = "json", data = "<input>")]
pub fn post_large_count(store: &State<Arc<ReadingStore>>, input: Json<CounterInput>) -> ApiResult {
    let CounterInput { sensor, valor } = input.into_inner();
    record(
        store,
        Reading::LargeCount { sensor, valor },
        "large part count recorded",
    )
}

#[post("/velocidade_logger", format = "json", data = "<input>")]
pub fn post_speed(store: &State<Arc<ReadingStore>>, input: Json<SpeedInput>) -> ApiResult {
    let timestamp = parse_timestamp(&input.timestamp).ok_or_else(|| {
        api_error(
            Status::BadRequest,
            format!("invalid timestamp '{}'", input.timestamp),
        )
    })?;
    record(
        store,
        Reading::Speed {
            timestamp,
            valor: input.valor,
        },
        "speed recorded",
    )
}

#[get("/ultima_temperatura")]
pub fn latest_temperature(store: &State<Arc<ReadingStore>>) -> ApiResult {
    latest(store, Collection::Temperature, "no temperature reading")
}

#[get("/ultima_humidade")]
pub fn latest_humidity(store: &State<Arc<ReadingStore>>) -> ApiResult {
    latest(store, Collection::Humidity, "no humidity reading")
}

#[get("/ultima_velocidade")]
pub fn latest_speed(store: &State<Arc<ReadingStore>>) -> ApiResult {
    latest(store, Collection::Speed, "no speed reading")
}

#[get("/ultima_temperatura_cupula")]
pub fn latest_dome_temperature(store: &State<Arc<ReadingStore>>) -> ApiResult {
    latest(
        store,
        Collection::DomeTemperature,
        "no dome temperature reading",
    )
}
