// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the fieldlogger-bridge project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see the license field in Cargo.toml).

//! Conveyor and relay control routes
//!
//! Status codes: 400 for an invalid state or an interlock rejection, 500 for
//! any field device failure.

use log::error;
use rocket::http::Status;
use rocket::serde::json::{json, Json};
use rocket::{get, post, State};

use super::server::{api_error, ApiError, ApiResult};
use crate::control::{ActuationError, ActuatorState, ClimateRelays, InterlockedActuator};
use crate::modbus::TransportFailure;

/// Controllers shared by the control routes
pub struct Controls {
    pub actuator: InterlockedActuator,
    pub relays: ClimateRelays,
}

fn parse_state(state: &str) -> Result<ActuatorState, ApiError> {
    state
        .parse()
        .map_err(|e: crate::control::InvalidState| api_error(Status::BadRequest, e.to_string()))
}

fn device_error(e: TransportFailure) -> ApiError {
    error!("{}", e);
    api_error(Status::InternalServerError, e.to_string())
}

/// Switch the conveyor on or off through the interlocks
#[post("/luz_verde/<state>")]
pub async fn set_conveyor(controls: &State<Controls>, state: &str) -> ApiResult {
    let desired = parse_state(state)?;
    match controls.actuator.set_state(desired).await {
        Ok(state) => Ok(Json(json!({
            "status": format!("conveyor switched {}", state)
        }))),
        Err(ActuationError::Rejected(reason)) => {
            Err(api_error(Status::BadRequest, reason.to_string()))
        }
        Err(ActuationError::Transport(e)) => Err(device_error(e)),
    }
}

#[get("/luz_verde/status")]
pub async fn conveyor_status(controls: &State<Controls>) -> ApiResult {
    match controls.actuator.state().await {
        Ok(state) => Ok(Json(json!({ "estado": state }))),
        Err(e) => {
            error!("Cannot read conveyor state: {}", e);
            Err(api_error(
                Status::InternalServerError,
                "cannot read conveyor state",
            ))
        }
    }
}

#[post("/relay_temp/<state>")]
pub async fn set_fan(controls: &State<Controls>, state: &str) -> ApiResult {
    let desired = parse_state(state)?;
    controls.relays.set_fan(desired).await.map_err(device_error)?;
    Ok(Json(json!({ "status": format!("fan switched {}", desired) })))
}

#[post("/relay_hum/<state>")]
pub async fn set_humidifier(controls: &State<Controls>, state: &str) -> ApiResult {
    let desired = parse_state(state)?;
    controls
        .relays
        .set_humidifier(desired)
        .await
        .map_err(device_error)?;
    Ok(Json(json!({
        "status": format!("humidifier switched {}", desired)
    })))
}

#[post("/escrever_registro/<address>/<value>")]
pub async fn write_register(controls: &State<Controls>, address: u16, value: u16) -> ApiResult {
    controls
        .relays
        .write_register(address, value)
        .await
        .map_err(device_error)?;
    Ok(Json(json!({
        "status": format!("register {} set to {}", address, value)
    })))
}
