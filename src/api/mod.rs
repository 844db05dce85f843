// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the fieldlogger-bridge project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see the license field in Cargo.toml).

//! HTTP ingestion and control server
//!
//! Built on Rocket. The same server receives readings (from the local pollers
//! when `ingestion.target` is `http`, or from other producers), answers
//! latest-reading queries and exposes conveyor and relay control.
//!
//! ## Routes
//!
//! | Method | Path | Purpose |
//! |---|---|---|
//! | POST | `/status_logger` | device reachability |
//! | POST | `/temperatura_logger`, `/humidade_logger`, `/temperatura_cupula` | analog readings |
//! | POST | `/contador_unidades_logger`, `/contador_unidades_logger_grandes` | part counts |
//! | POST | `/velocidade_logger` | conveyor speed |
//! | GET | `/ultima_temperatura`, `/ultima_humidade`, `/ultima_velocidade`, `/ultima_temperatura_cupula` | latest reading |
//! | POST | `/luz_verde/<on\|off>` | interlocked conveyor command |
//! | GET | `/luz_verde/status` | conveyor output state |
//! | POST | `/relay_temp/<on\|off>`, `/relay_hum/<on\|off>` | climate relays |
//! | POST | `/escrever_registro/<address>/<value>` | raw register write |

pub mod control;
pub mod ingest;
pub mod server;

pub use control::Controls;
pub use server::build_rocket;
