// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! autoact core - durable action records and the dispatch queue.
//!
//! This crate is the shared foundation of autoact, a service that exposes a
//! small set of privileged remote operations behind an authenticated,
//! policy-gated API and tracks every invocation as a durable "Action".
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Callers (CLI, UI)                     │
//! └─────────────────────────────────────────────────────────────┘
//!                               │  HTTP
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       autoact-server                         │
//! │   Identity Resolver → Policy Gate → Action Lifecycle API     │
//! └─────────────────────────────────────────────────────────────┘
//!           │ create / cancel / read          │ enqueue
//!           ▼                                  ▼
//! ┌───────────────────────┐        ┌───────────────────────────┐
//! │   autoact-core        │◄───────│      autoact-worker       │
//! │   (this crate)        │  claim │  Task Execution Framework │
//! │   Store trait +       │        │  retries, metrics         │
//! │   SQLite / PostgreSQL │        └───────────────────────────┘
//! └───────────────────────┘
//! ```
//!
//! The API server and the worker run as separate processes with no shared
//! memory; they coordinate exclusively through the [`store::Store`]. Every
//! mutation bumps `updated_at`, and the only cross-process ordering the
//! system relies on is the conditional terminal write: exactly one of
//! SUCCESS, FAILURE, or CANCELLED ever lands on an action.

pub mod error;
pub mod migrations;
pub mod model;
pub mod store;

pub use error::{CoreError, Result};
pub use model::{ActionRecord, ActionStatus, DispatchRecord, UserRecord};
pub use store::{PostgresStore, SqliteStore, Store};
