// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! ac-daemon: read-model snapshots, typed RPC surface, and the web/SSE
//! layer over the orchestration core.

pub mod comments;
pub mod controller;
pub mod conversation;
pub mod rpc;
pub mod snapshot;
pub mod web;

pub use controller::{Controller, ControllerError};
pub use rpc::{dispatch, RpcError};
