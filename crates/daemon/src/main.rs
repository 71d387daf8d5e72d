// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! acd: the AgentCompany workspace daemon
//!
//! Usage: `acd <workspace> [--bind 127.0.0.1:7700]`
//! or `acd init <workspace> <name>` to lay down a fresh workspace.

use ac_daemon::{web, Controller};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

fn usage() -> ExitCode {
    eprintln!("usage: acd <workspace> [--bind ADDR]");
    eprintln!("       acd init <workspace> <name>");
    ExitCode::from(2)
}

#[tokio::main]
async fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();

    if args.first().map(String::as_str) == Some("init") {
        let (Some(root), Some(name)) = (args.get(1), args.get(2)) else {
            return usage();
        };
        return match Controller::init_workspace(&PathBuf::from(root), name) {
            Ok(()) => {
                println!("initialized workspace {name} at {root}");
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("init failed: {e}");
                ExitCode::FAILURE
            }
        };
    }

    let Some(root) = args.first() else {
        return usage();
    };
    let root = PathBuf::from(root);
    let mut bind = "127.0.0.1:7700".to_string();
    let mut iter = args.iter().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--bind" => match iter.next() {
                Some(addr) => bind = addr.clone(),
                None => return usage(),
            },
            _ => return usage(),
        }
    }

    let logs_dir = root.join(".local").join("logs");
    let _ = std::fs::create_dir_all(&logs_dir);
    let file_appender = tracing_appender::rolling::daily(&logs_dir, "acd.log");
    let (writer, _guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(writer)
        .with_ansi(false)
        .init();

    let controller = match Controller::open(&root) {
        Ok(controller) => controller,
        Err(e) => {
            eprintln!("failed to open workspace: {e}");
            return ExitCode::FAILURE;
        }
    };
    tracing::info!(workspace = %root.display(), bind = %bind, "acd starting");

    let listener = match tokio::net::TcpListener::bind(&bind).await {
        Ok(listener) => listener,
        Err(e) => {
            eprintln!("failed to bind {bind}: {e}");
            controller.shutdown();
            return ExitCode::FAILURE;
        }
    };
    println!("acd listening on http://{bind}");

    let app = web::router(controller.clone());
    let shutdown_controller = controller.clone();
    let serve = axum::serve(listener, app).with_graceful_shutdown(async move {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("shutdown requested");
        shutdown_controller.shutdown();
    });

    if let Err(e) = serve.await {
        eprintln!("server error: {e}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
