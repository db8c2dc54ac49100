use crate::config::Config;
use anyhow::{bail, Context, Result};
use serde_json::Value;
use std::path::Path;

use super::args::StatusCliArgs;

pub async fn handle_status_command(args: StatusCliArgs, config_path: Option<&Path>) -> Result<()> {
    let base = match args.url {
        Some(url) => url,
        None => {
            let config = Config::load(config_path)?;
            format!("http://127.0.0.1:{}", config.server.port)
        }
    };
    let url = format!("{}/status", base.trim_end_matches('/'));

    let response = reqwest::get(&url)
        .await
        .with_context(|| format!("Failed to reach recwatch at {} (is the service running?)", url))?;

    if !response.status().is_success() {
        bail!("Status request failed: {}", response.status());
    }

    let status: Value = response
        .json()
        .await
        .context("Failed to parse status response")?;

    print_status(&status);
    Ok(())
}

fn print_status(status: &Value) {
    let recording = status["isRecording"].as_bool().unwrap_or(false);
    let remote = status["remoteSinkEnabled"].as_bool().unwrap_or(false);

    println!();
    println!("Recording:       {}", if recording { "yes" } else { "no" });
    if let Some(active) = status["activeSession"].as_object() {
        println!(
            "Active session:  {} (since {})",
            active.get("filename").and_then(Value::as_str).unwrap_or("?"),
            active.get("startedAt").and_then(Value::as_str).unwrap_or("?")
        );
    }
    println!("Drive upload:    {}", if remote { "enabled" } else { "disabled" });
    println!(
        "Processed:       {}",
        status["processedCount"].as_u64().unwrap_or(0)
    );

    if let Some(in_flight) = status["inFlight"].as_array() {
        if !in_flight.is_empty() {
            println!("In flight:");
            for name in in_flight.iter().filter_map(Value::as_str) {
                println!("  {}", name);
            }
        }
    }

    if let Some(outcome) = status["lastOutcome"].as_object() {
        let uploaded = outcome
            .get("remote")
            .and_then(|r| r.get("id"))
            .and_then(Value::as_str)
            .unwrap_or("not uploaded");
        println!(
            "Last outcome:    {} (converted: {}, drive: {})",
            outcome.get("filename").and_then(Value::as_str).unwrap_or("?"),
            outcome.get("converted").and_then(Value::as_bool).unwrap_or(false),
            uploaded
        );
    }

    if let Some(lost) = status["lostSessions"].as_array() {
        if !lost.is_empty() {
            println!();
            println!("Lost sessions (NOT processed):");
            for session in lost {
                println!(
                    "  {} (started {}, lost {})",
                    session["filename"].as_str().unwrap_or("?"),
                    session["startedAt"].as_str().unwrap_or("?"),
                    session["detectedAt"].as_str().unwrap_or("?")
                );
            }
        }
    }
}
