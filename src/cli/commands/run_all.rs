//! Run-all command: one child process per configured site crawler.
//!
//! Mirrors running each site crawler by hand in separate terminals: output
//! is streamed with a `[site]` prefix, Ctrl-C terminates every child, and
//! the aggregate exit status is non-zero if any sub-run failed.

use std::path::Path;
use std::process::Stdio;

use anyhow::{bail, Context};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;

use crate::adapters::known_sites;
use crate::config::Settings;

/// Run every configured site crawler as a separate concurrent process.
pub async fn cmd_run_all(
    settings: &Settings,
    data_dir: Option<&Path>,
    start_page: Option<u32>,
    end_page: Option<u32>,
) -> anyhow::Result<()> {
    let sites: Vec<&str> = known_sites()
        .iter()
        .copied()
        .filter(|site| settings.sites.contains_key(*site))
        .collect();
    if sites.is_empty() {
        bail!("no sites configured");
    }

    let exe = std::env::current_exe().context("locating own executable")?;

    let mut abort_handles = Vec::new();
    let mut waiters = Vec::new();

    for site in &sites {
        let mut command = Command::new(&exe);
        command.arg("crawl").arg(site);
        if let Some(dir) = data_dir {
            command.arg("--data-dir").arg(dir);
        }
        if let Some(start) = start_page {
            command.arg("--start-page").arg(start.to_string());
        }
        if let Some(end) = end_page {
            command.arg("--end-page").arg(end.to_string());
        }
        command
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = command
            .spawn()
            .with_context(|| format!("spawning crawler for {site}"))?;

        if let Some(stdout) = child.stdout.take() {
            stream_output(site.to_string(), stdout);
        }
        if let Some(stderr) = child.stderr.take() {
            stream_output(site.to_string(), stderr);
        }

        let site = site.to_string();
        let waiter = tokio::spawn(async move {
            let code = child
                .wait()
                .await
                .map(|status| status.code().unwrap_or(-1))
                .unwrap_or(-1);
            (site, code)
        });
        abort_handles.push(waiter.abort_handle());
        waiters.push(waiter);
    }

    let results = tokio::select! {
        results = futures::future::join_all(waiters) => results,
        _ = tokio::signal::ctrl_c() => {
            eprintln!("\nInterrupt received. Terminating crawlers...");
            // Aborting the waiters drops the children, which are configured
            // to be killed on drop.
            for handle in &abort_handles {
                handle.abort();
            }
            std::process::exit(130);
        }
    };

    let exit_codes: Vec<(String, i32)> = results
        .into_iter()
        .map(|result| result.unwrap_or_else(|_| ("unknown".to_string(), -1)))
        .collect();

    println!("\nSummary:");
    for (site, code) in &exit_codes {
        println!(" - {site}: exit code {code}");
    }

    if any_failed(&exit_codes) {
        bail!("one or more site crawlers failed");
    }
    Ok(())
}

/// Aggregate status: the run as a whole fails if any sub-run did.
fn any_failed(exit_codes: &[(String, i32)]) -> bool {
    exit_codes.iter().any(|(_, code)| *code != 0)
}

/// Forward a child stream line by line with a `[site]` prefix.
fn stream_output(site: String, reader: impl AsyncRead + Unpin + Send + 'static) {
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            println!("[{site}] {line}");
        }
    });
}
