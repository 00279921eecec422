use std::io::Write;
use std::sync::Arc;

use eyre::{Result, bail};
use tokio::io::{AsyncBufReadExt, BufReader};

use sqlagent_core::models::{QueryId, ThreadId};
use sqlagent_gateway::HttpGateway;
use sqlagent_session::{Explorer, HistoryState, ResultBody};

use crate::cli::Command;
use crate::config::{self, ExplorerConfig};
use crate::render;

pub async fn run(command: Command, config: ExplorerConfig) -> Result<()> {
    match command {
        Command::Configure {
            api_url,
            poll_interval,
            timeout,
            history_limit,
            log_json,
        } => configure(
            config,
            ExplorerConfig {
                api_base_url: api_url,
                poll_interval_secs: poll_interval,
                request_timeout_secs: timeout,
                history_limit,
                log_json,
                ..ExplorerConfig::default()
            },
        ),
        Command::Health => health(&config).await,
        Command::Ask { question, thread } => ask(&config, &question, thread).await,
        Command::History => history(&config).await,
        Command::Show { id } => show(&config, id).await,
        Command::Watch => watch(&config).await,
        Command::Chat => chat(&config).await,
    }
}

fn gateway(config: &ExplorerConfig) -> Result<HttpGateway> {
    Ok(HttpGateway::new(&config.gateway_config())?)
}

fn explorer(config: &ExplorerConfig) -> Result<Explorer<HttpGateway>> {
    let gateway = gateway(config)?;
    tracing::debug!(base_url = gateway.base_url(), "explorer ready");
    Ok(Explorer::with_poll_interval(
        Arc::new(gateway),
        config.poll_interval(),
    ))
}

fn configure(existing: ExplorerConfig, updated: ExplorerConfig) -> Result<()> {
    let config = ExplorerConfig {
        created_at: existing.created_at,
        ..updated
    };
    let path = config::save_config(&config)?;
    println!("saved {}", path.display());
    Ok(())
}

async fn health(config: &ExplorerConfig) -> Result<()> {
    let gateway = gateway(config)?;
    let status = gateway.health().await?;
    println!("{}: {status}", gateway.base_url());
    Ok(())
}

async fn ask(config: &ExplorerConfig, question: &str, thread: Option<String>) -> Result<()> {
    let explorer = explorer(config)?;
    if thread.is_some() {
        explorer.set_thread(thread.map(ThreadId::from)).await;
    }

    if let Err(e) = explorer.submit(question).await {
        eprintln!("{}", render::submission(&explorer.submission_phase().await));
        return Err(e.into());
    }
    print!("{}", render::result(&explorer.result_display().await));
    Ok(())
}

async fn history(config: &ExplorerConfig) -> Result<()> {
    let explorer = explorer(config)?;
    let state = explorer.history().refresh().await;
    print!("{}", render::history(&state, None));
    if let HistoryState::Error(e) = state {
        bail!(e);
    }
    Ok(())
}

async fn show(config: &ExplorerConfig, id: String) -> Result<()> {
    let explorer = explorer(config)?;
    explorer.select(QueryId::from(id)).await;
    let display = explorer.result_display().await;
    print!("{}", render::result(&display));
    if let ResultBody::Unavailable(e) = display.body {
        bail!(e);
    }
    Ok(())
}

async fn watch(config: &ExplorerConfig) -> Result<()> {
    let explorer = explorer(config)?;
    let state = explorer.mount_history().await;
    print!("{}", render::history(&state, None));
    // Subscribe after the mount so its own refresh is not printed twice.
    let mut changes = explorer.history_changes();

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    loop {
        tokio::select! {
            changed = changes.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = explorer.history_state().await;
                println!("── {} ──", jiff::Timestamp::now().strftime("%H:%M:%S"));
                print!("{}", render::history(&state, None));
            }
            _ = &mut ctrl_c => break,
        }
    }

    explorer.shutdown().await;
    Ok(())
}

const CHAT_HELP: &str = "/new  start a new conversation\n/history  list past queries\n/show ID  show one query\n/quit  leave";

async fn chat(config: &ExplorerConfig) -> Result<()> {
    let explorer = explorer(config)?;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    println!("{CHAT_HELP}");

    loop {
        print!("> ");
        std::io::stdout().flush()?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();

        match line.split_once(' ').unwrap_or((line, "")) {
            ("", _) => {}
            ("/quit", _) => break,
            ("/new", _) => {
                explorer.set_thread(None).await;
                println!("new conversation");
            }
            ("/history", _) => {
                let state = explorer.history().refresh().await;
                let selected = explorer.selected_id().await;
                print!("{}", render::history(&state, selected.as_ref()));
            }
            ("/show", id) if !id.trim().is_empty() => {
                explorer.select(QueryId::from(id.trim())).await;
                print!("{}", render::result(&explorer.result_display().await));
            }
            (cmd, _) if cmd.starts_with('/') => println!("{CHAT_HELP}"),
            _ => match explorer.submit(line).await {
                Ok(_) => print!("{}", render::result(&explorer.result_display().await)),
                Err(_) => println!("{}", render::submission(&explorer.submission_phase().await)),
            },
        }
    }

    explorer.shutdown().await;
    Ok(())
}
