//! MfgDesk notification client - terminal entry point
//!
//! Connects with `MFGDESK_TOKEN`, prints every toast the store raises and
//! exits on Ctrl-C.

use std::sync::Arc;

use anyhow::Context;
use futures_util::StreamExt;
use mfgdesk_client::logging::init_tracing;
use mfgdesk_client::{
    ApiClient, ChannelToasts, ClientConfig, Credential, NotificationSession, ToastLevel,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing("mfgdesk_client=info");

    let config = ClientConfig::from_env();
    config.validate().context("invalid configuration")?;

    let credential = std::env::var("MFGDESK_TOKEN")
        .ok()
        .filter(|t| !t.trim().is_empty())
        .map(Credential::new);
    if credential.is_none() {
        mfgdesk_client::log_warn!("MFGDESK_TOKEN not set, waiting without a session");
    }

    let api = ApiClient::new().with_base_url(config.api_base_url.clone());
    let (toasts, mut shown) = ChannelToasts::channel();
    let session =
        NotificationSession::start(config, Arc::new(api), Arc::new(toasts), credential).await;

    let state = session.store().snapshot();
    println!("{} notifications, {} unread", state.len(), state.unread_count());
    for event in state.recent(5) {
        let marker = if event.read { ' ' } else { '*' };
        println!("{marker} {}  {}", event.created_at.format("%Y-%m-%d %H:%M"), event.title);
    }

    loop {
        tokio::select! {
            toast = shown.next() => {
                let Some(toast) = toast else { break };
                let tag = match toast.level {
                    ToastLevel::Info => "notice",
                    ToastLevel::Error => "error",
                };
                match toast.link {
                    Some(link) => println!("[{tag}] {}: {} ({link})", toast.title, toast.message),
                    None => println!("[{tag}] {}: {}", toast.title, toast.message),
                }
            }
            signal = tokio::signal::ctrl_c() => {
                signal.context("failed to listen for Ctrl-C")?;
                break;
            }
        }
    }

    mfgdesk_client::log_info!("Shutting down");
    session.shutdown().await;
    Ok(())
}
