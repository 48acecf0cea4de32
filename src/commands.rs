use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::Serialize;

use crate::cli::Command;
use crate::config::{
    default_config_dir, ClientConfigBuilder, JsonFileConfigStore, SESSION_NAMESPACE,
};
use crate::cookie::CookieStore;
use crate::prompt::InquirePrompt;
use crate::AtCoder;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Runs one command. `Ok(false)` means it completed but did not succeed
/// (a rejected login).
pub async fn run(command: Command) -> Result<bool> {
    match command {
        Command::Login { username } => {
            let atcoder = client(username)?;
            let accepted = atcoder.login(None).await?;
            println!("{accepted}");
            Ok(accepted)
        }
        Command::Logout => {
            client(None)?.logout().await?;
            println!("login session aborted.");
            Ok(true)
        }
        Command::Session => {
            let atcoder = client(None)?;
            println!("check login status...");
            println!("{}", atcoder.check_session(false).await?);
            Ok(true)
        }
        Command::Contest { contest_id } => {
            let atcoder = logged_in_client().await?;
            print_json(&atcoder.contest(&contest_id).await?)?;
            Ok(true)
        }
        Command::Tasks { contest_id } => {
            let atcoder = logged_in_client().await?;
            print_json(&atcoder.tasks(&contest_id).await?)?;
            Ok(true)
        }
        Command::Task {
            contest_id,
            task_id,
        } => {
            let atcoder = logged_in_client().await?;
            print_json(&atcoder.task(&contest_id, &task_id).await?)?;
            Ok(true)
        }
        Command::Url { contest, task } => {
            let atcoder = client(None)?;
            let url = match (contest, task) {
                (Some(contest), Some(task)) => atcoder.task_url(&contest, &task),
                (Some(contest), None) => atcoder.contest_url(&contest),
                _ => atcoder.base_url().to_string(),
            };
            println!("{url}");
            Ok(true)
        }
        Command::ConfigDir => {
            println!("{}", default_config_dir()?.display());
            Ok(true)
        }
    }
}

fn client(username: Option<String>) -> Result<AtCoder> {
    let store = JsonFileConfigStore::open_default(SESSION_NAMESPACE)?;
    let cookies = CookieStore::load(Arc::new(store.clone()))
        .with_context(|| format!("failed to read session from {}", store.path().display()))?;
    let config = ClientConfigBuilder::default()
        .timeout(REQUEST_TIMEOUT)
        .build()?;
    let prompt = Arc::new(InquirePrompt::new(username));
    Ok(AtCoder::from_config(&config, cookies, prompt)?)
}

async fn logged_in_client() -> Result<AtCoder> {
    let atcoder = client(None)?;
    if !atcoder.check_session(false).await? && !atcoder.login(None).await? {
        bail!("login failed");
    }
    Ok(atcoder)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
