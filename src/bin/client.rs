//! `cryptftp` - the encrypted-FTP client binary, an interactive menu shell.

use anyhow::Result;
use clap::Parser;
use cryptftp::client::Client;
use cryptftp::config::DEFAULT_SERVER_ADDR;
use cryptftp::types::MenuState;
use cryptftp::ui::prompt::{MenuAction, Prompt};
use cryptftp::ui::progress::ProgressBar;
use cryptftp::ui::{print_banner, show_error, show_listing, show_success};

/// Interactive client for an encrypted-FTP server.
#[derive(Parser)]
#[command(name = "cryptftp")]
#[command(version)]
pub struct Args {
    /// Address of the server to connect to.
    #[arg(short, long, default_value = DEFAULT_SERVER_ADDR)]
    server: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive("cryptftp=info".parse()?))
        .init();

    let args = Args::parse();
    print_banner();

    let prompt = Prompt::new();
    let secret = loop {
        match prompt.prompt_secret_for_login() {
            Ok(s) => break s,
            Err(e) => show_error(&format!("{e}")),
        }
    };

    let mut client = Client::connect(&args.server, secret.as_bytes()).await?;
    let mut state = MenuState::Unauth;

    loop {
        let action = match prompt.menu(&state) {
            Ok(a) => a,
            Err(e) => {
                show_error(&format!("{e}"));
                break;
            }
        };
        if matches!((&state, &action), (MenuState::Unauth, MenuAction::Quit)) {
            break;
        }
        if let Err(e) = handle(&mut client, &prompt, &mut state, action).await {
            tracing::warn!(error = %e, "command failed, resetting to unauthenticated menu");
            state = MenuState::Unauth;
            show_error(&format!("{e}"));
        }
    }

    client.quit().await?;
    Ok(())
}

async fn handle(client: &mut Client, prompt: &Prompt, state: &mut MenuState, action: MenuAction) -> Result<()> {
    match action {
        MenuAction::Register => {
            let username = prompt.prompt_username()?;
            client.register(&username).await?;
            show_success("registered and logged in");
            *state = MenuState::Auth;
        }
        MenuAction::Login => {
            let username = prompt.prompt_username()?;
            let reply = client.login(&username).await?;
            show_success(&reply.message);
            *state = MenuState::Auth;
        }
        MenuAction::List => {
            let entries = client.list().await?;
            show_listing(&entries);
        }
        MenuAction::Upload => {
            let remote = prompt.prompt_remote_path("Remote path")?;
            let local = prompt.prompt_local_path("Local file")?;
            let total = std::fs::metadata(&local)?.len();
            let bar = ProgressBar::new(total, "uploading")?;
            client.upload(&remote, &local).await?;
            bar.add(total);
            bar.finish();
            show_success("upload complete");
        }
        MenuAction::Download => {
            let remote = prompt.prompt_remote_path("Remote path")?;
            let local = prompt.prompt_local_path("Save as")?;
            let size = client.size(&remote).await.unwrap_or(0);
            let bar = ProgressBar::new(size, "downloading")?;
            client.download(&remote, &local).await?;
            bar.add(size);
            bar.finish();
            show_success("download complete");
        }
        MenuAction::Rename => {
            let from = prompt.prompt_remote_path("Rename from")?;
            let to = prompt.prompt_remote_path("Rename to")?;
            client.rename(&from, &to).await?;
            show_success("renamed");
        }
        MenuAction::Size => {
            let remote = prompt.prompt_remote_path("Remote path")?;
            let size = client.size(&remote).await?;
            show_success(&format!("{remote}: {size} bytes"));
        }
        MenuAction::Delete => {
            let remote = prompt.prompt_remote_path("Remote path")?;
            if prompt.confirm(&format!("Delete {remote}?"))? {
                client.delete(&remote).await?;
                show_success("deleted");
            }
        }
        MenuAction::Mkdir => {
            let remote = prompt.prompt_remote_path("New directory")?;
            client.mkdir(&remote).await?;
            show_success("directory created");
        }
        MenuAction::Rmdir => {
            let remote = prompt.prompt_remote_path("Directory to remove")?;
            if prompt.confirm(&format!("Remove {remote}?"))? {
                client.rmdir(&remote).await?;
                show_success("directory removed");
            }
        }
        MenuAction::Cwd => {
            let remote = prompt.prompt_remote_path("Change to")?;
            client.cwd(&remote).await?;
            show_success("directory changed");
        }
        MenuAction::Pwd => {
            let cwd = client.pwd().await?;
            show_success(&cwd);
        }
        MenuAction::Logout => {
            *state = MenuState::Unauth;
        }
        MenuAction::Quit => {}
    }
    Ok(())
}
