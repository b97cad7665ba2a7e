//! `folio login | register | logout | whoami`.

use folio_domain::config::Config;
use folio_session::{RestoreOutcome, SessionManager, SessionState, SessionStatus};
use tokio_util::sync::CancellationToken;

use super::read_password;

pub async fn login(config: &Config, email: &str) -> anyhow::Result<()> {
    let manager = SessionManager::from_config(config)?;
    let password = read_password("Password: ")?;

    let user = manager.sign_in(email, &password).await?;
    tracing::info!(user_id = %user.id, "signed in");
    println!("Signed in as {}", user.email.as_deref().unwrap_or(email));
    Ok(())
}

pub async fn register(
    config: &Config,
    email: &str,
    display_name: Option<&str>,
) -> anyhow::Result<()> {
    let manager = SessionManager::from_config(config)?;
    let password = read_password("Choose a password: ")?;

    let user = manager.sign_up(email, &password, display_name).await?;
    tracing::info!(user_id = %user.id, "account created");
    println!("Account created; signed in as {}", user.email.as_deref().unwrap_or(email));
    Ok(())
}

pub async fn logout(config: &Config) -> anyhow::Result<()> {
    let manager = SessionManager::from_config(config)?;
    let cleared = manager.sign_out().await;
    println!("Signed out");
    cleared?;
    Ok(())
}

/// Run session restoration. Ctrl-C cancels it without touching the session.
pub async fn whoami(config: &Config, json: bool) -> anyhow::Result<()> {
    let manager = SessionManager::from_config(config)?;

    let cancel = CancellationToken::new();
    let watcher = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("received SIGINT, cancelling session restore");
                cancel.cancel();
            }
        })
    };

    let outcome = manager.restore_session(&cancel).await;
    watcher.abort();

    let state = match outcome {
        RestoreOutcome::Completed(state) => state,
        RestoreOutcome::Cancelled => anyhow::bail!("session restore cancelled"),
    };

    if json {
        let value = serde_json::json!({
            "status": state.status(),
            "user": state.user,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        println!("{}", describe(&state));
    }
    Ok(())
}

fn describe(state: &SessionState) -> String {
    let email = state
        .user
        .as_ref()
        .and_then(|u| u.email.as_deref())
        .unwrap_or("<unknown email>");
    match (state.status(), &state.user) {
        (SessionStatus::Authenticated, Some(user)) => format!("{email} (id {})", user.id),
        (SessionStatus::Degraded, _) => {
            format!("{email} (profile unavailable; stored credentials kept)")
        }
        (SessionStatus::Initializing, _) => "Session not restored yet".into(),
        _ => "Not signed in".into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_session::User;

    #[test]
    fn describes_each_status() {
        let signed_in = SessionState::signed_in(User::new("u1", Some("a@b.com".into())));
        assert_eq!(describe(&signed_in), "a@b.com (id u1)");

        let degraded = SessionState::signed_in(User::unresolved(Some("a@b.com".into())));
        assert!(describe(&degraded).contains("profile unavailable"));

        assert_eq!(describe(&SessionState::signed_out()), "Not signed in");
        assert_eq!(describe(&SessionState::initial()), "Session not restored yet");
    }
}
