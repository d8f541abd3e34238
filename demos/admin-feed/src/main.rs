use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tracing_subscriber::EnvFilter;
use vigil::prelude::*;

// ---------------------------------------------------------------------------
// Accounts
// ---------------------------------------------------------------------------

fn seed_directory() -> (InMemoryDirectory, String, String) {
    let directory = InMemoryDirectory::new();
    directory.insert(Account {
        id: AccountId(1),
        user_name: "admin".into(),
        role: Role::Admin,
    });
    directory.insert(Account {
        id: AccountId(2),
        user_name: "player".into(),
        role: Role::User,
    });

    let admin = directory.issue_session(AccountId(1)).unwrap_or_default();
    let player = directory.issue_session(AccountId(2)).unwrap_or_default();
    (directory, admin, player)
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,vigil=debug")),
        )
        .init();

    let bind = std::env::var("VIGIL_BIND").unwrap_or_else(|_| "0.0.0.0:8080".into());
    let (directory, admin, player) = seed_directory();

    let server = HubServerBuilder::new()
        .bind(&bind)
        .build(SessionOracle::new(directory))
        .await?;
    let addr = server.local_addr()?;
    let feed = server.feed();

    eprintln!("admin feed listening on ws://{addr}/hub/admin");
    eprintln!("  admin  (accepted): Cookie: GZCTF_Token={admin}");
    eprintln!("  player (rejected): Cookie: GZCTF_Token={player}");

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(5));
        let mut n: u64 = 0;
        loop {
            ticker.tick().await;
            n += 1;
            let log = LogMessage {
                time: now_millis(),
                name: Some("system".into()),
                ip: None,
                msg: format!("heartbeat #{n}"),
                status: Some("OK".into()),
                level: LogLevel::Information,
            };
            match feed.push_log(log).await {
                Ok(delivered) => tracing::debug!(n, delivered, "heartbeat pushed"),
                Err(e) => tracing::warn!(error = %e, "heartbeat push failed"),
            }
        }
    });

    server.run().await?;
    Ok(())
}
