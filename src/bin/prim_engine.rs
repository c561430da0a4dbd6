use chrono::Duration;
use prim_engine::auth::JwtKeys;
use prim_engine::errors::{ServiceError, ServiceResult};
use prim_engine::{Config, Server};
use std::env;

const USAGE: &str = "usage: prim_engine [serve | token <subject> [project_id] [ttl_hours]]";

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = env::args().skip(1).collect();
    let result = match args.first().map(String::as_str) {
        None | Some("serve") => serve().await,
        Some("token") => mint_token(&args[1..]),
        Some(_) => {
            eprintln!("{}", USAGE);
            std::process::exit(2);
        }
    };

    if let Err(e) = result {
        log::error!("[MAIN] {}", e);
        std::process::exit(1);
    }
}

async fn serve() -> ServiceResult<()> {
    let config = Config::from_env()?;
    Server::new(config).await?.run().await
}

/// Print a bearer token for `subject`, optionally bound to a project
fn mint_token(args: &[String]) -> ServiceResult<()> {
    let subject = args
        .first()
        .ok_or_else(|| ServiceError::Configuration(USAGE.to_string()))?;
    let project_id = args
        .get(1)
        .map(|raw| raw.parse::<i64>())
        .transpose()
        .map_err(|_| ServiceError::Configuration("project_id must be an integer".to_string()))?;
    let ttl_hours = args
        .get(2)
        .map(|raw| raw.parse::<i64>())
        .transpose()
        .map_err(|_| ServiceError::Configuration("ttl_hours must be an integer".to_string()))?
        .unwrap_or(24);

    let config = Config::from_env()?;
    let keys = JwtKeys::new(&config.jwt_secret)?;
    let (token, expires_at) = keys.generate_token(subject, project_id, Duration::hours(ttl_hours))?;

    println!("{}", token);
    log::info!("[MAIN] Token for {} expires at {}", subject, expires_at.to_rfc3339());
    Ok(())
}
