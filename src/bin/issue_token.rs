use clap::Parser;
use dotenvy::dotenv;
use rust_media_backend::config::IngestConfig;
use rust_media_backend::utils::auth::create_jwt;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

/// Mint a bearer token for local testing of the upload endpoints
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Subject the token is issued to (random when omitted)
    #[arg(short, long)]
    user_id: Option<Uuid>,

    /// Token lifetime in minutes
    #[arg(short, long, default_value_t = 60)]
    ttl_minutes: i64,
}

fn main() -> anyhow::Result<()> {
    dotenv().ok();
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "issue_token=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = IngestConfig::from_env();
    if config.jwt_secret == IngestConfig::default().jwt_secret {
        warn!("⚠️  JWT_SECRET is not set, signing with the insecure default");
    }

    let user_id = args.user_id.unwrap_or_else(Uuid::new_v4);
    let token = create_jwt(
        &user_id.to_string(),
        &config.jwt_secret,
        chrono::Duration::minutes(args.ttl_minutes),
    )?;

    info!("🔑 Issued token for user {} ({} min)", user_id, args.ttl_minutes);
    println!("{}", token);
    Ok(())
}
