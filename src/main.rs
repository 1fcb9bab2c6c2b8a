use roomcast::Server;
use std::env;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("roomcast=info")),
        )
        .init();

    let port: u16 = env::var("ROOMCAST_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(3001);

    let upload_dir =
        env::var("ROOMCAST_UPLOAD_DIR").unwrap_or_else(|_| "public/uploads".to_string());

    let upload_rate_limit = env::var("ROOMCAST_UPLOAD_RATE_LIMIT")
        .unwrap_or_else(|_| "10".to_string())
        .parse::<u32>()
        .expect("ROOMCAST_UPLOAD_RATE_LIMIT must be a valid number");

    let upload_rate_seconds = env::var("ROOMCAST_UPLOAD_RATE_SECONDS")
        .unwrap_or_else(|_| "60".to_string())
        .parse::<u64>()
        .expect("ROOMCAST_UPLOAD_RATE_SECONDS must be a valid number");

    let server = Server::new(upload_dir, upload_rate_limit, upload_rate_seconds, port);
    server.run().await
}
