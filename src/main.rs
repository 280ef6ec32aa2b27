use std::net::SocketAddr;

use chrono::Utc;
use migration::MigratorTrait;
use oauth2_server::config::Config;
use oauth2_server::db::Store;
use oauth2_server::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env
    dotenvy::dotenv().ok();

    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "oauth2_server=debug,tower_http=debug".into());
    if std::env::var("LOG_FORMAT").is_ok_and(|f| f == "json") {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    // Load config
    let config = Config::from_env()?;

    // Connect to database
    let db = oauth2_server::db::pool::connect(&config.database_url).await?;
    tracing::info!("Connected to database");

    // Run migrations
    migration::Migrator::up(&db, None).await?;
    tracing::info!("Migrations applied");

    let state = AppState::new(Store::relational(db), config.clone())?;

    let args: Vec<String> = std::env::args().collect();
    match args.get(1).map(String::as_str) {
        // cargo run -- seed <tenant> [redirect_uri]
        Some("seed") => {
            let tenant_id = args.get(2).map(String::as_str).unwrap_or("accounts");
            let redirect_uri = args
                .get(3)
                .map(String::as_str)
                .unwrap_or("http://localhost:3000/callback");

            println!("=== Tenant Bootstrap ===\n");
            let result = oauth2_server::seed::bootstrap(&state, tenant_id, redirect_uri).await?;

            if result.tenant_created {
                println!("Created tenant: {}", result.tenant_id);
            } else {
                println!("Tenant {} already exists.", result.tenant_id);
            }
            println!("  Service account: {}", result.service_account_id);
            println!("  Client ID: {}", result.client_id);
            if let Some(ref secret) = result.client_secret {
                println!("  Client Secret: {}", secret);
                println!("  (Save this secret, it won't be shown again!)");
            } else {
                println!("  Default client already exists.");
            }
            println!("\n=== Bootstrap complete ===");
            return Ok(());
        }
        // cargo run -- rotate-key <tenant>
        Some("rotate-key") => {
            let tenant_id = args.get(2).ok_or("usage: rotate-key <tenant>")?;
            if state.store.tenants.find(tenant_id).await?.is_none() {
                return Err(format!("unknown tenant: {tenant_id}").into());
            }
            let key = state.keys.rotate(tenant_id, Utc::now()).await?;
            println!("New active key for {tenant_id}: {}", key.kid);
            return Ok(());
        }
        Some(other) => return Err(format!("unknown command: {other}").into()),
        None => {}
    }

    // Build router
    let app = oauth2_server::routes::create_router(state);

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.server_host, config.server_port).parse()?;

    tracing::info!("Starting server on {addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
