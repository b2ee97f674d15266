use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use yatube::auth::session;
use yatube::config::{Cli, Command, Config};
use yatube::db::groups::{self, NewGroup};
use yatube::db::{self, users};
use yatube::media::LocalMediaStore;
use yatube::routes;
use yatube::state::{AppState, DbPool};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Parse CLI args and load config
    let cli = Cli::parse();
    let data_dir = Config::data_dir(&cli)?;
    std::fs::create_dir_all(&data_dir)?;
    tracing::info!("Data directory: {}", data_dir.display());

    let config = Config::load(&cli)?;

    // Initialize database
    let pool = db::create_pool(&config.db_path())?;
    db::run_migrations(&pool)?;

    match cli.command.clone().unwrap_or(Command::Serve) {
        Command::Serve => serve(pool, config).await,
        Command::CreateUser { username, password } => create_user(&pool, &username, &password),
        Command::CreateGroup {
            slug,
            title,
            description,
        } => create_group(
            &pool,
            NewGroup {
                title,
                slug,
                description,
            },
        ),
        Command::DeleteGroup { slug } => delete_group(&pool, &slug),
    }
}

async fn serve(pool: DbPool, config: Config) -> anyhow::Result<()> {
    // Ensure uploads directory exists
    let uploads = config.uploads_path();
    std::fs::create_dir_all(&uploads)?;

    {
        let conn = pool.get()?;
        let purged = session::purge_expired(&conn)?;
        if purged > 0 {
            tracing::info!("Purged {} expired sessions", purged);
        }
    }

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let state = AppState::new(pool, config, Arc::new(LocalMediaStore::new(uploads)));
    let app = routes::app(state);

    tracing::info!("Listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn create_user(pool: &DbPool, username: &str, password: &str) -> anyhow::Result<()> {
    yatube::auth::handlers::validate_username(username).map_err(anyhow::Error::msg)?;

    let conn = pool.get()?;
    if users::find_by_username(&conn, username)?.is_some() {
        anyhow::bail!("User {} already exists", username);
    }

    let hash = bcrypt::hash(password, bcrypt::DEFAULT_COST)?;
    let user = users::create(&conn, username, Some(&hash))?;
    tracing::info!("Created user {} (id {})", user.username, user.id);
    Ok(())
}

fn create_group(pool: &DbPool, group: NewGroup) -> anyhow::Result<()> {
    group.validate().map_err(anyhow::Error::msg)?;

    let conn = pool.get()?;
    if groups::find_by_slug(&conn, &group.slug)?.is_some() {
        anyhow::bail!("Group {} already exists", group.slug);
    }

    let created = groups::create(&conn, &group)?;
    tracing::info!("Created group {} ({})", created.title, created.slug);
    Ok(())
}

fn delete_group(pool: &DbPool, slug: &str) -> anyhow::Result<()> {
    let conn = pool.get()?;
    let group = groups::find_by_slug(&conn, slug)?
        .ok_or_else(|| anyhow::anyhow!("No group with slug {}", slug))?;

    groups::delete(&conn, group.id)?;
    tracing::info!("Deleted group {}; its posts no longer belong to a group", slug);
    Ok(())
}
