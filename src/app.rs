use anyhow::Context;
use axum::Router;
use bookshelf_kernel::{settings::Settings, InitCtx, ModuleRegistry};
use sqlx::SqlitePool;

use crate::modules;

/// A fully bootstrapped application: modules initialized, tables in place
pub struct App {
    settings: Settings,
    pool: SqlitePool,
    registry: ModuleRegistry,
}

impl App {
    /// Connect to the database, register modules, create tables and start modules
    pub async fn bootstrap(settings: Settings) -> anyhow::Result<Self> {
        tracing::info!(
            env = ?settings.environment,
            db = %settings.database.url,
            "bookshelf bootstrap starting"
        );

        let pool = bookshelf_db::connect(&settings.database).await?;

        let mut registry = ModuleRegistry::new();
        modules::register_all(&mut registry, &pool).context("failed to register modules")?;

        let ctx = InitCtx {
            settings: &settings,
        };
        registry.init_all(&ctx).await?;

        bookshelf_db::apply_migrations(&pool, &registry.collect_migrations())
            .await
            .context("failed to create tables")?;

        registry.start_all(&ctx).await?;

        tracing::info!(
            modules = registry.module_count(),
            "bookshelf bootstrap complete"
        );

        Ok(Self {
            settings,
            pool,
            registry,
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// The complete HTTP router, middlewares included
    pub fn router(&self) -> Router {
        bookshelf_http::build_router(&self.registry, &self.settings)
    }

    /// Serve HTTP until a shutdown signal, then stop modules and close the pool
    pub async fn serve(self) -> anyhow::Result<()> {
        let served = bookshelf_http::start_server(&self.registry, &self.settings).await;
        self.shutdown().await?;
        served
    }

    pub async fn shutdown(self) -> anyhow::Result<()> {
        self.registry.stop_all().await?;
        self.pool.close().await;
        tracing::info!("bookshelf shut down");
        Ok(())
    }
}

/// Bootstrap and serve
pub async fn run(settings: Settings) -> anyhow::Result<()> {
    App::bootstrap(settings).await?.serve().await
}

/// Create the tables every module needs, then exit
pub async fn init_db(settings: Settings) -> anyhow::Result<()> {
    let app = App::bootstrap(settings).await?;
    tracing::info!(db = %app.settings().database.url, "database initialized");
    app.shutdown().await
}
