use std::{future::IntoFuture, process, sync::Arc};

use scrivo::{
    application::{
        accounts::{AccountService, AvatarStore},
        comments::CommentService,
        error::AppError,
        posts::PostService,
        repos::{
            CommentsRepo, CommentsWriteRepo, PostsRepo, PostsWriteRepo, StatsRepo, UsersRepo,
            UsersWriteRepo,
        },
        sentiment::SentimentService,
        stats::StatsService,
        tokens::TokenService,
    },
    cache::{CacheConfig, CacheGate},
    config,
    infra::{
        classifier::classifier_state,
        db::PostgresRepositories,
        error::InfraError,
        http::{self, AppState},
        telemetry,
        uploads::UploadStorage,
    },
};
use sqlx::PgPool;
use tokio::sync::watch;
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Migrate(_) => run_migrate(settings).await,
    }
}

async fn run_migrate(settings: config::Settings) -> Result<(), AppError> {
    let pool = init_pool(&settings).await?;
    info!(target = "scrivo::migrate", "migrations applied");
    pool.close().await;
    Ok(())
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let pool = init_pool(&settings).await?;
    let repositories = Arc::new(PostgresRepositories::new(pool));
    let state = build_app_state(repositories, &settings)?;
    serve_http(&settings, state).await
}

/// Connect and bring the schema up to date.
async fn init_pool(settings: &config::Settings) -> Result<PgPool, AppError> {
    let database_url = settings
        .database
        .url
        .as_ref()
        .ok_or_else(|| InfraError::configuration("database url is not configured"))?;

    let pool = PostgresRepositories::connect(database_url, &settings.database)
        .await
        .map_err(|err| InfraError::database(err.to_string()))?;

    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(InfraError::from)?;

    Ok(pool)
}

fn build_app_state(
    repositories: Arc<PostgresRepositories>,
    settings: &config::Settings,
) -> Result<AppState, AppError> {
    let users_repo: Arc<dyn UsersRepo> = repositories.clone();
    let users_write_repo: Arc<dyn UsersWriteRepo> = repositories.clone();
    let posts_repo: Arc<dyn PostsRepo> = repositories.clone();
    let posts_write_repo: Arc<dyn PostsWriteRepo> = repositories.clone();
    let comments_repo: Arc<dyn CommentsRepo> = repositories.clone();
    let comments_write_repo: Arc<dyn CommentsWriteRepo> = repositories.clone();
    let stats_repo: Arc<dyn StatsRepo> = repositories;

    let uploads = Arc::new(
        UploadStorage::new(
            settings.uploads.directory.clone(),
            settings.uploads.public_prefix.clone(),
        )
        .map_err(InfraError::from)?,
    );
    let avatars: Arc<dyn AvatarStore> = uploads.clone();

    let tokens = TokenService::new(settings.auth.secret_key.as_bytes(), settings.auth.token_ttl);
    let cache = CacheGate::in_memory(CacheConfig::from(&settings.cache));

    let max_request_bytes = usize::try_from(settings.uploads.max_request_bytes.get())
        .map_err(|_| InfraError::configuration("uploads.max_request_bytes exceeds usize"))?;

    Ok(AppState {
        accounts: AccountService::new(users_repo.clone(), users_write_repo, avatars, tokens),
        posts: PostService::new(
            posts_repo.clone(),
            posts_write_repo,
            users_repo,
            cache.clone(),
        ),
        comments: CommentService::new(posts_repo, comments_repo, comments_write_repo),
        stats: StatsService::new(stats_repo),
        sentiment: SentimentService::new(classifier_state(&settings.classifier)),
        uploads,
        cache,
        max_request_bytes,
    })
}

async fn serve_http(settings: &config::Settings, state: AppState) -> Result<(), AppError> {
    let router = http::build_router(state);
    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(InfraError::from)?;

    info!(
        target = "scrivo::serve",
        addr = %settings.server.addr,
        "listening"
    );

    let (stop_tx, mut stop_rx) = watch::channel(false);
    let server = axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(async move {
            let _ = stop_rx.wait_for(|stop| *stop).await;
        })
        .into_future();
    tokio::pin!(server);

    tokio::select! {
        result = &mut server => {
            return result.map_err(|err| AppError::unexpected(format!("server error: {err}")));
        }
        () = shutdown_signal() => {}
    }

    let grace = settings.server.graceful_shutdown;
    info!(
        target = "scrivo::serve",
        grace_seconds = grace.as_secs(),
        "shutdown requested; draining in-flight requests"
    );
    let _ = stop_tx.send(true);

    match tokio::time::timeout(grace, server).await {
        Ok(result) => result.map_err(|err| AppError::unexpected(format!("server error: {err}"))),
        Err(_) => {
            warn!(
                target = "scrivo::serve",
                "graceful shutdown window elapsed; dropping remaining connections"
            );
            Ok(())
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
