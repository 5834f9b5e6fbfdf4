use anyhow::Context;
use mathmatika::{
    AppConfig, AppState,
    api::routes,
    cli::{Cli, Commands, commands, output::Output},
    utils::config::ServerConfig,
};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse_args();
    let output = if cli.no_color {
        Output::no_color()
    } else {
        Output::new()
    };

    let config = AppConfig::read_or_default(&cli.config)
        .with_context(|| format!("Failed to read {}", cli.config.display()))?;
    init_tracing(&config.server, cli.verbose);
    if !cli.config.exists() {
        tracing::warn!(path = %cli.config.display(), "Configuration file not found, using defaults");
    }

    let result = match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(config, &output).await,
        Commands::Ask {
            message,
            index,
            server,
        } => {
            let base_url = commands::server_url(&config, server);
            commands::ask(&base_url, message, index, &output).await
        }
        Commands::Research {
            query,
            strategy,
            server,
        } => {
            let base_url = commands::server_url(&config, server);
            commands::research(&base_url, query, strategy, &output).await
        }
        Commands::Config { validate } => {
            commands::show_config(&cli.config, &config, validate, &output)
        }
    };

    if let Err(e) = result {
        output.error(&format!("{:#}", e));
        std::process::exit(1);
    }
    Ok(())
}

fn init_tracing(server: &ServerConfig, verbose: bool) {
    let level = if verbose { "debug" } else { server.log_level.as_str() };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "warn,mathmatika={level},mathmatika_server={level},tower_http={level}"
        ))
    });

    let registry = tracing_subscriber::registry().with(filter);
    if server.log_format.eq_ignore_ascii_case("json") {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

async fn serve(config: AppConfig, output: &Output) -> anyhow::Result<()> {
    config.validate().context("Invalid configuration")?;

    let addr = config.bind_address();
    tracing::info!(
        provider = %config.llm.provider,
        model = %config.llm.model,
        "Initializing services"
    );
    let state = AppState::from_config(config)?;
    let app = routes::app(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    output.banner();
    output.success(&format!("Listening on http://{}", addr));
    output.hint(&format!("API description at http://{}/openapi.json", addr));

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
