use zeroid_backend::config::Config;
use zeroid_backend::AppState;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = Config::from_env();

    let state = match AppState::bootstrap(config) {
        Ok(state) => state,
        Err(err) => {
            tracing::error!(error = %err, "fatal error during startup");
            std::process::exit(1);
        }
    };

    if let Err(err) = zeroid_backend::serve(state).await {
        tracing::error!(error = %err, "server exited with an error");
        std::process::exit(1);
    }
}
