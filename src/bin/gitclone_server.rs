use gitclone::Config;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    env_logger::init();
    let config = Config::from_env();
    gitclone::server::serve(config.repo_base, config.port).await
}
