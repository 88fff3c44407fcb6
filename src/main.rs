use squall_lib::{app, cli::Cli, config};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "squall=info".into()),
        )
        .init();

    tracing::info!("starting squall");

    let cli = Cli::parse_args();
    let mut config = config::Config::load();
    let root = std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(|p| p.to_path_buf()))
        .unwrap_or_else(|| std::path::PathBuf::from("."));

    config.font.path = config::resolve_relative_to_root(&config.font.path, &root);

    let mut shader_paths: Vec<_> = config
        .shaders
        .iter()
        .map(|p| config::resolve_relative_to_root(p, &root))
        .collect();
    shader_paths.extend(cli.shaders.iter().map(|p| config::resolve_relative_to_root(p, &root)));

    let shell = cli.shell.clone().or_else(|| config.terminal.shell.clone());

    match app::run(config, shader_paths, shell) {
        Ok(code) => {
            tracing::info!(exit_code = code, "squall exiting");
            std::process::exit(code);
        }
        Err(err) => {
            tracing::error!(%err, "squall exited with a fatal error");
            std::process::exit(1);
        }
    }
}
