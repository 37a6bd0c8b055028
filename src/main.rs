use clap::{Parser, Subcommand};
use sitepipe::Environment;
use sitepipe::config::ENV_VAR;

#[derive(Parser, Debug)]
#[command(name = "sitepipe", version, about = "Static-site asset pipeline")]
struct Args {
    /// Build environment: development or production. Falls back to the
    /// SITEPIPE_ENV variable, then to development.
    #[arg(long, global = true)]
    env: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy)]
enum Command {
    /// Clean the output root, then run every chain once
    Build,
    /// Build once, then serve the output root and rebuild on change
    Serve,
}

fn main() -> anyhow::Result<()> {
    init_logging();

    let args = Args::parse();

    let fallback = std::env::var(ENV_VAR).ok();
    let environment = Environment::resolve(args.env.as_deref(), fallback.as_deref())?;
    let config = environment.config();

    match args.command.unwrap_or(Command::Serve) {
        Command::Build => sitepipe::build(&config)?,
        Command::Serve => sitepipe::serve(&config)?,
    }

    Ok(())
}

fn init_logging() {
    use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
}
