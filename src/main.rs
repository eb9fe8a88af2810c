use clap::Parser;
use policy_pack_workflow::cli::{self, Cli, Command};
use policy_pack_workflow::infrastructure::logging::{init_logging, verbose_level};
use policy_pack_workflow::infrastructure::observability::register_build_info;
use policy_pack_workflow::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = AppConfig::load()?;
    init_logging(&verbose_level(&config.logging, cli.verbose));
    register_build_info();

    let format = cli.format;
    match cli.command {
        Command::Run(args) => cli::run::run(&config, args, format).await,
        Command::Rerun(args) => cli::run::rerun(&config, args, format).await,
        Command::Show { run_id, snapshots } => {
            cli::inspect::show(&config, run_id, snapshots, format).await
        }
        Command::List { skip, take } => cli::inspect::list(&config, skip, take, format).await,
        Command::Lineage { run_id } => cli::inspect::lineage(&config, run_id, format).await,
        Command::Cancel { run_id } => cli::inspect::cancel(&config, run_id).await,
        Command::Steps => cli::inspect::steps(&config, format).await,
        Command::Samples { id } => cli::inspect::samples(id.as_deref(), format),
        Command::Migrate { revert } => cli::migrate::run(&config, revert).await,
    }
}
