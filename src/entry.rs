use clap::{ArgMatches, CommandFactory, FromArgMatches};
use tracing::debug;

use ndt7_server::args::ServerArgs;
use ndt7_server::config::{apply_config, load_config};
use ndt7_server::error::AppResult;
use ndt7_server::server::{Server, ServerConfig};
use ndt7_server::system::logger::init_logging;
use ndt7_server::system::shutdown::{setup_signal_shutdown_handler, shutdown_channel};

pub(crate) fn run() -> AppResult<()> {
    let (mut args, matches) = parse_args()?;

    init_logging(args.verbose, args.no_color);

    if let Some(config) = load_config(args.config.as_deref())? {
        apply_config(&mut args, &matches, &config)?;
    }
    let config = ServerConfig::from_args(&args)?;
    debug!("Resolved server config: {:?}", config);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(run_async(config))
}

fn parse_args() -> AppResult<(ServerArgs, ArgMatches)> {
    let matches = ServerArgs::command().get_matches();
    let args = ServerArgs::from_arg_matches(&matches)?;
    Ok((args, matches))
}

async fn run_async(config: ServerConfig) -> AppResult<()> {
    let (shutdown_tx, shutdown_rx) = shutdown_channel();
    let signal_handle = setup_signal_shutdown_handler(&shutdown_tx);

    let server = Server::bind(config).await?;
    let result = server.run_until_shutdown(shutdown_rx).await;

    drop(shutdown_tx.send(()));
    signal_handle.await?;
    result
}
