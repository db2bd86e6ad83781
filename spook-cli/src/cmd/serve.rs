use anyhow::Result;
use clap::{Arg, ArgAction, ArgMatches, Command, value_parser};
use std::path::PathBuf;
use spook_server::{Server, ServerConfig};
use crate::cmd::build::add_root_arg;
use crate::config::SpookConfig;

pub fn make_subcommand() -> Command {
    add_root_arg(Command::new("server"))
        .visible_alias("serve")
        .about("Serve the site, rendering every request from source")
        .arg(
            Arg::new("port")
                .short('p')
                .long("port")
                .value_name("PORT")
                .help("Port to serve on [default: 8080]")
                .value_parser(value_parser!(u16)),
        )
        .arg(
            Arg::new("host")
                .long("host")
                .value_name("HOST")
                .help("Host to bind to [default: 127.0.0.1]"),
        )
        .arg(
            Arg::new("open")
                .long("open")
                .help("Open browser automatically")
                .action(ArgAction::SetTrue),
        )
}

pub async fn execute(args: &ArgMatches) -> Result<()> {
    let settings = SpookConfig::load(args)?.build;
    log::debug!("Settings: {:?}", settings);

    let server = Server::new(ServerConfig {
        host: settings.host,
        port: settings.port,
        root: PathBuf::from(settings.root),
        open: settings.open,
    });

    server.run().await
}
