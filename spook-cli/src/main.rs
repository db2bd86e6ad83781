use clap::Command;
use colored::Colorize;

mod cmd;
mod config;

fn cli() -> Command {
    Command::new("spook")
        .about("A simple, minimalist and opinionated static site generator for blogs")
        .version(env!("CARGO_PKG_VERSION"))
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(cmd::new::make_subcommand())
        .subcommand(cmd::build::make_subcommand())
        .subcommand(cmd::serve::make_subcommand())
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let matches = cli().get_matches();
    let result = match matches.subcommand() {
        Some(("new", args)) => cmd::new::execute(args),
        Some(("build", args)) => cmd::build::execute(args),
        Some(("server", args)) => cmd::serve::execute(args).await,
        _ => Err(anyhow::anyhow!("Unknown command")),
    };

    if let Err(e) = result {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}
