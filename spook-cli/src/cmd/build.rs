use anyhow::{Context, Result};
use clap::{Arg, ArgMatches, Command};
use colored::Colorize;
use spook_core::{Config, build_site};
use crate::config::SpookConfig;

pub fn add_root_arg(command: Command) -> Command {
    command.arg(
        Arg::new("root")
            .short('r')
            .long("root")
            .value_name("DIR")
            .help("Site root containing config.toml"),
    )
}

pub fn make_subcommand() -> Command {
    add_root_arg(Command::new("build"))
        .about("Build the site into its publish directory")
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_name("DIR")
                .help("Output directory, defaults to the site's publishDir"),
        )
}

pub fn execute(args: &ArgMatches) -> Result<()> {
    let settings = SpookConfig::load(args)?;
    log::debug!("Settings: {:?}", settings);
    let root = settings.root();

    let config = Config::open(root, true)
        .with_context(|| format!("Invalid site config in {}", root.display()))?;
    let output_dir = settings.output_dir(&config);

    let report = build_site(root, &config, &output_dir)
        .with_context(|| format!("Failed to build {}", root.display()))?;

    for skipped in &report.skipped {
        println!("{} {}: {}", "Skipped".yellow().bold(), skipped.name, skipped.error);
    }
    println!(
        "{} {} files in {}",
        "Built".green().bold(),
        report.files_written,
        output_dir.display()
    );

    Ok(())
}
