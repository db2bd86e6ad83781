use anyhow::{Context, Result, bail};
use clap::{Arg, ArgAction, ArgMatches, Command};
use colored::Colorize;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use spook_core::scaffold::{self, SiteInfo};

fn root_arg() -> Arg {
    Arg::new("root")
        .short('r')
        .long("root")
        .value_name("DIR")
        .help("Site root containing config.toml")
        .default_value(".")
}

fn title_arg() -> Arg {
    Arg::new("title").value_name("TITLE").required(true).num_args(1..)
}

pub fn make_subcommand() -> Command {
    Command::new("new")
        .about("Create a new site, theme, page or post")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("site")
                .about("Create a new site skeleton")
                .arg(Arg::new("path").value_name("PATH").required(true))
                .arg(
                    Arg::new("force")
                        .short('f')
                        .long("force")
                        .help("Use the directory even if it is not empty")
                        .action(ArgAction::SetTrue),
                )
                .arg(Arg::new("title").long("title").value_name("TITLE").help("Site title"))
                .arg(
                    Arg::new("base-url")
                        .long("base-url")
                        .value_name("URL")
                        .help("Base URL the site is published under"),
                )
                .arg(Arg::new("owner").long("owner").value_name("NAME").help("Site owner")),
        )
        .subcommand(
            Command::new("theme")
                .about("Create an empty theme")
                .arg(Arg::new("name").value_name("NAME").required(true))
                .arg(root_arg()),
        )
        .subcommand(Command::new("page").about("Create a new page").arg(title_arg()).arg(root_arg()))
        .subcommand(Command::new("post").about("Create a new post").arg(title_arg()).arg(root_arg()))
}

pub fn execute(args: &ArgMatches) -> Result<()> {
    match args.subcommand() {
        Some(("site", args)) => new_site(args),
        Some(("theme", args)) => {
            let name = string(args, "name");
            let path = scaffold::new_theme(&root(args), &name)
                .with_context(|| format!("Failed to create theme {:?}", name))?;
            created("theme", &path);
            println!("Set `theme = \"{}\"` in config.toml to use it.", name);
            Ok(())
        }
        Some(("page", args)) => {
            let path = scaffold::new_page(&root(args), &title(args)).context("Failed to create page")?;
            created("page", &path);
            Ok(())
        }
        Some(("post", args)) => {
            let now = chrono::Local::now().fixed_offset();
            let path = scaffold::new_post(&root(args), &title(args), now).context("Failed to create post")?;
            created("post", &path);
            Ok(())
        }
        _ => bail!("Unknown kind, expected one of site, theme, page or post"),
    }
}

fn new_site(args: &ArgMatches) -> Result<()> {
    let path = PathBuf::from(string(args, "path"));
    let stdin = io::stdin();
    let mut input = stdin.lock();

    let info = SiteInfo {
        title: value_or_prompt(args, "title", "Site title", &mut input)?,
        base_url: value_or_prompt(args, "base-url", "Base URL (e.g. https://example.com/)", &mut input)?,
        owner: value_or_prompt(args, "owner", "Owner", &mut input)?,
    };

    scaffold::new_site(&path, &info, args.get_flag("force"))
        .with_context(|| format!("Failed to create site in {}", path.display()))?;
    created("site", &path);
    Ok(())
}

fn value_or_prompt(args: &ArgMatches, id: &str, label: &str, input: &mut impl BufRead) -> Result<String> {
    if let Some(value) = args.get_one::<String>(id) {
        return Ok(value.clone());
    }

    print!("{}: ", label);
    io::stdout().flush()?;
    prompt(input)
}

/// One trimmed line of input. End of input is an error.
fn prompt(input: &mut impl BufRead) -> Result<String> {
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        bail!("Unexpected end of input");
    }

    Ok(line.trim().to_string())
}

fn created(kind: &str, path: &Path) {
    println!("{} {} {}", "Created".green().bold(), kind, path.display());
}

fn string(args: &ArgMatches, id: &str) -> String {
    args.get_one::<String>(id).cloned().unwrap_or_default()
}

fn root(args: &ArgMatches) -> PathBuf {
    PathBuf::from(string(args, "root"))
}

/// Titles may be given unquoted, as several words.
fn title(args: &ArgMatches) -> String {
    args.get_many::<String>("title")
        .map(|words| words.map(String::as_str).collect::<Vec<_>>().join(" "))
        .unwrap_or_default()
}
