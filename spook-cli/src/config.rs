use anyhow::Result;
use clap::ArgMatches;
use config::{Config as ConfigBuilder, Environment};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Command settings layered from defaults, `SPOOK_*` environment variables
/// and CLI arguments. The site itself is configured by `<root>/config.toml`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SpookConfig {
    pub build: BuildConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BuildConfig {
    /// Site root containing config.toml
    pub root: String,
    /// Output directory; empty means the site's publishDir
    pub output: String,
    /// Host for the server
    pub host: String,
    /// Port for the server
    pub port: u16,
    /// Open browser automatically
    pub open: bool,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            root: ".".to_string(),
            output: String::new(),
            host: "127.0.0.1".to_string(),
            port: 8080,
            open: false,
        }
    }
}

impl SpookConfig {
    /// Load settings with cascading precedence:
    /// 1. CLI arguments (highest priority)
    /// 2. Environment variables (SPOOK_*)
    /// 3. Defaults (lowest priority)
    pub fn load(args: &ArgMatches) -> Result<Self> {
        let mut builder = ConfigBuilder::builder()
            .add_source(ConfigBuilder::try_from(&Self::default())?)
            .add_source(
                Environment::with_prefix("SPOOK")
                    .prefix_separator("_")
                    .separator("__"),
            );

        // Only arguments defined for the current command are looked at.
        if let Some(root) = args.try_get_one::<String>("root").unwrap_or(None) {
            builder = builder.set_override("build.root", root.as_str())?;
        }
        if let Some(output) = args.try_get_one::<String>("output").unwrap_or(None) {
            builder = builder.set_override("build.output", output.as_str())?;
        }
        if let Some(host) = args.try_get_one::<String>("host").unwrap_or(None) {
            builder = builder.set_override("build.host", host.as_str())?;
        }
        if let Some(port) = args.try_get_one::<u16>("port").unwrap_or(None) {
            builder = builder.set_override("build.port", i64::from(*port))?;
        }
        if args.try_get_one::<bool>("open").unwrap_or(None) == Some(&true) {
            builder = builder.set_override("build.open", true)?;
        }

        Ok(builder.build()?.try_deserialize()?)
    }

    pub fn root(&self) -> &Path {
        Path::new(&self.build.root)
    }

    /// `--output` when given, otherwise the site's publishDir.
    pub fn output_dir(&self, site: &spook_core::Config) -> PathBuf {
        if self.build.output.is_empty() {
            site.publish_dir(self.root())
        } else {
            PathBuf::from(&self.build.output)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::{Arg, ArgAction, Command, value_parser};

    fn command() -> Command {
        Command::new("test")
            .arg(Arg::new("root").long("root"))
            .arg(Arg::new("output").long("output"))
            .arg(Arg::new("port").long("port").value_parser(value_parser!(u16)))
            .arg(Arg::new("open").long("open").action(ArgAction::SetTrue))
    }

    #[test]
    fn test_default_config() {
        let config = SpookConfig::default();
        assert_eq!(config.build.root, ".");
        assert_eq!(config.build.output, "");
        assert_eq!(config.build.host, "127.0.0.1");
        assert_eq!(config.build.port, 8080);
        assert!(!config.build.open);
    }

    #[test]
    fn test_cli_args_override() {
        let matches = command()
            .try_get_matches_from(["test", "--root", "/site", "--port", "9000", "--open"])
            .unwrap();

        let config = SpookConfig::load(&matches).unwrap();
        assert_eq!(config.build.root, "/site");
        assert_eq!(config.build.port, 9000);
        assert!(config.build.open);
        // Not defined on this command
        assert_eq!(config.build.host, "127.0.0.1");
    }

    #[test]
    fn test_output_dir() {
        let site = spook_core::Config {
            publish_dir: "dist".into(),
            ..Default::default()
        };

        let matches = command().try_get_matches_from(["test", "--root", "/site"]).unwrap();
        let config = SpookConfig::load(&matches).unwrap();
        assert_eq!(config.output_dir(&site), PathBuf::from("/site/dist"));

        let matches = command()
            .try_get_matches_from(["test", "--root", "/site", "--output", "/tmp/out"])
            .unwrap();
        let config = SpookConfig::load(&matches).unwrap();
        assert_eq!(config.output_dir(&site), PathBuf::from("/tmp/out"));
    }
}
