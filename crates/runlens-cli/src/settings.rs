use std::env;
use std::path::PathBuf;

use runlens_core::config::Config;
use runlens_core::config::ConfigError;

pub const CONFIG_FILE: &str = "config.toml";

type ArgResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Flags every command accepts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommonArgs {
    pub config: Option<PathBuf>,
    pub url: Option<String>,
    pub simulate: bool,
}

impl CommonArgs {
    /// Consumes a shared flag at `args[i]`. Returns how many arguments were
    /// used, `0` when `args[i]` is not a shared flag.
    fn take(&mut self, args: &[String], i: usize) -> ArgResult<usize> {
        match args[i].as_str() {
            "--config" => {
                self.config = Some(PathBuf::from(flag_value(args, i)?));
                Ok(2)
            }
            "--url" => {
                self.url = Some(flag_value(args, i)?.to_string());
                Ok(2)
            }
            "--simulate" => {
                self.simulate = true;
                Ok(1)
            }
            _ => Ok(0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeArgs {
    pub path: String,
    pub base: PathBuf,
    pub depth: Option<usize>,
    pub max_entries: Option<usize>,
    pub json: bool,
    pub common: CommonArgs,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunArgs {
    pub run_id: String,
    pub json: bool,
    pub execute: bool,
    pub common: CommonArgs,
}

fn flag_value<'a>(args: &'a [String], i: usize) -> ArgResult<&'a str> {
    match args.get(i + 1) {
        Some(value) => Ok(value.as_str()),
        None => Err(format!("{} requires a value", args[i]).into()),
    }
}

fn flag_number(args: &[String], i: usize) -> ArgResult<usize> {
    let raw = flag_value(args, i)?;
    raw.parse()
        .map_err(|_| format!("{} expects a number, got {raw}", args[i]).into())
}

pub fn parse_common(args: &[String]) -> ArgResult<CommonArgs> {
    let mut common = CommonArgs::default();
    let mut i = 0;
    while i < args.len() {
        match common.take(args, i)? {
            0 => return Err(format!("unsupported argument: {}", args[i]).into()),
            used => i += used,
        }
    }
    Ok(common)
}

pub fn parse_tree(args: &[String]) -> ArgResult<TreeArgs> {
    let mut parsed = TreeArgs {
        path: ".".to_string(),
        base: PathBuf::from("."),
        depth: None,
        max_entries: None,
        json: false,
        common: CommonArgs::default(),
    };
    let mut path = None;
    let mut i = 0;
    while i < args.len() {
        let used = parsed.common.take(args, i)?;
        if used > 0 {
            i += used;
            continue;
        }
        match args[i].as_str() {
            "--base" => {
                parsed.base = PathBuf::from(flag_value(args, i)?);
                i += 2;
            }
            "--depth" => {
                parsed.depth = Some(flag_number(args, i)?);
                i += 2;
            }
            "--max-entries" => {
                parsed.max_entries = Some(flag_number(args, i)?);
                i += 2;
            }
            "--json" => {
                parsed.json = true;
                i += 1;
            }
            other if other.starts_with("--") || path.is_some() => {
                return Err(format!("unsupported argument: {other}").into());
            }
            other => {
                path = Some(other.to_string());
                i += 1;
            }
        }
    }
    if let Some(path) = path {
        parsed.path = path;
    }
    Ok(parsed)
}

/// Arguments of `review` and `watch`; only `watch` accepts `--execute`.
pub fn parse_run(command: &str, args: &[String]) -> ArgResult<RunArgs> {
    let mut common = CommonArgs::default();
    let mut run_id = None;
    let mut json = false;
    let mut execute = false;
    let mut i = 0;
    while i < args.len() {
        let used = common.take(args, i)?;
        if used > 0 {
            i += used;
            continue;
        }
        match args[i].as_str() {
            "--json" if command == "review" => json = true,
            "--execute" if command == "watch" => execute = true,
            other if other.starts_with("--") || run_id.is_some() => {
                return Err(format!("unsupported argument: {other}").into());
            }
            other => run_id = Some(other.to_string()),
        }
        i += 1;
    }
    let Some(run_id) = run_id else {
        return Err(format!("{command} requires a RUN_ID").into());
    };
    Ok(RunArgs {
        run_id,
        json,
        execute,
        common,
    })
}

/// Effective configuration for one invocation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub config: Config,
    pub config_path: PathBuf,
    pub simulate: bool,
}

impl Settings {
    pub fn load(common: &CommonArgs) -> Result<Self, ConfigError> {
        let config_path = common.config.clone().unwrap_or_else(default_config_path);
        let mut config = Config::load(&config_path)?;
        if let Some(url) = &common.url {
            config.server.base_url = url.clone();
        }
        Ok(Self {
            config,
            config_path,
            simulate: common.simulate,
        })
    }

    pub fn log_directory(&self) -> PathBuf {
        self.config.logging.directory.clone().unwrap_or_else(|| {
            dirs::data_local_dir()
                .unwrap_or_else(env::temp_dir)
                .join("runlens")
                .join("logs")
        })
    }

    /// Where the console reads from, for headers and logs.
    pub fn source_label(&self) -> String {
        if self.simulate {
            "simulated".to_string()
        } else {
            self.config.server.base_url.clone()
        }
    }
}

pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("runlens")
        .join(CONFIG_FILE)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    use super::*;

    fn args(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|arg| arg.to_string()).collect()
    }

    #[test]
    fn tree_defaults_to_current_directory() {
        let parsed = parse_tree(&[]).expect("parse");
        assert_eq!(parsed.path, ".");
        assert_eq!(parsed.base, PathBuf::from("."));
        assert_eq!(parsed.depth, None);
    }

    #[test]
    fn tree_reads_limits_and_shared_flags() {
        let parsed = parse_tree(&args(&[
            "src", "--depth", "2", "--max-entries", "40", "--json", "--base", "/tmp/ws", "--simulate",
        ]))
        .expect("parse");

        assert_eq!(parsed.path, "src");
        assert_eq!(parsed.depth, Some(2));
        assert_eq!(parsed.max_entries, Some(40));
        assert!(parsed.json);
        assert_eq!(parsed.base, PathBuf::from("/tmp/ws"));
        assert!(parsed.common.simulate);
    }

    #[test]
    fn bad_numbers_and_missing_values_are_errors() {
        let err = parse_tree(&args(&["--depth", "deep"])).expect_err("not a number");
        assert_eq!(err.to_string(), "--depth expects a number, got deep");

        let err = parse_common(&args(&["--url"])).expect_err("missing value");
        assert_eq!(err.to_string(), "--url requires a value");
    }

    #[test]
    fn run_args_need_an_id_and_respect_command_flags() {
        let err = parse_run("watch", &[]).expect_err("missing id");
        assert_eq!(err.to_string(), "watch requires a RUN_ID");

        let watch = parse_run("watch", &args(&["run-1", "--execute"])).expect("watch");
        assert!(watch.execute);

        let err = parse_run("review", &args(&["run-1", "--execute"])).expect_err("review");
        assert_eq!(err.to_string(), "unsupported argument: --execute");
    }

    #[test]
    fn url_flag_overrides_config_file() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join(CONFIG_FILE);
        fs::write(
            &path,
            "[server]\nbase_url = \"http://files:9000\"\n\n[console]\nruns_limit = 7\n",
        )
        .expect("write");

        let common = parse_common(&args(&[
            "--config",
            path.to_str().expect("utf8"),
            "--url",
            "http://flag:1",
        ]))
        .expect("parse");
        let settings = Settings::load(&common).expect("load");

        assert_eq!(settings.config.server.base_url, "http://flag:1");
        assert_eq!(settings.config.console.runs_limit, 7);
        assert_eq!(settings.source_label(), "http://flag:1");
    }

    #[test]
    fn missing_config_file_uses_defaults() {
        let dir = tempdir().expect("tempdir");
        let common = CommonArgs {
            config: Some(dir.path().join("absent.toml")),
            simulate: true,
            ..CommonArgs::default()
        };

        let settings = Settings::load(&common).expect("load");

        assert_eq!(settings.config, Config::default());
        assert_eq!(settings.source_label(), "simulated");
    }

    #[test]
    fn log_directory_honours_override() {
        let dir = tempdir().expect("tempdir");
        let mut settings = Settings::load(&CommonArgs {
            config: Some(dir.path().join("absent.toml")),
            ..CommonArgs::default()
        })
        .expect("load");
        settings.config.logging.directory = Some(dir.path().join("logs"));

        assert_eq!(settings.log_directory(), dir.path().join("logs"));
    }
}
