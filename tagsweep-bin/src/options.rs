use crate::verbosity::Verbosity;
use anyhow::{Context, Error, Result, anyhow};
use clap::builder::PossibleValuesParser;
use clap::{Parser, builder::TypedValueParser};
use const_format::{concatcp, formatcp};
use http::{
    HeaderMap,
    header::{HeaderName, HeaderValue},
};
use secrecy::SecretString;
use serde::{Deserialize, Deserializer};
use std::collections::HashMap;
use std::path::Path;
use std::{fs, path::PathBuf, str::FromStr, time::Duration};
use strum::{Display, EnumIter, EnumString, VariantNames};
use tagsweep_lib::{
    AdmissionConfig, DEFAULT_CHANNEL_CAPACITY, DEFAULT_MAX_RETRIES, DEFAULT_PAGE_SIZE,
    DEFAULT_USER_AGENT, RunMode, SweepConfig, TagFilter,
    ratelimit::{DEFAULT_BURST_CAPACITY, DEFAULT_BURST_INTERVAL, DEFAULT_MAX_CONCURRENCY},
};
use url::Url;

pub(crate) const TAGSWEEP_CONFIG_FILE: &str = "tagsweep.toml";

const DEFAULT_TIMEOUT_SECS: u64 = 20;
const DEFAULT_BURST_INTERVAL_STR: &str = "100ms";
const DEFAULT_RETRY_WAIT_TIME_STR: &str = "1s";

// this exists because clap requires `&str` type values for defaults
// whereas serde expects owned `String` types
const BURST_CAPACITY_STR: &str = concatcp!(DEFAULT_BURST_CAPACITY);
const MAX_CONCURRENCY_STR: &str = concatcp!(DEFAULT_MAX_CONCURRENCY);
const CHANNEL_CAPACITY_STR: &str = concatcp!(DEFAULT_CHANNEL_CAPACITY);
const PAGE_SIZE_STR: &str = concatcp!(DEFAULT_PAGE_SIZE);
const MAX_RETRIES_STR: &str = concatcp!(DEFAULT_MAX_RETRIES);
const TIMEOUT_STR: &str = concatcp!(DEFAULT_TIMEOUT_SECS);
// We use a custom help message here because we want to show the default
// value of the config file, but also be able to check if the user has
// provided a custom value. If they didn't, we won't throw an error if
// the file doesn't exist.
const HELP_MSG_CONFIG_FILE: &str = formatcp!(
    "Configuration file to use\n\n[default: {}]",
    TAGSWEEP_CONFIG_FILE,
);

/// What to do with the items of the directory
#[derive(
    Debug, Deserialize, Default, Clone, Copy, Display, EnumIter, EnumString, VariantNames, PartialEq, Eq,
)]
#[non_exhaustive]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
#[serde(rename_all = "snake_case")]
pub(crate) enum Operation {
    /// Report every item whose tags can be read
    List,
    /// Report items carrying the `--filter-tag`/`--filter-value` pair
    #[default]
    Filter,
}

/// The format to use for the final report
#[derive(Debug, Deserialize, Default, Clone, Display, EnumIter, VariantNames, PartialEq, Eq)]
#[non_exhaustive]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub(crate) enum StatsFormat {
    #[default]
    Compact,
    Detailed,
    Json,
    Markdown,
    Raw,
}

impl FromStr for StatsFormat {
    type Err = Error;

    fn from_str(format: &str) -> Result<Self, Self::Err> {
        match format.to_lowercase().as_str() {
            "compact" | "string" => Ok(StatsFormat::Compact),
            "detailed" => Ok(StatsFormat::Detailed),
            "json" => Ok(StatsFormat::Json),
            "markdown" | "md" => Ok(StatsFormat::Markdown),
            "raw" => Ok(StatsFormat::Raw),
            _ => Err(anyhow!("Unknown format {format}")),
        }
    }
}

/// How outcome lines and log records look in the terminal
#[derive(
    Debug, Deserialize, Default, Clone, Display, EnumIter, EnumString, VariantNames, PartialEq, Eq,
)]
#[non_exhaustive]
pub(crate) enum OutputMode {
    /// No colors, for scripts and pipes
    #[serde(rename = "plain")]
    #[strum(serialize = "plain", ascii_case_insensitive)]
    Plain,

    /// Colored status labels
    #[serde(rename = "color")]
    #[strum(serialize = "color", ascii_case_insensitive)]
    #[default]
    Color,

    /// One emoji per outcome
    #[serde(rename = "emoji")]
    #[strum(serialize = "emoji", ascii_case_insensitive)]
    Emoji,
}

impl OutputMode {
    /// Returns `true` for uncolored output
    pub(crate) const fn is_plain(&self) -> bool {
        matches!(self, OutputMode::Plain)
    }
}

// Macro for generating default functions to be used by serde
macro_rules! default_function {
    ( $( $name:ident : $T:ty = $e:expr; )* ) => {
        $(
            #[allow(clippy::missing_const_for_fn)]
            fn $name() -> $T {
                $e
            }
        )*
    };
}

// Generate the functions for serde defaults
default_function! {
    burst_capacity: usize = DEFAULT_BURST_CAPACITY;
    burst_interval: Duration = DEFAULT_BURST_INTERVAL;
    max_concurrency: usize = DEFAULT_MAX_CONCURRENCY;
    channel_capacity: usize = DEFAULT_CHANNEL_CAPACITY;
    page_size: usize = DEFAULT_PAGE_SIZE;
    max_retries: usize = DEFAULT_MAX_RETRIES;
    retry_wait_time: Duration = tagsweep_lib::DEFAULT_RETRY_WAIT_TIME;
    timeout: u64 = DEFAULT_TIMEOUT_SECS;
    user_agent: String = DEFAULT_USER_AGENT.to_string();
    verbosity: Verbosity = Verbosity::default();
}

// Macro for merging configuration values
macro_rules! fold_in {
    ($cli:ident , $toml:ident ; $ty:ident { $(..$ignore:ident,)* $( $key:ident : $default:expr, )* } ) => {
        if (false) {
            #[allow(dead_code, unused, clippy::diverging_sub_expression)]
            let _check_fold_in_exhaustivity = $ty {
                $($key: unreachable!(), )*
                $($ignore: unreachable!(), )*
            };
        };
        $(
            if $cli.$key == $default && $toml.$key != $default {
                $cli.$key = $toml.$key;
            }
        )*
    };
}

/// Split `Name: Value` into a header name and value, both trimmed.
///
/// Neither the name nor the value end up in the error message, since
/// directory headers usually carry tenant ids or credentials.
fn parse_single_header(header: &str) -> Result<(HeaderName, HeaderValue)> {
    match header.split_once(':') {
        Some((name, value)) => {
            let name = name.trim();
            let name = HeaderName::from_str(name)
                .map_err(|e| anyhow!("Unable to convert header name: {e}"))?;
            let value = HeaderValue::from_str(value.trim())
                .map_err(|e| anyhow!("Unable to read value of header with name '{name}': {e}"))?;
            Ok((name, value))
        }
        None => Err(anyhow!(
            "Invalid header format. Expected colon-separated string in the format 'HeaderName: HeaderValue'"
        )),
    }
}

/// Clap parser for one `--header` argument
#[derive(Clone, Debug)]
struct HeaderParser;

impl TypedValueParser for HeaderParser {
    type Value = (String, String);

    fn parse_ref(
        &self,
        _cmd: &clap::Command,
        _arg: Option<&clap::Arg>,
        value: &std::ffi::OsStr,
    ) -> Result<Self::Value, clap::Error> {
        let invalid = |msg: String| clap::Error::raw(clap::error::ErrorKind::InvalidValue, msg);

        let header_str = value
            .to_str()
            .ok_or_else(|| invalid("Header value contains invalid UTF-8".to_string()))?;

        let (name, value) = parse_single_header(header_str).map_err(|e| invalid(e.to_string()))?;
        let value = value
            .to_str()
            .map_err(|_| invalid("Header value contains invalid UTF-8".to_string()))?;
        Ok((name.to_string(), value.to_string()))
    }
}

impl clap::builder::ValueParserFactory for HeaderParser {
    type Parser = HeaderParser;
    fn value_parser() -> Self::Parser {
        HeaderParser
    }
}

/// Build the default headers of the directory client
pub(crate) trait HeaderMapExt {
    /// Later pairs replace earlier ones with the same name
    fn from_header_pairs(headers: &[(String, String)]) -> Result<HeaderMap, Error>;
}

impl HeaderMapExt for HeaderMap {
    fn from_header_pairs(headers: &[(String, String)]) -> Result<HeaderMap, Error> {
        let mut header_map = HeaderMap::new();
        for (name, value) in headers {
            let header_name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| anyhow!("Invalid header name '{name}': {e}"))?;
            let header_value = HeaderValue::from_str(value)
                .map_err(|e| anyhow!("Invalid header value for '{name}': {e}"))?;
            header_map.insert(header_name, header_value);
        }
        Ok(header_map)
    }
}

/// tagsweep walks through every item of a paginated directory, looks up the
/// tags of each item, and reports the items carrying a given tag pair.
///
/// Lookups are admitted through a burst pool and a concurrency cap so that
/// the directory is never overwhelmed.
#[derive(Parser, Debug)]
#[command(version, about, next_display_order = None)]
pub(crate) struct TagsweepOptions {
    /// Configuration file to use
    #[arg(short, long = "config")]
    #[arg(help = HELP_MSG_CONFIG_FILE)]
    pub(crate) config_file: Option<PathBuf>,

    #[clap(flatten)]
    pub(crate) config: Config,
}

// Custom deserializer function for the header field
fn deserialize_headers<'de, D>(deserializer: D) -> Result<Vec<(String, String)>, D::Error>
where
    D: Deserializer<'de>,
{
    let map = HashMap::<String, String>::deserialize(deserializer)?;
    Ok(map.into_iter().collect())
}

/// The main configuration for tagsweep
#[derive(Parser, Debug, Deserialize, Clone, Default)]
#[serde(deny_unknown_fields)]
pub(crate) struct Config {
    /// Base URL of the tag directory
    #[arg(short, long, env = "TAGSWEEP_ENDPOINT")]
    #[serde(default)]
    pub(crate) endpoint: Option<Url>,

    /// What to do with the items of the directory
    #[arg(
        long,
        default_value = "filter",
        value_parser = PossibleValuesParser::new(Operation::VARIANTS).map(|s| s.parse::<Operation>().unwrap()),
        long_help = "What to do with the items of the directory

- filter: report items carrying the tag pair given with `--filter-tag` and
  `--filter-value` (both are required)
- list: report every item whose tags could be read"
    )]
    #[serde(default)]
    pub(crate) operation: Operation,

    /// Tag key an item must carry to match (`filter` operation)
    #[arg(long, value_name = "KEY")]
    #[serde(default)]
    pub(crate) filter_tag: Option<String>,

    /// Tag value an item must carry to match (`filter` operation)
    #[arg(long, value_name = "VALUE")]
    #[serde(default)]
    pub(crate) filter_value: Option<String>,

    /// How lookups are admitted
    #[arg(
        long,
        default_value = "bucket",
        value_parser = PossibleValuesParser::new(RunMode::VARIANTS).map(|s| s.parse::<RunMode>().unwrap()),
        long_help = "How lookups are admitted

- bucket: burst pool and concurrency cap both apply (default)
- concurrent: lookups start as soon as they are enumerated
- serial: one lookup at a time"
    )]
    #[serde(default)]
    pub(crate) run_mode: RunMode,

    /// Number of lookups admitted at once before the sustained rate applies
    #[arg(long, default_value = &BURST_CAPACITY_STR)]
    #[serde(default = "burst_capacity")]
    pub(crate) burst_capacity: usize,

    /// Interval between admissions once the burst is used up
    ///
    /// Examples:
    ///   --burst-interval 100ms   # 10 lookups per second
    ///   --burst-interval 1s      # for heavily throttled directories
    #[arg(
        long,
        value_parser = humantime::parse_duration,
        default_value = DEFAULT_BURST_INTERVAL_STR,
        verbatim_doc_comment
    )]
    #[serde(default = "burst_interval", with = "humantime_serde")]
    pub(crate) burst_interval: Duration,

    /// Maximum number of lookups in flight
    #[arg(long, default_value = &MAX_CONCURRENCY_STR)]
    #[serde(default = "max_concurrency")]
    pub(crate) max_concurrency: usize,

    /// Capacity of each outcome channel
    #[arg(long, default_value = &CHANNEL_CAPACITY_STR)]
    #[serde(default = "channel_capacity")]
    pub(crate) channel_capacity: usize,

    /// Number of items requested per page
    #[arg(long, default_value = &PAGE_SIZE_STR)]
    #[serde(default = "page_size")]
    pub(crate) page_size: usize,

    /// Number of retry rounds for lookups that failed transiently
    #[arg(long, default_value = &MAX_RETRIES_STR)]
    #[serde(default = "max_retries")]
    pub(crate) max_retries: usize,

    /// Wait time before the first retry round, doubled for every further round
    #[arg(
        long,
        value_parser = humantime::parse_duration,
        default_value = DEFAULT_RETRY_WAIT_TIME_STR
    )]
    #[serde(default = "retry_wait_time", with = "humantime_serde")]
    pub(crate) retry_wait_time: Duration,

    /// Directory timeout in seconds from connect to response finished
    #[arg(short, long, default_value = &TIMEOUT_STR)]
    #[serde(default = "timeout")]
    pub(crate) timeout: u64,

    /// User agent
    #[arg(short, long, default_value = DEFAULT_USER_AGENT)]
    #[serde(default = "user_agent")]
    pub(crate) user_agent: String,

    /// Set custom header for requests
    #[arg(
        short = 'H',
        long,
        // clap appends every occurrence, so this is a list of pairs rather
        // than a map
        action = clap::ArgAction::Append,
        value_parser = HeaderParser,
        value_name = "HEADER:VALUE",
        long_help = "Set custom header for requests

Specify custom headers in the format 'Name: Value'. For example, 'X-Tenant: acme'.
Multiple headers can be specified by using the flag multiple times."
    )]
    #[serde(default)]
    #[serde(deserialize_with = "deserialize_headers")]
    pub(crate) header: Vec<(String, String)>,

    /// Bearer token for the directory
    #[arg(long, env = "TAGSWEEP_TOKEN", hide_env_values = true)]
    #[serde(default)]
    pub(crate) token: Option<SecretString>,

    /// Verbose program output
    #[clap(flatten)]
    #[serde(default = "verbosity")]
    pub(crate) verbose: Verbosity,

    /// Do not show progress bar.
    /// This is recommended for non-interactive shells (e.g. for continuous integration)
    #[arg(short, long, verbatim_doc_comment)]
    #[serde(default)]
    pub(crate) no_progress: bool,

    /// Number of threads to utilize.
    /// Defaults to number of cores available to the system
    #[arg(short = 'T', long)]
    #[serde(default)]
    pub(crate) threads: Option<usize>,

    /// Output file of the report
    #[arg(short, long, value_parser)]
    #[serde(default)]
    pub(crate) output: Option<PathBuf>,

    /// Set the output display mode. Determines how results are presented in the terminal
    #[arg(long, default_value = "color", value_parser = PossibleValuesParser::new(OutputMode::VARIANTS).map(|s| s.parse::<OutputMode>().unwrap()))]
    #[serde(default)]
    pub(crate) mode: OutputMode,

    /// Output format of the final report
    #[arg(short, long, default_value = "compact", value_parser = PossibleValuesParser::new(StatsFormat::VARIANTS).map(|s| s.parse::<StatsFormat>().unwrap()))]
    #[serde(default)]
    pub(crate) format: StatsFormat,
}

impl Config {
    /// Add the headers of the config file which are not already set on the
    /// command line. Header names compare case-insensitively.
    fn merge_headers(&mut self, toml: Vec<(String, String)>) {
        for (name, value) in toml {
            if !self.header.iter().any(|(n, _)| n.eq_ignore_ascii_case(&name)) {
                self.header.push((name, value));
            }
        }
    }

    /// Load configuration from a file
    pub(crate) fn load_from_file(path: &Path) -> Result<Config> {
        // Read configuration file
        let contents = fs::read_to_string(path)?;
        toml::from_str(&contents).with_context(|| "Failed to parse configuration file")
    }

    /// Merge the configuration from TOML into the CLI configuration
    pub(crate) fn merge(&mut self, toml: Config) {
        // Special handling for headers before fold_in!
        self.merge_headers(toml.header);

        // This is outside of fold_in! because SecretBox doesn't implement Eq.
        if self.token.is_none() && toml.token.is_some() {
            self.token = toml.token;
        }

        // NOTE: if you see an error within this macro call, check to make sure that
        // that the fields provided to fold_in! match all the fields of the Config struct.
        fold_in! {
            // Destination and source configs
            self, toml;

            Config {
                // Keys which are handled outside of fold_in
                ..header,
                ..token,

                // Keys with defaults to assign
                burst_capacity: DEFAULT_BURST_CAPACITY,
                burst_interval: DEFAULT_BURST_INTERVAL,
                channel_capacity: DEFAULT_CHANNEL_CAPACITY,
                endpoint: None,
                filter_tag: None,
                filter_value: None,
                format: StatsFormat::default(),
                max_concurrency: DEFAULT_MAX_CONCURRENCY,
                max_retries: DEFAULT_MAX_RETRIES,
                mode: OutputMode::Color,
                no_progress: false,
                operation: Operation::default(),
                output: None,
                page_size: DEFAULT_PAGE_SIZE,
                retry_wait_time: tagsweep_lib::DEFAULT_RETRY_WAIT_TIME,
                run_mode: RunMode::default(),
                threads: None,
                timeout: DEFAULT_TIMEOUT_SECS,
                user_agent: DEFAULT_USER_AGENT,
                verbose: Verbosity::default(),
            }
        }
    }

    /// The tag filter selected by `--operation`
    pub(crate) fn filter(&self) -> Result<TagFilter> {
        match self.operation {
            Operation::List => Ok(TagFilter::Any),
            Operation::Filter => {
                let key = self.filter_tag.as_deref().unwrap_or_default();
                let value = self.filter_value.as_deref().unwrap_or_default();
                TagFilter::pair(key, value).context(
                    "The `filter` operation requires both `--filter-tag` and `--filter-value`",
                )
            }
        }
    }

    /// Shape of the sweep as configured
    pub(crate) fn sweep_config(&self) -> Result<SweepConfig> {
        Ok(SweepConfig {
            filter: self.filter()?,
            mode: self.run_mode,
            admission: AdmissionConfig {
                burst_capacity: self.burst_capacity,
                burst_interval: self.burst_interval,
                max_concurrency: self.max_concurrency,
            },
            channel_capacity: self.channel_capacity,
            max_retries: self.max_retries,
            retry_wait_time: self.retry_wait_time,
            lookup_timeout: (self.timeout > 0).then(|| Duration::from_secs(self.timeout)),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_parse_custom_headers() {
        assert_eq!(
            parse_single_header("x-tenant:acme").unwrap(),
            (
                HeaderName::from_static("x-tenant"),
                HeaderValue::from_static("acme")
            )
        );
    }

    #[test]
    fn test_invalid_header_does_not_leak_token() {
        let error = parse_single_header("Authorization Bearer s3cr3t")
            .expect_err("header without `:` must be rejected");
        assert!(!error.to_string().contains("s3cr3t"));
    }

    #[test]
    fn test_repeated_header_flags() {
        let opts = crate::TagsweepOptions::parse_from([
            "tagsweep",
            "--header",
            "X-Tenant: acme",
            "-H",
            "Accept: application/json",
        ]);

        let header_map: HashMap<String, String> = opts.config.header.into_iter().collect();
        assert_eq!(header_map.len(), 2);
        assert_eq!(header_map["x-tenant"], "acme");
        assert_eq!(header_map["accept"], "application/json");
    }

    #[test]
    fn test_cli_headers_win_over_config_file() {
        let toml: Config = toml::from_str(
            r#"
            [header]
            Accept = "application/json"
            X-Tenant = "from-file"
            "#,
        )
        .unwrap();

        let mut cli =
            crate::TagsweepOptions::parse_from(["tagsweep", "-H", "X-Tenant: from-cli"]).config;
        cli.merge(toml);

        cli.header.sort();
        assert_eq!(
            cli.header,
            vec![
                ("Accept".to_string(), "application/json".to_string()),
                ("x-tenant".to_string(), "from-cli".to_string()),
            ]
        );
    }

    #[test]
    fn test_cli_values_win_over_config_file() {
        let mut cli = crate::TagsweepOptions::parse_from([
            "tagsweep",
            "--max-concurrency",
            "5",
            "--filter-tag",
            "team",
        ])
        .config;
        let toml: Config = toml::from_str(
            r#"
            max_concurrency = 20
            burst_interval = "250ms"
            filter_tag = "owner"
            filter_value = "infra"
            run_mode = "serial"
            "#,
        )
        .unwrap();

        cli.merge(toml);

        assert_eq!(cli.max_concurrency, 5);
        assert_eq!(cli.burst_interval, Duration::from_millis(250));
        assert_eq!(cli.filter_tag.as_deref(), Some("team"));
        assert_eq!(cli.filter_value.as_deref(), Some("infra"));
        assert_eq!(cli.run_mode, RunMode::Serial);
    }

    #[test]
    fn test_filter_operation_requires_pair() {
        let config = crate::TagsweepOptions::parse_from(["tagsweep", "--filter-tag", "team"]).config;
        assert!(config.filter().is_err());

        let config = crate::TagsweepOptions::parse_from([
            "tagsweep",
            "--filter-tag",
            "team",
            "--filter-value",
            "infra",
        ])
        .config;
        assert_eq!(config.filter().unwrap(), TagFilter::pair("team", "infra").unwrap());

        let config = crate::TagsweepOptions::parse_from(["tagsweep", "--operation", "list"]).config;
        assert_eq!(config.filter().unwrap(), TagFilter::Any);
    }

    #[test]
    fn test_sweep_config_from_cli() {
        let config = crate::TagsweepOptions::parse_from([
            "tagsweep",
            "--operation",
            "list",
            "--run-mode",
            "concurrent",
            "--burst-capacity",
            "7",
            "--burst-interval",
            "2s",
            "--timeout",
            "0",
        ])
        .config;

        let sweep = config.sweep_config().unwrap();
        assert_eq!(sweep.mode, RunMode::Concurrent);
        assert_eq!(sweep.admission.burst_capacity, 7);
        assert_eq!(sweep.admission.burst_interval, Duration::from_secs(2));
        assert_eq!(sweep.admission.max_concurrency, DEFAULT_MAX_CONCURRENCY);
        assert_eq!(sweep.lookup_timeout, None);
    }

    #[test]
    fn test_stats_format_parsing() {
        assert_eq!(StatsFormat::from_str("md").unwrap(), StatsFormat::Markdown);
        assert_eq!(StatsFormat::from_str("JSON").unwrap(), StatsFormat::Json);
        assert!(StatsFormat::from_str("junit").is_err());
    }
}
