// Command-line surface: clap parses the raw flags, then `Args::validate`
// checks them in a fixed order and turns them into a `PublishConfig`.
// Every flag is parsed as an optional string so the first failing field
// is reported with our own message instead of clap's.

use crate::error::PublishError;
use clap::Parser;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

/// Provider used when `--provider` is absent or blank.
pub const DEFAULT_PROVIDER: &str = "virtualbox";

static SEMVER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[0-9]+\.[0-9]+\.[0-9]+$").unwrap());

/// Simplifies uploading boxes created by Packer
#[derive(Parser, Debug, Default)]
#[command(name = "boxpusher", disable_version_flag = true)]
pub struct Args {
    /// User name on the registry
    #[arg(short = 'u', long = "user", value_name = "USERNAME")]
    pub user: Option<String>,

    /// Version for this release (ex: 1.2.3)
    #[arg(short = 'v', long = "version", value_name = "VERSION")]
    pub version: Option<String>,

    /// Description of this release
    #[arg(short = 'd', long = "description", value_name = "TEXT")]
    pub description: Option<String>,

    /// Comma-separated names of the boxes to publish
    #[arg(short = 'b', long = "box", value_name = "NAME[,NAME...]")]
    pub boxes: Option<String>,

    /// Directory containing files named {box}-{provider}.box
    #[arg(short = 'f', long = "files", value_name = "DIR")]
    pub files: Option<String>,

    /// The provider. Defaults to virtualbox
    #[arg(short = 'p', long = "provider", value_name = "NAME")]
    pub provider: Option<String>,

    /// Print the resolved configuration and exit without uploading
    #[arg(long = "test")]
    pub test: bool,
}

/// Validated settings for one batch run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishConfig {
    pub username: String,
    pub version: String,
    pub description: String,
    pub directory: PathBuf,
    pub boxes: Vec<String>,
    pub provider: String,
}

impl PublishConfig {
    /// Registry tag of a box owned by the configured user.
    pub fn box_tag(&self, box_name: &str) -> String {
        format!("{}/{}", self.username, box_name)
    }

    /// Local artifact expected for a box: `{dir}/{box}-{provider}.box`.
    pub fn box_path(&self, box_name: &str) -> PathBuf {
        self.directory
            .join(format!("{}-{}.box", box_name, self.provider))
    }
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |v| v.trim().is_empty())
}

fn invalid(msg: &str) -> PublishError {
    PublishError::Validation(msg.to_string())
}

/// Strip trailing separators, keeping a bare root intact.
fn strip_trailing_separator(dir: &str) -> &str {
    let trimmed = dir.trim_end_matches('/');
    if trimmed.is_empty() && dir.starts_with('/') {
        "/"
    } else {
        trimmed
    }
}

/// Split the `--box` value on commas. Entries are kept verbatim, but a
/// blank entry is rejected.
pub fn split_box_names(raw: &str) -> Result<Vec<String>, PublishError> {
    let names: Vec<String> = raw.split(',').map(str::to_string).collect();
    if names.iter().any(|n| n.trim().is_empty()) {
        return Err(invalid("Box names must not be empty (check for stray commas)."));
    }
    Ok(names)
}

impl Args {
    /// Validate the parsed flags in order: user, version, description,
    /// box list, directory, provider. Only the first failure is reported.
    pub fn validate(self) -> Result<PublishConfig, PublishError> {
        if is_blank(&self.user) {
            return Err(invalid("You must provide a username"));
        }
        if is_blank(&self.version)
            || !self.version.as_deref().is_some_and(|v| SEMVER.is_match(v))
        {
            return Err(invalid(
                "You must provide a semantic version number (ex: 1.2.3)",
            ));
        }
        if is_blank(&self.description) {
            return Err(invalid("You must provide a description."));
        }
        if is_blank(&self.boxes) {
            return Err(invalid("You must provide a name for at least one box."));
        }
        let boxes = split_box_names(self.boxes.as_deref().unwrap_or_default())?;

        if is_blank(&self.files) {
            return Err(invalid("You must provide the path to an existing directory"));
        }
        let directory = strip_trailing_separator(self.files.as_deref().unwrap_or_default());
        if !Path::new(directory).is_dir() {
            return Err(invalid("You must provide the path to an existing directory"));
        }

        let provider = match self.provider {
            Some(p) if !p.trim().is_empty() => p,
            _ => DEFAULT_PROVIDER.to_string(),
        };

        Ok(PublishConfig {
            username: self.user.unwrap_or_default(),
            version: self.version.unwrap_or_default(),
            description: self.description.unwrap_or_default(),
            directory: PathBuf::from(directory),
            boxes,
            provider,
        })
    }
}
