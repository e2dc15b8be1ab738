//! Layered configuration for downscale.
//!
//! Values are merged, lowest priority first, from:
//!
//! 1. built-in defaults,
//! 2. a configuration file (TOML, YAML or JSON, chosen by extension): either
//!    the one given explicitly or `config.{toml,yaml,yml,json}` in the
//!    platform configuration directory,
//! 3. `DOWNSCALE_*` environment variables, with `__` separating nested keys
//!    (`DOWNSCALE_STORE__REGION=eu-west-1`),
//! 4. command-line [`Overrides`].
//!
//! ```toml
//! source_bucket = "photos"
//! destination_bucket = "thumbnails"
//! scale = 0.25
//! workers = 16
//!
//! [store]
//! kind = "s3"
//! region = "cn-northwest-1"
//! key_id = "AKIA..."
//! key_secret = "..."
//! ```

pub mod error;

use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use downscale_transcode::ScaleFactor;
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use serde::{Deserialize, Serialize};
use std::ffi::OsStr;
use std::fmt;
use std::path::{Path, PathBuf};

/// Prefix shared by every environment variable the configuration reads.
pub const ENV_PREFIX: &str = "DOWNSCALE_";
/// Worker pool size when none is configured.
pub const DEFAULT_WORKERS: usize = 64;
/// File names looked for in the platform configuration directory, in order.
const DEFAULT_FILE_NAMES: [&str; 4] = ["config.toml", "config.yaml", "config.yml", "config.json"];

/// Which object store to talk to, and how.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum StoreConfig {
    /// Any S3-compatible service.
    S3 {
        region: String,
        /// Custom endpoint for non-AWS services; path-style addressing is
        /// always used.
        #[serde(default)]
        endpoint: Option<String>,
        key_id: String,
        key_secret: String,
    },
    /// Buckets are directories beneath `root`.
    Local { root: PathBuf },
}

// Keep credentials out of logs.
impl fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::S3 { region, endpoint, key_id, .. } => f
                .debug_struct("S3")
                .field("region", region)
                .field("endpoint", endpoint)
                .field("key_id", key_id)
                .field("key_secret", &"<redacted>")
                .finish(),
            Self::Local { root } => f.debug_struct("Local").field("root", root).finish(),
        }
    }
}

/// Everything a run needs to know; static once loaded.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub store: StoreConfig,
    /// Bucket whose images are read.
    pub source_bucket: String,
    /// Bucket the scaled images are written to, under their original keys.
    pub destination_bucket: String,
    #[serde(default)]
    pub scale: ScaleFactor,
    /// Maximum number of leaves processed at once.
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// List and transcode, but skip every upload.
    #[serde(default)]
    pub dry_run: bool,
}

fn default_workers() -> usize {
    DEFAULT_WORKERS
}

/// Values given on the command line; each one set replaces whatever the
/// file and environment said.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Overrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_bucket: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination_bucket: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scale: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workers: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dry_run: Option<bool>,
}

impl Config {
    /// The first configuration file found in the platform configuration
    /// directory (`~/.config/downscale/` on Linux), if any.
    pub fn default_path() -> Option<PathBuf> {
        let dirs = ProjectDirs::from("", "", "downscale")?;
        DEFAULT_FILE_NAMES.iter().map(|name| dirs.config_dir().join(name)).find(|path| path.is_file())
    }

    /// Layer the file and environment sources.
    ///
    /// An explicit `path` must exist; without one the platform default is
    /// used if present, and skipped silently otherwise.
    pub fn figment(path: Option<&Path>) -> Result<Figment> {
        let file = match path {
            Some(path) if !path.is_file() => {
                exn::bail!(ErrorKind::Load(format!("no such configuration file: {}", path.display())));
            },
            Some(path) => Some(path.to_path_buf()),
            None => Self::default_path(),
        };
        let mut figment = Figment::new();
        if let Some(file) = file {
            tracing::debug!(path = %file.display(), "Reading configuration file");
            figment = merge_file(figment, &file)?;
        }
        Ok(figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
    }

    /// Load, merge and validate every configuration source.
    pub fn load(path: Option<&Path>, overrides: &Overrides) -> Result<Self> {
        Self::from_figment(&Self::figment(path)?.merge(Serialized::defaults(overrides)))
    }

    /// Extract and validate a configuration from already-layered sources.
    pub fn from_figment(figment: &Figment) -> Result<Self> {
        let config: Self =
            figment.extract().or_raise(|| ErrorKind::Load("could not extract configuration".to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check the values that deserialisation alone cannot.
    pub fn validate(&self) -> Result<()> {
        if self.source_bucket.trim().is_empty() {
            exn::bail!(ErrorKind::Invalid("source_bucket must not be empty".to_string()));
        }
        if self.destination_bucket.trim().is_empty() {
            exn::bail!(ErrorKind::Invalid("destination_bucket must not be empty".to_string()));
        }
        if self.workers == 0 {
            exn::bail!(ErrorKind::Invalid("workers must be at least 1".to_string()));
        }
        match &self.store {
            StoreConfig::S3 { region, key_id, .. } => {
                if region.trim().is_empty() {
                    exn::bail!(ErrorKind::Invalid("store.region must not be empty".to_string()));
                }
                if key_id.trim().is_empty() {
                    exn::bail!(ErrorKind::Invalid("store.key_id must not be empty".to_string()));
                }
            },
            StoreConfig::Local { root } => {
                if !root.is_absolute() {
                    exn::bail!(ErrorKind::Invalid(format!("store.root must be absolute: {}", root.display())));
                }
            },
        }
        if self.source_bucket == self.destination_bucket {
            tracing::warn!(bucket = %self.source_bucket, "Source and destination are the same bucket; originals will be replaced");
        }
        Ok(())
    }
}

fn merge_file(figment: Figment, path: &Path) -> Result<Figment> {
    let extension = path.extension().and_then(OsStr::to_str).map(str::to_ascii_lowercase);
    Ok(match extension.as_deref() {
        Some("toml") => figment.merge(Toml::file_exact(path)),
        Some("yaml" | "yml") => figment.merge(Yaml::file_exact(path)),
        Some("json") => figment.merge(Json::file_exact(path)),
        _ => exn::bail!(ErrorKind::Load(format!("unsupported configuration format: {}", path.display()))),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;
    use rstest::rstest;

    const MINIMAL_TOML: &str = r#"
        source_bucket = "photos"
        destination_bucket = "thumbs"

        [store]
        kind = "local"
        root = "/srv/buckets"
    "#;

    fn from_toml(toml: &str) -> Result<Config> {
        Config::from_figment(&Figment::from(Toml::string(toml)))
    }

    #[test]
    fn test_defaults() {
        let config = from_toml(MINIMAL_TOML).unwrap();
        assert_eq!(config.store, StoreConfig::Local { root: PathBuf::from("/srv/buckets") });
        assert_eq!(config.source_bucket, "photos");
        assert_eq!(config.destination_bucket, "thumbs");
        assert_eq!(config.scale, ScaleFactor::HALF);
        assert_eq!(config.workers, DEFAULT_WORKERS);
        assert!(!config.dry_run);
    }

    #[test]
    fn test_s3_store() {
        let config = from_toml(
            r#"
            source_bucket = "a"
            destination_bucket = "b"
            scale = 0.25
            workers = 8

            [store]
            kind = "s3"
            region = "us-west-004"
            endpoint = "https://s3.us-west-004.backblazeb2.com"
            key_id = "id"
            key_secret = "secret"
        "#,
        )
        .unwrap();
        assert_eq!(
            config.store,
            StoreConfig::S3 {
                region: "us-west-004".to_string(),
                endpoint: Some("https://s3.us-west-004.backblazeb2.com".to_string()),
                key_id: "id".to_string(),
                key_secret: "secret".to_string(),
            }
        );
        assert_eq!(config.scale.get(), 0.25);
        assert_eq!(config.workers, 8);
    }

    #[rstest]
    #[case::scale_too_large("scale = 1.5")]
    #[case::scale_zero("scale = 0.0")]
    #[case::negative_workers("workers = -1")]
    #[case::scale_not_a_number("scale = \"half\"")]
    fn test_rejected_while_loading(#[case] extra: &str) {
        let err = from_toml(&format!("{extra}\n{MINIMAL_TOML}")).unwrap_err();
        assert!(matches!(&*err, ErrorKind::Load(_)), "{err:?}");
    }

    #[test]
    fn test_missing_store_is_load_error() {
        let err = from_toml("source_bucket = \"a\"\ndestination_bucket = \"b\"").unwrap_err();
        assert!(matches!(&*err, ErrorKind::Load(_)));
    }

    #[rstest]
    #[case::zero_workers("photos", "thumbs", 0, "workers")]
    #[case::blank_source(" ", "thumbs", 4, "source_bucket")]
    #[case::empty_destination("photos", "", 4, "destination_bucket")]
    fn test_invalid_values(
        #[case] source: &str,
        #[case] destination: &str,
        #[case] workers: usize,
        #[case] mentions: &str,
    ) {
        let document = format!(
            "source_bucket = \"{source}\"\ndestination_bucket = \"{destination}\"\nworkers = {workers}\n\
             [store]\nkind = \"local\"\nroot = \"/srv\"\n"
        );
        let err = from_toml(&document).unwrap_err();
        match &*err {
            ErrorKind::Invalid(reason) => assert!(reason.contains(mentions), "{reason}"),
            other => panic!("expected Invalid, got {other:?}"),
        }
    }

    #[test]
    fn test_relative_local_root_is_invalid() {
        let err = from_toml(&MINIMAL_TOML.replace("/srv/buckets", "relative/dir")).unwrap_err();
        assert!(matches!(&*err, ErrorKind::Invalid(_)));
    }

    #[test]
    fn test_debug_redacts_secret() {
        let store = StoreConfig::S3 {
            region: "r".to_string(),
            endpoint: None,
            key_id: "visible".to_string(),
            key_secret: "hunter2".to_string(),
        };
        let debug = format!("{store:?}");
        assert!(debug.contains("visible"));
        assert!(!debug.contains("hunter2"));
    }

    #[rstest]
    #[case::toml("downscale.toml", MINIMAL_TOML)]
    #[case::yaml(
        "downscale.yaml",
        "source_bucket: photos\ndestination_bucket: thumbs\nstore:\n  kind: local\n  root: /srv/buckets\n"
    )]
    #[case::json(
        "downscale.json",
        r#"{"source_bucket": "photos", "destination_bucket": "thumbs", "store": {"kind": "local", "root": "/srv/buckets"}}"#
    )]
    fn test_file_formats(#[case] name: &str, #[case] contents: &str) {
        // Inside a jail so that environment set by other tests can't leak in.
        Jail::expect_with(|jail| {
            jail.create_file(name, contents)?;
            let figment = Config::figment(Some(Path::new(name))).map_err(|e| e.to_string())?;
            let config = Config::from_figment(&figment).map_err(|e| e.to_string())?;
            assert_eq!(config.source_bucket, "photos");
            assert_eq!(config.store, StoreConfig::Local { root: PathBuf::from("/srv/buckets") });
            Ok(())
        });
    }

    #[test]
    fn test_missing_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::figment(Some(&dir.path().join("absent.toml"))).unwrap_err();
        assert!(matches!(&*err, ErrorKind::Load(_)));
    }

    #[test]
    fn test_unsupported_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.ini");
        std::fs::write(&path, "workers = 4").unwrap();
        let err = Config::figment(Some(&path)).unwrap_err();
        assert!(matches!(&*err, ErrorKind::Load(reason) if reason.contains("config.ini")));
    }

    #[test]
    fn test_layering_precedence() {
        Jail::expect_with(|jail| {
            jail.create_file("downscale.toml", &format!("scale = 0.75\nworkers = 2\n{MINIMAL_TOML}"))?;
            jail.set_env("DOWNSCALE_WORKERS", "12");
            jail.set_env("DOWNSCALE_DESTINATION_BUCKET", "from-env");
            jail.set_env("DOWNSCALE_STORE__ROOT", "/from/env");

            let overrides = Overrides { destination_bucket: Some("from-cli".to_string()), ..Overrides::default() };
            let config = Config::load(Some(Path::new("downscale.toml")), &overrides).map_err(|e| e.to_string())?;

            // File only.
            assert_eq!(config.scale.get(), 0.75);
            assert_eq!(config.source_bucket, "photos");
            // Environment beats file.
            assert_eq!(config.workers, 12);
            assert_eq!(config.store, StoreConfig::Local { root: PathBuf::from("/from/env") });
            // Command line beats environment.
            assert_eq!(config.destination_bucket, "from-cli");
            Ok(())
        });
    }

    #[test]
    fn test_unset_overrides_change_nothing() {
        Jail::expect_with(|jail| {
            jail.create_file("downscale.toml", MINIMAL_TOML)?;
            let config =
                Config::load(Some(Path::new("downscale.toml")), &Overrides::default()).map_err(|e| e.to_string())?;
            assert_eq!(config.workers, DEFAULT_WORKERS);
            assert!(!config.dry_run);

            let overrides = Overrides { dry_run: Some(true), scale: Some(0.1), ..Overrides::default() };
            let config = Config::load(Some(Path::new("downscale.toml")), &overrides).map_err(|e| e.to_string())?;
            assert!(config.dry_run);
            assert_eq!(config.scale.get(), 0.1);
            Ok(())
        });
    }
}
