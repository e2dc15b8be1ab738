use clap::Parser;
use downscale_config::Overrides;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "downscale")]
#[command(author, version, about = "Scale down every image in an object-store bucket")]
pub struct Cli {
    /// Path to config file (TOML, YAML or JSON)
    #[arg(short, long, env = "DOWNSCALE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Bucket to read images from
    #[arg(long, value_name = "BUCKET")]
    pub source: Option<String>,

    /// Bucket to write scaled images to
    #[arg(long, value_name = "BUCKET")]
    pub destination: Option<String>,

    /// Scale factor applied to width and height, in (0, 1]
    #[arg(long)]
    pub scale: Option<f64>,

    /// Maximum number of images processed at once
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Fetch and transcode, but skip every upload
    #[arg(long)]
    pub dry_run: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Print which image formats can be read, written and kept as a sequence,
    /// then exit
    #[arg(long)]
    pub list_formats: bool,
}

impl Cli {
    /// The flags that replace configured values.
    pub fn overrides(&self) -> Overrides {
        Overrides {
            source_bucket: self.source.clone(),
            destination_bucket: self.destination.clone(),
            scale: self.scale,
            workers: self.workers,
            // An absent flag must not switch off a dry run set elsewhere.
            dry_run: self.dry_run.then_some(true),
        }
    }
}
