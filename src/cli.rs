use clap::Parser;

/// Inserted into the file name of the rewritten archive
const SUFFIX: &str = "_transcoded";

#[derive(Parser, Debug)]
#[command(name = "zipcyr")]
#[command(version)]
#[command(about = "Rewrite a ZIP archive with its entry names transcoded to UTF-8", long_about = None)]
#[command(after_help = "Examples:\n  \
  zipcyr file.zip          creates file_transcoded.zip next to file.zip\n  \
  zipcyr -v dir/old.zip    also show the detected encoding of every name")]
pub struct Cli {
    /// ZIP archive to transcode
    #[arg(value_name = "FILE")]
    pub file: String,

    /// Only report errors
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Show encoding detection details
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Path of the archive to write.
    pub fn destination(&self) -> String {
        transcoded_path(&self.file)
    }
}

/// Derive the output path for `source`.
///
/// Only the last path segment changes. A file name with exactly one dot
/// gets the suffix before its extension; any other file name gets it
/// appended at the end.
pub fn transcoded_path(source: &str) -> String {
    let (dir, file_name) = match source.rsplit_once('/') {
        Some((dir, file_name)) => (Some(dir), file_name),
        None => (None, source),
    };

    let renamed = match file_name.split_once('.') {
        Some((stem, ext)) if !ext.contains('.') => format!("{stem}{SUFFIX}.{ext}"),
        _ => format!("{file_name}{SUFFIX}"),
    };

    match dir {
        Some(dir) => format!("{dir}/{renamed}"),
        None => renamed,
    }
}
