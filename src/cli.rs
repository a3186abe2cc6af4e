use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use video_catalog::VideoMetadata;

#[derive(Parser)]
#[command(author, version, about = "Local video catalog", long_about = None)]
pub struct Cli {
    /// Catalog database (overrides CATALOG_DB)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,
    /// Thumbnail cache directory (overrides THUMBNAIL_DIR)
    #[arg(long, global = true)]
    pub thumbnails: Option<PathBuf>,
    /// Print JSON instead of text
    #[arg(long, global = true)]
    pub json: bool,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Args, Debug)]
pub struct MetadataArgs {
    #[arg(long)]
    pub name: String,
    #[arg(long)]
    pub artist: String,
    #[arg(long)]
    pub title: String,
    #[arg(long)]
    pub category: String,
    #[arg(long)]
    pub chord: String,
}

impl MetadataArgs {
    pub fn to_metadata(&self) -> VideoMetadata {
        VideoMetadata {
            name: self.name.trim().to_string(),
            artist: self.artist.trim().to_string(),
            title: self.title.trim().to_string(),
            category: self.category.trim().to_string(),
            chord: self.chord.trim().to_string(),
        }
    }
}

#[derive(Subcommand)]
pub enum Command {
    /// Register a video file with its metadata
    Add {
        path: PathBuf,
        #[command(flatten)]
        metadata: MetadataArgs,
    },
    /// Overwrite the metadata of a video
    Update {
        id: i64,
        #[command(flatten)]
        metadata: MetadataArgs,
    },
    /// Delete a video (and its favorite entry)
    Delete { id: i64 },
    /// Show one video by path
    Show { path: PathBuf },
    /// List videos, optionally filtered by category ("All" lists everything)
    List {
        #[arg(long)]
        category: Option<String>,
    },
    /// Set read/unread status
    Status { path: PathBuf, status: String },
    /// Flip read/unread status
    Toggle { path: PathBuf },
    /// Manage favorites
    Fav {
        #[command(subcommand)]
        command: FavoriteCommand,
    },
    /// List known categories
    Categories,
    /// List video files in a folder that are not cataloged yet
    Scan {
        dir: PathBuf,
        /// include files already in the catalog
        #[arg(long)]
        all: bool,
    },
    /// Print the thumbnail path for a video, generating it if needed
    Thumb { path: PathBuf },
    /// Generate thumbnails for every cataloged video
    Warm,
    /// Delete thumbnails that no cataloged video maps to anymore
    Prune,
}

#[derive(Subcommand)]
pub enum FavoriteCommand {
    /// Add a video to favorites
    Add { id: i64 },
    /// Remove a video from favorites
    Rm { id: i64 },
    /// List favorite videos
    List,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_add() {
        let cli = Cli::try_parse_from([
            "video-catalog", "add", "a.mp4", "--name", "A", "--artist", "X", "--title", "T",
            "--category", "Music", "--chord", "C",
        ])
        .unwrap();
        match cli.command {
            Command::Add { path, metadata } => {
                assert_eq!(path, PathBuf::from("a.mp4"));
                assert_eq!(metadata.to_metadata().category, "Music");
            }
            _ => panic!("expected add"),
        }
    }

    #[test]
    fn test_parse_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["video-catalog", "list", "--category", "Music", "--json"]).unwrap();
        assert!(cli.json);
        assert!(matches!(cli.command, Command::List { category: Some(ref c) } if c == "Music"));
    }
}
