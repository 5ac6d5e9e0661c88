use clap::{Parser, Subcommand};
use photo_dupes_core::storage::{FingerprintKind, MediaGroup};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "photo-dupes")]
#[command(about = "Find and resolve duplicate photos and videos", long_about = None)]
pub struct Cli {
    /// Log every record touched, not just the summaries
    #[arg(long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Scan a folder and record every photo and video found
    Load {
        #[arg(long)]
        folder: PathBuf,
        /// Only load Photo or Video files
        #[arg(long)]
        media_group: Option<MediaGroup>,
        /// Empty the database before loading
        #[arg(long)]
        replace: bool,
    },
    /// Read EXIF creation dates for photos under a folder
    Exif {
        #[arg(long)]
        folder: String,
        /// Re-read records that already have a date
        #[arg(long)]
        replace: bool,
    },
    /// Move photos from a folder into <root>/<year>/<month> by creation date
    Organize {
        #[arg(long)]
        folder: PathBuf,
        /// Root of the year/month tree
        #[arg(long = "by-date", value_name = "ROOT")]
        by_date: PathBuf,
    },
    /// Print every EXIF tag of one image
    AnExif {
        #[arg(long)]
        image: PathBuf,
    },
    /// Compute missing fingerprints
    Hash {
        #[arg(long)]
        sha: bool,
        #[arg(long)]
        average: bool,
        #[arg(long)]
        difference: bool,
        #[arg(long)]
        perceptual: bool,
    },
    /// List groups of records sharing a fingerprint
    FindDups {
        /// sha, average, difference or perceptual
        #[arg(long)]
        hash: FingerprintKind,
        /// Store which value made each member a duplicate
        #[arg(long)]
        record: bool,
    },
    /// Move duplicates under the managed root into the quarantine folder
    MoveDups {
        #[arg(long)]
        hash: FingerprintKind,
    },
    /// Delete byte-identical duplicates, keeping the longest file name
    DeleteDups {
        #[arg(long, default_value = "sha")]
        hash: FingerprintKind,
        /// Actually delete; without this only a report is printed
        #[arg(long)]
        execute: bool,
    },
    /// Export pairs of identical files to CSV for review
    ExportCsv {
        #[arg(long)]
        out: PathBuf,
    },
    /// Delete the files chosen in a reviewed CSV
    ImportCsv {
        #[arg(long)]
        file: PathBuf,
    },
    /// Let the next hash pass retry files marked undecodable
    ClearInvalid,
    /// Print configuration values
    PrintConfig,
    /// Truncate all database tables
    TruncateDb,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hash_kind() {
        let cli = Cli::parse_from(["photo-dupes", "find-dups", "--hash", "difference"]);
        match cli.command {
            Some(Commands::FindDups { hash, record }) => {
                assert_eq!(hash, FingerprintKind::Difference);
                assert!(!record);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_unknown_hash_kind_is_rejected() {
        let result = Cli::try_parse_from(["photo-dupes", "move-dups", "--hash", "crc32"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_verbose_after_subcommand() {
        let cli = Cli::parse_from(["photo-dupes", "delete-dups", "--verbose"]);
        assert!(cli.verbose);
        assert!(matches!(
            cli.command,
            Some(Commands::DeleteDups {
                hash: FingerprintKind::Sha,
                execute: false
            })
        ));
    }

    #[test]
    fn test_load_media_group() {
        let cli = Cli::parse_from([
            "photo-dupes",
            "load",
            "--folder",
            "/photos",
            "--media-group",
            "video",
        ]);
        assert!(matches!(
            cli.command,
            Some(Commands::Load {
                media_group: Some(MediaGroup::Video),
                replace: false,
                ..
            })
        ));
    }

    #[test]
    fn test_organize_needs_a_root() {
        let cli = Cli::parse_from([
            "photo-dupes",
            "organize",
            "--folder",
            "/roll",
            "--by-date",
            "/photos",
        ]);
        match cli.command {
            Some(Commands::Organize { folder, by_date }) => {
                assert_eq!(folder, PathBuf::from("/roll"));
                assert_eq!(by_date, PathBuf::from("/photos"));
            }
            other => panic!("unexpected command {:?}", other),
        }
        assert!(Cli::try_parse_from(["photo-dupes", "organize", "--folder", "/roll"]).is_err());
    }
}
