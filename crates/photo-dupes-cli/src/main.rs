mod commands;
mod logging;
mod progress;

use std::io::{self, Write};
use std::process;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use colored::*;
use commands::{Cli, Commands};
use dotenv::dotenv;
use photo_dupes_core::analysis::{self, review, MemberOutcome, ResolveSummary};
use photo_dupes_core::hasher::{self, HashRequest};
use photo_dupes_core::scanner::{self, LoadOptions};
use photo_dupes_core::storage::Database;
use photo_dupes_core::{metadata, AppConfig};
use progress::CliReporter;
use tracing::{error, info};

fn main() {
    dotenv().ok();

    let _guard = logging::init_logger();

    let config = match photo_dupes_core::config::load_configuration() {
        Ok(config) => config,
        Err(err) => {
            error!("Error loading configuration: {}", err);
            process::exit(1);
        }
    };

    let args = Cli::parse();
    let Some(command) = args.command else {
        let _ = Cli::command().print_long_help();
        return;
    };

    if let Err(err) = run(command, &config, args.verbose) {
        error!("Error: {:#}", err);
        process::exit(1);
    }
}

fn open_database(config: &AppConfig) -> Result<Database> {
    Database::open(&config.database_url)
        .with_context(|| format!("opening database {}", config.database_url))
}

fn run(command: Commands, config: &AppConfig, verbose: bool) -> Result<()> {
    match command {
        Commands::Load {
            folder,
            media_group,
            replace,
        } => {
            let mut db = open_database(config)?;
            let options = LoadOptions {
                media_group,
                replace,
                ignore_patterns: config.ignore_patterns.clone(),
                verbose,
            };
            let summary = scanner::load_folder(&mut db, &folder, &options, &CliReporter::new())?;
            info!(
                "Found {}, inserted {}, skipped {}, dropped {} in {}",
                summary.found,
                format!("{}", summary.inserted).green(),
                summary.skipped,
                format!("{}", summary.dropped).yellow(),
                format!("{:.2}s", summary.elapsed.as_secs_f64()).green(),
            );
        }
        Commands::Exif { folder, replace } => {
            let mut db = open_database(config)?;
            let summary = metadata::fill_creation_timestamps(&mut db, &folder, replace, verbose)?;
            info!(
                "EXIF read for {} photos: {} dated, {} without a date in {}",
                summary.examined,
                format!("{}", summary.dated).green(),
                format!("{}", summary.undated).yellow(),
                format!("{:.2}s", summary.elapsed.as_secs_f64()).green(),
            );
        }
        Commands::Organize { folder, by_date } => {
            let mut db = open_database(config)?;
            let summary = metadata::organize_by_date(&mut db, &folder, &by_date, verbose)?;
            info!(
                "Organized {} photos: {} moved, {} dropped in {}",
                summary.examined,
                format!("{}", summary.moved).green(),
                format!("{}", summary.dropped).yellow(),
                format!("{:.2}s", summary.elapsed.as_secs_f64()).green(),
            );
        }
        Commands::AnExif { image } => {
            let timestamp = metadata::extract_creation_timestamp(&image);
            println!("{}", image.display().to_string().bold());
            for entry in metadata::dump_metadata(&image)? {
                println!("  [{}] {}: {}", entry.ifd, entry.tag.cyan(), entry.value);
            }
            println!("Creation date: {}", timestamp.raw.green());
        }
        Commands::Hash {
            sha,
            average,
            difference,
            perceptual,
        } => {
            let mut db = open_database(config)?;
            let request = HashRequest {
                sha,
                average,
                difference,
                perceptual,
            };
            let summary =
                hasher::run_hash_pass(&mut db, &request, config, &CliReporter::new(), verbose)?;
            info!(
                "Processed {}, dropped {}, invalid {}, failed {} in {}",
                format!("{}", summary.processed).green(),
                summary.dropped,
                format!("{}", summary.invalid).yellow(),
                format!("{}", summary.failed).red(),
                format!("{:.2}s", summary.elapsed.as_secs_f64()).green(),
            );
        }
        Commands::FindDups { hash, record } => {
            let mut db = open_database(config)?;
            let groups = analysis::find_duplicate_groups(&mut db, hash, None)?;
            if groups.is_empty() {
                println!("{}", format!("No duplicates found by {}", hash).green());
                return Ok(());
            }
            for group in &groups {
                println!(
                    "{} ({} files)",
                    group.value.to_string().bold(),
                    group.members.len()
                );
                for (i, member) in group.members.iter().enumerate() {
                    let marker = if i == group.keep { "keep".green() } else { "dupe".red() };
                    println!(
                        "  [{}] {:>6} {} ({} bytes)",
                        marker,
                        member.id,
                        member.full_path().display(),
                        member.file_size
                    );
                }
            }
            let reclaimable: i64 = groups.iter().map(|g| g.reclaimable_bytes()).sum();
            info!(
                "{} duplicate groups, {} bytes reclaimable",
                format!("{}", groups.len()).red(),
                format!("{}", reclaimable).red(),
            );
            if record {
                let basis = analysis::record_duplicate_basis(&mut db, &groups)?;
                info!(
                    "Duplicate basis: {} inserted, {} updated",
                    basis.inserted, basis.updated
                );
            }
        }
        Commands::MoveDups { hash } => {
            let mut db = open_database(config)?;
            let summary = analysis::quarantine_duplicates(&mut db, hash, config, verbose)?;
            print_resolve_summary(&summary);
        }
        Commands::DeleteDups { hash, execute } => {
            let mut db = open_database(config)?;
            let summary = analysis::delete_exact_duplicates(&mut db, hash, !execute, verbose)?;
            if !execute {
                println!(
                    "{}",
                    "Dry run: re-run with --execute to delete the files above".yellow()
                );
            }
            print_resolve_summary(&summary);
        }
        Commands::ExportCsv { out } => {
            let mut db = open_database(config)?;
            let rows = review::export_pairs_to_path(&mut db, &out)?;
            info!(
                "Wrote {} pairs to {}",
                format!("{}", rows).green(),
                out.display()
            );
        }
        Commands::ImportCsv { file } => {
            let mut db = open_database(config)?;
            let summary = review::import_decisions_from_path(&mut db, &file, verbose)
                .with_context(|| format!("importing {}", file.display()))?;
            print_resolve_summary(&summary);
        }
        Commands::ClearInvalid => {
            let mut db = open_database(config)?;
            let cleared = hasher::clear_invalid(&mut db)?;
            info!("Cleared {} invalid records", format!("{}", cleared).green());
        }
        Commands::PrintConfig => {
            println!("Configuration: {:?}", config);
        }
        Commands::TruncateDb => {
            let prompt = format!(
                "Are you SURE you want to COMPLETELY DELETE the Database {}?",
                config.database_url
            );
            if prompt_confirm(&prompt, Some(false))? {
                let mut db = open_database(config)?;
                db.truncate_all()?;
                println!("All tables truncated");
            }
        }
    }
    Ok(())
}

fn print_resolve_summary(summary: &ResolveSummary) {
    for (id, outcome) in &summary.outcomes {
        match outcome {
            MemberOutcome::Kept => {}
            MemberOutcome::Moved(to) => println!("  {} {} -> {}", "moved".green(), id, to.display()),
            MemberOutcome::Deleted => println!("  {} {}", "deleted".green(), id),
            MemberOutcome::Skipped => println!("  {} {}", "would delete".yellow(), id),
            MemberOutcome::MoveFailed(reason) | MemberOutcome::DeleteFailed(reason) => {
                println!("  {} {}: {}", "failed".red(), id, reason)
            }
        }
    }
    info!(
        "{} groups: kept {}, moved {}, deleted {}, skipped {}, failed {}, {} bytes reclaimed",
        summary.groups,
        summary.kept,
        format!("{}", summary.moved).green(),
        format!("{}", summary.deleted).green(),
        summary.skipped,
        format!("{}", summary.move_failed + summary.delete_failed).red(),
        summary.reclaimed_bytes,
    );
}

fn prompt_confirm(prompt: &str, default: Option<bool>) -> io::Result<bool> {
    let mut input = String::new();

    loop {
        input.clear();

        match default {
            Some(true) => print!("{} (Y/n): ", prompt),
            Some(false) | None => print!("{} (y/N): ", prompt),
        }
        io::stdout().flush()?;

        io::stdin().read_line(&mut input)?;

        match input.trim().to_uppercase().as_str() {
            "Y" => return Ok(true),
            "N" => return Ok(false),
            "" => match default {
                Some(default) => return Ok(default),
                None => continue,
            },
            _ => continue,
        }
    }
}
