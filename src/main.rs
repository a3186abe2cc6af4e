mod cli;
mod logging;

use anyhow::{bail, Context};
use clap::Parser;
use log::info;
use nu_ansi_term::Color;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use cli::{Cli, Command, FavoriteCommand, MetadataArgs};
use video_catalog::config::AppConfig;
use video_catalog::services::{
    scan_folder, untracked, CatalogDb, CategoryQuery, FFmpegExtractor, FavoritesDao,
    ThumbnailCache, VideoDao,
};
use video_catalog::utils::format_size;
use video_catalog::{ThumbnailState, VideoMetadata, VideoRecord, VideoStatus};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config = AppConfig::from_env();
    if let Some(db) = &cli.db {
        config.db_path = db.clone();
    }
    if let Some(dir) = &cli.thumbnails {
        config.thumbnail_dir = dir.clone();
    }
    logging::init(&config.log_level, config.log_file.as_deref())?;
    config.log_warnings();

    let db = CatalogDb::open(&config.db_path)
        .with_context(|| format!("无法打开数据库 {}", config.db_path.display()))?;
    let result = run(&cli, &config, &db).await;
    db.close()?;
    result
}

async fn run(cli: &Cli, config: &AppConfig, db: &CatalogDb) -> anyhow::Result<()> {
    let videos = VideoDao::new(db);
    let favorites = FavoritesDao::new(db);

    match &cli.command {
        Command::Add { path, metadata } => {
            let metadata = validated(metadata)?;
            let video = videos.insert(&path_key(path), &metadata)?;
            print_record(&video, cli.json)?;
        }
        Command::Update { id, metadata } => {
            let metadata = validated(metadata)?;
            let video = videos.update(*id, &metadata)?;
            print_record(&video, cli.json)?;
        }
        Command::Delete { id } => {
            videos.delete(*id)?;
            println!("deleted video {}", id);
        }
        Command::Show { path } => match videos.get_by_path(&path_key(path))? {
            Some(video) => print_record(&video, cli.json)?,
            None => bail!("video '{}' is not in the catalog", path.display()),
        },
        Command::List { category } => {
            let list = CategoryQuery::new(db).filter(category.as_deref())?;
            print_records(&list, cli.json)?;
        }
        Command::Status { path, status } => {
            let status: VideoStatus = status.parse().map_err(anyhow::Error::msg)?;
            let video = videos.set_status(&path_key(path), status)?;
            print_record(&video, cli.json)?;
        }
        Command::Toggle { path } => {
            let video = videos.toggle_status(&path_key(path))?;
            print_record(&video, cli.json)?;
        }
        Command::Fav { command } => match command {
            FavoriteCommand::Add { id } => {
                let entry = favorites.add(*id)?;
                println!("video {} added to favorites (entry {})", entry.video_id, entry.id);
            }
            FavoriteCommand::Rm { id } => {
                favorites.remove(*id)?;
                println!("video {} removed from favorites", id);
            }
            FavoriteCommand::List => print_records(&favorites.list()?, cli.json)?,
        },
        Command::Categories => {
            let categories = CategoryQuery::new(db).categories()?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&categories)?);
            } else {
                println!("{}", video_catalog::services::ALL_CATEGORIES);
                for category in categories {
                    println!("{}", category);
                }
            }
        }
        Command::Scan { dir, all } => {
            let found = if *all {
                scan_folder(dir)?
            } else {
                untracked(dir, &videos)?
            };
            for path in found {
                println!("{}", path.display());
            }
        }
        Command::Thumb { path } => {
            let cache = thumbnail_cache(config)?;
            match cache.get_with_timeout(path, config.thumbnail_wait).await {
                Ok(ThumbnailState::Ready(artifact)) => println!("{}", artifact.display()),
                Ok(ThumbnailState::Pending) => {
                    // 命令行进程不能留着后台任务退出，继续等完
                    info!("缩略图仍在生成，继续等待");
                    println!("{}", cache.get_or_generate(path).await?.display());
                }
                Err(e) => {
                    eprintln!("{}", e);
                    println!("{}", cache.placeholder()?.display());
                }
            }
        }
        Command::Warm => {
            let cache = thumbnail_cache(config)?;
            let sources = catalog_sources(&videos)?;
            let mut failed = 0;
            for (source, result) in cache.warm(sources).await {
                match result {
                    Ok(artifact) => println!("{} -> {}", source.display(), artifact.display()),
                    Err(e) => {
                        failed += 1;
                        eprintln!("{}: {}", source.display(), e);
                    }
                }
            }
            let stats = cache.stats();
            info!(
                "预生成完成: 成功 {} 个，失败 {} 个",
                stats.completed_count, stats.failed_count
            );
            if failed > 0 {
                bail!("{} thumbnails could not be generated", failed);
            }
        }
        Command::Prune => {
            let cache = thumbnail_cache(config)?;
            let report = cache.prune(&catalog_sources(&videos)?)?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!(
                    "removed {} orphaned thumbnails ({})",
                    report.removed,
                    format_size(report.bytes)
                );
            }
        }
    }
    Ok(())
}

fn thumbnail_cache(config: &AppConfig) -> anyhow::Result<ThumbnailCache> {
    let extractor = Arc::new(FFmpegExtractor::new(config.ffmpeg.clone()));
    Ok(ThumbnailCache::new(
        &config.thumbnail_dir,
        extractor,
        config.thumbnail_workers,
    )?)
}

fn catalog_sources(videos: &VideoDao<'_>) -> anyhow::Result<Vec<PathBuf>> {
    Ok(videos
        .list_all()?
        .into_iter()
        .map(|v| PathBuf::from(v.file_path))
        .collect())
}

/// 界面层规则：五个字段都不能为空
fn validated(args: &MetadataArgs) -> anyhow::Result<VideoMetadata> {
    let metadata = args.to_metadata();
    if let Some(field) = metadata.first_blank_field() {
        bail!("metadata field '{}' must not be empty", field);
    }
    Ok(metadata)
}

fn path_key(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

fn print_record(video: &VideoRecord, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(video)?);
    } else {
        println!("{}", format_row(video));
    }
    Ok(())
}

fn print_records(list: &[VideoRecord], json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(list)?);
        return Ok(());
    }
    if list.is_empty() {
        println!("No videos to display.");
    }
    for video in list {
        println!("{}", format_row(video));
    }
    Ok(())
}

fn format_row(video: &VideoRecord) -> String {
    let status = match video.status {
        VideoStatus::Read => Color::Green.paint(video.status.as_str()),
        VideoStatus::Unread => Color::Yellow.paint(video.status.as_str()),
    };
    let m = &video.metadata;
    format!(
        "{:>4}  {:<6}  {} | {} - {} [{}] ({})  {}",
        video.id, status, m.name, m.artist, m.title, m.category, m.chord, video.file_path
    )
}
