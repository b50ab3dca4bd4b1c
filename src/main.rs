use anyhow::{bail, Context, Result};
use clap::Parser;
use std::io::Read;
use std::path::{Path, PathBuf};

use tag_editor::{
    create_backup, scan_paths, MediaFile, TagData, TagType, TaggedFile, SUPPORTED_EXTENSIONS,
};

#[derive(Parser)]
#[command(name = "tag_editor")]
#[command(about = "读取和重写媒体文件中的元数据标签")]
#[command(version = "0.3.0")]
struct Cli {
    /// 输入媒体文件路径
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// 输出JSON文件路径（缺省打印到标准输出）
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// 显示标签统计信息
    #[arg(long)]
    stats: bool,

    /// 静默模式(仅输出错误)
    #[arg(long)]
    quiet: bool,

    /// 应用标签模式：从JSON文件应用标签数据
    #[arg(long)]
    apply_tags: Option<PathBuf>,

    /// 应用部分标签：从JSON字符串应用指定的字段
    #[arg(long)]
    apply_partial: Option<String>,

    /// 应用部分标签：从标准输入读取JSON对象（避免命令行长度限制）
    #[arg(long)]
    apply_partial_stdin: bool,

    /// 移除标签：ape、id3v1 或 all
    #[arg(long)]
    remove: Option<String>,

    /// 写入前创建带时间戳的备份
    #[arg(long)]
    backup: bool,

    /// 批量扫描：按glob模式并行读取多个文件的标签
    #[arg(long)]
    batch: Option<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // 处理不同的操作模式
    if let Some(pattern) = &cli.batch {
        return handle_batch_scan(&cli, pattern);
    }

    let input = cli
        .input
        .clone()
        .context("missing input file (use --input or --batch)")?;
    validate_input(&input)?;

    if let Some(targets) = &cli.remove {
        return handle_remove(&cli, &input, targets);
    }

    if cli.apply_partial_stdin {
        let mut json = String::new();
        std::io::stdin().read_to_string(&mut json)?;
        return handle_apply(&cli, &input, &json);
    }

    if let Some(json_file) = &cli.apply_tags {
        let json = std::fs::read_to_string(json_file)
            .with_context(|| format!("cannot read tag data from {:?}", json_file))?;
        return handle_apply(&cli, &input, &json);
    }

    if let Some(json) = &cli.apply_partial {
        return handle_apply(&cli, &input, json);
    }

    handle_export(&cli, &input)
}

/// 校验输入文件存在且扩展名受支持
fn validate_input(input: &Path) -> Result<()> {
    if !input.exists() {
        bail!("input file does not exist: {:?}", input);
    }

    let extension = input
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    if !SUPPORTED_EXTENSIONS.contains(&extension.as_str()) {
        bail!(
            "unsupported file extension {:?} (supported: {})",
            extension,
            SUPPORTED_EXTENSIONS.join(", ")
        );
    }
    Ok(())
}

/// 导出标签为JSON
fn handle_export(cli: &Cli, input: &Path) -> Result<()> {
    let file = MediaFile::open_read_only(input)
        .with_context(|| format!("cannot open {:?}", input))?;

    if cli.stats {
        print_stats(&file);
    }

    let snapshot = file.tag().snapshot();
    let json = serde_json::to_string_pretty(&snapshot)?;

    match &cli.output {
        Some(path) => {
            std::fs::write(path, &json)?;
            if !cli.quiet {
                println!("已导出标签到 {:?}", path);
            }
        }
        None => println!("{}", json),
    }
    Ok(())
}

/// 应用JSON标签数据并保存
fn handle_apply(cli: &Cli, input: &Path, json: &str) -> Result<()> {
    let data: TagData =
        serde_json::from_str(json).context("invalid tag data JSON")?;
    if data.is_empty() {
        bail!("tag data contains no fields to apply");
    }

    if cli.backup {
        let backup_path = create_backup(input)?;
        if !cli.quiet {
            println!("已创建备份: {:?}", backup_path);
        }
    }

    let mut file =
        MediaFile::open(input).with_context(|| format!("cannot open {:?}", input))?;

    // 文件尚无标签时按容器首选格式建立一个
    if file.tag().tag_count() == 0 {
        let primary = file
            .kind()
            .map(|kind| kind.primary_tag_type())
            .unwrap_or(TagType::Ape);
        file.add_tag(primary);
    }

    file.tag_mut().apply(&data)?;
    file.save()?;
    file.close()?;

    if !cli.quiet {
        println!("已更新 {:?}", input);
    }
    Ok(())
}

/// 移除指定格式的标签
fn handle_remove(cli: &Cli, input: &Path, targets: &str) -> Result<()> {
    if cli.backup {
        let backup_path = create_backup(input)?;
        if !cli.quiet {
            println!("已创建备份: {:?}", backup_path);
        }
    }

    let mut file =
        MediaFile::open(input).with_context(|| format!("cannot open {:?}", input))?;

    match targets.to_ascii_lowercase().as_str() {
        "ape" => file.strip(TagType::Ape)?,
        "id3v1" => file.strip(TagType::Id3v1)?,
        "all" => file.remove_tags()?,
        other => bail!("unknown tag type {:?} (expected ape, id3v1 or all)", other),
    }
    file.close()?;

    if !cli.quiet {
        println!("已从 {:?} 移除标签", input);
    }
    Ok(())
}

/// 批量扫描匹配的文件
fn handle_batch_scan(cli: &Cli, pattern: &str) -> Result<()> {
    let paths: Vec<PathBuf> = glob::glob(pattern)
        .context("invalid glob pattern")?
        .filter_map(|entry| entry.ok())
        .filter(|path| {
            path.extension()
                .and_then(|e| e.to_str())
                .map(|e| SUPPORTED_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
                .unwrap_or(false)
        })
        .collect();

    if paths.is_empty() {
        bail!("no supported files match pattern {:?}", pattern);
    }

    let results = scan_paths(&paths);

    let mut report = Vec::new();
    let mut failures = 0usize;
    for (path, result) in &results {
        match result {
            Ok(tags) => report.push(serde_json::json!({
                "path": path.display().to_string(),
                "tags": tags,
            })),
            Err(error) => {
                failures += 1;
                report.push(serde_json::json!({
                    "path": path.display().to_string(),
                    "error": error.to_string(),
                }));
            }
        }
    }

    let json = serde_json::to_string_pretty(&report)?;
    match &cli.output {
        Some(path) => {
            std::fs::write(path, &json)?;
            if !cli.quiet {
                println!("已扫描 {} 个文件（{} 个失败），结果写入 {:?}", results.len(), failures, path);
            }
        }
        None => println!("{}", json),
    }
    Ok(())
}

/// 打印标签统计信息
fn print_stats(file: &MediaFile) {
    println!("文件: {}", file.name());
    println!("长度: {} bytes", file.length());
    println!("标签数: {}", file.tag().tag_count());
    for tag in file.tag().tags() {
        println!("  - {}", tag.tag_type().description());
    }
    if file.tag().is_empty() {
        println!("所有标签字段均为空");
    }
}
