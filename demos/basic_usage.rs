//! 基本使用示例
//!
//! 这个示例展示了如何使用tag_editor库的基本功能：
//! 1. 打开媒体文件并读取标签
//! 2. 修改标签字段并保存
//! 3. 移除标签

use anyhow::Result;
use std::path::PathBuf;
use tag_editor::{MediaFile, TagType, TaggedFile, SUPPORTED_EXTENSIONS};

fn main() -> Result<()> {
    println!("媒体标签编辑工具");
    println!("支持的文件格式: {:?}", SUPPORTED_EXTENSIONS);

    // 从命令行获取文件路径
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        println!("用法: {} <媒体文件路径> [模式]", args[0]);
        println!("示例: {} song.mp3", args[0]);
        println!("示例: {} song.mp3 edit", args[0]);
        println!();
        println!("模式:");
        println!("  (无参数)  - 读取并打印标签");
        println!("  edit      - 演示标签修改功能");
        println!("  remove    - 移除所有标签");
        return Ok(());
    }

    let file_path = PathBuf::from(&args[1]);
    let mode = args.get(2).map(|s| s.as_str()).unwrap_or("read");

    if !file_path.exists() {
        eprintln!("错误: 文件不存在: {:?}", file_path);
        return Ok(());
    }

    match mode {
        "edit" => edit_tags(&file_path),
        "remove" => remove_tags(&file_path),
        _ => read_tags(&file_path),
    }
}

/// 读取并打印标签
fn read_tags(path: &PathBuf) -> Result<()> {
    let file = MediaFile::open_read_only(path)?;

    println!("\n文件: {}", file.name());
    println!("长度: {} bytes", file.length());
    println!("找到 {} 个标签:", file.tag().tag_count());
    for concrete in file.tag().tags() {
        println!("  - {}", concrete.tag_type().description());
    }

    let snapshot = file.tag().snapshot();
    println!("\n聚合视图:");
    println!("{}", serde_json::to_string_pretty(&snapshot)?);

    if let Some(genres) = file.tag().joined_genres() {
        println!("\n流派（拼接显示）: {}", genres);
    }
    Ok(())
}

/// 演示标签修改
fn edit_tags(path: &PathBuf) -> Result<()> {
    let mut file = MediaFile::open(path)?;

    // 文件尚无标签时建立APE标签
    if file.tag().tag_count() == 0 {
        file.add_tag(TagType::Ape);
        println!("文件没有标签，已建立APE标签");
    }

    let old_title = file.tag().title();
    file.tag_mut().set_title(Some("示例标题".to_string()))?;
    file.tag_mut().set_genres(vec!["Rock".to_string()])?;
    file.save()?;
    file.close()?;

    println!("标题: {:?} -> \"示例标题\"", old_title);
    println!("已保存 {:?}", path);
    Ok(())
}

/// 移除所有标签
fn remove_tags(path: &PathBuf) -> Result<()> {
    let mut file = MediaFile::open(path)?;
    let count = file.tag().tag_count();
    file.remove_tags()?;
    file.close()?;
    println!("已移除 {} 个标签", count);
    Ok(())
}
