use thiserror::Error;
use std::path::Path;

/// 自定义错误类型
#[derive(Error, Debug)]
pub enum TagError {
    #[error("Out of range: {0}")]
    OutOfRange(String),

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Format error: {0}")]
    FormatError(String),

    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// 创建文件备份
///
/// 在重写标签之前调用，备份文件名带时间戳，避免覆盖旧备份。
pub fn create_backup(file_path: &Path) -> Result<std::path::PathBuf, TagError> {
    if !file_path.exists() {
        return Err(TagError::IoError(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "原文件不存在",
        )));
    }

    let timestamp = chrono::Local::now().format("%Y-%m-%d-%H-%M-%S");
    let backup_path = file_path.with_extension(format!("{}.bak", timestamp));

    std::fs::copy(file_path, &backup_path).map_err(TagError::IoError)?;

    Ok(backup_path)
}
