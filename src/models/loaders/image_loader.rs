//! 图片批次加载器
//!
//! 扫描声明的目录列表，产出确定性顺序的图片批次：
//! 目录内按文件名字典序，目录间按声明顺序拼接

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::fs;

/// 支持的图片扩展名
const SUPPORTED_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "webp"];

/// 一张待处理的图片
#[derive(Debug, Clone)]
pub struct ImageFile {
    /// 绝对路径（传给文件选择器）
    pub path: PathBuf,
    /// 显示名（仅用于日志）
    pub display_name: String,
}

/// 从单个目录加载图片，按文件名排序
pub async fn load_images_from_folder(folder_path: &Path) -> Result<Vec<ImageFile>> {
    if !folder_path.exists() {
        anyhow::bail!("图片目录不存在: {}", folder_path.display());
    }

    let mut images = Vec::new();
    let mut entries = fs::read_dir(folder_path)
        .await
        .with_context(|| format!("无法读取目录: {}", folder_path.display()))?;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if !is_supported_image(&path) {
            continue;
        }
        let display_name = path
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string();
        let absolute = if path.is_absolute() {
            path
        } else {
            std::env::current_dir()?.join(path)
        };
        images.push(ImageFile {
            path: absolute,
            display_name,
        });
    }

    images.sort_by(|a, b| a.display_name.cmp(&b.display_name));

    tracing::info!(
        "📂 目录 {} 中找到 {} 张图片",
        folder_path.display(),
        images.len()
    );
    Ok(images)
}

/// 按声明顺序加载所有目录，拼接为一个批次
///
/// 单个目录加载失败只记 warn，不影响其余目录
pub async fn load_image_batch(folders: &[String]) -> Result<Vec<ImageFile>> {
    let mut batch = Vec::new();

    for folder in folders {
        match load_images_from_folder(Path::new(folder)).await {
            Ok(mut images) => batch.append(&mut images),
            Err(e) => {
                tracing::warn!("⚠️ 跳过目录 {}: {}", folder, e);
            }
        }
    }

    Ok(batch)
}

fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .and_then(|s| s.to_str())
        .map(|ext| {
            let ext = ext.to_lowercase();
            SUPPORTED_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs as std_fs;

    fn temp_folder(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "whisk_loader_test_{}_{}",
            name,
            std::process::id()
        ));
        let _ = std_fs::remove_dir_all(&dir);
        std_fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn touch(dir: &Path, name: &str) {
        std_fs::write(dir.join(name), b"x").unwrap();
    }

    #[test]
    fn test_extension_filter() {
        assert!(is_supported_image(Path::new("a.png")));
        assert!(is_supported_image(Path::new("a.JPG")));
        assert!(is_supported_image(Path::new("a.webp")));
        assert!(!is_supported_image(Path::new("a.gif")));
        assert!(!is_supported_image(Path::new("a")));
    }

    #[tokio::test]
    async fn test_folder_sorted_lexicographically() {
        let dir = temp_folder("sort");
        touch(&dir, "b.png");
        touch(&dir, "a.jpg");
        touch(&dir, "c.webp");
        touch(&dir, "notes.txt");

        let images = load_images_from_folder(&dir).await.unwrap();
        let names: Vec<_> = images.iter().map(|i| i.display_name.as_str()).collect();
        assert_eq!(names, vec!["a.jpg", "b.png", "c.webp"]);

        let _ = std_fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_batch_concatenates_in_declared_order() {
        let dir1 = temp_folder("batch1");
        let dir2 = temp_folder("batch2");
        touch(&dir1, "z.png");
        touch(&dir2, "a.png");
        touch(&dir2, "b.png");

        let folders = vec![
            dir1.to_string_lossy().to_string(),
            dir2.to_string_lossy().to_string(),
        ];
        let batch = load_image_batch(&folders).await.unwrap();
        let names: Vec<_> = batch.iter().map(|i| i.display_name.as_str()).collect();
        // 目录 1 在前，即使其文件名字典序更大
        assert_eq!(names, vec!["z.png", "a.png", "b.png"]);

        let _ = std_fs::remove_dir_all(&dir1);
        let _ = std_fs::remove_dir_all(&dir2);
    }

    #[tokio::test]
    async fn test_missing_folder_skipped() {
        let dir = temp_folder("exists");
        touch(&dir, "a.png");

        let folders = vec![
            "/definitely/not/a/folder".to_string(),
            dir.to_string_lossy().to_string(),
        ];
        let batch = load_image_batch(&folders).await.unwrap();
        assert_eq!(batch.len(), 1);

        let _ = std_fs::remove_dir_all(&dir);
    }
}
