//! 从文件系统加载工程引用的图片
//!
//! data URL 内嵌的图片由核心直接解码；其余来源按相对于资源根目录的路径读取。

use std::fs;
use std::path::Path;

use anyhow::Context as _;
use tracing::warn;
use vn_core::{AssetStore, Project};

/// 加载全部图片资源
///
/// 单个资源失败不会中断：句柄被标记为失败，渲染时降级为占位图形。
pub fn load_images(project: &Project, assets_dir: &Path) -> AssetStore {
    let mut store = AssetStore::new();

    for reference in store.load_embedded(project) {
        let Some(source) = reference.image_source(project) else {
            continue;
        };
        match read_file(assets_dir, source) {
            Ok(bytes) => {
                // 解码失败时 store 已记录失败状态
                let _ = store.load_encoded(&reference.handle, &bytes);
            }
            Err(e) => {
                let message = format!("{e:#}");
                warn!(handle = %reference.handle, kind = %reference.kind, error = %message, "资源读取失败");
                store.mark_failed(&reference.handle, message);
            }
        }
    }
    store
}

fn read_file(assets_dir: &Path, source: &str) -> anyhow::Result<Vec<u8>> {
    let path = assets_dir.join(source);
    fs::read(&path).with_context(|| format!("读取资源失败: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine as _;
    use base64::engine::general_purpose::STANDARD;
    use vn_core::{AssetCatalog, AssetEntry, AssetState, Scene};

    fn png_data_url() -> String {
        let mut bytes = std::io::Cursor::new(Vec::new());
        image::RgbaImage::new(1, 1)
            .write_to(&mut bytes, image::ImageFormat::Png)
            .unwrap();
        format!("data:image/png;base64,{}", STANDARD.encode(bytes.into_inner()))
    }

    #[test]
    fn test_data_url_and_missing_file() {
        let mut scene = Scene::new("a");
        scene.background_id = Some("bg".to_string());
        scene.character_id = Some("hero".to_string());
        let project = Project {
            scenes: vec![scene],
            backgrounds: vec![AssetEntry {
                id: "bg".to_string(),
                name: "room".to_string(),
                image: png_data_url(),
            }],
            ..Project::default()
        };

        let store = load_images(&project, Path::new("no-such-dir"));
        assert!(matches!(store.image("bg"), AssetState::Ready(img) if img.dimensions() == (1, 1)));
        match store.image("hero") {
            AssetState::Failed(message) => assert!(message.contains("读取资源失败"), "{message}"),
            _ => panic!("hero 应该加载失败"),
        }
    }

    #[test]
    fn test_read_file_error_names_path() {
        let err = read_file(Path::new("no-such-dir"), "hero.png").unwrap_err();
        assert!(format!("{err:#}").contains("hero.png"));
    }
}
