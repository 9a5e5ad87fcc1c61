// ============================================================================
// Downloads - Card to Host
// ============================================================================

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{CameraError, CameraResult};
use crate::notify::{DownloadedImage, Notification, NotificationHub};
use crate::sdk::{CameraSdk, ItemRef};

/// Transfer of one item into the download directory.
pub(crate) struct DownloadJob {
    pub item: ItemRef,
    pub dir: PathBuf,
    pub decode: bool,
    pub hub: Arc<NotificationHub>,
}

impl DownloadJob {
    /// Runs under the device-access lock. Publishes progress while the item
    /// streams and a downloaded notification once it is on disk.
    pub(crate) fn run(self, sdk: &dyn CameraSdk) -> CameraResult<PathBuf> {
        let info = sdk
            .item_info(self.item)
            .map_err(|status| CameraError::sdk("item_info", status))?;
        if info.is_folder {
            log::debug!("[Download] Skipping folder {}", info.name);
            return Ok(self.dir);
        }

        fs::create_dir_all(&self.dir)?;
        let path = target_path(&self.dir, &info.name, self.item);
        log::info!("[Download] {} -> {}", info.name, path.display());

        let mut writer = BufWriter::new(File::create(&path)?);
        let mut last_percent = None;
        let hub = &self.hub;
        sdk.download(self.item, &mut writer, &mut |percent| {
            if last_percent != Some(percent) {
                last_percent = Some(percent);
                hub.publish(Notification::Progress { percent });
            }
        })
        .map_err(|status| CameraError::sdk("download", status))?;
        writer.flush()?;
        drop(writer);

        sdk.download_complete(self.item)
            .map_err(|status| CameraError::sdk("download_complete", status))?;

        if self.decode && info.is_image() {
            let bytes = fs::read(&path)?;
            let image = sdk
                .decode_image(&bytes)
                .map_err(|status| CameraError::sdk("decode_image", status))?;
            self.hub.publish(Notification::ImageDownloaded(DownloadedImage {
                path: path.clone(),
                image,
            }));
        } else {
            self.hub.publish(Notification::FileDownloaded { path: path.clone() });
        }
        Ok(path)
    }
}

/// Keep only the file name the device reported; fall back to the item id.
fn target_path(dir: &Path, name: &str, item: ItemRef) -> PathBuf {
    match Path::new(name).file_name() {
        Some(file_name) => dir.join(file_name),
        None => dir.join(format!("item-{}", item.0)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimulatedCamera;

    #[test]
    fn test_target_path_strips_directories() {
        let dir = Path::new("/tmp/shots");
        assert_eq!(
            target_path(dir, "DCIM/100CANON/IMG_0001.JPG", ItemRef(1)),
            dir.join("IMG_0001.JPG")
        );
        assert_eq!(target_path(dir, "..", ItemRef(7)), dir.join("item-7"));
    }

    #[test]
    fn test_image_is_written_and_decoded() {
        let dir = tempfile::tempdir().unwrap();
        let camera = SimulatedCamera::new();
        let mut data = vec![0xFF, 0xD8, 0xFF, 0xE0];
        data.extend_from_slice(&[1, 2, 3, 4]);
        let item = camera.add_item("IMG_0042.JPG", data.clone());

        let hub = Arc::new(NotificationHub::new());
        let rx = hub.subscribe();
        let job = DownloadJob {
            item,
            dir: dir.path().to_path_buf(),
            decode: true,
            hub: Arc::clone(&hub),
        };
        let path = job.run(&camera).unwrap();

        assert_eq!(fs::read(&path).unwrap(), data);
        let notifications: Vec<_> = rx.try_iter().collect();
        assert!(matches!(
            notifications.first(),
            Some(Notification::Progress { .. })
        ));
        assert!(matches!(
            notifications.last(),
            Some(Notification::ImageDownloaded(image)) if image.path == path
        ));
    }

    #[test]
    fn test_movie_is_not_decoded() {
        let dir = tempfile::tempdir().unwrap();
        let camera = SimulatedCamera::new();
        let item = camera.add_item("MVI_0001.MOV", vec![0u8; 64]);
        let hub = Arc::new(NotificationHub::new());
        let rx = hub.subscribe();
        let job = DownloadJob {
            item,
            dir: dir.path().to_path_buf(),
            decode: true,
            hub,
        };
        let path = job.run(&camera).unwrap();
        assert!(
            rx.try_iter()
                .any(|n| matches!(n, Notification::FileDownloaded { path: p } if p == path))
        );
        assert_eq!(camera.probe().count("decode_image"), 0);
    }
}
