// ============================================================================
// Notifications - What Subscribers Hear
// ============================================================================

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use crossbeam::channel::{self, Receiver, Sender};
use parking_lot::Mutex;

use crate::error::ErrorRecord;
use crate::sdk::{DecodedImage, Point, PropertyId, Rect, Size};
use crate::session::SessionState;

/// One published live-view image.
#[derive(Clone, Debug)]
pub struct LiveViewFrame {
    /// Encoded image bytes exactly as the device produced them
    pub data: Arc<[u8]>,
    /// Frame counter within the current pump run, starting at 1
    pub sequence: u64,
    pub zoom: u32,
    pub zoom_position: Point,
    pub zoom_rect: Rect,
    /// Sensor coordinate space the zoom values refer to
    pub coordinate_system: Size,
    pub captured_at: DateTime<Utc>,
}

#[derive(Clone, Debug)]
pub struct DownloadedImage {
    pub path: PathBuf,
    pub image: DecodedImage,
}

#[derive(Clone, Debug)]
pub enum Notification {
    CameraAdded,
    Progress { percent: u32 },
    LiveViewFrame(LiveViewFrame),
    ImageDownloaded(DownloadedImage),
    FileDownloaded { path: PathBuf },
    PropertyChanged { property: PropertyId, name: &'static str },
    SessionStateChanged(SessionState),
    CameraShutDown,
    SdkError(ErrorRecord),
}

/// Fan-out of notifications to any number of subscribers.
///
/// Publishing never blocks and never fails; receivers that were dropped are
/// pruned on the next publish.
#[derive(Default)]
pub struct NotificationHub {
    subscribers: Mutex<Vec<Sender<Notification>>>,
}

impl NotificationHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> Receiver<Notification> {
        let (tx, rx) = channel::unbounded();
        self.subscribers.lock().push(tx);
        rx
    }

    pub fn publish(&self, notification: Notification) {
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|tx| tx.send(notification.clone()).is_ok());
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_subscriber_gets_a_copy() {
        let hub = NotificationHub::new();
        let a = hub.subscribe();
        let b = hub.subscribe();
        hub.publish(Notification::Progress { percent: 40 });
        assert!(matches!(a.try_recv(), Ok(Notification::Progress { percent: 40 })));
        assert!(matches!(b.try_recv(), Ok(Notification::Progress { percent: 40 })));
    }

    #[test]
    fn test_dropped_receivers_are_pruned() {
        let hub = NotificationHub::new();
        let kept = hub.subscribe();
        drop(hub.subscribe());
        hub.publish(Notification::CameraAdded);
        assert_eq!(hub.subscriber_count(), 1);
        assert!(matches!(kept.try_recv(), Ok(Notification::CameraAdded)));
    }
}
