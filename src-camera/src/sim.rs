// ============================================================================
// Simulated Camera
// ============================================================================
//
// An in-process `CameraSdk` used by the demo binary and the tests. It keeps a
// property store, a small item store and a scripted or paced live-view feed,
// fires callbacks the way a tethered body does, and records every device call
// so tests can check that calls never overlap.

use std::collections::{HashMap, HashSet, VecDeque};
use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::sdk::{
    CameraAddedHandler, CameraCommand, CameraSdk, Capacity, DecodedImage, DeviceHandle,
    DeviceInfo, DeviceTime, EventHandler, EvfImage, ItemInfo, ItemRef, MAX_TEXT_LEN, ObjectEvent,
    Point, PropertyEvent, PropertyId, PropertyValue, Rect, SdkEvent, SdkResult, SdkStatus,
    ShutterButton, Size, StateEvent, VolumeInfo, evf_output, record, save_to,
};

// ============================================================================
// Call probe
// ============================================================================

/// One device call as seen by the simulated camera.
#[derive(Clone, Debug)]
pub struct CallSpan {
    pub operation: &'static str,
    pub thread: Option<String>,
    pub entered: Instant,
    pub exited: Instant,
}

/// Records device calls and the highest number seen in flight at once.
#[derive(Debug, Default)]
pub struct CallProbe {
    active: AtomicUsize,
    max_active: AtomicUsize,
    spans: Mutex<Vec<CallSpan>>,
}

impl CallProbe {
    pub fn max_concurrency(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    pub fn spans(&self) -> Vec<CallSpan> {
        self.spans.lock().clone()
    }

    /// Number of calls made to `operation`.
    pub fn count(&self, operation: &str) -> usize {
        self.spans
            .lock()
            .iter()
            .filter(|span| span.operation == operation)
            .count()
    }

    /// Whether any two recorded spans overlap in time.
    pub fn has_overlap(&self) -> bool {
        let mut spans = self.spans();
        spans.sort_by_key(|span| span.entered);
        spans
            .windows(2)
            .any(|pair| pair[1].entered < pair[0].exited)
    }

    pub fn reset(&self) {
        self.spans.lock().clear();
        self.max_active.store(0, Ordering::SeqCst);
    }

    fn enter(&self, operation: &'static str) -> CallGuard<'_> {
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(active, Ordering::SeqCst);
        CallGuard {
            probe: self,
            operation,
            entered: Instant::now(),
        }
    }
}

struct CallGuard<'a> {
    probe: &'a CallProbe,
    operation: &'static str,
    entered: Instant,
}

impl Drop for CallGuard<'_> {
    fn drop(&mut self) {
        let span = CallSpan {
            operation: self.operation,
            thread: std::thread::current().name().map(str::to_string),
            entered: self.entered,
            exited: Instant::now(),
        };
        self.probe.spans.lock().push(span);
        self.probe.active.fetch_sub(1, Ordering::SeqCst);
    }
}

// ============================================================================
// Device state
// ============================================================================

/// Where live-view frames come from.
#[derive(Clone, Debug)]
enum EvfFeed {
    /// A frame whenever `interval` has passed since the last one.
    Paced(Duration),
    /// One status per poll; `OK` yields a frame. Not-ready once exhausted.
    Scripted(VecDeque<SdkStatus>),
}

struct StoredItem {
    info: ItemInfo,
    data: Vec<u8>,
}

struct DeviceState {
    devices: Vec<DeviceInfo>,
    sessions: HashSet<u64>,
    next_handle: u64,
    properties: HashMap<PropertyId, PropertyValue>,
    feed: EvfFeed,
    last_frame: Option<Instant>,
    frames_served: u32,
    items: HashMap<ItemRef, StoredItem>,
    next_item: u64,
    volumes: Vec<VolumeInfo>,
    capacity: Option<Capacity>,
    commands: Vec<CameraCommand>,
    failures: HashMap<&'static str, SdkStatus>,
    disconnected: bool,
    call_delay: Duration,
}

impl DeviceState {
    fn new() -> Self {
        Self {
            devices: vec![DeviceInfo {
                id: 1,
                name: "Simulated EOS".to_string(),
                port: "usb:001,004".to_string(),
            }],
            sessions: HashSet::new(),
            next_handle: 1,
            properties: default_properties(),
            feed: EvfFeed::Paced(Duration::from_millis(33)),
            last_frame: None,
            frames_served: 0,
            items: HashMap::new(),
            next_item: 1,
            volumes: vec![VolumeInfo {
                index: 0,
                label: "CF".to_string(),
                max_capacity: 64 * 1024 * 1024 * 1024,
                free_space: 48 * 1024 * 1024 * 1024,
            }],
            capacity: None,
            commands: Vec::new(),
            failures: HashMap::new(),
            disconnected: false,
            call_delay: Duration::ZERO,
        }
    }

    /// Consume an injected failure for `operation`, if any.
    fn check(&mut self, operation: &'static str) -> SdkResult<()> {
        if self.disconnected {
            return Err(SdkStatus::COMM_DISCONNECTED);
        }
        match self.failures.remove(operation) {
            Some(status) => Err(status),
            None => Ok(()),
        }
    }

    fn check_handle(&mut self, operation: &'static str, handle: DeviceHandle) -> SdkResult<()> {
        self.check(operation)?;
        if self.sessions.contains(&handle.0) {
            Ok(())
        } else {
            Err(SdkStatus::INVALID_HANDLE)
        }
    }

    fn u32_property(&self, id: PropertyId) -> u32 {
        self.properties
            .get(&id)
            .and_then(PropertyValue::as_u32)
            .unwrap_or_default()
    }

    fn add_item(&mut self, name: String, data: Vec<u8>) -> ItemRef {
        let item = ItemRef(self.next_item);
        self.next_item += 1;
        let info = ItemInfo {
            name,
            size: data.len() as u64,
            is_folder: false,
        };
        self.items.insert(item, StoredItem { info, data });
        item
    }

    fn next_frame_status(&mut self) -> SdkStatus {
        match &mut self.feed {
            EvfFeed::Scripted(script) => script.pop_front().unwrap_or(SdkStatus::OBJECT_NOTREADY),
            EvfFeed::Paced(interval) => {
                let due = self
                    .last_frame
                    .is_none_or(|last| last.elapsed() >= *interval);
                if due {
                    SdkStatus::OK
                } else {
                    SdkStatus::OBJECT_NOTREADY
                }
            }
        }
    }
}

fn default_properties() -> HashMap<PropertyId, PropertyValue> {
    let coordinate_system = Size {
        width: 6000,
        height: 4000,
    };
    let zoom_rect = Rect {
        origin: Point { x: 0, y: 0 },
        size: coordinate_system,
    };
    HashMap::from([
        (PropertyId::PRODUCT_NAME, PropertyValue::Text("Simulated EOS".to_string())),
        (PropertyId::OWNER_NAME, PropertyValue::Text(String::new())),
        (PropertyId::ARTIST, PropertyValue::Text(String::new())),
        (PropertyId::COPYRIGHT, PropertyValue::Text(String::new())),
        (
            PropertyId::DATE_TIME,
            PropertyValue::Time(DeviceTime {
                year: 2024,
                month: 1,
                day: 1,
                hour: 12,
                minute: 0,
                second: 0,
            }),
        ),
        (PropertyId::BATTERY_LEVEL, PropertyValue::UInt32(100)),
        (PropertyId::SAVE_TO, PropertyValue::UInt32(save_to::CAMERA)),
        (PropertyId::AE_MODE, PropertyValue::UInt32(3)),
        (PropertyId::DRIVE_MODE, PropertyValue::UInt32(0)),
        (PropertyId::ISO_SPEED, PropertyValue::UInt32(0x48)),
        (PropertyId::METERING_MODE, PropertyValue::UInt32(3)),
        (PropertyId::AV, PropertyValue::UInt32(0x30)),
        (PropertyId::TV, PropertyValue::UInt32(0x60)),
        (PropertyId::EXPOSURE_COMPENSATION, PropertyValue::UInt32(0)),
        (PropertyId::EVF_OUTPUT_DEVICE, PropertyValue::UInt32(evf_output::TFT)),
        (PropertyId::EVF_MODE, PropertyValue::UInt32(1)),
        (PropertyId::EVF_ZOOM, PropertyValue::UInt32(1)),
        (PropertyId::EVF_ZOOM_POSITION, PropertyValue::Point(Point::default())),
        (PropertyId::RECORD, PropertyValue::UInt32(record::END)),
        (PropertyId::EVF_COORDINATE_SYSTEM, PropertyValue::Size(coordinate_system)),
        (PropertyId::EVF_ZOOM_RECT, PropertyValue::Rect(zoom_rect)),
    ])
}

#[derive(Default)]
struct Handlers {
    events: Option<(DeviceHandle, Arc<dyn EventHandler>)>,
    camera_added: Option<CameraAddedHandler>,
}

// ============================================================================
// Simulated camera
// ============================================================================

pub struct SimulatedCamera {
    state: Mutex<DeviceState>,
    handlers: Mutex<Handlers>,
    probe: Arc<CallProbe>,
}

impl Default for SimulatedCamera {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedCamera {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(DeviceState::new()),
            handlers: Mutex::new(Handlers::default()),
            probe: Arc::new(CallProbe::default()),
        }
    }

    pub fn probe(&self) -> Arc<CallProbe> {
        Arc::clone(&self.probe)
    }

    /// Keep every device call busy for `delay`, widening overlap windows.
    pub fn set_call_delay(&self, delay: Duration) {
        self.state.lock().call_delay = delay;
    }

    /// Serve live-view frames from `statuses`, one per poll.
    pub fn script_live_view(&self, statuses: impl IntoIterator<Item = SdkStatus>) {
        self.state.lock().feed = EvfFeed::Scripted(statuses.into_iter().collect());
    }

    /// Serve a frame whenever `interval` has passed since the last one.
    pub fn pace_live_view(&self, interval: Duration) {
        self.state.lock().feed = EvfFeed::Paced(interval);
    }

    /// Make the next call to `operation` fail with `status`.
    pub fn fail_next(&self, operation: &'static str, status: SdkStatus) {
        self.state.lock().failures.insert(operation, status);
    }

    pub fn frames_served(&self) -> u32 {
        self.state.lock().frames_served
    }

    pub fn commands(&self) -> Vec<CameraCommand> {
        self.state.lock().commands.clone()
    }

    pub fn capacity(&self) -> Option<Capacity> {
        self.state.lock().capacity
    }

    pub fn property(&self, id: PropertyId) -> Option<PropertyValue> {
        self.state.lock().properties.get(&id).cloned()
    }

    pub fn has_event_handler(&self) -> bool {
        self.handlers.lock().events.is_some()
    }

    /// Put a file on the card and return its reference.
    pub fn add_item(&self, name: &str, data: Vec<u8>) -> ItemRef {
        self.state.lock().add_item(name.to_string(), data)
    }

    /// Deliver `event` to the installed handler on the calling thread.
    pub fn emit(&self, event: SdkEvent) {
        let handler = self
            .handlers
            .lock()
            .events
            .as_ref()
            .map(|(_, handler)| Arc::clone(handler));
        match handler {
            Some(handler) => handler.handle_event(event),
            None => log::trace!("[Sim] No handler for {:?}", event),
        }
    }

    /// Deliver `event` from a separate thread, as the SDK does for most
    /// object events.
    pub fn emit_async(&self, event: SdkEvent) {
        let handler = self
            .handlers
            .lock()
            .events
            .as_ref()
            .map(|(_, handler)| Arc::clone(handler));
        let Some(handler) = handler else {
            log::trace!("[Sim] No handler for {:?}", event);
            return;
        };
        let spawned = std::thread::Builder::new()
            .name("sim-events".to_string())
            .spawn(move || handler.handle_event(event));
        if let Err(e) = spawned {
            log::warn!("[Sim] Could not spawn event thread: {}", e);
        }
    }

    /// Plug in another body and fire the camera-added callback.
    pub fn attach_camera(&self, name: &str) -> DeviceInfo {
        let device = {
            let mut state = self.state.lock();
            let id = state.devices.iter().map(|d| d.id).max().unwrap_or(0) + 1;
            let device = DeviceInfo {
                id,
                name: name.to_string(),
                port: format!("usb:001,{:03}", id + 3),
            };
            state.devices.push(device.clone());
            device
        };
        let handler = self.handlers.lock().camera_added.clone();
        if let Some(handler) = handler {
            handler();
        }
        device
    }

    /// Pull the cable: every later call fails and a shutdown event fires from
    /// another thread.
    pub fn disconnect(&self) {
        self.state.lock().disconnected = true;
        self.emit_async(SdkEvent::State {
            event: StateEvent::Shutdown,
            param: 0,
        });
    }

    fn enter(&self, operation: &'static str) -> CallGuard<'_> {
        let guard = self.probe.enter(operation);
        let delay = self.state.lock().call_delay;
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
        guard
    }

    fn shot_name(prefix: &str, item: u64, extension: &str) -> String {
        format!("{}_{:04}.{}", prefix, item, extension)
    }

    /// Events follow a shutter release: straight to the host, or onto the card.
    fn capture(&self) -> SdkEvent {
        let mut state = self.state.lock();
        let target = state.u32_property(PropertyId::SAVE_TO);
        let seed = state.next_item;
        let name = Self::shot_name("IMG", seed, "JPG");
        let item = state.add_item(name, fake_jpeg(seed as u32));
        let event = if target == save_to::CAMERA {
            ObjectEvent::DirItemCreated
        } else {
            ObjectEvent::DirItemRequestTransfer
        };
        SdkEvent::Object { event, item }
    }

    fn finish_movie(&self) -> SdkEvent {
        let mut state = self.state.lock();
        let seed = state.next_item;
        let name = Self::shot_name("MVI", seed, "MOV");
        let item = state.add_item(name, vec![0u8; 4096]);
        SdkEvent::Object {
            event: ObjectEvent::DirItemCreated,
            item,
        }
    }
}

/// A few bytes that look like a JPEG to anyone checking the magic.
fn fake_jpeg(seed: u32) -> Vec<u8> {
    let mut data = vec![0xFF, 0xD8, 0xFF, 0xE0];
    data.extend_from_slice(&seed.to_le_bytes());
    data.extend(std::iter::repeat_n(0u8, 248));
    data.extend_from_slice(&[0xFF, 0xD9]);
    data
}

impl CameraSdk for SimulatedCamera {
    fn device_list(&self) -> SdkResult<Vec<DeviceInfo>> {
        let _call = self.enter("device_list");
        let mut state = self.state.lock();
        state.check("device_list")?;
        Ok(state.devices.clone())
    }

    fn open_session(&self, device_id: u32) -> SdkResult<DeviceHandle> {
        let _call = self.enter("open_session");
        let mut state = self.state.lock();
        state.check("open_session")?;
        if !state.devices.iter().any(|d| d.id == device_id) {
            return Err(SdkStatus::DEVICE_NOT_FOUND);
        }
        let handle = DeviceHandle(state.next_handle);
        state.next_handle += 1;
        state.sessions.insert(handle.0);
        Ok(handle)
    }

    fn close_session(&self, handle: DeviceHandle) -> SdkResult<()> {
        let _call = self.enter("close_session");
        let mut state = self.state.lock();
        state.check_handle("close_session", handle)?;
        state.sessions.remove(&handle.0);
        Ok(())
    }

    fn get_property(&self, handle: DeviceHandle, id: PropertyId) -> SdkResult<PropertyValue> {
        let _call = self.enter("get_property");
        let mut state = self.state.lock();
        state.check_handle("get_property", handle)?;
        state
            .properties
            .get(&id)
            .cloned()
            .ok_or(SdkStatus::INVALID_PARAMETER)
    }

    fn set_property(
        &self,
        handle: DeviceHandle,
        id: PropertyId,
        value: &PropertyValue,
    ) -> SdkResult<()> {
        let movie_finished = {
            let _call = self.enter("set_property");
            let mut state = self.state.lock();
            state.check_handle("set_property", handle)?;
            let Some(current) = state.properties.get(&id) else {
                return Err(SdkStatus::INVALID_PARAMETER);
            };
            if current.encoding() != value.encoding() {
                return Err(SdkStatus::INVALID_PARAMETER);
            }
            if let PropertyValue::Text(text) = value {
                if text.len() > MAX_TEXT_LEN {
                    return Err(SdkStatus::INVALID_PARAMETER);
                }
            }
            let was_recording = state.u32_property(PropertyId::RECORD) == record::BEGIN;
            state.properties.insert(id, value.clone());
            id == PropertyId::RECORD && was_recording && value.as_u32() == Some(record::END)
        };

        self.emit(SdkEvent::Property {
            event: PropertyEvent::PropertyChanged,
            property: id,
            param: 0,
        });
        if movie_finished {
            let event = self.finish_movie();
            self.emit_async(event);
        }
        Ok(())
    }

    fn send_command(&self, handle: DeviceHandle, command: CameraCommand) -> SdkResult<()> {
        {
            let _call = self.enter("send_command");
            let mut state = self.state.lock();
            state.check_handle("send_command", handle)?;
            state.commands.push(command);
        }

        let released = matches!(
            command,
            CameraCommand::PressShutter(ShutterButton::Completely)
                | CameraCommand::PressShutter(ShutterButton::CompletelyNonAf)
                | CameraCommand::BulbEnd
        );
        if released {
            let event = self.capture();
            self.emit_async(event);
        }
        Ok(())
    }

    fn set_event_handler(
        &self,
        handle: DeviceHandle,
        handler: Option<Arc<dyn EventHandler>>,
    ) -> SdkResult<()> {
        let _call = self.enter("set_event_handler");
        self.state.lock().check_handle("set_event_handler", handle)?;
        self.handlers.lock().events = handler.map(|handler| (handle, handler));
        Ok(())
    }

    fn set_camera_added_handler(&self, handler: Option<CameraAddedHandler>) -> SdkResult<()> {
        let _call = self.enter("set_camera_added_handler");
        self.handlers.lock().camera_added = handler;
        Ok(())
    }

    fn set_capacity(&self, handle: DeviceHandle, capacity: Capacity) -> SdkResult<()> {
        let _call = self.enter("set_capacity");
        let mut state = self.state.lock();
        state.check_handle("set_capacity", handle)?;
        state.capacity = Some(capacity);
        Ok(())
    }

    fn volumes(&self, handle: DeviceHandle) -> SdkResult<Vec<VolumeInfo>> {
        let _call = self.enter("volumes");
        let mut state = self.state.lock();
        state.check_handle("volumes", handle)?;
        Ok(state.volumes.clone())
    }

    fn format_volume(&self, handle: DeviceHandle, volume: u32) -> SdkResult<()> {
        let _call = self.enter("format_volume");
        let mut state = self.state.lock();
        state.check_handle("format_volume", handle)?;
        let Some(found) = state.volumes.iter_mut().find(|v| v.index == volume) else {
            return Err(SdkStatus::INVALID_PARAMETER);
        };
        found.free_space = found.max_capacity;
        state.items.clear();
        Ok(())
    }

    fn item_info(&self, item: ItemRef) -> SdkResult<ItemInfo> {
        let _call = self.enter("item_info");
        let mut state = self.state.lock();
        state.check("item_info")?;
        state
            .items
            .get(&item)
            .map(|stored| stored.info.clone())
            .ok_or(SdkStatus::INVALID_HANDLE)
    }

    fn download(
        &self,
        item: ItemRef,
        sink: &mut dyn Write,
        progress: &mut dyn FnMut(u32),
    ) -> SdkResult<()> {
        let _call = self.enter("download");
        let data = {
            let mut state = self.state.lock();
            state.check("download")?;
            match state.items.get(&item) {
                Some(stored) => stored.data.clone(),
                None => return Err(SdkStatus::INVALID_HANDLE),
            }
        };

        let chunk = data.len().div_ceil(4).max(1);
        let mut written = 0usize;
        for part in data.chunks(chunk) {
            sink.write_all(part).map_err(|_| SdkStatus::FILE_IO_ERROR)?;
            written += part.len();
            progress((written * 100 / data.len()) as u32);
        }
        if data.is_empty() {
            progress(100);
        }
        Ok(())
    }

    fn download_complete(&self, item: ItemRef) -> SdkResult<()> {
        let _call = self.enter("download_complete");
        let mut state = self.state.lock();
        state.check("download_complete")?;
        if state.items.contains_key(&item) {
            Ok(())
        } else {
            Err(SdkStatus::INVALID_HANDLE)
        }
    }

    fn download_evf_image(&self, handle: DeviceHandle) -> SdkResult<EvfImage> {
        let _call = self.enter("download_evf_image");
        let mut state = self.state.lock();
        state.check_handle("download_evf_image", handle)?;
        if state.u32_property(PropertyId::EVF_OUTPUT_DEVICE) & evf_output::PC == 0 {
            return Err(SdkStatus::OBJECT_NOTREADY);
        }

        let status = state.next_frame_status();
        if !status.is_ok() {
            return Err(status);
        }

        state.last_frame = Some(Instant::now());
        state.frames_served += 1;
        let zoom_position = match state.properties.get(&PropertyId::EVF_ZOOM_POSITION) {
            Some(PropertyValue::Point(point)) => *point,
            _ => Point::default(),
        };
        let zoom_rect = match state.properties.get(&PropertyId::EVF_ZOOM_RECT) {
            Some(PropertyValue::Rect(rect)) => *rect,
            _ => Rect::default(),
        };
        Ok(EvfImage {
            data: fake_jpeg(state.frames_served),
            zoom: state.u32_property(PropertyId::EVF_ZOOM),
            zoom_position,
            zoom_rect,
        })
    }

    fn decode_image(&self, data: &[u8]) -> SdkResult<DecodedImage> {
        let _call = self.enter("decode_image");
        self.state.lock().check("decode_image")?;
        if data.len() < 4 || data[..2] != [0xFF, 0xD8] {
            return Err(SdkStatus::INVALID_PARAMETER);
        }
        Ok(DecodedImage {
            width: 4,
            height: 2,
            channels: 3,
            pixels: vec![0x80; 4 * 2 * 3],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open(camera: &SimulatedCamera) -> DeviceHandle {
        camera.open_session(1).unwrap()
    }

    #[test]
    fn test_scripted_feed_then_not_ready() {
        let camera = SimulatedCamera::new();
        let handle = open(&camera);
        camera
            .set_property(
                handle,
                PropertyId::EVF_OUTPUT_DEVICE,
                &PropertyValue::UInt32(evf_output::PC),
            )
            .unwrap();
        camera.script_live_view([SdkStatus::OBJECT_NOTREADY, SdkStatus::OK]);

        assert_eq!(
            camera.download_evf_image(handle).unwrap_err(),
            SdkStatus::OBJECT_NOTREADY
        );
        assert!(camera.download_evf_image(handle).is_ok());
        assert_eq!(
            camera.download_evf_image(handle).unwrap_err(),
            SdkStatus::OBJECT_NOTREADY
        );
        assert_eq!(camera.frames_served(), 1);
    }

    #[test]
    fn test_injected_failure_fires_once() {
        let camera = SimulatedCamera::new();
        camera.fail_next("open_session", SdkStatus::DEVICE_BUSY);
        assert_eq!(camera.open_session(1).unwrap_err(), SdkStatus::DEVICE_BUSY);
        assert!(camera.open_session(1).is_ok());
    }

    #[test]
    fn test_download_reports_progress() {
        let camera = SimulatedCamera::new();
        let item = camera.add_item("IMG_0001.JPG", fake_jpeg(1));
        let mut sink = Vec::new();
        let mut seen = Vec::new();
        camera
            .download(item, &mut sink, &mut |percent| seen.push(percent))
            .unwrap();
        assert_eq!(sink, fake_jpeg(1));
        assert_eq!(seen.last(), Some(&100));
        assert!(seen.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_probe_counts_calls() {
        let camera = SimulatedCamera::new();
        let handle = open(&camera);
        camera.get_property(handle, PropertyId::ISO_SPEED).unwrap();
        let probe = camera.probe();
        assert_eq!(probe.count("open_session"), 1);
        assert_eq!(probe.count("get_property"), 1);
        assert_eq!(probe.max_concurrency(), 1);
        assert!(!probe.has_overlap());
    }

    #[test]
    fn test_calls_after_close_are_rejected() {
        let camera = SimulatedCamera::new();
        let handle = open(&camera);
        camera.close_session(handle).unwrap();
        assert_eq!(
            camera.get_property(handle, PropertyId::AV).unwrap_err(),
            SdkStatus::INVALID_HANDLE
        );
    }
}
