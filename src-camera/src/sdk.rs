// ============================================================================
// Native SDK Boundary
// ============================================================================
//
// Everything the engine needs from the vendor SDK, expressed as a trait so a
// real binding and the simulated camera plug in the same way. Methods take
// `&self`: callers are serialized by the execution engine, implementations
// keep whatever interior state they need.

use std::fmt;
use std::io::Write;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::tables;

// ============================================================================
// Status codes
// ============================================================================

/// Raw status returned by a native call. Zero means success.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SdkStatus(pub u32);

impl SdkStatus {
    pub const OK: SdkStatus = SdkStatus(0x0000_0000);
    pub const UNIMPLEMENTED: SdkStatus = SdkStatus(0x0000_0001);
    pub const INTERNAL_ERROR: SdkStatus = SdkStatus(0x0000_0002);
    pub const MEM_ALLOC_FAILED: SdkStatus = SdkStatus(0x0000_0003);
    pub const FILE_IO_ERROR: SdkStatus = SdkStatus(0x0000_0020);
    pub const INVALID_PARAMETER: SdkStatus = SdkStatus(0x0000_0060);
    pub const INVALID_HANDLE: SdkStatus = SdkStatus(0x0000_0061);
    pub const DEVICE_NOT_FOUND: SdkStatus = SdkStatus(0x0000_0080);
    pub const DEVICE_BUSY: SdkStatus = SdkStatus(0x0000_0081);
    pub const DEVICE_INVALID: SdkStatus = SdkStatus(0x0000_0082);
    pub const COMM_PORT_IN_USE: SdkStatus = SdkStatus(0x0000_00C0);
    pub const COMM_DISCONNECTED: SdkStatus = SdkStatus(0x0000_00C1);
    pub const SESSION_NOT_OPEN: SdkStatus = SdkStatus(0x0000_2003);
    pub const TAKE_PICTURE_AF_NG: SdkStatus = SdkStatus(0x0000_8D01);
    pub const OBJECT_NOTREADY: SdkStatus = SdkStatus(0x0000_A102);

    pub fn is_ok(self) -> bool {
        self == Self::OK
    }

    /// The device has not produced the next live-view frame yet.
    pub fn is_not_ready(self) -> bool {
        self == Self::OBJECT_NOTREADY
    }

    /// Statuses that mean the connection to the device is gone.
    pub fn is_connection_loss(self) -> bool {
        matches!(self, Self::DEVICE_NOT_FOUND | Self::DEVICE_INVALID | Self::COMM_DISCONNECTED)
    }

    pub fn name(self) -> &'static str {
        tables::status_name(self.0)
    }
}

impl fmt::Display for SdkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (0x{:08X})", self.name(), self.0)
    }
}

pub type SdkResult<T> = Result<T, SdkStatus>;

// ============================================================================
// Devices and items
// ============================================================================

/// Opaque handle of an open device session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DeviceHandle(pub u64);

/// A camera as reported by device enumeration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub id: u32,
    pub name: String,
    pub port: String,
}

/// Reference to a file or folder on the device storage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ItemRef(pub u64);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ItemInfo {
    pub name: String,
    pub size: u64,
    pub is_folder: bool,
}

impl ItemInfo {
    /// Whether the item is a still image the SDK can decode.
    pub fn is_image(&self) -> bool {
        let lower = self.name.to_ascii_lowercase();
        [".jpg", ".jpeg", ".cr2", ".cr3", ".tif"]
            .iter()
            .any(|ext| lower.ends_with(ext))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VolumeInfo {
    pub index: u32,
    pub label: String,
    pub max_capacity: u64,
    pub free_space: u64,
}

/// Capacity record the host declares before receiving downloads.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Capacity {
    pub number_of_free_clusters: i32,
    pub bytes_per_sector: i32,
    pub reset: bool,
}

impl Capacity {
    /// Declared regardless of actual disk space; the device only needs a
    /// large enough value to keep shooting.
    pub fn host_default() -> Self {
        Self {
            number_of_free_clusters: 0x7FFF_FFFF,
            bytes_per_sector: 0x1000,
            reset: true,
        }
    }
}

// ============================================================================
// Properties
// ============================================================================

/// Numeric identifier of a device property.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PropertyId(pub u32);

impl PropertyId {
    pub const PRODUCT_NAME: PropertyId = PropertyId(0x0000_0002);
    pub const OWNER_NAME: PropertyId = PropertyId(0x0000_0004);
    pub const DATE_TIME: PropertyId = PropertyId(0x0000_0006);
    pub const BATTERY_LEVEL: PropertyId = PropertyId(0x0000_0008);
    pub const SAVE_TO: PropertyId = PropertyId(0x0000_000B);
    pub const AE_MODE: PropertyId = PropertyId(0x0000_0400);
    pub const DRIVE_MODE: PropertyId = PropertyId(0x0000_0401);
    pub const ISO_SPEED: PropertyId = PropertyId(0x0000_0402);
    pub const METERING_MODE: PropertyId = PropertyId(0x0000_0403);
    pub const AV: PropertyId = PropertyId(0x0000_0405);
    pub const TV: PropertyId = PropertyId(0x0000_0406);
    pub const EXPOSURE_COMPENSATION: PropertyId = PropertyId(0x0000_0407);
    pub const ARTIST: PropertyId = PropertyId(0x0000_0418);
    pub const COPYRIGHT: PropertyId = PropertyId(0x0000_0419);
    pub const EVF_OUTPUT_DEVICE: PropertyId = PropertyId(0x0000_0500);
    pub const EVF_MODE: PropertyId = PropertyId(0x0000_0501);
    pub const EVF_ZOOM: PropertyId = PropertyId(0x0000_0507);
    pub const EVF_ZOOM_POSITION: PropertyId = PropertyId(0x0000_0508);
    pub const RECORD: PropertyId = PropertyId(0x0000_0510);
    pub const EVF_COORDINATE_SYSTEM: PropertyId = PropertyId(0x0000_0540);
    pub const EVF_ZOOM_RECT: PropertyId = PropertyId(0x0000_0541);

    /// Documented wire encoding of this property.
    pub fn encoding(self) -> PropertyEncoding {
        match self {
            Self::PRODUCT_NAME | Self::OWNER_NAME | Self::ARTIST | Self::COPYRIGHT => {
                PropertyEncoding::Text
            }
            Self::DATE_TIME
            | Self::EVF_ZOOM_POSITION
            | Self::EVF_COORDINATE_SYSTEM
            | Self::EVF_ZOOM_RECT => PropertyEncoding::Struct,
            _ => PropertyEncoding::UInt32,
        }
    }

    pub fn name(self) -> &'static str {
        tables::property_name(self.0)
    }
}

impl fmt::Display for PropertyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (0x{:04X})", self.name(), self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PropertyEncoding {
    UInt32,
    /// Fixed-length ASCII, at most [`MAX_TEXT_LEN`] bytes.
    Text,
    Struct,
}

/// Longest ASCII payload a text property accepts.
pub const MAX_TEXT_LEN: usize = 32;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Size {
    pub width: i32,
    pub height: i32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub origin: Point,
    pub size: Size,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceTime {
    pub year: u32,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PropertyValue {
    UInt32(u32),
    Text(String),
    Point(Point),
    Size(Size),
    Rect(Rect),
    Time(DeviceTime),
}

impl PropertyValue {
    pub fn encoding(&self) -> PropertyEncoding {
        match self {
            PropertyValue::UInt32(_) => PropertyEncoding::UInt32,
            PropertyValue::Text(_) => PropertyEncoding::Text,
            _ => PropertyEncoding::Struct,
        }
    }

    pub fn as_u32(&self) -> Option<u32> {
        match self {
            PropertyValue::UInt32(v) => Some(*v),
            _ => None,
        }
    }
}

/// Values of [`PropertyId::SAVE_TO`].
pub mod save_to {
    pub const CAMERA: u32 = 1;
    pub const HOST: u32 = 2;
    pub const BOTH: u32 = 3;
}

/// Bits of [`PropertyId::EVF_OUTPUT_DEVICE`].
pub mod evf_output {
    pub const NONE: u32 = 0;
    pub const TFT: u32 = 1;
    pub const PC: u32 = 2;
}

/// Values of [`PropertyId::RECORD`].
pub mod record {
    pub const END: u32 = 0;
    pub const BEGIN: u32 = 4;
}

// ============================================================================
// Commands and images
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShutterButton {
    Off,
    Halfway,
    Completely,
    CompletelyNonAf,
}

/// Device commands issued through the SDK's send-command entry point.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CameraCommand {
    PressShutter(ShutterButton),
    BulbStart,
    BulbEnd,
    ExtendShutDownTimer,
    EvfAutoFocus(bool),
}

/// One live-view image as handed back by the device.
#[derive(Clone, Debug, Default)]
pub struct EvfImage {
    pub data: Vec<u8>,
    pub zoom: u32,
    pub zoom_position: Point,
    pub zoom_rect: Rect,
}

/// Raw pixel buffer produced by the SDK image decoder.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    pub channels: u8,
    pub pixels: Vec<u8>,
}

// ============================================================================
// Callbacks
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ObjectEvent {
    VolumeInfoChanged,
    DirItemCreated,
    DirItemRemoved,
    DirItemRequestTransfer,
    Other(u32),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PropertyEvent {
    PropertyChanged,
    PropertyDescChanged,
    Other(u32),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StateEvent {
    Shutdown,
    JobStatusChanged,
    WillSoonShutDown,
    ShutDownTimerUpdate,
    CaptureError,
    InternalError,
    BulbExposureTime,
    Other(u32),
}

impl StateEvent {
    /// Native event code, for lookups in the event name table.
    pub fn code(self) -> u32 {
        match self {
            Self::Shutdown => 0x0000_0301,
            Self::JobStatusChanged => 0x0000_0302,
            Self::WillSoonShutDown => 0x0000_0303,
            Self::ShutDownTimerUpdate => 0x0000_0304,
            Self::CaptureError => 0x0000_0306,
            Self::InternalError => 0x0000_0307,
            Self::BulbExposureTime => 0x0000_0309,
            Self::Other(code) => code,
        }
    }
}

/// A native callback invocation, already split by category.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SdkEvent {
    Object { event: ObjectEvent, item: ItemRef },
    Property { event: PropertyEvent, property: PropertyId, param: u32 },
    State { event: StateEvent, param: u32 },
}

/// Receiver of native callbacks. Invoked on whatever thread the SDK uses.
pub trait EventHandler: Send + Sync {
    fn handle_event(&self, event: SdkEvent);
}

pub type CameraAddedHandler = Arc<dyn Fn() + Send + Sync>;

// ============================================================================
// The SDK itself
// ============================================================================

/// Device-facing entry points. Only the execution engine calls these.
pub trait CameraSdk: Send + Sync {
    fn device_list(&self) -> SdkResult<Vec<DeviceInfo>>;

    fn open_session(&self, device_id: u32) -> SdkResult<DeviceHandle>;

    fn close_session(&self, handle: DeviceHandle) -> SdkResult<()>;

    fn get_property(&self, handle: DeviceHandle, id: PropertyId) -> SdkResult<PropertyValue>;

    fn set_property(
        &self,
        handle: DeviceHandle,
        id: PropertyId,
        value: &PropertyValue,
    ) -> SdkResult<()>;

    fn send_command(&self, handle: DeviceHandle, command: CameraCommand) -> SdkResult<()>;

    /// Install (`Some`) or remove (`None`) the object/property/state handler.
    fn set_event_handler(
        &self,
        handle: DeviceHandle,
        handler: Option<Arc<dyn EventHandler>>,
    ) -> SdkResult<()>;

    fn set_camera_added_handler(&self, handler: Option<CameraAddedHandler>) -> SdkResult<()>;

    fn set_capacity(&self, handle: DeviceHandle, capacity: Capacity) -> SdkResult<()>;

    fn volumes(&self, handle: DeviceHandle) -> SdkResult<Vec<VolumeInfo>>;

    fn format_volume(&self, handle: DeviceHandle, volume: u32) -> SdkResult<()>;

    fn item_info(&self, item: ItemRef) -> SdkResult<ItemInfo>;

    /// Stream an item into `sink`, reporting progress percentages.
    fn download(
        &self,
        item: ItemRef,
        sink: &mut dyn Write,
        progress: &mut dyn FnMut(u32),
    ) -> SdkResult<()>;

    fn download_complete(&self, item: ItemRef) -> SdkResult<()>;

    /// Fetch the next live-view image; `OBJECT_NOTREADY` while none is ready.
    fn download_evf_image(&self, handle: DeviceHandle) -> SdkResult<EvfImage>;

    fn decode_image(&self, data: &[u8]) -> SdkResult<DecodedImage>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_event_codes_have_names() {
        for event in [
            StateEvent::Shutdown,
            StateEvent::JobStatusChanged,
            StateEvent::WillSoonShutDown,
            StateEvent::ShutDownTimerUpdate,
            StateEvent::CaptureError,
            StateEvent::InternalError,
            StateEvent::BulbExposureTime,
        ] {
            assert_eq!(tables::event_name(event.code()), format!("{:?}", event));
        }
        assert_eq!(
            tables::event_name(StateEvent::Other(0x0000_03FF).code()),
            tables::UNKNOWN_NAME
        );
    }

    #[test]
    fn test_stale_handle_is_not_connection_loss() {
        assert!(SdkStatus::COMM_DISCONNECTED.is_connection_loss());
        assert!(!SdkStatus::INVALID_HANDLE.is_connection_loss());
    }
}
