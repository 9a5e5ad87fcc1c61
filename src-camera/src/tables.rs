// ============================================================================
// Id <-> Name Tables
// ============================================================================
//
// Pure lookups used for log lines and notifications. A miss never fails, it
// yields the UNKNOWN_* sentinel instead.

pub const UNKNOWN_NAME: &str = "Unknown";
pub const UNKNOWN_ID: u32 = 0xFFFF_FFFF;

pub const PROPERTY_NAMES: &[(u32, &str)] = &[
    (0x0000_0002, "ProductName"),
    (0x0000_0004, "OwnerName"),
    (0x0000_0006, "DateTime"),
    (0x0000_0008, "BatteryLevel"),
    (0x0000_000B, "SaveTo"),
    (0x0000_0400, "AEMode"),
    (0x0000_0401, "DriveMode"),
    (0x0000_0402, "ISOSpeed"),
    (0x0000_0403, "MeteringMode"),
    (0x0000_0405, "Av"),
    (0x0000_0406, "Tv"),
    (0x0000_0407, "ExposureCompensation"),
    (0x0000_0418, "Artist"),
    (0x0000_0419, "Copyright"),
    (0x0000_0500, "Evf_OutputDevice"),
    (0x0000_0501, "Evf_Mode"),
    (0x0000_0507, "Evf_Zoom"),
    (0x0000_0508, "Evf_ZoomPosition"),
    (0x0000_0510, "Record"),
    (0x0000_0540, "Evf_CoordinateSystem"),
    (0x0000_0541, "Evf_ZoomRect"),
];

pub const STATUS_NAMES: &[(u32, &str)] = &[
    (0x0000_0000, "OK"),
    (0x0000_0001, "UNIMPLEMENTED"),
    (0x0000_0002, "INTERNAL_ERROR"),
    (0x0000_0003, "MEM_ALLOC_FAILED"),
    (0x0000_0020, "FILE_IO_ERROR"),
    (0x0000_0060, "INVALID_PARAMETER"),
    (0x0000_0061, "INVALID_HANDLE"),
    (0x0000_0080, "DEVICE_NOT_FOUND"),
    (0x0000_0081, "DEVICE_BUSY"),
    (0x0000_0082, "DEVICE_INVALID"),
    (0x0000_00C0, "COMM_PORT_IS_IN_USE"),
    (0x0000_00C1, "COMM_DISCONNECTED"),
    (0x0000_2003, "SESSION_NOT_OPEN"),
    (0x0000_8D01, "TAKE_PICTURE_AF_NG"),
    (0x0000_A102, "OBJECT_NOTREADY"),
];

pub const EVENT_NAMES: &[(u32, &str)] = &[
    (0x0000_0101, "PropertyChanged"),
    (0x0000_0102, "PropertyDescChanged"),
    (0x0000_0204, "DirItemCreated"),
    (0x0000_0205, "DirItemRemoved"),
    (0x0000_0206, "VolumeInfoChanged"),
    (0x0000_0208, "DirItemRequestTransfer"),
    (0x0000_0301, "Shutdown"),
    (0x0000_0302, "JobStatusChanged"),
    (0x0000_0303, "WillSoonShutDown"),
    (0x0000_0304, "ShutDownTimerUpdate"),
    (0x0000_0306, "CaptureError"),
    (0x0000_0307, "InternalError"),
    (0x0000_0309, "BulbExposureTime"),
];

fn name_for(table: &[(u32, &'static str)], id: u32) -> &'static str {
    table
        .iter()
        .find(|(entry, _)| *entry == id)
        .map(|(_, name)| *name)
        .unwrap_or(UNKNOWN_NAME)
}

fn id_for(table: &[(u32, &'static str)], name: &str) -> u32 {
    table
        .iter()
        .find(|(_, entry)| *entry == name)
        .map(|(id, _)| *id)
        .unwrap_or(UNKNOWN_ID)
}

pub fn property_name(id: u32) -> &'static str {
    name_for(PROPERTY_NAMES, id)
}

pub fn property_id(name: &str) -> u32 {
    id_for(PROPERTY_NAMES, name)
}

pub fn status_name(code: u32) -> &'static str {
    name_for(STATUS_NAMES, code)
}

pub fn status_code(name: &str) -> u32 {
    id_for(STATUS_NAMES, name)
}

pub fn event_name(code: u32) -> &'static str {
    name_for(EVENT_NAMES, code)
}

pub fn event_code(name: &str) -> u32 {
    id_for(EVENT_NAMES, name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_entry_round_trips() {
        for table in [PROPERTY_NAMES, STATUS_NAMES, EVENT_NAMES] {
            for (_, name) in table {
                assert_eq!(name_for(table, id_for(table, name)), *name);
            }
        }
    }

    #[test]
    fn test_misses_return_sentinels() {
        assert_eq!(property_name(0x1234_5678), UNKNOWN_NAME);
        assert_eq!(property_id("NoSuchProperty"), UNKNOWN_ID);
        assert_eq!(status_name(0xDEAD), UNKNOWN_NAME);
        assert_eq!(status_code(""), UNKNOWN_ID);
        assert_eq!(event_name(UNKNOWN_ID), UNKNOWN_NAME);
        assert_eq!(event_code("Unknown"), UNKNOWN_ID);
    }

    #[test]
    fn test_tables_have_unique_ids() {
        for table in [PROPERTY_NAMES, STATUS_NAMES, EVENT_NAMES] {
            let mut ids: Vec<u32> = table.iter().map(|(id, _)| *id).collect();
            ids.sort_unstable();
            ids.dedup();
            assert_eq!(ids.len(), table.len());
        }
    }
}
