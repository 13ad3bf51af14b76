//! Zigbee Cluster Library vocabulary: cluster ids, attribute ids, command
//! ids, status codes and data-type codes. Exposed as a stable public surface
//! (see EXTERNAL INTERFACES) -- reproduced verbatim from the wire-level
//! reference so the coordinator and handler stay interoperable with real
//! devices.

pub mod frame_ctrl {
    pub const CLUSTER_SPECIFIC: u8 = 0x01;
    pub const MANUFACTURER_SPEC: u8 = 0x04;
    pub const DIRECTION_SERVER: u8 = 0x08;
    pub const DISABLE_DEFAULT_RSP: u8 = 0x10;
}

pub mod global_cmd {
    pub const READ_ATTRIBUTES: u8 = 0x00;
    pub const READ_ATTRIBUTES_RSP: u8 = 0x01;
    pub const WRITE_ATTRIBUTES: u8 = 0x02;
    pub const WRITE_ATTRIBUTES_UNDIVIDED: u8 = 0x03;
    pub const WRITE_ATTRIBUTES_RSP: u8 = 0x04;
    pub const WRITE_ATTRIBUTES_NO_RSP: u8 = 0x05;
    pub const CONFIGURE_REPORTING: u8 = 0x06;
    pub const CONFIGURE_REPORTING_RSP: u8 = 0x07;
    pub const READ_REPORTING_CONFIG: u8 = 0x08;
    pub const READ_REPORTING_CONFIG_RSP: u8 = 0x09;
    pub const REPORT_ATTRIBUTES: u8 = 0x0A;
    pub const DEFAULT_RSP: u8 = 0x0B;
    pub const DISCOVER_ATTRIBUTES: u8 = 0x0C;
    pub const DISCOVER_ATTRIBUTES_RSP: u8 = 0x0D;
    pub const DISCOVER_COMMANDS_RECEIVED: u8 = 0x11;
    pub const DISCOVER_COMMANDS_GENERATED: u8 = 0x13;
}

pub mod status {
    pub const SUCCESS: u8 = 0x00;
    pub const FAILURE: u8 = 0x01;
    pub const NOT_AUTHORIZED: u8 = 0x7E;
    pub const MALFORMED_COMMAND: u8 = 0x80;
    pub const UNSUP_CLUSTER_COMMAND: u8 = 0x81;
    pub const UNSUP_GENERAL_COMMAND: u8 = 0x82;
    pub const UNSUP_MANUF_CLUSTER_COMMAND: u8 = 0x83;
    pub const UNSUP_MANUF_GENERAL_COMMAND: u8 = 0x84;
    pub const INVALID_FIELD: u8 = 0x85;
    pub const UNSUPPORTED_ATTRIBUTE: u8 = 0x86;
    pub const INVALID_VALUE: u8 = 0x87;
    pub const READ_ONLY: u8 = 0x88;
    pub const INSUFFICIENT_SPACE: u8 = 0x89;
    pub const DUPLICATE_EXISTS: u8 = 0x8A;
    pub const NOT_FOUND: u8 = 0x8B;
    pub const UNREPORTABLE_ATTRIBUTE: u8 = 0x8C;
    pub const INVALID_DATA_TYPE: u8 = 0x8D;
    pub const INVALID_SELECTOR: u8 = 0x8E;
    pub const WRITE_ONLY: u8 = 0x8F;
    pub const INCONSISTENT_STARTUP_STATE: u8 = 0x90;
    pub const DEFINED_OUT_OF_BAND: u8 = 0x91;
    pub const ACTION_DENIED: u8 = 0x93;
    pub const TIMEOUT: u8 = 0x94;
    pub const ABORT: u8 = 0x95;
    pub const INVALID_IMAGE: u8 = 0x96;
    pub const WAIT_FOR_DATA: u8 = 0x97;
    pub const NO_IMAGE_AVAILABLE: u8 = 0x98;
    pub const REQUIRE_MORE_IMAGE: u8 = 0x99;
    pub const NOTIFICATION_PENDING: u8 = 0x9A;
    pub const HARDWARE_FAILURE: u8 = 0xC0;
    pub const SOFTWARE_FAILURE: u8 = 0xC1;
    pub const CALIBRATION_ERROR: u8 = 0xC2;
    pub const UNSUPPORTED_CLUSTER: u8 = 0xC3;
}

pub mod datatype {
    pub const NO_DATA: u8 = 0x00;
    pub const DATA8: u8 = 0x08;
    pub const DATA16: u8 = 0x09;
    pub const DATA24: u8 = 0x0A;
    pub const DATA32: u8 = 0x0B;
    pub const DATA40: u8 = 0x0C;
    pub const DATA48: u8 = 0x0D;
    pub const DATA56: u8 = 0x0E;
    pub const DATA64: u8 = 0x0F;
    pub const BOOLEAN: u8 = 0x10;
    pub const BITMAP8: u8 = 0x18;
    pub const BITMAP16: u8 = 0x19;
    pub const BITMAP24: u8 = 0x1A;
    pub const BITMAP32: u8 = 0x1B;
    pub const BITMAP40: u8 = 0x1C;
    pub const BITMAP48: u8 = 0x1D;
    pub const BITMAP56: u8 = 0x1E;
    pub const BITMAP64: u8 = 0x1F;
    pub const UINT8: u8 = 0x20;
    pub const UINT16: u8 = 0x21;
    pub const UINT24: u8 = 0x22;
    pub const UINT32: u8 = 0x23;
    pub const UINT40: u8 = 0x24;
    pub const UINT48: u8 = 0x25;
    pub const UINT56: u8 = 0x26;
    pub const UINT64: u8 = 0x27;
    pub const INT8: u8 = 0x28;
    pub const INT16: u8 = 0x29;
    pub const INT24: u8 = 0x2A;
    pub const INT32: u8 = 0x2B;
    pub const INT40: u8 = 0x2C;
    pub const INT48: u8 = 0x2D;
    pub const INT56: u8 = 0x2E;
    pub const INT64: u8 = 0x2F;
    pub const ENUM8: u8 = 0x30;
    pub const ENUM16: u8 = 0x31;
    pub const FLOAT16: u8 = 0x38;
    pub const FLOAT32: u8 = 0x39;
    pub const FLOAT64: u8 = 0x3A;
    pub const OCTET_STR: u8 = 0x41;
    pub const CHAR_STR: u8 = 0x42;
    pub const LONG_OCTET_STR: u8 = 0x43;
    pub const LONG_CHAR_STR: u8 = 0x44;
    pub const ARRAY: u8 = 0x48;
    pub const STRUCT: u8 = 0x4C;
    pub const TOD: u8 = 0xE0;
    pub const DATE: u8 = 0xE1;
    pub const UTC: u8 = 0xE2;
    pub const CLUSTER_ID: u8 = 0xE8;
    pub const ATTR_ID: u8 = 0xE9;
    pub const BAC_OID: u8 = 0xEA;
    pub const IEEE_ADDR: u8 = 0xF0;
    pub const SEC_KEY: u8 = 0xF1;
    pub const UNKNOWN: u8 = 0xFF;

    /// Size in bytes of a fixed-length ZCL data type; 0 for variable-length
    /// or unknown types.
    pub fn size_of(data_type: u8) -> usize {
        match data_type {
            NO_DATA => 0,
            DATA8 | BOOLEAN | BITMAP8 | UINT8 | INT8 | ENUM8 => 1,
            DATA16 | BITMAP16 | UINT16 | INT16 | ENUM16 | FLOAT16 | CLUSTER_ID | ATTR_ID => 2,
            DATA24 | BITMAP24 | UINT24 | INT24 => 3,
            DATA32 | BITMAP32 | UINT32 | INT32 | FLOAT32 | TOD | DATE | UTC | BAC_OID => 4,
            DATA40 | BITMAP40 | UINT40 | INT40 => 5,
            DATA48 | BITMAP48 | UINT48 | INT48 => 6,
            DATA56 | BITMAP56 | UINT56 | INT56 => 7,
            DATA64 | BITMAP64 | UINT64 | INT64 | FLOAT64 | IEEE_ADDR => 8,
            SEC_KEY => 16,
            _ => 0,
        }
    }
}

pub mod cluster {
    pub const BASIC: u16 = 0x0000;
    pub const POWER_CONFIG: u16 = 0x0001;
    pub const DEVICE_TEMP: u16 = 0x0002;
    pub const IDENTIFY: u16 = 0x0003;
    pub const GROUPS: u16 = 0x0004;
    pub const SCENES: u16 = 0x0005;
    pub const ON_OFF: u16 = 0x0006;
    pub const ON_OFF_SWITCH_CONFIG: u16 = 0x0007;
    pub const LEVEL_CONTROL: u16 = 0x0008;
    pub const ALARMS: u16 = 0x0009;
    pub const TIME: u16 = 0x000A;
    pub const RSSI_LOCATION: u16 = 0x000B;
    pub const ANALOG_INPUT: u16 = 0x000C;
    pub const ANALOG_OUTPUT: u16 = 0x000D;
    pub const ANALOG_VALUE: u16 = 0x000E;
    pub const BINARY_INPUT: u16 = 0x000F;
    pub const BINARY_OUTPUT: u16 = 0x0010;
    pub const BINARY_VALUE: u16 = 0x0011;
    pub const MULTISTATE_INPUT: u16 = 0x0012;
    pub const MULTISTATE_OUTPUT: u16 = 0x0013;
    pub const MULTISTATE_VALUE: u16 = 0x0014;
    pub const OTA_UPGRADE: u16 = 0x0019;
    pub const POLL_CONTROL: u16 = 0x0020;
    pub const GREEN_POWER_PROXY: u16 = 0x0021;

    pub const SHADE_CONFIG: u16 = 0x0100;
    pub const DOOR_LOCK: u16 = 0x0101;
    pub const WINDOW_COVERING: u16 = 0x0102;

    pub const PUMP_CONFIG: u16 = 0x0200;
    pub const THERMOSTAT: u16 = 0x0201;
    pub const FAN_CONTROL: u16 = 0x0202;
    pub const THERMOSTAT_UI: u16 = 0x0204;

    pub const COLOR_CONTROL: u16 = 0x0300;
    pub const BALLAST_CONFIG: u16 = 0x0301;

    pub const ILLUMINANCE_MEASUREMENT: u16 = 0x0400;
    pub const ILLUMINANCE_LEVEL_SENSING: u16 = 0x0401;
    pub const TEMPERATURE_MEASUREMENT: u16 = 0x0402;
    pub const PRESSURE_MEASUREMENT: u16 = 0x0403;
    pub const FLOW_MEASUREMENT: u16 = 0x0404;
    pub const RELATIVE_HUMIDITY: u16 = 0x0405;
    pub const OCCUPANCY_SENSING: u16 = 0x0406;

    pub const IAS_ZONE: u16 = 0x0500;
    pub const IAS_ACE: u16 = 0x0501;
    pub const IAS_WD: u16 = 0x0502;

    pub const METERING: u16 = 0x0702;

    pub const ELECTRICAL_MEASUREMENT: u16 = 0x0B04;
    pub const DIAGNOSTICS: u16 = 0x0B05;

    pub const TOUCHLINK: u16 = 0x1000;
}

pub mod attr {
    pub mod basic {
        pub const ZCL_VERSION: u16 = 0x0000;
        pub const APP_VERSION: u16 = 0x0001;
        pub const STACK_VERSION: u16 = 0x0002;
        pub const HW_VERSION: u16 = 0x0003;
        pub const MANUFACTURER_NAME: u16 = 0x0004;
        pub const MODEL_ID: u16 = 0x0005;
        pub const DATE_CODE: u16 = 0x0006;
        pub const POWER_SOURCE: u16 = 0x0007;
        pub const GENERIC_DEVICE_CLASS: u16 = 0x0008;
        pub const GENERIC_DEVICE_TYPE: u16 = 0x0009;
        pub const PRODUCT_CODE: u16 = 0x000A;
        pub const PRODUCT_URL: u16 = 0x000B;
        pub const LOCATION_DESC: u16 = 0x0010;
        pub const PHYSICAL_ENV: u16 = 0x0011;
        pub const DEVICE_ENABLED: u16 = 0x0012;
        pub const ALARM_MASK: u16 = 0x0013;
        pub const DISABLE_LOCAL_CFG: u16 = 0x0014;
        pub const SW_BUILD_ID: u16 = 0x4000;
    }

    pub mod power {
        pub const MAINS_VOLTAGE: u16 = 0x0000;
        pub const MAINS_FREQUENCY: u16 = 0x0001;
        pub const BATTERY_VOLTAGE: u16 = 0x0020;
        pub const BATTERY_PERCENT: u16 = 0x0021;
    }

    pub mod onoff {
        pub const ON_OFF: u16 = 0x0000;
        pub const GLOBAL_SCENE_CTRL: u16 = 0x4000;
        pub const ON_TIME: u16 = 0x4001;
        pub const OFF_WAIT_TIME: u16 = 0x4002;
        pub const STARTUP_ON_OFF: u16 = 0x4003;
    }

    pub mod level {
        pub const CURRENT_LEVEL: u16 = 0x0000;
        pub const REMAINING_TIME: u16 = 0x0001;
        pub const MIN_LEVEL: u16 = 0x0002;
        pub const MAX_LEVEL: u16 = 0x0003;
        pub const OPTIONS: u16 = 0x000F;
        pub const ON_OFF_TRANSITION: u16 = 0x0010;
        pub const ON_LEVEL: u16 = 0x0011;
        pub const ON_TRANSITION_TIME: u16 = 0x0012;
        pub const OFF_TRANSITION_TIME: u16 = 0x0013;
        pub const DEFAULT_MOVE_RATE: u16 = 0x0014;
        pub const STARTUP_LEVEL: u16 = 0x4000;
    }

    pub mod color {
        pub const CURRENT_HUE: u16 = 0x0000;
        pub const CURRENT_SAT: u16 = 0x0001;
        pub const REMAINING_TIME: u16 = 0x0002;
        pub const CURRENT_X: u16 = 0x0003;
        pub const CURRENT_Y: u16 = 0x0004;
        pub const DRIFT_COMPENSATION: u16 = 0x0005;
        pub const COMPENSATION_TEXT: u16 = 0x0006;
        pub const COLOR_TEMP: u16 = 0x0007;
        pub const COLOR_MODE: u16 = 0x0008;
        pub const OPTIONS: u16 = 0x000F;
        pub const NUM_PRIMARIES: u16 = 0x0010;
        pub const ENHANCED_CURRENT_HUE: u16 = 0x4000;
        pub const ENHANCED_COLOR_MODE: u16 = 0x4001;
        pub const COLOR_LOOP_ACTIVE: u16 = 0x4002;
        pub const COLOR_LOOP_DIRECTION: u16 = 0x4003;
        pub const COLOR_LOOP_TIME: u16 = 0x4004;
        pub const COLOR_LOOP_START_HUE: u16 = 0x4005;
        pub const COLOR_LOOP_STORED_HUE: u16 = 0x4006;
        pub const COLOR_CAPABILITIES: u16 = 0x400A;
        pub const COLOR_TEMP_MIN: u16 = 0x400B;
        pub const COLOR_TEMP_MAX: u16 = 0x400C;
        pub const STARTUP_COLOR_TEMP: u16 = 0x4010;
    }

    pub mod temperature {
        pub const MEASURED_VALUE: u16 = 0x0000;
        pub const MIN_MEASURED: u16 = 0x0001;
        pub const MAX_MEASURED: u16 = 0x0002;
        pub const TOLERANCE: u16 = 0x0003;
    }

    pub mod humidity {
        pub const MEASURED_VALUE: u16 = 0x0000;
        pub const MIN_MEASURED: u16 = 0x0001;
        pub const MAX_MEASURED: u16 = 0x0002;
        pub const TOLERANCE: u16 = 0x0003;
    }

    pub mod occupancy {
        pub const OCCUPANCY: u16 = 0x0000;
        pub const SENSOR_TYPE: u16 = 0x0001;
        pub const PIR_O_TO_U_DELAY: u16 = 0x0010;
        pub const PIR_U_TO_O_DELAY: u16 = 0x0011;
        pub const PIR_U_TO_O_THRESH: u16 = 0x0012;
    }

    pub mod ias_zone {
        pub const ZONE_STATE: u16 = 0x0000;
        pub const ZONE_TYPE: u16 = 0x0001;
        pub const ZONE_STATUS: u16 = 0x0002;
        pub const IAS_CIE_ADDRESS: u16 = 0x0010;
        pub const ZONE_ID: u16 = 0x0011;
        pub const NUM_ZONE_SENS_LEVELS: u16 = 0x0012;
        pub const CURRENT_ZONE_SENS_LEVEL: u16 = 0x0013;
    }

    pub mod electrical {
        pub const MEASUREMENT_TYPE: u16 = 0x0000;
        pub const AC_FREQUENCY: u16 = 0x0300;
        pub const RMS_VOLTAGE: u16 = 0x0505;
        pub const RMS_CURRENT: u16 = 0x0508;
        pub const ACTIVE_POWER: u16 = 0x050B;
        pub const REACTIVE_POWER: u16 = 0x050E;
        pub const APPARENT_POWER: u16 = 0x050F;
        pub const POWER_FACTOR: u16 = 0x0510;
        pub const AC_VOLTAGE_MULT: u16 = 0x0600;
        pub const AC_VOLTAGE_DIV: u16 = 0x0601;
        pub const AC_CURRENT_MULT: u16 = 0x0602;
        pub const AC_CURRENT_DIV: u16 = 0x0603;
        pub const AC_POWER_MULT: u16 = 0x0604;
        pub const AC_POWER_DIV: u16 = 0x0605;
    }

    pub mod metering {
        pub const CURRENT_SUMMATION: u16 = 0x0000;
        pub const UNIT_OF_MEASURE: u16 = 0x0300;
        pub const MULTIPLIER: u16 = 0x0301;
        pub const DIVISOR: u16 = 0x0302;
        pub const SUMMATION_FORMATTING: u16 = 0x0303;
        pub const DEMAND_FORMATTING: u16 = 0x0304;
        pub const INSTANTANEOUS_DEMAND: u16 = 0x0400;
    }
}

pub mod cmd {
    pub mod onoff {
        pub const OFF: u8 = 0x00;
        pub const ON: u8 = 0x01;
        pub const TOGGLE: u8 = 0x02;
        pub const OFF_WITH_EFFECT: u8 = 0x40;
        pub const ON_WITH_RECALL: u8 = 0x41;
        pub const ON_WITH_TIMED_OFF: u8 = 0x42;
    }

    pub mod level {
        pub const MOVE_TO_LEVEL: u8 = 0x00;
        pub const MOVE: u8 = 0x01;
        pub const STEP: u8 = 0x02;
        pub const STOP: u8 = 0x03;
        pub const MOVE_TO_LEVEL_ONOFF: u8 = 0x04;
        pub const MOVE_ONOFF: u8 = 0x05;
        pub const STEP_ONOFF: u8 = 0x06;
        pub const STOP_ONOFF: u8 = 0x07;
        pub const MOVE_TO_CLOSEST_FREQ: u8 = 0x08;
    }

    pub mod color {
        pub const MOVE_TO_HUE: u8 = 0x00;
        pub const MOVE_HUE: u8 = 0x01;
        pub const STEP_HUE: u8 = 0x02;
        pub const MOVE_TO_SAT: u8 = 0x03;
        pub const MOVE_SAT: u8 = 0x04;
        pub const STEP_SAT: u8 = 0x05;
        pub const MOVE_TO_HUE_SAT: u8 = 0x06;
        pub const MOVE_TO_COLOR: u8 = 0x07;
        pub const MOVE_COLOR: u8 = 0x08;
        pub const STEP_COLOR: u8 = 0x09;
        pub const MOVE_TO_COLOR_TEMP: u8 = 0x0A;
        pub const ENH_MOVE_TO_HUE: u8 = 0x40;
        pub const ENH_MOVE_HUE: u8 = 0x41;
        pub const ENH_STEP_HUE: u8 = 0x42;
        pub const ENH_MOVE_TO_HUE_SAT: u8 = 0x43;
        pub const COLOR_LOOP_SET: u8 = 0x44;
        pub const STOP_MOVE_STEP: u8 = 0x47;
        pub const MOVE_COLOR_TEMP: u8 = 0x4B;
        pub const STEP_COLOR_TEMP: u8 = 0x4C;
    }
}

pub mod zone_type {
    pub const STANDARD_CIE: u16 = 0x0000;
    pub const MOTION_SENSOR: u16 = 0x000D;
    pub const CONTACT_SWITCH: u16 = 0x0015;
    pub const FIRE_SENSOR: u16 = 0x0028;
    pub const WATER_SENSOR: u16 = 0x002A;
    pub const CO_SENSOR: u16 = 0x002B;
    pub const PERSONAL_EMERGENCY: u16 = 0x002C;
    pub const VIBRATION_MOVEMENT: u16 = 0x002D;
    pub const REMOTE_CONTROL: u16 = 0x010F;
    pub const KEY_FOB: u16 = 0x0115;
    pub const KEYPAD: u16 = 0x021D;
    pub const STANDARD_WARNING: u16 = 0x0225;
    pub const GLASS_BREAK: u16 = 0x0226;
    pub const SECURITY_REPEATER: u16 = 0x0229;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_type_sizes_match_reference_table() {
        assert_eq!(datatype::size_of(datatype::BOOLEAN), 1);
        assert_eq!(datatype::size_of(datatype::UINT16), 2);
        assert_eq!(datatype::size_of(datatype::IEEE_ADDR), 8);
        assert_eq!(datatype::size_of(datatype::SEC_KEY), 16);
        assert_eq!(datatype::size_of(datatype::CHAR_STR), 0);
    }

    #[test]
    fn key_wire_ids_are_stable() {
        assert_eq!(cluster::ON_OFF, 0x0006);
        assert_eq!(cluster::LEVEL_CONTROL, 0x0008);
        assert_eq!(cluster::COLOR_CONTROL, 0x0300);
        assert_eq!(cmd::onoff::ON, 0x01);
        assert_eq!(cmd::onoff::OFF, 0x00);
    }
}
