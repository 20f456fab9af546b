// Address types as carried in advertising reports from the worker
pub const REPORT_ADDRESS_PUBLIC: u8 = 0x01;
pub const REPORT_ADDRESS_RANDOM: u8 = 0x02;

// Advertising report flag: set when the advertiser does not accept connections
pub const REPORT_FLAG_NOT_CONNECTABLE: u8 = 0x04;

// Advertising Data Types
pub const ADV_TYPE_FLAGS: u8 = 0x01;
pub const ADV_TYPE_16BIT_SERVICE_UUID_PARTIAL: u8 = 0x02;
pub const ADV_TYPE_16BIT_SERVICE_UUID_COMPLETE: u8 = 0x03;
pub const ADV_TYPE_32BIT_SERVICE_UUID_PARTIAL: u8 = 0x04;
pub const ADV_TYPE_32BIT_SERVICE_UUID_COMPLETE: u8 = 0x05;
pub const ADV_TYPE_128BIT_SERVICE_UUID_PARTIAL: u8 = 0x06;
pub const ADV_TYPE_128BIT_SERVICE_UUID_COMPLETE: u8 = 0x07;
pub const ADV_TYPE_SHORT_LOCAL_NAME: u8 = 0x08;
pub const ADV_TYPE_COMPLETE_LOCAL_NAME: u8 = 0x09;
pub const ADV_TYPE_TX_POWER_LEVEL: u8 = 0x0A;
pub const ADV_TYPE_SERVICE_SOLICITATION_16BIT: u8 = 0x14;
pub const ADV_TYPE_SERVICE_SOLICITATION_128BIT: u8 = 0x15;
pub const ADV_TYPE_SERVICE_DATA_16BIT: u8 = 0x16;
pub const ADV_TYPE_PUBLIC_TARGET_ADDRESS: u8 = 0x17;
pub const ADV_TYPE_RANDOM_TARGET_ADDRESS: u8 = 0x18;
pub const ADV_TYPE_APPEARANCE: u8 = 0x19;
pub const ADV_TYPE_ADVERTISING_INTERVAL: u8 = 0x1A;
pub const ADV_TYPE_SERVICE_SOLICITATION_32BIT: u8 = 0x1F;
pub const ADV_TYPE_SERVICE_DATA_32BIT: u8 = 0x20;
pub const ADV_TYPE_SERVICE_DATA_128BIT: u8 = 0x21;
pub const ADV_TYPE_MANUFACTURER_SPECIFIC: u8 = 0xFF;

/// Human-readable name of an advertising data type.
pub fn ad_type_name(ad_type: u8) -> Option<&'static str> {
    let name = match ad_type {
        ADV_TYPE_FLAGS => "Flags",
        ADV_TYPE_16BIT_SERVICE_UUID_PARTIAL => "Incomplete 16b Services",
        ADV_TYPE_16BIT_SERVICE_UUID_COMPLETE => "Complete 16b Services",
        ADV_TYPE_32BIT_SERVICE_UUID_PARTIAL => "Incomplete 32b Services",
        ADV_TYPE_32BIT_SERVICE_UUID_COMPLETE => "Complete 32b Services",
        ADV_TYPE_128BIT_SERVICE_UUID_PARTIAL => "Incomplete 128b Services",
        ADV_TYPE_128BIT_SERVICE_UUID_COMPLETE => "Complete 128b Services",
        ADV_TYPE_SHORT_LOCAL_NAME => "Short Local Name",
        ADV_TYPE_COMPLETE_LOCAL_NAME => "Complete Local Name",
        ADV_TYPE_TX_POWER_LEVEL => "Tx Power",
        ADV_TYPE_SERVICE_SOLICITATION_16BIT => "16b Service Solicitation",
        ADV_TYPE_SERVICE_SOLICITATION_32BIT => "32b Service Solicitation",
        ADV_TYPE_SERVICE_SOLICITATION_128BIT => "128b Service Solicitation",
        ADV_TYPE_SERVICE_DATA_16BIT => "16b Service Data",
        ADV_TYPE_SERVICE_DATA_32BIT => "32b Service Data",
        ADV_TYPE_SERVICE_DATA_128BIT => "128b Service Data",
        ADV_TYPE_PUBLIC_TARGET_ADDRESS => "Public Target Address",
        ADV_TYPE_RANDOM_TARGET_ADDRESS => "Random Target Address",
        ADV_TYPE_APPEARANCE => "Appearance",
        ADV_TYPE_ADVERTISING_INTERVAL => "Advertising Interval",
        ADV_TYPE_MANUFACTURER_SPECIFIC => "Manufacturer",
        _ => return None,
    };
    Some(name)
}
