use std::ops::BitOr;

/// Placed in a string field whose IP was unparsable.
pub const INVALID_ADDRESS: &str = "Invalid IP address.";
/// Placed in every string field when the handle was never successfully
/// opened. Kept for parity with the vendor's sentinel-string contract even
/// though `Database::open`'s `Result` return makes the underlying "query on
/// a handle that failed to open" state unrepresentable here: there is no
/// `Database` to call `query` on until `open` has already succeeded.
pub const INVALID_DATABASE: &str = "Invalid database file.";
/// Placed in a string field whose column is absent from the open file's schema.
pub const NOT_SUPPORTED: &str =
    "This parameter is unavailable for selected data file. Please upgrade the data file.";

/// A bitmask selecting which columns a query should decode.
///
/// Mirrors the vendor's own `CountryShort | CountryLong | Region | ...`
/// field-bit constants, extended with the five fields (address type,
/// category, district, ASN, AS name) the vendor added in later database
/// revisions. Combine with `|`; [`Fields::ALL`] requests every column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fields(pub u32);

impl Fields {
    pub const COUNTRY_SHORT: Fields = Fields(1 << 0);
    pub const COUNTRY_LONG: Fields = Fields(1 << 1);
    pub const REGION: Fields = Fields(1 << 2);
    pub const CITY: Fields = Fields(1 << 3);
    pub const ISP: Fields = Fields(1 << 4);
    pub const LATITUDE: Fields = Fields(1 << 5);
    pub const LONGITUDE: Fields = Fields(1 << 6);
    pub const DOMAIN: Fields = Fields(1 << 7);
    pub const ZIPCODE: Fields = Fields(1 << 8);
    pub const TIMEZONE: Fields = Fields(1 << 9);
    pub const NETSPEED: Fields = Fields(1 << 10);
    pub const IDDCODE: Fields = Fields(1 << 11);
    pub const AREACODE: Fields = Fields(1 << 12);
    pub const WEATHER_STATION_CODE: Fields = Fields(1 << 13);
    pub const WEATHER_STATION_NAME: Fields = Fields(1 << 14);
    pub const MCC: Fields = Fields(1 << 15);
    pub const MNC: Fields = Fields(1 << 16);
    pub const MOBILE_BRAND: Fields = Fields(1 << 17);
    pub const ELEVATION: Fields = Fields(1 << 18);
    pub const USAGE_TYPE: Fields = Fields(1 << 19);
    pub const ADDRESS_TYPE: Fields = Fields(1 << 20);
    pub const CATEGORY: Fields = Fields(1 << 21);
    pub const DISTRICT: Fields = Fields(1 << 22);
    pub const ASN: Fields = Fields(1 << 23);
    pub const AS_NAME: Fields = Fields(1 << 24);

    pub const ALL: Fields = Fields(
        Self::COUNTRY_SHORT.0
            | Self::COUNTRY_LONG.0
            | Self::REGION.0
            | Self::CITY.0
            | Self::ISP.0
            | Self::LATITUDE.0
            | Self::LONGITUDE.0
            | Self::DOMAIN.0
            | Self::ZIPCODE.0
            | Self::TIMEZONE.0
            | Self::NETSPEED.0
            | Self::IDDCODE.0
            | Self::AREACODE.0
            | Self::WEATHER_STATION_CODE.0
            | Self::WEATHER_STATION_NAME.0
            | Self::MCC.0
            | Self::MNC.0
            | Self::MOBILE_BRAND.0
            | Self::ELEVATION.0
            | Self::USAGE_TYPE.0
            | Self::ADDRESS_TYPE.0
            | Self::CATEGORY.0
            | Self::DISTRICT.0
            | Self::ASN.0
            | Self::AS_NAME.0,
    );

    /// Whether `self` requests `bit`. Uses `!= 0` uniformly, rather than an
    /// equality check against one specific bit value that happens to
    /// coincide with `!= 0` only for that one field.
    pub fn contains(self, bit: Fields) -> bool {
        self.0 & bit.0 != 0
    }
}

impl BitOr for Fields {
    type Output = Fields;

    fn bitor(self, rhs: Fields) -> Fields {
        Fields(self.0 | rhs.0)
    }
}

/// One decoded (or sentinel-filled) geolocation lookup result.
///
/// Every field is populated regardless of whether it was requested in the
/// query mask: fields outside the mask, or absent from the open file's
/// schema, carry [`NOT_SUPPORTED`] (strings) or `0.0` (floats) rather than
/// being left as `None`, matching the vendor's own default-initialized
/// record contract.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    pub country_short: String,
    pub country_long: String,
    pub region: String,
    pub city: String,
    pub isp: String,
    pub latitude: f32,
    pub longitude: f32,
    pub domain: String,
    pub zipcode: String,
    pub timezone: String,
    pub netspeed: String,
    pub iddcode: String,
    pub areacode: String,
    pub weather_station_code: String,
    pub weather_station_name: String,
    pub mcc: String,
    pub mnc: String,
    pub mobile_brand: String,
    pub elevation: f32,
    pub usage_type: String,
    pub address_type: String,
    pub category: String,
    pub district: String,
    pub asn: String,
    pub as_name: String,
}

impl Record {
    /// A record with every string field set to `message` and every float
    /// field set to `0.0`. Used for both the "not opened" and
    /// "not supported" sentinel records.
    pub fn filled_with(message: &str) -> Record {
        Record {
            country_short: message.to_owned(),
            country_long: message.to_owned(),
            region: message.to_owned(),
            city: message.to_owned(),
            isp: message.to_owned(),
            latitude: 0.0,
            longitude: 0.0,
            domain: message.to_owned(),
            zipcode: message.to_owned(),
            timezone: message.to_owned(),
            netspeed: message.to_owned(),
            iddcode: message.to_owned(),
            areacode: message.to_owned(),
            weather_station_code: message.to_owned(),
            weather_station_name: message.to_owned(),
            mcc: message.to_owned(),
            mnc: message.to_owned(),
            mobile_brand: message.to_owned(),
            elevation: 0.0,
            usage_type: message.to_owned(),
            address_type: message.to_owned(),
            category: message.to_owned(),
            district: message.to_owned(),
            asn: message.to_owned(),
            as_name: message.to_owned(),
        }
    }
}
