//! The (field × dbType) schema matrix and the per-column byte-offset
//! resolution it drives.
//!
//! The vendor hardcodes this table for dbType 1..24 across 20 data columns
//! (country's short and long names share one column). This implementation
//! reproduces that table verbatim and extends it to dbType 25 and 26 and
//! the five fields the vendor added in those later revisions (address
//! type, category, district, ASN, AS name), inferred as a continuation of
//! the same column-numbering convention the existing dbType 1..24 rows
//! already follow: each new dbType's schema is a strict superset of the
//! previous one, appending the new columns at the next free position.

use crate::record::Fields;

/// One row per data column in [`Fields`] order (skipping `COUNTRY_LONG`,
/// which shares `COUNTRY_SHORT`'s column). `row[dbType]` is the 1-based
/// column position of that field for `dbType`, or `0` if the field is
/// absent from that schema. Index 0 is unused; valid `dbType` is 1..=26.
const MATRIX: [[u8; 27]; 24] = [
    // country
    [0, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2],
    // region
    [0, 0, 0, 3, 3, 3, 3, 3, 3, 3, 3, 3, 3, 3, 3, 3, 3, 3, 3, 3, 3, 3, 3, 3, 3, 3, 3],
    // city
    [0, 0, 0, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4],
    // isp
    [0, 0, 3, 0, 5, 0, 7, 5, 7, 0, 8, 0, 9, 0, 9, 0, 9, 0, 9, 7, 9, 0, 9, 7, 9, 9, 9],
    // latitude
    [0, 0, 0, 0, 0, 5, 5, 0, 5, 5, 5, 5, 5, 5, 5, 5, 5, 5, 5, 5, 5, 5, 5, 5, 5, 5, 5],
    // longitude
    [0, 0, 0, 0, 0, 6, 6, 0, 6, 6, 6, 6, 6, 6, 6, 6, 6, 6, 6, 6, 6, 6, 6, 6, 6, 6, 6],
    // domain
    [0, 0, 0, 0, 0, 0, 0, 6, 8, 0, 9, 0, 10, 0, 10, 0, 10, 0, 10, 8, 10, 0, 10, 8, 10, 10, 10],
    // zipcode
    [0, 0, 0, 0, 0, 0, 0, 0, 0, 7, 7, 7, 7, 0, 7, 7, 7, 0, 7, 0, 7, 7, 7, 0, 7, 7, 7],
    // timezone
    [0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 8, 8, 7, 8, 8, 8, 7, 8, 0, 8, 8, 8, 0, 8, 8, 8],
    // netspeed
    [0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 8, 11, 0, 11, 8, 11, 0, 11, 0, 11, 0, 11, 11, 11],
    // iddcode
    [0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 9, 12, 0, 12, 0, 12, 9, 12, 0, 12, 12, 12],
    // areacode
    [0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 10, 13, 0, 13, 0, 13, 10, 13, 0, 13, 13, 13],
    // weather station code
    [0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 9, 14, 0, 14, 0, 14, 0, 14, 14, 14],
    // weather station name
    [0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 10, 15, 0, 15, 0, 15, 0, 15, 15, 15],
    // mcc
    [0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 9, 16, 0, 16, 9, 16, 16, 16],
    // mnc
    [0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 10, 17, 0, 17, 10, 17, 17, 17],
    // mobile brand
    [0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 11, 18, 0, 18, 11, 18, 18, 18],
    // elevation
    [0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 11, 19, 0, 19, 19, 19],
    // usage type
    [0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 12, 20, 20, 20],
    // address type (DB25+)
    [0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 21, 21],
    // category / IAB (DB25+)
    [0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 22, 22],
    // district (DB26+)
    [0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 23],
    // asn (DB26+)
    [0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 24],
    // as name (DB26+)
    [0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 25],
];

const ROW_ORDER: [Fields; 24] = [
    Fields::COUNTRY_SHORT,
    Fields::REGION,
    Fields::CITY,
    Fields::ISP,
    Fields::LATITUDE,
    Fields::LONGITUDE,
    Fields::DOMAIN,
    Fields::ZIPCODE,
    Fields::TIMEZONE,
    Fields::NETSPEED,
    Fields::IDDCODE,
    Fields::AREACODE,
    Fields::WEATHER_STATION_CODE,
    Fields::WEATHER_STATION_NAME,
    Fields::MCC,
    Fields::MNC,
    Fields::MOBILE_BRAND,
    Fields::ELEVATION,
    Fields::USAGE_TYPE,
    Fields::ADDRESS_TYPE,
    Fields::CATEGORY,
    Fields::DISTRICT,
    Fields::ASN,
    Fields::AS_NAME,
];

/// Per-column enabled flag and byte offset for one opened database,
/// derived once at open time from [`MATRIX`] and this file's `dbType`.
#[derive(Debug, Clone)]
pub struct Schema {
    /// Indexed in [`ROW_ORDER`] order. `offsets[i]` is only meaningful
    /// when `enabled[i]` is true.
    enabled: [bool; 24],
    offsets: [u32; 24],
}

impl Schema {
    /// Resolves the enabled-field set and byte offsets for `db_type`
    /// (1..=26). An out-of-range or zero `db_type` resolves to an
    /// all-disabled schema, matching every `MATRIX` row being `0` there.
    pub fn resolve(db_type: u8) -> Schema {
        let dbt = db_type as usize;
        let mut enabled = [false; 24];
        let mut offsets = [0u32; 24];

        for (i, row) in MATRIX.iter().enumerate() {
            let position = row.get(dbt).copied().unwrap_or(0);
            if position != 0 {
                enabled[i] = true;
                // Row position 1 is `ipFrom` (handled outside the row
                // body), so the first data column sits at offset 0.
                offsets[i] = (position as u32 - 2) * 4;
            }
        }

        Schema { enabled, offsets }
    }

    fn index_of(field: Fields) -> usize {
        ROW_ORDER
            .iter()
            .position(|&f| f == field)
            .expect("field not present in ROW_ORDER")
    }

    /// Whether `field` is present in this schema. `field` must be one of
    /// the single-bit constants on [`Fields`] (not a combined mask);
    /// [`Fields::COUNTRY_LONG`] reports the same answer as
    /// [`Fields::COUNTRY_SHORT`] since they share a column.
    pub fn is_enabled(&self, field: Fields) -> bool {
        if field == Fields::COUNTRY_LONG {
            return self.enabled[Self::index_of(Fields::COUNTRY_SHORT)];
        }
        self.enabled[Self::index_of(field)]
    }

    /// The byte offset of `field` within a row body (i.e. excluding the
    /// leading `ipFrom` column). Panics if `field` is not enabled — callers
    /// must check [`Schema::is_enabled`] first.
    pub fn offset(&self, field: Fields) -> u32 {
        let field = if field == Fields::COUNTRY_LONG {
            Fields::COUNTRY_SHORT
        } else {
            field
        };
        let i = Self::index_of(field);
        assert!(self.enabled[i], "field not enabled in this schema");
        self.offsets[i]
    }
}
