//! Header validation, range lookup, and row decoding — the engine behind
//! [`Database`].

use std::fs::File;
use std::path::Path;

use log::{debug, warn};
use num_traits::PrimInt;

use crate::error::Error;
use crate::ip::Canonical;
use crate::ip::Kind;
use crate::record::{self, Fields, Record};
use crate::schema::Schema;
use crate::source::{read_u32_from_buf, ByteSource, MmapSource, SliceSource};

const HEADER_LEN: usize = 64;

/// A compressed-archive ("PK" zip) signature in the first two header bytes,
/// i.e. a `.zip` mistakenly handed to `Database::open` instead of the
/// decompressed `.BIN` file.
const PK_DB_TYPE: u8 = 0x50;
const PK_COLUMN_COUNT: u8 = 0x4B;

struct Header {
    db_type: u8,
    column_count: u8,
    year: u8,
    month: u8,
    day: u8,
    ipv4_count: u32,
    ipv4_addr: u32,
    ipv6_count: u32,
    ipv6_addr: u32,
    ipv4_index_addr: u32,
    ipv6_index_addr: u32,
}

impl Header {
    fn parse(buf: &[u8; HEADER_LEN]) -> Result<Header, Error> {
        let db_type = buf[0];
        let column_count = buf[1];
        let year = buf[2];
        let month = buf[3];
        let day = buf[4];
        let ipv4_count = read_u32_from_buf(buf, 5);
        let ipv4_addr = read_u32_from_buf(buf, 9);
        let ipv6_count = read_u32_from_buf(buf, 13);
        let ipv6_addr = read_u32_from_buf(buf, 17);
        let ipv4_index_addr = read_u32_from_buf(buf, 21);
        let ipv6_index_addr = read_u32_from_buf(buf, 25);
        let product_code = buf[29];

        if db_type == PK_DB_TYPE && column_count == PK_COLUMN_COUNT {
            return Err(Error::InvalidBin);
        }
        if year >= 21 && product_code != 1 {
            return Err(Error::InvalidBin);
        }

        Ok(Header {
            db_type,
            column_count,
            year,
            month,
            day,
            ipv4_count,
            ipv4_addr,
            ipv6_count,
            ipv6_addr,
            ipv4_index_addr,
            ipv6_index_addr,
        })
    }

    fn ipv4_row_size(&self) -> u32 {
        self.column_count as u32 * 4
    }

    fn ipv6_row_size(&self) -> u32 {
        16 + (self.column_count as u32 - 1) * 4
    }

    fn ipv4_indexed(&self) -> bool {
        self.ipv4_index_addr > 0
    }

    fn ipv6_indexed(&self) -> bool {
        self.ipv6_count > 0 && self.ipv6_index_addr > 0
    }
}

/// An opened IP2Location-style BIN database.
///
/// Immutable after construction: the byte source, header, and schema are
/// all assigned once in `open`/`open_bytes` and never mutated, so
/// concurrent queries against one `Database` need no locking.
pub struct Database {
    source: Box<dyn ByteSource + Send + Sync>,
    header: Header,
    schema: Schema,
}

fn assert_sync<T: Sync>() {}
#[allow(dead_code)]
fn _database_is_sync() {
    assert_sync::<Database>();
}

impl Database {
    /// Opens the BIN file at `path`, memory-mapping it for the lifetime of
    /// the returned handle.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Database, Error> {
        let file = File::open(path.as_ref())?;
        let source = MmapSource::open(file)?;
        Database::from_source(Box::new(source))
    }

    /// Opens a BIN file already loaded into memory, for callers who already
    /// hold the bytes (embedded assets, a pre-fetched download, tests); see
    /// [`crate::source::SliceSource`] for the byte-source backing it.
    pub fn open_bytes(bytes: Vec<u8>) -> Result<Database, Error> {
        Database::from_source(Box::new(SliceSource::new(bytes)))
    }

    fn from_source(source: Box<dyn ByteSource + Send + Sync>) -> Result<Database, Error> {
        let mut buf = [0u8; HEADER_LEN];
        source.read_at(0, &mut buf)?;
        let header = Header::parse(&buf)?;
        let schema = Schema::resolve(header.db_type);

        debug!(
            "opened IP2Location BIN: dbType={} date=20{:02}-{:02}-{:02} ipv4_rows={} ipv6_rows={} ipv4_indexed={} ipv6_indexed={}",
            header.db_type,
            header.year,
            header.month,
            header.day,
            header.ipv4_count,
            header.ipv6_count,
            header.ipv4_indexed(),
            header.ipv6_indexed(),
        );
        if header.ipv6_count == 0 {
            warn!("opened database has no IPv6 section; IPv6 queries will return no match");
        }

        Ok(Database { source, header, schema })
    }

    /// Returns every supported field for `ip`.
    pub fn query_all(&self, ip: &str) -> Result<Record, Error> {
        self.query(ip, Fields::ALL)
    }

    /// Returns only the fields set in `mask` for `ip`.
    ///
    /// An unparsable `ip` never surfaces as an error: it yields a record
    /// whose string fields read [`record::INVALID_ADDRESS`]. A genuine I/O
    /// failure while reading the located row does surface as `Err`.
    pub fn query(&self, ip: &str, mask: Fields) -> Result<Record, Error> {
        let canonical = match Canonical::parse(ip) {
            Ok(c) => c,
            Err(_) => return Ok(Record::filled_with(record::INVALID_ADDRESS)),
        };

        match self.locate_row(canonical)? {
            Some(row) => self.decode_row(&row, mask),
            None => Ok(Record::filled_with(record::NOT_SUPPORTED)),
        }
    }

    /// Releases the underlying read handle. Equivalent to dropping the
    /// `Database`; provided so callers can end its lifetime explicitly
    /// instead of relying on scope exit.
    pub fn close(self) {}

    /// Binary-searches the sorted range table for `canonical`, optionally
    /// narrowed by the prefix index, and returns the matching row's body
    /// (everything after `ipFrom`).
    fn locate_row(&self, canonical: Canonical) -> Result<Option<Vec<u8>>, Error> {
        match canonical.kind {
            Kind::V4 => {
                let row_count = self.header.ipv4_count as u64;
                if row_count == 0 {
                    return Ok(None);
                }
                let row_size = self.header.ipv4_row_size() as u64;
                let section_base = self.header.ipv4_addr as u64;
                let (mut low, mut high) = (0u64, row_count);
                if self.header.ipv4_indexed() {
                    let ptr = self.header.ipv4_index_addr as u64 + canonical.index_prefix() as u64 * 8;
                    low = self.source.read_u32(ptr as usize)? as u64;
                    high = self.source.read_u32(ptr as usize + 4)? as u64;
                }
                let mut ip_num = canonical.number as u32;
                if ip_num == u32::MAX {
                    ip_num -= 1;
                }
                let mid = self.binary_search(low, high, ip_num, |mid| {
                    let row_start = section_base + mid * row_size;
                    let ip_from = self.source.read_u32(row_start as usize)?;
                    let ip_to = self.source.read_u32((row_start + row_size) as usize)?;
                    Ok((ip_from, ip_to))
                })?;
                match mid {
                    Some(mid) => {
                        let row_start = section_base + mid * row_size;
                        let body = self.source.read_row(row_start as usize + 4, row_size as usize - 4)?;
                        Ok(Some(body))
                    }
                    None => Ok(None),
                }
            }
            Kind::V6 => {
                let row_count = self.header.ipv6_count as u64;
                if row_count == 0 {
                    return Ok(None);
                }
                let row_size = self.header.ipv6_row_size() as u64;
                let section_base = self.header.ipv6_addr as u64;
                let (mut low, mut high) = (0u64, row_count);
                if self.header.ipv6_indexed() {
                    let ptr = self.header.ipv6_index_addr as u64 + canonical.index_prefix() as u64 * 8;
                    low = self.source.read_u32(ptr as usize)? as u64;
                    high = self.source.read_u32(ptr as usize + 4)? as u64;
                }
                let mut ip_num = canonical.number;
                if ip_num == u128::MAX {
                    ip_num -= 1;
                }
                let mid = self.binary_search(low, high, ip_num, |mid| {
                    let row_start = section_base + mid * row_size;
                    let ip_from = self.source.read_u128(row_start as usize)?;
                    let ip_to = self.source.read_u128((row_start + row_size) as usize)?;
                    Ok((ip_from, ip_to))
                })?;
                match mid {
                    Some(mid) => {
                        let row_start = section_base + mid * row_size;
                        let body = self.source.read_row(row_start as usize + 16, row_size as usize - 16)?;
                        Ok(Some(body))
                    }
                    None => Ok(None),
                }
            }
        }
    }

    /// Finds the row index `mid` in `low..=high` whose range (as reported
    /// by `get_range`) contains `ip_num`, or `None` if no row matches.
    /// Generic over `T` so the same routine drives both the 32-bit IPv4 and
    /// 128-bit IPv6 tables.
    fn binary_search<T, F>(&self, mut low: u64, mut high: u64, ip_num: T, get_range: F) -> Result<Option<u64>, Error>
    where
        T: PrimInt,
        F: Fn(u64) -> Result<(T, T), Error>,
    {
        loop {
            if low > high {
                return Ok(None);
            }
            let mid = (low + high) / 2;
            let (ip_from, ip_to) = get_range(mid)?;

            if ip_from <= ip_num && ip_num < ip_to {
                return Ok(Some(mid));
            } else if ip_num < ip_from {
                match mid.checked_sub(1) {
                    Some(next_high) => high = next_high,
                    None => return Ok(None),
                }
            } else {
                low = mid + 1;
            }
        }
    }

    /// Decodes every field set in `mask` and enabled in this file's schema
    /// from `row` (a row body, i.e. excluding `ipFrom`).
    fn decode_row(&self, row: &[u8], mask: Fields) -> Result<Record, Error> {
        let mut rec = Record::filled_with(record::NOT_SUPPORTED);
        let schema = &self.schema;

        if (mask.contains(Fields::COUNTRY_SHORT) || mask.contains(Fields::COUNTRY_LONG))
            && schema.is_enabled(Fields::COUNTRY_SHORT)
        {
            let ptr = read_u32_from_buf(row, schema.offset(Fields::COUNTRY_SHORT) as usize);
            if mask.contains(Fields::COUNTRY_SHORT) {
                rec.country_short = self.source.read_string(ptr as usize)?;
            }
            if mask.contains(Fields::COUNTRY_LONG) {
                rec.country_long = self.source.read_string(ptr as usize + 3)?;
            }
        }

        if mask.contains(Fields::REGION) && schema.is_enabled(Fields::REGION) {
            let ptr = read_u32_from_buf(row, schema.offset(Fields::REGION) as usize);
            rec.region = self.source.read_string(ptr as usize)?;
        }

        if mask.contains(Fields::CITY) && schema.is_enabled(Fields::CITY) {
            let ptr = read_u32_from_buf(row, schema.offset(Fields::CITY) as usize);
            rec.city = self.source.read_string(ptr as usize)?;
        }

        if mask.contains(Fields::ISP) && schema.is_enabled(Fields::ISP) {
            let ptr = read_u32_from_buf(row, schema.offset(Fields::ISP) as usize);
            rec.isp = self.source.read_string(ptr as usize)?;
        }

        if mask.contains(Fields::LATITUDE) && schema.is_enabled(Fields::LATITUDE) {
            rec.latitude = crate::source::read_f32_from_buf(row, schema.offset(Fields::LATITUDE) as usize);
        }

        if mask.contains(Fields::LONGITUDE) && schema.is_enabled(Fields::LONGITUDE) {
            rec.longitude = crate::source::read_f32_from_buf(row, schema.offset(Fields::LONGITUDE) as usize);
        }

        if mask.contains(Fields::DOMAIN) && schema.is_enabled(Fields::DOMAIN) {
            let ptr = read_u32_from_buf(row, schema.offset(Fields::DOMAIN) as usize);
            rec.domain = self.source.read_string(ptr as usize)?;
        }

        if mask.contains(Fields::ZIPCODE) && schema.is_enabled(Fields::ZIPCODE) {
            let ptr = read_u32_from_buf(row, schema.offset(Fields::ZIPCODE) as usize);
            rec.zipcode = self.source.read_string(ptr as usize)?;
        }

        if mask.contains(Fields::TIMEZONE) && schema.is_enabled(Fields::TIMEZONE) {
            let ptr = read_u32_from_buf(row, schema.offset(Fields::TIMEZONE) as usize);
            rec.timezone = self.source.read_string(ptr as usize)?;
        }

        if mask.contains(Fields::NETSPEED) && schema.is_enabled(Fields::NETSPEED) {
            let ptr = read_u32_from_buf(row, schema.offset(Fields::NETSPEED) as usize);
            rec.netspeed = self.source.read_string(ptr as usize)?;
        }

        if mask.contains(Fields::IDDCODE) && schema.is_enabled(Fields::IDDCODE) {
            let ptr = read_u32_from_buf(row, schema.offset(Fields::IDDCODE) as usize);
            rec.iddcode = self.source.read_string(ptr as usize)?;
        }

        if mask.contains(Fields::AREACODE) && schema.is_enabled(Fields::AREACODE) {
            let ptr = read_u32_from_buf(row, schema.offset(Fields::AREACODE) as usize);
            rec.areacode = self.source.read_string(ptr as usize)?;
        }

        if mask.contains(Fields::WEATHER_STATION_CODE) && schema.is_enabled(Fields::WEATHER_STATION_CODE) {
            let ptr = read_u32_from_buf(row, schema.offset(Fields::WEATHER_STATION_CODE) as usize);
            rec.weather_station_code = self.source.read_string(ptr as usize)?;
        }

        if mask.contains(Fields::WEATHER_STATION_NAME) && schema.is_enabled(Fields::WEATHER_STATION_NAME) {
            let ptr = read_u32_from_buf(row, schema.offset(Fields::WEATHER_STATION_NAME) as usize);
            rec.weather_station_name = self.source.read_string(ptr as usize)?;
        }

        if mask.contains(Fields::MCC) && schema.is_enabled(Fields::MCC) {
            let ptr = read_u32_from_buf(row, schema.offset(Fields::MCC) as usize);
            rec.mcc = self.source.read_string(ptr as usize)?;
        }

        if mask.contains(Fields::MNC) && schema.is_enabled(Fields::MNC) {
            let ptr = read_u32_from_buf(row, schema.offset(Fields::MNC) as usize);
            rec.mnc = self.source.read_string(ptr as usize)?;
        }

        if mask.contains(Fields::MOBILE_BRAND) && schema.is_enabled(Fields::MOBILE_BRAND) {
            let ptr = read_u32_from_buf(row, schema.offset(Fields::MOBILE_BRAND) as usize);
            rec.mobile_brand = self.source.read_string(ptr as usize)?;
        }

        if mask.contains(Fields::ELEVATION) && schema.is_enabled(Fields::ELEVATION) {
            let ptr = read_u32_from_buf(row, schema.offset(Fields::ELEVATION) as usize);
            let text = self.source.read_string(ptr as usize)?;
            rec.elevation = text.trim().parse::<f32>().unwrap_or(0.0);
        }

        if mask.contains(Fields::USAGE_TYPE) && schema.is_enabled(Fields::USAGE_TYPE) {
            let ptr = read_u32_from_buf(row, schema.offset(Fields::USAGE_TYPE) as usize);
            rec.usage_type = self.source.read_string(ptr as usize)?;
        }

        if mask.contains(Fields::ADDRESS_TYPE) && schema.is_enabled(Fields::ADDRESS_TYPE) {
            let ptr = read_u32_from_buf(row, schema.offset(Fields::ADDRESS_TYPE) as usize);
            rec.address_type = self.source.read_string(ptr as usize)?;
        }

        if mask.contains(Fields::CATEGORY) && schema.is_enabled(Fields::CATEGORY) {
            let ptr = read_u32_from_buf(row, schema.offset(Fields::CATEGORY) as usize);
            rec.category = self.source.read_string(ptr as usize)?;
        }

        if mask.contains(Fields::DISTRICT) && schema.is_enabled(Fields::DISTRICT) {
            let ptr = read_u32_from_buf(row, schema.offset(Fields::DISTRICT) as usize);
            rec.district = self.source.read_string(ptr as usize)?;
        }

        if mask.contains(Fields::ASN) && schema.is_enabled(Fields::ASN) {
            let ptr = read_u32_from_buf(row, schema.offset(Fields::ASN) as usize);
            rec.asn = self.source.read_string(ptr as usize)?;
        }

        if mask.contains(Fields::AS_NAME) && schema.is_enabled(Fields::AS_NAME) {
            let ptr = read_u32_from_buf(row, schema.offset(Fields::AS_NAME) as usize);
            rec.as_name = self.source.read_string(ptr as usize)?;
        }

        Ok(rec)
    }
}

/// One query method per field, each passing the matching single-bit mask.
/// Declared with a macro since every body is the identical one-line
/// delegation to `query`; the per-field texture that matters (the
/// schema/offset/sentinel handling) already lives in `decode_row` above.
macro_rules! field_query {
    ($name:ident, $bit:expr) => {
        impl Database {
            #[doc = concat!("Queries only the `", stringify!($bit), "` field.")]
            pub fn $name(&self, ip: &str) -> Result<Record, Error> {
                self.query(ip, $bit)
            }
        }
    };
}

field_query!(query_country_short, Fields::COUNTRY_SHORT);
field_query!(query_country_long, Fields::COUNTRY_LONG);
field_query!(query_region, Fields::REGION);
field_query!(query_city, Fields::CITY);
field_query!(query_isp, Fields::ISP);
field_query!(query_latitude, Fields::LATITUDE);
field_query!(query_longitude, Fields::LONGITUDE);
field_query!(query_domain, Fields::DOMAIN);
field_query!(query_zipcode, Fields::ZIPCODE);
field_query!(query_timezone, Fields::TIMEZONE);
field_query!(query_netspeed, Fields::NETSPEED);
field_query!(query_iddcode, Fields::IDDCODE);
field_query!(query_areacode, Fields::AREACODE);
field_query!(query_weather_station_code, Fields::WEATHER_STATION_CODE);
field_query!(query_weather_station_name, Fields::WEATHER_STATION_NAME);
field_query!(query_mcc, Fields::MCC);
field_query!(query_mnc, Fields::MNC);
field_query!(query_mobile_brand, Fields::MOBILE_BRAND);
field_query!(query_elevation, Fields::ELEVATION);
field_query!(query_usage_type, Fields::USAGE_TYPE);
field_query!(query_address_type, Fields::ADDRESS_TYPE);
field_query!(query_category, Fields::CATEGORY);
field_query!(query_district, Fields::DISTRICT);
field_query!(query_asn, Fields::ASN);
field_query!(query_as_name, Fields::AS_NAME);

#[cfg(test)]
mod tests {
    use super::*;
    use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};

    #[test]
    fn header_rejects_pk_signature() {
        let mut buf = [0u8; HEADER_LEN];
        buf[0] = PK_DB_TYPE;
        buf[1] = PK_COLUMN_COUNT;
        assert!(matches!(Header::parse(&buf), Err(Error::InvalidBin)));
    }

    #[test]
    fn header_rejects_bad_product_code_for_year() {
        let mut buf = [0u8; HEADER_LEN];
        buf[0] = 1;
        buf[1] = 2;
        buf[2] = 21; // year
        buf[29] = 2; // wrong product code for a DB21+ file
        assert!(matches!(Header::parse(&buf), Err(Error::InvalidBin)));
    }

    #[test]
    fn header_accepts_valid_product_code() {
        let mut buf = [0u8; HEADER_LEN];
        buf[0] = 1;
        buf[1] = 2;
        buf[2] = 21;
        buf[29] = 1;
        assert!(Header::parse(&buf).is_ok());
    }

    /// Builds a minimal, valid synthetic BIN buffer with a country-only
    /// (dbType 1) IPv4 table: `0.0.0.0/8 -> US`, `1.0.0.0/8 -> JP`, no
    /// IPv6 section, no prefix index.
    fn country_only_db() -> Vec<u8> {
        let mut rows = Vec::new();
        // row 0: 0.0.0.0 -> pointer filled in after the heap layout is known.
        rows.write_u32::<LittleEndian>(0x0000_0000).unwrap();
        rows.write_u32::<LittleEndian>(0).unwrap(); // placeholder, patched below
        rows.write_u32::<LittleEndian>(0x0100_0000).unwrap();
        rows.write_u32::<LittleEndian>(0).unwrap(); // placeholder, patched below
        rows.write_u32::<LittleEndian>(0x0200_0000).unwrap(); // sentinel ipTo
        rows.write_u32::<LittleEndian>(0).unwrap();

        let header_len = HEADER_LEN as u32;
        let rows_len = rows.len() as u32;
        let heap_base = header_len + rows_len;

        let mut heap = Vec::new();
        let us_ptr = heap_base + heap.len() as u32;
        heap.push(2);
        heap.extend_from_slice(b"US");
        heap.push(13);
        heap.extend_from_slice(b"United States");

        let jp_ptr = heap_base + heap.len() as u32;
        heap.push(2);
        heap.extend_from_slice(b"JP");
        heap.push(5);
        heap.extend_from_slice(b"Japan");

        LittleEndian::write_u32(&mut rows[4..8], us_ptr);
        LittleEndian::write_u32(&mut rows[12..16], jp_ptr);

        let mut buf = vec![0u8; HEADER_LEN];
        buf[0] = 1; // dbType 1: country only
        buf[1] = 2; // columnCount: ipFrom + country pointer
        buf[2] = 20; // year < 21, product code check does not apply
        // ipv4 row count
        LittleEndian::write_u32(&mut buf[5..9], 2);
        // ipv4 base address (1-based)
        LittleEndian::write_u32(&mut buf[9..13], header_len + 1);
        // ipv6 count/addr left at 0; no index addrs set.

        buf.truncate(HEADER_LEN);
        buf.extend_from_slice(&rows);
        buf.extend_from_slice(&heap);
        buf
    }

    #[test]
    fn queries_resolve_to_the_containing_row() {
        let db = Database::open_bytes(country_only_db()).unwrap();

        let us = db.query_country_short("0.0.0.1").unwrap();
        assert_eq!(us.country_short, "US");

        let jp = db.query_country_short("1.2.3.4").unwrap();
        assert_eq!(jp.country_short, "JP");
    }

    #[test]
    fn country_long_shares_the_country_pointer() {
        let db = Database::open_bytes(country_only_db()).unwrap();
        let rec = db.query("0.0.0.1", Fields::COUNTRY_SHORT | Fields::COUNTRY_LONG).unwrap();
        assert_eq!(rec.country_short, "US");
        assert_eq!(rec.country_long, "United States");
    }

    #[test]
    fn unrequested_fields_stay_sentinel() {
        let db = Database::open_bytes(country_only_db()).unwrap();
        let rec = db.query("0.0.0.1", Fields::COUNTRY_SHORT).unwrap();
        assert_eq!(rec.region, record::NOT_SUPPORTED);
    }

    #[test]
    fn unsupported_field_on_this_schema_stays_sentinel() {
        let db = Database::open_bytes(country_only_db()).unwrap();
        let rec = db.query("0.0.0.1", Fields::ASN).unwrap();
        assert_eq!(rec.asn, record::NOT_SUPPORTED);
    }

    #[test]
    fn invalid_address_is_a_sentinel_not_an_error() {
        let db = Database::open_bytes(country_only_db()).unwrap();
        let rec = db.query("not-an-ip", Fields::ALL).unwrap();
        assert_eq!(rec.country_short, record::INVALID_ADDRESS);
    }

    #[test]
    fn ipv6_query_with_no_ipv6_section_is_not_supported() {
        let db = Database::open_bytes(country_only_db()).unwrap();
        let rec = db.query("2001:4860:4860::8888", Fields::ALL).unwrap();
        assert_eq!(rec.country_short, record::NOT_SUPPORTED);
    }

    #[test]
    fn v4_mapped_ipv6_resolves_through_the_ipv4_table() {
        let db = Database::open_bytes(country_only_db()).unwrap();
        let rec = db.query("::ffff:1.2.3.4", Fields::COUNTRY_SHORT).unwrap();
        assert_eq!(rec.country_short, "JP");
    }
}
