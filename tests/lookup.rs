//! End-to-end tests against hand-built synthetic BIN buffers, exercising
//! the query path from `Database::open_bytes` through to a decoded
//! `Record`. There is no real vendor `.BIN` fixture in this repo, so every
//! test here constructs its own tiny database byte-for-byte.

use byteorder::{ByteOrder, LittleEndian};
use ip2location_bin::{Database, Fields};

const HEADER_LEN: usize = 64;

struct Row {
    ip_from: u32,
    country: &'static str,
}

/// Builds a country-only (dbType 1) IPv4-only database from a sorted,
/// non-overlapping list of `(ipFrom, countryShort)` rows, terminated
/// implicitly at `0xFFFFFFFF`. `indexed` controls whether a 65536-entry
/// prefix index is emitted.
fn build_ipv4_db(rows: &[Row], indexed: bool) -> Vec<u8> {
    let row_count = rows.len() as u32;
    let row_size = 8u32; // ipFrom(4) + country pointer(4)

    let mut row_bytes = Vec::new();
    let mut pointers = Vec::new();
    let mut heap = Vec::new();
    // heap_base is filled in once the header + row table size is known.
    for row in rows {
        pointers.push(heap.len() as u32);
        heap.push(row.country.len() as u8);
        heap.extend_from_slice(row.country.as_bytes());
    }
    // sentinel terminator row
    let mut froms: Vec<u32> = rows.iter().map(|r| r.ip_from).collect();
    froms.push(0xFFFF_FFFF);

    let header_len = HEADER_LEN as u32;
    let rows_len = (froms.len() as u32) * row_size;
    let heap_base = header_len + rows_len;

    for (i, &from) in froms.iter().enumerate() {
        let mut buf4 = [0u8; 4];
        LittleEndian::write_u32(&mut buf4, from);
        row_bytes.extend_from_slice(&buf4);
        let ptr = pointers.get(i).map(|p| heap_base + p).unwrap_or(0);
        let mut buf4 = [0u8; 4];
        LittleEndian::write_u32(&mut buf4, ptr);
        row_bytes.extend_from_slice(&buf4);
    }

    let index_len = if indexed { 65536 * 8 } else { 0 };
    let index_base = header_len + rows_len + heap.len() as u32;

    let mut buf = vec![0u8; HEADER_LEN];
    buf[0] = 1; // dbType 1
    buf[1] = 2; // columnCount
    buf[2] = 20; // year, below the product-code-enforced threshold
    LittleEndian::write_u32(&mut buf[5..9], row_count);
    LittleEndian::write_u32(&mut buf[9..13], header_len + 1);
    if indexed {
        LittleEndian::write_u32(&mut buf[21..25], index_base + 1);
    }

    let mut out = buf;
    out.extend_from_slice(&row_bytes);
    out.extend_from_slice(&heap);

    if indexed {
        let mut index = vec![0u8; index_len as usize];
        for entry in index.chunks_mut(8) {
            LittleEndian::write_u32(&mut entry[0..4], 0);
            LittleEndian::write_u32(&mut entry[4..8], row_count as u32);
        }
        for (i, row) in rows.iter().enumerate() {
            let bucket = (row.ip_from >> 16) as usize;
            LittleEndian::write_u32(&mut index[bucket * 8..bucket * 8 + 4], i as u32);
            LittleEndian::write_u32(&mut index[bucket * 8 + 4..bucket * 8 + 8], i as u32);
        }
        out.extend_from_slice(&index);
    }

    out
}

fn three_country_db() -> Vec<u8> {
    build_ipv4_db(
        &[
            Row { ip_from: 0x0100_0000, country: "AA" }, // 1.0.0.0/8
            Row { ip_from: 0x0200_0000, country: "BB" }, // 2.0.0.0/8
            Row { ip_from: 0x0300_0000, country: "CC" }, // 3.0.0.0/8
        ],
        false,
    )
}

#[test]
fn every_address_resolves_to_its_containing_row() {
    let db = Database::open_bytes(three_country_db()).unwrap();

    assert_eq!(db.query_country_short("1.0.0.0").unwrap().country_short, "AA");
    assert_eq!(db.query_country_short("1.255.255.255").unwrap().country_short, "AA");
    assert_eq!(db.query_country_short("2.0.0.0").unwrap().country_short, "BB");
    assert_eq!(db.query_country_short("2.123.45.6").unwrap().country_short, "BB");
    assert_eq!(db.query_country_short("3.0.0.1").unwrap().country_short, "CC");
}

#[test]
fn address_below_the_first_row_is_not_supported() {
    let db = Database::open_bytes(three_country_db()).unwrap();
    let rec = db.query_country_short("0.0.0.1").unwrap();
    assert_eq!(rec.country_short, ip2location_bin::NOT_SUPPORTED_MESSAGE);
}

#[test]
fn last_row_covers_the_rest_of_the_address_space() {
    // A real BIN file's rows partition the whole address space
    // contiguously, so the final row's range implicitly runs to
    // 255.255.255.255 — there is no "past the last row" gap to fall into.
    let db = Database::open_bytes(three_country_db()).unwrap();
    assert_eq!(db.query_country_short("9.9.9.9").unwrap().country_short, "CC");
    assert_eq!(db.query_country_short("255.255.255.255").unwrap().country_short, "CC");
}

#[test]
fn prefix_index_narrows_and_still_resolves_correctly() {
    let db = Database::open_bytes(build_ipv4_db(
        &[
            Row { ip_from: 0x0100_0000, country: "AA" },
            Row { ip_from: 0x0200_0000, country: "BB" },
            Row { ip_from: 0x0300_0000, country: "CC" },
        ],
        true,
    ))
    .unwrap();

    // 1.0.0.5's top 16 bits (0x0100) hit the index bucket set up to point
    // directly at row 0.
    assert_eq!(db.query_country_short("1.0.0.5").unwrap().country_short, "AA");
    // 2.9.9.9's top 16 bits (0x0209) fall outside every explicitly narrowed
    // bucket, exercising the default full-range fallback.
    assert_eq!(db.query_country_short("2.9.9.9").unwrap().country_short, "BB");
    assert_eq!(db.query_country_short("9.9.9.9").unwrap().country_short, "CC");
}

#[test]
fn invalid_text_never_surfaces_as_an_error() {
    let db = Database::open_bytes(three_country_db()).unwrap();
    let rec = db.query("definitely not an ip", Fields::ALL).unwrap();
    assert_eq!(rec.country_short, ip2location_bin::INVALID_ADDRESS_MESSAGE);
}

#[test]
fn v6_mapped_and_6to4_addresses_fold_onto_the_ipv4_table() {
    let db = Database::open_bytes(three_country_db()).unwrap();

    let mapped = db.query_country_short("::ffff:2.3.4.5").unwrap();
    assert_eq!(mapped.country_short, "BB");

    let sixto4 = db.query_country_short("2002:0200:0000::").unwrap();
    assert_eq!(sixto4.country_short, "BB");
}

#[test]
fn corrupt_header_is_rejected_at_open() {
    let mut bytes = three_country_db();
    bytes[0] = 0x50; // 'P'
    bytes[1] = 0x4B; // 'K' -- looks like a zip file, not a BIN file
    assert!(Database::open_bytes(bytes).is_err());
}

#[test]
fn field_absent_from_schema_is_reported_as_not_supported() {
    // dbType 1 only carries country; every other field must come back
    // as the "unsupported" sentinel rather than empty or panicking.
    let db = Database::open_bytes(three_country_db()).unwrap();
    let rec = db.query_all("1.0.0.1").unwrap();
    assert_eq!(rec.country_short, "AA");
    assert_eq!(rec.region, ip2location_bin::NOT_SUPPORTED_MESSAGE);
    assert_eq!(rec.isp, ip2location_bin::NOT_SUPPORTED_MESSAGE);
    assert_eq!(rec.as_name, ip2location_bin::NOT_SUPPORTED_MESSAGE);
    assert_eq!(rec.latitude, 0.0);
}
