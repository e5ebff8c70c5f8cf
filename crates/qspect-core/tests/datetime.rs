//! Tests for the temporal decoders: QDate, QTime, QTimeZone, QDateTime.

mod common;

use common::{ty, Fixture};
use qspect_core::{Catalogue, TypedRef};

fn decode(f: &Fixture, addr: u64, name: &str, size: u64) -> String
{
    let catalogue = Catalogue::qt6();
    let rendered = catalogue
        .decode(&f.mem, &TypedRef::new(addr, ty(name, size, 8)))
        .unwrap();
    rendered.display
}

/// Build a short-form QDateTime cell: status in the low byte, the signed
/// millisecond count in the remaining 56 bits.
fn short_datetime_cell(msecs: i64, status: u64) -> u64
{
    ((msecs << 8) as u64) | (status & 0xff)
}

/// Write an out-of-line QDateTime block and return its address.
fn alloc_datetime_block(f: &mut Fixture, status: u32, msecs: i64, offset_secs: i32, tz_cell: u64) -> u64
{
    let block = f.alloc(32, 8);
    f.mem.poke_u32(block, 1); // ref count
    f.mem.poke_u32(block + 4, status);
    f.mem.poke_i64(block + 8, msecs);
    f.mem.poke_i32(block + 16, offset_secs);
    f.mem.poke_u64(block + 24, tz_cell);
    block
}

#[test]
fn test_date_renders_civil_form()
{
    let mut f = Fixture::new();
    let addr = f.alloc(8, 8);
    f.mem.poke_i64(addr, 2_440_588);
    assert_eq!(decode(&f, addr, "QDate", 8), "1970-01-01");

    f.mem.poke_i64(addr, 2_299_160); // last day before the Gregorian switch
    assert_eq!(decode(&f, addr, "QDate", 8), "1582-10-04");

    f.mem.poke_i64(addr, 0);
    assert_eq!(decode(&f, addr, "QDate", 8), "invalid");
}

#[test]
fn test_time_renders_wall_clock_form()
{
    let mut f = Fixture::new();
    let addr = f.alloc(4, 4);
    f.mem.poke_i32(addr, 3_661_000);
    assert_eq!(decode(&f, addr, "QTime", 4), "01:01:01.000");

    f.mem.poke_i32(addr, -1);
    assert_eq!(decode(&f, addr, "QTime", 4), "invalid");
}

#[test]
fn test_short_timezone_cells()
{
    let mut f = Fixture::new();
    let addr = f.alloc(8, 8);

    f.mem.poke_u64(addr, 1); // short, spec Local
    assert_eq!(decode(&f, addr, "QTimeZone", 8), "Local");

    f.mem.poke_u64(addr, 1 | (1 << 1)); // short, spec UTC
    assert_eq!(decode(&f, addr, "QTimeZone", 8), "UTC");

    // Short, FixedOffset, -9000 seconds in the signed upper bits.
    f.mem.poke_u64(addr, 1 | (2 << 1) | (((-9000i64) << 3) as u64));
    assert_eq!(decode(&f, addr, "QTimeZone", 8), "UTC-02:30");

    f.mem.poke_u64(addr, 0); // long form with a null block
    assert_eq!(decode(&f, addr, "QTimeZone", 8), "<invalid timezone>");
}

#[test]
fn test_long_timezone_reads_iana_identifier()
{
    let mut f = Fixture::new();
    let block = f.alloc(40, 8);
    f.put_qbytearray(block + 16, b"Europe/Berlin");

    let addr = f.alloc(8, 8);
    f.mem.poke_u64(addr, block);
    assert_eq!(decode(&f, addr, "QTimeZone", 8), "Europe/Berlin");
}

#[test]
fn test_long_timezone_with_empty_identifier_is_invalid()
{
    let mut f = Fixture::new();
    let block = f.alloc(40, 8);
    f.put_qbytearray(block + 16, b"");

    let addr = f.alloc(8, 8);
    f.mem.poke_u64(addr, block);
    assert_eq!(decode(&f, addr, "QTimeZone", 8), "<invalid timezone>");
}

#[test]
fn test_short_datetime_local_and_utc()
{
    let mut f = Fixture::new();
    let addr = f.alloc(8, 8);

    // short | valid date | valid time | valid datetime, spec Local.
    f.mem.poke_u64(addr, short_datetime_cell(0, 0x0f));
    assert_eq!(decode(&f, addr, "QDateTime", 8), "1970-01-01 00:00:00.000 Local");

    // Same status with spec UTC in bits 4-5.
    f.mem.poke_u64(addr, short_datetime_cell(3_661_000, 0x0f | (1 << 4)));
    assert_eq!(decode(&f, addr, "QDateTime", 8), "1970-01-01 01:01:01.000 UTC");
}

#[test]
fn test_short_datetime_negative_msecs_crosses_epoch()
{
    let mut f = Fixture::new();
    let addr = f.alloc(8, 8);
    f.mem.poke_u64(addr, short_datetime_cell(-1000, 0x0f | (1 << 4)));
    assert_eq!(decode(&f, addr, "QDateTime", 8), "1969-12-31 23:59:59.000 UTC");
}

#[test]
fn test_short_datetime_without_valid_bit_is_invalid()
{
    let mut f = Fixture::new();
    let addr = f.alloc(8, 8);
    f.mem.poke_u64(addr, short_datetime_cell(3_661_000, 0x01));
    assert_eq!(decode(&f, addr, "QDateTime", 8), "invalid");
}

#[test]
fn test_null_datetime_cell_is_invalid()
{
    let mut f = Fixture::new();
    let addr = f.alloc(8, 8);
    f.mem.poke_u64(addr, 0);
    assert_eq!(decode(&f, addr, "QDateTime", 8), "invalid");
}

#[test]
fn test_long_datetime_with_fixed_offset()
{
    let mut f = Fixture::new();
    // FixedOffset (2) in the timespec bits; no short bit. The stored count
    // is UTC-based, the display is shifted into the zone's frame.
    let block = alloc_datetime_block(&mut f, 0x0e | (2 << 4), 18_000_000, -9000, 0);
    let addr = f.alloc(8, 8);
    f.mem.poke_u64(addr, block);
    assert_eq!(
        decode(&f, addr, "QDateTime", 8),
        "1970-01-01 02:30:00.000 UTC-02:30"
    );
}

#[test]
fn test_long_datetime_with_named_zone()
{
    let mut f = Fixture::new();
    let tz_block = f.alloc(40, 8);
    f.put_qbytearray(tz_block + 16, b"Asia/Tokyo");

    let block = alloc_datetime_block(&mut f, 0x0e | (3 << 4), 0, 32_400, tz_block);
    let addr = f.alloc(8, 8);
    f.mem.poke_u64(addr, block);
    assert_eq!(
        decode(&f, addr, "QDateTime", 8),
        "1970-01-01 09:00:00.000 Asia/Tokyo"
    );
}

#[test]
fn test_datetime_decode_is_idempotent()
{
    let mut f = Fixture::new();
    let addr = f.alloc(8, 8);
    f.mem.poke_u64(addr, short_datetime_cell(42_000, 0x0f | (1 << 4)));
    let first = decode(&f, addr, "QDateTime", 8);
    let second = decode(&f, addr, "QDateTime", 8);
    assert_eq!(first, second);
    assert_eq!(first, "1970-01-01 00:00:42.000 UTC");
}
