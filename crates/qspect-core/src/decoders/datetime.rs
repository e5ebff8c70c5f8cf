//! # Tagged-Union Temporal Decoder
//!
//! `QDate`, `QTime`, `QTimeZone`, and `QDateTime`.
//!
//! The interesting part is the short/long tagged encoding the two
//! pointer-sized types share: the low bit of the 8-byte cell says whether
//! the value is inline ("short") or behind a shared, ref-counted block
//! ("long"). The discriminant is split off explicitly at the memory-access
//! boundary into a two-case enum; everything downstream works on the enum.
//!
//! ## Layouts
//!
//! ```text
//! QDate      +0 Julian day number (8); day 0 is the invalid sentinel
//! QTime      +0 milliseconds since midnight (4); -1 is invalid
//!
//! QDateTime  cell bit 0 set:   bits 0-7 status, bits 8-63 msecs (signed)
//!            cell bit 0 clear: pointer to {ref (4), status (4), msecs (8),
//!                              UTC offset seconds (4), pad (4),
//!                              QTimeZone cell (8)}, in exactly that order —
//!                              nothing in the bytes says where fields are.
//!
//! QTimeZone  cell bit 0 set:   bits 1-2 zone spec, bits 3-63 signed offset
//!                              seconds
//!            cell bit 0 clear: pointer to {ref placeholder (8), vtable
//!                              placeholder (8), QByteArray IANA id (24)}
//! ```
//!
//! Status bits: 0x01 short form, 0x02 valid date, 0x04 valid time, 0x08
//! valid datetime, 0x30 zone spec (shifted right by 4).
//!
//! Civil dates come out of the Julian day number via the two published
//! integer-arithmetic conversion formulas; day 2299161 (1582-10-15) and
//! later take the Gregorian branch, everything earlier the Julian branch.
//! All arithmetic is integral with division truncating toward zero, as in
//! the reference formulas.

use tracing::debug;

use crate::decoders::text::read_qbytearray;
use crate::decoders::{DecodeContext, Decoder};
use crate::error::DecodeResult;
use crate::memory::{MemoryAccess, TypedRef};
use crate::render::Rendered;

/// First Julian day of the proleptic Gregorian calendar (1582-10-15).
const GREGORIAN_THRESHOLD: i64 = 2_299_161;
/// Julian day of 1970-01-01, the epoch the millisecond counts are based on.
const EPOCH_JD: i64 = 2_440_588;

const MSECS_PER_DAY: i64 = 86_400_000;
const MSECS_PER_HOUR: i32 = 3_600_000;
const MSECS_PER_MINUTE: i32 = 60_000;
const MSECS_PER_SECOND: i32 = 1000;

/// Rendered stand-in for any value whose encoding is not decodable.
const INVALID: &str = "invalid";

// QDateTime status bits.
const STATUS_SHORT: u64 = 0x01;
const STATUS_VALID_DATETIME: u32 = 0x08;
const STATUS_TIMESPEC_SHIFT: u32 = 4;
const STATUS_TIMESPEC_MASK: u32 = 0x30;

// Long-form QDateTime block offsets.
const DT_STATUS: u64 = 4;
const DT_MSECS: u64 = 8;
const DT_OFFSET: u64 = 16;
const DT_TIMEZONE: u64 = 24;

// Long-form QTimeZone block: ref placeholder, vtable placeholder, then the
// embedded byte-array identifier.
const TZ_ID: u64 = 16;

/// Convert a Julian day number to a civil (year, month, day).
///
/// Gregorian branch for `jd >= 2299161`, Julian branch below; both are the
/// published integer formulas, kept verbatim.
fn civil_from_julian(jd: i64) -> (i64, u32, u32)
{
    if jd >= GREGORIAN_THRESHOLD {
        let mut l = jd + 68_569;
        let n = (4 * l) / 146_097;
        l -= (146_097 * n + 3) / 4;
        let i = (4000 * (l + 1)) / 1_461_001;
        l = l - (1461 * i) / 4 + 31;
        let j = (80 * l) / 2447;
        let day = l - (2447 * j) / 80;
        l = j / 11;
        let month = j + 2 - 12 * l;
        let year = 100 * (n - 49) + i + l;
        (year, month as u32, day as u32)
    } else {
        let j = jd + 1402;
        let k = (j - 1) / 1461;
        let l = j - 1461 * k;
        let n = (l - 1) / 365 - l / 1461;
        let i = l - 365 * n + 30;
        let j2 = (80 * i) / 2447;
        let day = i - (2447 * j2) / 80;
        let i2 = j2 / 11;
        let month = j2 + 2 - 12 * i2;
        let year = 4 * k + n + i2 - 4716;
        (year, month as u32, day as u32)
    }
}

/// Format a Julian day as `YYYY-MM-DD`, or the invalid token for day 0.
fn format_julian_date(jd: i64) -> String
{
    if jd == 0 {
        return INVALID.to_string();
    }
    let (year, month, day) = civil_from_julian(jd);
    format!("{year:04}-{month:02}-{day:02}")
}

/// Format milliseconds-since-midnight as `HH:MM:SS.mmm`; negative counts
/// (the -1 sentinel included) are invalid.
fn format_msecs_of_day(mds: i32) -> String
{
    if mds < 0 {
        return INVALID.to_string();
    }
    let hour = mds / MSECS_PER_HOUR;
    let minute = (mds % MSECS_PER_HOUR) / MSECS_PER_MINUTE;
    let second = (mds % MSECS_PER_MINUTE) / MSECS_PER_SECOND;
    let msec = mds % MSECS_PER_SECOND;
    format!("{hour:02}:{minute:02}:{second:02}.{msec:03}")
}

/// Format a fixed UTC offset in seconds as `UTC±HH:MM`.
fn format_utc_offset(offset_secs: i32) -> String
{
    let sign = if offset_secs < 0 { '-' } else { '+' };
    let magnitude = offset_secs.unsigned_abs();
    format!("UTC{sign}{:02}:{:02}", magnitude / 3600, (magnitude % 3600) / 60)
}

/// The 2-bit zone-spec enumeration carried by timezone cells and datetime
/// status words.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ZoneSpec
{
    Local,
    Utc,
    FixedOffset,
    NamedZone,
}

impl ZoneSpec
{
    /// Decode the enumeration from an already-masked field. Values outside
    /// the four known cases must render an explicit error, never silently
    /// collapse into a known one.
    fn from_bits(bits: u32) -> Option<Self>
    {
        match bits {
            0 => Some(Self::Local),
            1 => Some(Self::Utc),
            2 => Some(Self::FixedOffset),
            3 => Some(Self::NamedZone),
            _ => None,
        }
    }
}

/// A timezone cell, split at the memory boundary.
#[derive(Debug, Clone, Copy)]
enum TimeZoneRepr
{
    /// Inline: pre-resolved spec plus fixed offset
    ShortInline
    {
        spec_bits: u32,
        offset_secs: i32,
    },
    /// Behind a shared block holding the IANA identifier
    LongShared
    {
        block: u64,
    },
}

/// Split the one-bit discriminant off a timezone cell.
fn split_timezone_cell(cell: u64) -> TimeZoneRepr
{
    if cell & 1 != 0 {
        TimeZoneRepr::ShortInline {
            spec_bits: ((cell >> 1) & 3) as u32,
            offset_secs: ((cell as i64) >> 3) as i32,
        }
    } else {
        TimeZoneRepr::LongShared { block: cell }
    }
}

/// Render a zone spec with its supporting data.
///
/// `NamedZone` needs the timezone cell; a named zone without one (a short
/// timezone cell claiming `NamedZone`, say) renders the invalid token.
fn format_zone_spec(mem: &dyn MemoryAccess, spec_bits: u32, offset_secs: i32, tz_cell: Option<u64>) -> String
{
    match ZoneSpec::from_bits(spec_bits) {
        Some(ZoneSpec::Local) => "Local".to_string(),
        Some(ZoneSpec::Utc) => "UTC".to_string(),
        Some(ZoneSpec::FixedOffset) => format_utc_offset(offset_secs),
        Some(ZoneSpec::NamedZone) => match tz_cell {
            Some(cell) => format_timezone_cell(mem, cell),
            None => format!("<{INVALID} timezone>"),
        },
        None => format!("<{INVALID} timespec {spec_bits}>"),
    }
}

/// Render a timezone cell (short or long form) as a display token.
fn format_timezone_cell(mem: &dyn MemoryAccess, cell: u64) -> String
{
    match split_timezone_cell(cell) {
        TimeZoneRepr::ShortInline {
            spec_bits,
            offset_secs,
        } => format_zone_spec(mem, spec_bits, offset_secs, None),
        TimeZoneRepr::LongShared { block } => {
            if block == 0 {
                return format!("<{INVALID} timezone>");
            }
            match read_qbytearray(mem, block + TZ_ID) {
                Ok(id) if id.is_empty() => format!("<{INVALID} timezone>"),
                Ok(id) => id.iter().map(|&b| char::from(b)).collect(),
                Err(err) => {
                    debug!(block = format_args!("{block:#x}"), %err, "timezone block unreadable");
                    format!("<{INVALID} timezone>")
                }
            }
        }
    }
}

/// `QDate`: a bare Julian day number.
pub struct QDateDecoder;

impl Decoder for QDateDecoder
{
    fn decode<'m>(&self, ctx: DecodeContext<'m>, value: &TypedRef) -> Rendered<'m>
    {
        match ctx.mem.read_i64(value.addr) {
            Ok(jd) => Rendered::display(format_julian_date(jd)),
            Err(err) => {
                debug!(addr = format_args!("{:#x}", value.addr), %err, "QDate unreadable");
                Rendered::display(INVALID)
            }
        }
    }
}

/// `QTime`: milliseconds since midnight.
pub struct QTimeDecoder;

impl Decoder for QTimeDecoder
{
    fn decode<'m>(&self, ctx: DecodeContext<'m>, value: &TypedRef) -> Rendered<'m>
    {
        match ctx.mem.read_i32(value.addr) {
            Ok(mds) => Rendered::display(format_msecs_of_day(mds)),
            Err(err) => {
                debug!(addr = format_args!("{:#x}", value.addr), %err, "QTime unreadable");
                Rendered::display(INVALID)
            }
        }
    }
}

/// `QTimeZone`: the tagged timezone cell on its own.
pub struct QTimeZoneDecoder;

impl Decoder for QTimeZoneDecoder
{
    fn decode<'m>(&self, ctx: DecodeContext<'m>, value: &TypedRef) -> Rendered<'m>
    {
        match ctx.mem.read_u64(value.addr) {
            Ok(cell) => Rendered::display(format_timezone_cell(ctx.mem, cell)),
            Err(err) => {
                debug!(addr = format_args!("{:#x}", value.addr), %err, "QTimeZone unreadable");
                Rendered::display(format!("<{INVALID} timezone>"))
            }
        }
    }
}

/// The fields shared by both `QDateTime` encodings, once decoded.
struct DateTimeFields
{
    status: u32,
    msecs: i64,
    offset_secs: i32,
    tz_cell: Option<u64>,
}

/// `QDateTime`: epoch milliseconds with a zone tag, short or long form.
pub struct QDateTimeDecoder;

impl QDateTimeDecoder
{
    fn read_fields(mem: &dyn MemoryAccess, addr: u64) -> DecodeResult<Option<DateTimeFields>>
    {
        let cell = mem.read_u64(addr)?;
        if cell & STATUS_SHORT != 0 {
            // Inline form: status byte, then the millisecond count in the
            // remaining 56 bits. The offset is implicitly zero.
            return Ok(Some(DateTimeFields {
                status: (cell & 0xff) as u32,
                msecs: (cell as i64) >> 8,
                offset_secs: 0,
                tz_cell: None,
            }));
        }
        if cell == 0 {
            return Ok(None);
        }
        // Out-of-line form: the cell is a pointer and the block's field
        // order is fixed; there is no type information in the bytes.
        Ok(Some(DateTimeFields {
            status: mem.read_u32(cell + DT_STATUS)?,
            msecs: mem.read_i64(cell + DT_MSECS)?,
            offset_secs: mem.read_i32(cell + DT_OFFSET)?,
            tz_cell: Some(mem.read_u64(cell + DT_TIMEZONE)?),
        }))
    }
}

impl Decoder for QDateTimeDecoder
{
    fn decode<'m>(&self, ctx: DecodeContext<'m>, value: &TypedRef) -> Rendered<'m>
    {
        let fields = match Self::read_fields(ctx.mem, value.addr) {
            Ok(Some(fields)) => fields,
            Ok(None) => return Rendered::display(INVALID),
            Err(err) => {
                debug!(addr = format_args!("{:#x}", value.addr), %err, "QDateTime unreadable");
                return Rendered::display(INVALID);
            }
        };

        if fields.status & STATUS_VALID_DATETIME == 0 {
            return Rendered::display(INVALID);
        }

        let spec_bits = (fields.status & STATUS_TIMESPEC_MASK) >> STATUS_TIMESPEC_SHIFT;
        // Shift the UTC-based count into the zone's civil frame, then split
        // into day count and milliseconds of day. Truncation only, never
        // rounding.
        let zoned = fields.msecs + i64::from(fields.offset_secs) * 1000;
        let jd = EPOCH_JD + zoned.div_euclid(MSECS_PER_DAY);
        let mds = zoned.rem_euclid(MSECS_PER_DAY) as i32;
        let zone = format_zone_spec(ctx.mem, spec_bits, fields.offset_secs, fields.tz_cell);
        Rendered::display(format!(
            "{} {} {zone}",
            format_julian_date(jd),
            format_msecs_of_day(mds)
        ))
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_julian_day_zero_is_invalid()
    {
        assert_eq!(format_julian_date(0), "invalid");
    }

    #[test]
    fn test_gregorian_branch_boundary()
    {
        // First day of the Gregorian calendar.
        assert_eq!(format_julian_date(2_299_161), "1582-10-15");
        // One day earlier falls back to the Julian formulas: ten calendar
        // days vanish across the boundary.
        assert_eq!(format_julian_date(2_299_160), "1582-10-04");
    }

    #[test]
    fn test_epoch_and_modern_dates()
    {
        assert_eq!(format_julian_date(EPOCH_JD), "1970-01-01");
        assert_eq!(format_julian_date(2_460_000), "2023-02-24");
    }

    #[test]
    fn test_msecs_of_day_formatting()
    {
        assert_eq!(format_msecs_of_day(-1), "invalid");
        assert_eq!(format_msecs_of_day(0), "00:00:00.000");
        assert_eq!(format_msecs_of_day(3_661_000), "01:01:01.000");
        assert_eq!(format_msecs_of_day(86_399_999), "23:59:59.999");
    }

    #[test]
    fn test_fixed_offset_formatting()
    {
        assert_eq!(format_utc_offset(-9000), "UTC-02:30");
        assert_eq!(format_utc_offset(3600), "UTC+01:00");
        assert_eq!(format_utc_offset(0), "UTC+00:00");
    }

    #[test]
    fn test_short_timezone_cell_round_trip()
    {
        // spec FixedOffset (2) in bits 1-2, offset -9000 in bits 3+.
        let cell = 1 | (2 << 1) | (((-9000i64) << 3) as u64);
        match split_timezone_cell(cell) {
            TimeZoneRepr::ShortInline {
                spec_bits,
                offset_secs,
            } => {
                assert_eq!(spec_bits, 2);
                assert_eq!(offset_secs, -9000);
            }
            TimeZoneRepr::LongShared { .. } => panic!("expected short form"),
        }
    }

    #[test]
    fn test_zone_spec_rejects_out_of_range_bits()
    {
        assert_eq!(ZoneSpec::from_bits(4), None);
    }
}
