//! Value-level conversions shared by the write walker and the read
//! converters: calendar/instant arithmetic, time-unit scaling, UUID byte
//! order and decimal rescaling.

use bigdecimal::rounding::RoundingMode;
use bigdecimal::BigDecimal;
use byteorder::{BigEndian, ByteOrder};
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Timelike, Utc};
use num_bigint::BigInt;
use num_traits::ToPrimitive;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::options::TimeUnit;

fn epoch() -> NaiveDate {
	NaiveDate::from_ymd_opt(1970, 1, 1).unwrap()
}

pub fn days_from_date(date: NaiveDate) -> i32 {
	(date - epoch()).num_days() as i32
}

pub fn date_from_days(days: i32) -> Result<NaiveDate> {
	epoch()
		.checked_add_signed(Duration::days(days as i64))
		.ok_or(Error::ArithmeticOverflow { context: "converting days to a date" })
}

fn units_per_second(unit: TimeUnit) -> i64 {
	match unit {
		TimeUnit::Millis => 1_000,
		TimeUnit::Micros => 1_000_000,
		TimeUnit::Nanos => 1_000_000_000,
	}
}

/// Re-expresses a temporal value between units. Widening multiplies with an
/// overflow check, narrowing divides (truncating toward negative infinity so
/// pre-epoch instants stay ordered).
pub fn convert_unit(value: i64, from: TimeUnit, to: TimeUnit) -> Result<i64> {
	let from_k = units_per_second(from);
	let to_k = units_per_second(to);
	if to_k >= from_k {
		value
			.checked_mul(to_k / from_k)
			.ok_or(Error::ArithmeticOverflow { context: "converting between time units" })
	} else {
		Ok(value.div_euclid(from_k / to_k))
	}
}

/// Instant -> integer in the given unit. `nanos` is the sub-second part in
/// `[0, 1e9)` paired with floored seconds, which is exactly what chrono's
/// `timestamp()`/`timestamp_subsec_nanos()` produce for pre-epoch values.
pub fn instant_to_unit(secs: i64, nanos: u32, unit: TimeUnit) -> Result<i64> {
	let k = units_per_second(unit);
	let sub = nanos as i64 / (1_000_000_000 / k);
	secs.checked_mul(k)
		.and_then(|v| v.checked_add(sub))
		.ok_or(Error::ArithmeticOverflow { context: "converting an instant to a time unit" })
}

/// Integer in the given unit -> (floored seconds, sub-second nanos).
pub fn instant_from_unit(value: i64, unit: TimeUnit) -> (i64, u32) {
	let k = units_per_second(unit);
	let secs = value.div_euclid(k);
	let nanos = value.rem_euclid(k) * (1_000_000_000 / k);
	(secs, nanos as u32)
}

pub fn timestamp_from_unit(value: i64, unit: TimeUnit) -> Result<DateTime<Utc>> {
	let (secs, nanos) = instant_from_unit(value, unit);
	DateTime::from_timestamp(secs, nanos)
		.ok_or(Error::ArithmeticOverflow { context: "converting to a timestamp" })
}

pub fn time_of_day_to_unit(time: NaiveTime, unit: TimeUnit) -> i64 {
	let nanos = time.num_seconds_from_midnight() as i64 * 1_000_000_000 + time.nanosecond() as i64;
	nanos / (1_000_000_000 / units_per_second(unit))
}

pub fn time_of_day_from_unit(value: i64, unit: TimeUnit) -> Result<NaiveTime> {
	let k = units_per_second(unit);
	let secs = value.div_euclid(k);
	let nanos = value.rem_euclid(k) * (1_000_000_000 / k);
	if !(0..86_400).contains(&secs) {
		return Err(Error::ArithmeticOverflow { context: "converting to a time of day" });
	}
	NaiveTime::from_num_seconds_from_midnight_opt(secs as u32, nanos as u32)
		.ok_or(Error::ArithmeticOverflow { context: "converting to a time of day" })
}

/// 16-byte big-endian wire form of a UUID.
pub fn uuid_to_bytes(uuid: Uuid) -> [u8; 16] {
	*uuid.as_bytes()
}

/// Reassembles the (hi, lo) halves from the big-endian wire form.
pub fn uuid_from_bytes(bytes: &[u8]) -> Result<Uuid> {
	if bytes.len() != 16 {
		return Err(Error::mismatch("<uuid>", format!("expected 16 bytes, got {}", bytes.len())));
	}
	let hi = BigEndian::read_u64(&bytes[0..8]);
	let lo = BigEndian::read_u64(&bytes[8..16]);
	Ok(Uuid::from_u64_pair(hi, lo))
}

pub fn uuid_halves(uuid: Uuid) -> (u64, u64) {
	let bytes = uuid.as_bytes();
	(BigEndian::read_u64(&bytes[0..8]), BigEndian::read_u64(&bytes[8..16]))
}

/// Brings a decimal to the target scale. Truncation that would lose digits
/// requires a rounding mode; without one the write fails instead of silently
/// changing the value.
pub fn rescale_decimal(value: &BigDecimal, scale: i64, rounding: Option<RoundingMode>) -> Result<BigDecimal> {
	let exact = value.with_scale(scale);
	if &exact == value {
		return Ok(exact);
	}
	match rounding {
		Some(mode) => Ok(value.with_scale_round(scale, mode)),
		None => {
			let (_, from) = value.as_bigint_and_exponent();
			Err(Error::DecimalScaleMismatch { from, to: scale })
		}
	}
}

/// Unscaled integer of a decimal already brought to `scale`, checked against
/// the declared precision.
pub fn decimal_unscaled(value: BigDecimal, precision: u32) -> Result<BigInt> {
	if value.digits() > precision as u64 {
		return Err(Error::ArithmeticOverflow { context: "fitting a decimal into its declared precision" });
	}
	let (unscaled, _) = value.into_bigint_and_exponent();
	Ok(unscaled)
}

pub fn decimal_unscaled_i32(value: BigDecimal, precision: u32) -> Result<i32> {
	decimal_unscaled(value, precision)?
		.to_i32()
		.ok_or(Error::ArithmeticOverflow { context: "fitting a decimal into 32 bits" })
}

pub fn decimal_unscaled_i64(value: BigDecimal, precision: u32) -> Result<i64> {
	decimal_unscaled(value, precision)?
		.to_i64()
		.ok_or(Error::ArithmeticOverflow { context: "fitting a decimal into 64 bits" })
}

/// Two's-complement big-endian unscaled bytes, used for precision > 18.
pub fn decimal_unscaled_bytes(value: BigDecimal, precision: u32) -> Result<Vec<u8>> {
	Ok(decimal_unscaled(value, precision)?.to_signed_bytes_be())
}

pub fn decimal_from_unscaled_i64(unscaled: i64, scale: i64) -> BigDecimal {
	BigDecimal::new(BigInt::from(unscaled), scale)
}

pub fn decimal_from_unscaled_bytes(bytes: &[u8], scale: i64) -> BigDecimal {
	BigDecimal::new(BigInt::from_signed_bytes_be(bytes), scale)
}

/// Case-sensitive lookup of an enum constant.
pub fn check_enum_constant(constants: &[String], name: &str, path: &str) -> Result<()> {
	if constants.iter().any(|c| c == name) {
		Ok(())
	} else {
		Err(Error::UnknownEnumConstant { path: path.to_string(), value: name.to_string() })
	}
}

#[cfg(test)]
mod tests {
	use std::str::FromStr;

	use super::*;

	#[test]
	fn date_roundtrip_covers_pre_epoch() {
		for ymd in [(1969, 12, 31), (1970, 1, 1), (2024, 2, 29), (1900, 6, 15)] {
			let date = NaiveDate::from_ymd_opt(ymd.0, ymd.1, ymd.2).unwrap();
			assert_eq!(date_from_days(days_from_date(date)).unwrap(), date);
		}
		assert_eq!(days_from_date(NaiveDate::from_ymd_opt(1969, 12, 31).unwrap()), -1);
	}

	#[test]
	fn instant_units_floor_before_epoch() {
		// -0.5s is -500 millis, which must map back to (-1s, 5e8ns)
		let (secs, nanos) = instant_from_unit(-500, TimeUnit::Millis);
		assert_eq!((secs, nanos), (-1, 500_000_000));
		assert_eq!(instant_to_unit(-1, 500_000_000, TimeUnit::Millis).unwrap(), -500);
	}

	#[test]
	fn unit_conversion_checks_overflow() {
		assert_eq!(convert_unit(1_500, TimeUnit::Millis, TimeUnit::Micros).unwrap(), 1_500_000);
		assert_eq!(convert_unit(1_999, TimeUnit::Micros, TimeUnit::Millis).unwrap(), 1);
		assert!(matches!(
			convert_unit(i64::MAX / 2, TimeUnit::Millis, TimeUnit::Nanos),
			Err(Error::ArithmeticOverflow { .. })
		));
	}

	#[test]
	fn time_of_day_units() {
		let t = NaiveTime::from_hms_milli_opt(13, 30, 5, 250).unwrap();
		let millis = time_of_day_to_unit(t, TimeUnit::Millis);
		assert_eq!(millis, ((13 * 3600 + 30 * 60 + 5) * 1000 + 250) as i64);
		assert_eq!(time_of_day_from_unit(millis, TimeUnit::Millis).unwrap(), t);
	}

	#[test]
	fn uuid_bytes_are_big_endian() {
		let uuid = Uuid::from_str("67e55044-10b1-426f-9247-bb680e5fe0c8").unwrap();
		let bytes = uuid_to_bytes(uuid);
		assert_eq!(bytes[0], 0x67);
		assert_eq!(uuid_from_bytes(&bytes).unwrap(), uuid);
		let (hi, lo) = uuid_halves(uuid);
		assert_eq!(Uuid::from_u64_pair(hi, lo), uuid);
	}

	#[test]
	fn rescale_requires_rounding_mode_on_loss() {
		let d = BigDecimal::from_str("1.255").unwrap();
		assert!(matches!(rescale_decimal(&d, 2, None), Err(Error::DecimalScaleMismatch { .. })));
		let rounded = rescale_decimal(&d, 2, Some(RoundingMode::HalfUp)).unwrap();
		assert_eq!(rounded, BigDecimal::from_str("1.26").unwrap());
		// widening the scale never needs a mode
		assert_eq!(rescale_decimal(&d, 5, None).unwrap(), BigDecimal::from_str("1.25500").unwrap());
	}

	#[test]
	fn unscaled_forms_roundtrip() {
		let d = BigDecimal::from_str("-12.34").unwrap();
		let scaled = rescale_decimal(&d, 2, None).unwrap();
		assert_eq!(decimal_unscaled_i32(scaled.clone(), 9).unwrap(), -1234);
		assert_eq!(decimal_from_unscaled_i64(-1234, 2), d);
		let bytes = decimal_unscaled_bytes(scaled, 38).unwrap();
		assert_eq!(decimal_from_unscaled_bytes(&bytes, 2), d);
	}

	#[test]
	fn precision_is_enforced() {
		let d = BigDecimal::from_str("123.45").unwrap();
		assert!(matches!(
			decimal_unscaled_i32(d, 4),
			Err(Error::ArithmeticOverflow { .. })
		));
	}
}
