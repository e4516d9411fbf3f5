use std::sync::Arc;

use crate::descriptor::RecordDesc;
use crate::error::Result;
use crate::value::Value;

/// Implemented once per user record type. The descriptor replaces the
/// runtime type introspection of reflective runtimes: a static, shared
/// description of the ordered, typed fields, typically memoized with
/// `std::sync::OnceLock`.
///
/// ```
/// use std::sync::{Arc, OnceLock};
/// use parquet_record::{EntityType, FieldDesc, PrimitiveKind, Record, RecordDesc, Value};
///
/// #[derive(Debug, PartialEq)]
/// struct Point { x: i64, y: i64 }
///
/// impl Record for Point {
/// 	fn descriptor() -> Arc<RecordDesc> {
/// 		static DESC: OnceLock<Arc<RecordDesc>> = OnceLock::new();
/// 		DESC.get_or_init(|| RecordDesc::new("Point", vec![
/// 			FieldDesc::new("x", EntityType::Primitive(PrimitiveKind::I64)),
/// 			FieldDesc::new("y", EntityType::Primitive(PrimitiveKind::I64)),
/// 		])).clone()
/// 	}
///
/// 	fn to_value(&self) -> Value {
/// 		Value::record(vec![
/// 			("x".into(), self.x.into()),
/// 			("y".into(), self.y.into()),
/// 		])
/// 	}
///
/// 	fn from_value(value: Value) -> parquet_record::Result<Point> {
/// 		let mut f = value.into_fields()?;
/// 		Ok(Point { x: f.next()?, y: f.next()? })
/// 	}
/// }
/// ```
pub trait Record: Sized {
	fn descriptor() -> Arc<RecordDesc>;

	fn to_value(&self) -> Value;

	/// Rebuilds an instance from a record value whose fields arrive in
	/// declaration order.
	fn from_value(value: Value) -> Result<Self>;
}
