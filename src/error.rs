use parquet::errors::ParquetError;

pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can go wrong while deriving schemas, writing records or
/// reading them back. Every variant is fatal to the operation that raised it;
/// nothing is retried internally.
#[derive(Debug, thiserror::Error)]
pub enum Error {
	/// The record description contains something with no Parquet mapping.
	#[error("unsupported type at `{path}`: {detail}")]
	UnsupportedKind { path: String, detail: String },

	#[error("duplicate field id {id} among the fields of `{path}`")]
	DuplicateFieldId { path: String, id: i32 },

	#[error("decimal field `{path}` has neither a precision/scale annotation nor a writer default")]
	DecimalConfigMissing { path: String },

	#[error("null value in required field `{path}`")]
	NullInRequired { path: String },

	#[error("null map key in `{path}`")]
	NullMapKey { path: String },

	#[error("requested field `{path}` has no matching column in the file")]
	MissingColumn { path: String },

	#[error("column `{path}`: {detail}")]
	TypeMismatch { path: String, detail: String },

	#[error("column `{path}`: narrowing conversion {from} -> {to} is disabled")]
	NarrowingNotAllowed { path: String, from: &'static str, to: &'static str },

	#[error("column `{path}`: null value for non-nullable primitive field")]
	NullForPrimitive { path: String },

	#[error("`{value}` is not a declared constant of enum field `{path}`")]
	UnknownEnumConstant { path: String, value: String },

	#[error("cannot rescale decimal from scale {from} to {to} without a rounding mode")]
	DecimalScaleMismatch { from: i64, to: i64 },

	#[error("arithmetic overflow while {context}")]
	ArithmeticOverflow { context: &'static str },

	#[error(transparent)]
	Io(#[from] std::io::Error),

	#[error(transparent)]
	Parquet(#[from] ParquetError),
}

impl Error {
	pub(crate) fn unsupported(path: impl Into<String>, detail: impl Into<String>) -> Error {
		Error::UnsupportedKind { path: path.into(), detail: detail.into() }
	}

	pub(crate) fn mismatch(path: impl Into<String>, detail: impl Into<String>) -> Error {
		Error::TypeMismatch { path: path.into(), detail: detail.into() }
	}
}
