//! Error type shared across the workspace.
//!
//! Shaped after the call sites of `garage_util::error::Error` in
//! `garage_rpc::system` (`Error::Message(..)`, `.err_context(..)`,
//! `.ok_or_message(..)`): a small set of causes plus a catch-all `Message`
//! variant, with an extension trait that lets call sites attach context
//! without matching on the error kind.

use std::fmt;

#[derive(Debug, thiserror::Error)]
pub enum HbError {
	#[error("{0}")]
	Message(String),

	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),

	#[error("RPC error: {0}")]
	Rpc(String),

	#[error("timed out: {0}")]
	Timeout(String),

	#[error("invalid configuration: {0}")]
	Config(String),

	#[error("cancelled")]
	Cancelled,
}

impl HbError {
	pub fn message(msg: impl Into<String>) -> Self {
		HbError::Message(msg.into())
	}

	pub fn rpc(msg: impl fmt::Display) -> Self {
		HbError::Rpc(msg.to_string())
	}
}

/// Extension trait mirroring garage_util's `.err_context(..)` / `.ok_or_message(..)`
/// call-site idiom so error plumbing reads the same way throughout the workspace.
pub trait ErrorContext<T> {
	fn err_context(self, ctx: impl fmt::Display) -> Result<T, HbError>;
}

impl<T, E> ErrorContext<T> for Result<T, E>
where
	E: fmt::Display,
{
	fn err_context(self, ctx: impl fmt::Display) -> Result<T, HbError> {
		self.map_err(|e| HbError::Message(format!("{}: {}", ctx, e)))
	}
}

pub trait OkOrMessage<T> {
	fn ok_or_message(self, msg: impl Into<String>) -> Result<T, HbError>;
}

impl<T> OkOrMessage<T> for Option<T> {
	fn ok_or_message(self, msg: impl Into<String>) -> Result<T, HbError> {
		self.ok_or_else(|| HbError::Message(msg.into()))
	}
}

pub type Result<T> = std::result::Result<T, HbError>;
