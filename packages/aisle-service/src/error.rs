use std::fmt::Display;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Failures of the opaque services behind each pipeline stage.
///
/// Everything except [`Error::InvalidRequest`] is recovered inside the pipeline.
#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("{collaborator} is unavailable: {message}")]
	CollaboratorUnavailable { collaborator: &'static str, message: String },
	#[error("{collaborator} timed out after {timeout_ms} ms.")]
	Timeout { collaborator: &'static str, timeout_ms: u64 },
	#[error("{collaborator} returned a malformed payload: {message}")]
	MalformedPayload { collaborator: &'static str, message: String },
	#[error("Invalid request: {message}")]
	InvalidRequest { message: String },
}
impl Error {
	pub fn unavailable(collaborator: &'static str, err: impl Display) -> Self {
		Self::CollaboratorUnavailable { collaborator, message: err.to_string() }
	}

	pub fn malformed(collaborator: &'static str, message: impl Into<String>) -> Self {
		Self::MalformedPayload { collaborator, message: message.into() }
	}

	pub fn from_provider(collaborator: &'static str, err: aisle_providers::Error) -> Self {
		if err.is_malformed_payload() {
			Self::malformed(collaborator, err.to_string())
		} else {
			Self::unavailable(collaborator, err)
		}
	}

	pub fn from_catalog(collaborator: &'static str, err: aisle_catalog::Error) -> Self {
		Self::unavailable(collaborator, err)
	}

	pub fn is_collaborator_failure(&self) -> bool {
		!matches!(self, Self::InvalidRequest { .. })
	}
}
