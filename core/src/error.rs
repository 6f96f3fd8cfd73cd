use std::sync::Arc;

/// The shared cause of a failed populate or persist.
/// Shared so that every waiter coalesced on the same chunk receives the same failure.
pub type Cause = Arc<dyn std::error::Error + Send + Sync + 'static>;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(thiserror::Error, Debug, Clone)]
pub enum Error {
	#[error("invalid argument: {0}")]
	InvalidArgument(String),
	#[error("invalid operation: {0}")]
	InvalidOperation(String),

	#[error("failed to populate chunk {key}")]
	Population {
		key: String,
		#[source]
		cause: Cause,
	},
	#[error("failed to persist chunk {key}")]
	Persistence {
		key: String,
		#[source]
		cause: Cause,
	},

	#[error("operation was canceled")]
	Canceled,
}

impl Error {
	pub(crate) fn population(key: impl std::fmt::Display, cause: anyhow::Error) -> Self {
		Self::Population {
			key: key.to_string(),
			cause: into_cause(cause),
		}
	}

	pub(crate) fn persistence(key: impl std::fmt::Display, cause: anyhow::Error) -> Self {
		Self::Persistence {
			key: key.to_string(),
			cause: into_cause(cause),
		}
	}

	pub fn is_canceled(&self) -> bool {
		matches!(self, Self::Canceled)
	}
}

fn into_cause(error: anyhow::Error) -> Cause {
	let boxed: Box<dyn std::error::Error + Send + Sync + 'static> = error.into();
	Arc::from(boxed)
}
