use std::sync::Arc;

/// Payload of `Observer::on_error`.
#[derive(Clone, Debug, thiserror::Error)]
pub enum Fault {
	#[error("{0}")]
	Message(Arc<str>),
	#[error(transparent)]
	Source(Arc<dyn std::error::Error + Send + Sync>),
}

impl Fault {
	pub fn msg(message: impl Into<Arc<str>>) -> Self {
		Fault::Message(message.into())
	}

	pub fn new<E>(error: E) -> Self
	where
		E: std::error::Error + Send + Sync + 'static,
	{
		Fault::Source(Arc::new(error))
	}
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Error {
	#[error("{0} already has a controller")]
	AlreadyControlled(&'static str),
	#[error("value pushed into a completed subject")]
	Completed,
	#[error("{0} was mutated from inside one of its own listeners")]
	ReentrantWrite(&'static str),
	#[error("{0} was mutated by a thread that is reading it")]
	UpgradeWhileReading(&'static str),
	#[error("sorted member {member} yielded an item out of order")]
	Unsorted { member: usize },
}
