/// Convenience result type used across the crate.
pub type BatResult<T> = Result<T, BatError>;

/// Top-level error taxonomy shared by the registry, encoder, dispatcher and server.
#[derive(thiserror::Error, Debug)]
pub enum BatError {
    /// Malformed or out-of-range field in a command, calibration or configuration payload.
    #[error("validation error: {field}: {message}")]
    Validation {
        /// `$`-rooted path of the offending field (for example `$.camera.fx`).
        field: String,
        /// Human-readable reason.
        message: String,
    },

    /// A referenced object, class or collection does not exist.
    #[error("not found: {kind} '{name}'")]
    NotFound {
        /// What kind of thing was looked up (`object`, `class`, `collection`).
        kind: &'static str,
        /// The name or id that failed to resolve.
        name: String,
    },

    /// A fixed-width ID space is exhausted.
    #[error("capacity exceeded: {what} (limit {limit})")]
    CapacityExceeded {
        /// The ID space that ran out.
        what: &'static str,
        /// Largest ID the space can hold.
        limit: u32,
    },

    /// A class name is already taken.
    #[error("duplicate name: {0}")]
    DuplicateName(String),

    /// Payload is not decodable at all (not JSON, or not a JSON object).
    #[error("schema error: {0}")]
    Schema(String),

    /// Errors when serializing or deserializing data structures.
    #[error("serialization error: {0}")]
    Serde(String),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl BatError {
    /// Build a [`BatError::Validation`] value.
    pub fn validation(field: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: msg.into(),
        }
    }

    /// Build a [`BatError::NotFound`] value.
    pub fn not_found(kind: &'static str, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            name: name.into(),
        }
    }

    /// Build a [`BatError::CapacityExceeded`] value.
    pub fn capacity(what: &'static str, limit: u32) -> Self {
        Self::CapacityExceeded { what, limit }
    }

    /// Build a [`BatError::DuplicateName`] value.
    pub fn duplicate_name(name: impl Into<String>) -> Self {
        Self::DuplicateName(name.into())
    }

    /// Build a [`BatError::Schema`] value.
    pub fn schema(msg: impl Into<String>) -> Self {
        Self::Schema(msg.into())
    }

    /// Build a [`BatError::Serde`] value.
    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }

    /// Stable taxonomy name reported over the wire.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "ValidationError",
            Self::NotFound { .. } => "NotFoundError",
            Self::CapacityExceeded { .. } => "CapacityExceededError",
            Self::DuplicateName(_) => "DuplicateNameError",
            Self::Schema(_) => "SchemaError",
            Self::Serde(_) => "SerializationError",
            Self::Other(_) => "InternalError",
        }
    }

    /// Whether the error was caused by the caller's input rather than the host.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Validation { .. } | Self::Schema(_) | Self::DuplicateName(_)
        )
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
