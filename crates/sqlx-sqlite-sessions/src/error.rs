use std::fmt;

use serde::Serialize;

/// Result type alias for session operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Boxed cause carried by wrapping error variants.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Which half of a session's lifecycle a bootstrap hook was running in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HookPhase {
   Init,
   Destroy,
}

impl fmt::Display for HookPhase {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      match self {
         HookPhase::Init => f.write_str("init"),
         HookPhase::Destroy => f.write_str("destroy"),
      }
   }
}

/// Error types for session registry operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
   /// Datasource names must not be blank.
   #[error("datasource name must not be blank")]
   InvalidName,

   /// A configuration value could not be resolved (e.g. an unknown quirks selector).
   #[error("invalid configuration for datasource '{name}': {message}")]
   Configuration { name: String, message: String },

   /// The pooled datasource or the session built on it could not be created.
   #[error("failed to create session for datasource '{name}'")]
   ResourceCreation {
      name: String,
      #[source]
      source: BoxError,
   },

   /// The pooled datasource behind a session could not be closed.
   #[error("failed to destroy session for datasource '{name}'")]
   ResourceDestruction {
      name: String,
      #[source]
      source: BoxError,
   },

   /// Any failure inside `with_session`, including the callback's own.
   #[error("an error occurred when executing a statement on datasource '{name}'")]
   Operation {
      name: String,
      #[source]
      source: BoxError,
   },

   /// A bootstrap hook failed while a session was being created or destroyed.
   #[error("bootstrap hook failed during {phase} of datasource '{name}'")]
   Hook {
      name: String,
      phase: HookPhase,
      #[source]
      source: BoxError,
   },
}

impl Error {
   /// Datasource the error refers to, if any
   pub fn datasource(&self) -> Option<&str> {
      match self {
         Error::InvalidName => None,
         Error::Configuration { name, .. }
         | Error::ResourceCreation { name, .. }
         | Error::ResourceDestruction { name, .. }
         | Error::Operation { name, .. }
         | Error::Hook { name, .. } => Some(name),
      }
   }

   /// Extract a structured error code from the error type.
   ///
   /// This provides machine-readable error codes for error handling.
   pub fn error_code(&self) -> String {
      match self {
         Error::InvalidName => "INVALID_NAME".to_string(),
         Error::Configuration { .. } => "CONFIGURATION_ERROR".to_string(),
         Error::ResourceCreation { .. } => "RESOURCE_CREATION_ERROR".to_string(),
         Error::ResourceDestruction { .. } => "RESOURCE_DESTRUCTION_ERROR".to_string(),
         Error::Operation { .. } => "OPERATION_ERROR".to_string(),
         Error::Hook { .. } => "HOOK_ERROR".to_string(),
      }
   }

   pub(crate) fn creation(name: &str, source: impl Into<BoxError>) -> Self {
      Error::ResourceCreation {
         name: name.to_string(),
         source: source.into(),
      }
   }

   pub(crate) fn operation(name: &str, source: impl Into<BoxError>) -> Self {
      Error::Operation {
         name: name.to_string(),
         source: source.into(),
      }
   }
}

#[cfg(test)]
mod tests {
   use super::*;
   use std::error::Error as _;

   #[test]
   fn test_error_code_configuration() {
      let err = Error::Configuration {
         name: "main".into(),
         message: "unknown quirks 'x'".into(),
      };
      assert_eq!(err.error_code(), "CONFIGURATION_ERROR");
      assert!(err.to_string().contains("main"));
      assert!(err.to_string().contains("unknown quirks 'x'"));
   }

   #[test]
   fn test_operation_keeps_cause() {
      let cause = std::io::Error::new(std::io::ErrorKind::Other, "disk on fire");
      let err = Error::operation("reporting", cause);

      assert_eq!(err.error_code(), "OPERATION_ERROR");
      assert_eq!(err.datasource(), Some("reporting"));

      let source = err.source().unwrap();
      assert_eq!(source.to_string(), "disk on fire");
      assert!(source.downcast_ref::<std::io::Error>().is_some());
   }

   #[test]
   fn test_hook_phase_display() {
      let err = Error::Hook {
         name: "default".into(),
         phase: HookPhase::Destroy,
         source: "boom".into(),
      };
      assert_eq!(
         err.to_string(),
         "bootstrap hook failed during destroy of datasource 'default'"
      );
      assert_eq!(err.error_code(), "HOOK_ERROR");
   }

   #[test]
   fn test_invalid_name_has_no_datasource() {
      assert_eq!(Error::InvalidName.datasource(), None);
      assert_eq!(Error::InvalidName.error_code(), "INVALID_NAME");
   }
}
