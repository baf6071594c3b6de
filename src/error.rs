use serde::{Serialize, Serializer};

/// Result type alias for plugin operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Structured error response for frontend.
#[derive(Serialize)]
struct ErrorResponse {
   code: String,
   message: String,
}

/// Error types for the sessions plugin.
#[derive(Debug, thiserror::Error)]
pub enum Error {
   /// Error from the session registry.
   #[error(transparent)]
   Session(#[from] sqlx_sqlite_sessions::Error),

   /// The app config directory could not be determined.
   #[error("invalid database path: {0}")]
   InvalidPath(String),

   /// I/O error when preparing database directories.
   #[error("io error: {0}")]
   Io(#[from] std::io::Error),
}

impl Error {
   /// Extract a structured error code from the error type.
   ///
   /// This provides machine-readable error codes for frontend error handling.
   fn error_code(&self) -> String {
      match self {
         Error::Session(e) => e.error_code(),
         Error::InvalidPath(_) => "INVALID_PATH".to_string(),
         Error::Io(_) => "IO_ERROR".to_string(),
      }
   }
}

impl Serialize for Error {
   fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
   where
      S: Serializer,
   {
      let response = ErrorResponse {
         code: self.error_code(),
         message: self.to_string(),
      };
      response.serialize(serializer)
   }
}

#[cfg(test)]
mod tests {
   use super::*;
   use serde_json::json;

   #[test]
   fn test_session_errors_keep_their_code() {
      let err = Error::from(sqlx_sqlite_sessions::Error::Configuration {
         name: "reporting".into(),
         message: "invalid quirks 'x'".into(),
      });

      assert_eq!(
         serde_json::to_value(&err).unwrap(),
         json!({
            "code": "CONFIGURATION_ERROR",
            "message": "invalid configuration for datasource 'reporting': invalid quirks 'x'"
         })
      );
   }

   #[test]
   fn test_invalid_path_code() {
      let err = Error::InvalidPath("No app config path found".into());
      assert_eq!(serde_json::to_value(&err).unwrap()["code"], "INVALID_PATH");
   }

   #[test]
   fn test_io_error_code() {
      let err = Error::from(std::io::Error::other("read-only file system"));
      assert_eq!(
         serde_json::to_value(&err).unwrap(),
         json!({ "code": "IO_ERROR", "message": "io error: read-only file system" })
      );
   }
}
