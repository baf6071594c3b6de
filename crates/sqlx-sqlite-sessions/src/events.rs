//! Lifecycle notifications emitted around session creation and destruction.
//!
//! Every successful creation emits `ConnectStart` then `ConnectEnd`; every
//! destruction emits `DisconnectStart` then `DisconnectEnd`. Events are
//! immutable and sinks cannot influence the registry.

use std::sync::Arc;

use serde::{Serialize, Serializer};
use sqlx_sqlite_datasource::ConfigSnapshot;
use tokio::sync::broadcast;
use tracing::trace;

use crate::session::Session;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionEventKind {
   /// Before a session is created
   ConnectStart,
   /// After a session was created and its bootstrap hooks ran
   ConnectEnd,
   /// Before a session is destroyed
   DisconnectStart,
   /// After a session and its datasource were torn down
   DisconnectEnd,
}

impl SessionEventKind {
   pub fn as_str(&self) -> &'static str {
      match self {
         SessionEventKind::ConnectStart => "connect-start",
         SessionEventKind::ConnectEnd => "connect-end",
         SessionEventKind::DisconnectStart => "disconnect-start",
         SessionEventKind::DisconnectEnd => "disconnect-end",
      }
   }
}

/// Event payload describing one lifecycle transition of a datasource session.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionEvent {
   kind: SessionEventKind,
   name: String,
   config: ConfigSnapshot,
   #[serde(
      rename = "sessionId",
      serialize_with = "serialize_session_id",
      skip_serializing_if = "Option::is_none"
   )]
   session: Option<Arc<Session>>,
}

fn serialize_session_id<S>(session: &Option<Arc<Session>>, serializer: S) -> Result<S::Ok, S::Error>
where
   S: Serializer,
{
   session.as_ref().map(|s| s.id()).serialize(serializer)
}

impl SessionEvent {
   fn new(
      kind: SessionEventKind,
      name: &str,
      config: ConfigSnapshot,
      session: Option<Arc<Session>>,
   ) -> Self {
      Self {
         kind,
         name: name.to_string(),
         config,
         session,
      }
   }

   pub fn connect_start(name: &str, config: ConfigSnapshot) -> Self {
      Self::new(SessionEventKind::ConnectStart, name, config, None)
   }

   pub fn connect_end(name: &str, config: ConfigSnapshot, session: Arc<Session>) -> Self {
      Self::new(SessionEventKind::ConnectEnd, name, config, Some(session))
   }

   pub fn disconnect_start(name: &str, config: ConfigSnapshot, session: Arc<Session>) -> Self {
      Self::new(SessionEventKind::DisconnectStart, name, config, Some(session))
   }

   pub fn disconnect_end(name: &str, config: ConfigSnapshot) -> Self {
      Self::new(SessionEventKind::DisconnectEnd, name, config, None)
   }

   pub fn kind(&self) -> SessionEventKind {
      self.kind
   }

   /// Datasource name
   pub fn name(&self) -> &str {
      &self.name
   }

   /// Configuration snapshot the transition used
   pub fn config(&self) -> &ConfigSnapshot {
      &self.config
   }

   /// Session involved, for `ConnectEnd` and `DisconnectStart`
   pub fn session(&self) -> Option<&Arc<Session>> {
      self.session.as_ref()
   }
}

/// Receives lifecycle events. Implementations must not block.
pub trait EventSink: Send + Sync {
   fn publish(&self, event: &SessionEvent);
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopEventSink;

impl EventSink for NoopEventSink {
   fn publish(&self, _event: &SessionEvent) {}
}

/// Fans events out to any number of subscribers over a tokio broadcast channel.
///
/// Publishing with no subscribers is not an error. Slow subscribers that fall
/// more than `capacity` events behind observe `RecvError::Lagged`.
#[derive(Debug, Clone)]
pub struct BroadcastEventSink {
   tx: broadcast::Sender<SessionEvent>,
}

impl BroadcastEventSink {
   pub fn new(capacity: usize) -> Self {
      let (tx, _) = broadcast::channel(capacity);
      Self { tx }
   }

   pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
      self.tx.subscribe()
   }

   pub fn subscriber_count(&self) -> usize {
      self.tx.receiver_count()
   }
}

impl Default for BroadcastEventSink {
   fn default() -> Self {
      Self::new(256)
   }
}

impl EventSink for BroadcastEventSink {
   fn publish(&self, event: &SessionEvent) {
      if self.tx.send(event.clone()).is_err() {
         trace!(kind = event.kind.as_str(), datasource = %event.name, "No event subscribers");
      }
   }
}

#[cfg(test)]
mod tests {
   use super::*;
   use serde_json::json;

   fn config() -> ConfigSnapshot {
      [("url".to_string(), json!("sqlite:app.db"))].into_iter().collect()
   }

   #[test]
   fn test_event_serializes_camel_case_without_session() {
      let event = SessionEvent::connect_start("default", config());
      let value = serde_json::to_value(&event).unwrap();

      assert_eq!(
         value,
         json!({
            "kind": "connect-start",
            "name": "default",
            "config": { "url": "sqlite:app.db" }
         })
      );
   }

   #[test]
   fn test_kind_names_match_serialized_form() {
      for kind in [
         SessionEventKind::ConnectStart,
         SessionEventKind::ConnectEnd,
         SessionEventKind::DisconnectStart,
         SessionEventKind::DisconnectEnd,
      ] {
         assert_eq!(serde_json::to_value(kind).unwrap(), json!(kind.as_str()));
      }
   }

   #[tokio::test]
   async fn test_broadcast_sink_delivers_to_all_subscribers() {
      let sink = BroadcastEventSink::new(8);

      // no subscribers yet: dropped silently
      sink.publish(&SessionEvent::disconnect_end("default", config()));

      let mut first = sink.subscribe();
      let mut second = sink.subscribe();
      assert_eq!(sink.subscriber_count(), 2);

      sink.publish(&SessionEvent::connect_start("reporting", config()));

      for rx in [&mut first, &mut second] {
         let event = rx.recv().await.unwrap();
         assert_eq!(event.kind(), SessionEventKind::ConnectStart);
         assert_eq!(event.name(), "reporting");
         assert_eq!(event.config(), &config());
         assert!(event.session().is_none());
      }
   }
}
