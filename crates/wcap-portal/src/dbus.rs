//! ScreenCast portal over the D-Bus session bus.

use std::collections::HashMap;
use std::time::Duration;

use futures_util::StreamExt;
use tokio::runtime::{Builder, Runtime};
use tracing::{debug, instrument, warn};
use zbus::message::Type as MessageType;
use zbus::zvariant::{ObjectPath, OwnedObjectPath, OwnedValue, Value};
use zbus::{Connection, MatchRule, Message, MessageStream, Proxy};

use crate::error::PortalError;
use crate::request::{OptionValue, PortalCall, PortalOptions, ResponseResults, ResponseSignal, StreamEntry};
use crate::{
    PortalBus, PortalResult, PORTAL_BUS_NAME, PORTAL_OBJECT_PATH, REQUEST_INTERFACE,
    RESPONSE_SIGNAL, SCREENCAST_INTERFACE,
};

/// Response signals buffered between waits.
const RESPONSE_QUEUE_CAPACITY: usize = 16;

/// Portal transport backed by zbus.
///
/// Owns a current-thread tokio runtime; every call and every wait is a
/// `block_on` on the caller's thread. The `Response` subscription is made
/// before any call so no reply can be missed.
///
/// The proxy and the subscription are only `None` while dropping; both
/// must be released inside `runtime`.
pub struct DbusPortal {
    proxy: Option<Proxy<'static>>,
    responses: Option<MessageStream>,
    runtime: Runtime,
}

impl DbusPortal {
    /// Connect to the session bus and subscribe to portal responses.
    #[instrument(name = "portal_connect")]
    pub fn connect() -> PortalResult<Self> {
        let runtime = Builder::new_current_thread().enable_all().build()?;

        let (proxy, responses) = runtime.block_on(async {
            let connection = Connection::session().await?;

            let rule = MatchRule::builder()
                .msg_type(MessageType::Signal)
                .interface(REQUEST_INTERFACE)?
                .member(RESPONSE_SIGNAL)?
                .build();
            let responses =
                MessageStream::for_match_rule(rule, &connection, Some(RESPONSE_QUEUE_CAPACITY))
                    .await?;

            let proxy = Proxy::new(
                &connection,
                PORTAL_BUS_NAME,
                PORTAL_OBJECT_PATH,
                SCREENCAST_INTERFACE,
            )
            .await?;

            Ok::<_, zbus::Error>((proxy, responses))
        })?;

        debug!("Connected to desktop portal");
        Ok(Self {
            proxy: Some(proxy),
            responses: Some(responses),
            runtime,
        })
    }
}

fn closed() -> PortalError {
    PortalError::Transport("portal connection closed".to_string())
}

impl Drop for DbusPortal {
    fn drop(&mut self) {
        let responses = self.responses.take();
        let proxy = self.proxy.take();
        // Removing the match rule is spawned onto the current runtime.
        self.runtime.block_on(async move {
            drop(responses);
            drop(proxy);
            tokio::task::yield_now().await;
        });
        debug!("Disconnected from desktop portal");
    }
}

impl PortalBus for DbusPortal {
    fn call(&mut self, call: &PortalCall) -> PortalResult<String> {
        let Self { runtime, proxy, .. } = self;
        let proxy = proxy.as_ref().ok_or_else(closed)?;
        let method = call.step().method_name();
        let options = to_vardict(call.options());

        let reply = match call {
            PortalCall::CreateSession { .. } => {
                runtime.block_on(proxy.call::<_, _, OwnedObjectPath>(method, &(options,)))
            }
            PortalCall::SelectSources { session_handle, .. } => {
                let session = ObjectPath::try_from(session_handle.as_str())
                    .map_err(zbus::Error::from)?;
                runtime.block_on(proxy.call::<_, _, OwnedObjectPath>(method, &(session, options)))
            }
            PortalCall::Start {
                session_handle,
                parent_window,
                ..
            } => {
                let session = ObjectPath::try_from(session_handle.as_str())
                    .map_err(zbus::Error::from)?;
                runtime.block_on(proxy.call::<_, _, OwnedObjectPath>(
                    method,
                    &(session, parent_window.as_str(), options),
                ))
            }
        };

        Ok(reply?.as_str().to_string())
    }

    fn next_response(
        &mut self,
        timeout: Option<Duration>,
    ) -> PortalResult<Option<ResponseSignal>> {
        let Self {
            runtime, responses, ..
        } = self;
        let responses = responses.as_mut().ok_or_else(closed)?;

        let next = runtime.block_on(async {
            match timeout {
                Some(limit) => tokio::time::timeout(limit, responses.next()).await.ok(),
                None => Some(responses.next().await),
            }
        });

        match next {
            None => Ok(None),
            Some(None) => Err(PortalError::Transport(
                "response subscription closed".to_string(),
            )),
            Some(Some(message)) => parse_response(&message?).map(Some),
        }
    }
}

fn to_vardict(options: &PortalOptions) -> HashMap<&str, Value<'_>> {
    options
        .iter()
        .map(|(key, value)| {
            let value = match value {
                OptionValue::Str(s) => Value::from(s.as_str()),
                OptionValue::Bool(b) => Value::from(*b),
                OptionValue::U32(n) => Value::from(*n),
            };
            (*key, value)
        })
        .collect()
}

fn parse_response(message: &Message) -> PortalResult<ResponseSignal> {
    let path = message
        .header()
        .path()
        .map(|path| path.as_str().to_string())
        .ok_or_else(|| PortalError::Transport("response signal without path".to_string()))?;

    let (code, results): (u32, HashMap<String, OwnedValue>) = message.body().deserialize()?;

    Ok(ResponseSignal {
        path,
        code,
        results: parse_results(&results),
    })
}

fn parse_results(results: &HashMap<String, OwnedValue>) -> ResponseResults {
    // Older portals send the handle as a string, newer ones as a path.
    let session_handle = results
        .get("session_handle")
        .and_then(|value| match &**value {
            Value::Str(s) => Some(s.as_str().to_string()),
            Value::ObjectPath(p) => Some(p.as_str().to_string()),
            _ => None,
        });

    let streams = results
        .get("streams")
        .map(|value| parse_streams(value))
        .unwrap_or_default();

    ResponseResults {
        session_handle,
        streams,
    }
}

/// Parse `a(ua{sv})`, skipping malformed entries.
fn parse_streams(value: &Value<'_>) -> Vec<StreamEntry> {
    let Value::Array(entries) = value else {
        warn!("Unexpected `streams` type: {}", value.value_signature());
        return Vec::new();
    };

    entries
        .iter()
        .filter_map(|entry| match entry {
            Value::Structure(fields) => match fields.fields().first() {
                Some(Value::U32(node_id)) => Some(StreamEntry { node_id: *node_id }),
                _ => None,
            },
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use zbus::zvariant::{Array, StructureBuilder};

    fn owned(value: Value<'_>) -> OwnedValue {
        value.try_to_owned().unwrap()
    }

    #[test]
    fn test_vardict_conversion() {
        let mut options = PortalOptions::new();
        options.insert("multiple", OptionValue::Bool(false));
        options.insert("types", OptionValue::U32(3));
        options.insert("handle_token", OptionValue::Str("wcap_1_0_2".to_string()));

        let dict = to_vardict(&options);
        assert_eq!(dict.get("multiple"), Some(&Value::from(false)));
        assert_eq!(dict.get("types"), Some(&Value::from(3u32)));
        assert_eq!(dict.get("handle_token"), Some(&Value::from("wcap_1_0_2")));
    }

    #[test]
    fn test_session_handle_string_or_path() {
        let mut results = HashMap::new();
        results.insert(
            "session_handle".to_string(),
            owned(Value::from("/org/freedesktop/portal/desktop/session/1_1/t")),
        );
        assert_eq!(
            parse_results(&results).session_handle.as_deref(),
            Some("/org/freedesktop/portal/desktop/session/1_1/t")
        );

        let path = ObjectPath::try_from("/org/freedesktop/portal/desktop/session/1_1/u").unwrap();
        results.insert("session_handle".to_string(), owned(Value::from(path)));
        assert_eq!(
            parse_results(&results).session_handle.as_deref(),
            Some("/org/freedesktop/portal/desktop/session/1_1/u")
        );
    }

    #[test]
    fn test_streams_keep_portal_order() {
        let mut array = Array::new(<(u32, HashMap<String, OwnedValue>) as zbus::zvariant::Type>::signature());
        for node_id in [44u32, 45] {
            let entry = StructureBuilder::new()
                .add_field(node_id)
                .add_field(HashMap::<String, OwnedValue>::new())
                .build();
            array.append(Value::from(entry)).unwrap();
        }

        let streams = parse_streams(&Value::from(array));
        assert_eq!(
            streams,
            vec![StreamEntry { node_id: 44 }, StreamEntry { node_id: 45 }]
        );
    }

    #[test]
    fn test_missing_keys_yield_empty_results() {
        let results = parse_results(&HashMap::new());
        assert_eq!(results, ResponseResults::default());
    }

    /// Connects to the session bus when one is reachable.
    fn session_portal() -> Option<DbusPortal> {
        std::env::var_os("DBUS_SESSION_BUS_ADDRESS")?;
        DbusPortal::connect().ok()
    }

    #[test]
    fn test_connected_portal_drops_cleanly() {
        let Some(portal) = session_portal() else {
            return;
        };
        drop(portal);
    }

    #[test]
    fn test_drop_after_waiting_for_responses() {
        let Some(mut portal) = session_portal() else {
            return;
        };
        let response = portal
            .next_response(Some(Duration::from_millis(10)))
            .unwrap();
        assert!(response.is_none());
        drop(portal);
    }
}
