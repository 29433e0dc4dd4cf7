//! Fan-out of typed events to application listeners.
//!
//! Listeners implement [`EventListener`] and override only the callbacks
//! they care about. For every inbound line the [`Dispatcher`] calls, in
//! registration order, each listener's [`on_raw_line`](EventListener::on_raw_line)
//! and then the callback matching the event variant.

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use crate::event::{
    ChatMessage, ClearChat, HostNotice, Membership, ModeChange, Notice, Roomstate, TypedEvent,
    Usernotice, Userstate, Whisper,
};

/// Why a session ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DisconnectReason {
    /// The socket failed or the server closed it; a reconnect follows.
    ConnectionLost(String),
    /// The server or the application asked for a reconnect.
    ReconnectRequested,
    /// The reconnect policy gave up. Reported once; the client is closed.
    Exhausted(String),
    /// The application closed the client.
    Closed,
}

impl DisconnectReason {
    /// Whether no further sessions will follow.
    pub fn is_final(&self) -> bool {
        matches!(self, Self::Exhausted(_) | Self::Closed)
    }

    /// Whether the client gave up on its own.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Exhausted(_))
    }
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConnectionLost(cause) => write!(f, "connection lost: {cause}"),
            Self::ReconnectRequested => f.write_str("reconnect requested"),
            Self::Exhausted(cause) => write!(f, "reconnect attempts exhausted: {cause}"),
            Self::Closed => f.write_str("closed"),
        }
    }
}

/// Application callbacks. Every method defaults to doing nothing.
///
/// Callbacks run on the client's read task: a slow callback delays the
/// processing of every following line.
#[allow(unused_variables)]
pub trait EventListener: Send + Sync {
    /// Every dispatched line, before the typed callback.
    fn on_raw_line(&self, raw: &str) {}

    fn on_private_message(&self, message: &ChatMessage) {}

    fn on_whisper(&self, whisper: &Whisper) {}

    fn on_join(&self, join: &Membership) {}

    fn on_part(&self, part: &Membership) {}

    fn on_notice(&self, notice: &Notice) {}

    fn on_host(&self, host: &HostNotice) {}

    fn on_mode(&self, mode: &ModeChange) {}

    fn on_userstate(&self, state: &Userstate) {}

    fn on_roomstate(&self, state: &Roomstate) {}

    fn on_clear_chat(&self, clear: &ClearChat) {}

    fn on_usernotice(&self, notice: &Usernotice) {}

    /// The server asked for a reconnect. The client handles it; this is
    /// informational.
    fn on_reconnect(&self) {}

    /// A line no builder turned into an event.
    fn on_unknown(&self, raw: &str) {}

    /// A session logged in successfully.
    fn on_connect(&self) {}

    /// A session ended. `reason.is_final()` tells whether it was the last.
    fn on_disconnect(&self, reason: &DisconnectReason) {}
}

/// Ordered set of listeners.
#[derive(Default)]
pub struct Dispatcher {
    listeners: RwLock<Vec<Arc<dyn EventListener>>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_listener(&self, listener: Arc<dyn EventListener>) {
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(listener);
    }

    /// Remove a previously added listener. Returns whether it was found.
    pub fn remove_listener(&self, listener: &Arc<dyn EventListener>) -> bool {
        let target = Arc::as_ptr(listener) as *const ();
        let mut listeners = self.listeners.write().unwrap_or_else(PoisonError::into_inner);
        let before = listeners.len();
        listeners.retain(|l| Arc::as_ptr(l) as *const () != target);
        listeners.len() != before
    }

    pub fn len(&self) -> usize {
        self.listeners.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // Callbacks run on a snapshot so they may add or remove listeners.
    fn snapshot(&self) -> Vec<Arc<dyn EventListener>> {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Deliver one event built from `raw`.
    pub fn dispatch(&self, event: &TypedEvent, raw: &str) {
        let listeners = self.snapshot();
        for listener in &listeners {
            listener.on_raw_line(raw);
        }
        for listener in &listeners {
            match event {
                TypedEvent::PrivateMessage(e) => listener.on_private_message(e),
                TypedEvent::Whisper(e) => listener.on_whisper(e),
                TypedEvent::Join(e) => listener.on_join(e),
                TypedEvent::Part(e) => listener.on_part(e),
                TypedEvent::Notice(e) => listener.on_notice(e),
                TypedEvent::HostNotice(e) => listener.on_host(e),
                TypedEvent::ModeChange(e) => listener.on_mode(e),
                TypedEvent::Userstate(e) => listener.on_userstate(e),
                TypedEvent::Roomstate(e) => listener.on_roomstate(e),
                TypedEvent::ClearChat(e) => listener.on_clear_chat(e),
                TypedEvent::Usernotice(e) => listener.on_usernotice(e),
                TypedEvent::ReconnectRequest => listener.on_reconnect(),
                TypedEvent::Unknown(raw) => listener.on_unknown(raw),
            }
        }
    }

    pub fn connected(&self) {
        for listener in self.snapshot() {
            listener.on_connect();
        }
    }

    pub fn disconnected(&self, reason: &DisconnectReason) {
        for listener in self.snapshot() {
            listener.on_disconnect(reason);
        }
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("listeners", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use crate::event::{ModeEvent, TypedEvent};

    #[derive(Default)]
    struct Recorder {
        name: &'static str,
        calls: Arc<Mutex<Vec<String>>>,
    }

    impl Recorder {
        fn push(&self, what: &str) {
            self.calls.lock().unwrap().push(format!("{}:{}", self.name, what));
        }
    }

    impl EventListener for Recorder {
        fn on_raw_line(&self, _raw: &str) {
            self.push("raw");
        }

        fn on_mode(&self, mode: &ModeChange) {
            self.push(&format!("mode:{}", mode.user));
        }

        fn on_unknown(&self, _raw: &str) {
            self.push("unknown");
        }

        fn on_disconnect(&self, reason: &DisconnectReason) {
            self.push(&format!("disconnect:{}", reason.is_fatal()));
        }
    }

    fn mode_event() -> TypedEvent {
        TypedEvent::ModeChange(ModeChange {
            channel: "gikkman".into(),
            event: ModeEvent::GainedMod,
            user: "gikkbot".into(),
            raw: ":jtv MODE #gikkman +o gikkbot".into(),
        })
    }

    #[test]
    fn test_raw_callbacks_run_before_typed_callbacks() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let dispatcher = Dispatcher::new();
        dispatcher.add_listener(Arc::new(Recorder { name: "a", calls: calls.clone() }));
        dispatcher.add_listener(Arc::new(Recorder { name: "b", calls: calls.clone() }));

        dispatcher.dispatch(&mode_event(), ":jtv MODE #gikkman +o gikkbot");

        assert_eq!(
            *calls.lock().unwrap(),
            vec!["a:raw", "b:raw", "a:mode:gikkbot", "b:mode:gikkbot"]
        );
    }

    #[test]
    fn test_unknown_goes_to_fallback() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let dispatcher = Dispatcher::new();
        dispatcher.add_listener(Arc::new(Recorder { name: "a", calls: calls.clone() }));

        let raw = ":tmi.twitch.tv FOO bar";
        dispatcher.dispatch(&TypedEvent::Unknown(raw.into()), raw);

        assert_eq!(*calls.lock().unwrap(), vec!["a:raw", "a:unknown"]);
    }

    #[test]
    fn test_default_methods_are_noops() {
        struct Silent;
        impl EventListener for Silent {}

        let dispatcher = Dispatcher::new();
        dispatcher.add_listener(Arc::new(Silent));
        dispatcher.dispatch(&TypedEvent::ReconnectRequest, ":tmi.twitch.tv RECONNECT");
        dispatcher.connected();
        dispatcher.disconnected(&DisconnectReason::Closed);
        assert_eq!(dispatcher.len(), 1);
    }

    #[test]
    fn test_remove_listener() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let dispatcher = Dispatcher::new();
        let listener: Arc<dyn EventListener> =
            Arc::new(Recorder { name: "a", calls: calls.clone() });
        dispatcher.add_listener(listener.clone());
        assert!(dispatcher.remove_listener(&listener));
        assert!(!dispatcher.remove_listener(&listener));
        assert!(dispatcher.is_empty());

        dispatcher.disconnected(&DisconnectReason::Exhausted("gave up".into()));
        assert!(calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_disconnect_reason_flags() {
        assert!(DisconnectReason::Exhausted(String::new()).is_fatal());
        assert!(DisconnectReason::Closed.is_final());
        assert!(!DisconnectReason::Closed.is_fatal());
        assert!(!DisconnectReason::ReconnectRequested.is_final());
        assert_eq!(
            DisconnectReason::ConnectionLost("reset".into()).to_string(),
            "connection lost: reset"
        );
    }
}
