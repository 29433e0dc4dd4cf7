//! Turning parsed lines into typed events.
//!
//! A [`BuilderRegistry`] maps uppercased command tokens to
//! [`EventBuilder`] strategies. The registry starts out with the default
//! builders for every command Twitch sends; any entry can be replaced before
//! the client is built.
//!
//! ```
//! use twirc::builder::{BuildContext, BuilderRegistry};
//! use twirc::event::{ModeEvent, TypedEvent};
//! use twirc::message::ParsedLine;
//!
//! let registry = BuilderRegistry::new(BuildContext::new("gikkbot", "gikkman"));
//! let line = ParsedLine::parse(":jtv MODE #gikkman +o gikkbot").unwrap();
//!
//! match registry.build(&line) {
//!     TypedEvent::ModeChange(mode) => assert_eq!(mode.event, ModeEvent::GainedMod),
//!     other => panic!("unexpected {other:?}"),
//! }
//! ```

mod messaging;
mod moderation;
mod state;
mod users;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::error::BuildError;
use crate::event::TypedEvent;
use crate::message::ParsedLine;

pub use self::messaging::{join, notice, part, privmsg, whisper};
pub use self::moderation::{clearchat, hosttarget, mode, usernotice};
pub use self::state::{roomstate, userstate};
pub use self::users::sender;

/// Identity information builders need beyond the line itself.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BuildContext {
    /// The bot's own login; `PRIVMSG` addressed to it is a whisper.
    pub nick: String,
    /// Login of the bot owner, classified as [`UserType::Owner`](crate::event::UserType::Owner).
    pub owner: String,
}

impl BuildContext {
    pub fn new(nick: impl Into<String>, owner: impl Into<String>) -> Self {
        Self {
            nick: nick.into(),
            owner: owner.into(),
        }
    }
}

/// Strategy that turns one parsed line into one typed event.
///
/// Returning an error means "not applicable"; the registry then emits
/// [`TypedEvent::Unknown`]. Plain functions and closures with the matching
/// signature are builders too.
pub trait EventBuilder: Send + Sync {
    fn build(&self, line: &ParsedLine, ctx: &BuildContext) -> Result<TypedEvent, BuildError>;
}

impl<F> EventBuilder for F
where
    F: Fn(&ParsedLine, &BuildContext) -> Result<TypedEvent, BuildError> + Send + Sync,
{
    fn build(&self, line: &ParsedLine, ctx: &BuildContext) -> Result<TypedEvent, BuildError> {
        self(line, ctx)
    }
}

/// Builder for `RECONNECT`, which carries no payload.
pub fn reconnect(_line: &ParsedLine, _ctx: &BuildContext) -> Result<TypedEvent, BuildError> {
    Ok(TypedEvent::ReconnectRequest)
}

/// Command token to builder mapping.
#[derive(Clone)]
pub struct BuilderRegistry {
    ctx: BuildContext,
    builders: HashMap<String, Arc<dyn EventBuilder>>,
}

impl BuilderRegistry {
    /// A registry holding the default builder for every known command.
    pub fn new(ctx: BuildContext) -> Self {
        let mut registry = Self::empty(ctx);
        registry.register("PRIVMSG", privmsg);
        registry.register("WHISPER", whisper);
        registry.register("JOIN", join);
        registry.register("PART", part);
        registry.register("NOTICE", notice);
        registry.register("HOSTTARGET", hosttarget);
        registry.register("MODE", mode);
        registry.register("USERSTATE", userstate);
        registry.register("GLOBALUSERSTATE", userstate);
        registry.register("ROOMSTATE", roomstate);
        registry.register("CLEARCHAT", clearchat);
        registry.register("USERNOTICE", usernotice);
        registry.register("RECONNECT", reconnect);
        registry
    }

    /// A registry without any builders; every line becomes `Unknown`.
    pub fn empty(ctx: BuildContext) -> Self {
        Self {
            ctx,
            builders: HashMap::new(),
        }
    }

    /// Register a builder for `command`, replacing and returning the
    /// previous one.
    pub fn register<B>(&mut self, command: &str, builder: B) -> Option<Arc<dyn EventBuilder>>
    where
        B: EventBuilder + 'static,
    {
        self.register_shared(command, Arc::new(builder))
    }

    /// Like [`register`](Self::register) for an already shared builder.
    pub fn register_shared(
        &mut self,
        command: &str,
        builder: Arc<dyn EventBuilder>,
    ) -> Option<Arc<dyn EventBuilder>> {
        self.builders.insert(command.to_ascii_uppercase(), builder)
    }

    /// Remove the builder for `command`; its lines become `Unknown`.
    pub fn remove(&mut self, command: &str) -> Option<Arc<dyn EventBuilder>> {
        self.builders.remove(&command.to_ascii_uppercase())
    }

    pub fn contains(&self, command: &str) -> bool {
        self.builders.contains_key(&command.to_ascii_uppercase())
    }

    pub fn context(&self) -> &BuildContext {
        &self.ctx
    }

    /// Build the event for `line`.
    ///
    /// Never fails: a missing builder or a builder error yields
    /// [`TypedEvent::Unknown`] with the raw line.
    pub fn build(&self, line: &ParsedLine) -> TypedEvent {
        let Some(builder) = self.builders.get(&line.command.to_ascii_uppercase()) else {
            return TypedEvent::Unknown(line.raw.clone());
        };
        match builder.build(line, &self.ctx) {
            Ok(event) => event,
            Err(e) => {
                debug!(error = %e, line = %line.raw, "builder declined line");
                TypedEvent::Unknown(line.raw.clone())
            }
        }
    }
}

impl fmt::Debug for BuilderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut commands: Vec<&String> = self.builders.keys().collect();
        commands.sort();
        f.debug_struct("BuilderRegistry")
            .field("ctx", &self.ctx)
            .field("commands", &commands)
            .finish()
    }
}

/// Channel parameter without its leading `#`.
pub(crate) fn channel_name(param: &str) -> String {
    param.strip_prefix('#').unwrap_or(param).to_string()
}

/// Parameter `index`, or a [`BuildError::MissingField`] naming `field`.
pub(crate) fn required<'a>(
    line: &'a ParsedLine,
    index: usize,
    field: &'static str,
) -> Result<&'a str, BuildError> {
    line.param(index)
        .ok_or_else(|| BuildError::missing(&line.command, field))
}
