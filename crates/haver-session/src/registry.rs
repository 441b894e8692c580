//! The command table.
//!
//! Every command the server understands is one [`CommandSpec`]: the phase
//! it is accepted in, how many arguments it takes, which failures it can
//! raise, and what it replies with. The table is built once at startup
//! and shared read-only by every session.

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use crate::handlers;
use crate::phase::Phase;
use crate::session::{Context, Session};
use crate::SessionError;

/// A command handler. Returns the phase to move to, if any.
pub type Handler =
    fn(&mut Session, &mut Context<'_>, &[String]) -> Result<Option<Phase>, SessionError>;

/// Accepted argument counts, inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Arity {
    pub min: usize,
    /// `None` means unbounded.
    pub max: Option<usize>,
}

impl Arity {
    pub const fn exactly(n: usize) -> Self {
        Self { min: n, max: Some(n) }
    }

    pub const fn between(min: usize, max: usize) -> Self {
        Self { min, max: Some(max) }
    }

    pub const fn at_least(min: usize) -> Self {
        Self { min, max: None }
    }

    pub fn accepts(&self, count: usize) -> bool {
        count >= self.min && self.max.is_none_or(|max| count <= max)
    }
}

/// `"2"`, `"0-1"`, or `"3+"`.
impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.max {
            Some(max) if max == self.min => write!(f, "{max}"),
            Some(max) => write!(f, "{}-{max}", self.min),
            None => write!(f, "{}+", self.min),
        }
    }
}

/// One registered command.
#[derive(Clone)]
pub struct CommandSpec {
    pub name: &'static str,
    pub phase: Phase,
    pub arity: Arity,
    /// Protocol extension this command belongs to, advertised in `HAVER`.
    pub extension: Option<&'static str>,
    /// Failure kinds the handler may raise, on top of the generic ones.
    pub failures: &'static [&'static str],
    /// Shapes of the lines the command sends back to the caller.
    pub replies: &'static [&'static str],
    pub handler: Handler,
}

impl fmt::Debug for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandSpec")
            .field("name", &self.name)
            .field("phase", &self.phase)
            .field("arity", &self.arity)
            .field("extension", &self.extension)
            .field("failures", &self.failures)
            .field("replies", &self.replies)
            .finish_non_exhaustive()
    }
}

/// Lookup table from command name to [`CommandSpec`].
#[derive(Debug, Clone, Default)]
pub struct Registry {
    commands: HashMap<&'static str, CommandSpec>,
}

impl Registry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a command.
    pub fn register(&mut self, spec: CommandSpec) {
        self.commands.insert(spec.name, spec);
    }

    pub fn get(&self, name: &str) -> Option<&CommandSpec> {
        self.commands.get(name)
    }

    /// Every command, sorted by name.
    pub fn iter(&self) -> impl Iterator<Item = &CommandSpec> {
        let mut specs: Vec<&CommandSpec> = self.commands.values().collect();
        specs.sort_by_key(|s| s.name);
        specs.into_iter()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Extension tags of all registered commands, sorted and deduplicated.
    pub fn extensions(&self) -> Vec<&'static str> {
        self.commands
            .values()
            .filter_map(|s| s.extension)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// The full Haver command set.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        for spec in STANDARD {
            registry.register(spec.clone());
        }
        registry
    }
}

const STANDARD: &[CommandSpec] = &[
    // Connect
    CommandSpec {
        name: "HAVER",
        phase: Phase::Connect,
        arity: Arity::at_least(1),
        extension: None,
        failures: &[],
        replies: &["HAVER host version extensions"],
        handler: handlers::haver,
    },
    // Login
    CommandSpec {
        name: "IDENT",
        phase: Phase::Login,
        arity: Arity::exactly(1),
        extension: None,
        failures: &["invalid.name", "reserved.name", "existing.entity"],
        replies: &["HELLO name address"],
        handler: handlers::ident,
    },
    CommandSpec {
        name: "GHOST",
        phase: Phase::Login,
        arity: Arity::exactly(1),
        extension: Some("ghost"),
        failures: &["invalid.name", "reserved.name", "unknown.entity", "mismatch.ip"],
        replies: &["HELLO name address"],
        handler: handlers::ghost,
    },
    CommandSpec {
        name: "SPOON:ATTACH",
        phase: Phase::Login,
        arity: Arity::exactly(2),
        extension: Some("spoon"),
        failures: &["invalid.name", "unknown.entity", "already.attached", "mismatch.key"],
        replies: &["HELLO name address", "SPOON:LOG time cmd args...", "SPOON:END count"],
        handler: handlers::spoon_attach,
    },
    // Normal
    CommandSpec {
        name: "SPOON:DETACH",
        phase: Phase::Normal,
        arity: Arity::exactly(1),
        extension: Some("spoon"),
        failures: &[],
        replies: &["SPOON:DETACH name"],
        handler: handlers::spoon_detach,
    },
    CommandSpec {
        name: "TO",
        phase: Phase::Normal,
        arity: Arity::at_least(3),
        extension: None,
        failures: &["invalid.name", "unknown.entity"],
        replies: &[],
        handler: handlers::to,
    },
    CommandSpec {
        name: "IN",
        phase: Phase::Normal,
        arity: Arity::at_least(3),
        extension: None,
        failures: &["invalid.name", "unknown.entity"],
        replies: &["IN room sender kind msg extra..."],
        handler: handlers::in_room,
    },
    CommandSpec {
        name: "JOIN",
        phase: Phase::Normal,
        arity: Arity::exactly(1),
        extension: None,
        failures: &["invalid.name", "unknown.entity", "strange.join", "insecure"],
        replies: &["JOIN room user"],
        handler: handlers::join,
    },
    CommandSpec {
        name: "PART",
        phase: Phase::Normal,
        arity: Arity::exactly(1),
        extension: None,
        failures: &["invalid.name", "unknown.entity", "strange.part"],
        replies: &["PART room user normal"],
        handler: handlers::part,
    },
    CommandSpec {
        name: "OPEN",
        phase: Phase::Normal,
        arity: Arity::exactly(1),
        extension: None,
        failures: &["invalid.name", "reserved.name", "existing.entity"],
        replies: &["OPEN room"],
        handler: handlers::open,
    },
    CommandSpec {
        name: "CLOSE",
        phase: Phase::Normal,
        arity: Arity::exactly(1),
        extension: None,
        failures: &["invalid.name", "unknown.entity", "access.owner"],
        replies: &["CLOSE room"],
        handler: handlers::close,
    },
    CommandSpec {
        name: "KICK",
        phase: Phase::Normal,
        arity: Arity::exactly(2),
        extension: None,
        failures: &["invalid.name", "unknown.entity", "access.owner", "strange.part"],
        replies: &[],
        handler: handlers::kick,
    },
    CommandSpec {
        name: "SECURE",
        phase: Phase::Normal,
        arity: Arity::exactly(1),
        extension: Some("secure"),
        failures: &["invalid.name", "unknown.entity", "access.owner"],
        replies: &["SECURE room evicted..."],
        handler: handlers::secure,
    },
    CommandSpec {
        name: "BYE",
        phase: Phase::Normal,
        arity: Arity::between(0, 1),
        extension: None,
        failures: &[],
        replies: &["BYE bye"],
        handler: handlers::bye,
    },
    CommandSpec {
        name: "PONG",
        phase: Phase::Normal,
        arity: Arity::exactly(1),
        extension: None,
        failures: &[],
        replies: &[],
        handler: handlers::pong,
    },
    CommandSpec {
        name: "POKE",
        phase: Phase::Normal,
        arity: Arity::exactly(1),
        extension: None,
        failures: &[],
        replies: &["OUCH token"],
        handler: handlers::poke,
    },
    CommandSpec {
        name: "INFO",
        phase: Phase::Normal,
        arity: Arity::exactly(2),
        extension: None,
        failures: &["unknown.namespace", "invalid.name", "unknown.entity"],
        replies: &["INFO namespace name key value..."],
        handler: handlers::info,
    },
    CommandSpec {
        name: "LIST",
        phase: Phase::Normal,
        arity: Arity::exactly(1),
        extension: None,
        failures: &["unknown.namespace"],
        replies: &["LIST namespace names..."],
        handler: handlers::list,
    },
    CommandSpec {
        name: "USERS",
        phase: Phase::Normal,
        arity: Arity::exactly(1),
        extension: None,
        failures: &["invalid.name", "unknown.entity"],
        replies: &["USERS room members..."],
        handler: handlers::users,
    },
];
