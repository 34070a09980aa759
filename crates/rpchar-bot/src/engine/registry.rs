//! Command lookup and hot reload of database-backed commands.

use super::command::{Command, CommandHandler};
use super::param::Param;
use crate::error::AppResult;
use crate::locale::{Locale, Names};
use character_store::StaticCommand;
use std::sync::{Arc, RwLock};
use tracing::debug;

/// Name of the free-form parameter of static commands.
pub const STATIC_ARGS_PARAM: &str = "args";

/// Ordered built-in commands, static commands and the fallback.
#[derive(Clone)]
pub struct CommandRegistry {
    builtins: Vec<Arc<Command>>,
    statics: Vec<(StaticCommand, Arc<Command>)>,
    fallback: Arc<Command>,
    static_handler: Arc<dyn CommandHandler>,
}

impl CommandRegistry {
    /// `static_handler` answers the fallback and every database-backed command.
    pub fn new(builtins: Vec<Command>, static_handler: Arc<dyn CommandHandler>) -> AppResult<Self> {
        let fallback = Command::builder(Names::new("", ""), Arc::clone(&static_handler))
            .param(Param::text(STATIC_ARGS_PARAM).optional())
            .build()?;

        Ok(Self {
            builtins: builtins.into_iter().map(Arc::new).collect(),
            statics: Vec::new(),
            fallback: Arc::new(fallback),
            static_handler,
        })
    }

    /// Built-in commands first, then static ones.
    pub fn commands(&self) -> impl Iterator<Item = &Arc<Command>> {
        self.builtins
            .iter()
            .chain(self.statics.iter().map(|(_, cmd)| cmd))
    }

    pub fn len(&self) -> usize {
        self.builtins.len() + self.statics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn builtin_count(&self) -> usize {
        self.builtins.len()
    }

    /// Case-insensitive lookup by any spelling.
    pub fn find(&self, name: &str) -> Option<Arc<Command>> {
        self.commands().find(|c| c.names.matches(name)).cloned()
    }

    /// Like [`find`](Self::find) but unknown names get the fallback.
    pub fn resolve(&self, name: &str) -> Arc<Command> {
        self.find(name).unwrap_or_else(|| Arc::clone(&self.fallback))
    }

    pub fn fallback(&self) -> &Arc<Command> {
        &self.fallback
    }

    /// The canonical spelling of `name` for `locale`, or `name` itself.
    pub fn localized(&self, name: &str, locale: Locale) -> String {
        self.find(name)
            .map(|c| c.names.get(locale).to_string())
            .unwrap_or_else(|| name.to_string())
    }

    /// A copy whose static commands mirror `records`.
    ///
    /// Known commands keep their position and are rebuilt when their record
    /// changed; removed ones disappear and new ones are appended.
    pub fn reconciled(&self, records: &[StaticCommand]) -> AppResult<Self> {
        let same = |a: &StaticCommand, b: &StaticCommand| a.command.eq_ignore_ascii_case(&b.command);

        let mut statics = Vec::with_capacity(records.len());
        for (old, cmd) in &self.statics {
            let Some(record) = records.iter().find(|r| same(r, old)) else {
                debug!("Static command {} removed", old.command);
                continue;
            };
            if record == old {
                statics.push((old.clone(), Arc::clone(cmd)));
            } else {
                statics.push((record.clone(), Arc::new(self.static_command(record)?)));
            }
        }
        for record in records {
            if !statics.iter().any(|(known, _)| same(known, record)) {
                debug!("Static command {} added", record.command);
                statics.push((record.clone(), Arc::new(self.static_command(record)?)));
            }
        }

        Ok(Self {
            builtins: self.builtins.clone(),
            statics,
            fallback: Arc::clone(&self.fallback),
            static_handler: Arc::clone(&self.static_handler),
        })
    }

    fn static_command(&self, record: &StaticCommand) -> AppResult<Command> {
        let names = Names::new(record.command.clone(), record.command.clone())
            .with_alts(record.alt_commands.iter().cloned());
        Command::builder(names, Arc::clone(&self.static_handler))
            .param(Param::text(STATIC_ARGS_PARAM).optional())
            .build()
    }
}

/// Process-wide registry published copy-on-write.
pub struct SharedRegistry {
    current: RwLock<Arc<CommandRegistry>>,
}

impl SharedRegistry {
    pub fn new(registry: CommandRegistry) -> Self {
        Self {
            current: RwLock::new(Arc::new(registry)),
        }
    }

    /// The registry as of now; later reconciles do not affect it.
    pub fn snapshot(&self) -> Arc<CommandRegistry> {
        match self.current.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    /// Reconcile against `records` and publish the result.
    pub fn reconcile(&self, records: &[StaticCommand]) -> AppResult<Arc<CommandRegistry>> {
        let next = Arc::new(self.snapshot().reconciled(records)?);
        match self.current.write() {
            Ok(mut guard) => *guard = Arc::clone(&next),
            Err(poisoned) => *poisoned.into_inner() = Arc::clone(&next),
        }
        Ok(next)
    }
}
