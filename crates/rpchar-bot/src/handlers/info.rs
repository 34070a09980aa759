//! Command info and debug URL.

use crate::engine::{command_info, Command, CommandHandler, Examples, Param, ResponseContext, COMMAND};
use crate::error::AppResult;
use crate::locale::Names;
use async_trait::async_trait;
use std::sync::Arc;

pub fn commands() -> AppResult<Vec<Command>> {
    Ok(vec![
        Command::builder(
            Names::new("Befehl-Info", "command-info").with_alts(["Befehl-Hilfe", "cmd-info"]),
            Arc::new(CommandInfoHandler),
        )
        .param(Param::new(
            "name",
            COMMAND,
            Examples::of(["Anzeigen", "Liste", "Würfeln", "Hinzufügen"]),
        ))
        .build()?,
        Command::builder(Names::new("Debug-URL", "debug-url"), Arc::new(DebugUrlHandler))
            .require_admin()
            .hidden()
            .build()?,
    ])
}

/// Command-info command - structure and examples of another command.
pub struct CommandInfoHandler;

#[async_trait]
impl CommandHandler for CommandInfoHandler {
    async fn execute(&self, ctx: &mut ResponseContext) -> AppResult<()> {
        let name = ctx.text_param("name").unwrap_or_default().to_string();

        let visible = ctx
            .registry
            .find(&name)
            .filter(|cmd| ctx.user.is_admin || !(cmd.is_admin_only() || cmd.hidden));
        let Some(cmd) = visible else {
            ctx.text(format!("Der Befehl '{name}' existiert nicht."));
            ctx.suggest(["Hilfe"]);
            return Ok(());
        };

        let info = command_info(&cmd, &ctx.example_context(), ctx.locale);
        ctx.text(info);
        ctx.suggest([cmd.names.get(ctx.locale).to_string(), "Hilfe".to_string()]);
        Ok(())
    }
}

/// Debug-URL command - where recent webhook requests can be inspected.
pub struct DebugUrlHandler;

#[async_trait]
impl CommandHandler for DebugUrlHandler {
    async fn execute(&self, ctx: &mut ResponseContext) -> AppResult<()> {
        let config = ctx.config();
        let reply = if config.log_requests {
            format!(
                "Debug URL: {}:{}/debug",
                config.remote_host_ip.trim_end_matches('/'),
                config.remote_port
            )
        } else {
            "Der Bot läuft derzeit nicht im Log-Request Modus. Debug URL deaktiviert.".to_string()
        };
        ctx.text(reply);
        ctx.suggest(["Admin-Hilfe"]);
        Ok(())
    }
}
