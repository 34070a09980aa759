//! Admin commands: user permissions and the stored static commands.

use crate::engine::{Command, CommandHandler, Examples, Param, ResponseContext, COMMAND};
use crate::error::AppResult;
use crate::locale::Names;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

const STATIC_NAME: &str = "static_command";

pub fn commands() -> AppResult<Vec<Command>> {
    Ok(vec![
        Command::builder(
            Names::new("Berechtigen", "auth").with_alts(["authorize", "authorise"]),
            Arc::new(AuthHandler),
        )
        .require_authed_strict()
        .param(Param::user_id("user_id"))
        .build()?,
        Command::builder(
            Names::new("Entmachten", "unauth").with_alts(["unauthorize", "unauthorise"]),
            Arc::new(UnauthHandler),
        )
        .require_admin()
        .param(Param::user_id("user_id"))
        .build()?,
        Command::builder(
            Names::new("Admin-Berechtigen", "auth-admin"),
            Arc::new(AdminRightsHandler { grant: true }),
        )
        .require_admin()
        .param(Param::user_id("user_id"))
        .build()?,
        Command::builder(
            Names::new("Admin-Entmachten", "unauth-admin"),
            Arc::new(AdminRightsHandler { grant: false }),
        )
        .require_admin()
        .param(Param::user_id("user_id"))
        .build()?,
        Command::builder(
            Names::new("Befehl-setzen", "set-command").with_alts(["Setze-Befehl", "set-cmd"]),
            Arc::new(SetCommandHandler),
        )
        .require_admin()
        .param(static_name())
        .param(Param::text("text").examples(Examples::of(["Hallo {user[first_name]}!"])))
        .build()?,
        Command::builder(
            Names::new("Befehl-Tastatur", "set-command-keyboards")
                .with_alts(["Setze-Befehl-Tastaturen", "set-cmd-keyboards"]),
            Arc::new(SetKeyboardsHandler),
        )
        .require_admin()
        .param(static_name())
        .param(Param::text("keyboards").examples(Examples::of(["Hilfe, Liste", "Regeln"])))
        .build()?,
        Command::builder(
            Names::new("Befehl-Alternativen", "set-command-alternatives")
                .with_alts(["Setze-Befehl-alternative-Befehle", "set-cmd-alt-cmd"]),
            Arc::new(SetAlternativesHandler),
        )
        .require_admin()
        .param(static_name())
        .param(Param::text("alternatives").examples(Examples::of(["h, help", "rules"])))
        .build()?,
        Command::builder(
            Names::new("Befehl-Löschen", "delete-command").with_alts(["delete-cmd"]),
            Arc::new(DeleteCommandHandler),
        )
        .require_admin()
        .param(static_name())
        .build()?,
    ])
}

fn static_name() -> Param {
    Param::new(
        STATIC_NAME,
        COMMAND,
        Examples::of(["Regeln", "Hilfe", "Kurzbefehle"]),
    )
}

/// Comma-separated list with blanks dropped.
fn split_list(text: &str) -> Vec<String> {
    text.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Auth command - grants the right to use protected commands.
pub struct AuthHandler;

#[async_trait]
impl CommandHandler for AuthHandler {
    async fn execute(&self, ctx: &mut ResponseContext) -> AppResult<()> {
        let Some(user_id) = ctx.user_param("user_id") else {
            return Ok(());
        };
        let by = ctx.user.id.clone();
        ctx.store().auth_user(&user_id, &by).await?;
        info!("{by} authed {user_id}");

        ctx.text(format!("Du hast erfolgreich den Nutzer @{user_id} berechtigt."));
        ctx.suggest(["Hilfe"]);
        Ok(())
    }
}

/// Unauth command - revokes a grant.
pub struct UnauthHandler;

#[async_trait]
impl CommandHandler for UnauthHandler {
    async fn execute(&self, ctx: &mut ResponseContext) -> AppResult<()> {
        let Some(user_id) = ctx.user_param("user_id") else {
            return Ok(());
        };
        ctx.store().unauth_user(&user_id).await?;
        info!("{} unauthed {user_id}", ctx.user.id);

        ctx.text(format!("Du hast erfolgreich den Nutzer @{user_id} entmächtigt."));
        ctx.suggest(["Admin-Hilfe"]);
        Ok(())
    }
}

/// Promotes or demotes a stored admin. Configured admins stay admins.
pub struct AdminRightsHandler {
    grant: bool,
}

#[async_trait]
impl CommandHandler for AdminRightsHandler {
    async fn execute(&self, ctx: &mut ResponseContext) -> AppResult<()> {
        let Some(user_id) = ctx.user_param("user_id") else {
            return Ok(());
        };

        if !self.grant && ctx.config().is_admin_id(&user_id) {
            ctx.text(format!(
                "Der Nutzer @{user_id} ist in der Konfiguration als Admin eingetragen und \
                 kann nicht entmachtet werden."
            ));
            ctx.suggest(["Admin-Hilfe"]);
            return Ok(());
        }

        ctx.store().get_or_create_user(&user_id).await?;
        ctx.store().set_admin(&user_id, self.grant).await?;
        info!("{} set admin={} for {user_id}", ctx.user.id, self.grant);

        if self.grant {
            ctx.text(format!("Der Nutzer @{user_id} ist jetzt Admin."));
        } else {
            ctx.text(format!("Der Nutzer @{user_id} ist kein Admin mehr."));
        }
        ctx.suggest(["Admin-Hilfe"]);
        Ok(())
    }
}

/// Set-command command - creates or replaces a stored response.
pub struct SetCommandHandler;

#[async_trait]
impl CommandHandler for SetCommandHandler {
    async fn execute(&self, ctx: &mut ResponseContext) -> AppResult<()> {
        let Some(name) = ctx.text_param(STATIC_NAME).map(str::to_string) else {
            return Ok(());
        };
        let text = ctx.text_param("text").unwrap_or_default().trim().to_string();
        let store = ctx.store().clone();

        let command = match store.static_command(&name).await? {
            Some(existing) => existing.command,
            None => name,
        };
        store.set_static_command(&command, &text).await?;
        info!("{} updated static command {command}", ctx.user.id);

        let record = store.static_command(&command).await?;
        let keyboards = record
            .as_ref()
            .and_then(|r| r.response_keyboards.clone())
            .map(|k| k.join(", "))
            .unwrap_or_else(|| "Hilfe, Liste".to_string());
        let alternatives = record
            .as_ref()
            .map(|r| r.alt_commands.join(", "))
            .filter(|a| !a.is_empty())
            .unwrap_or_else(|| "Alt-Befehl1, Alt-Befehl2, etc.".to_string());

        let bot = ctx.bot_username().to_string();
        let keyboards_cmd = ctx.localized("Befehl-Tastatur");
        let alternatives_cmd = ctx.localized("Befehl-Alternativen");
        ctx.text(format!(
            "Du hast erfolgreich die statische Antwort auf den Befehl '{command}' aktualisiert.\n\
             Du kannst jetzt noch mit dem folgenden Befehl die Antwort-Tastaturen setzen \
             (Komma-getrennt):\n\n\
             @{bot} {keyboards_cmd} {command} {keyboards}\n\n\n\
             Du kannst auch alternative Befehle (wie z.B. 'h' für Hilfe oder 'rules' für Regeln) \
             hinzufügen. Dies geht mit dem Befehl:\n\n\
             @{bot} {alternatives_cmd} {command} {alternatives}"
        ));
        ctx.suggest([command, "Admin-Hilfe".to_string()]);
        Ok(())
    }
}

/// Set-command-keyboards command - sets the suggested replies of a stored response.
pub struct SetKeyboardsHandler;

#[async_trait]
impl CommandHandler for SetKeyboardsHandler {
    async fn execute(&self, ctx: &mut ResponseContext) -> AppResult<()> {
        let name = ctx.text_param(STATIC_NAME).unwrap_or_default().to_string();
        let keyboards = split_list(ctx.text_param("keyboards").unwrap_or_default());

        let Some(existing) = ctx.store().static_command(&name).await? else {
            return reply_unknown(ctx, &name);
        };
        ctx.store()
            .set_static_command_keyboards(&existing.command, &keyboards)
            .await?;

        ctx.text(format!(
            "Du hast erfolgreich die Antwort-Tastaturen für den Befehl '{}' aktualisiert.",
            existing.command
        ));
        ctx.suggest([existing.command, "Admin-Hilfe".to_string()]);
        Ok(())
    }
}

/// Set-command-alternatives command - sets the other names of a stored response.
pub struct SetAlternativesHandler;

#[async_trait]
impl CommandHandler for SetAlternativesHandler {
    async fn execute(&self, ctx: &mut ResponseContext) -> AppResult<()> {
        let name = ctx.text_param(STATIC_NAME).unwrap_or_default().to_string();
        let alternatives = split_list(ctx.text_param("alternatives").unwrap_or_default());

        let Some(existing) = ctx.store().static_command(&name).await? else {
            return reply_unknown(ctx, &name);
        };
        ctx.store()
            .set_static_command_alternatives(&existing.command, &alternatives)
            .await?;

        ctx.text(format!(
            "Du hast erfolgreich die alternativen Befehle für den Befehl '{}' aktualisiert.",
            existing.command
        ));
        let mut suggestions = vec![existing.command];
        suggestions.extend(alternatives);
        suggestions.push("Admin-Hilfe".to_string());
        ctx.suggest(suggestions);
        Ok(())
    }
}

/// Delete-command command - removes a stored response.
pub struct DeleteCommandHandler;

#[async_trait]
impl CommandHandler for DeleteCommandHandler {
    async fn execute(&self, ctx: &mut ResponseContext) -> AppResult<()> {
        let name = ctx.text_param(STATIC_NAME).unwrap_or_default().to_string();
        let Some(existing) = ctx.store().static_command(&name).await? else {
            return reply_unknown(ctx, &name);
        };
        ctx.store().delete_static_command(&existing.command).await?;
        info!("{} deleted static command {}", ctx.user.id, existing.command);

        ctx.text(format!(
            "Der statische Befehl '{}' wurde gelöscht.",
            existing.command
        ));
        ctx.suggest(["Admin-Hilfe"]);
        Ok(())
    }
}

fn reply_unknown(ctx: &mut ResponseContext, name: &str) -> AppResult<()> {
    ctx.text(format!("Der Befehl '{name}' existiert nicht."));
    ctx.suggest(["Admin-Hilfe"]);
    Ok(())
}
