//! Static commands - responses stored in the database and rendered as
//! templates. The same handler answers unknown commands.

use crate::engine::{Command, CommandHandler, Param, ResponseContext, STATIC_ARGS_PARAM};
use crate::error::AppResult;
use crate::locale::Names;
use crate::template::{self, Value, Vars};
use crate::users::BotUser;
use async_trait::async_trait;
use character_store::StaticCommand;
use rand::seq::SliceRandom;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Built-in names backed by stored templates.
pub fn commands() -> AppResult<Vec<Command>> {
    let names = [
        Names::new("Hilfe", "help").with_alts(["?", "h", "hilfe!", "rpg-help"]),
        Names::new("Regeln", "rules"),
        Names::new("nur-Vorlage", "template-only"),
        Names::new("Kurzbefehle", "shortcuts").with_alts(["help2", "hilfe2"]),
        Names::new("Admin-Hilfe", "admin-help"),
        Names::new("Quellcode", "source-code").with_alts(["source", "sourcecode", "lizenz", "license"]),
    ];

    names
        .into_iter()
        .map(|names| {
            Command::builder(names, Arc::new(StaticHandler))
                .param(Param::text(STATIC_ARGS_PARAM).optional())
                .build()
        })
        .collect()
}

/// Answers stored commands and falls back to "unknown command".
pub struct StaticHandler;

#[async_trait]
impl CommandHandler for StaticHandler {
    async fn execute(&self, ctx: &mut ResponseContext) -> AppResult<()> {
        let Some(record) = lookup(ctx).await? else {
            let name = ctx.user.first_name();
            debug!("Unknown command {}", ctx.invoked);
            ctx.text(format!(
                "Sorry {name}, den Befehl '{}' kenne ich nicht.",
                ctx.invoked
            ));
            ctx.suggest(["Hilfe"]);
            return Ok(());
        };

        let vars = template_vars(ctx, &record.response).await?;
        let body = template::render(&record.response, &vars);
        ctx.text(body);

        let keyboards = record
            .response_keyboards
            .unwrap_or_else(|| vec!["Hilfe".to_string()]);
        ctx.suggest(keyboards);
        Ok(())
    }
}

/// The stored record for the typed name, or for any spelling of the command.
async fn lookup(ctx: &ResponseContext) -> AppResult<Option<StaticCommand>> {
    let store = ctx.store();
    if !ctx.invoked.is_empty() {
        if let Some(record) = store.static_command(&ctx.invoked).await? {
            return Ok(Some(record));
        }
    }

    let names: Vec<String> = match &ctx.command {
        Some(cmd) => cmd.names.all().into_iter().map(str::to_string).collect(),
        None => Vec::new(),
    };
    for name in names {
        if let Some(record) = store.static_command(&name).await? {
            return Ok(Some(record));
        }
    }
    Ok(None)
}

/// Variables available to stored templates.
async fn template_vars(ctx: &ResponseContext, template: &str) -> AppResult<Vars> {
    let config = ctx.config();
    let mut vars = Vars::new();

    vars.insert("bot_username".into(), Value::str(&config.bot_username));
    vars.insert("kik_group_id".into(), Value::str(&config.kik_group));
    vars.insert("user_id".into(), Value::str(&ctx.user.id));
    vars.insert("user".into(), user_value(&ctx.user));
    vars.insert("command".into(), Value::str(&ctx.invoked));
    vars.insert(
        "source_code_url".into(),
        Value::str(config.source_code_url.clone().unwrap_or_default()),
    );

    let args = ctx
        .text_param(STATIC_ARGS_PARAM)
        .map(|a| a.split_whitespace().map(str::to_string).collect())
        .unwrap_or_default();
    vars.insert("args".into(), Value::List(args));

    let mut message = BTreeMap::new();
    message.insert("body".to_string(), Value::str(&ctx.body));
    message.insert("from".to_string(), Value::str(&ctx.message.from));
    message.insert("chat_id".to_string(), Value::str(&ctx.message.chat_id));
    vars.insert(
        "message".into(),
        Value::Object {
            display: ctx.body.clone(),
            fields: message,
        },
    );

    // Profile lookups for every participant are only worth it when used.
    if template.contains("ruser") {
        vars.insert("ruser".into(), random_user_value(ctx).await?);
    }
    Ok(vars)
}

/// A user as a template object.
pub fn user_value(user: &BotUser) -> Value {
    let mut fields = BTreeMap::new();
    fields.insert("id".to_string(), Value::str(user.id_repr()));
    fields.insert("user_id".to_string(), Value::str(&user.id));
    fields.insert("first_name".to_string(), Value::str(user.first_name()));
    fields.insert("last_name".to_string(), Value::str(user.last_name()));
    fields.insert("name".to_string(), Value::str(user.name_or_id()));
    fields.insert("name_or_id".to_string(), Value::str(user.name_or_id()));
    fields.insert("name_and_id".to_string(), Value::str(user.name_and_id()));

    Value::Object {
        display: user.name_and_id(),
        fields,
    }
}

/// `ruser.rand` and `ruser.rand_wo_sender` pick chat participants. Any
/// other attribute reads the first admin.
async fn random_user_value(ctx: &ResponseContext) -> AppResult<Value> {
    let admin = ctx.services.user(&ctx.config().first_admin()).await?;
    let participants = &ctx.message.participants;

    let rand = participants.choose(&mut rand::thread_rng()).cloned();
    let others: Vec<&String> = participants
        .iter()
        .filter(|p| !p.eq_ignore_ascii_case(&ctx.user.id))
        .collect();
    let rand_wo_sender = others.choose(&mut rand::thread_rng()).map(|p| p.to_string());

    let mut value = user_value(&admin);
    if let Value::Object { fields, .. } = &mut value {
        for (key, picked) in [("rand", rand), ("rand_wo_sender", rand_wo_sender)] {
            let user = match picked {
                Some(id) => ctx.services.user(&id).await?,
                None => admin.clone(),
            };
            fields.insert(key.to_string(), user_value(&user));
        }
    }
    Ok(value)
}
