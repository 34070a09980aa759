//! Character sheet commands: create, edit, show, move, delete, search and
//! list characters, plus picture uploads and the acting-as link.

use super::static_commands::user_value;
use super::{format_timestamp, ordinal};
use crate::dispatcher::{LEFT_ARROW, RIGHT_ARROW};
use crate::engine::{Command, CommandHandler, Examples, Param, ResponseContext};
use crate::error::AppResult;
use crate::locale::Names;
use crate::template::{self, Vars};
use crate::users::{require_char_id, require_user_id, user_char_text};
use async_trait::async_trait;
use character_store::{Character, InteractionStatus, Navigation};
use std::sync::Arc;
use tracing::{info, warn};

/// Users per page of the list command.
pub const LIST_PAGE_SIZE: i64 = 15;
/// Highest page whose entry numbers still fit an `i64`.
pub const MAX_LIST_PAGE: i64 = i64::MAX / LIST_PAGE_SIZE;

pub fn commands() -> AppResult<Vec<Command>> {
    Ok(vec![
        Command::builder(Names::new("Hinzufügen", "add"), Arc::new(AddHandler))
            .require_authed()
            .param(Param::user_id("user_id").validate_in_message())
            .param(Param::text("text").examples(Examples::of([
                "Vorname: Mira\nNachname: Stein\nAlter: 19",
                "Vorname: Tom\nAlter: 34\nBeruf: Schmied",
                "Name: Lea\nRasse: Elfe",
            ])))
            .build()?,
        Command::builder(Names::new("Ändern", "change"), Arc::new(ChangeHandler))
            .require_authed()
            .param(Param::user_id("user_id").optional())
            .param(Param::char_id("char_id").optional())
            .param(Param::text("text").examples(Examples::of([
                "Vorname: Mira\nNachname: Stein\nAlter: 20",
            ])))
            .build()?,
        Command::builder(
            Names::new("Bild-setzen", "set-picture").with_alts(["Setze-Bild", "set-pic"]),
            Arc::new(SetPictureHandler),
        )
        .require_authed()
        .param(Param::user_id("user_id").optional())
        .param(Param::char_id("char_id").optional())
        .build()?,
        Command::builder(
            Names::new("Bild-bestätigen", "approve-picture").with_alts(["approve-pic"]),
            Arc::new(ApprovePictureHandler),
        )
        .require_admin()
        .param(Param::user_id("user_id"))
        .param(Param::char_id("char_id").optional())
        .build()?,
        Command::builder(
            Names::new("Anzeigen", "show").with_alts(["Steckbrief", "Stecki"]),
            Arc::new(ShowHandler),
        )
        .param(Param::user_id("user_id").optional())
        .param(Param::char_id("char_id").optional())
        .param(Param::alpha("char_name").optional())
        .build()?,
        Command::builder(Names::new("Verschieben", "move"), Arc::new(MoveHandler))
            .require_authed()
            .param(Param::user_id("user_id"))
            .param(Param::user_id("to_user_id"))
            .param(Param::char_id("char_id").optional())
            .build()?,
        Command::builder(
            Names::new("Löschen", "delete").with_alts(["del"]),
            Arc::new(DeleteHandler),
        )
        .require_authed()
        .require_self("user_id")
        .param(Param::user_id("user_id").optional())
        .param(Param::char_id("char_id").optional())
        .build()?,
        Command::builder(
            Names::new("Letzte-Löschen", "delete-last").with_alts(["del-last"]),
            Arc::new(DeleteLastHandler),
        )
        .require_authed()
        .require_self("user_id")
        .param(Param::user_id("user_id").optional())
        .param(Param::char_id("char_id").optional())
        .build()?,
        Command::builder(Names::new("Suche", "search"), Arc::new(SearchHandler))
            .param(Param::text("query").examples(Examples::of(["Mira", "Stein", "Tom"])))
            .build()?,
        Command::builder(Names::new("Liste", "list"), Arc::new(ListHandler))
            .param(Param::digits("page").optional().default_value("1"))
            .build()?,
        Command::builder(
            Names::new("Vorlage", "template").with_alts([
                "Charaktervorlage",
                "Steckbriefvorlage",
                "boilerplate",
                "draft",
            ]),
            Arc::new(TemplateHandler),
        )
        .param(Param::user_id("user_id").optional())
        .build()?,
        Command::builder(
            Names::new("Ich-Bin", "i-am").with_alts(["iam"]),
            Arc::new(IAmHandler),
        )
        .param(Param::user_id("user_id").optional())
        .param(Param::char_id("char_id").optional())
        .build()?,
        Command::builder(
            Names::new("Wer-bin-ich", "who-am-i").with_alts(["wer-bin-ich?", "who-am-i?", "whoami"]),
            Arc::new(WhoAmIHandler),
        )
        .build()?,
    ])
}

/// Add command - stores a new character sheet.
pub struct AddHandler;

#[async_trait]
impl CommandHandler for AddHandler {
    async fn execute(&self, ctx: &mut ResponseContext) -> AppResult<()> {
        let text = ctx.text_param("text").unwrap_or_default().trim().to_string();
        let creator = ctx.user.id.clone();
        let target = ctx.user_param("user_id");
        let user_id = target.clone().unwrap_or_else(|| creator.clone());

        let char_id = ctx.store().add_character(&user_id, &creator, &text).await?;
        info!("{creator} added character {char_id} for {user_id}");

        let reply = match (&target, char_id) {
            (None, 1) => "Alles klar! Dein erster Charakter wurde hinzugefügt.".to_string(),
            (None, n) => format!("Alles klar! Dein {n}. Charakter wurde hinzugefügt."),
            (Some(u), 1) => format!("Alles klar! Der erste Charakter für @{u} wurde hinzugefügt."),
            (Some(u), n) => format!("Alles klar! Der {n}. Charakter für @{u} wurde hinzugefügt."),
        };
        ctx.text(reply);

        if target.is_none() && ctx.user.is_aliased() {
            // The character sits on the opaque id until the caller names their real one.
            let move_cmd = ctx.localized("Verschieben");
            ctx.text(
                "Da ich deinen Nutzernamen nicht sehen kann, wurde der Charakter vorerst \
                 unter einer temporären Id gespeichert. Antworte mit @DeinNutzername, \
                 damit ich ihn deinem Nutzer zuordnen kann.",
            );
            ctx.set_status(InteractionStatus::DynNavigation(Navigation {
                add_user_id: Some(format!("{move_cmd} @{user_id} @{{}} {char_id}")),
                ..Default::default()
            }));
        }

        let sender = ctx.user.id.clone();
        ctx.suggest([
            user_char_text("Anzeigen", &user_id, char_id, &sender, false),
            user_char_text("Bild-setzen", &user_id, char_id, &sender, false),
            user_char_text("Löschen", &user_id, char_id, &sender, true),
            "Liste".to_string(),
        ]);
        Ok(())
    }
}

/// Change command - stores a new revision of a character.
pub struct ChangeHandler;

#[async_trait]
impl CommandHandler for ChangeHandler {
    async fn execute(&self, ctx: &mut ResponseContext) -> AppResult<()> {
        let text = ctx.text_param("text").unwrap_or_default().trim().to_string();
        let creator = ctx.user.id.clone();
        let target = ctx.user_param("user_id");
        let user_id = target.clone().unwrap_or_else(|| creator.clone());
        let store = ctx.store().clone();
        let given = ctx.number_param("char_id");

        let char_id = match given {
            Some(id) => Some(id),
            None => store.first_char_id(&user_id).await?,
        };
        let changed = match char_id {
            Some(id) => store.change_character(&user_id, id, &creator, &text).await?,
            None => false,
        };
        let Some(char_id) = char_id.filter(|_| changed) else {
            not_found(ctx, &user_id, given);
            return Ok(());
        };

        let reply = match &target {
            None => format!("Alles klar! Dein {}. Charakter wurde gespeichert.", char_id),
            Some(u) => format!("Alles klar! Der {}. Charakter für @{u} wurde gespeichert.", char_id),
        };
        ctx.text(reply);

        let sender = ctx.user.id.clone();
        ctx.suggest([
            user_char_text("Anzeigen", &user_id, char_id, &sender, false),
            user_char_text("Bild-setzen", &user_id, char_id, &sender, false),
            user_char_text("Letzte-Löschen", &user_id, char_id, &sender, true),
            "Liste".to_string(),
        ]);
        Ok(())
    }
}

/// Set-picture command - the next picture sent becomes the character's.
pub struct SetPictureHandler;

#[async_trait]
impl CommandHandler for SetPictureHandler {
    async fn execute(&self, ctx: &mut ResponseContext) -> AppResult<()> {
        let Some(user_id) = require_user_id(ctx, "user_id", true).await? else {
            return Ok(());
        };
        let Some(char_id) = require_char_id(ctx, "char_id", &user_id, true).await? else {
            return Ok(());
        };

        let bot = ctx.bot_username().to_string();
        ctx.text(format!(
            "Alles Klar! Bitte schicke jetzt das Bild direkt an @{bot}"
        ));
        ctx.set_status(InteractionStatus::AwaitingPicture { user_id, char_id });
        Ok(())
    }
}

/// Store a picture sent after the set-picture command.
pub async fn receive_picture(
    ctx: &mut ResponseContext,
    pic_url: &str,
    user_id: &str,
    char_id: i64,
) -> AppResult<()> {
    let sender = ctx.user.id.clone();
    let show = user_char_text("Anzeigen", user_id, char_id, &sender, false);

    match save_picture(ctx, pic_url, user_id, char_id).await {
        Ok(filename) => {
            ctx.store()
                .add_picture(user_id, char_id, &filename, &sender)
                .await?;
            info!("Picture {filename} stored for {user_id}/{char_id}");

            let admin = ctx.config().first_admin();
            ctx.text(format!(
                "Alles klar! Das Bild wurde gesetzt. Bitte melde dich bei @{admin} damit das \
                 Bild bestätigt werden kann. Dies ist notwendig, da Kik eine \
                 Zero-Tolerance-Policy gegenüber evtl. anstößigen Bildern hat."
            ));
            ctx.suggest([show, "Liste".to_string()]);
        }
        Err(e) => {
            warn!("Picture upload for {user_id}/{char_id} failed: {e}");
            ctx.text("Beim hochladen ist ein Fehler aufgetreten. Bitte versuche es erneut.");
            ctx.set_status(ctx.prior_status.clone());
            ctx.suggest([
                user_char_text("Bild-setzen", user_id, char_id, &sender, false),
                "Liste".to_string(),
            ]);
        }
    }
    Ok(())
}

async fn save_picture(
    ctx: &ResponseContext,
    pic_url: &str,
    user_id: &str,
    char_id: i64,
) -> AppResult<String> {
    let download = ctx.services.kik.download(pic_url).await?;
    let filename = format!(
        "{user_id}-{}-{char_id}-{}.{}",
        ctx.user.id,
        chrono::Utc::now().timestamp(),
        picture_extension(download.content_type.as_deref())
    );

    let dir = ctx.config().picture_dir();
    tokio::fs::create_dir_all(&dir).await?;
    tokio::fs::write(dir.join(&filename), &download.bytes).await?;
    Ok(filename)
}

fn picture_extension(content_type: Option<&str>) -> &'static str {
    let subtype = content_type
        .and_then(|ct| ct.split(';').next())
        .and_then(|ct| ct.trim().strip_prefix("image/"))
        .unwrap_or("jpeg");
    match subtype {
        "png" => "png",
        "gif" => "gif",
        "webp" => "webp",
        _ => "jpg",
    }
}

/// Approve-picture command - makes the newest picture visible.
pub struct ApprovePictureHandler;

#[async_trait]
impl CommandHandler for ApprovePictureHandler {
    async fn execute(&self, ctx: &mut ResponseContext) -> AppResult<()> {
        let Some(user_id) = ctx.user_param("user_id") else {
            return Ok(());
        };
        let store = ctx.store().clone();
        let char_id = match ctx.number_param("char_id") {
            Some(id) => Some(id),
            None => store.first_char_id(&user_id).await?,
        };

        let approved = match char_id {
            Some(id) => store.approve_picture(&user_id, id).await?,
            None => false,
        };
        let sender = ctx.user.id.clone();

        match char_id.filter(|_| approved) {
            Some(id) => {
                info!("{sender} approved the picture of {user_id}/{id}");
                ctx.text(format!(
                    "Das Bild des {} Charakters von @{user_id} wurde bestätigt.",
                    ordinal(id)
                ));
                ctx.suggest([user_char_text("Anzeigen", &user_id, id, &sender, true)]);
            }
            None => {
                ctx.text("Für den Charakter wurde kein Bild gefunden.");
                ctx.suggest(["Liste"]);
            }
        }
        Ok(())
    }
}

/// Show command - displays a character sheet.
pub struct ShowHandler;

#[async_trait]
impl CommandHandler for ShowHandler {
    async fn execute(&self, ctx: &mut ResponseContext) -> AppResult<()> {
        let Some(user_id) = require_user_id(ctx, "user_id", true).await? else {
            return Ok(());
        };
        let store = ctx.store().clone();
        let sender = ctx.user.id.clone();

        let char_id = if let Some(name) = ctx.text_param("char_name").map(str::to_string) {
            let found = store.find_characters(&user_id, &name).await?;
            match found.as_slice() {
                [] => {
                    ctx.text(format!(
                        "Es wurde kein Charakter mit dem Namen {name} des Nutzers @{user_id} gefunden"
                    ));
                    ctx.suggest(["Liste"]);
                    return Ok(());
                }
                [only] => Some(only.char_id),
                many => {
                    ctx.text(format!(
                        "Es wurden {} Charaktere mit dem Namen {name} des Nutzers @{user_id} gefunden",
                        many.len()
                    ));
                    let suggestions: Vec<String> = many
                        .iter()
                        .map(|c| user_char_text("Anzeigen", &user_id, c.char_id, &sender, false))
                        .collect();
                    ctx.suggest(suggestions);
                    return Ok(());
                }
            }
        } else if let Some(id) = ctx.number_param("char_id") {
            Some(id)
        } else {
            match &ctx.user.linked {
                Some((linked_user, linked_char)) if *linked_user == user_id => Some(*linked_char),
                _ => store.first_char_id(&user_id).await?,
            }
        };

        let Some(char_id) = char_id else {
            ctx.text(format!("Keine Daten zum Nutzer @{user_id} gefunden"));
            ctx.suggest(["Liste"]);
            return Ok(());
        };

        match store.get_character(&user_id, char_id).await? {
            Some(character) => show_character(ctx, &character).await,
            None => {
                ctx.text(format!(
                    "Keine Daten zum {char_id}. Charakter des Nutzers @{user_id} gefunden"
                ));
                ctx.suggest(["Liste"]);
                Ok(())
            }
        }
    }
}

/// The sheet of `character` with its footer, picture and navigation.
pub async fn show_character(ctx: &mut ResponseContext, character: &Character) -> AppResult<()> {
    let sender = ctx.user.id.clone();
    let owner = ctx.services.user(&character.user_id).await?;
    let creator = ctx.services.user(&character.creator_id).await?;

    let mut nav = Navigation::default();
    let mut suggestions = Vec::new();
    if let Some(prev) = character.prev_char_id {
        nav.left = Some(user_char_text("Anzeigen", &character.user_id, prev, &sender, false));
        suggestions.push(LEFT_ARROW.to_string());
    }
    if let Some(next) = character.next_char_id {
        nav.right = Some(user_char_text("Anzeigen", &character.user_id, next, &sender, false));
        suggestions.push(RIGHT_ARROW.to_string());
    }

    let mut appendix = String::new();
    if !nav.is_empty() {
        appendix.push_str(
            "\n\n(Weitere Charaktere des Nutzers vorhanden: ⬅️ und ➡️ zum navigieren)",
        );
        ctx.set_status(InteractionStatus::DynNavigation(nav));
    }

    if character.user_id == sender {
        suggestions.push(user_char_text(
            "Bild-setzen",
            &character.user_id,
            character.char_id,
            &sender,
            false,
        ));
    }
    suggestions.push("Liste".to_string());

    match ctx
        .store()
        .latest_picture(&character.user_id, character.char_id)
        .await?
    {
        Some(picture) if picture.active => {
            let url = ctx.config().picture_url(&picture.picture_filename);
            ctx.picture(url);
        }
        Some(_) => {
            appendix.push_str("\n\nCharakter-Bilder müssen vor dem Anzeigen bestätigt werden.");
        }
        None => {}
    }

    let mut vars = Vars::new();
    vars.insert("user".to_string(), user_value(&owner));
    let text = template::render(&character.text, &vars);

    ctx.text(format!(
        "{text}\n\n---\nCharakter von {}\nErstellt von {}\nErstellt am {}{appendix}",
        owner.name_and_id(),
        creator.name_and_id(),
        format_timestamp(character.created, "%d.%m.%Y %H:%M"),
    ));
    ctx.suggest(suggestions);
    Ok(())
}

/// Move command - hands a character over to another user.
pub struct MoveHandler;

#[async_trait]
impl CommandHandler for MoveHandler {
    async fn execute(&self, ctx: &mut ResponseContext) -> AppResult<()> {
        let (Some(from), Some(to)) = (ctx.user_param("user_id"), ctx.user_param("to_user_id"))
        else {
            return Ok(());
        };
        let own = from == ctx.user.id;
        if !own && !ctx.user.is_admin {
            ctx.text("Du kannst keine Charaktere von anderen Nutzern verschieben.");
            ctx.suggest(["Liste"]);
            return Ok(());
        }

        let store = ctx.store().clone();
        let given = ctx.number_param("char_id");
        let char_id = match given {
            Some(id) => Some(id),
            None => store.first_char_id(&from).await?,
        };
        let existing = match char_id {
            Some(id) => store.get_character(&from, id).await?,
            None => None,
        };
        let Some(existing) = existing else {
            not_found(ctx, &from, given);
            return Ok(());
        };

        let new_id = store.move_character(&from, &to, existing.char_id).await?;
        info!(
            "{} moved {from}/{} to {to}/{new_id}",
            ctx.user.id, existing.char_id
        );

        let reply = match (own, given) {
            (true, Some(id)) => format!(
                "Du hast erfolgreich deinen {id}. Charakter auf @{to} ({new_id}.) verschoben."
            ),
            (true, None) => {
                format!("Du hast erfolgreich deinen Charakter auf @{to} ({new_id}.) verschoben.")
            }
            (false, _) => format!(
                "Du hast erfolgreich den {} Charakter von @{from} auf @{to} ({new_id}.) verschoben.",
                ordinal(existing.char_id)
            ),
        };
        ctx.text(reply);

        let sender = ctx.user.id.clone();
        ctx.suggest([
            user_char_text("Anzeigen", &to, new_id, &sender, true),
            "Liste".to_string(),
        ]);
        Ok(())
    }
}

/// Delete command - soft-deletes every revision of a character.
pub struct DeleteHandler;

#[async_trait]
impl CommandHandler for DeleteHandler {
    async fn execute(&self, ctx: &mut ResponseContext) -> AppResult<()> {
        let caller = ctx.user.id.clone();
        let user_id = ctx.user_param("user_id").unwrap_or_else(|| caller.clone());
        let given = ctx.number_param("char_id");
        let store = ctx.store().clone();

        let char_id = match given {
            Some(id) => Some(id),
            None => store.first_char_id(&user_id).await?,
        };
        let removed = match char_id {
            Some(id) => store.remove_character(&user_id, id, &caller).await?,
            None => false,
        };
        let Some(char_id) = char_id.filter(|_| removed) else {
            not_found(ctx, &user_id, given);
            return Ok(());
        };
        info!("{caller} deleted {user_id}/{char_id}");

        let reply = if user_id == caller {
            match given {
                Some(id) => format!("Du hast erfolgreich deinen {id}. Charakter gelöscht"),
                None => "Du hast erfolgreich deinen Charakter gelöscht.".to_string(),
            }
        } else {
            format!(
                "Du hast erfolgreich den {} Charakter von @{user_id} gelöscht.",
                ordinal(char_id)
            )
        };
        ctx.text(reply);
        ctx.suggest(["Liste"]);
        Ok(())
    }
}

/// Delete-last command - drops the newest revision of a character.
pub struct DeleteLastHandler;

#[async_trait]
impl CommandHandler for DeleteLastHandler {
    async fn execute(&self, ctx: &mut ResponseContext) -> AppResult<()> {
        let caller = ctx.user.id.clone();
        let user_id = ctx.user_param("user_id").unwrap_or_else(|| caller.clone());
        let given = ctx.number_param("char_id");
        let store = ctx.store().clone();

        let char_id = match given {
            Some(id) => Some(id),
            None => store.first_char_id(&user_id).await?,
        };
        let removed = match char_id {
            Some(id) => store.remove_last_revision(&user_id, id, &caller).await?,
            None => false,
        };
        let Some(char_id) = char_id.filter(|_| removed) else {
            not_found(ctx, &user_id, given);
            return Ok(());
        };

        let reply = match (user_id == caller, given) {
            (true, Some(id)) => {
                format!("Du hast erfolgreich die letzte Änderung am Charakter {id} gelöscht.")
            }
            (true, None) => "Du hast erfolgreich die letzte Änderung gelöscht.".to_string(),
            (false, Some(id)) => format!(
                "Du hast erfolgreich die letzte Änderung des Charakters {id} von @{user_id} gelöscht."
            ),
            (false, None) => format!(
                "Du hast erfolgreich die letzte Änderung des ersten Charakters von @{user_id} gelöscht."
            ),
        };
        ctx.text(reply);
        ctx.suggest([
            "Liste".to_string(),
            user_char_text("Anzeigen", &user_id, char_id, &caller, false),
        ]);
        Ok(())
    }
}

/// Search command - finds characters of all users by name.
pub struct SearchHandler;

#[async_trait]
impl CommandHandler for SearchHandler {
    async fn execute(&self, ctx: &mut ResponseContext) -> AppResult<()> {
        let query = ctx.text_param("query").unwrap_or_default().trim().to_string();
        let store = ctx.store().clone();
        let found = store.search_characters(&query, "name").await?;

        match found.as_slice() {
            [] => {
                ctx.text("Für die Suchanfrage wurden keine Charaktere gefunden.");
                ctx.suggest(["Liste"]);
                Ok(())
            }
            [only] => match store.get_character(&only.user_id, only.char_id).await? {
                Some(character) => show_character(ctx, &character).await,
                None => Ok(()),
            },
            many => {
                ctx.text("Es wurden mehrere Charaktere gefunden, die deiner Suchanfrage entsprechen.");
                let sender = ctx.user.id.clone();
                let mut suggestions: Vec<String> = many
                    .iter()
                    .map(|c| user_char_text("Anzeigen", &c.user_id, c.char_id, &sender, true))
                    .collect();
                suggestions.push("Liste".to_string());
                ctx.suggest(suggestions);
                Ok(())
            }
        }
    }
}

/// List command - pages through all users with characters.
pub struct ListHandler;

#[async_trait]
impl CommandHandler for ListHandler {
    async fn execute(&self, ctx: &mut ResponseContext) -> AppResult<()> {
        let page = ctx
            .number_param("page")
            .unwrap_or(1)
            .clamp(1, MAX_LIST_PAGE);
        let store = ctx.store().clone();
        let mut rows = store
            .list_users_with_characters(page, LIST_PAGE_SIZE)
            .await?;
        let has_next = rows.len() as i64 > LIST_PAGE_SIZE;
        rows.truncate(LIST_PAGE_SIZE as usize);

        let mut blocks = vec![format!(
            "Liste aller Nutzer mit Charakteren:\n--- Seite {page} ---"
        )];
        let mut user_suggestions = Vec::with_capacity(rows.len());
        for (i, row) in rows.iter().enumerate() {
            let user = ctx.services.user(&row.user_id).await?;
            blocks.push(format!(
                "{}.: {}\nNutzername: @{}\nAnz. Charaktere: {}\nletzte Änderung: {}",
                (page - 1) * LIST_PAGE_SIZE + i as i64 + 1,
                user.name_or_id(),
                row.user_id,
                row.chars_cnt,
                format_timestamp(row.last_change, "%d.%m.%Y"),
            ));
            user_suggestions.push(format!("Anzeigen @{}", row.user_id));
        }

        let list = ctx.localized("Liste");
        let mut nav = Navigation::default();
        let mut suggestions = Vec::new();
        if page > 1 {
            nav.left = Some(format!("{list} {}", page - 1));
            suggestions.push(LEFT_ARROW.to_string());
        }
        if has_next {
            nav.right = Some(format!("{list} {}", page + 1));
            suggestions.push(RIGHT_ARROW.to_string());
        }
        if !nav.is_empty() {
            blocks.push("(Weitere Seiten: ⬅️ und ➡️ zum navigieren)".to_string());
            ctx.set_status(InteractionStatus::DynNavigation(nav));
        }
        suggestions.extend(user_suggestions);

        ctx.text_split(blocks.join("\n\n"), "\n\n");
        ctx.suggest(suggestions);
        Ok(())
    }
}

/// Template command - explains how to add a character and shows the blank sheet.
pub struct TemplateHandler;

#[async_trait]
impl CommandHandler for TemplateHandler {
    async fn execute(&self, ctx: &mut ResponseContext) -> AppResult<()> {
        let bot = ctx.bot_username().to_string();
        let group = ctx.config().kik_group.clone();
        let add = ctx.localized("Hinzufügen");
        let change = ctx.localized("Ändern");
        let user = match ctx.user_param("user_id") {
            Some(u) => format!("@{u}"),
            None if ctx.user.is_aliased() => "@Dein_Nutzername".to_string(),
            None => format!("@{}", ctx.user.id),
        };

        let blank = ctx
            .store()
            .static_command("nur-vorlage")
            .await?
            .map(|s| s.response)
            .unwrap_or_default();

        ctx.text(format!(
            "Um einen neuen Charakter in der Gruppe #{group} anzulegen, kopiere die folgende \
             Nachricht, fülle sie aus und schicke sie an mich. Später kannst du den Charakter \
             mit '{change}' statt '{add}' bearbeiten."
        ));
        ctx.text(format!("@{bot} {add} {user}\n{blank}"));
        ctx.suggest(["Hilfe"]);
        Ok(())
    }
}

/// I-am command - links the caller to a character for later commands.
pub struct IAmHandler;

#[async_trait]
impl CommandHandler for IAmHandler {
    async fn execute(&self, ctx: &mut ResponseContext) -> AppResult<()> {
        let Some(user_id) = require_user_id(ctx, "user_id", false).await? else {
            return Ok(());
        };
        let Some(char_id) = require_char_id(ctx, "char_id", &user_id, false).await? else {
            return Ok(());
        };

        let caller = ctx.user.id.clone();
        ctx.store()
            .link_character(&caller, Some((&user_id, char_id)))
            .await?;
        ctx.user.linked = Some((user_id.clone(), char_id));

        ctx.text(format!(
            "Alles klar! Alle charakter-spezifischen Befehle sind ab jetzt für dich \
             standardmäßig auf @{user_id} mit der Charakter-Id {char_id} gesetzt."
        ));
        ctx.suggest([
            user_char_text("Anzeigen", &user_id, char_id, &caller, false),
            "Wer-bin-ich".to_string(),
        ]);
        Ok(())
    }
}

/// Who-am-i command - shows the acting-as link.
pub struct WhoAmIHandler;

#[async_trait]
impl CommandHandler for WhoAmIHandler {
    async fn execute(&self, ctx: &mut ResponseContext) -> AppResult<()> {
        match ctx.user.linked.clone() {
            Some((user_id, char_id)) => {
                ctx.text(format!(
                    "Alle charakter-spezifischen Befehle sind für dich standardmäßig auf \
                     @{user_id} mit der Charakter-Id {char_id} gesetzt."
                ));
                let caller = ctx.user.id.clone();
                ctx.suggest([user_char_text("Anzeigen", &user_id, char_id, &caller, false)]);
            }
            None => {
                ctx.text(
                    "Du hast derzeit keinen Benutzernamen und Charakter-Id für \
                     charakter-spezifischen Befehle gesetzt.",
                );
                ctx.suggest(["Anzeigen"]);
            }
        }
        Ok(())
    }
}

fn not_found(ctx: &mut ResponseContext, user_id: &str, char_id: Option<i64>) {
    match char_id {
        Some(id) => ctx.text(format!(
            "Der Charakter mit der Id {id} konnte nicht gefunden werden."
        )),
        None => ctx.text(format!(
            "Der Nutzer @{user_id} hat derzeit noch keine Charaktere angelegt."
        )),
    }
    ctx.suggest(["Liste"]);
}
