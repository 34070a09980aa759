//! Role-play helpers: work rewards, character stats and quests.

use super::format_timestamp;
use crate::dispatcher::{LEFT_ARROW, RIGHT_ARROW};
use crate::engine::{Command, CommandHandler, Examples, Param, ResponseContext, COMMAND_PARAM};
use crate::error::AppResult;
use crate::locale::{Locale, Names};
use crate::users::{require_char_id, require_user_id};
use async_trait::async_trait;
use character_store::{
    CharacterStats, InteractionStatus, Navigation, QuestPart, QuestWithActive, STAT_COUNT,
};
use chrono::Timelike;
use rand::Rng;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Stat names by id (1-based), German and English.
pub const STAT_NAMES: [(&str, &str); STAT_COUNT] = [
    ("Stärke", "strength"),
    ("Wahrnehmung", "perception"),
    ("Ausdauer", "endurance"),
    ("Charisma", "charisma"),
    ("Wissen", "knowledge"),
    ("Magie", "magic"),
    ("Geschicklichkeit", "agility"),
];

pub const MAX_STAT_POINTS: i64 = 10;

/// Running quests a character may have at once.
pub const MAX_ACTIVE_QUESTS: usize = 1;

/// Part number every quest starts with.
pub const FIRST_PART_NUM: i64 = 0;

pub fn commands() -> AppResult<Vec<Command>> {
    let stat_options: Vec<&str> = STAT_NAMES.iter().flat_map(|(de, en)| [*de, *en]).collect();

    Ok(vec![
        Command::builder(
            Names::new("leichte-arbeit", "easy-work"),
            Arc::new(WorkHandler::new(WorkLoad::Easy)),
        )
        .param(Param::duration_minutes("duration"))
        .build()?,
        Command::builder(
            Names::new("mittlere-arbeit", "medium-work").with_alts(["mittelschwere-arbeit"]),
            Arc::new(WorkHandler::new(WorkLoad::Medium)),
        )
        .param(Param::duration_minutes("duration"))
        .param(Param::digits("stat_points").validate_in_message())
        .build()?,
        Command::builder(
            Names::new("schwere-arbeit", "hard-work"),
            Arc::new(WorkHandler::new(WorkLoad::Hard)),
        )
        .param(Param::duration_minutes("duration"))
        .param(Param::digits("stat_points").validate_in_message())
        .build()?,
        Command::builder(
            Names::new("Statuswerte", "stats").with_alts([
                "Stats-anzeigen",
                "Statuswerte-anzeigen",
                "show-stats",
            ]),
            Arc::new(StatsHandler),
        )
        .param(Param::user_id("user_id").optional())
        .param(Param::char_id("char_id").optional())
        .build()?,
        Command::builder(
            Names::new("Statuswerte-setzen", "set-stats").with_alts([
                "Stats-setzen",
                "Stat-setzen",
                "Statuswert-setzen",
            ]),
            Arc::new(SetStatsHandler),
        )
        .require_authed()
        .param(Param::user_id("user_id").optional())
        .param(Param::char_id("char_id").optional())
        .param(Param::selection("stat_name", &stat_options).validate_in_message())
        .param(
            Param::digits("stat_points")
                .validate_in_message()
                .examples(Examples::Range(0..=MAX_STAT_POINTS)),
        )
        .build()?,
        Command::builder(
            Names::new("Quests", "quests").with_alts(["schwarzes-Brett", "bulletin-board"]),
            Arc::new(QuestsHandler),
        )
        .param(Param::digits("page").optional())
        .build()?,
        Command::builder(
            Names::new("Quest-Info", "quest-info")
                .with_alts(["Quest-Informationen", "quest-information"]),
            Arc::new(QuestInfoHandler),
        )
        .param(caption())
        .build()?,
        Command::builder(
            Names::new("Quest-annehmen", "quest-accept").with_alts(["quest-take"]),
            Arc::new(QuestAcceptHandler),
        )
        .require_authed()
        .param(Param::user_id("user_id").optional())
        .param(Param::char_id("char_id").optional())
        .param(caption())
        .build()?,
        Command::builder(
            Names::new("Quest-Aufgabe", "quest-task"),
            Arc::new(QuestTaskHandler),
        )
        .require_authed()
        .param(Param::user_id("user_id").optional())
        .param(Param::char_id("char_id").optional())
        .param(caption())
        .param(Param::quoted("part_name").examples(Examples::of([
            "\"Beginn\"",
            "\"Beim Schmied\"",
            "\"Zurück beim Schmied\"",
        ])))
        .build()?,
        Command::builder(
            Names::new("Quest-Status", "quest-status").with_alts([
                "meine-quests",
                "my-quests",
                "Questbuch",
                "questbook",
            ]),
            Arc::new(QuestStatusHandler),
        )
        .param(Param::user_id("user_id").optional())
        .param(Param::char_id("char_id").optional())
        .build()?,
    ])
}

fn caption() -> Param {
    Param::quoted("caption").examples(Examples::of([
        "\"Heilkräuter für den Schmied\"",
        "\"Der verlorene Ring\"",
    ]))
}

fn quoted(text: &str) -> String {
    format!("\"{text}\"")
}

// Work

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkLoad {
    Easy,
    Medium,
    Hard,
}

impl WorkLoad {
    /// Claws earned per minute of work.
    pub fn rate(self, stat_points: i64) -> f64 {
        let x = stat_points as f64;
        match self {
            WorkLoad::Easy => 0.125,
            WorkLoad::Medium => (x + 0.5).powi(2) / 288.0 + 7.0 / 128.0,
            WorkLoad::Hard => (x + 3.0).powi(2) / 240.0 - 1.0 / 240.0,
        }
    }

    fn adjective(self) -> &'static str {
        match self {
            WorkLoad::Easy => "leichte",
            WorkLoad::Medium => "mittelschwere",
            WorkLoad::Hard => "schwere",
        }
    }
}

/// "2:05 Stunden", "3 Stunden" or "45 Minuten".
pub fn format_work_time(minutes: i64) -> String {
    let (hours, mins) = (minutes / 60, minutes % 60);
    match (hours, mins) {
        (0, m) => format!("{m} Minuten"),
        (h, 0) => format!("{h} Stunden"),
        (h, m) => format!("{h}:{m:02} Stunden"),
    }
}

/// The reward message for a finished shift.
pub fn work_reward<R: Rng + ?Sized>(
    load: WorkLoad,
    minutes: i64,
    stat_points: i64,
    rng: &mut R,
) -> String {
    let base = (load.rate(stat_points) * minutes as f64).ceil().max(0.0) as i64;
    let claws = base.saturating_add(rng.gen_range(0..=base));

    let appendix = if load == WorkLoad::Hard {
        let hours = minutes.saturating_add(59) / 60;
        let blocked = hours.saturating_add(rng.gen_range(0..=hours.max(0)));
        format!(
            " und bist für {blocked} Stunde(n) erschöpft. \
             Du kannst in der Zeit weder arbeiten noch kämpfen."
        )
    } else {
        String::new()
    };

    format!(
        "*Du erhältst für deine {} Arbeit {claws} Krallen{appendix}*",
        format_work_time(minutes)
    )
}

/// Work commands - pay claws for time spent working.
pub struct WorkHandler {
    load: WorkLoad,
}

impl WorkHandler {
    pub fn new(load: WorkLoad) -> Self {
        Self { load }
    }
}

#[async_trait]
impl CommandHandler for WorkHandler {
    async fn execute(&self, ctx: &mut ResponseContext) -> AppResult<()> {
        let Some(minutes) = ctx.number_param("duration") else {
            if let Some(cmd) = ctx.command.clone() {
                cmd.reply_usage(ctx);
            }
            return Ok(());
        };

        let stat_points = match (self.load, ctx.number_param("stat_points")) {
            (WorkLoad::Easy, _) => 0,
            (_, Some(points)) => points.min(MAX_STAT_POINTS),
            (_, None) => {
                ask_for_stat_points(ctx, self.load);
                return Ok(());
            }
        };

        let reply = work_reward(self.load, minutes, stat_points, &mut rand::thread_rng());
        ctx.text(reply);
        Ok(())
    }
}

fn ask_for_stat_points(ctx: &mut ResponseContext, load: WorkLoad) {
    let Some(cmd) = ctx.command.clone() else {
        return;
    };
    let mut fixed = BTreeMap::new();
    fixed.insert(COMMAND_PARAM.to_string(), ctx.invoked.clone());
    if let Some(duration) = ctx.raw("duration") {
        fixed.insert("duration".to_string(), duration.to_string());
    }
    let examples = cmd.random_example_text(&ctx.example_context(), ctx.locale, 4, &fixed);

    ctx.text(format!(
        "Um eine {} Arbeit ausüben zu können, musst du für den Job geeignet sein.\n\
         Bitte gib als zweiten Wert deine Stat-Punkte an, die am ehesten zu deiner \
         Tätigkeit passen.\n\
         Beispielsweise\n\
         - Charisma-Punkte als Kellner oder Verkäufer,\n\
         - Stärke-Punkte als Schmied oder Wache, oder\n\
         - Wissens-Punkte als Lehrer.\n\n{examples}",
        load.adjective()
    ));
    let suggestions: Vec<String> = (1..=MAX_STAT_POINTS)
        .map(|p| ctx.example_with(&[("stat_points", p.to_string())]))
        .collect();
    ctx.suggest(suggestions);
}

// Stats

pub fn stat_name(stat_id: i64, locale: Locale) -> &'static str {
    usize::try_from(stat_id - 1)
        .ok()
        .and_then(|i| STAT_NAMES.get(i))
        .map(|(de, en)| match locale {
            Locale::De => *de,
            Locale::En => *en,
        })
        .unwrap_or("?")
}

/// Id of a stat named in either language.
pub fn stat_id(name: &str) -> Option<i64> {
    let name = name.trim().to_lowercase();
    STAT_NAMES
        .iter()
        .position(|(de, en)| de.to_lowercase() == name || *en == name)
        .map(|i| i as i64 + 1)
}

/// Experience points needed to hold `points` on one stat.
pub fn stat_cost(points: i64) -> i64 {
    match points {
        p if p <= 0 => 0,
        p if p <= 8 => p,
        9 => 10,
        p => p + 2,
    }
}

/// Experience points not yet spent on stats.
pub fn available_exp(stats: &CharacterStats) -> i64 {
    stats.exp / 100 - stats.stats.iter().map(|p| stat_cost(*p)).sum::<i64>()
}

/// Highest value `stat_id` may be set to with the experience available.
pub fn max_points(stats: &CharacterStats, stat_id: i64) -> i64 {
    let budget = available_exp(stats) + stat_cost(stats.get(stat_id));
    (0..=MAX_STAT_POINTS)
        .rev()
        .find(|p| stat_cost(*p) <= budget)
        .unwrap_or(0)
}

/// Experience and one bar per stat.
pub fn stats_message(stats: &CharacterStats, locale: Locale) -> String {
    let mut text = String::new();
    let exp = available_exp(stats);
    if exp != 0 {
        text.push_str(&format!("Erfahrungspunkte verfügbar: {exp}\n---\n\n"));
    }
    for (i, points) in stats.stats.iter().enumerate() {
        let filled = (*points).clamp(0, MAX_STAT_POINTS) as usize;
        text.push_str(&format!(
            "{}:\n|{}{}| {:2}\n\n",
            stat_name(i as i64 + 1, locale),
            "█".repeat(filled),
            "░".repeat(MAX_STAT_POINTS as usize - filled),
            points
        ));
    }
    text.trim_end().to_string()
}

/// Stats command - shows the stat bars of a character.
pub struct StatsHandler;

#[async_trait]
impl CommandHandler for StatsHandler {
    async fn execute(&self, ctx: &mut ResponseContext) -> AppResult<()> {
        let Some(user_id) = require_user_id(ctx, "user_id", true).await? else {
            return Ok(());
        };
        let Some(char_id) = require_char_id(ctx, "char_id", &user_id, false).await? else {
            return Ok(());
        };

        let stats = ctx
            .store()
            .character_stats(&user_id, char_id)
            .await?
            .unwrap_or_else(|| CharacterStats::empty(&user_id, char_id));

        let text = stats_message(&stats, ctx.locale);
        ctx.text(text);
        let caller = ctx.user.id.clone();
        ctx.suggest([crate::users::user_char_text(
            "Anzeigen", &user_id, char_id, &caller, false,
        )]);
        Ok(())
    }
}

/// Set-stats command - spends experience on a stat.
pub struct SetStatsHandler;

#[async_trait]
impl CommandHandler for SetStatsHandler {
    async fn execute(&self, ctx: &mut ResponseContext) -> AppResult<()> {
        let Some(user_id) = require_user_id(ctx, "user_id", true).await? else {
            return Ok(());
        };
        if user_id != ctx.user.id && !ctx.user.is_admin {
            ctx.text("Du kannst nur die Statuswerte deiner eigenen Charaktere setzen.");
            ctx.suggest(["Statuswerte"]);
            return Ok(());
        }
        let Some(char_id) = require_char_id(ctx, "char_id", &user_id, false).await? else {
            return Ok(());
        };

        let store = ctx.store().clone();
        let stats = store
            .character_stats(&user_id, char_id)
            .await?
            .unwrap_or_else(|| CharacterStats::empty(&user_id, char_id));
        let locale = ctx.locale;

        let Some(stat) = ctx.text_param("stat_name").and_then(stat_id) else {
            let names: Vec<String> = (1..=STAT_COUNT as i64)
                .map(|id| format!("- {}", stat_name(id, locale)))
                .collect();
            ctx.text(format!(
                "Du hast keinen Statuswert angegeben. Mögliche Werte sind:\n\n{}",
                names.join("\n")
            ));
            let suggestions: Vec<String> = (1..=STAT_COUNT as i64)
                .map(|id| ctx.example_with(&[("stat_name", stat_name(id, locale).to_string())]))
                .collect();
            ctx.suggest(suggestions);
            return Ok(());
        };
        let name = stat_name(stat, locale);
        let max = max_points(&stats, stat);

        let points = match ctx.number_param("stat_points") {
            Some(points) if points <= max => points,
            Some(points) => {
                ctx.text(format!(
                    "Für {points} Punkte auf {name} hast du nicht genügend Erfahrungspunkte. \
                     Möglich sind bis zu {max} Punkte."
                ));
                let suggestions: Vec<String> = (0..=max)
                    .map(|p| ctx.example_with(&[("stat_points", p.to_string())]))
                    .collect();
                ctx.suggest(suggestions);
                return Ok(());
            }
            None if max > 0 => {
                ctx.text(format!(
                    "Du kannst auf {name} bis zu {max} Punkte setzen.\n\n\
                     Für 1-8 wird jeweils ein, für 9 zwei und für 10 drei Erfahrungspunkte benötigt."
                ));
                let suggestions: Vec<String> = (1..=max)
                    .map(|p| ctx.example_with(&[("stat_points", p.to_string())]))
                    .collect();
                ctx.suggest(suggestions);
                return Ok(());
            }
            None => {
                ctx.text(format!("Du kannst keine Punkte auf {name} verteilen."));
                ctx.suggest(["Statuswerte"]);
                return Ok(());
            }
        };

        let Some(updated) = store
            .set_character_stat(&user_id, char_id, stat, points)
            .await?
        else {
            ctx.text(format!(
                "Der Charakter mit der Id {char_id} konnte nicht gefunden werden."
            ));
            ctx.suggest(["Liste"]);
            return Ok(());
        };
        info!("{} set stat {stat} of {user_id}/{char_id} to {points}", ctx.user.id);

        ctx.text(format!(
            "{name} ist jetzt auf {points} gesetzt.\n\n{}",
            stats_message(&updated, locale)
        ));

        let mut base: Vec<(&str, String)> = Vec::new();
        if let Some(raw) = ctx.raw("user_id") {
            base.push(("user_id", raw.to_string()));
        }
        if let Some(raw) = ctx.raw("char_id") {
            base.push(("char_id", raw.to_string()));
        }
        let suggestions: Vec<String> = (1..=STAT_COUNT as i64)
            .filter(|id| *id != stat)
            .map(|id| {
                let mut args = base.clone();
                args.push(("stat_name", stat_name(id, locale).to_string()));
                ctx.example_for("Statuswerte-setzen", &args)
            })
            .collect();
        ctx.suggest(suggestions);
        Ok(())
    }
}

// Quests

/// Weight of a part's condition; 0 when it does not hold.
///
/// Clauses are joined with `&`: `stat_gt(stat_id, points)` adds `points + 1`
/// and `time(from_hour, to_hour)` adds 11.
pub fn condition_weight(condition: Option<&str>, stats: &CharacterStats, hour: u32) -> i64 {
    let mut weight = 1;
    let Some(condition) = condition.map(str::trim).filter(|c| !c.is_empty()) else {
        return weight;
    };

    for clause in condition.split('&').map(str::trim) {
        let parsed = clause.split_once('(').and_then(|(func, rest)| {
            let args: Option<Vec<i64>> = rest
                .strip_suffix(')')?
                .split(',')
                .map(|a| a.trim().parse().ok())
                .collect();
            Some((func.trim().to_lowercase(), args?))
        });

        match parsed.as_ref().map(|(f, a)| (f.as_str(), a.as_slice())) {
            Some(("stat_gt", [stat, points])) => {
                if stats.get(*stat) > *points {
                    weight += points + 1;
                } else {
                    return 0;
                }
            }
            Some(("time", [from, to])) => {
                let hour = i64::from(hour);
                let inside = if from <= to {
                    *from <= hour && hour < *to
                } else {
                    hour >= *from || hour < *to
                };
                if inside {
                    weight += 11;
                } else {
                    return 0;
                }
            }
            _ => {
                warn!("Quest condition syntax error in '{clause}'");
                return 0;
            }
        }
    }
    weight
}

/// The part a character gets among alternatives sharing one part number.
///
/// A single candidate always wins; otherwise the heaviest satisfied
/// condition does, later parts winning ties.
pub fn choose_part<'a>(
    parts: &'a [QuestPart],
    stats: &CharacterStats,
    hour: u32,
) -> Option<&'a QuestPart> {
    if let [only] = parts {
        return Some(only);
    }
    let mut best: Option<(&QuestPart, i64)> = None;
    for part in parts {
        let weight = condition_weight(part.condition.as_deref(), stats, hour);
        if weight > 0 && best.map_or(true, |(_, w)| weight >= w) {
            best = Some((part, weight));
        }
    }
    best.map(|(part, _)| part)
}

fn current_hour() -> u32 {
    chrono::Local::now().hour()
}

async fn stats_of(ctx: &ResponseContext, user_id: &str, char_id: i64) -> AppResult<CharacterStats> {
    Ok(ctx
        .store()
        .character_stats(user_id, char_id)
        .await?
        .unwrap_or_else(|| CharacterStats::empty(user_id, char_id)))
}

fn quest_not_found(ctx: &mut ResponseContext) {
    ctx.text(
        "Der angegebene Quest konnte nicht gefunden werden. \
         Rufe 'quests' auf, um dir alle verfügbaren Quests anzuzeigen.",
    );
    ctx.suggest(["Quests"]);
}

/// The part's text and next steps, plus the command for the next part.
async fn quest_part_messages(
    ctx: &mut ResponseContext,
    part: &QuestPart,
    caption: &str,
    body_before: &str,
) -> AppResult<()> {
    let mut body = body_before.to_string();
    if let Some(text) = part.text.as_deref().filter(|t| !t.is_empty()) {
        body.push_str("\n\n");
        body.push_str(text);
    }
    if let Some(next) = part.next_step_text.as_deref().filter(|t| !t.is_empty()) {
        body.push_str(&format!("\n\n( Nächste Schritte: {next} )"));
    }

    let mut next_command = None;
    if !part.is_final() {
        let next_parts = ctx
            .store()
            .quest_parts(part.quest_id, part.next_part_num)
            .await?;
        if let Some(next) = next_parts.first() {
            body.push_str(
                "\n( Mit dem folgenden Befehl kannst du dann die nächste Teilaufgabe des \
                 Quests aufrufen: )",
            );
            next_command = Some(ctx.example_for(
                "Quest-Aufgabe",
                &[("caption", quoted(caption)), ("part_name", quoted(&next.part_name))],
            ));
        }
    } else {
        body.push_str(&format!("\n\n*Quest \"{caption}\" abgeschlossen*"));
    }

    ctx.text(body.trim_start().to_string());
    if let Some(command) = next_command {
        let bot = ctx.bot_username().to_string();
        ctx.text(format!("@{bot} {command}"));
        ctx.suggest([command]);
    } else {
        ctx.suggest(["Quest-Status"]);
    }
    Ok(())
}

/// Quests command - the bulletin board of open quests.
pub struct QuestsHandler;

/// Quests shown per bulletin board page.
const QUESTS_PAGE_SIZE: usize = 10;

#[async_trait]
impl CommandHandler for QuestsHandler {
    async fn execute(&self, ctx: &mut ResponseContext) -> AppResult<()> {
        let quests = ctx.store().available_quests().await?;
        if quests.is_empty() {
            ctx.text("Leider sind derzeit keine Quests verfügbar.");
            ctx.suggest(["Hilfe"]);
            return Ok(());
        }

        let pages = quests.len().div_ceil(QUESTS_PAGE_SIZE);
        let page = ctx.number_param("page").unwrap_or(1).clamp(1, pages as i64) as usize;
        let shown = &quests[(page - 1) * QUESTS_PAGE_SIZE..quests.len().min(page * QUESTS_PAGE_SIZE)];

        let pinned = match quests.len() {
            1 => "Hierauf ist ein Pergament angepinnt".to_string(),
            n => format!("Hierauf sind {n} Pergamente angepinnt"),
        };
        let mut text = format!(
            "***\nDu schaust auf das schwarze Brett in der Stadtmitte. {pinned}:\n"
        );
        for quest in shown {
            text.push_str(&format!("\n- \"{}\"", quest.caption));
        }
        if pages > 1 {
            text.push_str(&format!("\n\n(Seite {page} von {pages})"));
        }
        text.push_str("\n***");
        ctx.text_split(text, "\n");

        let quests_cmd = ctx.localized("Quests");
        let mut nav = Navigation::default();
        let mut suggestions = Vec::new();
        if page > 1 {
            nav.left = Some(format!("{quests_cmd} {}", page - 1));
            suggestions.push(LEFT_ARROW.to_string());
        }
        if page < pages {
            nav.right = Some(format!("{quests_cmd} {}", page + 1));
            suggestions.push(RIGHT_ARROW.to_string());
        }
        if !nav.is_empty() {
            ctx.set_status(InteractionStatus::DynNavigation(nav));
        }
        suggestions.extend(
            shown
                .iter()
                .map(|q| ctx.example_for("Quest-Info", &[("caption", quoted(&q.caption))])),
        );
        ctx.suggest(suggestions);
        Ok(())
    }
}

/// Quest-info command - description, rewards and requirements of one quest.
pub struct QuestInfoHandler;

pub fn quest_info_text(info: &QuestWithActive, locale: Locale, now: i64) -> String {
    let quest = &info.quest;

    let mut rewards = Vec::new();
    if quest.reward_money > 0 {
        rewards.push(format!("{} Krallen", quest.reward_money));
    }
    if quest.reward_exp > 0 {
        rewards.push(format!("{} mEP", quest.reward_exp));
    }

    let mut requirements = Vec::new();
    if quest.min_group_size > 2 {
        requirements.push(format!("{}-Gruppe benötigt", quest.min_group_size));
    }
    for min in quest.min_stats() {
        requirements.push(format!("min. {} {}", min.points, stat_name(min.id, locale)));
    }

    let active: Vec<String> = info.active_users.iter().map(|u| format!("@{u}")).collect();
    let or_none = |items: Vec<String>, none: &str| {
        if items.is_empty() {
            none.to_string()
        } else {
            items.join(", ")
        }
    };

    format!(
        "***\nDu schaust dir ein Pergament am schwarzen Brett genauer an:\n\n{}\n\n\n\
         Belohnung(en): {}\n\
         besondere Voraussetzung(en): {}\n\
         zu erledigen bis: {}\n\
         aktuell angenommen von: {} (max. {})\n***",
        quest.description,
        or_none(rewards, "-keine-"),
        or_none(requirements, "-keine-"),
        format_timestamp(now + quest.max_duration * 3600, "%d.%m %H:%M"),
        or_none(active, "-keinem-"),
        quest.max_active_count
    )
}

#[async_trait]
impl CommandHandler for QuestInfoHandler {
    async fn execute(&self, ctx: &mut ResponseContext) -> AppResult<()> {
        let caption = ctx.text_param("caption").unwrap_or_default().trim().to_string();
        let Some(info) = ctx.store().quest_by_caption(&caption).await? else {
            quest_not_found(ctx);
            return Ok(());
        };

        let text = quest_info_text(&info, ctx.locale, chrono::Utc::now().timestamp());
        ctx.text(text);

        let mut suggestions = Vec::new();
        if (info.active_users.len() as i64) < info.quest.max_active_count {
            suggestions.push(ctx.example_for(
                "Quest-annehmen",
                &[("caption", quoted(&info.quest.caption))],
            ));
        }
        suggestions.push("Quests".to_string());
        ctx.suggest(suggestions);
        Ok(())
    }
}

/// Quest-accept command - takes a quest from the board.
pub struct QuestAcceptHandler;

#[async_trait]
impl CommandHandler for QuestAcceptHandler {
    async fn execute(&self, ctx: &mut ResponseContext) -> AppResult<()> {
        let Some(user_id) = require_user_id(ctx, "user_id", true).await? else {
            return Ok(());
        };
        let Some(char_id) = require_char_id(ctx, "char_id", &user_id, false).await? else {
            return Ok(());
        };
        let store = ctx.store().clone();

        let caption = ctx.text_param("caption").unwrap_or_default().trim().to_string();
        let Some(info) = store.quest_by_caption(&caption).await? else {
            quest_not_found(ctx);
            return Ok(());
        };
        let quest = info.quest;

        if info.active_users.len() as i64 >= quest.max_active_count {
            ctx.text(format!(
                "Der Quest kann nicht angenommen werden, da er bereits von {} Spieler(n) \
                 angenommen wurde. Bitte versuche es später erneut.",
                info.active_users.len()
            ));
            ctx.suggest(["Quests"]);
            return Ok(());
        }

        if store.character_quests(&user_id, char_id).await?.len() >= MAX_ACTIVE_QUESTS {
            ctx.text(
                "Du hast bereits einen Quest angenommen und kannst keinen weiteren annehmen. \
                 Bitte beende zunächst deinen aktiven Quest.",
            );
            ctx.suggest(["Quest-Status"]);
            return Ok(());
        }

        let stats = stats_of(ctx, &user_id, char_id).await?;
        let locale = ctx.locale;
        let missing: Vec<String> = quest
            .min_stats()
            .iter()
            .filter(|min| stats.get(min.id) < min.points)
            .map(|min| format!("min. {} {}", min.points, stat_name(min.id, locale)))
            .collect();
        if !missing.is_empty() {
            ctx.text(format!(
                "Dein Charakter erfüllt nicht die Voraussetzungen für diesen Quest: {}",
                missing.join(", ")
            ));
            ctx.suggest(["Statuswerte", "Quests"]);
            return Ok(());
        }

        let parts = store.quest_parts(quest.id, FIRST_PART_NUM).await?;
        let Some(part) = choose_part(&parts, &stats, current_hour()) else {
            ctx.text("Für diesen Quest ist derzeit keine Aufgabe verfügbar.");
            ctx.suggest(["Quests"]);
            return Ok(());
        };

        store.accept_quest(&user_id, char_id, &quest, part).await?;
        info!("{user_id}/{char_id} accepted quest {}", quest.id);

        let intro = format!(
            "*Du reißt das Pergament mit der Quest vom schwarzen Brett und steckst es ein. \
             Du hast nun {} Stunden Zeit die Quest zu erledigen.*",
            quest.max_duration
        );
        quest_part_messages(ctx, part, &quest.caption, &intro).await
    }
}

/// Quest-task command - moves a running quest on to its next part.
pub struct QuestTaskHandler;

#[async_trait]
impl CommandHandler for QuestTaskHandler {
    async fn execute(&self, ctx: &mut ResponseContext) -> AppResult<()> {
        let Some(user_id) = require_user_id(ctx, "user_id", true).await? else {
            return Ok(());
        };
        let Some(char_id) = require_char_id(ctx, "char_id", &user_id, false).await? else {
            return Ok(());
        };
        let store = ctx.store().clone();

        let caption = ctx.text_param("caption").unwrap_or_default().trim().to_string();
        let Some(info) = store.quest_by_caption(&caption).await? else {
            quest_not_found(ctx);
            return Ok(());
        };
        let quest = info.quest;

        let Some(running) = store.character_quest(&user_id, char_id, quest.id).await? else {
            ctx.text("Der ausgewählte Quest wurde noch nicht angenommen.");
            let accept = ctx.example_for("Quest-annehmen", &[("caption", quoted(&quest.caption))]);
            ctx.suggest([accept]);
            return Ok(());
        };

        let part_name = ctx.text_param("part_name").unwrap_or_default().trim().to_string();
        let candidates = store.quest_parts_by_name(quest.id, &part_name).await?;
        if candidates.is_empty() {
            ctx.text(
                "Die angegebene Teilaufgabe des Quests exisiert nicht. \
                 Schaue im Questbuch nach um die weiteren Schritte zu sehen.",
            );
            ctx.suggest(["Quest-Status"]);
            return Ok(());
        }

        let stats = stats_of(ctx, &user_id, char_id).await?;
        let chosen = choose_part(&candidates, &stats, current_hour());
        let Some(part) = chosen.filter(|p| p.part_num == running.next_part_num) else {
            ctx.text(
                "Du kannst keine Aufgaben überspringen. \
                 Schaue im Questbuch nach um die weiteren Schritte zu sehen.",
            );
            ctx.suggest(["Quest-Status"]);
            return Ok(());
        };

        store.set_character_quest_part(&user_id, char_id, part).await?;
        info!("{user_id}/{char_id} reached part {} of quest {}", part.part_num, quest.id);
        quest_part_messages(ctx, part, &quest.caption, "").await
    }
}

/// Quest-status command - the quest book of a character.
pub struct QuestStatusHandler;

#[async_trait]
impl CommandHandler for QuestStatusHandler {
    async fn execute(&self, ctx: &mut ResponseContext) -> AppResult<()> {
        let Some(user_id) = require_user_id(ctx, "user_id", true).await? else {
            return Ok(());
        };
        let Some(char_id) = require_char_id(ctx, "char_id", &user_id, false).await? else {
            return Ok(());
        };
        let store = ctx.store().clone();

        let quests = store.character_quests(&user_id, char_id).await?;
        if quests.is_empty() {
            ctx.text(
                "Du hast derzeit keine Quests angenommen. Begib dich zum schwarzen Brett \
                 in der Stadtmitte um verfügbare Quests zu sehen.",
            );
            ctx.suggest(["Quests"]);
            return Ok(());
        }

        let count = match quests.len() {
            1 => "eine Quest".to_string(),
            n => format!("{n} Quests"),
        };
        let mut body = format!(
            "*Du schaust in dein Questbuch und dort findest du {count}, \
             die du noch abschließen musst*\n"
        );
        let mut suggestions = Vec::new();

        for quest in &quests {
            body.push_str(&format!(
                "\n---\nQuest \"{}\"\n\nZu erledigen bis: {}\nAktuelle Aufgabe: {}\n\
                 Nächste Schritte: {}",
                quest.caption,
                format_timestamp(quest.completed, "%d.%m. %H:%M"),
                quest.part_name,
                quest.next_step_text.as_deref().unwrap_or("-")
            ));

            if quest.next_part_num == -1 {
                continue;
            }
            let next_parts = store.quest_parts(quest.quest_id, quest.next_part_num).await?;
            if let Some(next) = next_parts.first() {
                suggestions.push(ctx.example_for(
                    "Quest-Aufgabe",
                    &[
                        ("caption", quoted(&quest.caption)),
                        ("part_name", quoted(&next.part_name)),
                    ],
                ));
            }
        }
        body.push_str("\n---");

        ctx.text_split(body, "---");
        ctx.suggest(suggestions);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use character_store::Quest;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn stats(points: [i64; STAT_COUNT]) -> CharacterStats {
        CharacterStats {
            user_id: "alice".into(),
            char_id: 1,
            stats: points,
            exp: 3000,
        }
    }

    fn part(id: i64, condition: Option<&str>) -> QuestPart {
        QuestPart {
            id,
            quest_id: 1,
            part_num: 1,
            part_name: format!("Teil {id}"),
            text: None,
            next_step_text: None,
            next_part_num: -1,
            condition: condition.map(str::to_string),
        }
    }

    #[test]
    fn test_work_rates() {
        assert_eq!(WorkLoad::Easy.rate(7), 0.125);
        assert!((WorkLoad::Medium.rate(0) - (0.25 / 288.0 + 7.0 / 128.0)).abs() < 1e-9);
        assert!((WorkLoad::Hard.rate(0) - 8.0 / 240.0).abs() < 1e-9);
        assert!(WorkLoad::Hard.rate(10) > WorkLoad::Medium.rate(10));
    }

    #[test]
    fn test_work_reward_bounds() {
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..50 {
            let text = work_reward(WorkLoad::Easy, 120, 0, &mut rng);
            let claws: i64 = text
                .split(" Arbeit ")
                .nth(1)
                .and_then(|rest| rest.split(' ').next())
                .and_then(|n| n.parse().ok())
                .unwrap();
            // 120 minutes at 0.125 give a base of 15.
            assert!((15..=30).contains(&claws), "{claws}");
            assert!(text.starts_with("*Du erhältst für deine 2 Stunden Arbeit "));
        }

        let text = work_reward(WorkLoad::Hard, 90, 5, &mut rng);
        assert!(text.contains("Stunde(n) erschöpft"));
        assert!(text.ends_with("weder arbeiten noch kämpfen.*"));
    }

    #[test]
    fn test_work_reward_saturates_for_endless_shifts() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..20 {
            let text = work_reward(WorkLoad::Hard, i64::MAX - 30, 10, &mut rng);
            let claws: i64 = text
                .split(" Arbeit ")
                .nth(1)
                .and_then(|rest| rest.split(' ').next())
                .and_then(|n| n.parse().ok())
                .unwrap();
            // A rate of 0.7 per minute puts the base above 6e18.
            assert!(claws > 6_000_000_000_000_000_000, "{text}");
            assert!(text.contains("Stunde(n) erschöpft"));
        }
    }

    #[test]
    fn test_format_work_time() {
        assert_eq!(format_work_time(45), "45 Minuten");
        assert_eq!(format_work_time(180), "3 Stunden");
        assert_eq!(format_work_time(125), "2:05 Stunden");
    }

    #[test]
    fn test_stat_costs() {
        assert_eq!(stat_cost(0), 0);
        assert_eq!(stat_cost(8), 8);
        assert_eq!(stat_cost(9), 10);
        assert_eq!(stat_cost(10), 12);

        let s = stats([5, 0, 0, 0, 0, 0, 0]);
        assert_eq!(available_exp(&s), 25);
        assert_eq!(max_points(&s, 1), 10);

        let poor = CharacterStats {
            exp: 800,
            ..stats([0; STAT_COUNT])
        };
        assert_eq!(max_points(&poor, 2), 8);
    }

    #[test]
    fn test_stat_lookup() {
        assert_eq!(stat_id("stärke"), Some(1));
        assert_eq!(stat_id("AGILITY"), Some(7));
        assert_eq!(stat_id("Glück"), None);
        assert_eq!(stat_name(5, Locale::De), "Wissen");
        assert_eq!(stat_name(5, Locale::En), "knowledge");
    }

    #[test]
    fn test_stats_message() {
        let text = stats_message(&stats([3, 0, 0, 0, 0, 0, 10]), Locale::De);
        assert!(text.starts_with("Erfahrungspunkte verfügbar: 15\n---\n\nStärke:\n|███░░░░░░░|  3"));
        assert!(text.ends_with("Geschicklichkeit:\n|██████████| 10"));
    }

    #[test]
    fn test_condition_weight() {
        let s = stats([0, 5, 0, 0, 0, 0, 0]);
        assert_eq!(condition_weight(None, &s, 12), 1);
        assert_eq!(condition_weight(Some("stat_gt(2,3)"), &s, 12), 5);
        assert_eq!(condition_weight(Some("stat_gt(2,5)"), &s, 12), 0);
        assert_eq!(condition_weight(Some("time(8, 18)"), &s, 12), 12);
        assert_eq!(condition_weight(Some("time(22,6)"), &s, 23), 12);
        assert_eq!(condition_weight(Some("time(22,6)"), &s, 12), 0);
        assert_eq!(condition_weight(Some("stat_gt(2,3)&time(8,18)"), &s, 12), 16);
        assert_eq!(condition_weight(Some("kaputt"), &s, 12), 0);
    }

    #[test]
    fn test_choose_part() {
        let s = stats([0, 5, 0, 0, 0, 0, 0]);
        let single = [part(1, Some("stat_gt(2,9)"))];
        assert_eq!(choose_part(&single, &s, 12).map(|p| p.id), Some(1));

        let parts = [
            part(1, None),
            part(2, Some("stat_gt(2,3)")),
            part(3, Some("stat_gt(2,8)")),
        ];
        assert_eq!(choose_part(&parts, &s, 12).map(|p| p.id), Some(2));

        let tied = [part(1, None), part(2, None)];
        assert_eq!(choose_part(&tied, &s, 12).map(|p| p.id), Some(2));

        let none = [part(1, Some("time(1,2)")), part(2, Some("time(3,4)"))];
        assert!(choose_part(&none, &s, 12).is_none());
    }

    #[test]
    fn test_quest_info_text() {
        let info = QuestWithActive {
            quest: Quest {
                id: 1,
                caption: "Der verlorene Ring".into(),
                description: "Finde den Ring.".into(),
                enabled: true,
                max_active_count: 2,
                repeat_hours: 0,
                max_duration: 24,
                reward_money: 30,
                reward_exp: 0,
                min_group_size: 1,
                min_stats: Some(r#"[{"id": 2, "points": 3}]"#.into()),
            },
            active_users: vec!["bob".into()],
        };
        let text = quest_info_text(&info, Locale::De, 0);
        assert!(text.contains("Finde den Ring."));
        assert!(text.contains("Belohnung(en): 30 Krallen\n"));
        assert!(text.contains("besondere Voraussetzung(en): min. 3 Wahrnehmung\n"));
        assert!(text.contains("aktuell angenommen von: @bob (max. 2)"));
    }
}
