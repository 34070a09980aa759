//! Placeholder substitution for static command responses.
//!
//! Supports `{name}`, attribute and index chains such as `{user[first_name]}`,
//! `{user.first_name}` or `{args[0]}`, and `{{`/`}}` escapes. Format specs
//! after `:` are ignored. Unknown placeholders stay as written.

use std::collections::BTreeMap;

/// A value a placeholder can resolve to.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Str(String),
    List(Vec<String>),
    /// Rendered as `display`; fields reachable by `.name` or `[name]`.
    Object {
        display: String,
        fields: BTreeMap<String, Value>,
    },
}

impl Value {
    pub fn str(s: impl Into<String>) -> Self {
        Value::Str(s.into())
    }

    fn display(&self) -> String {
        match self {
            Value::Str(s) => s.clone(),
            Value::List(items) => format!("[{}]", items.join(", ")),
            Value::Object { display, .. } => display.clone(),
        }
    }

    fn get(&self, key: &str) -> Option<Value> {
        match self {
            Value::Object { fields, .. } => fields.get(key).cloned(),
            Value::List(items) => key
                .parse::<usize>()
                .ok()
                .and_then(|i| items.get(i))
                .map(|s| Value::Str(s.clone())),
            Value::Str(_) => None,
        }
    }
}

pub type Vars = BTreeMap<String, Value>;

/// Render `template` with `vars`.
pub fn render(template: &str, vars: &Vars) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(pos) = rest.find(['{', '}']) {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];

        if tail.starts_with("{{") {
            out.push('{');
            rest = &tail[2..];
        } else if tail.starts_with("}}") {
            out.push('}');
            rest = &tail[2..];
        } else if tail.starts_with('}') {
            out.push('}');
            rest = &tail[1..];
        } else {
            match tail[1..].find(['{', '}']) {
                Some(end) if tail.as_bytes()[end + 1] == b'}' => {
                    let field = &tail[1..end + 1];
                    match resolve(field, vars) {
                        Some(value) => out.push_str(&value.display()),
                        None => out.push_str(&tail[..end + 2]),
                    }
                    rest = &tail[end + 2..];
                }
                _ => {
                    out.push('{');
                    rest = &tail[1..];
                }
            }
        }
    }
    out.push_str(rest);
    out
}

/// Resolve `name.attr[key]…`, ignoring any `!conversion` or `:spec` suffix.
fn resolve(field: &str, vars: &Vars) -> Option<Value> {
    let field = field.split([':', '!']).next().unwrap_or(field).trim();
    let name_end = field.find(['.', '[']).unwrap_or(field.len());
    let mut value = vars.get(&field[..name_end])?.clone();
    let mut path = &field[name_end..];

    while !path.is_empty() {
        if let Some(after) = path.strip_prefix('.') {
            let end = after.find(['.', '[']).unwrap_or(after.len());
            value = value.get(&after[..end])?;
            path = &after[end..];
        } else if let Some(after) = path.strip_prefix('[') {
            let end = after.find(']')?;
            value = value.get(after[..end].trim_matches(['"', '\'']))?;
            path = &after[end + 1..];
        } else {
            return None;
        }
    }
    Some(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars() -> Vars {
        let mut user = BTreeMap::new();
        user.insert("first_name".to_string(), Value::str("Alice"));
        user.insert("id".to_string(), Value::str("@alice"));

        let mut vars = Vars::new();
        vars.insert(
            "user".into(),
            Value::Object {
                display: "Alice (@alice)".into(),
                fields: user,
            },
        );
        vars.insert("kik_group_id".into(), Value::str("rpg"));
        vars.insert("args".into(), Value::List(vec!["eins".into(), "zwei".into()]));
        vars
    }

    #[test]
    fn test_render_fields_and_indexes() {
        let vars = vars();
        assert_eq!(
            render("Hallo {user[first_name]} aus #{kik_group_id}!", &vars),
            "Hallo Alice aus #rpg!"
        );
        assert_eq!(render("{user.id} / {user}", &vars), "@alice / Alice (@alice)");
        assert_eq!(render("{args[1]} {args}", &vars), "zwei [eins, zwei]");
        assert_eq!(render("{kik_group_id:>10}", &vars), "rpg");
    }

    #[test]
    fn test_render_escapes_and_unknowns() {
        let vars = vars();
        assert_eq!(render("{{user}} {unknown} {user[nope]}", &vars), "{user} {unknown} {user[nope]}");
        assert_eq!(render("offen { und } zu", &vars), "offen { und } zu");
        assert_eq!(render("Ende {", &vars), "Ende {");
    }
}
