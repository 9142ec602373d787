use crate::certificate::CertificateTemplate;
use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use serde_json::{json, Map, Value};

#[derive(Clone, Copy)]
enum SetupSection {
    Certificate,
    Gradebook,
}

impl SetupSection {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "certificate" => Some(Self::Certificate),
            "gradebook" => Some(Self::Gradebook),
            _ => None,
        }
    }

    fn key(self) -> &'static str {
        match self {
            Self::Certificate => "setup.certificate",
            Self::Gradebook => "setup.gradebook",
        }
    }
}

fn default_section(section: SetupSection) -> Value {
    match section {
        SetupSection::Certificate => {
            let t = CertificateTemplate::default();
            json!({
                "title": t.title,
                "issuerName": t.issuer_name,
                "footerNote": t.footer_note
            })
        }
        SetupSection::Gradebook => json!({
            "defaultAssignmentMaxScore": 100,
            "defaultQuizPassingScore": 60,
            "defaultQuizTimeLimitSeconds": 600
        }),
    }
}

fn as_object_mut(value: &mut Value) -> Result<&mut Map<String, Value>, String> {
    value
        .as_object_mut()
        .ok_or_else(|| "internal setup object must be a JSON object".to_string())
}

fn parse_i64_range(v: &Value, key: &str, min: i64, max: i64) -> Result<i64, String> {
    let n = v
        .as_i64()
        .ok_or_else(|| format!("{} must be integer", key))?;
    if !(min..=max).contains(&n) {
        return Err(format!("{} must be in {}..={}", key, min, max));
    }
    Ok(n)
}

fn parse_string_max(v: &Value, key: &str, max_len: usize) -> Result<String, String> {
    let s = v.as_str().ok_or_else(|| format!("{} must be string", key))?;
    let s = s.trim();
    if s.chars().count() > max_len {
        return Err(format!("{} length must be <= {}", key, max_len));
    }
    Ok(s.to_string())
}

fn merge_section_patch(
    section: SetupSection,
    current: &mut Value,
    patch: &Map<String, Value>,
) -> Result<(), String> {
    let obj = as_object_mut(current)?;
    for (k, v) in patch {
        match section {
            SetupSection::Certificate => match k.as_str() {
                "title" | "issuerName" => {
                    let s = parse_string_max(v, k, 120)?;
                    if s.is_empty() {
                        return Err(format!("{} must not be empty", k));
                    }
                    obj.insert(k.clone(), Value::String(s));
                }
                "footerNote" => {
                    obj.insert(k.clone(), Value::String(parse_string_max(v, k, 400)?));
                }
                _ => return Err(format!("unknown certificate field: {}", k)),
            },
            SetupSection::Gradebook => match k.as_str() {
                "defaultAssignmentMaxScore" => {
                    obj.insert(k.clone(), Value::from(parse_i64_range(v, k, 1, 1000)?));
                }
                "defaultQuizPassingScore" => {
                    obj.insert(k.clone(), Value::from(parse_i64_range(v, k, 0, 100)?));
                }
                "defaultQuizTimeLimitSeconds" => {
                    obj.insert(k.clone(), Value::from(parse_i64_range(v, k, 30, 14400)?));
                }
                _ => return Err(format!("unknown gradebook field: {}", k)),
            },
        }
    }
    Ok(())
}

fn load_section(conn: &rusqlite::Connection, section: SetupSection) -> anyhow::Result<Value> {
    let mut current = default_section(section);
    if let Some(saved) = db::settings_get_json(conn, section.key())? {
        if let Some(saved_obj) = saved.as_object() {
            // Malformed saved values fall back to defaults field by field.
            for (k, v) in saved_obj {
                let mut one = Map::new();
                one.insert(k.clone(), v.clone());
                let _ = merge_section_patch(section, &mut current, &one);
            }
        }
    }
    Ok(current)
}

/// Defaults applied when creating assignments and quizzes without explicit values.
#[derive(Debug, Clone, Copy)]
pub struct GradebookDefaults {
    pub assignment_max_score: i64,
    pub quiz_passing_score: i64,
    pub quiz_time_limit_seconds: i64,
}

pub fn gradebook_defaults(conn: &rusqlite::Connection) -> anyhow::Result<GradebookDefaults> {
    let v = load_section(conn, SetupSection::Gradebook)?;
    let get = |k: &str, fallback: i64| v.get(k).and_then(|x| x.as_i64()).unwrap_or(fallback);
    Ok(GradebookDefaults {
        assignment_max_score: get("defaultAssignmentMaxScore", 100),
        quiz_passing_score: get("defaultQuizPassingScore", 60),
        quiz_time_limit_seconds: get("defaultQuizTimeLimitSeconds", 600),
    })
}

pub fn certificate_template(conn: &rusqlite::Connection) -> anyhow::Result<CertificateTemplate> {
    let v = load_section(conn, SetupSection::Certificate)?;
    let defaults = CertificateTemplate::default();
    let get = |k: &str, fallback: String| {
        v.get(k)
            .and_then(|x| x.as_str())
            .map(|s| s.to_string())
            .unwrap_or(fallback)
    };
    Ok(CertificateTemplate {
        title: get("title", defaults.title),
        issuer_name: get("issuerName", defaults.issuer_name),
        footer_note: get("footerNote", defaults.footer_note),
    })
}

fn handle_setup_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let certificate = match load_section(conn, SetupSection::Certificate) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let gradebook = match load_section(conn, SetupSection::Gradebook) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    ok(
        &req.id,
        json!({
            "certificate": certificate,
            "gradebook": gradebook
        }),
    )
}

fn handle_setup_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(section_raw) = req.params.get("section").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing section", None);
    };
    let Some(section) = SetupSection::parse(section_raw) else {
        return err(&req.id, "bad_params", "unknown section", None);
    };
    let Some(patch_obj) = req.params.get("patch").and_then(|v| v.as_object()) else {
        return err(&req.id, "bad_params", "patch must be an object", None);
    };

    let mut current = match load_section(conn, section) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    if let Err(msg) = merge_section_patch(section, &mut current, patch_obj) {
        return err(&req.id, "bad_params", msg, None);
    }
    if let Err(e) = db::settings_set_json(conn, section.key(), &current) {
        return err(&req.id, "db_update_failed", e.to_string(), None);
    }
    tracing::info!(section = section_raw, "setup updated");
    ok(&req.id, json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "setup.get" => Some(handle_setup_get(state, req)),
        "setup.update" => Some(handle_setup_update(state, req)),
        _ => None,
    }
}
