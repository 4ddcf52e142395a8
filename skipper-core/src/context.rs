//! Template contexts: dotted-path expansion and deep merging.
//!
//! Contexts are plain JSON objects so they convert directly into a
//! `tera::Context`. Every function here returns a new value; inputs are
//! never mutated.

use serde_json::{Map, Value};

use crate::error::RepoError;

/// A job's template context. Keys keep their file order.
pub type Context = Map<String, Value>;

/// Return a copy of `ctx` with `value` stored at `path`.
///
/// Intermediate mappings are created as needed; a scalar sitting where a
/// mapping is required is replaced.
pub fn set_path(ctx: &Context, path: &[&str], value: Value) -> Context {
    let mut out = ctx.clone();
    set_path_in_place(&mut out, path, value);
    out
}

fn set_path_in_place(ctx: &mut Context, path: &[&str], value: Value) {
    let Some((last, parents)) = path.split_last() else {
        return;
    };
    let mut cur = ctx;
    for key in parents {
        let slot = cur
            .entry((*key).to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !slot.is_object() {
            *slot = Value::Object(Map::new());
        }
        cur = match slot {
            Value::Object(map) => map,
            _ => unreachable!("slot was just made an object"),
        };
    }
    cur.insert((*last).to_string(), value);
}

/// Expand keys such as `"scm.branch"` into nested mappings, recursively.
///
/// Expanded entries are deep-merged into siblings, so `{"a": {"x": 1},
/// "a.y": 2}` becomes `{"a": {"x": 1, "y": 2}}`.
pub fn expand_dotted_keys(ctx: &Context) -> Context {
    let mut out = Context::new();
    for (key, value) in ctx {
        let value = match value {
            Value::Object(inner) => Value::Object(expand_dotted_keys(inner)),
            other => other.clone(),
        };
        let path: Vec<&str> = key.split('.').collect();
        let mut single = Context::new();
        set_path_in_place(&mut single, &path, value);
        out = deep_merge(&out, &single);
    }
    out
}

/// Deep-merge `overrides` into `base`, returning the merged mapping.
///
/// Nested mappings merge recursively; any other value in `overrides`
/// replaces the one in `base`.
pub fn deep_merge(base: &Context, overrides: &Context) -> Context {
    let mut out = base.clone();
    for (key, value) in overrides {
        let merged = match (out.get(key), value) {
            (Some(Value::Object(left)), Value::Object(right)) => {
                Value::Object(deep_merge(left, right))
            }
            _ => value.clone(),
        };
        out.insert(key.clone(), merged);
    }
    out
}

/// Parse command-line `VAR=VALUE` overrides into a nested context.
///
/// `VAR` may be a dotted path. Values are kept as strings.
pub fn parse_context_vars<S: AsRef<str>>(specs: &[S]) -> Result<Context, RepoError> {
    let mut ctx = Context::new();
    for spec in specs {
        let spec = spec.as_ref();
        let Some((path, value)) = spec.split_once('=') else {
            return Err(RepoError::MalformedContextVar {
                spec: spec.to_string(),
            });
        };
        let path: Vec<&str> = path.split('.').collect();
        set_path_in_place(&mut ctx, &path, Value::String(value.to_string()));
    }
    Ok(ctx)
}

/// Parse `NAME=VALUE` build parameters, keeping their order.
pub fn parse_build_parameters<S: AsRef<str>>(
    specs: &[S],
) -> Result<Vec<(String, String)>, RepoError> {
    specs
        .iter()
        .map(|spec| {
            let spec = spec.as_ref();
            spec.split_once('=')
                .map(|(name, value)| (name.to_string(), value.to_string()))
                .ok_or_else(|| RepoError::MalformedParameter {
                    spec: spec.to_string(),
                })
        })
        .collect()
}
