use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use log::debug;
use serde_json::json;

use crate::error_codes::{CodedError, E_SCENE_PARSE, E_SCENE_READ};
use crate::schema::{Scene, SceneDocument};

pub fn load_and_validate_scene(path: &Path) -> Result<Scene> {
    let contents = fs::read_to_string(path).map_err(|error| {
        CodedError::io(
            E_SCENE_READ,
            format!("failed to read scene {}: {error}", path.display()),
        )
        .with_details(json!({ "path": path.display().to_string() }))
    })?;
    let scene = parse_scene(&contents, &path.display().to_string())
        .with_context(|| format!("invalid scene {}", path.display()))?;
    debug!(
        "loaded scene {} ({}x{}, primary {})",
        path.display(),
        scene.grid.cols(),
        scene.grid.rows(),
        scene.primary.kind.as_str()
    );
    Ok(scene)
}

/// Parses and sanitizes a scene from YAML text. `origin` names the source in messages.
pub fn parse_scene(contents: &str, origin: &str) -> Result<Scene> {
    let document: SceneDocument = serde_yaml::from_str(contents).map_err(|error| {
        let (location, details) = match error.location() {
            Some(location) => (
                format!("line {}, column {}", location.line(), location.column()),
                json!({ "line": location.line(), "column": location.column() }),
            ),
            None => ("unknown location".to_owned(), json!({})),
        };
        CodedError::config(
            E_SCENE_PARSE,
            format!("failed to parse yaml in {origin} at {location}: {error}"),
        )
        .with_details(details)
    })?;
    document.into_scene()
}
