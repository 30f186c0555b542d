//! Shared route helpers.

use serde::{Deserialize, Deserializer};

use crate::connection::path_component_check;
use crate::error::AppResult;
use crate::state::AppState;
use crate::store::Scope;

/// Resolve the `{project}/{environment}` path pair to a scope.
///
/// Both parts pass the path component check and must name an existing
/// project environment.
pub async fn require_scope(state: &AppState, project: &str, environment: &str) -> AppResult<Scope> {
    path_component_check("project", project)?;
    path_component_check("environment", environment)?;

    let scope = Scope::new(project, environment);
    state.projects().require_scope(&scope).await?;
    Ok(scope)
}

/// Lenient boolean query parameter: `true`, `1`, `yes`, or an empty value
/// (`?flag`) are true; anything else is false.
pub fn query_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(match raw.as_deref().map(str::trim) {
        None => false,
        Some(v) => matches!(v.to_ascii_lowercase().as_str(), "" | "true" | "1" | "yes"),
    })
}
