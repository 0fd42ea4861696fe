//! Storage and cache key derivation.
//!
//! Every key embeds the scope length before the scope itself, so the mapping
//! from (scope, name) to key stays injective even for inputs containing the
//! `/` delimiter. Name validation is still the caller's job: keys are also
//! used as filesystem paths by some blob store backends.

const CONTENT_PREFIX: &str = "lambda/script/";
const ENV_PREFIX: &str = "lambda/env/";
const ENV_SUFFIX: &str = ".json";

fn scoped(scope: &str, name: &str) -> String {
    format!("{}/{scope}/{name}", scope.len())
}

/// Key of the compiled handler cache entry.
pub fn cache_key(scope: &str, name: &str) -> String {
    scoped(scope, name)
}

/// Blob key of the script source.
pub fn content_key(scope: &str, name: &str) -> String {
    format!("{CONTENT_PREFIX}{}", scoped(scope, name))
}

/// Blob key of the script environment object.
pub fn env_key(scope: &str, name: &str) -> String {
    format!("{ENV_PREFIX}{}{ENV_SUFFIX}", scoped(scope, name))
}

/// Prefix under which all content blobs live.
pub fn content_prefix() -> &'static str {
    CONTENT_PREFIX
}

/// Recover (scope, name) from a content key.
pub fn parse_content_key(key: &str) -> Option<(String, String)> {
    let rest = key.strip_prefix(CONTENT_PREFIX)?;
    let (len, rest) = rest.split_once('/')?;
    let len: usize = len.parse().ok()?;
    if rest.len() <= len || !rest.is_char_boundary(len) {
        return None;
    }
    let (scope, name) = rest.split_at(len);
    let name = name.strip_prefix('/')?;
    Some((scope.to_string(), name.to_string()))
}
