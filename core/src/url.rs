//! Path template expansion.
//!
//! Templates use `{name}` placeholders, `{{` and `}}` for literal braces.
//! Substituted values are interpolated as-is; callers must hand in URL-safe
//! values.

use std::fmt::Display;

use crate::error::ApiError;

/// Base URL of the v2 backend API.
pub const DEFAULT_BASE_URL: &str = "https://api.sigfox.com/v2";

/// Named template arguments, looked up by placeholder name.
pub type UrlArgs<'a> = [(&'a str, &'a dyn Display)];

/// Expand `template` with `args` and prefix it with `base`.
///
/// Every placeholder must have a matching argument. Arguments that no
/// placeholder refers to are ignored.
pub fn build_url(base: &str, template: &str, args: &UrlArgs<'_>) -> Result<String, ApiError> {
    let mut url = String::with_capacity(base.len() + template.len());
    url.push_str(base);

    let malformed = |reason| ApiError::MalformedTemplate {
        template: template.to_string(),
        reason,
    };

    let mut rest = template;
    while let Some(pos) = rest.find(['{', '}']) {
        url.push_str(&rest[..pos]);
        let tail = &rest[pos..];

        if let Some(after) = tail.strip_prefix("{{") {
            url.push('{');
            rest = after;
        } else if let Some(after) = tail.strip_prefix("}}") {
            url.push('}');
            rest = after;
        } else if tail.starts_with('}') {
            return Err(malformed("unmatched `}`"));
        } else {
            let close = tail.find('}').ok_or_else(|| malformed("unclosed `{`"))?;
            let name = &tail[1..close];
            if name.contains('{') {
                return Err(malformed("nested `{` inside placeholder"));
            }
            let (_, value) = args
                .iter()
                .find(|(key, _)| *key == name)
                .ok_or_else(|| ApiError::MissingPlaceholder(name.to_string()))?;
            url.push_str(&value.to_string());
            rest = &tail[close + 1..];
        }
    }
    url.push_str(rest);

    Ok(url)
}
