//! Target match resolution
//!
//! Viewers are usually told which match to follow by their page URL. The
//! resolution order is: explicit argument, then the ambient value (for
//! example a query parameter), then [`DEFAULT_MATCH_ID`].

use super::MatchId;

/// Match followed when neither an explicit nor an ambient id is given
pub const DEFAULT_MATCH_ID: &str = "default";

/// Query keys that carry an ambient match id, in priority order
const QUERY_KEYS: [&str; 2] = ["matchId", "match"];

/// Resolve the target match id
///
/// Empty or whitespace-only inputs count as absent.
pub fn resolve_match_id(explicit: Option<&str>, ambient: Option<&str>) -> MatchId {
    explicit
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .or_else(|| ambient.map(str::trim).filter(|id| !id.is_empty()))
        .map(MatchId::from)
        .unwrap_or_else(|| MatchId::from(DEFAULT_MATCH_ID))
}

/// Extract the ambient match id from a URL query string
///
/// Accepts the query with or without its leading `?`. Values are taken
/// verbatim; `+` is not decoded.
pub fn match_id_from_query(query: &str) -> Option<String> {
    let query = query.strip_prefix('?').unwrap_or(query);

    QUERY_KEYS.iter().find_map(|wanted| {
        query
            .split('&')
            .filter_map(|pair| pair.split_once('='))
            .find(|(key, value)| key == wanted && !value.is_empty())
            .map(|(_, value)| value.to_string())
    })
}
