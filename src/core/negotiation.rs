//! Response content-type selection.

use super::mime;

/// Pick the response content type for a request.
///
/// `preferences` are the client's accepted types, most preferred first.
/// `allowed` are the types the action can produce. The first preference that is
/// a wildcard marker selects `allowed[0]`; the first one literally present in
/// `allowed` selects itself; a `type/*` range selects the first allowed type
/// with that top-level type. `None` means the request is not acceptable.
pub fn negotiate<P, A>(preferences: &[P], allowed: &[A]) -> Option<String>
where
    P: AsRef<str>,
    A: AsRef<str>,
{
    let first_allowed = allowed.first()?;

    for preference in preferences {
        let preference = preference.as_ref().trim();

        if mime::is_wildcard(preference) {
            return Some(first_allowed.as_ref().to_string());
        }

        if let Some(found) = allowed.iter().find(|a| a.as_ref() == preference) {
            return Some(found.as_ref().to_string());
        }

        if let Some(top_level) = preference.strip_suffix("/*") {
            let in_range = allowed.iter().find(|a| {
                a.as_ref()
                    .split_once('/')
                    .is_some_and(|(kind, _)| kind.eq_ignore_ascii_case(top_level))
            });
            if let Some(found) = in_range {
                return Some(found.as_ref().to_string());
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wildcard_falls_back_to_first_allowed() {
        assert_eq!(
            negotiate(&["application/xml", "*/*"], &["application/json"]),
            Some("application/json".to_string())
        );
        assert_eq!(
            negotiate(&["*"], &["text/html", "application/json"]),
            Some("text/html".to_string())
        );
    }

    #[test]
    fn test_client_order_wins_over_allowed_order() {
        assert_eq!(
            negotiate(
                &["application/xml", "application/json"],
                &["application/json", "application/xml"]
            ),
            Some("application/xml".to_string())
        );
    }

    #[test]
    fn test_media_range() {
        assert_eq!(
            negotiate(&["text/*"], &["application/json", "text/csv", "text/html"]),
            Some("text/csv".to_string())
        );
        assert_eq!(negotiate(&["image/*"], &["application/json"]), None);
    }

    #[test]
    fn test_not_acceptable() {
        assert_eq!(negotiate(&["application/xml"], &["application/json"]), None);
        assert_eq!(negotiate::<&str, &str>(&[], &["application/json"]), None);
        assert_eq!(negotiate::<&str, &str>(&["*/*"], &[]), None);
    }
}
