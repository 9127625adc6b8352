//! Deep links into the client and the startup parameters they carry.

use reqwest::Url;
use tracing::warn;

pub const CARD_PARAM: &str = "card";
pub const CONNECT_PARAM: &str = "connect";

/// Parameters read once when the client starts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryParams {
    /// Pre-fills the manual recipient field.
    pub connect: Option<String>,
    /// Opens a shared card directly.
    pub card: Option<String>,
}

impl EntryParams {
    /// Split `location` into its entry parameters and the address to show
    /// afterwards, with `connect` stripped. `card` stays until the shared
    /// card is closed. An unparsable location carries no parameters.
    pub fn parse(location: &str) -> (Self, String) {
        let mut url = match Url::parse(location) {
            Ok(url) => url,
            Err(e) => {
                warn!("Ignoring unparsable entry location '{}': {}", location, e);
                return (Self::default(), location.to_string());
            }
        };
        let mut params = Self::default();
        let mut kept = Vec::new();

        for (name, value) in url.query_pairs() {
            let name = name.into_owned();
            let value = value.trim().to_string();
            match name.as_str() {
                CONNECT_PARAM if !value.is_empty() => params.connect = Some(value),
                CONNECT_PARAM => {}
                CARD_PARAM if !value.is_empty() => {
                    params.card = Some(value.clone());
                    kept.push((name.clone(), value));
                }
                _ => kept.push((name.clone(), value)),
            }
        }

        if kept.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut().clear().extend_pairs(kept);
        }
        (params, url.to_string())
    }
}

/// Drop the `card` parameter once the shared card is dismissed.
pub fn strip_card_param(location: &str) -> String {
    let Ok(mut url) = Url::parse(location) else {
        return location.to_string();
    };
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(name, _)| *name != CARD_PARAM)
        .map(|(n, v)| (n.into_owned(), v.into_owned()))
        .collect();
    if kept.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(kept);
    }
    url.to_string()
}

/// `<origin>/?card=<id>`
pub fn card_link(origin: &str, card_id: &str) -> String {
    link(origin, CARD_PARAM, card_id)
}

/// `<origin>/?connect=<id>`
pub fn connect_link(origin: &str, account_id: &str) -> String {
    link(origin, CONNECT_PARAM, account_id)
}

fn link(origin: &str, name: &str, value: &str) -> String {
    match Url::parse(origin) {
        Ok(mut url) => {
            url.set_path("/");
            url.set_query(None);
            url.query_pairs_mut().append_pair(name, value);
            url.to_string()
        }
        // Not a URL we can edit; build it by hand.
        Err(_) => format!("{}/?{}={}", origin.trim_end_matches('/'), name, value),
    }
}
