//! Remote endpoints of the state portal and the tracked source systems.

/// Session renewal endpoint; a 200 response extends the JWT session.
pub const DEFAULT_RENEW_URL: &str = "https://www.eesti.ee/timur/jwt/extend-jwt-session";

/// Data tracker usages endpoint, without query string.
pub const DEFAULT_TRACKER_BASE_URL: &str = "https://www.eesti.ee/andmejalgija/api/v1/usages";

/// Population register endpoint returning the signed-in person's details.
pub const DEFAULT_IDENTITY_URL: &str = "https://www.eesti.ee/api/xroad/v2/rr/kodanik/info";

/// Source systems whose data usages are polled.
pub const DATA_SYSTEM_CODES: [&str; 15] = [
    "digiregistratuur",
    "elamislubade_ja_toolubade_register",
    "kinnistusraamat",
    "kutseregister",
    "maksukohustuslaste_register",
    "infosusteem_polis",
    "politsei_taktikalise_juhtimise_andmekogu",
    "pollumajandusloomade_register",
    "pollumajandustoetuste_ja_pollumassiivide_register",
    "rahvastikuregister",
    "retseptikeskus",
    "sotsiaalkaitse_infosusteem",
    "sotsiaalteenuste_ja_toetuste_register",
    "tooinspektsiooni_tooelu_infosusteem",
    "tootuskindlustuse_andmekogu",
];

/// Full tracker URL with one `dataSystemCodes` parameter per source system.
pub fn tracker_url(base: &str) -> String {
    let query = DATA_SYSTEM_CODES
        .iter()
        .map(|code| format!("dataSystemCodes={code}"))
        .collect::<Vec<_>>()
        .join("&");
    let separator = if base.contains('?') { '&' } else { '?' };
    format!("{base}{separator}{query}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracker_url_lists_every_system() {
        let url = tracker_url(DEFAULT_TRACKER_BASE_URL);
        assert!(url
            .starts_with("https://www.eesti.ee/andmejalgija/api/v1/usages?dataSystemCodes="));
        assert_eq!(url.matches("dataSystemCodes=").count(), DATA_SYSTEM_CODES.len());
        assert!(url.ends_with("dataSystemCodes=tootuskindlustuse_andmekogu"));
    }

    #[test]
    fn tracker_url_appends_to_existing_query() {
        let url = tracker_url("http://localhost/usages?lang=et");
        assert!(url
            .starts_with("http://localhost/usages?lang=et&dataSystemCodes=digiregistratuur"));
    }
}
