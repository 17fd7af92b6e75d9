//! URL building utilities for the handball4all endpoints

use chrono::NaiveDate;
use reqwest::Url;

use crate::error::FetchError;

const SERVICE_PATH: &str = "service/if_g_json.php";

fn service_url(api_domain: &str, params: &[(&str, &str)]) -> Result<String, FetchError> {
    let raw = format!("{}/{SERVICE_PATH}", api_domain.trim_end_matches('/'));
    Url::parse_with_params(&raw, params)
        .map(String::from)
        .map_err(|e| FetchError::InvalidUrl {
            url: raw,
            message: e.to_string(),
        })
}

/// Builds the organization URL used for class and current-week discovery.
///
/// # Example
/// ```
/// use hvw_cache::data_fetcher::api::build_index_url;
///
/// let url = build_index_url("https://api.example.com/", "3").unwrap();
/// assert_eq!(url, "https://api.example.com/service/if_g_json.php?cmd=po&og=3");
/// ```
pub fn build_index_url(api_domain: &str, organization_id: &str) -> Result<String, FetchError> {
    service_url(api_domain, &[("cmd", "po"), ("og", organization_id)])
}

/// Builds the class page URL. Without a week the source answers with its
/// current round. Query values are percent-encoded.
///
/// # Example
/// ```
/// use chrono::NaiveDate;
/// use hvw_cache::data_fetcher::api::build_class_url;
///
/// let url = build_class_url("https://api.example.com", "12345", None).unwrap();
/// assert_eq!(url, "https://api.example.com/service/if_g_json.php?cmd=ps&cl=12345");
///
/// let week = NaiveDate::from_ymd_opt(2024, 9, 16);
/// let url = build_class_url("https://api.example.com", "12345", week).unwrap();
/// assert_eq!(
///     url,
///     "https://api.example.com/service/if_g_json.php?cmd=ps&cl=12345&do=2024-09-16"
/// );
/// ```
pub fn build_class_url(
    api_domain: &str,
    class_id: &str,
    week: Option<NaiveDate>,
) -> Result<String, FetchError> {
    let date = week.map(|d| d.format("%Y-%m-%d").to_string());
    let mut params = vec![("cmd", "ps"), ("cl", class_id)];
    if let Some(date) = &date {
        params.push(("do", date.as_str()));
    }
    service_url(api_domain, &params)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_id_is_encoded() {
        let url = build_class_url("https://api.example.com", "12&cmd=po x", None).unwrap();
        assert_eq!(
            url,
            "https://api.example.com/service/if_g_json.php?cmd=ps&cl=12%26cmd%3Dpo+x"
        );
        let parsed = Url::parse(&url).unwrap();
        let class = parsed.query_pairs().find(|(k, _)| k == "cl").unwrap().1;
        assert_eq!(class, "12&cmd=po x");
    }

    #[test]
    fn test_invalid_domain_is_rejected() {
        assert!(matches!(
            build_index_url("not a domain", "3"),
            Err(FetchError::InvalidUrl { .. })
        ));
    }
}
