//! Monthly exchange rates published by the Central Bank of Russia.

use crate::core::config::CbrProviderConfig;
use crate::core::{MonthlyRateProvider, MonthlyRateSet, PipelineError, YearMonth};
use crate::providers::util::with_retry;
use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, instrument, warn};

pub struct CbrRateProvider {
    base_url: String,
    client: reqwest::Client,
    retries: usize,
    retry_delay: Duration,
}

impl CbrRateProvider {
    pub fn new(base_url: &str) -> Result<Self> {
        let defaults = CbrProviderConfig::default();
        let client = reqwest::Client::builder()
            .user_agent("vacnorm/0.1")
            .build()?;
        Ok(CbrRateProvider {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            retries: defaults.retries,
            retry_delay: Duration::from_millis(defaults.retry_delay_ms),
        })
    }

    pub fn from_config(config: &CbrProviderConfig) -> Result<Self> {
        Ok(Self::new(&config.base_url)?
            .with_retry_policy(config.retries, Duration::from_millis(config.retry_delay_ms)))
    }

    pub fn with_retry_policy(mut self, retries: usize, retry_delay: Duration) -> Self {
        self.retries = retries;
        self.retry_delay = retry_delay;
        self
    }
}

#[derive(Debug, Deserialize)]
struct ValCurs {
    #[serde(rename = "Valute", default)]
    valutes: Vec<Valute>,
}

#[derive(Debug, Deserialize)]
struct Valute {
    #[serde(rename = "CharCode", default)]
    char_code: String,
    #[serde(rename = "Nominal", default)]
    nominal: String,
    #[serde(rename = "Value", default)]
    value: String,
}

/// Parses amounts such as `43,4220`; the source uses a decimal comma.
fn parse_amount(raw: &str) -> Option<f64> {
    raw.trim().replace(',', ".").parse::<f64>().ok()
}

fn parse_listing(year_month: YearMonth, body: &str) -> Result<MonthlyRateSet, PipelineError> {
    let key = year_month.to_string();
    if !body.contains("<ValCurs") {
        return Err(PipelineError::fetch(key, "response is not a currency listing"));
    }

    let listing: ValCurs = quick_xml::de::from_str(body)
        .map_err(|e| PipelineError::fetch(&key, format!("malformed listing: {e}")))?;

    let mut set = MonthlyRateSet::new(year_month);
    for valute in listing.valutes {
        let code = valute.char_code.trim();
        if code.is_empty() {
            return Err(PipelineError::fetch(key, "listing entry without a currency code"));
        }
        let nominal = parse_amount(&valute.nominal).ok_or_else(|| {
            PipelineError::fetch(
                &key,
                format!("invalid nominal '{}' for {code}", valute.nominal),
            )
        })?;
        let value = parse_amount(&valute.value).ok_or_else(|| {
            PipelineError::fetch(&key, format!("invalid value '{}' for {code}", valute.value))
        })?;
        if nominal == 0.0 {
            return Err(PipelineError::fetch(key, format!("zero nominal for {code}")));
        }
        set.rates.insert(code.to_string(), value / nominal);
    }

    if set.rates.is_empty() {
        warn!("Rate listing for {} has no currencies", key);
    }
    Ok(set)
}

#[async_trait]
impl MonthlyRateProvider for CbrRateProvider {
    #[instrument(
        name = "CbrRateFetch",
        skip(self),
        fields(month = %year_month)
    )]
    async fn fetch_month(&self, year_month: YearMonth) -> Result<MonthlyRateSet> {
        let url = format!(
            "{}/scripts/XML_daily.asp?date_req={}",
            self.base_url,
            year_month.request_date()
        );
        debug!("Requesting currency listing from {}", url);

        let response = with_retry(
            || self.client.get(&url).send(),
            self.retries,
            self.retry_delay,
        )
        .await
        .map_err(|e| PipelineError::fetch(year_month.to_string(), format!("{e:#}")))?;

        let body = response
            .text()
            .await
            .map_err(|e| PipelineError::fetch(year_month.to_string(), e))?;

        let set = parse_listing(year_month, &body)?;
        debug!("Parsed {} rates for {}", set.rates.len(), year_month);
        Ok(set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const LISTING: &str = r#"<?xml version="1.0" encoding="windows-1251"?>
<ValCurs Date="01.01.2020" name="Foreign Currency Market">
    <Valute ID="R01235">
        <NumCode>840</NumCode>
        <CharCode>USD</CharCode>
        <Nominal>1</Nominal>
        <Name>US Dollar</Name>
        <Value>61,9057</Value>
    </Valute>
    <Valute ID="R01335">
        <NumCode>398</NumCode>
        <CharCode>KZT</CharCode>
        <Nominal>100</Nominal>
        <Name>Tenge</Name>
        <Value>16,1760</Value>
    </Valute>
</ValCurs>"#;

    async fn create_mock_server(date_req: &str, status: u16, body: &str) -> MockServer {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/scripts/XML_daily.asp"))
            .and(query_param("date_req", date_req))
            .respond_with(ResponseTemplate::new(status).set_body_string(body))
            .mount(&mock_server)
            .await;
        mock_server
    }

    fn provider(mock_server: &MockServer) -> CbrRateProvider {
        CbrRateProvider::new(&mock_server.uri())
            .unwrap()
            .with_retry_policy(0, Duration::from_millis(1))
    }

    #[tokio::test]
    async fn test_successful_month_fetch() {
        let mock_server = create_mock_server("01/01/2020", 200, LISTING).await;
        let ym = YearMonth::new(2020, 1).unwrap();

        let set = provider(&mock_server).fetch_month(ym).await.unwrap();
        assert_eq!(set.key(), "2020-01");
        assert_eq!(set.rates.len(), 2);
        assert!((set.rates["USD"] - 61.9057).abs() < 1e-9);
        // value / nominal
        assert!((set.rates["KZT"] - 0.16176).abs() < 1e-9);
        assert!(!set.rates.contains_key("RUR"));
    }

    #[tokio::test]
    async fn test_server_error_is_fetch_error() {
        let mock_server = create_mock_server("01/02/2021", 500, "").await;
        let ym = YearMonth::new(2021, 2).unwrap();

        let err = provider(&mock_server).fetch_month(ym).await.unwrap_err();
        match err.downcast_ref::<PipelineError>() {
            Some(PipelineError::Fetch { year_month, reason }) => {
                assert_eq!(year_month, "2021-02");
                assert!(reason.contains("500"));
            }
            other => panic!("Expected a fetch error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_non_listing_body_is_fetch_error() {
        let mock_server = create_mock_server("01/03/2020", 200, "Service unavailable").await;
        let ym = YearMonth::new(2020, 3).unwrap();

        let err = provider(&mock_server).fetch_month(ym).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Failed to fetch rates for 2020-03: response is not a currency listing"
        );
    }

    #[test]
    fn test_unparseable_value_is_rejected() {
        let body = "<ValCurs><Valute><CharCode>USD</CharCode><Nominal>1</Nominal>\
                    <Value>n/a</Value></Valute></ValCurs>";
        let err = parse_listing(YearMonth::new(2020, 1).unwrap(), body).unwrap_err();
        assert!(err.to_string().contains("invalid value 'n/a' for USD"));
    }

    #[test]
    fn test_zero_nominal_is_rejected() {
        let body = "<ValCurs><Valute><CharCode>JPY</CharCode><Nominal>0</Nominal>\
                    <Value>55,1</Value></Valute></ValCurs>";
        let err = parse_listing(YearMonth::new(2020, 1).unwrap(), body).unwrap_err();
        assert!(err.to_string().contains("zero nominal for JPY"));
    }

    #[test]
    fn test_empty_listing_is_accepted() {
        let body = r#"<ValCurs Date="01.01.2030" name="Foreign Currency Market"></ValCurs>"#;
        let set = parse_listing(YearMonth::new(2030, 1).unwrap(), body).unwrap();
        assert!(set.rates.is_empty());
    }

    #[test]
    fn test_parse_amount_handles_decimal_comma() {
        assert_eq!(parse_amount("43,4220"), Some(43.422));
        assert_eq!(parse_amount(" 100 "), Some(100.0));
        assert_eq!(parse_amount(""), None);
    }
}
