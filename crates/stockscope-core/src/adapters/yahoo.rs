use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serde::Deserialize;
use time::{Date, OffsetDateTime, Weekday};
use tracing::{debug, warn};

use crate::data_source::{DailyBarsRequest, DataSource, FetchError};
use crate::http_client::{HttpClient, HttpRequest, HttpResponse, NoopHttpClient};
use crate::throttling::RequestThrottle;
use crate::{PriceBar, ProviderId, Ticker};

pub const YAHOO_BASE_URL: &str = "https://query1.finance.yahoo.com";
const YAHOO_COOKIE_URL: &str = "https://fc.yahoo.com";
const YAHOO_REFERER: &str = "https://finance.yahoo.com/";

/// Caches the crumb token Yahoo expects alongside its session cookie.
///
/// The cookie itself lives in the HTTP client's jar; fetching `fc.yahoo.com`
/// seeds it, after which `/v1/test/getcrumb` returns the crumb.
pub struct YahooAuthManager {
    crumb: Mutex<Option<(String, Instant)>>,
    ttl: Duration,
}

impl Default for YahooAuthManager {
    fn default() -> Self {
        Self {
            crumb: Mutex::new(None),
            ttl: Duration::from_secs(3600),
        }
    }
}

impl YahooAuthManager {
    fn cached(&self) -> Option<String> {
        let guard = self.crumb.lock().ok()?;
        let (crumb, fetched_at) = guard.as_ref()?;
        (fetched_at.elapsed() < self.ttl).then(|| crumb.clone())
    }

    /// Current crumb, refreshed from upstream when missing or expired.
    pub async fn crumb(&self, http: &dyn HttpClient, base_url: &str) -> Result<String, FetchError> {
        if let Some(crumb) = self.cached() {
            return Ok(crumb);
        }

        let seed = HttpRequest::get(YAHOO_COOKIE_URL)
            .with_header("referer", YAHOO_REFERER)
            .with_timeout_ms(10_000);
        // fc.yahoo.com answers 404 while still setting the cookie.
        http.execute(seed)
            .await
            .map_err(|error| FetchError::network(format!("yahoo cookie request failed: {error}")))?;

        let request = HttpRequest::get(format!("{base_url}/v1/test/getcrumb"))
            .with_header("referer", YAHOO_REFERER)
            .with_timeout_ms(10_000);
        let response = http
            .execute(request)
            .await
            .map_err(|error| FetchError::network(format!("yahoo crumb request failed: {error}")))?;

        if response.status == 429 {
            return Err(FetchError::rate_limited("yahoo rate limited the crumb request"));
        }
        let body = response.body.trim();
        let looks_like_crumb = !body.is_empty()
            && body.len() <= 100
            && !body.contains(' ')
            && !body.contains('<');
        if !response.is_success() || !looks_like_crumb {
            return Err(FetchError::network(format!(
                "yahoo crumb endpoint returned status {}",
                response.status
            )));
        }

        let crumb = body.to_string();
        if let Ok(mut guard) = self.crumb.lock() {
            *guard = Some((crumb.clone(), Instant::now()));
        }
        Ok(crumb)
    }

    pub fn invalidate(&self) {
        if let Ok(mut guard) = self.crumb.lock() {
            *guard = None;
        }
    }
}

/// Yahoo Finance chart adapter.
///
/// Built on a mock transport (the default) it synthesizes deterministic
/// weekday bars instead of calling upstream, which backs the CLI's `--mock`
/// mode and offline tests.
#[derive(Clone)]
pub struct YahooAdapter {
    http_client: Arc<dyn HttpClient>,
    auth_manager: Arc<YahooAuthManager>,
    throttle: Option<RequestThrottle>,
    base_url: String,
    timeout_ms: u64,
    use_crumb: bool,
    use_real_api: bool,
}

impl Default for YahooAdapter {
    fn default() -> Self {
        Self {
            http_client: Arc::new(NoopHttpClient),
            auth_manager: Arc::new(YahooAuthManager::default()),
            throttle: None,
            base_url: YAHOO_BASE_URL.to_string(),
            timeout_ms: 10_000,
            use_crumb: true,
            use_real_api: false,
        }
    }
}

impl YahooAdapter {
    pub fn with_http_client(http_client: Arc<dyn HttpClient>) -> Self {
        let use_real_api = !http_client.is_mock();
        Self {
            http_client,
            use_real_api,
            ..Self::default()
        }
    }

    pub fn with_throttle(mut self, throttle: RequestThrottle) -> Self {
        self.throttle = Some(throttle);
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms.max(1);
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Skip the cookie/crumb handshake (the chart endpoint often works without it).
    pub fn without_crumb(mut self) -> Self {
        self.use_crumb = false;
        self
    }

    pub fn is_mock(&self) -> bool {
        !self.use_real_api
    }

    fn chart_url(&self, req: &DailyBarsRequest, crumb: Option<&str>) -> String {
        let period1 = unix_midnight(req.window.start);
        // period2 is exclusive upstream.
        let period2 = req
            .window
            .end
            .next_day()
            .map_or_else(|| unix_midnight(req.window.end) + 86_400, unix_midnight);

        let mut url = format!(
            "{}/v8/finance/chart/{}?period1={period1}&period2={period2}&interval=1d&events=history",
            self.base_url,
            urlencoding::encode(req.ticker.as_str()),
        );
        if let Some(crumb) = crumb {
            url.push_str("&crumb=");
            url.push_str(&urlencoding::encode(crumb));
        }
        url
    }

    async fn crumb(&self) -> Option<String> {
        if !self.use_crumb {
            return None;
        }
        match self
            .auth_manager
            .crumb(self.http_client.as_ref(), &self.base_url)
            .await
        {
            Ok(crumb) => Some(crumb),
            Err(error) => {
                debug!(%error, "continuing without yahoo crumb");
                None
            }
        }
    }

    async fn send_chart_request(&self, url: String) -> Result<HttpResponse, FetchError> {
        if let Some(throttle) = &self.throttle {
            throttle.acquire().await;
        }

        let request = HttpRequest::get(url)
            .with_header("referer", YAHOO_REFERER)
            .with_timeout_ms(self.timeout_ms);
        self.http_client.execute(request).await.map_err(|error| {
            if error.timed_out() {
                FetchError::network(format!("yahoo request timed out: {}", error.message()))
            } else {
                FetchError::network(format!("yahoo transport error: {}", error.message()))
            }
        })
    }

    async fn fetch_real_bars(&self, req: &DailyBarsRequest) -> Result<Vec<PriceBar>, FetchError> {
        let crumb = self.crumb().await;
        let mut response = self
            .send_chart_request(self.chart_url(req, crumb.as_deref()))
            .await?;

        // A stale crumb shows up as 401; refresh it once and try again.
        if response.status == 401 && self.use_crumb {
            self.auth_manager.invalidate();
            let crumb = self.crumb().await;
            response = self
                .send_chart_request(self.chart_url(req, crumb.as_deref()))
                .await?;
        }

        parse_chart_response(&req.ticker, &response)
    }

    fn fake_bars(&self, req: &DailyBarsRequest) -> Vec<PriceBar> {
        let seed = ticker_seed(&req.ticker);
        let mut bars = Vec::new();
        let mut date = req.window.start;
        while date <= req.window.end {
            if !matches!(date.weekday(), Weekday::Saturday | Weekday::Sunday) {
                bars.push(synthetic_bar(&req.ticker, date, seed));
            }
            match date.next_day() {
                Some(next) => date = next,
                None => break,
            }
        }
        bars
    }
}

impl DataSource for YahooAdapter {
    fn id(&self) -> ProviderId {
        ProviderId::Yahoo
    }

    fn daily_bars<'a>(
        &'a self,
        req: DailyBarsRequest,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<PriceBar>, FetchError>> + Send + 'a>> {
        Box::pin(async move {
            if req.window.is_empty() {
                return Err(FetchError::invalid_request(format!(
                    "yahoo daily bars window {} is empty",
                    req.window
                )));
            }

            if self.use_real_api {
                self.fetch_real_bars(&req).await
            } else {
                Ok(self.fake_bars(&req))
            }
        })
    }
}

/// Map a chart API response to unvalidated bars; validation is the caller's job.
fn parse_chart_response(
    ticker: &Ticker,
    response: &HttpResponse,
) -> Result<Vec<PriceBar>, FetchError> {
    let parsed = serde_json::from_str::<YahooChartResponse>(&response.body);

    match response.status {
        200..=299 => {}
        404 => {
            return Err(FetchError::not_found(format!(
                "yahoo has no chart for '{ticker}'{}",
                chart_error_suffix(parsed.as_ref().ok())
            )))
        }
        429 => return Err(FetchError::rate_limited("yahoo returned status 429")),
        400 | 422 => {
            return Err(FetchError::invalid_request(format!(
                "yahoo rejected the chart request with status {}{}",
                response.status,
                chart_error_suffix(parsed.as_ref().ok())
            )))
        }
        status => {
            return Err(FetchError::network(format!("yahoo returned status {status}")));
        }
    }

    let chart = parsed
        .map_err(|error| FetchError::malformed(format!("failed to parse yahoo chart: {error}")))?
        .chart;

    if let Some(error) = chart.error {
        return Err(if error.code.eq_ignore_ascii_case("not found") {
            FetchError::not_found(format!("yahoo: {}", error.description))
        } else {
            FetchError::malformed(format!(
                "yahoo chart error {}: {}",
                error.code, error.description
            ))
        });
    }

    let Some(result) = chart.result.and_then(|results| results.into_iter().next()) else {
        return Ok(Vec::new());
    };
    let Some(timestamps) = result.timestamp else {
        return Ok(Vec::new());
    };
    let Some(quote) = result.indicators.quote.into_iter().next() else {
        return Ok(Vec::new());
    };

    let offset_secs = result.meta.and_then(|meta| meta.gmtoffset).unwrap_or(0);
    let mut bars = Vec::with_capacity(timestamps.len());
    for (index, ts) in timestamps.into_iter().enumerate() {
        let (Some(open), Some(high), Some(low), Some(close)) = (
            value_at(&quote.open, index),
            value_at(&quote.high, index),
            value_at(&quote.low, index),
            value_at(&quote.close, index),
        ) else {
            debug!(ticker = %ticker, index, "skipping yahoo row with missing prices");
            continue;
        };

        let local = OffsetDateTime::from_unix_timestamp(ts.saturating_add(offset_secs))
            .map_err(|error| {
                FetchError::malformed(format!("invalid yahoo timestamp {ts}: {error}"))
            })?;
        let volume = quote
            .volume
            .get(index)
            .copied()
            .flatten()
            .map_or(0, |volume| u64::try_from(volume).unwrap_or_default());

        bars.push(PriceBar {
            ticker: ticker.clone(),
            date: local.date(),
            open,
            high,
            low,
            close,
            volume,
        });
    }

    if bars.is_empty() && !quote.close.is_empty() {
        warn!(ticker = %ticker, "yahoo chart contained only incomplete rows");
    }

    Ok(bars)
}

fn value_at(values: &[Option<f64>], index: usize) -> Option<f64> {
    values.get(index).copied().flatten()
}

fn chart_error_suffix(parsed: Option<&YahooChartResponse>) -> String {
    parsed
        .and_then(|response| response.chart.error.as_ref())
        .map(|error| format!(": {}", error.description))
        .unwrap_or_default()
}

fn unix_midnight(date: Date) -> i64 {
    date.midnight().assume_utc().unix_timestamp()
}

fn ticker_seed(ticker: &Ticker) -> u64 {
    ticker
        .as_str()
        .bytes()
        .fold(0_u64, |acc, byte| acc.wrapping_mul(33).wrapping_add(u64::from(byte)))
}

fn synthetic_bar(ticker: &Ticker, date: Date, seed: u64) -> PriceBar {
    let day = date.to_julian_day();
    let phase = f64::from(day) / 17.0;
    let base = 60.0 + (seed % 140) as f64 + 12.0 * phase.sin() + 4.0 * (phase * 3.1).cos();
    let open = base;
    let close = base + 0.8 * (phase * 1.7).sin();
    let day_index = u64::try_from(day).unwrap_or_default();

    PriceBar {
        ticker: ticker.clone(),
        date,
        open,
        high: open.max(close) + 1.1,
        low: open.min(close) - 0.9,
        close,
        volume: 1_000_000 + seed.wrapping_add(day_index.wrapping_mul(7_919)) % 500_000,
    }
}

#[derive(Debug, Clone, Deserialize)]
struct YahooChartResponse {
    chart: YahooChart,
}

#[derive(Debug, Clone, Deserialize)]
struct YahooChart {
    #[serde(default)]
    result: Option<Vec<YahooChartResult>>,
    #[serde(default)]
    error: Option<YahooChartError>,
}

#[derive(Debug, Clone, Deserialize)]
struct YahooChartError {
    #[serde(default)]
    code: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Clone, Deserialize)]
struct YahooChartResult {
    #[serde(default)]
    meta: Option<YahooChartMeta>,
    #[serde(default)]
    timestamp: Option<Vec<i64>>,
    indicators: YahooChartIndicators,
}

#[derive(Debug, Clone, Deserialize)]
struct YahooChartMeta {
    #[serde(default)]
    gmtoffset: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
struct YahooChartIndicators {
    #[serde(default)]
    quote: Vec<YahooChartQuote>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct YahooChartQuote {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<i64>>,
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use time::macros::date;

    use super::*;
    use crate::data_source::FetchErrorKind;
    use crate::http_client::HttpError;
    use crate::DateWindow;

    const CHART: &str = r#"{"chart":{"result":[{"meta":{"symbol":"AAPL","gmtoffset":-18000},
        "timestamp":[1704205800,1704292200,1704378600],
        "indicators":{"quote":[{"open":[187.15,184.22,null],"high":[188.44,185.88,183.09],
        "low":[183.89,183.43,180.88],"close":[185.64,184.25,181.91],
        "volume":[82488700,58414500,71983600]}]}}],"error":null}}"#;

    /// Answers by URL substring; the last queued answer for a route repeats.
    #[derive(Default)]
    struct ScriptedHttpClient {
        routes: Mutex<Vec<(&'static str, VecDeque<Result<HttpResponse, HttpError>>)>>,
        seen: Mutex<Vec<String>>,
    }

    impl ScriptedHttpClient {
        fn route(
            self,
            pattern: &'static str,
            answers: Vec<Result<HttpResponse, HttpError>>,
        ) -> Self {
            self.routes
                .lock()
                .expect("routes")
                .push((pattern, answers.into_iter().collect()));
            self
        }

        fn seen(&self) -> Vec<String> {
            self.seen.lock().expect("seen").clone()
        }
    }

    impl HttpClient for ScriptedHttpClient {
        fn execute<'a>(
            &'a self,
            request: HttpRequest,
        ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>> {
            Box::pin(async move {
                self.seen.lock().expect("seen").push(request.url.clone());
                let mut routes = self.routes.lock().expect("routes");
                let answers = routes
                    .iter_mut()
                    .find(|(pattern, _)| request.url.contains(pattern))
                    .map(|(_, answers)| answers)
                    .expect("unscripted url");
                if answers.len() > 1 {
                    answers.pop_front().expect("answer")
                } else {
                    answers.front().cloned().expect("answer")
                }
            })
        }
    }

    fn request(start: Date, end: Date) -> DailyBarsRequest {
        DailyBarsRequest::new(Ticker::parse("AAPL").expect("ticker"), DateWindow::new(start, end))
    }

    fn adapter(client: ScriptedHttpClient) -> (Arc<ScriptedHttpClient>, YahooAdapter) {
        let client = Arc::new(client);
        let adapter =
            YahooAdapter::with_http_client(client.clone()).with_base_url("https://yahoo.test");
        (client, adapter)
    }

    fn crumb_routes(client: ScriptedHttpClient) -> ScriptedHttpClient {
        client
            .route("fc.yahoo.com", vec![Ok(HttpResponse::with_status(404, ""))])
            .route("/v1/test/getcrumb", vec![Ok(HttpResponse::ok_json("crumb42"))])
    }

    #[tokio::test]
    async fn parses_chart_into_exchange_local_dates() {
        let client = crumb_routes(ScriptedHttpClient::default())
            .route("/v8/finance/chart/", vec![Ok(HttpResponse::ok_json(CHART))]);
        let (client, adapter) = adapter(client);

        let bars = adapter
            .daily_bars(request(date!(2024 - 01 - 02), date!(2024 - 01 - 04)))
            .await
            .expect("bars");

        assert_eq!(bars.len(), 2, "row with null open is dropped");
        assert_eq!(bars[0].date, date!(2024 - 01 - 02));
        assert_eq!(bars[1].date, date!(2024 - 01 - 03));
        assert_eq!(bars[0].close, 185.64);
        assert_eq!(bars[1].volume, 58_414_500);

        let chart_url = client
            .seen()
            .into_iter()
            .find(|url| url.contains("/v8/finance/chart/AAPL"))
            .expect("chart request");
        assert!(chart_url.contains("period1=1704153600"));
        assert!(chart_url.contains("period2=1704412800"));
        assert!(chart_url.contains("interval=1d"));
        assert!(chart_url.contains("crumb=crumb42"));
    }

    #[tokio::test]
    async fn missing_timestamps_mean_no_trading() {
        let body = r#"{"chart":{"result":[{"meta":{"gmtoffset":-18000},
            "indicators":{"quote":[{}]}}],"error":null}}"#;
        let client = ScriptedHttpClient::default()
            .route("/v8/finance/chart/", vec![Ok(HttpResponse::ok_json(body))]);
        let (_client, adapter) = adapter(client);

        let bars = adapter
            .without_crumb()
            .daily_bars(request(date!(2024 - 01 - 06), date!(2024 - 01 - 07)))
            .await
            .expect("empty is fine");
        assert!(bars.is_empty());
    }

    #[tokio::test]
    async fn classifies_upstream_failures() {
        let cases = [
            (
                HttpResponse::with_status(
                    404,
                    r#"{"chart":{"result":null,"error":{"code":"Not Found",
                        "description":"No data found, symbol may be delisted"}}}"#,
                ),
                FetchErrorKind::NotFound,
            ),
            (HttpResponse::with_status(429, "Too Many Requests"), FetchErrorKind::RateLimited),
            (HttpResponse::with_status(503, ""), FetchErrorKind::Network),
            (HttpResponse::ok_json("<html>oops</html>"), FetchErrorKind::Malformed),
        ];

        for (response, expected) in cases {
            let client =
                ScriptedHttpClient::default().route("/v8/finance/chart/", vec![Ok(response)]);
            let (_client, adapter) = adapter(client);
            let error = adapter
                .without_crumb()
                .daily_bars(request(date!(2024 - 01 - 02), date!(2024 - 01 - 02)))
                .await
                .expect_err("must fail");
            assert_eq!(error.kind(), expected, "{error}");
        }
    }

    #[tokio::test]
    async fn transport_errors_are_retryable_network_failures() {
        let client = ScriptedHttpClient::default()
            .route("/v8/finance/chart/", vec![Err(HttpError::timeout("deadline elapsed"))]);
        let (_client, adapter) = adapter(client);

        let error = adapter
            .without_crumb()
            .daily_bars(request(date!(2024 - 01 - 02), date!(2024 - 01 - 02)))
            .await
            .expect_err("must fail");
        assert_eq!(error.kind(), FetchErrorKind::Network);
        assert!(error.retryable());
    }

    #[tokio::test]
    async fn unauthorized_refreshes_crumb_once() {
        let client = crumb_routes(ScriptedHttpClient::default()).route(
            "/v8/finance/chart/",
            vec![
                Ok(HttpResponse::with_status(401, "Unauthorized")),
                Ok(HttpResponse::ok_json(CHART)),
            ],
        );
        let (client, adapter) = adapter(client);

        let bars = adapter
            .daily_bars(request(date!(2024 - 01 - 02), date!(2024 - 01 - 04)))
            .await
            .expect("bars after refresh");
        assert_eq!(bars.len(), 2);

        let seen = client.seen();
        assert_eq!(seen.iter().filter(|url| url.contains("getcrumb")).count(), 2);
        assert_eq!(seen.iter().filter(|url| url.contains("/v8/finance/chart/")).count(), 2);
    }

    #[tokio::test]
    async fn rejects_empty_window_without_calling_upstream() {
        let (client, adapter) = adapter(ScriptedHttpClient::default());
        let error = adapter
            .daily_bars(request(date!(2024 - 01 - 05), date!(2024 - 01 - 04)))
            .await
            .expect_err("must fail");

        assert_eq!(error.kind(), FetchErrorKind::InvalidRequest);
        assert!(client.seen().is_empty());
    }

    #[tokio::test]
    async fn mock_mode_synthesizes_valid_weekday_bars() {
        let adapter = YahooAdapter::default();
        assert!(adapter.is_mock());

        let bars = adapter
            .daily_bars(request(date!(2024 - 01 - 01), date!(2024 - 01 - 14)))
            .await
            .expect("fake bars");

        assert_eq!(bars.len(), 10);
        assert!(bars.iter().all(|bar| bar.validate().is_ok()));
        assert!(bars
            .iter()
            .all(|bar| !matches!(bar.date.weekday(), Weekday::Saturday | Weekday::Sunday)));

        let again = adapter
            .daily_bars(request(date!(2024 - 01 - 01), date!(2024 - 01 - 14)))
            .await
            .expect("fake bars");
        assert_eq!(bars, again);
    }
}
