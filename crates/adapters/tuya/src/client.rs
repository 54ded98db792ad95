//! Signed request client.
//!
//! Wraps every call with signing, token management and retries:
//!
//! - HTTP 401, or an envelope carrying code 1010, invalidates the token and
//!   retries once with a fresh one. A second rejection is final.
//! - HTTP 429 is retried with the rate-limit policy, honoring `Retry-After`.
//! - Connection failures and timeouts are retried with the transient
//!   policy, as are 502/503/504 when enabled.
//!
//! No lock is held while sleeping between attempts. Once the client's
//! cancellation token fires, no further attempt starts and a pending
//! backoff sleep ends early with [`TuyaError::Cancelled`].

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{CONTENT_TYPE, HeaderMap, RETRY_AFTER};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::config::TuyaConfig;
use crate::error::TuyaError;
use crate::retry::RetryPolicy;
use crate::signing::{self, SIGN_METHOD, Signer};
use crate::token::{AccessToken, TokenError, TokenManager, TokenSource};
use crate::wire::{Envelope, TOKEN_INVALID_CODE, TokenResult};

pub const TOKEN_PATH: &str = "/v1.0/token";

/// One OpenAPI call, before signing.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    body: Option<Value>,
}

impl ApiRequest {
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    #[must_use]
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    #[must_use]
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    #[must_use]
    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    #[must_use]
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    #[must_use]
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Add a query pair only when `value` is present.
    #[must_use]
    pub fn query_opt(self, key: impl Into<String>, value: Option<impl Into<String>>) -> Self {
        match value {
            Some(value) => self.query(key, value),
            None => self,
        }
    }

    #[must_use]
    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// `METHOD /path`, used to label logs and errors.
    #[must_use]
    pub fn operation(&self) -> String {
        format!("{} {}", self.method, self.path)
    }

    fn body_bytes(&self) -> String {
        self.body.as_ref().map(Value::to_string).unwrap_or_default()
    }
}

/// Signs and sends a single HTTP request; no retries.
#[derive(Debug)]
struct Transport {
    http: reqwest::Client,
    base_url: String,
    signer: Signer,
}

impl Transport {
    async fn send(
        &self,
        request: &ApiRequest,
        access_token: Option<&str>,
    ) -> Result<reqwest::Response, reqwest::Error> {
        let path_and_query = signing::path_and_query(&request.path, &request.query);
        let body = request.body_bytes();
        let timestamp = chrono::Utc::now().timestamp_millis().to_string();
        let nonce = uuid::Uuid::new_v4().simple().to_string();
        let string_to_sign =
            signing::string_to_sign(request.method.as_str(), body.as_bytes(), &path_and_query);
        let sign = self
            .signer
            .sign(access_token, &timestamp, &nonce, &string_to_sign);

        let mut builder = self
            .http
            .request(request.method.clone(), format!("{}{path_and_query}", self.base_url))
            .header("client_id", self.signer.client_id())
            .header("sign", sign)
            .header("t", timestamp)
            .header("nonce", nonce)
            .header("sign_method", SIGN_METHOD)
            .header(CONTENT_TYPE, "application/json");
        if let Some(token) = access_token {
            builder = builder.header("access_token", token);
        }
        if !body.is_empty() {
            builder = builder.body(body);
        }
        builder.send().await
    }
}

/// Mints tokens from `GET /v1.0/token?grant_type=1`.
#[derive(Debug)]
pub struct TokenEndpoint {
    transport: Arc<Transport>,
}

impl TokenSource for TokenEndpoint {
    async fn fetch_token(&self) -> Result<AccessToken, TokenError> {
        let request = ApiRequest::get(TOKEN_PATH).query("grant_type", "1");
        let unreachable = |err: reqwest::Error| TokenError::Unreachable {
            message: err.to_string(),
        };
        let response = self
            .transport
            .send(&request, None)
            .await
            .map_err(unreachable)?;
        let status = response.status();
        let bytes = response.bytes().await.map_err(unreachable)?;
        if !status.is_success() {
            return Err(TokenError::Rejected {
                status: Some(status.as_u16()),
                code: None,
                message: String::from_utf8_lossy(&bytes).into_owned(),
            });
        }
        let rejected = |code: Option<i64>, message: String| TokenError::Rejected {
            status: Some(status.as_u16()),
            code,
            message,
        };
        let envelope: Envelope = serde_json::from_slice(&bytes)
            .map_err(|err| rejected(None, format!("malformed token response: {err}")))?;
        if !envelope.success {
            return Err(rejected(envelope.code, envelope.msg.unwrap_or_default()));
        }
        let result: TokenResult = envelope
            .result
            .ok_or_else(|| rejected(None, "token response has no result".to_string()))
            .and_then(|value| {
                serde_json::from_value(value)
                    .map_err(|err| rejected(None, format!("malformed token result: {err}")))
            })?;
        Ok(AccessToken::new(
            result.access_token,
            Duration::from_secs(result.expire_time),
        ))
    }
}

/// What to do after one attempt.
enum Attempt {
    Done(Value),
    Unauthorized { status: Option<u16>, message: String },
    RateLimited { retry_after: Option<Duration> },
    ServerError { status: StatusCode, message: String },
}

/// Authenticated, retrying client for the Tuya OpenAPI.
pub struct SignedRequestClient {
    transport: Arc<Transport>,
    tokens: TokenManager<TokenEndpoint>,
    rate_limit: RetryPolicy,
    transient: RetryPolicy,
    retry_on_server_error: bool,
    cancel: CancellationToken,
}

impl SignedRequestClient {
    /// # Errors
    ///
    /// Returns [`TuyaError::Config`] for invalid settings, or
    /// [`TuyaError::Client`] if the HTTP client cannot be built.
    pub fn new(config: &TuyaConfig) -> Result<Self, TuyaError> {
        config.validate()?;
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(TuyaError::Client)?;
        let transport = Arc::new(Transport {
            http,
            base_url: config.normalized_base_url().to_string(),
            signer: Signer::new(&config.credentials())?,
        });
        let tokens = TokenManager::new(
            TokenEndpoint {
                transport: Arc::clone(&transport),
            },
            config.token_margin(),
        );
        Ok(Self {
            transport,
            tokens,
            rate_limit: config.rate_limit.policy(),
            transient: config.transient.policy(),
            retry_on_server_error: config.retry_on_server_error,
            cancel: CancellationToken::new(),
        })
    }

    /// Stop retrying once `cancel` fires.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Wait `delay` before the next attempt, unless cancelled first.
    async fn pause(&self, operation: &str, attempts: u32, delay: Duration) -> Result<(), TuyaError> {
        tokio::select! {
            () = self.cancel.cancelled() => {
                tracing::info!(%operation, attempts, "retry cancelled");
                Err(TuyaError::Cancelled {
                    operation: operation.to_string(),
                    attempts,
                })
            }
            () = tokio::time::sleep(delay) => Ok(()),
        }
    }

    /// Send `request` and decode the envelope's `result` into `T`.
    ///
    /// A missing `result` decodes as JSON `null`.
    ///
    /// # Errors
    ///
    /// Returns a [`TuyaError`] naming the operation and the number of
    /// attempts once retries are exhausted or the failure is final.
    pub async fn call<T: DeserializeOwned>(&self, request: &ApiRequest) -> Result<T, TuyaError> {
        let operation = request.operation();
        let mut attempts = 0_u32;
        let mut refreshed = false;
        let mut rate_limit = self.rate_limit.backoff();
        let mut transient = self.transient.backoff();

        loop {
            if self.cancel.is_cancelled() {
                return Err(TuyaError::Cancelled {
                    operation,
                    attempts,
                });
            }
            attempts += 1;
            let token = self
                .tokens
                .acquire()
                .await
                .map_err(|err| TuyaError::from_token(&operation, attempts, err))?;

            let outcome = match self.transport.send(request, Some(token.as_str())).await {
                Ok(response) => self.classify(&operation, attempts, response).await?,
                Err(source) if is_transient(&source) => {
                    if let Some(delay) = transient.record_failure(None) {
                        tracing::warn!(%operation, attempts, ?delay, error = %source, "transient failure, retrying");
                        self.pause(&operation, attempts, delay).await?;
                        continue;
                    }
                    return Err(TuyaError::Network {
                        operation,
                        attempts,
                        source,
                    });
                }
                Err(source) => {
                    return Err(TuyaError::Network {
                        operation,
                        attempts,
                        source,
                    });
                }
            };

            match outcome {
                Attempt::Done(result) => {
                    tracing::debug!(%operation, attempts, "request succeeded");
                    return serde_json::from_value(result)
                        .map_err(|err| TuyaError::decode(&operation, err));
                }
                Attempt::Unauthorized { status, message } => {
                    if refreshed {
                        return Err(TuyaError::Unauthorized {
                            operation,
                            status,
                            attempts,
                            message,
                        });
                    }
                    refreshed = true;
                    tracing::warn!(%operation, ?status, "access token rejected, refreshing");
                    self.tokens.invalidate(&token).await;
                }
                Attempt::RateLimited { retry_after } => {
                    let Some(delay) = rate_limit.record_failure(retry_after) else {
                        return Err(TuyaError::RateLimited {
                            operation,
                            attempts,
                        });
                    };
                    tracing::warn!(%operation, attempts, ?delay, "rate limited, backing off");
                    self.pause(&operation, attempts, delay).await?;
                }
                Attempt::ServerError { status, message } => {
                    let Some(delay) = transient.record_failure(None) else {
                        return Err(TuyaError::Rejected {
                            operation,
                            status: status.as_u16(),
                            vendor_code: None,
                            attempts,
                            message,
                        });
                    };
                    tracing::warn!(%operation, %status, attempts, ?delay, "server error, retrying");
                    self.pause(&operation, attempts, delay).await?;
                }
            }
        }
    }

    async fn classify(
        &self,
        operation: &str,
        attempts: u32,
        response: reqwest::Response,
    ) -> Result<Attempt, TuyaError> {
        let status = response.status();
        let retry_after = retry_after(response.headers());
        let bytes = response
            .bytes()
            .await
            .map_err(|source| TuyaError::Network {
                operation: operation.to_string(),
                attempts,
                source,
            })?;
        let text = || String::from_utf8_lossy(&bytes).into_owned();

        if status == StatusCode::UNAUTHORIZED {
            return Ok(Attempt::Unauthorized {
                status: Some(status.as_u16()),
                message: text(),
            });
        }
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Ok(Attempt::RateLimited { retry_after });
        }
        if self.retry_on_server_error
            && matches!(
                status,
                StatusCode::BAD_GATEWAY
                    | StatusCode::SERVICE_UNAVAILABLE
                    | StatusCode::GATEWAY_TIMEOUT
            )
        {
            return Ok(Attempt::ServerError {
                status,
                message: text(),
            });
        }
        if !status.is_success() {
            return Err(TuyaError::Rejected {
                operation: operation.to_string(),
                status: status.as_u16(),
                vendor_code: None,
                attempts,
                message: text(),
            });
        }

        let envelope: Envelope =
            serde_json::from_slice(&bytes).map_err(|err| TuyaError::decode(operation, err))?;
        if envelope.success {
            return Ok(Attempt::Done(envelope.result.unwrap_or(Value::Null)));
        }
        if envelope.code == Some(TOKEN_INVALID_CODE) {
            return Ok(Attempt::Unauthorized {
                status: None,
                message: envelope.msg.unwrap_or_default(),
            });
        }
        Err(TuyaError::Rejected {
            operation: operation.to_string(),
            status: status.as_u16(),
            vendor_code: envelope.code,
            attempts,
            message: envelope.msg.unwrap_or_default(),
        })
    }
}

fn is_transient(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}

/// `Retry-After` in delta-seconds; HTTP dates are ignored.
fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}
