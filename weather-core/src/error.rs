use thiserror::Error;

/// Failures of the weather pipeline. Every variant is surfaced as a value
/// (see [`crate::LoadState`]); none of them is fatal.
#[derive(Debug, Clone, Error)]
pub enum WeatherError {
    #[error("Device location is unavailable")]
    LocationUnavailable,

    #[error("No city found for the resolved location")]
    CityNotFound,

    #[error("Weather API error: {0}")]
    Api(#[from] ApiErrorKind),
}

/// Classification of transport and API failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiErrorKind {
    #[error("timeout")]
    Timeout,

    #[error("network-error")]
    NetworkUnreachable,

    #[error("{0}")]
    Generic(String),
}

impl ApiErrorKind {
    /// Human-readable classification shown to the user.
    pub fn message(&self) -> &str {
        match self {
            ApiErrorKind::Timeout => "timeout",
            ApiErrorKind::NetworkUnreachable => "network-error",
            ApiErrorKind::Generic(msg) => msg.as_str(),
        }
    }
}

impl From<reqwest::Error> for ApiErrorKind {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiErrorKind::Timeout
        } else if err.is_connect() {
            ApiErrorKind::NetworkUnreachable
        } else {
            ApiErrorKind::Generic(err.to_string())
        }
    }
}

impl From<reqwest::Error> for WeatherError {
    fn from(err: reqwest::Error) -> Self {
        WeatherError::Api(err.into())
    }
}

impl WeatherError {
    pub fn generic(msg: impl Into<String>) -> Self {
        WeatherError::Api(ApiErrorKind::Generic(msg.into()))
    }

    /// Short message for UI display.
    pub fn user_message(&self) -> String {
        match self {
            WeatherError::LocationUnavailable => {
                "Could not determine your location. Pass --lat/--lon or set [location] in the config."
                    .to_string()
            }
            WeatherError::CityNotFound => "Could not find a city for your location.".to_string(),
            WeatherError::Api(kind) => match kind {
                ApiErrorKind::Timeout => "The weather service timed out.".to_string(),
                ApiErrorKind::NetworkUnreachable => {
                    "Network error. Check your connection.".to_string()
                }
                ApiErrorKind::Generic(msg) => format!("Weather service error: {msg}"),
            },
        }
    }
}
