use std::time::Duration;

/// The default endpoint for the Yandex geocoder HTTP API
pub const DEFAULT_GEOCODER_URL: &str = "https://geocode-maps.yandex.ru/1.x";

/// Response format requested from the geocoder
pub const GEOCODER_RESPONSE_FORMAT: &str = "json";

/// Query parameter names understood by the geocoder
pub const GEOCODE_PARAM: &str = "geocode";
pub const API_KEY_PARAM: &str = "apikey";
pub const FORMAT_PARAM: &str = "format";

/// Upper bound on a single geocoder request made by the default HTTP client
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Default location of the persistent address point database
pub const DEFAULT_ADDRESS_DB_PATH: &str = "address_points.redb";
