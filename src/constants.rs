//! Application-wide constants
//!
//! Magic numbers and string literals shared across the board, poller and
//! editor surface live here.

/// Canvas geometry constants
pub mod geometry {
    /// Smallest width or height (in pixels) a resize may produce
    pub const MIN_ELEMENT_SIZE_PX: f64 = 40.0;

    /// Percentage space spans 0..=100 on both axes
    pub const PERCENT_SPAN: f64 = 100.0;
}

/// Check polling constants
pub mod polling {
    /// Default interval between two state polls of one widget
    pub const DEFAULT_INTERVAL_SECS: u64 = 30;

    /// Default upper bound for a single state fetch
    pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 10;

    pub const MIN_INTERVAL_SECS: u64 = 5;
    pub const MAX_INTERVAL_SECS: u64 = 3600;
}

/// Dashboard document defaults
pub mod dashboard {
    /// Location of the bundled alert sounds on the server
    pub const DEFAULT_SOUND_DIR: &str = "/dashboards-data";

    /// Rect applied to an element switched to the ticker kind
    pub const TICKER_Y: f64 = 82.84371327849588;
    pub const TICKER_H: f64 = 16.0;

    /// Aspect ratio used when the dashboard has no background dimensions
    pub const DEFAULT_ASPECT: f32 = 16.0 / 9.0;
}

/// Configuration file location
pub mod config {
    pub const APP_DIR: &str = "wallboard";
    pub const FILENAME: &str = "config.json";
    pub const DEFAULT_SERVER_URL: &str = "http://localhost:8585";

    /// Bounds for the editor window size
    pub const MIN_WINDOW_DIMENSION: u16 = 200;
    pub const MAX_WINDOW_DIMENSION: u16 = 8192;
}
