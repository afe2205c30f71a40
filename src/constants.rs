// Shared tracking constants and configuration defaults

/// Degrees of freedom of the gating statistic (one per measurement field)
pub const MEASUREMENT_DOF: f64 = 4.0;

/// Default validation gate: chi-square 4 dof quantile at 0.99
pub const DEFAULT_GATE_THRESHOLD: f64 = 13.277;

/// Default pool sizing hint; the pool grows past it when needed
pub const DEFAULT_POOL_CAPACITY: usize = 100;

/// Default predict/publish rate (Hz)
pub const DEFAULT_TICK_FREQUENCY: f64 = 20.0;

/// Track age (s) before it is reported as confirmed
pub const DEFAULT_CONFIRMATION_AGE: f64 = 0.5;

/// Time (s) without an accepted detection before a track is dropped
pub const DEFAULT_STALENESS_TIMEOUT: f64 = 1.0;

// --- Process noise ---

/// Radial acceleration noise (m/s^2)
pub const DEFAULT_ACCEL_NOISE: f64 = 2.0;
/// Azimuth random-walk noise (deg/sqrt(s))
pub const DEFAULT_AZIMUTH_NOISE: f64 = 2.0;
/// Elevation random-walk noise (deg/sqrt(s))
pub const DEFAULT_ELEVATION_NOISE: f64 = 1.0;

// --- Measurement noise (1 sigma) ---

pub const DEFAULT_RANGE_SIGMA: f64 = 0.25;
pub const DEFAULT_SPEED_SIGMA: f64 = 0.25;
pub const DEFAULT_AZIMUTH_SIGMA: f64 = 1.0;
pub const DEFAULT_ELEVATION_SIGMA: f64 = 1.0;

/// Initial track uncertainty as a multiple of the measurement sigma
pub const DEFAULT_INITIAL_SIGMA_SCALE: f64 = 2.0;
