//! Projected-to-geographic coordinate conversion.
//!
//! Some datasets published by the metropolitan open data portal carry
//! Lambert-93 (EPSG:2154) easting/northing instead of WGS84 degrees.
//! This module inverts the Lambert Conformal Conic projection on the
//! GRS80 ellipsoid. The datum shift between RGF93 and WGS84 is below a
//! meter and is ignored.

use crate::geo::Coordinate;

/// Parameters of a two-standard-parallel Lambert Conformal Conic projection.
#[derive(Debug, Clone, Copy)]
pub struct LambertConic {
    pub semi_major_m: f64,
    pub inverse_flattening: f64,
    /// Standard parallels, degrees.
    pub lat_1: f64,
    pub lat_2: f64,
    /// Latitude and longitude of origin, degrees.
    pub lat_0: f64,
    pub lon_0: f64,
    pub false_easting: f64,
    pub false_northing: f64,
}

/// EPSG:2154, RGF93 / Lambert-93.
pub const LAMBERT_93: LambertConic = LambertConic {
    semi_major_m: 6_378_137.0,
    inverse_flattening: 298.257_222_101,
    lat_1: 44.0,
    lat_2: 49.0,
    lat_0: 46.5,
    lon_0: 3.0,
    false_easting: 700_000.0,
    false_northing: 6_600_000.0,
};

/// Iterations for the latitude fixed point; converges well below 1e-12 rad.
const LATITUDE_ITERATIONS: usize = 10;

impl LambertConic {
    fn eccentricity(&self) -> f64 {
        let f = 1.0 / self.inverse_flattening;
        (2.0 * f - f * f).sqrt()
    }

    fn m(&self, phi: f64, e: f64) -> f64 {
        phi.cos() / (1.0 - (e * phi.sin()).powi(2)).sqrt()
    }

    fn t(&self, phi: f64, e: f64) -> f64 {
        let es = e * phi.sin();
        (std::f64::consts::FRAC_PI_4 - phi / 2.0).tan() / ((1.0 - es) / (1.0 + es)).powf(e / 2.0)
    }

    /// Cone constant `n`, scaled radius `a·F` and origin radius `ρ0`.
    fn cone(&self) -> (f64, f64, f64) {
        let e = self.eccentricity();
        let phi1 = self.lat_1.to_radians();
        let phi2 = self.lat_2.to_radians();
        let phi0 = self.lat_0.to_radians();

        let n = (self.m(phi1, e).ln() - self.m(phi2, e).ln())
            / (self.t(phi1, e).ln() - self.t(phi2, e).ln());
        let af = self.semi_major_m * self.m(phi1, e) / (n * self.t(phi1, e).powf(n));
        let rho0 = af * self.t(phi0, e).powf(n);

        (n, af, rho0)
    }

    /// Projected meters to geographic degrees.
    pub fn inverse(&self, x: f64, y: f64) -> Coordinate {
        let e = self.eccentricity();
        let (n, af, rho0) = self.cone();

        let dx = x - self.false_easting;
        let dy = rho0 - (y - self.false_northing);
        let rho = n.signum() * (dx * dx + dy * dy).sqrt();
        let theta = (n.signum() * dx).atan2(n.signum() * dy);
        let t = (rho / af).powf(1.0 / n);

        let mut phi = std::f64::consts::FRAC_PI_2 - 2.0 * t.atan();
        for _ in 0..LATITUDE_ITERATIONS {
            let es = e * phi.sin();
            phi = std::f64::consts::FRAC_PI_2
                - 2.0 * (t * ((1.0 - es) / (1.0 + es)).powf(e / 2.0)).atan();
        }

        Coordinate {
            latitude: phi.to_degrees(),
            longitude: (theta / n).to_degrees() + self.lon_0,
        }
    }
}

/// Convert Lambert-93 easting/northing to WGS84.
pub fn lambert93_to_wgs84(x: f64, y: f64) -> Coordinate {
    LAMBERT_93.inverse(x, y)
}

/// Whether a pair looks like projected meters rather than degrees.
pub fn looks_projected(x: f64, y: f64) -> bool {
    x.abs() > 180.0 || y.abs() > 90.0
}
