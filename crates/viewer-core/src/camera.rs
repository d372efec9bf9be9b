//! Camera orbit state and framing bounds.

use serde::{Deserialize, Serialize};

/// Tolerance used when comparing camera states.
pub const CAMERA_EPSILON: f64 = 1e-6;

/// Spherical camera placement around a target point.
///
/// Angles are in radians; radius and target are in meters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraState {
    /// Azimuth around the vertical axis.
    pub orbit_theta: f64,
    /// Polar angle from the vertical axis.
    pub orbit_phi: f64,
    /// Distance from the target.
    pub orbit_radius: f64,
    pub target_x: f64,
    pub target_y: f64,
    pub target_z: f64,
}

impl CameraState {
    /// Create an orbit from angles in degrees around the origin.
    pub fn from_degrees(theta_deg: f64, phi_deg: f64, radius: f64) -> Self {
        Self {
            orbit_theta: theta_deg.to_radians(),
            orbit_phi: phi_deg.to_radians(),
            orbit_radius: radius,
            target_x: 0.0,
            target_y: 0.0,
            target_z: 0.0,
        }
    }

    /// Set the orbit target.
    pub fn with_target(mut self, x: f64, y: f64, z: f64) -> Self {
        self.target_x = x;
        self.target_y = y;
        self.target_z = z;
        self
    }

    /// Azimuth in degrees.
    pub fn theta_degrees(&self) -> f64 {
        self.orbit_theta.to_degrees()
    }

    /// Polar angle in degrees.
    pub fn phi_degrees(&self) -> f64 {
        self.orbit_phi.to_degrees()
    }

    /// Compare orbit angles, radius and target within `epsilon`.
    pub fn approx_eq(&self, other: &CameraState, epsilon: f64) -> bool {
        (self.orbit_theta - other.orbit_theta).abs() <= epsilon
            && (self.orbit_phi - other.orbit_phi).abs() <= epsilon
            && (self.orbit_radius - other.orbit_radius).abs() <= epsilon
            && (self.target_x - other.target_x).abs() <= epsilon
            && (self.target_y - other.target_y).abs() <= epsilon
            && (self.target_z - other.target_z).abs() <= epsilon
    }
}

impl Default for CameraState {
    fn default() -> Self {
        Self::from_degrees(30.0, 75.0, 2.5)
    }
}

/// Per-viewer camera bounds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraFraming {
    pub min_orbit_radius: f64,
    pub max_orbit_radius: f64,
    /// Placement used when a render context is first created.
    pub initial_orbit: CameraState,
}

impl CameraFraming {
    /// Clamp the orbit radius into bounds; angles and target pass through.
    pub fn clamp(&self, state: CameraState) -> CameraState {
        CameraState {
            orbit_radius: state
                .orbit_radius
                .clamp(self.min_orbit_radius, self.max_orbit_radius),
            ..state
        }
    }

    /// The initial orbit, clamped into bounds.
    pub fn initial(&self) -> CameraState {
        self.clamp(self.initial_orbit)
    }
}

impl Default for CameraFraming {
    fn default() -> Self {
        Self {
            min_orbit_radius: 0.5,
            max_orbit_radius: 10.0,
            initial_orbit: CameraState::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_degrees_round_trip() {
        let cam = CameraState::from_degrees(30.0, 75.0, 2.5);
        assert!((cam.theta_degrees() - 30.0).abs() < CAMERA_EPSILON);
        assert!((cam.phi_degrees() - 75.0).abs() < CAMERA_EPSILON);
        assert_eq!(cam.orbit_radius, 2.5);
    }

    #[test]
    fn test_approx_eq_checks_target() {
        let a = CameraState::from_degrees(30.0, 75.0, 2.5);
        let b = a.with_target(0.0, 0.1, 0.0);
        assert!(a.approx_eq(&a, CAMERA_EPSILON));
        assert!(!a.approx_eq(&b, CAMERA_EPSILON));
    }

    #[test]
    fn test_framing_clamps_radius_only() {
        let framing = CameraFraming::default();
        let far = CameraState::from_degrees(10.0, 80.0, 50.0);
        let clamped = framing.clamp(far);
        assert_eq!(clamped.orbit_radius, 10.0);
        assert_eq!(clamped.orbit_theta, far.orbit_theta);

        let near = CameraState::from_degrees(10.0, 80.0, 0.1);
        assert_eq!(framing.clamp(near).orbit_radius, 0.5);
    }
}
