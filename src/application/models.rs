// Noise and process models driving the synthetic telemetry feed

/// One draw from N(mean, std_dev^2) via the Box-Muller transform.
pub fn gaussian_noise(mean: f64, std_dev: f64) -> f64 {
    // First uniform draw must stay in (0, 1]: ln(0) is undefined.
    let u1: f64 = 1.0 - rand::random::<f64>();
    let u2: f64 = rand::random::<f64>();
    let z0 = (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos();
    z0 * std_dev + mean
}

/// 3S LiPo pack discharging linearly over a fixed cycle, wrapping around
/// so a long-running session keeps producing plausible values.
#[derive(Debug, Clone)]
pub struct BatteryModel {
    pub max_voltage: f64,
    pub min_voltage: f64,
    anchor_ms: i64,
    discharge_cycle_ms: i64,
}

impl BatteryModel {
    pub fn new(now_ms: i64) -> Self {
        Self {
            max_voltage: 12.6,
            min_voltage: 9.0,
            anchor_ms: now_ms,
            discharge_cycle_ms: 300_000,
        }
    }

    /// Jitter-free discharge curve, monotone non-increasing within a cycle.
    pub fn base_voltage(&self, now_ms: i64) -> f64 {
        let elapsed = (now_ms - self.anchor_ms).rem_euclid(self.discharge_cycle_ms);
        let progress = elapsed as f64 / self.discharge_cycle_ms as f64;
        self.max_voltage - (self.max_voltage - self.min_voltage) * progress
    }

    pub fn voltage(&self, now_ms: i64) -> f64 {
        (self.base_voltage(now_ms) + gaussian_noise(0.0, 0.05)).max(self.min_voltage)
    }

    /// Re-anchor the discharge curve, as if the pack were swapped for a
    /// freshly charged one.
    pub fn recharge(&mut self, now_ms: i64) {
        self.anchor_ms = now_ms;
    }

    /// Instant the current discharge cycle started, epoch milliseconds.
    pub fn anchor_ms(&self) -> i64 {
        self.anchor_ms
    }
}

/// Component temperature: ambient base plus a load-driven term with a slow
/// sinusoidal wobble standing in for duty-cycle variation.
#[derive(Debug, Clone)]
pub struct ThermalModel {
    pub base_temp: f64,
    pub max_temp: f64,
    load: f64,
}

impl ThermalModel {
    pub fn new() -> Self {
        Self {
            base_temp: 35.0,
            max_temp: 65.0,
            load: 0.5,
        }
    }

    pub fn temperature(&self, now_ms: i64) -> f64 {
        let wobble = (now_ms as f64 / 5000.0).sin() * 0.3;
        let load_component = self.load + wobble;
        self.base_temp + (self.max_temp - self.base_temp) * load_component + gaussian_noise(0.0, 1.5)
    }

    pub fn set_load(&mut self, load: f64) {
        self.load = load.clamp(0.0, 1.0);
    }

    pub fn load(&self) -> f64 {
        self.load
    }
}

impl Default for ThermalModel {
    fn default() -> Self {
        Self::new()
    }
}

/// Drive motor with first-order lag toward a target RPM.
#[derive(Debug, Clone)]
pub struct MotorModel {
    target_rpm: f64,
    current_rpm: f64,
    pub max_rpm: f64,
    smoothing: f64,
}

impl MotorModel {
    pub fn new() -> Self {
        Self {
            target_rpm: 1500.0,
            current_rpm: 0.0,
            max_rpm: 3000.0,
            smoothing: 0.1,
        }
    }

    /// Advance one tick and return the measured (noisy) RPM.
    pub fn update(&mut self) -> f64 {
        self.current_rpm += (self.target_rpm - self.current_rpm) * self.smoothing;
        (self.current_rpm + gaussian_noise(0.0, 50.0)).max(0.0)
    }

    pub fn set_target_rpm(&mut self, rpm: f64) {
        self.target_rpm = rpm.clamp(0.0, self.max_rpm);
    }

    pub fn target_rpm(&self) -> f64 {
        self.target_rpm
    }

    /// Sweep the target along a shared sinusoid so charts have shape even
    /// with nobody at the controls.
    pub fn auto_vary(&mut self, now_ms: i64) {
        self.target_rpm = 1500.0 + (now_ms as f64 / 3000.0).sin() * 500.0;
    }
}

impl Default for MotorModel {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gaussian_noise_sample_statistics() {
        const N: usize = 10_000;
        let draws: Vec<f64> = (0..N).map(|_| gaussian_noise(0.0, 1.0)).collect();
        let mean = draws.iter().sum::<f64>() / N as f64;
        let variance = draws.iter().map(|d| (d - mean).powi(2)).sum::<f64>() / N as f64;
        assert!(mean.abs() < 0.05, "sample mean {} too far from 0", mean);
        let std_dev = variance.sqrt();
        assert!(
            (std_dev - 1.0).abs() < 0.05,
            "sample std dev {} too far from 1",
            std_dev
        );
    }

    #[test]
    fn test_battery_base_voltage_monotone_within_cycle() {
        let battery = BatteryModel::new(0);
        let mut previous = battery.base_voltage(0);
        assert!((previous - battery.max_voltage).abs() < 1e-9);
        for now_ms in (1000..300_000).step_by(1000) {
            let voltage = battery.base_voltage(now_ms);
            assert!(voltage <= previous, "discharge curve went up at {}ms", now_ms);
            assert!(voltage >= battery.min_voltage);
            previous = voltage;
        }
        // Wraps back to a full pack on the next cycle.
        assert!((battery.base_voltage(300_000) - battery.max_voltage).abs() < 1e-9);
    }

    #[test]
    fn test_battery_voltage_never_below_minimum() {
        let battery = BatteryModel::new(0);
        for now_ms in (0..600_000).step_by(7_000) {
            assert!(battery.voltage(now_ms) >= battery.min_voltage);
        }
    }

    #[test]
    fn test_battery_recharge_reanchors() {
        let mut battery = BatteryModel::new(0);
        let drained = battery.base_voltage(150_000);
        assert!(drained < battery.max_voltage);
        battery.recharge(150_000);
        assert!((battery.base_voltage(150_000) - battery.max_voltage).abs() < 1e-9);
    }

    #[test]
    fn test_thermal_load_clamped() {
        let mut thermal = ThermalModel::new();
        thermal.set_load(1.7);
        assert_eq!(thermal.load(), 1.0);
        thermal.set_load(-0.3);
        assert_eq!(thermal.load(), 0.0);
    }

    #[test]
    fn test_motor_target_clamped_and_smoothed() {
        let mut motor = MotorModel::new();
        motor.set_target_rpm(9000.0);
        assert_eq!(motor.target_rpm(), 3000.0);
        motor.set_target_rpm(-50.0);
        assert_eq!(motor.target_rpm(), 0.0);

        motor.set_target_rpm(2000.0);
        // The lag closes most of the gap within a few dozen ticks; measured
        // RPM is noisy so check against a generous band.
        let mut measured = 0.0;
        for _ in 0..60 {
            measured = motor.update();
        }
        assert!((measured - 2000.0).abs() < 300.0);
    }

    #[test]
    fn test_motor_update_never_negative() {
        let mut motor = MotorModel::new();
        motor.set_target_rpm(0.0);
        for _ in 0..200 {
            assert!(motor.update() >= 0.0);
        }
    }
}
