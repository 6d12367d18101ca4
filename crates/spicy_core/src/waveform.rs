use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

/// Time dependence of an independent source value (volts or amps).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Waveform {
    Constant(f64),
    Sinusoidal {
        offset: f64,
        amplitude: f64,
        /// Hz
        frequency: f64,
        /// seconds before the sine starts
        delay: f64,
        /// exponential damping factor (1/s)
        damping: f64,
        /// degrees
        phase: f64,
    },
    Pulse {
        initial: f64,
        pulsed: f64,
        delay: f64,
        rise_time: f64,
        fall_time: f64,
        width: f64,
        /// Non-positive means a single pulse.
        period: f64,
    },
}

impl Waveform {
    pub fn sine(offset: f64, amplitude: f64, frequency: f64) -> Self {
        Waveform::Sinusoidal {
            offset,
            amplitude,
            frequency,
            delay: 0.0,
            damping: 0.0,
            phase: 0.0,
        }
    }

    /// Value at time `t`. DC analyses evaluate at the analysis time as well.
    pub fn value(&self, t: f64) -> f64 {
        match *self {
            Waveform::Constant(value) => value,
            Waveform::Sinusoidal {
                offset,
                amplitude,
                frequency,
                delay,
                damping,
                phase,
            } => {
                let phase = phase.to_radians();
                if t < delay {
                    return offset + amplitude * phase.sin();
                }
                let elapsed = t - delay;
                let angle = (2.0 * PI * frequency * elapsed + phase).rem_euclid(2.0 * PI);
                offset + amplitude * (-elapsed * damping).exp() * angle.sin()
            }
            Waveform::Pulse {
                initial,
                pulsed,
                delay,
                rise_time,
                fall_time,
                width,
                period,
            } => {
                if t < delay {
                    return initial;
                }
                let s = if period > 0.0 {
                    (t - delay).rem_euclid(period)
                } else {
                    t - delay
                };
                let dv = pulsed - initial;

                if s < rise_time {
                    initial + dv * (s / rise_time)
                } else if s < rise_time + width {
                    pulsed
                } else if s < rise_time + width + fall_time {
                    pulsed - dv * ((s - rise_time - width) / fall_time)
                } else {
                    initial
                }
            }
        }
    }
}

impl From<f64> for Waveform {
    fn from(value: f64) -> Self {
        Waveform::Constant(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn pulse() -> Waveform {
        Waveform::Pulse {
            initial: 0.0,
            pulsed: 5.0,
            delay: 1.0,
            rise_time: 1.0,
            fall_time: 2.0,
            width: 2.0,
            period: 10.0,
        }
    }

    #[rstest]
    #[case(0.5, 0.0)]
    #[case(1.5, 2.5)]
    #[case(3.0, 5.0)]
    #[case(5.0, 2.5)]
    #[case(7.0, 0.0)]
    #[case(11.5, 2.5)]
    fn test_pulse_shape(#[case] t: f64, #[case] expected: f64) {
        assert!((pulse().value(t) - expected).abs() < 1e-12);
    }

    #[test]
    fn test_sine_quarter_period() {
        let w = Waveform::sine(1.0, 2.0, 50.0);
        assert!((w.value(0.0) - 1.0).abs() < 1e-12);
        assert!((w.value(0.005) - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_rise_time_jumps_straight_to_pulsed_value() {
        let w = Waveform::Pulse {
            initial: 1.0,
            pulsed: 2.0,
            delay: 0.0,
            rise_time: 0.0,
            fall_time: 0.0,
            width: 1.0,
            period: 0.0,
        };
        assert_eq!(w.value(0.0), 2.0);
        assert_eq!(w.value(1.5), 1.0);
    }
}
