//! Shared exponential pn-junction helpers.

/// Default thermal voltage kT/q at room temperature (V).
pub const DEFAULT_THERMAL_VOLTAGE: f64 = 0.02585;

/// Largest argument handed to `exp`. Beyond it the exponential continues as a
/// straight line with the slope it had at the bound, so values stay finite and
/// the derivative stays exact.
pub(crate) const EXP_ARG_LIMIT: f64 = 80.0;

/// `exp(x) - 1` and `d/dx exp(x)` with the argument bounded by [`EXP_ARG_LIMIT`].
pub(crate) fn limited_exp_m1(x: f64) -> (f64, f64) {
    if x > EXP_ARG_LIMIT {
        let e = EXP_ARG_LIMIT.exp();
        (e * (1.0 + (x - EXP_ARG_LIMIT)) - 1.0, e)
    } else {
        (x.exp_m1(), x.exp())
    }
}

/// Voltage above which the junction current curvature makes plain Newton
/// steps overshoot: `vt * ln(vt / (sqrt(2) * is))`.
pub(crate) fn critical_voltage(saturation_current: f64, vt: f64) -> f64 {
    vt * (vt / (std::f64::consts::SQRT_2 * saturation_current)).ln()
}

/// SPICE `pnjlim`: limit a proposed junction voltage `v_new` given the value
/// `v_old` the device was last linearized at.
pub(crate) fn pn_junction_limit(v_new: f64, v_old: f64, vt: f64, v_crit: f64) -> f64 {
    if v_new > v_crit && (v_new - v_old).abs() > 2.0 * vt {
        if v_old > 0.0 {
            let arg = 1.0 + (v_new - v_old) / vt;
            if arg > 0.0 {
                v_old + vt * arg.ln()
            } else {
                v_crit
            }
        } else {
            vt * (v_new / vt).ln()
        }
    } else {
        v_new
    }
}

/// Fraction of the update `v_old -> v_new` of a junction voltage that keeps it
/// within the `pnjlim` bound.
pub(crate) fn junction_step_fraction(v_old: f64, v_new: f64, vt: f64, v_crit: f64) -> f64 {
    let limited = pn_junction_limit(v_new, v_old, vt, v_crit);
    let delta = v_new - v_old;
    if limited == v_new || delta == 0.0 {
        return 1.0;
    }
    let fraction = (limited - v_old) / delta;
    if fraction.is_finite() && fraction > 0.0 {
        fraction.min(1.0)
    } else {
        1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_limited_exp_is_continuous_at_the_bound() {
        let below = limited_exp_m1(EXP_ARG_LIMIT - 1e-9);
        let above = limited_exp_m1(EXP_ARG_LIMIT + 1e-9);
        let rel = (above.0 - below.0).abs() / below.0;
        assert!(rel < 1e-8, "jump of {rel}");
        assert!(limited_exp_m1(1e6).0.is_finite());
        assert_eq!(limited_exp_m1(0.0), (0.0, 1.0));
    }

    #[test]
    fn test_critical_voltage_for_small_signal_transistor() {
        let v_crit = critical_voltage(1e-12, DEFAULT_THERMAL_VOLTAGE);
        assert!((v_crit - 0.6109).abs() < 1e-3, "v_crit = {v_crit}");
    }

    #[rstest]
    #[case(0.0, 5.0)]
    #[case(0.5, 3.0)]
    #[case(0.65, 0.9)]
    #[case(-1.0, 2.0)]
    fn test_large_forward_steps_are_shortened(#[case] v_old: f64, #[case] v_new: f64) {
        let vt = DEFAULT_THERMAL_VOLTAGE;
        let v_crit = critical_voltage(1e-12, vt);
        let fraction = junction_step_fraction(v_old, v_new, vt, v_crit);
        assert!(fraction > 0.0 && fraction < 1.0, "fraction = {fraction}");
        let limited = v_old + fraction * (v_new - v_old);
        assert!(limited < v_new);
    }

    #[rstest]
    #[case(0.0, 0.3)]
    #[case(0.7, 0.2)]
    #[case(0.6, 0.62)]
    fn test_small_or_reverse_steps_pass(#[case] v_old: f64, #[case] v_new: f64) {
        let vt = DEFAULT_THERMAL_VOLTAGE;
        let v_crit = critical_voltage(1e-12, vt);
        assert_eq!(junction_step_fraction(v_old, v_new, vt, v_crit), 1.0);
    }
}
