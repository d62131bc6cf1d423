//! Dead-zone + fractional-step residual quantization
//!
//! The quantizer maps a signed temporal residual onto a small symbol
//! alphabet: magnitudes inside the dead zone `[-T, T]` collapse to zero,
//! and the remainder is divided by a fractional step `Q` carried in
//! fixed-point form (`q_fixed = round(Q * 2^fp_bits)`). All arithmetic is
//! unsigned 32-bit integer math so the encoder and decoder agree exactly
//! regardless of platform or endianness.
//!
//! Reconstruction is centered: a non-zero symbol decodes to
//! `sign * (|q| * Q + T/2)`, which halves the worst-case dead-zone bias.

use crate::error::{Error, Result};

/// Default dead-zone threshold in DN
pub const DEFAULT_DEAD_ZONE_T: u32 = 2;

/// Default quantization step
pub const DEFAULT_QUANT_Q: f64 = 2.0;

/// Default number of fractional fixed-point bits
pub const DEFAULT_FP_BITS: u32 = 8;

/// Maximum supported fractional bits
pub const MAX_FP_BITS: u32 = 16;

/// Quantization parameters with the derived fixed-point step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuantParams {
    /// Dead-zone threshold in DN; magnitudes `<= T` quantize to zero
    pub dead_zone_t: u32,
    /// Quantization step as configured
    pub quant_q: f64,
    /// Fractional bits of the fixed-point representation
    pub fp_bits: u32,
    /// `round(quant_q * 2^fp_bits)`, computed once at construction
    pub q_fixed: u32,
}

impl QuantParams {
    /// Build and validate parameters
    ///
    /// Fails with an invalid-configuration error when `quant_q <= 0`,
    /// `fp_bits > 16`, or the fixed-point step rounds to zero.
    pub fn new(dead_zone_t: u32, quant_q: f64, fp_bits: u32) -> Result<Self> {
        if !(quant_q > 0.0) {
            return Err(Error::invalid_config(format!(
                "quant_q must be > 0, got {}",
                quant_q
            )));
        }
        if fp_bits > MAX_FP_BITS {
            return Err(Error::invalid_config(format!(
                "fp_bits must be <= {}, got {}",
                MAX_FP_BITS, fp_bits
            )));
        }
        let q_fixed = (quant_q * f64::from(1u32 << fp_bits)).round() as u32;
        if q_fixed == 0 {
            return Err(Error::invalid_config(format!(
                "quant_q {} rounds to a zero fixed-point step at fp_bits {}",
                quant_q, fp_bits
            )));
        }
        Ok(QuantParams {
            dead_zone_t,
            quant_q,
            fp_bits,
            q_fixed,
        })
    }

    /// Step value recovered from the fixed-point representation
    pub fn effective_q(&self) -> f64 {
        f64::from(self.q_fixed) / f64::from(1u32 << self.fp_bits)
    }

    /// Nominal reconstruction error per sample for symbols outside the
    /// dead zone: `T/2 + Q/2`
    pub fn error_bound(&self) -> f64 {
        f64::from(self.dead_zone_t) / 2.0 + self.effective_q() / 2.0
    }
}

impl Default for QuantParams {
    fn default() -> Self {
        // Defaults are valid by construction
        QuantParams::new(DEFAULT_DEAD_ZONE_T, DEFAULT_QUANT_Q, DEFAULT_FP_BITS)
            .unwrap_or(QuantParams {
                dead_zone_t: DEFAULT_DEAD_ZONE_T,
                quant_q: DEFAULT_QUANT_Q,
                fp_bits: DEFAULT_FP_BITS,
                q_fixed: 512,
            })
    }
}

/// Quantize a signed residual into symbols
///
/// Per sample: `a2 = max(0, |R| - T)`, then
/// `|q| = (a2 * 2^b + 2^(b-1)) / q_fixed` (round-half-up via the added
/// half step), sign preserved.
///
/// # Panics
///
/// Panics when `out` is shorter than `residual`.
pub fn quantize(residual: &[i16], out: &mut [i16], params: &QuantParams) {
    assert!(out.len() >= residual.len());
    let t = params.dead_zone_t;
    let q_fixed = params.q_fixed;
    let fp_bits = params.fp_bits;
    let rounding = if fp_bits > 0 { 1u32 << (fp_bits - 1) } else { 0 };

    for (o, &r) in out.iter_mut().zip(residual.iter()) {
        let abs_r = i32::from(r).unsigned_abs();
        let a2 = abs_r.saturating_sub(t);
        let q_abs = ((a2 << fp_bits) + rounding) / q_fixed;
        let q = if r >= 0 {
            q_abs as i32
        } else {
            -(q_abs as i32)
        };
        // |q| stays inside i16 for any in-range residual; saturate the
        // pathological remainder rather than wrap
        *o = q.clamp(i32::from(i16::MIN), i32::from(i16::MAX)) as i16;
    }
}

/// Dequantize symbols back to a residual estimate
///
/// Zero symbols decode to zero; otherwise
/// `R_hat = sign * (((|q| * q_fixed) >> b) + T/2)`.
pub fn dequantize(quantized: &[i16], out: &mut [i16], params: &QuantParams) {
    assert!(out.len() >= quantized.len());
    let t_half = params.dead_zone_t / 2;
    let q_fixed = params.q_fixed;
    let fp_bits = params.fp_bits;

    for (o, &q) in out.iter_mut().zip(quantized.iter()) {
        if q == 0 {
            *o = 0;
            continue;
        }
        let abs_q = i32::from(q).unsigned_abs();
        let recon_abs = ((abs_q * q_fixed) >> fp_bits) + t_half;
        let r = if q >= 0 {
            recon_abs as i32
        } else {
            -(recon_abs as i32)
        };
        *o = r.clamp(i32::from(i16::MIN), i32::from(i16::MAX)) as i16;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(t: u32, q: f64, b: u32) -> QuantParams {
        QuantParams::new(t, q, b).unwrap()
    }

    #[test]
    fn test_params_validation() {
        assert!(QuantParams::new(2, 0.0, 8).is_err());
        assert!(QuantParams::new(2, -1.0, 8).is_err());
        assert!(QuantParams::new(2, 2.0, 17).is_err());
        assert!(QuantParams::new(2, 0.0001, 8).is_err()); // rounds to zero step

        let p = params(2, 2.0, 8);
        assert_eq!(p.q_fixed, 512);
        assert_eq!(p.effective_q(), 2.0);
    }

    #[test]
    fn test_dead_zone_collapses_to_zero() {
        let p = params(2, 2.0, 8);
        let residual = [0i16, 1, -1, 2, -2];
        let mut quantized = [0i16; 5];
        quantize(&residual, &mut quantized, &p);
        assert_eq!(quantized, [0; 5]);

        let mut decoded = [0i16; 5];
        dequantize(&quantized, &mut decoded, &p);
        assert_eq!(decoded, [0; 5]);
    }

    #[test]
    fn test_step_change_example() {
        // T=2, Q=2.0, b=8: residual +10 -> (10-2)/2 = 4; decodes to 4*2+1 = 9
        let p = params(2, 2.0, 8);
        let residual = [10i16, -10];
        let mut quantized = [0i16; 2];
        quantize(&residual, &mut quantized, &p);
        assert_eq!(quantized, [4, -4]);

        let mut decoded = [0i16; 2];
        dequantize(&quantized, &mut decoded, &p);
        assert_eq!(decoded, [9, -9]);
    }

    #[test]
    fn test_sign_preserved() {
        let p = params(0, 1.5, 8);
        let residual = [7i16, -7, 3, -3];
        let mut quantized = [0i16; 4];
        quantize(&residual, &mut quantized, &p);
        for (&r, &q) in residual.iter().zip(quantized.iter()) {
            assert_eq!(r.signum(), q.signum());
        }
    }

    #[test]
    fn test_fractional_step_rounding() {
        // Q=1.5 at b=8 -> q_fixed=384. |R|=3, T=0: (3*256+128)/384 = 896/384 = 2
        let p = params(0, 1.5, 8);
        let mut q = [0i16; 1];
        quantize(&[3], &mut q, &p);
        assert_eq!(q[0], 2);
        // decode: (2*384)>>8 = 3
        let mut d = [0i16; 1];
        dequantize(&q, &mut d, &p);
        assert_eq!(d[0], 3);
    }

    // Worst-case reconstruction error of the concrete fixed-point formulas:
    // magnitudes just past the dead zone can still collapse to a zero symbol
    // (numerator below q_fixed), costing up to T + a2_max; everything else
    // lands within half a step of centered reconstruction.
    fn worst_error(p: &QuantParams) -> f64 {
        let rounding = if p.fp_bits > 0 {
            1u32 << (p.fp_bits - 1)
        } else {
            0
        };
        let a2_max_zero = if p.q_fixed > rounding {
            f64::from((p.q_fixed - rounding - 1) >> p.fp_bits)
        } else {
            0.0
        };
        let dead = f64::from(p.dead_zone_t) + a2_max_zero;
        let step = p.error_bound() + 1.0;
        dead.max(step)
    }

    #[test]
    fn test_round_trip_error_bound() {
        for &(t, q) in &[(2u32, 2.0f64), (0, 1.0), (4, 3.5), (10, 0.5)] {
            let p = params(t, q, 8);
            let bound = worst_error(&p);
            for r in -200i16..=200 {
                let mut sym = [0i16; 1];
                let mut dec = [0i16; 1];
                quantize(&[r], &mut sym, &p);
                dequantize(&sym, &mut dec, &p);
                let abs_r = u32::from(r.unsigned_abs());
                if abs_r <= t {
                    assert_eq!(dec[0], 0, "dead zone violated at r={} t={} q={}", r, t, q);
                } else {
                    let err = f64::from((i32::from(dec[0]) - i32::from(r)).abs());
                    assert!(
                        err <= bound + 1e-9,
                        "r={} t={} q={} err={} bound={}",
                        r,
                        t,
                        q,
                        err,
                        bound
                    );
                }
            }
        }
    }

    #[test]
    fn test_zero_fp_bits() {
        // Integer step with no fractional part still behaves
        let p = params(0, 3.0, 0);
        assert_eq!(p.q_fixed, 3);
        let mut sym = [0i16; 1];
        quantize(&[7], &mut sym, &p);
        assert_eq!(sym[0], 2); // 7/3 rounds down with rounding term 0
        let mut dec = [0i16; 1];
        dequantize(&sym, &mut dec, &p);
        assert_eq!(dec[0], 6);
    }
}
