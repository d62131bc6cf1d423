//! End-to-end encode/decode scenarios
//!
//! Exercises the encoder, container, and decoder together: degenerate and
//! full-range intra frames, dead-zone and step-change residuals, and the
//! closed-loop reference equality that keeps a GOP drift-free.

use lwir_codec::{
    create_codec, CompressedFrame, Frame, FrameDecoder, FrameEncoder, QuantParams, RangeSpec,
};

fn flat_frame(value: u16, w: u32, h: u32) -> Frame {
    Frame::from_samples(vec![value; (w * h) as usize], w, h).unwrap()
}

fn pair(backend: &str) -> (FrameEncoder, FrameDecoder) {
    (
        FrameEncoder::new(create_codec(backend).unwrap()),
        FrameDecoder::new(create_codec(backend).unwrap()),
    )
}

/// Deterministic noise in [-amplitude, amplitude]
fn noise(seed: u32, amplitude: i32) -> i32 {
    let x = seed.wrapping_mul(2654435761).wrapping_add(12345);
    ((x >> 16) as i32 % (2 * amplitude + 1)) - amplitude
}

/// Slowly drifting synthetic thermal scene
fn scene_frame(t: u32, w: u32, h: u32) -> Frame {
    let data: Vec<u16> = (0..w * h)
        .map(|i| {
            let x = i % w;
            let y = i / w;
            let base = 20000 + 8 * ((x + 2 * t) % 64) + 4 * (y % 32);
            (base as i32 + noise(i ^ (t << 20), 3)) as u16
        })
        .collect();
    Frame::from_samples(data, w, h).unwrap().with_index(t)
}

// ─────────────────────────────────────────────────────────────────────────
// Scenario: solid frame through the 12-bit range map
// ─────────────────────────────────────────────────────────────────────────

#[test]
fn solid_frame_intra_with_range_map() {
    for backend in ["rice", "raw"] {
        let (mut enc, mut dec) = pair(backend);
        let frame = flat_frame(1000, 8, 8);

        let record = enc.encode_intra(&frame, 0, true).unwrap();
        assert!(record.is_keyframe);
        assert!(record.use_range_map);
        assert_eq!(record.range_min, 1000);
        assert_eq!(record.range_max, 1000);

        // Through the container and back
        let parsed = CompressedFrame::parse(&record.serialize()).unwrap();
        assert_eq!(parsed, record);

        let decoded = dec.decode(&parsed).unwrap();
        assert_eq!(decoded.data, vec![1000u16; 64]);
        assert_eq!(enc.reference().unwrap(), vec![1000u16; 64]);
        assert_eq!(dec.reference().unwrap(), enc.reference().unwrap());
    }
}

// ─────────────────────────────────────────────────────────────────────────
// Scenario: step change through the quantizer
// ─────────────────────────────────────────────────────────────────────────

#[test]
fn step_change_residual() {
    let (mut enc, mut dec) = pair("rice");
    let quant = QuantParams::new(2, 2.0, 8).unwrap();

    let key = enc.encode_intra(&flat_frame(1000, 8, 8), 0, true).unwrap();
    dec.decode(&key).unwrap();

    // +10 everywhere: (10-2)/2 = 4 -> decodes to 4*2+1 = 9
    let record = enc
        .encode_residual(&flat_frame(1010, 8, 8), 0, &quant)
        .unwrap();
    assert!(!record.is_keyframe);
    assert_eq!(record.quant_q, 2.0);
    assert_eq!(record.dead_zone_t, 2);
    assert_eq!(record.fp_bits, 8);

    let decoded = dec.decode(&record).unwrap();
    assert_eq!(decoded.data, vec![1009u16; 64]);
    for &sample in &decoded.data {
        let err = (i32::from(sample) - 1010).unsigned_abs();
        assert!(err <= 3); // T/2 + Q/2
    }
    assert_eq!(dec.reference().unwrap(), enc.reference().unwrap());
}

// ─────────────────────────────────────────────────────────────────────────
// Scenario: dead zone swallows small change
// ─────────────────────────────────────────────────────────────────────────

#[test]
fn dead_zone_keeps_reference() {
    let (mut enc, mut dec) = pair("rice");
    let quant = QuantParams::new(2, 2.0, 8).unwrap();

    let key = enc.encode_intra(&flat_frame(1000, 8, 8), 0, true).unwrap();
    dec.decode(&key).unwrap();

    let record = enc
        .encode_residual(&flat_frame(1001, 8, 8), 0, &quant)
        .unwrap();
    let decoded = dec.decode(&record).unwrap();

    // Decoded differs from the original but stays within the dead zone
    assert_eq!(decoded.data, vec![1000u16; 64]);
    for &sample in &decoded.data {
        assert!((i32::from(sample) - 1001).unsigned_abs() <= 2);
    }
}

// ─────────────────────────────────────────────────────────────────────────
// Scenario: full-range frame skips the range map
// ─────────────────────────────────────────────────────────────────────────

#[test]
fn full_range_frame_encodes_at_16_bits() {
    let (mut enc, mut dec) = pair("rice");
    let mut frame = flat_frame(30000, 8, 8);
    frame.data[0] = 0;
    frame.data[63] = 65535;
    assert!(!RangeSpec::compute(&frame.data).is_beneficial());

    let record = enc.encode_intra(&frame, 0, true).unwrap();
    assert!(!record.use_range_map);
    assert_eq!(record.range_min, 0);
    assert_eq!(record.range_max, 65535);

    // Lossless at NEAR=0 without the range map
    let decoded = dec.decode(&record).unwrap();
    assert_eq!(decoded.data, frame.data);
}

// ─────────────────────────────────────────────────────────────────────────
// Invariant: range-mapped intra error bound
// ─────────────────────────────────────────────────────────────────────────

#[test]
fn range_map_intra_error_bounded() {
    let (mut enc, mut dec) = pair("rice");
    // Narrow-range content typical of a restricted-range sensor
    let data: Vec<u16> = (0..64 * 64u32)
        .map(|i| (29000 + (i.wrapping_mul(31) % 5302)) as u16)
        .collect();
    let frame = Frame::from_samples(data, 64, 64).unwrap();
    let spec = RangeSpec::compute(&frame.data);
    let bound = spec.round_trip_error_bound();

    let record = enc.encode_intra(&frame, 0, true).unwrap();
    assert!(record.use_range_map);

    let decoded = dec.decode(&record).unwrap();
    for (&orig, &dec_s) in frame.data.iter().zip(decoded.data.iter()) {
        let err = (i32::from(orig) - i32::from(dec_s)).unsigned_abs();
        assert!(err <= bound, "err {} exceeds range-map bound {}", err, bound);
    }
}

// ─────────────────────────────────────────────────────────────────────────
// Invariant: reference equality across a GOP
// ─────────────────────────────────────────────────────────────────────────

#[test]
fn reference_equality_exact_loop() {
    // NEAR=0 everywhere: quantization is the only loss
    reference_equality_run(0, 0, 3);
}

#[test]
fn reference_equality_near_lossless_loop() {
    // NEAR>0 residual coding; closed loop must still hold exactly, and
    // the per-frame error stays near the ~10 DN operating point
    reference_equality_run(1, 2, 12);
}

fn reference_equality_run(keyframe_near: u32, residual_near: u32, max_error: u32) {
    let (mut enc, mut dec) = pair("rice");
    let quant = QuantParams::new(2, 2.0, 8).unwrap();
    let (w, h) = (64, 48);

    for t in 0..20u32 {
        let frame = scene_frame(t, w, h);
        let record = if t % 10 == 0 {
            enc.encode_intra(&frame, keyframe_near, true).unwrap()
        } else {
            enc.encode_residual(&frame, residual_near, &quant).unwrap()
        };

        // Every record survives the container
        let parsed = CompressedFrame::parse(&record.serialize()).unwrap();
        let decoded = dec.decode(&parsed).unwrap();

        // Byte-for-byte closed loop
        assert_eq!(
            dec.reference().unwrap(),
            enc.reference().unwrap(),
            "reference diverged at frame {}",
            t
        );
        assert_eq!(decoded.data.as_slice(), enc.reference().unwrap());

        // Bounded per-sample error, no drift across the GOP
        for (&orig, &dec_s) in frame.data.iter().zip(decoded.data.iter()) {
            let err = (i32::from(orig) - i32::from(dec_s)).unsigned_abs();
            assert!(err <= max_error, "frame {} err {} > {}", t, err, max_error);
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────
// Invariant: residual records reject a fresh decoder
// ─────────────────────────────────────────────────────────────────────────

#[test]
fn residual_record_requires_gop_context() {
    let (mut enc, _) = pair("rice");
    let quant = QuantParams::default();
    enc.encode_intra(&flat_frame(1000, 8, 8), 0, false).unwrap();
    let record = enc
        .encode_residual(&flat_frame(1010, 8, 8), 0, &quant)
        .unwrap();

    let mut fresh = FrameDecoder::with_default_backend().unwrap();
    let err = fresh.decode(&record).unwrap_err();
    assert!(err.is_precondition_failure());
}

// ─────────────────────────────────────────────────────────────────────────
// Invariant: records are rejected, not misread, when corrupted
// ─────────────────────────────────────────────────────────────────────────

#[test]
fn corrupted_records_are_rejected() {
    let (mut enc, _) = pair("rice");
    let record = enc.encode_intra(&flat_frame(1000, 8, 8), 0, false).unwrap();
    let bytes = record.serialize();

    // Truncated payload
    assert!(CompressedFrame::parse(&bytes[..bytes.len() - 3]).is_err());

    // Oversized fp_bits
    let mut bad = bytes.clone();
    bad[0x25] = 17;
    assert!(CompressedFrame::parse(&bad).is_err());

    // Payload length disagreement
    let mut bad = bytes;
    bad[0x2E] ^= 0xFF;
    assert!(CompressedFrame::parse(&bad).is_err());
}
