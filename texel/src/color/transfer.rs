/// To emulate the syntax used in GLSL more closely.
#[inline]
fn pow(base: f32, exp: f32) -> f32 {
    libm::powf(base, exp)
}

// Validated in `colour_test_vectors`.
pub fn transfer_oe_bt709(val: f32) -> f32 {
    if val >= 0.018 {
        1.099 * pow(val, 0.45) - 0.099
    } else {
        4.500 * val
    }
}

// Used Reference: BT.709-6, Section 1.2, inverted.
pub fn transfer_eo_bt709(val: f32) -> f32 {
    if val >= transfer_oe_bt709(0.018) {
        pow((val + 0.099) / 1.099, 1.0 / 0.45)
    } else {
        val / 4.500
    }
}

// Used Reference: https://www.kernel.org/doc/html/v4.11/media/uapi/v4l/pixfmt-007.html#
// Negative values mirror the curve, as used by extended sRGB.
pub fn transfer_oe_srgb(val: f32) -> f32 {
    if val < -0.0031308 {
        -1.055 * pow(-val, 1.0 / 2.4) + 0.055
    } else if val <= 0.0031308 {
        val * 12.92
    } else {
        1.055 * pow(val, 1.0 / 2.4) - 0.055
    }
}

pub fn transfer_eo_srgb(val: f32) -> f32 {
    if val < -0.04045 {
        -pow((-val + 0.055) / 1.055, 2.4)
    } else if val <= 0.04045 {
        val / 12.92
    } else {
        pow((val + 0.055) / 1.055, 2.4)
    }
}

/// A pure power curve, Adobe RGB (563/256), DCI-P3 (2.6) and BT.470 M (2.2).
pub fn transfer_oe_gamma(val: f32, gamma: f32) -> f32 {
    pow(val.max(0.0), 1.0 / gamma)
}

pub fn transfer_eo_gamma(val: f32, gamma: f32) -> f32 {
    pow(val.max(0.0), gamma)
}

// Used Reference: ISO 22028-2, ROMM RGB encoding.
const ROMM_LINEAR_BREAK: f32 = 1.0 / 512.0;

pub fn transfer_oe_romm(val: f32) -> f32 {
    if val < ROMM_LINEAR_BREAK {
        16.0 * val
    } else {
        pow(val, 1.0 / 1.8)
    }
}

pub fn transfer_eo_romm(val: f32) -> f32 {
    if val < 16.0 * ROMM_LINEAR_BREAK {
        val / 16.0
    } else {
        pow(val, 1.8)
    }
}

#[test]
fn colour_test_vectors() {
    struct TestVector {
        name: &'static str,
        eotf: fn(f32) -> f32,
        oetf: fn(f32) -> f32,
        data: &'static [(f32, f32)],
    }

    const VECTORS: &[TestVector] = &[
        TestVector {
            // # colour-science    0.4.6
            name: "sRGB",
            eotf: transfer_eo_srgb,
            oetf: transfer_oe_srgb,
            data: &[
                // b = colour.EOTFS['sRGB'](a)
                (0.0, 0.0),
                (1.0, 1.0),
                (0.5, 0.21404114048223255),
                (0.25, 0.050876088171556789),
                (0.75, 0.52252155396839206),
            ],
        },
        TestVector {
            // # colour-science    0.4.6
            name: "BT.709",
            eotf: transfer_eo_bt709,
            oetf: transfer_oe_bt709,
            data: &[
                // b = colour.RGB_COLOURSPACES['ITU-R BT.709'].cctf_decoding(a)
                (0.0, 0.0),
                (1.0, 1.0),
                (0.5, 0.25958940050628576),
                (0.25, 0.07815387594543223),
                (0.01, 0.0022222222222222222),
            ],
        },
    ];

    for vector in VECTORS {
        for (a, b) in vector.data {
            let eotf_result = (vector.eotf)(*a);
            let oetf_result = (vector.oetf)(*b);
            assert!(
                (eotf_result - *b).abs() < 1e-6,
                "{} failed for eotf {}: expected {}, got {}",
                vector.name,
                a,
                b,
                eotf_result
            );
            assert!(
                (oetf_result - *a).abs() < 1e-6,
                "{} failed for oetf {}: expected {}, got {}",
                vector.name,
                b,
                a,
                oetf_result
            );
        }
    }
}

#[test]
fn romm_is_continuous() {
    let below = transfer_oe_romm(ROMM_LINEAR_BREAK - 1e-7);
    let above = transfer_oe_romm(ROMM_LINEAR_BREAK);
    assert!((below - above).abs() < 1e-3);
    assert!((transfer_eo_romm(transfer_oe_romm(0.5)) - 0.5).abs() < 1e-5);
}
