// Distributed under The MIT License (MIT)
//
// Copyright (c) 2019, 2020 The `image-rs` developers
//! Color spaces and the conversion between them.
//!
//! A [`ColorSpace`] is the closed, numbered set of names a buffer can be tagged with. Those
//! that describe an additive RGB model resolve to a [`ColorProfile`] made of primaries, a
//! whitepoint and a transfer function. Conversion happens in linear CIE XYZ.
mod transfer;

use crate::color_matrix::{ColMatrix, RowMatrix};

/// A named color space, with the numbering used on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
#[repr(i32)]
pub enum ColorSpace {
    #[default]
    Unknown = 0,
    DisplayP3 = 1,
    Srgb = 2,
    LinearSrgb = 3,
    ExtendedSrgb = 4,
    LinearExtendedSrgb = 5,
    GenericXyz = 6,
    GenericLab = 7,
    Aces = 8,
    AcesCg = 9,
    AdobeRgb1998 = 10,
    DciP3 = 11,
    Itu709 = 12,
    Itu2020 = 13,
    RommRgb = 14,
    Ntsc1953 = 15,
    SmpteC = 16,
}

/// The chromaticities of the three primaries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Primaries {
    /// The CIE XYZ 'primaries', the identity.
    Xyz,
    /// Primaries specified in Bt/Rec.709, shared by sRGB.
    Bt709,
    /// Primaries specified in Bt/Rec.2020.
    Bt2020,
    /// The P3 primaries of digital cinema, also used by Display P3.
    P3,
    /// Adobe RGB (1998).
    AdobeRgb,
    /// ROMM RGB, also known as ProPhoto.
    Romm,
    /// The original NTSC primaries of 1953.
    Ntsc1953,
    /// SMPTE C, also the first set of primaries of Bt/Rec.601.
    SmpteC,
    /// ACES AP0.
    AcesAp0,
    /// ACES AP1, used by ACEScg.
    AcesAp1,
}

/// The whitepoint/standard illuminant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Whitepoint {
    C,
    D50,
    D60,
    D65,
    /// The white of the DCI theater projector.
    Dci,
}

/// The transfer function between encoded values and linear light.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Transfer {
    Linear,
    Srgb,
    Bt709,
    Romm,
    /// A pure power curve with the given exponent.
    Gamma(f32),
}

/// An additive RGB color model.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ColorProfile {
    pub primaries: Primaries,
    pub whitepoint: Whitepoint,
    pub transfer: Transfer,
}

/// A prepared conversion of encoded 8-bit colors from one profile to another.
#[derive(Clone, Debug)]
pub struct ColorConversion {
    decode: [f32; 256],
    matrix: RowMatrix,
    transfer: Transfer,
}

impl ColorSpace {
    pub const ALL: [ColorSpace; 17] = [
        ColorSpace::Unknown,
        ColorSpace::DisplayP3,
        ColorSpace::Srgb,
        ColorSpace::LinearSrgb,
        ColorSpace::ExtendedSrgb,
        ColorSpace::LinearExtendedSrgb,
        ColorSpace::GenericXyz,
        ColorSpace::GenericLab,
        ColorSpace::Aces,
        ColorSpace::AcesCg,
        ColorSpace::AdobeRgb1998,
        ColorSpace::DciP3,
        ColorSpace::Itu709,
        ColorSpace::Itu2020,
        ColorSpace::RommRgb,
        ColorSpace::Ntsc1953,
        ColorSpace::SmpteC,
    ];

    pub fn from_raw(raw: i32) -> Option<Self> {
        usize::try_from(raw)
            .ok()
            .and_then(|idx| ColorSpace::ALL.get(idx).copied())
    }

    pub const fn to_raw(self) -> i32 {
        self as i32
    }

    /// The RGB model behind this name, if there is one.
    ///
    /// `Unknown` and the Lab space have no such model.
    pub fn profile(self) -> Option<ColorProfile> {
        use ColorSpace::*;

        let profile = |primaries, whitepoint, transfer| ColorProfile {
            primaries,
            whitepoint,
            transfer,
        };

        Some(match self {
            Unknown | GenericLab => return None,
            Srgb | ExtendedSrgb => ColorProfile::SRGB,
            LinearSrgb | LinearExtendedSrgb => {
                profile(Primaries::Bt709, Whitepoint::D65, Transfer::Linear)
            }
            DisplayP3 => profile(Primaries::P3, Whitepoint::D65, Transfer::Srgb),
            GenericXyz => profile(Primaries::Xyz, Whitepoint::D65, Transfer::Linear),
            Aces => profile(Primaries::AcesAp0, Whitepoint::D60, Transfer::Linear),
            AcesCg => profile(Primaries::AcesAp1, Whitepoint::D60, Transfer::Linear),
            AdobeRgb1998 => profile(
                Primaries::AdobeRgb,
                Whitepoint::D65,
                Transfer::Gamma(563.0 / 256.0),
            ),
            DciP3 => profile(Primaries::P3, Whitepoint::Dci, Transfer::Gamma(2.6)),
            Itu709 => profile(Primaries::Bt709, Whitepoint::D65, Transfer::Bt709),
            Itu2020 => profile(Primaries::Bt2020, Whitepoint::D65, Transfer::Bt709),
            RommRgb => profile(Primaries::Romm, Whitepoint::D50, Transfer::Romm),
            Ntsc1953 => profile(Primaries::Ntsc1953, Whitepoint::C, Transfer::Gamma(2.2)),
            SmpteC => profile(Primaries::SmpteC, Whitepoint::D65, Transfer::Bt709),
        })
    }
}

impl ColorProfile {
    pub const SRGB: ColorProfile = ColorProfile {
        primaries: Primaries::Bt709,
        whitepoint: Whitepoint::D65,
        transfer: Transfer::Srgb,
    };

    /// Prepare the conversion from this profile into `target`.
    pub fn conversion_to(&self, target: &ColorProfile) -> ColorConversion {
        let to_xyz = self.primaries.to_xyz(self.whitepoint);
        let from_xyz = target.primaries.to_xyz(target.whitepoint).inv();
        let source = self.transfer;

        ColorConversion {
            decode: core::array::from_fn(|v| source.to_optical(v as f32 / 255.0)),
            matrix: from_xyz.mul(to_xyz),
            transfer: target.transfer,
        }
    }
}

impl ColorConversion {
    /// Convert one color in `[b, g, r, a]` order, alpha passes through.
    pub fn convert_bgra(&self, bgra: [u8; 4]) -> [u8; 4] {
        let [b, g, r, a] = bgra;
        let linear = [
            self.decode[usize::from(r)],
            self.decode[usize::from(g)],
            self.decode[usize::from(b)],
        ];

        let [r, g, b] = self.matrix.mul_vec(linear);
        let encode = |v: f32| {
            let v = self.transfer.from_optical(v.clamp(0.0, 1.0));
            libm::roundf(v.clamp(0.0, 1.0) * 255.0) as u8
        };

        [encode(b), encode(g), encode(r), a]
    }
}

impl Transfer {
    /// Convert to optical (=linear) intensity.
    pub fn to_optical(self, val: f32) -> f32 {
        match self {
            Transfer::Linear => val,
            Transfer::Srgb => transfer::transfer_eo_srgb(val),
            Transfer::Bt709 => transfer::transfer_eo_bt709(val),
            Transfer::Romm => transfer::transfer_eo_romm(val),
            Transfer::Gamma(gamma) => transfer::transfer_eo_gamma(val, gamma),
        }
    }

    /// Convert from optical (=linear) intensity to the encoded value.
    pub fn from_optical(self, val: f32) -> f32 {
        match self {
            Transfer::Linear => val,
            Transfer::Srgb => transfer::transfer_oe_srgb(val),
            Transfer::Bt709 => transfer::transfer_oe_bt709(val),
            Transfer::Romm => transfer::transfer_oe_romm(val),
            Transfer::Gamma(gamma) => transfer::transfer_oe_gamma(val, gamma),
        }
    }
}

impl Whitepoint {
    fn to_xy(self) -> [f32; 2] {
        match self {
            Whitepoint::C => [0.31006, 0.31616],
            Whitepoint::D50 => [0.34567, 0.35850],
            Whitepoint::D60 => [0.32168, 0.33767],
            Whitepoint::D65 => [0.31270, 0.32900],
            Whitepoint::Dci => [0.314, 0.351],
        }
    }

    pub(crate) fn to_xyz(self) -> [f32; 3] {
        let [x, y] = self.to_xy();
        [x / y, 1.0, (1.0 - x - y) / y]
    }
}

#[rustfmt::skip]
impl Primaries {
    /// Convert to XYZ, or back if you invert the matrix.
    ///
    /// This is done with the 'wrong' van Kries transform, under given illuminant, where the CIE
    /// XYZ are scaled to match the whitepoint individually.
    pub(crate) fn to_xyz(self, white: Whitepoint) -> RowMatrix {
        use Primaries::*;
        let xy: [[f32; 2]; 3] = match self {
            Xyz => return RowMatrix::IDENTITY,
            Bt709 => [[0.64, 0.33], [0.30, 0.60], [0.15, 0.06]],
            Bt2020 => [[0.708, 0.292], [0.170, 0.797], [0.131, 0.046]],
            P3 => [[0.680, 0.320], [0.265, 0.690], [0.150, 0.060]],
            AdobeRgb => [[0.64, 0.33], [0.21, 0.71], [0.15, 0.06]],
            Romm => [[0.7347, 0.2653], [0.1596, 0.8404], [0.0366, 0.0001]],
            Ntsc1953 => [[0.67, 0.33], [0.21, 0.71], [0.14, 0.08]],
            SmpteC => [[0.63, 0.34], [0.31, 0.595], [0.155, 0.07]],
            AcesAp0 => [[0.7347, 0.2653], [0.0, 1.0], [0.0001, -0.077]],
            AcesAp1 => [[0.713, 0.293], [0.165, 0.830], [0.128, 0.044]],
        };

        // A column of CIE XYZ intensities for that primary.
        let xyz = |[x, y]: [f32; 2]| {
            [x / y, 1.0, (1.0 - x - y)/y]
        };

        let xyz_r = xyz(xy[0]);
        let xyz_g = xyz(xy[1]);
        let xyz_b = xyz(xy[2]);

        // N = [xyz_r | xyz_g | xyz_b], the unweighted matrix of XYZ = N · RGB
        let n1 = ColMatrix([xyz_r, xyz_g, xyz_b]).inv();

        // s are the weights that give the whitepoint when converted to xyz, W = N · S
        let s = n1.mul_vec(white.to_xyz());

        RowMatrix([
            s[0]*xyz_r[0], s[1]*xyz_g[0], s[2]*xyz_b[0],
            s[0]*xyz_r[1], s[1]*xyz_g[1], s[2]*xyz_b[1],
            s[0]*xyz_r[2], s[1]*xyz_g[2], s[2]*xyz_b[2],
        ])
    }
}

#[test]
fn raw_color_spaces() {
    for space in ColorSpace::ALL {
        assert_eq!(ColorSpace::from_raw(space.to_raw()), Some(space));
    }

    assert_eq!(ColorSpace::from_raw(17), None);
    assert_eq!(ColorSpace::from_raw(-1), None);
}

#[test]
fn identity_conversion() {
    let srgb = ColorProfile::SRGB;
    let conversion = srgb.conversion_to(&srgb);
    for bgra in [[0, 0, 0, 0xff], [0x10, 0x80, 0xf0, 0x40], [0xff, 0xff, 0xff, 0xff]] {
        assert_eq!(conversion.convert_bgra(bgra), bgra);
    }
}

#[test]
fn white_stays_white() {
    let p3 = ColorSpace::DisplayP3.profile().unwrap();
    let conversion = ColorProfile::SRGB.conversion_to(&p3);
    assert_eq!(conversion.convert_bgra([0xff, 0xff, 0xff, 0x80]), [0xff, 0xff, 0xff, 0x80]);

    // Pure sRGB red lies within P3, so it loses saturation.
    let [b, g, r, _] = conversion.convert_bgra([0, 0, 0xff, 0xff]);
    assert!(r < 0xff && g > 0 && b > 0);
}
