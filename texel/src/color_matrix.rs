//! Bare minimum 3x3 linear algebra for color conversion.

/// A column major matrix.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct ColMatrix(pub(crate) [[f32; 3]; 3]);

/// A row major matrix.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct RowMatrix(pub(crate) [f32; 9]);

#[rustfmt::skip]
impl ColMatrix {
    fn adj(self) -> RowMatrix {
        let m = self.0;

        let det = |c1: usize, c2: usize, r1: usize, r2: usize| {
            m[c1][r1] * m[c2][r2] - m[c2][r1] * m[c1][r2]
        };

        RowMatrix([
            det(1, 2, 1, 2), -det(1, 2, 0, 2), det(1, 2, 0, 1),
            -det(0, 2, 1, 2), det(0, 2, 0, 2), -det(0, 2, 0, 1),
            det(0, 1, 1, 2), -det(0, 1, 0, 2), det(0, 1, 0, 1),
        ])
    }

    pub(crate) fn det(self) -> f32 {
        let det2 = |ma, mb, na, nb| {
            ma * nb - na * mb
        };
        let [x, y, z] = self.0;
        x[0] * det2(y[1], y[2], z[1], z[2])
            - x[1] * det2(y[0], y[2], z[0], z[2])
            + x[2] * det2(y[0], y[1], z[0], z[1])
    }

    pub(crate) fn inv(self) -> RowMatrix {
        let RowMatrix(adj) = self.adj();
        let det_n = self.det();
        RowMatrix(adj.map(|v| v / det_n))
    }

    pub(crate) fn mul_vec(&self, vec: [f32; 3]) -> [f32; 3] {
        let ColMatrix(m) = self;
        let [a, b, c] = vec;

        [
            a*m[0][0] + b*m[1][0] + c*m[2][0],
            a*m[0][1] + b*m[1][1] + c*m[2][1],
            a*m[0][2] + b*m[1][2] + c*m[2][2],
        ]
    }
}

#[rustfmt::skip]
impl RowMatrix {
    pub(crate) const IDENTITY: RowMatrix = RowMatrix::diag(1.0, 1.0, 1.0);

    pub(crate) const fn diag(x: f32, y: f32, z: f32) -> Self {
        RowMatrix([
            x, 0., 0.,
            0., y, 0.,
            0., 0., z,
        ])
    }

    pub(crate) fn inv(self) -> RowMatrix {
        self.to_col().inv()
    }

    /// Calculate self · col
    pub(crate) fn mul_vec(&self, col: [f32; 3]) -> [f32; 3] {
        let x = &self.0[0..3];
        let y = &self.0[3..6];
        let z = &self.0[6..9];

        let dot = |r: &[f32], c: [f32; 3]| {
            r[0] * c[0] + r[1] * c[1] + r[2] * c[2]
        };

        [dot(x, col), dot(y, col), dot(z, col)]
    }

    /// Calculate self · other
    pub(crate) fn mul(self, other: RowMatrix) -> RowMatrix {
        let ColMatrix([a, b, c]) = other.to_col();
        ColMatrix([self.mul_vec(a), self.mul_vec(b), self.mul_vec(c)]).to_row()
    }

    pub(crate) const fn to_col(self) -> ColMatrix {
        let RowMatrix(r) = self;

        ColMatrix([
            [r[0], r[3], r[6]],
            [r[1], r[4], r[7]],
            [r[2], r[5], r[8]],
        ])
    }
}

#[rustfmt::skip]
impl ColMatrix {
    pub(crate) const fn to_row(self) -> RowMatrix {
        let ColMatrix(m) = self;

        RowMatrix([
            m[0][0], m[1][0], m[2][0],
            m[0][1], m[1][1], m[2][1],
            m[0][2], m[1][2], m[2][2],
        ])
    }
}

#[test]
fn inverse_is_identity() {
    let mat = RowMatrix([2.0, 0.0, 1.0, 0.0, 1.0, 0.0, 1.0, 0.0, 1.0]);
    let product = mat.mul(mat.inv());
    for (value, expected) in product.0.iter().zip(RowMatrix::IDENTITY.0) {
        assert!((value - expected).abs() < 1e-6);
    }
}
