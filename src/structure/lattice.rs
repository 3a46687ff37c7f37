//! Periodic lattice geometry

/// Lattice vectors as rows: `[a, b, c]`, Angstroms
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Lattice {
    pub matrix: [[f64; 3]; 3],
}

impl Lattice {
    /// Build a lattice from cell lengths and angles (degrees)
    ///
    /// `a` lies along x and `b` in the xy-plane.
    pub fn from_parameters(a: f64, b: f64, c: f64, alpha: f64, beta: f64, gamma: f64) -> Self {
        let (cos_alpha, cos_beta) = (alpha.to_radians().cos(), beta.to_radians().cos());
        let (sin_gamma, cos_gamma) = gamma.to_radians().sin_cos();

        let c1 = c * cos_beta;
        let c2 = c * (cos_alpha - cos_beta * cos_gamma) / sin_gamma;
        let c3 = (c * c - c1 * c1 - c2 * c2).sqrt();

        Self {
            matrix: [
                [a, 0.0, 0.0],
                [b * cos_gamma, b * sin_gamma, 0.0],
                [c1, c2, c3],
            ],
        }
    }

    pub fn from_vectors(matrix: [[f64; 3]; 3]) -> Self {
        Self { matrix }
    }

    /// Signed cell volume
    pub fn volume(&self) -> f64 {
        let [a, b, c] = self.matrix;
        dot(&a, &cross(&b, &c))
    }

    /// Whether the cell spans a finite, non-degenerate volume
    pub fn is_valid(&self) -> bool {
        let volume = self.volume();
        volume.is_finite() && volume.abs() > 1e-8
    }

    /// Fractional to Cartesian coordinates
    #[inline]
    pub fn to_cartesian(&self, frac: &[f64; 3]) -> [f64; 3] {
        let m = &self.matrix;
        [
            frac[0] * m[0][0] + frac[1] * m[1][0] + frac[2] * m[2][0],
            frac[0] * m[0][1] + frac[1] * m[1][1] + frac[2] * m[2][1],
            frac[0] * m[0][2] + frac[1] * m[1][2] + frac[2] * m[2][2],
        ]
    }

    /// Distance between opposite faces along each lattice direction
    ///
    /// Number of periodic images needed to cover a sphere of radius `r`
    /// along direction `i` is `ceil(r / widths[i])`.
    pub fn perpendicular_widths(&self) -> [f64; 3] {
        let [a, b, c] = self.matrix;
        let volume = self.volume().abs();
        [
            volume / norm(&cross(&b, &c)),
            volume / norm(&cross(&c, &a)),
            volume / norm(&cross(&a, &b)),
        ]
    }
}

#[inline]
fn cross(u: &[f64; 3], v: &[f64; 3]) -> [f64; 3] {
    [
        u[1] * v[2] - u[2] * v[1],
        u[2] * v[0] - u[0] * v[2],
        u[0] * v[1] - u[1] * v[0],
    ]
}

#[inline]
fn dot(u: &[f64; 3], v: &[f64; 3]) -> f64 {
    u[0] * v[0] + u[1] * v[1] + u[2] * v[2]
}

#[inline]
fn norm(u: &[f64; 3]) -> f64 {
    dot(u, u).sqrt()
}
